//! Property-based tests for signchat-cli

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use signchat_core::{Message, TrustDecision, TrustEntry, VerifiedMessage};

    use crate::config::{CliOverrides, Config};
    use crate::output::{OutputFormat, OutputFormatter};

    fn decision() -> impl Strategy<Value = TrustDecision> {
        prop_oneof![
            Just(TrustDecision::Trusted),
            Just(TrustDecision::UnknownAuthor),
            Just(TrustDecision::KeyNotTrusted),
            Just(TrustDecision::BadSignature),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // A valid config survives a save/load cycle unchanged
        #[test]
        fn test_config_round_trip(
            host in "[a-z]{1,12}",
            port in 1u16..,
            channel in "[a-z0-9_-]{1,16}",
            name in "[A-Za-z0-9]{1,16}",
            timeout in 1u64..3600,
        ) {
            let mut config = Config::default();
            config.server.url = format!("https://{host}.example:{port}");
            config.server.channel = channel.clone();
            config.server.name = name.clone();
            config.server.timeout_seconds = timeout;
            prop_assert!(config.validate().is_ok());

            let temp_dir = tempfile::TempDir::new().unwrap();
            let path = temp_dir.path().join("config.toml");
            config.save(&path).unwrap();
            let loaded = Config::load(&path).unwrap();

            prop_assert_eq!(loaded.server.url, config.server.url);
            prop_assert_eq!(loaded.server.channel, channel);
            prop_assert_eq!(loaded.server.name, name);
            prop_assert_eq!(loaded.server.timeout_seconds, timeout);
        }

        // Overrides win over config values, absent overrides keep them
        #[test]
        fn test_overrides_take_precedence(
            channel in prop::option::of("[a-z]{1,10}"),
            name in prop::option::of("[a-z]{1,10}"),
        ) {
            let overrides = CliOverrides {
                channel: channel.clone(),
                name: name.clone(),
                ..Default::default()
            };
            let config = Config::default().with_overrides(&overrides);

            prop_assert_eq!(config.server.channel, channel.unwrap_or_else(|| "general".to_string()));
            prop_assert_eq!(config.server.name, name.unwrap_or_else(|| "anonymous".to_string()));
        }

        // JSON fetch output is always parseable and counts trusted messages
        #[test]
        fn test_messages_json_is_valid(
            rows in prop::collection::vec((".{0,20}", ".{0,40}", decision()), 0..10),
        ) {
            let messages: Vec<VerifiedMessage> = rows
                .into_iter()
                .map(|(author, text, decision)| VerifiedMessage {
                    message: Message {
                        creator_name: author,
                        text,
                        ..Default::default()
                    },
                    decision,
                })
                .collect();
            let expected_trusted = messages.iter().filter(|m| m.is_trusted()).count();

            let formatter = OutputFormatter::new(OutputFormat::Json, false);
            let output = formatter.format_messages(&messages);
            let value: serde_json::Value = serde_json::from_str(&output).unwrap();

            prop_assert_eq!(value["data"]["count"].as_u64(), Some(messages.len() as u64));
            prop_assert_eq!(value["data"]["trusted"].as_u64(), Some(expected_trusted as u64));
        }

        // Table output never panics on arbitrary trusted entries
        #[test]
        fn test_trusted_table_any_entries(
            entries in prop::collection::vec((".{0,16}", ".{0,64}"), 1..8),
        ) {
            let entries: Vec<TrustEntry> = entries
                .into_iter()
                .map(|(user, key)| TrustEntry::new(user, key))
                .collect();

            let formatter = OutputFormatter::new(OutputFormat::Table, false);
            prop_assert!(!formatter.format_trusted(&entries).is_empty());
        }
    }
}
