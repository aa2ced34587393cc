//! Output formatting for CLI results
//!
//! Three output formats are supported:
//! - Table: Human-readable tables (default)
//! - JSON: Structured JSON for scripting
//! - Quiet: No output, exit codes only

use std::str::FromStr;

use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;
use signchat_core::keys::IdentityInfo;
use signchat_core::{Message, TrustEntry, VerifiedMessage};

use crate::ExitCode;

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Quiet,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "quiet" => Ok(Self::Quiet),
            _ => Err(format!("Unknown output format: {s}")),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
            Self::Quiet => write!(f, "quiet"),
        }
    }
}

/// Standard JSON response wrapper for consistent schema
#[derive(Serialize)]
pub struct JsonResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// RFC 3339 timestamp
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl<T: Serialize> JsonResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }

    pub fn success_with_command(data: T, command: &str) -> Self {
        Self {
            command: Some(command.to_string()),
            ..Self::success(data)
        }
    }
}

impl JsonResponse<()> {
    pub fn error(message: &str) -> JsonResponse<()> {
        JsonResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            command: None,
        }
    }
}

/// Formats command results for the selected output mode
pub struct OutputFormatter {
    format: OutputFormat,
    verbose: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn is_quiet(&self) -> bool {
        self.format == OutputFormat::Quiet
    }

    /// Format fetched messages with their trust status
    pub fn format_messages(&self, messages: &[VerifiedMessage]) -> String {
        match self.format {
            OutputFormat::Table => self.messages_table(messages),
            OutputFormat::Json => self.to_json_response(&MessagesOutput::from(messages), "fetch"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format the message the server stored for a send
    pub fn format_sent(&self, message: &Message) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Property", "Value"]);
                table.add_row(vec!["Message ID", non_empty(&message.id)]);
                table.add_row(vec!["Author", &message.creator_name]);
                table.add_row(vec!["Created", &format_created(message)]);
                table.add_row(vec!["Public Key", &message.public_key]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(&MessageJson::sent(message), "send"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format the local identity
    pub fn format_identity(&self, info: &IdentityInfo) -> String {
        match self.format {
            OutputFormat::Table => {
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Property", "Value"]);
                table.add_row(vec!["Fingerprint", &info.fingerprint]);
                table.add_row(vec!["Public Key", &info.public_key]);
                table.add_row(vec!["Algorithm", &info.key_algorithm]);
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(info, "identity show"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format the trusted users list in insertion order
    pub fn format_trusted(&self, entries: &[TrustEntry]) -> String {
        match self.format {
            OutputFormat::Table => self.trusted_table(entries),
            OutputFormat::Json => self.to_json_response(&TrustedOutput::from(entries), "trust list"),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format the online users of the channel
    pub fn format_online(&self, users: &[String]) -> String {
        match self.format {
            OutputFormat::Table => {
                if users.is_empty() {
                    return "No users online.".to_string();
                }
                let mut table = Table::new();
                table.load_preset(UTF8_FULL);
                table.set_header(vec!["Online Users"]);
                for user in users {
                    table.add_row(vec![user]);
                }
                table.to_string()
            }
            OutputFormat::Json => self.to_json_response(
                &OnlineOutput {
                    users: users.to_vec(),
                    count: users.len(),
                },
                "online",
            ),
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Format a generic success result
    pub fn format_success<T: Serialize>(&self, data: &T, command: &str) -> String {
        match self.format {
            OutputFormat::Json => self.to_json_response(data, command),
            OutputFormat::Table | OutputFormat::Quiet => String::new(),
        }
    }

    /// Format error with exit code context
    pub fn format_error_with_code(&self, error: &str, code: ExitCode) -> String {
        match self.format {
            OutputFormat::Table => format!("Error: {error}"),
            OutputFormat::Json => {
                let response = JsonResponse::<()>::error(error);
                match serde_json::to_value(&response) {
                    Ok(mut output) => {
                        output["exit_code"] = serde_json::json!(code as i32);
                        output["exit_code_name"] = serde_json::json!(code.name());
                        self.to_json(&output)
                    }
                    Err(e) => format!("{{\"error\": \"{e}\"}}"),
                }
            }
            OutputFormat::Quiet => String::new(),
        }
    }

    /// Progress message (only shown in verbose mode)
    pub fn progress(&self, message: &str) {
        if self.verbose && self.format == OutputFormat::Table {
            eprintln!("... {message}");
        }
    }

    pub fn success(&self, message: &str) {
        if self.format == OutputFormat::Table {
            println!("✓ {message}");
        }
    }

    pub fn error(&self, message: &str) {
        if self.format == OutputFormat::Table {
            eprintln!("✗ {message}");
        } else if self.format == OutputFormat::Json {
            println!("{}", self.to_json(&ErrorOutput {
                error: message.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            }));
        }
    }

    pub fn warning(&self, message: &str) {
        if self.format == OutputFormat::Table {
            eprintln!("⚠ {message}");
        } else if self.format == OutputFormat::Json {
            println!("{}", self.to_json(&WarningOutput {
                warning: message.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
            }));
        }
    }

    fn to_json<T: Serialize>(&self, value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }

    fn to_json_response<T: Serialize>(&self, value: &T, command: &str) -> String {
        let response = JsonResponse::success_with_command(value, command);
        serde_json::to_string_pretty(&response).unwrap_or_else(|e| {
            self.to_json(&JsonResponse::<()>::error(&format!("Serialization error: {e}")))
        })
    }

    fn messages_table(&self, messages: &[VerifiedMessage]) -> String {
        if messages.is_empty() {
            return "No messages.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Time", "Author", "Trust", "Text"]);

        for m in messages {
            table.add_row(vec![
                format_created(&m.message),
                m.message.creator_name.clone(),
                trust_cell(m),
                m.message.text.clone(),
            ]);
        }

        table.to_string()
    }

    fn trusted_table(&self, entries: &[TrustEntry]) -> String {
        if entries.is_empty() {
            return "No trusted users.".to_string();
        }

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Username", "Fingerprint", "Public Key"]);

        for e in entries {
            table.add_row(vec![
                e.username.as_str(),
                &fingerprint_or_invalid(&e.public_key),
                e.public_key.as_str(),
            ]);
        }

        table.to_string()
    }
}

fn trust_cell(m: &VerifiedMessage) -> String {
    if m.is_trusted() {
        format!("✓ {}", m.decision.label())
    } else {
        format!("✗ {}", m.decision.label())
    }
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

fn fingerprint_or_invalid(public_key: &str) -> String {
    signchat_core::keys::fingerprint(public_key).unwrap_or_else(|| "(invalid key)".to_string())
}

fn format_created(message: &Message) -> String {
    message
        .created_time_local()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_created_iso(message: &Message) -> Option<String> {
    message.created_time_utc().map(|t| t.to_rfc3339())
}

// JSON output structures

#[derive(Serialize)]
struct MessagesOutput {
    messages: Vec<MessageJson>,
    count: usize,
    trusted: usize,
}

#[derive(Serialize)]
struct MessageJson {
    message_id: String,
    creator_name: String,
    text: String,
    created_at: Option<String>,
    public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trusted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trust: Option<String>,
}

impl MessageJson {
    fn sent(m: &Message) -> Self {
        Self {
            message_id: m.id.clone(),
            creator_name: m.creator_name.clone(),
            text: m.text.clone(),
            created_at: format_created_iso(m),
            public_key: m.public_key.clone(),
            trusted: None,
            trust: None,
        }
    }
}

impl From<&VerifiedMessage> for MessageJson {
    fn from(v: &VerifiedMessage) -> Self {
        Self {
            trusted: Some(v.is_trusted()),
            trust: Some(v.decision.label().to_string()),
            ..Self::sent(&v.message)
        }
    }
}

impl From<&[VerifiedMessage]> for MessagesOutput {
    fn from(messages: &[VerifiedMessage]) -> Self {
        Self {
            count: messages.len(),
            trusted: messages.iter().filter(|m| m.is_trusted()).count(),
            messages: messages.iter().map(MessageJson::from).collect(),
        }
    }
}

#[derive(Serialize)]
struct TrustedOutput {
    users: Vec<TrustedJson>,
    count: usize,
}

#[derive(Serialize)]
struct TrustedJson {
    username: String,
    public_key: String,
    fingerprint: Option<String>,
}

impl From<&[TrustEntry]> for TrustedOutput {
    fn from(entries: &[TrustEntry]) -> Self {
        Self {
            count: entries.len(),
            users: entries
                .iter()
                .map(|e| TrustedJson {
                    username: e.username.clone(),
                    public_key: e.public_key.clone(),
                    fingerprint: signchat_core::keys::fingerprint(&e.public_key),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct OnlineOutput {
    users: Vec<String>,
    count: usize,
}

#[derive(Serialize)]
struct ErrorOutput {
    error: String,
    timestamp: String,
}

#[derive(Serialize)]
struct WarningOutput {
    warning: String,
    timestamp: String,
}

/// Simple success message for JSON output
#[derive(Serialize)]
pub struct SuccessMessage {
    pub message: String,
}

impl SuccessMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}
