//! CLI command definitions and argument parsing

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use signchat_core::{
    ChatClient, ClientConfig, ClientError, JsonFilePrefs, KeyManager, PreferenceStore,
    ReqwestTransport, TrustEntry, TrustStore,
};

use crate::config::{CliOverrides, Config};
use crate::output::{OutputFormat, OutputFormatter, SuccessMessage};
use crate::ExitCode;

/// SignChat CLI - signed channel messages
#[derive(Parser, Debug)]
#[command(name = "signchat")]
#[command(version, about = "SignChat CLI - send and verify signed channel messages")]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (overrides config, default table)
    #[arg(long, global = true)]
    pub output: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Debug mode (request-level tracing)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL (overrides config)
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// Channel to use (overrides config)
    #[arg(long, global = true)]
    pub channel: Option<String>,

    /// Username to send as (overrides config)
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Preference file holding the signing key and trusted users
    #[arg(long, global = true)]
    pub prefs: Option<PathBuf>,

    /// Server password
    #[arg(long, env = "SIGNCHAT_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,
}

impl Cli {
    /// Config overrides for the flags given on the command line
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            output_format: self.output.map(|f| f.to_string()),
            verbose: self.verbose.then_some(true),
            debug: self.debug.then_some(true),
            server_url: self.server.clone(),
            channel: self.channel.clone(),
            name: self.name.clone(),
            prefs_path: self.prefs.clone(),
        }
    }

    /// Execute the CLI command with a pre-loaded configuration
    ///
    /// `config` must already have the CLI overrides applied.
    pub async fn execute_with_config(self, config: Config) -> anyhow::Result<ExitCode> {
        let ctx = CommandContext::new(config, self.password);

        match self.command {
            Commands::Ping => ping(&ctx).await,
            Commands::Send(args) => args.execute(&ctx).await,
            Commands::Fetch(args) => args.execute(&ctx).await,
            Commands::Online(args) => args.execute(&ctx).await,
            Commands::Identity(args) => args.execute(&ctx),
            Commands::Trust(args) => args.execute(&ctx).await,
        }
    }
}

/// Resolved settings shared by all commands
pub struct CommandContext {
    pub config: Config,
    pub password: Option<String>,
    pub formatter: OutputFormatter,
}

impl CommandContext {
    /// Build the context, taking the output format from the resolved config
    pub fn new(config: Config, password: Option<String>) -> Self {
        // validate() has already rejected unknown formats
        let format = config.output.format.parse().unwrap_or_default();
        Self {
            formatter: OutputFormatter::new(format, config.output.verbose),
            password: password.filter(|p| !p.is_empty()),
            config,
        }
    }

    /// Open the local preference file
    pub fn open_prefs(&self) -> anyhow::Result<Arc<dyn PreferenceStore>> {
        let path = self
            .config
            .prefs_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine preference file path"))?;
        self.formatter.progress(&format!("Using preferences at {}", path.display()));
        Ok(Arc::new(JsonFilePrefs::new(path)))
    }

    /// Connect a client session for the configured server and channel
    pub fn connect(&self) -> anyhow::Result<Result<ChatClient, ClientError>> {
        let prefs = self.open_prefs()?;
        let transport =
            ReqwestTransport::with_timeout(Duration::from_secs(self.config.server.timeout_seconds))?;

        let mut client_config = ClientConfig::new(
            self.config.server.url.clone(),
            self.config.server.name.clone(),
            self.config.server.channel.clone(),
        );
        if let Some(password) = &self.password {
            client_config = client_config.with_password(password.clone());
        }

        self.formatter.progress(&format!(
            "Connecting to {} channel '{}' as {}",
            self.config.server.url, self.config.server.channel, self.config.server.name
        ));
        Ok(ChatClient::new(client_config, prefs, Arc::new(transport)))
    }

    /// Report a client error and return the matching exit code
    pub fn fail(&self, error: &ClientError) -> ExitCode {
        let code = ExitCode::from_client_error(error);
        tracing::debug!(error = %error, code = code.name(), "Command failed");
        if !self.formatter.is_quiet() {
            eprintln!("{}", self.formatter.format_error_with_code(&error.to_string(), code));
        }
        code
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the server is reachable
    Ping,
    /// Sign and send a message
    Send(SendArgs),
    /// Fetch messages and show their trust status
    Fetch(FetchArgs),
    /// List users online in the channel
    Online(OnlineArgs),
    /// Show the local signing identity
    Identity(IdentityArgs),
    /// Manage trusted users
    Trust(TrustArgs),
}

async fn ping(ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let client = match ctx.connect()? {
        Ok(client) => client,
        Err(e) => return Ok(ctx.fail(&e)),
    };

    match client.test_connection().await {
        Ok(()) => {
            ctx.formatter.success(&format!("Server {} is reachable", client.base_url()));
            let json = ctx
                .formatter
                .format_success(&SuccessMessage::new("reachable"), "ping");
            if !json.is_empty() {
                println!("{json}");
            }
            Ok(ExitCode::Success)
        }
        Err(e) => Ok(ctx.fail(&ClientError::Transport(e))),
    }
}

/// Arguments for the send command
#[derive(Parser, Debug)]
pub struct SendArgs {
    /// Message text
    pub text: String,
}

impl SendArgs {
    pub async fn execute(self, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
        let client = match ctx.connect()? {
            Ok(client) => client,
            Err(e) => return Ok(ctx.fail(&e)),
        };

        ctx.formatter.progress("Signing and sending message...");
        match client.send_message(&self.text).await {
            Ok(stored) => {
                ctx.formatter.success("Message sent");
                let output = ctx.formatter.format_sent(&stored);
                if !output.is_empty() {
                    println!("{output}");
                }
                Ok(ExitCode::Success)
            }
            Err(e) => Ok(ctx.fail(&e)),
        }
    }
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Maximum number of messages to fetch
    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Skip this many of the newest messages
    #[arg(long, default_value_t = 0)]
    pub offset: u32,

    /// Do not appear online while fetching
    #[arg(long)]
    pub hidden: bool,
}

impl FetchArgs {
    pub async fn execute(self, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
        let client = match ctx.connect()? {
            Ok(client) => client,
            Err(e) => return Ok(ctx.fail(&e)),
        };

        ctx.formatter.progress(&format!(
            "Fetching up to {} messages (offset {})...",
            self.limit, self.offset
        ));
        match client
            .get_verified_messages(self.limit, self.offset, !self.hidden)
            .await
        {
            Ok(messages) => {
                let output = ctx.formatter.format_messages(&messages);
                if !output.is_empty() {
                    println!("{output}");
                }
                Ok(ExitCode::Success)
            }
            Err(e) => Ok(ctx.fail(&e)),
        }
    }
}

/// Arguments for the online command
#[derive(Parser, Debug)]
pub struct OnlineArgs {
    /// Do not appear online while listing
    #[arg(long)]
    pub hidden: bool,
}

impl OnlineArgs {
    pub async fn execute(self, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
        let client = match ctx.connect()? {
            Ok(client) => client,
            Err(e) => return Ok(ctx.fail(&e)),
        };

        match client.get_online_users(!self.hidden).await {
            Ok(users) => {
                let output = ctx.formatter.format_online(&users);
                if !output.is_empty() {
                    println!("{output}");
                }
                Ok(ExitCode::Success)
            }
            Err(e) => Ok(ctx.fail(&e)),
        }
    }
}

/// Arguments for the identity command
#[derive(Parser, Debug)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub action: IdentityAction,
}

#[derive(Subcommand, Debug)]
pub enum IdentityAction {
    /// Show the public key and fingerprint, creating the key on first use
    Show,
}

impl IdentityArgs {
    pub fn execute(self, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
        match self.action {
            IdentityAction::Show => {
                ctx.formatter.progress("Loading identity...");
                let prefs = ctx.open_prefs()?;
                let identity = KeyManager::load_or_create_identity(prefs.as_ref())?;
                let output = ctx.formatter.format_identity(&identity.info());
                if !output.is_empty() {
                    println!("{output}");
                }
                Ok(ExitCode::Success)
            }
        }
    }
}

/// Arguments for the trust command
#[derive(Parser, Debug)]
pub struct TrustArgs {
    #[command(subcommand)]
    pub action: TrustAction,
}

#[derive(Subcommand, Debug)]
pub enum TrustAction {
    /// List trusted users in the order they were added
    List,
    /// Trust a public key for a username
    Add {
        /// Username the key belongs to
        name: String,
        /// Base64 encoded public key
        key: String,
    },
    /// Trust the key an author most recently signed with in the channel
    Accept {
        /// Author to accept
        name: String,
        /// Number of recent messages to search
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

impl TrustArgs {
    pub async fn execute(self, ctx: &CommandContext) -> anyhow::Result<ExitCode> {
        match self.action {
            TrustAction::List => {
                let store = TrustStore::load(ctx.open_prefs()?)?;
                let entries: Vec<TrustEntry> = store.entries().iter().cloned().collect();
                let output = ctx.formatter.format_trusted(&entries);
                if !output.is_empty() {
                    println!("{output}");
                }
                Ok(ExitCode::Success)
            }
            TrustAction::Add { name, key } => {
                let key = key.trim();
                if let Err(e) = signchat_core::keys::decode_public_key(key) {
                    ctx.formatter.error(&format!("Invalid public key: {e}"));
                    return Ok(ExitCode::InvalidInput);
                }

                let mut store = TrustStore::load(ctx.open_prefs()?)?;
                add_entry(ctx, &mut store, TrustEntry::new(name, key))
            }
            TrustAction::Accept { name, limit } => {
                let mut client = match ctx.connect()? {
                    Ok(client) => client,
                    Err(e) => return Ok(ctx.fail(&e)),
                };

                ctx.formatter.progress(&format!(
                    "Searching the last {limit} messages for a key signed by {name}..."
                ));
                let candidate = match client.latest_signed_by(&name, limit).await {
                    Ok(Some(msg)) => msg,
                    Ok(None) => {
                        ctx.formatter.error(&format!(
                            "No correctly signed message from '{name}' in the last {limit} messages"
                        ));
                        return Ok(ExitCode::Untrusted);
                    }
                    Err(e) => return Ok(ctx.fail(&e)),
                };

                if let Some(fingerprint) = signchat_core::keys::fingerprint(&candidate.public_key) {
                    ctx.formatter.progress(&format!("Found key with fingerprint {fingerprint}"));
                }
                add_entry(ctx, client.trust_store_mut(), TrustEntry::from_message(&candidate))
            }
        }
    }
}

fn add_entry(
    ctx: &CommandContext,
    store: &mut TrustStore,
    entry: TrustEntry,
) -> anyhow::Result<ExitCode> {
    if store.entries().contains(&entry) {
        ctx.formatter.warning(&format!("Key is already trusted for '{}'", entry.username));
        return Ok(ExitCode::Success);
    }

    let message = format!("Trusted key for '{}'", entry.username);
    store.add_verified_user(entry)?;

    ctx.formatter.success(&message);
    let json = ctx
        .formatter
        .format_success(&SuccessMessage::new(message.clone()), "trust");
    if !json.is_empty() {
        println!("{json}");
    }
    Ok(ExitCode::Success)
}
