//! SignChat CLI - command-line client for signed channel messages
//!
//! This crate provides a command-line interface for:
//! - Sending signed messages to a channel
//! - Fetching messages with their trust status
//! - Managing the local identity and trusted users

pub mod cli;
pub mod config;
pub mod output;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use config::{CliOverrides, Config};
pub use output::{JsonResponse, OutputFormat, OutputFormatter, SuccessMessage};

/// Exit codes for CLI operations
///
/// Exit codes provide machine-readable status for scripting:
/// - 0: Success - operation completed successfully
/// - 1: General error - unspecified error occurred
/// - 2: Untrusted - a message or author failed the trust check
/// - 3: Connection failed - the server could not be reached
/// - 4: Protocol error - the server answered with an unusable payload
/// - 5: Invalid input - bad arguments or local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    Untrusted = 2,
    ConnectionFailed = 3,
    ProtocolError = 4,
    InvalidInput = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Convert to process exit code
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    /// Get the exit code name as a string
    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::Untrusted => "UNTRUSTED",
            ExitCode::ConnectionFailed => "CONNECTION_FAILED",
            ExitCode::ProtocolError => "PROTOCOL_ERROR",
            ExitCode::InvalidInput => "INVALID_INPUT",
        }
    }

    /// Get a human-readable description of the exit code
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Operation completed successfully",
            ExitCode::GeneralError => "An unspecified error occurred",
            ExitCode::Untrusted => "Message or author is not trusted",
            ExitCode::ConnectionFailed => "Could not reach the server",
            ExitCode::ProtocolError => "Server returned an unusable response",
            ExitCode::InvalidInput => "Invalid arguments or local state",
        }
    }

    /// Map a client error to the exit code a script should see
    pub fn from_client_error(error: &signchat_core::ClientError) -> Self {
        use signchat_core::ClientError;
        match error {
            ClientError::Transport(_) => ExitCode::ConnectionFailed,
            ClientError::Protocol(_) => ExitCode::ProtocolError,
            ClientError::InvalidUrl { .. } => ExitCode::InvalidInput,
            ClientError::Identity(_) | ClientError::TrustStore(_) => ExitCode::GeneralError,
        }
    }
}
