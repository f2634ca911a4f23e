use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// User-facing failures. These are reported to the invoker and never take
/// the dispatcher down.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Permission denied: {permission}")]
    PermissionDenied { permission: String },
    #[error("You are not allowed to do this to that target ({key})")]
    InsufficientLevel { key: String },
    #[error("You must wait {} more second(s) before using this command again", ceil_secs(.remaining))]
    CooldownActive { remaining: Duration },
    #[error("You cannot afford this command, it costs {cost}")]
    InsufficientFunds { cost: f64 },
    #[error("Your command was cancelled")]
    WarmupCancelled,
    #[error("This command can only be executed by players")]
    PlayerOnly,
    #[error("This command has no action of its own")]
    NotExecutable,
    #[error("{0}")]
    Message(String),
}

impl RuntimeError {
    /// Remaining cooldown, for callers that want to render it themselves.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            RuntimeError::CooldownActive { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

fn ceil_secs(duration: &Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 { secs + 1 } else { secs }
}

#[derive(Debug, Error)]
pub enum InternalError {
    #[error("Internal error: command {command} has no argument at position {index}")]
    MissingArgument { command: String, index: usize },
    #[error("Internal error: dependency {name} is not available")]
    MissingDependency { name: &'static str },
    #[error("Internal error: economy failure: {0}")]
    Economy(#[from] EconomyError),
    #[error("Internal error (bug): {message}")]
    Message { message: String },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl CommandError {
    pub fn runtime(message: impl Into<String>) -> Self {
        CommandError::Runtime(RuntimeError::Message(message.into()))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CommandError::Internal(InternalError::Message {
            message: message.into(),
        })
    }

    pub fn as_runtime(&self) -> Option<&RuntimeError> {
        match self {
            CommandError::Runtime(err) => Some(err),
            CommandError::Internal(_) => None,
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Error)]
pub enum EconomyError {
    #[error("account {account:032x} cannot cover {amount}")]
    InsufficientBalance { account: u128, amount: f64 },
    #[error("economy backend failure: {0}")]
    Backend(String),
}

/// Failures while collecting command declarations. All of these abort
/// startup.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("command {key} is already registered")]
    Duplicate { key: String },
    #[error("command declaration for {executor} is malformed: {reason}")]
    Malformed { executor: &'static str, reason: String },
    #[error("circular parent chain detected:\n{}", .chain.join("\n"))]
    CircularParent { chain: Vec<&'static str> },
    #[error("command registration has already completed")]
    AlreadyFinalized,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not access {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
