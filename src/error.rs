//! Errors raised by a relay node
//!
//! Every [`Error`] maps to an [`ErrorCode`]; the hundreds digit of the code
//! picks the process exit status. Failures of a single read are not errors
//! of the node and are reported as `relay::ReadFailure` instead.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Stable numeric codes, printed as `E<code>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    IoRead = 200,
    IoWrite = 201,
    BindFailed = 210,
    Io = 299,

    ForwardingFailed = 300,
    ForwardingTimeout = 301,
    ForwardingRefused = 302,

    DirectoryUnavailable = 400,
    TeamNotFound = 401,
    PipeRecordNotFound = 402,

    InternalError = 900,
}

impl ErrorCode {
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Ten times the hundreds digit: 10 for config, 20 for IO and so on
    pub fn exit_code(&self) -> i32 {
        i32::from(*self as u16 / 100) * 10
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("no configuration file at {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("invalid configuration syntax in {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    #[error("invalid configuration: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot read {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot listen on {address}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("cannot render configuration: {0}")]
    Toml(#[from] toml::ser::Error),

    /// The owning node could not be asked for the pipe
    #[error("forwarding to {url} failed: {message}")]
    ForwardingFailed { url: String, message: String },

    #[error("forwarding to {url} timed out while connecting")]
    ForwardingTimeout { url: String },

    #[error("owning node at {url} refused the connection")]
    ForwardingRefused { url: String },

    /// Team or pipe directory could not answer
    #[error("directory unavailable: {message}")]
    Directory { message: String },

    #[error("team {team} does not exist")]
    TeamNotFound { team: String },

    #[error("team {team} has no pipe {pipe_id}")]
    PipeRecordNotFound { team: String, pipe_id: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } | Error::Toml(_) => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } | Error::Config(_) => ErrorCode::ConfigValidation,
            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Bind { .. } => ErrorCode::BindFailed,
            Error::Io(_) => ErrorCode::Io,
            Error::ForwardingFailed { .. } => ErrorCode::ForwardingFailed,
            Error::ForwardingTimeout { .. } => ErrorCode::ForwardingTimeout,
            Error::ForwardingRefused { .. } => ErrorCode::ForwardingRefused,
            Error::Directory { .. } => ErrorCode::DirectoryUnavailable,
            Error::TeamNotFound { .. } => ErrorCode::TeamNotFound,
            Error::PipeRecordNotFound { .. } => ErrorCode::PipeRecordNotFound,
            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// What an operator can do about it, when there is something to do
    pub fn hint(&self) -> Option<&'static str> {
        let hint = match self.code() {
            ErrorCode::ConfigNotFound => {
                "Run 'pipe-relay config init' to write a default configuration."
            }
            ErrorCode::ConfigParseError | ErrorCode::ConfigValidation => {
                "Fix the file, then check it with 'pipe-relay config validate'."
            }
            ErrorCode::BindFailed => {
                "The port may already be taken; change [node] bind_address or pass --bind."
            }
            ErrorCode::ForwardingFailed | ErrorCode::ForwardingRefused => {
                "Check that the owning node is up and its external_url is reachable from here."
            }
            ErrorCode::ForwardingTimeout => {
                "Raise [forwarding] connect_timeout_ms or check the route between nodes."
            }
            _ => return None,
        };
        Some(hint)
    }

    /// Error line plus hint, for stderr
    pub fn format_for_terminal(&self) -> String {
        let mut out = format!("\x1b[31mError [{}]\x1b[0m: {}\n", self.code().as_str(), self);
        if let Some(hint) = self.hint() {
            out.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }
        out
    }

    /// Single plain line for structured log fields
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }

    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Validation failure pinned to a dotted field name such as `node.external_url`
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn forwarding_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ForwardingFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn directory(message: impl Into<String>) -> Self {
        Error::Directory {
            message: message.into(),
        }
    }

    pub fn pipe_record_not_found(team: impl Into<String>, pipe_id: impl Into<String>) -> Self {
        Error::PipeRecordNotFound {
            team: team.into(),
            pipe_id: pipe_id.into(),
        }
    }
}
