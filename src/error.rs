use std::fmt;

/// Broad classification used by callers that only care whether the gateway
/// itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connection failure or timeout.
    Transport,
    /// The gateway answered, but not with a usable success envelope.
    Protocol,
    /// The caller asked for something the device cannot do.
    Invalid,
    Io,
}

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Timeout,
    Status { action: String, status: u16 },
    Rejected { action: String },
    Decode { action: String, source: serde_json::Error },
    InvalidHost(String),
    InvalidMode(String),
    InvalidSetpoint { value: f64, min: f64, max: f64 },
    UnknownDevice(String),
    Io(std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Http(_) | Error::Timeout => ErrorKind::Transport,
            Error::Status { .. } | Error::Rejected { .. } | Error::Decode { .. } => {
                ErrorKind::Protocol
            }
            Error::InvalidHost(_)
            | Error::InvalidMode(_)
            | Error::InvalidSetpoint { .. }
            | Error::UnknownDevice(_) => ErrorKind::Invalid,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// True when the failure came from talking to the gateway (transport or
    /// protocol), as opposed to local misuse.
    pub fn is_gateway(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Protocol)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Timeout => write!(f, "request timed out"),
            Error::Status { action, status } => {
                write!(f, "gateway action '{action}' returned status {status}")
            }
            Error::Rejected { action } => {
                write!(f, "gateway action '{action}' returned success=false")
            }
            Error::Decode { action, source } => {
                write!(f, "gateway action '{action}' returned invalid JSON: {source}")
            }
            Error::InvalidHost(host) => write!(f, "invalid host: {host}"),
            Error::InvalidMode(mode) => write!(f, "invalid mode: {mode}"),
            Error::InvalidSetpoint { value, min, max } => {
                write!(f, "setpoint {value} outside {min}..{max}")
            }
            Error::UnknownDevice(uid) => write!(f, "unknown device: {uid}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Decode { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout
        } else {
            Error::Http(e)
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A part of the gateway payload that could not be turned into devices.
/// Reported next to the devices that did parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub path: String,
    pub reason: String,
}

impl ParseError {
    pub(crate) fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_kinds() {
        assert!(Error::Timeout.is_gateway());
        assert!(Error::Rejected { action: "getHomepage".into() }.is_gateway());
        assert!(
            Error::Status {
                action: "setSetPoint".into(),
                status: 500
            }
            .is_gateway()
        );
        assert!(!Error::InvalidMode("fan_only".into()).is_gateway());
        assert_eq!(Error::UnknownDevice("x".into()).kind(), ErrorKind::Invalid);
    }

    #[test]
    fn display_names_action() {
        let err = Error::Status {
            action: "powerOnDevice".into(),
            status: 403,
        };
        assert_eq!(
            err.to_string(),
            "gateway action 'powerOnDevice' returned status 403"
        );
    }
}
