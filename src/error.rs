use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Transport { attempts: u32, source: reqwest::Error },
    Status(u16),
    Protocol(String),
    Rejected(String),
    MissingValue(String),
    InvalidZone(String),
    InvalidTemperature(f64),
    Config(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl Error {
    /// Connection-level failures: the device could not be reached or
    /// answered with a non-200 status.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Transport { .. } | Error::Status(_)
        )
    }

    /// The device answered, but not with something we accept.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_) | Error::Rejected(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Transport { attempts, source } => {
                write!(f, "transport error after {attempts} attempts: {source}")
            }
            Error::Status(code) => write!(f, "unexpected status code: {code}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Rejected(body) => write!(f, "device rejected write: {body}"),
            Error::MissingValue(name) => write!(f, "missing variable: {name}"),
            Error::InvalidZone(id) => write!(f, "invalid zone: {id}"),
            Error::InvalidTemperature(c) => write!(f, "temperature out of range: {c}"),
            Error::Config(msg) => write!(f, "configuration error: {msg}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Transport { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
