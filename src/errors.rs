use maxminddb::MaxMindDbError;
use serde_derive::Serialize;
use std::fmt;

/// The category of a failure, stable enough for callers to match on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    UnsupportedPlatform,
    UnsupportedArchitecture,
    InvalidReleaseDocument,
    NoMatchingAsset,
    DownloadFailed,
    ExtractionFailed,
    NoExecutableFound,
    AmbiguousExecutable,
    MissingCredential,
    UpdaterProcessFailed,
    LookupFailed,
    Io,
    Settings,
}

#[derive(Debug, Serialize)]
pub struct UpdaterError {
    kind: ErrorKind,
    message: String,
}

impl UpdaterError {
    pub fn new<M: Into<String>>(kind: ErrorKind, message: M) -> Self {
        let message = message.into();
        Self { kind, message }
    }

    pub fn from_source<S: fmt::Display, E: fmt::Display>(kind: ErrorKind, source: S, err: E) -> Self {
        Self {
            kind,
            message: format!("{}: {}", source, err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// Use default implementation of Error
impl std::error::Error for UpdaterError {}

impl fmt::Display for UpdaterError {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{:?}: {}", self.kind, self.message)
    }
}

impl From<std::io::Error> for UpdaterError {
    fn from(error: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, error.to_string())
    }
}

impl From<serde_json::Error> for UpdaterError {
    fn from(error: serde_json::Error) -> Self {
        Self::from_source(ErrorKind::InvalidReleaseDocument, "Malformed release index", error)
    }
}

impl From<url::ParseError> for UpdaterError {
    fn from(error: url::ParseError) -> Self {
        Self::from_source(ErrorKind::InvalidReleaseDocument, "Bad asset URL", error)
    }
}

impl From<reqwest::Error> for UpdaterError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::new(ErrorKind::DownloadFailed, status.to_string()),
            None => Self::new(ErrorKind::DownloadFailed, error.to_string()),
        }
    }
}

impl From<MaxMindDbError> for UpdaterError {
    fn from(error: MaxMindDbError) -> Self {
        Self::from_source(ErrorKind::LookupFailed, "GeoReader", error)
    }
}

impl From<std::net::AddrParseError> for UpdaterError {
    fn from(error: std::net::AddrParseError) -> Self {
        Self::from_source(ErrorKind::LookupFailed, "InvalidAddress", error)
    }
}

impl From<envy::Error> for UpdaterError {
    fn from(error: envy::Error) -> Self {
        Self::new(ErrorKind::Settings, error.to_string())
    }
}
