use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("SVG parse error: {0}")]
    Xml(String),
    #[error("Could not read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Circular SVG reference detected: {0:?}")]
    CircularReference(PathBuf),
    #[error("SVG path parse error: {0}")]
    PathParse(String),
    #[error("Invalid mapping selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },
    #[error("Mapping configuration error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Drawing error: {0}")]
    Sink(#[from] SinkError),
}

/// Failures raised by a [`DrawingSink`](crate::sink::DrawingSink).
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Unknown hatch pattern: {0}")]
    UnknownPattern(String),
    #[error("Invalid text style name: {0:?}")]
    InvalidStyleName(String),
    #[error("Degenerate geometry: {0}")]
    Degenerate(String),
    #[error("Could not write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
