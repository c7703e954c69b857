use std::fmt;

/// Failure to construct a frame source.
#[derive(Debug)]
pub enum SourceError {
    Svg(resvg::usvg::Error),
    Font(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Svg(e) => write!(f, "failed to parse svg: {e}"),
            SourceError::Font(msg) => write!(f, "failed to load font: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Svg(e) => Some(e),
            SourceError::Font(_) => None,
        }
    }
}
