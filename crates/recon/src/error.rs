use std::fmt;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad off-hours window, inverted date range, etc.).
    InvalidConfiguration(String),
    /// Missing required column in an input CSV.
    MissingColumn { source: String, column: String },
    /// Malformed CSV framing (unbalanced quotes, ragged rows).
    Csv { source: String, message: String },
    /// Artifact rendering failed.
    Render(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            Self::MissingColumn { source, column } => {
                write!(f, "{source}: missing column '{column}'")
            }
            Self::Csv { source, message } => write!(f, "{source}: malformed CSV: {message}"),
            Self::Render(msg) => write!(f, "render error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl ReconError {
    /// True for errors raised before any row is processed.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::ConfigParse(_) | Self::InvalidConfiguration(_))
    }
}
