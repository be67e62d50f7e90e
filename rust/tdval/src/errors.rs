use std::fmt::Display;

use crate::models::EngineId;

#[derive(Debug)]
pub enum TdValError {
    /// A score that is NaN or infinite was offered to a map.
    InvalidScore {
        score: f64,
        context: String,
    },
    /// A probability was requested for a search engine that never received entries.
    UnknownEngine {
        engine: EngineId,
    },
    /// A probability was requested for a grouping key that never received points.
    UnknownGroup {
        key: String,
    },
    InvalidThreshold {
        value: f64,
        context: &'static str,
    },
    Snapshot {
        msg: String,
    },
}

impl Display for TdValError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidScore { score, context } => {
                write!(f, "Invalid score {} ({})", score, context)
            }
            Self::UnknownEngine { engine } => {
                write!(f, "No entries were recorded for search engine {}", engine)
            }
            Self::UnknownGroup { key } => {
                write!(f, "No points were recorded for group {}", key)
            }
            Self::InvalidThreshold { value, context } => {
                write!(f, "Invalid threshold {}: {}", value, context)
            }
            Self::Snapshot { msg } => write!(f, "Unable to restore map snapshot: {}", msg),
        }
    }
}

impl std::error::Error for TdValError {}

impl TdValError {
    pub fn append_to_context(mut self, extra: &str) -> Self {
        match &mut self {
            Self::InvalidScore { context, .. } => context.push_str(extra),
            Self::Snapshot { msg } => msg.push_str(extra),
            Self::UnknownEngine { .. }
            | Self::UnknownGroup { .. }
            | Self::InvalidThreshold { .. } => {}
        }
        self
    }
}

impl From<serde_json::Error> for TdValError {
    fn from(x: serde_json::Error) -> Self {
        Self::Snapshot { msg: x.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, TdValError>;

/// Rejects NaN and infinite scores, which would poison the sort order.
pub(crate) fn check_score(score: f64, context: &str) -> Result<f64> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(TdValError::InvalidScore {
            score,
            context: context.to_string(),
        })
    }
}
