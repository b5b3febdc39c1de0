//! Message intent
//!
//! Three-way routing for an incoming message. Classification is performed
//! by the language model collaborator; ambiguity is biased toward `Log`,
//! which is also the fallback when classification fails.

use serde::{Deserialize, Serialize};

/// What the user is doing with this message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Sharing something about their day to be logged (the default)
    #[default]
    Log,
    /// Asking a question about their historical data
    Query,
    /// Unrelated chatter; acknowledged without extraction
    Other,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Log => write!(f, "log"),
            Intent::Query => write!(f, "query"),
            Intent::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log" => Ok(Intent::Log),
            "query" => Ok(Intent::Query),
            "other" => Ok(Intent::Other),
            other => Err(format!("Unknown intent: {}", other)),
        }
    }
}
