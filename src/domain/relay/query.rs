//! Inbound query and response mode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{Timestamp, ValidationError};

/// Response mode requested from the upstream backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Let the upstream pick its regular behaviour.
    #[default]
    Auto,
    /// Short, direct answers.
    Concise,
    /// Slower answers that gather more sources.
    Research,
}

impl Mode {
    /// Mode string understood by the upstream protocol.
    pub fn protocol_name(&self) -> &'static str {
        match self {
            Mode::Auto => "auto",
            Mode::Concise => "concise",
            Mode::Research => "deep_research",
        }
    }

    /// Resolves an optional client-supplied mode name.
    ///
    /// Absent or unrecognized names fall back to `default`.
    pub fn resolve(requested: Option<&str>, default: Mode) -> Mode {
        match requested.map(str::trim).filter(|name| !name.is_empty()) {
            None => default,
            Some(name) => name.parse().unwrap_or_else(|_| {
                tracing::debug!(requested = %name, fallback = %default, "Unknown mode, using default");
                default
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Auto => "auto",
            Mode::Concise => "concise",
            Mode::Research => "research",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Mode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "default" => Ok(Mode::Auto),
            "concise" | "fast" => Ok(Mode::Concise),
            "research" | "deep_research" | "deep" => Ok(Mode::Research),
            other => Err(ValidationError::invalid_format(
                "mode",
                format!("unknown mode '{}'", other),
            )),
        }
    }
}

/// A single user prompt awaiting a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    prompt: String,
    mode: Mode,
    submitted_at: Timestamp,
}

impl Query {
    /// Creates a query, rejecting blank prompts.
    pub fn new(prompt: impl Into<String>, mode: Mode) -> Result<Self, ValidationError> {
        let prompt = prompt.into().trim().to_string();
        if prompt.is_empty() {
            return Err(ValidationError::empty_field("prompt"));
        }
        Ok(Self {
            prompt,
            mode,
            submitted_at: Timestamp::now(),
        })
    }

    /// Overrides the submission time (e.g. a client-side timestamp).
    pub fn with_submitted_at(mut self, submitted_at: Timestamp) -> Self {
        self.submitted_at = submitted_at;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn submitted_at(&self) -> &Timestamp {
        &self.submitted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_trims_prompt() {
        let query = Query::new("  Halo AI \n", Mode::Auto).unwrap();
        assert_eq!(query.prompt(), "Halo AI");
    }

    #[test]
    fn query_rejects_blank_prompt() {
        let err = Query::new("   ", Mode::Auto).unwrap_err();
        assert_eq!(err, ValidationError::empty_field("prompt"));
    }

    #[test]
    fn query_submitted_at_can_be_overridden() {
        let ts = Timestamp::from_unix_millis(1_000).unwrap();
        let query = Query::new("hi", Mode::Concise).unwrap().with_submitted_at(ts);
        assert_eq!(query.submitted_at(), &ts);
        assert_eq!(query.mode(), Mode::Concise);
    }

    #[test]
    fn mode_parses_names_and_aliases() {
        assert_eq!("auto".parse::<Mode>().unwrap(), Mode::Auto);
        assert_eq!("FAST".parse::<Mode>().unwrap(), Mode::Concise);
        assert_eq!(" research ".parse::<Mode>().unwrap(), Mode::Research);
        assert!("gpt-4o".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_resolve_applies_default() {
        assert_eq!(Mode::resolve(None, Mode::Auto), Mode::Auto);
        assert_eq!(Mode::resolve(Some(""), Mode::Concise), Mode::Concise);
        assert_eq!(Mode::resolve(Some("unknown"), Mode::Research), Mode::Research);
        assert_eq!(Mode::resolve(Some("concise"), Mode::Auto), Mode::Concise);
    }

    #[test]
    fn mode_maps_to_protocol_names() {
        assert_eq!(Mode::Auto.protocol_name(), "auto");
        assert_eq!(Mode::Concise.protocol_name(), "concise");
        assert_eq!(Mode::Research.protocol_name(), "deep_research");
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Research).unwrap(), "\"research\"");
        let mode: Mode = serde_json::from_str("\"concise\"").unwrap();
        assert_eq!(mode, Mode::Concise);
    }
}
