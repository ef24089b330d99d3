use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Execution backend a local snippet is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Cloud-session backend (boto3 session).
    Aws,
    /// Secondary-cloud backend (azure management clients).
    Azure,
    /// Bare-metal-cloud backend (hcloud client).
    #[serde(alias = "hcloud")]
    Hetzner,
}

impl Backend {
    /// All backends, in registration order.
    pub const ALL: [Backend; 3] = [Backend::Aws, Backend::Azure, Backend::Hetzner];

    /// Lowercase tag used in settings and tool names.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Aws => "aws",
            Backend::Azure => "azure",
            Backend::Hetzner => "hetzner",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown backend tag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown backend '{0}' (expected aws, azure or hetzner)")]
pub struct ParseBackendError(pub String);

impl FromStr for Backend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Backend::Aws),
            "azure" => Ok(Backend::Azure),
            "hetzner" | "hcloud" => Ok(Backend::Hetzner),
            other => Err(ParseBackendError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse_is_case_insensitive() {
        assert_eq!("AWS".parse::<Backend>(), Ok(Backend::Aws));
        assert_eq!(" azure ".parse::<Backend>(), Ok(Backend::Azure));
        assert_eq!("hcloud".parse::<Backend>(), Ok(Backend::Hetzner));
        assert!("gcp".parse::<Backend>().is_err());
    }

    #[test]
    fn test_backend_serde_lowercase() {
        let json = serde_json::to_string(&Backend::Hetzner).unwrap();
        assert_eq!(json, "\"hetzner\"");
        let back: Backend = serde_json::from_str("\"azure\"").unwrap();
        assert_eq!(back, Backend::Azure);
    }
}
