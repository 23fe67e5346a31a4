use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies which foreign chain a rover observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainTag {
    Eth,
    Lsk,
}

impl ChainTag {
    /// The lowercase wire tag used in RPC payloads and unified blocks.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainTag::Eth => "eth",
            ChainTag::Lsk => "lsk",
        }
    }
}

impl fmt::Display for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainTag {
    type Err = ChainTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eth" => Ok(ChainTag::Eth),
            "lsk" => Ok(ChainTag::Lsk),
            other => Err(ChainTagError::Unknown(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ChainTagError {
    #[error("unknown chain tag: {0}")]
    Unknown(String),
}

/// Token classification attached to a marked transaction.
///
/// Transactions moving the designated asset are tagged [`TokenTag::Emb`];
/// everything else marked for settlement carries its origin chain tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenTag {
    Emb,
    #[serde(untagged)]
    Chain(ChainTag),
}

impl TokenTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenTag::Emb => "emb",
            TokenTag::Chain(tag) => tag.as_str(),
        }
    }
}

impl fmt::Display for TokenTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
