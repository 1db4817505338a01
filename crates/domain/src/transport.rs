use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::DomainError;

/// Transport a query was captured on, or is sent with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Udp => "udp",
            Transport::Tcp => "tcp",
        }
    }

    /// Connection-oriented transports frame messages with a 2-byte length prefix.
    pub fn is_stream(&self) -> bool {
        matches!(self, Transport::Tcp)
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Ok(Transport::Udp),
            "tcp" => Ok(Transport::Tcp),
            other => Err(DomainError::InvalidTransport(other.to_string())),
        }
    }
}

/// Transport override applied by the client pool before a query is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendAs {
    #[default]
    Original,
    Udp,
    Tcp,
}

impl SendAs {
    /// Returns the transport to use for a query captured on `original`.
    ///
    /// `None` means the query cannot be routed: no override is set and the
    /// capture did not say which transport it came from.
    pub fn resolve(&self, original: Option<Transport>) -> Option<Transport> {
        match self {
            SendAs::Original => original,
            SendAs::Udp => Some(Transport::Udp),
            SendAs::Tcp => Some(Transport::Tcp),
        }
    }
}

impl fmt::Display for SendAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendAs::Original => f.write_str("original"),
            SendAs::Udp => f.write_str("udp"),
            SendAs::Tcp => f.write_str("tcp"),
        }
    }
}

impl FromStr for SendAs {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "original" => Ok(SendAs::Original),
            "udp" => Ok(SendAs::Udp),
            "tcp" => Ok(SendAs::Tcp),
            other => Err(DomainError::InvalidTransport(other.to_string())),
        }
    }
}
