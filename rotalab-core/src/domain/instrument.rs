//! Instrument identity and universe membership record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable instrument identifier (ticker, contract code, …).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstrumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Group/sector tag used for diversification caps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupTag(pub String);

impl GroupTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

impl fmt::Display for GroupTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Universe membership record.
///
/// Created when an instrument enters the screened universe, destroyed on
/// exit only once no open position references it. The latest price and
/// readiness flag are refreshed from each tick's feed snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub id: InstrumentId,
    pub group: GroupTag,
    pub latest_price: f64,
    pub feed_ready: bool,
}

impl Instrument {
    pub fn new(id: InstrumentId, group: GroupTag) -> Self {
        Self {
            id,
            group,
            latest_price: f64::NAN,
            feed_ready: false,
        }
    }
}
