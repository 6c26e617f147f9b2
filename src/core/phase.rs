// ironbee_rust/src/core/phase.rs
// Rule phases name the points in a transaction lifecycle at which a var
// slot's value is valid. Ordering follows transaction progress; `None`
// sorts before every real phase.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    None,
    RequestHeader,
    Request,
    ResponseHeader,
    Response,
    Postprocess,
    Logging,
}

static PHASE_NAMES: Lazy<HashMap<&'static str, Phase>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("NONE", Phase::None);
    m.insert("REQUEST_HEADER", Phase::RequestHeader);
    m.insert("REQUEST", Phase::Request);
    m.insert("RESPONSE_HEADER", Phase::ResponseHeader);
    m.insert("RESPONSE", Phase::Response);
    m.insert("POSTPROCESS", Phase::Postprocess);
    m.insert("LOGGING", Phase::Logging);
    m
});

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::None => "NONE",
            Phase::RequestHeader => "REQUEST_HEADER",
            Phase::Request => "REQUEST",
            Phase::ResponseHeader => "RESPONSE_HEADER",
            Phase::Response => "RESPONSE",
            Phase::Postprocess => "POSTPROCESS",
            Phase::Logging => "LOGGING",
        }
    }

    /// A source's final phase must be `None` (open-ended) or no earlier
    /// than its initial phase.
    pub fn valid_range(initial: Phase, final_: Phase) -> bool {
        final_ == Phase::None || final_ >= initial
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PHASE_NAMES
            .get(s)
            .copied()
            .ok_or_else(|| format!("unknown phase '{s}'"))
    }
}
