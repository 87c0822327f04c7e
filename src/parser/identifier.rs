//! Identity extraction from raw record keys and capture location paths.
//!
//! Raw dumps carry no explicit schema: operation identity, core coordinates,
//! graph/epoch ids and input indices are all encoded in key strings.
//! Everything here is a pure function over `&str`.

use crate::utils::config::HOST_SEGMENT;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Physical core coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CoreCoord {
    pub x: u32,
    pub y: u32,
}

impl CoreCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for CoreCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.x, self.y)
    }
}

/// Operation name plus the core it ran on, parsed from `<x>-<y>-<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpIdentity {
    pub name: String,
    pub core: CoreCoord,
}

/// How a capture location is addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum LocationKind {
    /// Trailing segment is a four-digit graph id (e.g. `0003`)
    Graph(u32),
    /// Trailing segment is `epoch_<n>`
    Epoch(u32),
    /// Trailing segment is the reserved `host` literal
    Host,
    /// Anything else; excluded from aggregation
    Invalid,
}

impl LocationKind {
    pub fn graph_id(&self) -> Option<u32> {
        match self {
            Self::Graph(id) => Some(*id),
            _ => None,
        }
    }

    pub fn epoch_id(&self) -> Option<u32> {
        match self {
            Self::Epoch(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(id) => write!(f, "graph {:04}", id),
            Self::Epoch(id) => write!(f, "epoch {}", id),
            Self::Host => write!(f, "host"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// Parse an operation key of the form `<x>-<y>-<name>`.
///
/// Returns `None` for keys that are not per-core operation records
/// (summary blocks such as `per-epoch-events`).
pub fn parse_op_identifier(key: &str) -> Option<OpIdentity> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let regex = RE.get_or_init(|| {
        Regex::new(r"^(\d+)-(\d+)-(.+)$").expect("Failed to compile op identifier pattern")
    });

    let caps = regex.captures(key)?;
    let x = caps.get(1)?.as_str().parse().ok()?;
    let y = caps.get(2)?.as_str().parse().ok()?;
    let name = caps.get(3)?.as_str().to_string();

    Some(OpIdentity {
        name,
        core: CoreCoord::new(x, y),
    })
}

/// Classify a capture location by its trailing path segment
pub fn classify_location(path: &str) -> LocationKind {
    let segment = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    if segment.len() == 4 && segment.chars().all(|c| c.is_ascii_digit()) {
        return segment
            .parse()
            .map(LocationKind::Graph)
            .unwrap_or(LocationKind::Invalid);
    }

    if let Some(id) = parse_epoch_id(segment) {
        return LocationKind::Epoch(id);
    }

    if segment == HOST_SEGMENT {
        return LocationKind::Host;
    }

    LocationKind::Invalid
}

/// Parse `epoch_<n>` into `n`
pub fn parse_epoch_id(segment: &str) -> Option<u32> {
    let digits = segment.strip_prefix("epoch_")?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse an `input-<n>` token into its index
pub fn parse_input_index(token: &str) -> Option<u32> {
    let digits = token.strip_prefix("input-")?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Key of the per-input sub-record for `input`
pub fn input_key(input: u32) -> String {
    format!("input-{}", input)
}

/// Everything before the trailing segment (empty for a single segment)
pub fn parent_path(location: &str) -> &str {
    location
        .trim_end_matches('/')
        .rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or("")
}

/// Deterministic identity of an aggregated operation
pub fn full_name(location: &str, op_name: &str, input: u32) -> String {
    format!("{}#{}#input-{}", location, op_name, input)
}
