//! Call priority, propagated alongside the deadline.

use std::fmt;

/// Relative importance of a call, used by transports and servers that shed
/// load under pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Parses the wire representation (`"high" | "normal" | "low"`, any case).
    pub fn try_parse(value: Option<&str>) -> Option<Self> {
        match value?.to_ascii_lowercase().as_str() {
            "high" => Some(Priority::High),
            "normal" => Some(Priority::Normal),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    /// Composes an inner-call priority with the priority it was called under.
    ///
    /// A two-level disagreement collapses to `Normal`; otherwise the inner
    /// priority wins.
    pub fn compose(outer: Priority, inner: Priority) -> Priority {
        match (outer, inner) {
            (Priority::High, Priority::Low) | (Priority::Low, Priority::High) => Priority::Normal,
            _ => inner,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
