//! Classification severity.

use serde::{Deserialize, Serialize};

/// Outcome of checking a mapping, a process, or a whole run.
///
/// Ordered by importance: a confirmed deleted backing file outranks a
/// detected replacement, which outranks a transient stat error. A composite
/// verdict is always the maximum of its parts.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No problems found
    #[default]
    Okay,
    /// The check itself failed (stat error, unreadable maps)
    Err,
    /// Running code comes from a file that has been replaced on disk
    Mismatch,
    /// Running code comes from a file no longer on disk
    Missing,
}

impl Severity {
    /// Combine two verdicts, keeping the more important one.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }

    /// Worst severity in `items`, `Okay` when empty.
    pub fn worst<I: IntoIterator<Item = Self>>(items: I) -> Self {
        items.into_iter().fold(Self::Okay, Self::merge)
    }

    /// True for `Mismatch` and `Missing`.
    #[must_use]
    pub const fn is_drift(self) -> bool {
        matches!(self, Self::Mismatch | Self::Missing)
    }

    /// Short status label used in the process table.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Okay => "-",
            Self::Err => "err",
            Self::Mismatch => "outd",
            Self::Missing => "miss",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
