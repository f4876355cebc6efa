//! Operation modes for tasks and writes.

use serde::{Deserialize, Serialize};

/// What a task (or a single write) is allowed to do on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Insert,
    Update,
    Upsert,
    Readonly,
    Delete,
}

impl Operation {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "Insert",
            Self::Update => "Update",
            Self::Upsert => "Upsert",
            Self::Readonly => "Readonly",
            Self::Delete => "Delete",
        }
    }

    /// Whether new target records may be created under this operation.
    #[must_use]
    pub const fn allows_insert(&self) -> bool {
        matches!(self, Self::Insert | Self::Upsert)
    }

    /// Whether existing target records must be read to decide what to do.
    #[must_use]
    pub const fn reads_target(&self) -> bool {
        matches!(self, Self::Update | Self::Upsert | Self::Delete)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "upsert" => Ok(Self::Upsert),
            "readonly" => Ok(Self::Readonly),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("Unknown operation: {s}")),
        }
    }
}
