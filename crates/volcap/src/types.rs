use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ParsePolicyError;

/// A filesystem location resolved to the volume that backs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    /// Canonical absolute path of the queried entry
    pub path: PathBuf,
    /// Device identifier of the backing volume (`st_dev` on Unix)
    pub device: Option<u64>,
    /// Whether the queried entry is a directory
    pub is_dir: bool,
}

impl Volume {
    /// Create a new Volume
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            device: None,
            is_dir: false,
        }
    }

    /// Set the device identifier
    pub fn with_device(mut self, device: u64) -> Self {
        self.device = Some(device);
        self
    }

    /// Mark as directory
    pub fn as_dir(mut self) -> Self {
        self.is_dir = true;
        self
    }
}

/// Raw capacity numbers as a backend reports them, before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawCapacity {
    /// Both tiers reported as absolute byte counts.
    Tiered {
        /// Space available for important usage.
        important: u64,
        /// Space available for opportunistic usage.
        opportunistic: u64,
    },
    /// Important space plus the purgeable delta on top of it.
    Purgeable {
        /// Space available for important usage.
        important: u64,
        /// Space the OS could reclaim on demand.
        purgeable: u64,
    },
    /// A single free-space number; the platform has no purgeable concept.
    Untiered {
        /// Space available to unprivileged users.
        available: u64,
    },
}

/// What the probe does when a backend only reports a single free-space number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UntieredPolicy {
    /// Report the single number for both tiers and mark the report degraded.
    #[default]
    Degrade,
    /// Fail with [`ProbeError::UnsupportedPlatform`](crate::ProbeError::UnsupportedPlatform).
    Error,
}

impl FromStr for UntieredPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "degrade" => Ok(Self::Degrade),
            "error" => Ok(Self::Error),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

impl fmt::Display for UntieredPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Degrade => f.write_str("degrade"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Free space on one volume, in both accounting tiers.
///
/// A report is a value: it is produced per query and never cached by the
/// probe. Free space changes constantly, so callers that cache reports own
/// the staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityReport {
    important_available_bytes: u64,
    opportunistic_available_bytes: u64,
    degraded: bool,
}

impl CapacityReport {
    /// Create a report from both tiers.
    ///
    /// Values are taken as given, even when `opportunistic < important`.
    pub fn new(important_available_bytes: u64, opportunistic_available_bytes: u64) -> Self {
        Self {
            important_available_bytes,
            opportunistic_available_bytes,
            degraded: false,
        }
    }

    /// Create a report for a volume without a purgeable tier: both tiers equal.
    pub fn degraded(available_bytes: u64) -> Self {
        Self {
            important_available_bytes: available_bytes,
            opportunistic_available_bytes: available_bytes,
            degraded: true,
        }
    }

    /// Space usable without the OS reclaiming caches or snapshots
    pub fn important_available_bytes(&self) -> u64 {
        self.important_available_bytes
    }

    /// Space usable if every purgeable allocation is freed
    pub fn opportunistic_available_bytes(&self) -> u64 {
        self.opportunistic_available_bytes
    }

    /// Reclaimable space: the gap between the two tiers (0 if inverted)
    pub fn purgeable_bytes(&self) -> u64 {
        self.opportunistic_available_bytes
            .saturating_sub(self.important_available_bytes)
    }

    /// True when both tiers were equated because the platform has no purgeable tier
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// True when the tiers are ordered as a well-behaved backend reports them
    pub fn is_consistent(&self) -> bool {
        self.opportunistic_available_bytes >= self.important_available_bytes
    }
}
