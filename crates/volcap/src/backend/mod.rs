use crate::error::{ProbeError, Result};
use crate::types::{RawCapacity, Volume};

#[cfg(target_os = "macos")]
pub mod core_foundation;
#[cfg(unix)]
pub mod statvfs;

/// Backend trait for per-volume capacity queries
///
/// One implementation per operating system family, each talking directly to
/// that platform's native attribute interface:
/// - macOS: CoreFoundation URL resource properties (both tiers)
/// - other Unix: `statvfs(3)` (single free-space number)
/// - anything else: [`UnsupportedBackend`]
///
/// Implementations must be stateless and make a single blocking platform
/// call per query where the platform allows it.
pub trait VolumeCapacityBackend: Send + Sync {
    /// Short backend name for logs and errors
    fn name(&self) -> &'static str;

    /// Query raw capacity numbers for an already-resolved volume
    fn query(&self, volume: &Volume) -> Result<RawCapacity>;
}

/// Backend for hosts with no known capacity interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl VolumeCapacityBackend for UnsupportedBackend {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn query(&self, _volume: &Volume) -> Result<RawCapacity> {
        Err(ProbeError::UnsupportedPlatform {
            backend: self.name(),
            reason: "no capacity backend for this operating system",
        })
    }
}

/// Get the best backend for the host platform.
#[cfg(target_os = "macos")]
pub fn default_backend() -> Box<dyn VolumeCapacityBackend> {
    Box::new(core_foundation::CoreFoundationBackend)
}

/// Get the best backend for the host platform.
#[cfg(all(unix, not(target_os = "macos")))]
pub fn default_backend() -> Box<dyn VolumeCapacityBackend> {
    Box::new(statvfs::StatvfsBackend)
}

/// Get the best backend for the host platform.
#[cfg(not(unix))]
pub fn default_backend() -> Box<dyn VolumeCapacityBackend> {
    Box::new(UnsupportedBackend)
}

/// Convert a signed platform byte count to `u64`, clamping negatives to 0.
///
/// Some platform APIs report capacity as signed integers. A negative value is
/// a backend anomaly; it must never wrap into a huge unsigned number.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
pub(crate) fn non_negative(value: i64, what: &str) -> u64 {
    u64::try_from(value).unwrap_or_else(|_| {
        log::warn!("{what} reported a negative byte count ({value}); using 0");
        0
    })
}
