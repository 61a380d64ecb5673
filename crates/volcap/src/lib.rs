//! # volcap
//!
//! Per-volume free space in two tiers.
//!
//! Copy-on-write filesystems (APFS in particular) hold a lot of space in
//! snapshots, caches and local copies of cloud files that the OS can reclaim
//! on demand. "How much space is free?" therefore has two honest answers:
//!
//! - **Important**: what a user can count on without the OS reclaiming
//!   anything aggressively. This is the number Finder shows.
//! - **Opportunistic**: important space plus everything purgeable.
//!
//! ## Example
//!
//! ```no_run
//! use volcap::VolumeCapacityProbe;
//!
//! let probe = VolumeCapacityProbe::new();
//! let report = probe.query("/").expect("Failed to query volume");
//!
//! println!(
//!     "important: {} bytes, opportunistic: {} bytes",
//!     report.important_available_bytes(),
//!     report.opportunistic_available_bytes()
//! );
//! ```
//!
//! ## Backends
//!
//! - `corefoundation` (macOS): both tiers from one resource-property query
//! - `statvfs` (other Unix): a single free-space number, see [`UntieredPolicy`]
//! - `unsupported` (everything else): always [`ProbeError::UnsupportedPlatform`]
//!
//! ## Threading
//!
//! The probe holds no mutable state. Queries block on the filesystem and can
//! hang on a stalled network volume; callers that need a deadline must run
//! the query on their own thread or task.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Backend implementations for capacity queries.
pub mod backend;
/// Error types for capacity queries.
pub mod error;
/// Volume, capacity and policy types.
pub mod types;

pub use backend::VolumeCapacityBackend;
pub use error::{ParsePolicyError, ProbeError, Result};
pub use types::{CapacityReport, RawCapacity, UntieredPolicy, Volume};

use std::fs;
use std::path::Path;

/// Resolves paths to volumes and reports their capacity in both tiers.
pub struct VolumeCapacityProbe {
    backend: Box<dyn VolumeCapacityBackend>,
    untiered_policy: UntieredPolicy,
}

impl Default for VolumeCapacityProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeCapacityProbe {
    /// Create a probe with the host platform's backend.
    pub fn new() -> Self {
        Self::with_backend(backend::default_backend())
    }

    /// Create a probe with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn VolumeCapacityBackend>) -> Self {
        log::debug!("Using capacity backend: {}", backend.name());
        Self {
            backend,
            untiered_policy: UntieredPolicy::default(),
        }
    }

    /// Choose what happens when the backend has no purgeable-space tier.
    pub fn with_untiered_policy(mut self, policy: UntieredPolicy) -> Self {
        self.untiered_policy = policy;
        self
    }

    /// Name of the active backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// The active untiered policy.
    pub fn untiered_policy(&self) -> UntieredPolicy {
        self.untiered_policy
    }

    /// Report free space for the volume containing `path`.
    ///
    /// `path` can be any existing file, directory or mount root.
    ///
    /// # Errors
    ///
    /// - `PathNotFound`: `path` does not exist
    /// - `UnsupportedPlatform`: no purgeable tier and the policy is
    ///   [`UntieredPolicy::Error`], or no backend for this OS
    /// - `QueryFailed`: the platform call failed (permissions, I/O, unmount)
    pub fn query(&self, path: impl AsRef<Path>) -> Result<CapacityReport> {
        let volume = resolve_volume(path.as_ref())?;
        let raw = self.backend.query(&volume)?;
        self.reconcile(&volume, raw)
    }

    /// Turn raw backend numbers into a report.
    fn reconcile(&self, volume: &Volume, raw: RawCapacity) -> Result<CapacityReport> {
        let report = match raw {
            RawCapacity::Tiered {
                important,
                opportunistic,
            } => CapacityReport::new(important, opportunistic),
            RawCapacity::Purgeable {
                important,
                purgeable,
            } => CapacityReport::new(important, important.saturating_add(purgeable)),
            RawCapacity::Untiered { available } => match self.untiered_policy {
                UntieredPolicy::Degrade => {
                    log::debug!(
                        "{} has no purgeable tier; reporting {} bytes for both tiers",
                        self.backend.name(),
                        available
                    );
                    CapacityReport::degraded(available)
                }
                UntieredPolicy::Error => {
                    return Err(ProbeError::UnsupportedPlatform {
                        backend: self.backend.name(),
                        reason: "volume exposes no purgeable-space tier",
                    });
                }
            },
        };

        // Inverted tiers pass through uncorrected.
        if !report.is_consistent() {
            log::warn!(
                "{} reported opportunistic space ({}) below important space ({}) for {}",
                self.backend.name(),
                report.opportunistic_available_bytes(),
                report.important_available_bytes(),
                volume.path.display()
            );
        }

        Ok(report)
    }
}

/// Resolve a path to the volume that backs it.
fn resolve_volume(path: &Path) -> Result<Volume> {
    let metadata = fs::metadata(path).map_err(|e| ProbeError::from_io(path, "stat", &e))?;
    let canonical =
        fs::canonicalize(path).map_err(|e| ProbeError::from_io(path, "canonicalize", &e))?;

    let mut volume = Volume::new(canonical);
    if let Some(device) = device_id(&metadata) {
        volume = volume.with_device(device);
    }
    if metadata.is_dir() {
        volume = volume.as_dir();
    }

    log::debug!(
        "Resolved {} to {} (device {:?})",
        path.display(),
        volume.path.display(),
        volume.device
    );
    Ok(volume)
}

#[cfg(unix)]
fn device_id(metadata: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.dev())
}

#[cfg(not(unix))]
fn device_id(_metadata: &fs::Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Backend that returns a fixed answer and records the volumes it saw.
    struct FixedBackend {
        raw: RawCapacity,
        seen: Arc<Mutex<Vec<Volume>>>,
    }

    impl FixedBackend {
        fn boxed(raw: RawCapacity) -> Box<dyn VolumeCapacityBackend> {
            Box::new(Self {
                raw,
                seen: Arc::default(),
            })
        }
    }

    impl VolumeCapacityBackend for FixedBackend {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn query(&self, volume: &Volume) -> Result<RawCapacity> {
            self.seen.lock().unwrap().push(volume.clone());
            Ok(self.raw)
        }
    }

    struct FailingBackend;

    impl VolumeCapacityBackend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn query(&self, volume: &Volume) -> Result<RawCapacity> {
            Err(ProbeError::QueryFailed {
                path: volume.path.clone(),
                operation: "fake",
                code: Some(i64::from(libc::EIO)),
                message: "Input/output error".to_string(),
            })
        }
    }

    #[test]
    fn test_important_plus_purgeable() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(
            RawCapacity::Purgeable {
                important: 50_000_000_000,
                purgeable: 10_000_000_000,
            },
        ));

        let report = probe.query("/").unwrap();
        assert_eq!(report.important_available_bytes(), 50_000_000_000);
        assert_eq!(report.opportunistic_available_bytes(), 60_000_000_000);
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_tiered_passes_through() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(RawCapacity::Tiered {
            important: 7,
            opportunistic: 9,
        }));
        let report = probe.query("/").unwrap();
        assert_eq!(report, CapacityReport::new(7, 9));
    }

    #[test]
    fn test_inverted_tiers_are_not_corrected() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(RawCapacity::Tiered {
            important: 100,
            opportunistic: 40,
        }));
        let report = probe.query("/").unwrap();
        assert_eq!(report.important_available_bytes(), 100);
        assert_eq!(report.opportunistic_available_bytes(), 40);
    }

    #[test]
    fn test_full_volume_reports_zero() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(
            RawCapacity::Purgeable {
                important: 0,
                purgeable: 0,
            },
        ));
        let report = probe.query("/").unwrap();
        assert_eq!(report.important_available_bytes(), 0);
        assert_eq!(report.opportunistic_available_bytes(), 0);
    }

    #[test]
    fn test_purgeable_saturates() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(
            RawCapacity::Purgeable {
                important: u64::MAX - 1,
                purgeable: 10,
            },
        ));
        let report = probe.query("/").unwrap();
        assert_eq!(report.opportunistic_available_bytes(), u64::MAX);
    }

    #[test]
    fn test_untiered_degrades_by_default() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(
            RawCapacity::Untiered { available: 1234 },
        ));
        assert_eq!(probe.untiered_policy(), UntieredPolicy::Degrade);

        let report = probe.query("/").unwrap();
        assert!(report.is_degraded());
        assert_eq!(report.important_available_bytes(), 1234);
        assert_eq!(report.opportunistic_available_bytes(), 1234);
    }

    #[test]
    fn test_untiered_error_policy() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(
            RawCapacity::Untiered { available: 1234 },
        ))
        .with_untiered_policy(UntieredPolicy::Error);

        let err = probe.query("/").unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_nonexistent_path_is_not_found() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(RawCapacity::Tiered {
            important: 1,
            opportunistic: 2,
        }));

        let err = probe.query("/nonexistent/path").unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(
            err,
            ProbeError::PathNotFound { ref path } if path == Path::new("/nonexistent/path")
        ));
    }

    #[test]
    fn test_empty_path_is_not_found() {
        let probe = VolumeCapacityProbe::with_backend(FixedBackend::boxed(RawCapacity::Tiered {
            important: 1,
            opportunistic: 2,
        }));
        assert!(probe.query("").unwrap_err().is_not_found());
    }

    #[test]
    fn test_backend_failure_is_surfaced() {
        let probe = VolumeCapacityProbe::with_backend(Box::new(FailingBackend));
        let err = probe.query("/").unwrap_err();
        assert_eq!(err.raw_code(), Some(i64::from(libc::EIO)));
    }

    #[test]
    fn test_file_resolves_to_its_volume() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.bin");
        fs::write(&file, b"hello").unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = FixedBackend {
            raw: RawCapacity::Tiered {
                important: 1,
                opportunistic: 2,
            },
            seen: Arc::clone(&seen),
        };
        let probe = VolumeCapacityProbe::with_backend(Box::new(backend));

        probe.query(&file).unwrap();
        probe.query(dir.path()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].is_dir);
        assert!(seen[1].is_dir);
        assert!(seen[0].path.is_absolute());
        assert_eq!(seen[0].path, fs::canonicalize(&file).unwrap());
        #[cfg(unix)]
        assert_eq!(seen[0].device, seen[1].device);
    }

    #[test]
    fn test_relative_path_is_canonicalized() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let backend = FixedBackend {
            raw: RawCapacity::Untiered { available: 1 },
            seen: Arc::clone(&seen),
        };
        let probe = VolumeCapacityProbe::with_backend(Box::new(backend));

        probe.query(".").unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].path, std::env::current_dir().unwrap().canonicalize().unwrap());
        assert_ne!(seen[0].path, PathBuf::from("."));
    }

    #[test]
    fn test_host_backend_invariant() {
        let dir = tempfile::tempdir().unwrap();
        let probe = VolumeCapacityProbe::new();

        match probe.query(dir.path()) {
            Ok(report) => assert!(
                report.is_consistent()
                    || report.important_available_bytes() == report.opportunistic_available_bytes()
            ),
            Err(e) => assert!(e.is_unsupported(), "unexpected error: {e}"),
        }
    }

    #[test]
    fn test_host_backend_is_stable_without_writes() {
        const EPSILON: u64 = 256 * 1024 * 1024;

        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        let probe = VolumeCapacityProbe::new();

        let (Ok(a), Ok(b)) = (probe.query(dir.path()), probe.query(&sub)) else {
            return;
        };
        assert!(
            a.important_available_bytes()
                .abs_diff(b.important_available_bytes())
                <= EPSILON
        );
        assert!(
            a.opportunistic_available_bytes()
                .abs_diff(b.opportunistic_available_bytes())
                <= EPSILON
        );
    }

    #[test]
    fn test_host_backend_missing_path() {
        let probe = VolumeCapacityProbe::new();
        assert!(probe.query("/nonexistent/path").unwrap_err().is_not_found());
    }

    #[test]
    fn test_probe_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VolumeCapacityProbe>();
    }
}
