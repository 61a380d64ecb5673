//! `statvfs(3)` backend.
//!
//! POSIX filesystems report a single "available to unprivileged users"
//! number (`f_bavail * f_frsize`). There is no purgeable-space concept, so
//! this backend always answers [`RawCapacity::Untiered`].

use std::ffi::CString;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;

use crate::error::{ProbeError, Result};
use crate::types::{RawCapacity, Volume};

use super::VolumeCapacityBackend;

/// Backend implementation using `statvfs(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsBackend;

impl VolumeCapacityBackend for StatvfsBackend {
    fn name(&self) -> &'static str {
        "statvfs"
    }

    fn query(&self, volume: &Volume) -> Result<RawCapacity> {
        let c_path = CString::new(volume.path.as_os_str().as_bytes()).map_err(|_| {
            ProbeError::QueryFailed {
                path: volume.path.clone(),
                operation: "statvfs",
                code: None,
                message: "path contains an interior NUL byte".to_string(),
            }
        })?;

        // SAFETY: statvfs is a standard POSIX call. c_path is a valid
        // NUL-terminated string and we check the return value before reading
        // the struct.
        #[allow(unsafe_code)]
        let stat = unsafe {
            let mut stat: MaybeUninit<libc::statvfs> = MaybeUninit::uninit();
            if libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) != 0 {
                let err = std::io::Error::last_os_error();
                return Err(ProbeError::from_io(&volume.path, "statvfs", &err));
            }
            stat.assume_init()
        };

        let available = u64::from(stat.f_bavail).saturating_mul(u64::from(stat.f_frsize));
        log::trace!(
            "statvfs {}: f_bavail={} f_frsize={}",
            volume.path.display(),
            stat.f_bavail,
            stat.f_frsize
        );

        Ok(RawCapacity::Untiered { available })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_statvfs_reports_untiered() {
        let dir = tempfile::tempdir().unwrap();
        let volume = Volume::new(dir.path().to_path_buf()).as_dir();

        match StatvfsBackend.query(&volume).unwrap() {
            RawCapacity::Untiered { .. } => {}
            other => panic!("expected untiered capacity, got {other:?}"),
        }
    }

    #[test]
    fn test_statvfs_missing_path() {
        let volume = Volume::new(PathBuf::from("/nonexistent/path/for/statvfs"));
        let err = StatvfsBackend.query(&volume).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_statvfs_interior_nul() {
        let volume = Volume::new(PathBuf::from("/tmp/bad\0path"));
        let err = StatvfsBackend.query(&volume).unwrap_err();
        assert!(matches!(err, ProbeError::QueryFailed { code: None, .. }));
    }
}
