//! CoreFoundation backend (macOS).
//!
//! Reads the volume's capacity through URL resource properties:
//!
//! - `kCFURLVolumeAvailableCapacityForImportantUsageKey` (what Finder shows)
//! - `kCFURLVolumeAvailableCapacityForOpportunisticUsageKey`
//! - `kCFURLVolumeAvailableCapacityKey` (plain free space)
//!
//! The tier keys are linked directly, so this backend needs macOS 10.13 or
//! later. The plain key covers volumes that do not supply the tier keys.
//!
//! All three keys are fetched with a single `CFURLCopyResourcePropertiesForKeys`
//! call, so both tiers come from the same snapshot of the volume.
//!
//! ## References
//!
//! - [Checking Volume Storage Capacity](https://developer.apple.com/documentation/foundation/nsurlresourcekey/checking_volume_storage_capacity)

#![allow(unsafe_code)]

use std::ffi::{c_char, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use libc::{c_long, c_ulong};

use crate::error::{ProbeError, Result};
use crate::types::{RawCapacity, Volume};

use super::{VolumeCapacityBackend, non_negative};

type CFTypeRef = *const c_void;
type CFAllocatorRef = *const c_void;
type CFStringRef = *const c_void;
type CFURLRef = *const c_void;
type CFArrayRef = *const c_void;
type CFDictionaryRef = *const c_void;
type CFNumberRef = *const c_void;
type CFErrorRef = *const c_void;
type CFIndex = c_long;
type CFTypeID = c_ulong;
type CFNumberType = CFIndex;
type CFStringEncoding = u32;
type Boolean = u8;

const K_CF_NUMBER_SINT64_TYPE: CFNumberType = 4;
const K_CF_STRING_ENCODING_UTF8: CFStringEncoding = 0x0800_0100;

/// `NSFileNoSuchFileError` / `NSFileReadNoSuchFileError` in the Cocoa domain.
const COCOA_NO_SUCH_FILE: [CFIndex; 2] = [4, 260];

#[repr(C)]
struct CFArrayCallBacks {
    _private: [u8; 0],
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    static kCFURLVolumeAvailableCapacityForImportantUsageKey: CFStringRef;
    static kCFURLVolumeAvailableCapacityForOpportunisticUsageKey: CFStringRef;
    static kCFURLVolumeAvailableCapacityKey: CFStringRef;
    static kCFTypeArrayCallBacks: CFArrayCallBacks;
    static kCFErrorDomainPOSIX: CFStringRef;
    static kCFErrorDomainCocoa: CFStringRef;

    fn CFURLCreateFromFileSystemRepresentation(
        allocator: CFAllocatorRef,
        buffer: *const u8,
        buf_len: CFIndex,
        is_directory: Boolean,
    ) -> CFURLRef;
    fn CFURLCopyResourcePropertiesForKeys(
        url: CFURLRef,
        keys: CFArrayRef,
        error: *mut CFErrorRef,
    ) -> CFDictionaryRef;
    fn CFArrayCreate(
        allocator: CFAllocatorRef,
        values: *const *const c_void,
        num_values: CFIndex,
        callbacks: *const CFArrayCallBacks,
    ) -> CFArrayRef;
    fn CFDictionaryGetValue(dict: CFDictionaryRef, key: *const c_void) -> *const c_void;
    fn CFNumberGetValue(number: CFNumberRef, the_type: CFNumberType, value: *mut c_void)
    -> Boolean;
    fn CFErrorGetCode(err: CFErrorRef) -> CFIndex;
    fn CFErrorGetDomain(err: CFErrorRef) -> CFStringRef;
    fn CFErrorCopyDescription(err: CFErrorRef) -> CFStringRef;
    fn CFStringGetCString(
        string: CFStringRef,
        buffer: *mut c_char,
        buffer_size: CFIndex,
        encoding: CFStringEncoding,
    ) -> Boolean;
    fn CFEqual(a: CFTypeRef, b: CFTypeRef) -> Boolean;
    fn CFGetTypeID(cf: CFTypeRef) -> CFTypeID;
    fn CFNumberGetTypeID() -> CFTypeID;
    fn CFRelease(cf: CFTypeRef);
}

/// An owned CoreFoundation object, released on drop.
struct Owned(CFTypeRef);

impl Owned {
    /// Take ownership of a +1 reference from a Create/Copy function.
    fn new(ptr: CFTypeRef) -> Option<Self> {
        (!ptr.is_null()).then_some(Self(ptr))
    }

    fn as_ptr(&self) -> CFTypeRef {
        self.0
    }
}

impl Drop for Owned {
    fn drop(&mut self) {
        // SAFETY: self.0 is non-null and we own exactly one reference to it.
        unsafe { CFRelease(self.0) }
    }
}

/// Backend implementation using CoreFoundation URL resource properties.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoreFoundationBackend;

impl VolumeCapacityBackend for CoreFoundationBackend {
    fn name(&self) -> &'static str {
        "corefoundation"
    }

    fn query(&self, volume: &Volume) -> Result<RawCapacity> {
        let bytes = volume.path.as_os_str().as_bytes();

        // SAFETY: bytes outlives the call and its length is passed alongside.
        let url = Owned::new(unsafe {
            CFURLCreateFromFileSystemRepresentation(
                ptr::null(),
                bytes.as_ptr(),
                bytes.len() as CFIndex,
                Boolean::from(volume.is_dir),
            )
        })
        .ok_or_else(|| failed(&volume.path, "CFURLCreateFromFileSystemRepresentation"))?;

        // SAFETY: the key statics are immutable CFString constants exported by
        // CoreFoundation; the array retains them via kCFTypeArrayCallBacks.
        let keys = unsafe {
            let values: [*const c_void; 3] = [
                kCFURLVolumeAvailableCapacityForImportantUsageKey,
                kCFURLVolumeAvailableCapacityForOpportunisticUsageKey,
                kCFURLVolumeAvailableCapacityKey,
            ];
            Owned::new(CFArrayCreate(
                ptr::null(),
                values.as_ptr(),
                values.len() as CFIndex,
                &raw const kCFTypeArrayCallBacks,
            ))
        }
        .ok_or_else(|| failed(&volume.path, "CFArrayCreate"))?;

        let mut error: CFErrorRef = ptr::null();
        // SAFETY: url and keys are live; error is a valid out-pointer.
        let properties = unsafe {
            CFURLCopyResourcePropertiesForKeys(url.as_ptr(), keys.as_ptr(), &mut error)
        };
        let Some(properties) = Owned::new(properties) else {
            return Err(match Owned::new(error) {
                Some(error) => convert_error(&volume.path, &error),
                None => failed(&volume.path, "CFURLCopyResourcePropertiesForKeys"),
            });
        };

        // SAFETY: properties is a live dictionary; the keys are CF constants.
        let (important, opportunistic, available) = unsafe {
            (
                read_i64(&properties, kCFURLVolumeAvailableCapacityForImportantUsageKey),
                read_i64(&properties, kCFURLVolumeAvailableCapacityForOpportunisticUsageKey),
                read_i64(&properties, kCFURLVolumeAvailableCapacityKey),
            )
        };
        log::trace!(
            "CoreFoundation {}: important={important:?} opportunistic={opportunistic:?} available={available:?}",
            volume.path.display()
        );

        match (important, opportunistic, available) {
            (Some(important), Some(opportunistic), _) => Ok(RawCapacity::Tiered {
                important: non_negative(important, "important capacity"),
                opportunistic: non_negative(opportunistic, "opportunistic capacity"),
            }),
            (_, _, Some(available)) => Ok(RawCapacity::Untiered {
                available: non_negative(available, "available capacity"),
            }),
            _ => Err(ProbeError::QueryFailed {
                path: volume.path.clone(),
                operation: "CFURLCopyResourcePropertiesForKeys",
                code: None,
                message: "volume reported no capacity properties".to_string(),
            }),
        }
    }
}

/// Read a CFNumber value from a resource-property dictionary.
///
/// # Safety
///
/// `dict` must wrap a CFDictionary and `key` must be a valid CFString.
unsafe fn read_i64(dict: &Owned, key: CFStringRef) -> Option<i64> {
    let number = unsafe { CFDictionaryGetValue(dict.as_ptr(), key) };
    // Unavailable properties come back missing or as kCFNull.
    if number.is_null() || unsafe { CFGetTypeID(number) != CFNumberGetTypeID() } {
        return None;
    }
    let mut value: i64 = 0;
    let ok = unsafe {
        CFNumberGetValue(
            number,
            K_CF_NUMBER_SINT64_TYPE,
            (&raw mut value).cast::<c_void>(),
        )
    };
    (ok != 0).then_some(value)
}

fn failed(path: &Path, operation: &'static str) -> ProbeError {
    ProbeError::QueryFailed {
        path: path.to_path_buf(),
        operation,
        code: None,
        message: "CoreFoundation returned NULL".to_string(),
    }
}

/// Map a CFError into a probe error, keeping the raw code.
fn convert_error(path: &Path, error: &Owned) -> ProbeError {
    // SAFETY: error wraps a live CFError; the domain is a +0 reference and the
    // description is a +1 reference handed to Owned.
    let (code, not_found, message) = unsafe {
        let code = CFErrorGetCode(error.as_ptr());
        let domain = CFErrorGetDomain(error.as_ptr());
        let posix = !domain.is_null() && CFEqual(domain, kCFErrorDomainPOSIX) != 0;
        let cocoa = !domain.is_null() && CFEqual(domain, kCFErrorDomainCocoa) != 0;
        let not_found = is_missing_file(posix, cocoa, code);
        let message = Owned::new(CFErrorCopyDescription(error.as_ptr()))
            .and_then(|desc| cf_string(&desc))
            .unwrap_or_else(|| "unknown CoreFoundation error".to_string());
        (code, not_found, message)
    };

    if not_found {
        return ProbeError::PathNotFound {
            path: path.to_path_buf(),
        };
    }
    ProbeError::QueryFailed {
        path: path.to_path_buf(),
        operation: "CFURLCopyResourcePropertiesForKeys",
        code: Some(i64::from(code)),
        message,
    }
}

/// True when a CFError code means the file does not exist.
fn is_missing_file(posix_domain: bool, cocoa_domain: bool, code: CFIndex) -> bool {
    (posix_domain && code == CFIndex::from(libc::ENOENT))
        || (cocoa_domain && COCOA_NO_SUCH_FILE.contains(&code))
}

/// Copy a CFString into a Rust string.
fn cf_string(string: &Owned) -> Option<String> {
    let mut buf = [0 as c_char; 1024];
    // SAFETY: buf is writable for its full length, which we pass as the size.
    let ok = unsafe {
        CFStringGetCString(
            string.as_ptr(),
            buf.as_mut_ptr(),
            buf.len() as CFIndex,
            K_CF_STRING_ENCODING_UTF8,
        )
    };
    if ok == 0 {
        return None;
    }
    // SAFETY: CFStringGetCString NUL-terminates on success.
    let c_str = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    Some(c_str.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_root_volume_reports_tiers() {
        let volume = Volume::new(PathBuf::from("/")).as_dir();
        match CoreFoundationBackend.query(&volume).unwrap() {
            RawCapacity::Tiered {
                important,
                opportunistic,
            } => {
                assert!(important > 0 || opportunistic > 0);
            }
            RawCapacity::Untiered { .. } => {}
            other => panic!("unexpected capacity shape: {other:?}"),
        }
    }

    #[test]
    fn test_missing_path() {
        let volume = Volume::new(PathBuf::from("/nonexistent/path/for/cf"));
        let err = CoreFoundationBackend.query(&volume).unwrap_err();
        assert!(err.is_not_found(), "expected PathNotFound, got {err:?}");
    }

    #[test]
    fn test_missing_file_codes() {
        assert!(is_missing_file(true, false, CFIndex::from(libc::ENOENT)));
        assert!(is_missing_file(false, true, 4));
        assert!(is_missing_file(false, true, 260));

        assert!(!is_missing_file(true, false, CFIndex::from(libc::EACCES)));
        assert!(!is_missing_file(false, true, 257));
        assert!(!is_missing_file(false, false, 260));
        assert!(!is_missing_file(false, false, CFIndex::from(libc::ENOENT)));
    }
}
