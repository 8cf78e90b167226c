//! Low-level OS existence primitives.

use existbench_types::Failure;
use std::path::Path;

#[cfg(unix)]
#[allow(unsafe_code)]
pub(crate) fn path_exists(path: &Path) -> Result<bool, Failure> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| Failure::unexpected("path contains an interior NUL byte"))?;

    let rc = unsafe { libc::access(c_path.as_ptr(), libc::F_OK) };
    if rc == 0 {
        return Ok(true);
    }

    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ENOENT) | Some(libc::ENOTDIR) => Ok(false),
        _ => Err(Failure::unexpected(format!("access(2) failed: {err}"))),
    }
}

#[cfg(windows)]
#[allow(unsafe_code)]
pub(crate) fn path_exists(path: &Path) -> Result<bool, Failure> {
    use std::os::windows::ffi::OsStrExt;
    use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, ERROR_INVALID_DRIVE, ERROR_PATH_NOT_FOUND};
    use windows::Win32::Storage::FileSystem::{GetFileAttributesW, INVALID_FILE_ATTRIBUTES};
    use windows::core::PCWSTR;

    let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
    if wide.contains(&0) {
        return Err(Failure::unexpected("path contains an interior NUL character"));
    }
    wide.push(0);

    let attrs = unsafe { GetFileAttributesW(PCWSTR(wide.as_ptr())) };
    if attrs != INVALID_FILE_ATTRIBUTES {
        return Ok(true);
    }

    let err = std::io::Error::last_os_error();
    let not_found = [ERROR_FILE_NOT_FOUND, ERROR_PATH_NOT_FOUND, ERROR_INVALID_DRIVE];
    match err.raw_os_error() {
        Some(code) if not_found.iter().any(|e| e.0 == code as u32) => Ok(false),
        _ => Err(Failure::unexpected(format!("GetFileAttributesW failed: {err}"))),
    }
}

#[cfg(not(any(unix, windows)))]
pub(crate) fn path_exists(path: &Path) -> Result<bool, Failure> {
    path.try_exists()
        .map_err(|e| Failure::unexpected(e.to_string()))
}
