//! Reads name table blobs from `HKEY_PERFORMANCE_DATA`.

use windows_sys::Win32::Foundation::{ERROR_MORE_DATA, ERROR_SUCCESS};
use windows_sys::Win32::System::Registry::{HKEY_PERFORMANCE_DATA, RegCloseKey, RegQueryValueExW};

use super::{REGISTRY_GROWTH, REGISTRY_MAX_ATTEMPTS};
use crate::collector::probe::{ProbeBuffer, probe_bounded};
use crate::collector::status::PdhStatus;

/// Reads a raw value such as `Counter 009`.
///
/// Non-PDH failures are returned as the Win32 error code.
pub(crate) fn read_performance_value(value: &str) -> Result<Vec<u8>, PdhStatus> {
    let name: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
    let mut buffer = ProbeBuffer::new();

    let result = probe_bounded(&mut buffer, REGISTRY_MAX_ATTEMPTS, |buf| {
        let offered = buf.capacity() as u32;
        let data = buf.as_mut_ptr();
        // SAFETY: `name` is NUL-terminated; `data` is null while sizing or
        // points to `buf.size()` writable bytes.
        let code = unsafe {
            RegQueryValueExW(
                HKEY_PERFORMANCE_DATA,
                name.as_ptr(),
                std::ptr::null(),
                std::ptr::null_mut(),
                data,
                buf.size_mut(),
            )
        };
        match code {
            ERROR_SUCCESS => PdhStatus::SUCCESS,
            ERROR_MORE_DATA => {
                // The reported size is not reliable for this key.
                let next = REGISTRY_GROWTH.next_size(buf.size(), offered);
                *buf.size_mut() = next;
                PdhStatus::MORE_DATA
            }
            other => PdhStatus(other),
        }
    });

    // SAFETY: closes the handle the queries above implicitly opened.
    unsafe {
        RegCloseKey(HKEY_PERFORMANCE_DATA);
    }

    result.map(|()| buffer.to_bytes())
}
