// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Rendering OS error codes into diagnostics.
//!
//! Produces `error code: 0x.. message: <system text>`. The system text comes
//! from `strerror_r` on Unix and `FormatMessageW` on Windows.

use crate::error::TranslationError;

/// Native error code type (`errno` on Unix).
#[cfg(unix)]
pub type ErrorCode = i32;

/// Native error code type (`GetLastError` on Windows).
#[cfg(windows)]
pub type ErrorCode = u32;

/// Render `code` with its system message.
pub fn translate(code: ErrorCode) -> Result<String, TranslationError> {
    let message = render(code)?;
    Ok(format!("error code: {:#04X} message: {}", code, message))
}

/// Like [`translate`], but falls back to describing the translation failure.
pub fn describe(code: ErrorCode) -> String {
    translate(code).unwrap_or_else(|e| e.to_string())
}

#[cfg(unix)]
const MESSAGE_CAPACITY: usize = 256;

#[cfg(unix)]
fn render(code: ErrorCode) -> Result<String, TranslationError> {
    let mut buf = [0 as libc::c_char; MESSAGE_CAPACITY];
    render_into(code, &mut buf)
}

#[cfg(unix)]
fn render_into(code: ErrorCode, buf: &mut [libc::c_char]) -> Result<String, TranslationError> {
    use nix::errno::Errno;

    // SAFETY: buf is valid for buf.len() bytes; the XSI strerror_r never
    // writes past buflen and NUL-terminates on success.
    let status = unsafe { libc::strerror_r(code, buf.as_mut_ptr(), buf.len()) };
    if status != 0 {
        // Older libcs report through errno and return -1
        let reason = if status == -1 {
            Errno::last()
        } else {
            Errno::from_raw(status)
        };
        return Err(TranslationError {
            code,
            reason: format!("strerror_r failed: {}", reason),
        });
    }

    // SAFETY: strerror_r succeeded, so buf holds a NUL-terminated string.
    let message = unsafe { std::ffi::CStr::from_ptr(buf.as_ptr()) };
    Ok(message.to_string_lossy().trim_end().to_owned())
}

#[cfg(windows)]
fn render(code: ErrorCode) -> Result<String, TranslationError> {
    use windows_sys::Win32::Foundation::{GetLastError, LocalFree};
    use windows_sys::Win32::System::Diagnostics::Debug::{
        FormatMessageW, FORMAT_MESSAGE_ALLOCATE_BUFFER, FORMAT_MESSAGE_FROM_SYSTEM,
        FORMAT_MESSAGE_IGNORE_INSERTS,
    };

    // MAKELANGID(LANG_NEUTRAL, SUBLANG_DEFAULT)
    const LANGUAGE_DEFAULT: u32 = 0x0400;

    let mut buffer: *mut u16 = std::ptr::null_mut();

    // SAFETY: with FORMAT_MESSAGE_ALLOCATE_BUFFER the system stores a
    // LocalAlloc'd pointer into `buffer`, which we free below.
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_ALLOCATE_BUFFER | FORMAT_MESSAGE_IGNORE_INSERTS,
            std::ptr::null(),
            code,
            LANGUAGE_DEFAULT,
            &mut buffer as *mut *mut u16 as *mut u16,
            0,
            std::ptr::null(),
        )
    };

    if len == 0 {
        // SAFETY: plain thread-local read
        let status = unsafe { GetLastError() };
        return Err(TranslationError {
            code,
            reason: format!("FormatMessageW failed with {:#04X}", status),
        });
    }

    if buffer.is_null() {
        return Err(TranslationError {
            code,
            reason: "FormatMessageW returned no buffer".to_string(),
        });
    }

    // SAFETY: FormatMessageW wrote `len` UTF-16 units into `buffer`.
    let message = unsafe { std::slice::from_raw_parts(buffer, len as usize) };
    let message = String::from_utf16_lossy(message).trim_end().to_owned();

    // SAFETY: buffer was allocated by FormatMessageW with LocalAlloc.
    let leftover = unsafe { LocalFree(buffer as _) };
    if !leftover.is_null() {
        return Err(TranslationError {
            code,
            reason: "LocalFree failed".to_string(),
        });
    }

    Ok(message)
}
