//! Two-call size-then-fill retrieval
//!
//! Variable-length driver outputs (GPU lists, disassembly documents, binaries) are
//! queried twice: once without a buffer to learn the size, then again with a
//! caller-allocated buffer of that size.

use crate::error::DriverStatus;

/// Retrieves a variable-length buffer through a size-then-fill query
///
/// # Arguments
/// * `query` - Called with `None` to obtain the required size, then with a buffer of that size to fill it. Returns the size in bytes.
///
/// # Returns
/// The filled buffer, truncated to the size reported by the fill call
pub fn retrieve_buffer<F>(mut query: F) -> Result<Vec<u8>, DriverStatus>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, DriverStatus>,
{
    let size = query(None)?;
    if size == 0 {
        return Ok(Vec::new());
    }

    let mut buffer = vec![0u8; size];
    let written = query(Some(&mut buffer))?;
    if written > size {
        return Err(DriverStatus::new(0, format!("driver reported {written} bytes for a {size} byte buffer")));
    }
    buffer.truncate(written);
    Ok(buffer)
}

/// Retrieves a NUL-terminated text buffer through a size-then-fill query
///
/// Trailing NULs are dropped and invalid UTF-8 is replaced.
pub fn retrieve_string<F>(query: F) -> Result<String, DriverStatus>
where
    F: FnMut(Option<&mut [u8]>) -> Result<usize, DriverStatus>,
{
    let buffer = retrieve_buffer(query)?;
    let end = buffer.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    Ok(String::from_utf8_lossy(&buffer[..end]).into_owned())
}

/// Splits a NUL-separated name list (as returned for the supported GPUs)
pub fn split_names(list: &str) -> Vec<String> {
    list.split(['\0', '\n']).map(str::trim).filter(|name| !name.is_empty()).map(str::to_string).collect()
}
