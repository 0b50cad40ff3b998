//! Serialized size estimation

use serde::Serialize;
use tracing::debug;

/// Estimate the stored footprint of a value as JSON.
///
/// Counts UTF-16 code units of the JSON text at two bytes each. Estimation is
/// advisory, so a value that fails to serialize is reported as zero bytes.
pub fn estimate_bytes<T: Serialize + ?Sized>(value: &T) -> u64 {
    match serde_json::to_string(value) {
        Ok(json) => json.encode_utf16().count() as u64 * 2,
        Err(e) => {
            debug!(error = %e, "Size estimation failed, counting as 0 bytes");
            0
        }
    }
}
