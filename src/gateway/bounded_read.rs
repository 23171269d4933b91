//! Incremental, capped byte reading (spec.md §4.3, §4.5).
//!
//! "The implementation MUST NOT buffer the entire body before checking the
//! size cap" applies to every untrusted byte stream the gateway reads, not
//! just request bodies — the documentation surface's embedded-resource
//! reads share the same discipline (§4.3, closing paragraph). This module
//! is the one place that logic lives so both call sites stay honest.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::GatewayError;

/// Reads `reader` to completion, failing with [`GatewayError::PayloadTooLarge`]
/// the moment the running total exceeds `cap` — never after buffering past
/// it.
pub async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> Result<Vec<u8>, GatewayError> {
    let mut buffer = Vec::with_capacity(cap.min(64 * 1024));
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        if buffer.len() + read > cap {
            return Err(GatewayError::PayloadTooLarge(buffer.len() + read, cap));
        }
        buffer.extend_from_slice(&chunk[..read]);
    }
    Ok(buffer)
}
