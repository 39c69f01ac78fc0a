//! Test helpers shared by the storage integration tests.
//!
//! Run from workspace root: `cargo test -p docvault-storage`.

#![allow(dead_code)]

pub mod azure;
pub mod storage;

use docvault_storage::BoxedReader;
use std::io::Cursor;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per test binary.
///
/// Set `RUST_LOG=docvault_storage=debug` to see backend events.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "docvault_storage=warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

/// In-memory reader for save calls.
pub fn reader(data: &[u8]) -> BoxedReader {
    Box::pin(Cursor::new(data.to_vec()))
}

/// Minimal PNG signature, base64 encoded as `iVBORw0KGgo=`.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
