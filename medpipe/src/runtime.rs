//! Tokio runtime for the command line.
//!
//! Tracking calls are awaited one after another, so a current-thread runtime
//! with IO and timers enabled is all the workflow needs.

use std::io;

/// Creates the runtime used to drive a workflow
///
/// # Examples
///
/// ```rust
/// use medpipe::runtime::create_runtime;
///
/// let runtime = create_runtime().expect("Failed to create runtime");
/// runtime.block_on(async {
///     // Your application code here
/// });
/// ```
pub fn create_runtime() -> io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Helper function to check if we're already in a tokio runtime
pub fn is_in_tokio_runtime() -> bool {
    tokio::runtime::Handle::try_current().is_ok()
}
