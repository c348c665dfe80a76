//! Drives async transport clients from the blocking source API.

use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

use crate::error::{RasterSourceError, Result};

/// Runtime owning every async transport request issued by this crate.
///
/// Kept separate from any caller runtime so pooled connections never
/// outlive the runtime that spawned them.
static IO_RUNTIME: Lazy<std::result::Result<Runtime, String>> = Lazy::new(|| {
    Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("raster-io")
        .enable_all()
        .build()
        .map_err(|e| e.to_string())
});

fn io_runtime() -> Result<&'static Runtime> {
    IO_RUNTIME
        .as_ref()
        .map_err(|e| RasterSourceError::config(format!("failed to start I/O runtime: {}", e)))
}

/// Run `future` to completion from synchronous code.
///
/// Works from plain threads and from inside a tokio runtime. On a
/// multi-thread runtime the calling worker is handed off with
/// `block_in_place`; a current-thread runtime cannot do that, so the
/// future is driven from a scoped helper thread instead.
pub fn block_on<F>(future: F) -> Result<F::Output>
where
    F: Future + Send,
    F::Output: Send,
{
    let runtime = io_runtime()?;

    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| runtime.block_on(future)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| runtime.block_on(future))
                .join()
                .map_err(|_| RasterSourceError::config("I/O helper thread panicked"))
        }),
        Err(_) => Ok(runtime.block_on(future)),
    }
}
