//! Ctrl-C handling for long-running commands

use stationdb_core::CancelFlag;

/// A cancel flag raised by the first Ctrl-C.
///
/// The signal is awaited on a side thread with its own small runtime, since
/// the import and download pipelines are blocking. Imports and downloads
/// stop at their next file or network-read boundary and clean up.
pub fn cancel_on_interrupt(operation: &'static str) -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    let spawned = std::thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::warn!("Ctrl-C will not cancel the {}: {}", operation, e);
                    return;
                }
            };
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                tracing::warn!("Interrupted, cancelling the {}", operation);
                flag.cancel();
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("Ctrl-C will not cancel the {}: {}", operation, e);
    }
    cancel
}
