use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation shared between a worker and whoever watches it.
///
/// Long-running imports and downloads poll the flag at file and network-read
/// boundaries only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is raised, for use with `?`.
    pub fn check(&self) -> crate::StationDbResult<()> {
        if self.is_cancelled() {
            Err(crate::StationDbError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let watcher = flag.clone();
        assert!(watcher.check().is_ok());

        flag.cancel();
        assert!(watcher.is_cancelled());
        assert!(matches!(watcher.check(), Err(crate::StationDbError::Cancelled)));
    }
}
