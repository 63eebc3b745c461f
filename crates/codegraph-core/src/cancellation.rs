use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single cancellation signal propagated to all in-flight pipeline work (§5).
///
/// Cloning shares the same underlying flag; cancelling any clone cancels all of them.
/// In-flight parses are allowed to finish (they are fast); in-flight HTTP calls should
/// check [`CancellationToken::is_cancelled`] between retries and abort.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelling_a_clone_cancels_the_original() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
