//! One-shot countdown latch used as the startup barrier.
//!
//! [`CountdownLatch`] counts outstanding completions. Callers [`add`] before
//! starting work, the completing side calls [`done`], and [`wait`] resolves
//! once the count returns to zero. The first time that happens the latch is
//! released for good: further `done` calls are ignored and further `add`
//! calls fail with [`LatchError::Released`].
//!
//! [`add`]: CountdownLatch::add
//! [`done`]: CountdownLatch::done
//! [`wait`]: CountdownLatch::wait

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::LatchError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LatchState {
    pending: usize,
    released: bool,
}

/// Shared countdown latch. Clones observe the same counter.
#[derive(Debug, Clone)]
pub struct CountdownLatch {
    state: Arc<watch::Sender<LatchState>>,
}

impl CountdownLatch {
    /// Creates a latch with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        let (state, _) = watch::channel(LatchState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Registers `n` more pending completions.
    ///
    /// # Errors
    ///
    /// Returns [`LatchError::Released`] once the latch has reached zero.
    pub fn add(&self, n: usize) -> Result<(), LatchError> {
        let mut result = Ok(());
        self.state.send_modify(|state| {
            if state.released {
                result = Err(LatchError::Released);
            } else {
                state.pending = state.pending.saturating_add(n);
            }
        });
        result
    }

    /// Marks one completion. Releases the latch when the count hits zero.
    pub fn done(&self) {
        self.state.send_if_modified(|state| {
            if state.released || state.pending == 0 {
                tracing::debug!("latch done() with nothing pending, ignored");
                return false;
            }
            state.pending -= 1;
            if state.pending == 0 {
                state.released = true;
            }
            true
        });
    }

    /// Number of completions still outstanding.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.borrow().pending
    }

    /// Returns `true` once the count has reached zero.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.borrow().released
    }

    /// Waits until nothing is pending.
    ///
    /// Resolves immediately when nothing was ever added.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| state.pending == 0).await;
    }
}

impl Default for CountdownLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn wait_without_add_returns_immediately() {
        let latch = CountdownLatch::new();
        let waited = tokio::time::timeout(Duration::from_millis(100), latch.wait()).await;
        assert!(waited.is_ok());
        assert!(!latch.is_released());
    }

    #[tokio::test]
    async fn wait_blocks_until_all_done() {
        let latch = CountdownLatch::new();
        let Ok(()) = latch.add(3) else {
            panic!("add failed");
        };

        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.wait().await })
        };

        latch.done();
        latch.done();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        assert_eq!(latch.pending(), 1);

        latch.done();
        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
        assert!(latch.is_released());
    }

    #[test]
    fn released_latch_rejects_add() {
        let latch = CountdownLatch::new();
        let Ok(()) = latch.add(1) else {
            panic!("add failed");
        };
        latch.done();
        assert_eq!(latch.add(1), Err(LatchError::Released));
    }

    #[test]
    fn extra_done_is_ignored() {
        let latch = CountdownLatch::new();
        latch.done();
        assert_eq!(latch.pending(), 0);
        assert!(!latch.is_released());

        let Ok(()) = latch.add(1) else {
            panic!("add failed");
        };
        latch.done();
        latch.done();
        assert_eq!(latch.pending(), 0);
        assert!(latch.is_released());
    }
}
