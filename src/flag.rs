//! Single-producer/single-consumer completion cell
//!
//! Models the asynchronous-callback-plus-blocking-wait idiom used by the
//! cycle drivers: the main procedure arms the cell before starting an
//! operation, the stack callback sets it (at most once per arming), and the
//! main procedure awaits it afterwards. Arming is how the cell is reset, so
//! the unset-before-start ordering is a precondition enforced by the API
//! rather than a convention. A stale signal from a previous cycle can never
//! be observed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::trace;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

use crate::error::StackError;

/// State of the completion cell for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FlagState {
    Unset,
    Set,
    Aborted(StackError),
}

/// Why a wait on the cell did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlagError {
    /// The callback reported a failure instead of setting the flag.
    #[error("aborted by callback: {0}")]
    Aborted(StackError),

    /// No signal arrived within the wait budget.
    #[error("wait expired after {0:?}")]
    TimedOut(Duration),
}

/// Writer half handed to the callback for one cycle.
///
/// Cloneable so the callback closure can be invoked repeatedly, but the
/// cell transitions out of the unset state at most once per arming.
#[derive(Clone)]
pub struct FlagSetter {
    tx: Arc<watch::Sender<FlagState>>,
    claimed: Arc<AtomicBool>,
}

impl FlagSetter {
    /// Claim authority for this cycle.
    ///
    /// Returns true for exactly one caller per arming. Advertisement
    /// reports can still be in flight after a stop request, so the
    /// callback claims before acting and later deliveries become no-ops.
    pub fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::SeqCst)
    }

    /// Mark the cycle complete. Ignored unless the cell is still unset.
    pub fn set(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == FlagState::Unset {
                *state = FlagState::Set;
                true
            } else {
                false
            }
        })
    }

    /// Mark the cycle failed. Ignored unless the cell is still unset, so
    /// a late failure can never overwrite a completed cycle.
    pub fn abort(&self, err: StackError) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == FlagState::Unset {
                *state = FlagState::Aborted(err.clone());
                true
            } else {
                false
            }
        })
    }
}

/// Reader half owned by the role driver.
pub struct SignalFlag {
    tx: Arc<watch::Sender<FlagState>>,
    rx: watch::Receiver<FlagState>,
}

impl SignalFlag {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(FlagState::Unset);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Reset the cell to unset and hand out the writer for the next cycle.
    ///
    /// Must be called before the operation that will signal completion is
    /// started; the returned setter is the only writer for this cycle.
    pub fn arm(&mut self) -> FlagSetter {
        self.tx.send_replace(FlagState::Unset);
        FlagSetter {
            tx: Arc::clone(&self.tx),
            claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Await the signal for the current cycle.
    ///
    /// Wakes every `tick` so stalls are observable, and gives up after
    /// `budget`. A signal stored before this call is still observed (the
    /// current value is inspected first), so arm → start → wait cannot
    /// miss a fast callback.
    pub async fn wait(&mut self, tick: Duration, budget: Duration) -> Result<(), FlagError> {
        let deadline = Instant::now() + budget;
        loop {
            let state = self.rx.borrow_and_update().clone();
            match state {
                FlagState::Set => return Ok(()),
                FlagState::Aborted(err) => return Err(FlagError::Aborted(err)),
                FlagState::Unset => {}
            }
            if Instant::now() >= deadline {
                return Err(FlagError::TimedOut(budget));
            }
            match timeout(tick, self.rx.changed()).await {
                // Sender is co-owned by this struct, the channel cannot close
                Ok(_) => {}
                Err(_) => trace!("completion flag still unset, ticking"),
            }
        }
    }

    /// Whether the cell currently holds a set signal. Test observability.
    pub fn is_set(&self) -> bool {
        *self.rx.borrow() == FlagState::Set
    }
}

impl Default for SignalFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;

    const TICK: Duration = Duration::from_millis(5);
    const BUDGET: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn set_before_wait_is_not_missed() {
        let mut flag = SignalFlag::new();
        let setter = flag.arm();
        assert!(setter.set());
        flag.wait(TICK, BUDGET).await.unwrap();
        assert!(flag.is_set());
    }

    #[tokio::test]
    async fn set_is_idempotent_per_arm() {
        let mut flag = SignalFlag::new();
        let setter = flag.arm();
        assert!(setter.set());
        assert!(!setter.set());
        flag.wait(TICK, BUDGET).await.unwrap();
    }

    #[tokio::test]
    async fn claim_grants_authority_once() {
        let mut flag = SignalFlag::new();
        let setter = flag.arm();
        assert!(setter.claim());
        assert!(!setter.claim());
        assert!(!setter.clone().claim());
        // a fresh arming grants authority again
        let setter = flag.arm();
        assert!(setter.claim());
    }

    #[tokio::test]
    async fn abort_surfaces_stack_error() {
        let mut flag = SignalFlag::new();
        let setter = flag.arm();
        let err = StackError::new("bt_le_scan_stop", StatusCode::Already);
        assert!(setter.abort(err.clone()));
        let got = flag.wait(TICK, BUDGET).await.unwrap_err();
        assert_eq!(got, FlagError::Aborted(err));
        assert!(!flag.is_set());
    }

    #[tokio::test]
    async fn abort_after_set_is_ignored() {
        let mut flag = SignalFlag::new();
        let setter = flag.arm();
        assert!(setter.set());
        assert!(!setter.abort(StackError::new("bt_le_scan_stop", StatusCode::Already)));
        flag.wait(TICK, BUDGET).await.unwrap();
    }

    #[tokio::test]
    async fn arm_resets_a_previous_signal() {
        let mut flag = SignalFlag::new();
        let setter = flag.arm();
        setter.set();
        assert!(flag.is_set());
        let _setter = flag.arm();
        assert!(!flag.is_set());
        let got = flag
            .wait(TICK, Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(got, FlagError::TimedOut(_)));
    }

    #[tokio::test]
    async fn wait_observes_signal_from_another_task() {
        let mut flag = SignalFlag::new();
        let setter = flag.arm();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            setter.set();
        });
        flag.wait(TICK, BUDGET).await.unwrap();
    }
}
