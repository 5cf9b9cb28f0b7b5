use tokio::sync::watch;

use crate::TurnState;

/// Published after every state change of the turn machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListeningSnapshot {
    pub state: TurnState,
    /// How many times the machine has left IDLE since startup.
    pub activations: u64,
}

/// Read-only subscription to the turn machine's state.
///
/// `watch` keeps only the latest value, so a quick ONLINE → OFFLINE → IDLE
/// sequence may be observed as a single IDLE. The `activations` counter
/// still records that the user spoke, which is what barge-in detection
/// relies on.
#[derive(Clone)]
pub struct ListeningWatch {
    rx: watch::Receiver<ListeningSnapshot>,
}

impl ListeningWatch {
    pub(crate) fn new(rx: watch::Receiver<ListeningSnapshot>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> ListeningSnapshot {
        *self.rx.borrow()
    }

    /// Wait until the machine has left IDLE more than `since` times.
    ///
    /// Returns `None` if the machine is gone.
    pub async fn left_idle_after(&mut self, since: u64) -> Option<ListeningSnapshot> {
        self.rx
            .wait_for(|snapshot| snapshot.activations > since)
            .await
            .ok()
            .map(|snapshot| *snapshot)
    }

    /// Wait for the next published snapshot.
    pub async fn changed(&mut self) -> Option<ListeningSnapshot> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}
