use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Cancellation flag scoped to one dialogue turn.
///
/// Cloning shares the flag. Once raised it stays raised.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    token: CancellationToken,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that is also raised when `parent` is cancelled.
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    pub fn raise(&self) {
        self.token.cancel();
    }

    pub fn is_raised(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the signal is raised.
    pub fn raised(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
