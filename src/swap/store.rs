//! Serialized action dispatch over a single `SwapSession`
//!
//! The store owns the session behind a `tokio::sync::watch` channel. Every
//! mutation goes through `dispatch` / `dispatch_if`, which apply actions
//! atomically and in submission order; readers take cheap snapshots or
//! subscribe to change notifications.

use tokio::sync::watch;

use super::session::{SwapAction, SwapSession};

pub struct SwapStore {
    state: watch::Sender<SwapSession>,
}

impl SwapStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SwapSession::initial());
        Self { state }
    }

    /// Clone of the current session
    pub fn snapshot(&self) -> SwapSession {
        self.state.borrow().clone()
    }

    /// Receiver notified after every dispatch that changed the session
    pub fn subscribe(&self) -> watch::Receiver<SwapSession> {
        self.state.subscribe()
    }

    pub fn dispatch(&self, action: SwapAction) {
        self.dispatch_all([action]);
    }

    /// Apply several actions as one atomic update
    pub fn dispatch_all(&self, actions: impl IntoIterator<Item = SwapAction>) {
        self.dispatch_if(|_| true, actions);
    }

    /// Apply `actions` only if `guard` accepts the session as it is at
    /// commit time. Check and apply happen under the same lock, so nothing
    /// can slip in between. Returns whether the actions were applied.
    pub fn dispatch_if(
        &self,
        guard: impl FnOnce(&SwapSession) -> bool,
        actions: impl IntoIterator<Item = SwapAction>,
    ) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|session| {
            if !guard(session) {
                return false;
            }
            let before = session.clone();
            let mut next = std::mem::take(session);
            for action in actions {
                tracing::debug!("dispatch {}", action.name());
                next = next.reduce(action);
            }
            *session = next;
            applied = true;
            *session != before
        });
        applied
    }
}

impl Default for SwapStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::session::{Amounts, FlowState};

    #[test]
    fn test_dispatch_updates_snapshot() {
        let store = SwapStore::new();
        store.dispatch(SwapAction::NextStep);
        assert_eq!(store.snapshot().step, FlowState::Configure);
        store.dispatch(SwapAction::TogglePrivacy(false));
        assert!(!store.snapshot().privacy_enabled);
    }

    #[test]
    fn test_dispatch_if_rejects() {
        let store = SwapStore::new();
        store.dispatch(SwapAction::SetAmounts(Amounts::input("5")));

        let applied = store.dispatch_if(
            |s| s.amount_in_text() == "4",
            [SwapAction::SetStep(FlowState::Review)],
        );
        assert!(!applied);
        assert_eq!(store.snapshot().step, FlowState::Connect);

        let applied = store.dispatch_if(
            |s| s.amount_in_text() == "5",
            [SwapAction::SetStep(FlowState::Review), SwapAction::TogglePrivacy(false)],
        );
        assert!(applied);
        let s = store.snapshot();
        assert_eq!(s.step, FlowState::Review);
        assert!(!s.privacy_enabled);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = SwapStore::new();
        let mut rx = store.subscribe();
        store.dispatch(SwapAction::NextStep);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().step, FlowState::Configure);
    }

    #[test]
    fn test_reset_through_store() {
        let store = SwapStore::new();
        store.dispatch_all([
            SwapAction::NextStep,
            SwapAction::SetAmounts(Amounts::input("1")),
            SwapAction::TogglePrivacy(false),
        ]);
        store.dispatch(SwapAction::Reset);
        assert_eq!(store.snapshot(), SwapSession::initial());
    }
}
