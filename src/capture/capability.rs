//! Capture capability: the opaque, externally issued permission to mirror
//! the screen.
//!
//! The issuer (the host's consent flow) keeps a [`Revoker`] and may withdraw
//! the grant at any time. Whoever owns the capability for a session registers
//! a single revocation listener; the listener fires at most once.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

type Listener = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct RevocationState {
    revoked: bool,
    listener: Option<Listener>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<RevocationState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RevocationState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A user-granted permission to mirror the screen.
///
/// `token` identifies the grant; `payload` carries whatever the display
/// backend needs to establish the mirrored feed. Both are opaque to the core.
pub struct Capability {
    token: String,
    payload: Vec<u8>,
    shared: Arc<Shared>,
}

impl Capability {
    pub fn new(token: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            token: token.into(),
            payload,
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Handle the issuer keeps to withdraw this grant later.
    pub fn revoker(&self) -> Revoker {
        Revoker {
            shared: Arc::clone(&self.shared),
        }
    }

    /// A capability is usable while it carries a token and has not been
    /// revoked or stopped.
    pub fn is_valid(&self) -> bool {
        !self.token.is_empty() && !self.shared.lock().revoked
    }

    /// Register the session's revocation listener.
    ///
    /// Fails (returning the listener) if the capability is already revoked;
    /// the listener is never invoked from inside this call.
    pub(crate) fn on_revoked(&self, listener: Listener) -> Result<(), Listener> {
        let mut state = self.shared.lock();
        if state.revoked {
            return Err(listener);
        }
        state.listener = Some(listener);
        Ok(())
    }

    /// End the grant from the owning side. Detaches the listener first so a
    /// session stopping itself is not reported back as an external revocation.
    pub(crate) fn stop(&self) {
        let mut state = self.shared.lock();
        state.listener = None;
        state.revoked = true;
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("token", &self.token)
            .field("payload_len", &self.payload.len())
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Issuer-side handle for withdrawing a [`Capability`].
#[derive(Clone)]
pub struct Revoker {
    shared: Arc<Shared>,
}

impl Revoker {
    /// Withdraw the grant. The registered listener (if any) runs on the
    /// calling thread, after the internal lock is released. Repeated calls
    /// are no-ops.
    pub fn revoke(&self) {
        let listener = {
            let mut state = self.shared.lock();
            if state.revoked {
                return;
            }
            state.revoked = true;
            state.listener.take()
        };

        if let Some(listener) = listener {
            listener();
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.shared.lock().revoked
    }
}

impl fmt::Debug for Revoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Revoker")
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn revoke_fires_listener_once() {
        let cap = Capability::new("grant-1", vec![1, 2, 3]);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        assert!(cap
            .on_revoked(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .is_ok());

        let revoker = cap.revoker();
        revoker.revoke();
        revoker.revoke();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!cap.is_valid());
    }

    #[test]
    fn registering_on_revoked_capability_fails() {
        let cap = Capability::new("grant-2", Vec::new());
        cap.revoker().revoke();
        assert!(cap.on_revoked(Box::new(|| {})).is_err());
    }

    #[test]
    fn stop_detaches_listener() {
        let cap = Capability::new("grant-3", Vec::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let _ = cap.on_revoked(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        cap.stop();
        cap.revoker().revoke();

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!cap.is_valid());
    }

    #[test]
    fn empty_token_is_invalid() {
        assert!(!Capability::new("", vec![9]).is_valid());
    }
}
