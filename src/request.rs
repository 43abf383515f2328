use dashmap::DashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Tracks in-flight requests so that long-running handlers can be cancelled
/// cooperatively. The transport layer aborts the response future on
/// `$/cancelRequest`; the registry propagates that into any work the handler
/// spawned off the request path.
#[derive(Default)]
pub struct RequestRegistry {
    active: DashMap<String, CancellationToken>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request and returns a guard that unregisters (and
    /// cancels) it when the handler finishes or its future is dropped.
    pub fn register(self: &Arc<Self>, id: impl Into<String>) -> RequestGuard {
        let id = id.into();
        let token = CancellationToken::new();
        self.active.insert(id.clone(), token.clone());
        RequestGuard {
            registry: self.clone(),
            id,
            token,
        }
    }

    /// Cancels a live request. Returns false when the id is unknown or the
    /// request already completed.
    pub fn cancel(&self, id: &str) -> bool {
        match self.active.remove(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn unregister(&self, id: &str) {
        self.active.remove(id);
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

pub struct RequestGuard {
    registry: Arc<RequestRegistry>,
    id: String,
    token: CancellationToken,
}

impl RequestGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        // A dropped handler future must also stop any spawned work.
        self.token.cancel();
        self.registry.unregister(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_live_request() {
        let registry = Arc::new(RequestRegistry::new());
        let guard = registry.register("42");

        assert!(registry.cancel("42"));
        assert!(guard.is_cancelled());
        assert!(registry.is_empty());
    }

    #[test]
    fn cancel_unknown_request() {
        let registry = Arc::new(RequestRegistry::new());
        assert!(!registry.cancel("missing"));
    }

    #[test]
    fn guard_drop_unregisters() {
        let registry = Arc::new(RequestRegistry::new());
        let token = {
            let guard = registry.register("7");
            assert_eq!(registry.len(), 1);
            guard.token()
        };
        assert!(registry.is_empty());
        assert!(token.is_cancelled());
        assert!(!registry.cancel("7"));
    }
}
