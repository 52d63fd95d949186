// Round-robin credential pool
// Author: kelexine (https://github.com/kelexine)

use super::{Credential, Session};
use crate::error::{GemflowError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
struct PoolState {
    credentials: Vec<Credential>,
    index: usize,
}

/// Holds the API keys used to authorize requests and hands them out in
/// round-robin order.
///
/// The rotation index read-and-advance happens inside a single
/// `parking_lot::Mutex` critical section that never awaits, so concurrent
/// callers can never observe the same index before either advances it.
/// Cloning is cheap and shares the same pool.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    state: Arc<Mutex<PoolState>>,
}

impl CredentialPool {
    /// Create a pool from at least one credential.
    pub fn new<I, C>(credentials: I) -> Result<Self>
    where
        I: IntoIterator<Item = C>,
        C: Into<Credential>,
    {
        let credentials: Vec<Credential> = credentials.into_iter().map(Into::into).collect();
        if credentials.is_empty() {
            return Err(GemflowError::Config(
                "credential pool requires at least one API key".to_string(),
            ));
        }

        info!("Credential pool initialized with {} key(s)", credentials.len());

        Ok(Self {
            state: Arc::new(Mutex::new(PoolState {
                credentials,
                index: 0,
            })),
        })
    }

    /// Return the credential at the current rotation index and advance.
    pub fn next(&self) -> Credential {
        let mut state = self.state.lock();
        let len = state.credentials.len();
        let position = state.index % len;
        state.index = (position + 1) % len;
        let credential = state.credentials[position].clone();
        drop(state);

        crate::metrics::record_credential_rotation();
        debug!("Selected credential {} (slot {})", credential, position);
        credential
    }

    /// Credential at `index`, or `None` when out of range.
    pub fn at(&self, index: usize) -> Option<Credential> {
        self.state.lock().credentials.get(index).cloned()
    }

    /// Append credentials without resetting the rotation index.
    pub fn add<I, C>(&self, credentials: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<Credential>,
    {
        let mut state = self.state.lock();
        let before = state.credentials.len();
        state.credentials.extend(credentials.into_iter().map(Into::into));
        info!(
            "Added {} credential(s) to pool (now {})",
            state.credentials.len() - before,
            state.credentials.len()
        );
    }

    /// Remove the credential at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range or if this is the last credential;
    /// both are API misuse. Use [`CredentialPool::try_remove`] to check instead.
    pub fn remove(&self, index: usize) -> Credential {
        match self.try_remove(index) {
            Ok(credential) => credential,
            Err(e) => panic!("CredentialPool::remove precondition violated: {}", e),
        }
    }

    /// Fallible variant of [`CredentialPool::remove`].
    pub fn try_remove(&self, index: usize) -> Result<Credential> {
        let mut state = self.state.lock();
        let len = state.credentials.len();
        if index >= len {
            return Err(GemflowError::InvalidRequest(format!(
                "credential index {} out of range (pool size {})",
                index, len
            )));
        }
        if len == 1 {
            return Err(GemflowError::InvalidRequest(
                "cannot remove the last credential from the pool".to_string(),
            ));
        }

        let removed = state.credentials.remove(index);
        // Keep the rotation pointing at the same successor credential.
        if index < state.index {
            state.index -= 1;
        }
        if state.index >= state.credentials.len() {
            state.index = 0;
        }

        info!("Removed credential {} from pool", removed);
        Ok(removed)
    }

    /// Reset the rotation to the first credential.
    pub fn reset_rotation(&self) {
        self.state.lock().index = 0;
    }

    /// Pin the next credential to a new [`Session`].
    pub fn pin(&self) -> Session {
        let session = Session::new(self.next());
        debug!(
            "Pinned credential {} to session {}",
            session.credential(),
            session.id()
        );
        session
    }

    pub fn len(&self) -> usize {
        self.state.lock().credentials.len()
    }

    /// Always false: the pool never drops below one credential.
    pub fn is_empty(&self) -> bool {
        self.state.lock().credentials.is_empty()
    }

    /// Current rotation index.
    pub fn current_index(&self) -> usize {
        self.state.lock().index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn pool(keys: &[&str]) -> CredentialPool {
        CredentialPool::new(keys.iter().copied()).unwrap()
    }

    #[test]
    fn test_rotation_is_fair() {
        let pool = pool(&["key-a", "key-b", "key-c"]);
        let seen: Vec<String> = (0..3).map(|_| pool.next().expose().to_string()).collect();
        assert_eq!(seen, vec!["key-a", "key-b", "key-c"]);
        assert_eq!(pool.next().expose(), "key-a");
    }

    #[test]
    fn test_rotation_starts_at_current_index() {
        let pool = pool(&["key-a", "key-b", "key-c"]);
        pool.next();
        let seen: Vec<String> = (0..3).map(|_| pool.next().expose().to_string()).collect();
        assert_eq!(seen, vec!["key-b", "key-c", "key-a"]);
    }

    #[test]
    fn test_empty_pool_rejected() {
        assert!(CredentialPool::new(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_at_out_of_range_is_none() {
        let pool = pool(&["key-a"]);
        assert!(pool.at(0).is_some());
        assert!(pool.at(1).is_none());
    }

    #[test]
    fn test_add_keeps_rotation_index() {
        let pool = pool(&["key-a", "key-b"]);
        pool.next();
        pool.add(["key-c"]);
        assert_eq!(pool.current_index(), 1);
        assert_eq!(pool.next().expose(), "key-b");
        assert_eq!(pool.next().expose(), "key-c");
    }

    #[test]
    fn test_remove_last_credential_fails() {
        let pool = pool(&["only"]);
        assert!(pool.try_remove(0).is_err());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    #[should_panic(expected = "precondition violated")]
    fn test_remove_last_credential_panics() {
        pool(&["only"]).remove(0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_remove_invalid_index_panics() {
        pool(&["key-a", "key-b"]).remove(5);
    }

    #[test]
    fn test_remove_adjusts_rotation() {
        let pool = pool(&["key-a", "key-b", "key-c"]);
        pool.next();
        pool.next();
        // index now points at key-c
        pool.remove(0);
        assert_eq!(pool.next().expose(), "key-c");
        assert_eq!(pool.next().expose(), "key-b");
    }

    #[test]
    fn test_reset_rotation() {
        let pool = pool(&["key-a", "key-b"]);
        pool.next();
        pool.reset_rotation();
        assert_eq!(pool.next().expose(), "key-a");
    }

    #[test]
    fn test_pin_uses_next_credential() {
        let pool = pool(&["key-a", "key-b"]);
        let first = pool.pin();
        let second = pool.pin();
        assert_eq!(first.credential().expose(), "key-a");
        assert_eq!(second.credential().expose(), "key-b");
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_concurrent_next_cycles_all_credentials() {
        let keys: Vec<String> = (0..8).map(|i| format!("key-{}", i)).collect();
        let pool = CredentialPool::new(keys.clone()).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || pool.next().expose().to_string())
            })
            .collect();

        let seen: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(seen.len(), 8);
    }
}
