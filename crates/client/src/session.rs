//! Persisted authentication state: the session token and the cached user.
//!
//! An [`AuthStore`] is constructed explicitly over a [`StateStorage`] and a
//! [`Clock`]. It hydrates from storage on first access and is torn down only
//! through [`AuthStore::clear`]; expiry is evaluated on demand, never swept.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use common::api::{TokenGrant, User};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::ClockRef;
use crate::error::{CirisError, Result};
use crate::storage::{AUTH_KEY, StorageRef, load_json, save_json};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub user_id: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.expires_in).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(secs)
            .and_then(|lifetime| self.created_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthRecord {
    token: AuthToken,
    #[serde(default)]
    user: Option<User>,
}

#[derive(Debug, Default)]
struct SessionState {
    hydrated: bool,
    record: Option<AuthRecord>,
}

pub struct AuthStore {
    storage: StorageRef,
    clock: ClockRef,
    state: Mutex<SessionState>,
}

impl AuthStore {
    pub fn new(storage: StorageRef, clock: ClockRef) -> Self {
        Self {
            storage,
            clock,
            state: Mutex::new(SessionState::default()),
        }
    }

    /// Reload token and user from storage, replacing in-memory state.
    pub fn hydrate(&self) -> Result<()> {
        let record = load_json::<AuthRecord>(self.storage.as_ref(), AUTH_KEY)?;
        let mut state = self.lock();
        state.record = record;
        state.hydrated = true;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hydrated(&self) -> MutexGuard<'_, SessionState> {
        let mut state = self.lock();
        if !state.hydrated {
            match load_json::<AuthRecord>(self.storage.as_ref(), AUTH_KEY) {
                Ok(record) => state.record = record,
                Err(err) => warn!(%err, "could not hydrate session; starting signed out"),
            }
            state.hydrated = true;
        }
        state
    }

    /// Store a new token grant. `created_at` is always stamped from the clock.
    /// Any cached user is dropped; it must be re-fetched for the new token.
    pub fn save_token(&self, grant: TokenGrant) -> Result<AuthToken> {
        let token = AuthToken {
            access_token: grant.access_token,
            token_type: grant.token_type,
            expires_in: grant.expires_in,
            user_id: grant.user_id,
            role: grant.role,
            created_at: self.clock.now(),
        };
        let record = AuthRecord {
            token: token.clone(),
            user: None,
        };

        let mut state = self.hydrated();
        save_json(self.storage.as_ref(), AUTH_KEY, &record)?;
        state.record = Some(record);
        debug!(user_id = %token.user_id, expires_in = token.expires_in, "session token saved");
        Ok(token)
    }

    /// The stored token when it is still valid.
    pub fn token(&self) -> Option<AuthToken> {
        let now = self.clock.now();
        self.stored_token().filter(|token| token.is_valid_at(now))
    }

    /// The stored token regardless of expiry; used to request a refresh.
    pub fn stored_token(&self) -> Option<AuthToken> {
        self.hydrated()
            .record
            .as_ref()
            .map(|record| record.token.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.token().map(|token| token.access_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Cache the profile for the current token.
    pub fn save_user(&self, user: User) -> Result<()> {
        let mut state = self.hydrated();
        let Some(current) = state.record.as_ref() else {
            return Err(CirisError::auth(
                "cannot cache a user without an active session",
            ));
        };
        let record = AuthRecord {
            token: current.token.clone(),
            user: Some(user),
        };
        save_json(self.storage.as_ref(), AUTH_KEY, &record)?;
        state.record = Some(record);
        Ok(())
    }

    /// Cache `user` only while `access_token` is still the stored token.
    /// Returns `false` when the session moved on in the meantime.
    pub fn save_user_for(&self, access_token: &str, user: User) -> Result<bool> {
        let mut state = self.hydrated();
        let Some(current) = state.record.as_ref() else {
            return Ok(false);
        };
        if current.token.access_token != access_token {
            debug!("session changed while fetching the user; not caching it");
            return Ok(false);
        }
        let record = AuthRecord {
            token: current.token.clone(),
            user: Some(user),
        };
        save_json(self.storage.as_ref(), AUTH_KEY, &record)?;
        state.record = Some(record);
        Ok(true)
    }

    pub fn user(&self) -> Option<User> {
        self.hydrated()
            .record
            .as_ref()
            .and_then(|record| record.user.clone())
    }

    /// Remove token and cached user in one storage operation.
    pub fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        self.storage.remove(AUTH_KEY)?;
        state.record = None;
        state.hydrated = true;
        debug!("session cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::storage::{FileStorage, MemoryStorage, StateStorage};
    use crate::test_support::{grant, user};
    use std::sync::Arc;
    use std::time::Duration;

    fn store_with_clock() -> (AuthStore, ManualClock, Arc<MemoryStorage>) {
        let clock = ManualClock::default();
        let storage = Arc::new(MemoryStorage::new());
        let store = AuthStore::new(storage.clone(), Arc::new(clock.clone()));
        (store, clock, storage)
    }

    #[test]
    fn authenticated_until_expiry_then_not() {
        let (store, clock, _) = store_with_clock();
        assert!(!store.is_authenticated());

        store.save_token(grant("tok-1", 3600)).expect("save");
        assert!(store.is_authenticated());
        assert_eq!(store.access_token().as_deref(), Some("tok-1"));

        clock.advance(Duration::from_secs(3599));
        assert!(store.is_authenticated());

        clock.advance(Duration::from_secs(1));
        assert!(!store.is_authenticated(), "now == created_at + expires_in is expired");
        assert!(store.access_token().is_none());
        assert_eq!(
            store.stored_token().map(|t| t.access_token).as_deref(),
            Some("tok-1"),
            "expired token is kept for refresh"
        );
    }

    #[test]
    fn validity_matches_expiry_formula_across_lifetimes() {
        let (store, clock, _) = store_with_clock();
        for expires_in in [0_u64, 1, 60, 3600, 86_400] {
            let token = store.save_token(grant("tok", expires_in)).expect("save");
            for offset in [0_u64, expires_in.saturating_sub(1), expires_in, expires_in + 1] {
                let now = token.created_at + chrono::Duration::seconds(offset as i64);
                clock.set(now);
                let expected = now < token.created_at + chrono::Duration::seconds(expires_in as i64);
                assert_eq!(store.is_authenticated(), expected, "expires_in={expires_in} offset={offset}");
            }
        }
    }

    #[test]
    fn save_token_stamps_created_at_from_clock() {
        let (store, clock, _) = store_with_clock();
        let before = clock.now();
        let token = store.save_token(grant("tok", 60)).expect("save");
        assert_eq!(token.created_at, before);

        clock.advance(Duration::from_secs(30));
        let token = store.save_token(grant("tok-2", 60)).expect("save");
        assert_eq!(token.created_at, before + chrono::Duration::seconds(30));
    }

    #[test]
    fn save_token_drops_cached_user() {
        let (store, _, _) = store_with_clock();
        store.save_token(grant("tok-1", 60)).expect("save");
        store.save_user(user("u1", "admin")).expect("user");
        assert_eq!(store.user().map(|u| u.username).as_deref(), Some("admin"));

        store.save_token(grant("tok-2", 60)).expect("save");
        assert!(store.user().is_none());
    }

    #[test]
    fn user_fetched_for_a_replaced_token_is_not_cached() {
        let (store, _, _) = store_with_clock();
        store.save_token(grant("tok-old", 60)).expect("save");
        store.save_token(grant("tok-new", 60)).expect("save");

        let cached = store.save_user_for("tok-old", user("u1", "admin")).expect("save user");
        assert!(!cached);
        assert!(store.user().is_none());

        let cached = store.save_user_for("tok-new", user("u1", "admin")).expect("save user");
        assert!(cached);
        assert_eq!(store.user().map(|u| u.username).as_deref(), Some("admin"));
    }

    #[test]
    fn save_user_requires_a_session() {
        let (store, _, _) = store_with_clock();
        let err = store.save_user(user("u1", "admin")).expect_err("no session");
        assert!(err.is_auth());
    }

    #[test]
    fn clear_removes_token_and_user_together() {
        let (store, _, storage) = store_with_clock();
        store.save_token(grant("tok", 60)).expect("save");
        store.save_user(user("u1", "admin")).expect("user");
        assert!(storage.get(AUTH_KEY).expect("get").is_some());

        store.clear().expect("clear");
        assert!(store.stored_token().is_none());
        assert!(store.user().is_none());
        assert!(storage.get(AUTH_KEY).expect("get").is_none());
    }

    #[test]
    fn hydrates_lazily_from_file_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let clock = ManualClock::default();
        let first = AuthStore::new(
            Arc::new(FileStorage::new(dir.path())),
            Arc::new(clock.clone()),
        );
        first.save_token(grant("persisted", 600)).expect("save");
        first.save_user(user("u1", "admin")).expect("user");

        let second = AuthStore::new(Arc::new(FileStorage::new(dir.path())), Arc::new(clock));
        assert!(second.is_authenticated());
        assert_eq!(second.access_token().as_deref(), Some("persisted"));
        assert_eq!(second.user().map(|u| u.user_id).as_deref(), Some("u1"));
    }

    #[test]
    fn corrupt_storage_reads_as_signed_out() {
        let (store, _, storage) = store_with_clock();
        storage.set(AUTH_KEY, "{not json").expect("set");
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());

        let other = AuthStore::new(storage, Arc::new(ManualClock::default()));
        assert!(other.hydrate().is_err(), "explicit hydrate surfaces corruption");
    }
}
