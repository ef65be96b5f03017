use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{CirisError, Result};

/// Record holding the session token and cached user.
pub const AUTH_KEY: &str = "auth";
/// Record holding the selected agent id/name.
pub const SELECTED_AGENT_KEY: &str = "selected_agent";

/// Persistent key/value storage for client state.
///
/// Each `set` must replace the stored value in a single atomic write.
pub trait StateStorage: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

pub type StorageRef = Arc<dyn StateStorage>;

pub(crate) fn load_json<T: DeserializeOwned>(storage: &dyn StateStorage, key: &str) -> Result<Option<T>> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| CirisError::storage(format!("corrupt '{key}' record: {err}")))
}

pub(crate) fn save_json<T: Serialize>(storage: &dyn StateStorage, key: &str, value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CirisError::storage(format!("encode '{key}' record: {err}")))?;
    storage.set(key, &rendered)
}

/// One private JSON file per key under a state directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$XDG_STATE_HOME/ciris`, falling back to `$HOME/.local/state/ciris`.
    pub fn default_dir() -> Result<PathBuf> {
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME")
            && !xdg.trim().is_empty()
        {
            return Ok(PathBuf::from(xdg).join("ciris"));
        }

        let home = std::env::var("HOME").map(PathBuf::from).map_err(|_| {
            CirisError::config("HOME is not set and XDG_STATE_HOME is not set")
        })?;
        Ok(home.join(".local").join("state").join("ciris"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        ensure_private_file(&path)?;
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|err| io_error("read", &path, err))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        ensure_private_dir(&self.dir)?;
        let path = self.path(key);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|err| io_error("create temp file in", &self.dir, err))?;
        set_private_file_perms(tmp.path())?;
        tmp.write_all(value.as_bytes())
            .map_err(|err| io_error("write", &path, err))?;
        tmp.flush().map_err(|err| io_error("flush", &path, err))?;
        tmp.persist(&path)
            .map_err(|err| io_error("persist", &path, err.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_error("remove", &path, err)),
        }
    }
}

/// Process-local storage; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

fn io_error(action: &str, path: &Path, err: std::io::Error) -> CirisError {
    CirisError::storage(format!("{action} {}: {err}", path.display()))
}

fn ensure_private_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|err| io_error("create", path, err))?;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))
            .map_err(|err| io_error("chmod", path, err))?;
    }
    Ok(())
}

fn set_private_file_perms(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|err| io_error("chmod", path, err))?;
    }
    Ok(())
}

fn ensure_private_file(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path)
            .map_err(|err| io_error("stat", path, err))?
            .permissions()
            .mode()
            & 0o777;
        if mode & 0o077 != 0 {
            return Err(CirisError::storage(format!(
                "state file is too permissive (mode {:o}); run: chmod 600 {}",
                mode,
                path.display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        agent_id: String,
    }

    #[test]
    fn file_storage_roundtrips_with_private_perms() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("state"));

        assert!(storage.get(AUTH_KEY).expect("get").is_none());
        storage.set(AUTH_KEY, "{\"a\":1}").expect("set");
        assert_eq!(storage.get(AUTH_KEY).expect("get").as_deref(), Some("{\"a\":1}"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(storage.path(AUTH_KEY))
                .expect("metadata")
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(mode, 0o600);
            let dir_mode = fs::metadata(storage.dir())
                .expect("metadata")
                .permissions()
                .mode()
                & 0o777;
            assert_eq!(dir_mode, 0o700);
        }
    }

    #[test]
    fn file_storage_set_replaces_previous_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());
        storage.set(SELECTED_AGENT_KEY, "first").expect("set");
        storage.set(SELECTED_AGENT_KEY, "second").expect("set");
        assert_eq!(
            storage.get(SELECTED_AGENT_KEY).expect("get").as_deref(),
            Some("second")
        );

        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("read_dir")
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name() != "selected_agent.json")
            .collect();
        assert!(leftovers.is_empty(), "temp files must not linger");
    }

    #[test]
    fn file_storage_remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());
        storage.set(AUTH_KEY, "x").expect("set");
        storage.remove(AUTH_KEY).expect("remove");
        storage.remove(AUTH_KEY).expect("remove again");
        assert!(storage.get(AUTH_KEY).expect("get").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_storage_rejects_permissive_files() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path());
        let path = storage.path(AUTH_KEY);
        fs::write(&path, "{}").expect("write");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).expect("chmod");

        let err = storage.get(AUTH_KEY).expect_err("should fail");
        assert!(err.to_string().contains("too permissive"));
    }

    #[test]
    fn json_helpers_report_corrupt_records() {
        let storage = MemoryStorage::new();
        save_json(
            &storage,
            SELECTED_AGENT_KEY,
            &Record {
                agent_id: "a1".into(),
            },
        )
        .expect("save");
        let loaded: Option<Record> = load_json(&storage, SELECTED_AGENT_KEY).expect("load");
        assert_eq!(loaded.map(|r| r.agent_id).as_deref(), Some("a1"));

        storage.set(SELECTED_AGENT_KEY, "not json").expect("set");
        let err = load_json::<Record>(&storage, SELECTED_AGENT_KEY).expect_err("corrupt");
        assert!(err.to_string().contains("corrupt 'selected_agent' record"));
    }

    #[test]
    fn default_dir_prefers_xdg_state_home() {
        let _guard = crate::test_support::ENV_LOCK.lock().expect("lock");
        let dir = tempfile::tempdir().expect("tempdir");
        // SAFETY: Tests hold ENV_LOCK to serialize env mutations.
        unsafe {
            std::env::set_var("XDG_STATE_HOME", dir.path());
        }
        let resolved = FileStorage::default_dir().expect("dir");
        assert_eq!(resolved, dir.path().join("ciris"));
        // SAFETY: Tests hold ENV_LOCK to serialize env mutations.
        unsafe {
            std::env::remove_var("XDG_STATE_HOME");
        }
    }
}
