use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::client::export::{self, ExportRow};
use crate::data::profile::Profile;

pub static ACTIVE_PROFILE_KEY: &str = "circuitly_active_profile";

/// String key-value storage that outlives a session.
pub trait LocalStorage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str);
    fn remove_item(&mut self, key: &str);
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage(HashMap<String, String>);

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) {
        self.0.insert(key.to_string(), value.to_string());
    }

    fn remove_item(&mut self, key: &str) {
        self.0.remove(key);
    }
}

/// Storage kept as a JSON object in a file, rewritten on every change.
///
/// I/O failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> FileStorage {
        let path = path.into();
        let items = match std::fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable storage '{}': {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        FileStorage { path, items }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) {
        let result = self
            .path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|_| {
                let data = serde_json::to_vec_pretty(&self.items)?;
                std::fs::write(&self.path, data)
            });

        if let Err(e) = result {
            tracing::error!("Unable to write storage '{}': {}", self.path.display(), e);
        }
    }
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
        self.save();
    }

    fn remove_item(&mut self, key: &str) {
        if self.items.remove(key).is_some() {
            self.save();
        }
    }
}

/// Client-side view of the server: cached profiles and the active one.
#[derive(Debug, Clone, Default)]
pub struct Session<S: LocalStorage = MemoryStorage> {
    profiles: Vec<Profile>,
    active_profile_id: Option<String>,
    storage: S,
}

impl<S: LocalStorage> Session<S> {
    pub fn new(storage: S) -> Session<S> {
        Session {
            profiles: vec![],
            active_profile_id: None,
            storage,
        }
    }

    /// Picks up the active profile id left in storage.
    pub fn restore_active(&mut self) {
        if let Some(active) = self.storage.get_item(ACTIVE_PROFILE_KEY) {
            self.active_profile_id = Some(active);
        }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, student_id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.student_id == student_id)
    }

    pub fn replace_profiles(&mut self, profiles: Vec<Profile>) {
        self.profiles = profiles;
    }

    pub fn active_profile_id(&self) -> Option<&str> {
        self.active_profile_id.as_deref()
    }

    /// Active profile as of the last refresh.
    pub fn get_active(&self) -> Option<&Profile> {
        self.active_profile_id
            .as_deref()
            .and_then(|id| self.profile(id))
    }

    pub fn set_active(&mut self, student_id: impl ToString) {
        let student_id = student_id.to_string();
        self.storage.set_item(ACTIVE_PROFILE_KEY, &student_id);
        self.active_profile_id = Some(student_id);
    }

    pub fn clear_active(&mut self) {
        self.active_profile_id = None;
        self.storage.remove_item(ACTIVE_PROFILE_KEY);
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn export(&self) -> Vec<ExportRow> {
        export::rows(&self.profiles)
    }
}
