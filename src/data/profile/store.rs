use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use super::{merge_record, Profile, ADMIN_PASSWORD, ADMIN_USERNAME, STUDENT_ID_KEY};
use crate::config::Config;
use crate::resp::problem::Problem;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Student ID already exists")]
    DuplicateStudentId(String),
    #[error("Username already taken")]
    DuplicateUsername(String),
    #[error("Profile not found")]
    NotFound(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid profile update")]
    InvalidPatch(#[source] serde_json::Error),
}

pub mod problem {
    use crate::resp::problem::Problem;
    use rocket::http::Status;

    #[inline]
    pub fn duplicate(error: impl ToString, key: &str, value: impl ToString) -> Problem {
        Problem::new(Status::BadRequest, error)
            .insert_str(key, value)
            .to_owned()
    }

    #[inline]
    pub fn not_found(error: impl ToString, student_id: impl ToString) -> Problem {
        Problem::new(Status::NotFound, error)
            .insert_str("studentId", student_id)
            .to_owned()
    }

    #[inline]
    pub fn bad_login(error: impl ToString) -> Problem {
        Problem::new(Status::Unauthorized, error)
    }

    #[inline]
    pub fn bad_patch(error: impl ToString, detail: impl ToString) -> Problem {
        Problem::new(Status::BadRequest, error)
            .detail(detail)
            .to_owned()
    }
}

impl From<StoreError> for Problem {
    fn from(e: StoreError) -> Self {
        let error = e.to_string();
        match e {
            StoreError::DuplicateStudentId(id) => problem::duplicate(error, "studentId", id),
            StoreError::DuplicateUsername(name) => problem::duplicate(error, "username", name),
            StoreError::NotFound(id) => problem::not_found(error, id),
            StoreError::InvalidCredentials => problem::bad_login(error),
            StoreError::InvalidPatch(source) => problem::bad_patch(error, source),
        }
    }
}

/// One element of the stored array.
///
/// Elements that don't read as a [`Profile`] are kept as they were found and
/// written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Profile(Profile),
    Unreadable(Value),
}

impl Record {
    pub fn student_id(&self) -> Option<&str> {
        match self {
            Record::Profile(p) => Some(&p.student_id),
            Record::Unreadable(value) => value.get(STUDENT_ID_KEY).and_then(Value::as_str),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Record::Profile(p) => Some(&p.username),
            Record::Unreadable(value) => value.get("username").and_then(Value::as_str),
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Record::Profile(p) => Some(p),
            Record::Unreadable(_) => None,
        }
    }

    fn merge(&self, patch: Map<String, Value>) -> Result<Profile, serde_json::Error> {
        match self {
            Record::Profile(p) => p.merge(patch),
            Record::Unreadable(value) => merge_record(value.clone(), patch),
        }
    }
}

impl From<Profile> for Record {
    fn from(profile: Profile) -> Self {
        Record::Profile(profile)
    }
}

/// Profile collection kept as one JSON array in a single file.
///
/// Each call loads the whole file, and mutations write the whole collection
/// back. The writer lock spans load to persist so mutations served by this
/// process apply one after another.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    admin_backdoor: bool,
    server_defaults: bool,
    writer: Mutex<()>,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> ProfileStore {
        ProfileStore {
            path: path.into(),
            admin_backdoor: true,
            server_defaults: false,
            writer: Mutex::new(()),
        }
    }

    pub fn from_config(c: &Config) -> ProfileStore {
        ProfileStore::new(&c.database_path)
            .with_admin_backdoor(c.admin_backdoor)
            .with_server_defaults(c.server_defaults)
    }

    pub fn with_admin_backdoor(mut self, enabled: bool) -> ProfileStore {
        self.admin_backdoor = enabled;
        self
    }

    pub fn with_server_defaults(mut self, enabled: bool) -> ProfileStore {
        self.server_defaults = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All profiles without their passwords.
    pub async fn list(&self) -> Vec<Profile> {
        self.load()
            .await
            .into_iter()
            .map(Profile::without_password)
            .collect()
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Profile, StoreError> {
        if self.admin_backdoor && username == ADMIN_USERNAME && password == ADMIN_PASSWORD {
            tracing::warn!("Administrator login through built-in credentials.");
            return Ok(Profile::administrator());
        }

        self.load()
            .await
            .into_iter()
            .find(|p| p.matches_credentials(username, password))
            .ok_or(StoreError::InvalidCredentials)
    }

    pub async fn create(&self, mut profile: Profile) -> Result<(), StoreError> {
        let _writer = self.writer.lock().await;
        let mut records = self.load_records().await;

        if records
            .iter()
            .any(|r| r.student_id() == Some(profile.student_id.as_str()))
        {
            return Err(StoreError::DuplicateStudentId(profile.student_id));
        }
        if records
            .iter()
            .any(|r| r.username() == Some(profile.username.as_str()))
        {
            return Err(StoreError::DuplicateUsername(profile.username));
        }

        if self.server_defaults {
            profile.fill_defaults(Utc::now());
        }

        tracing::info!("Creating profile '{}'", profile.student_id);
        records.push(profile.into());
        self.persist(&records).await;
        Ok(())
    }

    /// Shallow-merges `patch` into the stored record and returns the result.
    ///
    /// The merged username must stay unique.
    pub async fn update(
        &self,
        student_id: &str,
        patch: Map<String, Value>,
    ) -> Result<Profile, StoreError> {
        let _writer = self.writer.lock().await;
        let mut records = self.load_records().await;

        let index = records
            .iter()
            .position(|r| r.student_id() == Some(student_id))
            .ok_or_else(|| StoreError::NotFound(student_id.to_string()))?;

        let merged = records[index]
            .merge(patch)
            .map_err(StoreError::InvalidPatch)?;

        let taken = records
            .iter()
            .enumerate()
            .any(|(i, r)| i != index && r.username() == Some(merged.username.as_str()));
        if taken {
            return Err(StoreError::DuplicateUsername(merged.username));
        }

        records[index] = merged.clone().into();
        self.persist(&records).await;
        Ok(merged)
    }

    /// Removes the record and returns it.
    pub async fn delete(&self, student_id: &str) -> Result<Record, StoreError> {
        let _writer = self.writer.lock().await;
        let mut records = self.load_records().await;

        let index = records
            .iter()
            .position(|r| r.student_id() == Some(student_id))
            .ok_or_else(|| StoreError::NotFound(student_id.to_string()))?;
        let removed = records.remove(index);

        tracing::info!("Deleting profile '{}'", student_id);
        self.persist(&records).await;
        Ok(removed)
    }

    /// Every stored record that reads as a profile.
    pub async fn load(&self) -> Vec<Profile> {
        self.load_records()
            .await
            .into_iter()
            .filter_map(|r| match r {
                Record::Profile(p) => Some(p),
                Record::Unreadable(_) => None,
            })
            .collect()
    }

    /// Reads the whole collection. A missing file or one that isn't a JSON
    /// array is an empty one.
    pub async fn load_records(&self) -> Vec<Record> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return vec![],
            Err(e) => {
                tracing::error!("Error reading profiles from '{}': {}", self.path.display(), e);
                return vec![];
            }
        };

        let records: Vec<Record> = match serde_json::from_slice(&data) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!("Error parsing profiles in '{}': {}", self.path.display(), e);
                return vec![];
            }
        };

        for (i, record) in records.iter().enumerate() {
            if let Record::Unreadable(value) = record {
                tracing::warn!(
                    "Keeping unreadable record {} ({:?}) in '{}'",
                    i,
                    value.get(STUDENT_ID_KEY),
                    self.path.display()
                );
            }
        }
        records
    }

    /// Overwrites the file with `records`. Failures are logged, not returned.
    pub async fn persist(&self, records: &[Record]) {
        if let Err(e) = self.write(records).await {
            tracing::error!("Error writing profiles to '{}': {}", self.path.display(), e);
        }
    }

    async fn write(&self, records: &[Record]) -> Result<(), crate::error::BackendError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let data = serde_json::to_vec_pretty(records)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}
