use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::role::Role;

pub mod store;

pub static STUDENT_ID_KEY: &str = "studentId";

pub static DEFAULT_XP: i64 = 0;
pub static DEFAULT_HEARTS: i64 = 5;

pub static ADMIN_STUDENT_ID: &str = "ADMIN";
pub static ADMIN_USERNAME: &str = "admin";
pub static ADMIN_PASSWORD: &str = "admin";
pub static ADMIN_HEARTS: i64 = 999;

/// Accumulated work on a single topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TopicStats {
    #[serde(default)]
    pub xp: i64,
    /// Seconds spent on the topic.
    #[serde(default)]
    pub time: i64,
}

impl TopicStats {
    pub fn add(&mut self, xp: i64, time: i64) {
        self.xp = self.xp.saturating_add(xp);
        self.time = self.time.saturating_add(time);
    }
}

/// A learner's stored record.
///
/// Only `studentId` and `username` are required. Every other field is kept
/// exactly as the creator sent it and is omitted from JSON when absent. Keys
/// without a field of their own are carried in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub student_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(format = Password)]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hearts: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub topic_progress: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<String, TopicStats>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

/// Top-level fields a client may replace through an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hearts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub topic_progress: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<String, TopicStats>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_group: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginData {
    pub username: String,
    #[schema(format = Password)]
    pub password: String,
}

impl std::fmt::Debug for LoginData {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoginData:{}", self.username)
    }
}

impl Profile {
    pub fn new(
        student_id: impl ToString,
        username: impl ToString,
        password: impl ToString,
    ) -> Profile {
        Profile {
            student_id: student_id.to_string(),
            username: username.to_string(),
            password: Some(password.to_string()),
            ..Default::default()
        }
    }

    /// The login answered for `admin`/`admin`. Never stored.
    pub fn administrator() -> Profile {
        Profile {
            student_id: ADMIN_STUDENT_ID.to_string(),
            username: ADMIN_USERNAME.to_string(),
            name: Some("Administrator".to_string()),
            xp: Some(0),
            hearts: Some(ADMIN_HEARTS),
            role: Some(Role::Admin),
            ..Default::default()
        }
    }

    pub fn without_password(mut self) -> Profile {
        self.password = None;
        self
    }

    pub fn matches_credentials(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password.as_deref() == Some(password)
    }

    /// Fills the starting counters and empty maps where they are missing.
    pub fn fill_defaults(&mut self, now: DateTime<Utc>) {
        self.xp.get_or_insert(DEFAULT_XP);
        self.hearts.get_or_insert(DEFAULT_HEARTS);
        self.topic_progress.get_or_insert_with(Map::new);
        self.stats.get_or_insert_with(BTreeMap::new);
        self.created_at.get_or_insert(now);
    }

    /// Shallow merge: every top-level key of `patch` replaces the stored
    /// value, nested maps included. `studentId` can't be changed.
    pub fn merge(&self, patch: Map<String, Value>) -> Result<Profile, serde_json::Error> {
        merge_record(serde_json::to_value(self)?, patch)
    }

    pub fn topic_stats(&self, topic: &str) -> TopicStats {
        self.stats
            .as_ref()
            .and_then(|stats| stats.get(topic))
            .copied()
            .unwrap_or_default()
    }
}

/// Applies `patch` to a stored JSON record and reads the result as a profile.
///
/// A `null` value removes the key. `studentId` is never replaced.
pub fn merge_record(
    mut record: Value,
    patch: Map<String, Value>,
) -> Result<Profile, serde_json::Error> {
    if let Value::Object(fields) = &mut record {
        for (key, value) in patch {
            if key == STUDENT_ID_KEY {
                continue;
            }
            if value.is_null() {
                fields.remove(&key);
            } else {
                fields.insert(key, value);
            }
        }
    }

    serde_json::from_value(record)
}
