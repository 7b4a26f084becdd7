//! Client of the profile API.
//!
//! [`ProfileClient`] forwards calls to the server through a [`Transport`]
//! and keeps the caller's [`Session`] in step: after every successful change
//! the cached profile list is reloaded wholesale. Failed requests leave the
//! session as it was.

use chrono::Utc;
use rocket::http::Method;
use serde_json::Value;
use thiserror::Error;
use tracing_futures::Instrument;

use crate::data::profile::{LoginData, Profile, ProfilePatch, DEFAULT_HEARTS, DEFAULT_XP};
use crate::resp::success::LoginResponse;

pub mod export;
pub mod session;
pub mod transport;

pub use session::{FileStorage, LocalStorage, MemoryStorage, Session};
pub use transport::{HttpTransport, Reply, Transport, TransportError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed")]
    Connection(#[source] TransportError),
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("All fields are required.")]
    MissingFields,
    #[error("profile '{0}' isn't loaded")]
    UnknownProfile(String),
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Connection(TransportError::Decode(e))
    }
}

/// `{"success": ..., "error": ..., "profile": ...}` as shown to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl ApiResult {
    pub fn ok() -> ApiResult {
        ApiResult {
            success: true,
            error: None,
            profile: None,
        }
    }
}

impl From<ClientError> for ApiResult {
    fn from(e: ClientError) -> Self {
        ApiResult {
            success: false,
            error: Some(e.to_string()),
            profile: None,
        }
    }
}

impl<T: Into<ApiResult>> From<Result<T, ClientError>> for ApiResult {
    fn from(result: Result<T, ClientError>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(e) => e.into(),
        }
    }
}

impl From<()> for ApiResult {
    fn from(_: ()) -> Self {
        ApiResult::ok()
    }
}

impl From<Profile> for ApiResult {
    fn from(profile: Profile) -> Self {
        ApiResult {
            profile: Some(profile),
            ..ApiResult::ok()
        }
    }
}

/// Registration form. Every field but `class_group` must be filled in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub name: String,
    pub student_id: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub class_group: Option<String>,
}

impl NewProfile {
    pub fn validate(&self) -> Result<(), ClientError> {
        let fields = [&self.name, &self.student_id, &self.username, &self.password];
        if fields.iter().any(|f| f.is_empty()) {
            return Err(ClientError::MissingFields);
        }
        Ok(())
    }

    /// The record as first stored, starting counters included.
    pub fn into_profile(self) -> Profile {
        let mut profile = Profile {
            name: Some(self.name),
            class_group: self.class_group,
            ..Profile::new(self.student_id, self.username, self.password)
        };
        profile.fill_defaults(Utc::now());
        profile
    }
}

fn profile_path(student_id: &str) -> String {
    format!("/api/profiles/{}", urlencoding::encode(student_id))
}

pub struct ProfileClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ProfileClient<T> {
    pub fn new(transport: T) -> ProfileClient<T> {
        ProfileClient { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        let span = tracing::debug_span!("profile_request", %method, path);
        let reply = self
            .transport
            .send(method, path, body)
            .instrument(span)
            .await
            .map_err(|e| {
                tracing::warn!("Profile server unreachable: {}", e);
                ClientError::Connection(e)
            })?;

        if reply.is_success() {
            return Ok(reply.body);
        }

        Err(ClientError::Rejected {
            status: reply.status,
            message: reply.error_message().unwrap_or("request failed").to_string(),
        })
    }

    /// Restores the active profile id from storage and loads the profiles.
    pub async fn init<S: LocalStorage>(&self, session: &mut Session<S>) -> Result<(), ClientError> {
        session.restore_active();
        self.load_profiles(session).await
    }

    pub async fn load_profiles<S: LocalStorage>(
        &self,
        session: &mut Session<S>,
    ) -> Result<(), ClientError> {
        let body = self.request(Method::Get, "/api/profiles", None).await?;
        let profiles: Vec<Profile> = serde_json::from_value(body)?;

        session.replace_profiles(profiles);
        Ok(())
    }

    async fn refresh<S: LocalStorage>(&self, session: &mut Session<S>) {
        if let Err(e) = self.load_profiles(session).await {
            tracing::error!("Failed to load profiles from server: {}", e);
        }
    }

    /// Validates the form, adds the starting counters and creates the profile.
    pub async fn register<S: LocalStorage>(
        &self,
        session: &mut Session<S>,
        new_profile: NewProfile,
    ) -> Result<(), ClientError> {
        new_profile.validate()?;
        let profile = new_profile.into_profile();
        let body = serde_json::to_value(&profile)?;

        self.request(Method::Post, "/api/profiles", Some(body)).await?;
        self.refresh(session).await;
        Ok(())
    }

    /// Logs in and makes the returned profile the active one.
    pub async fn authenticate<S: LocalStorage>(
        &self,
        session: &mut Session<S>,
        username: &str,
        password: &str,
    ) -> Result<Profile, ClientError> {
        let login = LoginData {
            username: username.to_string(),
            password: password.to_string(),
        };
        let body = serde_json::to_value(&login)?;

        let reply = self.request(Method::Post, "/api/login", Some(body)).await?;
        let login: LoginResponse = serde_json::from_value(reply)?;

        session.set_active(&login.profile.student_id);
        self.refresh(session).await;
        Ok(login.profile)
    }

    pub async fn update<S: LocalStorage>(
        &self,
        session: &mut Session<S>,
        student_id: &str,
        patch: &ProfilePatch,
    ) -> Result<(), ClientError> {
        let body = serde_json::to_value(patch)?;

        self.request(Method::Put, &profile_path(student_id), Some(body))
            .await?;
        self.refresh(session).await;
        Ok(())
    }

    /// Deletes the profile, dropping it as the active one if it was.
    pub async fn delete<S: LocalStorage>(
        &self,
        session: &mut Session<S>,
        student_id: &str,
    ) -> Result<(), ClientError> {
        self.request(Method::Delete, &profile_path(student_id), None)
            .await?;

        if session.active_profile_id() == Some(student_id) {
            session.clear_active();
        }
        self.refresh(session).await;
        Ok(())
    }

    /// Zeroes xp, refills hearts and clears topic progress. Stats are kept.
    pub async fn reset<S: LocalStorage>(
        &self,
        session: &mut Session<S>,
        student_id: &str,
    ) -> Result<(), ClientError> {
        let patch = ProfilePatch {
            xp: Some(DEFAULT_XP),
            hearts: Some(DEFAULT_HEARTS),
            topic_progress: Some(Default::default()),
            last_active: Some(Utc::now()),
            ..Default::default()
        };
        self.update(session, student_id, &patch).await
    }

    /// Adds to a topic's stats in the cached record and sends the whole
    /// stats map back.
    ///
    /// The cache may be stale, in which case the server copy is overwritten.
    pub async fn record_progress<S: LocalStorage>(
        &self,
        session: &mut Session<S>,
        student_id: &str,
        topic_id: &str,
        xp_delta: i64,
        time_delta: i64,
    ) -> Result<(), ClientError> {
        let profile = session
            .profile(student_id)
            .ok_or_else(|| ClientError::UnknownProfile(student_id.to_string()))?;

        let mut stats = profile.stats.clone().unwrap_or_default();
        stats
            .entry(topic_id.to_string())
            .or_default()
            .add(xp_delta, time_delta);

        let patch = ProfilePatch {
            stats: Some(stats),
            last_active: Some(Utc::now()),
            ..Default::default()
        };
        self.update(session, student_id, &patch).await
    }
}
