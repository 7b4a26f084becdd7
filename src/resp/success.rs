use utoipa::ToSchema;

use crate::data::profile::Profile;

/// `{"success": true}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Success {
    pub success: bool,
}

impl Default for Success {
    fn default() -> Self {
        Success { success: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub profile: Profile,
}

impl From<Profile> for LoginResponse {
    fn from(profile: Profile) -> Self {
        LoginResponse {
            success: true,
            profile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ServerStatus {
    pub status: String,
    pub message: String,
}

impl Default for ServerStatus {
    fn default() -> Self {
        ServerStatus {
            status: "Server is running".to_string(),
            message: "Welcome to Circuitly Backend!".to_string(),
        }
    }
}
