//! User profile view over the data returned by the user-info endpoint.

use serde::{Deserialize, Serialize};

/// Raw profile payload from `GET /v1/user/{username}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileData {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_pic_last_modified: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Read-only view over one user's fetched profile.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    username: String,
    data: ProfileData,
}

impl UserProfile {
    pub(crate) fn new(username: impl Into<String>, data: ProfileData) -> Self {
        UserProfile {
            username: username.into(),
            data,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn first_name(&self) -> &str {
        &self.data.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.data.last_name
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.data.first_name, self.data.last_name)
    }

    pub fn profile_pic_url(&self) -> Option<&str> {
        self.data.profile_pic_url.as_deref()
    }

    pub fn profile_pic_last_modified(&self) -> Option<i64> {
        self.data.profile_pic_last_modified
    }

    pub fn timezone(&self) -> Option<&str> {
        self.data.timezone.as_deref()
    }

    /// The raw payload, ready to be re-serialized.
    pub fn data(&self) -> &ProfileData {
        &self.data
    }
}
