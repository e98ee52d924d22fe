use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};
use crate::user::UserId;

pub mod db;

pub type ProjectId = TypedId<Project>;

/// A tenant. Projects are managed elsewhere; campaigns only read them to
/// scope requests and to address test sends.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: ProjectId,
    pub name: String,
    /// Display name used in the `From` header, falls back to `name`
    pub from: Option<String>,
    /// Sender address, only used once the project is verified
    pub email: Option<String>,
    pub verified: bool,
    pub secret: String,
    pub members: Vec<ProjectMember>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ProjectMember {
    pub user_id: UserId,
    pub email: String,
}

impl Project {
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.members.iter().any(|member| member.user_id == user_id)
    }

    pub fn member_emails(&self) -> Vec<&str> {
        self.members
            .iter()
            .map(|member| member.email.as_str())
            .collect()
    }

    pub fn sender_name(&self) -> &str {
        self.from.as_deref().unwrap_or(&self.name)
    }

    pub fn sender_email<'a>(&'a self, default_sender: &'a str) -> &'a str {
        match (&self.email, self.verified) {
            (Some(email), true) => email,
            _ => default_sender,
        }
    }
}

impl TypedIdMarker for Project {
    fn tag() -> &'static str {
        "PRJ"
    }
}
