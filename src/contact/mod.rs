use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::project::ProjectId;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;

pub type ContactId = TypedId<Contact>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Contact {
    #[serde(rename = "_id")]
    pub id: ContactId,
    pub project_id: ProjectId,
    pub email: String,
    pub subscribed: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl TypedIdMarker for Contact {
    fn tag() -> &'static str {
        "CON"
    }
}
