use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::project::ProjectId;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;

pub type EventId = TypedId<Event>;

/// A named analytics event that contact actions are later recorded against.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: EventId,
    pub project_id: ProjectId,
    pub campaign_id: CampaignId,
    pub name: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl TypedIdMarker for Event {
    fn tag() -> &'static str {
        "EVT"
    }
}
