use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::campaign::CampaignId;
use crate::contact::ContactId;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;

pub type TaskId = TypedId<DeliveryTask>;

/// One scheduled email. Tasks are written in bulk when a campaign is sent and
/// are never modified afterwards; the delivery worker consumes them once
/// `run_by` has passed.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeliveryTask {
    #[serde(rename = "_id")]
    pub id: TaskId,
    pub campaign_id: CampaignId,
    pub contact_id: ContactId,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub run_by: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl TypedIdMarker for DeliveryTask {
    fn tag() -> &'static str {
        "TSK"
    }
}
