use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contact::ContactId;
use crate::project::ProjectId;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub mod recipients;
pub mod schedule;
pub mod state;
pub use endpoints::*;

pub type CampaignId = TypedId<Campaign>;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: CampaignId,
    pub project_id: ProjectId,
    pub subject: String,
    pub body: String,
    pub style: CampaignStyle,
    pub status: CampaignStatus,
    #[serde(with = "crate::utils::optional_bson_datetime", default)]
    pub delivered_at: Option<DateTime<Utc>>,
    pub recipient_ids: Vec<ContactId>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub modified_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new_draft(project_id: ProjectId, content: CampaignContent) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: CampaignId::new(),
            project_id,
            subject: content.subject,
            body: content.body,
            style: content.style,
            status: CampaignStatus::Draft,
            delivered_at: None,
            recipient_ids: vec![],
            created_at: now,
            modified_at: now,
        }
    }

    pub fn content(&self) -> CampaignContent {
        CampaignContent {
            subject: self.subject.clone(),
            body: self.body.clone(),
            style: self.style,
        }
    }
}

impl TypedIdMarker for Campaign {
    fn tag() -> &'static str {
        "CPN"
    }
}

/// The user-editable part of a campaign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CampaignContent {
    pub subject: String,
    pub body: String,
    pub style: CampaignStyle,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum CampaignStyle {
    /// Body is rendered inside the project's email template
    Templated,
    /// Body is sent as the complete html document
    Html,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum CampaignStatus {
    Draft,
    Delivered,
}
