use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::contact::ContactId;
use crate::database::MongoCampaignStore;
use crate::error::Error;
use crate::project::ProjectId;

use super::{Campaign, CampaignContent, CampaignId, CampaignStatus};

const CAMPAIGNS: &str = "campaigns";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": CAMPAIGNS,
            "indexes": [
                { "key": { "project_id": 1, "created_at": -1 }, "name": "by_project_id" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error>;

    async fn fetch_campaign_by_id(&self, campaign_id: CampaignId)
        -> Result<Option<Campaign>, Error>;

    async fn fetch_campaigns_by_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Campaign>, Error>;

    /// Only applies to drafts.
    async fn update_campaign_content(
        &self,
        campaign: Campaign,
        content: CampaignContent,
    ) -> Result<Campaign, Error>;

    async fn clear_campaign_recipients(&self, campaign_id: CampaignId) -> Result<(), Error>;

    /// Adds contacts that are not attached yet. Repeating a call has no
    /// further effect.
    async fn add_campaign_recipients(
        &self,
        campaign_id: CampaignId,
        contact_ids: &[ContactId],
    ) -> Result<(), Error>;

    /// Flips a draft to delivered. Fails with `CampaignAlreadyDelivered` if
    /// the stored campaign is no longer a draft.
    async fn mark_campaign_delivered(
        &self,
        campaign: Campaign,
        delivered_at: DateTime<Utc>,
    ) -> Result<Campaign, Error>;

    async fn delete_campaign(&self, campaign_id: CampaignId) -> Result<(), Error>;
}

fn draft_status() -> Result<bson::Bson, Error> {
    Ok(bson::to_bson(&CampaignStatus::Draft)?)
}

#[async_trait]
impl CampaignStore for MongoCampaignStore {
    #[tracing::instrument(skip(self, campaign), fields(campaign_id = %campaign.id))]
    async fn insert_campaign(&self, campaign: &Campaign) -> Result<(), Error> {
        self.insert_one(campaign, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaign_by_id(
        &self,
        campaign_id: CampaignId,
    ) -> Result<Option<Campaign>, Error> {
        let campaign = self.find_one(bson::doc! { "_id": campaign_id }, None).await?;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_campaigns_by_project(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Campaign>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "created_at": -1 })
            .build();

        let campaigns: Vec<Campaign> = self
            .find(bson::doc! { "project_id": project_id }, options)
            .await?
            .try_collect()
            .await?;

        Ok(campaigns)
    }

    #[tracing::instrument(skip(self, campaign, content), fields(campaign_id = %campaign.id))]
    async fn update_campaign_content(
        &self,
        mut campaign: Campaign,
        content: CampaignContent,
    ) -> Result<Campaign, Error> {
        let now = Utc::now();
        let new_style = bson::to_bson(&content.style)?;
        let new_modified_at = bson::DateTime::from_chrono(now);

        let result = self
            .update_one(
                bson::doc! { "_id": campaign.id, "status": draft_status()? },
                bson::doc! { "$set": {
                    "subject": content.subject.as_str(),
                    "body": content.body.as_str(),
                    "style": new_style,
                    "modified_at": new_modified_at,
                } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::CampaignAlreadyDelivered {
                campaign_id: campaign.id,
            });
        }

        campaign.subject = content.subject;
        campaign.body = content.body;
        campaign.style = content.style;
        campaign.modified_at = now;

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn clear_campaign_recipients(&self, campaign_id: CampaignId) -> Result<(), Error> {
        let empty: Vec<ContactId> = vec![];
        self.update_one(
            bson::doc! { "_id": campaign_id },
            bson::doc! { "$set": { "recipient_ids": bson::to_bson(&empty)? } },
            None,
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, contact_ids), fields(count = contact_ids.len()))]
    async fn add_campaign_recipients(
        &self,
        campaign_id: CampaignId,
        contact_ids: &[ContactId],
    ) -> Result<(), Error> {
        if contact_ids.is_empty() {
            return Ok(());
        }

        let new_contact_ids = bson::to_bson(contact_ids)?;
        self.update_one(
            bson::doc! { "_id": campaign_id },
            bson::doc! { "$addToSet": { "recipient_ids": { "$each": new_contact_ids } } },
            None,
        )
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, campaign), fields(campaign_id = %campaign.id))]
    async fn mark_campaign_delivered(
        &self,
        mut campaign: Campaign,
        delivered_at: DateTime<Utc>,
    ) -> Result<Campaign, Error> {
        campaign.deliver(delivered_at);
        let new_status = bson::to_bson(&campaign.status)?;
        let new_delivered_at = bson::DateTime::from_chrono(delivered_at);

        let result = self
            .update_one(
                bson::doc! { "_id": campaign.id, "status": draft_status()? },
                bson::doc! { "$set": {
                    "status": new_status,
                    "delivered_at": new_delivered_at,
                    "modified_at": new_delivered_at,
                } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::CampaignAlreadyDelivered {
                campaign_id: campaign.id,
            });
        }

        Ok(campaign)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_campaign(&self, campaign_id: CampaignId) -> Result<(), Error> {
        self.delete_one(bson::doc! { "_id": campaign_id }, None).await?;

        Ok(())
    }
}
