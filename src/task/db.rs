use async_trait::async_trait;
use mongodb::options::InsertManyOptions;
use mongodb::{bson, Database};

use crate::campaign::CampaignId;
use crate::database::{ignore_duplicate_keys, MongoTaskStore};
use crate::error::Error;

use super::DeliveryTask;

const TASKS: &str = "tasks";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": TASKS,
            "indexes": [
                { "key": { "campaign_id": 1, "contact_id": 1 }, "name": "by_campaign_and_contact", "unique": true },
                { "key": { "run_by": 1 }, "name": "by_run_by" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Inserts the tasks, skipping any (campaign, contact) pair that already
    /// has one. Safe to call again with the same tasks after a failure.
    async fn insert_tasks(&self, tasks: &[DeliveryTask]) -> Result<(), Error>;

    async fn delete_tasks_by_campaign(&self, campaign_id: CampaignId) -> Result<u64, Error>;
}

#[async_trait]
impl TaskStore for MongoTaskStore {
    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    async fn insert_tasks(&self, tasks: &[DeliveryTask]) -> Result<(), Error> {
        if tasks.is_empty() {
            return Ok(());
        }

        let options = InsertManyOptions::builder().ordered(false).build();
        ignore_duplicate_keys(self.insert_many(tasks, options).await)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_tasks_by_campaign(&self, campaign_id: CampaignId) -> Result<u64, Error> {
        let result = self
            .delete_many(bson::doc! { "campaign_id": campaign_id }, None)
            .await?;

        Ok(result.deleted_count)
    }
}
