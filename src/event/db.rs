use async_trait::async_trait;
use mongodb::options::InsertManyOptions;
use mongodb::{bson, Database};

use crate::campaign::CampaignId;
use crate::database::{ignore_duplicate_keys, MongoEventStore};
use crate::error::Error;

use super::Event;

const EVENTS: &str = "events";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": EVENTS,
            "indexes": [
                { "key": { "campaign_id": 1, "name": 1 }, "name": "by_campaign_and_name", "unique": true },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Inserts the events, skipping names the campaign already has.
    async fn insert_events(&self, events: &[Event]) -> Result<(), Error>;

    async fn delete_events_by_campaign(&self, campaign_id: CampaignId) -> Result<u64, Error>;
}

#[async_trait]
impl EventStore for MongoEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn insert_events(&self, events: &[Event]) -> Result<(), Error> {
        if events.is_empty() {
            return Ok(());
        }

        let options = InsertManyOptions::builder().ordered(false).build();
        ignore_duplicate_keys(self.insert_many(events, options).await)?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_events_by_campaign(&self, campaign_id: CampaignId) -> Result<u64, Error> {
        let result = self
            .delete_many(bson::doc! { "campaign_id": campaign_id }, None)
            .await?;

        Ok(result.deleted_count)
    }
}
