use async_trait::async_trait;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::results::InsertManyResult;
use mongodb::{bson, Collection};

use crate::campaign::db::CampaignStore;
use crate::campaign::{self, Campaign};
use crate::contact::db::ContactStore;
use crate::contact::{self, Contact};
use crate::error::Error;
use crate::event::db::EventStore;
use crate::event::{self, Event};
use crate::project::db::ProjectStore;
use crate::project::{self, Project};
use crate::task::db::TaskStore;
use crate::task::{self, DeliveryTask};

pub type MongoCampaignStore = Collection<Campaign>;
pub type MongoContactStore = Collection<Contact>;
pub type MongoEventStore = Collection<Event>;
pub type MongoProjectStore = Collection<Project>;
pub type MongoTaskStore = Collection<DeliveryTask>;

const DUPLICATE_KEY: i32 = 11000;

#[async_trait]
pub trait Database: Send + Sync {
    fn campaigns(&self) -> &dyn CampaignStore;

    fn contacts(&self) -> &dyn ContactStore;

    fn events(&self) -> &dyn EventStore;

    fn projects(&self) -> &dyn ProjectStore;

    fn tasks(&self) -> &dyn TaskStore;

    async fn drop(&self) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    campaigns: Collection<Campaign>,
    contacts: Collection<Contact>,
    events: Collection<Event>,
    projects: Collection<Project>,
    tasks: Collection<DeliveryTask>,
    db: mongodb::Database,
}

impl MongoDatabase {
    pub async fn initialize(db: mongodb::Database) -> Result<MongoDatabase, Error> {
        // ping the database to ensure connection is established
        db.run_command(bson::doc! { "ping": 1 }, None).await?;

        campaign::db::initialize(&db).await?;
        contact::db::initialize(&db).await?;
        event::db::initialize(&db).await?;
        project::db::initialize(&db).await?;
        task::db::initialize(&db).await?;

        Ok(MongoDatabase {
            campaigns: db.collection("campaigns"),
            contacts: db.collection("contacts"),
            events: db.collection("events"),
            projects: db.collection("projects"),
            tasks: db.collection("tasks"),
            db,
        })
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn campaigns(&self) -> &dyn CampaignStore {
        &self.campaigns
    }

    fn contacts(&self) -> &dyn ContactStore {
        &self.contacts
    }

    fn events(&self) -> &dyn EventStore {
        &self.events
    }

    fn projects(&self) -> &dyn ProjectStore {
        &self.projects
    }

    fn tasks(&self) -> &dyn TaskStore {
        &self.tasks
    }

    async fn drop(&self) -> Result<(), Error> {
        self.db.drop(None).await?;

        // indexes go with the collections
        campaign::db::initialize(&self.db).await?;
        contact::db::initialize(&self.db).await?;
        event::db::initialize(&self.db).await?;
        project::db::initialize(&self.db).await?;
        task::db::initialize(&self.db).await?;

        Ok(())
    }
}

/// Treats an unordered bulk insert that only failed on unique-index
/// conflicts as a success, which makes re-running the insert a no-op for the
/// documents that were already written.
pub fn ignore_duplicate_keys(
    result: Result<InsertManyResult, mongodb::error::Error>,
) -> Result<(), Error> {
    let error = match result {
        Ok(_) => return Ok(()),
        Err(error) => error,
    };

    let only_duplicates = match error.kind.as_ref() {
        ErrorKind::BulkWrite(failure) => {
            failure.write_concern_error.is_none()
                && failure
                    .write_errors
                    .as_ref()
                    .map(|errors| errors.iter().all(|e| e.code == DUPLICATE_KEY))
                    .unwrap_or(false)
        }
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        _ => false,
    };

    if only_duplicates {
        tracing::debug!("skipped documents that were already written");
        Ok(())
    } else {
        Err(error.into())
    }
}
