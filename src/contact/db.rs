use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};
use serde::Deserialize;

use crate::database::MongoContactStore;
use crate::error::Error;
use crate::project::ProjectId;

use super::{Contact, ContactId};

const CONTACTS: &str = "contacts";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": CONTACTS,
            "indexes": [
                { "key": { "project_id": 1, "subscribed": 1 }, "name": "by_project_id" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert_contacts(&self, contacts: &[Contact]) -> Result<(), Error>;

    /// Ids of every contact in the project that is currently subscribed.
    async fn fetch_subscribed_contact_ids(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ContactId>, Error>;

    /// The subset of `contact_ids` that belongs to the project.
    async fn fetch_contact_ids_in_project(
        &self,
        project_id: ProjectId,
        contact_ids: &[ContactId],
    ) -> Result<Vec<ContactId>, Error>;
}

#[derive(Deserialize)]
struct ContactIdOnly {
    #[serde(rename = "_id")]
    id: ContactId,
}

#[async_trait]
impl ContactStore for MongoContactStore {
    #[tracing::instrument(skip(self, contacts), fields(count = contacts.len()))]
    async fn insert_contacts(&self, contacts: &[Contact]) -> Result<(), Error> {
        if contacts.is_empty() {
            return Ok(());
        }

        self.insert_many(contacts, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_subscribed_contact_ids(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ContactId>, Error> {
        let options = FindOptions::builder()
            .projection(bson::doc! { "_id": 1 })
            .sort(bson::doc! { "created_at": 1 })
            .build();

        let contacts: Vec<ContactIdOnly> = self
            .clone_with_type::<ContactIdOnly>()
            .find(
                bson::doc! { "project_id": project_id, "subscribed": true },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(contacts.into_iter().map(|contact| contact.id).collect())
    }

    #[tracing::instrument(skip(self, contact_ids), fields(requested = contact_ids.len()))]
    async fn fetch_contact_ids_in_project(
        &self,
        project_id: ProjectId,
        contact_ids: &[ContactId],
    ) -> Result<Vec<ContactId>, Error> {
        let options = FindOptions::builder()
            .projection(bson::doc! { "_id": 1 })
            .build();

        let contact_ids = bson::to_bson(contact_ids)?;
        let contacts: Vec<ContactIdOnly> = self
            .clone_with_type::<ContactIdOnly>()
            .find(
                bson::doc! { "project_id": project_id, "_id": { "$in": contact_ids } },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(contacts.into_iter().map(|contact| contact.id).collect())
    }
}
