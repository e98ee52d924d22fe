use async_trait::async_trait;
use mongodb::{bson, Database};

use crate::database::MongoProjectStore;
use crate::error::Error;

use super::{Project, ProjectId};

const PROJECTS: &str = "projects";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": PROJECTS,
            "indexes": [
                { "key": { "secret": 1 }, "name": "by_secret", "unique": true },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn insert_project(&self, project: &Project) -> Result<(), Error>;

    async fn fetch_project_by_id(&self, project_id: ProjectId) -> Result<Option<Project>, Error>;

    async fn fetch_project_by_secret(&self, secret: &str) -> Result<Option<Project>, Error>;
}

#[async_trait]
impl ProjectStore for MongoProjectStore {
    #[tracing::instrument(skip(self, project), fields(project_id = %project.id))]
    async fn insert_project(&self, project: &Project) -> Result<(), Error> {
        self.insert_one(project, None).await?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_project_by_id(&self, project_id: ProjectId) -> Result<Option<Project>, Error> {
        let project = self.find_one(bson::doc! { "_id": project_id }, None).await?;

        Ok(project)
    }

    #[tracing::instrument(skip(self, secret))]
    async fn fetch_project_by_secret(&self, secret: &str) -> Result<Option<Project>, Error> {
        let project = self.find_one(bson::doc! { "secret": secret }, None).await?;

        Ok(project)
    }
}
