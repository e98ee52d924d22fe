use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::info;

use crate::contact::{Contact, ContactId};
use crate::database::Database;
use crate::error::Error;
use crate::project::{Project, ProjectId, ProjectMember};
use crate::user::UserId;

const SEED_CONTACTS: usize = 250;

fn generate_secret() -> String {
    let key: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    format!("sk_{}", key)
}

/// Wipes the database and fills it with one project and a contact list large
/// enough to span several delivery batches.
pub async fn seed(db: &dyn Database) -> Result<(), Error> {
    db.drop().await?;

    let project_id: ProjectId = "PRJ-16E77539-8873-4C8A-BCA3-2036010474AD"
        .parse()
        .map_err(|_| Error::ExistentialState("seed project id is malformed".to_owned()))?;
    let owner_id: UserId = "USR-33957EB6-0EE7-487F-A087-E55C335BD63C"
        .parse()
        .map_err(|_| Error::ExistentialState("seed user id is malformed".to_owned()))?;

    let now = Utc::now();
    let project = Project {
        id: project_id,
        name: "The Green Bean Bunch".to_string(),
        from: Some("Green Beans".to_string()),
        email: Some("news@greenbeans.example".to_string()),
        verified: false,
        secret: generate_secret(),
        members: vec![
            ProjectMember {
                user_id: owner_id,
                email: "owner@greenbeans.example".to_string(),
            },
            ProjectMember {
                user_id: UserId::new(),
                email: "editor@greenbeans.example".to_string(),
            },
        ],
        created_at: now,
    };

    db.projects().insert_project(&project).await?;

    // every tenth contact has unsubscribed
    let contacts: Vec<Contact> = (0..SEED_CONTACTS)
        .map(|i| Contact {
            id: ContactId::new(),
            project_id,
            email: format!("bean{:03}@customers.example", i),
            subscribed: i % 10 != 9,
            created_at: now,
        })
        .collect();

    db.contacts().insert_contacts(&contacts).await?;

    info!(
        project_id = %project.id,
        user_id = %owner_id,
        secret = %project.secret,
        contacts = contacts.len(),
        "seeded database"
    );

    Ok(())
}
