use std::collections::HashSet;
use std::slice::Chunks;

use crate::contact::ContactId;
use crate::database::Database;
use crate::error::Error;
use crate::project::ProjectId;

/// The only accepted form of "every subscribed contact".
pub const ALL_SUBSCRIBED: &str = "all";

/// Upper bound on contact ids attached to a campaign in one write.
pub const ATTACH_CHUNK_SIZE: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipientSpec {
    AllSubscribed,
    Explicit(Vec<ContactId>),
}

impl RecipientSpec {
    /// `["all"]` selects every subscribed contact; any other list is read as
    /// contact ids, so `"all"` next to other entries is an invalid id.
    pub fn parse(recipients: &[String]) -> Result<RecipientSpec, Error> {
        if let [only] = recipients {
            if only == ALL_SUBSCRIBED {
                return Ok(RecipientSpec::AllSubscribed);
            }
        }

        let contact_ids = recipients
            .iter()
            .map(|recipient| {
                recipient.parse().map_err(|_| Error::InvalidRecipient {
                    recipient: recipient.clone(),
                })
            })
            .collect::<Result<Vec<ContactId>, Error>>()?;

        Ok(RecipientSpec::Explicit(contact_ids))
    }
}

/// Splits `recipients` into chunks of at most [`ATTACH_CHUNK_SIZE`].
pub fn attach_chunks(recipients: &[ContactId]) -> Chunks<'_, ContactId> {
    recipients.chunks(ATTACH_CHUNK_SIZE)
}

/// Expands `spec` into distinct contact ids of the project. Explicit ids keep
/// their first-seen order; ids of contacts outside the project are dropped.
#[tracing::instrument(skip(db, spec))]
pub async fn resolve_recipients(
    db: &dyn Database,
    project_id: ProjectId,
    spec: &RecipientSpec,
) -> Result<Vec<ContactId>, Error> {
    let requested = match spec {
        RecipientSpec::AllSubscribed => {
            db.contacts()
                .fetch_subscribed_contact_ids(project_id)
                .await?
        }
        RecipientSpec::Explicit(contact_ids) if contact_ids.is_empty() => vec![],
        RecipientSpec::Explicit(contact_ids) => {
            let in_project: HashSet<ContactId> = db
                .contacts()
                .fetch_contact_ids_in_project(project_id, contact_ids)
                .await?
                .into_iter()
                .collect();

            contact_ids
                .iter()
                .copied()
                .filter(|contact_id| in_project.contains(contact_id))
                .collect()
        }
    };

    let mut seen = HashSet::with_capacity(requested.len());
    let recipients: Vec<ContactId> = requested
        .into_iter()
        .filter(|contact_id| seen.insert(*contact_id))
        .collect();

    tracing::debug!(count = recipients.len(), "resolved recipients");
    Ok(recipients)
}
