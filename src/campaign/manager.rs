use chrono::Utc;
use tracing::{info, warn};

use crate::cache::{self, Cache, Keys};
use crate::contact::ContactId;
use crate::database::Database;
use crate::error::Error;
use crate::mailer::{Mailer, OutgoingEmail};
use crate::project::Project;

use super::recipients::{attach_chunks, resolve_recipients, RecipientSpec};
use super::schedule::plan_deliveries;
use super::{Campaign, CampaignBody, CampaignContent, CampaignId};

/// Upper bound on delivery tasks written in one insert.
pub const TASK_CHUNK_SIZE: usize = 500;

pub const TEST_SUBJECT_PREFIX: &str = "[TEST] ";

#[derive(Clone, Debug)]
pub struct CampaignDraft {
    pub content: CampaignContent,
    pub recipients: RecipientSpec,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SendOptions {
    /// Test sends only go to the project's members
    pub live: bool,
    /// Minutes to wait before the first batch
    pub delay: u32,
}

/// Loads a campaign the project owns. Campaigns of other projects are
/// reported exactly like missing ones.
#[tracing::instrument(skip(db, project), fields(project_id = %project.id))]
pub async fn expect_campaign_in_project(
    db: &dyn Database,
    project: &Project,
    campaign_id: CampaignId,
) -> Result<Campaign, Error> {
    let campaign = db
        .campaigns()
        .fetch_campaign_by_id(campaign_id)
        .await?
        .filter(|campaign| campaign.project_id == project.id)
        .ok_or(Error::CampaignNotFound { campaign_id })?;

    Ok(campaign)
}

#[tracing::instrument(skip(db, cache, project), fields(project_id = %project.id))]
pub async fn get_campaigns(
    db: &dyn Database,
    cache: &dyn Cache,
    project: &Project,
) -> Result<Vec<CampaignBody>, Error> {
    let key = Keys::project_campaigns(project.id);
    if let Some(campaigns) = cache::get_json(cache, &key).await? {
        return Ok(campaigns);
    }

    let version = cache.version().await?;
    let campaigns: Vec<CampaignBody> = db
        .campaigns()
        .fetch_campaigns_by_project(project.id)
        .await?
        .into_iter()
        .map(CampaignBody::render)
        .collect();
    cache::set_json(cache, &key, &campaigns, version).await?;

    Ok(campaigns)
}

#[tracing::instrument(skip(db, cache, project), fields(project_id = %project.id))]
pub async fn get_campaign_by_id(
    db: &dyn Database,
    cache: &dyn Cache,
    project: &Project,
    campaign_id: CampaignId,
) -> Result<CampaignBody, Error> {
    let key = Keys::campaign(campaign_id);
    let cached: Option<CampaignBody> = cache::get_json(cache, &key).await?;
    let body = match cached {
        Some(body) => body,
        None => {
            let version = cache.version().await?;
            let campaign = db
                .campaigns()
                .fetch_campaign_by_id(campaign_id)
                .await?
                .ok_or(Error::CampaignNotFound { campaign_id })?;
            let body = CampaignBody::render(campaign);
            cache::set_json(cache, &key, &body, version).await?;
            body
        }
    };

    // the cache is shared by all projects, so ownership is checked on hits too
    if body.project_id != project.id {
        return Err(Error::CampaignNotFound { campaign_id });
    }

    Ok(body)
}

#[tracing::instrument(skip(db, cache, project, draft), fields(project_id = %project.id))]
pub async fn create_campaign(
    db: &dyn Database,
    cache: &dyn Cache,
    project: &Project,
    draft: CampaignDraft,
) -> Result<Campaign, Error> {
    let recipients = resolve_recipients(db, project.id, &draft.recipients).await?;

    let mut campaign = Campaign::new_draft(project.id, draft.content);
    db.campaigns().insert_campaign(&campaign).await?;

    attach_recipients(db, campaign.id, &recipients).await?;
    campaign.recipient_ids = recipients;

    cache::invalidate_campaign(cache, &campaign).await?;

    info!(campaign_id = %campaign.id, recipients = campaign.recipient_ids.len(), "created campaign");
    Ok(campaign)
}

#[tracing::instrument(skip(db, cache, project, draft), fields(project_id = %project.id))]
pub async fn update_campaign(
    db: &dyn Database,
    cache: &dyn Cache,
    project: &Project,
    campaign_id: CampaignId,
    draft: CampaignDraft,
) -> Result<Campaign, Error> {
    let campaign = expect_campaign_in_project(db, project, campaign_id).await?;
    campaign.ensure_editable()?;

    let recipients = resolve_recipients(db, project.id, &draft.recipients).await?;

    let mut campaign = db
        .campaigns()
        .update_campaign_content(campaign, draft.content)
        .await?;

    // an interrupted live send leaves a draft with some tasks and events
    // written, which must not outlive the recipient set they were planned for
    let stale_tasks = db.tasks().delete_tasks_by_campaign(campaign.id).await?;
    db.events().delete_events_by_campaign(campaign.id).await?;
    if stale_tasks > 0 {
        warn!(campaign_id = %campaign.id, stale_tasks, "discarded tasks of an interrupted send");
    }

    db.campaigns().clear_campaign_recipients(campaign.id).await?;
    attach_recipients(db, campaign.id, &recipients).await?;
    campaign.recipient_ids = recipients;

    cache::invalidate_campaign(cache, &campaign).await?;

    Ok(campaign)
}

#[tracing::instrument(skip(db, cache, project), fields(project_id = %project.id))]
pub async fn duplicate_campaign(
    db: &dyn Database,
    cache: &dyn Cache,
    project: &Project,
    campaign_id: CampaignId,
) -> Result<Campaign, Error> {
    let original = expect_campaign_in_project(db, project, campaign_id).await?;

    let campaign = Campaign::new_draft(project.id, original.content());
    db.campaigns().insert_campaign(&campaign).await?;

    cache::invalidate_campaign(cache, &campaign).await?;

    Ok(campaign)
}

/// Live sends schedule one task per recipient and mark the campaign as
/// delivered. Tasks and events are written before the status flips, and
/// both inserts skip rows that already exist, so a send that failed half
/// way can simply be repeated.
#[tracing::instrument(skip(db, cache, mailer, project), fields(project_id = %project.id))]
pub async fn send_campaign(
    db: &dyn Database,
    cache: &dyn Cache,
    mailer: &dyn Mailer,
    project: &Project,
    campaign_id: CampaignId,
    options: SendOptions,
) -> Result<Campaign, Error> {
    let campaign = expect_campaign_in_project(db, project, campaign_id).await?;

    if !options.live {
        send_test_email(mailer, project, &campaign).await?;
        return Ok(campaign);
    }

    campaign.ensure_deliverable()?;

    let now = Utc::now();
    let tasks = plan_deliveries(campaign.id, &campaign.recipient_ids, options.delay, now);
    for chunk in tasks.chunks(TASK_CHUNK_SIZE) {
        db.tasks().insert_tasks(chunk).await?;
    }

    db.events()
        .insert_events(&campaign.delivery_events(now))
        .await?;

    let campaign = db
        .campaigns()
        .mark_campaign_delivered(campaign, now)
        .await?;

    cache::invalidate_campaign(cache, &campaign).await?;

    info!(campaign_id = %campaign.id, tasks = tasks.len(), "scheduled campaign");
    Ok(campaign)
}

#[tracing::instrument(skip(db, cache, project), fields(project_id = %project.id))]
pub async fn delete_campaign(
    db: &dyn Database,
    cache: &dyn Cache,
    project: &Project,
    campaign_id: CampaignId,
) -> Result<Campaign, Error> {
    let campaign = expect_campaign_in_project(db, project, campaign_id).await?;

    let tasks = db.tasks().delete_tasks_by_campaign(campaign.id).await?;
    db.events().delete_events_by_campaign(campaign.id).await?;
    db.campaigns().delete_campaign(campaign.id).await?;

    cache::invalidate_campaign(cache, &campaign).await?;

    info!(campaign_id = %campaign.id, tasks, "deleted campaign");
    Ok(campaign)
}

/// Attaches `recipients` one bounded chunk at a time.
async fn attach_recipients(
    db: &dyn Database,
    campaign_id: CampaignId,
    recipients: &[ContactId],
) -> Result<(), Error> {
    for chunk in attach_chunks(recipients) {
        db.campaigns()
            .add_campaign_recipients(campaign_id, chunk)
            .await?;
    }

    Ok(())
}

async fn send_test_email(
    mailer: &dyn Mailer,
    project: &Project,
    campaign: &Campaign,
) -> Result<(), Error> {
    let to: Vec<String> = project
        .member_emails()
        .into_iter()
        .map(str::to_owned)
        .collect();
    if to.is_empty() {
        warn!(campaign_id = %campaign.id, "project has no members to send a test to");
        return Ok(());
    }

    let email = OutgoingEmail {
        from_name: project.sender_name().to_owned(),
        from_email: project.sender_email(mailer.default_sender()).to_owned(),
        to,
        subject: format!("{}{}", TEST_SUBJECT_PREFIX, campaign.subject),
        html: campaign.body.clone(),
    };

    mailer.send(&email).await
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::*;
    use crate::cache::MemoryCache;
    use crate::campaign::{CampaignStatus, CampaignStyle};
    use crate::database::test::MockDatabase;
    use crate::event::Event;
    use crate::mailer::test::MockMailer;
    use crate::project::{ProjectId, ProjectMember};
    use crate::task::DeliveryTask;
    use crate::user::UserId;

    fn project() -> Project {
        Project {
            id: ProjectId::new(),
            name: "Bean Counters".to_string(),
            from: Some("The Beans".to_string()),
            email: Some("news@beans.example".to_string()),
            verified: true,
            secret: "sk_beans".to_string(),
            members: vec![
                ProjectMember {
                    user_id: UserId::new(),
                    email: "pinto@beans.example".to_string(),
                },
                ProjectMember {
                    user_id: UserId::new(),
                    email: "navy@beans.example".to_string(),
                },
            ],
            created_at: Utc::now(),
        }
    }

    fn content() -> CampaignContent {
        CampaignContent {
            subject: "Spring Harvest".to_string(),
            body: "<p>Fresh beans</p>".to_string(),
            style: CampaignStyle::Html,
        }
    }

    fn campaign_in(project: &Project, recipients: usize) -> Campaign {
        let mut campaign = Campaign::new_draft(project.id, content());
        campaign.recipient_ids = (0..recipients).map(|_| ContactId::new()).collect();
        campaign
    }

    fn serve(db: &mut MockDatabase, campaign: &Campaign) {
        let campaign = campaign.clone();
        db.campaigns.on_fetch_campaign_by_id = Box::new(move |campaign_id| {
            Ok(Some(campaign.clone()).filter(|c| c.id == campaign_id))
        });
    }

    async fn prime(cache: &MemoryCache, campaign: &Campaign) {
        cache
            .set(&Keys::campaign(campaign.id), "{}".to_string())
            .await
            .unwrap();
        cache
            .set(&Keys::project_campaigns(campaign.project_id), "[]".to_string())
            .await
            .unwrap();
    }

    fn cache() -> MemoryCache {
        MemoryCache::new(StdDuration::from_secs(60))
    }

    #[tokio::test]
    async fn create_attaches_recipients_in_bounded_chunks() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let project = project();
        let contacts: Vec<ContactId> = (0..1201).map(|_| ContactId::new()).collect();
        let contacts_clone = contacts.clone();
        db.contacts.on_fetch_subscribed_contact_ids =
            Box::new(move |_| Ok(contacts_clone.clone()));
        let inserted = Arc::new(Mutex::new(vec![]));
        let inserted_clone = Arc::clone(&inserted);
        db.campaigns.on_insert_campaign = Box::new(move |campaign| {
            inserted_clone.lock().unwrap().push(campaign.clone());
            Ok(())
        });
        let chunks = Arc::new(Mutex::new(vec![]));
        let chunks_clone = Arc::clone(&chunks);
        db.campaigns.on_add_campaign_recipients = Box::new(move |_, contact_ids| {
            chunks_clone.lock().unwrap().push(contact_ids.to_vec());
            Ok(())
        });

        let draft = CampaignDraft {
            content: content(),
            recipients: RecipientSpec::AllSubscribed,
        };
        let campaign = create_campaign(&db, &cache, &project, draft).await.unwrap();

        assert_eq!(campaign.status, CampaignStatus::Draft);
        assert_eq!(campaign.project_id, project.id);
        assert_eq!(campaign.delivered_at, None);
        assert_eq!(campaign.recipient_ids, contacts);

        let inserted = inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].id, campaign.id);

        let chunks = chunks.lock().unwrap();
        let sizes: Vec<_> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![500, 500, 201]);
        assert_eq!(chunks.concat(), contacts);
    }

    #[tokio::test]
    async fn create_clears_the_project_list_cache() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let project = project();
        db.campaigns.on_insert_campaign = Box::new(|_| Ok(()));
        cache
            .set(&Keys::project_campaigns(project.id), "[]".to_string())
            .await
            .unwrap();

        let draft = CampaignDraft {
            content: content(),
            recipients: RecipientSpec::Explicit(vec![]),
        };
        create_campaign(&db, &cache, &project, draft).await.unwrap();

        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn get_campaign_by_id_reads_through_the_cache() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let project = project();
        let campaign = campaign_in(&project, 2);
        let fetches = Arc::new(Mutex::new(0));
        let fetches_clone = Arc::clone(&fetches);
        let campaign_clone = campaign.clone();
        db.campaigns.on_fetch_campaign_by_id = Box::new(move |_| {
            *fetches_clone.lock().unwrap() += 1;
            Ok(Some(campaign_clone.clone()))
        });

        let first = get_campaign_by_id(&db, &cache, &project, campaign.id)
            .await
            .unwrap();
        let second = get_campaign_by_id(&db, &cache, &project, campaign.id)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.recipient_ids, campaign.recipient_ids);
        assert_eq!(*fetches.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn campaigns_of_other_projects_are_not_found() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let owner = project();
        let intruder = project();
        let campaign = campaign_in(&owner, 2);
        serve(&mut db, &campaign);

        // once cold, once from the cache the owner warmed up
        for _ in 0..2 {
            let error = get_campaign_by_id(&db, &cache, &intruder, campaign.id)
                .await
                .unwrap_err();
            assert_eq!(
                error,
                Error::CampaignNotFound {
                    campaign_id: campaign.id
                }
            );
            get_campaign_by_id(&db, &cache, &owner, campaign.id)
                .await
                .unwrap();
        }

        let error = delete_campaign(&db, &cache, &intruder, campaign.id)
            .await
            .unwrap_err();
        assert_eq!(
            error,
            Error::CampaignNotFound {
                campaign_id: campaign.id
            }
        );
    }

    #[tokio::test]
    async fn get_campaigns_lists_the_project_once_per_ttl() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let project = project();
        let campaigns = vec![campaign_in(&project, 1), campaign_in(&project, 0)];
        let campaigns_clone = campaigns.clone();
        let project_id = project.id;
        let fetches = Arc::new(Mutex::new(0));
        let fetches_clone = Arc::clone(&fetches);
        db.campaigns.on_fetch_campaigns_by_project = Box::new(move |requested_project_id| {
            assert_eq!(requested_project_id, project_id);
            *fetches_clone.lock().unwrap() += 1;
            Ok(campaigns_clone.clone())
        });

        let first = get_campaigns(&db, &cache, &project).await.unwrap();
        let second = get_campaigns(&db, &cache, &project).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(*fetches.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn live_send_without_recipients_changes_nothing() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let mailer = MockMailer::default();
        let project = project();
        let campaign = campaign_in(&project, 0);
        serve(&mut db, &campaign);
        prime(&cache, &campaign).await;

        let options = SendOptions {
            live: true,
            delay: 0,
        };
        let error = send_campaign(&db, &cache, &mailer, &project, campaign.id, options)
            .await
            .unwrap_err();

        assert_eq!(
            error,
            Error::CampaignHasNoRecipients {
                campaign_id: campaign.id
            }
        );
        assert_eq!(cache.len(), 2);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_send_schedules_every_recipient_and_delivers() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let mailer = MockMailer::default();
        let project = project();
        let campaign = campaign_in(&project, 85);
        serve(&mut db, &campaign);
        prime(&cache, &campaign).await;

        let tasks: Arc<Mutex<Vec<DeliveryTask>>> = Arc::new(Mutex::new(vec![]));
        let tasks_clone = Arc::clone(&tasks);
        db.tasks.on_insert_tasks = Box::new(move |chunk| {
            assert!(chunk.len() <= TASK_CHUNK_SIZE);
            tasks_clone.lock().unwrap().extend_from_slice(chunk);
            Ok(())
        });
        let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(vec![]));
        let events_clone = Arc::clone(&events);
        db.events.on_insert_events = Box::new(move |new_events| {
            events_clone.lock().unwrap().extend_from_slice(new_events);
            Ok(())
        });
        db.campaigns.on_mark_campaign_delivered = Box::new(|mut campaign, delivered_at| {
            campaign.deliver(delivered_at);
            Ok(campaign)
        });

        let options = SendOptions {
            live: true,
            delay: 0,
        };
        let sent = send_campaign(&db, &cache, &mailer, &project, campaign.id, options)
            .await
            .unwrap();

        assert_eq!(sent.status, CampaignStatus::Delivered);
        let delivered_at = sent.delivered_at.expect("delivered_at is set");

        let tasks = tasks.lock().unwrap();
        assert_eq!(tasks.len(), 85);
        for (task, contact_id) in tasks.iter().zip(&campaign.recipient_ids) {
            assert_eq!(task.contact_id, *contact_id);
            assert_eq!(task.campaign_id, campaign.id);
        }
        assert!(tasks[..80]
            .iter()
            .all(|task| task.run_by == delivered_at + Duration::minutes(1)));
        assert!(tasks[80..]
            .iter()
            .all(|task| task.run_by == delivered_at + Duration::minutes(2)));

        let names: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.name.clone())
            .collect();
        assert_eq!(
            names,
            vec!["spring-harvest-delivered", "spring-harvest-opened"]
        );

        assert!(cache.is_empty());
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn live_send_respects_the_initial_delay_and_chunking() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let mailer = MockMailer::default();
        let project = project();
        let campaign = campaign_in(&project, 1001);
        serve(&mut db, &campaign);

        let chunks: Arc<Mutex<Vec<Vec<DeliveryTask>>>> = Arc::new(Mutex::new(vec![]));
        let chunks_clone = Arc::clone(&chunks);
        db.tasks.on_insert_tasks = Box::new(move |chunk| {
            chunks_clone.lock().unwrap().push(chunk.to_vec());
            Ok(())
        });
        db.events.on_insert_events = Box::new(|_| Ok(()));
        db.campaigns.on_mark_campaign_delivered = Box::new(|mut campaign, delivered_at| {
            campaign.deliver(delivered_at);
            Ok(campaign)
        });

        let options = SendOptions {
            live: true,
            delay: 10,
        };
        let sent = send_campaign(&db, &cache, &mailer, &project, campaign.id, options)
            .await
            .unwrap();
        let now = sent.delivered_at.unwrap();

        let chunks = chunks.lock().unwrap();
        let sizes: Vec<_> = chunks.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![500, 500, 1]);

        let tasks = chunks.concat();
        assert_eq!(tasks[0].run_by, now + Duration::minutes(11));
        assert_eq!(tasks[1000].run_by, now + Duration::minutes(11 + 1000 / 80));
    }

    #[tokio::test]
    async fn delivered_campaigns_cannot_be_sent_again() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let mailer = MockMailer::default();
        let project = project();
        let mut campaign = campaign_in(&project, 3);
        campaign.deliver(Utc::now());
        serve(&mut db, &campaign);

        let options = SendOptions {
            live: true,
            delay: 0,
        };
        let error = send_campaign(&db, &cache, &mailer, &project, campaign.id, options)
            .await
            .unwrap_err();

        assert_eq!(
            error,
            Error::CampaignAlreadyDelivered {
                campaign_id: campaign.id
            }
        );
    }

    #[tokio::test]
    async fn test_send_only_mails_the_members() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let mailer = MockMailer::default();
        let project = project();
        let campaign = campaign_in(&project, 500);
        serve(&mut db, &campaign);
        prime(&cache, &campaign).await;

        let options = SendOptions {
            live: false,
            delay: 0,
        };
        let sent = send_campaign(&db, &cache, &mailer, &project, campaign.id, options)
            .await
            .unwrap();

        assert_eq!(sent.status, CampaignStatus::Draft);
        assert_eq!(sent.delivered_at, None);
        assert_eq!(cache.len(), 2);

        let emails = mailer.sent.lock().unwrap();
        assert_eq!(
            *emails,
            vec![OutgoingEmail {
                from_name: "The Beans".to_string(),
                from_email: "news@beans.example".to_string(),
                to: vec![
                    "pinto@beans.example".to_string(),
                    "navy@beans.example".to_string()
                ],
                subject: "[TEST] Spring Harvest".to_string(),
                html: "<p>Fresh beans</p>".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn duplicate_copies_content_but_not_recipients() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let project = project();
        let original = campaign_in(&project, 12);
        serve(&mut db, &original);
        prime(&cache, &original).await;
        let inserted = Arc::new(Mutex::new(vec![]));
        let inserted_clone = Arc::clone(&inserted);
        db.campaigns.on_insert_campaign = Box::new(move |campaign| {
            inserted_clone.lock().unwrap().push(campaign.clone());
            Ok(())
        });

        let copy = duplicate_campaign(&db, &cache, &project, original.id)
            .await
            .unwrap();

        assert_ne!(copy.id, original.id);
        assert_eq!(copy.content(), original.content());
        assert_eq!(copy.status, CampaignStatus::Draft);
        assert!(copy.recipient_ids.is_empty());
        assert_eq!(inserted.lock().unwrap().len(), 1);

        // the project list now has one more campaign; the original is untouched
        let listed = cache.get(&Keys::project_campaigns(project.id)).await.unwrap();
        assert_eq!(listed, None);
        let original_entry = cache.get(&Keys::campaign(original.id)).await.unwrap();
        assert_eq!(original_entry, Some("{}".to_string()));
    }

    #[tokio::test]
    async fn update_replaces_content_and_recipients() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let project = project();
        let campaign = campaign_in(&project, 3);
        let kept = campaign.recipient_ids[0];
        let added = ContactId::new();
        serve(&mut db, &campaign);
        prime(&cache, &campaign).await;

        db.contacts.on_fetch_contact_ids_in_project =
            Box::new(|_, contact_ids| Ok(contact_ids.to_vec()));
        db.campaigns.on_update_campaign_content = Box::new(|mut campaign, content| {
            campaign.subject = content.subject;
            campaign.body = content.body;
            campaign.style = content.style;
            Ok(campaign)
        });
        db.tasks.on_delete_tasks_by_campaign = Box::new(|_| Ok(0));
        db.events.on_delete_events_by_campaign = Box::new(|_| Ok(0));
        let calls = Arc::new(Mutex::new(vec![]));
        let calls_clear = Arc::clone(&calls);
        db.campaigns.on_clear_campaign_recipients = Box::new(move |_| {
            calls_clear.lock().unwrap().push(vec![]);
            Ok(())
        });
        let calls_add = Arc::clone(&calls);
        db.campaigns.on_add_campaign_recipients = Box::new(move |_, contact_ids| {
            calls_add.lock().unwrap().push(contact_ids.to_vec());
            Ok(())
        });

        let draft = CampaignDraft {
            content: CampaignContent {
                subject: "Summer Harvest".to_string(),
                body: "<p>More beans</p>".to_string(),
                style: CampaignStyle::Templated,
            },
            recipients: RecipientSpec::Explicit(vec![added, kept]),
        };
        let updated = update_campaign(&db, &cache, &project, campaign.id, draft)
            .await
            .unwrap();

        assert_eq!(updated.subject, "Summer Harvest");
        assert_eq!(updated.style, CampaignStyle::Templated);
        assert_eq!(updated.recipient_ids, vec![added, kept]);
        assert_eq!(*calls.lock().unwrap(), vec![vec![], vec![added, kept]]);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn update_after_an_interrupted_send_discards_its_tasks() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let mailer = MockMailer::default();
        let project = project();
        let campaign = campaign_in(&project, 600);
        let kept = campaign.recipient_ids[0];
        let campaign_id = campaign.id;
        serve(&mut db, &campaign);

        let stored: Arc<Mutex<Vec<DeliveryTask>>> = Arc::new(Mutex::new(vec![]));
        let inserts = Arc::new(Mutex::new(0));
        let stored_insert = Arc::clone(&stored);
        db.tasks.on_insert_tasks = Box::new(move |chunk| {
            let mut inserts = inserts.lock().unwrap();
            *inserts += 1;
            if *inserts == 2 {
                return Err(Error::ExistentialState("connection reset".to_string()));
            }
            stored_insert.lock().unwrap().extend_from_slice(chunk);
            Ok(())
        });
        let stored_delete = Arc::clone(&stored);
        db.tasks.on_delete_tasks_by_campaign = Box::new(move |id| {
            let mut stored = stored_delete.lock().unwrap();
            let before = stored.len();
            stored.retain(|task| task.campaign_id != id);
            Ok((before - stored.len()) as u64)
        });
        let deleted_events = Arc::new(Mutex::new(false));
        let deleted_events_clone = Arc::clone(&deleted_events);
        db.events.on_delete_events_by_campaign = Box::new(move |id| {
            assert_eq!(id, campaign_id);
            *deleted_events_clone.lock().unwrap() = true;
            Ok(0)
        });

        let options = SendOptions {
            live: true,
            delay: 0,
        };
        send_campaign(&db, &cache, &mailer, &project, campaign.id, options)
            .await
            .unwrap_err();
        assert_eq!(stored.lock().unwrap().len(), TASK_CHUNK_SIZE);

        db.contacts.on_fetch_contact_ids_in_project =
            Box::new(|_, contact_ids| Ok(contact_ids.to_vec()));
        db.campaigns.on_update_campaign_content = Box::new(|campaign, _| Ok(campaign));
        db.campaigns.on_clear_campaign_recipients = Box::new(|_| Ok(()));
        db.campaigns.on_add_campaign_recipients = Box::new(|_, _| Ok(()));

        let draft = CampaignDraft {
            content: content(),
            recipients: RecipientSpec::Explicit(vec![kept]),
        };
        let updated = update_campaign(&db, &cache, &project, campaign.id, draft)
            .await
            .unwrap();

        assert_eq!(updated.recipient_ids, vec![kept]);
        assert!(stored
            .lock()
            .unwrap()
            .iter()
            .all(|task| updated.recipient_ids.contains(&task.contact_id)));
        assert!(stored.lock().unwrap().is_empty());
        assert!(*deleted_events.lock().unwrap());
    }

    #[tokio::test]
    async fn delivered_campaigns_cannot_be_updated() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let project = project();
        let mut campaign = campaign_in(&project, 3);
        campaign.deliver(Utc::now());
        serve(&mut db, &campaign);

        let draft = CampaignDraft {
            content: content(),
            recipients: RecipientSpec::AllSubscribed,
        };
        let error = update_campaign(&db, &cache, &project, campaign.id, draft)
            .await
            .unwrap_err();

        assert_eq!(
            error,
            Error::CampaignAlreadyDelivered {
                campaign_id: campaign.id
            }
        );
    }

    #[tokio::test]
    async fn delete_removes_tasks_events_and_cache_entries() {
        let mut db = MockDatabase::new();
        let cache = cache();
        let project = project();
        let campaign = campaign_in(&project, 3);
        let campaign_id = campaign.id;
        serve(&mut db, &campaign);
        prime(&cache, &campaign).await;

        let deleted = Arc::new(Mutex::new(vec![]));
        let deleted_tasks = Arc::clone(&deleted);
        db.tasks.on_delete_tasks_by_campaign = Box::new(move |id| {
            assert_eq!(id, campaign_id);
            deleted_tasks.lock().unwrap().push("tasks");
            Ok(3)
        });
        let deleted_events = Arc::clone(&deleted);
        db.events.on_delete_events_by_campaign = Box::new(move |id| {
            assert_eq!(id, campaign_id);
            deleted_events.lock().unwrap().push("events");
            Ok(2)
        });
        let deleted_campaign = Arc::clone(&deleted);
        db.campaigns.on_delete_campaign = Box::new(move |id| {
            assert_eq!(id, campaign_id);
            deleted_campaign.lock().unwrap().push("campaign");
            Ok(())
        });

        let removed = delete_campaign(&db, &cache, &project, campaign.id)
            .await
            .unwrap();

        assert_eq!(removed.id, campaign.id);
        assert_eq!(
            *deleted.lock().unwrap(),
            vec!["tasks", "events", "campaign"]
        );
        assert!(cache.is_empty());
    }
}
