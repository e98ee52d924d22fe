use std::convert::TryFrom;

use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post, put};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::manager::{self, CampaignDraft, SendOptions};
use super::recipients::RecipientSpec;
use super::{Campaign, CampaignContent, CampaignId, CampaignStatus, CampaignStyle};
use crate::auth::ProjectScope;
use crate::cache::Cache;
use crate::contact::ContactId;
use crate::database::Database;
use crate::error::Error;
use crate::mailer::Mailer;
use crate::project::ProjectId;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CreateCampaignBody {
    pub subject: String,
    pub body: String,
    pub style: CampaignStyle,
    /// Contact ids, or `["all"]` for every subscribed contact
    #[serde(default)]
    pub recipients: Vec<String>,
}

pub type UpdateCampaignBody = CreateCampaignBody;

impl CreateCampaignBody {
    pub fn into_draft(self) -> Result<CampaignDraft, Error> {
        if self.subject.trim().is_empty() {
            return Err(Error::EmptySubject);
        }

        let recipients = RecipientSpec::parse(&self.recipients)?;

        Ok(CampaignDraft {
            content: CampaignContent {
                subject: self.subject,
                body: self.body,
                style: self.style,
            },
            recipients,
        })
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SendCampaignBody {
    pub live: bool,
    /// Minutes before the first batch goes out
    #[serde(default)]
    pub delay: Option<i64>,
}

impl SendCampaignBody {
    pub fn options(&self) -> Result<SendOptions, Error> {
        let delay = self.delay.unwrap_or(0);
        if delay < 0 {
            return Err(Error::NegativeDelay { delay });
        }

        Ok(SendOptions {
            live: self.live,
            delay: u32::try_from(delay).map_err(|_| Error::DelayTooLarge { delay })?,
        })
    }
}

/// Campaign as returned to callers. This is also the cached form, so it has
/// to survive a round trip through json.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct CampaignBody {
    pub id: CampaignId,
    pub project_id: ProjectId,
    pub subject: String,
    pub body: String,
    pub style: CampaignStyle,
    pub status: CampaignStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub recipient_ids: Vec<ContactId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl CampaignBody {
    pub fn render(campaign: Campaign) -> CampaignBody {
        CampaignBody {
            id: campaign.id,
            project_id: campaign.project_id,
            subject: campaign.subject,
            body: campaign.body,
            style: campaign.style,
            status: campaign.status,
            delivered_at: campaign.delivered_at,
            recipient_ids: campaign.recipient_ids,
            created_at: campaign.created_at,
            modified_at: campaign.modified_at,
        }
    }
}

#[get("/campaigns")]
#[tracing::instrument(skip(db, cache, scope))]
pub async fn get_campaigns(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    scope: ProjectScope,
) -> Result<Json<Vec<CampaignBody>>, Error> {
    let campaigns = manager::get_campaigns(&***db, &***cache, &scope.project).await?;

    Ok(Json(campaigns))
}

#[post("/campaigns")]
#[tracing::instrument(skip(db, cache, scope))]
pub async fn create_campaign(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    scope: ProjectScope,
    body: Json<CreateCampaignBody>,
) -> Result<Json<CampaignBody>, Error> {
    let draft = body.into_inner().into_draft()?;

    let campaign = manager::create_campaign(&***db, &***cache, &scope.project, draft).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[get("/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db, cache, scope))]
pub async fn get_campaign_by_id(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    scope: ProjectScope,
    params: Path<CampaignId>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();

    let campaign =
        manager::get_campaign_by_id(&***db, &***cache, &scope.project, campaign_id).await?;

    Ok(Json(campaign))
}

#[put("/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db, cache, scope))]
pub async fn update_campaign(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    scope: ProjectScope,
    params: Path<CampaignId>,
    body: Json<UpdateCampaignBody>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();
    let draft = body.into_inner().into_draft()?;

    let campaign =
        manager::update_campaign(&***db, &***cache, &scope.project, campaign_id, draft).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[delete("/campaigns/{campaign_id}")]
#[tracing::instrument(skip(db, cache, scope))]
pub async fn delete_campaign(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    scope: ProjectScope,
    params: Path<CampaignId>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();

    let campaign =
        manager::delete_campaign(&***db, &***cache, &scope.project, campaign_id).await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[post("/campaigns/{campaign_id}/send")]
#[tracing::instrument(skip(db, cache, mailer, scope))]
pub async fn send_campaign(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    mailer: Data<Box<dyn Mailer>>,
    scope: ProjectScope,
    params: Path<CampaignId>,
    body: Json<SendCampaignBody>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();
    let options = body.options()?;

    let campaign = manager::send_campaign(
        &***db,
        &***cache,
        &***mailer,
        &scope.project,
        campaign_id,
        options,
    )
    .await?;

    Ok(Json(CampaignBody::render(campaign)))
}

#[post("/campaigns/{campaign_id}/duplicate")]
#[tracing::instrument(skip(db, cache, scope))]
pub async fn duplicate_campaign(
    db: Data<Box<dyn Database>>,
    cache: Data<Box<dyn Cache>>,
    scope: ProjectScope,
    params: Path<CampaignId>,
) -> Result<Json<CampaignBody>, Error> {
    let campaign_id = params.into_inner();

    let campaign =
        manager::duplicate_campaign(&***db, &***cache, &scope.project, campaign_id).await?;

    Ok(Json(CampaignBody::render(campaign)))
}
