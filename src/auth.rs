use actix_web::dev::Payload;
use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use actix_web::web::Data;
use actix_web::{FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

use crate::database::Database;
use crate::error::Error;
use crate::project::{Project, ProjectId};
use crate::user::UserId;

pub const USER_ID_HEADER: &str = "X-User-Id";
pub const PROJECT_ID_HEADER: &str = "X-Project-Id";

/// Who is making a request. User callers have already been authenticated
/// upstream and arrive with their ids in headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Caller {
    User {
        user_id: UserId,
        project_id: ProjectId,
    },
    Secret {
        secret: String,
    },
}

impl Caller {
    pub fn from_headers(headers: &HeaderMap) -> Result<Caller, Error> {
        if let Some(authorization) = headers.get(AUTHORIZATION) {
            let secret = authorization
                .to_str()
                .ok()
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|secret| !secret.is_empty())
                .ok_or(Error::MissingCredentials)?;

            return Ok(Caller::Secret {
                secret: secret.to_owned(),
            });
        }

        let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
        let user_id = header(USER_ID_HEADER).and_then(|value| value.parse::<UserId>().ok());
        let project_id =
            header(PROJECT_ID_HEADER).and_then(|value| value.parse::<ProjectId>().ok());

        match (user_id, project_id) {
            (Some(user_id), Some(project_id)) => Ok(Caller::User {
                user_id,
                project_id,
            }),
            _ => Err(Error::MissingCredentials),
        }
    }
}

/// Finds the project a caller acts on. Unknown secrets, unknown projects and
/// projects the user is not a member of are indistinguishable.
#[tracing::instrument(skip(db, caller))]
pub async fn resolve_project(db: &dyn Database, caller: &Caller) -> Result<Project, Error> {
    let project = match caller {
        Caller::Secret { secret } => db.projects().fetch_project_by_secret(secret).await?,
        Caller::User {
            user_id,
            project_id,
        } => db
            .projects()
            .fetch_project_by_id(*project_id)
            .await?
            .filter(|project| project.has_member(*user_id)),
    };

    project.ok_or(Error::ProjectNotFound)
}

/// The project every campaign route is scoped to.
#[derive(Clone, Debug)]
pub struct ProjectScope {
    pub project: Project,
}

impl FromRequest for ProjectScope {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<ProjectScope, Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let caller = Caller::from_headers(req.headers());
        let db = req.app_data::<Data<Box<dyn Database>>>().cloned();

        Box::pin(async move {
            let caller = caller?;
            let db = db.ok_or_else(|| {
                Error::ExistentialState("no database registered with the app".to_owned())
            })?;

            let project = resolve_project(&***db, &caller).await?;

            Ok(ProjectScope { project })
        })
    }
}
