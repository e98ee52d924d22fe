use actix_web::web::{self, Data, JsonConfig, PathConfig, QueryConfig, ServiceConfig};
use actix_web::{App, HttpServer, ResponseError};
use mongodb::Client;
use tracing::info;
use tracing_actix_web::TracingLogger;

pub mod auth;
pub mod cache;
pub mod campaign;
pub mod contact;
pub mod database;
pub mod error;
pub mod event;
pub mod mailer;
pub mod project;
pub mod seed;
pub mod settings;
pub mod task;
pub mod typedid;
pub mod user;
pub mod utils;

pub use campaign::{CampaignBody, CreateCampaignBody, SendCampaignBody, UpdateCampaignBody};
pub use error::Error;
pub use settings::Settings;

use crate::cache::{Cache, MemoryCache};
use crate::database::{Database, MongoDatabase};
use crate::mailer::Mailer;

/// Registers the extractor error formats and every campaign route. The app
/// must also carry `Box<dyn Database>`, `Box<dyn Cache>` and `Box<dyn Mailer>`
/// data.
pub fn configure(cfg: &mut ServiceConfig) {
    cfg.app_data(JsonConfig::default().error_handler(|err, _req| {
        // format json errors with custom format
        Error::InvalidJson(err).into()
    }))
    .app_data(PathConfig::default().error_handler(|err, _req| {
        // format path errors with custom format
        Error::InvalidPath(err).into()
    }))
    .app_data(QueryConfig::default().error_handler(|err, _req| {
        // format query errors with custom format
        Error::InvalidQuery(err).into()
    }))
    .service(campaign::endpoints::get_campaigns)
    .service(campaign::endpoints::create_campaign)
    .service(campaign::endpoints::get_campaign_by_id)
    .service(campaign::endpoints::update_campaign)
    .service(campaign::endpoints::delete_campaign)
    .service(campaign::endpoints::send_campaign)
    .service(campaign::endpoints::duplicate_campaign);
}

pub async fn run(settings: Settings) -> Result<(), Error> {
    info!("connecting to db: {}", settings.database.uri);
    let db = Client::with_uri_str(&settings.database.uri)
        .await?
        .database(&settings.database.name);
    let db = MongoDatabase::initialize(db).await?;

    if settings.database.seed {
        seed::seed(&db).await?;
    }

    let db = Data::new(Box::new(db) as Box<dyn Database>);
    let cache = Data::new(Box::new(MemoryCache::new(settings.cache.ttl())) as Box<dyn Cache>);
    let mailer: Data<Box<dyn Mailer>> = Data::new(mailer::from_settings(&settings.email)?);

    info!("listening on {}", settings.server.address);
    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .app_data(cache.clone())
            .app_data(mailer.clone())
            .wrap(TracingLogger::default())
            .configure(configure)
            .default_service(web::to(|| async { Error::PathNotFound.error_response() }))
    })
    .bind(&settings.server.address)?
    .run()
    .await?;

    Ok(())
}
