use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use config::ConfigError;
use derivative::Derivative;
use lettre::error::Error as EmailBuildError;
use lettre::transport::smtp::Error as SmtpError;
use mongodb::bson::ser::Error as BsonError;
use mongodb::error::Error as DatabaseError;
use serde::{Serialize, Serializer};

use crate::campaign::CampaignId;

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq, Eq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    #[serde(serialize_with = "display")]
    InvalidQuery(#[derivative(PartialEq = "ignore")] QueryPayloadError),
    InvalidRecipient {
        recipient: String,
    },
    EmptySubject,
    NegativeDelay {
        delay: i64,
    },
    DelayTooLarge {
        delay: i64,
    },
    CampaignHasNoRecipients {
        campaign_id: CampaignId,
    },

    // 401
    MissingCredentials,

    // 404
    PathNotFound,
    ProjectNotFound,
    CampaignNotFound {
        campaign_id: CampaignId,
    },

    // 409
    CampaignAlreadyDelivered {
        campaign_id: CampaignId,
    },

    // 500
    ExistentialState(String),
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToBson(#[derivative(PartialEq = "ignore")] BsonError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToJson(#[derivative(PartialEq = "ignore")] serde_json::Error),
    InvalidEmailAddress {
        address: String,
    },
    #[serde(serialize_with = "display")]
    FailedToBuildEmail(#[derivative(PartialEq = "ignore")] EmailBuildError),
    #[serde(serialize_with = "display")]
    FailedToSendEmail(#[derivative(PartialEq = "ignore")] SmtpError),
    #[serde(serialize_with = "display")]
    InvalidConfiguration(#[derivative(PartialEq = "ignore")] ConfigError),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::InvalidQuery(_) => "E4001002",
            Error::InvalidRecipient { .. } => "E4001003",
            Error::EmptySubject => "E4001004",
            Error::NegativeDelay { .. } => "E4001005",
            Error::DelayTooLarge { .. } => "E4001006",
            Error::CampaignHasNoRecipients { .. } => "E4002000",
            Error::MissingCredentials => "E4011000",
            Error::PathNotFound => "E4041000",
            Error::ProjectNotFound => "E4041001",
            Error::CampaignNotFound { .. } => "E4041002",
            Error::CampaignAlreadyDelivered { .. } => "E4091000",
            Error::ExistentialState(_) => "E5001000",
            Error::FailedDatabaseCall(_) => "E5001001",
            Error::FailedToSerializeToBson(_) => "E5001002",
            Error::FailedToSerializeToJson(_) => "E5001003",
            Error::InvalidEmailAddress { .. } => "E5001004",
            Error::FailedToBuildEmail(_) => "E5001005",
            Error::FailedToSendEmail(_) => "E5001006",
            Error::InvalidConfiguration(_) => "E5001007",
            Error::IoError(_) => "E5001008",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidQuery(_) => "The given query could not be parsed",
            Error::InvalidRecipient { .. } => "A given recipient is not a valid contact id",
            Error::EmptySubject => "The campaign subject must not be empty",
            Error::NegativeDelay { .. } => "The send delay must not be negative",
            Error::DelayTooLarge { .. } => "The send delay is too large",
            Error::CampaignHasNoRecipients { .. } => {
                "The requested campaign has no recipients"
            }
            Error::MissingCredentials => "The request carries no usable credentials",
            Error::PathNotFound => "The requested path was not found",
            Error::ProjectNotFound => "The requested project was not found",
            Error::CampaignNotFound { .. } => "The requested campaign was not found",
            Error::CampaignAlreadyDelivered { .. } => {
                "The requested campaign has already been delivered"
            }
            Error::ExistentialState(_) => "The server detected an invalid state",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeToBson(_) => {
                "An error occurred when serializing an object to bson"
            }
            Error::FailedToSerializeToJson(_) => {
                "An error occurred when serializing an object to json"
            }
            Error::InvalidEmailAddress { .. } => "A sender or member email address is invalid",
            Error::FailedToBuildEmail(_) => "An error occurred when composing an email",
            Error::FailedToSendEmail(_) => "An error occurred when sending an email",
            Error::InvalidConfiguration(_) => "The server configuration is invalid",
            Error::IoError(_) => "An error occurred during an I/O operation",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::InvalidRecipient { .. } => StatusCode::BAD_REQUEST,
            Error::EmptySubject => StatusCode::BAD_REQUEST,
            Error::NegativeDelay { .. } => StatusCode::BAD_REQUEST,
            Error::DelayTooLarge { .. } => StatusCode::BAD_REQUEST,
            Error::CampaignHasNoRecipients { .. } => StatusCode::BAD_REQUEST,
            Error::MissingCredentials => StatusCode::UNAUTHORIZED,
            Error::PathNotFound => StatusCode::NOT_FOUND,
            Error::ProjectNotFound => StatusCode::NOT_FOUND,
            Error::CampaignNotFound { .. } => StatusCode::NOT_FOUND,
            Error::CampaignAlreadyDelivered { .. } => StatusCode::CONFLICT,
            Error::ExistentialState(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedDatabaseCall(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeToBson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeToJson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidEmailAddress { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToBuildEmail(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSendEmail(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        struct Dummy<'a> {
            error_code: &'static str,
            error_message: &'static str,
            error_meta: &'a Error,
        }

        HttpResponse::build(self.status_code()).json(&Dummy {
            error_code: self.error_code(),
            error_message: self.error_message(),
            error_meta: self,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<BsonError> for Error {
    fn from(error: BsonError) -> Error {
        Error::FailedToSerializeToBson(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Error {
        Error::FailedToSerializeToJson(error)
    }
}

impl From<EmailBuildError> for Error {
    fn from(error: EmailBuildError) -> Error {
        Error::FailedToBuildEmail(error)
    }
}

impl From<SmtpError> for Error {
    fn from(error: SmtpError) -> Error {
        Error::FailedToSendEmail(error)
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Error {
        Error::InvalidConfiguration(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::InvalidQuery(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeToBson(err) => Some(err),
            Error::FailedToSerializeToJson(err) => Some(err),
            Error::FailedToBuildEmail(err) => Some(err),
            Error::FailedToSendEmail(err) => Some(err),
            Error::InvalidConfiguration(err) => Some(err),
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
