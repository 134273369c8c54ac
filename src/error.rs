use thiserror::Error;

use crate::clients::cloudflare::ApiMessage;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a single update run can fail. All of them end the run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network failure: {0}")]
    Http(String),

    #[error("unable to decode response: {0}")]
    Decode(String),

    #[error("request to cloudflare api was not successful: {} (additional messages: {})", join(.errors), join(.messages))]
    Api {
        errors: Vec<ApiMessage>,
        messages: Vec<ApiMessage>,
    },

    #[error("record not found, it needs to be created (ip: {ip}, zone: {zone_id})")]
    RecordNotFound { ip: String, zone_id: String },

    #[error("no {record_type} record returned for this name (found types: {})", .found.join(", "))]
    NoMatchingRecord {
        record_type: String,
        found: Vec<String>,
    },

    #[error("{count} {record_type} records share this name, refusing to pick one")]
    AmbiguousRecord { record_type: String, count: usize },

    #[error("could not determine public ip: '{0}' is not a valid IP address")]
    InvalidPublicIp(String),
}

fn join(items: &[ApiMessage]) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<minreq::Error> for Error {
    fn from(err: minreq::Error) -> Self {
        match err {
            minreq::Error::SerdeJsonError(e) => Error::Decode(e.to_string()),
            minreq::Error::InvalidUtf8InBody(e) => Error::Decode(e.to_string()),
            other => Error::Http(other.to_string()),
        }
    }
}
