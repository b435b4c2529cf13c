use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HhcError {
    #[error("failed to access {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed instance, section `{section}`: {reason}")]
    MalformedInstance {
        section: &'static str,
        reason: String,
    },

    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    #[error("invalid json instance")]
    Json(#[from] serde_json::Error),

    /// Raised when a required (patient, service) pair can never leave the pending list.
    #[error("infeasible instance: no vehicle is qualified for service {service} required at node {node}")]
    NoQualifiedVehicle { node: usize, service: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A time limit ran out before any worker finished an iteration.
    #[error("the time limit expired before the first iteration completed")]
    NoIterationCompleted,
}

pub type Result<T> = std::result::Result<T, HhcError>;
