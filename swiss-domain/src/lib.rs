use thiserror::Error;

use crate::store::StoreError;

pub mod ledger;
pub mod memory;
pub mod pairing;
pub mod registry;
pub mod round;
pub mod standings;
pub mod store;
pub mod tournament;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no eligible bye candidate among {0} players")]
    NoEligibleByeCandidate(usize),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn invalid_argument<T, R>(msg: T) -> ServiceResult<R>
    where
        T: Into<String>,
    {
        Err(ServiceError::InvalidArgument(msg.into()))
    }

    /// Missing rows surface as `NotFound` rather than a raw store error.
    pub fn from_lookup(error: StoreError) -> ServiceError {
        match error {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Store(other),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
