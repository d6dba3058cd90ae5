/// Infrastructure failures from a backing store.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The write may or may not have been committed.
    #[error("store outcome unknown: {0}")]
    Ambiguous(String),
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Caller-correctable problems with a submitted wheel configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("configuration has no segments")]
    Empty,
    #[error("segment {index} is invalid: {reason}")]
    InvalidSegment { index: usize, reason: String },
    #[error("no active segment has a probability above zero")]
    NoWinnableSegments,
    #[error("unknown coupon code {code:?}")]
    UnknownCoupon { code: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no segment is eligible for this customer")]
    NoEligibleSegment,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClaimError {
    #[error("customer {customer_id:?} already claimed a reward")]
    AlreadyClaimed { customer_id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SpinError {
    #[error("customer {customer_id:?} already claimed a reward")]
    AlreadyClaimed { customer_id: String },
    #[error("no segment is eligible for this customer")]
    NoEligibleSegment,
    /// The claim write timed out with an unknown commit state. Re-query the
    /// claim status instead of spinning again.
    #[error("claim for customer {customer_id:?} is unresolved")]
    Unresolved { customer_id: String },
    #[error(transparent)]
    Store(StoreError),
}

impl SpinError {
    /// Expected outcomes of the spin state machine, as opposed to faults.
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            SpinError::AlreadyClaimed { .. } | SpinError::NoEligibleSegment
        )
    }
}

impl From<SelectionError> for SpinError {
    fn from(e: SelectionError) -> Self {
        match e {
            SelectionError::NoEligibleSegment => SpinError::NoEligibleSegment,
        }
    }
}

impl From<ClaimError> for SpinError {
    fn from(e: ClaimError) -> Self {
        match e {
            ClaimError::AlreadyClaimed { customer_id } => SpinError::AlreadyClaimed { customer_id },
            ClaimError::Store(e) => SpinError::Store(e),
        }
    }
}
