use roleta_core::{ClaimRecord, ConfigError, Segment, SpinError, StoreError, ValidationError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpinRequest {
    pub customer_id: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SpinResponse {
    pub won: Segment,
    pub claim: ClaimRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_seed_hash: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub server_seed_hash: Option<String>,
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    AlreadyClaimed,
    NoEligibleSegment,
    Unresolved,
    Invalid,
    NotFound,
    Unavailable,
    Internal,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationError),
    #[error("spin failed: {0}")]
    Spin(#[from] SpinError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Invalid(v) => ApiError::Invalid(v),
            ConfigError::Store(s) => ApiError::Store(s),
        }
    }
}

fn store_kind(e: &StoreError) -> ErrorKind {
    match e {
        StoreError::Corrupt(_) => ErrorKind::Internal,
        StoreError::Unavailable(_) | StoreError::Ambiguous(_) => ErrorKind::Unavailable,
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Invalid(_) | ApiError::BadRequest(_) => ErrorKind::Invalid,
            ApiError::Spin(SpinError::AlreadyClaimed { .. }) => ErrorKind::AlreadyClaimed,
            ApiError::Spin(SpinError::NoEligibleSegment) => ErrorKind::NoEligibleSegment,
            ApiError::Spin(SpinError::Unresolved { .. }) => ErrorKind::Unresolved,
            ApiError::Spin(SpinError::Store(e)) | ApiError::Store(e) => store_kind(e),
            ApiError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let detail = match self {
            ApiError::Invalid(e) => Some(e.to_string()),
            ApiError::BadRequest(what) | ApiError::NotFound(what) => Some(what.clone()),
            ApiError::Spin(SpinError::Unresolved { customer_id }) => {
                Some(format!("re-query claim status for {customer_id}"))
            }
            _ => None,
        };
        ErrorBody {
            error: self.kind(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_have_stable_names() {
        let body = ApiError::from(SpinError::AlreadyClaimed {
            customer_id: "x".into(),
        })
        .body();
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "error": "AlreadyClaimed" })
        );
        let body = ApiError::from(ValidationError::UnknownCoupon { code: "GONE".into() }).body();
        assert_eq!(body.error, ErrorKind::Invalid);
        assert!(body.detail.unwrap().contains("GONE"));
    }

    #[test]
    fn corrupt_store_is_internal() {
        let corrupt = StoreError::Corrupt("segments_json".into());
        assert_eq!(ApiError::from(corrupt.clone()).kind(), ErrorKind::Internal);
        assert_eq!(ApiError::from(SpinError::Store(corrupt)).kind(), ErrorKind::Internal);
        assert_eq!(
            ApiError::from(StoreError::Unavailable("pool".into())).kind(),
            ErrorKind::Unavailable
        );
        // the detail never leaks store internals
        assert_eq!(ApiError::from(StoreError::Corrupt("x".into())).body().detail, None);
    }

    #[test]
    fn spin_request_category_is_optional() {
        let req: SpinRequest = serde_json::from_str(r#"{"customerId":"c-1"}"#).unwrap();
        assert_eq!(req.customer_id, "c-1");
        assert!(req.category.is_none());
    }
}
