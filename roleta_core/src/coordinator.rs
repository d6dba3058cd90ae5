use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config_store::ConfigStore;
use crate::error::{ClaimError, SpinError, StoreError};
use crate::ledger::{ClaimLedger, ClaimRecord};
use crate::rng::DrawSource;
use crate::segment::Segment;
use crate::selection::{CategoryPolicy, SelectionEngine};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpinResult {
    pub segment: Segment,
    pub claim: ClaimRecord,
}

/// Runs one spin attempt: check claim, snapshot config, select, claim.
///
/// Every failure is terminal for the attempt. A lost claim race discards the
/// draw rather than redrawing.
pub struct SpinCoordinator {
    config: Arc<dyn ConfigStore>,
    ledger: Arc<dyn ClaimLedger>,
    draw: Arc<dyn DrawSource>,
    policy: CategoryPolicy,
}

impl SpinCoordinator {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        ledger: Arc<dyn ClaimLedger>,
        draw: Arc<dyn DrawSource>,
    ) -> Self {
        Self {
            config,
            ledger,
            draw,
            policy: CategoryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CategoryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn ledger(&self) -> &dyn ClaimLedger {
        self.ledger.as_ref()
    }

    pub fn config(&self) -> &dyn ConfigStore {
        self.config.as_ref()
    }

    /// Hash commitment of the draw secret, when the draw is verifiable.
    pub fn commitment(&self) -> Option<String> {
        self.draw.commitment()
    }

    pub async fn spin(
        &self,
        customer_id: &str,
        customer_category: Option<&str>,
    ) -> Result<SpinResult, SpinError> {
        let res = self.run(customer_id, customer_category).await;
        match &res {
            Ok(r) => info!(
                customer_id,
                segment = %r.segment.label,
                coupon = %r.segment.coupon_code,
                "spin awarded"
            ),
            Err(e) if e.is_business() => info!(customer_id, reason = %e, "spin refused"),
            Err(SpinError::Unresolved { .. }) => {
                warn!(customer_id, "claim outcome unknown, caller must re-query")
            }
            Err(e) => error!(customer_id, error = %e, "spin failed"),
        }
        res
    }

    async fn run(
        &self,
        customer_id: &str,
        customer_category: Option<&str>,
    ) -> Result<SpinResult, SpinError> {
        if self.ledger.get(customer_id).await.map_err(SpinError::Store)?.is_some() {
            return Err(SpinError::AlreadyClaimed {
                customer_id: customer_id.to_string(),
            });
        }

        let Some(snapshot) = self.config.load().await.map_err(SpinError::Store)? else {
            return Err(SpinError::NoEligibleSegment);
        };

        let engine = SelectionEngine::new(self.draw.as_ref(), self.policy);
        let segment = engine
            .select(&snapshot, customer_id, customer_category)?
            .clone();

        let claim = match self.ledger.claim(customer_id, &segment).await {
            Ok(claim) => claim,
            Err(ClaimError::Store(StoreError::Ambiguous(_))) => {
                return Err(SpinError::Unresolved {
                    customer_id: customer_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        Ok(SpinResult { segment, claim })
    }
}
