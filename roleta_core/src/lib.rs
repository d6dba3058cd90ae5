pub mod config_store;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod rng;
pub mod segment;
pub mod selection;
pub mod validator;

pub use crate::config_store::{commit, ConfigStore, MemoryConfigStore};
pub use crate::coordinator::{SpinCoordinator, SpinResult};
pub use crate::error::{ClaimError, ConfigError, SelectionError, SpinError, StoreError, ValidationError};
pub use crate::ledger::{ClaimLedger, ClaimRecord, MemoryLedger};
pub use crate::rng::{derive_hash_hex, verify_draw, DrawSource, OsDraw, ProvablyFairRng};
pub use crate::segment::{Segment, SegmentSet, PROBABILITY_EPSILON};
pub use crate::selection::{eligible, pick, CategoryPolicy, SelectionEngine};
pub use crate::validator::{normalize, CouponCatalog, MemoryCatalog, SegmentValidator};
