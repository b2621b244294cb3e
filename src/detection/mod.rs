//! Detection stages that turn an application into signals

pub mod anomaly;
pub mod mismatch;
pub mod ring;

pub use anomaly::{AnomalyFeatures, AnomalyScorer, ModelError};
pub use mismatch::IncomeMismatchRule;
pub use ring::{LinkAttribute, LinkRecord, Ring, RingDetector, RingReport};
