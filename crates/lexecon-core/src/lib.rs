//! lexecon-core
//!
//! Shared data model for the Lexecon governance gateway: terms and
//! relations, decision requests and decisions, capability token bodies,
//! ledger entries, evidence artifact metadata, risk records, the error
//! taxonomy, and the injected clock. All hashing and signing elsewhere in
//! the workspace operates over the canonical serialization of these types;
//! nothing in this crate touches cryptography or storage.

pub mod clock;
pub mod config;
pub mod constants;
pub mod decision;
pub mod error;
pub mod evidence;
pub mod ledger;
pub mod policy;
pub mod request;
pub mod risk;
pub mod token;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::LexeconError;
pub use types::{DecisionId, Hash32, SigAlgorithm, SignatureBytes, TermId, TimestampMs};
