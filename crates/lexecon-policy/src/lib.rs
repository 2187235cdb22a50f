//! lexecon-policy
//!
//! Policy loading and evaluation. A policy bundle is validated and
//! compiled into an immutable [`Policy`] identified by its canonical
//! content hash; evaluation is purely structural over the term/relation
//! graph, with no network, no randomness and no ambient time.

pub mod bundle;
pub mod eval;
pub mod slot;

pub use bundle::Policy;
pub use eval::{evaluate, EvalOutcome};
pub use slot::PolicySlot;
