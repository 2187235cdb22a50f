//! lexecon-service
//!
//! The decision service: one adjudication per request, through a fixed
//! pipeline (normalize, pin the policy, evaluate, risk-score, mint,
//! evidence, sign, ledger-append) whose ordering is a contract because
//! it determines what gets signed. Either the ledger append succeeds and
//! the signed decision is returned, or nothing observable happened.

pub mod service;
pub mod store;

pub use service::DecisionService;
pub use store::GatewayStore;
