//! lexecon-ledger
//!
//! The append-only audit ledger: a hash chain of signed entries persisted
//! in sled, owned by a single writer task. Appends are serialized through
//! a bounded queue; reads go straight to the store. Verification walks a
//! slice recomputing every hash and signature and reports the first
//! offending sequence number instead of throwing.

pub mod store;
pub mod verify;
pub mod writer;

pub use store::{LedgerRange, LedgerStore};
pub use verify::{check_entry, verify_chain, verify_slice};
pub use writer::{LedgerHandle, LedgerWriter};
