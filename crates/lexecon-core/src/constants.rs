//! Protocol constants. Anything an operator may legitimately tune lives in
//! [`crate::config::GatewayConfig`] instead; these are the fixed defaults
//! and hard bounds.

/// Default capability token TTL in seconds.
pub const TOKEN_DEFAULT_TTL_SECS: u64 = 300;

/// Hard ceiling on capability token TTL in seconds. Mint clamps to this.
pub const TOKEN_MAX_TTL_SECS: u64 = 3600;

/// Default deadline for one ledger append, milliseconds.
pub const LEDGER_APPEND_TIMEOUT_MS: u64 = 2_000;

/// Default deadline for one evidence put, milliseconds.
pub const EVIDENCE_PUT_TIMEOUT_MS: u64 = 10_000;

/// Default bound on the ledger writer queue. A full queue fails fast.
pub const LEDGER_QUEUE_BOUND: usize = 1024;

/// Maximum evidence artifact content size: 100 MiB.
pub const MAX_ARTIFACT_BYTES: u64 = 100 * 1024 * 1024;

/// Default ceiling on the caller risk hint below which PARANOID mode will
/// still permit. Hints above this escalate.
pub const PARANOID_HINT_MAX_DEFAULT: u8 = 2;

/// Caller risk hint range (inclusive).
pub const RISK_HINT_MIN: u8 = 1;
pub const RISK_HINT_MAX: u8 = 5;

/// Risk level quantization boundaries. A boundary value belongs to the
/// lower level: overall 25.0 is LOW, 25.0001 is MEDIUM.
pub const RISK_LOW_MAX: f64 = 25.0;
pub const RISK_MEDIUM_MAX: f64 = 50.0;
pub const RISK_HIGH_MAX: f64 = 75.0;

/// Default retention durations per retention class, in days.
pub const RETENTION_REGULATORY_DAYS: u32 = 3650;
pub const RETENTION_STANDARD_DAYS: u32 = 1095;
pub const RETENTION_EPHEMERAL_DAYS: u32 = 30;

/// Default evidence store capacity: 10 GiB of live content.
pub const EVIDENCE_CAPACITY_BYTES: u64 = 10 * 1024 * 1024 * 1024;

pub const MS_PER_DAY: i64 = 86_400_000;
