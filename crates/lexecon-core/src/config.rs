use crate::constants::*;
use serde::{Deserialize, Serialize};

/// Operator-tunable gateway parameters. Loaded from a JSON file at startup;
/// every field has a default so an empty object is a valid config.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Capability token TTL granted when the caller does not request one.
    pub token_default_ttl_secs: u64,

    /// Hard ceiling on capability token TTL; mint clamps to this.
    pub token_max_ttl_secs: u64,

    /// Deadline for one ledger append, milliseconds.
    pub ledger_append_timeout_ms: u64,

    /// Deadline for one evidence put, milliseconds.
    pub evidence_put_timeout_ms: u64,

    /// Bound on the ledger writer queue; a full queue fails fast.
    pub ledger_queue_bound: usize,

    /// PARANOID mode permits only when the caller risk hint is at or below
    /// this value.
    pub paranoid_hint_max: u8,

    /// Total live content bytes the evidence store accepts.
    pub evidence_capacity_bytes: u64,

    /// Retention durations per retention class.
    pub retention: RetentionConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token_default_ttl_secs: TOKEN_DEFAULT_TTL_SECS,
            token_max_ttl_secs: TOKEN_MAX_TTL_SECS,
            ledger_append_timeout_ms: LEDGER_APPEND_TIMEOUT_MS,
            evidence_put_timeout_ms: EVIDENCE_PUT_TIMEOUT_MS,
            ledger_queue_bound: LEDGER_QUEUE_BOUND,
            paranoid_hint_max: PARANOID_HINT_MAX_DEFAULT,
            evidence_capacity_bytes: EVIDENCE_CAPACITY_BYTES,
            retention: RetentionConfig::default(),
        }
    }
}

/// Days each retention class keeps artifact content before the
/// anonymization sweep replaces it with its hash.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    pub regulatory_days: u32,
    pub standard_days: u32,
    pub ephemeral_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            regulatory_days: RETENTION_REGULATORY_DAYS,
            standard_days: RETENTION_STANDARD_DAYS,
            ephemeral_days: RETENTION_EPHEMERAL_DAYS,
        }
    }
}
