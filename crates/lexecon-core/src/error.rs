use thiserror::Error;

#[derive(Debug, Error)]
pub enum LexeconError {
    // ── Input errors ─────────────────────────────────────────────────────────
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("unknown policy: {0}")]
    UnknownPolicy(String),

    #[error("unknown artifact: {0}")]
    UnknownArtifact(String),

    // ── State errors ─────────────────────────────────────────────────────────
    #[error("no active policy loaded")]
    PolicyNotLoaded,

    #[error("policy malformed: {0}")]
    PolicyMalformed(String),

    #[error("evidence store full: capacity {capacity} bytes, requested {requested}")]
    EvidenceStoreFull { capacity: u64, requested: u64 },

    #[error("artifact exceeds maximum size: max {max} bytes, got {got}")]
    ArtifactTooLarge { max: u64, got: u64 },

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("ledger corrupt at seq {seq}: {reason}")]
    LedgerCorrupt { seq: u64, reason: String },

    // ── Crypto errors ────────────────────────────────────────────────────────
    #[error("signing error: {0}")]
    SigningError(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("key material error: {0}")]
    KeyMaterialError(String),

    #[error("unknown issuer key: {0}")]
    UnknownIssuer(String),

    // ── Encoding / storage ───────────────────────────────────────────────────
    #[error("canonical encoding error: {0}")]
    CanonicalEncodingError(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── Ops errors ───────────────────────────────────────────────────────────
    #[error("deadline elapsed during {0}")]
    Timeout(String),

    #[error("operation cancelled before signing")]
    Cancelled,

    #[error("ledger writer queue full")]
    Backpressure,
}

impl LexeconError {
    /// Whether the caller may safely retry the same request.
    ///
    /// Retry-safe failures happened before any signed state was produced;
    /// the others indicate broken key material or corrupt state where a
    /// blind retry could mask the fault.
    pub fn is_retry_safe(&self) -> bool {
        matches!(
            self,
            LexeconError::LedgerUnavailable(_)
                | LexeconError::Timeout(_)
                | LexeconError::Backpressure
                | LexeconError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_safety_split() {
        assert!(LexeconError::LedgerUnavailable("down".into()).is_retry_safe());
        assert!(LexeconError::Timeout("append".into()).is_retry_safe());
        assert!(LexeconError::Backpressure.is_retry_safe());
        assert!(!LexeconError::SigningError("bad key".into()).is_retry_safe());
        assert!(!LexeconError::KeyMaterialError("corrupt".into()).is_retry_safe());
    }
}
