use crate::bundle::Policy;
use lexecon_core::{Hash32, LexeconError};
use std::sync::{Arc, RwLock};

/// The versioned pointer holding the active policy.
///
/// Readers take one `Arc` snapshot per evaluation and see either the old
/// or the new policy, never a mix; writers swap the pointer whole. The
/// policy value itself is immutable after construction.
#[derive(Default)]
pub struct PolicySlot {
    inner: RwLock<Option<Arc<Policy>>>,
}

impl PolicySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new policy, returning the shared handle.
    pub fn install(&self, policy: Policy) -> Arc<Policy> {
        let arc = Arc::new(policy);
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Arc::clone(&arc));
        arc
    }

    /// Snapshot the active policy for one evaluation.
    pub fn snapshot(&self) -> Result<Arc<Policy>, LexeconError> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
            .ok_or(LexeconError::PolicyNotLoaded)
    }

    /// Version hash of the active policy, if any.
    pub fn current_hash(&self) -> Option<Hash32> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|p| p.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexecon_core::policy::PolicyBundle;
    use serde_json::json;

    fn make_policy(mode: &str) -> Policy {
        let bundle: PolicyBundle = serde_json::from_value(json!({
            "mode": mode,
            "terms": [],
            "relations": []
        }))
        .unwrap();
        Policy::load(bundle).unwrap()
    }

    #[test]
    fn empty_slot_reports_policy_not_loaded() {
        let slot = PolicySlot::new();
        assert!(matches!(
            slot.snapshot().unwrap_err(),
            LexeconError::PolicyNotLoaded
        ));
        assert!(slot.current_hash().is_none());
    }

    #[test]
    fn install_swaps_whole_policy() {
        let slot = PolicySlot::new();
        let first = slot.install(make_policy("STRICT"));
        let snap = slot.snapshot().unwrap();
        assert_eq!(snap.hash(), first.hash());

        let second = slot.install(make_policy("PERMISSIVE"));
        assert_ne!(first.hash(), second.hash());
        // The old snapshot is still usable; the slot serves the new one.
        assert_eq!(snap.hash(), first.hash());
        assert_eq!(slot.snapshot().unwrap().hash(), second.hash());
    }
}
