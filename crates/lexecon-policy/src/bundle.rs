use lexecon_core::policy::{PolicyBundle, PolicyMode, Relation, RelationKind, Term, TermCategory};
use lexecon_core::risk::RiskWeights;
use lexecon_core::{Hash32, LexeconError, TermId};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// An immutable, validated policy. Once constructed it never changes; a
/// new bundle produces a new `Policy` with a new hash.
#[derive(Debug)]
pub struct Policy {
    mode: PolicyMode,
    hash: Hash32,
    risk_weights: RiskWeights,
    terms: BTreeMap<TermId, Term>,
    /// Relations in canonical (type, subject, action, object) order.
    relations: Vec<Relation>,
}

/// The hashed form: terms sorted by id, relations in canonical order, so
/// that loading the same bundle in any declaration order yields the same
/// version hash.
#[derive(Serialize)]
struct CanonicalPolicy<'a> {
    mode: PolicyMode,
    terms: Vec<&'a Term>,
    relations: &'a [Relation],
    risk_weights: &'a RiskWeights,
}

impl Policy {
    /// Validate and compile a bundle.
    ///
    /// Fails with `PolicyMalformed` when a term id repeats, a relation
    /// references an undefined term, a relation's endpoints have the wrong
    /// categories, or a (type, subject, action, object) tuple repeats.
    pub fn load(bundle: PolicyBundle) -> Result<Self, LexeconError> {
        let mut terms: BTreeMap<TermId, Term> = BTreeMap::new();
        for term in bundle.terms {
            if terms.insert(term.id.clone(), term.clone()).is_some() {
                return Err(LexeconError::PolicyMalformed(format!(
                    "duplicate term id: {}",
                    term.id
                )));
            }
        }

        let mut relations = bundle.relations;
        relations.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut seen: HashSet<String> = HashSet::new();
        for relation in &relations {
            let rid = relation.relation_id();
            if !seen.insert(rid.clone()) {
                return Err(LexeconError::PolicyMalformed(format!(
                    "duplicate relation: {rid}"
                )));
            }
            require_category(&terms, &relation.subject, TermCategory::Actor, &rid)?;
            require_category(&terms, &relation.action, TermCategory::Action, &rid)?;
            if let Some(object) = &relation.object {
                let term = terms.get(object).ok_or_else(|| {
                    LexeconError::PolicyMalformed(format!(
                        "relation {rid} references undefined term {object}"
                    ))
                })?;
                if !matches!(term.category, TermCategory::Resource | TermCategory::DataClass) {
                    return Err(LexeconError::PolicyMalformed(format!(
                        "relation {rid} object {object} must be a resource or data class"
                    )));
                }
            }
        }

        let canonical = CanonicalPolicy {
            mode: bundle.mode,
            terms: terms.values().collect(),
            relations: &relations,
            risk_weights: &bundle.risk_weights,
        };
        let hash = lexecon_crypto::hash_canonical(&canonical)?;

        info!(
            policy_hash = %hash,
            mode = %bundle.mode,
            terms = terms.len(),
            relations = relations.len(),
            "policy loaded"
        );

        Ok(Self {
            mode: bundle.mode,
            hash,
            risk_weights: bundle.risk_weights,
            terms,
            relations,
        })
    }

    pub fn mode(&self) -> PolicyMode {
        self.mode
    }

    /// The canonical content hash serving as the policy version.
    pub fn hash(&self) -> Hash32 {
        self.hash
    }

    pub fn risk_weights(&self) -> &RiskWeights {
        &self.risk_weights
    }

    pub fn term(&self, id: &TermId) -> Option<&Term> {
        self.terms.get(id)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Relations of one kind whose subject and action equal the given ids,
    /// in canonical order.
    pub fn candidates<'a>(
        &'a self,
        kind: RelationKind,
        actor: &'a TermId,
        action: &'a TermId,
    ) -> impl Iterator<Item = &'a Relation> {
        self.relations
            .iter()
            .filter(move |r| r.kind == kind && &r.subject == actor && &r.action == action)
    }

    /// The snapshot form persisted as evidence and exported in bundles:
    /// canonical JSON whose SHA-256 is exactly [`Policy::hash`].
    pub fn snapshot_value(&self) -> Result<serde_json::Value, LexeconError> {
        let canonical = CanonicalPolicy {
            mode: self.mode,
            terms: self.terms.values().collect(),
            relations: &self.relations,
            risk_weights: &self.risk_weights,
        };
        serde_json::to_value(&canonical)
            .map_err(|e| LexeconError::CanonicalEncodingError(e.to_string()))
    }
}

fn require_category(
    terms: &BTreeMap<TermId, Term>,
    id: &TermId,
    expected: TermCategory,
    rid: &str,
) -> Result<(), LexeconError> {
    let term = terms.get(id).ok_or_else(|| {
        LexeconError::PolicyMalformed(format!("relation {rid} references undefined term {id}"))
    })?;
    if term.category != expected {
        return Err(LexeconError::PolicyMalformed(format!(
            "relation {rid} endpoint {id} has category {:?}, expected {:?}",
            term.category, expected
        )));
    }
    Ok(())
}
