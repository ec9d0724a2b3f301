//!
//! Read-only fact tables and the lookup interface the evaluator resolves against.
//!
//! Defines:
//! - the three table row types (`Security`, `Attribute`, `Fact`),
//! - the lookup trait the evaluator depends on (`FactSource`),
//! - an indexed in-memory implementation (`FactStore`) with JSON loaders.
//!
//! Tables are immutable once a `FactStore` is built; share it by reference
//! across as many concurrent evaluations as needed.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub type SecurityId = u32;
pub type AttributeId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Security {
    pub id: SecurityId,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A stored value for one `(security_id, attribute_id)` pair.
pub struct Fact {
    pub security_id: SecurityId,
    pub attribute_id: AttributeId,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
/// A lookup that matched no row. Expected at evaluation time, never fatal.
pub enum LookupError {
    #[error("unknown security: {0}")]
    UnknownSecurity(String),
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),
    #[error("no fact for security {security_id}, attribute {attribute_id}")]
    MissingFact { security_id: SecurityId, attribute_id: AttributeId },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate security symbol: {0}")]
    DuplicateSymbol(String),
    #[error("duplicate security id: {0}")]
    DuplicateSecurityId(SecurityId),
    #[error("duplicate attribute name: {0}")]
    DuplicateAttributeName(String),
    #[error("duplicate attribute id: {0}")]
    DuplicateAttributeId(AttributeId),
    #[error("duplicate fact for security {security_id}, attribute {attribute_id}")]
    DuplicateFact { security_id: SecurityId, attribute_id: AttributeId },
    #[error("invalid {table} table: {source}")]
    Json { table: &'static str, #[source] source: serde_json::Error },
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

/// Lookup interface used by the evaluator.
///
/// Translates human-readable names into internal ids and ids into values.
/// Implementations must be read-only for the duration of an evaluation.
pub trait FactSource: Send + Sync {
    fn resolve_security_id(&self, symbol: &str) -> Result<SecurityId, LookupError>;
    fn resolve_attribute_id(&self, name: &str) -> Result<AttributeId, LookupError>;
    fn lookup_fact_value(&self, security_id: SecurityId, attribute_id: AttributeId) -> Result<f64, LookupError>;
}

const SECURITIES_FILE: &str = "securities.json";
const ATTRIBUTES_FILE: &str = "attributes.json";
const FACTS_FILE: &str = "facts.json";

/// Indexed, immutable fact tables.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    securities: Vec<Security>,
    attributes: Vec<Attribute>,
    security_ids: HashMap<String, SecurityId>,
    attribute_ids: HashMap<String, AttributeId>,
    facts: HashMap<(SecurityId, AttributeId), f64>,
}

impl FactStore {
    /// Builds the indices, rejecting duplicate symbols, names, ids and fact keys.
    ///
    /// Facts pointing at ids absent from the other tables are kept; they are
    /// simply unreachable through name resolution.
    pub fn new(securities: Vec<Security>, attributes: Vec<Attribute>, facts: Vec<Fact>) -> Result<Self, StoreError> {
        let mut security_ids = HashMap::with_capacity(securities.len());
        let mut seen_security_ids = HashSet::with_capacity(securities.len());
        for s in &securities {
            if !seen_security_ids.insert(s.id) {
                return Err(StoreError::DuplicateSecurityId(s.id));
            }
            if security_ids.insert(s.symbol.clone(), s.id).is_some() {
                return Err(StoreError::DuplicateSymbol(s.symbol.clone()));
            }
        }

        let mut attribute_ids = HashMap::with_capacity(attributes.len());
        let mut seen_attribute_ids = HashSet::with_capacity(attributes.len());
        for a in &attributes {
            if !seen_attribute_ids.insert(a.id) {
                return Err(StoreError::DuplicateAttributeId(a.id));
            }
            if attribute_ids.insert(a.name.clone(), a.id).is_some() {
                return Err(StoreError::DuplicateAttributeName(a.name.clone()));
            }
        }

        let mut values = HashMap::with_capacity(facts.len());
        for f in facts {
            if values.insert((f.security_id, f.attribute_id), f.value).is_some() {
                return Err(StoreError::DuplicateFact { security_id: f.security_id, attribute_id: f.attribute_id });
            }
        }

        Ok(Self { securities, attributes, security_ids, attribute_ids, facts: values })
    }

    /// Builds a store from the three tables as JSON arrays.
    pub fn from_json_tables(securities: &str, attributes: &str, facts: &str) -> Result<Self, StoreError> {
        let securities = serde_json::from_str(securities).map_err(|source| StoreError::Json { table: "securities", source })?;
        let attributes = serde_json::from_str(attributes).map_err(|source| StoreError::Json { table: "attributes", source })?;
        let facts = serde_json::from_str(facts).map_err(|source| StoreError::Json { table: "facts", source })?;
        Self::new(securities, attributes, facts)
    }

    /// Loads `securities.json`, `attributes.json` and `facts.json` from `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let read = |name: &str| {
            let path = dir.join(name);
            fs::read_to_string(&path).map_err(|source| StoreError::Io { path, source })
        };
        let store = Self::from_json_tables(&read(SECURITIES_FILE)?, &read(ATTRIBUTES_FILE)?, &read(FACTS_FILE)?)?;
        info!(dir = %dir.display(), securities = store.securities.len(), attributes = store.attributes.len(),
            facts = store.facts.len(), "fact store loaded");
        Ok(store)
    }

    /// The dataset shipped with this crate.
    pub fn bundled() -> Result<Self, StoreError> {
        Self::from_json_tables(
            include_str!("../data/securities.json"),
            include_str!("../data/attributes.json"),
            include_str!("../data/facts.json"),
        )
    }

    pub fn securities(&self) -> &[Security] { &self.securities }
    pub fn attributes(&self) -> &[Attribute] { &self.attributes }
    pub fn fact_count(&self) -> usize { self.facts.len() }

    pub fn contains_security(&self, symbol: &str) -> bool { self.security_ids.contains_key(symbol) }
    pub fn contains_attribute(&self, name: &str) -> bool { self.attribute_ids.contains_key(name) }
}

impl FactSource for FactStore {
    fn resolve_security_id(&self, symbol: &str) -> Result<SecurityId, LookupError> {
        self.security_ids.get(symbol).copied().ok_or_else(|| LookupError::UnknownSecurity(symbol.to_string()))
    }

    fn resolve_attribute_id(&self, name: &str) -> Result<AttributeId, LookupError> {
        self.attribute_ids.get(name).copied().ok_or_else(|| LookupError::UnknownAttribute(name.to_string()))
    }

    fn lookup_fact_value(&self, security_id: SecurityId, attribute_id: AttributeId) -> Result<f64, LookupError> {
        self.facts
            .get(&(security_id, attribute_id))
            .copied()
            .ok_or(LookupError::MissingFact { security_id, attribute_id })
    }
}
