//! Capability-based authorization boundary.
//!
//! The engine never inspects credentials itself; it resolves an opaque token
//! through the [`Authorizer`] interface and works with the returned
//! principal. [`TokenTable`] is the in-memory implementation used for
//! embedding and tests; production deployments plug in their own lookup.

use crate::error::{Result, ScheduleError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Everything an operator token can be allowed to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// Read presets, messages, and announcements.
    Read,
    /// Mutate a single schedule date (edits, presets, events, lunch).
    SingleWrite,
    /// Bulk mutations across date ranges (autofill, holidays).
    BulkWrite,
    /// Update the live message and announcement broadcasts.
    EditMessage,
    /// Control the bell scheduler.
    Special,
}

/// An authenticated operator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub capabilities: BTreeSet<Capability>,
}

impl Principal {
    pub fn new(name: impl Into<String>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            name: name.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Token-to-principal resolution.
pub trait Authorizer: Send + Sync {
    /// Resolve `token` and require `capability`.
    ///
    /// Returns [`ScheduleError::Unauthorized`] for unknown tokens and for
    /// principals lacking the capability; callers cannot distinguish the two.
    fn authorize(&self, token: &str, capability: Capability) -> Result<Principal>;
}

/// In-memory token table.
pub struct TokenTable {
    tokens: RwLock<HashMap<String, Principal>>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, token: impl Into<String>, principal: Principal) {
        self.tokens.write().insert(token.into(), principal);
    }

    pub fn remove(&self, token: &str) {
        self.tokens.write().remove(token);
    }
}

impl Default for TokenTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Authorizer for TokenTable {
    fn authorize(&self, token: &str, capability: Capability) -> Result<Principal> {
        let tokens = self.tokens.read();
        match tokens.get(token) {
            Some(principal) if principal.has(capability) => Ok(principal.clone()),
            _ => Err(ScheduleError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_token_with_capability() {
        let table = TokenTable::new();
        table.insert(
            "tok-1",
            Principal::new("ops", [Capability::Read, Capability::SingleWrite]),
        );

        let principal = table.authorize("tok-1", Capability::SingleWrite).unwrap();
        assert_eq!(principal.name, "ops");
    }

    #[test]
    fn test_missing_capability_is_unauthorized() {
        let table = TokenTable::new();
        table.insert("tok-1", Principal::new("ops", [Capability::Read]));

        let err = table.authorize("tok-1", Capability::BulkWrite).unwrap_err();
        assert!(matches!(err, ScheduleError::Unauthorized));
    }

    #[test]
    fn test_unknown_token_is_unauthorized() {
        let table = TokenTable::new();
        let err = table.authorize("nope", Capability::Read).unwrap_err();
        assert!(matches!(err, ScheduleError::Unauthorized));
    }

    #[test]
    fn test_removed_token_stops_working() {
        let table = TokenTable::new();
        table.insert("tok-1", Principal::new("ops", [Capability::Read]));
        table.remove("tok-1");
        assert!(table.authorize("tok-1", Capability::Read).is_err());
    }
}
