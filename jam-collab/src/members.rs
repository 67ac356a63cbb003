use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Guest,
    Host,
}

/// A participant of a jam
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub id: String,
    pub permissions: HashSet<Permission>,
}

impl Member {
    /// A host is always a guest too.
    pub fn new(id: &str, permissions: &[Permission]) -> Self {
        let mut permissions: HashSet<_> = permissions.iter().copied().collect();

        if permissions.contains(&Permission::Host) {
            permissions.insert(Permission::Guest);
        }

        Self {
            id: id.to_string(),
            permissions,
        }
    }

    /// Returns true if the member holds every one of `required`.
    pub fn has_permissions(&self, required: &[Permission]) -> bool {
        required.iter().all(|p| self.permissions.contains(p))
    }

    pub fn is_host(&self) -> bool {
        self.permissions.contains(&Permission::Host)
    }
}

/// The members of one jam, keyed by identity.
#[derive(Debug, Default)]
pub struct Members {
    inner: RwLock<HashMap<String, Member>>,
}

impl Members {
    /// Adds a member, returning false if the identity is already a member.
    pub fn add(&self, id: &str, permissions: &[Permission]) -> bool {
        let mut inner = self.inner.write();

        if inner.contains_key(id) {
            return false;
        }

        inner.insert(id.to_string(), Member::new(id, permissions));
        true
    }

    pub fn remove(&self, id: &str) -> Option<Member> {
        self.inner.write().remove(id)
    }

    pub fn get(&self, id: &str) -> Option<Member> {
        self.inner.read().get(id).cloned()
    }

    /// False for identities that are not members.
    pub fn has_permissions(&self, id: &str, required: &[Permission]) -> bool {
        self.inner
            .read()
            .get(id)
            .is_some_and(|m| m.has_permissions(required))
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
