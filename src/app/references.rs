//! Target-group name resolution.
//!
//! A build first fills a [`ReferenceTable`] while creating target groups, then
//! seals it into a [`ReferenceResolver`] before any listener is wired. The
//! split makes "resolve before every target group is registered" impossible
//! to write.

use crate::app::cfn_dag::NodeRef;
use crate::app::errors::{SynthError, SynthResult};
use indexmap::IndexMap;

/// Target-group name -> node, filled during the target-group stage.
#[derive(Debug, Default)]
pub struct ReferenceTable {
    entries: IndexMap<String, NodeRef>,
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node` under `name`. Names are the keys listeners use, so a
    /// second target group with the same name is rejected.
    pub fn register(&mut self, name: &str, node: NodeRef) -> SynthResult<NodeRef> {
        if self.entries.contains_key(name) {
            return Err(SynthError::duplicate("target group name", name));
        }
        self.entries.insert(name.to_string(), node.clone());
        Ok(node)
    }

    /// Stop accepting registrations and start answering lookups.
    pub fn seal(self) -> ReferenceResolver {
        ReferenceResolver {
            entries: self.entries,
        }
    }
}

/// Read-only view of a complete [`ReferenceTable`].
#[derive(Debug)]
pub struct ReferenceResolver {
    entries: IndexMap<String, NodeRef>,
}

impl ReferenceResolver {
    /// Look up a target group by name; `referenced_by` describes the caller
    /// for the error message.
    pub fn resolve(&self, name: &str, referenced_by: &str) -> SynthResult<&NodeRef> {
        self.entries
            .get(name)
            .ok_or_else(|| SynthError::unresolved("target group", name, referenced_by))
    }
}
