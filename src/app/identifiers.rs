//! Logical identifier derivation.
//!
//! Identifiers are derived from a semantic key (a port, a metric name, a role
//! name) so the same topology always yields the same ids. Derived ids are
//! sanitized to ASCII alphanumerics and capped to the provider's limit.
//! [`IdentifierRegistry`] tracks the ids handed out during one build and
//! turns a collision between siblings into `DuplicateResource`.

use crate::app::cfn_dag::ResourceKind;
use crate::app::errors::{SynthError, SynthResult};
use std::collections::HashSet;

/// CloudFormation's limit on logical ids
pub const MAX_LOGICAL_ID_LEN: usize = 255;
/// Target-group ids double as the target-group name prefix, which is shorter
pub const MAX_TARGET_GROUP_ID_LEN: usize = 32;

pub const SECURITY_GROUP_ID: &str = "SECGROUP";
pub const LOAD_BALANCER_ID: &str = "ALB";
pub const POLICY_ID: &str = "Policy";
pub const DISTRIBUTION_ID: &str = "CFDIST";

/// Strip everything that is not an ASCII letter or digit.
pub fn sanitize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

fn capped(mut id: String, limit: usize) -> String {
    // ids are ASCII after sanitizing, so byte truncation is safe
    id.truncate(limit);
    id
}

pub fn target_group_id(port: u16) -> String {
    capped(format!("TARGET{}", port), MAX_TARGET_GROUP_ID_LEN)
}

pub fn listener_id(port: u16) -> String {
    capped(format!("LISTENER{}", port), MAX_LOGICAL_ID_LEN)
}

/// `<owner>Alarm<metric>` with the metric's `_` and `-` (and anything else
/// illegal) removed.
pub fn alarm_id(owner_id: &str, metric_name: &str) -> String {
    capped(
        format!("{}Alarm{}", sanitize(owner_id), sanitize(metric_name)),
        MAX_LOGICAL_ID_LEN,
    )
}

/// Role ids are the sanitized role name; a name with no usable characters is
/// rejected.
pub fn role_id(name: &str) -> SynthResult<String> {
    let id = capped(sanitize(name), MAX_LOGICAL_ID_LEN);
    if id.is_empty() {
        return Err(SynthError::invalid(
            format!("role '{}'", name),
            "Name",
            "must contain at least one letter or digit",
        ));
    }
    Ok(id)
}

pub fn instance_profile_id(role_id: &str) -> String {
    capped(format!("{}InstanceProfile", role_id), MAX_LOGICAL_ID_LEN)
}

/// Ids handed out during one build, per resource kind.
#[derive(Debug, Default)]
pub struct IdentifierRegistry {
    claimed: HashSet<(ResourceKind, String)>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `id` for a resource of `kind`; fails if a sibling already has it.
    pub fn claim(&mut self, kind: ResourceKind, id: String) -> SynthResult<String> {
        if !self.claimed.insert((kind, id.clone())) {
            return Err(SynthError::duplicate(kind.label(), id));
        }
        Ok(id)
    }
}
