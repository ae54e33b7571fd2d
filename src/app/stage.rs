//! Build stages, used to tag log records and to report where a build failed.

use std::fmt;

/// One step of a synthesis run. Load-balancer builds walk the first seven in
/// declaration order; the role and distribution builders use their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildStage {
    Normalize,
    SecurityGroup,
    LoadBalancer,
    TargetGroups,
    Listeners,
    TopLevelAlarms,
    CollectOutputs,
    Roles,
    Policy,
    Distribution,
    /// Reading settings and configuration documents
    Load,
    Emit,
}

impl BuildStage {
    pub fn name(&self) -> &'static str {
        match self {
            BuildStage::Normalize => "normalize",
            BuildStage::SecurityGroup => "security-group",
            BuildStage::LoadBalancer => "load-balancer",
            BuildStage::TargetGroups => "target-groups",
            BuildStage::Listeners => "listeners",
            BuildStage::TopLevelAlarms => "top-level-alarms",
            BuildStage::CollectOutputs => "collect-outputs",
            BuildStage::Roles => "roles",
            BuildStage::Policy => "policy",
            BuildStage::Distribution => "distribution",
            BuildStage::Load => "load",
            BuildStage::Emit => "emit",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
