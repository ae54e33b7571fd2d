//! IAM role builder.
//!
//! Creates one role per EC2 and Lambda role name, optionally an instance
//! profile per EC2 role, and a single inline policy shared by every role when
//! policy statements are supplied. A configuration without any role is
//! rejected before anything is created.

use crate::app::cfn_dag::{NodeRef, ResourceGraph, ResourceKind, ResourceNode};
use crate::app::cfn_intrinsic_functions::{get_att, reference, sub};
use crate::app::errors::{SynthError, SynthResult};
use crate::app::identifiers::{instance_profile_id, role_id, IdentifierRegistry, POLICY_ID};
use crate::app::outputs::{OutputCollector, SynthesizedStack};
use crate::app::stage::BuildStage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const POLICY_LANGUAGE_VERSION: &str = "2012-10-17";

/// Role configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RolesConfig {
    /// Managed policy ARNs attached to every role
    pub attached_policies: Option<Vec<String>>,
    pub ec2_roles: Option<Vec<String>>,
    pub lambda_roles: Option<Vec<String>>,
    /// Create an instance profile for each EC2 role
    pub instance_profile: Option<bool>,
    /// Statements of the shared inline policy; none means no policy
    pub policy_statements: Option<Vec<Value>>,
}

/// Service allowed to assume a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleService {
    Ec2,
    Lambda,
}

impl RoleService {
    pub fn principal(&self) -> &'static str {
        match self {
            RoleService::Ec2 => "ec2.amazonaws.com",
            RoleService::Lambda => "lambda.amazonaws.com",
        }
    }

    /// Trust policy letting this service assume the role
    pub fn assume_role_policy(&self) -> Value {
        json!({
            "Version": POLICY_LANGUAGE_VERSION,
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"Service": [self.principal()]},
                "Action": ["sts:AssumeRole"]
            }]
        })
    }
}

/// Build the role graph for `config`.
pub fn synthesize_roles(config: &RolesConfig) -> SynthResult<SynthesizedStack> {
    let result = RolesBuilder::new(config).and_then(RolesBuilder::build);
    if let Err(err) = &result {
        synth_error!(BuildStage::Roles, "role build failed: {}", err);
    }
    result
}

#[derive(Debug)]
pub struct RolesBuilder {
    roles: Vec<(String, RoleService)>,
    attached_policies: Vec<String>,
    instance_profile: bool,
    statements: Vec<Value>,
    graph: ResourceGraph,
    identifiers: IdentifierRegistry,
}

impl RolesBuilder {
    /// Validate `config`; fails with `EmptyTopology` when it names no role.
    pub fn new(config: &RolesConfig) -> SynthResult<Self> {
        synth_debug!(BuildStage::Normalize, "normalizing role configuration");

        let roles: Vec<(String, RoleService)> = config
            .ec2_roles
            .iter()
            .flatten()
            .map(|name| (name.clone(), RoleService::Ec2))
            .chain(
                config
                    .lambda_roles
                    .iter()
                    .flatten()
                    .map(|name| (name.clone(), RoleService::Lambda)),
            )
            .collect();
        if roles.is_empty() {
            return Err(SynthError::EmptyTopology(
                "no EC2 or Lambda roles are defined".to_string(),
            ));
        }

        let statements = config.policy_statements.clone().unwrap_or_default();
        if let Some(index) = statements.iter().position(|s| !s.is_object()) {
            return Err(SynthError::invalid(
                "roles",
                format!("PolicyStatements[{}]", index),
                "must be a statement object",
            ));
        }

        Ok(Self {
            roles,
            attached_policies: config.attached_policies.clone().unwrap_or_default(),
            instance_profile: config.instance_profile.unwrap_or(false),
            statements,
            graph: ResourceGraph::new(),
            identifiers: IdentifierRegistry::new(),
        })
    }

    pub fn build(mut self) -> SynthResult<SynthesizedStack> {
        synth_debug!(BuildStage::Roles, "creating {} roles", self.roles.len());
        let mut created = Vec::with_capacity(self.roles.len());
        for (name, service) in self.roles.clone() {
            let role = self.create_role(&name, service)?;
            if service == RoleService::Ec2 && self.instance_profile {
                self.create_instance_profile(&role)?;
            }
            created.push(role);
        }

        self.create_policy(&created)?;

        let stack = OutputCollector::finish(self.graph)?;
        synth_info!(
            BuildStage::CollectOutputs,
            "roles synthesized: {} resources, {} outputs",
            stack.graph.len(),
            stack.outputs.len()
        );
        Ok(stack)
    }

    fn create_role(&mut self, name: &str, service: RoleService) -> SynthResult<NodeRef> {
        let id = self.identifiers.claim(ResourceKind::Role, role_id(name)?)?;

        let managed = if self.attached_policies.is_empty() {
            None
        } else {
            Some(self.attached_policies.clone())
        };
        let node = ResourceNode::new(&id, ResourceKind::Role)
            .property("AssumeRolePolicyDocument", service.assume_role_policy())
            .optional_property("ManagedPolicyArns", managed)
            .attributes(&["Arn"])
            .output(format!("{}RoleName", id), reference(&id))
            .output(format!("{}RoleArn", id), get_att(&id, "Arn"));

        self.graph.add_node(node)
    }

    fn create_instance_profile(&mut self, role: &NodeRef) -> SynthResult<NodeRef> {
        let id = self.identifiers.claim(
            ResourceKind::InstanceProfile,
            instance_profile_id(role.logical_id()),
        )?;

        let node = ResourceNode::new(&id, ResourceKind::InstanceProfile)
            .property("Roles", json!([role.ref_value()]))
            .attributes(&["Arn"])
            .output(format!("{}Arn", id), get_att(&id, "Arn"));

        self.graph.add_node(node)
    }

    fn create_policy(&mut self, roles: &[NodeRef]) -> SynthResult<Option<NodeRef>> {
        if self.statements.is_empty() {
            synth_debug!(BuildStage::Policy, "no policy statements, skipping policy");
            return Ok(None);
        }
        synth_debug!(
            BuildStage::Policy,
            "creating policy with {} statements",
            self.statements.len()
        );

        let id = self
            .identifiers
            .claim(ResourceKind::Policy, POLICY_ID.to_string())?;
        let role_refs: Vec<Value> = roles.iter().map(NodeRef::ref_value).collect();

        let node = ResourceNode::new(&id, ResourceKind::Policy)
            .property("PolicyName", sub("${AWS::StackName}-policy"))
            .property(
                "PolicyDocument",
                json!({
                    "Version": POLICY_LANGUAGE_VERSION,
                    "Statement": self.statements,
                }),
            )
            .property("Roles", role_refs)
            .output("PolicyName", reference(&id));

        self.graph.add_node(node).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_trust_policy_names_the_service() {
        assert_eq!(
            RoleService::Lambda.assume_role_policy()["Statement"][0]["Principal"],
            json!({"Service": ["lambda.amazonaws.com"]})
        );
    }

    #[test]
    fn test_non_object_statement_is_rejected() {
        let config = RolesConfig {
            ec2_roles: Some(vec!["web".into()]),
            policy_statements: Some(vec![json!("s3:*")]),
            ..Default::default()
        };
        assert_eq!(
            RolesBuilder::new(&config).unwrap_err(),
            SynthError::invalid("roles", "PolicyStatements[0]", "must be a statement object")
        );
    }

    #[test]
    fn test_instance_profiles_follow_their_role() {
        let config = RolesConfig {
            ec2_roles: Some(vec!["web".into()]),
            lambda_roles: Some(vec!["worker".into()]),
            instance_profile: Some(true),
            ..Default::default()
        };
        let stack = synthesize_roles(&config).unwrap();

        assert_eq!(
            stack.graph.logical_ids(),
            vec!["web", "webInstanceProfile", "worker"]
        );
        assert_eq!(stack.graph.dependencies("webInstanceProfile"), vec!["web"]);
        assert!(stack
            .output_names()
            .contains(&"webInstanceProfileArn".to_string()));
    }
}
