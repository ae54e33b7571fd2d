//! Decisions about whether, and in which shape, optional resources exist.
//!
//! Everything here is a pure function of the normalized topology and the
//! handles already created; the builder evaluates each decision exactly once.

use crate::app::cfn_dag::NodeRef;
use crate::app::errors::SynthResult;
use crate::app::topology::{HealthCheckSpec, RuleDirection, RulePeer, SecurityRule, Topology};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A security group is created iff at least one rule was supplied.
pub fn needs_security_group(topology: &Topology) -> bool {
    !topology.ingress_rules.is_empty() || !topology.egress_rules.is_empty()
}

/// Security groups attached to the load balancer: the caller's ids followed
/// by the created group, if any.
pub fn load_balancer_security_groups(external: &[String], created: Option<&NodeRef>) -> Value {
    let mut groups: Vec<Value> = external.iter().cloned().map(Value::String).collect();
    if let Some(group) = created {
        groups.push(group.ref_value());
    }
    Value::Array(groups)
}

/// Render one rule as a `SecurityGroupIngress`/`SecurityGroupEgress` entry.
pub fn security_rule_value(rule: &SecurityRule) -> Value {
    let mut entry = Map::new();
    entry.insert("IpProtocol".into(), json!(rule.protocol));
    if let Some(from) = rule.from_port {
        entry.insert("FromPort".into(), json!(from));
    }
    if let Some(to) = rule.to_port {
        entry.insert("ToPort".into(), json!(to));
    }
    match &rule.peer {
        Some(RulePeer::Cidr(cidr)) => {
            entry.insert("CidrIp".into(), json!(cidr));
        }
        Some(RulePeer::CidrIpv6(cidr)) => {
            entry.insert("CidrIpv6".into(), json!(cidr));
        }
        Some(RulePeer::SecurityGroup(group)) => {
            let key = match rule.direction {
                RuleDirection::Ingress => "SourceSecurityGroupId",
                RuleDirection::Egress => "DestinationSecurityGroupId",
            };
            entry.insert(key.into(), json!(group));
        }
        None => {}
    }
    if let Some(description) = &rule.description {
        entry.insert("Description".into(), json!(description));
    }
    Value::Object(entry)
}

/// Health-check properties of a target group.
///
/// The three required settings and both thresholds are always present.
/// `HealthCheckPort` and `HealthCheckProtocol` appear only when the caller
/// supplied them; there is no fallback to the traffic port.
pub fn health_check_properties(health_check: &HealthCheckSpec) -> BTreeMap<String, Value> {
    let mut properties = BTreeMap::new();
    properties.insert(
        "HealthCheckIntervalSeconds".to_string(),
        json!(health_check.interval_seconds),
    );
    properties.insert("HealthCheckPath".to_string(), json!(health_check.path));
    properties.insert(
        "HealthCheckTimeoutSeconds".to_string(),
        json!(health_check.timeout_seconds),
    );
    properties.insert(
        "HealthyThresholdCount".to_string(),
        json!(health_check.healthy_threshold_count),
    );
    properties.insert(
        "UnhealthyThresholdCount".to_string(),
        json!(health_check.unhealthy_threshold_count),
    );
    properties.insert(
        "Matcher".to_string(),
        json!({ "HttpCode": health_check.success_code_string() }),
    );
    if let Some(port) = &health_check.port {
        properties.insert("HealthCheckPort".to_string(), json!(port));
    }
    if let Some(protocol) = &health_check.protocol {
        properties.insert("HealthCheckProtocol".to_string(), json!(protocol));
    }
    properties
}

/// `Certificates` entries, or `None` when the listener has none.
pub fn certificate_list(certificates: &[String]) -> Option<Value> {
    if certificates.is_empty() {
        return None;
    }
    Some(Value::Array(
        certificates
            .iter()
            .map(|arn| json!({ "CertificateArn": arn }))
            .collect(),
    ))
}

/// The resource an alarm watches, which fixes its dimensions.
#[derive(Debug, Clone, Copy)]
pub enum AlarmOwner<'a> {
    LoadBalancer(&'a NodeRef),
    TargetGroup {
        load_balancer: &'a NodeRef,
        target_group: &'a NodeRef,
    },
}

impl AlarmOwner<'_> {
    /// Logical id the alarm id is derived from
    pub fn logical_id(&self) -> &str {
        match self {
            AlarmOwner::LoadBalancer(load_balancer) => load_balancer.logical_id(),
            AlarmOwner::TargetGroup { target_group, .. } => target_group.logical_id(),
        }
    }

    pub fn dimensions(&self) -> SynthResult<Value> {
        match self {
            AlarmOwner::LoadBalancer(load_balancer) => Ok(json!([
                {"Name": "LoadBalancer", "Value": load_balancer.attribute("LoadBalancerFullName")?}
            ])),
            AlarmOwner::TargetGroup {
                load_balancer,
                target_group,
            } => Ok(json!([
                {"Name": "LoadBalancer", "Value": load_balancer.attribute("LoadBalancerFullName")?},
                {"Name": "TargetGroup", "Value": target_group.attribute("TargetGroupFullName")?}
            ])),
        }
    }
}

/// Key/value list form of a tag map, in key order.
pub fn tag_list(tags: &BTreeMap<String, String>) -> Value {
    Value::Array(
        tags.iter()
            .map(|(key, value)| json!({ "Key": key, "Value": value }))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::cfn_dag::{ResourceGraph, ResourceKind, ResourceNode};
    use pretty_assertions::assert_eq;

    fn health_check() -> HealthCheckSpec {
        HealthCheckSpec {
            interval_seconds: 10,
            path: "/health".into(),
            timeout_seconds: 5,
            healthy_threshold_count: 5,
            unhealthy_threshold_count: 2,
            success_codes: vec!["200".into(), "204".into()],
            port: None,
            protocol: None,
        }
    }

    #[test]
    fn test_health_check_port_is_omitted_when_absent() {
        let properties = health_check_properties(&health_check());
        assert!(!properties.contains_key("HealthCheckPort"));
        assert!(!properties.contains_key("HealthCheckProtocol"));
        assert_eq!(properties["Matcher"], json!({"HttpCode": "200,204"}));
        assert_eq!(properties["HealthCheckPath"], json!("/health"));

        let mut explicit = health_check();
        explicit.port = Some("8080".into());
        explicit.protocol = Some("HTTP".into());
        let properties = health_check_properties(&explicit);
        assert_eq!(properties["HealthCheckPort"], json!("8080"));
        assert_eq!(properties["HealthCheckProtocol"], json!("HTTP"));
    }

    #[test]
    fn test_created_group_is_appended_after_external_ids() {
        let mut graph = ResourceGraph::new();
        let sg = graph
            .add_node(ResourceNode::new("SECGROUP", ResourceKind::SecurityGroup))
            .unwrap();

        assert_eq!(
            load_balancer_security_groups(&["sg-ext".to_string()], Some(&sg)),
            json!(["sg-ext", {"Ref": "SECGROUP"}])
        );
        assert_eq!(load_balancer_security_groups(&[], None), json!([]));
    }

    #[test]
    fn test_rule_rendering_keeps_peer_direction() {
        let rule = SecurityRule {
            direction: RuleDirection::Egress,
            protocol: "tcp".into(),
            from_port: Some(443),
            to_port: Some(443),
            peer: Some(RulePeer::SecurityGroup("sg-1".into())),
            description: Some("to api".into()),
        };
        assert_eq!(
            security_rule_value(&rule),
            json!({
                "IpProtocol": "tcp",
                "FromPort": 443,
                "ToPort": 443,
                "DestinationSecurityGroupId": "sg-1",
                "Description": "to api"
            })
        );
    }

    #[test]
    fn test_certificates_only_when_present() {
        assert_eq!(certificate_list(&[]), None);
        assert_eq!(
            certificate_list(&["arn:cert".to_string()]),
            Some(json!([{"CertificateArn": "arn:cert"}]))
        );
    }

    #[test]
    fn test_target_group_alarm_has_two_dimensions() {
        let mut graph = ResourceGraph::new();
        let alb = graph
            .add_node(
                ResourceNode::new("ALB", ResourceKind::LoadBalancer)
                    .attributes(&["LoadBalancerFullName"]),
            )
            .unwrap();
        let tg = graph
            .add_node(
                ResourceNode::new("TARGET80", ResourceKind::TargetGroup)
                    .attributes(&["TargetGroupFullName"]),
            )
            .unwrap();

        let owner = AlarmOwner::TargetGroup {
            load_balancer: &alb,
            target_group: &tg,
        };
        assert_eq!(owner.logical_id(), "TARGET80");
        assert_eq!(
            owner.dimensions().unwrap(),
            json!([
                {"Name": "LoadBalancer", "Value": {"Fn::GetAtt": ["ALB", "LoadBalancerFullName"]}},
                {"Name": "TargetGroup", "Value": {"Fn::GetAtt": ["TARGET80", "TargetGroupFullName"]}}
            ])
        );
        assert_eq!(
            AlarmOwner::LoadBalancer(&alb).dimensions().unwrap(),
            json!([{"Name": "LoadBalancer", "Value": {"Fn::GetAtt": ["ALB", "LoadBalancerFullName"]}}])
        );
    }
}
