//! Load-balancer topology: the raw configuration document and its normalized form.
//!
//! The `*Config` types mirror the declarative configuration one to one
//! (PascalCase keys, every field optional) and are what the loaders
//! deserialize. [`crate::app::normalizer::normalize_topology`] validates them
//! once and produces the `*Spec` types, which carry no optional field that has
//! a default. Builders only ever see the normalized form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Raw configuration
// ---------------------------------------------------------------------------

/// Root of a load-balancer configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopologyConfig {
    pub name: Option<String>,
    pub scheme: Option<String>,
    #[serde(rename = "Type")]
    pub load_balancer_type: Option<String>,
    pub ip_address_type: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_ids: Option<Vec<String>>,
    /// Externally managed security group ids
    pub security_groups: Option<Vec<String>>,
    pub ingress_rules: Option<Vec<SecurityRuleConfig>>,
    pub egress_rules: Option<Vec<SecurityRuleConfig>>,
    pub tags: Option<BTreeMap<String, String>>,
    pub target_groups: Option<Vec<TargetGroupConfig>>,
    pub listeners: Option<Vec<ListenerConfig>>,
    pub alarms: Option<Vec<AlarmConfig>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityRuleConfig {
    pub ip_protocol: Option<String>,
    /// Shorthand for `FromPort == ToPort`
    pub port: Option<i32>,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub cidr_ip: Option<String>,
    pub cidr_ipv6: Option<String>,
    pub source_security_group_id: Option<String>,
    pub destination_security_group_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TargetGroupConfig {
    pub name: Option<String>,
    pub port: Option<u32>,
    pub protocol: Option<String>,
    pub target_type: Option<String>,
    pub targets: Option<Vec<String>>,
    pub health_check: Option<HealthCheckConfig>,
    pub tags: Option<BTreeMap<String, String>>,
    pub alarms: Option<Vec<AlarmConfig>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheckConfig {
    pub interval_seconds: Option<u32>,
    pub path: Option<String>,
    pub timeout_seconds: Option<u32>,
    pub healthy_threshold_count: Option<u32>,
    pub unhealthy_threshold_count: Option<u32>,
    pub success_codes: Option<Vec<SuccessCode>>,
    pub port: Option<HealthCheckPort>,
    pub protocol: Option<String>,
}

/// A matcher entry: a status code or a range such as `"200-299"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SuccessCode {
    Code(u16),
    Text(String),
}

impl fmt::Display for SuccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuccessCode::Code(code) => write!(f, "{}", code),
            SuccessCode::Text(text) => f.write_str(text),
        }
    }
}

/// Explicit health-check port: a number or the literal `traffic-port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HealthCheckPort {
    Number(u32),
    Named(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListenerConfig {
    pub port: Option<u32>,
    pub protocol: Option<String>,
    pub certificates: Option<Vec<String>>,
    pub default_actions: Option<Vec<DefaultActionConfig>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DefaultActionConfig {
    pub target_group: Option<String>,
    #[serde(rename = "Type")]
    pub action_type: Option<String>,
}

/// Alarm as written by the caller. Has no `Dimensions` field: dimensions
/// always come from the resource that owns the alarm.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlarmConfig {
    pub metric_name: Option<String>,
    pub namespace: Option<String>,
    pub comparison_operator: Option<String>,
    pub threshold: Option<Threshold>,
    pub evaluation_periods: Option<u32>,
    pub period: Option<u32>,
    pub statistic: Option<String>,
    pub alarm_description: Option<String>,
    pub actions_enabled: Option<bool>,
    pub alarm_actions: Option<Vec<String>>,
    #[serde(rename = "OKActions")]
    pub ok_actions: Option<Vec<String>>,
    pub insufficient_data_actions: Option<Vec<String>>,
    pub treat_missing_data: Option<String>,
}

/// Thresholds show up both as numbers and as quoted strings in practice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Number(f64),
    Text(String),
}

// ---------------------------------------------------------------------------
// Normalized topology
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadBalancerType {
    Application,
    Network,
    Gateway,
}

impl LoadBalancerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerType::Application => "application",
            LoadBalancerType::Network => "network",
            LoadBalancerType::Gateway => "gateway",
        }
    }

    /// CloudWatch namespace alarms default to
    pub fn metric_namespace(&self) -> &'static str {
        match self {
            LoadBalancerType::Application => "AWS/ApplicationELB",
            LoadBalancerType::Network => "AWS/NetworkELB",
            LoadBalancerType::Gateway => "AWS/GatewayELB",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "application" => Some(LoadBalancerType::Application),
            "network" => Some(LoadBalancerType::Network),
            "gateway" => Some(LoadBalancerType::Gateway),
            _ => None,
        }
    }
}

/// Fully defaulted load-balancer topology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topology {
    pub name: String,
    pub scheme: String,
    pub load_balancer_type: LoadBalancerType,
    pub ip_address_type: String,
    pub vpc_id: String,
    pub subnet_ids: Vec<String>,
    pub security_groups: Vec<String>,
    pub ingress_rules: Vec<SecurityRule>,
    pub egress_rules: Vec<SecurityRule>,
    pub tags: BTreeMap<String, String>,
    pub target_groups: Vec<TargetGroupSpec>,
    pub listeners: Vec<ListenerSpec>,
    pub alarms: Vec<AlarmSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleDirection {
    Ingress,
    Egress,
}

impl fmt::Display for RuleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleDirection::Ingress => f.write_str("ingress"),
            RuleDirection::Egress => f.write_str("egress"),
        }
    }
}

/// Where traffic for a rule comes from (ingress) or goes to (egress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RulePeer {
    Cidr(String),
    CidrIpv6(String),
    SecurityGroup(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityRule {
    pub direction: RuleDirection,
    pub protocol: String,
    pub from_port: Option<i32>,
    pub to_port: Option<i32>,
    pub peer: Option<RulePeer>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetGroupSpec {
    pub name: String,
    pub port: u16,
    pub protocol: String,
    pub target_type: String,
    pub targets: Vec<String>,
    pub health_check: HealthCheckSpec,
    pub tags: BTreeMap<String, String>,
    pub alarms: Vec<AlarmSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthCheckSpec {
    pub interval_seconds: u32,
    pub path: String,
    pub timeout_seconds: u32,
    pub healthy_threshold_count: u32,
    pub unhealthy_threshold_count: u32,
    /// Kept in caller order, duplicates included
    pub success_codes: Vec<String>,
    /// `None` means the provider default applies
    pub port: Option<String>,
    pub protocol: Option<String>,
}

impl HealthCheckSpec {
    /// Matcher value, e.g. `"200,204"`
    pub fn success_code_string(&self) -> String {
        self.success_codes.join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListenerSpec {
    pub port: u16,
    pub protocol: String,
    pub certificates: Vec<String>,
    pub default_actions: Vec<DefaultAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultAction {
    pub target_group: String,
    pub action_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlarmSpec {
    pub metric_name: String,
    pub namespace: String,
    pub comparison_operator: String,
    pub threshold: f64,
    pub evaluation_periods: u32,
    pub period: Option<u32>,
    pub statistic: Option<String>,
    pub alarm_description: Option<String>,
    pub actions_enabled: Option<bool>,
    pub alarm_actions: Vec<String>,
    pub ok_actions: Vec<String>,
    pub insufficient_data_actions: Vec<String>,
    pub treat_missing_data: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserializes_from_yaml() {
        let yaml = r#"
Name: svc
VpcId: vpc-1
SubnetIds: [s-1, s-2]
Type: network
IngressRules:
  - Port: 443
TargetGroups:
  - Name: A
    Port: 443
    Protocol: https
    HealthCheck:
      IntervalSeconds: 10
      Path: /health
      TimeoutSeconds: 5
      SuccessCodes: [200, "300-399"]
      Port: traffic-port
Listeners:
  - Port: 443
    Protocol: HTTPS
    DefaultActions:
      - TargetGroup: A
        Type: forward
Alarms:
  - MetricName: HTTPCode_Target_5XX_Count
    Threshold: "1"
    OKActions: ["arn:ok"]
"#;
        let config: TopologyConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.name.as_deref(), Some("svc"));
        assert_eq!(config.load_balancer_type.as_deref(), Some("network"));
        assert_eq!(config.ingress_rules.as_ref().unwrap()[0].port, Some(443));

        let hc = config.target_groups.as_ref().unwrap()[0]
            .health_check
            .clone()
            .unwrap();
        assert_eq!(
            hc.success_codes,
            Some(vec![
                SuccessCode::Code(200),
                SuccessCode::Text("300-399".to_string())
            ])
        );
        assert_eq!(hc.port, Some(HealthCheckPort::Named("traffic-port".into())));

        let alarm = &config.alarms.as_ref().unwrap()[0];
        assert_eq!(alarm.threshold, Some(Threshold::Text("1".into())));
        assert_eq!(alarm.ok_actions, Some(vec!["arn:ok".to_string()]));
    }

    #[test]
    fn test_success_codes_join_in_order_with_duplicates() {
        let hc = HealthCheckSpec {
            interval_seconds: 10,
            path: "/".into(),
            timeout_seconds: 5,
            healthy_threshold_count: 5,
            unhealthy_threshold_count: 2,
            success_codes: vec!["204".into(), "200".into(), "204".into()],
            port: None,
            protocol: None,
        };
        assert_eq!(hc.success_code_string(), "204,200,204");
    }

    #[test]
    fn test_namespace_follows_balancer_type() {
        assert_eq!(
            LoadBalancerType::parse("Application").map(|t| t.metric_namespace()),
            Some("AWS/ApplicationELB")
        );
        assert_eq!(
            LoadBalancerType::parse("network").map(|t| t.metric_namespace()),
            Some("AWS/NetworkELB")
        );
        assert_eq!(LoadBalancerType::parse("classic"), None);
    }
}
