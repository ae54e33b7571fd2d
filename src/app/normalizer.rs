//! Validation and defaulting of raw topology configuration.
//!
//! [`normalize_topology`] is the only place the raw `*Config` shapes are
//! inspected. Rules applied here:
//!
//! - required fields must be present, otherwise a `Validation` error names the
//!   field and the resource it belongs to
//! - target-group, listener and health-check protocols are upper-cased
//! - every tag map gets a `Name` entry when the caller did not set one; an
//!   explicit caller value is never overwritten
//! - list fields default to empty lists
//! - alarm namespaces default to the balancer type's CloudWatch namespace

use crate::app::errors::{SynthError, SynthResult};
use crate::app::stage::BuildStage;
use crate::app::topology::*;
use std::collections::BTreeMap;

pub const DEFAULT_SCHEME: &str = "internet-facing";
pub const DEFAULT_IP_ADDRESS_TYPE: &str = "ipv4";
pub const DEFAULT_TARGET_TYPE: &str = "instance";
pub const DEFAULT_ACTION_TYPE: &str = "forward";
pub const DEFAULT_RULE_PROTOCOL: &str = "tcp";
pub const DEFAULT_HEALTHY_THRESHOLD: u32 = 5;
pub const DEFAULT_UNHEALTHY_THRESHOLD: u32 = 2;
pub const DEFAULT_SUCCESS_CODE: &str = "200";

/// Return the value of a required field or a `Validation` error naming it.
pub fn require<T: Clone>(value: &Option<T>, resource: &str, field: &str) -> SynthResult<T> {
    value
        .clone()
        .ok_or_else(|| SynthError::missing(resource, field))
}

/// Insert `Name = default_name` unless the caller already set a `Name` tag.
pub fn with_default_name_tag(
    tags: &Option<BTreeMap<String, String>>,
    default_name: &str,
) -> BTreeMap<String, String> {
    let mut tags = tags.clone().unwrap_or_default();
    tags.entry("Name".to_string())
        .or_insert_with(|| default_name.to_string());
    tags
}

fn port(value: u32, resource: &str, field: &str) -> SynthResult<u16> {
    match u16::try_from(value) {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(SynthError::invalid(
            resource,
            field,
            format!("must be between 1 and 65535, got {}", value),
        )),
    }
}

fn non_empty(value: String, resource: &str, field: &str) -> SynthResult<String> {
    if value.trim().is_empty() {
        Err(SynthError::invalid(resource, field, "must not be empty"))
    } else {
        Ok(value)
    }
}

/// Validate and default a load-balancer topology.
pub fn normalize_topology(raw: &TopologyConfig) -> SynthResult<Topology> {
    let name = non_empty(require(&raw.name, "load balancer", "Name")?, "load balancer", "Name")?;
    let resource = format!("load balancer '{}'", name);
    synth_debug!(BuildStage::Normalize, "normalizing {}", resource);

    let load_balancer_type = match &raw.load_balancer_type {
        None => LoadBalancerType::Application,
        Some(value) => LoadBalancerType::parse(value).ok_or_else(|| {
            SynthError::invalid(
                &resource,
                "Type",
                format!("must be application, network or gateway, got '{}'", value),
            )
        })?,
    };

    let scheme = raw
        .scheme
        .clone()
        .unwrap_or_else(|| DEFAULT_SCHEME.to_string());
    if scheme != "internet-facing" && scheme != "internal" {
        return Err(SynthError::invalid(
            &resource,
            "Scheme",
            format!("must be internet-facing or internal, got '{}'", scheme),
        ));
    }

    let vpc_id = non_empty(require(&raw.vpc_id, &resource, "VpcId")?, &resource, "VpcId")?;
    let subnet_ids = require(&raw.subnet_ids, &resource, "SubnetIds")?;
    if subnet_ids.is_empty() {
        return Err(SynthError::invalid(
            &resource,
            "SubnetIds",
            "must list at least one subnet",
        ));
    }

    let namespace = load_balancer_type.metric_namespace();

    let ingress_rules = raw
        .ingress_rules
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, rule)| normalize_rule(rule, RuleDirection::Ingress, index))
        .collect::<SynthResult<Vec<_>>>()?;
    let egress_rules = raw
        .egress_rules
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, rule)| normalize_rule(rule, RuleDirection::Egress, index))
        .collect::<SynthResult<Vec<_>>>()?;

    let target_groups = require(&raw.target_groups, &resource, "TargetGroups")?
        .iter()
        .enumerate()
        .map(|(index, tg)| normalize_target_group(tg, index, namespace))
        .collect::<SynthResult<Vec<_>>>()?;

    let listeners = require(&raw.listeners, &resource, "Listeners")?
        .iter()
        .enumerate()
        .map(|(index, listener)| normalize_listener(listener, index))
        .collect::<SynthResult<Vec<_>>>()?;

    let alarms = raw
        .alarms
        .iter()
        .flatten()
        .map(|alarm| normalize_alarm(alarm, &resource, namespace))
        .collect::<SynthResult<Vec<_>>>()?;

    Ok(Topology {
        tags: with_default_name_tag(&raw.tags, &name),
        name,
        scheme,
        load_balancer_type,
        ip_address_type: raw
            .ip_address_type
            .clone()
            .unwrap_or_else(|| DEFAULT_IP_ADDRESS_TYPE.to_string()),
        vpc_id,
        subnet_ids,
        security_groups: raw.security_groups.clone().unwrap_or_default(),
        ingress_rules,
        egress_rules,
        target_groups,
        listeners,
        alarms,
    })
}

fn normalize_rule(
    raw: &SecurityRuleConfig,
    direction: RuleDirection,
    index: usize,
) -> SynthResult<SecurityRule> {
    let resource = format!("{} rule #{}", direction, index + 1);
    let protocol = raw
        .ip_protocol
        .clone()
        .unwrap_or_else(|| DEFAULT_RULE_PROTOCOL.to_string());

    let (from_port, to_port) = match (raw.port, raw.from_port, raw.to_port) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err(SynthError::invalid(
                &resource,
                "Port",
                "cannot be combined with FromPort/ToPort",
            ))
        }
        (Some(port), None, None) => (Some(port), Some(port)),
        (None, from, to) => (from, to),
    };
    // "-1" means all protocols, which carries no port range
    if protocol != "-1" && (from_port.is_none() || to_port.is_none()) {
        return Err(SynthError::missing(&resource, "FromPort/ToPort"));
    }

    let mut peers = Vec::new();
    if let Some(cidr) = &raw.cidr_ip {
        peers.push(RulePeer::Cidr(cidr.clone()));
    }
    if let Some(cidr) = &raw.cidr_ipv6 {
        peers.push(RulePeer::CidrIpv6(cidr.clone()));
    }
    match direction {
        RuleDirection::Ingress => {
            if raw.destination_security_group_id.is_some() {
                return Err(SynthError::invalid(
                    &resource,
                    "DestinationSecurityGroupId",
                    "is only valid on egress rules",
                ));
            }
            if let Some(group) = &raw.source_security_group_id {
                peers.push(RulePeer::SecurityGroup(group.clone()));
            }
        }
        RuleDirection::Egress => {
            if raw.source_security_group_id.is_some() {
                return Err(SynthError::invalid(
                    &resource,
                    "SourceSecurityGroupId",
                    "is only valid on ingress rules",
                ));
            }
            if let Some(group) = &raw.destination_security_group_id {
                peers.push(RulePeer::SecurityGroup(group.clone()));
            }
        }
    }
    if peers.len() > 1 {
        return Err(SynthError::invalid(
            &resource,
            "CidrIp",
            "only one of CidrIp, CidrIpv6 or a security group may be given",
        ));
    }

    Ok(SecurityRule {
        direction,
        protocol,
        from_port,
        to_port,
        peer: peers.pop(),
        description: raw.description.clone(),
    })
}

fn normalize_target_group(
    raw: &TargetGroupConfig,
    index: usize,
    namespace: &str,
) -> SynthResult<TargetGroupSpec> {
    let name = non_empty(
        require(&raw.name, &format!("target group #{}", index + 1), "Name")?,
        &format!("target group #{}", index + 1),
        "Name",
    )?;
    let resource = format!("target group '{}'", name);

    let port = port(require(&raw.port, &resource, "Port")?, &resource, "Port")?;
    let protocol = require(&raw.protocol, &resource, "Protocol")?.to_uppercase();
    let health_check = normalize_health_check(
        raw.health_check
            .as_ref()
            .ok_or_else(|| SynthError::missing(&resource, "HealthCheck"))?,
        &resource,
    )?;

    let alarms = raw
        .alarms
        .iter()
        .flatten()
        .map(|alarm| normalize_alarm(alarm, &resource, namespace))
        .collect::<SynthResult<Vec<_>>>()?;

    Ok(TargetGroupSpec {
        tags: with_default_name_tag(&raw.tags, &name),
        name,
        port,
        protocol,
        target_type: raw
            .target_type
            .clone()
            .unwrap_or_else(|| DEFAULT_TARGET_TYPE.to_string()),
        targets: raw.targets.clone().unwrap_or_default(),
        health_check,
        alarms,
    })
}

fn normalize_health_check(raw: &HealthCheckConfig, owner: &str) -> SynthResult<HealthCheckSpec> {
    let resource = format!("health check of {}", owner);

    let port = match &raw.port {
        None => None,
        Some(HealthCheckPort::Number(value)) => {
            Some(port(*value, &resource, "Port")?.to_string())
        }
        Some(HealthCheckPort::Named(value)) if value == "traffic-port" => Some(value.clone()),
        Some(HealthCheckPort::Named(value)) => match value.trim().parse::<u32>() {
            Ok(number) => Some(port(number, &resource, "Port")?.to_string()),
            Err(_) => {
                return Err(SynthError::invalid(
                    &resource,
                    "Port",
                    format!("must be a port number or traffic-port, got '{}'", value),
                ))
            }
        },
    };

    let success_codes = match &raw.success_codes {
        Some(codes) if !codes.is_empty() => codes.iter().map(|c| c.to_string()).collect(),
        _ => vec![DEFAULT_SUCCESS_CODE.to_string()],
    };

    Ok(HealthCheckSpec {
        interval_seconds: require(&raw.interval_seconds, &resource, "IntervalSeconds")?,
        path: require(&raw.path, &resource, "Path")?,
        timeout_seconds: require(&raw.timeout_seconds, &resource, "TimeoutSeconds")?,
        healthy_threshold_count: raw
            .healthy_threshold_count
            .unwrap_or(DEFAULT_HEALTHY_THRESHOLD),
        unhealthy_threshold_count: raw
            .unhealthy_threshold_count
            .unwrap_or(DEFAULT_UNHEALTHY_THRESHOLD),
        success_codes,
        port,
        protocol: raw.protocol.as_ref().map(|p| p.to_uppercase()),
    })
}

fn normalize_listener(raw: &ListenerConfig, index: usize) -> SynthResult<ListenerSpec> {
    let port = port(
        require(&raw.port, &format!("listener #{}", index + 1), "Port")?,
        &format!("listener #{}", index + 1),
        "Port",
    )?;
    let resource = format!("listener on port {}", port);

    let protocol = require(&raw.protocol, &resource, "Protocol")?.to_uppercase();

    let default_actions = require(&raw.default_actions, &resource, "DefaultActions")?;
    if default_actions.is_empty() {
        return Err(SynthError::invalid(
            &resource,
            "DefaultActions",
            "must contain at least one action",
        ));
    }
    let default_actions = default_actions
        .iter()
        .map(|action| {
            Ok(DefaultAction {
                target_group: require(
                    &action.target_group,
                    &resource,
                    "DefaultActions.TargetGroup",
                )?,
                action_type: action
                    .action_type
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ACTION_TYPE.to_string()),
            })
        })
        .collect::<SynthResult<Vec<_>>>()?;

    Ok(ListenerSpec {
        port,
        protocol,
        certificates: raw.certificates.clone().unwrap_or_default(),
        default_actions,
    })
}

fn normalize_alarm(raw: &AlarmConfig, owner: &str, namespace: &str) -> SynthResult<AlarmSpec> {
    let metric_name = require(&raw.metric_name, &format!("alarm on {}", owner), "MetricName")?;
    let resource = format!("alarm '{}' on {}", metric_name, owner);

    let threshold = match require(&raw.threshold, &resource, "Threshold")? {
        Threshold::Number(value) => value,
        Threshold::Text(text) => text.trim().parse::<f64>().map_err(|_| {
            SynthError::invalid(
                &resource,
                "Threshold",
                format!("must be a number, got '{}'", text),
            )
        })?,
    };
    if !threshold.is_finite() {
        return Err(SynthError::invalid(
            &resource,
            "Threshold",
            format!("must be a finite number, got {}", threshold),
        ));
    }

    Ok(AlarmSpec {
        namespace: raw
            .namespace
            .clone()
            .unwrap_or_else(|| namespace.to_string()),
        comparison_operator: require(&raw.comparison_operator, &resource, "ComparisonOperator")?,
        threshold,
        evaluation_periods: require(&raw.evaluation_periods, &resource, "EvaluationPeriods")?,
        period: raw.period,
        statistic: raw.statistic.clone(),
        alarm_description: raw.alarm_description.clone(),
        actions_enabled: raw.actions_enabled,
        alarm_actions: raw.alarm_actions.clone().unwrap_or_default(),
        ok_actions: raw.ok_actions.clone().unwrap_or_default(),
        insufficient_data_actions: raw.insufficient_data_actions.clone().unwrap_or_default(),
        treat_missing_data: raw.treat_missing_data.clone(),
        metric_name,
    })
}
