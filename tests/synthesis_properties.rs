//! Property tests over generated load-balancer topologies.

use proptest::collection::btree_set;
use proptest::prelude::*;
use stacksynth::app::identifiers::MAX_TARGET_GROUP_ID_LEN;
use stacksynth::app::topology::{
    DefaultActionConfig, HealthCheckConfig, ListenerConfig, SecurityRuleConfig,
    TargetGroupConfig, TopologyConfig,
};
use stacksynth::{synthesize_load_balancer, SynthError};

fn target_group(name: String, port: u16) -> TargetGroupConfig {
    TargetGroupConfig {
        name: Some(name),
        port: Some(u32::from(port)),
        protocol: Some("http".into()),
        health_check: Some(HealthCheckConfig {
            interval_seconds: Some(30),
            path: Some("/".into()),
            timeout_seconds: Some(5),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// One target group per port, and a listener on the same port forwarding to it.
fn topology(ports: &[u16], with_rules: bool) -> TopologyConfig {
    TopologyConfig {
        name: Some("generated".into()),
        vpc_id: Some("vpc-1".into()),
        subnet_ids: Some(vec!["s-1".into()]),
        ingress_rules: with_rules.then(|| {
            vec![SecurityRuleConfig {
                port: Some(443),
                cidr_ip: Some("0.0.0.0/0".into()),
                ..Default::default()
            }]
        }),
        target_groups: Some(
            ports
                .iter()
                .map(|port| target_group(format!("tg-{}", port), *port))
                .collect(),
        ),
        listeners: Some(
            ports
                .iter()
                .map(|port| ListenerConfig {
                    port: Some(u32::from(*port)),
                    protocol: Some("http".into()),
                    default_actions: Some(vec![DefaultActionConfig {
                        target_group: Some(format!("tg-{}", port)),
                        action_type: None,
                    }]),
                    ..Default::default()
                })
                .collect(),
        ),
        ..Default::default()
    }
}

proptest! {
    #[test]
    fn builds_are_deterministic(ports in btree_set(1u16..=65535, 1..6), with_rules in any::<bool>()) {
        let ports: Vec<u16> = ports.into_iter().collect();
        let config = topology(&ports, with_rules);

        let first = synthesize_load_balancer(&config).unwrap();
        let second = synthesize_load_balancer(&config).unwrap();
        prop_assert_eq!(first.graph.logical_ids(), second.graph.logical_ids());
        prop_assert_eq!(first.output_names(), second.output_names());
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.graph.contains("SECGROUP"), with_rules);
    }

    #[test]
    fn every_listener_points_at_its_group(ports in btree_set(1u16..=65535, 1..6)) {
        let ports: Vec<u16> = ports.into_iter().collect();
        let stack = synthesize_load_balancer(&topology(&ports, false)).unwrap();

        for port in &ports {
            let listener = format!("LISTENER{}", port);
            let target = format!("TARGET{}", port);
            prop_assert!(target.len() <= MAX_TARGET_GROUP_ID_LEN);
            prop_assert_eq!(stack.graph.dependencies(&listener), vec![target, "ALB".to_string()]);
        }
        prop_assert!(!stack.graph.has_cycle());
        prop_assert_eq!(stack.graph.deployment_order().unwrap().len(), stack.graph.len());
    }

    #[test]
    fn dangling_actions_always_fail(ports in btree_set(1u16..=65535, 1..4), missing in "[a-z]{1,8}") {
        let ports: Vec<u16> = ports.into_iter().collect();
        let mut config = topology(&ports, false);
        let name = format!("absent-{}", missing);
        if let Some(listeners) = config.listeners.as_mut() {
            listeners[0].default_actions = Some(vec![DefaultActionConfig {
                target_group: Some(name.clone()),
                action_type: None,
            }]);
        }

        match synthesize_load_balancer(&config) {
            Err(SynthError::UnresolvedReference { name: unresolved, .. }) => {
                prop_assert_eq!(unresolved, name)
            }
            other => prop_assert!(false, "expected unresolved reference, got {:?}", other),
        }
    }
}
