//! Load-balancer topology builder.
//!
//! Assembles the resource graph for one load balancer in a fixed sequence of
//! stages:
//!
//! 1. normalize the raw configuration
//! 2. security group, if any rule was given
//! 3. the load balancer itself
//! 4. target groups (registered by name) and their alarms
//! 5. listeners, whose default actions resolve target groups by name
//! 6. alarms on the load balancer
//! 7. output collection
//!
//! Later stages read state earlier ones produced, so the order is program
//! order and never changes. Any failure aborts the build; no partial graph is
//! returned.

use crate::app::cfn_dag::{NodeRef, ResourceGraph, ResourceKind, ResourceNode};
use crate::app::cfn_intrinsic_functions::{get_att, reference};
use crate::app::errors::SynthResult;
use crate::app::identifiers::{
    alarm_id, listener_id, target_group_id, IdentifierRegistry, LOAD_BALANCER_ID,
    SECURITY_GROUP_ID,
};
use crate::app::materialization::{
    certificate_list, health_check_properties, load_balancer_security_groups,
    needs_security_group, security_rule_value, tag_list, AlarmOwner,
};
use crate::app::normalizer::normalize_topology;
use crate::app::outputs::{OutputCollector, SynthesizedStack};
use crate::app::references::{ReferenceResolver, ReferenceTable};
use crate::app::stage::BuildStage;
use crate::app::topology::{AlarmSpec, SecurityRule, Topology, TopologyConfig};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const LOAD_BALANCER_ATTRIBUTES: [&str; 4] = [
    "DNSName",
    "CanonicalHostedZoneID",
    "LoadBalancerFullName",
    "LoadBalancerName",
];
const TARGET_GROUP_ATTRIBUTES: [&str; 2] = ["TargetGroupFullName", "TargetGroupName"];

/// Normalize `config` and build its resource graph.
pub fn synthesize_load_balancer(config: &TopologyConfig) -> SynthResult<SynthesizedStack> {
    LoadBalancerBuilder::from_config(config)?.build()
}

/// State of one load-balancer build. Consumed by [`build`](Self::build).
#[derive(Debug)]
pub struct LoadBalancerBuilder {
    topology: Topology,
    graph: ResourceGraph,
    identifiers: IdentifierRegistry,
    stage: BuildStage,
}

impl LoadBalancerBuilder {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            graph: ResourceGraph::new(),
            identifiers: IdentifierRegistry::new(),
            stage: BuildStage::Normalize,
        }
    }

    pub fn from_config(config: &TopologyConfig) -> SynthResult<Self> {
        synth_debug!(BuildStage::Normalize, "normalizing load balancer configuration");
        match normalize_topology(config) {
            Ok(topology) => Ok(Self::new(topology)),
            Err(err) => {
                synth_error!(BuildStage::Normalize, "rejected configuration: {}", err);
                Err(err)
            }
        }
    }

    /// Run every stage and collect outputs. The first failure is logged with
    /// the stage it happened in and returned.
    pub fn build(mut self) -> SynthResult<SynthesizedStack> {
        if let Err(err) = self.create_resources() {
            synth_error!(
                self.stage,
                "load balancer '{}' build failed: {}",
                self.topology.name,
                err
            );
            return Err(err);
        }

        self.enter(BuildStage::CollectOutputs);
        let stack = OutputCollector::finish(self.graph)?;
        synth_info!(
            BuildStage::CollectOutputs,
            "load balancer '{}' synthesized: {} resources, {} outputs",
            self.topology.name,
            stack.graph.len(),
            stack.outputs.len()
        );
        Ok(stack)
    }

    fn enter(&mut self, stage: BuildStage) {
        synth_debug!(stage, "entering stage");
        self.stage = stage;
    }

    fn create_resources(&mut self) -> SynthResult<()> {
        let security_group = self.create_security_group()?;
        let load_balancer = self.create_load_balancer(security_group.as_ref())?;
        let references = self.create_target_groups(&load_balancer)?;
        self.create_listeners(&load_balancer, &references.seal())?;
        self.create_top_level_alarms(&load_balancer)
    }

    fn create_security_group(&mut self) -> SynthResult<Option<NodeRef>> {
        self.enter(BuildStage::SecurityGroup);
        if !needs_security_group(&self.topology) {
            synth_debug!(BuildStage::SecurityGroup, "no rules supplied, skipping");
            return Ok(None);
        }

        let id = self
            .identifiers
            .claim(ResourceKind::SecurityGroup, SECURITY_GROUP_ID.to_string())?;
        let topology = &self.topology;
        let tags = BTreeMap::from([("Name".to_string(), format!("{}-alb", topology.name))]);

        let node = ResourceNode::new(&id, ResourceKind::SecurityGroup)
            .property(
                "GroupDescription",
                format!("Security group for {}", topology.name),
            )
            .property(
                "SecurityGroupIngress",
                rule_list(&topology.ingress_rules),
            )
            .property("SecurityGroupEgress", rule_list(&topology.egress_rules))
            .property("Tags", tag_list(&tags))
            .property("VpcId", topology.vpc_id.clone())
            .attributes(&["GroupId"])
            .output(format!("{}GroupId", id), get_att(&id, "GroupId"));

        self.graph.add_node(node).map(Some)
    }

    fn create_load_balancer(&mut self, security_group: Option<&NodeRef>) -> SynthResult<NodeRef> {
        self.enter(BuildStage::LoadBalancer);
        let id = self
            .identifiers
            .claim(ResourceKind::LoadBalancer, LOAD_BALANCER_ID.to_string())?;
        let topology = &self.topology;

        let mut node = ResourceNode::new(&id, ResourceKind::LoadBalancer)
            .property("Name", topology.name.clone())
            .property("Scheme", topology.scheme.clone())
            .property("IpAddressType", topology.ip_address_type.clone())
            .property(
                "SecurityGroups",
                load_balancer_security_groups(&topology.security_groups, security_group),
            )
            .property("Subnets", topology.subnet_ids.clone())
            .property("Tags", tag_list(&topology.tags))
            .property("Type", topology.load_balancer_type.as_str())
            .attributes(&LOAD_BALANCER_ATTRIBUTES)
            .output("LoadBalancerArn", reference(&id));
        for attribute in LOAD_BALANCER_ATTRIBUTES {
            node = node.output(attribute, get_att(&id, attribute));
        }

        self.graph.add_node(node)
    }

    fn create_target_groups(&mut self, load_balancer: &NodeRef) -> SynthResult<ReferenceTable> {
        self.enter(BuildStage::TargetGroups);
        synth_debug!(
            BuildStage::TargetGroups,
            "creating {} target groups",
            self.topology.target_groups.len()
        );
        let mut references = ReferenceTable::new();

        for spec in self.topology.target_groups.clone() {
            let id = self
                .identifiers
                .claim(ResourceKind::TargetGroup, target_group_id(spec.port))?;

            let targets: Vec<Value> = spec.targets.iter().map(|t| json!({ "Id": t })).collect();
            let mut node = ResourceNode::new(&id, ResourceKind::TargetGroup)
                .property("Port", spec.port)
                .property("Protocol", spec.protocol.clone())
                .property("Tags", tag_list(&spec.tags))
                .property("Targets", targets)
                .property("TargetType", spec.target_type.clone())
                .property("VpcId", self.topology.vpc_id.clone())
                .attributes(&TARGET_GROUP_ATTRIBUTES);
            node.properties
                .extend(health_check_properties(&spec.health_check));
            for attribute in TARGET_GROUP_ATTRIBUTES {
                node = node.output(format!("{}{}", id, attribute), get_att(&id, attribute));
            }

            let target_group = references.register(&spec.name, self.graph.add_node(node)?)?;

            for alarm in &spec.alarms {
                self.create_alarm(
                    alarm,
                    AlarmOwner::TargetGroup {
                        load_balancer,
                        target_group: &target_group,
                    },
                )?;
            }
        }

        Ok(references)
    }

    fn create_listeners(
        &mut self,
        load_balancer: &NodeRef,
        target_groups: &ReferenceResolver,
    ) -> SynthResult<()> {
        self.enter(BuildStage::Listeners);
        synth_debug!(
            BuildStage::Listeners,
            "creating {} listeners",
            self.topology.listeners.len()
        );

        for spec in self.topology.listeners.clone() {
            let id = self
                .identifiers
                .claim(ResourceKind::Listener, listener_id(spec.port))?;
            let referenced_by = format!("{} {}", ResourceKind::Listener, id);

            let actions = spec
                .default_actions
                .iter()
                .map(|action| {
                    let target_group = target_groups.resolve(&action.target_group, &referenced_by)?;
                    Ok(json!({
                        "TargetGroupArn": target_group.ref_value(),
                        "Type": action.action_type,
                    }))
                })
                .collect::<SynthResult<Vec<Value>>>()?;

            let node = ResourceNode::new(&id, ResourceKind::Listener)
                .property("DefaultActions", actions)
                .property("LoadBalancerArn", load_balancer.ref_value())
                .property("Port", spec.port)
                .property("Protocol", spec.protocol.clone())
                .optional_property("Certificates", certificate_list(&spec.certificates))
                .output(format!("Listener{}Arn", spec.port), reference(&id));

            self.graph.add_node(node)?;
        }
        Ok(())
    }

    fn create_top_level_alarms(&mut self, load_balancer: &NodeRef) -> SynthResult<()> {
        self.enter(BuildStage::TopLevelAlarms);
        synth_debug!(
            BuildStage::TopLevelAlarms,
            "creating {} load balancer alarms",
            self.topology.alarms.len()
        );
        for alarm in self.topology.alarms.clone() {
            self.create_alarm(&alarm, AlarmOwner::LoadBalancer(load_balancer))?;
        }
        Ok(())
    }

    fn create_alarm(&mut self, alarm: &AlarmSpec, owner: AlarmOwner<'_>) -> SynthResult<NodeRef> {
        let id = self.identifiers.claim(
            ResourceKind::Alarm,
            alarm_id(owner.logical_id(), &alarm.metric_name),
        )?;

        let node = ResourceNode::new(&id, ResourceKind::Alarm)
            .property("MetricName", alarm.metric_name.clone())
            .property("Namespace", alarm.namespace.clone())
            .property("ComparisonOperator", alarm.comparison_operator.clone())
            .property("Threshold", alarm.threshold)
            .property("EvaluationPeriods", alarm.evaluation_periods)
            .optional_property("Period", alarm.period)
            .optional_property("Statistic", alarm.statistic.clone())
            .optional_property("AlarmDescription", alarm.alarm_description.clone())
            .optional_property("ActionsEnabled", alarm.actions_enabled)
            .property("AlarmActions", alarm.alarm_actions.clone())
            .property("OKActions", alarm.ok_actions.clone())
            .property(
                "InsufficientDataActions",
                alarm.insufficient_data_actions.clone(),
            )
            .optional_property("TreatMissingData", alarm.treat_missing_data.clone())
            .property("Dimensions", owner.dimensions()?)
            .attributes(&["Arn"])
            .output(id.clone(), reference(&id))
            .output(format!("{}Arn", id), get_att(&id, "Arn"));

        self.graph.add_node(node)
    }
}

fn rule_list(rules: &[SecurityRule]) -> Value {
    Value::Array(rules.iter().map(security_rule_value).collect())
}
