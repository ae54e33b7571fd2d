//! Resource dependency graph produced by the builders.
//!
//! A [`ResourceGraph`] keeps its nodes in creation order. Dependency edges are
//! not declared by hand: when a node is added, every `Ref`, `Fn::GetAtt` and
//! `Fn::Sub` placeholder in its properties becomes an edge to the resource it
//! names. Because an edge may only point at a node that already exists, the
//! creation order of a graph built through [`ResourceGraph::add_node`] is
//! itself a valid deployment order and no reference can dangle.
//!
//! # Algorithms
//!
//! - **Topological sort**: Kahn's algorithm, ties broken by creation order so
//!   the result is deterministic
//! - **Cycle detection**: depth-first search with a recursion stack, for
//!   graphs assembled through [`ResourceGraph::direct_add_node`]

use crate::app::cfn_intrinsic_functions::{self, referenced_logical_ids};
use crate::app::errors::{SynthError, SynthResult};
use crate::app::stage::BuildStage;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// The kinds of resource the builders can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ResourceKind {
    SecurityGroup,
    LoadBalancer,
    TargetGroup,
    Listener,
    Alarm,
    Role,
    InstanceProfile,
    Policy,
    Distribution,
}

impl ResourceKind {
    /// CloudFormation resource type name
    pub fn cfn_type(&self) -> &'static str {
        match self {
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            ResourceKind::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
            ResourceKind::Listener => "AWS::ElasticLoadBalancingV2::Listener",
            ResourceKind::Alarm => "AWS::CloudWatch::Alarm",
            ResourceKind::Role => "AWS::IAM::Role",
            ResourceKind::InstanceProfile => "AWS::IAM::InstanceProfile",
            ResourceKind::Policy => "AWS::IAM::Policy",
            ResourceKind::Distribution => "AWS::CloudFront::Distribution",
        }
    }

    /// Human readable name used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::SecurityGroup => "security group",
            ResourceKind::LoadBalancer => "load balancer",
            ResourceKind::TargetGroup => "target group",
            ResourceKind::Listener => "listener",
            ResourceKind::Alarm => "alarm",
            ResourceKind::Role => "role",
            ResourceKind::InstanceProfile => "instance profile",
            ResourceKind::Policy => "policy",
            ResourceKind::Distribution => "distribution",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A named value a resource exposes to the outside of the stack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedOutput {
    pub name: String,
    pub value: Value,
}

/// A single resource definition in the graph.
///
/// Nodes are assembled with the chained setters below and handed to
/// [`ResourceGraph::add_node`], which fills in `depends_on`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode {
    pub logical_id: String,
    pub kind: ResourceKind,
    /// Provider properties, rendered verbatim by the emitter
    pub properties: BTreeMap<String, Value>,
    /// Attributes other resources may bind to (name -> intrinsic value)
    pub attributes: BTreeMap<String, Value>,
    /// Outputs this resource exports, in declaration order
    pub outputs: Vec<ExportedOutput>,
    /// Logical ids this resource references, in first-seen order
    pub depends_on: Vec<String>,
}

impl ResourceNode {
    pub fn new(logical_id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties: BTreeMap::new(),
            attributes: BTreeMap::new(),
            outputs: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Set `key` only when a value is present; absent values leave the
    /// property out entirely so the provider applies its own default.
    pub fn optional_property(self, key: &str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(value) => self.property(key, value),
            None => self,
        }
    }

    /// Expose `Fn::GetAtt` attributes for other resources to bind to.
    pub fn attributes(mut self, names: &[&str]) -> Self {
        for name in names {
            let value = cfn_intrinsic_functions::get_att(&self.logical_id, name);
            self.attributes.insert(name.to_string(), value);
        }
        self
    }

    pub fn output(mut self, name: impl Into<String>, value: Value) -> Self {
        self.outputs.push(ExportedOutput {
            name: name.into(),
            value,
        });
        self
    }

    fn referenced_ids(&self) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for value in self.properties.values() {
            for id in referenced_logical_ids(value) {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }
}

/// Handle to a node already in the graph.
///
/// Carries the node's resolvable attributes so callers can bind to them
/// without borrowing the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRef {
    logical_id: String,
    kind: ResourceKind,
    attributes: BTreeMap<String, Value>,
}

impl NodeRef {
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// `{"Ref": logical_id}`
    pub fn ref_value(&self) -> Value {
        cfn_intrinsic_functions::reference(&self.logical_id)
    }

    /// The intrinsic value of a declared attribute.
    pub fn attribute(&self, name: &str) -> SynthResult<Value> {
        self.attributes.get(name).cloned().ok_or_else(|| {
            SynthError::unresolved(
                "attribute",
                format!("{}.{}", self.logical_id, name),
                format!("{} {}", self.kind, self.logical_id),
            )
        })
    }
}

impl From<&ResourceNode> for NodeRef {
    fn from(node: &ResourceNode) -> Self {
        Self {
            logical_id: node.logical_id.clone(),
            kind: node.kind,
            attributes: node.attributes.clone(),
        }
    }
}

/// Directed acyclic graph of resources in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceGraph {
    nodes: IndexMap<String, ResourceNode>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, deriving its dependency edges from its properties.
    ///
    /// Fails with `DuplicateResource` if the logical id is taken and with
    /// `UnresolvedReference` if a property names a resource that has not been
    /// created yet.
    pub fn add_node(&mut self, mut node: ResourceNode) -> SynthResult<NodeRef> {
        if self.nodes.contains_key(&node.logical_id) {
            return Err(SynthError::duplicate(node.kind.label(), &node.logical_id));
        }

        let depends_on = node.referenced_ids();
        for dep_id in &depends_on {
            if dep_id == &node.logical_id {
                return Err(SynthError::DependencyCycle(vec![
                    dep_id.clone(),
                    dep_id.clone(),
                ]));
            }
            if !self.nodes.contains_key(dep_id) {
                return Err(SynthError::unresolved(
                    "resource",
                    dep_id,
                    format!("{} {}", node.kind, node.logical_id),
                ));
            }
        }
        node.depends_on = depends_on;

        synth_trace!(
            BuildStage::Emit,
            "added {} {} depending on {:?}",
            node.kind,
            node.logical_id,
            node.depends_on
        );

        let node_ref = NodeRef::from(&node);
        self.nodes.insert(node.logical_id.clone(), node);
        Ok(node_ref)
    }

    /// Insert a node without checking that its references exist.
    ///
    /// Intended for graphs assembled from outside a builder; callers should
    /// run [`has_cycle`](Self::has_cycle) or
    /// [`deployment_order`](Self::deployment_order) afterwards. A node with a
    /// logical id already present replaces it in place.
    pub fn direct_add_node(&mut self, mut node: ResourceNode) {
        node.depends_on = node.referenced_ids();
        synth_debug!(
            BuildStage::Emit,
            "direct-added {} {} (bypassing reference checks)",
            node.kind,
            node.logical_id
        );
        self.nodes.insert(node.logical_id.clone(), node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, logical_id: &str) -> bool {
        self.nodes.contains_key(logical_id)
    }

    pub fn get(&self, logical_id: &str) -> Option<&ResourceNode> {
        self.nodes.get(logical_id)
    }

    /// Nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values()
    }

    pub fn nodes_of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values().filter(move |node| node.kind == kind)
    }

    /// Logical ids in creation order
    pub fn logical_ids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Resources `logical_id` depends on
    pub fn dependencies(&self, logical_id: &str) -> Vec<String> {
        self.nodes
            .get(logical_id)
            .map(|node| node.depends_on.clone())
            .unwrap_or_default()
    }

    /// Resources that depend on `logical_id`, in creation order
    pub fn dependents(&self, logical_id: &str) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| node.depends_on.iter().any(|dep| dep == logical_id))
            .map(|node| node.logical_id.clone())
            .collect()
    }

    /// Order in which resources can be provisioned.
    ///
    /// Kahn's algorithm; among resources that are ready at the same time the
    /// one created first goes first. Edges to ids outside the graph are
    /// ignored here (they cannot exist for builder-made graphs).
    pub fn deployment_order(&self) -> SynthResult<Vec<String>> {
        let count = self.nodes.len();
        let mut in_degree = vec![0usize; count];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];

        for (index, node) in self.nodes.values().enumerate() {
            for dep_id in &node.depends_on {
                if let Some(dep_index) = self.nodes.get_index_of(dep_id) {
                    dependents[dep_index].push(index);
                    in_degree[index] += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree == 0)
            .map(|(index, _)| index)
            .collect();

        let mut order = Vec::with_capacity(count);
        while let Some(index) = ready.pop_first() {
            order.push(index);
            for &dependent in &dependents[index] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if order.len() != count {
            let stuck = self
                .nodes
                .keys()
                .enumerate()
                .filter(|(index, _)| in_degree[*index] > 0)
                .map(|(_, id)| id.clone())
                .collect();
            return Err(SynthError::DependencyCycle(stuck));
        }

        Ok(order
            .into_iter()
            .filter_map(|index| self.nodes.get_index(index).map(|(id, _)| id.clone()))
            .collect())
    }

    /// Depth-first cycle check
    pub fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        self.nodes
            .keys()
            .any(|id| self.is_cyclic_util(id, &mut visited, &mut rec_stack))
    }

    fn is_cyclic_util(
        &self,
        node_id: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
    ) -> bool {
        if !visited.contains(node_id) {
            visited.insert(node_id.to_string());
            rec_stack.insert(node_id.to_string());

            if let Some(node) = self.nodes.get(node_id) {
                for dep_id in &node.depends_on {
                    if rec_stack.contains(dep_id) {
                        return true;
                    }
                    if !visited.contains(dep_id)
                        && self.is_cyclic_util(dep_id, visited, rec_stack)
                    {
                        return true;
                    }
                }
            }
        }

        rec_stack.remove(node_id);
        false
    }
}
