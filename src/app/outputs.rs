//! Output collection and the finished build value.

use crate::app::cfn_dag::{ExportedOutput, ResourceGraph};
use crate::app::errors::{SynthError, SynthResult};
use crate::app::stage::BuildStage;
use serde::Serialize;
use std::collections::HashSet;

/// Result of one synthesis call: the graph and its outputs, in creation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesizedStack {
    pub graph: ResourceGraph,
    pub outputs: Vec<ExportedOutput>,
}

impl SynthesizedStack {
    pub fn output(&self, name: &str) -> Option<&ExportedOutput> {
        self.outputs.iter().find(|output| output.name == name)
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.iter().map(|output| output.name.clone()).collect()
    }
}

/// Gathers the outputs every node exports.
pub struct OutputCollector;

impl OutputCollector {
    /// Walk nodes in creation order, each node's outputs in declaration order.
    /// Two outputs with the same name are a `DuplicateResource` error.
    pub fn collect(graph: &ResourceGraph) -> SynthResult<Vec<ExportedOutput>> {
        synth_debug!(BuildStage::CollectOutputs, "collecting outputs of {} nodes", graph.len());

        let mut seen = HashSet::new();
        let mut outputs = Vec::new();
        for node in graph.nodes() {
            for output in &node.outputs {
                if !seen.insert(output.name.clone()) {
                    return Err(SynthError::duplicate("output", &output.name));
                }
                outputs.push(output.clone());
            }
        }
        Ok(outputs)
    }

    /// Collect and package the graph.
    pub fn finish(graph: ResourceGraph) -> SynthResult<SynthesizedStack> {
        let outputs = Self::collect(&graph)?;
        Ok(SynthesizedStack { graph, outputs })
    }
}
