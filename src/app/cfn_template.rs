//! CloudFormation template rendering.
//!
//! The builders stop at a [`SynthesizedStack`]; turning that into text is the
//! job of a [`GraphEmitter`]. [`TemplateEmitter`] is the CloudFormation one:
//! it lays the graph out as a [`CloudFormationTemplate`] (resources in
//! creation order, outputs in collection order) and serializes it as JSON or
//! YAML.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::path::Path;
//! use stacksynth::app::cfn_template::{CloudFormationTemplate, GraphEmitter, TemplateEmitter};
//! use stacksynth::app::load_balancer::synthesize_load_balancer;
//! use stacksynth::app::settings::{load_document, SynthSettings};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = load_document(Path::new("alb.yaml"))?;
//! let stack = synthesize_load_balancer(&config)?;
//!
//! let text = TemplateEmitter::new(SynthSettings::default()).emit(&stack)?;
//! println!("{}", text);
//!
//! CloudFormationTemplate::from_stack(&stack, &SynthSettings::default())
//!     .to_file(Path::new("alb.template.yaml"))?;
//! # Ok(())
//! # }
//! ```

use crate::app::outputs::SynthesizedStack;
use crate::app::settings::{parse_document, OutputFormat, SynthSettings};
use crate::app::stage::BuildStage;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Something that can render a synthesized stack for a provisioning backend.
pub trait GraphEmitter {
    fn emit(&self, stack: &SynthesizedStack) -> Result<String>;
}

/// A CloudFormation template: the sections a synthesized stack fills.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CloudFormationTemplate {
    #[serde(
        rename = "AWSTemplateFormatVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub aws_template_format_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub resources: IndexMap<String, Resource>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub outputs: IndexMap<String, Output>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CloudFormationTemplate {
    /// Lay out `stack` as a template.
    pub fn from_stack(stack: &SynthesizedStack, settings: &SynthSettings) -> Self {
        let resources = stack
            .graph
            .nodes()
            .map(|node| {
                (
                    node.logical_id.clone(),
                    Resource {
                        resource_type: node.kind.cfn_type().to_string(),
                        properties: node.properties.clone(),
                    },
                )
            })
            .collect();

        let outputs = stack
            .outputs
            .iter()
            .map(|output| {
                (
                    output.name.clone(),
                    Output {
                        value: output.value.clone(),
                        description: None,
                    },
                )
            })
            .collect();

        Self {
            aws_template_format_version: Some(settings.format_version.clone()),
            description: settings.description.clone(),
            resources,
            outputs,
        }
    }

    /// Load a template from a JSON or YAML file.
    ///
    /// The format follows the extension; anything else is detected from the
    /// content.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        parse_document(&content, OutputFormat::from_path(path))
            .with_context(|| format!("Failed to parse template {}", path.display()))
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        let text = match format {
            OutputFormat::Json => serde_json::to_string_pretty(self)?,
            OutputFormat::Yaml => serde_yaml::to_string(self)?,
        };
        Ok(text)
    }

    /// Save the template. YAML for `.yaml`/`.yml`, JSON for anything else.
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let format = OutputFormat::from_path(path).unwrap_or(OutputFormat::Json);
        fs::write(path, self.render(format)?)
            .with_context(|| format!("Failed to write template {}", path.display()))?;
        Ok(())
    }
}

/// Renders stacks as CloudFormation templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateEmitter {
    settings: SynthSettings,
}

impl TemplateEmitter {
    pub fn new(settings: SynthSettings) -> Self {
        Self { settings }
    }
}

impl GraphEmitter for TemplateEmitter {
    fn emit(&self, stack: &SynthesizedStack) -> Result<String> {
        synth_debug!(
            BuildStage::Emit,
            "rendering {} resources as {}",
            stack.graph.len(),
            self.settings.output_format
        );
        CloudFormationTemplate::from_stack(stack, &self.settings)
            .render(self.settings.output_format)
    }
}
