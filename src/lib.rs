//! stacksynth - CloudFormation resource-graph synthesis
//!
//! Turns declarative topology documents into validated, cross-referenced
//! resource graphs and renders them as CloudFormation templates.
//!
//! # Architecture Overview
//!
//! - **Configuration** ([`app::topology`], [`app::settings`]): typed documents
//!   loaded from JSON/YAML and synthesis settings loaded from TOML
//! - **Normalization** ([`app::normalizer`]): validation and defaulting, run
//!   once at the boundary
//! - **Graph building** ([`app::load_balancer`], [`app::iam_roles`],
//!   [`app::cloudfront`]): one builder per topology kind, each producing a
//!   [`app::outputs::SynthesizedStack`]
//! - **Emission** ([`app::cfn_template`]): the [`app::cfn_template::GraphEmitter`]
//!   seam and its CloudFormation implementation
//!
//! Synthesis is pure and synchronous. Builders hold all of their state in a
//! builder value, so independent topologies can be built in parallel.

#![warn(clippy::all, rust_2018_idioms)]

// Include logging macros first
#[macro_use]
pub mod logging_macros;

pub mod app;

pub use app::cfn_template::{GraphEmitter, TemplateEmitter};
pub use app::cloudfront::synthesize_distribution;
pub use app::errors::{SynthError, SynthResult};
pub use app::iam_roles::synthesize_roles;
pub use app::load_balancer::synthesize_load_balancer;
pub use app::outputs::SynthesizedStack;
