//! Core synthesis modules.
//!
//! # Module Organization
//!
//! ## Graph primitives
//! - [`cfn_dag`] - resource nodes and the dependency graph
//! - [`cfn_intrinsic_functions`] - `Ref`/`Fn::GetAtt`/`Fn::Sub` values and reference scanning
//! - [`errors`] - the [`errors::SynthError`] taxonomy
//! - [`stage`] - build stages used to tag log records
//!
//! ## Load-balancer pipeline
//! - [`topology`] - raw and normalized topology types
//! - [`normalizer`] - validation and defaulting
//! - [`identifiers`] - logical id derivation and collision checks
//! - [`materialization`] - conditional resources and derived property shapes
//! - [`references`] - target-group name resolution
//! - [`load_balancer`] - the staged graph builder
//! - [`outputs`] - output collection
//!
//! ## Other builders
//! - [`iam_roles`] - EC2/Lambda roles, instance profiles and a shared policy
//! - [`cloudfront`] - a CloudFront distribution
//!
//! ## Surface
//! - [`settings`] - synthesis settings and document loading
//! - [`cfn_template`] - template emission

pub mod cfn_dag;
pub mod cfn_intrinsic_functions;
pub mod cfn_template;
pub mod cloudfront;
pub mod errors;
pub mod iam_roles;
pub mod identifiers;
pub mod load_balancer;
pub mod materialization;
pub mod normalizer;
pub mod outputs;
pub mod references;
pub mod settings;
pub mod stage;
pub mod topology;
