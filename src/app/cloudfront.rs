//! CloudFront distribution builder.
//!
//! A single `CFDIST` node. Origins, cache behaviors and the other nested
//! settings are passed through as JSON; the builder checks the pieces it
//! relies on: every origin has an `Id`, origin ids are unique, and every
//! cache behavior targets a declared origin.

use crate::app::cfn_dag::{ResourceGraph, ResourceKind, ResourceNode};
use crate::app::cfn_intrinsic_functions::{get_att, reference};
use crate::app::errors::{SynthError, SynthResult};
use crate::app::identifiers::DISTRIBUTION_ID;
use crate::app::materialization::tag_list;
use crate::app::normalizer::{require, with_default_name_tag};
use crate::app::outputs::{OutputCollector, SynthesizedStack};
use crate::app::stage::BuildStage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Hosted zone id shared by every CloudFront distribution
pub const CLOUDFRONT_HOSTED_ZONE_ID: &str = "Z2FDTNDATAQYW2";
pub const DEFAULT_PRICE_CLASS: &str = "PriceClass_100";

/// Distribution configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DistributionConfig {
    /// Used as the default `Name` tag
    pub name: Option<String>,
    pub aliases: Option<Vec<String>>,
    pub cache_behaviors: Option<Vec<Value>>,
    pub comment: Option<String>,
    pub custom_error_responses: Option<Vec<Value>>,
    pub default_cache_behavior: Option<Value>,
    pub default_root_object: Option<String>,
    pub enabled: Option<bool>,
    pub http_version: Option<String>,
    #[serde(rename = "IPV6Enabled")]
    pub ipv6_enabled: Option<bool>,
    pub logging: Option<Value>,
    pub origins: Option<Vec<Value>>,
    pub price_class: Option<String>,
    pub restrictions: Option<Value>,
    pub tags: Option<BTreeMap<String, String>>,
    pub viewer_certificate: Option<Value>,
    #[serde(rename = "WebACLId")]
    pub web_acl_id: Option<String>,
}

/// Build the distribution graph for `config`.
pub fn synthesize_distribution(config: &DistributionConfig) -> SynthResult<SynthesizedStack> {
    let result = build(config);
    if let Err(err) = &result {
        synth_error!(BuildStage::Distribution, "distribution build failed: {}", err);
    }
    result
}

fn build(config: &DistributionConfig) -> SynthResult<SynthesizedStack> {
    synth_debug!(BuildStage::Normalize, "normalizing distribution configuration");
    let resource = "distribution";
    let name = require(&config.name, resource, "Name")?;
    let enabled = require(&config.enabled, resource, "Enabled")?;
    let default_cache_behavior =
        require(&config.default_cache_behavior, resource, "DefaultCacheBehavior")?;

    let origins = require(&config.origins, resource, "Origins")?;
    if origins.is_empty() {
        return Err(SynthError::invalid(
            resource,
            "Origins",
            "must contain at least one origin",
        ));
    }
    let origin_ids = origin_ids(&origins)?;

    let cache_behaviors = config.cache_behaviors.clone().unwrap_or_default();
    check_target_origin(&default_cache_behavior, &origin_ids, "default cache behavior")?;
    for (index, behavior) in cache_behaviors.iter().enumerate() {
        check_target_origin(
            behavior,
            &origin_ids,
            &format!("cache behavior #{}", index + 1),
        )?;
    }

    synth_debug!(BuildStage::Distribution, "creating distribution '{}'", name);
    let mut distribution = Map::new();
    distribution.insert("Aliases".into(), json!(config.aliases.clone().unwrap_or_default()));
    distribution.insert("CacheBehaviors".into(), Value::Array(cache_behaviors));
    distribution.insert("Comment".into(), json!(config.comment.clone().unwrap_or_default()));
    distribution.insert(
        "CustomErrorResponses".into(),
        json!(config.custom_error_responses.clone().unwrap_or_default()),
    );
    distribution.insert("DefaultCacheBehavior".into(), default_cache_behavior);
    distribution.insert(
        "DefaultRootObject".into(),
        json!(config.default_root_object.clone().unwrap_or_default()),
    );
    distribution.insert("Enabled".into(), json!(enabled));
    distribution.insert("IPV6Enabled".into(), json!(config.ipv6_enabled.unwrap_or(false)));
    distribution.insert("Origins".into(), Value::Array(origins));
    distribution.insert(
        "PriceClass".into(),
        json!(config
            .price_class
            .clone()
            .unwrap_or_else(|| DEFAULT_PRICE_CLASS.to_string())),
    );
    distribution.insert(
        "ViewerCertificate".into(),
        config
            .viewer_certificate
            .clone()
            .unwrap_or_else(|| json!({"CloudFrontDefaultCertificate": true})),
    );
    distribution.insert("WebACLId".into(), json!(config.web_acl_id.clone().unwrap_or_default()));

    if let Some(version) = config.http_version.as_ref().filter(|v| !v.is_empty()) {
        distribution.insert("HttpVersion".into(), json!(version));
    }
    if let Some(logging) = config.logging.as_ref().filter(|v| !is_empty_value(v)) {
        distribution.insert("Logging".into(), logging.clone());
    }
    if let Some(restrictions) = config.restrictions.as_ref().filter(|v| !is_empty_value(v)) {
        distribution.insert("Restrictions".into(), restrictions.clone());
    }

    let id = DISTRIBUTION_ID;
    let node = ResourceNode::new(id, ResourceKind::Distribution)
        .property("DistributionConfig", Value::Object(distribution))
        .property("Tags", tag_list(&with_default_name_tag(&config.tags, &name)))
        .attributes(&["DomainName"])
        .output("DistributionId", reference(id))
        .output("DomainName", get_att(id, "DomainName"))
        .output("HostedZoneId", json!(CLOUDFRONT_HOSTED_ZONE_ID));

    let mut graph = ResourceGraph::new();
    graph.add_node(node)?;

    let stack = OutputCollector::finish(graph)?;
    synth_info!(
        BuildStage::CollectOutputs,
        "distribution '{}' synthesized: {} outputs",
        name,
        stack.outputs.len()
    );
    Ok(stack)
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn origin_ids(origins: &[Value]) -> SynthResult<HashSet<String>> {
    let mut ids = HashSet::new();
    for (index, origin) in origins.iter().enumerate() {
        let id = origin
            .get("Id")
            .and_then(Value::as_str)
            .ok_or_else(|| SynthError::missing(format!("origin #{}", index + 1), "Id"))?;
        if !ids.insert(id.to_string()) {
            return Err(SynthError::duplicate("origin", id));
        }
    }
    Ok(ids)
}

fn check_target_origin(
    behavior: &Value,
    origin_ids: &HashSet<String>,
    referenced_by: &str,
) -> SynthResult<()> {
    let target = behavior
        .get("TargetOriginId")
        .and_then(Value::as_str)
        .ok_or_else(|| SynthError::missing(referenced_by, "TargetOriginId"))?;
    if origin_ids.contains(target) {
        Ok(())
    } else {
        Err(SynthError::unresolved("origin", target, referenced_by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_are_not_emitted() {
        assert!(is_empty_value(&json!({})));
        assert!(is_empty_value(&Value::Null));
        assert!(!is_empty_value(&json!({"Bucket": "logs"})));
    }

    #[test]
    fn test_origin_ids_must_be_unique() {
        let origins = vec![json!({"Id": "web"}), json!({"Id": "web"})];
        assert_eq!(
            origin_ids(&origins).unwrap_err(),
            SynthError::duplicate("origin", "web")
        );

        let origins = vec![json!({"DomainName": "example.com"})];
        assert_eq!(
            origin_ids(&origins).unwrap_err(),
            SynthError::missing("origin #1", "Id")
        );
    }
}
