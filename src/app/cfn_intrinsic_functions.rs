//! CloudFormation intrinsic function construction and detection.
//!
//! Builders wire resources together by embedding intrinsic functions in
//! property values (`{"Ref": "ALB"}`, `{"Fn::GetAtt": ["ALB", "DNSName"]}`).
//! The resource graph later scans those same values to derive dependency
//! edges, so both directions live here.

use serde_json::{json, Map, Value};

/// Intrinsic functions the builders emit and the graph understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicFunctionType {
    /// Simple reference: {"Ref": "ResourceName"}
    Ref,
    /// Get attribute: {"Fn::GetAtt": ["Resource", "Attribute"]}
    GetAtt,
    /// String substitution: {"Fn::Sub": "text ${var}"}
    Sub,
}

impl IntrinsicFunctionType {
    /// Get the JSON function name for this intrinsic function
    pub fn json_name(&self) -> &'static str {
        match self {
            IntrinsicFunctionType::Ref => "Ref",
            IntrinsicFunctionType::GetAtt => "Fn::GetAtt",
            IntrinsicFunctionType::Sub => "Fn::Sub",
        }
    }

    fn from_json_name(name: &str) -> Option<Self> {
        match name {
            "Ref" => Some(IntrinsicFunctionType::Ref),
            "Fn::GetAtt" => Some(IntrinsicFunctionType::GetAtt),
            "Fn::Sub" => Some(IntrinsicFunctionType::Sub),
            _ => None,
        }
    }
}

fn intrinsic(function: IntrinsicFunctionType, argument: Value) -> Value {
    let mut object = Map::new();
    object.insert(function.json_name().to_string(), argument);
    Value::Object(object)
}

/// `{"Ref": logical_id}`
pub fn reference(logical_id: &str) -> Value {
    intrinsic(IntrinsicFunctionType::Ref, json!(logical_id))
}

/// `{"Fn::GetAtt": [logical_id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    intrinsic(IntrinsicFunctionType::GetAtt, json!([logical_id, attribute]))
}

/// `{"Fn::Sub": template}`
pub fn sub(template: &str) -> Value {
    intrinsic(IntrinsicFunctionType::Sub, json!(template))
}

/// Pseudo parameters resolve at deploy time and never create an edge.
pub fn is_pseudo_parameter(reference: &str) -> bool {
    reference.starts_with("AWS::")
}

/// Returns the intrinsic function a value is, if it is exactly one.
///
/// Only single-key objects qualify; `{"Ref": "A", "Other": 1}` is a plain map.
pub fn detect_intrinsic_function(value: &Value) -> Option<IntrinsicFunctionType> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.keys()
        .next()
        .and_then(|key| IntrinsicFunctionType::from_json_name(key))
}

/// Collect every logical id referenced from `value`, in first-seen order.
pub fn referenced_logical_ids(value: &Value) -> Vec<String> {
    let mut found = Vec::new();
    collect_references(value, &mut found);
    found
}

fn push_unique(found: &mut Vec<String>, id: &str) {
    if !id.is_empty() && !is_pseudo_parameter(id) && !found.iter().any(|f| f == id) {
        found.push(id.to_string());
    }
}

fn collect_references(value: &Value, found: &mut Vec<String>) {
    match value {
        Value::Object(obj) => {
            match detect_intrinsic_function(value) {
                Some(IntrinsicFunctionType::Ref) => {
                    if let Some(target) = obj.get("Ref").and_then(Value::as_str) {
                        push_unique(found, target);
                    }
                    return;
                }
                Some(IntrinsicFunctionType::GetAtt) => {
                    match obj.get("Fn::GetAtt") {
                        Some(Value::Array(parts)) => {
                            if let Some(target) = parts.first().and_then(Value::as_str) {
                                push_unique(found, target);
                            }
                        }
                        // Short form "Resource.Attribute"
                        Some(Value::String(dotted)) => {
                            if let Some((target, _)) = dotted.split_once('.') {
                                push_unique(found, target);
                            }
                        }
                        _ => {}
                    }
                    return;
                }
                Some(IntrinsicFunctionType::Sub) => {
                    match obj.get("Fn::Sub") {
                        Some(Value::String(template)) => {
                            for name in sub_variables(template) {
                                push_unique(found, &name);
                            }
                        }
                        // [template, {var: value}]: explicit variables shadow resources
                        Some(Value::Array(parts)) => {
                            let locals = parts.get(1).and_then(Value::as_object);
                            if let Some(template) = parts.first().and_then(Value::as_str) {
                                for name in sub_variables(template) {
                                    if locals.map_or(true, |l| !l.contains_key(&name)) {
                                        push_unique(found, &name);
                                    }
                                }
                            }
                            if let Some(locals) = locals {
                                for nested in locals.values() {
                                    collect_references(nested, found);
                                }
                            }
                        }
                        _ => {}
                    }
                    return;
                }
                None => {}
            }

            for nested in obj.values() {
                collect_references(nested, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, found);
            }
        }
        _ => {}
    }
}

/// Names inside `${...}` placeholders; `${!Literal}` escapes are skipped and
/// `${Res.Attr}` yields `Res`.
fn sub_variables(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let inner = &after[..end];
        if !inner.starts_with('!') {
            let name = inner.split('.').next().unwrap_or(inner).trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
        rest = &after[end + 1..];
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_render_cloudformation_shape() {
        assert_eq!(reference("ALB"), json!({"Ref": "ALB"}));
        assert_eq!(
            get_att("ALB", "DNSName"),
            json!({"Fn::GetAtt": ["ALB", "DNSName"]})
        );
        assert_eq!(
            sub("${AWS::StackName}-policy"),
            json!({"Fn::Sub": "${AWS::StackName}-policy"})
        );
    }

    #[test]
    fn test_detection_requires_single_key() {
        assert_eq!(
            detect_intrinsic_function(&reference("A")),
            Some(IntrinsicFunctionType::Ref)
        );
        assert_eq!(
            detect_intrinsic_function(&json!({"Ref": "A", "Extra": 1})),
            None
        );
        assert_eq!(detect_intrinsic_function(&json!("Ref")), None);
    }

    #[test]
    fn test_references_are_collected_in_order_without_duplicates() {
        let value = json!({
            "DefaultActions": [
                {"TargetGroupArn": {"Ref": "TARGET443"}, "Type": "forward"},
                {"TargetGroupArn": {"Ref": "TARGET80"}, "Type": "forward"}
            ],
            "LoadBalancerArn": {"Ref": "ALB"},
            "Monitor": {"Fn::GetAtt": ["TARGET443", "TargetGroupFullName"]}
        });

        assert_eq!(
            referenced_logical_ids(&value),
            vec!["TARGET443", "TARGET80", "ALB"]
        );
    }

    #[test]
    fn test_pseudo_parameters_and_sub_escapes_are_ignored() {
        let value = json!({
            "Name": {"Fn::Sub": "${AWS::StackName}-${Bucket.Arn}-${!Literal}"},
            "Region": {"Ref": "AWS::Region"}
        });
        assert_eq!(referenced_logical_ids(&value), vec!["Bucket"]);
    }

    #[test]
    fn test_sub_local_variables_shadow_resources() {
        let value = json!({"Fn::Sub": ["${Name}-${Queue}", {"Name": {"Ref": "Topic"}}]});
        assert_eq!(referenced_logical_ids(&value), vec!["Queue", "Topic"]);
    }
}
