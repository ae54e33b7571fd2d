//! Load-balancer graph synthesis tests
//!
//! These tests drive [`synthesize_load_balancer`] from configuration documents
//! the way a caller would, and check the graph it returns: which nodes exist,
//! what their logical ids are, which edges connect them, and which outputs
//! are exported in which order.
//!
//! # Properties Covered
//!
//! - **End-to-end shape**: the canonical single-port topology yields
//!   `SECGROUP`, `ALB`, `TARGET443` and `LISTENER443`
//! - **Referential integrity**: listener actions bind to the right target
//!   group, and an unknown name fails the build
//! - **Conditional materialization**: no rules, no security group
//! - **Default propagation**: a caller-supplied `Name` tag survives
//! - **Determinism**: two builds of the same input are identical

use pretty_assertions::assert_eq;
use serde_json::json;
use stacksynth::app::cfn_dag::ResourceKind;
use stacksynth::app::settings::parse_document;
use stacksynth::app::topology::TopologyConfig;
use stacksynth::{synthesize_load_balancer, SynthError};

fn topology(yaml: &str) -> TopologyConfig {
    parse_document(yaml, None).expect("test topology should parse")
}

const SVC: &str = r#"
Name: svc
VpcId: vpc-1
SubnetIds: [s-1, s-2]
IngressRules:
  - Port: 443
TargetGroups:
  - Name: A
    Port: 443
    Protocol: HTTPS
    HealthCheck:
      IntervalSeconds: 30
      Path: /
      TimeoutSeconds: 5
Listeners:
  - Port: 443
    Protocol: HTTPS
    DefaultActions:
      - TargetGroup: A
        Type: forward
"#;

/// The canonical scenario: one rule, one target group, one listener.
#[test]
fn test_end_to_end_single_port() {
    let stack = synthesize_load_balancer(&topology(SVC)).unwrap();

    assert_eq!(
        stack.graph.logical_ids(),
        vec!["SECGROUP", "ALB", "TARGET443", "LISTENER443"]
    );
    assert_eq!(stack.graph.nodes_of_kind(ResourceKind::SecurityGroup).count(), 1);
    assert_eq!(stack.graph.nodes_of_kind(ResourceKind::LoadBalancer).count(), 1);

    let listener = stack.graph.get("LISTENER443").unwrap();
    assert_eq!(
        listener.properties["DefaultActions"],
        json!([{"TargetGroupArn": {"Ref": "TARGET443"}, "Type": "forward"}])
    );
    assert_eq!(listener.depends_on, vec!["TARGET443", "ALB"]);

    for name in ["LoadBalancerArn", "TARGET443TargetGroupFullName", "Listener443Arn"] {
        assert!(stack.output(name).is_some(), "missing output {}", name);
    }

    insta::assert_json_snapshot!(stack.output_names(), @r###"
    [
      "SECGROUPGroupId",
      "LoadBalancerArn",
      "DNSName",
      "CanonicalHostedZoneID",
      "LoadBalancerFullName",
      "LoadBalancerName",
      "TARGET443TargetGroupFullName",
      "TARGET443TargetGroupName",
      "Listener443Arn"
    ]
    "###);
}

#[test]
fn test_target_group_properties() {
    let stack = synthesize_load_balancer(&topology(SVC)).unwrap();
    let tg = stack.graph.get("TARGET443").unwrap();

    assert_eq!(tg.kind.cfn_type(), "AWS::ElasticLoadBalancingV2::TargetGroup");
    assert_eq!(tg.properties["Port"], json!(443));
    assert_eq!(tg.properties["Protocol"], json!("HTTPS"));
    assert_eq!(tg.properties["TargetType"], json!("instance"));
    assert_eq!(tg.properties["Targets"], json!([]));
    assert_eq!(tg.properties["Matcher"], json!({"HttpCode": "200"}));
    assert_eq!(tg.properties["HealthyThresholdCount"], json!(5));
    assert_eq!(tg.properties["UnhealthyThresholdCount"], json!(2));
    assert!(!tg.properties.contains_key("HealthCheckPort"));
    assert_eq!(tg.properties["Tags"], json!([{"Key": "Name", "Value": "A"}]));
}

#[test]
fn test_no_rules_means_no_security_group() {
    let yaml = SVC.replace("IngressRules:\n  - Port: 443\n", "SecurityGroups: [sg-ext]\n");
    let stack = synthesize_load_balancer(&topology(&yaml)).unwrap();

    assert!(!stack.graph.contains("SECGROUP"));
    assert!(stack.output("SECGROUPGroupId").is_none());
    assert_eq!(
        stack.graph.get("ALB").unwrap().properties["SecurityGroups"],
        json!(["sg-ext"])
    );
    assert!(stack.graph.dependencies("ALB").is_empty());
}

#[test]
fn test_egress_only_still_creates_group() {
    let yaml = SVC.replace(
        "IngressRules:\n  - Port: 443\n",
        "EgressRules:\n  - IpProtocol: \"-1\"\n    CidrIp: 0.0.0.0/0\n",
    );
    let stack = synthesize_load_balancer(&topology(&yaml)).unwrap();

    let sg = stack.graph.get("SECGROUP").unwrap();
    assert_eq!(sg.properties["SecurityGroupIngress"], json!([]));
    assert_eq!(
        sg.properties["SecurityGroupEgress"],
        json!([{"IpProtocol": "-1", "CidrIp": "0.0.0.0/0"}])
    );
}

#[test]
fn test_explicit_name_tag_wins() {
    let yaml = format!("{}Tags:\n  Name: custom\n  Team: edge\n", SVC);
    let stack = synthesize_load_balancer(&topology(&yaml)).unwrap();

    assert_eq!(
        stack.graph.get("ALB").unwrap().properties["Tags"],
        json!([
            {"Key": "Name", "Value": "custom"},
            {"Key": "Team", "Value": "edge"}
        ])
    );
}

#[test]
fn test_unknown_target_group_fails_the_build() {
    let yaml = SVC.replace("- TargetGroup: A", "- TargetGroup: B");
    let err = synthesize_load_balancer(&topology(&yaml)).unwrap_err();

    assert_eq!(
        err,
        SynthError::unresolved("target group", "B", "listener LISTENER443")
    );
    assert_eq!(
        err.to_string(),
        "listener LISTENER443 references unknown target group 'B'"
    );
}

#[test]
fn test_duplicate_target_group_port_is_rejected() {
    let yaml = SVC.replace(
        "Listeners:",
        r#"  - Name: B
    Port: 443
    Protocol: HTTP
    HealthCheck:
      IntervalSeconds: 30
      Path: /
      TimeoutSeconds: 5
Listeners:"#,
    );

    assert_eq!(
        synthesize_load_balancer(&topology(&yaml)).unwrap_err(),
        SynthError::duplicate("target group", "TARGET443")
    );
}

#[test]
fn test_duplicate_listener_port_is_rejected() {
    let yaml = format!(
        "{}  - Port: 443\n    Protocol: HTTP\n    DefaultActions:\n      - TargetGroup: A\n",
        SVC
    );

    assert_eq!(
        synthesize_load_balancer(&topology(&yaml)).unwrap_err(),
        SynthError::duplicate("listener", "LISTENER443")
    );
}

#[test]
fn test_quoted_health_check_port_is_accepted() {
    let yaml = SVC.replace(
        "      TimeoutSeconds: 5\n",
        "      TimeoutSeconds: 5\n      Port: \"8080\"\n",
    );
    let stack = synthesize_load_balancer(&topology(&yaml)).unwrap();

    assert_eq!(
        stack.graph.get("TARGET443").unwrap().properties["HealthCheckPort"],
        json!("8080")
    );
}

#[test]
fn test_non_finite_alarm_threshold_fails_the_build() {
    for threshold in ["\"NaN\"", ".nan", "\"inf\""] {
        let yaml = format!(
            "{}Alarms:\n  - MetricName: TargetResponseTime\n    ComparisonOperator: GreaterThanThreshold\n    Threshold: {}\n    EvaluationPeriods: 1\n",
            SVC, threshold
        );

        assert!(
            matches!(
                synthesize_load_balancer(&topology(&yaml)),
                Err(SynthError::Validation { ref field, .. }) if field == "Threshold"
            ),
            "threshold {} was accepted",
            threshold
        );
    }
}

#[test]
fn test_duplicate_target_group_name_is_rejected() {
    let yaml = SVC.replace(
        "Listeners:",
        r#"  - Name: A
    Port: 8443
    Protocol: HTTP
    HealthCheck:
      IntervalSeconds: 30
      Path: /
      TimeoutSeconds: 5
Listeners:"#,
    );

    assert!(matches!(
        synthesize_load_balancer(&topology(&yaml)),
        Err(SynthError::DuplicateResource { logical_id, .. }) if logical_id == "A"
    ));
}

#[test]
fn test_missing_required_field_names_it() {
    let yaml = SVC.replace("VpcId: vpc-1\n", "");
    let err = synthesize_load_balancer(&topology(&yaml)).unwrap_err();

    assert_eq!(
        err.to_string(),
        "invalid configuration for load balancer 'svc': field 'VpcId' is required"
    );
}

#[test]
fn test_listeners_resolve_across_several_groups() {
    let yaml = r#"
Name: multi
VpcId: vpc-1
SubnetIds: [s-1]
TargetGroups:
  - Name: web
    Port: 80
    Protocol: http
    HealthCheck: {IntervalSeconds: 10, Path: /, TimeoutSeconds: 5, SuccessCodes: [200, 301]}
  - Name: api
    Port: 8080
    Protocol: http
    Targets: [i-1, i-2]
    HealthCheck: {IntervalSeconds: 10, Path: /ping, TimeoutSeconds: 5, Port: 9090}
Listeners:
  - Port: 80
    Protocol: http
    DefaultActions: [{TargetGroup: api}]
  - Port: 443
    Protocol: https
    Certificates: ["arn:aws:acm:us-east-1:123456789012:certificate/abc"]
    DefaultActions: [{TargetGroup: web}]
"#;
    let stack = synthesize_load_balancer(&topology(yaml)).unwrap();

    assert_eq!(stack.graph.dependencies("LISTENER80"), vec!["TARGET8080", "ALB"]);
    assert_eq!(stack.graph.dependencies("LISTENER443"), vec!["TARGET80", "ALB"]);
    assert_eq!(
        stack.graph.dependents("ALB"),
        vec!["LISTENER80", "LISTENER443"]
    );

    let web = stack.graph.get("TARGET80").unwrap();
    assert_eq!(web.properties["Matcher"], json!({"HttpCode": "200,301"}));
    let api = stack.graph.get("TARGET8080").unwrap();
    assert_eq!(api.properties["HealthCheckPort"], json!("9090"));
    assert_eq!(api.properties["Targets"], json!([{"Id": "i-1"}, {"Id": "i-2"}]));

    assert_eq!(
        stack.graph.get("LISTENER80").unwrap().properties["Protocol"],
        json!("HTTP")
    );
}

#[test]
fn test_builds_are_deterministic() {
    let config = topology(SVC);
    let first = synthesize_load_balancer(&config).unwrap();
    let second = synthesize_load_balancer(&config).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
