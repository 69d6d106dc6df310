//! Builders for common test data.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use crate::document::StackDocument;
use crate::provider::EventRecord;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Builds an event whose timestamp grows with `seq`.
#[must_use]
pub fn event(seq: u32, logical_id: &str, status: &str) -> EventRecord {
    EventRecord {
        id: format!("e{seq}"),
        timestamp: base_time() + chrono::Duration::seconds(i64::from(seq)),
        resource_type: "AWS::CloudFormation::Stack".to_string(),
        logical_id: logical_id.to_string(),
        status: status.to_string(),
        status_reason: None,
    }
}

/// Builds events `e<from>..=e<to>` as the provider lists them (newest first).
#[must_use]
pub fn event_page(stack: &str, from: u32, to: u32) -> Vec<EventRecord> {
    (from..=to)
        .rev()
        .map(|seq| event(seq, stack, "UPDATE_IN_PROGRESS"))
        .collect()
}

/// A small web-server document with three parameters, one of them `NoEcho`.
#[must_use]
pub fn web_document() -> StackDocument {
    let root = json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Description": "Web tier",
        "Parameters": {
            "InstanceType": {"Type": "String", "Default": "t3.micro"},
            "VpcId": {"Type": "AWS::EC2::VPC::Id"},
            "DbPassword": {"Type": "String", "NoEcho": true}
        },
        "Resources": {
            "Web": {
                "Type": "AWS::EC2::Instance",
                "Properties": {"InstanceType": {"Ref": "InstanceType"}}
            }
        },
        "Outputs": {
            "Url": {"Value": {"Fn::GetAtt": ["Web", "PublicDnsName"]}}
        }
    });
    match StackDocument::new(root) {
        Ok(document) => document,
        Err(e) => panic!("fixture document must be valid: {e}"),
    }
}
