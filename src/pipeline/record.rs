// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Receipt record projected from the parsed Donut structure

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys kept from the parsed structure, in response order
pub const TARGET_FIELDS: [&str; 5] = [
    "issuer_ruc",
    "document_series",
    "document_number",
    "issue_date",
    "total",
];

/// The five extracted receipt fields
///
/// Values are passed through as parsed (usually strings, lists when the
/// model emitted `<sep/>`). A field the model did not produce serializes as
/// `null`, never as an absent key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    #[serde(default)]
    pub issuer_ruc: Option<Value>,
    #[serde(default)]
    pub document_series: Option<Value>,
    #[serde(default)]
    pub document_number: Option<Value>,
    #[serde(default)]
    pub issue_date: Option<Value>,
    #[serde(default)]
    pub total: Option<Value>,
}

impl ReceiptRecord {
    /// Project a parsed mapping onto the target fields; extra keys are dropped
    pub fn from_parsed(parsed: &Map<String, Value>) -> Self {
        let field = |name: &str| parsed.get(name).cloned();
        Self {
            issuer_ruc: field("issuer_ruc"),
            document_series: field("document_series"),
            document_number: field("document_number"),
            issue_date: field("issue_date"),
            total: field("total"),
        }
    }

    /// Number of target fields the model produced
    pub fn populated_fields(&self) -> usize {
        [
            &self.issuer_ruc,
            &self.document_series,
            &self.document_number,
            &self.issue_date,
            &self.total,
        ]
        .iter()
        .filter(|v| v.is_some())
        .count()
    }
}
