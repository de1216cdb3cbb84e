// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Donut tag grammar: `<s_key>value</s_key>` sequences to JSON
//!
//! Nested tags become nested objects, `<sep/>` separates list items, and
//! categorical added tokens such as `<yes/>` collapse to their bare name.

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

const SEP_TOKEN: &str = "<sep/>";

/// Convert a cleaned tagged sequence into JSON.
///
/// Returns an object at the top level unless the sequence is a `<sep/>`
/// separated list of records, in which case an array comes back.
pub fn token2json(tokens: &str, added_vocab: &HashSet<String>) -> Value {
    parse(tokens, false, added_vocab)
}

fn parse(tokens: &str, is_inner_value: bool, added_vocab: &HashSet<String>) -> Value {
    let start_re = Regex::new(r"(?i)<s_(.*?)>").expect("static regex");
    let mut tokens = tokens.to_string();
    let mut output = Map::new();

    while !tokens.is_empty() {
        let (start_token, key) = match start_re.captures(&tokens) {
            Some(caps) => (caps[0].to_string(), caps[1].to_string()),
            None => break,
        };

        let end_re = case_insensitive(&format!("</s_{}>", regex::escape(&key)));
        let end_token = match end_re.find(&tokens) {
            Some(m) => m.as_str().to_string(),
            None => {
                tokens = tokens.replace(&start_token, "");
                continue;
            }
        };

        let content_re = Regex::new(&format!(
            "(?is){}(.*?){}",
            regex::escape(&start_token),
            regex::escape(&end_token)
        ))
        .expect("escaped tokens form a valid regex");

        if let Some(caps) = content_re.captures(&tokens) {
            let content = caps[1].trim();

            if content.contains("<s_") && content.contains("</s_") {
                let value = parse(content, true, added_vocab);
                if !is_empty(&value) {
                    output.insert(key, collapse_single(value));
                }
            } else {
                let leaves: Vec<Value> = content
                    .split(SEP_TOKEN)
                    .map(|leaf| Value::String(categorical_leaf(leaf.trim(), added_vocab)))
                    .collect();
                output.insert(key, collapse_single(Value::Array(leaves)));
            }
        }

        let rest_start = tokens
            .find(&end_token)
            .map(|pos| pos + end_token.len())
            .unwrap_or(tokens.len());
        tokens = tokens[rest_start..].trim().to_string();

        if let Some(rest) = tokens.strip_prefix(SEP_TOKEN) {
            let mut items = vec![Value::Object(output)];
            match parse(rest, true, added_vocab) {
                Value::Array(more) => items.extend(more),
                other => items.push(other),
            }
            return Value::Array(items);
        }
    }

    if !output.is_empty() {
        if is_inner_value {
            Value::Array(vec![Value::Object(output)])
        } else {
            Value::Object(output)
        }
    } else if is_inner_value {
        Value::Array(Vec::new())
    } else {
        let mut fallback = Map::new();
        fallback.insert("text_sequence".to_string(), Value::String(tokens));
        Value::Object(fallback)
    }
}

fn case_insensitive(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){}", pattern)).expect("escaped key forms a valid regex")
}

/// `<yes/>` style added tokens carry a category name
fn categorical_leaf(leaf: &str, added_vocab: &HashSet<String>) -> String {
    if added_vocab.contains(leaf) && leaf.starts_with('<') && leaf.ends_with("/>") {
        leaf[1..leaf.len() - 2].to_string()
    } else {
        leaf.to_string()
    }
}

fn collapse_single(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
