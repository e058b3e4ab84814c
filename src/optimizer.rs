//! Report payload optimizer.
//!
//! Turns the raw upstream report into a smaller, consistent document:
//! 1. `dataCollectFromUser` keys collapsed to one canonical (English) name per concept
//! 2. `Full Conversation[*].sender` reduced to `"agent"` / `"user"`
//! 3. the per-record `aiAgent` lifted once into `meta.agent`
//! 4. empty `agentId` lists dropped
//!
//! Every function here is total: wrong-typed or missing fields are left alone.

use crate::first_write::FirstWriteWins;
use serde_json::{Map, Value};

pub const SENDER_AGENT: &str = "agent";
pub const SENDER_USER: &str = "user";

/// Portuguese key -> canonical English key in `dataCollectFromUser`.
pub const BILINGUAL_KEYS: &[(&str, &str)] = &[
    ("nome completo", "name"),
    ("data de nascimento", "birthDate"),
    ("cpf", "cpf"),
    ("celular", "phone"),
    ("e-mail", "email"),
    ("cep", "zipCode"),
    ("endereço", "address"),
    ("número", "number"),
    ("cidade", "city"),
    ("estado", "state"),
];

const DATA_COLLECT: &str = "dataCollectFromUser";
const FULL_CONVERSATION: &str = "Full Conversation";
const AI_AGENT: &str = "aiAgent";
const AGENT_ID: &str = "agentId";

/// Canonical name for a key in either language, `None` for keys outside the known set.
pub fn canonical_key(key: &str) -> Option<&'static str> {
    BILINGUAL_KEYS
        .iter()
        .find(|(pt, en)| *pt == key || *en == key)
        .map(|(_, en)| *en)
}

/// Whether `key` is the Portuguese variant of a known concept.
pub fn is_portuguese_key(key: &str) -> bool {
    BILINGUAL_KEYS.iter().any(|(pt, _)| *pt == key)
}

/// JSON truthiness: null, false, 0, "", [] and {} are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Collapses bilingual duplicates. The first occurrence of a concept (in either
/// language) wins and is emitted under the canonical key; unknown keys pass through.
pub fn consolidate_data_collect(fields: &Map<String, Value>) -> Map<String, Value> {
    let mut acc = FirstWriteWins::new();
    for (key, value) in fields {
        let name = canonical_key(key).map(str::to_string).unwrap_or_else(|| key.clone());
        acc.offer(name, value.clone());
    }
    acc.into_entries().collect()
}

/// Canonical sender tag for a raw `sender` value.
///
/// `[]` is the user; `[{"firstName": <non-empty>}, ...]` is the agent; any other
/// list is the user. An already-canonical tag is returned as is.
pub fn normalize_sender(sender: &Value) -> &'static str {
    match sender {
        Value::Array(items) => match items.first() {
            Some(Value::Object(first)) if first.get("firstName").is_some_and(is_truthy) => {
                SENDER_AGENT
            }
            _ => SENDER_USER,
        },
        Value::String(s) if s == SENDER_AGENT => SENDER_AGENT,
        _ => SENDER_USER,
    }
}

fn optimize_record(record: &Value, lifted: &mut FirstWriteWins<&'static str, Value>) -> Value {
    let Some(fields) = record.as_object() else {
        return record.clone();
    };

    if let Some(agent) = fields.get(AI_AGENT).filter(|a| is_truthy(a)) {
        lifted.offer("agent", agent.clone());
    }

    let mut out = Map::with_capacity(fields.len());
    for (key, value) in fields {
        match key.as_str() {
            AI_AGENT => {}
            AGENT_ID if value.as_array().is_some_and(Vec::is_empty) => {}
            DATA_COLLECT => match value {
                Value::Object(collected) if !collected.is_empty() => {
                    out.insert(key.clone(), Value::Object(consolidate_data_collect(collected)));
                }
                _ => {
                    out.insert(key.clone(), value.clone());
                }
            },
            FULL_CONVERSATION => {
                let normalized = match value {
                    Value::Array(entries) => Value::Array(
                        entries
                            .iter()
                            .map(|entry| match entry {
                                Value::Object(msg) if msg.contains_key("sender") => {
                                    let mut msg = msg.clone();
                                    let tag = normalize_sender(&msg["sender"]);
                                    msg.insert("sender".to_string(), Value::from(tag));
                                    Value::Object(msg)
                                }
                                other => other.clone(),
                            })
                            .collect(),
                    ),
                    other => other.clone(),
                };
                out.insert(key.clone(), normalized);
            }
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    Value::Object(out)
}

/// Optimizes one raw report document. Record count and order are preserved.
pub fn optimize(raw: &Value) -> Value {
    let Some(envelope) = raw.as_object() else {
        return raw.clone();
    };

    let mut lifted = FirstWriteWins::new();
    let mut result = Map::with_capacity(envelope.len() + 1);
    for (key, value) in envelope {
        let value = match (key.as_str(), value) {
            ("data", Value::Array(records)) => Value::Array(
                records
                    .iter()
                    .map(|record| optimize_record(record, &mut lifted))
                    .collect(),
            ),
            _ => value.clone(),
        };
        result.insert(key.clone(), value);
    }

    if !lifted.is_empty() {
        let meta = result
            .entry("meta")
            .or_insert_with(|| Value::Object(Map::new()));
        if !meta.is_object() {
            tracing::warn!("Replacing non-object `meta` to hold the lifted agent");
            *meta = Value::Object(Map::new());
        }
        if let Value::Object(meta) = meta {
            for (key, value) in lifted.into_entries() {
                meta.insert(key.to_string(), value);
            }
        }
    }

    Value::Object(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bilingual_first_occurrence_wins() {
        let fields = json!({"nome completo": "Ana", "name": "Anna"});
        let out = consolidate_data_collect(fields.as_object().unwrap());
        assert_eq!(Value::Object(out), json!({"name": "Ana"}));
    }

    #[test]
    fn test_unknown_keys_keep_order() {
        let fields = json!({"origem": "site", "estado": "sp", "email": "a@b.c", "e-mail": "x@y.z"});
        let out = consolidate_data_collect(fields.as_object().unwrap());
        let keys: Vec<_> = out.keys().cloned().collect();
        assert_eq!(keys, vec!["origem", "state", "email"]);
        assert_eq!(out["email"], "a@b.c");
    }

    #[test]
    fn test_sender_forms() {
        assert_eq!(normalize_sender(&json!([])), SENDER_USER);
        assert_eq!(normalize_sender(&json!([{"firstName": "Bot"}])), SENDER_AGENT);
        assert_eq!(normalize_sender(&json!([{}])), SENDER_USER);
        assert_eq!(normalize_sender(&json!([{"firstName": ""}])), SENDER_USER);
        assert_eq!(normalize_sender(&json!({"firstName": "Bot"})), SENDER_USER);
        assert_eq!(normalize_sender(&json!("agent")), SENDER_AGENT);
        assert_eq!(normalize_sender(&json!("user")), SENDER_USER);
    }

    #[test]
    fn test_agent_id_only_dropped_when_empty_list() {
        let raw = json!({"data": [
            {"agentId": []},
            {"agentId": ["a1"]},
            {"agentId": null},
            {"agentId": ""}
        ]});
        let out = optimize(&raw);
        let data = out["data"].as_array().unwrap();
        assert!(data[0].get("agentId").is_none());
        assert_eq!(data[1]["agentId"], json!(["a1"]));
        assert_eq!(data[2]["agentId"], Value::Null);
        assert_eq!(data[3]["agentId"], json!(""));
    }

    #[test]
    fn test_empty_ai_agent_does_not_donate() {
        let raw = json!({"data": [
            {"aiAgent": {}},
            {"aiAgent": {"name": "LIA"}}
        ]});
        let out = optimize(&raw);
        assert_eq!(out["meta"]["agent"], json!({"name": "LIA"}));
        assert!(out["data"][0].get("aiAgent").is_none());
    }

    #[test]
    fn test_no_agent_means_no_meta() {
        let out = optimize(&json!({"statusCode": 200, "data": [{"x": 1}]}));
        assert!(out.get("meta").is_none());
    }

    #[test]
    fn test_existing_meta_is_extended() {
        let raw = json!({"meta": {"page": 1}, "data": [{"aiAgent": {"id": "a"}}]});
        let out = optimize(&raw);
        assert_eq!(out["meta"], json!({"page": 1, "agent": {"id": "a"}}));
    }

    #[test]
    fn test_non_object_inputs_pass_through() {
        assert_eq!(optimize(&json!([1, 2])), json!([1, 2]));
        assert_eq!(optimize(&json!({"data": "oops"})), json!({"data": "oops"}));
        let out = optimize(&json!({"data": [1, "two", null]}));
        assert_eq!(out["data"], json!([1, "two", null]));
    }
}
