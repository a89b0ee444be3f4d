//! Property normalisation: typed Notion properties → [`NormalizedRecord`].
//!
//! Dispatch is purely on the property kind. Missing or null payloads are
//! ordinary data and are skipped, never errors. The only failure mode is a
//! structurally invalid collection, which [`parse_properties`] reports as a
//! [`InvoiceError::ValidationFailure`] before normalisation starts.
//!
//! Numbers are the one place where "empty" and "zero" must not be confused:
//! Notion sends `"number": null` for an empty cell, and that stays `None` all
//! the way through the pipeline. `0` is a real amount.

use crate::error::{InvoiceError, Result};
use crate::model::{json_kind, NormalizedRecord, RawProperty};
use crate::observer::{ExportObserver, NoopObserver};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

/// Normalise a property collection into a record.
///
/// Pure: the same input always yields an equal record.
pub fn normalize(id: &str, properties: &IndexMap<String, RawProperty>) -> NormalizedRecord {
    normalize_with(id, properties, &NoopObserver)
}

/// [`normalize`], reporting ignored properties to `observer`.
pub fn normalize_with(
    id: &str,
    properties: &IndexMap<String, RawProperty>,
    observer: &dyn ExportObserver,
) -> NormalizedRecord {
    let mut record = NormalizedRecord::new(id);

    for (name, prop) in properties {
        let applied = match prop {
            RawProperty::Title { title } => match title.first() {
                Some(run) if !run.plain_text.is_empty() => {
                    if record.name.is_none() {
                        record.name = Some(run.plain_text.clone());
                    }
                    true
                }
                _ => false,
            },
            RawProperty::RichText { rich_text } => match rich_text.first() {
                Some(run) => {
                    record
                        .extra_fields
                        .insert(name.clone(), run.plain_text.clone());
                    true
                }
                None => false,
            },
            RawProperty::Date { date } => match date.as_ref().and_then(|d| d.start.as_ref()) {
                Some(start) => {
                    if record.date.is_none() {
                        record.date = Some(start.clone());
                    }
                    true
                }
                None => false,
            },
            RawProperty::Number { number } => match number {
                Some(n) if n.is_finite() => {
                    if record.amount.is_none() {
                        record.amount = Some(*n);
                    }
                    true
                }
                _ => false,
            },
            RawProperty::Select { select } => match select {
                Some(option) => {
                    record.extra_fields.insert(name.clone(), option.name.clone());
                    true
                }
                None => false,
            },
            RawProperty::MultiSelect { multi_select } => {
                let labels: Vec<&str> = multi_select.iter().map(|o| o.name.as_str()).collect();
                record.extra_fields.insert(name.clone(), labels.join(", "));
                true
            }
            RawProperty::Unrecognized => false,
        };

        if !applied {
            debug!("Skipping property '{}' ({}) on {}", name, prop.kind(), id);
            observer.on_property_skipped(id, name, prop.kind());
        }
    }

    observer.on_record_normalized(id, record.amount.is_some());
    record
}

/// Validate and decode a raw JSON property collection.
///
/// Fails only when the collection itself is malformed: not an object, an
/// entry that is not an object, an entry without a string `type`, or a
/// payload of the wrong shape for its kind (e.g. `"number": "12"`).
pub fn parse_properties(id: &str, properties: &Value) -> Result<IndexMap<String, RawProperty>> {
    let obj = properties
        .as_object()
        .ok_or_else(|| InvoiceError::ValidationFailure {
            record: id.to_string(),
            detail: format!(
                "properties must be a JSON object, got {}",
                json_kind(properties)
            ),
        })?;

    let mut out = IndexMap::with_capacity(obj.len());
    for (name, raw) in obj {
        let kind = raw
            .as_object()
            .and_then(|o| o.get("type"))
            .and_then(Value::as_str)
            .ok_or_else(|| InvoiceError::ValidationFailure {
                record: id.to_string(),
                detail: format!("property '{name}' has no string 'type' ({})", json_kind(raw)),
            })?;

        let prop: RawProperty =
            serde_json::from_value(raw.clone()).map_err(|e| InvoiceError::ValidationFailure {
                record: id.to_string(),
                detail: format!("property '{name}' of kind '{kind}': {e}"),
            })?;
        out.insert(name.clone(), prop);
    }
    Ok(out)
}

/// Decode and normalise a raw JSON property collection in one step.
pub fn normalize_value(id: &str, properties: &Value) -> Result<NormalizedRecord> {
    let parsed = parse_properties(id, properties)?;
    Ok(normalize(id, &parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(v: Value) -> IndexMap<String, RawProperty> {
        parse_properties("rec", &v).expect("valid properties")
    }

    #[test]
    fn missing_number_leaves_amount_absent() {
        let rec = normalize(
            "r",
            &props(json!({"Name": {"type": "title", "title": [{"plain_text": "Beta LLC"}]}})),
        );
        assert_eq!(rec.amount, None);
        assert_eq!(rec.name.as_deref(), Some("Beta LLC"));
    }

    #[test]
    fn null_number_is_not_zero() {
        let rec = normalize("r", &props(json!({"Amount": {"type": "number", "number": null}})));
        assert_eq!(rec.amount, None);
    }

    #[test]
    fn zero_number_is_preserved() {
        let rec = normalize("r", &props(json!({"Amount": {"type": "number", "number": 0}})));
        assert_eq!(rec.amount, Some(0.0));
    }

    #[test]
    fn first_title_wins() {
        let rec = normalize(
            "r",
            &props(json!({
                "Name": {"type": "title", "title": [{"plain_text": "First"}]},
                "Alias": {"type": "title", "title": [{"plain_text": "Second"}]}
            })),
        );
        assert_eq!(rec.name.as_deref(), Some("First"));
    }

    #[test]
    fn empty_title_does_not_block_later_title() {
        let rec = normalize(
            "r",
            &props(json!({
                "Name": {"type": "title", "title": []},
                "Other": {"type": "title", "title": [{"plain_text": ""}]},
                "Alias": {"type": "title", "title": [{"plain_text": "Real"}]}
            })),
        );
        assert_eq!(rec.name.as_deref(), Some("Real"));
    }

    #[test]
    fn first_date_and_number_win() {
        let rec = normalize(
            "r",
            &props(json!({
                "Due": {"type": "date", "date": {"start": "2024-01-01"}},
                "Paid": {"type": "date", "date": {"start": "2024-02-01"}},
                "Empty": {"type": "number", "number": null},
                "Amount": {"type": "number", "number": 12.5},
                "Tax": {"type": "number", "number": 3}
            })),
        );
        assert_eq!(rec.date.as_deref(), Some("2024-01-01"));
        assert_eq!(rec.amount, Some(12.5));
    }

    #[test]
    fn date_without_start_is_skipped() {
        let rec = normalize(
            "r",
            &props(json!({
                "Due": {"type": "date", "date": null},
                "Paid": {"type": "date", "date": {"start": null}}
            })),
        );
        assert_eq!(rec.date, None);
    }

    #[test]
    fn extra_fields_from_text_and_selects() {
        let rec = normalize(
            "r",
            &props(json!({
                "Notes": {"type": "rich_text", "rich_text": [{"plain_text": "net 30"}, {"plain_text": "ignored"}]},
                "Blank": {"type": "rich_text", "rich_text": []},
                "Status": {"type": "select", "select": {"name": "Sent"}},
                "Unset": {"type": "select", "select": null},
                "Tags": {"type": "multi_select", "multi_select": [{"name": "a"}, {"name": "b"}]}
            })),
        );
        assert_eq!(rec.extra_fields.get("Notes").map(String::as_str), Some("net 30"));
        assert_eq!(rec.extra_fields.get("Status").map(String::as_str), Some("Sent"));
        assert_eq!(rec.extra_fields.get("Tags").map(String::as_str), Some("a, b"));
        assert!(!rec.extra_fields.contains_key("Blank"));
        assert!(!rec.extra_fields.contains_key("Unset"));
    }

    #[test]
    fn unknown_kinds_are_ignored() {
        let rec = normalize(
            "r",
            &props(json!({
                "Done": {"type": "checkbox", "checkbox": true},
                "Link": {"type": "url", "url": "https://example.com"}
            })),
        );
        assert_eq!(rec, NormalizedRecord::new("r"));
    }

    #[test]
    fn normalisation_is_idempotent() {
        let p = props(json!({
            "Name": {"type": "title", "title": [{"plain_text": "Acme Co"}]},
            "Amount": {"type": "number", "number": 0},
            "Tags": {"type": "multi_select", "multi_select": [{"name": "x"}]}
        }));
        let a = normalize("r", &p);
        let b = normalize("r", &p);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn non_object_collection_is_validation_failure() {
        let err = normalize_value("r", &json!(["not", "a", "map"])).unwrap_err();
        assert!(matches!(err, InvoiceError::ValidationFailure { .. }), "got {err:?}");
    }

    #[test]
    fn entry_without_type_is_validation_failure() {
        let err = parse_properties("r", &json!({"Amount": {"number": 3}})).unwrap_err();
        assert!(err.to_string().contains("Amount"), "got {err}");
    }

    #[test]
    fn wrong_payload_shape_is_validation_failure() {
        let err = parse_properties("r", &json!({"Amount": {"type": "number", "number": "12"}}))
            .unwrap_err();
        assert!(err.to_string().contains("number"), "got {err}");
    }

    #[test]
    fn skipped_properties_reach_observer() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct Skips(Mutex<Vec<String>>);
        impl ExportObserver for Skips {
            fn on_property_skipped(&self, _id: &str, name: &str, _kind: &str) {
                self.0.lock().unwrap().push(name.to_string());
            }
        }

        let skips = Skips::default();
        normalize_with(
            "r",
            &props(json!({
                "Done": {"type": "checkbox", "checkbox": true},
                "Amount": {"type": "number", "number": null},
                "Name": {"type": "title", "title": [{"plain_text": "ok"}]}
            })),
            &skips,
        );
        assert_eq!(*skips.0.lock().unwrap(), vec!["Done", "Amount"]);
    }
}
