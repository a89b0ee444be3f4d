//! Record types: the external property shapes and the flat internal record.
//!
//! [`RawProperty`] mirrors the Notion wire format, where every property is an
//! object tagged by `type` with a payload under the key of the same name:
//!
//! ```json
//! { "id": "%40a", "type": "number", "number": 0 }
//! ```
//!
//! Kinds the pipeline does not understand deserialise to
//! [`RawProperty::Unrecognized`] rather than failing, so new Notion property
//! kinds never break an export.

use crate::error::{InvoiceError, Result};
use crate::pipeline::normalize;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One text run of a `title` or `rich_text` property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RichTextRun {
    #[serde(default)]
    pub plain_text: String,
}

/// Payload of a `date` property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateValue {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// One option of a `select` / `multi_select` property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

/// A typed property as supplied by the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawProperty {
    Title {
        #[serde(default, deserialize_with = "null_as_empty")]
        title: Vec<RichTextRun>,
    },
    RichText {
        #[serde(default, deserialize_with = "null_as_empty")]
        rich_text: Vec<RichTextRun>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    /// `None` is Notion's explicit "empty number" and is not zero.
    Number {
        #[serde(default)]
        number: Option<f64>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    MultiSelect {
        #[serde(default, deserialize_with = "null_as_empty")]
        multi_select: Vec<SelectOption>,
    },
    #[serde(other)]
    Unrecognized,
}

impl RawProperty {
    /// The wire name of this property's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RawProperty::Title { .. } => "title",
            RawProperty::RichText { .. } => "rich_text",
            RawProperty::Date { .. } => "date",
            RawProperty::Number { .. } => "number",
            RawProperty::Select { .. } => "select",
            RawProperty::MultiSelect { .. } => "multi_select",
            RawProperty::Unrecognized => "unrecognized",
        }
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A source record: stable id plus its properties in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub id: String,
    pub properties: IndexMap<String, RawProperty>,
}

impl RawPage {
    /// Normalise this page's properties into a [`NormalizedRecord`].
    pub fn normalize(&self) -> NormalizedRecord {
        normalize::normalize(&self.id, &self.properties)
    }
}

/// The flat internal record every later stage works from.
///
/// `amount` is three-state: `Some(x)` with `x != 0`, `Some(0.0)`, and `None`.
/// Absent amounts are omitted on serialisation; `null` deserialises to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_fields: BTreeMap<String, String>,
}

impl NormalizedRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// `INV-` followed by the first eight characters of the id, upper-cased.
    pub fn reference_number(&self) -> String {
        let head: String = self.id.chars().take(8).collect();
        format!("INV-{}", head.to_uppercase())
    }
}

/// Parse the data-source JSON into raw pages.
///
/// Accepts a single page object, an array of pages, or a database query
/// response (`{ "results": [ ... ] }`).
pub fn parse_pages(json: &str) -> Result<Vec<RawPage>> {
    let value: Value = serde_json::from_str(json).map_err(|e| InvoiceError::InvalidInput {
        detail: format!("not valid JSON: {e}"),
    })?;
    pages_from_value(&value)
}

/// Same as [`parse_pages`] for an already-decoded JSON value.
pub fn pages_from_value(value: &Value) -> Result<Vec<RawPage>> {
    let pages: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => match obj.get("results") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => {
                return Err(InvoiceError::InvalidInput {
                    detail: "'results' must be an array".into(),
                })
            }
            None => vec![value],
        },
        other => {
            return Err(InvoiceError::InvalidInput {
                detail: format!("expected a page object or array, got {}", json_kind(other)),
            })
        }
    };

    pages
        .into_iter()
        .enumerate()
        .map(|(i, page)| {
            let id = page
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| InvoiceError::InvalidInput {
                    detail: format!("page #{i} has no string 'id'"),
                })?
                .to_string();
            let properties = match page.get("properties") {
                Some(props) => normalize::parse_properties(&id, props)?,
                None => IndexMap::new(),
            };
            Ok(RawPage { id, properties })
        })
        .collect()
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_kind_is_unrecognized() {
        let p: RawProperty =
            serde_json::from_value(json!({"type": "checkbox", "checkbox": true})).unwrap();
        assert_eq!(p, RawProperty::Unrecognized);
    }

    #[test]
    fn null_number_is_none_not_zero() {
        let p: RawProperty = serde_json::from_value(json!({"type": "number", "number": null})).unwrap();
        assert_eq!(p, RawProperty::Number { number: None });

        let p: RawProperty = serde_json::from_value(json!({"type": "number", "number": 0})).unwrap();
        assert_eq!(p, RawProperty::Number { number: Some(0.0) });
    }

    #[test]
    fn null_multi_select_is_empty() {
        let p: RawProperty =
            serde_json::from_value(json!({"type": "multi_select", "multi_select": null})).unwrap();
        assert_eq!(p, RawProperty::MultiSelect { multi_select: vec![] });
    }

    #[test]
    fn record_serialisation_keeps_zero_and_omits_absent() {
        let mut zero = NormalizedRecord::new("a");
        zero.amount = Some(0.0);
        let v = serde_json::to_value(&zero).unwrap();
        assert_eq!(v["amount"], json!(0.0));

        let absent = NormalizedRecord::new("b");
        let v = serde_json::to_value(&absent).unwrap();
        assert!(v.get("amount").is_none());

        let back: NormalizedRecord =
            serde_json::from_value(json!({"id": "c", "amount": null})).unwrap();
        assert_eq!(back.amount, None);
    }

    #[test]
    fn reference_number_uses_first_eight_chars() {
        let r = NormalizedRecord::new("1a2b3c4d-5e6f-7081-92a3-b4c5d6e7f809");
        assert_eq!(r.reference_number(), "INV-1A2B3C4D");

        let short = NormalizedRecord::new("ab");
        assert_eq!(short.reference_number(), "INV-AB");
    }

    #[test]
    fn parse_query_response() {
        let json = r#"{
            "object": "list",
            "results": [
                {"id": "p1", "properties": {"Name": {"type": "title", "title": [{"plain_text": "Acme"}]}}},
                {"id": "p2", "properties": {}}
            ]
        }"#;
        let pages = parse_pages(json).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].id, "p1");
        assert_eq!(pages[0].properties.len(), 1);
        assert!(pages[1].properties.is_empty());
    }

    #[test]
    fn parse_single_page_and_array() {
        let single = parse_pages(r#"{"id": "only", "properties": {}}"#).unwrap();
        assert_eq!(single.len(), 1);

        let many = parse_pages(r#"[{"id": "a"}, {"id": "b"}]"#).unwrap();
        assert_eq!(many.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn parse_rejects_page_without_id() {
        let err = parse_pages(r#"[{"properties": {}}]"#).unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidInput { .. }), "got {err:?}");
    }

    #[test]
    fn parse_rejects_scalar_input() {
        let err = parse_pages("42").unwrap_err();
        assert!(err.to_string().contains("number"));
    }
}
