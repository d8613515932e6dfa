use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ContentError;
use crate::table::TableData;

/// Value handed to the owner through `on_update`.
///
/// The JSON form is untagged: a raw HTML string, a table object with
/// `headers`/`rows`, or a callout object with `text` and any other fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Html(String),
    Table(TableData),
    Callout(CalloutContent),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalloutContent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockContent {
    pub fn html(&self) -> Option<&str> {
        match self {
            BlockContent::Html(html) => Some(html),
            BlockContent::Callout(callout) => Some(&callout.text),
            BlockContent::Table(_) => None,
        }
    }

    pub fn table(&self) -> Option<&TableData> {
        match self {
            BlockContent::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn from_value(value: Value) -> Result<Self, ContentError> {
        match value {
            Value::Null => Ok(BlockContent::Html(String::new())),
            value @ (Value::String(_) | Value::Object(_)) => Ok(serde_json::from_value(value)?),
            other => Err(ContentError::UnexpectedShape(format!(
                "expected a string or an object, got {other}"
            ))),
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self, ContentError> {
        Self::from_value(serde_json::from_str(s)?)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shapes_pick_the_matching_variant() {
        let html = BlockContent::from_json_str("\"<b>hi</b>\"").unwrap();
        assert_eq!(html.html(), Some("<b>hi</b>"));

        let callout =
            BlockContent::from_json_str(r#"{"text":"note","variant":"warning","emoji":"!"}"#)
                .unwrap();
        let BlockContent::Callout(callout) = callout else {
            panic!("expected callout");
        };
        assert_eq!(callout.variant.as_deref(), Some("warning"));
        assert_eq!(callout.extra.get("emoji"), Some(&Value::from("!")));

        let table =
            BlockContent::from_json_str(r#"{"headers":["A","B"],"rows":[["x"]]}"#).unwrap();
        let table = table.table().expect("table");
        assert_eq!(table.rows[0].len(), 2);

        assert!(matches!(
            BlockContent::from_json_str("42"),
            Err(ContentError::UnexpectedShape(_))
        ));
    }

    #[test]
    fn callout_serializes_back_with_its_extra_fields() {
        let content = BlockContent::Callout(CalloutContent {
            text: "t".to_string(),
            variant: Some("info".to_string()),
            extra: Map::from_iter([("icon".to_string(), Value::from("i"))]),
        });
        let json: Value = serde_json::from_str(&content.to_json_string().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "text": "t", "variant": "info", "icon": "i" })
        );
    }
}
