use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One OData record with a single level of nesting collapsed into `parent/child` keys.
pub type FlatRecord = Map<String, Value>;

#[derive(Debug, Deserialize, Serialize)]
pub struct AskRequest {
    #[serde(default)]
    pub user_query: String,
}

/// The JSON object the model is asked to embed in its reply.
///
/// `views` stays untyped so one malformed descriptor does not sink the whole reply.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct StructuredReply {
    #[serde(default)]
    pub views: Vec<Value>,
    #[serde(default)]
    pub interpretation: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewDescriptor {
    pub view: String,
    pub entity: String,
    pub filter: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("view descriptor is not a JSON object")]
    NotAnObject,
    #[error("missing field 'view'")]
    MissingView,
    #[error("field 'view' is not a string")]
    InvalidView,
    #[error("missing field '{field}'")]
    MissingField { view: String, field: &'static str },
    #[error("field '{field}' is not a string")]
    InvalidField { view: String, field: &'static str },
}

impl DescriptorError {
    /// View name the error can be attributed to, if the descriptor got that far.
    pub fn view(&self) -> Option<&str> {
        match self {
            DescriptorError::MissingField { view, .. }
            | DescriptorError::InvalidField { view, .. } => Some(view),
            _ => None,
        }
    }
}

impl TryFrom<&Value> for ViewDescriptor {
    type Error = DescriptorError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let object = value.as_object().ok_or(DescriptorError::NotAnObject)?;
        let view = match object.get("view") {
            None => return Err(DescriptorError::MissingView),
            Some(Value::String(view)) => view.clone(),
            Some(_) => return Err(DescriptorError::InvalidView),
        };
        let field = |name: &'static str| match object.get(name) {
            None => Err(DescriptorError::MissingField {
                view: view.clone(),
                field: name,
            }),
            Some(Value::String(value)) => Ok(value.clone()),
            Some(_) => Err(DescriptorError::InvalidField {
                view: view.clone(),
                field: name,
            }),
        };
        let entity = field("entity")?;
        let filter = field("filter")?;
        Ok(ViewDescriptor {
            view,
            entity,
            filter,
        })
    }
}

#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AskResponse {
    pub data: BTreeMap<String, Vec<FlatRecord>>,
    pub interpretation: String,
    pub suggestion: String,
    pub errors: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub details: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_from_complete_object() {
        let raw = json!({"view": "V", "entity": "E", "filter": "$filter=x eq 1"});
        let descriptor = ViewDescriptor::try_from(&raw).unwrap();
        assert_eq!(descriptor.view, "V");
        assert_eq!(descriptor.entity, "E");
        assert_eq!(descriptor.filter, "$filter=x eq 1");
    }

    #[test]
    fn test_descriptor_missing_entity_keeps_view() {
        let raw = json!({"view": "V", "filter": ""});
        let err = ViewDescriptor::try_from(&raw).unwrap_err();
        assert_eq!(err.view(), Some("V"));
        assert_eq!(err.to_string(), "missing field 'entity'");
    }

    #[test]
    fn test_descriptor_without_view_is_unattributed() {
        let raw = json!({"entity": "E", "filter": ""});
        let err = ViewDescriptor::try_from(&raw).unwrap_err();
        assert_eq!(err, DescriptorError::MissingView);
        assert_eq!(err.view(), None);

        let err = ViewDescriptor::try_from(&json!("GWSAMPLE_BASIC")).unwrap_err();
        assert_eq!(err, DescriptorError::NotAnObject);
    }

    #[test]
    fn test_descriptor_non_string_fields() {
        let err = ViewDescriptor::try_from(&json!({"view": 5, "entity": "E", "filter": ""}))
            .unwrap_err();
        assert_eq!(err, DescriptorError::InvalidView);
        assert_eq!(err.view(), None);
        assert_eq!(err.to_string(), "field 'view' is not a string");

        let err = ViewDescriptor::try_from(&json!({"view": "V", "entity": "E", "filter": null}))
            .unwrap_err();
        assert_eq!(err.view(), Some("V"));
        assert_eq!(err.to_string(), "field 'filter' is not a string");
    }

    #[test]
    fn test_structured_reply_defaults() {
        let reply: StructuredReply = serde_json::from_str(r#"{"views": []}"#).unwrap();
        assert!(reply.views.is_empty());
        assert_eq!(reply.interpretation, "");
        assert_eq!(reply.suggestion, "");
    }

    #[test]
    fn test_ask_request_missing_query_is_empty() {
        let req: AskRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.user_query, "");
    }
}
