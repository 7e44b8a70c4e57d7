use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Input kinds a field definition can take. Each kind maps to its own
/// rendering control on the client; validation here only cares about
/// required-ness, never about well-formedness of dates or times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Date,
    Time,
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Text
    }
}

/// One named input descriptor of the active form. `name` is the stable
/// binding key between a definition and submitted values; renaming it
/// orphans previously entered values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub enabled: bool,
}

/// The form schema presented to end users. At most one configuration is
/// active at any time; this service only reads and rewrites the active
/// one, it never activates another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormConfiguration {
    pub id: String,
    pub fields: Vec<FieldDefinition>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One completed form, persisted with a gateway-assigned identity and
/// timestamp. `id` and `created_at` are immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: String,
    pub instagram: String,
    pub recipient_name: String,
    pub desired_date: String,
    pub desired_time: String,
    pub address: String,
    pub additional_notes: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default = "empty_metadata")]
    pub metadata: Value,
    pub created_at: String,
}

pub fn empty_metadata() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Payload for a new submission. Values for admin-added custom fields
/// arrive through the flattened map so they can participate in required
/// validation; only the fixed columns are ever persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSubmission {
    #[serde(default)]
    pub instagram: String,
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub desired_date: String,
    #[serde(default)]
    pub desired_time: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub additional_notes: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, String>,
}

impl NewSubmission {
    /// Current value bound to a field name, fixed columns first.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        match name {
            "instagram" => Some(&self.instagram),
            "recipient_name" => Some(&self.recipient_name),
            "desired_date" => Some(&self.desired_date),
            "desired_time" => Some(&self.desired_time),
            "address" => Some(&self.address),
            "additional_notes" => Some(&self.additional_notes),
            "coupon_code" => self.coupon_code.as_deref(),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}

/// The allow-listed editable subset of a submission. Any other field name
/// fails deserialization, so the allow-list is enforced at the gateway
/// boundary and not just in the UI. `id` and `created_at` are deliberately
/// absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmissionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
}

/// Shallow patch for one field definition in the editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_type_uses_lowercase_wire_names() {
        let field: FieldDefinition = serde_json::from_value(json!({
            "name": "notes",
            "label": "Notas",
            "type": "textarea",
            "required": false,
            "enabled": true
        }))
        .unwrap();
        assert_eq!(field.field_type, FieldType::Textarea);
        let raw = serde_json::to_value(&field).unwrap();
        assert_eq!(raw["type"], json!("textarea"));
    }

    #[test]
    fn submission_update_rejects_unknown_fields() {
        let result: Result<SubmissionUpdate, _> = serde_json::from_value(json!({
            "instagram": "@alguien",
            "created_at": "2025-01-01T00:00:00Z"
        }));
        assert!(result.is_err());

        let result: Result<SubmissionUpdate, _> = serde_json::from_value(json!({
            "instagram": "@alguien",
            "coupon_code": "CUPON10"
        }));
        assert!(result.is_ok());
    }

    #[test]
    fn new_submission_collects_custom_field_values() {
        let payload: NewSubmission = serde_json::from_value(json!({
            "instagram": "@alguien",
            "color_favorito": "rojo"
        }))
        .unwrap();
        assert_eq!(payload.value_of("instagram"), Some("@alguien"));
        assert_eq!(payload.value_of("color_favorito"), Some("rojo"));
        assert_eq!(payload.value_of("inexistente"), None);
    }
}
