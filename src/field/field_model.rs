use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// One detected form control, as reported by the classifier.
///
/// Field order inside an inspection result is significant: fields of the same
/// form, section and frame are contiguous, and the table relies on that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDetail {
    pub inspect_id: String,

    #[serde(default)]
    pub frame_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browsing_context_id: Option<u64>,

    // Grouping keys. A field missing one of them is rendered as its own group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_index: Option<usize>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub field_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reason: String,

    #[serde(default = "default_visible")]
    pub is_visible: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Frame label such as `(M) example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<String>,
    /// Element id or name attribute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
}

impl FieldDetail {
    pub fn new(inspect_id: &str, field_name: &str) -> Self {
        Self {
            inspect_id: inspect_id.to_string(),
            frame_id: 0,
            browsing_context_id: None,
            form_index: None,
            section_index: None,
            field_name: field_name.to_string(),
            reason: String::new(),
            is_visible: true,
            part: None,
            confidence: None,
            frame: None,
            identifier: None,
            local_name: None,
        }
    }

    pub fn in_group(mut self, form_index: usize, section_index: usize) -> Self {
        self.form_index = Some(form_index);
        self.section_index = Some(section_index);
        self
    }

    pub fn in_frame(mut self, frame_id: i64, browsing_context_id: u64) -> Self {
        self.frame_id = frame_id;
        self.browsing_context_id = Some(browsing_context_id);
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.field_name.is_empty()
    }

    pub fn is_credit_card(&self) -> bool {
        self.field_name.starts_with("cc-")
    }
}

/// A user correction of one field's classification, sent back to the
/// classifier on the next inspect call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOverride {
    pub inspect_id: String,
    pub field_name: String,
}

fn default_visible() -> bool {
    true
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode one entry of a classifier payload.
///
/// An entry that does not decode becomes an unknown field without grouping
/// keys, so it renders as a singleton row. It keeps its `inspectId` (or gets
/// a positional one) and its `frameId` when those are readable.
pub fn field_detail_from_value(value: &Value, position: usize) -> FieldDetail {
    match FieldDetail::deserialize(value) {
        Ok(field) => field,
        Err(e) => {
            let inspect_id = value
                .get("inspectId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("malformed-{}", position));
            warn!(inspect_id = %inspect_id, position, "Malformed field detail: {}", e);

            let mut field = FieldDetail::new(&inspect_id, "");
            field.frame_id = value.get("frameId").and_then(Value::as_i64).unwrap_or_default();
            field.reason = format!("malformed: {}", e);
            field
        }
    }
}

/// `deserialize_with` helper for field detail arrays: a bad entry costs only
/// its own row.
pub fn lenient_field_details<'de, D>(deserializer: D) -> Result<Vec<FieldDetail>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values
        .iter()
        .enumerate()
        .map(|(position, value)| field_detail_from_value(value, position))
        .collect())
}

/// Parse a classifier payload (a JSON array of field details).
pub fn parse_field_details(json: &str) -> Result<Vec<FieldDetail>, serde_json::Error> {
    let values: Vec<Value> = serde_json::from_str(json)?;
    Ok(values
        .iter()
        .enumerate()
        .map(|(position, value)| field_detail_from_value(value, position))
        .collect())
}
