use crate::error::InspectorError;
use crate::field::field_model::{FieldDetail, parse_field_details};

pub mod cli;
pub mod error;
pub mod export;
pub mod field;
pub mod inspect;
pub mod messaging;
pub mod table;
pub mod tagger;
pub mod trace;

/// Read a saved inspection result (a JSON array of field details).
pub fn load_field_details(path: &str) -> Result<Vec<FieldDetail>, InspectorError> {
    let content = std::fs::read_to_string(path).map_err(|e| InspectorError::Io {
        context: format!("reading '{}'", path),
        source: e,
    })?;
    parse_field_details(&content).map_err(|e| InspectorError::JsonParse {
        context: path.to_string(),
        source: e,
    })
}
