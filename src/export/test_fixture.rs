use serde::Serialize;

use crate::error::InspectorError;
use crate::export::bundle::ExportFile;
use crate::field::field_model::FieldDetail;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedField {
    pub field_name: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedSection {
    pub fields: Vec<ExpectedField>,
}

/// Group an inspection result into the expected sections of a heuristic
/// test. Unnamed fields and invisible `input`s are left out; every change of
/// (form, section) opens a new section.
pub fn expected_sections(fields: &[FieldDetail]) -> Vec<ExpectedSection> {
    let mut sections: Vec<ExpectedSection> = Vec::new();
    let mut current_key = None;

    for field in fields {
        if field.is_unknown() || (!field.is_visible && field.local_name.as_deref() == Some("input")) {
            continue;
        }

        let key = (field.form_index, field.section_index);
        if current_key != Some(key) {
            current_key = Some(key);
            sections.push(ExpectedSection { fields: Vec::new() });
        }

        if let Some(section) = sections.last_mut() {
            section.fields.push(ExpectedField {
                field_name: field.field_name.clone(),
                reason: field.reason.clone(),
                part: field.part.filter(|p| *p != 0),
            });
        }
    }
    sections
}

/// Pretty-printed expected result, two-space indented.
pub fn expected_result_json(sections: &[ExpectedSection]) -> Result<String, InspectorError> {
    serde_json::to_string_pretty(sections).map_err(|e| InspectorError::JsonSerialize {
        context: "expected test result".into(),
        source: e,
    })
}

/// Browser test registering the frozen page of `host` as a heuristic fixture
/// with `expected_json` as its expected result.
pub fn render_heuristic_test(host: &str, expected_json: &str) -> String {
    let expected = expected_json
        .lines()
        .map(|line| format!("      {}", line))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"
/* global add_heuristic_tests */

"use strict";

add_heuristic_tests(
  [
    {{
      fixturePath: "{host}.html",
      expectedResult:
{expected}
    }},
  ],
  "fixtures/third_party/{host}/"
);
"#
    )
}

pub fn heuristic_test_filename(host: &str) -> String {
    format!("browser_{}.js", host)
}

/// `<host>.json` plus the rendered `browser_<host>.js`.
pub fn create_test_files(host: &str, fields: &[FieldDetail]) -> Result<Vec<ExportFile>, InspectorError> {
    let json = expected_result_json(&expected_sections(fields))?;
    let test = render_heuristic_test(host, &json);
    Ok(vec![
        ExportFile::text(format!("{}.json", host), &json),
        ExportFile::text(heuristic_test_filename(host), &test),
    ])
}
