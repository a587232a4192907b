use crate::table::renderer::FieldTable;
use crate::table::table_model::{Column, Row, RowView, SectionIcon};

// ============================================================================
// Console table: formatted terminal output
// ============================================================================

/// Format the inspection table for terminal output.
///
/// Grouped columns are printed only on the row that opens the group, the way
/// a merged cell reads in the panel:
/// ```text
/// Form | Section | Frame            | FieldName  | Reason | ...
/// 0    | [addr]  | (M) example.com  | given-name | regex  | ...
///      |         |                  | email      | regex  | ...
/// ```
pub fn format_console_table(table: &FieldTable) -> String {
    let rows: Vec<Vec<String>> = table.rows().iter().map(row_texts).collect();

    let mut widths: Vec<usize> = Column::ALL.iter().map(|c| c.header().len()).collect();
    for texts in &rows {
        for (i, text) in texts.iter().enumerate() {
            widths[i] = widths[i].max(text.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = Column::ALL.iter().map(|c| c.header().to_string()).collect();
    push_line(&mut out, &header, &widths);

    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);

    for texts in &rows {
        push_line(&mut out, texts, &widths);
    }

    out.push_str(&format!("\n{} fields shown\n", table.rows().len()));
    out
}

fn row_texts(row: &Row) -> Vec<String> {
    Column::ALL
        .iter()
        .map(|column| {
            let Some(cell) = row.cell(*column) else {
                return String::new();
            };

            match (column, &row.view) {
                (Column::Section, _) => match cell.icon {
                    Some(SectionIcon::CreditCard) => format!("[cc] {}", cell.text),
                    _ => format!("[addr] {}", cell.text),
                },
                (Column::FieldName, RowView::Editing { selected, .. }) => format!("<{}>", selected),
                (Column::FieldName, _) if cell.changed => format!("{} *", cell.text),
                _ => cell.text.clone(),
            }
        })
        .collect()
}

fn push_line(out: &mut String, texts: &[String], widths: &[usize]) {
    let line = texts
        .iter()
        .zip(widths)
        .map(|(text, width)| format!("{:<width$}", text, width = width))
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(line.trim_end());
    out.push('\n');
}
