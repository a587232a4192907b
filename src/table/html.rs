use crate::table::renderer::FieldTable;
use crate::table::table_model::{Cell, Column, Row, SectionIcon};

// ============================================================================
// HTML table: self-contained snapshot of the panel
// ============================================================================

/// Generate a self-contained HTML page with the inspection table.
///
/// Grouped columns become `rowspan` cells, invisible fields are greyed out,
/// edited field names are highlighted and selected rows are marked.
pub fn generate_html_table(table: &FieldTable, title: &str) -> String {
    let header: String = Column::ALL
        .iter()
        .map(|c| {
            format!(
                "<th id=\"{}\" class=\"field-list-column\"><div>{}</div></th>",
                c.id(),
                c.header()
            )
        })
        .collect::<Vec<_>>()
        .join("");

    let mut body = String::new();
    for row in table.rows() {
        body.push_str(&format!("<tr class=\"{}\">", row_classes(row)));
        for cell in &row.cells {
            body.push_str(&cell_html(cell));
        }
        body.push_str("</tr>\n");
    }

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; margin: 0; padding: 16px; }}
table {{ border-collapse: collapse; width: 100%; font-size: 13px; }}
th, td {{ border: 1px solid #ddd; padding: 4px 8px; text-align: left; }}
th {{ background: #f0f0f4; }}
tr.autofill-section-even td {{ background: #f8f8fb; }}
tr.selected td {{ background: rgba(0, 0, 255, 0.1); }}
td.autofill-invisible-field {{ color: #999; }}
td.changed {{ color: #c62828; font-weight: bold; }}
td.field-credit-card-icon::before {{ content: "\1F4B3"; }}
td.field-address-icon::before {{ content: "\1F3E0"; }}
</style>
</head>
<body>
<table class="field-list-table">
<thead><tr id="form-analysis-head-row">{header}</tr></thead>
<tbody id="form-analysis-table-body">
{body}</tbody>
</table>
</body>
</html>"##,
        title = escape_html(title),
        header = header,
        body = body,
    )
}

fn row_classes(row: &Row) -> String {
    let mut classes = vec!["field-list-item"];
    if row.invisible {
        classes.push("invisible");
    }
    if row.unknown {
        classes.push("unknown");
    }
    if row.alternate_section {
        classes.push("autofill-section-even");
    }
    if row.selected {
        classes.push("selected");
    }
    classes.join(" ")
}

fn cell_html(cell: &Cell) -> String {
    let mut classes = vec!["field-list-column"];
    if cell.invisible {
        classes.push("autofill-invisible-field");
    }
    if cell.changed {
        classes.push("changed");
    }
    match cell.icon {
        Some(SectionIcon::CreditCard) => classes.push("field-credit-card-icon"),
        Some(SectionIcon::Address) => classes.push("field-address-icon"),
        None => {}
    }

    let rowspan = if cell.row_span > 1 {
        format!(" rowspan=\"{}\"", cell.row_span)
    } else {
        String::new()
    };

    // Form and section cells carry only their grouping, not text.
    let text = match cell.column {
        Column::Form | Column::Section => String::new(),
        _ => escape_html(&cell.text),
    };

    format!(
        "<td id=\"{}\" class=\"{}\"{}>{}</td>",
        cell.column.id(),
        classes.join(" "),
        rowspan,
        text
    )
}

/// Escape HTML special characters.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
