use std::collections::HashSet;
use std::ops::Range;

use tracing::debug;

use crate::field::field_model::{FieldDetail, FieldOverride};
use crate::field::store::FieldDetailStore;
use crate::field::vocabulary::edit_options;
use crate::table::filter::{FilterOptions, displayed_fields};
use crate::table::span::{RowSpans, compute_spans, spanned_rows};
use crate::table::table_model::{Cell, Column, HighlightKind, Row, RowId, RowView, SectionIcon};

/// Side effect requested by a table interaction. The panel turns these into
/// messages for the inspected page.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEffect {
    ScrollTo(FieldDetail),
    AddHighlight {
        kind: HighlightKind,
        fields: Vec<FieldDetail>,
    },
    RemoveHighlight {
        kind: HighlightKind,
        fields: Vec<FieldDetail>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditToggle {
    Entered,
    Exited { reinspect: bool },
}

/// The inspection result table.
///
/// Rows are rebuilt from the store on every render and refer to their field by
/// inspect id only; every interaction resolves the id against the store again,
/// so a row whose field disappeared simply does nothing.
#[derive(Debug, Default)]
pub struct FieldTable {
    rows: Vec<Row>,
    spans: Vec<RowSpans>,

    // Survives re-renders, keyed by inspect id.
    selected: HashSet<String>,

    editing: bool,
    has_pending_edit: bool,
    overrides_at_edit_start: Vec<FieldOverride>,
}

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild all rows from the store's current result.
    pub fn render(&mut self, store: &FieldDetailStore, filter: &FilterOptions) {
        let displayed = displayed_fields(store.fields(), filter);
        let spans = compute_spans(&displayed);

        let mut rows = Vec::with_capacity(displayed.len());
        let mut sections_seen = 0usize;

        for (index, (field, span)) in displayed.iter().zip(&spans).enumerate() {
            if span.section.is_some() {
                sections_seen += 1;
            }

            let mut cells = Vec::with_capacity(Column::ALL.len());
            for column in Column::ALL {
                let row_span = match column.group_level() {
                    Some(level) => match span.get(level) {
                        Some(n) => n,
                        None => continue,
                    },
                    None => 1,
                };

                let icon = (column == Column::Section).then(|| {
                    if field.is_credit_card() {
                        SectionIcon::CreditCard
                    } else {
                        SectionIcon::Address
                    }
                });

                cells.push(Cell {
                    column,
                    text: column.value(field),
                    row_span,
                    changed: column == Column::FieldName && store.is_changed(field),
                    invisible: column.group_level().is_none() && !field.is_visible,
                    icon,
                });
            }

            let view = if self.editing {
                editing_view(&field.field_name)
            } else {
                RowView::Display
            };

            rows.push(Row {
                id: RowId(index),
                inspect_id: field.inspect_id.clone(),
                cells,
                invisible: !field.is_visible,
                unknown: field.is_unknown(),
                alternate_section: sections_seen % 2 == 0,
                selected: self.selected.contains(&field.inspect_id),
                view,
            });
        }

        self.rows = rows;
        self.spans = spans;
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id.0)
    }

    pub fn spans(&self) -> &[RowSpans] {
        &self.spans
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn first_selected(&self) -> Option<&Row> {
        self.rows.iter().find(|r| r.selected)
    }

    pub fn is_selected(&self, inspect_id: &str) -> bool {
        self.selected.contains(inspect_id)
    }

    /// Field behind a row, if it is still part of the store's result.
    pub fn row_field<'s>(&self, store: &'s FieldDetailStore, id: RowId) -> Option<&'s FieldDetail> {
        self.row(id).and_then(|row| store.field(&row.inspect_id))
    }

    // Rows affected by an event on `column` of row `index`: the whole run when
    // the event hit a grouped cell, otherwise just the row.
    fn target_rows(&self, index: usize, column: Column) -> Range<usize> {
        match column.group_level() {
            Some(level) => spanned_rows(&self.spans, index, level),
            None => index..index + 1,
        }
    }

    fn fields_for(&self, store: &FieldDetailStore, rows: Range<usize>) -> Vec<FieldDetail> {
        self.rows[rows]
            .iter()
            .filter_map(|row| store.field(&row.inspect_id).cloned())
            .collect()
    }

    pub fn hover_enter(&self, store: &FieldDetailStore, id: RowId, column: Column) -> Vec<TableEffect> {
        let Some(field) = self.row_field(store, id) else {
            debug!(row = id.0, "hover on a row without a field, ignoring");
            return vec![];
        };

        let fields = self.fields_for(store, self.target_rows(id.0, column));
        vec![
            TableEffect::ScrollTo(field.clone()),
            TableEffect::AddHighlight {
                kind: HighlightKind::Hover,
                fields,
            },
        ]
    }

    pub fn hover_leave(&self, store: &FieldDetailStore, id: RowId, column: Column) -> Vec<TableEffect> {
        if self.row_field(store, id).is_none() {
            return vec![];
        }

        let fields = self.fields_for(store, self.target_rows(id.0, column));
        vec![TableEffect::RemoveHighlight {
            kind: HighlightKind::Hover,
            fields,
        }]
    }

    /// Toggle selection of the clicked row, or of every row under a grouped cell.
    pub fn click(&mut self, store: &FieldDetailStore, id: RowId, column: Column) -> Vec<TableEffect> {
        if self.row_field(store, id).is_none() {
            debug!(row = id.0, "click on a row without a field, ignoring");
            return vec![];
        }

        let mut add = Vec::new();
        let mut remove = Vec::new();

        for index in self.target_rows(id.0, column) {
            let row = &mut self.rows[index];
            let Some(field) = store.field(&row.inspect_id) else {
                continue;
            };

            if row.selected {
                self.selected.remove(&row.inspect_id);
                remove.push(field.clone());
            } else {
                self.selected.insert(row.inspect_id.clone());
                add.push(field.clone());
            }
            row.selected = !row.selected;
        }

        let mut effects = Vec::new();
        if !remove.is_empty() {
            effects.push(TableEffect::RemoveHighlight {
                kind: HighlightKind::Select,
                fields: remove,
            });
        }
        if !add.is_empty() {
            effects.push(TableEffect::AddHighlight {
                kind: HighlightKind::Select,
                fields: add,
            });
        }
        effects
    }

    pub fn toggle_edit_mode(&mut self, store: &FieldDetailStore) -> EditToggle {
        if self.editing {
            EditToggle::Exited {
                reinspect: self.exit_edit_mode(store),
            }
        } else {
            self.enter_edit_mode(store);
            EditToggle::Entered
        }
    }

    pub fn enter_edit_mode(&mut self, store: &FieldDetailStore) {
        self.editing = true;
        self.has_pending_edit = false;
        self.overrides_at_edit_start = store.overrides().to_vec();

        for row in &mut self.rows {
            let current = row
                .cell(Column::FieldName)
                .map(|c| c.text.clone())
                .unwrap_or_default();
            let changed = store.differs_from_origin(&row.inspect_id, &current);
            if let Some(cell) = row.cell_mut(Column::FieldName) {
                cell.changed = changed;
            }
            row.view = editing_view(&current);
        }
    }

    /// Apply a new field name picked in edit mode. Returns false when the
    /// table is not editing or the row no longer maps to a field.
    pub fn select_field_name(&mut self, store: &mut FieldDetailStore, id: RowId, value: &str) -> bool {
        if !self.editing {
            return false;
        }
        let Some(row) = self.rows.get_mut(id.0) else {
            return false;
        };
        if store.field(&row.inspect_id).is_none() {
            debug!(inspect_id = %row.inspect_id, "edit on a field that is gone, ignoring");
            return false;
        }

        store.record_override(&row.inspect_id, value);

        if let RowView::Editing { selected, .. } = &mut row.view {
            *selected = value.to_string();
        }
        let changed = store.differs_from_origin(&row.inspect_id, value);
        if let Some(cell) = row.cell_mut(Column::FieldName) {
            cell.changed = changed;
        }

        self.has_pending_edit = true;
        true
    }

    /// Leave edit mode, writing the picked values back into the cells.
    ///
    /// Returns whether an incremental reinspect is due: at least one edit was
    /// made and the net set of overrides differs from when editing started.
    pub fn exit_edit_mode(&mut self, store: &FieldDetailStore) -> bool {
        if !self.editing {
            return false;
        }

        for row in &mut self.rows {
            if let RowView::Editing { selected, .. } = std::mem::replace(&mut row.view, RowView::Display) {
                if let Some(cell) = row.cell_mut(Column::FieldName) {
                    cell.text = selected;
                }
            }
        }

        let reinspect = self.has_pending_edit
            && !same_overrides(&self.overrides_at_edit_start, store.overrides());

        self.editing = false;
        self.has_pending_edit = false;
        self.overrides_at_edit_start.clear();
        reinspect
    }
}

fn editing_view(current: &str) -> RowView {
    RowView::Editing {
        options: edit_options(current),
        selected: current.to_string(),
    }
}

fn same_overrides(a: &[FieldOverride], b: &[FieldOverride]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    b.iter().all(|ov| a.contains(ov))
}
