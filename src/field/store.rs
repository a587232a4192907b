use std::collections::HashMap;

use tracing::debug;

use crate::field::field_model::{FieldDetail, FieldOverride};

/// Holds the last inspection result together with the user's pending
/// corrections and the field names seen before any correction.
///
/// The store is the only owner of `FieldDetail` entries once they have been
/// reconciled; the table reads from it and never keeps copies of its own.
#[derive(Debug, Default)]
pub struct FieldDetailStore {
    fields: Vec<FieldDetail>,
    index: HashMap<String, usize>,

    // Insertion-ordered so the next inspect request is deterministic.
    overrides: Vec<FieldOverride>,
    origin_names: HashMap<String, String>,
}

impl FieldDetailStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current result with a copy of `new_fields`.
    ///
    /// The origin-name baseline is captured from the first result of an edit
    /// session and left alone by later (incremental) results.
    pub fn reconcile(&mut self, new_fields: &[FieldDetail]) {
        self.fields = new_fields.to_vec();

        self.index.clear();
        for (i, fd) in self.fields.iter().enumerate() {
            self.index.entry(fd.inspect_id.clone()).or_insert(i);
        }

        if self.origin_names.is_empty() {
            for fd in &self.fields {
                self.origin_names
                    .entry(fd.inspect_id.clone())
                    .or_insert_with(|| fd.field_name.clone());
            }
        }

        debug!(
            fields = self.fields.len(),
            overrides = self.overrides.len(),
            "reconciled inspection result"
        );
    }

    /// Record a user correction. Picking the origin name again removes the
    /// override instead of storing a no-op correction.
    pub fn record_override(&mut self, inspect_id: &str, new_field_name: &str) {
        let reverted = self
            .origin_names
            .get(inspect_id)
            .is_some_and(|origin| origin == new_field_name);

        let existing = self.overrides.iter().position(|o| o.inspect_id == inspect_id);

        match (reverted, existing) {
            (true, Some(pos)) => {
                self.overrides.remove(pos);
            }
            (true, None) => {}
            (false, Some(pos)) => {
                self.overrides[pos].field_name = new_field_name.to_string();
            }
            (false, None) => self.overrides.push(FieldOverride {
                inspect_id: inspect_id.to_string(),
                field_name: new_field_name.to_string(),
            }),
        }
    }

    /// Forget all corrections and the origin baseline. Only a manual inspect
    /// starts a new edit session.
    pub fn reset_session(&mut self) {
        self.overrides.clear();
        self.origin_names.clear();
    }

    pub fn fields(&self) -> &[FieldDetail] {
        &self.fields
    }

    pub fn field(&self, inspect_id: &str) -> Option<&FieldDetail> {
        self.index.get(inspect_id).map(|&i| &self.fields[i])
    }

    pub fn overrides(&self) -> &[FieldOverride] {
        &self.overrides
    }

    pub fn override_for(&self, inspect_id: &str) -> Option<&FieldOverride> {
        self.overrides.iter().find(|o| o.inspect_id == inspect_id)
    }

    pub fn origin_name(&self, inspect_id: &str) -> Option<&str> {
        self.origin_names.get(inspect_id).map(String::as_str)
    }

    /// Whether `field_name` differs from the baseline recorded for this id.
    /// Fields that appeared after the baseline was taken count as unchanged.
    pub fn differs_from_origin(&self, inspect_id: &str, field_name: &str) -> bool {
        self.origin_name(inspect_id)
            .is_some_and(|origin| origin != field_name)
    }

    pub fn is_changed(&self, field: &FieldDetail) -> bool {
        self.differs_from_origin(&field.inspect_id, &field.field_name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
