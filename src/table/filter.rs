use serde::{Deserialize, Serialize};

use crate::field::field_model::FieldDetail;

/// Which fields the table shows. Hidden and unclassified fields are left out
/// unless explicitly enabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    #[serde(default)]
    pub show_invisible: bool,
    #[serde(default)]
    pub show_unknown: bool,
}

impl FilterOptions {
    pub fn accepts(&self, field: &FieldDetail) -> bool {
        if !field.is_visible && !self.show_invisible {
            return false;
        }
        if field.is_unknown() && !self.show_unknown {
            return false;
        }
        true
    }
}

pub fn displayed_fields<'a>(fields: &'a [FieldDetail], options: &FilterOptions) -> Vec<&'a FieldDetail> {
    fields.iter().filter(|fd| options.accepts(fd)).collect()
}
