use std::borrow::Borrow;
use std::ops::Range;

use crate::field::field_model::FieldDetail;

/// Grouping levels, outermost first. Each level is bounded by the run of the
/// level above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupLevel {
    Form,
    Section,
    Frame,
}

impl GroupLevel {
    pub const ALL: [GroupLevel; 3] = [GroupLevel::Form, GroupLevel::Section, GroupLevel::Frame];
}

/// Row-span counts for one row. `Some(n)` means the row starts a run of `n`
/// rows at that level; `None` means an earlier row's cell already covers it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowSpans {
    pub form: Option<usize>,
    pub section: Option<usize>,
    pub frame: Option<usize>,
}

impl RowSpans {
    pub fn get(&self, level: GroupLevel) -> Option<usize> {
        match level {
            GroupLevel::Form => self.form,
            GroupLevel::Section => self.section,
            GroupLevel::Frame => self.frame,
        }
    }
}

/// Index of the first element in `(start, end)` matching `condition`, or `end`.
pub fn find_next_index<T>(items: &[T], start: usize, end: usize, condition: impl Fn(&T) -> bool) -> usize {
    let end = end.min(items.len());
    (start + 1..end).find(|&i| condition(&items[i])).unwrap_or(end)
}

// Two rows share a group only when both carry the key and it is equal.
fn same_key<K: PartialEq>(a: Option<K>, b: Option<K>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

/// Compute form/section/frame row spans for an ordered field list.
///
/// Every row is visited once per level and each boundary search only covers
/// the run it opens, so the whole pass is linear in the number of rows.
pub fn compute_spans<F: Borrow<FieldDetail>>(fields: &[F]) -> Vec<RowSpans> {
    let len = fields.len();
    let mut spans = vec![RowSpans::default(); len];

    let mut form_end = 0;
    let mut section_end = 0;
    let mut frame_end = 0;

    for index in 0..len {
        let field = fields[index].borrow();

        if index >= form_end {
            form_end = find_next_index(fields, index, len, |other| {
                !same_key(field.form_index, other.borrow().form_index)
            });
            spans[index].form = Some(form_end - index);
        }

        if index >= section_end {
            section_end = find_next_index(fields, index, form_end, |other| {
                !same_key(field.section_index, other.borrow().section_index)
            });
            spans[index].section = Some(section_end - index);
        }

        if index >= frame_end {
            frame_end = find_next_index(fields, index, section_end, |other| {
                !same_key(field.browsing_context_id, other.borrow().browsing_context_id)
            });
            spans[index].frame = Some(frame_end - index);
        }
    }

    spans
}

/// Rows covered by the grouped cell that starts at `index`, or just `index`
/// when no cell starts there.
pub fn spanned_rows(spans: &[RowSpans], index: usize, level: GroupLevel) -> Range<usize> {
    match spans.get(index).and_then(|s| s.get(level)) {
        Some(n) => index..index + n,
        None => index..index + 1,
    }
}

/// For each row, the length of the run it belongs to at `level`.
pub fn group_lengths(spans: &[RowSpans], level: GroupLevel) -> Vec<usize> {
    let mut lengths = Vec::with_capacity(spans.len());
    let mut current = 0;
    for span in spans {
        if let Some(n) = span.get(level) {
            current = n;
        }
        lengths.push(current);
    }
    lengths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_next_index_stops_at_end() {
        let items = [1, 1, 1, 2];
        assert_eq!(find_next_index(&items, 0, 4, |x| *x != 1), 3);
        assert_eq!(find_next_index(&items, 0, 2, |x| *x != 1), 2);
        assert_eq!(find_next_index(&items, 3, 4, |x| *x != 2), 4);
        assert_eq!(find_next_index(&items, 0, 10, |_| false), 4);
    }

    #[test]
    fn spanned_rows_falls_back_to_single_row() {
        let spans = vec![
            RowSpans { form: Some(2), section: Some(1), frame: Some(1) },
            RowSpans { form: None, section: Some(1), frame: Some(1) },
        ];
        assert_eq!(spanned_rows(&spans, 0, GroupLevel::Form), 0..2);
        assert_eq!(spanned_rows(&spans, 1, GroupLevel::Form), 1..2);
        assert_eq!(spanned_rows(&spans, 1, GroupLevel::Section), 1..2);
    }
}
