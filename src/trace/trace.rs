use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::inspect::orchestrator::InspectState;

/// One line of the inspection trace: a state transition of an inspect cycle.
#[derive(Debug, Serialize)]
pub struct InspectEvent {
    pub timestamp_ms: u128,
    pub tab_id: u64,
    pub cycle: u64,

    pub state: String,

    pub manual: Option<bool>,
    pub field_count: Option<usize>,
    pub override_count: Option<usize>,

    pub outcome: Option<String>,
}

impl InspectEvent {
    pub fn now(tab_id: u64, cycle: u64, state: &InspectState) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            tab_id,
            cycle,
            state: format!("{:?}", state),
            manual: None,
            field_count: None,
            override_count: None,
            outcome: None,
        }
    }

    pub fn with_manual(mut self, manual: bool) -> Self {
        self.manual = Some(manual);
        self
    }

    pub fn with_field_count(mut self, count: usize) -> Self {
        self.field_count = Some(count);
        self
    }

    pub fn with_override_count(mut self, count: usize) -> Self {
        self.override_count = Some(count);
        self
    }

    pub fn with_outcome(mut self, outcome: impl ToString) -> Self {
        self.outcome = Some(outcome.to_string());
        self
    }
}
