use std::collections::{BTreeMap, HashMap};

use crate::{
    errors::CapturedError,
    result::{ResultId, ResultSpec},
    step::StepId,
    value::Value,
};

/// One device under test.
///
/// A target is owned by exactly one [`crate::Test`] for the duration of a run;
/// the run loop is the only writer of its error records and step cursor.
/// Step functions write measurements through [`Target::set_result`].
#[derive(Debug, Clone, Default)]
pub struct Target {
    name: String,
    result_values: HashMap<ResultId, Option<Value>>,
    step_errors: BTreeMap<StepId, CapturedError>,
    active_step: usize,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Steps may rename a target, e.g. after scanning its serial number.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Records a measurement for `result`, replacing any earlier value.
    pub fn set_result(&mut self, result: &ResultSpec, value: impl Into<Value>) {
        self.result_values.insert(result.id(), Some(value.into()));
    }

    /// Recorded value, or `None` when unset.
    pub fn result(&self, result: &ResultSpec) -> Option<&Value> {
        self.result_values.get(&result.id()).and_then(Option::as_ref)
    }

    /// True once `result` has an entry, set or materialized as unset.
    pub fn has_entry(&self, result: &ResultSpec) -> bool {
        self.result_values.contains_key(&result.id())
    }

    /// Number of steps this target has participated in during the current run.
    pub fn active_step(&self) -> usize {
        self.active_step
    }

    pub fn step_error(&self, step: StepId) -> Option<&CapturedError> {
        self.step_errors.get(&step)
    }

    pub fn step_trace(&self, step: StepId) -> Option<&str> {
        self.step_errors.get(&step).map(CapturedError::trace)
    }

    /// Clears measurements, error records and the step cursor. The name stays.
    pub fn reset(&mut self) {
        self.result_values.clear();
        self.step_errors.clear();
        self.active_step = 0;
    }

    pub(crate) fn record_error(&mut self, step: StepId, error: CapturedError) {
        self.step_errors.insert(step, error);
    }

    pub(crate) fn advance(&mut self) {
        self.active_step += 1;
    }

    /// Inserts an unset entry for every result without one. Idempotent.
    pub(crate) fn materialize(&mut self, results: &[ResultSpec]) {
        for result in results {
            self.result_values.entry(result.id()).or_insert(None);
        }
    }
}
