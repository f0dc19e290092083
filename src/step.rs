//! Test steps and step outcome computation.
//!
//! A [`Step`] declares up front how it wants to be called:
//!
//! - [`Step::single`] functions are invoked once per active target.
//! - [`Step::group`] functions are invoked once with every active target.
//!
//! A step may also declare an input prompt; the answer is collected from the
//! test's prompt source right before each invocation and handed over through
//! [`StepContext::input`].
//!
//! Outcomes are computed from the step list, the step's position and the
//! target state. Steps never hold a reference back to their test.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
};

use crate::{
    errors::{AutoTestError, CapturedError, Result, StepResult},
    outcome::Outcome,
    prompt::PromptSource,
    result::ResultSpec,
    target::Target,
};

/// Position of a step within its test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StepId(usize);

impl StepId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Operator facing identifier of a step: `#3` or `#calib`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StepIdentifier {
    Number(usize),
    Name(String),
}

impl fmt::Display for StepIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepIdentifier::Number(n) => write!(f, "{}", n),
            StepIdentifier::Name(s) => f.write_str(s),
        }
    }
}

impl From<usize> for StepIdentifier {
    fn from(n: usize) -> Self {
        StepIdentifier::Number(n)
    }
}

impl From<&str> for StepIdentifier {
    fn from(s: &str) -> Self {
        StepIdentifier::Name(s.to_string())
    }
}

impl From<String> for StepIdentifier {
    fn from(s: String) -> Self {
        StepIdentifier::Name(s)
    }
}

/// What a step function sees besides its target(s).
pub struct StepContext<'a> {
    identifier: &'a StepIdentifier,
    description: &'a str,
    prompt: &'a dyn PromptSource,
    input: Option<String>,
}

impl<'a> StepContext<'a> {
    pub fn identifier(&self) -> &StepIdentifier {
        self.identifier
    }

    pub fn description(&self) -> &str {
        self.description
    }

    /// Answer to the step's declared input prompt, if it has one.
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Asks the operator a question through the test's prompt source.
    pub fn prompt(&self, message: &str) -> Result<String> {
        self.prompt.prompt(message)
    }
}

pub type SingleFn = Box<dyn FnMut(&StepContext<'_>, &mut Target) -> StepResult>;
pub type GroupFn = Box<dyn FnMut(&StepContext<'_>, &mut [&mut Target]) -> StepResult>;

/// The step function together with its calling convention.
pub enum StepAction {
    Single(SingleFn),
    Group(GroupFn),
}

/// One ordered stage of a test.
pub struct Step {
    identifier: Option<StepIdentifier>,
    description: String,
    results: Vec<ResultSpec>,
    input_prompt: Option<String>,
    action: StepAction,
}

impl Step {
    /// A step invoked once per active target.
    pub fn single<F>(description: impl Into<String>, function: F) -> Self
    where
        F: FnMut(&StepContext<'_>, &mut Target) -> StepResult + 'static,
    {
        Self::with_action(description.into(), StepAction::Single(Box::new(function)))
    }

    /// A step invoked once with all active targets together.
    pub fn group<F>(description: impl Into<String>, function: F) -> Self
    where
        F: FnMut(&StepContext<'_>, &mut [&mut Target]) -> StepResult + 'static,
    {
        Self::with_action(description.into(), StepAction::Group(Box::new(function)))
    }

    fn with_action(description: String, action: StepAction) -> Self {
        Self {
            identifier: None,
            description,
            results: Vec::new(),
            input_prompt: None,
            action,
        }
    }

    /// Explicit identifier. Without one the step is numbered by position.
    pub fn identifier(mut self, identifier: impl Into<StepIdentifier>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Adds a result this step populates. Order is display and export order.
    pub fn result(mut self, result: &ResultSpec) -> Self {
        self.results.push(result.clone());
        self
    }

    pub fn results<'r>(mut self, results: impl IntoIterator<Item = &'r ResultSpec>) -> Self {
        self.results.extend(results.into_iter().cloned());
        self
    }

    /// Asks the operator `message` before every invocation.
    pub fn input_prompt(mut self, message: impl Into<String>) -> Self {
        self.input_prompt = Some(message.into());
        self
    }

    /// The identifier, which is always set once the step belongs to a test.
    pub fn id_label(&self) -> String {
        self.identifier
            .as_ref()
            .map_or_else(String::new, StepIdentifier::to_string)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn owned_results(&self) -> &[ResultSpec] {
        &self.results
    }

    pub fn is_group(&self) -> bool {
        matches!(self.action, StepAction::Group(_))
    }

    /// `"#<identifier> - <description>"`, as used for the failing step column.
    pub fn summary(&self) -> String {
        format!("#{} - {}", self.id_label(), self.description)
    }

    pub(crate) fn has_identifier(&self) -> bool {
        self.identifier.is_some()
    }

    pub(crate) fn assign_identifier(&mut self, identifier: StepIdentifier) {
        self.identifier = Some(identifier);
    }

    /// Outcome of this step, at position `id`, for `target`.
    ///
    /// `previous` is the outcome of the step right before it (`None` for the
    /// first step). Pure: missing result entries are read as unset.
    pub fn outcome(&self, id: StepId, previous: Option<Outcome>, target: &Target) -> Outcome {
        if previous.is_some_and(Outcome::is_terminal) {
            return Outcome::Aborted;
        }
        if target.active_step() <= id.index() {
            return Outcome::Pending;
        }
        if target.step_error(id).is_some() {
            return Outcome::Error;
        }

        let mut warned = false;
        for result in &self.results {
            match result.classify(target.result(result)) {
                Ok(Outcome::Failure) => return Outcome::Failure,
                Ok(Outcome::Warning) => warned = true,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(step = %self.id_label(), error = %e, "classifier contract violation");
                    return Outcome::Failure;
                }
            }
        }
        if warned {
            Outcome::Warning
        } else {
            Outcome::Success
        }
    }

    /// First classifier contract violation among this step's results.
    pub fn classifier_fault(&self, target: &Target) -> Option<AutoTestError> {
        self.results
            .iter()
            .find_map(|result| result.classify(target.result(result)).err())
    }

    /// Runs the step function for one execution group.
    ///
    /// Errors and panics are captured, never propagated.
    pub(crate) fn invoke(
        &mut self,
        prompt: &dyn PromptSource,
        group: &mut [&mut Target],
    ) -> std::result::Result<(), CapturedError> {
        let input = match &self.input_prompt {
            Some(message) => Some(
                prompt
                    .prompt(message)
                    .map_err(|e| CapturedError::from_error(&e))?,
            ),
            None => None,
        };
        let fallback = StepIdentifier::Number(0);
        let ctx = StepContext {
            identifier: self.identifier.as_ref().unwrap_or(&fallback),
            description: &self.description,
            prompt,
            input,
        };

        let outcome = match &mut self.action {
            StepAction::Single(function) => match group {
                [target] => {
                    panic::catch_unwind(AssertUnwindSafe(|| function(&ctx, &mut **target)))
                }
                _ => {
                    return Err(CapturedError::from_error(&AutoTestError::configuration(
                        format!("single-target step invoked with {} targets", group.len()),
                    )))
                }
            },
            StepAction::Group(function) => {
                panic::catch_unwind(AssertUnwindSafe(|| function(&ctx, group)))
            }
        };

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(CapturedError::from_error(&*error)),
            Err(payload) => Err(CapturedError::from_panic(&*payload)),
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("identifier", &self.identifier)
            .field("description", &self.description)
            .field("results", &self.results)
            .field("group", &self.is_group())
            .field("input_prompt", &self.input_prompt)
            .finish()
    }
}

/// Outcome of every step for `target`, in order.
///
/// Propagation is strictly sequential: each step sees the outcome of the one
/// right before it.
pub fn step_outcomes(steps: &[Step], target: &Target) -> Vec<Outcome> {
    let mut outcomes: Vec<Outcome> = Vec::with_capacity(steps.len());
    for (index, step) in steps.iter().enumerate() {
        let previous = outcomes.last().copied();
        outcomes.push(step.outcome(StepId::new(index), previous, target));
    }
    outcomes
}

/// Aggregate label of a target from its step outcomes.
///
/// Pending if any step is pending, else the most severe outcome; Aborted
/// steps add nothing. No steps at all is a Success.
pub fn aggregate(outcomes: &[Outcome]) -> Outcome {
    if outcomes.contains(&Outcome::Pending) {
        return Outcome::Pending;
    }
    let mut worst = Outcome::Success;
    for &outcome in outcomes {
        if outcome.severity() > worst.severity() {
            worst = outcome;
        }
    }
    worst
}
