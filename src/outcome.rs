//! Outcome vocabulary shared by steps, targets and tests.
//!
//! [`Outcome`] is immutable. How an outcome is *shown* (its label and colors)
//! lives in [`OutcomeStyle`], which each [`crate::Test`] owns and passes to
//! renderers and exporters explicitly.

use std::fmt;

use termcolor::Color;

/// Per-step / per-target outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Not executed yet.
    Pending,
    Success,
    Warning,
    Failure,
    /// The step function returned an error or panicked.
    Error,
    /// An earlier step failed or errored for this target.
    Aborted,
}

impl Outcome {
    pub const ALL: [Outcome; 6] = [
        Outcome::Pending,
        Outcome::Success,
        Outcome::Warning,
        Outcome::Failure,
        Outcome::Error,
        Outcome::Aborted,
    ];

    /// Failure and Error end a target's run; every later step is Aborted.
    pub fn is_aborting(self) -> bool {
        matches!(self, Outcome::Failure | Outcome::Error)
    }

    /// Outcomes that stop outcome propagation to later steps.
    pub fn is_terminal(self) -> bool {
        self.is_aborting() || self == Outcome::Aborted
    }

    /// Valid results of a result classifier.
    pub fn is_classification(self) -> bool {
        matches!(self, Outcome::Success | Outcome::Warning | Outcome::Failure)
    }

    /// Severity rank used to aggregate a target's final label.
    ///
    /// `Failure` and `Error` share a rank. `Pending` and `Aborted` do not
    /// count toward severity and return `None`.
    pub fn severity(self) -> Option<u8> {
        match self {
            Outcome::Success => Some(1),
            Outcome::Warning => Some(2),
            Outcome::Failure | Outcome::Error => Some(3),
            Outcome::Pending | Outcome::Aborted => None,
        }
    }

    /// Canonical label, before any per-test override.
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Pending => "Pending",
            Outcome::Success => "Pass",
            Outcome::Warning => "Warning",
            Outcome::Failure => "Fail",
            Outcome::Error => "ERROR",
            Outcome::Aborted => "Aborted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Test-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestState {
    /// At least one target is still pending.
    Pending,
    /// Every target reached a final outcome (any mix of pass/fail/warning).
    Complete,
    /// Every target errored.
    Error,
}

impl TestState {
    pub fn is_finished(self) -> bool {
        !matches!(self, TestState::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestState::Pending => "Pending",
            TestState::Complete => "Complete",
            TestState::Error => "ERROR",
        }
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label and colors for one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeLook {
    pub label: String,
    pub background: Color,
    pub foreground: Color,
}

/// Display mapping `Outcome -> label/color`, owned per Test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeStyle {
    looks: [OutcomeLook; 6],
}

impl OutcomeStyle {
    /// Replaces the "Pass" label. An overridden success label renders white.
    pub fn with_success_label(mut self, label: impl Into<String>) -> Self {
        let look = &mut self.looks[Self::slot(Outcome::Success)];
        look.label = label.into();
        look.background = Color::White;
        self
    }

    pub fn label(&self, outcome: Outcome) -> &str {
        &self.looks[Self::slot(outcome)].label
    }

    pub fn look(&self, outcome: Outcome) -> &OutcomeLook {
        &self.looks[Self::slot(outcome)]
    }

    fn slot(outcome: Outcome) -> usize {
        match outcome {
            Outcome::Pending => 0,
            Outcome::Success => 1,
            Outcome::Warning => 2,
            Outcome::Failure => 3,
            Outcome::Error => 4,
            Outcome::Aborted => 5,
        }
    }
}

impl Default for OutcomeStyle {
    fn default() -> Self {
        let look = |outcome: Outcome, background, foreground| OutcomeLook {
            label: outcome.as_str().to_string(),
            background,
            foreground,
        };
        Self {
            looks: [
                look(Outcome::Pending, Color::Black, Color::White),
                look(Outcome::Success, Color::Green, Color::Black),
                look(Outcome::Warning, Color::Yellow, Color::Black),
                look(Outcome::Failure, Color::Red, Color::Black),
                look(Outcome::Error, Color::Red, Color::Black),
                look(Outcome::Aborted, Color::Black, Color::White),
            ],
        }
    }
}
