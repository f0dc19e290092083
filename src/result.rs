//! Result slots: named, typed measurements a step may populate.
//!
//! A [`ResultSpec`] is a cheap handle. Identity is the handle, not the
//! description, so two results may share a description and still be told
//! apart. Values live on the [`crate::Target`], keyed by [`ResultId`].

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    errors::{AutoTestError, CapturedError, Result},
    outcome::Outcome,
    value::Value,
};

static NEXT_RESULT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a [`ResultSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultId(u64);

/// What a classifier returns: a pass/fail boolean or an explicit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass(bool),
    Outcome(Outcome),
}

impl From<bool> for Verdict {
    fn from(pass: bool) -> Self {
        Verdict::Pass(pass)
    }
}

impl From<Outcome> for Verdict {
    fn from(outcome: Outcome) -> Self {
        Verdict::Outcome(outcome)
    }
}

/// Classifier function over an optional (possibly unset) value.
pub type Classifier = Arc<dyn Fn(Option<&Value>) -> Verdict + Send + Sync>;

struct ResultInner {
    description: String,
    units: Option<String>,
    displayed: bool,
    classifier: Classifier,
}

/// Handle to a result slot.
#[derive(Clone)]
pub struct ResultSpec {
    id: ResultId,
    inner: Arc<ResultInner>,
}

impl ResultSpec {
    /// Result with the default classifier: pass when a value was recorded.
    pub fn new(description: impl Into<String>) -> Self {
        Self::build(
            description.into(),
            None,
            true,
            Arc::new(|v: Option<&Value>| Verdict::from(v.is_some())),
        )
    }

    /// Result with a caller supplied classifier.
    ///
    /// ```rust
    /// use autotest::{ResultSpec, Outcome};
    /// let serial = ResultSpec::with_classifier("Serial Number", |v| {
    ///     v.and_then(|v| v.as_text()).map_or(false, |s| s.len() > 5)
    /// });
    /// assert_eq!(serial.classify(Some(&"12345".into())).unwrap(), Outcome::Failure);
    /// ```
    pub fn with_classifier<F, V>(description: impl Into<String>, classifier: F) -> Self
    where
        F: Fn(Option<&Value>) -> V + Send + Sync + 'static,
        V: Into<Verdict>,
    {
        Self::build(
            description.into(),
            None,
            true,
            Arc::new(move |v: Option<&Value>| classifier(v).into()),
        )
    }

    fn build(
        description: String,
        units: Option<String>,
        displayed: bool,
        classifier: Classifier,
    ) -> Self {
        Self {
            id: ResultId(NEXT_RESULT_ID.fetch_add(1, Ordering::Relaxed)),
            inner: Arc::new(ResultInner {
                description,
                units,
                displayed,
                classifier,
            }),
        }
    }

    /// Sets the measurement units. Call before handing the result to a step.
    pub fn units(self, units: impl Into<String>) -> Self {
        self.rebuild(|inner| inner.units = Some(units.into()))
    }

    /// Hides the result from the live table; it is still exported.
    pub fn hidden(self) -> Self {
        self.rebuild(|inner| inner.displayed = false)
    }

    fn rebuild(self, edit: impl FnOnce(&mut ResultInner)) -> Self {
        let mut inner = ResultInner {
            description: self.inner.description.clone(),
            units: self.inner.units.clone(),
            displayed: self.inner.displayed,
            classifier: Arc::clone(&self.inner.classifier),
        };
        edit(&mut inner);
        Self {
            id: self.id,
            inner: Arc::new(inner),
        }
    }

    pub fn id(&self) -> ResultId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.inner.description
    }

    pub fn unit(&self) -> Option<&str> {
        self.inner.units.as_deref()
    }

    pub fn is_displayed(&self) -> bool {
        self.inner.displayed
    }

    /// Column label: `"<description> (<units>)"`, or the bare description.
    pub fn label(&self) -> String {
        match self.unit() {
            Some(units) => format!("{} ({})", self.description(), units),
            None => self.description().to_string(),
        }
    }

    /// Classifies a value into Success, Warning or Failure.
    ///
    /// A classifier that answers with any other outcome, or panics, breaks
    /// its contract and yields a configuration error instead of being coerced.
    pub fn classify(&self, value: Option<&Value>) -> Result<Outcome> {
        let verdict = panic::catch_unwind(AssertUnwindSafe(|| (self.inner.classifier)(value)))
            .map_err(|payload| {
                AutoTestError::configuration(format!(
                    "classifier for result '{}' panicked: {}",
                    self.description(),
                    CapturedError::from_panic(&*payload).message()
                ))
            })?;
        match verdict {
            Verdict::Pass(true) => Ok(Outcome::Success),
            Verdict::Pass(false) => Ok(Outcome::Failure),
            Verdict::Outcome(outcome) if outcome.is_classification() => Ok(outcome),
            Verdict::Outcome(outcome) => Err(AutoTestError::configuration(format!(
                "classifier for result '{}' returned {:?}; expected a boolean, Success, Warning or Failure",
                self.description(),
                outcome
            ))),
        }
    }
}

impl PartialEq for ResultSpec {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResultSpec {}

impl fmt::Debug for ResultSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSpec")
            .field("id", &self.id)
            .field("description", &self.inner.description)
            .field("units", &self.inner.units)
            .field("displayed", &self.inner.displayed)
            .finish()
    }
}
