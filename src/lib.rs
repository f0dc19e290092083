//! AutoTest: sequences test steps against devices under test, renders a live
//! status table and appends one report row per device per run.
//!
//! ```rust
//! use autotest::{NullRenderer, ResultSpec, Step, Target, Test, TestState};
//!
//! let voltage = ResultSpec::new("Battery Voltage").units("volts");
//! let mut test = Test::builder()
//!     .name("Example Test")
//!     .target(Target::new("DUT 1"))
//!     .renderer(NullRenderer)
//!     .build();
//! let handle = voltage.clone();
//! test.add_step(
//!     Step::single("Apply Battery Power", move |_, target| {
//!         target.set_result(&handle, 3.703);
//!         Ok(())
//!     })
//!     .result(&voltage),
//! );
//! assert_eq!(test.run().unwrap(), TestState::Complete);
//! assert_eq!(test.export_row(&test.targets()[0])[6], "Pass");
//! ```

pub use crate::errors::{AutoTestError, CapturedError, Result, StepError, StepResult};
pub use crate::outcome::{Outcome, OutcomeStyle, TestState};
pub use crate::prompt::{PromptSource, ScriptedPrompt, TerminalPrompt};
pub use crate::render::{NullRenderer, RecordingRenderer, Renderer, TerminalRenderer};
pub use crate::report::{CsvReport, MemorySink, ReportName, RowSink};
pub use crate::result::{ResultSpec, Verdict};
pub use crate::step::{Step, StepContext, StepId, StepIdentifier};
pub use crate::target::Target;
pub use crate::test::{Test, TestBuilder};
pub use crate::value::Value;

pub mod cli;
pub mod config;
pub mod errors;
pub mod export;
pub mod outcome;
pub mod prompt;
pub mod render;
pub mod report;
pub mod result;
pub mod station;
pub mod step;
pub mod target;
pub mod value;
