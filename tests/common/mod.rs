//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::{cell::RefCell, io, rc::Rc};

use autotest::{NullRenderer, Outcome, Renderer, Step, StepResult, Target, Test, TestBuilder};

/// A builder that never touches the terminal.
pub fn quiet() -> TestBuilder {
    Test::builder().renderer(NullRenderer)
}

pub fn named_targets(names: &[&str]) -> Vec<Target> {
    names.iter().map(|name| Target::new(*name)).collect()
}

pub fn passing(description: &str) -> Step {
    Step::single(description, |_, _| Ok(()))
}

pub fn raising(description: &str, message: &'static str) -> Step {
    Step::single(description, move |_, _| -> StepResult { Err(message.into()) })
}

/// Renderer recording every target's aggregate state at every redraw.
#[derive(Clone, Default)]
pub struct StateLog {
    frames: Rc<RefCell<Vec<Vec<Outcome>>>>,
}

impl StateLog {
    pub fn frames(&self) -> Vec<Vec<Outcome>> {
        self.frames.borrow().clone()
    }

    /// States of target `index` across all frames.
    pub fn history(&self, index: usize) -> Vec<Outcome> {
        self.frames.borrow().iter().map(|frame| frame[index]).collect()
    }
}

impl Renderer for StateLog {
    fn render(&self, test: &Test) -> io::Result<()> {
        let frame = test
            .targets()
            .iter()
            .map(|target| test.target_state(target))
            .collect();
        self.frames.borrow_mut().push(frame);
        Ok(())
    }
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
