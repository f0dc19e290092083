//! Execution semantics of `Test::run`: grouping, error capture, outcome
//! propagation and early termination.

mod common;

use std::{cell::RefCell, rc::Rc};

use autotest::{
    MemorySink, Outcome, RecordingRenderer, ResultSpec, ScriptedPrompt, Step, StepResult,
    Target, Test, TestState, Value,
};
use common::{named_targets, passing, quiet, raising, StateLog};

fn serial_number() -> ResultSpec {
    ResultSpec::with_classifier("Serial Number", |v| {
        v.and_then(Value::as_text).map_or(false, |s| s.len() > 5)
    })
}

#[test]
fn short_serial_fails_and_aborts_the_rest() {
    let serial = serial_number();
    let slot = serial.clone();
    let sink = MemorySink::new();
    let mut test = quiet().report(sink.clone()).build();
    test.add_step(
        Step::single("A", move |_, target| {
            target.set_result(&slot, "12345");
            Ok(())
        })
        .result(&serial),
    );
    test.add_step(Step::group("B", |_, _| Ok(())));

    assert_eq!(test.run().unwrap(), TestState::Complete);

    let target = &test.targets()[0];
    assert_eq!(test.target_state(target), Outcome::Failure);
    assert_eq!(
        test.step_outcomes(target),
        vec![Outcome::Failure, Outcome::Aborted]
    );

    let rows = sink.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][6], "Fail");
    assert_eq!(rows[0][7], "#1 - A");
    assert_eq!(rows[0][8], "");
    assert_eq!(rows[0][9], "12345");
}

#[test]
fn grouped_raise_is_recorded_on_every_target() {
    for count in [2, 3] {
        let names: Vec<String> = (1..=count).map(|i| format!("DUT {}", i)).collect();
        let sink = MemorySink::new();
        let mut test = quiet()
            .targets(names.iter().map(Target::new))
            .report(sink.clone())
            .build();
        let step = test.add_step(Step::group("Connect", |_, _| -> StepResult {
            Err("link down".into())
        }));

        assert_eq!(test.run().unwrap(), TestState::Error);

        let traces: Vec<&str> = test
            .targets()
            .iter()
            .map(|target| target.step_trace(step).unwrap())
            .collect();
        assert_eq!(traces.len(), count);
        assert!(traces.iter().all(|trace| *trace == traces[0]));
        assert!(traces[0].contains("link down"));

        let rows = sink.rows();
        assert_eq!(rows.len(), count);
        for row in &rows {
            assert_eq!(row[6], "ERROR");
            assert_eq!(row[7], "#1 - Connect");
            assert_eq!(row[8], "link down");
        }
    }
}

#[test]
fn errored_step_leaves_its_results_unmaterialized() {
    let voltage = ResultSpec::new("Battery Voltage").units("volts");
    let current = ResultSpec::new("Current").units("microAmps");
    let mut test = quiet().targets(named_targets(&["ok", "bad"])).build();
    test.add_step(
        Step::single("Power", |_, target| -> StepResult {
            if target.name() == "bad" {
                return Err("no power".into());
            }
            Ok(())
        })
        .results([&voltage, &current]),
    );

    test.run().unwrap();

    let (ok, bad) = (&test.targets()[0], &test.targets()[1]);
    assert!(ok.has_entry(&voltage) && ok.has_entry(&current));
    assert!(!bad.has_entry(&voltage) && !bad.has_entry(&current));
    assert_eq!(&test.export_row(bad)[9..], ["None", "None"]);
}

#[test]
fn panicking_step_is_captured_as_error() {
    let mut test = quiet().targets(named_targets(&["a", "b"])).build();
    let step = test.add_step(Step::single("Flaky", |_, target| {
        if target.name() == "b" {
            panic!("fixture exploded");
        }
        Ok(())
    }));

    assert_eq!(test.run().unwrap(), TestState::Complete);

    let (a, b) = (&test.targets()[0], &test.targets()[1]);
    assert_eq!(test.target_state(a), Outcome::Success);
    assert_eq!(test.target_state(b), Outcome::Error);
    assert_eq!(b.step_error(step).unwrap().message(), "fixture exploded");
    assert!(a.step_error(step).is_none());
}

#[test]
fn no_steps_completes_with_empty_failing_step() {
    let sink = MemorySink::new();
    let mut test = quiet()
        .targets(named_targets(&["a", "b"]))
        .report(sink.clone())
        .build();
    test.reset();
    assert_eq!(test.run().unwrap(), TestState::Complete);
    for target in test.targets() {
        assert_eq!(test.target_state(target), Outcome::Success);
        assert_eq!(test.failing_step(target), None);
    }
    assert_eq!(sink.lines()[0].len(), 9);
    assert!(sink.rows().iter().all(|row| row[7].is_empty()));
}

#[test]
fn redraws_after_every_group() {
    let renderer = Rc::new(RecordingRenderer::new());
    let mut test = Test::builder()
        .targets(named_targets(&["a", "b", "c"]))
        .renderer(Rc::clone(&renderer))
        .build();
    test.add_step(passing("per target"));
    test.add_step(Step::group("grouped", |_, _| Ok(())));
    test.add_step(passing("per target again"));

    test.run().unwrap();

    assert_eq!(renderer.frame_count(), 3 + 1 + 3);
}

#[test]
fn eliminated_targets_leave_later_groups() {
    let seen: Rc<RefCell<Vec<Vec<String>>>> = Rc::default();
    let log = Rc::clone(&seen);
    let mut test = quiet().targets(named_targets(&["ok", "bad", "ok2"])).build();
    let check = test.add_step(Step::single("Check", |_, target| -> StepResult {
        if target.name() == "bad" {
            return Err("bad fixture".into());
        }
        Ok(())
    }));
    test.add_step(Step::group("Together", move |_, targets| {
        log.borrow_mut()
            .push(targets.iter().map(|t| t.name().to_string()).collect());
        Ok(())
    }));

    test.run().unwrap();

    assert_eq!(*seen.borrow(), vec![vec!["ok".to_string(), "ok2".to_string()]]);
    let bad = &test.targets()[1];
    assert_eq!(bad.active_step(), 1);
    assert_eq!(test.failing_step(bad), Some(check));
}

#[test]
fn run_stops_once_no_target_is_pending() {
    let calls = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&calls);
    let mut test = quiet().targets(named_targets(&["a", "b"])).build();
    test.add_step(raising("Power", "no power"));
    test.add_step(Step::single("Never", move |_, _| {
        *counter.borrow_mut() += 1;
        Ok(())
    }));

    assert_eq!(test.run().unwrap(), TestState::Error);
    assert_eq!(*calls.borrow(), 0);
    assert_eq!(test.active_targets().count(), 0);
}

#[test]
fn warnings_do_not_abort() {
    let current = ResultSpec::with_classifier("Current", |v| {
        match v.and_then(Value::as_f64) {
            Some(x) if x <= 750.0 => Outcome::Success,
            Some(_) => Outcome::Warning,
            None => Outcome::Failure,
        }
    });
    let slot = current.clone();
    let mut test = quiet().build();
    test.add_step(
        Step::single("Measure", move |_, target| {
            target.set_result(&slot, 760.5);
            Ok(())
        })
        .result(&current),
    );
    test.add_step(passing("Ship Mode"));

    test.run().unwrap();
    let target = &test.targets()[0];
    assert_eq!(
        test.step_outcomes(target),
        vec![Outcome::Warning, Outcome::Success]
    );
    assert_eq!(test.target_state(target), Outcome::Warning);
    assert_eq!(test.export_row(target)[6], "Warning");
}

#[test]
fn faulty_classifier_counts_as_failing_step() {
    let strange = ResultSpec::with_classifier("Strange", |_| Outcome::Aborted);
    let slot = strange.clone();
    let mut test = quiet().build();
    test.add_step(
        Step::single("Odd", move |_, target| {
            target.set_result(&slot, 1);
            Ok(())
        })
        .result(&strange),
    );

    test.run().unwrap();
    let target = &test.targets()[0];
    assert_eq!(test.target_state(target), Outcome::Failure);
    let row = test.export_row(target);
    assert_eq!(row[7], "#1 - Odd");
    assert!(row[8].contains("Configuration error"), "{}", row[8]);
}

#[test]
fn panicking_classifier_fails_its_step_and_still_exports() {
    let serial = ResultSpec::with_classifier("Serial Number", |v| {
        v.and_then(Value::as_text).expect("classifier expects text").len() > 5
    });
    let slot = serial.clone();
    let sink = MemorySink::new();
    let mut test = quiet().report(sink.clone()).build();
    test.add_step(
        Step::single("A", move |_, target| {
            target.set_result(&slot, 12345);
            Ok(())
        })
        .result(&serial),
    );
    test.add_step(passing("B"));

    assert_eq!(test.run().unwrap(), TestState::Complete);

    let target = &test.targets()[0];
    assert_eq!(test.target_state(target), Outcome::Failure);
    assert_eq!(
        test.step_outcomes(target),
        vec![Outcome::Failure, Outcome::Aborted]
    );
    let rows = sink.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][6], "Fail");
    assert_eq!(rows[0][7], "#1 - A");
    assert!(rows[0][8].contains("classifier expects text"), "{}", rows[0][8]);
}

#[test]
fn input_prompt_answer_reaches_the_step() {
    let serial = serial_number();
    let slot = serial.clone();
    let prompt = Rc::new(ScriptedPrompt::new(["SN004411\n", "SN004412"]));
    let mut test = quiet()
        .targets([Target::default(), Target::default()])
        .prompt(Rc::clone(&prompt))
        .build();
    test.add_step(
        Step::single("Scan Barcode", move |ctx, target| {
            let scanned = ctx.input().unwrap_or_default().to_string();
            target.set_name(scanned.clone());
            target.set_result(&slot, scanned);
            Ok(())
        })
        .input_prompt("Scan the DUT's barcode")
        .result(&serial),
    );

    test.run().unwrap();

    let names: Vec<&str> = test.targets().iter().map(Target::name).collect();
    assert_eq!(names, vec!["SN004411", "SN004412"]);
    assert_eq!(prompt.asked().len(), 2);
    assert_eq!(test.state(), TestState::Complete);
}

#[test]
fn reruns_start_from_a_clean_slate() {
    let flip = Rc::new(RefCell::new(true));
    let state = Rc::clone(&flip);
    let mut test = quiet().build();
    let step = test.add_step(Step::single("Sometimes", move |_, _| -> StepResult {
        let fail = *state.borrow();
        *state.borrow_mut() = !fail;
        if fail {
            Err("first run fails".into())
        } else {
            Ok(())
        }
    }));

    test.run().unwrap();
    assert_eq!(test.target_state(&test.targets()[0]), Outcome::Error);
    test.run().unwrap();
    let target = &test.targets()[0];
    assert_eq!(test.target_state(target), Outcome::Success);
    assert!(target.step_error(step).is_none());
}

#[test]
fn target_state_never_regresses_during_a_run() {
    let log = StateLog::default();
    let mut test = Test::builder()
        .targets(named_targets(&["a", "b"]))
        .renderer(log.clone())
        .build();
    test.add_step(passing("one"));
    test.add_step(raising("two", "boom"));
    test.add_step(passing("three"));

    test.run().unwrap();

    for index in 0..2 {
        let history = log.history(index);
        assert_eq!(history.last(), Some(&Outcome::Error));
        assert!(history
            .windows(2)
            .all(|pair| rank(pair[0]) <= rank(pair[1])));
    }
}

fn rank(outcome: Outcome) -> u8 {
    outcome.severity().unwrap_or(0)
}
