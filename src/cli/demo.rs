//! A simulated production-line test.
//!
//! Mirrors a typical station script: scan a barcode, connect to every DUT at
//! once, then take a series of measurements. Measurements come from a seeded
//! RNG so a given seed always produces the same report values.

use std::{cell::RefCell, rc::Rc, thread, time::Duration};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::{
    outcome::Outcome,
    prompt::PromptSource,
    result::ResultSpec,
    step::Step,
    target::Target,
    test::{Test, TestBuilder},
    value::Value,
};

/// Chance that programming the firmware fails on a DUT.
const FIRMWARE_FAILURE_RATE: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub targets: usize,
    pub seed: u64,
    pub step_delay: Duration,
}

type SharedRng = Rc<RefCell<Xoshiro256PlusPlus>>;

fn within(low: f64, high: f64) -> impl Fn(Option<&Value>) -> bool + Send + Sync {
    move |v: Option<&Value>| {
        v.and_then(Value::as_f64)
            .map_or(false, |x| (low..=high).contains(&x))
    }
}

/// Serial numbers handed to the barcode prompt in unattended runs.
pub fn generated_serials(seed: u64, count: usize) -> Vec<String> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed ^ 0x5e71a1);
    (0..count)
        .map(|_| format!("SN{:06}", rng.gen_range(0..1_000_000)))
        .collect()
}

/// Builds the demo test on top of `builder`.
pub fn build(
    builder: TestBuilder,
    options: &DemoOptions,
    prompt: impl PromptSource + 'static,
) -> Test {
    let rng: SharedRng = Rc::new(RefCell::new(Xoshiro256PlusPlus::seed_from_u64(
        options.seed,
    )));
    let delay = options.step_delay;
    let pause = move || {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
    };

    let targets = (0..options.targets.max(1)).map(|_| Target::default());
    let mut test = builder.targets(targets).prompt(prompt).build();

    let serial = ResultSpec::with_classifier("Serial Number", |v| {
        v.and_then(Value::as_text).map_or(false, |s| s.len() > 5)
    });
    {
        let handle = serial.clone();
        test.add_step(
            Step::single("Scan Barcode", move |ctx, target| {
                let scanned = ctx.input().unwrap_or_default().trim().to_string();
                target.set_name(scanned.clone());
                target.set_result(&handle, scanned);
                Ok(())
            })
            .input_prompt("Scan the DUT's barcode")
            .result(&serial),
        );
    }

    let link_slot = ResultSpec::new("Link Slot");
    {
        let handle = link_slot.clone();
        test.add_step(
            Step::group("Connect to the DUT", move |_, targets| {
                pause();
                for (slot, target) in targets.iter_mut().enumerate() {
                    target.set_result(&handle, slot);
                }
                Ok(())
            })
            .result(&link_slot),
        );
    }

    let battery = ResultSpec::with_classifier("Battery Voltage", |v| {
        let level = v.and_then(Value::as_f64);
        match level {
            Some(x) if (3.65..=3.75).contains(&x) => Outcome::Success,
            Some(x) if (3.6..=3.8).contains(&x) => Outcome::Warning,
            _ => Outcome::Failure,
        }
    })
    .units("volts");
    test.add_step(measurement("Apply Battery Power", &battery, &rng, 3.62, 3.78, pause));

    let vcc = ResultSpec::with_classifier("VCC Voltage", within(3.2, 3.4)).units("volts");
    test.add_step(measurement("Measure VCC", &vcc, &rng, 3.25, 3.36, pause));

    let firmware = ResultSpec::new("Firmware");
    {
        let handle = firmware.clone();
        let rng = Rc::clone(&rng);
        test.add_step(
            Step::single("Load Firmware", move |_, target| {
                pause();
                if rng.borrow_mut().gen_bool(FIRMWARE_FAILURE_RATE) {
                    return Err("programmer did not respond".into());
                }
                target.set_result(&handle, "customerFirmware.hex");
                Ok(())
            })
            .result(&firmware),
        );
    }

    let current = ResultSpec::with_classifier("Current Consumption", |v| {
        match v.and_then(Value::as_f64) {
            Some(x) if x <= 750.0 => Outcome::Success,
            Some(_) => Outcome::Warning,
            None => Outcome::Failure,
        }
    })
    .units("microAmps");
    test.add_step(measurement(
        "Measure Current Consumption",
        &current,
        &rng,
        700.0,
        760.0,
        pause,
    ));

    let locale = ResultSpec::new("Locale");
    let brightness = ResultSpec::new("Brightness").units("%");
    {
        let (locale_slot, brightness_slot) = (locale.clone(), brightness.clone());
        test.add_step(
            Step::single("Configure Settings", move |_, target| {
                pause();
                target.set_result(&locale_slot, "English (UK)");
                target.set_result(&brightness_slot, 80);
                Ok(())
            })
            .results([&locale, &brightness]),
        );
    }

    test.add_step(Step::single("Enter \"Ship Mode\"", move |_, _| {
        pause();
        Ok(())
    }));

    let ship_current =
        ResultSpec::with_classifier("Ship Mode Current", within(0.0, 15.0)).units("microAmps");
    test.add_step(measurement(
        "Measure Current Consumption",
        &ship_current,
        &rng,
        9.0,
        14.0,
        pause,
    ));

    test
}

fn measurement(
    description: &str,
    result: &ResultSpec,
    rng: &SharedRng,
    low: f64,
    high: f64,
    pause: impl Fn() + 'static,
) -> Step {
    let (handle, rng) = (result.clone(), Rc::clone(rng));
    Step::single(description, move |_, target| {
        pause();
        let reading: f64 = rng.borrow_mut().gen_range(low..high);
        target.set_result(&handle, (reading * 1000.0).round() / 1000.0);
        Ok(())
    })
    .result(result)
}
