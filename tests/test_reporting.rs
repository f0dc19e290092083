//! Report sinks on disk: header-once appends, dynamic file names and
//! encrypted reports.

mod common;

use std::{
    cell::Cell,
    fs,
    path::Path,
    rc::Rc,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use autotest::{
    report::ReportKeyPair, CsvReport, ReportName, ResultSpec, RowSink, Step, Target,
};
use common::{named_targets, quiet, strings};

fn read_lines(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn header_is_written_once_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = CsvReport::new(dir.path(), "station");
    sink.set_header(strings(&["Column 1", "Column 2"]));

    let first = sink.write(&strings(&["a", "b"])).unwrap();
    let second = sink.write(&strings(&["c", "d"])).unwrap();

    assert_eq!(first, dir.path().join("station.csv"));
    assert_eq!(first, second);
    let text = fs::read_to_string(&first).unwrap();
    assert_eq!(text, "Column 1,Column 2\r\na,b\r\nc,d\r\n");
}

#[test]
fn existing_file_is_appended_without_a_new_header() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("station.csv"), "old,header\r\n").unwrap();
    let mut sink = CsvReport::new(dir.path(), "station");
    sink.set_header(strings(&["new", "header"]));
    sink.write(&strings(&["x", "y"])).unwrap();
    assert_eq!(
        read_lines(&dir.path().join("station.csv")),
        vec![strings(&["old", "header"]), strings(&["x", "y"])]
    );
}

#[test]
fn file_name_closure_is_evaluated_at_every_write() {
    let dir = tempfile::tempdir().unwrap();
    let day = Arc::new(AtomicUsize::new(1));
    let clock = Arc::clone(&day);
    let mut sink = CsvReport::new(
        dir.path(),
        ReportName::dynamic(move || format!("EXAMPLE_REPORT_day{}", clock.load(Ordering::SeqCst))),
    );
    sink.set_header(strings(&["h"]));

    sink.write(&strings(&["1"])).unwrap();
    day.store(2, Ordering::SeqCst);
    sink.write(&strings(&["2"])).unwrap();
    sink.write(&strings(&["3"])).unwrap();

    assert_eq!(
        read_lines(&dir.path().join("EXAMPLE_REPORT_day1.csv")),
        vec![strings(&["h"]), strings(&["1"])]
    );
    assert_eq!(
        read_lines(&dir.path().join("EXAMPLE_REPORT_day2.csv")),
        vec![strings(&["h"]), strings(&["2"]), strings(&["3"])]
    );
}

#[test]
fn values_with_commas_and_quotes_survive() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = CsvReport::new(dir.path(), "quoted");
    sink.set_header(strings(&["Locale"]));
    sink.write(&strings(&["English, \"UK\""])).unwrap();
    assert_eq!(
        read_lines(&dir.path().join("quoted.csv"))[1],
        strings(&["English, \"UK\""])
    );
}

#[test]
fn missing_directory_is_a_sink_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = CsvReport::new(dir.path().join("not-mounted"), "station");
    let error = sink.write(&strings(&["a"])).unwrap_err();
    assert!(matches!(error, autotest::AutoTestError::Sink { .. }));
}

#[test]
fn test_run_appends_one_row_per_target() {
    let dir = tempfile::tempdir().unwrap();
    let voltage = ResultSpec::new("Battery Voltage").units("volts");
    let slot = voltage.clone();
    let mut test = quiet()
        .name("Example Test")
        .version("1.0.0")
        .station_id(4411)
        .targets(named_targets(&["DUT 1", "DUT 2"]))
        .report(CsvReport::new(dir.path(), "run"))
        .build();
    test.add_step(
        Step::single("Apply Battery Power", move |_, target| {
            target.set_result(&slot, 3.703);
            Ok(())
        })
        .result(&voltage),
    );

    test.run().unwrap();
    test.run().unwrap();

    let lines = read_lines(&dir.path().join("run.csv"));
    assert_eq!(lines.len(), 1 + 2 * 2);
    assert_eq!(lines[0].last().unwrap(), "Battery Voltage (volts)");
    assert!(lines.iter().all(|line| line.len() == 10));
    for row in &lines[1..] {
        assert_eq!(&row[..3], ["Example Test", "1.0.0", "4411"]);
        assert_eq!(row[6], "Pass");
        assert_eq!(row[9], "3.703");
    }
    assert_eq!(lines[1][5], "DUT 1");
    assert_eq!(lines[2][5], "DUT 2");
}

#[test]
fn header_tracks_steps_added_after_the_sink() {
    let dir = tempfile::tempdir().unwrap();
    let mut test = quiet().report(CsvReport::new(dir.path(), "late")).build();
    let locale = ResultSpec::new("Locale");
    let brightness = ResultSpec::new("Brightness").units("%");
    test.add_step(Step::single("Configure Settings", |_, _| Ok(())).results([&locale, &brightness]));

    test.run().unwrap();

    let lines = read_lines(&dir.path().join("late.csv"));
    assert_eq!(lines[0].len(), lines[1].len());
    assert_eq!(&lines[0][9..], ["Locale", "Brightness (%)"]);
    assert_eq!(&lines[1][9..], ["None", "None"]);
}

#[test]
fn encrypted_report_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let keys = ReportKeyPair::generate();
    let (public, secret) = keys.write_to(&dir.path().join("keys")).unwrap();

    let encryptor = autotest::report::RowEncryptor::from_file(&public).unwrap();
    let serial = ResultSpec::new("Serial Number");
    let slot = serial.clone();
    let counter = Rc::new(Cell::new(0));
    let next = Rc::clone(&counter);
    let mut test = quiet()
        .name("Example Test")
        .targets([Target::default(), Target::default()])
        .report(CsvReport::new(dir.path(), "sealed").encrypted(encryptor))
        .build();
    test.add_step(
        Step::single("Scan Barcode", move |_, target| {
            next.set(next.get() + 1);
            target.set_result(&slot, format!("SN00441{}, rev \"B\"", next.get()));
            Ok(())
        })
        .result(&serial),
    );
    test.run().unwrap();

    let path = dir.path().join("sealed.csv");
    let sealed = read_lines(&path);
    assert_eq!(sealed.len(), 3);
    assert!(sealed.iter().all(|line| line.len() == 2));
    assert!(!fs::read_to_string(&path).unwrap().contains("Example Test"));

    let decryptor = autotest::report::RowDecryptor::from_file(&secret).unwrap();
    let plain = decryptor.open_report(&path).unwrap();
    assert_eq!(plain[0], test.export_header());
    assert_eq!(plain[1][0], "Example Test");
    assert_eq!(plain[1][9], "SN004411, rev \"B\"");
    assert_eq!(plain[2][9], "SN004412, rev \"B\"");
}
