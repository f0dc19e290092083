//! Live status table.
//!
//! The table is rebuilt from scratch on every redraw: a centered header with
//! the test name, version and station id, one block of rows per step and
//! target, and a footer with every target's aggregate state.
//!
//! Cells are lists of styled spans. Column widths are measured on the visible
//! text only, so styling never skews the alignment.

use std::{
    cell::RefCell,
    io::{self, Write},
    rc::Rc,
};

use once_cell::sync::Lazy;
use regex::Regex;
use termcolor::{Buffer, Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use unicode_width::UnicodeWidthStr;

use crate::{
    outcome::{Outcome, OutcomeStyle},
    step::Step,
    target::Target,
    test::Test,
    value,
};

/// Space added after the widest cell of every column.
pub const COLUMN_PADDING: usize = 4;

/// Minimum width of the Results column.
const RESULTS_MIN_WIDTH: usize = 40;

/// Blank lines above and below a single-target footer.
const FOOTER_PADDING_LINES: usize = 3;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("\x1b\\[[0-9;]*m").expect("ANSI escape pattern is valid")
});

/// Consumer of read-only test state, called after every execution group.
pub trait Renderer {
    fn render(&self, test: &Test) -> io::Result<()>;
}

impl<T: Renderer + ?Sized> Renderer for Rc<T> {
    fn render(&self, test: &Test) -> io::Result<()> {
        (**self).render(test)
    }
}

impl<T: Renderer + ?Sized> Renderer for Box<T> {
    fn render(&self, test: &Test) -> io::Result<()> {
        (**self).render(test)
    }
}

/// Color choice for the current stdout: colored only on a terminal.
pub fn auto_color() -> ColorChoice {
    if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&self, _test: &Test) -> io::Result<()> {
        Ok(())
    }
}

/// Clears the terminal and redraws the table on stdout.
#[derive(Debug, Clone)]
pub struct TerminalRenderer {
    color: ColorChoice,
    clear_screen: bool,
}

impl TerminalRenderer {
    pub fn new(color: ColorChoice, clear_screen: bool) -> Self {
        Self {
            color,
            clear_screen,
        }
    }
}

impl Default for TerminalRenderer {
    fn default() -> Self {
        Self::new(auto_color(), true)
    }
}

impl Renderer for TerminalRenderer {
    fn render(&self, test: &Test) -> io::Result<()> {
        let mut stdout = StandardStream::stdout(self.color);
        if self.clear_screen && self.color != ColorChoice::Never {
            write!(stdout, "{}", CLEAR_SCREEN)?;
        }
        draw(test, &mut stdout)?;
        stdout.flush()
    }
}

/// Keeps every frame as plain text, for tests.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    frames: RefCell<Vec<String>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn last_frame(&self) -> Option<String> {
        self.frames.borrow().last().cloned()
    }
}

impl Renderer for RecordingRenderer {
    fn render(&self, test: &Test) -> io::Result<()> {
        let mut buffer = Buffer::no_color();
        draw(test, &mut buffer)?;
        self.frames
            .borrow_mut()
            .push(String::from_utf8_lossy(buffer.as_slice()).into_owned());
        Ok(())
    }
}

/// Display width of `text` with ANSI styling codes removed.
pub fn visible_width(text: &str) -> usize {
    ANSI_ESCAPE.replace_all(text, "").width()
}

// ============================================================================
// TABLE MODEL
// ============================================================================

#[derive(Debug, Clone)]
struct Span {
    text: String,
    spec: Option<ColorSpec>,
}

#[derive(Debug, Clone, Default)]
struct Cell {
    spans: Vec<Span>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Self::default().push(text, None)
    }

    fn styled(text: impl Into<String>, spec: ColorSpec) -> Self {
        Self::default().push(text, Some(spec))
    }

    fn push(mut self, text: impl Into<String>, spec: Option<ColorSpec>) -> Self {
        self.spans.push(Span {
            text: text.into(),
            spec,
        });
        self
    }

    fn width(&self) -> usize {
        self.spans.iter().map(|span| visible_width(&span.text)).sum()
    }
}

type Row = Vec<Cell>;

fn bold() -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_bold(true);
    spec
}

fn outcome_spec(style: &OutcomeStyle, outcome: Outcome) -> ColorSpec {
    let look = style.look(outcome);
    let mut spec = ColorSpec::new();
    spec.set_bg(Some(look.background)).set_fg(Some(look.foreground));
    spec
}

fn footer_spec(style: &OutcomeStyle, outcome: Outcome) -> ColorSpec {
    let mut spec = ColorSpec::new();
    spec.set_bg(Some(style.look(outcome).background))
        .set_fg(Some(Color::Black))
        .set_bold(true);
    spec
}

fn header_row(multi_target: bool) -> Row {
    let mut row = vec![Cell::plain("Step #")];
    if multi_target {
        row.push(Cell::plain("DUT"));
    }
    row.push(Cell::plain("Status"));
    row.push(Cell::plain("Step"));
    row.push(Cell::plain(format!("{:<width$}", "Results", width = RESULTS_MIN_WIDTH)));
    row
}

fn result_cell(description: &str, value: String, units: Option<&str>) -> Cell {
    let cell = Cell::plain(format!("{}: ", description)).push(value, Some(bold()));
    match units {
        Some(units) => cell.push(format!(" ({})", units), None),
        None => cell,
    }
}

/// Rows for one step and one target: a status row plus one continuation row
/// per extra displayed result.
fn step_rows(test: &Test, step: &Step, outcome: Outcome, target: &Target, first: bool) -> Vec<Row> {
    let multi_target = test.targets().len() > 1;
    let mut status = vec![Cell::plain(if first { step.id_label() } else { String::new() })];
    if multi_target {
        status.push(Cell::plain(target.name()));
    }
    status.push(Cell::styled(
        test.style().label(outcome),
        outcome_spec(test.style(), outcome),
    ));
    status.push(Cell::plain(if first { step.description() } else { "" }));

    let mut rows = vec![status];
    if matches!(outcome, Outcome::Pending | Outcome::Aborted) {
        return rows;
    }

    let leading = if multi_target { 4 } else { 3 };
    let displayed = step.owned_results().iter().filter(|r| r.is_displayed());
    for (index, result) in displayed.enumerate() {
        if index > 0 {
            rows.push(vec![Cell::default(); leading]);
        }
        let shown = target
            .result(result)
            .map_or_else(|| value::UNSET.to_string(), |v| v.display_text());
        if let Some(row) = rows.last_mut() {
            row.push(result_cell(result.description(), shown, result.unit()));
        }
    }
    rows
}

fn table_rows(test: &Test) -> Vec<Row> {
    let mut rows = vec![header_row(test.targets().len() > 1)];
    let outcomes: Vec<Vec<Outcome>> = test
        .targets()
        .iter()
        .map(|target| test.step_outcomes(target))
        .collect();
    for (step_index, step) in test.steps().iter().enumerate() {
        for (target_index, target) in test.targets().iter().enumerate() {
            let outcome = outcomes[target_index][step_index];
            rows.extend(step_rows(test, step, outcome, target, target_index == 0));
        }
    }
    rows
}

fn column_widths(rows: &[Row]) -> Vec<usize> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    (0..columns)
        .map(|column| {
            rows.iter()
                .filter_map(|row| row.get(column))
                .map(Cell::width)
                .max()
                .unwrap_or(0)
                + COLUMN_PADDING
        })
        .collect()
}

// ============================================================================
// DRAWING
// ============================================================================

fn write_span<W: WriteColor>(out: &mut W, text: &str, spec: Option<&ColorSpec>) -> io::Result<()> {
    match spec {
        Some(spec) => {
            out.set_color(spec)?;
            write!(out, "{}", text)?;
            out.reset()
        }
        None => write!(out, "{}", text),
    }
}

fn write_cell<W: WriteColor>(
    out: &mut W,
    cell: &Cell,
    width: usize,
    row_spec: Option<&ColorSpec>,
) -> io::Result<()> {
    for span in &cell.spans {
        write_span(out, &span.text, span.spec.as_ref().or(row_spec))?;
    }
    let fill = " ".repeat(width.saturating_sub(cell.width()));
    write_span(out, &fill, row_spec)
}

/// Writes `segments` centered within `width` columns.
fn write_centered<W: WriteColor>(
    out: &mut W,
    segments: &[(&str, Option<&ColorSpec>)],
    width: usize,
    fill_spec: Option<&ColorSpec>,
) -> io::Result<()> {
    let used: usize = segments.iter().map(|(text, _)| visible_width(text)).sum();
    let total = width.saturating_sub(used);
    let left = total / 2;
    write_span(out, &" ".repeat(left), fill_spec)?;
    for (text, spec) in segments {
        write_span(out, text, *spec)?;
    }
    write_span(out, &" ".repeat(total - left), fill_spec)
}

fn draw_header<W: WriteColor>(test: &Test, out: &mut W, width: usize) -> io::Result<()> {
    let bold = bold();
    if let Some(name) = test.name() {
        let version = test.version().unwrap_or_default();
        write_centered(out, &[(name, None), ("  ", None), (version, Some(&bold))], width, None)?;
        writeln!(out)?;
    }
    if let Some(station) = test.station_id() {
        write_centered(out, &[("Station ID:  ", None), (station, Some(&bold))], width, None)?;
        writeln!(out)?;
    }
    writeln!(out)
}

fn draw_footer<W: WriteColor>(test: &Test, out: &mut W, width: usize) -> io::Result<()> {
    let style = test.style();
    if let [target] = test.targets() {
        let state = test.target_state(target);
        let spec = footer_spec(style, state);
        for _ in 0..FOOTER_PADDING_LINES {
            write_span(out, &" ".repeat(width), Some(&spec))?;
            writeln!(out)?;
        }
        write_centered(out, &[(style.label(state), Some(&spec))], width, Some(&spec))?;
        writeln!(out)?;
        for _ in 0..FOOTER_PADDING_LINES {
            write_span(out, &" ".repeat(width), Some(&spec))?;
            writeln!(out)?;
        }
        return writeln!(out);
    }

    let name_width = test
        .targets()
        .iter()
        .map(|target| visible_width(target.name()))
        .max()
        .unwrap_or(0)
        + 10;
    let band = width.saturating_sub(name_width);
    let bold = bold();
    for target in test.targets() {
        let state = test.target_state(target);
        let spec = footer_spec(style, state);

        write!(out, "{}", " ".repeat(name_width))?;
        write_span(out, &" ".repeat(band), Some(&spec))?;
        writeln!(out)?;

        write_centered(
            out,
            &[(target.name(), Some(&bold)), (" result: ", None)],
            name_width,
            None,
        )?;
        write_centered(out, &[(style.label(state), Some(&spec))], band, Some(&spec))?;
        writeln!(out)?;

        write!(out, "{}", " ".repeat(name_width))?;
        write_span(out, &" ".repeat(band), Some(&spec))?;
        writeln!(out)?;
    }
    writeln!(out)
}

/// Draws a full frame of the status table into `out`.
pub fn draw<W: WriteColor>(test: &Test, out: &mut W) -> io::Result<()> {
    let rows = table_rows(test);
    let widths = column_widths(&rows);
    let width: usize = rows
        .first()
        .map(|header| (0..header.len()).map(|column| widths[column]).sum())
        .unwrap_or(0);

    draw_header(test, out, width)?;

    let mut header_spec = ColorSpec::new();
    header_spec
        .set_fg(Some(Color::Black))
        .set_bg(Some(Color::White))
        .set_bold(true);
    for (index, row) in rows.iter().enumerate() {
        let row_spec = (index == 0).then_some(&header_spec);
        for (column, cell) in row.iter().enumerate() {
            write_cell(out, cell, widths[column], row_spec)?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;
    writeln!(out)?;

    draw_footer(test, out, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{result::ResultSpec, step::Step};

    #[test]
    fn ansi_codes_do_not_count_toward_width() {
        assert_eq!(visible_width("\x1b[1;32mPass\x1b[0m"), 4);
        assert_eq!(visible_width("Pass"), 4);
    }

    #[test]
    fn columns_are_padded_past_the_widest_cell() {
        let rows = vec![
            vec![Cell::plain("Step #"), Cell::plain("Status")],
            vec![Cell::plain("12"), Cell::plain("Warning")],
        ];
        assert_eq!(column_widths(&rows), vec![6 + COLUMN_PADDING, 7 + COLUMN_PADDING]);
    }

    #[test]
    fn single_target_table_has_no_dut_column() {
        let mut test = Test::builder()
            .name("Example Test")
            .version("1.0.0")
            .renderer(NullRenderer)
            .build();
        let voltage = ResultSpec::new("Battery Voltage").units("volts");
        let slot = voltage.clone();
        test.add_step(
            Step::single("Apply Battery Power", move |_, t| {
                t.set_result(&slot, 3.703);
                Ok(())
            })
            .result(&voltage),
        );
        test.run().unwrap();

        let mut buffer = Buffer::no_color();
        draw(&test, &mut buffer).unwrap();
        let frame = String::from_utf8_lossy(buffer.as_slice()).into_owned();

        assert!(frame.contains("Example Test  1.0.0"));
        assert!(!frame.contains("DUT"));
        assert!(frame.contains("Battery Voltage: 3.703 (volts)"));
        assert!(frame.contains("Pass"));
    }

    #[test]
    fn hidden_results_are_not_drawn() {
        let mut test = Test::builder()
            .targets([Target::new("left"), Target::new("right")])
            .renderer(NullRenderer)
            .build();
        let secret = ResultSpec::new("Calibration Blob").hidden();
        test.add_step(Step::group("Calibrate", |_, _| Ok(())).result(&secret));
        test.run().unwrap();

        let mut buffer = Buffer::no_color();
        draw(&test, &mut buffer).unwrap();
        let frame = String::from_utf8_lossy(buffer.as_slice()).into_owned();

        assert!(frame.contains("DUT"));
        assert!(frame.contains("left result:"));
        assert!(!frame.contains("Calibration Blob"));
    }
}
