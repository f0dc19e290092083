//! Report sinks.
//!
//! A [`RowSink`] durably appends one export row per target per run. The
//! header is pushed to the sink by the test whenever its shape changes and is
//! written exactly once, when the destination file is created.
//!
//! [`CsvReport`] is the file backed sink. It can optionally mount the report
//! directory around every write and encrypt every line it writes (see
//! [`cipher`]); the test layer always hands it plain rows.

use std::{
    cell::RefCell,
    fmt,
    fs::OpenOptions,
    path::{Path, PathBuf},
    process::Command,
    rc::Rc,
    sync::Arc,
};

use chrono::Local;

use crate::errors::{AutoTestError, Result};

pub mod cipher;

pub use cipher::{ReportKeyPair, RowDecryptor, RowEncryptor, SealedRow};

/// Destination of export rows.
pub trait RowSink {
    /// Replaces the header written when a new destination is created.
    fn set_header(&mut self, header: Vec<String>);

    /// Appends `row`, creating the destination with the header first if it
    /// does not exist yet. Returns where the row went.
    fn write(&mut self, row: &[String]) -> Result<PathBuf>;
}

impl<T: RowSink + ?Sized> RowSink for Box<T> {
    fn set_header(&mut self, header: Vec<String>) {
        (**self).set_header(header)
    }

    fn write(&mut self, row: &[String]) -> Result<PathBuf> {
        (**self).write(row)
    }
}

// ============================================================================
// FILE NAMES
// ============================================================================

/// Report file name without the `.csv` extension.
#[derive(Clone)]
pub enum ReportName {
    Static(String),
    /// Evaluated at every write, e.g. to start a new file every day.
    Dynamic(Arc<dyn Fn() -> String + Send + Sync>),
}

impl ReportName {
    pub fn dynamic(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        ReportName::Dynamic(Arc::new(f))
    }

    /// `<prefix><YYYY-MM-DD>` in local time.
    pub fn daily(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::dynamic(move || format!("{}{}", prefix, Local::now().format("%Y-%m-%d")))
    }

    pub fn resolve(&self) -> String {
        match self {
            ReportName::Static(name) => name.clone(),
            ReportName::Dynamic(f) => f(),
        }
    }
}

impl fmt::Debug for ReportName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportName::Static(name) => f.debug_tuple("Static").field(name).finish(),
            ReportName::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for ReportName {
    fn from(name: &str) -> Self {
        ReportName::Static(name.to_string())
    }
}

impl From<String> for ReportName {
    fn from(name: String) -> Self {
        ReportName::Static(name)
    }
}

// ============================================================================
// CSV REPORT
// ============================================================================

/// Appends rows to `<dir>/<name>.csv`.
#[derive(Debug)]
pub struct CsvReport {
    dir: PathBuf,
    name: ReportName,
    header: Vec<String>,
    auto_mount: bool,
    encryptor: Option<RowEncryptor>,
}

impl CsvReport {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<ReportName>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            header: Vec::new(),
            auto_mount: false,
            encryptor: None,
        }
    }

    /// Mounts the directory before and unmounts it after every write.
    pub fn auto_mount(mut self, enabled: bool) -> Self {
        self.auto_mount = enabled;
        self
    }

    /// Encrypts every written line, header included.
    pub fn encrypted(mut self, encryptor: RowEncryptor) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Path the next write goes to.
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.csv", self.name.resolve()))
    }

    fn append(&self, row: &[String]) -> Result<PathBuf> {
        let path = self.path();
        let first_entry = !path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| AutoTestError::Sink {
                path: path.clone(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(file);
        let csv_error = |source| AutoTestError::Csv {
            path: path.clone(),
            source,
        };
        if first_entry {
            writer
                .write_record(self.line(&self.header)?)
                .map_err(csv_error)?;
        }
        writer.write_record(self.line(row)?).map_err(csv_error)?;
        writer.flush().map_err(|source| AutoTestError::Sink {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// The physical line for a logical row: plain, or sealed.
    fn line(&self, row: &[String]) -> Result<Vec<String>> {
        match &self.encryptor {
            Some(encryptor) => encryptor.seal_row(row),
            None => Ok(row.to_vec()),
        }
    }
}

impl RowSink for CsvReport {
    fn set_header(&mut self, header: Vec<String>) {
        self.header = header;
    }

    fn write(&mut self, row: &[String]) -> Result<PathBuf> {
        if !self.auto_mount {
            return self.append(row);
        }
        mount(&self.dir)?;
        let written = self.append(row);
        let unmounted = unmount(&self.dir);
        let path = written?;
        unmounted?;
        Ok(path)
    }
}

fn mount(dir: &Path) -> Result<()> {
    run_mount_command("mount", dir)
}

fn unmount(dir: &Path) -> Result<()> {
    run_mount_command("umount", dir)
}

fn run_mount_command(action: &'static str, dir: &Path) -> Result<()> {
    let failed = |detail: String| AutoTestError::Mount {
        action,
        dir: dir.to_path_buf(),
        detail,
    };
    let output = Command::new(action)
        .arg(dir)
        .output()
        .map_err(|e| failed(e.to_string()))?;
    if !output.status.success() {
        return Err(failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    tracing::debug!(action, dir = %dir.display(), "report directory {}ed", action);
    Ok(())
}

// ============================================================================
// IN-MEMORY SINK
// ============================================================================

#[derive(Debug, Default)]
struct MemoryLog {
    header: Vec<String>,
    lines: Vec<Vec<String>>,
}

/// Collects lines in memory with the same header-once contract as a file.
///
/// Clones share the same log, so a test can keep a handle while the
/// [`crate::Test`] owns another.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    log: Rc<RefCell<MemoryLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every line written so far, header first.
    pub fn lines(&self) -> Vec<Vec<String>> {
        self.log.borrow().lines.clone()
    }

    /// Data rows only.
    pub fn rows(&self) -> Vec<Vec<String>> {
        self.log.borrow().lines.iter().skip(1).cloned().collect()
    }

    pub fn header(&self) -> Vec<String> {
        self.log.borrow().header.clone()
    }
}

impl RowSink for MemorySink {
    fn set_header(&mut self, header: Vec<String>) {
        self.log.borrow_mut().header = header;
    }

    fn write(&mut self, row: &[String]) -> Result<PathBuf> {
        let mut log = self.log.borrow_mut();
        if log.lines.is_empty() {
            let header = log.header.clone();
            log.lines.push(header);
        }
        log.lines.push(row.to_vec());
        Ok(PathBuf::from(":memory:"))
    }
}
