//! Station configuration.
//!
//! A station is described by a small YAML file. Every key is optional:
//!
//! ```yaml
//! test:
//!   name: Example Test
//!   interface: eth0        # station id source when station_id is unset
//!   success_label: OK
//! report:
//!   dir: /mnt/reports
//!   daily_prefix: EXAMPLE_REPORT_
//!   auto_mount: true
//!   public_key: /etc/autotest/report.pub
//! display:
//!   color: auto
//! logging:
//!   filter: autotest=debug
//!   file: /var/log/autotest.log
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use termcolor::ColorChoice;

use crate::{
    errors::{AutoTestError, Result},
    outcome::OutcomeStyle,
    render::{auto_color, TerminalRenderer},
    report::{CsvReport, ReportName, RowEncryptor},
    station,
    test::TestBuilder,
};

pub const DEFAULT_INTERFACE: &str = "eth0";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StationConfig {
    pub test: TestSection,
    pub report: ReportSection,
    pub display: DisplaySection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestSection {
    pub name: Option<String>,
    pub version: Option<String>,
    pub station_id: Option<u64>,
    pub interface: String,
    pub success_label: Option<String>,
}

impl Default for TestSection {
    fn default() -> Self {
        Self {
            name: None,
            version: None,
            station_id: None,
            interface: DEFAULT_INTERFACE.to_string(),
            success_label: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportSection {
    pub dir: Option<PathBuf>,
    pub filename: Option<String>,
    pub daily_prefix: Option<String>,
    pub auto_mount: bool,
    pub public_key: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorMode::Auto => auto_color(),
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplaySection {
    pub color: ColorMode,
    pub clear_screen: bool,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            color: ColorMode::Auto,
            clear_screen: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub filter: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            file: None,
        }
    }
}

impl StationConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_yaml::from_str(&text).map_err(|source| AutoTestError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured version, else the short commit of the repository at `dir`.
    pub fn version(&self, dir: &Path) -> Option<String> {
        self.test
            .version
            .clone()
            .or_else(|| station::commit_sha(dir, true))
    }

    /// Configured station id, else derived from the configured interface.
    ///
    /// A station without a readable interface reports no id rather than
    /// refusing to test.
    pub fn station_id(&self) -> Option<u64> {
        if let Some(id) = self.test.station_id {
            return Some(id);
        }
        match station::station_id(&self.test.interface) {
            Ok(id) => Some(id),
            Err(error) => {
                tracing::warn!(%error, "running without a station id");
                None
            }
        }
    }

    pub fn style(&self) -> OutcomeStyle {
        match &self.test.success_label {
            Some(label) => OutcomeStyle::default().with_success_label(label.clone()),
            None => OutcomeStyle::default(),
        }
    }

    pub fn renderer(&self) -> TerminalRenderer {
        TerminalRenderer::new(self.display.color.choice(), self.display.clear_screen)
    }

    /// The CSV sink described by the `report` section, if any.
    pub fn report_sink(&self) -> Result<Option<CsvReport>> {
        let report = &self.report;
        let Some(dir) = &report.dir else {
            if report.filename.is_some() || report.daily_prefix.is_some() {
                return Err(AutoTestError::configuration(
                    "report.filename and report.daily_prefix need report.dir",
                ));
            }
            return Ok(None);
        };

        let name = match (&report.filename, &report.daily_prefix) {
            (Some(name), None) if !name.is_empty() => ReportName::from(name.clone()),
            (None, Some(prefix)) => ReportName::daily(prefix.clone()),
            (Some(_), Some(_)) => {
                return Err(AutoTestError::configuration(
                    "report.filename and report.daily_prefix are mutually exclusive",
                ))
            }
            _ => {
                return Err(AutoTestError::configuration(format!(
                    "report.dir {} has no report.filename or report.daily_prefix",
                    dir.display()
                )))
            }
        };

        let mut sink = CsvReport::new(dir, name).auto_mount(report.auto_mount);
        if let Some(key) = &report.public_key {
            sink = sink.encrypted(RowEncryptor::from_file(key)?);
        }
        Ok(Some(sink))
    }

    /// Applies identity, style, display and report settings to `builder`.
    pub fn apply(&self, builder: TestBuilder, repo_dir: &Path) -> Result<TestBuilder> {
        let mut builder = builder.style(self.style()).renderer(self.renderer());
        if let Some(name) = &self.test.name {
            builder = builder.name(name.clone());
        }
        if let Some(version) = self.version(repo_dir) {
            builder = builder.version(version);
        }
        if let Some(id) = self.station_id() {
            builder = builder.station_id(id);
        }
        if let Some(sink) = self.report_sink()? {
            builder = builder.report(sink);
        }
        Ok(builder)
    }
}
