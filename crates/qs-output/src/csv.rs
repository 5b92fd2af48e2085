//! CSV output.
//!
//! - [`CsvEventWriter`]: an [`EventHandler`] writing `events.csv`
//! - [`StepSummaryWriter`]: a [`SimObserver`] writing `step_summaries.csv`
//!
//! Neither callback can return an error, so both writers keep the first one
//! and hand it back from `finish`.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use csv::{Writer, WriterBuilder};
use qs_events::{Event, EventHandler};
use qs_sim::{SimObserver, SimReport, StepStats};

use crate::{EventRow, OutputError, OutputResult, StepSummaryRow};

pub const EVENTS_FILE: &str = "events.csv";
pub const STEP_SUMMARIES_FILE: &str = "step_summaries.csv";

const EVENT_HEADER: [&str; 5] = ["time", "agent", "type", "link", "from_link"];
const STEP_HEADER: [&str; 12] = [
    "tick",
    "time",
    "events",
    "departures",
    "link_moves",
    "arrivals",
    "blocked_links",
    "blocked_departures",
    "en_route",
    "departing",
    "finished_total",
    "boundary_transfers",
];

/// Open a headerless serde writer and write `header` by hand, so the file has
/// a header even when no rows follow.
fn open<W: Write>(inner: W, header: &[&str]) -> OutputResult<Writer<W>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(inner);
    writer.write_record(header)?;
    Ok(writer)
}

fn keep_first(slot: &mut Option<OutputError>, result: OutputResult<()>) {
    if let Err(e) = result {
        if slot.is_none() {
            tracing::error!(error = %e, "output write failed");
            *slot = Some(e);
        }
    }
}

// ── CsvEventWriter ────────────────────────────────────────────────────────────

/// Writes every delivered event as one [`EventRow`].
pub struct CsvEventWriter<W: Write = File> {
    writer:     Writer<W>,
    rows:       u64,
    last_error: Option<OutputError>,
}

impl CsvEventWriter<File> {
    /// Create `events.csv` in `dir` and write the header row.
    pub fn create(dir: &Path) -> OutputResult<Self> {
        Self::from_writer(File::create(dir.join(EVENTS_FILE))?)
    }
}

impl<W: Write> CsvEventWriter<W> {
    pub fn from_writer(inner: W) -> OutputResult<Self> {
        Ok(Self { writer: open(inner, &EVENT_HEADER)?, rows: 0, last_error: None })
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Take the stored write error (if any).
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Flush and return the inner writer, or the first error seen.
    pub fn finish(mut self) -> OutputResult<W> {
        if let Some(e) = self.last_error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        self.writer.into_inner().map_err(|e| OutputError::Io(e.into_error()))
    }
}

impl<W: Write> EventHandler for CsvEventWriter<W> {
    fn handle_event(&mut self, event: &Event) {
        let result = self.writer.serialize(EventRow::from(event)).map_err(OutputError::from);
        if result.is_ok() {
            self.rows += 1;
        }
        keep_first(&mut self.last_error, result);
    }

    fn on_run_end(&mut self, _final_time: u64) {
        let result = self.writer.flush().map_err(OutputError::from);
        keep_first(&mut self.last_error, result);
    }
}

// ── StepSummaryWriter ─────────────────────────────────────────────────────────

/// Writes one [`StepSummaryRow`] per processed step.
pub struct StepSummaryWriter<W: Write = File> {
    writer:     Writer<W>,
    last_error: Option<OutputError>,
}

impl StepSummaryWriter<File> {
    /// Create `step_summaries.csv` in `dir` and write the header row.
    pub fn create(dir: &Path) -> OutputResult<Self> {
        Self::from_writer(File::create(dir.join(STEP_SUMMARIES_FILE))?)
    }
}

impl<W: Write> StepSummaryWriter<W> {
    pub fn from_writer(inner: W) -> OutputResult<Self> {
        Ok(Self { writer: open(inner, &STEP_HEADER)?, last_error: None })
    }

    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Flush and return the inner writer, or the first error seen.
    pub fn finish(mut self) -> OutputResult<W> {
        if let Some(e) = self.last_error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        self.writer.into_inner().map_err(|e| OutputError::Io(e.into_error()))
    }
}

impl<W: Write> SimObserver for StepSummaryWriter<W> {
    fn on_step_end(&mut self, stats: &StepStats) {
        let result = self.writer.serialize(StepSummaryRow::from(stats)).map_err(OutputError::from);
        keep_first(&mut self.last_error, result);
    }

    fn on_sim_end(&mut self, _report: &SimReport) {
        let result = self.writer.flush().map_err(OutputError::from);
        keep_first(&mut self.last_error, result);
    }
}
