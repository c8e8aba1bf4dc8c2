//! The structured result of one TLC run.
//!
//! Everything here serializes to the camelCase JSON shape a display surface
//! consumes. Only the dispatcher mutates a [`CheckResult`]; callers get
//! shared references through the aggregator.

use crate::error::TlcResult;
use crate::value::{ValueId, ValueNode};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::PathBuf;

/// Where the output being parsed comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultSource {
    /// A live TLC process.
    #[default]
    Process,
    /// A saved `.out` file.
    OutFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CheckState {
    #[default]
    #[serde(rename = "R")]
    Running,
    #[serde(rename = "S")]
    Success,
    #[serde(rename = "E")]
    Error,
    /// The run was stopped on request before TLC reported an outcome.
    #[serde(rename = "X")]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckStatus {
    #[default]
    Starting,
    SanyParsing,
    Initializing,
    Checking,
    Checkpointing,
    CheckingLiveness,
    Finished,
}

/// Zero-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// State-space statistics at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSample {
    /// Elapsed time since the run started, `HH:MM:SS`.
    pub time_stamp: String,
    pub diameter: u64,
    pub total: u64,
    pub distinct: u64,
    pub queue_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSample {
    pub module: String,
    pub action: String,
    pub file_path: Option<PathBuf>,
    pub range: Option<Range>,
    /// Zero when the action never fired.
    pub total: u64,
    pub distinct: u64,
}

/// A line of user output (`Print`/`PrintT`) with its repeat count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputLine {
    pub text: String,
    pub count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum MessageSpan {
    #[serde(rename = "T")]
    Text { text: String },
    #[serde(rename = "SL", rename_all = "camelCase")]
    SourceLink {
        text: String,
        file_path: PathBuf,
        location: Position,
    },
}

impl MessageSpan {
    pub fn text(&self) -> &str {
        match self {
            Self::Text { text } | Self::SourceLink { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MessageLine {
    pub spans: Vec<MessageSpan>,
}

impl MessageLine {
    /// The line as plain text, links included.
    pub fn text(&self) -> String {
        self.spans.iter().map(MessageSpan::text).collect()
    }
}

/// A warning or error message, one entry per non-blank line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MessageText {
    pub lines: Vec<MessageLine>,
}

impl MessageText {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Plain text of all lines.
    pub fn lines_text(&self) -> Vec<String> {
        self.lines.iter().map(MessageLine::text).collect()
    }
}

/// One step of an error trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceItem {
    pub num: u32,
    pub title: String,
    pub module: String,
    pub action: String,
    pub file_path: Option<PathBuf>,
    pub range: Option<Range>,
    /// Empty for stuttering and back-to-state markers.
    pub variables: ValueNode,
}

/// A diagnostic reported by SANY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SanyMessage {
    pub file_path: PathBuf,
    pub range: Range,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub source: ResultSource,
    pub state: CheckState,
    pub status: CheckStatus,
    pub status_details: Option<String>,
    pub process_info: Option<String>,
    pub start_date_time: Option<NaiveDateTime>,
    pub end_date_time: Option<NaiveDateTime>,
    /// Run duration in milliseconds, as reported by TLC.
    pub duration: Option<u64>,
    pub initial_states_stat: Vec<ProgressSample>,
    pub coverage_stat: Vec<CoverageSample>,
    pub warnings: Vec<MessageText>,
    pub errors: Vec<MessageText>,
    /// Module files SANY parsed, in order.
    pub parsed_files: Vec<PathBuf>,
    pub sany_messages: Vec<SanyMessage>,
    pub error_trace: Vec<TraceItem>,
    pub output_lines: Vec<OutputLine>,
    pub show_full_output: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub full_output: Vec<String>,
}

impl CheckResult {
    pub fn new(source: ResultSource, show_full_output: bool) -> Self {
        Self {
            source,
            state: CheckState::Running,
            status: CheckStatus::Starting,
            status_details: None,
            process_info: None,
            start_date_time: None,
            end_date_time: None,
            duration: None,
            initial_states_stat: Vec::new(),
            coverage_stat: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            parsed_files: Vec::new(),
            sany_messages: Vec::new(),
            error_trace: Vec::new(),
            output_lines: Vec::new(),
            show_full_output,
            full_output: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state == CheckState::Running
    }

    /// Serialize for a display surface.
    pub fn to_json(&self) -> TlcResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Look up a trace value by the id a display surface was given.
    pub fn find_value(&self, id: ValueId) -> Option<&ValueNode> {
        self.error_trace
            .iter()
            .find_map(|item| item.variables.find(id))
    }

    /// Append a sample, replacing the last one if it has the same time stamp.
    pub(crate) fn add_progress(&mut self, sample: ProgressSample) {
        match self.initial_states_stat.last_mut() {
            Some(last) if last.time_stamp == sample.time_stamp => *last = sample,
            _ => self.initial_states_stat.push(sample),
        }
    }

    /// Append user output, counting an exact repeat of the previous line.
    pub(crate) fn add_output_line(&mut self, text: &str) {
        match self.output_lines.last_mut() {
            Some(last) if last.text == text => last.count += 1,
            _ => self.output_lines.push(OutputLine {
                text: text.to_string(),
                count: 1,
            }),
        }
    }
}

impl Default for CheckResult {
    fn default() -> Self {
        Self::new(ResultSource::default(), false)
    }
}
