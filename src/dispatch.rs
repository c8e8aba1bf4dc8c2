//! Routes tokenizer events to the handlers that update the result.

use crate::aggregator::ResultAggregator;
use crate::codes::{Severity, TlcCode};
use crate::framing::{Event, Message};
use crate::message::{message_text, ModuleResolver};
use crate::model::{
    CheckResult, CheckState, CheckStatus, CoverageSample, ProgressSample, SanyMessage, TraceItem,
};
use crate::sany::{SanyEvent, SanySection};
use crate::session::SessionConfig;
use crate::util::{
    format_elapsed, parenthesized_date_time, parse_date_time, parse_duration_ms, scan_location, Scanner,
};
use crate::value::{diff_states, parse_state, ValueIds, ValueNode};
use chrono::NaiveDateTime;
use tracing::{debug, info, trace, warn};

/// Dispatcher lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No framed message seen yet.
    AwaitingStart,
    Running,
    /// Stream ended with a successful run.
    Finished,
    /// Stream ended with errors, a stop, or without a verdict.
    Failed,
}

const UNEXPECTED_END: &str = "Process ended unexpectedly";

#[derive(Debug)]
pub(crate) struct Dispatcher {
    phase: Phase,
    resolver: ModuleResolver,
    ids: ValueIds,
    sany: Option<SanySection>,
    coverage: Option<Vec<CoverageSample>>,
    first_time_stamp: Option<NaiveDateTime>,
    stop_requested: bool,
}

impl Dispatcher {
    pub(crate) fn new(config: &SessionConfig) -> Self {
        Self {
            phase: Phase::AwaitingStart,
            resolver: ModuleResolver::new(&config.spec_file),
            ids: if config.assign_value_ids {
                ValueIds::new()
            } else {
                ValueIds::disabled()
            },
            sany: None,
            coverage: None,
            first_time_stamp: None,
            stop_requested: false,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub(crate) fn handle(&mut self, event: Event, agg: &mut ResultAggregator) {
        match event {
            Event::Line(line) => self.handle_line(&line, agg),
            Event::Message(message) => {
                if self.phase == Phase::AwaitingStart {
                    debug!(code = message.code, "First TLC message, parser running");
                    self.phase = Phase::Running;
                }
                self.close_sany(agg);
                self.dispatch(message, agg);
            }
        }
    }

    /// Settle the final state once the stream has ended.
    pub(crate) fn finish(&mut self, agg: &mut ResultAggregator) {
        self.close_sany(agg);
        let stop_requested = self.stop_requested;
        agg.update(|r| {
            if r.is_running() {
                if stop_requested {
                    r.state = CheckState::Stopped;
                } else {
                    r.state = CheckState::Error;
                    r.status_details = Some(UNEXPECTED_END.to_string());
                }
            }
            r.status = CheckStatus::Finished;
            true
        });
        self.phase = if agg.snapshot().state == CheckState::Success {
            Phase::Finished
        } else {
            Phase::Failed
        };
        info!(state = ?agg.snapshot().state, phase = ?self.phase, "TLC output finished");
    }

    fn handle_line(&mut self, line: &str, agg: &mut ResultAggregator) {
        if let Some(sany) = self.sany.as_mut() {
            if let Some(event) = sany.line(line) {
                self.record_sany(event, agg);
            }
            return;
        }
        if line.trim().is_empty() {
            return;
        }
        agg.update(|r| {
            r.add_output_line(line);
            true
        });
    }

    fn close_sany(&mut self, agg: &mut ResultAggregator) {
        if let Some(mut sany) = self.sany.take() {
            if let Some(event) = sany.finish() {
                self.record_sany(event, agg);
            }
        }
    }

    fn record_sany(&mut self, event: SanyEvent, agg: &mut ResultAggregator) {
        match event {
            SanyEvent::ParsedFile { module, path } => {
                trace!(module = %module, path = %path.display(), "SANY parsed file");
                self.resolver.register(module, path.clone());
                agg.update(|r| {
                    r.parsed_files.push(path);
                    true
                });
            }
            SanyEvent::Diagnostic { module, range, lines } => {
                let file_path = self.resolver.resolve(&module);
                debug!(module = %module, "SANY diagnostic");
                let text = message_text(&lines, &self.resolver);
                agg.update(|r| {
                    r.sany_messages.push(SanyMessage {
                        file_path,
                        range,
                        text: lines.join("\n"),
                    });
                    r.errors.push(text);
                    r.state = CheckState::Error;
                    true
                });
            }
        }
    }

    fn dispatch(&mut self, mut message: Message, agg: &mut ResultAggregator) {
        let code = message.code;
        debug!(code, severity = ?message.severity, lines = message.lines.len(), "Dispatching message");

        if code == TlcCode::GENERAL && message.severity.is_error() && !message.nested.is_empty() {
            let lines = splice_nested(message);
            self.add_error(&lines, agg);
            return;
        }
        for nested in std::mem::take(&mut message.nested) {
            self.dispatch(nested.message, agg);
        }

        let lines: &[String] = &message.lines;
        match code {
            TlcCode::TLC_MODE_MC | TlcCode::TLC_MODE_SIMU => {
                let info = join_non_blank(lines, " ");
                agg.update(|r| {
                    r.process_info = Some(info);
                    true
                });
            }
            TlcCode::TLC_STARTING => {
                let start = first_line(lines).and_then(parenthesized_date_time);
                agg.update(|r| {
                    r.start_date_time = start;
                    r.status = CheckStatus::Starting;
                    true
                });
            }
            TlcCode::TLC_FINISHED => self.finished(lines, agg),
            TlcCode::TLC_SUCCESS => {
                agg.update(|r| {
                    r.state = CheckState::Success;
                    true
                });
            }
            TlcCode::TLC_SANY_START => {
                self.sany = Some(SanySection::new());
                set_status(agg, CheckStatus::SanyParsing);
            }
            TlcCode::TLC_COMPUTING_INIT => set_status(agg, CheckStatus::Initializing),
            TlcCode::TLC_CHECKPOINT_START => set_status(agg, CheckStatus::Checkpointing),
            TlcCode::TLC_CHECKPOINT_END => set_status(agg, CheckStatus::Checking),
            TlcCode::TLC_CHECKING_TEMPORAL_PROPS => set_status(agg, CheckStatus::CheckingLiveness),
            c if TlcCode::is_init_generated(c) => self.init_generated(lines, agg),
            TlcCode::TLC_PROGRESS_STATS => self.progress(lines, agg),
            TlcCode::TLC_COVERAGE_START => self.coverage = Some(Vec::new()),
            c if TlcCode::is_coverage_entry(c) => self.coverage_entry(lines),
            TlcCode::TLC_COVERAGE_END => {
                let coverage = self.coverage.take().unwrap_or_default();
                agg.update(|r| {
                    r.coverage_stat = coverage;
                    true
                });
            }
            TlcCode::TLC_STATE_PRINT1 | TlcCode::TLC_STATE_PRINT2 => self.trace_state(lines, agg),
            TlcCode::TLC_STATE_PRINT3 | TlcCode::TLC_BACK_TO_STATE => self.trace_marker(lines, agg),
            c if TlcCode::is_coverage_detail(c) => {}
            TlcCode::TLC_SANY_END
            | TlcCode::TLC_BEHAVIOR_UP_TO_THIS_POINT
            | TlcCode::TLC_COUNTER_EXAMPLE
            | TlcCode::TLC_VERSION
            | TlcCode::TLC_SEARCH_DEPTH
            | TlcCode::TLC_STATS
            | TlcCode::TLC_COMPUTING_INIT_PROGRESS => {
                trace!(code, "Informational message");
            }
            _ => match message.severity {
                Severity::Error | Severity::TlcBug => self.add_error(lines, agg),
                Severity::Warning => {
                    let text = message_text(lines, &self.resolver);
                    if !text.is_empty() {
                        agg.update(|r| {
                            r.warnings.push(text);
                            true
                        });
                    }
                }
                Severity::State => self.trace_state(lines, agg),
                Severity::Info => trace!(code, "Ignoring informational message"),
            },
        }
    }

    fn add_error<S: AsRef<str>>(&mut self, lines: &[S], agg: &mut ResultAggregator) {
        let text = message_text(lines, &self.resolver);
        agg.update(|r| {
            if !text.is_empty() {
                r.errors.push(text);
            }
            r.state = CheckState::Error;
            true
        });
    }

    fn finished(&mut self, lines: &[String], agg: &mut ResultAggregator) {
        let line = first_line(lines).unwrap_or_default();
        let duration = line
            .strip_prefix("Finished in ")
            .and_then(|rest| rest.split(" at ").next())
            .and_then(parse_duration_ms);
        let end = parenthesized_date_time(line);
        agg.update(|r| {
            r.end_date_time = end;
            r.duration = duration;
            r.status = CheckStatus::Finished;
            if r.is_running() {
                r.state = if r.errors.is_empty() {
                    CheckState::Success
                } else {
                    CheckState::Error
                };
            }
            true
        });
    }

    /// `Finished computing initial states: 1 distinct state generated at <date>.`
    /// or `...: 4 states generated, with 2 of them distinct at <date>.`
    fn init_generated(&mut self, lines: &[String], agg: &mut ResultAggregator) {
        let Some(line) = first_line(lines) else { return };
        let mut sc = Scanner::new(line);
        if sc.take_until(": ").is_none() {
            warn!(line, "Unrecognized initial states message");
            return;
        }
        let Some(first) = sc.number() else {
            warn!(line, "Unrecognized initial states message");
            return;
        };
        let (total, distinct) = if sc.eat(" distinct state") {
            (first, first)
        } else if sc.take_until("with ").is_some() {
            match sc.number() {
                Some(distinct) => (first, distinct),
                None => (first, first),
            }
        } else {
            (first, first)
        };
        let at = sc
            .take_until(" at ")
            .and_then(|_| parse_date_time(sc.rest().trim_end_matches('.')));
        let time_stamp = self.time_stamp(at, agg.snapshot());
        agg.update(|r| {
            r.add_progress(ProgressSample {
                time_stamp,
                diameter: 0,
                total,
                distinct,
                queue_size: distinct,
            });
            r.status = CheckStatus::Checking;
            true
        });
    }

    /// `Progress(D) at <date>: T states generated (..), N distinct states found (..), Q states left on queue.`
    fn progress(&mut self, lines: &[String], agg: &mut ResultAggregator) {
        let Some(line) = first_line(lines) else { return };
        let Some((diameter, at, total, distinct, queue_size)) = parse_progress(line) else {
            warn!(line, "Unrecognized progress message");
            return;
        };
        let time_stamp = self.time_stamp(Some(at), agg.snapshot());
        agg.update(|r| {
            r.add_progress(ProgressSample {
                time_stamp,
                diameter,
                total,
                distinct,
                queue_size,
            });
            true
        });
    }

    /// Elapsed time of `at` since the run start, or since the first time
    /// stamp seen when the start is unknown.
    fn time_stamp(&mut self, at: Option<NaiveDateTime>, result: &CheckResult) -> String {
        let Some(at) = at else {
            return "00:00:00".to_string();
        };
        let origin = result
            .start_date_time
            .or(self.first_time_stamp)
            .unwrap_or(at);
        self.first_time_stamp.get_or_insert(at);
        format_elapsed(origin, at)
    }

    /// `<Init line 13, col 1 to line 13, col 4 of module example>: 1:1`
    fn coverage_entry(&mut self, lines: &[String]) {
        let Some(line) = first_line(lines) else { return };
        match parse_coverage(line) {
            Some((action, location, distinct, total)) => {
                let file_path = Some(self.resolver.resolve(&location.module));
                self.coverage.get_or_insert_with(Vec::new).push(CoverageSample {
                    module: location.module,
                    action,
                    file_path,
                    range: Some(location.range),
                    total,
                    distinct,
                });
            }
            None => debug!(line, "Skipping unrecognized coverage line"),
        }
    }

    fn trace_state(&mut self, lines: &[String], agg: &mut ResultAggregator) {
        let Some((header_idx, header)) = lines.iter().enumerate().find(|(_, l)| !l.trim().is_empty()) else {
            warn!("Empty state message");
            return;
        };
        let variables = parse_state(&lines[header_idx + 1..], &mut self.ids);
        let mut item = self.trace_item(header, variables);
        agg.update(|r| {
            if item.num != 1 && !item.variables.items().is_empty() {
                let previous = r
                    .error_trace
                    .iter()
                    .rev()
                    .find(|prev| !prev.variables.items().is_empty());
                if let Some(previous) = previous {
                    diff_states(&previous.variables, &mut item.variables);
                }
            }
            r.error_trace.push(item);
            true
        });
    }

    /// Stuttering and back-to-state items carry no bindings.
    fn trace_marker(&mut self, lines: &[String], agg: &mut ResultAggregator) {
        let Some(header) = first_line(lines) else { return };
        let id = self.ids.next_id();
        let item = self.trace_item(header, ValueNode::empty_state(id));
        agg.update(|r| {
            r.error_trace.push(item);
            true
        });
    }

    /// Build an item from its `N: <Action line .. of module M>` header.
    fn trace_item(&self, header: &str, variables: ValueNode) -> TraceItem {
        let mut item = TraceItem {
            num: 0,
            title: String::new(),
            module: String::new(),
            action: String::new(),
            file_path: None,
            range: None,
            variables,
        };
        let mut sc = Scanner::new(header.trim());
        if let Some(num) = sc.number() {
            item.num = u32::try_from(num).unwrap_or(u32::MAX);
            sc.eat(":");
            sc.skip_ws();
        }

        let back_to_state = sc.eat("Back to state");
        if back_to_state {
            sc.eat(":");
            sc.skip_ws();
        }
        let rest = sc.rest();
        let action = rest
            .strip_prefix('<')
            .and_then(|inner| inner.strip_suffix('>'))
            .map(split_action);

        match action {
            Some((action, Some(location))) => {
                item.title = if back_to_state {
                    "Back to state".to_string()
                } else {
                    format!("{action} in {}", location.module)
                };
                item.action = action;
                item.file_path = Some(self.resolver.resolve(&location.module));
                item.range = Some(location.range);
                item.module = location.module;
            }
            Some((text, None)) => item.title = text,
            None if back_to_state => item.title = "Back to state".to_string(),
            None => item.title = rest.to_string(),
        }
        item
    }
}

fn set_status(agg: &mut ResultAggregator, status: CheckStatus) {
    agg.update(|r| {
        r.status = status;
        true
    });
}

/// A GENERAL error with its nested messages' lines spliced in place.
fn splice_nested(message: Message) -> Vec<String> {
    let mut lines = Vec::new();
    let mut nested = message.nested.into_iter().peekable();
    for (idx, line) in message.lines.into_iter().enumerate() {
        while let Some(inner) = nested.next_if(|n| n.at <= idx) {
            lines.extend(splice_nested(inner.message));
        }
        lines.push(line);
    }
    for inner in nested {
        lines.extend(splice_nested(inner.message));
    }
    lines
}

fn first_line(lines: &[String]) -> Option<&str> {
    lines.iter().map(String::as_str).find(|l| !l.trim().is_empty())
}

fn join_non_blank(lines: &[String], sep: &str) -> String {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(sep)
}

/// `Init line 13, col 1 to line 13, col 4 of module example` into the action
/// name and its location. Text without a location is returned whole.
fn split_action(inner: &str) -> (String, Option<crate::util::TlcLocation>) {
    if let Some(idx) = inner.find(" line ") {
        let mut sc = Scanner::new(&inner[idx + 1..]);
        if let Some(location) = scan_location(&mut sc) {
            if sc.is_at_end() {
                return (inner[..idx].to_string(), Some(location));
            }
        }
    }
    (inner.to_string(), None)
}

fn parse_progress(line: &str) -> Option<(u64, NaiveDateTime, u64, u64, u64)> {
    let mut sc = Scanner::new(line.trim());
    if !sc.eat("Progress(") {
        return None;
    }
    let diameter = sc.number()?;
    if !sc.eat(") at ") {
        return None;
    }
    let at = parse_date_time(sc.take_until(": ")?)?;
    let total = sc.number()?;
    sc.take_until(", ")?;
    let distinct = sc.number()?;
    sc.take_until(", ")?;
    let queue = sc.number()?;
    Some((diameter, at, total, distinct, queue))
}

fn parse_coverage(line: &str) -> Option<(String, crate::util::TlcLocation, u64, u64)> {
    let line = line.trim();
    let close = line.rfind('>')?;
    let (action, location) = split_action(line.strip_prefix('<')?.get(..close - 1)?);
    let location = location?;
    let mut sc = Scanner::new(&line[close + 1..]);
    if !sc.eat(": ") {
        return None;
    }
    let distinct = sc.number()?;
    if !sc.eat(":") {
        return None;
    }
    let total = sc.number()?;
    Some((action, location, distinct, total))
}
