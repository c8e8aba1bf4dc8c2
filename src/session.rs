//! One parse of one TLC run: tokenizer, dispatcher and aggregator wired
//! together over a byte source.

use crate::aggregator::{ResultAggregator, ResultSink};
use crate::builder::impl_builder;
use crate::dispatch::{Dispatcher, Phase};
use crate::error::TlcResult;
use crate::framing::Tokenizer;
use crate::model::{CheckResult, ResultSource};
use crate::value::{ValueId, ValueNode};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use tracing::{debug, warn};

const READ_BUFFER_SIZE: usize = 8 * 1024;

/// Parameters of a parse session.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct SessionConfig {
    /// The checked spec. Source links to modules SANY did not report are
    /// resolved next to it.
    pub spec_file: PathBuf,

    /// Keep every raw output line in `CheckResult::full_output`
    /// (default: false).
    pub show_full_output: bool,

    /// Give value nodes session-unique ids (default: true). With ids off
    /// every node has `ValueId(0)`.
    pub assign_value_ids: bool,

    /// Origin of the output (default: `Process`).
    pub source: ResultSource,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            spec_file: PathBuf::new(),
            show_full_output: false,
            assign_value_ids: true,
            source: ResultSource::Process,
        }
    }
}

impl_builder!(SessionConfig, SessionConfigBuilder {
    required { spec_file: PathBuf }
    optional { show_full_output: bool, assign_value_ids: bool, source: ResultSource }
});

impl From<PathBuf> for SessionConfig {
    fn from(spec_file: PathBuf) -> Self {
        Self {
            spec_file,
            ..Default::default()
        }
    }
}

impl From<&str> for SessionConfig {
    fn from(spec_file: &str) -> Self {
        Self {
            spec_file: PathBuf::from(spec_file),
            ..Default::default()
        }
    }
}

/// Streaming parser for the stdout of one TLC run.
///
/// ```no_run
/// use tlc_output::{ParseSession, SessionConfig};
///
/// let config = SessionConfig::builder().spec_file("specs/Foo.tla").build()?;
/// let mut session = ParseSession::new(config)
///     .on_update(|result| println!("{:?} {:?}", result.state, result.status));
/// let result = session.read_all(std::io::stdin().lock())?;
/// println!("{} errors", result.errors.len());
/// # Ok::<(), tlc_output::Error>(())
/// ```
#[derive(Debug)]
pub struct ParseSession {
    tokenizer: Tokenizer,
    dispatcher: Dispatcher,
    aggregator: ResultAggregator,
    show_full_output: bool,
}

impl ParseSession {
    pub fn new(config: SessionConfig) -> Self {
        debug!(
            spec = %config.spec_file.display(),
            source = ?config.source,
            full_output = config.show_full_output,
            "Starting TLC output parse session"
        );
        Self {
            tokenizer: Tokenizer::new().retain_raw(config.show_full_output),
            dispatcher: Dispatcher::new(&config),
            aggregator: ResultAggregator::new(CheckResult::new(config.source, config.show_full_output)),
            show_full_output: config.show_full_output,
        }
    }

    /// Register the sink that receives a snapshot after every change.
    pub fn on_update(mut self, sink: impl FnMut(&CheckResult) + Send + 'static) -> Self {
        self.aggregator.set_sink(Box::new(sink) as ResultSink);
        self
    }

    /// Parse a chunk of output. Chunks may split lines anywhere.
    pub fn feed(&mut self, chunk: &[u8]) {
        if self.aggregator.is_finished() {
            warn!(bytes = chunk.len(), "Ignoring output fed after the session finished");
            return;
        }
        self.tokenizer.push(chunk);
        self.drain();
    }

    /// Note that the TLC process is being stopped. The result becomes
    /// `Stopped` at end of stream unless TLC reported an outcome first.
    pub fn request_stop(&mut self) {
        self.dispatcher.request_stop();
    }

    /// End the stream and settle the final result. Calling it again
    /// returns the same result.
    pub fn finish(&mut self) -> &CheckResult {
        if !self.aggregator.is_finished() {
            self.tokenizer.finish();
            self.drain();
            self.dispatcher.finish(&mut self.aggregator);
            self.aggregator.mark_finished();
        }
        self.aggregator.snapshot()
    }

    /// Read `reader` to the end and finish.
    ///
    /// On a read error the session is finished with what was parsed so far
    /// and the error is returned; the partial result stays available
    /// through [`snapshot`](Self::snapshot).
    pub fn read_all<R: Read>(&mut self, mut reader: R) -> TlcResult<&CheckResult> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => self.feed(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "Reading TLC output failed");
                    self.finish();
                    return Err(e.into());
                }
            }
        }
        Ok(self.finish())
    }

    /// Async variant of [`read_all`](Self::read_all), e.g. over a child
    /// process's stdout.
    #[cfg(feature = "async")]
    pub async fn read_all_async<R>(&mut self, mut reader: R) -> TlcResult<&CheckResult>
    where
        R: tokio::io::AsyncRead + Unpin,
    {
        use tokio::io::AsyncReadExt;

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => self.feed(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "Reading TLC output failed");
                    self.finish();
                    return Err(e.into());
                }
            }
        }
        Ok(self.finish())
    }

    pub fn snapshot(&self) -> &CheckResult {
        self.aggregator.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.aggregator.is_finished()
    }

    pub fn phase(&self) -> Phase {
        self.dispatcher.phase()
    }

    /// Look up a trace value by id, e.g. for a "show value" request.
    pub fn find_value(&self, id: ValueId) -> Option<&ValueNode> {
        self.aggregator.find_value(id)
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    pub fn into_result(self) -> CheckResult {
        self.aggregator.take_result()
    }

    fn drain(&mut self) {
        if self.show_full_output {
            let raw = self.tokenizer.take_raw_lines();
            if !raw.is_empty() {
                self.aggregator.update(|r| {
                    r.full_output.extend(raw);
                    false
                });
            }
        }
        while let Some(event) = self.tokenizer.next() {
            self.dispatcher.handle(event, &mut self.aggregator);
        }
    }
}

/// Parse a complete TLC output buffer.
pub fn parse_output(config: SessionConfig, output: &[u8]) -> CheckResult {
    let mut session = ParseSession::new(config);
    session.feed(output);
    session.finish();
    session.into_result()
}
