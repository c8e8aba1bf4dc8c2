//! tlc-output: streaming parser for the stdout of the TLC model checker.
//!
//! TLC (run with `-tool`) frames its output in tagged messages. This crate
//! turns that stream into a [`CheckResult`] that is updated as output
//! arrives: run status, progress and coverage statistics, warnings and errors
//! with source links, SANY diagnostics, and the error trace. Every value in
//! the error trace is parsed into a [`ValueNode`] tree and annotated with how
//! it changed since the previous state.
//!
//! # Quick Start
//!
//! ```no_run
//! use tlc_output::{ParseSession, SessionConfig};
//! use std::process::{Command, Stdio};
//!
//! let mut child = Command::new("java")
//!     .args(["-cp", "tla2tools.jar", "tlc2.TLC", "-tool", "specs/Foo.tla"])
//!     .stdout(Stdio::piped())
//!     .spawn()?;
//! let stdout = child.stdout.take().expect("piped stdout");
//!
//! let config = SessionConfig::builder().spec_file("specs/Foo.tla").build()?;
//! let mut session = ParseSession::new(config).on_update(|snapshot| {
//!     println!("{:?}: {} states", snapshot.status, snapshot.initial_states_stat.len());
//! });
//! let result = session.read_all(stdout)?;
//! for item in &result.error_trace {
//!     println!("{}: {}", item.num, item.title);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Features
//!
//! - `async`: [`ParseSession::read_all_async`] over a tokio `AsyncRead`.

mod builder;

pub mod aggregator;
pub mod codes;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod model;
pub mod session;
pub mod value;

mod message;
mod sany;
mod util;

// Re-export core types for convenience
pub use aggregator::{ResultAggregator, ResultSink};
pub use codes::{Severity, TlcCode};
pub use dispatch::Phase;
pub use error::{BuilderError, Error, TlcResult};
pub use framing::{Event, Message, NestedMessage, Tokenizer};
pub use model::{
    CheckResult, CheckState, CheckStatus, CoverageSample, MessageLine, MessageSpan, MessageText, OutputLine,
    Position, ProgressSample, Range, ResultSource, SanyMessage, TraceItem,
};
pub use session::{parse_output, ParseSession, SessionConfig, SessionConfigBuilder};
pub use value::{
    diff_states, parse_state, parse_value, ChangeType, RecordStyle, Shape, ValueId, ValueIds, ValueKey, ValueNode,
    ValueParseError,
};
