//! Parse TLC `-tool` output and print the result as JSON.
//!
//! ```text
//! cargo run --example parse_tlc_output -- specs/Foo.tla MC.out
//! java -cp tla2tools.jar tlc2.TLC -tool specs/Foo.tla | cargo run --example parse_tlc_output -- specs/Foo.tla
//! ```
//!
//! Progress goes to stderr; set `RUST_LOG=tlc_output=debug` for parser logs.

use std::fs::File;
use std::io;
use tlc_output::{ParseSession, ResultSource, SessionConfig};

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("warn"))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(spec_file) = args.next() else {
        eprintln!("usage: parse_tlc_output <spec.tla> [tlc-output-file]");
        std::process::exit(2);
    };
    let out_file = args.next();

    let config = SessionConfig::builder()
        .spec_file(spec_file)
        .source(if out_file.is_some() {
            ResultSource::OutFile
        } else {
            ResultSource::Process
        })
        .build()?;

    let mut session = ParseSession::new(config).on_update(|snapshot| {
        if let Some(last) = snapshot.initial_states_stat.last() {
            eprintln!(
                "[{:?}] {} states, {} distinct, {} queued",
                snapshot.status, last.total, last.distinct, last.queue_size
            );
        }
    });

    let result = match out_file {
        Some(path) => session.read_all(File::open(path)?)?,
        None => session.read_all(io::stdin().lock())?,
    };
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
