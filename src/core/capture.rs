//! Terminal capture for trace sessions.
//!
//! The engine's console output is its `tracing` output. While a task runs,
//! the orchestrator installs a task-scoped subscriber whose writer passes
//! every formatted line through to stderr and records it in the trace.

use std::io::{self, Write};

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use super::trace::TraceRecorder;

/// `MakeWriter` that tees formatted output into a trace
#[derive(Clone)]
pub struct TerminalTee {
    trace: TraceRecorder,
    echo: bool,
}

impl TerminalTee {
    /// `echo` controls whether output still reaches stderr
    pub fn new(trace: TraceRecorder, echo: bool) -> Self {
        Self { trace, echo }
    }
}

/// Writer for a single formatted event; lines are recorded on drop
pub struct TeeWriter {
    trace: TraceRecorder,
    echo: bool,
    buf: Vec<u8>,
}

impl Write for TeeWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.echo {
            io::stderr().write_all(data)?;
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.echo {
            io::stderr().flush()?;
        }
        Ok(())
    }
}

impl Drop for TeeWriter {
    fn drop(&mut self) {
        let text = String::from_utf8_lossy(&self.buf);
        for line in text.lines() {
            self.trace.add_terminal_output(line);
        }
    }
}

impl<'a> MakeWriter<'a> for TerminalTee {
    type Writer = TeeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        TeeWriter {
            trace: self.trace.clone(),
            echo: self.echo,
            buf: Vec::new(),
        }
    }
}

/// Log filter shared by the binary and task subscribers: `NOVA_LOG`, then
/// `RUST_LOG`, then `nova=info`
pub fn log_filter() -> EnvFilter {
    EnvFilter::try_from_env("NOVA_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("nova=info"))
}

/// Subscriber for the duration of one task, plain text (no ANSI) so
/// captured lines stay readable
pub fn capture_subscriber(trace: &TraceRecorder, echo: bool) -> impl Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry().with(log_filter()).with(
        fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(TerminalTee::new(trace.clone(), echo)),
    )
}
