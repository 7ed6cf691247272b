//! Where the supervised process's standard output goes.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::ChildStdout;
use tracing::Instrument;

/// Output sink for the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputSink {
    /// Share the parent's stdout.
    #[default]
    Inherit,
    /// Forward each line as a tracing event.
    Log,
    /// Drop everything.
    Discard,
}

impl OutputSink {
    pub(crate) fn stdio(&self) -> Stdio {
        match self {
            OutputSink::Inherit => Stdio::inherit(),
            OutputSink::Log => Stdio::piped(),
            OutputSink::Discard => Stdio::null(),
        }
    }

    /// Start draining a piped stdout. Only `Log` pipes.
    pub(crate) fn attach(&self, pid: u32, stdout: Option<ChildStdout>) {
        let Some(stdout) = stdout else {
            return;
        };
        if *self != OutputSink::Log {
            return;
        }

        tokio::spawn(
            async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::info!(target: "reload::app", pid, "{}", line);
                }
                tracing::debug!(pid, "stdout closed");
            }
            .in_current_span(),
        );
    }
}
