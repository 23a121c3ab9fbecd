use serde::Deserialize;
use std::env;
use std::fmt;

/// Host contexts that decide where console logs go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogContext {
    /// A developer driving workflows from a terminal.
    Interactive,
    /// The interpreter embedded in another process; console stays quiet
    /// unless configured.
    Embedded,
    /// Test harnesses.
    Test,
}

/// Console sink named by `logging.console_output`.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    Stdout,
    Stderr,
    None,
}

impl fmt::Display for ConsoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConsoleOutput::Stdout => "stdout",
            ConsoleOutput::Stderr => "stderr",
            ConsoleOutput::None => "none",
        })
    }
}

impl LogContext {
    /// Console sink for this context. Test runs never write to the console;
    /// an embedding host may opt back in through configuration.
    pub fn console_output(self, configured: Option<ConsoleOutput>) -> ConsoleOutput {
        match self {
            LogContext::Test => ConsoleOutput::None,
            LogContext::Interactive => configured.unwrap_or(ConsoleOutput::Stderr),
            LogContext::Embedded => configured.unwrap_or(ConsoleOutput::None),
        }
    }
}

/// Pick the context for the current process. `SFN_LOCAL_EMBEDDED=1` marks
/// an embedding host.
pub fn detect_context() -> LogContext {
    let embedded = env::var("SFN_LOCAL_EMBEDDED")
        .map(|value| value.trim() == "1")
        .unwrap_or(false);
    if embedded {
        LogContext::Embedded
    } else {
        LogContext::Interactive
    }
}
