//! Picks the run-progress logger backend from the CLI flags in §6: the
//! presentation choice is independent of `RUST_LOG`/`tracing` (see
//! `mdl-log`'s crate docs for the split).

use mdl_exec::RunObserver;

use crate::ci_group::CiGroupLogger;
use crate::live_table::LiveTableLogger;
use crate::simple::SimpleLogger;

/// The logger-backend selection inputs taken directly off the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerOptions {
    pub simple_log: bool,
    pub github_actions: bool,
    pub no_color: bool,
    pub stdout_is_tty: bool,
}

/// Build the observer to pass to the scheduler for this run.
///
/// Precedence: `--github-actions` wins outright; otherwise `--simple-log`
/// or a non-TTY stdout falls back to the plain logger; otherwise the
/// dynamic live table.
pub fn select_logger(options: LoggerOptions) -> Box<dyn RunObserver> {
    if options.github_actions {
        Box::new(CiGroupLogger::new())
    } else if options.simple_log || !options.stdout_is_tty {
        Box::new(SimpleLogger::new(!options.no_color))
    } else {
        Box::new(LiveTableLogger::new(!options.no_color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_actions_takes_precedence() {
        let options = LoggerOptions {
            simple_log: false,
            github_actions: true,
            no_color: false,
            stdout_is_tty: true,
        };
        let _ = select_logger(options);
    }

    #[test]
    fn non_tty_falls_back_to_simple() {
        let options = LoggerOptions {
            simple_log: false,
            github_actions: false,
            no_color: false,
            stdout_is_tty: false,
        };
        let _ = select_logger(options);
    }
}
