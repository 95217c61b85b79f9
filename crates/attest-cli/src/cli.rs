//! Argument builders for the command line.

use clap::{Arg, ArgAction, Command};

/// Signature and proof files, checked in order (positional).
fn files_arg() -> Arg {
    Arg::new("files")
        .value_name("FILE")
        .num_args(0..)
        .help("Files to check, in order; reads stdin when none are given ('-' also reads stdin)")
}

/// Trace side-condition evaluation (--show-runs).
fn show_runs_arg() -> Arg {
    Arg::new("show_runs")
        .long("show-runs")
        .action(ArgAction::SetTrue)
        .help("Print each side-condition run and its result")
}

/// Disable the tail-position trampoline (--no-tail-calls).
fn no_tail_calls_arg() -> Arg {
    Arg::new("no_tail_calls")
        .long("no-tail-calls")
        .action(ArgAction::SetTrue)
        .help("Check every subterm recursively (debugging; verdicts are unchanged)")
}

/// Route side conditions through compiled programs (--use-compiled).
fn use_compiled_arg() -> Arg {
    Arg::new("use_compiled")
        .long("use-compiled")
        .action(ArgAction::SetTrue)
        .help("Prefer compiled side-condition programs where registered")
}

/// Color output control (--color).
fn color_arg() -> Arg {
    Arg::new("color")
        .long("color")
        .value_name("WHEN")
        .default_value("auto")
        .value_parser(["auto", "always", "never"])
        .help("Colorize diagnostics")
}

pub fn build_cli() -> Command {
    Command::new("attest")
        .about("Checks proof certificates against declared signatures")
        .arg(files_arg())
        .arg(show_runs_arg())
        .arg(no_tail_calls_arg())
        .arg(use_compiled_arg())
        .arg(color_arg())
}

/// Color output mode for diagnostics.
#[derive(Clone, Copy, Debug, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn from_flag(value: &str) -> Self {
        match value {
            "always" => ColorChoice::Always,
            "never" => ColorChoice::Never,
            _ => ColorChoice::Auto,
        }
    }

    pub fn should_colorize(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            // diagnostics go to stderr
            ColorChoice::Auto => std::io::IsTerminal::is_terminal(&std::io::stderr()),
        }
    }
}
