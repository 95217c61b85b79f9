mod cli;
mod report;

use std::io::Read;

use attest_checker::{CheckConfig, Session};

use cli::ColorChoice;

fn main() {
    env_logger::init();
    let matches = cli::build_cli().get_matches();

    let config = CheckConfig {
        show_runs: matches.get_flag("show_runs"),
        no_tail_calls: matches.get_flag("no_tail_calls"),
        use_compiled: matches.get_flag("use_compiled"),
    };
    let color = matches
        .get_one::<String>("color")
        .map(|v| ColorChoice::from_flag(v))
        .unwrap_or_default();
    let files: Vec<String> = matches
        .get_many::<String>("files")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    // one session across all files: signatures declared in an earlier file
    // are in scope for the proofs in later ones
    let mut session = Session::new(config);

    if files.is_empty() {
        check_stdin(&mut session, color);
        return;
    }
    for file in &files {
        if file == "-" {
            check_stdin(&mut session, color);
            continue;
        }
        let src = match std::fs::read_to_string(file) {
            Ok(src) => src,
            Err(e) => {
                eprintln!("error: cannot read {file}: {e}");
                std::process::exit(1);
            }
        };
        check(&mut session, &src, file, color);
    }
    // silent on success
}

fn check_stdin(session: &mut Session, color: ColorChoice) {
    let mut src = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut src) {
        eprintln!("error: cannot read stdin: {e}");
        std::process::exit(1);
    }
    check(session, &src, "stdin", color);
}

fn check(session: &mut Session, src: &str, file: &str, color: ColorChoice) {
    if let Err(e) = session.check_file(src, file) {
        eprint!("{}", report::render(&e, src, color.should_colorize()));
        std::process::exit(1);
    }
}
