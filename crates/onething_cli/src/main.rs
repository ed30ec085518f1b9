//! Diagnostic probe for the core crate.
//!
//! # Responsibility
//! - Resolve the store location and start file logging.
//! - Print a doctor scan and, for a healthy store, today's prompt status.
//! - Exit with the doctor's exit code.

use onething_core::{
    core_version, default_log_level, init_logging, CommitmentService, Doctor, Health, Store,
    StorePaths,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    let paths = match StorePaths::resolve() {
        Ok(paths) => paths,
        Err(err) => {
            eprintln!("onething: {err}");
            return ExitCode::from(2);
        }
    };
    if let Err(err) = init_logging(default_log_level(), &paths.log_dir) {
        eprintln!("onething: logging disabled: {err}");
    }

    println!("onething_core version={}", core_version());
    println!("state_file={}", paths.state_file.display());

    let report = match Doctor::from_paths(&paths).scan() {
        Ok(report) => report,
        Err(err) => {
            log::error!("event=probe module=cli status=error error={}", err);
            eprintln!("onething: {err}");
            return ExitCode::from(2);
        }
    };
    print!("{}", report.render());

    if report.health == Health::Healthy {
        match Store::open(&paths.state_file) {
            Ok(store) => {
                let service = CommitmentService::new(&store);
                println!("entries={}", store.read(|snapshot| snapshot.ledger.len()));
                println!("prompt_for_today={}", service.should_prompt_for_today());
            }
            Err(err) => eprintln!("onething: {err}"),
        }
    }

    ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(2))
}
