//! # htstress - HTTP/1.0 load generator
//!
//! Hammers one URL with `GET` requests, one request per connection, from
//! `threads × concurrency` non-blocking sockets, then prints a summary.
//!
//! ## Usage
//!
//!   htstress -n 100000 -c 64 -t 4 http://127.0.0.1:8080/
//!   htstress -c 16 -u /run/app.sock http://localhost/health    # Ctrl-C to finish
//!
//! SIGINT stops issuing new work and prints the report for what completed.
//! SIGTERM stops at once without a report (exit status 130).
//!
//! Environment: `HTS_LOG_LEVEL`, `HTS_FLUSH_EPRINT`, and the `HTS_*`
//! overrides read by `RunConfig::from_env` (flags win over the environment).

mod cli;
mod url;

use clap::Parser;
use htstress_core::error::HtsError;
use htstress_core::kprint::{self, LogLevel};
use htstress_core::{build_get_request, kerror, kinfo, kprintln, Target, TargetAddr};
use htstress_runtime::{signal, Engine, Report};

use std::fmt;
use std::process::ExitCode;

/// Exit status after SIGTERM
const EXIT_ABORTED: u8 = 130;

#[derive(Debug)]
enum AppError {
    Url(url::UrlError),
    Run(HtsError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Url(e) => write!(f, "{}", e),
            AppError::Run(e) => write!(f, "{}", e),
        }
    }
}

impl From<url::UrlError> for AppError {
    fn from(e: url::UrlError) -> Self {
        AppError::Url(e)
    }
}

impl From<HtsError> for AppError {
    fn from(e: HtsError) -> Self {
        AppError::Run(e)
    }
}

/// `-d` also raises logging to at least debug so worker lifecycle lines
/// interleave with the dumps.
fn enable_debug_output() {
    if !kprint::level_enabled(LogLevel::Debug) {
        kprint::set_log_level(LogLevel::Debug);
    }
    kprintln!("htstress: dumping requests and responses to stderr");
}

fn run(args: cli::Args) -> Result<ExitCode, AppError> {
    if args.debug {
        enable_debug_output();
    }

    let parts = url::parse(&args.url)?;
    let addr = match &args.udaddr {
        Some(path) => TargetAddr::Unix(path.clone()),
        None => TargetAddr::Inet(url::resolve(&parts, args.family())?),
    };
    let host = args.host.as_deref().unwrap_or(&parts.node);
    let target = Target::new(addr, build_get_request(&parts.path, host))?;

    let shutdown = signal::install_handlers()?;
    let engine = Engine::new(args.run_config(), target, shutdown)?;

    let config = engine.config();
    kinfo!(
        "{} threads × {} connections, {} requests",
        config.num_threads,
        config.concurrency,
        config.max_requests
    );
    if config.max_requests == 0 {
        println!("[Press Ctrl-C to finish]");
    }

    let outcome = engine.run()?;
    if outcome.aborted {
        return Ok(ExitCode::from(EXIT_ABORTED));
    }
    print!("{}", Report(&outcome));
    println!();
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    kprint::init();
    let args = cli::Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            kerror!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_raises_log_level() {
        kprint::set_log_level(LogLevel::Warn);
        enable_debug_output();
        assert_eq!(kprint::log_level(), LogLevel::Debug);

        // an explicit trace level is left alone
        kprint::set_log_level(LogLevel::Trace);
        enable_debug_output();
        assert_eq!(kprint::log_level(), LogLevel::Trace);
    }
}
