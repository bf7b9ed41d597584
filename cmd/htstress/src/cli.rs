//! Command line

use clap::{ArgAction, Parser};
use htstress_runtime::{DebugFlags, RunConfig};

use std::path::PathBuf;

use crate::url::Family;

/// HTTP/1.0 load generator: one request per connection, epoll reactor per thread
#[derive(Parser, Debug)]
#[command(name = "htstress", disable_help_flag = true)]
#[command(override_usage = "htstress [OPTIONS] [http://]hostname[:port]/path")]
pub struct Args {
    /// Total number of requests (0 for infinite, Ctrl-C to finish)
    #[arg(short = 'n', long = "number", value_name = "N")]
    pub number: Option<u64>,

    /// Concurrent connections per thread
    #[arg(short, long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Worker threads (set this to the number of CPU cores)
    #[arg(short, long, value_name = "N")]
    pub threads: Option<usize>,

    /// Path to a unix domain socket; skips name resolution
    #[arg(short, long = "udaddr", value_name = "PATH")]
    pub udaddr: Option<PathBuf>,

    /// Host header value (defaults to the URL host)
    #[arg(short = 'h', long, value_name = "NAME")]
    pub host: Option<String>,

    /// Dump requests and responses to stderr
    #[arg(short, long)]
    pub debug: bool,

    /// Resolve IPv4 addresses only
    #[arg(short = '4', conflicts_with = "ipv6")]
    pub ipv4: bool,

    /// Resolve IPv6 addresses only
    #[arg(short = '6')]
    pub ipv6: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,

    /// Target URL
    pub url: String,
}

impl Args {
    pub fn family(&self) -> Family {
        match (self.ipv4, self.ipv6) {
            (true, _) => Family::V4,
            (_, true) => Family::V6,
            _ => Family::Any,
        }
    }

    /// Environment-derived configuration with the flags applied on top
    pub fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::from_env();
        if let Some(n) = self.number {
            config = config.max_requests(n);
        }
        if let Some(c) = self.concurrency {
            config = config.concurrency(c);
        }
        if let Some(t) = self.threads {
            config = config.num_threads(t);
        }
        if self.debug {
            config = config.debug(DebugFlags::all());
        }
        config
    }
}
