//! `nic-owner trend`
//!
//! Sample interface counters and check their trend.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use nic_owner::config::Config;
use nic_owner::{InterfaceQuery, StatChecker, Trend};

#[derive(Args, Debug)]
pub struct TrendArgs {
    /// Interface to sample
    #[arg(long)]
    pub name: String,

    /// Counter name as reported by `ip -s link` (rx_bytes, tx_errors...); repeat for several
    #[arg(long = "stat", required = true)]
    pub stats: Vec<String>,

    /// flat, up, down, equal, more or less
    #[arg(long)]
    pub trend: Trend,

    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub threshold: i64,

    #[arg(long, default_value_t = 3)]
    pub samples: usize,

    #[arg(long, default_value_t = 1)]
    pub interval_secs: u64,
}

pub fn run(config: &Config, args: &TrendArgs) -> Result<()> {
    if args.samples < 2 {
        bail!("--samples must be at least 2");
    }
    let owner = super::connect(config)?;
    let interface = owner.get_interface(&InterfaceQuery::new().interface_names([args.name.as_str()]))?;

    let mut checker = StatChecker::new(&interface);
    for stat in &args.stats {
        checker.add(stat.as_str(), args.trend, args.threshold);
    }
    for i in 0..args.samples {
        if i > 0 {
            thread::sleep(Duration::from_secs(args.interval_secs));
        }
        checker.get_values()?;
    }

    match checker.validate_trend()? {
        None => {
            println!(
                "{} {} followed trend {} over {} samples",
                "ok".green().bold(),
                args.name,
                args.trend,
                args.samples
            );
            Ok(())
        }
        Some(violations) => {
            for (stat, reason) in &violations {
                println!("{} {}: {}", "FAIL".red().bold(), stat, reason);
            }
            bail!("{} statistic(s) did not follow trend {}", violations.len(), args.trend)
        }
    }
}
