use std::time::Duration;

use colored::*;
use sweepr_common::config::Config;
use sweepr_common::network::host::HostResult;
use sweepr_common::network::range::Ipv4Range;
use sweepr_core::export::{JsonExporter, ResultExporter};
use sweepr_core::scanner::{self, ScanReport};
use tracing::{Instrument, info, info_span, warn};

use crate::mprint;
use crate::terminal::{colors, format, print, progress};

pub async fn scan(range: Ipv4Range, cfg: &Config) -> anyhow::Result<()> {
    if !is_root::is_root() {
        warn!("raw ICMP sockets usually need root, the sweep may fail to start");
    }
    info!(
        "targeting {} to {} ({} addresses)",
        range.start_addr(),
        range.end_addr(),
        range.len()
    );

    let span = info_span!("sweep");
    progress::prepare(&span, range.len())?;
    let sink = progress::sink(span.clone());

    let report: ScanReport = scanner::perform_scan(cfg, &range, Some(sink))
        .instrument(span)
        .await?;

    if let Some(path) = &cfg.output {
        JsonExporter::new(path).export(&report.hosts)?;
    }

    scan_ends(&report, cfg);
    Ok(())
}

fn scan_ends(report: &ScanReport, cfg: &Config) {
    if report.no_hosts() {
        no_hosts_found(report, cfg);
        return;
    }

    if cfg.raw {
        for host in &report.hosts {
            mprint!(&format::raw_line(host));
        }
        return;
    }

    print::header("live hosts", cfg.quiet);
    print_hosts(&report.hosts, cfg);
    print_summary(report.hosts.len(), report.elapsed, cfg);
}

fn no_hosts_found(report: &ScanReport, cfg: &Config) {
    if !cfg.raw && cfg.quiet == 0 {
        print::header("zero hosts detected", cfg.quiet);
        print::no_results();
    }
    warn!(
        "no hosts responded ({} address(es) probed)",
        report.sweep.completed
    );
}

fn print_hosts(hosts: &[HostResult], cfg: &Config) {
    for (idx, host) in hosts.iter().enumerate() {
        match cfg.quiet {
            2.. => {
                mprint!(&host.address.to_string());
            }
            _ => {
                print::tree_head(idx, &format::host_title(host));
                print::as_tree_one_level(format::host_to_details(host));
                if idx + 1 != hosts.len() {
                    mprint!();
                }
            }
        }
    }
}

fn print_summary(hosts_len: usize, total_time: Duration, cfg: &Config) {
    let active_hosts: ColoredString = format!("{hosts_len} live hosts").bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64())
        .bold()
        .yellow();
    let output: String = format!("Scan complete: {active_hosts} found in {total_time}")
        .color(colors::TEXT_DEFAULT)
        .to_string();

    match cfg.quiet {
        0 => {
            print::fat_separator();
            print::centerln(&output);
        }
        1 => {
            mprint!();
            info!("{}", output);
        }
        _ => {}
    }
}
