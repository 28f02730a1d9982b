#![cfg(test)]
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sweepr_common::catalog::PortCatalog;
use sweepr_common::config::Config;
use sweepr_common::network::host::OpenPort;
use sweepr_common::network::range::Ipv4Range;
use sweepr_common::network::target;
use sweepr_core::portscan::PORT_CONNECT_TIMEOUT;
use sweepr_core::scanner::{ScanReport, Scanner};
use sweepr_core::sweep::{ECHO_TIMEOUT, ProgressSink, SweepProgress};
use tokio::time::Instant;

use crate::mocks::{MockConnector, MockProber, SlowConnector};

fn web_catalog() -> Arc<PortCatalog> {
    Arc::new([(80, "http"), (443, "https")].into_iter().collect())
}

async fn run(
    range: &Ipv4Range,
    prober: Arc<MockProber>,
    connector: Arc<MockConnector>,
    progress: Option<ProgressSink>,
) -> ScanReport {
    let scanner = Scanner::new(&Config::default(), prober, connector, web_catalog())
        .expect("default config is valid");
    scanner.run(range, progress).await
}

fn recorder() -> (ProgressSink, Arc<Mutex<Vec<SweepProgress>>>) {
    let seen: Arc<Mutex<Vec<SweepProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink: ProgressSink = {
        let seen = seen.clone();
        Arc::new(move |p| seen.lock().unwrap().push(p))
    };
    (sink, seen)
}

/// A single live address with no open ports yields exactly one record
/// carrying the echo metrics.
#[tokio::test(start_paused = true)]
async fn single_host_range() {
    let addr = Ipv4Addr::new(10, 0, 0, 1);
    let range = target::parse("10.0.0.1", Some("10.0.0.1")).unwrap();
    let prober = Arc::new(MockProber::new().reply(addr, 32, 64, 5));

    let report = run(&range, prober, Arc::new(MockConnector::new()), None).await;

    assert_eq!(report.hosts.len(), 1);
    let host = &report.hosts[0];
    assert_eq!(host.address, addr);
    assert_eq!(host.ttl, 64);
    assert_eq!(host.bytes, 32);
    assert_eq!(host.round_trip_ms, 5);
    assert!(host.open_ports.is_empty());
}

#[tokio::test(start_paused = true)]
async fn only_responders_are_reported() {
    let live = Ipv4Addr::new(10, 0, 0, 2);
    let range = target::parse("10.0.0.1", Some("10.0.0.3")).unwrap();
    let prober = Arc::new(
        MockProber::new()
            .reply(live, 32, 64, 5)
            .unreachable(Ipv4Addr::new(10, 0, 0, 3)),
    );

    let report = run(&range, prober.clone(), Arc::new(MockConnector::new()), None).await;

    let addrs: Vec<Ipv4Addr> = report.hosts.iter().map(|h| h.address).collect();
    assert_eq!(addrs, vec![live]);
    assert_eq!(prober.probes(), 3);
}

#[tokio::test(start_paused = true)]
async fn open_port_is_labelled_from_catalog() {
    let live = Ipv4Addr::new(10, 0, 0, 2);
    let range = target::parse("10.0.0.1-3", None).unwrap();
    let prober = Arc::new(MockProber::new().reply(live, 32, 64, 5));
    let connector = Arc::new(MockConnector::new().open(live, 80));

    let report = run(&range, prober, connector, None).await;

    assert_eq!(
        report.hosts[0].open_ports,
        vec![OpenPort {
            port: 80,
            service_name: "http"
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn silent_range_signals_no_hosts() {
    let range = target::parse("10.0.0.0/29", None).unwrap();
    let connector = Arc::new(MockConnector::new());

    let report = run(&range, Arc::new(MockProber::new()), connector.clone(), None).await;

    assert!(report.no_hosts());
    assert!(report.hosts.is_empty());
    assert_eq!(report.sweep.total, 8);
    assert!(report.sweep.is_done());
    assert_eq!(connector.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn counters_settle_at_range_size() {
    let range = target::parse("10.0.0.1-20", None).unwrap();
    let prober = Arc::new(
        MockProber::new()
            .reply(Ipv4Addr::new(10, 0, 0, 4), 32, 64, 300)
            .reply(Ipv4Addr::new(10, 0, 0, 15), 32, 128, 1),
    );
    let (sink, seen) = recorder();

    let report = run(&range, prober, Arc::new(MockConnector::new()), Some(sink)).await;

    assert_eq!(
        report.sweep,
        SweepProgress {
            total: 20,
            dispatched: 20,
            completed: 20
        }
    );
    let seen = seen.lock().unwrap();
    assert!(seen.iter().all(|p| p.completed <= p.dispatched));
    assert_eq!(seen.last().map(|p| p.completed), Some(20));
}

#[tokio::test(start_paused = true)]
async fn slow_replies_arrive_out_of_order_but_report_is_sorted() {
    let first = Ipv4Addr::new(10, 0, 0, 1);
    let second = Ipv4Addr::new(10, 0, 0, 2);
    let range = target::parse("10.0.0.1-2", None).unwrap();
    let prober = Arc::new(
        MockProber::new()
            .reply(first, 32, 64, 5)
            .reply(second, 32, 64, 5)
            .delayed(first, Duration::from_millis(1500)),
    );

    let report = run(&range, prober, Arc::new(MockConnector::new()), None).await;

    let addrs: Vec<Ipv4Addr> = report.hosts.iter().map(|h| h.address).collect();
    assert_eq!(addrs, vec![first, second]);
}

#[tokio::test(start_paused = true)]
async fn reply_after_echo_timeout_counts_as_silent() {
    let late = Ipv4Addr::new(10, 0, 0, 1);
    let range = Ipv4Range::single(late);
    let prober = Arc::new(
        MockProber::new()
            .reply(late, 32, 64, 5)
            .delayed(late, ECHO_TIMEOUT + Duration::from_millis(500)),
    );
    let started = Instant::now();

    let report = run(&range, prober, Arc::new(MockConnector::new()), None).await;

    assert!(report.no_hosts());
    assert!(started.elapsed() < ECHO_TIMEOUT + Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn ports_are_only_probed_on_live_hosts() {
    let live = Ipv4Addr::new(10, 0, 0, 5);
    let range = target::parse("10.0.0.0/28", None).unwrap();
    let prober = Arc::new(MockProber::new().reply(live, 32, 64, 5));
    // An open port on a host that never answered the sweep.
    let connector = Arc::new(
        MockConnector::new()
            .open(live, 443)
            .open(Ipv4Addr::new(10, 0, 0, 6), 80),
    );

    let report = run(&range, prober, connector.clone(), None).await;

    assert_eq!(report.hosts.len(), 1);
    assert!(report.hosts[0].is_port_open(443));
    assert_eq!(connector.attempted_hosts().into_iter().collect::<Vec<_>>(), vec![live]);
    assert_eq!(connector.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_connect_is_cut_at_port_timeout() {
    let live = Ipv4Addr::new(10, 0, 0, 2);
    let scanner = Scanner::new(
        &Config::default(),
        Arc::new(MockProber::new().reply(live, 32, 64, 5)),
        Arc::new(SlowConnector {
            delay: Duration::from_secs(30),
        }),
        web_catalog(),
    )
    .unwrap();
    let started = Instant::now();

    let report = scanner.run(&Ipv4Range::single(live), None).await;

    assert_eq!(report.hosts.len(), 1);
    assert!(report.hosts[0].open_ports.is_empty());
    // 5 ms echo, then one round of connects capped at the port timeout.
    assert!(started.elapsed() < Duration::from_millis(5) + PORT_CONNECT_TIMEOUT * 2);
}

#[tokio::test(start_paused = true)]
async fn pacing_interval_is_honored() {
    let range = target::parse("10.0.0.1-5", None).unwrap();
    let config = Config {
        interval: Duration::from_millis(200),
        ..Config::default()
    };
    let scanner = Scanner::new(
        &config,
        Arc::new(MockProber::new()),
        Arc::new(MockConnector::new()),
        web_catalog(),
    )
    .unwrap();
    let (sink, seen) = recorder();
    let started = Instant::now();

    scanner.run(&range, Some(sink)).await;

    // Four gaps between five dispatches; silent probes finish immediately.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(800));
    assert!(elapsed < Duration::from_millis(900));
    assert!(seen.lock().unwrap().iter().all(|p| p.completed <= p.dispatched));
}
