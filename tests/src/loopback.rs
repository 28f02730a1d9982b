#![cfg(test)]
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use sweepr_common::catalog::PortCatalog;
use sweepr_common::config::Config;
use sweepr_common::network::range::Ipv4Range;
use sweepr_core::network::tcp::TcpConnector;
use sweepr_core::scanner::{self, Scanner};
use tokio::net::TcpListener;

use crate::mocks::MockProber;

const LOCALHOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

async fn listen_on_loopback() -> (TcpListener, u16) {
    let listener = TcpListener::bind((LOCALHOST, 0)).await.unwrap();
    let SocketAddr::V4(addr) = listener.local_addr().unwrap() else {
        panic!("loopback listener bound to a non-ipv4 address");
    };
    (listener, addr.port())
}

/// Real TCP connects against a local listener; only the echo side is scripted.
#[tokio::test]
async fn real_connector_finds_listening_port() {
    let (_listener, open_port) = listen_on_loopback().await;
    let (closed, closed_port) = listen_on_loopback().await;
    drop(closed);

    let catalog: PortCatalog = [(open_port, "test-open"), (closed_port, "test-closed")]
        .into_iter()
        .collect();
    let scanner = Scanner::new(
        &Config::default(),
        Arc::new(MockProber::new().reply(LOCALHOST, 32, 64, 0)),
        Arc::new(TcpConnector),
        Arc::new(catalog),
    )
    .unwrap();

    let report = scanner.run(&Ipv4Range::single(LOCALHOST), None).await;

    assert_eq!(report.hosts.len(), 1);
    let ports: Vec<u16> = report.hosts[0].open_ports.iter().map(|p| p.port).collect();
    assert_eq!(ports, vec![open_port]);
    assert_eq!(report.hosts[0].open_ports[0].service_name, "test-open");
}

/// Needs root for the raw ICMP socket.
#[tokio::test]
#[ignore]
async fn loopback_answers_full_scan() -> anyhow::Result<()> {
    let config = Config {
        no_dns: true,
        no_trace: true,
        ..Config::default()
    };

    let report = scanner::perform_scan(&config, &Ipv4Range::single(LOCALHOST), None).await?;

    assert_eq!(report.hosts.len(), 1);
    assert_eq!(report.hosts[0].address, LOCALHOST);
    assert!(report.hosts[0].ttl > 0);
    Ok(())
}

#[tokio::test]
#[ignore]
async fn loopback_range_finds_only_responders() {
    let config = Config {
        no_dns: true,
        no_trace: true,
        ..Config::default()
    };
    let range = Ipv4Range::new(LOCALHOST, Ipv4Addr::new(127, 0, 0, 3)).unwrap();

    let report = scanner::perform_scan(&config, &range, None).await.unwrap();

    // Linux answers for the whole 127/8 block.
    assert!(report.hosts.iter().any(|h| h.address == LOCALHOST));
    assert!(report.sweep.is_done());
}
