//! Paced ICMP echo sweep over an address range.
//!
//! Every address is registered before its probe is dispatched, and each probe
//! runs as its own task under a hard [`ECHO_TIMEOUT`]. All terminal outcomes
//! funnel through one channel into a collector task, which is the only place
//! `completed` is advanced.

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sweepr_common::config::DEFAULT_INTERVAL;
use sweepr_common::network::probe::{EchoProbeOutcome, EchoStatus};
use sweepr_common::network::range::Ipv4Range;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::echo::EchoProber;

/// Upper bound on how long a single echo probe may stay pending.
pub const ECHO_TIMEOUT: Duration = Duration::from_millis(2000);

/// Called with a fresh snapshot after every dispatch and every completion.
pub type ProgressSink = Arc<dyn Fn(SweepProgress) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepProgress {
    pub total: u64,
    pub dispatched: u64,
    pub completed: u64,
}

impl SweepProgress {
    /// Probes sent but not yet resolved.
    pub fn pending(&self) -> u64 {
        self.dispatched.saturating_sub(self.completed)
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }

    pub fn is_done(&self) -> bool {
        self.completed == self.total
    }
}

/// Only live hosts are kept; every other terminal status is just counted.
#[derive(Default)]
struct SweepState {
    pending: HashSet<Ipv4Addr>,
    live: BTreeMap<Ipv4Addr, EchoProbeOutcome>,
    timed_out: u64,
    unreachable: u64,
    errored: u64,
}

/// Book-keeping for one sweep, shared by the dispatcher and the collector.
pub struct SweepRegistry {
    total: u64,
    dispatched: AtomicU64,
    completed: AtomicU64,
    state: Mutex<SweepState>,
}

impl SweepRegistry {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            state: Mutex::new(SweepState::default()),
        }
    }

    /// Marks `addr` as in flight. Returns `false` if it was already
    /// registered, in which case no probe should be dispatched for it.
    pub fn register(&self, addr: Ipv4Addr) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.live.contains_key(&addr) || !state.pending.insert(addr) {
            debug!("{addr} already registered, skipping");
            return false;
        }
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Settles `addr`. Returns `false` for addresses that are not pending.
    pub fn complete(&self, addr: Ipv4Addr, outcome: EchoProbeOutcome) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.pending.remove(&addr) {
            debug!("dropping outcome for {addr}: not pending");
            return false;
        }
        match outcome.status {
            EchoStatus::Success => {
                state.live.insert(addr, outcome);
            }
            EchoStatus::Timeout => state.timed_out += 1,
            EchoStatus::Unreachable => state.unreachable += 1,
            EchoStatus::Error => state.errored += 1,
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Non-blocking view of the counters.
    pub fn snapshot(&self) -> SweepProgress {
        // `completed` first: any value read for it afterwards is bounded by
        // the `dispatched` read that follows.
        let completed = self.completed.load(Ordering::SeqCst);
        let dispatched = self.dispatched.load(Ordering::SeqCst);
        SweepProgress {
            total: self.total,
            dispatched,
            completed,
        }
    }

    /// Drains the live hosts, ascending by address.
    fn take_live(&self) -> Vec<EchoProbeOutcome> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(
            "non-responding: {} timed out, {} unreachable, {} errored",
            state.timed_out, state.unreachable, state.errored
        );
        std::mem::take(&mut state.live).into_values().collect()
    }
}

#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Successful outcomes only, ascending by address.
    pub outcomes: Vec<EchoProbeOutcome>,
    pub progress: SweepProgress,
}

type ResultSender = mpsc::UnboundedSender<(Ipv4Addr, EchoProbeOutcome)>;

/// Guarantees exactly one outcome per dispatched probe. If the probe task
/// dies before reporting, dropping this sends an `Error` outcome instead.
struct OutcomeReporter {
    addr: Ipv4Addr,
    tx: Option<ResultSender>,
}

impl OutcomeReporter {
    fn report(mut self, outcome: EchoProbeOutcome) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send((self.addr, outcome));
        }
    }
}

impl Drop for OutcomeReporter {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            debug!("probe task for {} ended without an outcome", self.addr);
            let _ = tx.send((self.addr, EchoProbeOutcome::error(self.addr)));
        }
    }
}

pub struct EchoSweepEngine {
    prober: Arc<dyn EchoProber>,
    interval: Duration,
    progress: Option<ProgressSink>,
}

impl EchoSweepEngine {
    pub fn new(prober: Arc<dyn EchoProber>) -> Self {
        Self {
            prober,
            interval: DEFAULT_INTERVAL,
            progress: None,
        }
    }

    /// Pause between successive dispatches.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub async fn sweep(&self, range: &Ipv4Range) -> SweepReport {
        let registry = Arc::new(SweepRegistry::new(range.len()));
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<(Ipv4Addr, EchoProbeOutcome)>();

        let collector = {
            let registry = registry.clone();
            let sink = self.progress.clone();
            tokio::spawn(async move {
                while let Some((addr, outcome)) = results_rx.recv().await {
                    if !registry.complete(addr, outcome) {
                        continue;
                    }
                    if let Some(sink) = &sink {
                        sink(registry.snapshot());
                    }
                }
            })
        };

        info!(
            "sweeping {} address(es) from {} to {}",
            range.len(),
            range.start_addr(),
            range.end_addr()
        );

        let mut addrs = range.iter().peekable();
        while let Some(addr) = addrs.next() {
            if registry.register(addr) {
                self.dispatch(addr, results_tx.clone());
                if let Some(sink) = &self.progress {
                    sink(registry.snapshot());
                }
            }
            if addrs.peek().is_some() {
                tokio::time::sleep(self.interval).await;
            }
        }
        drop(results_tx);

        if let Err(e) = collector.await {
            warn!("sweep collector stopped early, progress is incomplete: {e}");
        }

        let progress = registry.snapshot();
        let outcomes = registry.take_live();
        info!(
            "sweep finished: {} of {} address(es) responded",
            outcomes.len(),
            progress.total
        );
        SweepReport { outcomes, progress }
    }

    fn dispatch(&self, addr: Ipv4Addr, tx: ResultSender) {
        let reporter = OutcomeReporter { addr, tx: Some(tx) };
        let prober = self.prober.clone();
        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(ECHO_TIMEOUT, prober.probe(addr)).await {
                Ok(outcome) => outcome,
                Err(_) => EchoProbeOutcome::timeout(addr),
            };
            reporter.report(outcome);
        });
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::time::Instant;

    /// Answers from a fixed table; unknown addresses time out.
    struct TableProber {
        replies: HashMap<Ipv4Addr, (u16, u8, Duration)>,
    }

    #[async_trait]
    impl EchoProber for TableProber {
        async fn probe(&self, addr: Ipv4Addr) -> EchoProbeOutcome {
            match self.replies.get(&addr) {
                Some(&(bytes, ttl, rtt)) => {
                    tokio::time::sleep(rtt).await;
                    EchoProbeOutcome::success(addr, bytes, ttl, rtt)
                }
                None => EchoProbeOutcome::timeout(addr),
            }
        }
    }

    /// Never answers.
    struct SilentProber;

    #[async_trait]
    impl EchoProber for SilentProber {
        async fn probe(&self, _addr: Ipv4Addr) -> EchoProbeOutcome {
            std::future::pending().await
        }
    }

    struct PanickingProber;

    #[async_trait]
    impl EchoProber for PanickingProber {
        async fn probe(&self, addr: Ipv4Addr) -> EchoProbeOutcome {
            panic!("probe for {addr} blew up");
        }
    }

    fn range(start: [u8; 4], end: [u8; 4]) -> Ipv4Range {
        Ipv4Range::new(Ipv4Addr::from(start), Ipv4Addr::from(end)).unwrap()
    }

    fn table(entries: &[Ipv4Addr]) -> Arc<dyn EchoProber> {
        let replies = entries
            .iter()
            .map(|addr| (*addr, (32, 64, Duration::from_millis(5))))
            .collect();
        Arc::new(TableProber { replies })
    }

    #[tokio::test(start_paused = true)]
    async fn single_address_completes() {
        let addr = Ipv4Addr::new(10, 0, 0, 1);
        let engine = EchoSweepEngine::new(table(&[addr]));

        let report = engine.sweep(&Ipv4Range::single(addr)).await;

        assert_eq!(report.outcomes.len(), 1);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.address, addr);
        assert_eq!(outcome.ttl, 64);
        assert_eq!(outcome.bytes, 32);
        assert_eq!(outcome.round_trip_ms(), 5);
        assert_eq!(
            report.progress,
            SweepProgress {
                total: 1,
                dispatched: 1,
                completed: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn only_successes_are_reported() {
        let live = Ipv4Addr::new(10, 0, 0, 2);
        let engine = EchoSweepEngine::new(table(&[live]));

        let report = engine.sweep(&range([10, 0, 0, 1], [10, 0, 0, 3])).await;

        let addrs: Vec<Ipv4Addr> = report.outcomes.iter().map(|o| o.address).collect();
        assert_eq!(addrs, vec![live]);
        assert!(report.progress.is_done());
        assert_eq!(report.progress.dispatched, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn outcomes_are_sorted_by_address() {
        let a = Ipv4Addr::new(10, 0, 0, 1);
        let b = Ipv4Addr::new(10, 0, 0, 2);
        // The lower address answers last.
        let replies = HashMap::from([
            (a, (32, 64, Duration::from_millis(500))),
            (b, (32, 64, Duration::from_millis(1))),
        ]);
        let engine = EchoSweepEngine::new(Arc::new(TableProber { replies }));

        let report = engine.sweep(&range([10, 0, 0, 1], [10, 0, 0, 2])).await;

        let addrs: Vec<Ipv4Addr> = report.outcomes.iter().map(|o| o.address).collect();
        assert_eq!(addrs, vec![a, b]);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_never_shows_more_completed_than_dispatched() {
        let seen: Arc<Mutex<Vec<SweepProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let seen = seen.clone();
            Arc::new(move |p| seen.lock().unwrap().push(p))
        };
        let live = [Ipv4Addr::new(10, 0, 0, 3), Ipv4Addr::new(10, 0, 0, 7)];
        let engine = EchoSweepEngine::new(table(&live)).with_progress(sink);

        let report = engine.sweep(&range([10, 0, 0, 1], [10, 0, 0, 10])).await;

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|p| p.completed <= p.dispatched));
        assert!(seen.windows(2).all(|w| w[0].completed <= w[1].completed));
        assert!(seen.windows(2).all(|w| w[0].dispatched <= w[1].dispatched));
        assert_eq!(report.progress.completed, 10);
        assert_eq!(report.progress.dispatched, 10);
        assert_eq!(report.progress.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_host_times_out_at_echo_timeout() {
        let engine = EchoSweepEngine::new(Arc::new(SilentProber));
        let started = Instant::now();

        let report = engine
            .sweep(&Ipv4Range::single(Ipv4Addr::new(10, 0, 0, 1)))
            .await;

        let elapsed = started.elapsed();
        assert!(report.outcomes.is_empty());
        assert!(report.progress.is_done());
        assert!(elapsed >= ECHO_TIMEOUT);
        assert!(elapsed < ECHO_TIMEOUT + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatches_are_paced_by_interval() {
        let engine = EchoSweepEngine::new(Arc::new(SilentProber))
            .with_interval(Duration::from_millis(100));
        let started = Instant::now();

        engine.sweep(&range([10, 0, 0, 1], [10, 0, 0, 3])).await;

        // Last dispatch at 200 ms, then its full timeout.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200) + ECHO_TIMEOUT);
        assert!(elapsed < Duration::from_millis(300) + ECHO_TIMEOUT);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_probe_still_completes() {
        let engine = EchoSweepEngine::new(Arc::new(PanickingProber));

        let report = engine.sweep(&range([10, 0, 0, 1], [10, 0, 0, 2])).await;

        assert!(report.outcomes.is_empty());
        assert_eq!(report.progress.completed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_returns_when_collector_dies() {
        let addr = Ipv4Addr::new(10, 0, 0, 1);
        let sink: ProgressSink = Arc::new(|p: SweepProgress| {
            if p.completed > 0 {
                panic!("progress sink failed");
            }
        });
        let engine = EchoSweepEngine::new(table(&[addr])).with_progress(sink);

        let report = engine.sweep(&Ipv4Range::single(addr)).await;

        assert_eq!(report.progress.dispatched, 1);
        assert_eq!(report.outcomes.len(), 1);
    }

    #[test]
    fn registry_rejects_duplicates_and_strangers() {
        let registry = SweepRegistry::new(2);
        let addr = Ipv4Addr::new(10, 0, 0, 1);

        assert!(registry.register(addr));
        assert!(!registry.register(addr));
        assert!(!registry.complete(Ipv4Addr::new(10, 0, 0, 9), EchoProbeOutcome::error(addr)));
        let live = EchoProbeOutcome::success(addr, 32, 64, Duration::from_millis(5));
        assert!(registry.complete(addr, live.clone()));
        assert!(!registry.complete(addr, live));
        assert!(!registry.register(addr));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.dispatched, 1);
        assert_eq!(snapshot.completed, 1);
        assert!(!snapshot.is_done());
        assert_eq!(snapshot.fraction(), 0.5);
    }

    #[test]
    fn silent_sweep_keeps_no_outcomes() {
        let range = range([10, 0, 0, 0], [10, 0, 3, 255]);
        let registry = SweepRegistry::new(range.len());
        for addr in range.iter() {
            assert!(registry.register(addr));
            assert!(registry.complete(addr, EchoProbeOutcome::timeout(addr)));
        }

        {
            let state = registry.state.lock().unwrap();
            assert!(state.live.is_empty());
            assert_eq!(state.timed_out, 1024);
        }
        assert!(registry.take_live().is_empty());
        assert_eq!(registry.snapshot().completed, 1024);
        assert!(registry.snapshot().is_done());
    }

    #[test]
    fn settled_statuses_are_tallied() {
        let registry = SweepRegistry::new(4);
        let addrs: Vec<Ipv4Addr> = (1..=4).map(|i| Ipv4Addr::new(10, 0, 0, i)).collect();
        for addr in &addrs {
            registry.register(*addr);
        }
        registry.complete(addrs[3], EchoProbeOutcome::success(addrs[3], 32, 64, Duration::ZERO));
        registry.complete(addrs[0], EchoProbeOutcome::timeout(addrs[0]));
        registry.complete(addrs[1], EchoProbeOutcome::unreachable(addrs[1]));
        registry.complete(addrs[2], EchoProbeOutcome::error(addrs[2]));

        {
            let state = registry.state.lock().unwrap();
            assert_eq!((state.timed_out, state.unreachable, state.errored), (1, 1, 1));
        }
        let live: Vec<Ipv4Addr> = registry.take_live().iter().map(|o| o.address).collect();
        assert_eq!(live, vec![addrs[3]]);
        assert_eq!(registry.snapshot().completed, 4);
    }

    #[test]
    fn pending_saturates_on_inconsistent_snapshot() {
        let progress = SweepProgress {
            total: 3,
            dispatched: 1,
            completed: 2,
        };
        assert_eq!(progress.pending(), 0);
    }
}
