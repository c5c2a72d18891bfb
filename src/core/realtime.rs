//! Keeps a group's derived view fresh for one observer.
//!
//! Every change event for the group, whichever entity it names, leads to
//! the same single recomputation from the store. Events are only a hint:
//! lost, duplicated or reordered events are harmless because the watcher
//! also recomputes after every (re)connect and on a fixed tick.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, warn};

use crate::config::Config;
use crate::core::errors::LedgerError;
use crate::core::models::LedgerView;
use crate::core::services::LedgerService;
use crate::infrastructure::cache::Cache;
use crate::infrastructure::logging::ActivityLog;
use crate::infrastructure::notifier::{ChangeEvent, ChangeNotifier};
use crate::infrastructure::storage::Storage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Used instead of backoff while the network is known to be down.
    pub offline_interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            offline_interval: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt number `failures` (1-based).
    pub fn delay(&self, failures: u32, online: bool) -> Duration {
        if !online {
            return self.offline_interval;
        }
        let factor = 2u32.saturating_pow(failures.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    failures: u32,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        ConnectionMachine {
            state: ConnectionState::Disconnected,
            failures: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connecting(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    pub fn connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.failures = 0;
    }

    /// Moves to `Disconnected` and returns how long to wait before the next
    /// attempt.
    pub fn disconnected(&mut self, online: bool) -> Duration {
        self.state = ConnectionState::Disconnected;
        self.failures = self.failures.saturating_add(1);
        self.policy.delay(self.failures, online)
    }
}

/// Where a watcher gets its events and views from.
#[async_trait]
pub trait ViewSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
    async fn ledger_view(&self, group_id: &str) -> Result<LedgerView, LedgerError>;
}

#[async_trait]
impl<L, S, C, N> ViewSource for LedgerService<L, S, C, N>
where
    L: ActivityLog,
    S: Storage,
    C: Cache,
    N: ChangeNotifier,
{
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        LedgerService::subscribe(self)
    }

    async fn ledger_view(&self, group_id: &str) -> Result<LedgerView, LedgerError> {
        LedgerService::ledger_view(self, group_id).await
    }
}

pub struct LedgerWatcher {
    group_id: String,
    refresh_every: Duration,
    reconnect: ReconnectPolicy,
    online: watch::Receiver<bool>,
}

impl LedgerWatcher {
    pub fn new(group_id: impl Into<String>, refresh_every: Duration) -> Self {
        let (_, online) = watch::channel(true);
        LedgerWatcher {
            group_id: group_id.into(),
            refresh_every,
            reconnect: ReconnectPolicy::default(),
            online,
        }
    }

    pub fn from_config(group_id: impl Into<String>, config: &Config) -> Self {
        Self::new(group_id, Duration::from_secs(config.watch_interval_secs.max(1)))
    }

    pub fn with_reconnect_policy(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Connectivity signal choosing between backoff and the offline interval.
    pub fn with_connectivity(mut self, online: watch::Receiver<bool>) -> Self {
        self.online = online;
        self
    }

    /// Runs until every receiver of `views` is gone.
    pub async fn run<V: ViewSource + 'static>(self, source: Arc<V>, views: watch::Sender<Option<LedgerView>>) {
        let mut machine = ConnectionMachine::new(self.reconnect);
        loop {
            machine.connecting();
            let mut events = source.subscribe();
            machine.connected();
            debug!(group_id = %self.group_id, "watcher connected");
            self.refresh(source.as_ref(), &views).await;

            let mut ticker = interval(self.refresh_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = views.closed() => return,
                    _ = ticker.tick() => self.refresh(source.as_ref(), &views).await,
                    received = events.recv() => match received {
                        Ok(event) if event.group_id != self.group_id => {}
                        Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            drain(&mut events);
                            self.refresh(source.as_ref(), &views).await;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }

            let delay = machine.disconnected(*self.online.borrow());
            warn!(group_id = %self.group_id, ?delay, "change feed closed, reconnecting");
            tokio::select! {
                _ = views.closed() => return,
                _ = sleep(delay) => {}
            }
        }
    }

    async fn refresh<V: ViewSource>(&self, source: &V, views: &watch::Sender<Option<LedgerView>>) {
        match source.ledger_view(&self.group_id).await {
            Ok(view) => {
                views.send_if_modified(|current| {
                    if current.as_ref().is_some_and(|c| c.version == view.version) {
                        return false;
                    }
                    *current = Some(view);
                    true
                });
            }
            Err(e) => warn!(group_id = %self.group_id, error = %e, "recompute failed, keeping last view"),
        }
    }
}

/// Everything already queued collapses into the one recomputation about to
/// run.
fn drain(events: &mut broadcast::Receiver<ChangeEvent>) {
    loop {
        match events.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::BalanceSheet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Hands out a fresh feed per subscription and can close all of them.
    #[derive(Default)]
    struct ScriptedFeed {
        senders: Mutex<Vec<broadcast::Sender<ChangeEvent>>>,
        subscriptions: AtomicUsize,
        version: AtomicU64,
    }

    impl ScriptedFeed {
        fn close(&self) {
            self.senders.lock().unwrap().clear();
        }

        fn subscriptions(&self) -> usize {
            self.subscriptions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ViewSource for ScriptedFeed {
        fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
            let (tx, rx) = broadcast::channel(16);
            self.senders.lock().unwrap().push(tx);
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            rx
        }

        async fn ledger_view(&self, group_id: &str) -> Result<LedgerView, LedgerError> {
            Ok(LedgerView {
                group_id: group_id.to_string(),
                version: self.version.load(Ordering::SeqCst),
                sheet: BalanceSheet::default(),
                debts: Vec::new(),
                outstanding: Vec::new(),
                pending_settlements: Vec::new(),
            })
        }
    }

    const POLICY: ReconnectPolicy = ReconnectPolicy {
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(1),
        offline_interval: Duration::from_secs(5),
    };
    const SLOW_TICK: Duration = Duration::from_secs(3600);

    async fn reconnect_after_close(watcher: LedgerWatcher) -> Duration {
        let feed = Arc::new(ScriptedFeed::default());
        let (tx, mut rx) = watch::channel(None);
        let handle = tokio::spawn(watcher.run(feed.clone(), tx));

        rx.wait_for(|v| v.is_some()).await.unwrap();
        assert_eq!(feed.subscriptions(), 1);

        feed.version.store(1, Ordering::SeqCst);
        let closed_at = Instant::now();
        feed.close();
        rx.wait_for(|v| v.as_ref().is_some_and(|v| v.version == 1)).await.unwrap();
        let waited = closed_at.elapsed();
        assert_eq!(feed.subscriptions(), 2);
        assert!(waited < SLOW_TICK, "refreshed by the tick, not a reconnect");

        drop(rx);
        handle.await.unwrap();
        waited
    }

    #[tokio::test(start_paused = true)]
    async fn closed_feed_resubscribes_after_backoff() {
        let watcher = LedgerWatcher::new("g1", SLOW_TICK).with_reconnect_policy(POLICY);
        let waited = reconnect_after_close(watcher).await;
        assert!(waited >= POLICY.base_delay);
        assert!(waited < POLICY.offline_interval);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_reconnect_waits_the_offline_interval() {
        let (_online_tx, online) = watch::channel(false);
        let watcher = LedgerWatcher::new("g1", SLOW_TICK)
            .with_reconnect_policy(POLICY)
            .with_connectivity(online);
        let waited = reconnect_after_close(watcher).await;
        assert!(waited >= POLICY.offline_interval);
    }

    #[test]
    fn online_backoff_doubles_up_to_the_cap() {
        let policy = ReconnectPolicy {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(700),
            offline_interval: Duration::from_secs(5),
        };
        let delays: Vec<_> = (1..=5).map(|n| policy.delay(n, true)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(700),
                Duration::from_millis(700),
            ]
        );
        assert_eq!(policy.delay(3, false), Duration::from_secs(5));
    }

    #[test]
    fn connecting_resets_the_backoff() {
        let mut machine = ConnectionMachine::new(ReconnectPolicy::default());
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        machine.connecting();
        assert_eq!(machine.state(), ConnectionState::Connecting);
        assert_eq!(machine.disconnected(true), Duration::from_millis(500));
        assert_eq!(machine.disconnected(true), Duration::from_secs(1));
        machine.connecting();
        machine.connected();
        assert_eq!(machine.state(), ConnectionState::Connected);
        assert_eq!(machine.disconnected(true), Duration::from_millis(500));
        assert_eq!(machine.disconnected(false), Duration::from_secs(10));
    }
}
