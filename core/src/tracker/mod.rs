//! Session tracker: wires the log tailer, the session machine and the stats cache
//! together and publishes a [`ViewModel`] after every change.

mod view;


pub use view::{PlayerView, StatsStatus, ViewModel};

use crate::context::{BackgroundTasks, TrackerConfig, TrackerError};
use crate::log_tail::{LogTailer, TailError, TailItem, TailOptions, read_existing};
use crate::session::{SessionEvent, SessionStateMachine};
use crate::stats::{CacheLookup, StatsCache, StatsProvider};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Lines buffered between the tail task and the orchestrator
const LINE_QUEUE: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// Control surface of a running tracker.
pub struct TrackerHandle {
    view: watch::Receiver<Arc<ViewModel>>,
    cache: StatsCache,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), TrackerError>>,
}

impl TrackerHandle {
    /// Latest published snapshot.
    pub fn view(&self) -> Arc<ViewModel> {
        self.view.borrow().clone()
    }

    /// Receiver notified on every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ViewModel>> {
        self.view.clone()
    }

    pub fn cache(&self) -> &StatsCache {
        &self.cache
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Resolves once the tracker has stopped, for whatever reason, without consuming the handle.
    pub async fn stopped(&self) {
        let mut view = self.view.clone();
        while view.changed().await.is_ok() {}
    }

    /// Wait for the tracker to stop, returning why it stopped if it failed.
    pub async fn wait(self) -> Result<(), TrackerError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(TrackerError::Join(e)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

enum TailMessage {
    /// The log file exists and is being tailed
    Opened,
    /// Complete lines already in the file at startup
    Replay(Vec<String>),
    Item(TailItem),
}

pub struct SessionTracker {
    machine: SessionStateMachine,
    cache: StatsCache,
    provider: Arc<dyn StatsProvider>,
    view_tx: watch::Sender<Arc<ViewModel>>,
    log_healthy: bool,
    sweep_interval: Duration,
}

impl SessionTracker {
    /// Spawn the tail task, the fetch pool and the orchestrator on the current runtime.
    pub fn start(config: TrackerConfig, provider: Arc<dyn StatsProvider>) -> TrackerHandle {
        let cancel = CancellationToken::new();
        let (cache, pool) = StatsCache::start(provider.clone(), &config.cache, cancel.clone());
        let (view_tx, view_rx) = watch::channel(Arc::new(ViewModel::default()));
        let (line_tx, line_rx) = mpsc::channel(LINE_QUEUE);

        tracing::info!(path = %config.log_path.display(), "Starting session tracker");

        let tasks = BackgroundTasks {
            log_tail: Some(tokio::spawn(run_tail(
                config.log_path.clone(),
                config.tail,
                config.replay_existing,
                line_tx,
                cancel.clone(),
            ))),
            fetch_pool: Some(pool),
        };

        let tracker = SessionTracker {
            machine: SessionStateMachine::new(config.patterns).with_nicks(config.known_nicks),
            cache: cache.clone(),
            provider,
            view_tx,
            log_healthy: false,
            sweep_interval: config.cache.sweep_interval(),
        };
        let task = tokio::spawn(tracker.run(line_rx, tasks, config.log_path, cancel.clone()));

        TrackerHandle {
            view: view_rx,
            cache,
            cancel,
            task,
        }
    }

    async fn run(
        mut self,
        mut lines: mpsc::Receiver<TailMessage>,
        mut tasks: BackgroundTasks,
        log_path: PathBuf,
        cancel: CancellationToken,
    ) -> Result<(), TrackerError> {
        let mut changes = self.cache.subscribe();
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        sweep.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                message = lines.recv() => match message {
                    Some(message) => self.handle(message),
                    // Tail task finished
                    None => break,
                },
                Ok(()) = changes.changed() => self.publish(),
                _ = sweep.tick() => self.sweep(),
            }
        }

        self.log_healthy = false;
        self.publish();

        cancel.cancel();
        drop(lines);
        let outcome = tasks.join_all().await;
        tracing::info!(ok = outcome.is_ok(), "Session tracker stopped");

        outcome.map_err(|source| TrackerError::LogUnavailable {
            path: log_path,
            source,
        })
    }

    fn handle(&mut self, message: TailMessage) {
        match message {
            TailMessage::Opened => {
                self.log_healthy = true;
                self.publish();
            }
            TailMessage::Replay(lines) => {
                for line in &lines {
                    self.machine.feed(line);
                }
                tracing::info!(
                    lines = lines.len(),
                    players = self.machine.roster().len(),
                    phase = ?self.machine.phase(),
                    "Replayed existing log"
                );
                // Building the view requests stats for the final roster
                self.publish();
            }
            TailMessage::Item(item) => {
                let events = self.machine.feed_item(&item);
                if events.is_empty() {
                    return;
                }
                for event in &events {
                    match event {
                        SessionEvent::RosterAdded(player) => {
                            tracing::debug!(player = %player.name, "Player joined session");
                            self.cache.get(self.machine.stats_key(&player.name));
                        }
                        SessionEvent::RosterRemoved(name) => {
                            tracing::debug!(player = %name, "Player left session");
                        }
                        SessionEvent::RosterReset => tracing::debug!("Roster reset"),
                        SessionEvent::NickChanged { nick, account } => {
                            tracing::debug!(nick = %nick, account = ?account, "Nick mapping changed");
                            // Whatever was cached under the nick itself no longer applies
                            self.cache.invalidate(nick);
                        }
                        SessionEvent::ApiKeyIssued(key) => self.update_api_key(key),
                        SessionEvent::PhaseChanged { .. }
                        | SessionEvent::LocalPlayerIdentified(_)
                        | SessionEvent::PartyChanged(_) => {}
                    }
                }
                self.publish();
            }
        }
    }

    fn update_api_key(&self, key: &str) {
        if !self.provider.set_api_key(key) {
            tracing::debug!("Stats provider does not use API keys");
            return;
        }
        tracing::info!("Stats provider switched to the new API key");

        // Failures of present players may have been caused by the old key
        for player in self.machine.roster().players() {
            let key = self.machine.stats_key(&player.name);
            if matches!(self.cache.peek(key), Some(CacheLookup::Failed(_))) {
                self.cache.invalidate(key);
            }
        }
    }

    fn sweep(&mut self) {
        let keep: HashSet<&str> = self
            .machine
            .roster()
            .players()
            .map(|p| self.machine.stats_key(&p.name))
            .collect();
        let evicted = self.cache.retain(|key| keep.contains(key));
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stats of departed players");
        }
        self.publish();
    }

    /// Rebuild the view and publish it if anything visible changed.
    ///
    /// Reads go through `StatsCache::get`, so expired entries of present
    /// players are refreshed here.
    fn publish(&self) {
        let cache = &self.cache;
        let mut view = ViewModel::build(
            self.machine.phase(),
            self.machine.local_player(),
            self.machine.roster(),
            self.machine.party(),
            self.machine.nicks(),
            self.log_healthy,
            |key| cache.get(key).into(),
        );

        let current = self.view_tx.borrow().clone();
        if current.same_content(&view) {
            return;
        }
        view.revision = current.revision + 1;
        self.view_tx.send_replace(Arc::new(view));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tail Task
// ─────────────────────────────────────────────────────────────────────────────

async fn run_tail(
    path: PathBuf,
    options: TailOptions,
    replay: bool,
    lines: mpsc::Sender<TailMessage>,
    cancel: CancellationToken,
) -> Result<(), TailError> {
    let encoding = options.encoding;
    let mut tailer = match LogTailer::open(&path, options, cancel).await {
        Ok(tailer) => tailer,
        Err(TailError::Closed) => return Ok(()),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Log file did not become available");
            return Err(e);
        }
    };

    if lines.send(TailMessage::Opened).await.is_err() {
        return Ok(());
    }

    if replay {
        let replay_path = path.clone();
        match tokio::task::spawn_blocking(move || read_existing(&replay_path, encoding)).await {
            Ok(Ok(existing)) => {
                tailer = tailer.starting_at(existing.position);
                if lines.send(TailMessage::Replay(existing.lines)).await.is_err() {
                    return Ok(());
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to replay log, tailing from the start");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Replay task failed, tailing from the start");
            }
        }
    }

    loop {
        let item = match tailer.next().await {
            Ok(item) => item,
            Err(TailError::Closed) => return Ok(()),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Log tailing failed");
                return Err(e);
            }
        };
        if lines.send(TailMessage::Item(item)).await.is_err() {
            tailer.close();
            return Ok(());
        }
    }
}
