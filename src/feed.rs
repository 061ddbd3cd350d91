use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::AppConfig;
use crate::state::{Delta, DetailTicket, Match, ProviderCommand, Side, TeamStats};

const MANUAL_REFRESH_MIN_GAP: Duration = Duration::from_secs(2);

/// Where the board gets its data from.
pub trait MatchSource: Send + Sync {
    fn fetch_matches(&self) -> Result<Vec<Match>>;
    fn fetch_team_stats(&self, team_id: &str) -> Result<TeamStats>;
}

#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub refresh_every: Duration,
    /// Upper bound on how long the loop waits before re-checking the stop flag.
    pub tick: Duration,
    pub stats_parallelism: usize,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            refresh_every: Duration::from_secs(60),
            tick: Duration::from_millis(250),
            stats_parallelism: 4,
        }
    }
}

impl ProviderOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            refresh_every: config.poll_interval,
            stats_parallelism: config.stats_parallelism,
            ..Self::default()
        }
    }
}

/// Closed once by `ProviderHandle::stop`. Deltas go out under the read lock,
/// so after `close` returns nothing more is sent.
#[derive(Clone, Default)]
struct StopGate(Arc<RwLock<bool>>);

impl StopGate {
    fn is_closed(&self) -> bool {
        self.0.read().map(|closed| *closed).unwrap_or(true)
    }

    fn close(&self) {
        match self.0.write() {
            Ok(mut closed) => *closed = true,
            Err(poisoned) => *poisoned.into_inner() = true,
        }
    }

    fn send(&self, tx: &Sender<Delta>, delta: Delta) -> bool {
        match self.0.read() {
            Ok(closed) if !*closed => tx.send(delta).is_ok(),
            _ => false,
        }
    }
}

/// Owns the refresh timer. Stopping (or dropping) the handle cancels the
/// timer and joins the provider thread; in-flight stats jobs finish but their
/// results are not delivered.
pub struct ProviderHandle {
    cmd_tx: Option<Sender<ProviderCommand>>,
    gate: StopGate,
    thread: Option<JoinHandle<()>>,
}

impl ProviderHandle {
    pub fn send(&self, cmd: ProviderCommand) -> bool {
        match &self.cmd_tx {
            Some(tx) => tx.send(cmd).is_ok(),
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn stop(&mut self) {
        self.gate.close();
        self.cmd_tx = None;
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("provider thread panicked");
        }
    }
}

impl Drop for ProviderHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub fn spawn_provider<S>(source: Arc<S>, options: ProviderOptions, tx: Sender<Delta>) -> ProviderHandle
where
    S: MatchSource + ?Sized + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let gate = StopGate::default();
    let worker_gate = gate.clone();

    let thread = thread::spawn(move || {
        let pool = build_stats_pool(options.stats_parallelism);
        tracing::info!(
            every_secs = options.refresh_every.as_secs_f64(),
            "provider started"
        );

        refresh_matches(source.as_ref(), &tx, &worker_gate);
        let mut last_refresh = Instant::now();

        loop {
            if worker_gate.is_closed() {
                break;
            }
            let wait = options
                .refresh_every
                .saturating_sub(last_refresh.elapsed())
                .min(options.tick);

            match cmd_rx.recv_timeout(wait) {
                Ok(ProviderCommand::RefreshNow) => {
                    if last_refresh.elapsed() < MANUAL_REFRESH_MIN_GAP {
                        worker_gate.send(
                            &tx,
                            Delta::Log(format!(
                                "[INFO] Refresh throttled ({}s)",
                                MANUAL_REFRESH_MIN_GAP.as_secs()
                            )),
                        );
                    } else {
                        refresh_matches(source.as_ref(), &tx, &worker_gate);
                        last_refresh = Instant::now();
                    }
                }
                Ok(ProviderCommand::FetchTeamStats {
                    ticket,
                    side,
                    team_id,
                }) => {
                    let source = source.clone();
                    let tx = tx.clone();
                    let worker_gate = worker_gate.clone();
                    let job = move || {
                        fetch_stats_job(source.as_ref(), &tx, &worker_gate, ticket, side, &team_id)
                    };
                    if let Some(pool) = pool.as_ref() {
                        pool.spawn(job);
                    } else {
                        thread::spawn(job);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            // Ticks that fell due while a refresh was running collapse into this one.
            if !worker_gate.is_closed() && last_refresh.elapsed() >= options.refresh_every {
                refresh_matches(source.as_ref(), &tx, &worker_gate);
                last_refresh = Instant::now();
            }
        }
        tracing::info!("provider stopped");
    });

    ProviderHandle {
        cmd_tx: Some(cmd_tx),
        gate,
        thread: Some(thread),
    }
}

fn refresh_matches<S>(source: &S, tx: &Sender<Delta>, gate: &StopGate)
where
    S: MatchSource + ?Sized,
{
    let started = Instant::now();
    let result = source.fetch_matches();
    match result {
        Ok(matches) => {
            tracing::info!(
                count = matches.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "matches refreshed"
            );
            gate.send(tx, Delta::SetMatches(matches));
        }
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "matches refresh failed");
            gate.send(tx, Delta::FetchFailed(format!("{err:#}")));
        }
    }
}

fn fetch_stats_job<S>(
    source: &S,
    tx: &Sender<Delta>,
    gate: &StopGate,
    ticket: DetailTicket,
    side: Side,
    team_id: &str,
) where
    S: MatchSource + ?Sized,
{
    let result = source
        .fetch_team_stats(team_id)
        .map_err(|err| format!("{err:#}"));
    gate.send(
        tx,
        Delta::SetTeamStats {
            ticket,
            side,
            result,
        },
    );
}

fn build_stats_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(1, 16))
        .thread_name(|idx| format!("scoutlay-stats-{idx}"))
        .build()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_gate_sends_nothing() {
        let (tx, rx) = mpsc::channel();
        let gate = StopGate::default();
        assert!(gate.send(&tx, Delta::Log("before".to_string())));
        gate.clone().close();
        assert!(gate.is_closed());
        assert!(!gate.send(&tx, Delta::Log("after".to_string())));
        let got: Vec<Delta> = rx.try_iter().collect();
        assert!(matches!(got.as_slice(), [Delta::Log(line)] if line == "before"));
    }
}
