//! Counter task: owns the tally and runs the fixed reset window.

use super::config::CounterConfig;
use super::state::{CounterSignal, TallyState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    #[error("counter task has stopped")]
    Stopped,
}

/// What a single event did to the tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Counted { tally: u32 },
    Fired { count: u32 },
}

#[derive(Debug, Clone, Serialize)]
pub struct CounterSnapshot {
    pub tally: u32,
    pub threshold: u32,
    pub window_secs: u64,
    pub window_started_at: DateTime<Utc>,
}

enum CounterCommand {
    Event(oneshot::Sender<EventOutcome>),
    Trigger(oneshot::Sender<CounterSignal>),
    Snapshot(oneshot::Sender<CounterSnapshot>),
}

/// Cloneable handle to a running counter task.
#[derive(Clone)]
pub struct CounterHandle {
    tx: mpsc::Sender<CounterCommand>,
}

impl CounterHandle {
    /// Count one event. When this crosses the threshold the fire signal is
    /// already on the signal channel by the time this returns.
    pub async fn on_event(&self) -> Result<EventOutcome, CounterError> {
        self.request(CounterCommand::Event).await
    }

    /// Fire immediately with whatever has been counted so far.
    pub async fn trigger(&self) -> Result<CounterSignal, CounterError> {
        self.request(CounterCommand::Trigger).await
    }

    pub async fn snapshot(&self) -> Result<CounterSnapshot, CounterError> {
        self.request(CounterCommand::Snapshot).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> CounterCommand,
    ) -> Result<T, CounterError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| CounterError::Stopped)?;
        reply_rx.await.map_err(|_| CounterError::Stopped)
    }
}

pub struct WindowCounter {
    config: CounterConfig,
    state: TallyState,
    commands: mpsc::Receiver<CounterCommand>,
    signals: mpsc::UnboundedSender<CounterSignal>,
}

impl WindowCounter {
    /// Spawn the counter task on the current runtime.
    ///
    /// The task runs until every `CounterHandle` is dropped. Signals go out
    /// on an unbounded channel so a slow consumer never stalls counting.
    pub fn spawn(config: CounterConfig) -> (CounterHandle, mpsc::UnboundedReceiver<CounterSignal>) {
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (signals, signal_rx) = mpsc::unbounded_channel();
        let counter = Self {
            state: TallyState::new(config.threshold, Utc::now()),
            config,
            commands,
            signals,
        };
        tokio::spawn(counter.run());
        (CounterHandle { tx }, signal_rx)
    }

    async fn run(mut self) {
        // interval_at panics on a zero period.
        let window = self.config.window().max(std::time::Duration::from_secs(1));
        // First tick one full window after start, then a fixed cadence that
        // event arrival never re-arms.
        let mut ticker = interval_at(Instant::now() + window, window);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "[Counter] Started (threshold={}, window={}s)",
            self.state.threshold(),
            self.config.window_secs
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = ticker.tick() => self.on_window_elapsed(),
            }
        }

        tracing::info!("[Counter] Stopped");
    }

    fn handle(&mut self, command: CounterCommand) {
        match command {
            CounterCommand::Event(reply) => {
                let outcome = match self.state.record_event(Utc::now()) {
                    Some(signal) => {
                        let count = signal.count();
                        tracing::info!("[Counter] Threshold reached ({})", count);
                        self.emit(signal);
                        EventOutcome::Fired { count }
                    }
                    None => EventOutcome::Counted {
                        tally: self.state.tally(),
                    },
                };
                let _ = reply.send(outcome);
            }
            CounterCommand::Trigger(reply) => {
                let signal = self.state.force_fire(Utc::now());
                tracing::info!("[Counter] Manual fire ({} pending)", signal.count());
                self.emit(signal.clone());
                let _ = reply.send(signal);
            }
            CounterCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn on_window_elapsed(&mut self) {
        if let Some(signal) = self.state.expire_window(Utc::now()) {
            tracing::info!(
                "[Counter] Reset counter (received {} in last {}s)",
                signal.count(),
                self.config.window_secs
            );
            self.emit(signal);
        }
    }

    fn emit(&self, signal: CounterSignal) {
        if self.signals.send(signal).is_err() {
            tracing::debug!("[Counter] No signal consumer attached, signal dropped");
        }
    }

    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            tally: self.state.tally(),
            threshold: self.state.threshold(),
            window_secs: self.config.window_secs,
            window_started_at: self.state.window_started_at(),
        }
    }
}
