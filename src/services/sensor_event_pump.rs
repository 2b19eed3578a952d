//! Supervising loop that turns the gateway event feed into [`SensorEvent`]s
//!
//! The pump owns an [`EventSource`] and runs it on a background task. Dial
//! failures and lost connections are retried after the reconnection delay.
//! Events that fail to decode or resolve are logged and skipped without
//! touching the connection. Everything else is joined with its sensor and
//! sent on the output channel, blocking while the channel is full.
//!
//! The task holds the only sender of the output channel, so the receiver sees
//! the channel close once the pump has stopped.

use crate::error::{DefluxError, ErrorReporter, Result};
use crate::events::{DecodedEvent, EventSource};
use crate::sensors::SensorLookup;
use crate::services::SensorEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

const COMPONENT: &str = "sensor_event_pump";

/// Redial policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectionConfig {
    /// Delay before the first redial
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for the delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor per consecutive failure, 1.0 keeps the delay fixed
    pub backoff_multiplier: f64,

    /// Random extra delay as a fraction of the computed delay
    pub jitter_factor: f64,
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }
}

impl ReconnectionConfig {
    /// Fixed delay between every attempt
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            ..Self::default()
        }
    }

    /// Delay before redial attempt `attempt` (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let base = self.initial_delay.as_secs_f64() * self.backoff_multiplier.max(1.0).powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64()).max(0.0);

        let jitter_factor = self.jitter_factor.clamp(0.0, 1.0);
        let jitter = if jitter_factor > 0.0 {
            capped * jitter_factor * rand::random::<f64>()
        } else {
            0.0
        };

        Duration::try_from_secs_f64(capped + jitter).unwrap_or(self.max_delay)
    }
}

/// Counters describing what the pump has done so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpStats {
    pub events_published: u64,
    pub events_dropped: u64,
    pub dial_failures: u64,
    pub connections_established: u64,
    pub connection_losses: u64,
    pub last_event: Option<chrono::DateTime<chrono::Utc>>,
}

/// Background pump from an event source to an output channel
pub struct SensorEventPump {
    sensors: Option<Arc<dyn SensorLookup>>,
    source: Option<Box<dyn EventSource>>,
    reconnection: ReconnectionConfig,
    stats: Arc<RwLock<PumpStats>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Box<dyn EventSource>>>,
}

impl SensorEventPump {
    /// Create an unconfigured pump
    pub fn new(reconnection: ReconnectionConfig) -> Self {
        Self {
            sensors: None,
            source: None,
            reconnection,
            stats: Arc::new(RwLock::new(PumpStats::default())),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn with_sensor_lookup(mut self, sensors: Arc<dyn SensorLookup>) -> Self {
        self.sensors = Some(sensors);
        self
    }

    pub fn with_event_source(mut self, source: Box<dyn EventSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn reconnection(&self) -> &ReconnectionConfig {
        &self.reconnection
    }

    /// Start pumping events into `out`. Returns as soon as the task is spawned.
    pub fn start(&mut self, out: mpsc::Sender<SensorEvent>) -> Result<()> {
        if self.task.is_some() {
            return Err(DefluxError::AlreadyRunning);
        }
        let sensors = self
            .sensors
            .clone()
            .ok_or_else(|| DefluxError::not_configured("sensor lookup"))?;
        let source = self
            .source
            .take()
            .ok_or_else(|| DefluxError::not_configured("event source"))?;

        self.cancel = CancellationToken::new();
        let worker = PumpWorker {
            source,
            ctx: PumpContext {
                sensors,
                out,
                reconnection: self.reconnection.clone(),
                stats: self.stats.clone(),
                cancel: self.cancel.clone(),
            },
        };

        info!("Starting sensor event pump");
        self.task = Some(tokio::spawn(
            worker.run().instrument(info_span!("sensor_event_pump")),
        ));
        Ok(())
    }

    /// Ask the pump to stop.
    ///
    /// Backoff waits and blocked sends end immediately. A read that is
    /// already waiting for a frame is allowed to finish first.
    pub fn stop(&self) {
        debug!("Stop requested");
        self.cancel.cancel();
    }

    /// Stop the pump and wait for its task to finish.
    ///
    /// The event source is returned to the pump so it can be started again.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.stop();
        if let Some(task) = self.task.take() {
            let source = task
                .await
                .map_err(|e| DefluxError::Generic(anyhow::anyhow!("pump task failed: {e}")))?;
            self.source = Some(source);
            info!("Sensor event pump stopped");
        }
        Ok(())
    }

    /// Whether the background task is alive
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn stats(&self) -> PumpStats {
        self.stats.read().await.clone()
    }
}

impl Drop for SensorEventPump {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns the event source for the lifetime of the task
struct PumpWorker {
    source: Box<dyn EventSource>,
    ctx: PumpContext,
}

/// Everything the loop shares across awaits besides the source
struct PumpContext {
    sensors: Arc<dyn SensorLookup>,
    out: mpsc::Sender<SensorEvent>,
    reconnection: ReconnectionConfig,
    stats: Arc<RwLock<PumpStats>>,
    cancel: CancellationToken,
}

impl PumpWorker {
    async fn run(mut self) -> Box<dyn EventSource> {
        let ctx = &self.ctx;
        let source = &mut self.source;
        let mut attempt: u32 = 0;

        'redial: while !ctx.cancel.is_cancelled() {
            if let Err(e) = source.connect().await {
                ErrorReporter::log_error(&e, COMPONENT, "connect");
                ctx.stats.write().await.dial_failures += 1;
                attempt = attempt.saturating_add(1);
                if !ctx.wait_before_redial(attempt).await {
                    break;
                }
                continue;
            }

            attempt = 0;
            ctx.stats.write().await.connections_established += 1;

            while !ctx.cancel.is_cancelled() {
                match source.read_next().await {
                    Ok(event) => {
                        if !ctx.publish(event).await {
                            break 'redial;
                        }
                    }
                    Err(e) if e.is_recoverable() => {
                        ErrorReporter::log_error(&e, COMPONENT, "read_next");
                        ctx.stats.write().await.events_dropped += 1;
                    }
                    Err(e) => {
                        ErrorReporter::log_error(&e, COMPONENT, "read_next");
                        ctx.stats.write().await.connection_losses += 1;
                        source.close().await;
                        attempt = attempt.saturating_add(1);
                        if !ctx.wait_before_redial(attempt).await {
                            break 'redial;
                        }
                        continue 'redial;
                    }
                }
            }
        }

        source.close().await;
        debug!("Sensor event pump loop finished");
        self.source
    }
}

impl PumpContext {
    /// Sleep until the next redial. Returns false when stopped meanwhile.
    async fn wait_before_redial(&self, attempt: u32) -> bool {
        let delay = self.reconnection.delay_for_attempt(attempt);
        info!(attempt, delay = ?delay, "Redialing event feed after delay");

        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Join the event with its sensor and send it. Returns false when the
    /// pump should stop.
    async fn publish(&self, event: DecodedEvent) -> bool {
        let sensor_id = event.sensor_id();
        let sensor = match self.sensors.lookup_sensor(sensor_id).await {
            Ok(sensor) => sensor,
            Err(e) => {
                let e = DefluxError::LookupFailed {
                    sensor_id,
                    source: Box::new(e),
                };
                ErrorReporter::log_error(&e, COMPONENT, "lookup_sensor");
                self.stats.write().await.events_dropped += 1;
                return true;
            }
        };

        let event = SensorEvent::new(event, sensor);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.out.send(event) => match sent {
                Ok(()) => {
                    let mut stats = self.stats.write().await;
                    stats.events_published += 1;
                    stats.last_event = Some(chrono::Utc::now());
                    true
                }
                Err(_) => {
                    warn!(sensor_id, "Output channel closed, stopping pump");
                    false
                }
            },
        }
    }
}
