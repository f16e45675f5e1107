//! Serialized entry point for everything that mutates partner records.
//!
//! The gateway task owns the [`RelationBook`]. Decoded chat lines, local user
//! actions and lock-timer expiries all arrive as [`GatewayCommand`]s on one
//! FIFO queue, so the state machine never sees two transitions at once and
//! messages from one partner are applied in arrival order.
//!
//! Lock timers never touch the book themselves: their expiry callback only
//! enqueues [`GatewayCommand::ReleaseLock`].

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use std::time::Duration;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use timers::{format_remaining, OnElapsed, TimerError, TimerRegistry};

use crate::{
    config::ProtocolConfig,
    directory::PartnerIndex,
    dispatcher::{Dispatcher, Transition},
    error::RelationError,
    events::{EventBus, RelationEvent},
    lean::RoleLean,
    record::{LayerLock, PartnerRecord},
    settings::HardcoreSettings,
    state_machine::RelationBook,
};

type Reply<T> = oneshot::Sender<Result<T, RelationError>>;

pub enum GatewayCommand {
    Inbound {
        payload: String,
        reply: Reply<Transition>,
    },
    Propose {
        partner: String,
        lean: RoleLean,
        reply: Reply<String>,
    },
    AcceptPending {
        partner: String,
        reply: Reply<String>,
    },
    DeclinePending {
        partner: String,
        reply: Reply<String>,
    },
    EndRelationship {
        partner: String,
        reply: Reply<String>,
    },
    LockLayer {
        partner: String,
        layer: usize,
        duration: String,
        assigner: String,
        reply: Reply<DateTime<Utc>>,
    },
    /// Sent by an expiring lock timer.
    ReleaseLock { partner: PartnerIndex, layer: usize },
    RestoreLocks { reply: Reply<usize> },
    Snapshot {
        reply: oneshot::Sender<Vec<PartnerRecord>>,
    },
    Settings {
        reply: oneshot::Sender<HardcoreSettings>,
    },
}

/// Name of the timer guarding `layer` of partner `idx`.
pub fn lock_timer_name(idx: PartnerIndex, layer: usize) -> String {
    format!("lock-{idx}-{layer}")
}

pub struct RelationGateway {
    commands: mpsc::UnboundedSender<GatewayCommand>,
    cancel: CancellationToken,
    registry: TimerRegistry,
    task: JoinHandle<()>,
}

impl RelationGateway {
    /// Start the gateway task. Must be called from within a tokio runtime.
    pub fn spawn(
        local_name: &str,
        book: RelationBook,
        registry: TimerRegistry,
        bus: EventBus,
        config: &ProtocolConfig,
        mut settings: HardcoreSettings,
    ) -> Self {
        settings.ensure_len(book.len());

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = GatewayWorker {
            book,
            dispatcher: Dispatcher::new(config, local_name, bus),
            registry: registry.clone(),
            settings,
            commands: commands.clone(),
            tick_interval_ms: config.tick_interval_ms,
            tag: config.tag.clone(),
        };
        let task = tokio::spawn(worker.run(commands_rx, cancel.clone()));

        Self {
            commands,
            cancel,
            registry,
            task,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> GatewayCommand,
    ) -> Result<T, RelationError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| RelationError::GatewayClosed)?;
        response.await.map_err(|_| RelationError::GatewayClosed)
    }

    /// Feed one received chat line through decode and dispatch.
    pub async fn submit(&self, payload: impl Into<String>) -> Result<Transition, RelationError> {
        let payload = payload.into();
        self.request(|reply| GatewayCommand::Inbound { payload, reply })
            .await?
    }

    pub async fn propose(&self, partner: &str, lean: RoleLean) -> Result<String, RelationError> {
        let partner = partner.to_string();
        self.request(|reply| GatewayCommand::Propose {
            partner,
            lean,
            reply,
        })
        .await?
    }

    pub async fn accept_pending(&self, partner: &str) -> Result<String, RelationError> {
        let partner = partner.to_string();
        self.request(|reply| GatewayCommand::AcceptPending { partner, reply })
            .await?
    }

    pub async fn decline_pending(&self, partner: &str) -> Result<String, RelationError> {
        let partner = partner.to_string();
        self.request(|reply| GatewayCommand::DeclinePending { partner, reply })
            .await?
    }

    pub async fn end_relationship(&self, partner: &str) -> Result<String, RelationError> {
        let partner = partner.to_string();
        self.request(|reply| GatewayCommand::EndRelationship { partner, reply })
            .await?
    }

    /// Lock `layer` of `partner` for `duration` (e.g. `"1h30m"`). Returns the end time.
    pub async fn lock_layer(
        &self,
        partner: &str,
        layer: usize,
        duration: &str,
        assigner: &str,
    ) -> Result<DateTime<Utc>, RelationError> {
        let partner = partner.to_string();
        let duration = duration.to_string();
        let assigner = assigner.to_string();
        self.request(|reply| GatewayCommand::LockLayer {
            partner,
            layer,
            duration,
            assigner,
            reply,
        })
        .await?
    }

    /// Resume lock timers from persisted end times still in the future.
    /// Returns how many locks were restored.
    pub async fn restore_locks(&self) -> Result<usize, RelationError> {
        self.request(|reply| GatewayCommand::RestoreLocks { reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<Vec<PartnerRecord>, RelationError> {
        self.request(|reply| GatewayCommand::Snapshot { reply })
            .await
    }

    /// Current settings, including lock end times, ready to be saved.
    pub async fn settings(&self) -> Result<HardcoreSettings, RelationError> {
        self.request(|reply| GatewayCommand::Settings { reply })
            .await
    }

    pub fn lock_remaining(&self, partner: PartnerIndex, layer: usize) -> Option<Duration> {
        self.registry.remaining(&lock_timer_name(partner, layer))
    }

    pub fn registry(&self) -> &TimerRegistry {
        &self.registry
    }

    /// Stop the gateway task and every live timer.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.registry.dispose();
        if let Err(e) = self.task.await {
            error!("[RelationGateway] Gateway task failed: {e}");
        }
    }
}

struct GatewayWorker {
    book: RelationBook,
    dispatcher: Dispatcher,
    registry: TimerRegistry,
    settings: HardcoreSettings,
    commands: mpsc::UnboundedSender<GatewayCommand>,
    tick_interval_ms: u64,
    tag: String,
}

impl GatewayWorker {
    async fn run(
        mut self,
        mut commands_rx: mpsc::UnboundedReceiver<GatewayCommand>,
        cancel: CancellationToken,
    ) {
        info!("[RelationGateway] Started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                maybe = commands_rx.recv() => {
                    match maybe {
                        Some(command) => self.handle(command).await,
                        None => break,
                    }
                }
            }
        }
        info!("[RelationGateway] Stopped");
    }

    async fn handle(&mut self, command: GatewayCommand) {
        // A dropped receiver only means the caller stopped waiting.
        match command {
            GatewayCommand::Inbound { payload, reply } => {
                let result = self
                    .dispatcher
                    .handle_payload(&mut self.book, &payload)
                    .await;
                let _ = reply.send(result);
            }
            GatewayCommand::Propose {
                partner,
                lean,
                reply,
            } => {
                let result = self.dispatcher.propose(&mut self.book, &partner, lean).await;
                let _ = reply.send(result);
            }
            GatewayCommand::AcceptPending { partner, reply } => {
                let result = self.dispatcher.accept_pending(&mut self.book, &partner).await;
                let _ = reply.send(result);
            }
            GatewayCommand::DeclinePending { partner, reply } => {
                let result = self
                    .dispatcher
                    .decline_pending(&mut self.book, &partner)
                    .await;
                let _ = reply.send(result);
            }
            GatewayCommand::EndRelationship { partner, reply } => {
                let result = self
                    .dispatcher
                    .end_relationship(&mut self.book, &partner)
                    .await;
                let _ = reply.send(result);
            }
            GatewayCommand::LockLayer {
                partner,
                layer,
                duration,
                assigner,
                reply,
            } => {
                let result = self.lock_layer(&partner, layer, &duration, assigner).await;
                let _ = reply.send(result);
            }
            GatewayCommand::ReleaseLock { partner, layer } => {
                self.release_lock(partner, layer).await;
            }
            GatewayCommand::RestoreLocks { reply } => {
                let result = self.restore_locks().await;
                let _ = reply.send(result);
            }
            GatewayCommand::Snapshot { reply } => {
                let _ = reply.send(self.book.records().to_vec());
            }
            GatewayCommand::Settings { reply } => {
                let _ = reply.send(self.settings.clone());
            }
        }
    }

    fn release_callback(&self, partner: PartnerIndex, layer: usize) -> OnElapsed {
        let commands = self.commands.clone();
        Box::new(move || {
            if commands
                .send(GatewayCommand::ReleaseLock { partner, layer })
                .is_err()
            {
                debug!("[RelationGateway] Lock {partner}/{layer} expired after shutdown");
            }
        })
    }

    async fn lock_layer(
        &mut self,
        partner: &str,
        layer: usize,
        duration: &str,
        assigner: String,
    ) -> Result<DateTime<Utc>, RelationError> {
        let idx = self.book.require(partner)?;
        self.book.check_layer_free(idx, layer)?;

        let slot = self
            .settings
            .partner(idx)
            .map(|config| config.backing_slot(layer));
        let end_time = self.registry.start_timer(
            &lock_timer_name(idx, layer),
            duration,
            self.tick_interval_ms,
            self.release_callback(idx, layer),
            slot,
        )?;
        self.book.engage_lock(
            idx,
            layer,
            LayerLock {
                assigner: assigner.clone(),
                end_time,
            },
        )?;

        let name = partner.trim().to_string();
        info!("[lock_layer] {assigner} locked layer {layer} of {name} until {end_time}");
        self.announce_lock(name, layer, end_time).await;
        Ok(end_time)
    }

    async fn release_lock(&mut self, idx: PartnerIndex, layer: usize) {
        if let Some(config) = self.settings.partner(idx) {
            config.clear_lock(layer);
        }
        if !self.book.release_lock(idx, layer) {
            debug!("[release_lock] Layer {layer} of #{idx} was not locked");
            return;
        }

        let name = self
            .book
            .record(idx)
            .map(|record| record.name.clone())
            .unwrap_or_default();
        info!("[release_lock] Layer {layer} of {name} unlocked");
        let bus = self.dispatcher.bus();
        bus.notify(&format!(
            "{} The lock on layer {layer} from {name} has expired.",
            self.tag
        ))
        .await;
        bus.publish(&RelationEvent::LockReleased {
            partner: name,
            layer,
        })
        .await;
    }

    async fn restore_locks(&mut self) -> Result<usize, RelationError> {
        let now = Utc::now();
        let mut restored = 0;

        for idx in 0..self.book.len() {
            let Some(config) = self.settings.partner(idx) else {
                continue;
            };
            let stored = config.stored_locks();
            for (layer, end_time) in stored {
                if end_time <= now {
                    debug!("[restore_locks] Lock {idx}/{layer} ended while offline");
                    config.clear_lock(layer);
                    continue;
                }
                if self.book.check_layer_free(idx, layer).is_err() {
                    continue;
                }

                match self.registry.resume_timer(
                    &lock_timer_name(idx, layer),
                    end_time,
                    self.tick_interval_ms,
                    self.release_callback(idx, layer),
                ) {
                    Ok(()) => {}
                    Err(TimerError::DuplicateName(name)) => {
                        debug!("[restore_locks] Timer {name} already running");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }

                let name = self
                    .book
                    .record(idx)
                    .map(|record| record.name.clone())
                    .unwrap_or_default();
                self.book.engage_lock(
                    idx,
                    layer,
                    LayerLock {
                        assigner: name.clone(),
                        end_time,
                    },
                )?;
                self.announce_lock(name, layer, end_time).await;
                restored += 1;
            }
        }

        info!("[restore_locks] Restored {restored} lock(s)");
        Ok(restored)
    }

    async fn announce_lock(&self, name: String, layer: usize, end_time: DateTime<Utc>) {
        let remaining = (end_time - Utc::now()).to_std().unwrap_or_default();
        let bus = self.dispatcher.bus();
        bus.notify(&format!(
            "{} Layer {layer} for {name} is locked for {} (until {}).",
            self.tag,
            format_remaining(remaining),
            end_time.format("%Y-%m-%d %H:%M:%S UTC")
        ))
        .await;
        bus.publish(&RelationEvent::LockEngaged {
            partner: name,
            layer,
            end_time,
        })
        .await;
    }
}
