use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use log::{debug, info, warn};
use std::sync::Arc;

use rolebond::{
    cli::{parse_line, Args, ReplayLine},
    settings::HardcoreSettings,
    EventBus, MessageCodec, NotificationLog, ProtocolConfig, RelationBook, RelationEvent,
    RelationEventHandler, RelationGateway, Whitelist,
};
use timers::{format_remaining, TimerEvent, TimerRegistry};

struct ConsoleNotifier;

#[async_trait]
impl RelationEventHandler for ConsoleNotifier {
    async fn on_notification(&self, text: &str) {
        println!("{text}");
    }

    async fn on_relation_changed(&self, event: &RelationEvent) {
        info!("[replay] {event:?}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ProtocolConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ProtocolConfig::from_env(),
    };
    let settings = args
        .settings
        .as_ref()
        .map(HardcoreSettings::load)
        .unwrap_or_default();
    let book = RelationBook::new(Whitelist::from_names(&args.partners)?);
    let log_text = std::fs::read_to_string(&args.log)
        .with_context(|| format!("Failed to read chat log {}", args.log.display()))?;

    let history = Arc::new(NotificationLog::new(config.notification_history));
    let mut bus = EventBus::new();
    bus.subscribe(Arc::new(ConsoleNotifier));
    bus.subscribe(history.clone());

    let registry = TimerRegistry::new();
    let mut timer_events = registry.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = timer_events.recv().await {
            match event {
                TimerEvent::Tick { name, remaining } => {
                    debug!("[replay] {name}: {} left", format_remaining(remaining));
                }
                TimerEvent::Elapsed { name } => info!("[replay] {name} elapsed"),
            }
        }
    });

    let codec = MessageCodec::new(&config);
    let gateway = RelationGateway::spawn(
        &args.name,
        book,
        registry,
        bus,
        &config,
        settings,
    );
    let restored = gateway.restore_locks().await?;
    info!("[replay] Restored {restored} lock(s)");

    for (number, line) in log_text.lines().enumerate() {
        let replay = match parse_line(line, &codec) {
            Ok(replay) => replay,
            Err(e) => {
                warn!("[replay] line {}: {e}", number + 1);
                continue;
            }
        };
        let outbound = match replay {
            ReplayLine::Chat => continue,
            ReplayLine::Inbound(payload) => gateway.submit(payload).await.map(|_| None),
            ReplayLine::Propose { partner, lean } => gateway.propose(&partner, lean).await.map(Some),
            ReplayLine::Accept(partner) => gateway.accept_pending(&partner).await.map(Some),
            ReplayLine::Decline(partner) => gateway.decline_pending(&partner).await.map(Some),
            ReplayLine::End(partner) => gateway.end_relationship(&partner).await.map(Some),
            ReplayLine::Lock {
                partner,
                layer,
                duration,
            } => gateway
                .lock_layer(&partner, layer, &duration, &partner)
                .await
                .map(|_| None),
        };
        match outbound {
            Ok(Some(line)) => println!("> {line}"),
            Ok(None) => {}
            Err(e) => warn!("[replay] line {}: {e}", number + 1),
        }
    }

    let records = gateway.snapshot().await?;
    println!("{}", serde_json::to_string_pretty(&records)?);

    if let Some(path) = &args.settings {
        let settings = gateway.settings().await?;
        settings
            .save(path)
            .with_context(|| format!("Failed to save settings {}", path.display()))?;
    }

    gateway.shutdown().await;
    info!(
        "[replay] Done, {} notification(s) in history",
        history.lines().len()
    );
    Ok(())
}
