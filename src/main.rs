use clap::Parser;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal;
use wildfire_alert_engine::config::{self, Config};
use wildfire_alert_engine::engine::{AlertEngine, EngineEvent, EngineHandle, EngineSettings};
use wildfire_alert_engine::error::Result;
use wildfire_alert_engine::notify::{
    AudioController, ConsoleAudio, ConsoleNotifier, NotificationDispatcher,
};
use wildfire_alert_engine::risk::{ClassifierAdapter, HttpRiskClassifier, RiskLevel};
use wildfire_alert_engine::telemetry::{
    HttpTelemetryProvider, Normalizer, SimulatedTelemetry, TelemetryFetcher, TelemetryProvider,
};

#[derive(Parser)]
#[command(name = "wildfire-alert-engine")]
#[command(about = "Polls fire-risk telemetry and raises alerts")]
struct Cli {
    /// Telemetry channel to watch (repeatable); overrides FIREWATCH_CHANNELS
    #[arg(long = "channel")]
    channels: Vec<String>,

    /// Use simulated telemetry instead of the HTTP provider
    #[arg(long)]
    simulate: bool,

    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Lowest risk level that may alert (low, moderate, high, critical)
    #[arg(long)]
    threshold: Option<RiskLevel>,

    #[arg(long)]
    cooldown_secs: Option<u64>,

    /// Consecutive high/critical reads required before alerting
    #[arg(long)]
    required_consecutive: Option<u32>,

    #[arg(long)]
    cue_duration_ms: Option<u64>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if !self.channels.is_empty() {
            config.telemetry.channels = self.channels.clone();
        }
        if let Some(v) = self.poll_interval_secs {
            config.alerting.poll_interval_secs = v;
        }
        if let Some(v) = self.threshold {
            config.alerting.risk_threshold = v;
        }
        if let Some(v) = self.cooldown_secs {
            config.alerting.cooldown_secs = v;
        }
        if let Some(v) = self.required_consecutive {
            config.alerting.required_consecutive_high = v;
        }
        if let Some(v) = self.cue_duration_ms {
            config.alerting.cue_duration_ms = v;
        }
    }
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn build_engine(config: &Config, channel: &str, simulate: bool) -> Result<AlertEngine> {
    let provider: Arc<dyn TelemetryProvider> = if simulate {
        Arc::new(SimulatedTelemetry::new(
            channel,
            config.telemetry.field_map.clone(),
        ))
    } else {
        Arc::new(HttpTelemetryProvider::new(
            &config.telemetry.base_url,
            channel,
            config.telemetry.read_api_key.clone(),
            config.fetch_timeout(),
        )?)
    };

    let classifier = Arc::new(HttpRiskClassifier::new(
        &config.classifier.base_url,
        config.classifier_timeout(),
    )?);

    let audio = Arc::new(AudioController::new(Arc::new(ConsoleAudio)));
    let dispatcher = NotificationDispatcher::new(Arc::new(ConsoleNotifier), audio);

    Ok(AlertEngine::new(
        TelemetryFetcher::new(provider).with_timeout(config.fetch_timeout()),
        ClassifierAdapter::new(classifier).with_timeout(config.classifier_timeout()),
        dispatcher,
        EngineSettings::from(&config.alerting),
    )
    .with_normalizer(Normalizer::new(config.telemetry.field_map.clone()))
    .with_invalid_sample_policy(config.alerting.invalid_sample_policy))
}

/// Log engine events until the engine's event channel closes.
fn forward_events(handle: &EngineHandle) -> tokio::task::JoinHandle<()> {
    let mut events = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(EngineEvent::Notified {
                    notification,
                    cue_started,
                }) => info!(
                    "[Host] {} alert {} delivered (cue: {})",
                    notification.level, notification.id, cue_started
                ),
                Ok(EngineEvent::PermissionDenied { device_id, level }) => warn!(
                    "[Host] {} {} alert blocked: notifications are not permitted",
                    device_id, level
                ),
                Ok(EngineEvent::FallbackUsed { device_id, cause }) => warn!(
                    "[Host] {} sensor feed unavailable ({}), using fallback",
                    device_id, cause
                ),
                Ok(EngineEvent::TickFailed {
                    device_id, kind, ..
                }) => warn!("[Host] {} poll failed ({})", device_id, kind),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[Host] dropped {} engine events", n)
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    init_logger();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    cli.apply(&mut config);

    if cli.print_config {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize configuration: {}", e),
        }
        return;
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(2);
    }

    info!("Starting wildfire alert engine");
    let telemetry_source = if cli.simulate {
        "simulated"
    } else {
        config.telemetry.base_url.as_str()
    };
    info!("  Telemetry: {}", telemetry_source);
    info!("  Classifier: {}", config.classifier.base_url);
    info!("  Channels: {}", config.telemetry.channels.join(", "));
    info!(
        "  Poll every {}s, threshold {}, cooldown {}s, {} consecutive high reads",
        config.alerting.poll_interval_secs,
        config.alerting.risk_threshold,
        config.alerting.cooldown_secs,
        config.alerting.required_consecutive_high
    );

    let mut handles = Vec::new();
    let mut forwarders = Vec::new();
    for channel in &config.telemetry.channels {
        match build_engine(&config, channel, cli.simulate) {
            Ok(engine) => {
                let handle = engine.spawn();
                forwarders.push(forward_events(&handle));
                handles.push(handle);
            }
            Err(e) => error!("Failed to start engine for channel {}: {}", channel, e),
        }
    }

    if handles.is_empty() {
        error!("No engines running");
        std::process::exit(1);
    }

    info!("Press Ctrl+C to exit");

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    for handle in handles {
        let status = handle.status();
        info!(
            "[Host] {}: {} ticks, {} alerts sent",
            status.device_id, status.ticks, status.notifications_sent
        );
        handle.shutdown().await;
    }
    for forwarder in forwarders {
        forwarder.abort();
    }

    info!("Wildfire alert engine stopped");
}
