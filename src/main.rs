use clap::Parser;
use home_switchboard::actuation;
use home_switchboard::config::{self, Config, parse_device_list};
use home_switchboard::control::CommandDispatcher;
use home_switchboard::device::DeviceRegistry;
use home_switchboard::error::Result;
use home_switchboard::mqtt::{self, DisabledTelemetry, MqttTelemetry, TelemetryPublisher};
use home_switchboard::panel::console::{self, ConsoleSurface};
use home_switchboard::panel::{Panel, PanelEvent, UiNotifier};
use home_switchboard::voice::{self, VoiceController, VoiceSettings};
use log::{error, info, warn};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Time allowed for the MQTT disconnect to go out on shutdown.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);
/// Time allowed for blocking tasks when the runtime shuts down.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Switch home appliances from a terminal panel, voice commands and MQTT.
#[derive(Parser, Debug)]
#[command(name = "home-switchboard", version, about)]
struct Cli {
    /// Ordered, comma separated device names
    #[arg(long)]
    devices: Option<String>,

    /// MQTT broker host
    #[arg(long)]
    broker: Option<String>,

    /// MQTT broker port
    #[arg(long)]
    port: Option<u16>,

    /// Telemetry topic
    #[arg(long)]
    topic: Option<String>,

    /// Topic accepting "<Device> <ON|OFF>" commands
    #[arg(long)]
    command_topic: Option<String>,

    /// Run without MQTT telemetry
    #[arg(long)]
    no_mqtt: bool,

    /// Run without driving GPIO pins
    #[arg(long)]
    no_gpio: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(devices) = self.devices {
            config.devices = parse_device_list(&devices);
            config.retain_listed_pins();
        }
        if let Some(host) = self.broker {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = self.port {
            config.mqtt.broker_port = port;
        }
        if let Some(topic) = self.topic {
            config.mqtt.topic = topic;
        }
        if let Some(topic) = self.command_topic {
            config.mqtt.command_topic = Some(topic).filter(|t| !t.is_empty());
        }
        if self.no_mqtt {
            config.mqtt.enabled = false;
        }
        if self.no_gpio {
            config.gpio.enabled = false;
        }
    }
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() -> ExitCode {
    // Environment is populated before the runtime starts any threads
    config::load_dotenv();
    init_logger();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // A pending stdin read or voice capture must not hold the process open
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Telemetry backend plus the tasks that belong to its session.
struct Telemetry {
    publisher: Arc<dyn TelemetryPublisher>,
    event_loop: Option<JoinHandle<()>>,
    forwarder: Option<JoinHandle<()>>,
}

impl Telemetry {
    fn disabled() -> Self {
        Self {
            publisher: Arc::new(DisabledTelemetry),
            event_loop: None,
            forwarder: None,
        }
    }
}

async fn start_telemetry(
    config: &Config,
    panel: &mpsc::UnboundedSender<PanelEvent>,
    cancel: CancellationToken,
) -> Telemetry {
    if !config.mqtt.enabled {
        info!("[MQTT] Disabled");
        return Telemetry::disabled();
    }

    let (command_tx, command_rx) = match &config.mqtt.command_topic {
        Some(_) => {
            let (tx, rx) = mpsc::channel(32);
            (Some(tx), Some(rx))
        }
        None => (None, None),
    };

    match mqtt::connect(&config.mqtt, command_tx, cancel).await {
        Ok(session) => {
            info!(
                "Connected to MQTT broker: {}:{} (topic {})",
                config.mqtt.broker_host, config.mqtt.broker_port, config.mqtt.topic
            );
            let forwarder = command_rx.map(|rx| mqtt::spawn_forwarder(rx, panel.clone()));
            if let Some(topic) = &config.mqtt.command_topic {
                info!("  Remote commands on {}", topic);
            }
            Telemetry {
                publisher: Arc::new(MqttTelemetry::new(
                    session.client,
                    config.mqtt.topic.clone(),
                    session.connected,
                    config.mqtt.publish_timeout(),
                )),
                event_loop: Some(session.task),
                forwarder,
            }
        }
        Err(e) => {
            warn!("[MQTT] {}; continuing without telemetry", e);
            Telemetry::disabled()
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!("Starting Home Switchboard");

    let mut config = Config::from_env()?;
    cli.apply(&mut config);
    let registry = DeviceRegistry::from_config(&config)?;

    info!("Configuration loaded:");
    info!("  Devices: {}", config.devices.join(", "));
    let actuator = actuation::select_actuator(&config.gpio);
    info!("  Actuation: {}", actuator.describe());

    let cancel = CancellationToken::new();
    // The MQTT session outlives the panel so the disconnect can be sent
    let mqtt_cancel = CancellationToken::new();
    let (panel_tx, panel_rx) = mpsc::unbounded_channel();

    let telemetry = start_telemetry(&config, &panel_tx, mqtt_cancel.clone()).await;

    let dispatcher = Arc::new(CommandDispatcher::new(
        registry,
        actuator,
        telemetry.publisher,
        UiNotifier::new(Arc::new(ConsoleSurface)),
    ));

    let voice_backend = voice::select_backend(&config.voice);
    if !config.voice.is_configured() {
        info!("  Voice: disabled (no capture/recognize command)");
    }
    let voice = VoiceController::new(
        voice_backend,
        VoiceSettings::from(&config.voice),
        dispatcher.registry().names().map(String::from),
        panel_tx.clone(),
    );

    let stdin = console::spawn_stdin_reader(panel_tx.clone(), cancel.clone());
    let ctrl_c = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    cancel.cancel();
                }
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    });
    drop(panel_tx);

    info!("Home Switchboard is running");
    Panel::new(dispatcher.clone(), voice, panel_rx)
        .run(cancel.clone())
        .await;

    info!("Shutting down...");
    cancel.cancel();
    stdin.abort();
    ctrl_c.abort();
    if let Some(forwarder) = telemetry.forwarder {
        forwarder.abort();
    }

    dispatcher.shutdown().await;

    if let Some(mut event_loop) = telemetry.event_loop
        && tokio::time::timeout(DISCONNECT_GRACE, &mut event_loop)
            .await
            .is_err()
    {
        mqtt_cancel.cancel();
        let _ = event_loop.await;
    }

    info!("Home Switchboard stopped");
    Ok(())
}
