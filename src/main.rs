use anyhow::{Context, Result};
use clap::Parser;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use yuletide_audio::{CpalBackend, DeviceManager};
use yuletide_core::{AppConfig, UiCommand};
use yuletide_live::{ConnectorRegistry, LiveConnector};
use yuletide_session::{SessionAdapter, SessionHandle, SessionOptions};

#[derive(Parser)]
#[command(name = "yuletide", about = "Realtime voice session client for Project YULETIDE")]
struct Cli {
    /// Path to the configuration file (built-in defaults if it does not exist)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Persona selected at startup
    #[arg(short, long)]
    persona: Option<String>,

    /// Live connector: "gemini" or "echo"
    #[arg(long)]
    connector: Option<String>,

    /// API key for the live endpoint, used when the config file has none
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the available audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_devices {
        return list_devices();
    }

    let config_exists = cli.config.exists();
    let config = load_config(&cli)?;

    // Set up TUI log buffer and layered tracing subscriber
    let log_buffer = Arc::new(Mutex::new(VecDeque::<String>::new()));
    let tui_log_layer = yuletide_tui::TuiLogLayer::new(Arc::clone(&log_buffer), 1000);

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tui_log_layer);

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    tracing::info!("yuletide starting");
    if !config_exists {
        tracing::info!("no config at {:?}, using built-in defaults", cli.config);
    }

    let registry = ConnectorRegistry::new();
    let connector: Arc<dyn LiveConnector> = Arc::from(
        registry
            .create(&config.live.connector, &config.live)
            .with_context(|| {
                format!(
                    "unknown live connector '{}' (available: {})",
                    config.live.connector,
                    registry.list_connectors().join(", ")
                )
            })?,
    );
    if connector.name() == "gemini" && config.live.api_key.trim().is_empty() {
        tracing::warn!("no API key configured; set GEMINI_API_KEY or use --connector echo");
    }
    tracing::info!(
        connector = connector.name(),
        model = %config.live.model,
        "live endpoint configured"
    );

    let backend = Arc::new(CpalBackend::new(
        &config.audio.input_device,
        &config.audio.output_device,
    ));
    tracing::info!(
        input = %config.audio.input_device,
        output = %config.audio.output_device,
        "audio devices configured"
    );

    let (handle, adapter_task) =
        SessionAdapter::spawn(connector, backend, SessionOptions::from_config(&config));

    // Set up TUI command channel; state flows straight from the adapter
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let config = Arc::new(config);
    tokio::spawn(run_controller(handle.clone(), Arc::clone(&config), cmd_rx));

    tracing::info!("TUI active, press 'q' to quit");

    // Run TUI (blocks until user quits)
    yuletide_tui::run(
        handle.subscribe(),
        config.personas.clone(),
        &config.session.default_persona,
        cmd_tx,
        log_buffer,
    )
    .await
    .context("TUI error")?;

    let last = handle.snapshot();
    tracing::info!(
        status = last.status.label(),
        transcript_lines = last.transcript.len(),
        "shutting down"
    );
    handle.shutdown();
    if tokio::time::timeout(Duration::from_secs(5), adapter_task)
        .await
        .is_err()
    {
        tracing::warn!("session adapter did not stop in time");
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = if cli.config.exists() {
        AppConfig::load_from_file(&cli.config)
            .with_context(|| format!("failed to load config from {:?}", cli.config))?
    } else {
        AppConfig::default()
    };

    if let Some(persona) = &cli.persona {
        config.session.default_persona = persona.clone();
    }
    if let Some(connector) = &cli.connector {
        config.live.connector = connector.clone();
    }
    if config.live.api_key.trim().is_empty() {
        if let Some(key) = &cli.api_key {
            config.live.api_key = key.clone();
        }
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Translate UI commands into session calls.
async fn run_controller(
    handle: SessionHandle,
    config: Arc<AppConfig>,
    mut cmd_rx: mpsc::UnboundedReceiver<UiCommand>,
) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            UiCommand::StartSession { persona_id } => {
                let Some(persona) = config.persona(&persona_id).cloned() else {
                    tracing::warn!(persona = %persona_id, "unknown persona");
                    continue;
                };
                // Start resolves only on acknowledgment; keep taking commands meanwhile
                let handle = handle.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle.start(persona).await {
                        tracing::warn!("session did not start: {}", e);
                    }
                });
            }
            UiCommand::StopSession => handle.stop().await,
            UiCommand::ClearTranscript => handle.clear_transcript(),
            UiCommand::SetMicMuted(muted) => handle.set_mic_muted(muted),
            UiCommand::Quit => break,
        }
    }
}

fn list_devices() -> Result<()> {
    let manager = DeviceManager::new();
    let inputs = manager
        .list_input_devices()
        .context("failed to list input devices")?;
    let outputs = manager
        .list_output_devices()
        .context("failed to list output devices")?;

    println!("Input devices:");
    for (name, _) in &inputs {
        println!("  {}", name);
    }
    println!("Output devices:");
    for (name, _) in &outputs {
        println!("  {}", name);
    }
    Ok(())
}
