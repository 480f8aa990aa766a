use std::sync::Arc;
use std::sync::mpsc::Receiver;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use a11y_bridge::background::{Background, BackgroundServices, MessageSender, TabRegistry};
use a11y_bridge::config::AppConfig;
use a11y_bridge::content::{PageDocument, PageRuntime, RequestTimings};
use a11y_bridge::diagnostics::{DiagnosticEntry, DiagnosticsLayer, DiagnosticsStore};
use a11y_bridge::protocol::message_type;
use a11y_bridge::settings::controllers;
use a11y_bridge::settings::models::{SettingsPatch, StorageArea, keys};
use a11y_bridge::settings::{JsonFileSettingsStore, SettingsStore};

const MAX_DIAGNOSTICS: usize = 200;

#[derive(Parser)]
#[command(version, about = "Accessibility overlay settings and backend relay")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read or change the synchronized settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Dispatch one message through the background router
    Send {
        /// The message, e.g. '{"type":"GET_SETTINGS"}'
        message: String,
        /// Url of the simulated tab the message comes from
        #[arg(long, default_value = "https://www.coupang.com/")]
        url: String,
    },
    /// Show where the configuration file lives
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    Show,
    Set { key: String, value: String },
    Reset,
}

#[derive(Subcommand)]
enum ConfigAction {
    Path,
}

/// `value` as JSON when it parses, otherwise as a plain string.
fn parse_value(value: &str) -> Value {
    serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn settings_patch(key: &str, value: &str) -> Result<SettingsPatch> {
    if !keys::ALL.contains(&key) {
        bail!("unknown settings key {key:?}, expected one of {:?}", keys::ALL);
    }
    let mut items = Map::new();
    items.insert(key.to_string(), parse_value(value));
    serde_json::from_value(Value::Object(items)).with_context(|| format!("invalid value for {key}"))
}

async fn run_settings(action: SettingsAction) -> Result<()> {
    let store = JsonFileSettingsStore::new()?;
    debug!(path = %store.storage_path(), "Using settings storage");

    match action {
        SettingsAction::Show => {
            let record = store.load_settings().await;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        SettingsAction::Set { key, value } => {
            let patch = settings_patch(&key, &value)?;
            controllers::update_settings(&store, &patch).await?;
            let stored = store.get(StorageArea::Sync, &[key.as_str()]).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        SettingsAction::Reset => {
            controllers::reset_to_defaults(&store).await?;
            println!("Settings reset to defaults");
        }
    }
    Ok(())
}

async fn run_send(config: &AppConfig, message: &str, url: String) -> Result<()> {
    let message: Value = serde_json::from_str(message).context("message is not valid JSON")?;
    let tag = message_type(&message).unwrap_or_default().to_string();
    let store: Arc<dyn SettingsStore> = Arc::new(JsonFileSettingsStore::new()?);
    let tabs = Arc::new(TabRegistry::new());
    let services = BackgroundServices::new(store.clone(), tabs.clone(), config)?;
    let background = Background::start(services).await;

    let tab_id = tabs.open_tab(url.clone());
    let tab = tabs.tab(tab_id).context("simulated tab vanished")?;
    let page = PageRuntime::new(
        PageDocument::shared(url),
        store,
        Arc::new(background.link(MessageSender::from_tab(tab.clone()))),
        background.services().assets.clone(),
        RequestTimings::from_config(config),
    );
    tabs.attach(tab_id, Arc::new(page.clone()))?;
    page.start().await;

    info!(tab_id, "Dispatching message");
    let response = background
        .router()
        .dispatch(message, MessageSender::from_tab(tab))
        .into_response(&tag)
        .await;

    match response {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(e) => println!("No response: {e}"),
    }
    for reply in page.context().replies() {
        println!("Delivered to tab {tab_id}: {reply}");
    }

    page.teardown();
    background.shutdown();
    Ok(())
}

/// The tab and product an entry concerns, e.g. ` (tab 3, product 7788)`.
fn diagnostic_scope(entry: &DiagnosticEntry) -> String {
    let mut scope = Vec::new();
    if let Some(tab_id) = entry.tab_id {
        scope.push(format!("tab {tab_id}"));
    }
    if let Some(product_id) = &entry.product_id {
        scope.push(format!("product {product_id}"));
    }
    if scope.is_empty() {
        String::new()
    } else {
        format!(" ({})", scope.join(", "))
    }
}

fn print_diagnostics(diagnostics: &DiagnosticsStore, receiver: &Receiver<DiagnosticEntry>) {
    diagnostics.drain(receiver);
    let (errors, warnings) = (diagnostics.error_count(), diagnostics.warning_count());
    if errors + warnings == 0 {
        return;
    }
    eprintln!("{errors} error(s), {warnings} warning(s):");
    for entry in diagnostics.entries() {
        eprintln!(
            "  [{:?}] {}{}: {}",
            entry.level,
            entry.target,
            diagnostic_scope(&entry),
            entry.message
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().await.context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    let (diagnostics_layer, receiver) = DiagnosticsLayer::new();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(diagnostics_layer)
        .init();

    let diagnostics = DiagnosticsStore::new(MAX_DIAGNOSTICS);

    let result = match cli.command {
        Commands::Settings { action } => run_settings(action).await,
        Commands::Send { message, url } => run_send(&config, &message, url).await,
        Commands::Config {
            action: ConfigAction::Path,
        } => {
            println!("{}", AppConfig::default_path()?.display());
            Ok(())
        }
    };

    print_diagnostics(&diagnostics, &receiver);
    result
}
