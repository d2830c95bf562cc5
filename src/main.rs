use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use valwatch::{AlertScheduler, Collector, CollectorSettings, Settings};
use valwatch_adapters::{Dispatcher, EmailNotifier, RpcGateway, SlackNotifier, TelegramNotifier};
use valwatch_exporter::{format_prometheus, PrometheusConfig, PrometheusExporter};

#[derive(Parser, Debug)]
#[command(name = "valwatch")]
#[command(about = "Health monitor and Prometheus exporter for a single Solana validator")]
struct Args {
    /// Path to config.toml. Without it, ., .., ~/.solana-mc/config/ and
    /// $CONFIG_PATH are searched in that order.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single collection cycle, print the metrics and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref()).context("failed to load configuration")?;

    let gateway = RpcGateway::builder()
        .validator_endpoint(&settings.rpc_and_lcd_endpoints.rpc_endpoint)
        .network_endpoint(&settings.rpc_and_lcd_endpoints.network_rpc)
        .timeout(settings.timeout()?)
        .build()?;

    let dispatcher = build_dispatcher(&settings)?;
    if dispatcher.is_empty() {
        warn!("no alert channels enabled, alerts will only be logged");
    }
    let windows = settings.alert_windows()?;
    let slots: Vec<String> = windows.iter().map(|t| t.format("%-I:%M%p").to_string()).collect();
    info!(count = windows.len(), windows = ?slots, "status alert windows");
    let scheduler = AlertScheduler::local(windows, dispatcher);
    let mut collector = Collector::new(
        Arc::new(gateway),
        CollectorSettings::from_settings(&settings)?,
        scheduler,
    );

    // Handle one-shot mode (non-serving)
    if args.once {
        let metrics = collector.collect().await;
        print!("{}", format_prometheus(&metrics));
        return Ok(());
    }

    let exporter = PrometheusExporter::new(
        PrometheusConfig::builder()
            .listen_address(&settings.prometheus.listen_address)
            .metrics_path(&settings.prometheus.metrics_path)
            .build(),
    );
    let mut server = exporter.start_server();

    let rate = settings.rate()?;
    let mut ticker = tokio::time::interval(rate);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        identity = %settings.validator_details.pub_key,
        rate = ?rate,
        "valwatch started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let metrics = collector.collect().await;
                exporter.record(metrics);
            }
            _ = &mut server => {
                bail!("metrics server on {} stopped", settings.prometheus.listen_address);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    server.abort();
    Ok(())
}

/// Build the notifier set from the `enable_alerts` toggles.
fn build_dispatcher(settings: &Settings) -> Result<Dispatcher> {
    let enabled = &settings.enable_alerts;
    let mut dispatcher = Dispatcher::new();

    if enabled.enable_telegram_alerts {
        dispatcher = dispatcher.with(TelegramNotifier::new(
            &settings.telegram.tg_bot_token,
            settings.telegram.tg_chat_id,
        )?);
    }
    if enabled.enable_email_alerts {
        let sendgrid = &settings.sendgrid;
        dispatcher = dispatcher.with(EmailNotifier::new(
            &sendgrid.sendgrid_token,
            &sendgrid.account_email,
            &sendgrid.sendgrid_account_name,
            &sendgrid.receiver_email_address,
        )?);
    }
    if enabled.enable_slack_alerts {
        dispatcher = dispatcher.with(SlackNotifier::new(&settings.slack.webhook_url)?);
    }

    info!(channels = ?dispatcher.channels(), "alert channels configured");
    Ok(dispatcher)
}
