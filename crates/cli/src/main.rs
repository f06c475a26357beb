mod check_command;
#[cfg(feature = "prometheus")]
mod metrics_server;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    chanmirror_channels::{Delivery, Dispatcher, RelayEngine},
    chanmirror_config::Severity,
    chanmirror_metrics::MetricsRecorderConfig,
    chanmirror_telegram::TelegramDelivery,
    clap::{Parser, Subcommand},
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "chanmirror",
    version,
    about = "Mirror Telegram channel posts into other channels"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./chanmirror.toml, then the user config dir).
    #[arg(long, global = true, env = "CHANMIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Relay posts until interrupted (default when no subcommand is given).
    Run,
    /// Validate the configuration and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
}

/// `RUST_LOG` wins over `--log-level`.
fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "chanmirror starting");

    match cli.command {
        None | Some(Commands::Run) => run(cli.config.as_deref()).await,
        Some(Commands::Check { verbose }) => check_command::check(cli.config.as_deref(), verbose),
    }
}

async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = chanmirror_config::load(config_path)?;

    let validation = chanmirror_config::validate_config(&config);
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => info!(path = %d.path, "{}", d.message),
        }
    }
    if validation.has_errors() {
        anyhow::bail!(
            "configuration has {} error(s); run `chanmirror check` for details",
            validation.count(Severity::Error)
        );
    }

    #[cfg_attr(not(feature = "prometheus"), allow(unused_variables))]
    let metrics = chanmirror_metrics::init_metrics(MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        ..Default::default()
    })?;
    #[cfg(feature = "prometheus")]
    if metrics.is_recording() {
        metrics_server::spawn(&config.metrics.listen, metrics).await?;
    }

    let bot = chanmirror_telegram::build_bot(&config.telegram)?;
    chanmirror_telegram::connect(&bot).await?;

    let delivery = Arc::new(TelegramDelivery::new(bot.clone())) as Arc<dyn Delivery>;
    let engine = Arc::new(RelayEngine::new(&config.mirror, delivery));
    info!(
        sources = ?engine.sources(),
        destinations = ?engine.destinations(),
        sync_deletions = config.mirror.sync_deletions,
        reposting_active = config.mirror.reposting_active,
        "relay engine ready"
    );

    let polling = chanmirror_telegram::start_polling(
        bot,
        config.telegram.poll_timeout_secs,
        Dispatcher::new(engine),
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("interrupt received, shutting down");
        },
        () = polling.stopped() => warn!("telegram polling ended, shutting down"),
    }

    polling.shutdown().await?;
    info!("chanmirror stopped");
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_is_the_default() {
        let cli = Cli::try_parse_from(["chanmirror"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
        assert!(!cli.json_logs);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "chanmirror",
            "check",
            "--verbose",
            "--config",
            "/etc/chanmirror.toml",
            "--json-logs",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Check { verbose: true })));
        assert_eq!(cli.config, Some(PathBuf::from("/etc/chanmirror.toml")));
        assert!(cli.json_logs);
    }

    #[tokio::test]
    async fn run_refuses_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chanmirror.toml");
        std::fs::write(&path, "[mirror]\nsource_channels = [-1001]\n").unwrap();

        let err = run(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("configuration has"));
    }
}
