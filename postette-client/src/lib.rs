use postette_shared::{Settings, ToastError, ToastRequest};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod cli;
pub mod config;
pub mod history;
pub mod presenter;
pub mod queue;
pub mod record;
pub mod renderer;
pub mod scheduler;

pub use cli::{Cli, Command, HistoryFormat};
pub use config::{ClientConfig, load_config, resolve_config_path};
pub use presenter::{Presenter, PresenterHandle};
pub use renderer::{Renderer, RendererKind};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("notification error: {0}")]
    Toast(#[from] ToastError),
    #[error("template error: {0}")]
    Template(String),
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

/// What `check-config` prints.
#[derive(Debug, Serialize)]
struct EffectiveConfig<'a> {
    renderer: RendererKind,
    custom_levels: &'a [String],
    compute_factor: Option<u64>,
    settings: &'a Settings,
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    init_tracing();

    let (cfg_path, cfg) = ClientConfig::find_and_load(cli.config)?;
    info!(path=?cfg_path, "loaded config");
    let (mut settings, diagnostics) = cfg.effective_settings();
    for diagnostic in &diagnostics {
        warn!(%diagnostic, "config setting ignored");
    }
    let renderer_kind = cli.renderer.unwrap_or(cfg.renderer);

    match cli.command.unwrap_or_default() {
        Command::CheckConfig => {
            let effective = EffectiveConfig {
                renderer: renderer_kind,
                custom_levels: &cfg.custom_levels,
                compute_factor: cfg.compute_factor,
                settings: &settings,
            };
            let yaml = serde_yaml::to_string(&effective)
                .map_err(|e| AppError::Config(format!("serialize config failed: {e}")))?;
            print!("{yaml}");
            if !diagnostics.is_empty() {
                return Err(AppError::Config(format!(
                    "{} setting(s) ignored; see log",
                    diagnostics.len()
                )));
            }
            Ok(())
        }
        Command::Run { history, reiterate } => {
            if reiterate {
                settings.reiterate = true;
            }
            present_stdin(&cfg, settings, renderer_kind, history).await
        }
    }
}

async fn present_stdin(
    cfg: &ClientConfig,
    settings: Settings,
    renderer_kind: RendererKind,
    history_format: Option<HistoryFormat>,
) -> Result<(), AppError> {
    let cancel = CancellationToken::new();
    let presenter = Presenter::new(renderer::from_kind(renderer_kind))
        .settings(settings)
        .cancel_token(cancel.child_token())
        .spawn();
    info!(renderer = ?renderer_kind, "presenter started");

    for level in &cfg.custom_levels {
        match presenter.register_custom_level(level.as_str()).await {
            Ok(_) => {}
            Err(ToastError::PresenterClosed) => return Err(ToastError::PresenterClosed.into()),
            Err(e) => warn!(error=%e, level = level.as_str(), "custom level skipped"),
        }
    }
    if let Some(ms) = cfg.compute_factor {
        let factor = presenter.set_compute_factor(ms).await?;
        info!(factor_ms = factor, "reading time factor set");
    }

    let drained = async {
        let accepted = feed(&presenter, BufReader::new(tokio::io::stdin())).await?;
        debug!(accepted, "input closed; waiting for notifications to finish");
        presenter.when_idle().await?;
        Ok::<_, AppError>(())
    };
    let finished = tokio::select! {
        res = drained => {
            res?;
            true
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received; dropping pending notifications");
            cancel.cancel();
            false
        }
    };

    if finished && let Some(format) = history_format {
        let records = presenter.history_snapshot().await?;
        match format {
            HistoryFormat::Table => print!("{}", history::render_table(&records)?),
            HistoryFormat::Json => {
                let json = serde_json::to_string_pretty(&history::to_dtos(&records))
                    .map_err(|e| AppError::Config(format!("serialize history failed: {e}")))?;
                println!("{json}");
            }
        }
    }
    presenter.shutdown().await;
    Ok(())
}

/// Submits one notification per non-blank line of `reader`. Lines that do
/// not parse are logged and skipped. Returns how many were accepted.
pub async fn feed<R>(presenter: &PresenterHandle, reader: R) -> Result<usize, AppError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut accepted = 0usize;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match ToastRequest::parse_line(&line) {
            Ok(request) => {
                if presenter.submit_request(request).await? {
                    accepted += 1;
                } else {
                    debug!("repeated line skipped");
                }
            }
            Err(e) => warn!(error=%e, "input line rejected"),
        }
    }
    Ok(accepted)
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::interrupt()),
            signal(SignalKind::terminate()),
        ) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => {
                        info!("shutdown: received SIGINT");
                    }
                    _ = sigterm.recv() => {
                        info!("shutdown: received SIGTERM");
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error=%e, "cannot listen for signals; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown: received Ctrl+C");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown: received Ctrl+C");
    }
}
