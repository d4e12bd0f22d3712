use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use upload_progress::{
    config::DEFAULT_CONFIG_PATH, logging, server, AppConfig, ConsoleRenderer, HttpUploadTransport,
    SessionState, SseProgressSource, UploadCandidate, UploadError, UploadOrchestrator,
};

#[derive(Parser)]
#[command(name = "upload-progress")]
#[command(version, about = "Upload files and follow per-part progress over SSE")]
struct Cli {
    /// 配置文件路径
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the progress server
    Serve,
    /// Upload one file and render its progress
    Upload {
        /// File to upload
        file: Option<PathBuf>,
        /// Progress server address (overrides the config file)
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config).await;

    let _log_guard = logging::init_logging(&config.log);
    info!("Upload Progress v{} 启动中...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve => {
            server::serve(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Upload { file, server } => {
            let server_url = server.unwrap_or_else(|| config.client.server_url.clone());
            run_upload(&config, server_url, file).await
        }
    }
}

/// 上传单个文件，退出码反映会话终态
async fn run_upload(
    config: &AppConfig,
    server_url: String,
    file: Option<PathBuf>,
) -> anyhow::Result<ExitCode> {
    let candidate = match file {
        Some(path) => Some(UploadCandidate::from_path(&path).await?),
        None => None,
    };

    let mut orchestrator = UploadOrchestrator::new(
        HttpUploadTransport::new(server_url.clone()),
        SseProgressSource::new(server_url),
        ConsoleRenderer::new(std::io::stdout()),
    )
    .with_rejected_display(config.client.rejected_display());

    if let Err(e) = orchestrator.select(candidate) {
        if matches!(e, UploadError::NoFileSelected) {
            eprintln!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
        return Err(e.into());
    }

    let state = tokio::select! {
        state = orchestrator.settle() => state,
        _ = tokio::signal::ctrl_c() => {
            warn!("收到 Ctrl+C，放弃上传");
            SessionState::Errored
        }
    };

    info!("上传会话结束: {:?}", state);
    Ok(match state {
        SessionState::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
