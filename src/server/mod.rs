// Web服务器模块
//
// 接收上传文件，并通过 SSE 按分片推送写入进度

pub mod error;
pub mod handlers;
pub mod hub;
pub mod state;
pub mod storage;
pub mod tracker;

pub use error::{ApiError, ApiResponse, ApiResult};
pub use hub::{ProgressHub, ProgressPublisher};
pub use state::AppState;
pub use storage::LocalStore;
pub use tracker::ProgressTracker;

use crate::config::AppConfig;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// 构建路由
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.upload.max_body_bytes;

    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http()) // HTTP 请求日志
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    Router::new()
        .route("/upload", post(handlers::upload_file))
        .route("/delete", post(handlers::delete_file))
        .route("/files/*key", get(handlers::download_file))
        .route(
            "/progress/:strategy/:file_name",
            get(handlers::progress_stream),
        )
        .route("/health", get(handlers::health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware)
}

/// 启动服务器，直到收到 Ctrl+C
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.server.bind_addr();
    let state = AppState::new(config);
    tokio::fs::create_dir_all(state.store.root()).await?;
    let app = router(state);

    info!("服务器启动在: http://{}", addr);
    info!("上传地址: http://{}/upload", addr);
    info!("删除文件: http://{}/delete", addr);
    info!("进度订阅: http://{}/progress/{{singlepart|multipart}}/{{文件名}}", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // 🔥 使用 select! 监听关闭信号，支持优雅关闭
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始关闭...");
        }
    }

    info!("服务器已退出");
    Ok(())
}
