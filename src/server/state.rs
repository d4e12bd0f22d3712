// 应用状态

use crate::config::AppConfig;
use crate::server::hub::ProgressHub;
use crate::server::storage::LocalStore;
use std::sync::Arc;

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// 进度推送中心
    pub hub: Arc<ProgressHub>,
    /// 上传文件存储
    pub store: Arc<LocalStore>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: AppConfig) -> Self {
        let store = LocalStore::new(
            config.upload.upload_dir.clone(),
            config.upload.part_concurrency,
            config.upload.progress_step_percent,
        );

        Self {
            config: Arc::new(config),
            hub: Arc::new(ProgressHub::new()),
            store: Arc::new(store),
        }
    }
}
