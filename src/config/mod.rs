// 配置管理模块

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{info, warn};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 服务端上传配置
    #[serde(default)]
    pub upload: UploadConfig,
    /// 客户端配置
    #[serde(default)]
    pub client: ClientConfig,
    /// 🔥 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 保留的日志文件数（按天滚动，默认 7 个）
    #[serde(default = "default_log_max_files")]
    pub max_files: usize,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_max_files() -> usize {
    7
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            level: default_log_level(),
            max_files: default_log_max_files(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    18888
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 监听地址（host:port）
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 服务端上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 上传文件存储目录
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// 分片并发写入数
    #[serde(default = "default_part_concurrency")]
    pub part_concurrency: usize,
    /// 进度推送步长（百分比）
    #[serde(default = "default_progress_step_percent")]
    pub progress_step_percent: f64,
    /// 上传结束后进度推送流继续保持的时间（秒），上传进行中不计时
    #[serde(default = "default_emitter_timeout_secs")]
    pub emitter_timeout_secs: u64,
    /// 请求体大小上限（字节）
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_part_concurrency() -> usize {
    4
}

fn default_progress_step_percent() -> f64 {
    5.0
}

fn default_emitter_timeout_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    // 50MB 文件 + 1MB 表单开销，超限文件仍能到达处理器并得到明确的拒绝
    51 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            part_concurrency: default_part_concurrency(),
            progress_step_percent: default_progress_step_percent(),
            emitter_timeout_secs: default_emitter_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl UploadConfig {
    pub fn emitter_timeout(&self) -> Duration {
        Duration::from_secs(self.emitter_timeout_secs)
    }
}

/// 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// 进度服务器地址
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// 拒绝提示的显示时长（秒）
    #[serde(default = "default_rejected_display_secs")]
    pub rejected_display_secs: u64,
}

fn default_server_url() -> String {
    "http://127.0.0.1:18888".to_string()
}

fn default_rejected_display_secs() -> u64 {
    5
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            rejected_display_secs: default_rejected_display_secs(),
        }
    }
}

impl ClientConfig {
    pub fn rejected_display(&self) -> Duration {
        Duration::from_secs(self.rejected_display_secs)
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate().context("配置文件校验失败")?;

        Ok(config)
    }

    /// 保存配置到文件
    pub async fn save_to_file(&self, path: &str) -> Result<()> {
        self.validate().context("保存配置失败")?;

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        // 确保父目录存在
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create config directory")?;
            }
        }

        fs::write(path, content)
            .await
            .context("Failed to write config file")?;

        info!("配置已保存: {}", path);
        Ok(())
    }

    /// 加载配置，文件不存在或无效时使用默认配置
    pub async fn load_or_default(path: &str) -> Self {
        if !std::path::Path::new(path).exists() {
            info!("配置文件不存在，使用默认配置: {}", path);
            return Self::default();
        }

        match Self::load_from_file(path).await {
            Ok(config) => {
                info!("已加载配置文件: {}", path);
                config
            }
            Err(e) => {
                warn!("加载配置文件失败，使用默认配置: {}, 错误: {:#}", path, e);
                Self::default()
            }
        }
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<()> {
        if self.upload.part_concurrency == 0 {
            anyhow::bail!("upload.part_concurrency 必须大于 0");
        }
        let step = self.upload.progress_step_percent;
        if !step.is_finite() || step <= 0.0 || step > 100.0 {
            anyhow::bail!("upload.progress_step_percent 必须在 (0, 100] 之间: {}", step);
        }
        if self.upload.emitter_timeout_secs == 0 {
            anyhow::bail!("upload.emitter_timeout_secs 必须大于 0");
        }
        if self.client.server_url.trim().is_empty() {
            anyhow::bail!("client.server_url 不能为空");
        }
        Ok(())
    }
}
