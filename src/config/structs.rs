use std::path::Path;

use serde::{Deserialize, Serialize};

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - server: 监听地址、端口、worker 数量
/// - database: 数据库连接与重试
/// - logging: 日志输出
/// - tracking: 点击落地页与客户端信息提取
/// - postback: 回传分发（并发、队列、超时、重试上限）
/// - blacklist: 黑名单缓存
/// - api: 管理接口的共享 token
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub postback: PostbackConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > config.toml > 默认值
    /// ENV 前缀：CT，分隔符：__
    /// 示例：CT__SERVER__PORT=9999
    pub fn load(path: &str) -> Self {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖
            .add_source(
                Environment::with_prefix("CT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("tracking.trusted_proxies")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<StaticConfig>() {
                Ok(config) => {
                    if Path::new(path).exists() {
                        eprintln!("[INFO] Configuration loaded from: {}", path);
                    }
                    config
                }
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("# Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
    #[serde(default = "default_cpu_count")]
    pub cpu_count: usize,
}

/// 数据库连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_database_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// text | json
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

/// 点击跟踪配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// offer 未配置落地页时的兜底地址
    #[serde(default = "default_landing_url")]
    pub default_landing_url: String,
    /// 上游（CDN/网关）解析好的国家代码所在 header
    #[serde(default = "default_country_header")]
    pub country_header: String,
    /// 允许提供 X-Forwarded-For 的代理（IP 或 CIDR）
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

/// 回传分发配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostbackConfig {
    /// 同时进行的出站投递数上限
    #[serde(default = "default_postback_workers")]
    pub workers: usize,
    /// 待分发队列容量，满了直接丢弃并告警
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// profile 的 timeout_ms 为 0 时使用
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default = "default_max_timeout_ms")]
    pub max_timeout_ms: u64,
    /// profile.retries 的上限
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 指数退避的封顶值（秒）
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
    /// 关闭时排空队列的时间预算
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    #[serde(default = "default_postback_user_agent")]
    pub user_agent: String,
}

/// 黑名单配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlacklistConfig {
    #[serde(default = "default_blacklist_cache_ttl")]
    pub cache_ttl_secs: u64,
}

/// 管理接口配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    /// 为空时不校验 Bearer token（交给上游网关）
    #[serde(default)]
    pub token: String,
}

// ============================================================
// Default value functions
// ============================================================

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_cpu_count() -> usize {
    num_cpus::get()
}

fn default_database_url() -> String {
    "clicktrail.db".to_string()
}

fn default_database_pool_size() -> u32 {
    10
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    100
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

fn default_landing_url() -> String {
    "https://example.com/?clickid={clickid}".to_string()
}

fn default_country_header() -> String {
    "CF-IPCountry".to_string()
}

fn default_postback_workers() -> usize {
    16
}

fn default_queue_capacity() -> usize {
    10_000
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_max_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

fn default_max_backoff_secs() -> u64 {
    300
}

fn default_shutdown_grace_secs() -> u64 {
    20
}

fn default_postback_user_agent() -> String {
    format!("clicktrail/{}", env!("CARGO_PKG_VERSION"))
}

fn default_blacklist_cache_ttl() -> u64 {
    30
}

// ============================================================
// Default implementations
// ============================================================

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            cpu_count: default_cpu_count(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            pool_size: default_database_pool_size(),
            retry_count: default_retry_count(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            default_landing_url: default_landing_url(),
            country_header: default_country_header(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl Default for PostbackConfig {
    fn default() -> Self {
        Self {
            workers: default_postback_workers(),
            queue_capacity: default_queue_capacity(),
            default_timeout_ms: default_timeout_ms(),
            max_timeout_ms: default_max_timeout_ms(),
            max_attempts: default_max_attempts(),
            max_backoff_secs: default_max_backoff_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            user_agent: default_postback_user_agent(),
        }
    }
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_blacklist_cache_ttl(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_roundtrips_through_toml() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[postback]"));
        assert!(sample.contains("max_backoff_secs = 300"));

        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.postback.queue_capacity, 10_000);
        assert_eq!(parsed.tracking.country_header, "CF-IPCountry");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [postback]
            workers = 4
            "#,
        )
        .unwrap();
        assert_eq!(parsed.postback.workers, 4);
        assert_eq!(parsed.postback.max_attempts, 10);
        assert_eq!(parsed.database.database_url, "clicktrail.db");
        assert!(parsed.api.token.is_empty());
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = StaticConfig::load("definitely-missing-clicktrail-config.toml");
        assert_eq!(config.blacklist.cache_ttl_secs, 30);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        StaticConfig::default().save_to_file(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[tracking]"));
    }
}
