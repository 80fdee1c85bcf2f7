//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// 服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 单个 HTTP 请求的超时时间
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 10,
        }
    }
}

/// 决策引擎配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 账本加锁等待上限（毫秒），超时按 `Rejected(Timeout)` 处理
    pub ledger_lock_timeout_ms: u64,
    /// 发奖发布通道容量
    pub publish_buffer: usize,
    /// 启动时加载的促销定义目录（*.json）
    pub promotions_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger_lock_timeout_ms: 50,
            publish_buffer: 1024,
            promotions_dir: None,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub service_name: String,
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown-service".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: true,
            metrics_port: 9090,
        }
    }
}

impl ObservabilityConfig {
    /// 注入服务名，用于日志和指标的来源标识
    pub fn with_service_name(mut self, service_name: &str) -> Self {
        self.service_name = service_name.to_string();
        self
    }

    /// 是否输出 JSON 格式日志
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. .env 文件（如存在，仅注入环境变量）
    /// 2. config/default.toml（默认配置）
    /// 3. config/{environment}.toml（环境特定配置）
    /// 4. config/{service_name}.toml（服务特定配置）
    /// 5. 环境变量（PROMO_ 前缀，如 PROMO_SERVER_PORT -> server.port）
    /// 6. 服务特定端口环境变量（如 PROMO_ENGINE_PORT）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let env = std::env::var("PROMO_ENV").unwrap_or_else(|_| "development".to_string());

        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            // 环境变量覆盖（PROMO_SERVER_PORT -> server.port）
            .add_source(
                Environment::with_prefix("PROMO")
                    .separator("_")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        if let Some(port) = Self::get_service_port_from_env(service_name) {
            config.server.port = port;
        }

        Ok(config)
    }

    /// 从环境变量获取服务特定端口
    ///
    /// - promo-engine -> PROMO_ENGINE_PORT
    /// - 其余服务：服务名转大写下划线格式 + _PORT
    fn get_service_port_from_env(service_name: &str) -> Option<u16> {
        let env_var_name = match service_name {
            "promo-engine" => "PROMO_ENGINE_PORT".to_string(),
            _ => Self::generic_port_var(service_name),
        };

        std::env::var(env_var_name)
            .ok()
            .and_then(|v| v.parse().ok())
    }

    /// 将 "my-service-name" 转换为 "MY_SERVICE_NAME_PORT"
    fn generic_port_var(service_name: &str) -> String {
        format!("{}_PORT", service_name.to_uppercase().replace('-', "_"))
    }

    /// 获取服务地址
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.ledger_lock_timeout_ms, 50);
        assert_eq!(config.engine.publish_buffer, 1024);
        assert!(config.engine.promotions_dir.is_none());
        assert!(!config.observability.json_logs());
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(config.server_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn test_generic_service_port_conversion() {
        assert_eq!(
            AppConfig::generic_port_var("my-custom-service"),
            "MY_CUSTOM_SERVICE_PORT"
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [engine]
                ledger_lock_timeout_ms = 5

                [observability]
                log_format = "json"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.engine.ledger_lock_timeout_ms, 5);
        assert_eq!(config.engine.publish_buffer, 1024);
        assert_eq!(config.server.port, 8080);
        assert!(config.observability.json_logs());
    }

    #[test]
    fn test_with_service_name() {
        let obs = ObservabilityConfig::default().with_service_name("promo-engine");
        assert_eq!(obs.service_name, "promo-engine");
    }
}
