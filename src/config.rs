use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// 报表输出目录
    pub output_dir: PathBuf,
    /// 额外的客户配置 (TOML, [[profiles]])
    #[serde(default)]
    pub profiles_file: Option<PathBuf>,
}

/// 默认输出到 ~/Downloads，没有 HOME 时用 ./reports
fn default_output_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("reports"))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8082,
            },
            reports: ReportsConfig {
                output_dir: default_output_dir(),
                profiles_file: None,
            },
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// 按给定的变量查找函数构建配置，缺失或无法解析的值使用默认值
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: var("SERVER_PORT")
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            reports: ReportsConfig {
                output_dir: var("REPORT_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.reports.output_dir),
                profiles_file: var("CLIENT_PROFILES_FILE").map(PathBuf::from),
            },
        }
    }

    /// 分层加载：默认值 -> config/bill_run.toml (可选) -> BILL_RUN__* 环境变量
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Self::default();

        config::Config::builder()
            .set_default("server.host", defaults.server.host)?
            .set_default("server.port", i64::from(defaults.server.port))?
            .set_default(
                "reports.output_dir",
                defaults.reports.output_dir.to_string_lossy().to_string(),
            )?
            .add_source(config::File::with_name("config/bill_run").required(false))
            .add_source(
                config::Environment::with_prefix("BILL_RUN")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
