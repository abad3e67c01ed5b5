// ==========================================
// 营销后台 - 配置层
// ==========================================
// 职责: 导入配置管理,支持 config_kv 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod error;
pub mod import_config;
pub mod import_config_trait;

pub use config_manager::{config_keys, ConfigManager};
pub use error::{ConfigError, ConfigResult};
pub use import_config::{ImportConfig, DEFAULT_DATE_FORMATS, MAX_SYNTH_DATE_OFFSET_DAYS};
pub use import_config_trait::ImportConfigReader;
