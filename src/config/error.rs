// ==========================================
// 营销后台 - 配置层错误类型
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置读取失败 (key: {key}): {message}")]
    ReadError { key: String, message: String },

    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("数据库锁获取失败: {0}")]
    LockError(String),

    #[error("数据库错误: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
