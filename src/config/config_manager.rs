// ==========================================
// 营销后台 - 配置管理器
// ==========================================
// 职责: 导入配置的加载与覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::import_config::{DEFAULT_DATE_FORMATS, MAX_SYNTH_DATE_OFFSET_DAYS};
use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

/// 配置键
pub mod config_keys {
    pub const DELIMITER: &str = "import/delimiter";
    pub const DISCRIMINATOR_COLUMN: &str = "import/discriminator_column";
    pub const NATURAL_KEY_FALLBACK_COLUMN: &str = "import/natural_key_fallback_column";
    pub const DATE_FORMATS: &str = "import/date_formats";
    pub const SYNTHESIZE_MISSING: &str = "import/synthesize_missing";
    pub const SYNTH_AMOUNT_MIN: &str = "import/synth_amount_min";
    pub const SYNTH_AMOUNT_MAX: &str = "import/synth_amount_max";
    pub const SYNTH_DATE_OFFSET_DAYS: &str = "import/synth_date_offset_days";
    pub const RNG_SEED: &str = "import/rng_seed";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（与导入仓储共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| ConfigError::ReadError {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        Ok(value)
    }

    /// 写入 global scope 配置（覆盖）
    pub fn set_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ConfigError::LockError(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    fn parse_value<T: std::str::FromStr>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_delimiter(&self) -> ConfigResult<u8> {
        match self.get_config_value(config_keys::DELIMITER)? {
            None => Ok(b','),
            Some(raw) => {
                // "\t" 转义与单字节字符
                let candidate = if raw == "\\t" { "\t" } else { raw.as_str() };
                match candidate.as_bytes() {
                    [b] => Ok(*b),
                    _ => Err(ConfigError::InvalidValue {
                        key: config_keys::DELIMITER.to_string(),
                        value: raw.clone(),
                        message: "分隔符必须是单个 ASCII 字符".to_string(),
                    }),
                }
            }
        }
    }

    async fn get_discriminator_column(&self) -> ConfigResult<String> {
        Ok(self
            .get_config_value(config_keys::DISCRIMINATOR_COLUMN)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "Type".to_string()))
    }

    async fn get_natural_key_fallback_column(&self) -> ConfigResult<Option<String>> {
        // 显式配置为空串表示禁用回退
        match self.get_config_value(config_keys::NATURAL_KEY_FALLBACK_COLUMN)? {
            None => Ok(Some("Number".to_string())),
            Some(v) if v.trim().is_empty() => Ok(None),
            Some(v) => Ok(Some(v.trim().to_string())),
        }
    }

    async fn get_date_formats(&self) -> ConfigResult<Vec<String>> {
        match self.get_config_value(config_keys::DATE_FORMATS)? {
            None => Ok(DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect()),
            Some(raw) => {
                let formats: Vec<String> =
                    serde_json::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
                        key: config_keys::DATE_FORMATS.to_string(),
                        value: raw.clone(),
                        message: e.to_string(),
                    })?;
                if formats.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: config_keys::DATE_FORMATS.to_string(),
                        value: raw,
                        message: "日期格式列表不能为空".to_string(),
                    });
                }
                Ok(formats)
            }
        }
    }

    async fn get_synthesize_missing(&self) -> ConfigResult<bool> {
        self.parse_value(config_keys::SYNTHESIZE_MISSING, true)
    }

    async fn get_synth_amount_range(&self) -> ConfigResult<(f64, f64)> {
        let min = self.parse_value(config_keys::SYNTH_AMOUNT_MIN, 10.0_f64)?;
        let max = self.parse_value(config_keys::SYNTH_AMOUNT_MAX, 5000.0_f64)?;
        if !(min > 0.0 && max > min && max.is_finite()) {
            return Err(ConfigError::InvalidValue {
                key: config_keys::SYNTH_AMOUNT_MAX.to_string(),
                value: format!("[{}, {})", min, max),
                message: "金额区间必须满足 0 < min < max".to_string(),
            });
        }
        Ok((min, max))
    }

    async fn get_synth_date_offset_days(&self) -> ConfigResult<i64> {
        let days = self.parse_value(config_keys::SYNTH_DATE_OFFSET_DAYS, 365_i64)?;
        if !(0..=MAX_SYNTH_DATE_OFFSET_DAYS).contains(&days) {
            return Err(ConfigError::InvalidValue {
                key: config_keys::SYNTH_DATE_OFFSET_DAYS.to_string(),
                value: days.to_string(),
                message: format!("回溯天数必须在 0..={} 之间", MAX_SYNTH_DATE_OFFSET_DAYS),
            });
        }
        Ok(days)
    }

    async fn get_rng_seed(&self) -> ConfigResult<Option<u64>> {
        match self.get_config_value(config_keys::RNG_SEED)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    key: config_keys::RNG_SEED.to_string(),
                    value: raw.clone(),
                    message: e.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_defaults_when_table_empty() {
        let config = manager().load_import_config().await.unwrap();
        assert_eq!(config.delimiter, b',');
        assert_eq!(config.discriminator_column, "Type");
        assert_eq!(config.natural_key_fallback_column.as_deref(), Some("Number"));
        assert!(config.synthesize_missing);
        assert_eq!(config.rng_seed, None);
    }

    #[tokio::test]
    async fn test_overrides_are_read() {
        let m = manager();
        m.set_config_value(config_keys::DELIMITER, ";").unwrap();
        m.set_config_value(config_keys::NATURAL_KEY_FALLBACK_COLUMN, "").unwrap();
        m.set_config_value(config_keys::RNG_SEED, "42").unwrap();
        m.set_config_value(config_keys::DATE_FORMATS, r#"["%d.%m.%Y"]"#).unwrap();

        let config = m.load_import_config().await.unwrap();
        assert_eq!(config.delimiter, b';');
        assert_eq!(config.natural_key_fallback_column, None);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.date_formats, vec!["%d.%m.%Y".to_string()]);
    }

    #[tokio::test]
    async fn test_tab_delimiter_escape() {
        let m = manager();
        m.set_config_value(config_keys::DELIMITER, "\\t").unwrap();
        assert_eq!(m.get_delimiter().await.unwrap(), b'\t');
    }

    #[tokio::test]
    async fn test_invalid_amount_range_rejected() {
        let m = manager();
        m.set_config_value(config_keys::SYNTH_AMOUNT_MIN, "100").unwrap();
        m.set_config_value(config_keys::SYNTH_AMOUNT_MAX, "50").unwrap();
        assert!(m.get_synth_amount_range().await.is_err());
    }

    #[tokio::test]
    async fn test_date_offset_is_bounded() {
        let m = manager();
        m.set_config_value(config_keys::SYNTH_DATE_OFFSET_DAYS, "-1").unwrap();
        assert!(m.get_synth_date_offset_days().await.is_err());
        m.set_config_value(config_keys::SYNTH_DATE_OFFSET_DAYS, "99999999").unwrap();
        assert!(m.get_synth_date_offset_days().await.is_err());
        m.set_config_value(config_keys::SYNTH_DATE_OFFSET_DAYS, "30").unwrap();
        assert_eq!(m.get_synth_date_offset_days().await.unwrap(), 30);
    }
}
