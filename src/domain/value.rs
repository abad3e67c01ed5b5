// ==========================================
// 营销后台 - 强类型字段值
// ==========================================
// 职责: 类型转换结果的统一表示 + SQLite 写入 + 文本回写
// ==========================================

use crate::domain::types::{EnumMember, EnumType};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::{ToSql, ToSqlOutput};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 日期统一存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 日期时间统一存储格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    Null,
    Text(String),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Boolean(bool),
    Enum { enum_type: EnumType, code: i32 },
}

impl TypedValue {
    pub fn from_member(enum_type: EnumType, member: EnumMember) -> Self {
        TypedValue::Enum {
            enum_type,
            code: member.code,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// 缺失/零值/空串（默认值生成的触发条件）
    pub fn is_blank(&self) -> bool {
        match self {
            TypedValue::Null => true,
            TypedValue::Text(s) => s.trim().is_empty(),
            TypedValue::Integer(i) => *i == 0,
            TypedValue::Decimal(d) => *d == 0.0,
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            TypedValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 转回可被类型转换器重新识别的文本
    pub fn to_raw_text(&self) -> String {
        match self {
            TypedValue::Null => String::new(),
            TypedValue::Text(s) => s.clone(),
            TypedValue::Integer(i) => i.to_string(),
            TypedValue::Decimal(d) => format!("{:.2}", d),
            TypedValue::Date(d) => d.format(DATE_FORMAT).to_string(),
            TypedValue::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
            TypedValue::Boolean(b) => b.to_string(),
            TypedValue::Enum { enum_type, code } => enum_type
                .by_code(*code)
                .map(|m| m.name.to_string())
                .unwrap_or_else(|| code.to_string()),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_raw_text()),
        }
    }
}

// 枚举以名称落库,日期以 ISO 文本落库
impl ToSql for TypedValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            TypedValue::Null => ToSqlOutput::from(rusqlite::types::Null),
            TypedValue::Text(s) => ToSqlOutput::from(s.as_str()),
            TypedValue::Integer(i) => ToSqlOutput::from(*i),
            TypedValue::Decimal(d) => ToSqlOutput::from(*d),
            TypedValue::Boolean(b) => ToSqlOutput::from(*b as i64),
            TypedValue::Date(_) | TypedValue::DateTime(_) | TypedValue::Enum { .. } => {
                ToSqlOutput::from(self.to_raw_text())
            }
        })
    }
}
