// ==========================================
// 营销后台 - 类型转换引擎
// ==========================================
// 职责: 原始文本 → 强类型值
// 规则:
// - 空值: 可空字段为 Null,否则 RequiredFieldEmpty
// - 数值: 仅接受 '.' 小数点,拒绝千分位/指数/NaN
// - 日期: 按配置格式顺序尝试,先匹配先生效
// - 枚举: 整数代码或名称（不区分大小写）
// 红线: 任何输入都不 panic
// ==========================================

use crate::domain::entity::FieldDescriptor;
use crate::domain::types::{EnumType, FieldType};
use crate::domain::value::TypedValue;
use crate::importer::error::CoercionError;
use chrono::{NaiveDate, NaiveDateTime};

const TRUE_WORDS: &[&str] = &["true", "yes", "y", "1", "t", "on", "是"];
const FALSE_WORDS: &[&str] = &["false", "no", "n", "0", "f", "off", "否"];

enum ParsedTemporal {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

pub struct TypeCoercer {
    date_formats: Vec<String>,
}

impl TypeCoercer {
    pub fn new(date_formats: Vec<String>) -> Self {
        Self { date_formats }
    }

    /// 转换单元格文本
    ///
    /// # 参数
    /// - raw: 原始文本（未修剪）
    /// - field: 目标字段描述
    pub fn coerce(&self, raw: &str, field: &FieldDescriptor) -> Result<TypedValue, CoercionError> {
        let value = raw.trim();
        if value.is_empty() {
            return if field.nullable {
                Ok(TypedValue::Null)
            } else {
                Err(CoercionError::RequiredFieldEmpty {
                    field: field.name.to_string(),
                })
            };
        }

        match field.field_type {
            FieldType::Identifier | FieldType::Text => Ok(TypedValue::Text(value.to_string())),
            FieldType::Integer => self.coerce_integer(value, field),
            FieldType::Decimal => self.coerce_decimal(value, field).map(TypedValue::Decimal),
            FieldType::Amount => {
                let amount = self.coerce_decimal(value, field)?;
                // "-0" 同样视为负数
                if value.starts_with('-') || amount < 0.0 {
                    return Err(CoercionError::NegativeAmountRejected {
                        field: field.name.to_string(),
                        raw: value.to_string(),
                    });
                }
                Ok(TypedValue::Decimal(amount))
            }
            FieldType::Date => match self.parse_temporal(value) {
                Some(ParsedTemporal::Date(d)) => Ok(TypedValue::Date(d)),
                Some(ParsedTemporal::DateTime(dt)) => Ok(TypedValue::Date(dt.date())),
                None => Err(conversion_error(value, field)),
            },
            FieldType::DateTime => match self.parse_temporal(value) {
                Some(ParsedTemporal::DateTime(dt)) => Ok(TypedValue::DateTime(dt)),
                Some(ParsedTemporal::Date(d)) => Ok(TypedValue::DateTime(
                    d.and_hms_opt(0, 0, 0)
                        .ok_or_else(|| conversion_error(value, field))?,
                )),
                None => Err(conversion_error(value, field)),
            },
            FieldType::Boolean => coerce_boolean(value)
                .map(TypedValue::Boolean)
                .ok_or_else(|| conversion_error(value, field)),
            FieldType::Enum(enum_type) => coerce_enum(value, enum_type, field),
        }
    }

    fn coerce_integer(
        &self,
        value: &str,
        field: &FieldDescriptor,
    ) -> Result<TypedValue, CoercionError> {
        let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(conversion_error(value, field));
        }
        value
            .parse::<i64>()
            .map(TypedValue::Integer)
            .map_err(|_| conversion_error(value, field))
    }

    fn coerce_decimal(&self, value: &str, field: &FieldDescriptor) -> Result<f64, CoercionError> {
        if !is_plain_decimal(value) {
            return Err(conversion_error(value, field));
        }
        let parsed = value
            .parse::<f64>()
            .map_err(|_| conversion_error(value, field))?;
        if !parsed.is_finite() {
            return Err(conversion_error(value, field));
        }
        Ok(parsed)
    }

    // 带时间的格式先按日期时间解析,失败再按纯日期解析
    fn parse_temporal(&self, value: &str) -> Option<ParsedTemporal> {
        for format in &self.date_formats {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
                return Some(ParsedTemporal::DateTime(dt));
            }
            if let Ok(d) = NaiveDate::parse_from_str(value, format) {
                return Some(ParsedTemporal::Date(d));
            }
        }
        None
    }
}

// 可选符号 + 数字 + 至多一个小数点
fn is_plain_decimal(value: &str) -> bool {
    let body = value.strip_prefix(['+', '-']).unwrap_or(value);
    let mut seen_digit = false;
    let mut seen_point = false;
    for c in body.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_point => seen_point = true,
            _ => return false,
        }
    }
    seen_digit
}

fn coerce_boolean(value: &str) -> Option<bool> {
    let lower = value.to_lowercase();
    if TRUE_WORDS.contains(&lower.as_str()) {
        Some(true)
    } else if FALSE_WORDS.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn coerce_enum(
    value: &str,
    enum_type: EnumType,
    field: &FieldDescriptor,
) -> Result<TypedValue, CoercionError> {
    let member = match value.parse::<i32>() {
        Ok(code) => enum_type.by_code(code),
        Err(_) => enum_type.by_name(value),
    };
    member
        .map(|m| TypedValue::from_member(enum_type, m))
        .ok_or_else(|| CoercionError::InvalidEnumValue {
            field: field.name.to_string(),
            raw: value.to_string(),
            allowed: enum_type.allowed_values(),
        })
}

fn conversion_error(value: &str, field: &FieldDescriptor) -> CoercionError {
    CoercionError::Conversion {
        field: field.name.to_string(),
        raw: value.to_string(),
        target: field.field_type,
    }
}
