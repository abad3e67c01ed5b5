// ==========================================
// 营销后台 - 默认值生成器
// ==========================================
// 职责: 为缺失的必填字段生成合理的非空值
// 适用: 非主键、非外键、非业务键字段
// 说明: 每批一个实例;配置固定种子时输出可复现
// ==========================================

use crate::config::{ImportConfig, MAX_SYNTH_DATE_OFFSET_DAYS};
use crate::domain::entity::{EntityDescriptor, FieldDescriptor};
use crate::domain::types::FieldType;
use crate::domain::value::TypedValue;
use chrono::{Duration, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// 字段是否允许自动生成
pub fn is_synthesizable(descriptor: &EntityDescriptor, field: &FieldDescriptor) -> bool {
    !field.is_primary && !field.is_foreign_key && !descriptor.is_natural_key(field.name)
}

// ==========================================
// ValueSynthesizer Trait
// ==========================================
pub trait ValueSynthesizer: Send + Sync {
    /// 生成字段值
    ///
    /// # 返回
    /// - None: 该类型不支持生成（标识符）
    fn synthesize(&mut self, field: &FieldDescriptor) -> Option<TypedValue>;
}

// ==========================================
// SeededSynthesizer - 基于 StdRng 的实现
// ==========================================
pub struct SeededSynthesizer {
    rng: StdRng,
    now: NaiveDateTime,
    amount_min: f64,
    amount_max: f64,
    date_offset_days: i64,
}

impl SeededSynthesizer {
    pub fn new(
        seed: Option<u64>,
        now: NaiveDateTime,
        amount_range: (f64, f64),
        date_offset_days: i64,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            now: now.with_nanosecond(0).unwrap_or(now),
            amount_min: amount_range.0,
            amount_max: amount_range.1,
            date_offset_days: date_offset_days.clamp(0, MAX_SYNTH_DATE_OFFSET_DAYS),
        }
    }

    pub fn from_config(config: &ImportConfig, now: NaiveDateTime) -> Self {
        Self::new(
            config.rng_seed,
            now,
            (config.synth_amount_min, config.synth_amount_max),
            config.synth_date_offset_days,
        )
    }

    fn positive_amount(&mut self) -> f64 {
        let raw = if self.amount_max > self.amount_min {
            self.rng.random_range(self.amount_min..self.amount_max)
        } else {
            self.amount_min
        };
        let rounded = (raw * 100.0).round() / 100.0;
        rounded.max(0.01)
    }

    fn past_datetime(&mut self) -> NaiveDateTime {
        let days = self.rng.random_range(0..=self.date_offset_days);
        let seconds = self.rng.random_range(0..86_400i64);
        self.now - Duration::days(days) - Duration::seconds(seconds)
    }
}

impl ValueSynthesizer for SeededSynthesizer {
    fn synthesize(&mut self, field: &FieldDescriptor) -> Option<TypedValue> {
        let value = match field.field_type {
            FieldType::Identifier => return None,
            FieldType::Text => {
                let suffix: u32 = self.rng.random_range(0..0x100_0000);
                TypedValue::Text(format!("{}-{:06x}", field.name, suffix))
            }
            FieldType::Integer => TypedValue::Integer(self.rng.random_range(1..=1000)),
            FieldType::Decimal | FieldType::Amount => TypedValue::Decimal(self.positive_amount()),
            FieldType::Date => TypedValue::Date(self.past_datetime().date()),
            FieldType::DateTime => TypedValue::DateTime(self.past_datetime()),
            FieldType::Boolean => TypedValue::Boolean(self.rng.random_bool(0.5)),
            FieldType::Enum(enum_type) => {
                let members = enum_type.members();
                let member = members[self.rng.random_range(0..members.len())];
                TypedValue::from_member(enum_type, member)
            }
        };
        Some(value)
    }
}
