// ==========================================
// 营销后台 - 导入配置快照
// ==========================================
// 用途: 每批导入开始时读取一次,批内不可变
// ==========================================

use serde::{Deserialize, Serialize};

/// 默认日期格式（按优先级,先匹配先生效）
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

/// 生成日期的最大回溯天数
pub const MAX_SYNTH_DATE_OFFSET_DAYS: i64 = 36_500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// 分隔符（单字节）
    pub delimiter: u8,
    /// 子文件判别列
    pub discriminator_column: String,
    /// 约定外键列缺失时的回退列;None 表示禁用回退
    pub natural_key_fallback_column: Option<String>,
    pub date_formats: Vec<String>,
    /// 缺失的必填字段是否自动生成默认值
    pub synthesize_missing: bool,
    pub synth_amount_min: f64,
    pub synth_amount_max: f64,
    pub synth_date_offset_days: i64,
    /// 固定种子（测试用）;None 时每批随机
    pub rng_seed: Option<u64>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            discriminator_column: "Type".to_string(),
            natural_key_fallback_column: Some("Number".to_string()),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            synthesize_missing: true,
            synth_amount_min: 10.0,
            synth_amount_max: 5000.0,
            synth_date_offset_days: 365,
            rng_seed: None,
        }
    }
}

impl ImportConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.natural_key_fallback_column = None;
        self
    }
}
