// ==========================================
// 营销后台 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::import_config::ImportConfig;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（config_kv 表）, ImportConfig（静态快照）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 分隔符
    ///
    /// # 默认值
    /// - ','
    async fn get_delimiter(&self) -> ConfigResult<u8>;

    /// 子文件判别列名
    ///
    /// # 默认值
    /// - "Type"
    async fn get_discriminator_column(&self) -> ConfigResult<String>;

    /// 父业务键回退列名
    ///
    /// # 返回
    /// - Some(列名): 约定列缺失时使用
    /// - None: 禁用回退,约定列缺失即报错
    ///
    /// # 默认值
    /// - Some("Number")
    async fn get_natural_key_fallback_column(&self) -> ConfigResult<Option<String>>;

    /// 可接受的日期格式（按优先级）
    async fn get_date_formats(&self) -> ConfigResult<Vec<String>>;

    /// 缺失必填字段是否自动生成
    ///
    /// # 默认值
    /// - true
    async fn get_synthesize_missing(&self) -> ConfigResult<bool>;

    /// 生成金额的区间 [min, max)
    ///
    /// # 默认值
    /// - (10.0, 5000.0)
    async fn get_synth_amount_range(&self) -> ConfigResult<(f64, f64)>;

    /// 生成日期的最大回溯天数
    ///
    /// # 默认值
    /// - 365
    async fn get_synth_date_offset_days(&self) -> ConfigResult<i64>;

    /// 随机种子（None = 每批随机）
    async fn get_rng_seed(&self) -> ConfigResult<Option<u64>>;

    /// 读取完整快照（每批一次）
    async fn load_import_config(&self) -> ConfigResult<ImportConfig> {
        let (synth_amount_min, synth_amount_max) = self.get_synth_amount_range().await?;
        Ok(ImportConfig {
            delimiter: self.get_delimiter().await?,
            discriminator_column: self.get_discriminator_column().await?,
            natural_key_fallback_column: self.get_natural_key_fallback_column().await?,
            date_formats: self.get_date_formats().await?,
            synthesize_missing: self.get_synthesize_missing().await?,
            synth_amount_min,
            synth_amount_max,
            synth_date_offset_days: self.get_synth_date_offset_days().await?,
            rng_seed: self.get_rng_seed().await?,
        })
    }
}

// 静态快照本身即可作为配置来源（测试/嵌入调用）
#[async_trait]
impl ImportConfigReader for ImportConfig {
    async fn get_delimiter(&self) -> ConfigResult<u8> {
        Ok(self.delimiter)
    }

    async fn get_discriminator_column(&self) -> ConfigResult<String> {
        Ok(self.discriminator_column.clone())
    }

    async fn get_natural_key_fallback_column(&self) -> ConfigResult<Option<String>> {
        Ok(self.natural_key_fallback_column.clone())
    }

    async fn get_date_formats(&self) -> ConfigResult<Vec<String>> {
        Ok(self.date_formats.clone())
    }

    async fn get_synthesize_missing(&self) -> ConfigResult<bool> {
        Ok(self.synthesize_missing)
    }

    async fn get_synth_amount_range(&self) -> ConfigResult<(f64, f64)> {
        Ok((self.synth_amount_min, self.synth_amount_max))
    }

    async fn get_synth_date_offset_days(&self) -> ConfigResult<i64> {
        Ok(self.synth_date_offset_days)
    }

    async fn get_rng_seed(&self) -> ConfigResult<Option<u64>> {
        Ok(self.rng_seed)
    }
}
