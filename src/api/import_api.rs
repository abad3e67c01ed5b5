// ==========================================
// 营销后台 - 导入API
// ==========================================
// 职责: 封装批量导入、配置覆写与实体计数
// 说明: 仓储与配置共享同一连接,批次串行执行
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::{init_schema, open_sqlite_connection};
use crate::domain::import::{ImportDiagnostic, ImportReport};
use crate::importer::{BatchImporter, ImportSource, TransactionalImporter};
use crate::repository::{EntityStore, SqliteEntityStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    /// 批次ID
    pub batch_id: String,
    /// 是否已提交（false 表示整批已回滚）
    pub committed: bool,
    /// 各实体写入数量（回滚时为空）
    pub inserted_counts: BTreeMap<String, usize>,
    /// 各实体基线种子数量
    pub seeded_counts: BTreeMap<String, usize>,
    pub errors: Vec<ImportDiagnostic>,
    pub warnings: Vec<ImportDiagnostic>,
    /// 导入耗时（毫秒）
    pub elapsed_ms: u64,
}

impl ImportApiResponse {
    pub fn from_report(report: &ImportReport, committed: bool) -> Self {
        Self {
            batch_id: report.batch_id.clone(),
            committed,
            inserted_counts: report.inserted_counts.clone(),
            seeded_counts: report.seeded_counts.clone(),
            errors: report.errors.clone(),
            warnings: report.warnings.clone(),
            elapsed_ms: report.elapsed_ms,
        }
    }
}

/// 导入API
pub struct ImportApi {
    db_path: String,
    importer: TransactionalImporter<SqliteEntityStore, ConfigManager>,
}

impl ImportApi {
    /// 创建新的ImportApi实例（按需建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        init_schema(&conn).map_err(|e| ApiError::DatabaseError(format!("建表失败: {}", e)))?;

        let conn = Arc::new(Mutex::new(conn));
        let store = SqliteEntityStore::from_connection(conn.clone());
        let config = ConfigManager::from_connection(conn);

        Ok(Self {
            db_path: db_path.to_string(),
            importer: TransactionalImporter::new(store, config),
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// 导入一批文件
    ///
    /// # 参数
    /// - file_paths: 文件路径（顺序不影响结果）
    /// - cancel: 取消信号
    ///
    /// # 返回
    /// - Ok(ImportApiResponse): 已提交
    /// - Err(ApiError::ImportRejected): 整批已回滚,携带完整报告
    /// - Err(ApiError::Cancelled): 已取消,整批已回滚
    pub async fn import_files(
        &self,
        file_paths: &[String],
        cancel: CancellationToken,
    ) -> ApiResult<ImportApiResponse> {
        if file_paths.is_empty() {
            return Err(ApiError::InvalidInput("至少需要一个导入文件".to_string()));
        }

        let sources = file_paths
            .iter()
            .map(|p| ImportSource::from_path(Path::new(p)))
            .collect();
        self.import_sources(sources, cancel).await
    }

    /// 导入内存中的文件内容
    pub async fn import_sources(
        &self,
        sources: Vec<ImportSource>,
        cancel: CancellationToken,
    ) -> ApiResult<ImportApiResponse> {
        let report = self.importer.import_batch(sources, cancel).await?;
        info!(
            batch_id = %report.batch_id,
            total = report.total_inserted(),
            "导入API: 批次已提交"
        );
        Ok(ImportApiResponse::from_report(&report, true))
    }

    /// 覆写导入配置（global scope）
    pub fn set_config(&self, key: &str, value: &str) -> ApiResult<()> {
        self.importer.config().set_config_value(key, value)?;
        Ok(())
    }

    /// 当前生效的导入配置
    pub async fn current_config(&self) -> ApiResult<crate::config::ImportConfig> {
        Ok(self.importer.config().load_import_config().await?)
    }

    /// 实体表行数
    pub async fn count_entities(&self, entity_name: &str) -> ApiResult<usize> {
        let descriptor = self
            .importer
            .catalog()
            .describe(entity_name)
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
        Ok(self.importer.store().count(descriptor).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_keys;
    use tempfile::NamedTempFile;

    fn api() -> (NamedTempFile, ImportApi) {
        let file = NamedTempFile::new().unwrap();
        let api = ImportApi::new(file.path().to_str().unwrap()).unwrap();
        (file, api)
    }

    #[tokio::test]
    async fn test_empty_file_list_is_invalid() {
        let (_f, api) = api();
        let result = api.import_files(&[], CancellationToken::new()).await;
        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_import_and_count() {
        let (_f, api) = api();
        api.set_config(config_keys::RNG_SEED, "7").unwrap();
        let sources = vec![ImportSource::from_bytes(
            "Campaign.csv",
            b"Number,Title,TargetAmount\nCMP1,Spring,1200.50\n".to_vec(),
        )];

        let response = api
            .import_sources(sources, CancellationToken::new())
            .await
            .unwrap();
        assert!(response.committed);
        assert_eq!(response.inserted_counts.get("Campaign"), Some(&1));
        assert_eq!(api.count_entities("campaign").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_entity_count_is_invalid_input() {
        let (_f, api) = api();
        assert!(matches!(
            api.count_entities("Invoice").await,
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_config_override_visible() {
        let (_f, api) = api();
        api.set_config(config_keys::DELIMITER, ";").unwrap();
        assert_eq!(api.current_config().await.unwrap().delimiter, b';');
    }
}
