// ==========================================
// 营销后台 - 事务导入器
// ==========================================
// 职责: 一批文件 = 一个原子单元
// 流程: 配置快照 → 开启事务 → 调度 → 提交 | 回滚
// 红线: 存在任何错误诊断时零记录可见
// ==========================================

use crate::config::{ImportConfig, ImportConfigReader};
use crate::domain::import::ImportReport;
use crate::importer::baseline_seeder::{BaselineSeeder, RegistrySeeder};
use crate::importer::batch_context::BatchContext;
use crate::importer::batch_importer_trait::BatchImporter;
use crate::importer::default_synthesizer::SeededSynthesizer;
use crate::importer::entity_catalog::EntityCatalog;
use crate::importer::entity_registry::EntityRegistry;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::ImportSource;
use crate::importer::scheduler::{ImportPhase, ImportScheduler};
use crate::repository::EntityStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// TransactionalImporter
// ==========================================
pub struct TransactionalImporter<S, C>
where
    S: EntityStore,
    C: ImportConfigReader,
{
    // 数据访问层
    store: S,

    // 配置读取器
    config: C,

    // 导入组件
    catalog: EntityCatalog,
    registry: Arc<EntityRegistry>,
    seeder: Box<dyn BaselineSeeder>,

    // 同一导入器上的批次串行执行
    batch_lock: Mutex<()>,
}

impl<S, C> TransactionalImporter<S, C>
where
    S: EntityStore,
    C: ImportConfigReader,
{
    /// 创建导入器（默认基线种子）
    ///
    /// # 参数
    /// - store: 实体存储
    /// - config: 配置读取器
    pub fn new(store: S, config: C) -> Self {
        let registry = Arc::new(EntityRegistry::builtin());
        let seeder = Box::new(RegistrySeeder::new(registry.clone()));
        Self {
            store,
            config,
            catalog: EntityCatalog::builtin(),
            registry,
            seeder,
            batch_lock: Mutex::new(()),
        }
    }

    /// 替换基线种子实现
    pub fn with_seeder(mut self, seeder: Box<dyn BaselineSeeder>) -> Self {
        self.seeder = seeder;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    // 事务内执行调度;返回 true 表示已提交
    async fn run_in_transaction(
        &self,
        sources: &[ImportSource],
        config: &ImportConfig,
        context: &mut BatchContext,
        started: Instant,
    ) -> ImportResult<bool> {
        let synthesizer = Box::new(SeededSynthesizer::from_config(
            config,
            Utc::now().naive_utc(),
        ));
        let mut scheduler = ImportScheduler::new(
            &self.catalog,
            &self.registry,
            &self.store,
            self.seeder.as_ref(),
            config,
            synthesizer,
        );

        scheduler.run(sources, context).await?;

        if scheduler.phase() != ImportPhase::Finalizing || context.report.has_errors() {
            if !scheduler.phase().is_terminal() {
                scheduler.transition(ImportPhase::RolledBack)?;
            }
            return Ok(false);
        }

        context.check_cancelled()?;
        let file_names: Vec<String> = sources.iter().map(|s| s.file_name()).collect();
        context.report.elapsed_ms = started.elapsed().as_millis() as u64;
        self.store.record_batch(&context.report, &file_names).await?;

        let written = self.store.commit().await?;
        scheduler.transition(ImportPhase::Committed)?;
        info!(written, "批次事务已提交");
        Ok(true)
    }
}

#[async_trait]
impl<S, C> BatchImporter for TransactionalImporter<S, C>
where
    S: EntityStore,
    C: ImportConfigReader,
{
    #[instrument(skip_all, fields(batch_id, files = sources.len()))]
    async fn import_batch(
        &self,
        sources: Vec<ImportSource>,
        cancel: CancellationToken,
    ) -> ImportResult<ImportReport> {
        let _guard = self.batch_lock.lock().await;
        let started = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(batch_id = %batch_id, files = sources.len(), "开始导入批次");

        let config = self.config.load_import_config().await?;
        let mut context = BatchContext::new(batch_id.clone(), cancel);
        context.check_cancelled()?;

        self.store.begin().await?;
        let outcome = self
            .run_in_transaction(&sources, &config, &mut context, started)
            .await;
        let mut report = context.report;
        report.elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(true) => {
                info!(
                    batch_id = %batch_id,
                    total = report.total_inserted(),
                    warnings = report.warnings.len(),
                    elapsed_ms = report.elapsed_ms,
                    "批次导入完成"
                );
                Ok(report)
            }
            Ok(false) => {
                self.store.rollback().await?;
                report.void_counts();
                warn!(
                    batch_id = %batch_id,
                    errors = report.errors.len(),
                    "批次存在错误,已回滚"
                );
                Err(ImportError::Rejected {
                    report: Box::new(report),
                })
            }
            Err(e) => {
                if let Err(rollback_err) = self.store.rollback().await {
                    error!(batch_id = %batch_id, error = %rollback_err, "回滚失败");
                }
                match &e {
                    ImportError::Cancelled => warn!(batch_id = %batch_id, "批次已取消,已回滚"),
                    other => error!(batch_id = %batch_id, error = %other, "批次中止,已回滚"),
                }
                Err(e)
            }
        }
    }
}
