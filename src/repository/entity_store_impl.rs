// ==========================================
// 营销后台 - 实体存储 Repository 实现
// ==========================================
// 职责: 基于 rusqlite 的批次工作单元
// 说明: 连接锁只在同步区段内持有,不跨 await
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::entity::{EntityDescriptor, EntityKind};
use crate::domain::import::{ImportReport, StagedEntity};
use crate::repository::entity_store::{EntityStore, ExistingEntity};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

// ==========================================
// SqliteEntityStore
// ==========================================
pub struct SqliteEntityStore {
    conn: Arc<Mutex<Connection>>,
    pending: Mutex<Vec<StagedEntity>>,
    descriptors: HashMap<EntityKind, EntityDescriptor>,
}

impl SqliteEntityStore {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        let descriptors = EntityKind::ALL
            .iter()
            .map(|k| (*k, k.descriptor()))
            .collect();

        Self {
            conn,
            pending: Mutex::new(Vec::new()),
            descriptors,
        }
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    fn lock_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn lock_pending(&self) -> RepositoryResult<MutexGuard<'_, Vec<StagedEntity>>> {
        self.pending
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn descriptor(&self, kind: EntityKind) -> RepositoryResult<&EntityDescriptor> {
        self.descriptors
            .get(&kind)
            .ok_or_else(|| RepositoryError::InternalError(format!("未注册的实体: {}", kind)))
    }

    /// 单条插入（调用方持有连接锁）
    fn insert_entity(
        conn: &Connection,
        descriptor: &EntityDescriptor,
        entity: &StagedEntity,
    ) -> RepositoryResult<()> {
        let columns: Vec<String> = entity
            .values
            .iter()
            .map(|(name, _)| format!("\"{}\"", name))
            .collect();
        let placeholders: Vec<String> = (1..=entity.values.len())
            .map(|i| format!("?{}", i))
            .collect();

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            descriptor.table_name,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(entity.values.iter().map(|(_, v)| v)))
            .map_err(|e| {
                let err = RepositoryError::from(e);
                warn!(
                    entity = %entity.kind,
                    file = %entity.source_file,
                    line = entity.source_line,
                    error = %err,
                    "实体写入失败"
                );
                err
            })?;
        Ok(())
    }
}

#[async_trait]
impl EntityStore for SqliteEntityStore {
    async fn begin(&self) -> RepositoryResult<()> {
        let conn = self.lock_conn()?;
        if !conn.is_autocommit() {
            return Err(RepositoryError::DatabaseTransactionError(
                "已存在活动事务,导入批次必须串行执行".to_string(),
            ));
        }
        self.lock_pending()?.clear();
        conn.execute_batch("BEGIN IMMEDIATE")?;
        debug!("批次事务已开启");
        Ok(())
    }

    async fn get_existing(
        &self,
        descriptor: &EntityDescriptor,
        natural_key: &str,
    ) -> RepositoryResult<Option<ExistingEntity>> {
        let Some(key_field) = descriptor.natural_key else {
            return Ok(None);
        };

        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT \"Id\" FROM \"{}\" WHERE \"{}\" = ?1 LIMIT 1",
            descriptor.table_name, key_field
        );
        let id: Option<String> = conn
            .query_row(&sql, params![natural_key], |row| row.get(0))
            .optional()?;

        Ok(id.map(|id| ExistingEntity {
            kind: descriptor.kind,
            id,
            natural_key: natural_key.to_string(),
        }))
    }

    async fn count(&self, descriptor: &EntityDescriptor) -> RepositoryResult<usize> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", descriptor.table_name);
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn stage(&self, entity: StagedEntity) -> RepositoryResult<()> {
        self.lock_pending()?.push(entity);
        Ok(())
    }

    async fn insert_now(&self, entity: &StagedEntity) -> RepositoryResult<()> {
        let descriptor = self.descriptor(entity.kind)?;
        let conn = self.lock_conn()?;
        if conn.is_autocommit() {
            return Err(RepositoryError::DatabaseTransactionError(
                "种子数据必须在批次事务内写入".to_string(),
            ));
        }
        Self::insert_entity(&conn, descriptor, entity)
    }

    async fn record_batch(
        &self,
        report: &ImportReport,
        file_names: &[String],
    ) -> RepositoryResult<()> {
        let report_json = serde_json::to_string(report)?;
        let file_names_json = serde_json::to_string(file_names)?;
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, file_names, total_inserted, warning_count,
                imported_at, elapsed_ms, report_json
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                report.batch_id,
                file_names_json,
                report.total_inserted() as i64,
                report.warnings.len() as i64,
                Utc::now().to_rfc3339(),
                report.elapsed_ms as i64,
                report_json,
            ],
        )?;
        Ok(())
    }

    async fn commit(&self) -> RepositoryResult<usize> {
        let pending: Vec<StagedEntity> = std::mem::take(&mut *self.lock_pending()?);
        let conn = self.lock_conn()?;
        if conn.is_autocommit() {
            return Err(RepositoryError::DatabaseTransactionError(
                "提交时无活动事务".to_string(),
            ));
        }

        for entity in &pending {
            let result = self
                .descriptor(entity.kind)
                .and_then(|d| Self::insert_entity(&conn, d, entity));
            if let Err(e) = result {
                conn.execute_batch("ROLLBACK")?;
                return Err(e);
            }
        }

        conn.execute_batch("COMMIT")?;
        debug!(count = pending.len(), "批次事务已提交");
        Ok(pending.len())
    }

    async fn rollback(&self) -> RepositoryResult<()> {
        self.lock_pending()?.clear();
        let conn = self.lock_conn()?;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
            debug!("批次事务已回滚");
        }
        Ok(())
    }
}
