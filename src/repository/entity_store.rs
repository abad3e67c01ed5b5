// ==========================================
// 营销后台 - 实体存储 Repository Trait
// ==========================================
// 职责: 导入批次的工作单元（单一环境事务）
// 红线: Repository 不含业务规则,只做数据读写
// ==========================================

use crate::domain::entity::{EntityDescriptor, EntityKind};
use crate::domain::import::{ImportReport, StagedEntity};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 已落库实体（按业务键查得）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingEntity {
    pub kind: EntityKind,
    pub id: String,
    pub natural_key: String,
}

// ==========================================
// EntityStore Trait
// ==========================================
// 实现者: SqliteEntityStore
// 约定: begin → (get_existing / count / insert_now / stage)* → commit | rollback
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// 开启批次事务
    async fn begin(&self) -> RepositoryResult<()>;

    /// 按业务键查询已落库实体（事务内可见种子数据）
    ///
    /// # 返回
    /// - Ok(None): 不存在,或该实体无业务键
    async fn get_existing(
        &self,
        descriptor: &EntityDescriptor,
        natural_key: &str,
    ) -> RepositoryResult<Option<ExistingEntity>>;

    /// 统计实体表行数
    async fn count(&self, descriptor: &EntityDescriptor) -> RepositoryResult<usize>;

    /// 暂存实体（提交前不写库）
    async fn stage(&self, entity: StagedEntity) -> RepositoryResult<()>;

    /// 事务内立即写入（仅用于基线种子数据）
    async fn insert_now(&self, entity: &StagedEntity) -> RepositoryResult<()>;

    /// 记录批次信息（随事务提交）
    async fn record_batch(
        &self,
        report: &ImportReport,
        file_names: &[String],
    ) -> RepositoryResult<()>;

    /// 写入全部暂存实体并提交
    ///
    /// # 返回
    /// - Ok(usize): 写入的暂存实体数
    /// - Err: 写入失败（事务已回滚）
    async fn commit(&self) -> RepositoryResult<usize>;

    /// 丢弃暂存实体并回滚事务（无活动事务时为空操作）
    async fn rollback(&self) -> RepositoryResult<()>;
}
