// ==========================================
// 营销后台 - 基线种子数据
// ==========================================
// 职责: 父实体表为空时写入基线记录
// 约束: 幂等（表非空或本批次已暂存同类实体时不写入）;写入发生在批次事务内,随批次回滚
// ==========================================

use crate::domain::entity::EntityKind;
use crate::importer::entity_registry::EntityRegistry;
use crate::importer::error::ImportResult;
use crate::repository::EntityStore;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

// ==========================================
// BaselineSeeder Trait
// ==========================================
#[async_trait]
pub trait BaselineSeeder: Send + Sync {
    /// 写入基线数据
    ///
    /// # 参数
    /// - kind: 父实体类型
    /// - store: 实体存储（批次事务内）
    /// - staged: 本批次已暂存的同类实体数
    ///
    /// # 返回
    /// - Ok(n): 本次新写入的行数（表非空、已有暂存或无基线时为 0）
    async fn seed_baseline(
        &self,
        kind: EntityKind,
        store: &dyn EntityStore,
        staged: usize,
    ) -> ImportResult<usize>;
}

// ==========================================
// RegistrySeeder - 基于实体注册表的默认实现
// ==========================================
pub struct RegistrySeeder {
    registry: Arc<EntityRegistry>,
}

impl RegistrySeeder {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl BaselineSeeder for RegistrySeeder {
    async fn seed_baseline(
        &self,
        kind: EntityKind,
        store: &dyn EntityStore,
        staged: usize,
    ) -> ImportResult<usize> {
        // 暂存行尚未落表,但同样占用自然键
        if staged > 0 {
            debug!(entity = %kind, staged, "本批次已暂存同类实体,跳过基线写入");
            return Ok(0);
        }

        let descriptor = kind.descriptor();
        let existing = store.count(&descriptor).await?;
        if existing > 0 {
            debug!(entity = %kind, existing, "实体表非空,跳过基线写入");
            return Ok(0);
        }

        let now = Utc::now().naive_utc();
        let rows = self.registry.handler(kind)?.baseline(&descriptor, now);
        for row in &rows {
            store.insert_now(row).await?;
        }

        if !rows.is_empty() {
            info!(entity = %kind, count = rows.len(), "已写入基线数据");
        }
        Ok(rows.len())
    }
}
