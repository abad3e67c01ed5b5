// ==========================================
// 营销后台 - 实体元数据目录
// ==========================================
// 职责: 按名称查找实体描述符（不区分大小写）
// 说明: 启动时构建一次,之后只读
// ==========================================

use crate::domain::entity::{EntityDescriptor, EntityKind};
use crate::importer::error::{ImportError, ImportResult};
use std::collections::HashMap;

pub struct EntityCatalog {
    // key: 小写实体名
    by_name: HashMap<String, EntityDescriptor>,
}

impl EntityCatalog {
    /// 由静态实体集合构建
    pub fn builtin() -> Self {
        let by_name = EntityKind::ALL
            .iter()
            .map(|k| (k.name().to_ascii_lowercase(), k.descriptor()))
            .collect();
        Self { by_name }
    }

    /// 查找实体描述符
    ///
    /// # 返回
    /// - Err(UnknownEntity): 名称不在目录中
    pub fn describe(&self, entity_name: &str) -> ImportResult<&EntityDescriptor> {
        self.by_name
            .get(&entity_name.trim().to_ascii_lowercase())
            .ok_or_else(|| ImportError::UnknownEntity {
                name: entity_name.trim().to_string(),
            })
    }

    pub fn descriptor(&self, kind: EntityKind) -> ImportResult<&EntityDescriptor> {
        self.describe(kind.name())
    }

    /// 未知实体视为无外键
    pub fn has_foreign_keys(&self, entity_name: &str) -> bool {
        self.describe(entity_name)
            .map(|d| d.has_foreign_keys())
            .unwrap_or(false)
    }
}

impl Default for EntityCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_is_case_insensitive() {
        let catalog = EntityCatalog::builtin();
        let d = catalog.describe("cAmPaIgN").unwrap();
        assert_eq!(d.kind, EntityKind::Campaign);
        assert_eq!(d.natural_key, Some("Number"));
    }

    #[test]
    fn test_describe_unknown_entity() {
        let catalog = EntityCatalog::builtin();
        let err = catalog.describe("Invoice").unwrap_err();
        assert!(matches!(err, ImportError::UnknownEntity { name } if name == "Invoice"));
    }

    #[test]
    fn test_has_foreign_keys() {
        let catalog = EntityCatalog::builtin();
        assert!(catalog.has_foreign_keys("Budget"));
        assert!(catalog.has_foreign_keys("campaign"));
        assert!(!catalog.has_foreign_keys("Customer"));
        assert!(!catalog.has_foreign_keys("Invoice"));
    }
}
