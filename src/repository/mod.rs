// ==========================================
// 营销后台 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有取值使用参数化,表名/列名只来自静态描述符
// ==========================================

pub mod entity_store;
pub mod entity_store_impl;
pub mod error;

pub use entity_store::{EntityStore, ExistingEntity};
pub use entity_store_impl::SqliteEntityStore;
pub use error::{RepositoryError, RepositoryResult};
