// ==========================================
// 营销后台 - 导入层
// ==========================================
// 职责: 分隔符文本文件 → 强类型实体,整批原子落库
// 流程: 分类 → 映射 → 类型转换 → 默认值 → 外键解析 → 暂存 → 提交/回滚
// ==========================================

// 模块声明
pub mod baseline_seeder;
pub mod batch_context;
pub mod batch_importer_trait;
pub mod conflict_handler;
pub mod default_synthesizer;
pub mod entity_catalog;
pub mod entity_registry;
pub mod error;
pub mod field_mapper;
pub mod file_classifier;
pub mod file_parser;
pub mod fk_resolver;
pub mod scheduler;
pub mod transactional_importer;
pub mod type_coercion;

// 重导出核心类型
pub use baseline_seeder::{BaselineSeeder, RegistrySeeder};
pub use batch_context::BatchContext;
pub use conflict_handler::ConflictHandler;
pub use default_synthesizer::{SeededSynthesizer, ValueSynthesizer};
pub use entity_catalog::EntityCatalog;
pub use entity_registry::{EntityHandler, EntityRegistry};
pub use error::{CoercionError, ImportError, ImportResult, RowError};
pub use field_mapper::{ColumnMapping, FieldMapper};
pub use file_classifier::{FileClass, FileClassifier};
pub use file_parser::{DelimitedParser, ImportSource};
pub use fk_resolver::ForeignKeyResolver;
pub use scheduler::{ImportPhase, ImportScheduler};
pub use transactional_importer::TransactionalImporter;
pub use type_coercion::TypeCoercer;

// 重导出 Trait 接口
pub use batch_importer_trait::BatchImporter;
