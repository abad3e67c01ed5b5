// ==========================================
// 营销后台 - 依赖顺序导入调度器
// ==========================================
// 状态机:
// Idle → ClassifyingFiles → ImportingParents → ImportingChildren
//      → Finalizing → {Committed | RolledBack}
// 规则:
// - 文件按调用方顺序,行按行号顺序
// - 父文件全部先于子文件处理
// - 父文件有任何错误时跳过子文件
// - 结构错误立即中止整批;行级错误记入诊断后继续
// ==========================================

use crate::config::ImportConfig;
use crate::domain::entity::{EntityDescriptor, EntityKind, FieldDescriptor};
use crate::domain::import::{RawRecord, StagedEntity};
use crate::domain::value::TypedValue;
use crate::importer::baseline_seeder::BaselineSeeder;
use crate::importer::batch_context::{BatchContext, StagedRef};
use crate::importer::conflict_handler::ConflictHandler;
use crate::importer::default_synthesizer::{is_synthesizable, ValueSynthesizer};
use crate::importer::entity_catalog::EntityCatalog;
use crate::importer::entity_registry::EntityRegistry;
use crate::importer::error::{CoercionError, ImportError, ImportResult, RowError, RowFailure};
use crate::importer::field_mapper::{ColumnMapping, FieldMapper};
use crate::importer::file_classifier::{FileClass, FileClassifier};
use crate::importer::file_parser::{DelimitedParser, ImportSource};
use crate::importer::fk_resolver::ForeignKeyResolver;
use crate::importer::type_coercion::TypeCoercer;
use crate::repository::EntityStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// ImportPhase - 导入阶段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportPhase {
    Idle,
    ClassifyingFiles,
    ImportingParents,
    ImportingChildren,
    Finalizing,
    Committed,
    RolledBack,
}

impl ImportPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportPhase::Committed | ImportPhase::RolledBack)
    }

    /// 合法转换
    pub fn can_transition_to(&self, next: ImportPhase) -> bool {
        use ImportPhase::*;
        match (self, next) {
            (Committed, _) | (RolledBack, _) => false,
            (_, RolledBack) => true,
            (Idle, ClassifyingFiles) => true,
            (ClassifyingFiles, ImportingParents) => true,
            (ImportingParents, ImportingChildren) | (ImportingParents, Finalizing) => true,
            (ImportingChildren, Finalizing) => true,
            (Finalizing, Committed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportPhase::Idle => "Idle",
            ImportPhase::ClassifyingFiles => "ClassifyingFiles",
            ImportPhase::ImportingParents => "ImportingParents",
            ImportPhase::ImportingChildren => "ImportingChildren",
            ImportPhase::Finalizing => "Finalizing",
            ImportPhase::Committed => "Committed",
            ImportPhase::RolledBack => "RolledBack",
        };
        f.write_str(name)
    }
}

// ==========================================
// ClassifiedFile - 已分类文件
// ==========================================
pub struct ClassifiedFile {
    pub file_name: String,
    pub class: FileClass,
    /// 父文件的实体（子文件为 None,实体逐行决定）
    pub parent_kind: Option<EntityKind>,
    pub headers: Vec<String>,
    data: Vec<u8>,
}

// ==========================================
// ImportScheduler
// ==========================================
pub struct ImportScheduler<'a> {
    catalog: &'a EntityCatalog,
    registry: &'a EntityRegistry,
    store: &'a dyn EntityStore,
    seeder: &'a dyn BaselineSeeder,
    synthesize_missing: bool,
    parser: DelimitedParser,
    classifier: FileClassifier,
    mapper: FieldMapper,
    coercer: TypeCoercer,
    conflicts: ConflictHandler,
    synthesizer: Box<dyn ValueSynthesizer>,
    phase: ImportPhase,
}

impl<'a> ImportScheduler<'a> {
    /// 创建调度器（每批一个）
    ///
    /// # 参数
    /// - catalog: 实体目录
    /// - registry: 实体操作注册表
    /// - store: 批次工作单元（事务已开启）
    /// - seeder: 基线种子
    /// - config: 本批配置快照
    /// - synthesizer: 本批默认值生成器
    pub fn new(
        catalog: &'a EntityCatalog,
        registry: &'a EntityRegistry,
        store: &'a dyn EntityStore,
        seeder: &'a dyn BaselineSeeder,
        config: &ImportConfig,
        synthesizer: Box<dyn ValueSynthesizer>,
    ) -> Self {
        Self {
            catalog,
            registry,
            store,
            seeder,
            synthesize_missing: config.synthesize_missing,
            parser: DelimitedParser::new(config.delimiter),
            classifier: FileClassifier::new(config.discriminator_column.clone()),
            mapper: FieldMapper::new(
                config.discriminator_column.clone(),
                config.natural_key_fallback_column.clone(),
            ),
            coercer: TypeCoercer::new(config.date_formats.clone()),
            conflicts: ConflictHandler,
            synthesizer,
            phase: ImportPhase::Idle,
        }
    }

    pub fn phase(&self) -> ImportPhase {
        self.phase
    }

    /// 阶段转换
    ///
    /// # 错误
    /// - InvalidPhaseTransition: 非法转换
    pub fn transition(&mut self, next: ImportPhase) -> ImportResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(ImportError::InvalidPhaseTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!(from = %self.phase, to = %next, "阶段转换");
        self.phase = next;
        Ok(())
    }

    /// 执行调度,直至 Finalizing（或因批级错误进入 RolledBack）
    ///
    /// # 返回
    /// - Ok(()): 阶段为 Finalizing 或 RolledBack,诊断已写入报告
    /// - Err: 取消 / 存储失败 / 内部错误
    #[instrument(skip_all, fields(batch_id = %context.batch_id(), files = sources.len()))]
    pub async fn run(
        &mut self,
        sources: &[ImportSource],
        context: &mut BatchContext,
    ) -> ImportResult<()> {
        // === 阶段 1: 文件分类 ===
        self.transition(ImportPhase::ClassifyingFiles)?;
        let mut files = Vec::with_capacity(sources.len());
        for source in sources {
            let file_name = source.file_name();
            match self.classify_file(source, context).await {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {}
                Err(e) if e.is_diagnosable() => return self.abort(context, &file_name, e),
                Err(e) => return Err(e),
            }
        }
        if context.report.has_errors() {
            warn!("文件分类失败,整批回滚");
            return self.transition(ImportPhase::RolledBack);
        }

        // === 阶段 2: 父文件 ===
        self.transition(ImportPhase::ImportingParents)?;
        for file in files.iter().filter(|f| f.class == FileClass::Parent) {
            match self.import_parent_file(file, context).await {
                Ok(()) => {}
                Err(e) if e.is_diagnosable() => return self.abort(context, &file.file_name, e),
                Err(e) => return Err(e),
            }
        }
        if context.report.has_errors() {
            warn!(
                errors = context.report.errors.len(),
                "父实体存在错误,跳过子文件"
            );
            return self.transition(ImportPhase::Finalizing);
        }

        // === 阶段 3: 子文件 ===
        self.transition(ImportPhase::ImportingChildren)?;
        for file in files.iter().filter(|f| f.class == FileClass::Child) {
            match self.import_child_file(file, context).await {
                Ok(()) => {}
                Err(e) if e.is_diagnosable() => return self.abort(context, &file.file_name, e),
                Err(e) => return Err(e),
            }
        }

        // === 阶段 4: 待提交 ===
        self.transition(ImportPhase::Finalizing)
    }

    // 批级错误: 记入诊断并进入 RolledBack
    fn abort(
        &mut self,
        context: &mut BatchContext,
        file: &str,
        err: ImportError,
    ) -> ImportResult<()> {
        error!(file, error = %err, phase = %self.phase, "批级错误,中止导入");
        context.report.record_error(file, None, err.to_string());
        self.transition(ImportPhase::RolledBack)
    }

    // ==========================================
    // 文件分类
    // ==========================================
    async fn classify_file(
        &self,
        source: &ImportSource,
        context: &mut BatchContext,
    ) -> ImportResult<Option<ClassifiedFile>> {
        context.check_cancelled()?;
        let file_name = source.file_name();

        let data = tokio::select! {
            _ = context.cancel_token().cancelled() => return Err(ImportError::Cancelled),
            read = source.read() => read?,
        };

        let headers = self.parser.parse_header(&file_name, &data)?;
        let class = self.classifier.classify(&headers);

        let parent_kind = match class {
            FileClass::Child => None,
            FileClass::Parent => {
                match self.classifier.parent_entity(self.catalog, &source.file_stem()) {
                    Ok(descriptor) => Some(descriptor.kind),
                    // 未知实体: 该文件失败,继续分类其余文件
                    Err(e @ ImportError::UnknownEntity { .. }) => {
                        warn!(file = %file_name, error = %e, "文件名不对应任何实体");
                        context.report.record_error(&file_name, None, e.to_string());
                        return Ok(None);
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        info!(file = %file_name, class = ?class, entity = ?parent_kind, "文件分类完成");
        Ok(Some(ClassifiedFile {
            file_name,
            class,
            parent_kind,
            headers,
            data,
        }))
    }

    // ==========================================
    // 父文件导入
    // ==========================================
    async fn import_parent_file(
        &mut self,
        file: &ClassifiedFile,
        context: &mut BatchContext,
    ) -> ImportResult<()> {
        let kind = file.parent_kind.ok_or_else(|| {
            ImportError::InternalError(format!("父文件 {} 缺少实体", file.file_name))
        })?;
        let catalog = self.catalog;
        let descriptor = catalog.descriptor(kind)?;

        let records = self.parser.parse_records(&file.file_name, &file.data)?;
        let mapping = self.mapper.map(descriptor, &file.headers, FileClass::Parent);
        for warning in &mapping.warnings {
            context.report.record_warning(&file.file_name, None, warning.clone());
        }

        let before = context.report.inserted(kind);
        for record in &records {
            context.check_cancelled()?;
            self.import_row(&file.file_name, descriptor, &mapping, record, context)
                .await?;
        }

        info!(
            file = %file.file_name,
            entity = %kind,
            rows = records.len(),
            staged = context.report.inserted(kind) - before,
            "父文件处理完成"
        );
        Ok(())
    }

    // ==========================================
    // 子文件导入（逐行按判别值确定实体）
    // ==========================================
    async fn import_child_file(
        &mut self,
        file: &ClassifiedFile,
        context: &mut BatchContext,
    ) -> ImportResult<()> {
        let catalog = self.catalog;
        let records = self.parser.parse_records(&file.file_name, &file.data)?;
        let discriminator = file
            .headers
            .iter()
            .find(|h| self.classifier.is_discriminator(h))
            .cloned()
            .ok_or_else(|| {
                ImportError::InternalError(format!("子文件 {} 缺少判别列", file.file_name))
            })?;

        let mut mappings: HashMap<EntityKind, ColumnMapping> = HashMap::new();
        let mut staged = 0usize;

        for record in &records {
            context.check_cancelled()?;

            let value = record.get(&discriminator).unwrap_or("");
            let kind = match self.classifier.child_entity(value) {
                Ok(kind) => kind,
                Err(e) => {
                    debug!(file = %file.file_name, line = record.line, error = %e, "行被拒绝");
                    context
                        .report
                        .record_error(&file.file_name, Some(record.line), e.to_string());
                    continue;
                }
            };
            let descriptor = catalog.descriptor(kind)?;

            // 每个（文件, 实体）只计算一次映射
            if !mappings.contains_key(&kind) {
                let mapping = self.mapper.map(descriptor, &file.headers, FileClass::Child);
                for warning in &mapping.warnings {
                    context
                        .report
                        .record_warning(&file.file_name, None, warning.clone());
                }
                mappings.insert(kind, mapping);
            }
            let Some(mapping) = mappings.get(&kind) else {
                continue;
            };

            if self
                .import_row(&file.file_name, descriptor, mapping, record, context)
                .await?
            {
                staged += 1;
            }
        }

        info!(
            file = %file.file_name,
            rows = records.len(),
            staged,
            "子文件处理完成"
        );
        Ok(())
    }

    // ==========================================
    // 单行处理
    // ==========================================
    // 返回 true 表示已暂存;行级错误记入诊断
    async fn import_row(
        &mut self,
        file: &str,
        descriptor: &EntityDescriptor,
        mapping: &ColumnMapping,
        record: &RawRecord,
        context: &mut BatchContext,
    ) -> ImportResult<bool> {
        match self
            .stage_row(file, descriptor, mapping, record, context)
            .await
        {
            Ok(staged) => Ok(staged),
            Err(RowFailure::Row(e)) => {
                debug!(file, line = record.line, error = %e, "行被拒绝");
                context
                    .report
                    .record_error(file, Some(record.line), e.to_string());
                Ok(false)
            }
            Err(RowFailure::Fatal(e)) => Err(e),
        }
    }

    async fn stage_row(
        &mut self,
        file: &str,
        descriptor: &EntityDescriptor,
        mapping: &ColumnMapping,
        record: &RawRecord,
        context: &mut BatchContext,
    ) -> Result<bool, RowFailure> {
        let mut entity = StagedEntity::new(descriptor, file, record.line);
        let mut synthesized: Vec<&str> = Vec::new();
        let mut field_errors = 0usize;

        // 1. 类型转换 + 默认值
        for field in descriptor
            .fields
            .iter()
            .filter(|f| !f.is_primary && !f.is_foreign_key)
        {
            let raw = mapping
                .column_for(field.name)
                .and_then(|column| record.get(column))
                .unwrap_or("");
            match self.coerce_field(descriptor, field, raw) {
                Ok((value, generated)) => {
                    if generated {
                        synthesized.push(field.name);
                    }
                    entity.set(field.name, value);
                }
                Err(e) => {
                    field_errors += 1;
                    context.report.record_error(
                        file,
                        Some(record.line),
                        RowError::from(e).to_string(),
                    );
                }
            }
        }
        if field_errors > 0 {
            return Ok(false);
        }

        // 2. 业务键冲突
        let natural_key = entity.natural_key(descriptor).map(str::to_string);
        self.conflicts
            .check(descriptor, natural_key.as_deref(), context, self.store)
            .await?;

        // 3. 外键解析
        let resolver = ForeignKeyResolver::new(self.catalog, self.store, self.seeder);
        for fk_column in &mapping.foreign_keys {
            if let Some(binding) = resolver.resolve(record, fk_column, context).await? {
                binding.apply(&mut entity);
            }
        }

        // 4. 实体级规则
        self.registry
            .handler(descriptor.kind)?
            .prepare_stage(&mut entity, &synthesized)?;

        // 5. 暂存
        let id = entity.id.clone();
        self.store.stage(entity).await?;
        context.check_cancelled()?;

        if let Some(key) = natural_key {
            context.register(
                descriptor.kind,
                &key,
                StagedRef {
                    id,
                    line: record.line,
                },
            );
        }
        context.report.increment(descriptor.kind);
        Ok(true)
    }

    /// 转换单个字段;缺失/零值的必填字段按配置自动生成
    ///
    /// # 返回
    /// - (值, 是否自动生成)
    fn coerce_field(
        &mut self,
        descriptor: &EntityDescriptor,
        field: &FieldDescriptor,
        raw: &str,
    ) -> Result<(TypedValue, bool), CoercionError> {
        let eligible =
            self.synthesize_missing && !field.nullable && is_synthesizable(descriptor, field);

        match self.coercer.coerce(raw, field) {
            Ok(value) if eligible && value.is_blank() => Ok(self
                .synthesizer
                .synthesize(field)
                .map(|v| (v, true))
                .unwrap_or((value, false))),
            Ok(value) => Ok((value, false)),
            Err(err @ CoercionError::RequiredFieldEmpty { .. }) if eligible => self
                .synthesizer
                .synthesize(field)
                .map(|v| (v, true))
                .ok_or(err),
            Err(err) => Err(err),
        }
    }
}
