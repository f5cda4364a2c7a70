// ==========================================
// 商品目录数据导入引擎 - 任务执行器
// ==========================================
// 职责: 校验趟 + 提交趟的双遍历执行, 阈值控制, 取消轮询,
//       按操作类型分发落库动作
// 红线: 行级故障只进坏行记录, 不中断执行; 系统性错误才终止任务
// 红线: 行内处理严格串行, 后行可以引用前行创建的实体
// ==========================================

use crate::domain::{
    codes, BadRow, EntityKind, Fault, FaultSink, ImportJob, ImportJobStatus, ImportOperation,
    JobState, ReferenceKind,
};
use crate::engine::contracts::{CollaboratorError, EntityStore, ReferenceResolver};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::row_binder::{BindOutcome, RowBinder};
use crate::engine::row_source::{open_row_source, RowSource, SourceRow};
use crate::repository::ImportStatusRepository;
use crate::schema::{is_null_value, BindContext, EntitySchema};
use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

/// 单次运行保留的坏行明细上限, 计数器不受该上限约束
pub const MAX_RECORDED_BAD_ROWS: usize = 100;

// ==========================================
// RunScopedResolver - 运行期引用视图
// ==========================================
// 用途: 同一文件内后行引用前行创建的实体 (父分类行在前, 子分类行在后)。
// 校验趟尚未落库, 把本次运行已通过校验的业务标识记入缓存,
// 存在性查询先看缓存再查底层解析器。
struct RunScopedResolver<'a> {
    inner: &'a dyn ReferenceResolver,
    kind: Option<ReferenceKind>,
    scope: &'a str,
    fresh: Mutex<HashSet<String>>,
}

impl<'a> RunScopedResolver<'a> {
    fn new(inner: &'a dyn ReferenceResolver, kind: Option<ReferenceKind>, scope: &'a str) -> Self {
        Self {
            inner,
            kind,
            scope,
            fresh: Mutex::new(HashSet::new()),
        }
    }

    /// 记住一个本次运行将要创建的业务标识
    fn remember(&self, guid: &str) {
        if guid.is_empty() {
            return;
        }
        if let Ok(mut fresh) = self.fresh.lock() {
            fresh.insert(guid.to_string());
        }
    }
}

impl ReferenceResolver for RunScopedResolver<'_> {
    fn find_by_guid(
        &self,
        kind: ReferenceKind,
        guid: &str,
        scope_guid: Option<&str>,
    ) -> Result<Option<crate::domain::CatalogEntity>, CollaboratorError> {
        self.inner.find_by_guid(kind, guid, scope_guid)
    }

    fn exists_by_guid(
        &self,
        kind: ReferenceKind,
        guid: &str,
        scope_guid: Option<&str>,
    ) -> Result<bool, CollaboratorError> {
        if Some(kind) == self.kind {
            let scope_matches = scope_guid.map(|s| s == self.scope).unwrap_or(true);
            if scope_matches {
                let fresh = self
                    .fresh
                    .lock()
                    .map_err(|e| -> CollaboratorError { e.to_string().into() })?;
                if fresh.contains(guid) {
                    return Ok(true);
                }
            }
        }
        self.inner.exists_by_guid(kind, guid, scope_guid)
    }
}

/// 实体类型被其他行引用时对应的引用类型
fn reference_kind_of(kind: EntityKind) -> Option<ReferenceKind> {
    match kind {
        EntityKind::Category => Some(ReferenceKind::Category),
        EntityKind::Product => Some(ReferenceKind::Product),
        EntityKind::ProductSku => Some(ReferenceKind::ProductSku),
        EntityKind::Customer => Some(ReferenceKind::Customer),
        EntityKind::Inventory | EntityKind::ProductAssociation => None,
    }
}

// ==========================================
// ImportJobRunner - 任务执行器
// ==========================================
/// 任务执行器
///
/// # 职责
/// 1. 预检任务配置 (操作支持 / 列映射合法)
/// 2. 校验趟: 只读遍历全部行, 记录坏行并执行阈值判定
/// 3. 提交趟: 重新打开行来源, 跳过校验失败的行, 按操作类型落库
/// 4. 每行之间轮询取消请求, 状态与计数经状态仓储落库
///
/// # 红线
/// - 不含 UI 逻辑, 不渲染文案
/// - 所有数据访问经由 EntityStore / ReferenceResolver / 状态仓储
pub struct ImportJobRunner<S: ?Sized, R: ?Sized, T: ?Sized>
where
    S: EntityStore,
    R: ReferenceResolver,
    T: ImportStatusRepository,
{
    store: Arc<S>,
    resolver: Arc<R>,
    status_repo: Arc<T>,
}

impl<S: ?Sized, R, T: ?Sized> ImportJobRunner<S, R, T>
where
    S: EntityStore,
    R: ReferenceResolver,
    T: ImportStatusRepository,
{
    /// 创建新的执行器实例
    ///
    /// # 参数
    /// - store: 实体存储协作方
    /// - resolver: 引用解析协作方
    /// - status_repo: 运行状态仓储
    pub fn new(store: Arc<S>, resolver: Arc<R>, status_repo: Arc<T>) -> Self {
        Self {
            store,
            resolver,
            status_repo,
        }
    }

    /// 执行一次导入运行(主入口)
    ///
    /// # 参数
    /// - job: 任务配置
    /// - schema: 已按任务上下文构建好的实体模式
    /// - status: 已登记 (QueuedForValidation) 的运行状态, 原地推进
    ///
    /// # 返回
    /// - Ok(JobState): 到达的终态 (Finished / ValidationFailed / Failed / Cancelled)
    /// - Err: 系统性错误, 状态已尽力置为 Failed 并落库
    #[instrument(skip(self, job, schema, status), fields(
        job_guid = %job.guid,
        process_id = %status.process_id,
        operation = %job.operation,
        entity_kind = %job.entity_kind,
    ))]
    pub async fn run(
        &self,
        job: &ImportJob,
        schema: &EntitySchema,
        status: &mut ImportJobStatus,
    ) -> EngineResult<JobState> {
        info!(source_file = %job.source_file, "开始执行导入任务");

        match self.execute(job, schema, status).await {
            Ok(state) => {
                info!(
                    state = %state,
                    total_rows = status.total_rows,
                    failed_rows = status.failed_rows,
                    "导入任务结束"
                );
                Ok(state)
            }
            Err(e) => {
                warn!(error = %e, "导入任务因系统性错误终止");
                if status.state.can_transition_to(JobState::Failed) {
                    status.state = JobState::Failed;
                    status.end_time = Some(Utc::now());
                    status.last_modified = Utc::now();
                    if let Err(persist_err) = self.status_repo.update(status).await {
                        warn!(error = %persist_err, "失败状态回写未成功");
                    }
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        job: &ImportJob,
        schema: &EntitySchema,
        status: &mut ImportJobStatus,
    ) -> EngineResult<JobState> {
        let scope = job.scope_guid();

        // ==========================================
        // 步骤 1: 进入校验态并预检任务配置
        // ==========================================
        self.transition(status, JobState::Validating)?;
        status.start_time = Some(Utc::now());
        self.status_repo.update(status).await?;

        schema.ensure_supports(job.operation)?;
        schema.validate_mappings(&job.mappings, job.operation)?;
        let binder = RowBinder::new(schema, &job.mappings)?;

        let session = RunScopedResolver::new(
            self.resolver.as_ref(),
            reference_kind_of(job.entity_kind),
            scope,
        );
        let ctx = BindContext::new(&session, scope, job.operation);

        // ==========================================
        // 步骤 2: 校验趟 (只读, 逐行 check_only)
        // ==========================================
        let mut source = open_row_source(
            Path::new(&job.source_file),
            job.column_delimiter,
            job.text_qualifier,
        )?;

        // 标题行定义本文件的列数基准
        let Some(title) = Self::next_row(&mut source)? else {
            // 没有标题行的空文件按零行正常完成
            self.transition(status, JobState::QueuedForImport)?;
            self.transition(status, JobState::Importing)?;
            return self.finish(status, JobState::Finished).await;
        };
        let expected_columns = title.cells.len();

        let mut skipped_rows: HashSet<u64> = HashSet::new();
        while let Some(row) = Self::next_row(&mut source)? {
            if self.cancellation_requested(status).await? {
                return self.finish(status, JobState::Cancelled).await;
            }
            status.total_rows += 1;

            let mut sink = FaultSink::new();
            if row.cells.len() != expected_columns {
                sink.record_error(
                    codes::WRONG_COLUMNS_NUMBER,
                    vec![expected_columns.to_string(), row.cells.len().to_string()],
                );
            } else {
                let entity = self.validation_target(job, schema, &binder, &row, scope)?;
                let outcome = binder.validate_row(&entity, &row, &ctx, &mut sink)?;
                if outcome == BindOutcome::Bound
                    && !sink.has_error()
                    && job.operation.creates_entities()
                {
                    if let Some(guid) = Self::present_guid(&binder, &row) {
                        session.remember(guid);
                    }
                }
            }

            if sink.has_error() {
                status.failed_rows += 1;
                skipped_rows.insert(row.row_number);
                self.record_bad_row(status, &row, sink.drain()).await?;
                if Self::threshold_breached(job, status) {
                    debug!(row_number = row.row_number, "校验阶段坏行数超限");
                    return self.finish(status, JobState::ValidationFailed).await;
                }
            } else if !sink.is_empty() {
                self.record_bad_row(status, &row, sink.drain()).await?;
            }
            self.status_repo.update(status).await?;
        }

        // ==========================================
        // 步骤 3: 校验通过, 转入提交
        // ==========================================
        self.transition(status, JobState::QueuedForImport)?;
        self.status_repo.update(status).await?;
        self.transition(status, JobState::Importing)?;
        self.status_repo.update(status).await?;

        // ==========================================
        // 步骤 4: 提交趟 (重开行来源, 跳过校验失败行)
        // ==========================================
        let mut source = open_row_source(
            Path::new(&job.source_file),
            job.column_delimiter,
            job.text_qualifier,
        )?;
        // 跳过标题行
        let _ = Self::next_row(&mut source)?;

        // 清空重建操作按源商品跟踪首次出现
        let mut cleared_sources: HashSet<String> = HashSet::new();

        while let Some(row) = Self::next_row(&mut source)? {
            if self.cancellation_requested(status).await? {
                return self.finish(status, JobState::Cancelled).await;
            }
            status.current_row += 1;

            // 校验失败的行已记录为坏行, 不再消耗阈值预算
            if skipped_rows.contains(&row.row_number) {
                self.status_repo.update(status).await?;
                continue;
            }

            let mut sink = FaultSink::new();
            if row.cells.len() != expected_columns {
                sink.record_error(
                    codes::WRONG_COLUMNS_NUMBER,
                    vec![expected_columns.to_string(), row.cells.len().to_string()],
                );
            } else {
                self.commit_row(job, schema, &binder, &ctx, &row, &mut sink, &mut cleared_sources)
                    .await?;
            }

            if sink.has_error() {
                status.failed_rows += 1;
                self.record_bad_row(status, &row, sink.drain()).await?;
                if Self::threshold_breached(job, status) {
                    // 数据通过了校验但任务整体未能按配置完成
                    debug!(row_number = row.row_number, "提交阶段坏行数超限");
                    return self.finish(status, JobState::Failed).await;
                }
            } else if !sink.is_empty() {
                self.record_bad_row(status, &row, sink.drain()).await?;
            }
            self.status_repo.update(status).await?;
        }

        // ==========================================
        // 步骤 5: 收尾
        // ==========================================
        self.finish(status, JobState::Finished).await
    }

    /// 提交单行: 按操作类型分发
    #[allow(clippy::too_many_arguments)]
    async fn commit_row(
        &self,
        job: &ImportJob,
        schema: &EntitySchema,
        binder: &RowBinder<'_>,
        ctx: &BindContext<'_>,
        row: &SourceRow,
        sink: &mut FaultSink,
        cleared_sources: &mut HashSet<String>,
    ) -> EngineResult<()> {
        let scope = job.scope_guid();

        match job.operation {
            ImportOperation::Insert => {
                if let Some(guid) = Self::present_guid(binder, row) {
                    if self.store.load(schema.kind(), guid, scope)?.is_some() {
                        sink.record_error(codes::ALREADY_EXISTS, vec![guid.to_string()]);
                        return Ok(());
                    }
                }
                let mut entity = schema.new_entity(scope)?;
                if binder.bind_row(&mut entity, row, ctx, sink)? == BindOutcome::GuidRejected {
                    return Ok(());
                }
                if sink.has_error() {
                    return Ok(());
                }
                self.store.save(&entity)?;
            }

            ImportOperation::Update => {
                let guid = Self::present_guid(binder, row).unwrap_or("");
                match self.store.load(schema.kind(), guid, scope)? {
                    Some(mut entity) => {
                        if binder.bind_row(&mut entity, row, ctx, sink)?
                            == BindOutcome::GuidRejected
                        {
                            return Ok(());
                        }
                        if sink.has_error() {
                            return Ok(());
                        }
                        self.store.save(&entity)?;
                    }
                    None => {
                        sink.record_error(codes::DOES_NOT_EXIST, vec![guid.to_string()]);
                    }
                }
            }

            ImportOperation::InsertOrUpdate => {
                let mut entity = match Self::present_guid(binder, row) {
                    Some(guid) => match self.store.load(schema.kind(), guid, scope)? {
                        Some(existing) => existing,
                        None => schema.new_entity(scope)?,
                    },
                    None => schema.new_entity(scope)?,
                };
                if binder.bind_row(&mut entity, row, ctx, sink)? == BindOutcome::GuidRejected {
                    return Ok(());
                }
                if sink.has_error() {
                    return Ok(());
                }
                self.store.save(&entity)?;
            }

            ImportOperation::Delete => {
                let guid = Self::present_guid(binder, row).unwrap_or("");
                match self.store.load(schema.kind(), guid, scope)? {
                    None => {
                        // 目标缺失按警告跳过, 不计入失败行
                        sink.record_warning(codes::DOES_NOT_EXIST, vec![guid.to_string()]);
                    }
                    Some(_) => {
                        if schema.kind() == EntityKind::Category {
                            // 分类删除语义是整棵子树
                            self.store.remove_category_tree(guid, scope)?;
                        } else {
                            self.store.delete(schema.kind(), guid, scope)?;
                        }
                    }
                }
            }

            ImportOperation::ClearThenInsert => {
                let mut entity = schema.new_entity(scope)?;
                if binder.bind_row(&mut entity, row, ctx, sink)? == BindOutcome::GuidRejected {
                    return Ok(());
                }
                if sink.has_error() {
                    return Ok(());
                }
                if let Some(assoc) = entity.as_association() {
                    // 源商品在本次运行首次出现时清空其既有关联
                    let source_code = assoc.source_product_code.clone();
                    if cleared_sources.insert(source_code.clone()) {
                        self.store.clear_product_associations(&source_code, scope)?;
                    }
                }
                self.store.save(&entity)?;
            }
        }

        Ok(())
    }

    /// 校验趟的目标实体: 寻址型操作加载既有实体, 否则用新实体做检查基底
    fn validation_target(
        &self,
        job: &ImportJob,
        schema: &EntitySchema,
        binder: &RowBinder<'_>,
        row: &SourceRow,
        scope: &str,
    ) -> EngineResult<crate::domain::CatalogEntity> {
        if job.operation.addresses_existing() {
            if let Some(guid) = Self::present_guid(binder, row) {
                if let Some(existing) = self.store.load(schema.kind(), guid, scope)? {
                    return Ok(existing);
                }
            }
        }
        Ok(schema.new_entity(scope)?)
    }

    /// 行内业务标识原始值; 空值惯例按未提供处理
    fn present_guid<'r>(binder: &RowBinder<'_>, row: &'r SourceRow) -> Option<&'r str> {
        binder.guid_value(row).filter(|raw| !is_null_value(raw))
    }

    fn next_row(source: &mut Box<dyn RowSource>) -> EngineResult<Option<SourceRow>> {
        source
            .next_row()
            .map_err(|e| EngineError::RowSource(e.to_string()))
    }

    fn threshold_breached(job: &ImportJob, status: &ImportJobStatus) -> bool {
        status.failed_rows > u64::from(job.max_allowed_faults)
    }

    async fn cancellation_requested(&self, status: &ImportJobStatus) -> EngineResult<bool> {
        Ok(self
            .status_repo
            .is_cancellation_requested(&status.process_id)
            .await?)
    }

    /// 坏行落库; 明细超过上限后只推进计数
    async fn record_bad_row(
        &self,
        status: &mut ImportJobStatus,
        row: &SourceRow,
        faults: Vec<Fault>,
    ) -> EngineResult<()> {
        if status.bad_rows.len() < MAX_RECORDED_BAD_ROWS {
            let bad = BadRow::new(row.row_number, &row.raw_text, faults);
            self.status_repo
                .append_bad_rows(&status.process_id, std::slice::from_ref(&bad))
                .await?;
            status.bad_rows.push(bad);
        }
        Ok(())
    }

    fn transition(&self, status: &mut ImportJobStatus, next: JobState) -> EngineResult<()> {
        if !status.state.can_transition_to(next) {
            return Err(EngineError::InvalidStateTransition {
                from: status.state,
                to: next,
            });
        }
        debug!(from = %status.state, to = %next, "任务状态迁移");
        status.state = next;
        status.last_modified = Utc::now();
        Ok(())
    }

    async fn finish(
        &self,
        status: &mut ImportJobStatus,
        terminal: JobState,
    ) -> EngineResult<JobState> {
        self.transition(status, terminal)?;
        status.end_time = Some(Utc::now());
        self.status_repo.update(status).await?;
        Ok(terminal)
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AssociationKind, CatalogEntity, CategoryType, FaultSeverity, MetaObject, ProductType,
        StoreContext,
    };
    use crate::repository::RepositoryResult;
    use crate::schema::SchemaRegistry;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    // ===== 内存协作方 =====

    #[derive(Default)]
    struct MemoryStore {
        entities: Mutex<HashMap<(EntityKind, String, String), CatalogEntity>>,
        associations: Mutex<Vec<crate::domain::ProductAssociation>>,
        references: Mutex<HashSet<(ReferenceKind, String, String)>>,
        cleared_sources: Mutex<Vec<String>>,
        removed_trees: Mutex<Vec<String>>,
    }

    impl MemoryStore {
        fn seed_entity(&self, entity: CatalogEntity) {
            self.entities.lock().unwrap().insert(
                (
                    entity.kind(),
                    entity.guid().to_string(),
                    entity.scope_guid().to_string(),
                ),
                entity,
            );
        }

        fn seed_reference(&self, kind: ReferenceKind, guid: &str, scope: &str) {
            self.references
                .lock()
                .unwrap()
                .insert((kind, guid.to_string(), scope.to_string()));
        }

        fn entity_count(&self) -> usize {
            self.entities.lock().unwrap().len()
        }

        fn has_entity(&self, kind: EntityKind, guid: &str, scope: &str) -> bool {
            self.entities
                .lock()
                .unwrap()
                .contains_key(&(kind, guid.to_string(), scope.to_string()))
        }
    }

    impl EntityStore for MemoryStore {
        fn load(
            &self,
            kind: EntityKind,
            guid: &str,
            scope_guid: &str,
        ) -> Result<Option<CatalogEntity>, CollaboratorError> {
            Ok(self
                .entities
                .lock()
                .unwrap()
                .get(&(kind, guid.to_string(), scope_guid.to_string()))
                .cloned())
        }

        fn save(&self, entity: &CatalogEntity) -> Result<(), CollaboratorError> {
            if let CatalogEntity::ProductAssociation(assoc) = entity {
                self.associations.lock().unwrap().push(assoc.clone());
                return Ok(());
            }
            self.seed_entity(entity.clone());
            Ok(())
        }

        fn delete(
            &self,
            kind: EntityKind,
            guid: &str,
            scope_guid: &str,
        ) -> Result<(), CollaboratorError> {
            self.entities
                .lock()
                .unwrap()
                .remove(&(kind, guid.to_string(), scope_guid.to_string()));
            Ok(())
        }

        fn remove_category_tree(
            &self,
            code: &str,
            catalog_guid: &str,
        ) -> Result<(), CollaboratorError> {
            self.removed_trees.lock().unwrap().push(code.to_string());
            self.entities.lock().unwrap().remove(&(
                EntityKind::Category,
                code.to_string(),
                catalog_guid.to_string(),
            ));
            Ok(())
        }

        fn clear_product_associations(
            &self,
            source_product_code: &str,
            catalog_guid: &str,
        ) -> Result<(), CollaboratorError> {
            self.cleared_sources
                .lock()
                .unwrap()
                .push(source_product_code.to_string());
            self.associations.lock().unwrap().retain(|a| {
                a.source_product_code != source_product_code || a.catalog_guid != catalog_guid
            });
            Ok(())
        }
    }

    impl ReferenceResolver for MemoryStore {
        fn find_by_guid(
            &self,
            kind: ReferenceKind,
            guid: &str,
            scope_guid: Option<&str>,
        ) -> Result<Option<CatalogEntity>, CollaboratorError> {
            let entity_kind = match kind {
                ReferenceKind::Category => EntityKind::Category,
                ReferenceKind::Product => EntityKind::Product,
                ReferenceKind::ProductSku => EntityKind::ProductSku,
                ReferenceKind::Customer => EntityKind::Customer,
                _ => return Ok(None),
            };
            let entities = self.entities.lock().unwrap();
            Ok(entities
                .iter()
                .find(|((k, g, s), _)| {
                    *k == entity_kind
                        && g == guid
                        && scope_guid.map(|want| s == want).unwrap_or(true)
                })
                .map(|(_, e)| e.clone()))
        }

        fn exists_by_guid(
            &self,
            kind: ReferenceKind,
            guid: &str,
            scope_guid: Option<&str>,
        ) -> Result<bool, CollaboratorError> {
            if self.find_by_guid(kind, guid, scope_guid)?.is_some() {
                return Ok(true);
            }
            let references = self.references.lock().unwrap();
            Ok(references.iter().any(|(k, g, s)| {
                *k == kind && g == guid && scope_guid.map(|want| s == want).unwrap_or(true)
            }))
        }
    }

    #[derive(Default)]
    struct MemoryStatusRepo {
        snapshots: Mutex<HashMap<String, ImportJobStatus>>,
        bad_rows: Mutex<Vec<BadRow>>,
        // 第 N 次取消轮询返回 true (None 表示永不取消)
        cancel_on_poll: Mutex<Option<u32>>,
        poll_count: Mutex<u32>,
    }

    impl MemoryStatusRepo {
        fn cancel_on_poll(n: u32) -> Self {
            Self {
                cancel_on_poll: Mutex::new(Some(n)),
                ..Self::default()
            }
        }

        fn recorded_bad_rows(&self) -> Vec<BadRow> {
            self.bad_rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ImportStatusRepository for MemoryStatusRepo {
        async fn insert(&self, status: &ImportJobStatus) -> RepositoryResult<()> {
            self.snapshots
                .lock()
                .unwrap()
                .insert(status.process_id.clone(), status.clone());
            Ok(())
        }

        async fn update(&self, status: &ImportJobStatus) -> RepositoryResult<()> {
            self.snapshots
                .lock()
                .unwrap()
                .insert(status.process_id.clone(), status.clone());
            Ok(())
        }

        async fn append_bad_rows(
            &self,
            _process_id: &str,
            rows: &[BadRow],
        ) -> RepositoryResult<usize> {
            self.bad_rows.lock().unwrap().extend_from_slice(rows);
            Ok(rows.len())
        }

        async fn find_by_process_id(
            &self,
            process_id: &str,
        ) -> RepositoryResult<Option<ImportJobStatus>> {
            Ok(self.snapshots.lock().unwrap().get(process_id).cloned())
        }

        async fn find_latest_for_job(
            &self,
            _job_guid: &str,
        ) -> RepositoryResult<Option<ImportJobStatus>> {
            Ok(None)
        }

        async fn list_for_job(&self, _job_guid: &str) -> RepositoryResult<Vec<ImportJobStatus>> {
            Ok(Vec::new())
        }

        async fn request_cancellation(&self, _process_id: &str) -> RepositoryResult<bool> {
            Ok(false)
        }

        async fn is_cancellation_requested(&self, _process_id: &str) -> RepositoryResult<bool> {
            let mut count = self.poll_count.lock().unwrap();
            *count += 1;
            let trigger = *self.cancel_on_poll.lock().unwrap();
            Ok(trigger.map(|n| *count >= n).unwrap_or(false))
        }

        async fn list_bad_rows(&self, _process_id: &str) -> RepositoryResult<Vec<BadRow>> {
            Ok(self.recorded_bad_rows())
        }
    }

    // ===== 测试脚手架 =====

    const CATALOG: &str = "CAT-MAIN";

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn category_schema() -> EntitySchema {
        SchemaRegistry::with_defaults()
            .build_schema(
                EntityKind::Category,
                Some(MetaObject::CategoryType(CategoryType::new("STANDARD"))),
                StoreContext::minimal("en", "USD"),
            )
            .unwrap()
    }

    fn category_job(file: &NamedTempFile, op: ImportOperation, max_faults: u32) -> ImportJob {
        let mut job = ImportJob::new(
            "categories",
            file.path().to_str().unwrap(),
            EntityKind::Category,
            op,
        )
        .map_column("categoryCode", 0)
        .map_column("displayName(en)", 1);
        job.catalog_guid = Some(CATALOG.to_string());
        job.max_allowed_faults = max_faults;
        job
    }

    fn runner(
        store: &Arc<MemoryStore>,
        statuses: &Arc<MemoryStatusRepo>,
    ) -> ImportJobRunner<MemoryStore, MemoryStore, MemoryStatusRepo> {
        ImportJobRunner::new(Arc::clone(store), Arc::clone(store), Arc::clone(statuses))
    }

    async fn run_job(
        job: &ImportJob,
        schema: &EntitySchema,
        store: &Arc<MemoryStore>,
        statuses: &Arc<MemoryStatusRepo>,
    ) -> (EngineResult<JobState>, ImportJobStatus) {
        let mut status = ImportJobStatus::new(&job.guid, "admin");
        statuses.insert(&status).await.unwrap();
        let outcome = runner(store, statuses).run(job, schema, &mut status).await;
        (outcome, status)
    }

    // ===== 状态机与阈值 =====

    #[tokio::test]
    async fn test_clean_file_finishes_with_all_rows_committed() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let file = write_csv(&[
            "categoryCode,displayName(en)",
            "C1,Shoes",
            "C2,Bags",
            "C3,Hats",
        ]);
        let job = category_job(&file, ImportOperation::Insert, 0);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        assert_eq!(status.state, JobState::Finished);
        assert_eq!(status.total_rows, 3);
        assert_eq!(status.current_row, 3);
        assert_eq!(status.failed_rows, 0);
        assert_eq!(status.succeeded_rows(), 3);
        assert!(status.start_time.is_some());
        assert!(status.end_time.is_some());
        assert_eq!(store.entity_count(), 3);
        assert!(store.has_entity(EntityKind::Category, "C2", CATALOG));
    }

    #[tokio::test]
    async fn test_faults_at_threshold_still_finish() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        // 数据行 2 与 4 缺必填业务标识 (物理行号 3 与 5)
        let file = write_csv(&[
            "categoryCode,displayName(en)",
            "C1,Shoes",
            ",Bags",
            "C3,Hats",
            ",Socks",
            "C5,Belts",
        ]);
        let job = category_job(&file, ImportOperation::Insert, 2);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        assert_eq!(status.total_rows, 5);
        assert_eq!(status.current_row, 5);
        assert_eq!(status.failed_rows, 2);
        assert_eq!(status.succeeded_rows(), 3);
        assert_eq!(store.entity_count(), 3);
        // 坏行只在校验趟记录一次, 提交趟跳过它们
        assert_eq!(statuses.recorded_bad_rows().len(), 2);
    }

    #[tokio::test]
    async fn test_faults_over_threshold_fail_validation() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let file = write_csv(&[
            "categoryCode,displayName(en)",
            "C1,Shoes",
            ",Bags",
            "C3,Hats",
            ",Socks",
        ]);
        let job = category_job(&file, ImportOperation::Insert, 1);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::ValidationFailed);
        assert_eq!(status.failed_rows, 2);
        // 越限行本身也被记录
        let recorded = statuses.recorded_bad_rows();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].row_number, 3);
        assert_eq!(recorded[1].row_number, 5);
        assert_eq!(recorded[0].faults[0].code, codes::NOT_NULL);
        // 校验失败路径不写任何实体
        assert_eq!(store.entity_count(), 0);
    }

    #[tokio::test]
    async fn test_wrong_column_count_is_a_row_fault() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let file = write_csv(&[
            "categoryCode,displayName(en)",
            "C1,Shoes,EXTRA",
            "C2,Bags",
        ]);
        let job = category_job(&file, ImportOperation::Insert, 1);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        assert_eq!(status.failed_rows, 1);
        let recorded = statuses.recorded_bad_rows();
        assert_eq!(recorded[0].faults[0].code, codes::WRONG_COLUMNS_NUMBER);
        assert_eq!(recorded[0].faults[0].args, vec!["2", "3"]);
        assert!(store.has_entity(EntityKind::Category, "C2", CATALOG));
        assert!(!store.has_entity(EntityKind::Category, "C1", CATALOG));
    }

    #[tokio::test]
    async fn test_empty_file_finishes_with_zero_rows() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let file = write_csv(&[]);
        let job = category_job(&file, ImportOperation::Insert, 0);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        assert_eq!(status.total_rows, 0);
        assert_eq!(status.current_row, 0);
    }

    #[tokio::test]
    async fn test_cancellation_observed_between_rows() {
        let store = Arc::new(MemoryStore::default());
        // 第 3 次轮询返回取消: 校验趟第 3 个数据行之前停下
        let statuses = Arc::new(MemoryStatusRepo::cancel_on_poll(3));
        let file = write_csv(&[
            "categoryCode,displayName(en)",
            "C1,Shoes",
            "C2,Bags",
            "C3,Hats",
            "C4,Socks",
        ]);
        let job = category_job(&file, ImportOperation::Insert, 0);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Cancelled);
        assert_eq!(status.state, JobState::Cancelled);
        assert!(status.end_time.is_some());
        // 校验趟即被取消, 未进入提交
        assert_eq!(store.entity_count(), 0);
        assert_eq!(status.total_rows, 2);
    }

    // ===== 操作类型分发 =====

    #[tokio::test]
    async fn test_insert_faults_on_existing_guid() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let mut existing = crate::domain::Category::new(CATALOG, "STANDARD");
        existing.code = "C1".to_string();
        store.seed_entity(CatalogEntity::Category(existing));

        let file = write_csv(&["categoryCode,displayName(en)", "C1,Shoes", "C2,Bags"]);
        let job = category_job(&file, ImportOperation::Insert, 1);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        assert_eq!(status.failed_rows, 1);
        let recorded = statuses.recorded_bad_rows();
        assert_eq!(recorded[0].faults[0].code, codes::ALREADY_EXISTS);
        assert_eq!(recorded[0].faults[0].args, vec!["C1"]);
        assert!(store.has_entity(EntityKind::Category, "C2", CATALOG));
    }

    #[tokio::test]
    async fn test_update_missing_guid_breaches_in_commit_phase() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let file = write_csv(&["categoryCode,displayName(en)", "GHOST,Shoes"]);
        let job = category_job(&file, ImportOperation::Update, 0);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        // 数据通过校验, 提交阶段超限落 Failed 而非 ValidationFailed
        assert_eq!(outcome.unwrap(), JobState::Failed);
        assert_eq!(status.failed_rows, 1);
        let recorded = statuses.recorded_bad_rows();
        assert_eq!(recorded[0].faults[0].code, codes::DOES_NOT_EXIST);
    }

    #[tokio::test]
    async fn test_update_rewrites_existing_entity() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let mut existing = crate::domain::Category::new(CATALOG, "STANDARD");
        existing.code = "C1".to_string();
        existing
            .display_name
            .insert("en".to_string(), "Old".to_string());
        store.seed_entity(CatalogEntity::Category(existing));

        let file = write_csv(&["categoryCode,displayName(en)", "C1,Shoes"]);
        let job = category_job(&file, ImportOperation::Update, 0);
        let schema = category_schema();

        let (outcome, _status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        let entities = store.entities.lock().unwrap();
        let updated = entities
            .get(&(EntityKind::Category, "C1".to_string(), CATALOG.to_string()))
            .unwrap();
        assert_eq!(
            updated.as_category().unwrap().display_name.get("en"),
            Some(&"Shoes".to_string())
        );
    }

    #[tokio::test]
    async fn test_delete_missing_guid_warns_and_skips() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let mut existing = crate::domain::Category::new(CATALOG, "STANDARD");
        existing.code = "C1".to_string();
        store.seed_entity(CatalogEntity::Category(existing));

        let file = write_csv(&["categoryCode", "C1", "GHOST"]);
        let mut job = ImportJob::new(
            "categories-drop",
            file.path().to_str().unwrap(),
            EntityKind::Category,
            ImportOperation::Delete,
        )
        .map_column("categoryCode", 0);
        job.catalog_guid = Some(CATALOG.to_string());

        let schema = category_schema();
        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        // 缺失目标是警告级坏行, max_allowed_faults = 0 也能完成
        assert_eq!(outcome.unwrap(), JobState::Finished);
        assert_eq!(status.failed_rows, 0);
        let recorded = statuses.recorded_bad_rows();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].faults[0].severity, FaultSeverity::Warning);
        assert_eq!(recorded[0].faults[0].code, codes::DOES_NOT_EXIST);
        // 分类删除走整树移除
        assert_eq!(store.removed_trees.lock().unwrap().as_slice(), ["C1"]);
    }

    #[tokio::test]
    async fn test_clear_then_insert_clears_once_per_source() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        for code in ["P1", "P2", "X1", "X2", "X3"] {
            let mut product = crate::domain::Product::new(CATALOG, "SIMPLE");
            product.code = code.to_string();
            store.seed_entity(CatalogEntity::Product(product));
        }
        // P1 既有一条旧关联, 导入后应只剩新数据
        let mut stale = crate::domain::ProductAssociation::new(CATALOG);
        stale.source_product_code = "P1".to_string();
        stale.target_product_code = "OLD".to_string();
        store.associations.lock().unwrap().push(stale);

        let file = write_csv(&[
            "sourceProductCode,targetProductCode,associationType",
            "P1,X1,CROSS_SELL",
            "P2,X2,UP_SELL",
            "P1,X3,CROSS_SELL",
        ]);
        let mut job = ImportJob::new(
            "associations-rebuild",
            file.path().to_str().unwrap(),
            EntityKind::ProductAssociation,
            ImportOperation::ClearThenInsert,
        )
        .map_column("sourceProductCode", 0)
        .map_column("targetProductCode", 1)
        .map_column("associationType", 2);
        job.catalog_guid = Some(CATALOG.to_string());

        let schema = SchemaRegistry::with_defaults()
            .build_schema(
                EntityKind::ProductAssociation,
                None,
                StoreContext::minimal("en", "USD"),
            )
            .unwrap();

        let (outcome, _status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        // 每个源商品只清一次
        assert_eq!(store.cleared_sources.lock().unwrap().as_slice(), ["P1", "P2"]);
        let associations = store.associations.lock().unwrap();
        assert_eq!(associations.len(), 3);
        assert!(associations.iter().all(|a| a.target_product_code != "OLD"));
        assert_eq!(
            associations
                .iter()
                .filter(|a| a.source_product_code == "P1")
                .count(),
            2
        );
        assert!(associations
            .iter()
            .any(|a| a.kind == AssociationKind::UpSell));
    }

    // ===== 同文件前后行引用 =====

    #[tokio::test]
    async fn test_child_row_resolves_parent_created_earlier_in_file() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let file = write_csv(&[
            "categoryCode,parentCategoryCode,displayName(en)",
            "ROOT,,Root",
            "SHOES,ROOT,Shoes",
        ]);
        let mut job = ImportJob::new(
            "categories-tree",
            file.path().to_str().unwrap(),
            EntityKind::Category,
            ImportOperation::Insert,
        )
        .map_column("categoryCode", 0)
        .map_column("parentCategoryCode", 1)
        .map_column("displayName(en)", 2);
        job.catalog_guid = Some(CATALOG.to_string());

        let schema = category_schema();
        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        assert_eq!(status.failed_rows, 0);
        let entities = store.entities.lock().unwrap();
        let child = entities
            .get(&(
                EntityKind::Category,
                "SHOES".to_string(),
                CATALOG.to_string(),
            ))
            .unwrap();
        assert_eq!(
            child.as_category().unwrap().parent_code.as_deref(),
            Some("ROOT")
        );
    }

    #[tokio::test]
    async fn test_unresolvable_parent_is_still_a_fault() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let file = write_csv(&[
            "categoryCode,parentCategoryCode,displayName(en)",
            "SHOES,MISSING,Shoes",
        ]);
        let mut job = ImportJob::new(
            "categories-tree",
            file.path().to_str().unwrap(),
            EntityKind::Category,
            ImportOperation::Insert,
        )
        .map_column("categoryCode", 0)
        .map_column("parentCategoryCode", 1)
        .map_column("displayName(en)", 2);
        job.catalog_guid = Some(CATALOG.to_string());

        let schema = category_schema();
        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::ValidationFailed);
        assert_eq!(status.failed_rows, 1);
        let recorded = statuses.recorded_bad_rows();
        assert_eq!(recorded[0].faults[0].code, codes::UNRESOLVED_REFERENCE);
    }

    // ===== 坏行明细上限 =====

    #[tokio::test]
    async fn test_bad_row_details_capped_but_counters_keep_counting() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());

        let mut lines: Vec<String> = vec!["categoryCode,displayName(en)".to_string()];
        for i in 0..(MAX_RECORDED_BAD_ROWS + 10) {
            lines.push(format!(",Bad{}", i));
        }
        let line_refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = write_csv(&line_refs);

        let job = category_job(&file, ImportOperation::Insert, u32::MAX);
        let schema = category_schema();

        let (outcome, status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        assert_eq!(status.failed_rows, (MAX_RECORDED_BAD_ROWS + 10) as u64);
        assert_eq!(status.bad_rows.len(), MAX_RECORDED_BAD_ROWS);
        assert_eq!(statuses.recorded_bad_rows().len(), MAX_RECORDED_BAD_ROWS);
    }

    // ===== 配置预检 =====

    #[tokio::test]
    async fn test_unsupported_operation_fails_before_rows() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        let file = write_csv(&["skuCode,quantityOnHand", "SKU-1,5"]);
        let mut job = ImportJob::new(
            "stock-drop",
            file.path().to_str().unwrap(),
            EntityKind::Inventory,
            ImportOperation::Delete,
        )
        .map_column("skuCode", 0)
        .map_column("quantityOnHand", 1);
        job.warehouse_guid = Some("WH-1".to_string());

        let schema = SchemaRegistry::with_defaults()
            .build_schema(EntityKind::Inventory, None, StoreContext::minimal("en", "USD"))
            .unwrap();

        let mut status = ImportJobStatus::new(&job.guid, "admin");
        statuses.insert(&status).await.unwrap();
        let outcome = runner(&store, &statuses)
            .run(&job, &schema, &mut status)
            .await;

        assert!(matches!(
            outcome,
            Err(EngineError::Schema(
                crate::schema::SchemaError::UnsupportedOperation { .. }
            ))
        ));
        // 系统性失败落 Failed 终态
        assert_eq!(status.state, JobState::Failed);
        assert_eq!(status.total_rows, 0);
    }

    #[tokio::test]
    async fn test_single_sku_product_insert_keeps_embedded_sku() {
        let store = Arc::new(MemoryStore::default());
        let statuses = Arc::new(MemoryStatusRepo::default());
        // 品牌是纯引用数据, 只有存在性可查
        store.seed_reference(ReferenceKind::Brand, "ACME", CATALOG);
        let mut parent = crate::domain::Category::new(CATALOG, "STANDARD");
        parent.code = "ROOT".to_string();
        store.seed_entity(CatalogEntity::Category(parent));

        let file = write_csv(&[
            "productCode,defaultCategoryCode,displayName(en),listPrice(USD),skuCode,brandCode",
            "P1,ROOT,Sneaker,49.90,P1-SKU,ACME",
        ]);
        let mut job = ImportJob::new(
            "products",
            file.path().to_str().unwrap(),
            EntityKind::Product,
            ImportOperation::Insert,
        )
        .map_column("productCode", 0)
        .map_column("defaultCategoryCode", 1)
        .map_column("displayName(en)", 2)
        .map_column("listPrice(USD)", 3)
        .map_column("skuCode", 4)
        .map_column("brandCode", 5);
        job.catalog_guid = Some(CATALOG.to_string());

        let schema = SchemaRegistry::with_defaults()
            .build_schema(
                EntityKind::Product,
                Some(MetaObject::ProductType(ProductType::new("SIMPLE", false))),
                StoreContext::minimal("en", "USD"),
            )
            .unwrap();

        let (outcome, _status) = run_job(&job, &schema, &store, &statuses).await;

        assert_eq!(outcome.unwrap(), JobState::Finished);
        let entities = store.entities.lock().unwrap();
        let product = entities
            .get(&(EntityKind::Product, "P1".to_string(), CATALOG.to_string()))
            .unwrap();
        let product = product.as_product().unwrap();
        assert_eq!(product.brand_code.as_deref(), Some("ACME"));
        let sku = product.default_sku.as_ref().unwrap();
        assert_eq!(sku.code, "P1-SKU");
        assert_eq!(sku.product_code, "P1");
    }
}
