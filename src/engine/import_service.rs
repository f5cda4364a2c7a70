// ==========================================
// 商品目录数据导入引擎 - 导入服务门面
// ==========================================
// 职责: 任务配置 CRUD、任务校验、运行发起与运行状态查询
// 红线: 服务不触碰行循环, 行级执行全部委托 ImportJobRunner
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::{BadRow, EntityKind, ImportJob, ImportJobStatus, MetaObject};
use crate::engine::contracts::{EntityStore, ReferenceResolver};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::job_runner::ImportJobRunner;
use crate::repository::{ImportJobRepository, ImportStatusRepository};
use crate::schema::{EntitySchema, SchemaRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

// ==========================================
// ImportService Trait
// ==========================================
// 用途: 嵌入方操作导入子系统的统一入口
// 实现者: ImportServiceImpl
#[async_trait]
pub trait ImportService: Send + Sync {
    /// 保存任务配置 (已存在则整体覆盖)
    async fn save_job(&self, job: &ImportJob) -> EngineResult<()>;

    /// 按任务标识查找
    ///
    /// # 返回
    /// - Err(JobNotFound): 任务不存在
    async fn find_job(&self, job_guid: &str) -> EngineResult<ImportJob>;

    /// 全部任务, 按创建时间倒序
    async fn list_jobs(&self) -> EngineResult<Vec<ImportJob>>;

    /// 删除任务配置 (级联删除其运行状态与坏行记录)
    ///
    /// # 返回
    /// - Ok(true): 删除了一条记录
    /// - Ok(false): 任务不存在
    async fn remove_job(&self, job_guid: &str) -> EngineResult<bool>;

    /// 已注册的实体类型
    fn list_entity_kinds(&self) -> Vec<EntityKind>;

    /// 校验任务配置 (不读数据文件)
    ///
    /// # 说明
    /// 覆盖全部配置级错误: 作用域缺失、元对象未登记、操作不支持、
    /// 列映射指向未知字段、重复列序号、必填字段未映射
    async fn validate_job(&self, job: &ImportJob) -> EngineResult<()>;

    /// 发起一次运行, 同步驱动两遍执行直到终态
    ///
    /// # 返回
    /// - Ok(String): 本次运行的 process_id
    async fn run_job(&self, job_guid: &str, started_by: &str) -> EngineResult<String>;

    /// 请求取消一次运行
    ///
    /// # 返回
    /// - Ok(true): 标记已写入, 执行器将在下一行边界停止
    /// - Ok(false): 运行不存在或已进入终态
    async fn request_cancellation(&self, process_id: &str) -> EngineResult<bool>;

    /// 按运行标识查询状态 (坏行明细一并装载)
    ///
    /// # 返回
    /// - Err(StatusNotFound): 运行不存在
    async fn find_status(&self, process_id: &str) -> EngineResult<ImportJobStatus>;

    /// 任务最近一次运行状态
    async fn find_latest_status(&self, job_guid: &str) -> EngineResult<Option<ImportJobStatus>>;

    /// 一次运行的坏行明细, 按行号排序
    async fn list_bad_rows(&self, process_id: &str) -> EngineResult<Vec<BadRow>>;
}

// ==========================================
// ImportServiceImpl
// ==========================================
pub struct ImportServiceImpl<J: ?Sized, T: ?Sized, C: ?Sized, P>
where
    J: ImportJobRepository,
    T: ImportStatusRepository,
    C: ImportConfigReader,
    P: EntityStore + ReferenceResolver,
{
    job_repo: Arc<J>,
    status_repo: Arc<T>,
    config: Arc<C>,
    store: Arc<P>,
    registry: SchemaRegistry,
}

impl<J: ?Sized, T: ?Sized, C: ?Sized, P> ImportServiceImpl<J, T, C, P>
where
    J: ImportJobRepository,
    T: ImportStatusRepository,
    C: ImportConfigReader,
    P: EntityStore + ReferenceResolver,
{
    /// 创建新的服务实例
    ///
    /// # 参数
    /// - job_repo: 任务配置仓储
    /// - status_repo: 运行状态仓储
    /// - config: 配置读取协作方
    /// - store: 实体存储 (同时充当引用解析协作方)
    /// - registry: 实体模式注册表
    pub fn new(
        job_repo: Arc<J>,
        status_repo: Arc<T>,
        config: Arc<C>,
        store: Arc<P>,
        registry: SchemaRegistry,
    ) -> Self {
        Self {
            job_repo,
            status_repo,
            config,
            store,
            registry,
        }
    }

    /// 任务作用域字段名 (错误信息用)
    fn scope_field(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Category
            | EntityKind::Product
            | EntityKind::ProductSku
            | EntityKind::ProductAssociation => "catalog_guid",
            EntityKind::Customer => "store_guid",
            EntityKind::Inventory => "warehouse_guid",
        }
    }

    /// 作用域标识缺失属于配置错误, 任务不启动
    fn ensure_scope(job: &ImportJob) -> EngineResult<()> {
        if job.scope_guid().is_empty() {
            return Err(EngineError::MissingScope(
                Self::scope_field(job.entity_kind).to_string(),
            ));
        }
        Ok(())
    }

    /// 按 dependent_guid 解析任务的元对象
    ///
    /// # 返回
    /// - Ok(None): 该实体类型不需要元对象, 或任务未指定
    /// - Err(MetaObjectNotFound): 指定的名称未登记
    async fn resolve_meta_object(&self, job: &ImportJob) -> EngineResult<Option<MetaObject>> {
        let name = match job.dependent_guid.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return Ok(None),
        };

        match job.entity_kind {
            EntityKind::Category => {
                let category_type = self
                    .config
                    .get_category_type(name)
                    .await?
                    .ok_or_else(|| EngineError::MetaObjectNotFound(name.to_string()))?;
                Ok(Some(MetaObject::CategoryType(category_type)))
            }
            EntityKind::Product | EntityKind::ProductSku => {
                let product_type = self
                    .config
                    .get_product_type(name)
                    .await?
                    .ok_or_else(|| EngineError::MetaObjectNotFound(name.to_string()))?;
                Ok(Some(MetaObject::ProductType(product_type)))
            }
            _ => Ok(None),
        }
    }

    /// 解析元对象与门店上下文并构建实体模式
    async fn build_schema(&self, job: &ImportJob) -> EngineResult<EntitySchema> {
        let meta = self.resolve_meta_object(job).await?;
        let store_context = self
            .config
            .get_store_context(job.store_guid.as_deref())
            .await?;
        Ok(self
            .registry
            .build_schema(job.entity_kind, meta, store_context)?)
    }

    async fn require_job(&self, job_guid: &str) -> EngineResult<ImportJob> {
        self.job_repo
            .find_by_guid(job_guid)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(job_guid.to_string()))
    }
}

#[async_trait]
impl<J: ?Sized, T: ?Sized, C: ?Sized, P> ImportService for ImportServiceImpl<J, T, C, P>
where
    J: ImportJobRepository,
    T: ImportStatusRepository,
    C: ImportConfigReader,
    P: EntityStore + ReferenceResolver,
{
    async fn save_job(&self, job: &ImportJob) -> EngineResult<()> {
        if self.job_repo.find_by_guid(&job.guid).await?.is_some() {
            self.job_repo.update(job).await?;
        } else {
            self.job_repo.insert(job).await?;
        }
        Ok(())
    }

    async fn find_job(&self, job_guid: &str) -> EngineResult<ImportJob> {
        self.require_job(job_guid).await
    }

    async fn list_jobs(&self) -> EngineResult<Vec<ImportJob>> {
        Ok(self.job_repo.list_all().await?)
    }

    async fn remove_job(&self, job_guid: &str) -> EngineResult<bool> {
        Ok(self.job_repo.delete(job_guid).await?)
    }

    fn list_entity_kinds(&self) -> Vec<EntityKind> {
        self.registry.kinds()
    }

    async fn validate_job(&self, job: &ImportJob) -> EngineResult<()> {
        Self::ensure_scope(job)?;
        let schema = self.build_schema(job).await?;
        schema.ensure_supports(job.operation)?;
        schema.validate_mappings(&job.mappings, job.operation)?;
        Ok(())
    }

    async fn run_job(&self, job_guid: &str, started_by: &str) -> EngineResult<String> {
        let job = self.require_job(job_guid).await?;
        Self::ensure_scope(&job)?;
        let schema = self.build_schema(&job).await?;
        // 配置级错误在登记状态行之前拦截, 未开始的运行不留记录
        schema.ensure_supports(job.operation)?;
        schema.validate_mappings(&job.mappings, job.operation)?;

        let mut status = ImportJobStatus::new(&job.guid, started_by);
        self.status_repo.insert(&status).await?;
        info!(
            job_guid = %job.guid,
            process_id = %status.process_id,
            started_by,
            "已登记导入运行"
        );

        let runner = ImportJobRunner::new(
            Arc::clone(&self.store),
            Arc::clone(&self.store),
            Arc::clone(&self.status_repo),
        );
        let final_state = runner.run(&job, &schema, &mut status).await?;
        info!(process_id = %status.process_id, final_state = %final_state, "导入运行结束");

        Ok(status.process_id)
    }

    async fn request_cancellation(&self, process_id: &str) -> EngineResult<bool> {
        Ok(self.status_repo.request_cancellation(process_id).await?)
    }

    async fn find_status(&self, process_id: &str) -> EngineResult<ImportJobStatus> {
        self.status_repo
            .find_by_process_id(process_id)
            .await?
            .ok_or_else(|| EngineError::StatusNotFound(process_id.to_string()))
    }

    async fn find_latest_status(&self, job_guid: &str) -> EngineResult<Option<ImportJobStatus>> {
        Ok(self.status_repo.find_latest_for_job(job_guid).await?)
    }

    async fn list_bad_rows(&self, process_id: &str) -> EngineResult<Vec<BadRow>> {
        Ok(self.status_repo.list_bad_rows(process_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::db;
    use crate::domain::{CategoryType, ImportOperation, JobState};
    use crate::repository::{
        ImportJobRepositoryImpl, ImportStatusRepositoryImpl, SqliteCatalogStore,
    };
    use crate::schema::SchemaError;
    use rusqlite::Connection;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::{Builder, NamedTempFile};

    type SqliteImportService = ImportServiceImpl<
        ImportJobRepositoryImpl,
        ImportStatusRepositoryImpl,
        ConfigManager,
        SqliteCatalogStore,
    >;

    struct Fixture {
        service: SqliteImportService,
        config: Arc<ConfigManager>,
        store: Arc<SqliteCatalogStore>,
        _db_file: NamedTempFile,
    }

    fn fixture() -> Fixture {
        let db_file = NamedTempFile::new().unwrap();
        let db_path = db_file.path().to_str().unwrap().to_string();
        let conn = db::open_sqlite_connection(&db_path).unwrap();
        db::ensure_schema(&conn).unwrap();
        let conn: Arc<Mutex<Connection>> = Arc::new(Mutex::new(conn));

        let job_repo = Arc::new(ImportJobRepositoryImpl::from_connection(Arc::clone(&conn)));
        let status_repo = Arc::new(ImportStatusRepositoryImpl::from_connection(Arc::clone(
            &conn,
        )));
        let config = Arc::new(ConfigManager::from_connection(Arc::clone(&conn)).unwrap());
        let store = Arc::new(SqliteCatalogStore::from_connection(Arc::clone(&conn)));

        let service = ImportServiceImpl::new(
            job_repo,
            status_repo,
            Arc::clone(&config),
            Arc::clone(&store),
            SchemaRegistry::with_defaults(),
        );

        Fixture {
            service,
            config,
            store,
            _db_file: db_file,
        }
    }

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn category_job(source_file: &str) -> ImportJob {
        let mut job = ImportJob::new(
            "categories",
            source_file,
            EntityKind::Category,
            ImportOperation::Insert,
        )
        .map_column("categoryCode", 0)
        .map_column("displayName(en)", 1);
        job.catalog_guid = Some("CAT-MAIN".to_string());
        job.dependent_guid = Some("DefaultCategoryType".to_string());
        job
    }

    fn register_default_category_type(config: &ConfigManager) {
        config
            .register_category_type(&CategoryType::new("DefaultCategoryType"))
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_job_inserts_then_overwrites() {
        let fx = fixture();
        let mut job = category_job("/data/categories.csv");

        fx.service.save_job(&job).await.unwrap();
        job.name = "categories-renamed".to_string();
        job.max_allowed_faults = 7;
        fx.service.save_job(&job).await.unwrap();

        let loaded = fx.service.find_job(&job.guid).await.unwrap();
        assert_eq!(loaded.name, "categories-renamed");
        assert_eq!(loaded.max_allowed_faults, 7);
        assert_eq!(fx.service.list_jobs().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_job_missing_is_not_found() {
        let fx = fixture();

        let err = fx.service.find_job("NOPE").await.unwrap_err();
        assert!(matches!(err, EngineError::JobNotFound(guid) if guid == "NOPE"));
    }

    #[tokio::test]
    async fn test_remove_job_reports_presence() {
        let fx = fixture();
        let job = category_job("/data/categories.csv");
        fx.service.save_job(&job).await.unwrap();

        assert!(fx.service.remove_job(&job.guid).await.unwrap());
        assert!(!fx.service.remove_job(&job.guid).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_entity_kinds_covers_registry() {
        let fx = fixture();

        let kinds = fx.service.list_entity_kinds();
        assert_eq!(kinds.len(), 6);
        assert!(kinds.contains(&EntityKind::Category));
        assert!(kinds.contains(&EntityKind::Inventory));
        assert!(kinds.contains(&EntityKind::ProductAssociation));
    }

    #[tokio::test]
    async fn test_validate_job_passes_for_complete_mapping() {
        let fx = fixture();
        register_default_category_type(&fx.config);

        let job = category_job("/data/categories.csv");
        fx.service.validate_job(&job).await.unwrap();
    }

    #[tokio::test]
    async fn test_validate_job_rejects_missing_scope() {
        let fx = fixture();
        register_default_category_type(&fx.config);
        let mut job = category_job("/data/categories.csv");
        job.catalog_guid = None;

        let err = fx.service.validate_job(&job).await.unwrap_err();
        assert!(matches!(err, EngineError::MissingScope(field) if field == "catalog_guid"));
    }

    #[tokio::test]
    async fn test_validate_job_rejects_unregistered_meta_object() {
        let fx = fixture();
        let mut job = category_job("/data/categories.csv");
        job.dependent_guid = Some("GhostType".to_string());

        let err = fx.service.validate_job(&job).await.unwrap_err();
        assert!(matches!(err, EngineError::MetaObjectNotFound(name) if name == "GhostType"));
    }

    #[tokio::test]
    async fn test_validate_job_rejects_unsupported_operation() {
        let fx = fixture();
        let mut job = ImportJob::new(
            "stock-purge",
            "/data/stock.csv",
            EntityKind::Inventory,
            ImportOperation::Delete,
        )
        .map_column("skuCode", 0);
        job.warehouse_guid = Some("WH-1".to_string());

        let err = fx.service.validate_job(&job).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Schema(SchemaError::UnsupportedOperation { .. })
        ));
    }

    #[tokio::test]
    async fn test_validate_job_rejects_unknown_mapped_field() {
        let fx = fixture();
        register_default_category_type(&fx.config);
        let job = category_job("/data/categories.csv").map_column("noSuchField", 2);

        let err = fx.service.validate_job(&job).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Schema(SchemaError::UnknownField(_))
        ));
    }

    #[tokio::test]
    async fn test_run_job_finishes_and_status_is_queryable() {
        let fx = fixture();
        register_default_category_type(&fx.config);
        let csv = write_csv(&[
            "categoryCode,displayName(en)",
            "SHOES,Shoes",
            "SOCKS,Socks",
        ]);
        let job = category_job(csv.path().to_str().unwrap());
        fx.service.save_job(&job).await.unwrap();

        let process_id = fx.service.run_job(&job.guid, "operator").await.unwrap();
        assert!(!process_id.is_empty());

        let status = fx.service.find_status(&process_id).await.unwrap();
        assert_eq!(status.state, JobState::Finished);
        assert_eq!(status.total_rows, 2);
        assert_eq!(status.failed_rows, 0);
        assert_eq!(status.succeeded_rows(), 2);
        assert!(fx.service.list_bad_rows(&process_id).await.unwrap().is_empty());

        let latest = fx.service.find_latest_status(&job.guid).await.unwrap();
        assert_eq!(latest.map(|s| s.process_id), Some(process_id));

        let saved = fx
            .store
            .load(EntityKind::Category, "SHOES", "CAT-MAIN")
            .unwrap()
            .unwrap();
        let category = saved.as_category().unwrap();
        assert_eq!(category.display_name.get("en").map(String::as_str), Some("Shoes"));
    }

    #[tokio::test]
    async fn test_run_job_missing_job_is_not_found() {
        let fx = fixture();

        let err = fx.service.run_job("NOPE", "operator").await.unwrap_err();
        assert!(matches!(err, EngineError::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_request_cancellation_unknown_process_returns_false() {
        let fx = fixture();

        assert!(!fx.service.request_cancellation("NOPE").await.unwrap());
    }
}
