// ==========================================
// 商品目录数据导入引擎 - 目录实体存储
// ==========================================
// 职责: catalog_entity / product_association / reference_guid 三表的数据访问,
//       同时充当引擎的 EntityStore 与 ReferenceResolver 协作方
// 红线: 实体文档整体以 JSON 存取, 不在 SQL 层拆字段
// ==========================================

use crate::db;
use crate::domain::{CatalogEntity, EntityKind, ReferenceKind};
use crate::engine::{CollaboratorError, EntityStore, ReferenceResolver};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// SqliteCatalogStore
// ==========================================
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// 创建新的存储实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = db::open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 复用既有连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记一条纯引用数据 (品牌/税码/仓库等, 只有存在性可查)
    pub fn insert_reference(
        &self,
        kind: ReferenceKind,
        guid: &str,
        scope_guid: &str,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO reference_guid (ref_kind, guid, scope_guid) \
             VALUES (?1, ?2, ?3)",
            params![kind.to_db_str(), guid, scope_guid],
        )?;
        Ok(())
    }

    /// 引用类型对应的实体类型; 纯引用数据返回 None
    fn entity_kind_of(kind: ReferenceKind) -> Option<EntityKind> {
        match kind {
            ReferenceKind::Category => Some(EntityKind::Category),
            ReferenceKind::Product => Some(EntityKind::Product),
            ReferenceKind::ProductSku => Some(EntityKind::ProductSku),
            ReferenceKind::Customer => Some(EntityKind::Customer),
            ReferenceKind::Brand | ReferenceKind::TaxCode | ReferenceKind::Warehouse => None,
        }
    }

    fn load_with_conn(
        conn: &Connection,
        kind: EntityKind,
        guid: &str,
        scope_guid: Option<&str>,
    ) -> RepositoryResult<Option<CatalogEntity>> {
        let doc: Option<String> = match scope_guid {
            Some(scope) => conn
                .query_row(
                    "SELECT doc_json FROM catalog_entity \
                     WHERE entity_kind = ?1 AND guid = ?2 AND scope_guid = ?3",
                    params![kind.to_db_str(), guid, scope],
                    |row| row.get(0),
                )
                .optional()?,
            None => conn
                .query_row(
                    "SELECT doc_json FROM catalog_entity \
                     WHERE entity_kind = ?1 AND guid = ?2 LIMIT 1",
                    params![kind.to_db_str(), guid],
                    |row| row.get(0),
                )
                .optional()?,
        };

        match doc {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    fn save_with_conn(conn: &Connection, entity: &CatalogEntity) -> RepositoryResult<()> {
        if let CatalogEntity::ProductAssociation(assoc) = entity {
            // 关联无业务主键, 保存语义是追加一条
            conn.execute(
                r#"
                INSERT INTO product_association (
                    catalog_guid, source_product_guid, target_product_guid,
                    association_type, default_quantity, ordering
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    assoc.catalog_guid,
                    assoc.source_product_code,
                    assoc.target_product_code,
                    assoc.kind.to_db_str(),
                    assoc.default_quantity,
                    assoc.ordering,
                ],
            )?;
            return Ok(());
        }

        let doc = serde_json::to_string(entity)?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO catalog_entity (
                entity_kind, guid, scope_guid, doc_json, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entity.kind().to_db_str(),
                entity.guid(),
                entity.scope_guid(),
                doc,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    fn categories_in_catalog(
        conn: &Connection,
        catalog_guid: &str,
    ) -> RepositoryResult<Vec<(String, Option<String>)>> {
        let mut stmt = conn.prepare(
            "SELECT doc_json FROM catalog_entity \
             WHERE entity_kind = ?1 AND scope_guid = ?2",
        )?;
        let docs = stmt
            .query_map(
                params![EntityKind::Category.to_db_str(), catalog_guid],
                |row| row.get::<_, String>(0),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut pairs = Vec::with_capacity(docs.len());
        for doc in docs {
            let entity: CatalogEntity = serde_json::from_str(&doc)?;
            if let Some(category) = entity.as_category() {
                pairs.push((category.code.clone(), category.parent_code.clone()));
            }
        }
        Ok(pairs)
    }
}

impl EntityStore for SqliteCatalogStore {
    fn load(
        &self,
        kind: EntityKind,
        guid: &str,
        scope_guid: &str,
    ) -> Result<Option<CatalogEntity>, CollaboratorError> {
        // 关联记录没有独立业务标识, 无法按 guid 寻址
        if kind == EntityKind::ProductAssociation {
            return Ok(None);
        }

        let conn = self.get_conn()?;
        Ok(Self::load_with_conn(&conn, kind, guid, Some(scope_guid))?)
    }

    fn save(&self, entity: &CatalogEntity) -> Result<(), CollaboratorError> {
        let conn = self.get_conn()?;
        Ok(Self::save_with_conn(&conn, entity)?)
    }

    fn delete(
        &self,
        kind: EntityKind,
        guid: &str,
        scope_guid: &str,
    ) -> Result<(), CollaboratorError> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM catalog_entity \
             WHERE entity_kind = ?1 AND guid = ?2 AND scope_guid = ?3",
            params![kind.to_db_str(), guid, scope_guid],
        )?;
        Ok(())
    }

    fn remove_category_tree(&self, code: &str, catalog_guid: &str) -> Result<(), CollaboratorError> {
        let conn = self.get_conn()?;
        let pairs = Self::categories_in_catalog(&conn, catalog_guid)?;

        // 自根向下收集整棵子树
        let mut doomed: HashSet<String> = HashSet::new();
        doomed.insert(code.to_string());
        loop {
            let before = doomed.len();
            for (child, parent) in &pairs {
                if let Some(parent) = parent {
                    if doomed.contains(parent) {
                        doomed.insert(child.clone());
                    }
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        let tx = conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "DELETE FROM catalog_entity \
                 WHERE entity_kind = ?1 AND guid = ?2 AND scope_guid = ?3",
            )?;
            for guid in &doomed {
                stmt.execute(params![EntityKind::Category.to_db_str(), guid, catalog_guid])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn clear_product_associations(
        &self,
        source_product_code: &str,
        catalog_guid: &str,
    ) -> Result<(), CollaboratorError> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM product_association \
             WHERE catalog_guid = ?1 AND source_product_guid = ?2",
            params![catalog_guid, source_product_code],
        )?;
        Ok(())
    }
}

impl ReferenceResolver for SqliteCatalogStore {
    fn find_by_guid(
        &self,
        kind: ReferenceKind,
        guid: &str,
        scope_guid: Option<&str>,
    ) -> Result<Option<CatalogEntity>, CollaboratorError> {
        let Some(entity_kind) = Self::entity_kind_of(kind) else {
            // 品牌/税码/仓库没有实体本体
            return Ok(None);
        };

        let conn = self.get_conn()?;
        Ok(Self::load_with_conn(&conn, entity_kind, guid, scope_guid)?)
    }

    fn exists_by_guid(
        &self,
        kind: ReferenceKind,
        guid: &str,
        scope_guid: Option<&str>,
    ) -> Result<bool, CollaboratorError> {
        let conn = self.get_conn()?;

        let found: Option<i64> = match Self::entity_kind_of(kind) {
            Some(entity_kind) => match scope_guid {
                Some(scope) => conn
                    .query_row(
                        "SELECT 1 FROM catalog_entity \
                         WHERE entity_kind = ?1 AND guid = ?2 AND scope_guid = ?3",
                        params![entity_kind.to_db_str(), guid, scope],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(RepositoryError::from)?,
                None => conn
                    .query_row(
                        "SELECT 1 FROM catalog_entity \
                         WHERE entity_kind = ?1 AND guid = ?2 LIMIT 1",
                        params![entity_kind.to_db_str(), guid],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(RepositoryError::from)?,
            },
            None => match scope_guid {
                Some(scope) => conn
                    .query_row(
                        "SELECT 1 FROM reference_guid \
                         WHERE ref_kind = ?1 AND guid = ?2 AND scope_guid = ?3",
                        params![kind.to_db_str(), guid, scope],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(RepositoryError::from)?,
                None => conn
                    .query_row(
                        "SELECT 1 FROM reference_guid \
                         WHERE ref_kind = ?1 AND guid = ?2 LIMIT 1",
                        params![kind.to_db_str(), guid],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(RepositoryError::from)?,
            },
        };

        Ok(found.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssociationKind, Category, Product, ProductAssociation};
    use tempfile::NamedTempFile;

    fn store_on_temp_db() -> (SqliteCatalogStore, NamedTempFile) {
        let temp = NamedTempFile::new().unwrap();
        let db_path = temp.path().to_str().unwrap().to_string();
        let conn = db::open_sqlite_connection(&db_path).unwrap();
        db::ensure_schema(&conn).unwrap();
        (
            SqliteCatalogStore::from_connection(Arc::new(Mutex::new(conn))),
            temp,
        )
    }

    fn category(code: &str, catalog: &str, parent: Option<&str>) -> CatalogEntity {
        let mut cat = Category::new(catalog, "STANDARD");
        cat.code = code.to_string();
        cat.parent_code = parent.map(str::to_string);
        CatalogEntity::Category(cat)
    }

    #[test]
    fn test_save_load_scope_isolation() {
        let (store, _temp) = store_on_temp_db();

        store.save(&category("SHOES", "CAT-A", None)).unwrap();
        store.save(&category("SHOES", "CAT-B", None)).unwrap();

        let in_a = store
            .load(EntityKind::Category, "SHOES", "CAT-A")
            .unwrap()
            .unwrap();
        assert_eq!(in_a.scope_guid(), "CAT-A");

        // 同名分类只存在于各自目录
        assert!(store
            .load(EntityKind::Category, "SHOES", "CAT-C")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_overwrites_same_identity() {
        let (store, _temp) = store_on_temp_db();

        store.save(&category("SHOES", "CAT-A", None)).unwrap();
        store
            .save(&category("SHOES", "CAT-A", Some("ROOT")))
            .unwrap();

        let loaded = store
            .load(EntityKind::Category, "SHOES", "CAT-A")
            .unwrap()
            .unwrap();
        let loaded = loaded.as_category().unwrap();
        assert_eq!(loaded.parent_code.as_deref(), Some("ROOT"));
    }

    #[test]
    fn test_remove_category_tree_takes_descendants() {
        let (store, _temp) = store_on_temp_db();

        store.save(&category("ROOT", "CAT-A", None)).unwrap();
        store.save(&category("SHOES", "CAT-A", Some("ROOT"))).unwrap();
        store
            .save(&category("RUNNING", "CAT-A", Some("SHOES")))
            .unwrap();
        store.save(&category("BAGS", "CAT-A", Some("ROOT"))).unwrap();

        store.remove_category_tree("SHOES", "CAT-A").unwrap();

        assert!(store
            .load(EntityKind::Category, "SHOES", "CAT-A")
            .unwrap()
            .is_none());
        assert!(store
            .load(EntityKind::Category, "RUNNING", "CAT-A")
            .unwrap()
            .is_none());
        // 兄弟与祖先保留
        assert!(store
            .load(EntityKind::Category, "BAGS", "CAT-A")
            .unwrap()
            .is_some());
        assert!(store
            .load(EntityKind::Category, "ROOT", "CAT-A")
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_associations_append_and_clear() {
        let (store, _temp) = store_on_temp_db();

        let mut assoc = ProductAssociation::new("CAT-A");
        assoc.source_product_code = "P1".to_string();
        assoc.target_product_code = "P2".to_string();
        assoc.kind = AssociationKind::CrossSell;
        store.save(&CatalogEntity::ProductAssociation(assoc.clone())).unwrap();

        assoc.target_product_code = "P3".to_string();
        store.save(&CatalogEntity::ProductAssociation(assoc.clone())).unwrap();

        let mut other_source = assoc.clone();
        other_source.source_product_code = "P9".to_string();
        store
            .save(&CatalogEntity::ProductAssociation(other_source))
            .unwrap();

        store.clear_product_associations("P1", "CAT-A").unwrap();

        // 仅 P1 名下被清空
        let conn = store.get_conn().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM product_association", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_reference_existence_by_kind() {
        let (store, _temp) = store_on_temp_db();

        store
            .insert_reference(ReferenceKind::Brand, "ACME", "CAT-A")
            .unwrap();
        let mut product = Product::new("CAT-A", "SIMPLE");
        product.code = "P1".to_string();
        store.save(&CatalogEntity::Product(product)).unwrap();

        assert!(store
            .exists_by_guid(ReferenceKind::Brand, "ACME", Some("CAT-A"))
            .unwrap());
        assert!(!store
            .exists_by_guid(ReferenceKind::Brand, "ACME", Some("CAT-B"))
            .unwrap());
        assert!(store
            .exists_by_guid(ReferenceKind::Product, "P1", Some("CAT-A"))
            .unwrap());
        assert!(store
            .exists_by_guid(ReferenceKind::Product, "P1", None)
            .unwrap());
        assert!(!store
            .exists_by_guid(ReferenceKind::TaxCode, "VAT-20", None)
            .unwrap());
    }

    #[test]
    fn test_association_load_has_no_identity() {
        let (store, _temp) = store_on_temp_db();
        assert!(store
            .load(EntityKind::ProductAssociation, "P1", "CAT-A")
            .unwrap()
            .is_none());
    }
}
