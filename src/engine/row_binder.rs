// ==========================================
// 商品目录数据导入引擎 - 行绑定器
// ==========================================
// 职责: 把一行单元格按任务列映射绑定到实体
// 红线: 业务标识字段最先绑定, 它失败则整行放弃
// 红线: 行级故障累积进收集器, 不中断本行其余字段
// ==========================================

use crate::domain::{CatalogEntity, ColumnMapping, FaultSink};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::row_source::SourceRow;
use crate::schema::{BindContext, BindError, EntitySchema, ImportField, SchemaResult};

/// 单行绑定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// 全部映射字段处理完毕 (故障可能已累积进收集器)
    Bound,
    /// 业务标识字段失败, 本行其余字段未处理
    GuidRejected,
}

// ==========================================
// RowBinder - 行绑定器
// ==========================================
/// 行绑定器
///
/// # 说明
/// 构造时把任务列映射解析为 (字段, 列号) 序列: 业务标识字段
/// 排在首位, 其余按列号升序。校验趟与落值趟共用同一序列,
/// 只是字段访问路径不同 (check_only / write)。
pub struct RowBinder<'a> {
    /// (字段, 列号), 业务标识在首位
    bindings: Vec<(&'a ImportField, usize)>,
    guid_column: Option<usize>,
}

impl<'a> RowBinder<'a> {
    /// 按模式与任务列映射构造绑定器
    pub fn new(schema: &'a EntitySchema, mappings: &[ColumnMapping]) -> SchemaResult<Self> {
        let mut sorted: Vec<&ColumnMapping> = mappings.iter().collect();
        sorted.sort_by_key(|m| m.column_index);

        let guid_name = schema.guid_field_name();
        let mut bindings = Vec::with_capacity(sorted.len());
        let mut guid_column = None;

        for mapping in &sorted {
            if !guid_name.is_empty() && mapping.field_name == guid_name {
                bindings.push((schema.field(&mapping.field_name)?, mapping.column_index));
                guid_column = Some(mapping.column_index);
            }
        }
        for mapping in &sorted {
            if guid_name.is_empty() || mapping.field_name != guid_name {
                bindings.push((schema.field(&mapping.field_name)?, mapping.column_index));
            }
        }

        Ok(RowBinder {
            bindings,
            guid_column,
        })
    }

    /// 本行的业务标识原始值 (未映射业务标识时返回 None)
    pub fn guid_value<'r>(&self, row: &'r SourceRow) -> Option<&'r str> {
        self.guid_column
            .and_then(|col| row.cells.get(col))
            .map(String::as_str)
    }

    /// 校验趟: 只检查不落值
    pub fn validate_row(
        &self,
        entity: &CatalogEntity,
        row: &SourceRow,
        ctx: &BindContext,
        sink: &mut FaultSink,
    ) -> EngineResult<BindOutcome> {
        self.drive(row, sink, |field, raw| field.check_only(entity, raw, ctx))
    }

    /// 落值趟: 校验并写入实体
    pub fn bind_row(
        &self,
        entity: &mut CatalogEntity,
        row: &SourceRow,
        ctx: &BindContext,
        sink: &mut FaultSink,
    ) -> EngineResult<BindOutcome> {
        self.drive(row, sink, |field, raw| field.write(entity, raw, ctx))
    }

    fn drive(
        &self,
        row: &SourceRow,
        sink: &mut FaultSink,
        mut access: impl FnMut(&ImportField, &str) -> Result<(), BindError>,
    ) -> EngineResult<BindOutcome> {
        for (field, column) in &self.bindings {
            let raw = row.cells.get(*column).map(String::as_str).unwrap_or("");
            match access(field, raw) {
                Ok(()) => {}
                Err(BindError::Fault(fault)) => {
                    sink.push(fault);
                    if Some(*column) == self.guid_column {
                        return Ok(BindOutcome::GuidRejected);
                    }
                }
                Err(BindError::EntityMismatch { expected, actual }) => {
                    return Err(EngineError::EntityMismatch { expected, actual });
                }
                Err(BindError::Collaborator(e)) => {
                    return Err(EngineError::Collaborator(e.to_string()));
                }
            }
        }
        Ok(BindOutcome::Bound)
    }
}

// ==========================================
// 单元测试
// ==========================================
