// ==========================================
// 商品目录数据导入引擎 - 行来源
// ==========================================
// 职责: 按行惰性提供导入数据
// 支持: CSV (.csv) / Excel (.xlsx)
// 说明: 行号按物理行计数 (首行为标题行, 行号 1);
//       完全空白的行跳过但仍占用行号
// ==========================================

use std::fs::File;
use std::path::Path;

use calamine::{open_workbook, Data, Reader, Xlsx};
use csv::ReaderBuilder;

use crate::engine::contracts::CollaboratorError;
use crate::engine::error::{EngineError, EngineResult};

/// 一行导入数据
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    /// 物理行号, 1 起
    pub row_number: u64,
    /// 去除首尾空白后的单元格
    pub cells: Vec<String>,
    /// 诊断用原始行文本
    pub raw_text: String,
}

// ==========================================
// RowSource Trait
// ==========================================
// 用途: 任务执行器逐行拉取数据, 两趟扫描各开一个来源
// 实现者: CsvRowSource / ExcelRowSource
pub trait RowSource: Send {
    /// 取下一行, 数据耗尽返回 None
    fn next_row(&mut self) -> Result<Option<SourceRow>, CollaboratorError>;
}

// ==========================================
// CSV 行来源
// ==========================================
pub struct CsvRowSource {
    records: csv::StringRecordsIntoIter<File>,
    delimiter: char,
    next_row_number: u64,
}

impl CsvRowSource {
    /// 打开 CSV 文件
    ///
    /// # 参数
    /// - `delimiter`: 列分隔符 (任务配置)
    /// - `text_qualifier`: 文本限定符 (任务配置)
    pub fn open(path: &Path, delimiter: char, text_qualifier: char) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::FileNotFound(path.display().to_string()));
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !ext.eq_ignore_ascii_case("csv") {
            return Err(EngineError::UnsupportedFormat(ext.to_string()));
        }

        let file = File::open(path).map_err(|e| EngineError::RowSource(e.to_string()))?;
        let reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true) // 允许行长度不一致, 列数校验由执行器负责
            .delimiter(ascii_or(delimiter, b','))
            .quote(ascii_or(text_qualifier, b'"'))
            .from_reader(file);

        Ok(CsvRowSource {
            records: reader.into_records(),
            delimiter,
            next_row_number: 0,
        })
    }
}

/// 非 ASCII 的分隔配置回退到默认值
fn ascii_or(c: char, fallback: u8) -> u8 {
    if c.is_ascii() {
        c as u8
    } else {
        fallback
    }
}

impl RowSource for CsvRowSource {
    fn next_row(&mut self) -> Result<Option<SourceRow>, CollaboratorError> {
        loop {
            let record = match self.records.next() {
                None => return Ok(None),
                Some(Err(e)) => return Err(Box::new(e)),
                Some(Ok(record)) => record,
            };
            self.next_row_number += 1;

            let cells: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            let raw_text = cells.join(&self.delimiter.to_string());
            return Ok(Some(SourceRow {
                row_number: self.next_row_number,
                cells,
                raw_text,
            }));
        }
    }
}

// ==========================================
// Excel 行来源
// ==========================================
// 工作簿整表读入后逐行供给, 取第一个工作表
pub struct ExcelRowSource {
    rows: std::vec::IntoIter<Vec<String>>,
    next_row_number: u64,
}

impl ExcelRowSource {
    pub fn open(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::FileNotFound(path.display().to_string()));
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !ext.eq_ignore_ascii_case("xlsx") {
            return Err(EngineError::UnsupportedFormat(ext.to_string()));
        }

        let mut workbook: Xlsx<_> = open_workbook(path)
            .map_err(|e: calamine::XlsxError| EngineError::RowSource(e.to_string()))?;

        let sheet_names = workbook.sheet_names();
        if sheet_names.is_empty() {
            return Err(EngineError::RowSource("Excel 文件无工作表".to_string()));
        }
        let sheet_name = sheet_names[0].clone();
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| EngineError::RowSource(e.to_string()))?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Data::Empty => String::new(),
                        other => other.to_string().trim().to_string(),
                    })
                    .collect()
            })
            .collect();

        Ok(ExcelRowSource {
            rows: rows.into_iter(),
            next_row_number: 0,
        })
    }
}

impl RowSource for ExcelRowSource {
    fn next_row(&mut self) -> Result<Option<SourceRow>, CollaboratorError> {
        loop {
            let cells = match self.rows.next() {
                None => return Ok(None),
                Some(cells) => cells,
            };
            self.next_row_number += 1;

            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }
            let raw_text = cells.join(",");
            return Ok(Some(SourceRow {
                row_number: self.next_row_number,
                cells,
                raw_text,
            }));
        }
    }
}

/// 按扩展名打开合适的行来源
pub fn open_row_source(
    path: &Path,
    delimiter: char,
    text_qualifier: char,
) -> EngineResult<Box<dyn RowSource>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("xlsx") {
        Ok(Box::new(ExcelRowSource::open(path)?))
    } else {
        Ok(Box::new(CsvRowSource::open(path, delimiter, text_qualifier)?))
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_rows_keep_physical_numbers_and_skip_blanks() {
        let file = write_csv("categoryCode,displayName(en)\nC1,Books\n,\nC2,Music\n");
        let mut source = CsvRowSource::open(file.path(), ',', '"').unwrap();

        let title = source.next_row().unwrap().unwrap();
        assert_eq!(title.row_number, 1);
        assert_eq!(title.cells, vec!["categoryCode", "displayName(en)"]);

        let first = source.next_row().unwrap().unwrap();
        assert_eq!(first.row_number, 2);
        assert_eq!(first.cells, vec!["C1", "Books"]);

        // 空白行被跳过, 但行号保持物理位置
        let second = source.next_row().unwrap().unwrap();
        assert_eq!(second.row_number, 4);
        assert_eq!(second.cells, vec!["C2", "Music"]);

        assert!(source.next_row().unwrap().is_none());
    }

    #[test]
    fn test_custom_delimiter_and_qualifier() {
        let file = write_csv("categoryCode;displayName(en)\nC1;'Books; Comics'\n");
        let mut source = CsvRowSource::open(file.path(), ';', '\'').unwrap();

        source.next_row().unwrap().unwrap();
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.cells, vec!["C1", "Books; Comics"]);
    }

    #[test]
    fn test_cells_are_trimmed() {
        let file = write_csv("a,b\n  C1  ,  Books  \n");
        let mut source = CsvRowSource::open(file.path(), ',', '"').unwrap();

        source.next_row().unwrap().unwrap();
        let row = source.next_row().unwrap().unwrap();
        assert_eq!(row.cells, vec!["C1", "Books"]);
    }

    #[test]
    fn test_missing_file_and_wrong_extension() {
        assert!(matches!(
            CsvRowSource::open(Path::new("/no/such/file.csv"), ',', '"'),
            Err(EngineError::FileNotFound(_))
        ));

        let file = Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            CsvRowSource::open(file.path(), ',', '"'),
            Err(EngineError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            ExcelRowSource::open(file.path()),
            Err(EngineError::UnsupportedFormat(_))
        ));
    }
}
