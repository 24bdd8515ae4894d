use crate::domain::catalog::BuildingBlockCatalog;
use crate::domain::model::{row_label, BuildingBlockId, PlateFormat, WellId};
use crate::domain::plate::{TargetPlate, WellRequest};
use crate::utils::error::{PickError, Result};

/// 盤面格式的表格：第一列為欄標籤 (`"", 1, 2, ...`)，之後每列為 `列標籤, 儲存格...`
///
/// 左上角儲存格若有值，當作盤的識別碼。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutGrid {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LayoutGrid {
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { header, rows }
    }

    pub fn declared_plate_id(&self) -> Option<&str> {
        self.header
            .first()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// 表頭左上角的識別碼優先，否則使用呼叫端提供的名稱（通常是檔名）
    pub fn plate_id_or(&self, fallback: &str) -> String {
        self.declared_plate_id().unwrap_or(fallback).to_string()
    }

    /// 檢查表格形狀是否符合盤面規格
    pub fn check_shape(&self, plate_id: &str, format: PlateFormat) -> Result<()> {
        let shape_error = |reason: String| PickError::LayoutShapeError {
            plate: plate_id.to_string(),
            rows: format.rows,
            columns: format.columns,
            reason,
        };

        let labels = trim_trailing_empty(self.header.get(1..).unwrap_or_default());
        if labels.len() != format.columns {
            return Err(shape_error(format!(
                "header lists {} columns, expected {}",
                labels.len(),
                format.columns
            )));
        }
        for (i, label) in labels.iter().enumerate() {
            if label.trim().parse::<usize>().ok() != Some(i + 1) {
                return Err(shape_error(format!(
                    "header column {} is labelled '{}', expected '{}'",
                    i + 1,
                    label.trim(),
                    i + 1
                )));
            }
        }

        if self.rows.len() != format.rows {
            return Err(shape_error(format!(
                "found {} rows, expected {}",
                self.rows.len(),
                format.rows
            )));
        }

        for (r, row) in self.rows.iter().enumerate() {
            let expected = row_label(r);
            let label = row.first().map(|s| s.trim()).unwrap_or_default();
            if !label.eq_ignore_ascii_case(&expected) {
                return Err(shape_error(format!(
                    "row {} is labelled '{}', expected '{}'",
                    r + 1,
                    label,
                    expected
                )));
            }
            let cells = trim_trailing_empty(row.get(1..).unwrap_or_default());
            if cells.len() > format.columns || row.len() < format.columns + 1 {
                return Err(shape_error(format!(
                    "row {} has {} cells, expected {}",
                    expected,
                    row.len().saturating_sub(1),
                    format.columns
                )));
            }
        }

        Ok(())
    }

    /// 走訪 (孔位, 儲存格內容)，呼叫前應先通過 `check_shape`
    pub fn cells(&self, format: PlateFormat) -> impl Iterator<Item = (WellId, &str)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(r, row)| {
            row.iter()
                .skip(1)
                .take(format.columns)
                .enumerate()
                .map(move |(c, cell)| (WellId::new(r, c), cell.trim()))
        })
    }
}

fn trim_trailing_empty(cells: &[String]) -> &[String] {
    let end = cells
        .iter()
        .rposition(|c| !c.trim().is_empty())
        .map(|i| i + 1)
        .unwrap_or(0);
    &cells[..end]
}

/// 拆開以逗號分隔的儲存格並驗證每個代號
fn parse_cell(
    cell: &str,
    plate_id: &str,
    well: WellId,
    catalog: &BuildingBlockCatalog,
) -> Result<Vec<BuildingBlockId>> {
    cell.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            let block = BuildingBlockId::new(item);
            if catalog.contains(&block) {
                Ok(block)
            } else {
                Err(PickError::UnknownBuildingBlockError {
                    block: item.to_string(),
                    plate: plate_id.to_string(),
                    well: well.to_string(),
                })
            }
        })
        .collect()
}

/// 解析目標盤配置
pub fn parse_target_layout(
    grid: &LayoutGrid,
    plate_id: &str,
    format: PlateFormat,
    catalog: &BuildingBlockCatalog,
) -> Result<TargetPlate> {
    grid.check_shape(plate_id, format)?;

    let mut plate = TargetPlate::new(plate_id, format);
    for (well, cell) in grid.cells(format) {
        let blocks = parse_cell(cell, plate_id, well, catalog)?;
        if !blocks.is_empty() {
            plate.set_request(&well, WellRequest::new(blocks))?;
        }
    }

    tracing::debug!(
        "Parsed target layout '{}' with {} requested transfers",
        plate_id,
        plate.request_count()
    );
    Ok(plate)
}

/// 解析來源盤配置：每個孔最多一種 building block
pub fn parse_source_layout(
    grid: &LayoutGrid,
    plate_id: &str,
    format: PlateFormat,
    catalog: &BuildingBlockCatalog,
) -> Result<Vec<(WellId, BuildingBlockId)>> {
    grid.check_shape(plate_id, format)?;

    let mut entries = Vec::new();
    for (well, cell) in grid.cells(format) {
        let mut blocks = parse_cell(cell, plate_id, well, catalog)?;
        match blocks.len() {
            0 => {}
            1 => entries.extend(blocks.pop().map(|b| (well, b))),
            n => {
                return Err(PickError::LayoutShapeError {
                    plate: plate_id.to_string(),
                    rows: format.rows,
                    columns: format.columns,
                    reason: format!("source well {} lists {} building blocks, expected one", well, n),
                })
            }
        }
    }
    Ok(entries)
}
