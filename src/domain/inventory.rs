use crate::domain::model::{BuildingBlockId, PlateFormat, Volume, WellId};
use crate::domain::plate::SourcePlate;
use crate::utils::error::{PickError, Result, StockLevel};
use serde::Serialize;

/// 來源孔位置：盤序號（設定順序）+ 孔位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub plate_index: usize,
    pub well: WellId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StockEntry {
    location: SourceLocation,
    block: BuildingBlockId,
    stocked: Volume,
}

/// 每個來源孔的使用量（報表用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WellUsage {
    pub plate: String,
    pub well: WellId,
    pub block: BuildingBlockId,
    pub stocked: Volume,
    pub withdrawn: Volume,
    pub remaining: Volume,
}

/// 來源盤庫存
///
/// 盤依加入順序編號；`find_well_for` 以 (盤序號, row-major) 的固定順序做 first-fit，
/// 所以同一個 building block 會先抽乾前面的孔再動到後面的孔。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInventory {
    plates: Vec<SourcePlate>,
    ledger: Vec<StockEntry>,
    max_plates: usize,
}

impl SourceInventory {
    pub fn new(max_plates: usize) -> Self {
        Self {
            plates: Vec::new(),
            ledger: Vec::new(),
            max_plates,
        }
    }

    pub fn max_plates(&self) -> usize {
        self.max_plates
    }

    pub fn add_plate(&mut self, id: impl Into<String>, format: PlateFormat) -> Result<usize> {
        if self.plates.len() >= self.max_plates {
            return Err(PickError::TooManySourcePlatesError {
                required: self.plates.len() + 1,
                max: self.max_plates,
            });
        }
        self.plates.push(SourcePlate::new(id, format));
        Ok(self.plates.len() - 1)
    }

    /// 在指定孔裝入庫存；重複裝同一孔會覆蓋先前的內容
    pub fn stock(&mut self, plate_index: usize, well: WellId, block: BuildingBlockId, volume: Volume) -> Result<()> {
        let plate = self.plate_mut(plate_index)?;
        plate.set_occupant(&well, block.clone(), volume)?;

        let location = SourceLocation { plate_index, well };
        self.ledger.retain(|e| e.location != location);
        if !volume.is_zero() {
            self.ledger.push(StockEntry {
                location,
                block,
                stocked: volume,
            });
        }
        Ok(())
    }

    pub fn plates(&self) -> &[SourcePlate] {
        &self.plates
    }

    pub fn plate_count(&self) -> usize {
        self.plates.len()
    }

    pub fn plate_id(&self, plate_index: usize) -> Option<&str> {
        self.plates.get(plate_index).map(|p| p.id())
    }

    fn plate_mut(&mut self, plate_index: usize) -> Result<&mut SourcePlate> {
        let count = self.plates.len();
        self.plates
            .get_mut(plate_index)
            .ok_or_else(|| PickError::ConfigError {
                message: format!("Source plate #{} does not exist ({} configured)", plate_index + 1, count),
            })
    }

    /// 找第一個裝有 `block` 且剩餘量足夠的孔
    pub fn find_well_for(&self, block: &BuildingBlockId, required: Volume) -> Result<SourceLocation> {
        for (plate_index, plate) in self.plates.iter().enumerate() {
            for (well, content) in plate.iter() {
                if content.holds(block) && content.remaining() >= required {
                    return Ok(SourceLocation { plate_index, well });
                }
            }
        }

        Err(PickError::BlockNotFoundError {
            block: block.clone(),
            required,
            destination: None,
            stock: self.stock_levels(block),
        })
    }

    pub fn withdraw(&mut self, location: SourceLocation, volume: Volume) -> Result<()> {
        self.plate_mut(location.plate_index)?
            .withdraw(&location.well, volume)
    }

    pub fn remaining_at(&self, location: SourceLocation) -> Option<Volume> {
        self.plates
            .get(location.plate_index)?
            .well(&location.well)
            .ok()
            .map(|w| w.remaining())
    }

    /// 曾經裝過 `block` 的孔與其目前剩餘量
    pub fn stock_levels(&self, block: &BuildingBlockId) -> Vec<StockLevel> {
        let mut levels: Vec<(SourceLocation, StockLevel)> = self
            .ledger
            .iter()
            .filter(|e| &e.block == block)
            .map(|e| {
                (
                    e.location,
                    StockLevel {
                        plate: self.plate_id(e.location.plate_index).unwrap_or_default().to_string(),
                        well: e.location.well,
                        stocked: e.stocked,
                        remaining: self.remaining_at(e.location).unwrap_or(Volume::ZERO),
                    },
                )
            })
            .collect();
        levels.sort_by_key(|(location, _)| (location.plate_index, location.well));
        levels.into_iter().map(|(_, level)| level).collect()
    }

    pub fn total_remaining(&self, block: &BuildingBlockId) -> Volume {
        self.stock_levels(block).iter().map(|s| s.remaining).sum()
    }

    /// 依帳本重建某盤解析前的裝盤狀態，用於輸出來源盤配置
    pub fn stocked_plate(&self, plate_index: usize) -> Option<SourcePlate> {
        let current = self.plates.get(plate_index)?;
        let mut plate = SourcePlate::new(current.id(), current.format());
        for entry in self.ledger.iter().filter(|e| e.location.plate_index == plate_index) {
            plate
                .set_occupant(&entry.location.well, entry.block.clone(), entry.stocked)
                .ok()?;
        }
        Some(plate)
    }

    /// 每個裝過庫存的孔：裝入量、已抽量、剩餘量（盤序號 + row-major 排序）
    pub fn usage(&self) -> Vec<WellUsage> {
        let mut entries: Vec<&StockEntry> = self.ledger.iter().collect();
        entries.sort_by_key(|e| (e.location.plate_index, e.location.well));
        entries
            .into_iter()
            .map(|e| {
                let remaining = self.remaining_at(e.location).unwrap_or(Volume::ZERO);
                WellUsage {
                    plate: self.plate_id(e.location.plate_index).unwrap_or_default().to_string(),
                    well: e.location.well,
                    block: e.block.clone(),
                    stocked: e.stocked,
                    withdrawn: e.stocked.saturating_sub(remaining),
                    remaining,
                }
            })
            .collect()
    }
}
