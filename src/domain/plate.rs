use crate::domain::model::{BuildingBlockId, PlateFormat, Volume, WellId};
use crate::utils::error::{PickError, Result};

/// 單一孔位的內容物與剩餘體積
///
/// 沒有內容物的孔剩餘體積必為 0；體積抽乾時內容物會被清除。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Well {
    occupant: Option<BuildingBlockId>,
    remaining: Volume,
}

/// `Well::withdraw` 失敗時的缺額
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    pub requested: Volume,
    pub available: Volume,
}

impl Well {
    pub fn occupant(&self) -> Option<&BuildingBlockId> {
        self.occupant.as_ref()
    }

    pub fn remaining(&self) -> Volume {
        self.remaining
    }

    pub fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    pub fn holds(&self, block: &BuildingBlockId) -> bool {
        self.occupant.as_ref() == Some(block)
    }

    /// 裝入 building block；體積為 0 視同清空
    pub fn set_occupant(&mut self, block: BuildingBlockId, volume: Volume) {
        if volume.is_zero() {
            self.clear();
        } else {
            self.occupant = Some(block);
            self.remaining = volume;
        }
    }

    pub fn clear(&mut self) {
        self.occupant = None;
        self.remaining = Volume::ZERO;
    }

    pub fn withdraw(&mut self, volume: Volume) -> std::result::Result<(), Shortfall> {
        let rest = self.remaining.checked_sub(volume).ok_or(Shortfall {
            requested: volume,
            available: self.remaining,
        })?;
        self.remaining = rest;
        if rest.is_zero() {
            self.occupant = None;
        }
        Ok(())
    }
}

/// 目標孔位需求：依儲存格順序列出的 building blocks，空的代表略過
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WellRequest {
    blocks: Vec<BuildingBlockId>,
}

impl WellRequest {
    pub fn new(blocks: Vec<BuildingBlockId>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[BuildingBlockId] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// 固定規格的盤，建立時即擁有全部孔位（row-major）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plate<T> {
    id: String,
    format: PlateFormat,
    wells: Vec<T>,
}

pub type SourcePlate = Plate<Well>;
pub type TargetPlate = Plate<WellRequest>;

impl<T: Default + Clone> Plate<T> {
    pub fn new(id: impl Into<String>, format: PlateFormat) -> Self {
        Self {
            id: id.into(),
            format,
            wells: vec![T::default(); format.well_count()],
        }
    }
}

impl<T> Plate<T> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> PlateFormat {
        self.format
    }

    fn index(&self, row: usize, column: usize) -> Result<usize> {
        self.format
            .index_of(&WellId::new(row, column))
            .ok_or_else(|| PickError::OutOfBoundsError {
                plate: self.id.clone(),
                row,
                column,
                rows: self.format.rows,
                columns: self.format.columns,
            })
    }

    pub fn well_at(&self, row: usize, column: usize) -> Result<&T> {
        let index = self.index(row, column)?;
        Ok(&self.wells[index])
    }

    pub fn well_at_mut(&mut self, row: usize, column: usize) -> Result<&mut T> {
        let index = self.index(row, column)?;
        Ok(&mut self.wells[index])
    }

    pub fn well(&self, id: &WellId) -> Result<&T> {
        self.well_at(id.row, id.column)
    }

    pub fn well_mut(&mut self, id: &WellId) -> Result<&mut T> {
        self.well_at_mut(id.row, id.column)
    }

    /// row-major 走訪 (孔位, 內容)
    pub fn iter(&self) -> impl Iterator<Item = (WellId, &T)> + '_ {
        self.format.wells().zip(self.wells.iter())
    }
}

impl Plate<Well> {
    pub fn set_occupant(&mut self, id: &WellId, block: BuildingBlockId, volume: Volume) -> Result<()> {
        self.well_mut(id)?.set_occupant(block, volume);
        Ok(())
    }

    pub fn withdraw(&mut self, id: &WellId, volume: Volume) -> Result<()> {
        let plate = self.id.clone();
        self.well_mut(id)?
            .withdraw(volume)
            .map_err(|shortfall| PickError::InsufficientVolumeError {
                plate,
                well: *id,
                requested: shortfall.requested,
                available: shortfall.available,
            })
    }

    pub fn occupied_wells(&self) -> usize {
        self.wells.iter().filter(|w| !w.is_empty()).count()
    }
}

impl Plate<WellRequest> {
    pub fn set_request(&mut self, id: &WellId, request: WellRequest) -> Result<()> {
        *self.well_mut(id)? = request;
        Ok(())
    }

    /// 所有需求的 building block 總數
    pub fn request_count(&self) -> usize {
        self.wells.iter().map(|w| w.blocks().len()).sum()
    }
}
