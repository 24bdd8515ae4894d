use crate::domain::model::{BuildingBlockId, Volume};
use crate::utils::error::{PickError, Result};
use std::collections::HashSet;

/// 一種 building block 類型（例如 `I`、`M`、`T`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockTypeSpec {
    pub id: String,
    pub dispense_volume: Volume,
    pub step: u32,
}

impl BlockTypeSpec {
    pub fn new(id: impl Into<String>, dispense_volume: Volume, step: u32) -> Self {
        Self {
            id: id.into(),
            dispense_volume,
            step,
        }
    }
}

/// 分類後的 building block：所屬類型與數字後綴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classified<'a> {
    pub type_index: usize,
    pub spec: &'a BlockTypeSpec,
    pub number: Option<u64>,
}

/// 已設定的 building block 類型集合
///
/// 代號屬於「最長前綴」的類型，且剩餘部分必須為空或全為數字：
/// `I12` -> `I`，`MX3` 在同時有 `M` 與 `MX` 時屬於 `MX`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingBlockCatalog {
    types: Vec<BlockTypeSpec>,
}

impl BuildingBlockCatalog {
    pub fn new(types: Vec<BlockTypeSpec>) -> Result<Self> {
        if types.is_empty() {
            return Err(PickError::MissingConfigError {
                field: "building_blocks".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for spec in &types {
            if spec.id.is_empty() || !spec.id.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(PickError::InvalidConfigValueError {
                    field: "building_blocks.id".to_string(),
                    value: spec.id.clone(),
                    reason: "Building block type ids must be non-empty and alphabetic".to_string(),
                });
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(PickError::InvalidConfigValueError {
                    field: "building_blocks.id".to_string(),
                    value: spec.id.clone(),
                    reason: "Duplicate building block type".to_string(),
                });
            }
            if spec.dispense_volume.is_zero() {
                return Err(PickError::InvalidConfigValueError {
                    field: format!("building_blocks.{}.dispense_volume_ul", spec.id),
                    value: spec.dispense_volume.to_string(),
                    reason: "Dispense volume must be positive".to_string(),
                });
            }
            if spec.step == 0 {
                return Err(PickError::InvalidConfigValueError {
                    field: format!("building_blocks.{}.step", spec.id),
                    value: "0".to_string(),
                    reason: "Transfer steps start at 1".to_string(),
                });
            }
        }

        Ok(Self { types })
    }

    pub fn types(&self) -> &[BlockTypeSpec] {
        &self.types
    }

    pub fn classify(&self, block: &BuildingBlockId) -> Option<Classified<'_>> {
        let text = block.as_str();
        self.types
            .iter()
            .enumerate()
            .filter(|(_, spec)| text.starts_with(spec.id.as_str()))
            .filter_map(|(type_index, spec)| {
                let rest = &text[spec.id.len()..];
                if rest.is_empty() {
                    Some(Classified { type_index, spec, number: None })
                } else if rest.chars().all(|c| c.is_ascii_digit()) {
                    Some(Classified {
                        type_index,
                        spec,
                        number: rest.parse().ok(),
                    })
                } else {
                    None
                }
            })
            .max_by_key(|c| c.spec.id.len())
    }

    pub fn contains(&self, block: &BuildingBlockId) -> bool {
        self.classify(block).is_some()
    }

    pub fn dispense_volume(&self, block: &BuildingBlockId) -> Option<Volume> {
        self.classify(block).map(|c| c.spec.dispense_volume)
    }

    pub fn step(&self, block: &BuildingBlockId) -> Option<u32> {
        self.classify(block).map(|c| c.spec.step)
    }

    /// 排序鍵：類型順序、數字後綴、代號
    pub fn sort_key(&self, block: &BuildingBlockId) -> (usize, u64, String) {
        match self.classify(block) {
            Some(c) => (c.type_index, c.number.unwrap_or(0), block.as_str().to_string()),
            None => (usize::MAX, 0, block.as_str().to_string()),
        }
    }
}
