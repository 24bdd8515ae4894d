use crate::domain::inventory::SourceInventory;
use crate::domain::model::{BuildingBlockId, Volume, WellId};
use serde::Serialize;
use std::collections::BTreeMap;

/// 一次液體轉移
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferInstruction {
    pub source_plate: String,
    pub source_well: WellId,
    pub destination_plate: String,
    pub destination_well: WellId,
    pub block: BuildingBlockId,
    pub volume: Volume,
    pub step: u32,
    #[serde(skip)]
    pub(crate) source_index: usize,
    #[serde(skip)]
    pub(crate) destination_index: usize,
}

/// 依處理順序排列的轉移清單，解析完成後唯讀
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferPlan {
    instructions: Vec<TransferInstruction>,
}

impl TransferPlan {
    pub(crate) fn push(&mut self, instruction: TransferInstruction) {
        self.instructions.push(instruction);
    }

    pub fn instructions(&self) -> &[TransferInstruction] {
        &self.instructions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransferInstruction> {
        self.instructions.iter()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// 出現過的步驟編號（遞增）
    pub fn steps(&self) -> Vec<u32> {
        let mut steps: Vec<u32> = self.instructions.iter().map(|t| t.step).collect();
        steps.sort_unstable();
        steps.dedup();
        steps
    }

    pub fn for_step(&self, step: u32) -> impl Iterator<Item = &TransferInstruction> + '_ {
        self.instructions.iter().filter(move |t| t.step == step)
    }

    /// 某步驟的轉移，穩定排序為 (目標盤, 來源盤)，減少換盤次數。
    ///
    /// 每個步驟都用同一組排序鍵；第 2 步的 T block 分散在多張來源盤時，
    /// 同一目標盤內也會先按來源盤分組，而不是只依目標盤排序。
    /// 需要解析順序時請關閉 `output.group_by_source_plate`。
    pub fn grouped_by_plate(&self, step: u32) -> Vec<&TransferInstruction> {
        let mut grouped: Vec<&TransferInstruction> = self.for_step(step).collect();
        grouped.sort_by_key(|t| (t.destination_index, t.source_index));
        grouped
    }

    pub fn volume_by_block(&self) -> BTreeMap<BuildingBlockId, Volume> {
        let mut totals = BTreeMap::new();
        for t in &self.instructions {
            *totals.entry(t.block.clone()).or_insert(Volume::ZERO) += t.volume;
        }
        totals
    }
}

/// transform 階段的輸出：轉移清單與解析後的庫存狀態
#[derive(Debug, Clone)]
pub struct PickResult {
    pub destination_plates: Vec<String>,
    pub demand: BTreeMap<BuildingBlockId, usize>,
    pub plan: TransferPlan,
    pub inventory: SourceInventory,
}

impl<'a> IntoIterator for &'a TransferPlan {
    type Item = &'a TransferInstruction;
    type IntoIter = std::slice::Iter<'a, TransferInstruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}
