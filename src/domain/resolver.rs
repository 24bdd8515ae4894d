use crate::domain::catalog::BuildingBlockCatalog;
use crate::domain::inventory::SourceInventory;
use crate::domain::model::{BuildingBlockId, Volume};
use crate::domain::plan::{TransferInstruction, TransferPlan};
use crate::domain::plate::TargetPlate;
use crate::utils::error::{PickError, Result};

/// 把目標盤配置解成轉移清單
///
/// 單次、同步走訪：目標盤依輸入順序，孔位 row-major，同一孔內依儲存格順序。
/// 任何錯誤都會中止整個解析，不會回傳部分結果。
pub struct Resolver<'a> {
    catalog: &'a BuildingBlockCatalog,
    destination_capacity: Option<Volume>,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a BuildingBlockCatalog) -> Self {
        Self {
            catalog,
            destination_capacity: None,
        }
    }

    pub fn with_destination_capacity(mut self, capacity: Option<Volume>) -> Self {
        self.destination_capacity = capacity;
        self
    }

    fn dispense_volume(&self, block: &BuildingBlockId, target: &TargetPlate, well: &str) -> Result<(Volume, u32)> {
        self.catalog
            .classify(block)
            .map(|c| (c.spec.dispense_volume, c.spec.step))
            .ok_or_else(|| PickError::UnknownBuildingBlockError {
                block: block.to_string(),
                plate: target.id().to_string(),
                well: well.to_string(),
            })
    }

    pub fn resolve(&self, targets: &[TargetPlate], inventory: &mut SourceInventory) -> Result<TransferPlan> {
        let mut plan = TransferPlan::default();

        for (destination_index, target) in targets.iter().enumerate() {
            let before = plan.len();

            for (well, request) in target.iter() {
                if request.is_empty() {
                    continue;
                }
                let well_name = well.to_string();

                let volumes = request
                    .blocks()
                    .iter()
                    .map(|block| self.dispense_volume(block, target, &well_name))
                    .collect::<Result<Vec<_>>>()?;

                // 先檢查目標孔容量，再動庫存
                if let Some(capacity) = self.destination_capacity {
                    let requested: Volume = volumes.iter().map(|(v, _)| *v).sum();
                    if requested > capacity {
                        return Err(PickError::DestinationOverflowError {
                            plate: target.id().to_string(),
                            well,
                            requested,
                            capacity,
                        });
                    }
                }

                for (block, (volume, step)) in request.blocks().iter().zip(volumes) {
                    let location = match inventory.find_well_for(block, volume) {
                        Ok(location) => location,
                        Err(PickError::BlockNotFoundError { block, required, stock, .. }) => {
                            tracing::debug!(
                                "Source stock for '{}' exhausted at {}:{}",
                                block,
                                target.id(),
                                well_name
                            );
                            return Err(PickError::BlockNotFoundError {
                                block,
                                required,
                                destination: Some(format!("{}:{}", target.id(), well_name)),
                                stock,
                            });
                        }
                        Err(e) => return Err(e),
                    };

                    inventory.withdraw(location, volume)?;

                    let source_plate = inventory
                        .plate_id(location.plate_index)
                        .unwrap_or_default()
                        .to_string();
                    tracing::trace!(
                        "{} {}:{} -> {}:{} ({})",
                        block,
                        source_plate,
                        location.well,
                        target.id(),
                        well_name,
                        volume
                    );

                    plan.push(TransferInstruction {
                        source_plate,
                        source_well: location.well,
                        destination_plate: target.id().to_string(),
                        destination_well: well,
                        block: block.clone(),
                        volume,
                        step,
                        source_index: location.plate_index,
                        destination_index,
                    });
                }
            }

            tracing::debug!(
                "Resolved {} transfers for destination plate '{}'",
                plan.len() - before,
                target.id()
            );
        }

        Ok(plan)
    }
}
