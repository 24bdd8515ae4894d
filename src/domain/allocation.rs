use crate::domain::catalog::BuildingBlockCatalog;
use crate::domain::inventory::SourceInventory;
use crate::domain::model::{BuildingBlockId, PlateFormat, Volume, WellId};
use crate::domain::plate::TargetPlate;
use crate::utils::error::{PickError, Result};
use std::collections::BTreeMap;

/// 自動配置來源盤的參數
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSettings {
    pub format: PlateFormat,
    pub usable_volume: Volume,
    pub max_plates: usize,
    pub barcode_prefix: String,
}

/// 每個 building block 在所有目標盤中被要求的次數
pub fn count_demand(targets: &[TargetPlate]) -> BTreeMap<BuildingBlockId, usize> {
    let mut counter = BTreeMap::new();
    for target in targets {
        for (_, request) in target.iter() {
            for block in request.blocks() {
                *counter.entry(block.clone()).or_insert(0) += 1;
            }
        }
    }
    counter
}

/// 每個 building block 需要幾個來源孔，依 (類型順序, 數字後綴, 代號) 排序
pub fn wells_needed(
    demand: &BTreeMap<BuildingBlockId, usize>,
    catalog: &BuildingBlockCatalog,
    usable_volume: Volume,
) -> Result<Vec<(BuildingBlockId, usize)>> {
    let mut needed = Vec::with_capacity(demand.len());
    for (block, &count) in demand {
        let dispense = catalog
            .dispense_volume(block)
            .ok_or_else(|| PickError::UnknownBuildingBlockError {
                block: block.to_string(),
                plate: "<demand>".to_string(),
                well: "-".to_string(),
            })?;
        if dispense > usable_volume {
            return Err(PickError::InvalidConfigValueError {
                field: "source.usable_volume_ul".to_string(),
                value: usable_volume.to_string(),
                reason: format!("A single '{}' transfer needs {}", block, dispense),
            });
        }
        // 每孔可抽的次數
        let draws_per_well = (usable_volume.as_nanoliters() / dispense.as_nanoliters()) as usize;
        needed.push((block.clone(), count.div_ceil(draws_per_well)));
    }
    needed.sort_by_key(|(block, _)| catalog.sort_key(block));
    Ok(needed)
}

/// 依需求量產生來源盤配置
///
/// 先嘗試單一盤：依有需求的類型數把列平均切成區帶，每個類型一個區帶。
/// 任一區帶放不下時，改成每個類型從新的一盤開始，滿了就換下一盤。
pub fn allocate_sources(
    targets: &[TargetPlate],
    catalog: &BuildingBlockCatalog,
    settings: &AllocationSettings,
) -> Result<SourceInventory> {
    let demand = count_demand(targets);
    let needed = wells_needed(&demand, catalog, settings.usable_volume)?;
    tracing::debug!("Wells needed per building block: {:?}", needed);

    // 依類型分組，保持排序
    let mut groups: Vec<(usize, Vec<(BuildingBlockId, usize)>)> = Vec::new();
    for (block, wells) in needed {
        let type_index = catalog.sort_key(&block).0;
        let same_type = groups.last().is_some_and(|(index, _)| *index == type_index);
        if same_type {
            if let Some((_, members)) = groups.last_mut() {
                members.push((block, wells));
            }
        } else {
            groups.push((type_index, vec![(block, wells)]));
        }
    }

    let mut inventory = SourceInventory::new(settings.max_plates);
    if groups.is_empty() {
        return Ok(inventory);
    }

    if let Some(assignment) = single_plate_bands(&groups, settings.format) {
        let plate = inventory.add_plate(plate_name(settings, 1), settings.format)?;
        for (well, block) in assignment {
            inventory.stock(plate, well, block, settings.usable_volume)?;
        }
        tracing::info!("📋 All building blocks fit on a single source plate");
        return Ok(inventory);
    }

    let capacity = settings.format.well_count();
    let required: usize = groups
        .iter()
        .map(|(_, members)| members.iter().map(|(_, w)| w).sum::<usize>().div_ceil(capacity))
        .sum();
    if required > settings.max_plates {
        return Err(PickError::TooManySourcePlatesError {
            required,
            max: settings.max_plates,
        });
    }

    for (_, members) in &groups {
        let mut plate = inventory.add_plate(plate_name(settings, inventory.plate_count() + 1), settings.format)?;
        let mut slot = 0;
        for (block, wells) in members {
            for _ in 0..*wells {
                if slot == capacity {
                    plate = inventory.add_plate(plate_name(settings, inventory.plate_count() + 1), settings.format)?;
                    slot = 0;
                }
                if let Some(well) = settings.format.well_at_index(slot) {
                    inventory.stock(plate, well, block.clone(), settings.usable_volume)?;
                }
                slot += 1;
            }
        }
    }

    tracing::info!(
        "📋 Building blocks split across {} source plates",
        inventory.plate_count()
    );
    Ok(inventory)
}

fn plate_name(settings: &AllocationSettings, number: usize) -> String {
    format!("{}{}", settings.barcode_prefix, number)
}

/// 單盤區帶配置，放不下時回傳 None
fn single_plate_bands(
    groups: &[(usize, Vec<(BuildingBlockId, usize)>)],
    format: PlateFormat,
) -> Option<Vec<(WellId, BuildingBlockId)>> {
    let bands = groups.len();
    let mut assignment = Vec::new();

    for (band, (_, members)) in groups.iter().enumerate() {
        let first_row = band * format.rows / bands;
        let last_row = (band + 1) * format.rows / bands;
        let mut slots = (first_row..last_row)
            .flat_map(|row| (0..format.columns).map(move |column| WellId::new(row, column)));

        for (block, wells) in members {
            for _ in 0..*wells {
                assignment.push((slots.next()?, block.clone()));
            }
        }
    }

    Some(assignment)
}
