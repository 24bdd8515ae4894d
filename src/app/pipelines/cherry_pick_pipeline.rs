use crate::adapters::{csv_layout, transfer_file};
use crate::app::report::RunReport;
use crate::config::toml_config::{SourceMode, TomlConfig};
use crate::core::{PickResult, Pipeline, Storage};
use crate::domain::allocation::{allocate_sources, count_demand};
use crate::domain::catalog::BuildingBlockCatalog;
use crate::domain::inventory::SourceInventory;
use crate::domain::layout::{parse_source_layout, parse_target_layout};
use crate::domain::plan::TransferInstruction;
use crate::domain::plate::TargetPlate;
use crate::domain::resolver::Resolver;
use crate::utils::error::{PickError, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use zip::write::{FileOptions, ZipWriter};

pub struct CherryPickPipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) config: TomlConfig,
    catalog: BuildingBlockCatalog,
}

impl<S: Storage> CherryPickPipeline<S> {
    pub fn new(storage: S, config: TomlConfig) -> Result<Self> {
        let catalog = config.catalog()?;
        Ok(Self {
            storage,
            config,
            catalog,
        })
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    fn output_file(&self, name: &str) -> String {
        Path::new(self.config.output_path())
            .join(name)
            .to_string_lossy()
            .into_owned()
    }

    /// 明確列出的檔案優先，否則遞迴掃描配置目錄下的 CSV
    async fn discover_layouts(&self) -> Result<Vec<String>> {
        let explicit = self.config.layout_files();
        if !explicit.is_empty() {
            return Ok(explicit.to_vec());
        }

        let dir = self.config.layout_dir();
        let files = match self.storage.list_files(dir).await {
            Ok(files) => files,
            Err(PickError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        let layouts: Vec<String> = files
            .into_iter()
            .filter(|f| {
                Path::new(f)
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();

        if layouts.is_empty() {
            return Err(PickError::NoLayoutsError {
                location: dir.to_string(),
            });
        }
        Ok(layouts)
    }

    async fn read_target(&self, path: &str) -> Result<TargetPlate> {
        let data = self.storage.read_file(path).await?;
        let grid = csv_layout::read_grid(&data)?;

        let stem = Path::new(path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(path);
        let plate_id = grid.plate_id_or(stem);

        parse_target_layout(&grid, &plate_id, self.config.target_format(), &self.catalog)
    }

    /// 依 `[[source.plates]]` 建立庫存：先裝 layout CSV，再套用逐孔設定
    async fn explicit_inventory(&self) -> Result<SourceInventory> {
        let mut inventory = SourceInventory::new(self.config.max_source_plates());

        for plate_config in self.config.source_plates() {
            let format = self.config.source_plate_format(plate_config);
            let index = inventory.add_plate(plate_config.id.clone(), format)?;

            if let Some(layout) = &plate_config.layout {
                let data = self.storage.read_file(layout).await?;
                let grid = csv_layout::read_grid(&data)?;
                let volume = self.config.stock_volume(plate_config)?;
                for (well, block) in parse_source_layout(&grid, &plate_config.id, format, &self.catalog)? {
                    inventory.stock(index, well, block, volume)?;
                }
            }

            for spec in self.config.source_wells(plate_config, &self.catalog)? {
                inventory.stock(index, spec.well, spec.block, spec.volume)?;
            }

            tracing::debug!(
                "Source plate '{}' ({}) holds {} stocked wells",
                plate_config.id,
                format,
                inventory.plates()[index].occupied_wells()
            );
        }

        Ok(inventory)
    }

    fn build_archive(&self, files: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            zip.start_file::<_, ()>(name.as_str(), FileOptions::default())?;
            zip.write_all(data)?;
        }
        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for CherryPickPipeline<S> {
    async fn extract(&self) -> Result<Vec<TargetPlate>> {
        let paths = self.discover_layouts().await?;
        tracing::debug!("Target layout files: {:?}", paths);

        let mut targets = Vec::with_capacity(paths.len());
        let mut seen = HashSet::new();
        for path in &paths {
            let target = self.read_target(path).await?;
            if !seen.insert(target.id().to_string()) {
                return Err(PickError::LayoutShapeError {
                    plate: target.id().to_string(),
                    rows: target.format().rows,
                    columns: target.format().columns,
                    reason: format!("plate id is declared more than once (again in {})", path),
                });
            }
            targets.push(target);
        }

        tracing::info!("📋 Loaded {} target plate layouts", targets.len());
        Ok(targets)
    }

    async fn transform(&self, targets: Vec<TargetPlate>) -> Result<PickResult> {
        let demand = count_demand(&targets);
        tracing::debug!("Demand per building block: {:?}", demand);

        let mut inventory = match self.config.source_mode() {
            SourceMode::Auto => allocate_sources(&targets, &self.catalog, &self.config.allocation_settings()?)?,
            SourceMode::Explicit => self.explicit_inventory().await?,
        };

        let plan = Resolver::new(&self.catalog)
            .with_destination_capacity(self.config.destination_capacity()?)
            .resolve(&targets, &mut inventory)?;

        Ok(PickResult {
            destination_plates: targets.iter().map(|t| t.id().to_string()).collect(),
            demand,
            plan,
            inventory,
        })
    }

    async fn load(&self, result: PickResult) -> Result<String> {
        let unit = self.config.volume_unit();
        let mut written: Vec<(String, Vec<u8>)> = Vec::new();
        let mut step_files = Vec::new();

        for step in result.plan.steps() {
            let transfers: Vec<&TransferInstruction> = if self.config.group_by_source_plate() {
                result.plan.grouped_by_plate(step)
            } else {
                result.plan.for_step(step).collect()
            };
            let name = self.config.step_file_name(step);
            tracing::debug!("Step {}: {} transfers -> {}", step, transfers.len(), name);
            written.push((name.clone(), transfer_file::write_transfers(transfers, unit)?));
            step_files.push((step, name));
        }

        for index in 0..result.inventory.plate_count() {
            if let Some(plate) = result.inventory.stocked_plate(index) {
                let data = csv_layout::write_plate_grid(&plate, |well| {
                    well.occupant().map(|b| b.to_string()).unwrap_or_default()
                })?;
                written.push((self.config.source_layout_file_name(plate.id()), data));
            }
        }

        if self.config.write_report() {
            let report = RunReport::build(self.config.run_name(), &result, &step_files);
            written.push((self.config.report_filename().to_string(), report.to_json()?));
        }

        for (name, data) in &written {
            self.storage.write_file(&self.output_file(name), data).await?;
        }

        if let Some(archive) = self.config.archive_filename() {
            let zip_data = self.build_archive(&written)?;
            tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
            self.storage.write_file(&self.output_file(archive), &zip_data).await?;
        }

        tracing::info!(
            "✅ Wrote {} files to {}",
            written.len(),
            self.config.output_path()
        );
        Ok(self.config.output_path().to_string())
    }
}
