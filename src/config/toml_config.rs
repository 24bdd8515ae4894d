use crate::domain::allocation::AllocationSettings;
use crate::domain::catalog::{BlockTypeSpec, BuildingBlockCatalog};
use crate::domain::model::{BuildingBlockId, PlateFormat, Volume, VolumeUnit, WellId};
use crate::utils::error::{PickError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_LAYOUT_DIR: &str = "target_plate_layouts";
pub const DEFAULT_USABLE_VOLUME_UL: f64 = 50.0;
pub const DEFAULT_TRANSFER_VOLUME_UL: f64 = 1.0;
pub const DEFAULT_MAX_SOURCE_PLATES: usize = 3;
pub const DEFAULT_STEP_FILE_TEMPLATE: &str = "step{step}.csv";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub target: TargetConfig,
    pub building_blocks: Option<Vec<BuildingBlockConfig>>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunConfig {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetConfig {
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    /// 目標孔容量 (µL)。未設定時不檢查容量，
    /// 盤型與耗材各異，需要時請明確設定，例如 384 孔盤常用 `well_capacity_ul = 12`
    pub well_capacity_ul: Option<f64>,
    pub layout_dir: Option<String>,
    pub layout_files: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingBlockConfig {
    pub id: String,
    pub dispense_volume_ul: f64,
    pub step: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// 依需求自動產生來源盤配置
    #[default]
    Auto,
    /// 使用 `[[source.plates]]` 描述的來源盤
    Explicit,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub mode: Option<SourceMode>,
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    pub usable_volume_ul: Option<f64>,
    pub max_plates: Option<usize>,
    pub barcode_prefix: Option<String>,
    pub plates: Option<Vec<SourcePlateConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePlateConfig {
    pub id: String,
    /// 此盤的列數與行數，未設定時沿用 `[source]` 的盤型
    pub rows: Option<usize>,
    pub columns: Option<usize>,
    /// 盤面格式 CSV，每個非空孔裝入 `stock_volume_ul`
    pub layout: Option<String>,
    pub stock_volume_ul: Option<f64>,
    pub wells: Option<Vec<SourceWellConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceWellConfig {
    pub well: String,
    pub block: String,
    pub volume_ul: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub output_path: Option<String>,
    pub step_file_template: Option<String>,
    pub source_layout_prefix: Option<String>,
    pub volume_unit: Option<VolumeUnit>,
    pub group_by_source_plate: Option<bool>,
    pub write_report: Option<bool>,
    pub report_filename: Option<String>,
    pub archive: Option<ArchiveConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    pub enabled: bool,
    pub filename: String,
}

/// 已驗證的單一來源孔設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWellSpec {
    pub well: WellId,
    pub block: BuildingBlockId,
    pub volume: Volume,
}

fn default_building_blocks() -> Vec<BuildingBlockConfig> {
    [("I", 1), ("M", 1), ("T", 2)]
        .into_iter()
        .map(|(id, step)| BuildingBlockConfig {
            id: id.to_string(),
            dispense_volume_ul: DEFAULT_TRANSFER_VOLUME_UL,
            step: Some(step),
        })
        .collect()
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PickError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PickError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PLATE_DIR})
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PickError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn run_name(&self) -> &str {
        self.run.name.as_deref().unwrap_or("cherrypick")
    }

    pub fn target_format(&self) -> PlateFormat {
        PlateFormat::new(
            self.target.rows.unwrap_or(PlateFormat::WELLS_384.rows),
            self.target.columns.unwrap_or(PlateFormat::WELLS_384.columns),
        )
    }

    pub fn source_format(&self) -> PlateFormat {
        PlateFormat::new(
            self.source.rows.unwrap_or(PlateFormat::WELLS_384.rows),
            self.source.columns.unwrap_or(PlateFormat::WELLS_384.columns),
        )
    }

    /// 單一來源盤的盤型：盤設定 > `[source]` > 384 孔
    pub fn source_plate_format(&self, plate: &SourcePlateConfig) -> PlateFormat {
        let shared = self.source_format();
        PlateFormat::new(
            plate.rows.unwrap_or(shared.rows),
            plate.columns.unwrap_or(shared.columns),
        )
    }

    pub fn layout_dir(&self) -> &str {
        self.target.layout_dir.as_deref().unwrap_or(DEFAULT_LAYOUT_DIR)
    }

    pub fn layout_files(&self) -> &[String] {
        self.target.layout_files.as_deref().unwrap_or_default()
    }

    pub fn destination_capacity(&self) -> Result<Option<Volume>> {
        self.target
            .well_capacity_ul
            .map(|ul| validation::validate_volume("target.well_capacity_ul", ul, false))
            .transpose()
    }

    pub fn building_blocks(&self) -> Vec<BuildingBlockConfig> {
        self.building_blocks.clone().unwrap_or_else(default_building_blocks)
    }

    /// 建立 building block 類型集合
    pub fn catalog(&self) -> Result<BuildingBlockCatalog> {
        let types = self
            .building_blocks()
            .into_iter()
            .map(|b| {
                let field = format!("building_blocks.{}.dispense_volume_ul", b.id);
                let volume = validation::validate_volume(&field, b.dispense_volume_ul, false)?;
                Ok(BlockTypeSpec::new(b.id, volume, b.step.unwrap_or(1)))
            })
            .collect::<Result<Vec<_>>>()?;
        BuildingBlockCatalog::new(types)
    }

    pub fn source_mode(&self) -> SourceMode {
        self.source.mode.unwrap_or_default()
    }

    pub fn usable_volume(&self) -> Result<Volume> {
        validation::validate_volume(
            "source.usable_volume_ul",
            self.source.usable_volume_ul.unwrap_or(DEFAULT_USABLE_VOLUME_UL),
            false,
        )
    }

    pub fn max_source_plates(&self) -> usize {
        self.source.max_plates.unwrap_or(DEFAULT_MAX_SOURCE_PLATES)
    }

    pub fn barcode_prefix(&self) -> &str {
        self.source.barcode_prefix.as_deref().unwrap_or("Source")
    }

    pub fn source_plates(&self) -> &[SourcePlateConfig] {
        self.source.plates.as_deref().unwrap_or_default()
    }

    pub fn allocation_settings(&self) -> Result<AllocationSettings> {
        Ok(AllocationSettings {
            format: self.source_format(),
            usable_volume: self.usable_volume()?,
            max_plates: self.max_source_plates(),
            barcode_prefix: self.barcode_prefix().to_string(),
        })
    }

    /// 來源盤的裝入量：盤設定優先，否則使用 usable volume
    pub fn stock_volume(&self, plate: &SourcePlateConfig) -> Result<Volume> {
        match plate.stock_volume_ul {
            Some(ul) => validation::validate_volume(&format!("source.plates.{}.stock_volume_ul", plate.id), ul, false),
            None => self.usable_volume(),
        }
    }

    /// 驗證並轉換 `[[source.plates.wells]]`
    pub fn source_wells(&self, plate: &SourcePlateConfig, catalog: &BuildingBlockCatalog) -> Result<Vec<SourceWellSpec>> {
        let format = self.source_plate_format(plate);
        let default_volume = self.stock_volume(plate)?;

        plate
            .wells
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|w| {
                let field = format!("source.plates.{}.wells", plate.id);
                let well = WellId::parse(&w.well)
                    .filter(|id| format.contains(id))
                    .ok_or_else(|| PickError::InvalidConfigValueError {
                        field: field.clone(),
                        value: w.well.clone(),
                        reason: format!("Not a well of a {} plate", format),
                    })?;
                let block = BuildingBlockId::new(w.block.trim());
                if !catalog.contains(&block) {
                    return Err(PickError::UnknownBuildingBlockError {
                        block: w.block.clone(),
                        plate: plate.id.clone(),
                        well: well.to_string(),
                    });
                }
                let volume = match w.volume_ul {
                    Some(ul) => validation::validate_volume(&field, ul, true)?,
                    None => default_volume,
                };
                Ok(SourceWellSpec { well, block, volume })
            })
            .collect()
    }

    pub fn output_path(&self) -> &str {
        self.output.output_path.as_deref().unwrap_or(".")
    }

    pub fn step_file_name(&self, step: u32) -> String {
        self.output
            .step_file_template
            .as_deref()
            .unwrap_or(DEFAULT_STEP_FILE_TEMPLATE)
            .replace("{step}", &step.to_string())
    }

    pub fn source_layout_file_name(&self, plate_id: &str) -> String {
        format!(
            "{}_{}.csv",
            self.output.source_layout_prefix.as_deref().unwrap_or("source"),
            plate_id
        )
    }

    pub fn volume_unit(&self) -> VolumeUnit {
        self.output.volume_unit.unwrap_or_default()
    }

    pub fn group_by_source_plate(&self) -> bool {
        self.output.group_by_source_plate.unwrap_or(true)
    }

    pub fn write_report(&self) -> bool {
        self.output.write_report.unwrap_or(true)
    }

    pub fn report_filename(&self) -> &str {
        self.output.report_filename.as_deref().unwrap_or("report.json")
    }

    pub fn archive_filename(&self) -> Option<&str> {
        self.output
            .archive
            .as_ref()
            .filter(|a| a.enabled)
            .map(|a| a.filename.as_str())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        if let Some(name) = &self.run.name {
            validation::validate_name("run.name", name)?;
        }

        validation::validate_plate_format("target", self.target_format())?;
        validation::validate_plate_format("source", self.source_format())?;

        let catalog = self.catalog()?;
        self.destination_capacity()?;
        let usable = self.usable_volume()?;
        validation::validate_source_plate_limit("source.max_plates", self.max_source_plates())?;
        validation::validate_name("source.barcode_prefix", self.barcode_prefix())?;

        validation::validate_name("target.layout_dir", self.layout_dir())?;
        for file in self.layout_files() {
            validation::validate_extension("target.layout_files", file, "csv")?;
        }
        validation::validate_name("output.output_path", self.output_path())?;

        let template = self
            .output
            .step_file_template
            .as_deref()
            .unwrap_or(DEFAULT_STEP_FILE_TEMPLATE);
        if !template.contains("{step}") {
            return Err(PickError::InvalidConfigValueError {
                field: "output.step_file_template".to_string(),
                value: template.to_string(),
                reason: "Template must contain '{step}'".to_string(),
            });
        }

        if let Some(archive) = self.output.archive.as_ref().filter(|a| a.enabled) {
            validation::validate_extension("output.archive.filename", &archive.filename, "zip")?;
        }

        match self.source_mode() {
            SourceMode::Auto => {
                for spec in catalog.types() {
                    if spec.dispense_volume > usable {
                        return Err(PickError::InvalidConfigValueError {
                            field: format!("building_blocks.{}.dispense_volume_ul", spec.id),
                            value: spec.dispense_volume.to_string(),
                            reason: format!("Exceeds the usable source well volume of {}", usable),
                        });
                    }
                }
            }
            SourceMode::Explicit => self.validate_source_plates(&catalog)?,
        }

        Ok(())
    }

    fn validate_source_plates(&self, catalog: &BuildingBlockCatalog) -> Result<()> {
        let plates = self.source_plates();
        if plates.is_empty() {
            return Err(PickError::MissingConfigError {
                field: "source.plates".to_string(),
            });
        }
        if plates.len() > self.max_source_plates() {
            return Err(PickError::TooManySourcePlatesError {
                required: plates.len(),
                max: self.max_source_plates(),
            });
        }

        let mut ids = HashSet::new();
        for plate in plates {
            validation::validate_name("source.plates.id", &plate.id)?;
            if !ids.insert(plate.id.as_str()) {
                return Err(PickError::InvalidConfigValueError {
                    field: "source.plates.id".to_string(),
                    value: plate.id.clone(),
                    reason: "Duplicate source plate id".to_string(),
                });
            }
            if plate.layout.is_none() && plate.wells.as_deref().unwrap_or_default().is_empty() {
                return Err(PickError::ConfigValidationError {
                    field: format!("source.plates.{}", plate.id),
                    message: "A source plate needs a layout file or at least one well".to_string(),
                });
            }
            if let Some(layout) = &plate.layout {
                validation::validate_extension(&format!("source.plates.{}.layout", plate.id), layout, "csv")?;
            }
            let field = format!("source.plates.{}", plate.id);
            validation::validate_plate_format(&field, self.source_plate_format(plate))?;
            self.stock_volume(plate)?;
            self.source_wells(plate, catalog)?;
        }
        Ok(())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_match_historical_setup() {
        let config = TomlConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.target_format(), PlateFormat::WELLS_384);
        assert_eq!(config.source_format(), PlateFormat::WELLS_384);
        assert_eq!(config.source_mode(), SourceMode::Auto);
        assert_eq!(config.max_source_plates(), 3);
        assert_eq!(config.usable_volume().unwrap(), Volume::from_nanoliters(50_000));
        assert_eq!(config.layout_dir(), "target_plate_layouts");
        assert_eq!(config.step_file_name(2), "step2.csv");
        assert_eq!(config.source_layout_file_name("Source1"), "source_Source1.csv");

        let catalog = config.catalog().unwrap();
        let steps: Vec<(&str, u32)> = catalog.types().iter().map(|t| (t.id.as_str(), t.step)).collect();
        assert_eq!(steps, vec![("I", 1), ("M", 1), ("T", 2)]);
        assert!(catalog
            .types()
            .iter()
            .all(|t| t.dispense_volume == Volume::from_nanoliters(1000)));
    }

    #[test]
    fn test_parse_explicit_source_config() {
        let toml_content = r#"
[run]
name = "library-7"

[target]
rows = 16
columns = 24
well_capacity_ul = 12.5

[[building_blocks]]
id = "A"
dispense_volume_ul = 2.5

[[building_blocks]]
id = "B"
dispense_volume_ul = 5
step = 2

[source]
mode = "explicit"
max_plates = 2

[[source.plates]]
id = "Stock1"
stock_volume_ul = 40

[[source.plates.wells]]
well = "A1"
block = "A1"

[[source.plates.wells]]
well = "B2"
block = "B7"
volume_ul = 20

[output]
volume_unit = "nl"
step_file_template = "transfer_{step}.csv"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.run_name(), "library-7");
        assert_eq!(config.source_mode(), SourceMode::Explicit);
        assert_eq!(config.volume_unit(), VolumeUnit::Nanoliters);
        assert_eq!(config.step_file_name(1), "transfer_1.csv");
        assert_eq!(
            config.destination_capacity().unwrap(),
            Some(Volume::from_nanoliters(12_500))
        );

        let catalog = config.catalog().unwrap();
        let wells = config.source_wells(&config.source_plates()[0], &catalog).unwrap();
        assert_eq!(wells.len(), 2);
        assert_eq!(wells[0].volume, Volume::from_nanoliters(40_000));
        assert_eq!(wells[1].well, WellId::new(1, 1));
        assert_eq!(wells[1].volume, Volume::from_nanoliters(20_000));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CHERRYPICK_TEST_LAYOUT_DIR", "/data/plates");

        let toml_content = r#"
[target]
layout_dir = "${CHERRYPICK_TEST_LAYOUT_DIR}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.layout_dir(), "/data/plates");

        std::env::remove_var("CHERRYPICK_TEST_LAYOUT_DIR");
    }

    #[test]
    fn test_config_validation_failures() {
        let explicit_without_plates = TomlConfig::from_toml_str("[source]\nmode = \"explicit\"\n").unwrap();
        assert!(matches!(
            explicit_without_plates.validate(),
            Err(PickError::MissingConfigError { .. })
        ));

        let too_many = TomlConfig::from_toml_str(
            r#"
[source]
mode = "explicit"
max_plates = 1

[[source.plates]]
id = "S1"
layout = "s1.csv"

[[source.plates]]
id = "S2"
layout = "s2.csv"
"#,
        )
        .unwrap();
        assert!(matches!(
            too_many.validate(),
            Err(PickError::TooManySourcePlatesError { required: 2, max: 1 })
        ));

        let unknown_block = TomlConfig::from_toml_str(
            r#"
[source]
mode = "explicit"

[[source.plates]]
id = "S1"
wells = [{ well = "A1", block = "Q1" }]
"#,
        )
        .unwrap();
        assert!(matches!(
            unknown_block.validate(),
            Err(PickError::UnknownBuildingBlockError { .. })
        ));

        let bad_well = TomlConfig::from_toml_str(
            r#"
[source]
mode = "explicit"

[[source.plates]]
id = "S1"
wells = [{ well = "Q99", block = "I1" }]
"#,
        )
        .unwrap();
        assert!(bad_well.validate().is_err());

        let bad_template = TomlConfig::from_toml_str("[output]\nstep_file_template = \"out.csv\"\n").unwrap();
        assert!(bad_template.validate().is_err());

        let oversized_dispense = TomlConfig::from_toml_str(
            r#"
[source]
usable_volume_ul = 0.5
"#,
        )
        .unwrap();
        assert!(oversized_dispense.validate().is_err());

        let zero_plates = TomlConfig::from_toml_str("[source]\nmax_plates = 0\n").unwrap();
        assert!(zero_plates.validate().is_err());
    }

    #[test]
    fn test_source_plates_keep_their_own_geometry() {
        let config = TomlConfig::from_toml_str(
            r#"
[source]
mode = "explicit"

[[source.plates]]
id = "S96"
rows = 8
columns = 12
wells = [{ well = "H12", block = "I1" }]

[[source.plates]]
id = "S384"
wells = [{ well = "P24", block = "M1" }]
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());

        let plates = config.source_plates();
        assert_eq!(config.source_plate_format(&plates[0]), PlateFormat::WELLS_96);
        assert_eq!(config.source_plate_format(&plates[1]), PlateFormat::WELLS_384);

        let catalog = config.catalog().unwrap();
        let wells = config.source_wells(&plates[0], &catalog).unwrap();
        assert_eq!(wells[0].well, WellId::new(7, 11));

        // P24 不在 96 孔盤上
        let outside = TomlConfig::from_toml_str(
            r#"
[source]
mode = "explicit"

[[source.plates]]
id = "S96"
rows = 8
columns = 12
wells = [{ well = "P24", block = "I1" }]
"#,
        )
        .unwrap();
        match outside.validate() {
            Err(PickError::InvalidConfigValueError { field, value, .. }) => {
                assert_eq!(field, "source.plates.S96.wells");
                assert_eq!(value, "P24");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let shared = TomlConfig::from_toml_str(
            "[source]\nrows = 32\ncolumns = 48\nmode = \"explicit\"\n\n[[source.plates]]\nid = \"S1\"\nrows = 16\nwells = [{ well = \"A1\", block = \"I1\" }]\n",
        )
        .unwrap();
        assert_eq!(
            shared.source_plate_format(&shared.source_plates()[0]),
            PlateFormat::new(16, 48)
        );

        let oversized = TomlConfig::from_toml_str(
            "[source]\nmode = \"explicit\"\n\n[[source.plates]]\nid = \"S1\"\nrows = 100\nwells = [{ well = \"A1\", block = \"I1\" }]\n",
        )
        .unwrap();
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn test_destination_capacity_is_opt_in() {
        assert_eq!(TomlConfig::default().destination_capacity().unwrap(), None);

        let config = TomlConfig::from_toml_str("[target]\nwell_capacity_ul = 12\n").unwrap();
        assert_eq!(
            config.destination_capacity().unwrap(),
            Some(Volume::from_nanoliters(12_000))
        );

        let zero = TomlConfig::from_toml_str("[target]\nwell_capacity_ul = 0\n").unwrap();
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = TomlConfig::from_toml_str("[target\nrows = 16").unwrap_err();
        assert!(matches!(err, PickError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[run]
name = "file-test"

[output]
output_path = "./picks"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.run_name(), "file-test");
        assert_eq!(config.output_path(), "./picks");
    }
}
