pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::toml_config::TomlConfig;
#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::{self, Validate};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "cherrypick")]
#[command(about = "Turn target plate layouts into cherry-picking transfer files")]
pub struct CliConfig {
    /// 目標盤配置 CSV，指定後不再掃描目錄
    #[arg(short = 'f', long, value_delimiter = ',')]
    pub files: Vec<String>,

    #[arg(long, help = "Directory scanned for target layout CSVs")]
    pub layout_dir: Option<String>,

    #[arg(short, long, help = "TOML configuration file")]
    pub config: Option<String>,

    #[arg(short, long, help = "Directory for the generated files")]
    pub output_path: Option<String>,

    #[arg(long, help = "Resolve and summarize without writing files")]
    pub dry_run: bool,

    #[arg(long)]
    pub max_source_plates: Option<usize>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列參數覆蓋 TOML 設定
    pub fn apply_overrides(&self, config: &mut TomlConfig) {
        if !self.files.is_empty() {
            config.target.layout_files = Some(self.files.clone());
        }
        if let Some(dir) = &self.layout_dir {
            config.target.layout_dir = Some(dir.clone());
        }
        if let Some(path) = &self.output_path {
            config.output.output_path = Some(path.clone());
        }
        if let Some(max) = self.max_source_plates {
            config.source.max_plates = Some(max);
        }
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        for file in &self.files {
            validation::validate_extension("files", file, "csv")?;
        }
        if let Some(dir) = &self.layout_dir {
            validation::validate_name("layout_dir", dir)?;
        }
        if let Some(path) = &self.output_path {
            validation::validate_name("output_path", path)?;
        }
        if let Some(max) = self.max_source_plates {
            validation::validate_source_plate_limit("max_source_plates", max)?;
        }
        Ok(())
    }
}
