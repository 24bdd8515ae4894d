pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::pipelines::CherryPickPipeline;
pub use app::report::RunReport;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};
pub use crate::core::etl::PickEngine;
pub use domain::plan::{PickResult, TransferInstruction, TransferPlan};
pub use utils::error::{PickError, Result};
