use crate::domain::model::{BuildingBlockId, Volume, WellId};
use serde::Serialize;
use thiserror::Error;

/// 某個 building block 在來源孔中的剩餘量（錯誤回報用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub plate: String,
    pub well: WellId,
    pub stocked: Volume,
    pub remaining: Volume,
}

fn describe_stock(stock: &[StockLevel]) -> String {
    if stock.is_empty() {
        return "no source well was ever stocked with it".to_string();
    }
    let wells: Vec<String> = stock
        .iter()
        .map(|s| format!("{}:{} {}/{}", s.plate, s.well, s.remaining, s.stocked))
        .collect();
    format!("remaining stock {}", wells.join(", "))
}

fn describe_destination(destination: &Option<String>) -> String {
    destination
        .as_ref()
        .map(|d| format!(" for destination {}", d))
        .unwrap_or_default()
}

#[derive(Error, Debug)]
pub enum PickError {
    #[error("Archive operation failed: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Well (row {row}, column {column}) is outside plate '{plate}' ({rows}x{columns})")]
    OutOfBoundsError {
        plate: String,
        row: usize,
        column: usize,
        rows: usize,
        columns: usize,
    },

    #[error("Source well {plate}:{well} holds {available} but {requested} was requested")]
    InsufficientVolumeError {
        plate: String,
        well: WellId,
        requested: Volume,
        available: Volume,
    },

    #[error(
        "No source well holds {required} of building block '{block}'{}; {}",
        describe_destination(.destination),
        describe_stock(.stock)
    )]
    BlockNotFoundError {
        block: BuildingBlockId,
        required: Volume,
        destination: Option<String>,
        stock: Vec<StockLevel>,
    },

    #[error("Unknown building block '{block}' in {plate}:{well}")]
    UnknownBuildingBlockError {
        block: String,
        plate: String,
        well: String,
    },

    #[error("Layout '{plate}' does not match the {rows}x{columns} plate format: {reason}")]
    LayoutShapeError {
        plate: String,
        rows: usize,
        columns: usize,
        reason: String,
    },

    #[error("Destination well {plate}:{well} would receive {requested} but holds at most {capacity}")]
    DestinationOverflowError {
        plate: String,
        well: WellId,
        requested: Volume,
        capacity: Volume,
    },

    #[error("{required} source plates are needed but at most {max} are allowed")]
    TooManySourcePlatesError { required: usize, max: usize },

    #[error("No target plate layouts found in {location}")]
    NoLayoutsError { location: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Inventory,
    Internal,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 程式結束碼；任何錯誤都不會以 0 結束
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl PickError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PickError::ConfigError { .. }
            | PickError::ConfigValidationError { .. }
            | PickError::InvalidConfigValueError { .. }
            | PickError::MissingConfigError { .. } => ErrorCategory::Configuration,
            PickError::CsvError(_)
            | PickError::UnknownBuildingBlockError { .. }
            | PickError::LayoutShapeError { .. }
            | PickError::NoLayoutsError { .. } => ErrorCategory::Input,
            PickError::BlockNotFoundError { .. }
            | PickError::DestinationOverflowError { .. }
            | PickError::TooManySourcePlatesError { .. } => ErrorCategory::Inventory,
            PickError::OutOfBoundsError { .. } | PickError::InsufficientVolumeError { .. } => {
                ErrorCategory::Internal
            }
            PickError::ArchiveError(_) | PickError::IoError(_) | PickError::SerializationError(_) => {
                ErrorCategory::Output
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 內部帳目錯誤代表程式 bug
            ErrorCategory::Internal => ErrorSeverity::Critical,
            ErrorCategory::Output => ErrorSeverity::Critical,
            // 庫存不足：調整輸入後可重跑
            ErrorCategory::Inventory => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Input => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            PickError::BlockNotFoundError { block, .. } => format!(
                "Stock more of '{}' (more wells or a larger usable volume) or reduce its demand in the target layouts",
                block
            ),
            PickError::TooManySourcePlatesError { max, .. } => format!(
                "Raise source.max_plates above {} or split the target layouts into several runs",
                max
            ),
            PickError::DestinationOverflowError { .. } => {
                "Lower the dispense volumes or list fewer building blocks per destination well".to_string()
            }
            PickError::UnknownBuildingBlockError { .. } => {
                "Add the building block type to [[building_blocks]] or fix the layout cell".to_string()
            }
            PickError::LayoutShapeError { .. } => {
                "Check that the layout has a header row 1..N and one labelled row per plate row".to_string()
            }
            PickError::NoLayoutsError { .. } => {
                "Pass layout files with -f or point --layout-dir at a folder of CSV layouts".to_string()
            }
            PickError::CsvError(_) => "Make sure the layout files are valid CSV".to_string(),
            PickError::ConfigError { .. }
            | PickError::ConfigValidationError { .. }
            | PickError::InvalidConfigValueError { .. }
            | PickError::MissingConfigError { .. } => {
                "Review the TOML configuration file".to_string()
            }
            PickError::OutOfBoundsError { .. } | PickError::InsufficientVolumeError { .. } => {
                "This is an internal accounting error; please report it with the inputs used".to_string()
            }
            PickError::IoError(_) | PickError::ArchiveError(_) | PickError::SerializationError(_) => {
                "Check file permissions and free disk space in the output directory".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Layout problem: {}", self),
            ErrorCategory::Inventory => format!("Not enough source stock: {}", self),
            ErrorCategory::Internal => format!("Internal error: {}", self),
            ErrorCategory::Output => format!("Could not write output: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PickError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_not_found_message_lists_exhausted_stock() {
        let err = PickError::BlockNotFoundError {
            block: BuildingBlockId::new("I1"),
            required: Volume::from_nanoliters(5000),
            destination: Some("Synthesis1:B3".to_string()),
            stock: vec![StockLevel {
                plate: "Source1".to_string(),
                well: WellId::new(0, 0),
                stocked: Volume::from_nanoliters(50_000),
                remaining: Volume::ZERO,
            }],
        };

        let message = err.to_string();
        assert!(message.contains("'I1'"));
        assert!(message.contains("Synthesis1:B3"));
        assert!(message.contains("Source1:A1 0 µL/50 µL"));
        assert_eq!(err.category(), ErrorCategory::Inventory);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_internal_errors_are_critical() {
        let err = PickError::InsufficientVolumeError {
            plate: "Source1".to_string(),
            well: WellId::new(0, 0),
            requested: Volume::from_nanoliters(2),
            available: Volume::from_nanoliters(1),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().starts_with("Internal error"));
    }

    #[test]
    fn test_every_failure_exits_non_zero() {
        let config = PickError::MissingConfigError {
            field: "source.plates".to_string(),
        };
        let exhausted = PickError::TooManySourcePlatesError { required: 4, max: 3 };
        let output = PickError::IoError(std::io::Error::other("disk full"));

        assert_eq!(config.severity().exit_code(), 1);
        assert_eq!(exhausted.severity().exit_code(), 2);
        assert_eq!(output.severity().exit_code(), 3);
    }
}
