use crate::domain::model::{PlateFormat, Volume};
use crate::utils::error::{PickError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 盤面最多 64 列 (A..BL) x 128 行
pub const MAX_PLATE_ROWS: usize = 64;
pub const MAX_PLATE_COLUMNS: usize = 128;

fn invalid(field_name: &str, value: impl ToString, reason: impl Into<String>) -> PickError {
    PickError::InvalidConfigValueError {
        field: field_name.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// 名稱、盤號與路徑：不可空白，不可含 NUL
pub fn validate_name(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(field_name, value, "Value cannot be empty or whitespace-only"));
    }
    if value.contains('\0') {
        return Err(invalid(field_name, value, "Value contains null bytes"));
    }
    Ok(())
}

/// `<field>.rows` / `<field>.columns` 必須落在可定址的盤面範圍內
pub fn validate_plate_format(field_name: &str, format: PlateFormat) -> Result<()> {
    if !(1..=MAX_PLATE_ROWS).contains(&format.rows) {
        return Err(invalid(
            &format!("{}.rows", field_name),
            format.rows,
            format!("A plate has between 1 and {} rows", MAX_PLATE_ROWS),
        ));
    }
    if !(1..=MAX_PLATE_COLUMNS).contains(&format.columns) {
        return Err(invalid(
            &format!("{}.columns", field_name),
            format.columns,
            format!("A plate has between 1 and {} columns", MAX_PLATE_COLUMNS),
        ));
    }
    Ok(())
}

pub fn validate_source_plate_limit(field_name: &str, max_plates: usize) -> Result<()> {
    if max_plates == 0 {
        return Err(invalid(field_name, max_plates, "At least one source plate must be allowed"));
    }
    Ok(())
}

/// 副檔名比對不分大小寫
pub fn validate_extension(field_name: &str, file: &str, extension: &str) -> Result<()> {
    match std::path::Path::new(file).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(extension) => Ok(()),
        Some(ext) => Err(invalid(
            field_name,
            file,
            format!("Expected a .{} file, got .{}", extension, ext),
        )),
        None => Err(invalid(field_name, file, format!("Expected a .{} file name", extension))),
    }
}

/// µL 設定值轉成 `Volume`；`allow_zero` 為 false 時 0 也視為錯誤
pub fn validate_volume(field_name: &str, microliters: f64, allow_zero: bool) -> Result<Volume> {
    let volume = Volume::from_microliters(microliters).ok_or_else(|| {
        invalid(
            field_name,
            microliters,
            "Volume must be a finite, non-negative number of microliters",
        )
    })?;
    if !allow_zero && volume.is_zero() {
        return Err(invalid(field_name, microliters, "Volume must be at least 0.001 µL"));
    }
    Ok(volume)
}
