use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

static WELL_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{1,3})0*(\d{1,4})$").expect("valid well id regex"));

/// 孔位座標，內部以 0 為起點；顯示為 `A1`、`P24`、`AF48`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WellId {
    pub row: usize,
    pub column: usize,
}

impl WellId {
    pub fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }

    /// 解析 `A1` 形式的孔位（不分大小寫，允許 `A01`）
    pub fn parse(text: &str) -> Option<Self> {
        let caps = WELL_ID_RE.captures(text.trim())?;
        let row = parse_row_label(&caps[1])?;
        let column: usize = caps[2].parse().ok()?;
        if column == 0 {
            return None;
        }
        Some(Self::new(row, column - 1))
    }

    pub fn row_label(&self) -> String {
        row_label(self.row)
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_label(), self.column + 1)
    }
}

impl FromStr for WellId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("'{}' is not a well identifier", s))
    }
}

impl Serialize for WellId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 列標籤：0 -> A，25 -> Z，26 -> AA
pub fn row_label(row: usize) -> String {
    let mut letters = Vec::new();
    let mut n = row;
    loop {
        letters.push(char::from(b'A' + (n % 26) as u8));
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}

pub fn parse_row_label(label: &str) -> Option<usize> {
    if label.is_empty() {
        return None;
    }
    let mut value = 0usize;
    for c in label.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        value = value.checked_mul(26)?.checked_add(digit)?;
    }
    Some(value - 1)
}

/// 盤面規格（列 × 欄）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlateFormat {
    pub rows: usize,
    pub columns: usize,
}

impl PlateFormat {
    pub const WELLS_96: PlateFormat = PlateFormat { rows: 8, columns: 12 };
    pub const WELLS_384: PlateFormat = PlateFormat { rows: 16, columns: 24 };
    pub const WELLS_1536: PlateFormat = PlateFormat { rows: 32, columns: 48 };

    pub fn new(rows: usize, columns: usize) -> Self {
        Self { rows, columns }
    }

    pub fn well_count(&self) -> usize {
        self.rows * self.columns
    }

    pub fn contains(&self, well: &WellId) -> bool {
        well.row < self.rows && well.column < self.columns
    }

    /// row-major 線性索引
    pub fn index_of(&self, well: &WellId) -> Option<usize> {
        self.contains(well).then(|| well.row * self.columns + well.column)
    }

    pub fn well_at_index(&self, index: usize) -> Option<WellId> {
        (index < self.well_count()).then(|| WellId::new(index / self.columns, index % self.columns))
    }

    /// 依 row-major 順序列出所有孔位
    pub fn wells(&self) -> impl Iterator<Item = WellId> + '_ {
        (0..self.well_count()).map(move |i| WellId::new(i / self.columns, i % self.columns))
    }
}

impl fmt::Display for PlateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} ({} wells)", self.rows, self.columns, self.well_count())
    }
}

/// 體積，以奈升 (nL) 整數儲存
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Volume(u64);

impl Volume {
    pub const ZERO: Volume = Volume(0);

    pub const fn from_nanoliters(nl: u64) -> Self {
        Self(nl)
    }

    /// µL 轉換，四捨五入到 nL；負數或非有限值回傳 None
    pub fn from_microliters(ul: f64) -> Option<Self> {
        if !ul.is_finite() || ul < 0.0 {
            return None;
        }
        let nl = (ul * 1000.0).round();
        if nl > u64::MAX as f64 {
            return None;
        }
        Some(Self(nl as u64))
    }

    pub fn as_nanoliters(&self) -> u64 {
        self.0
    }

    pub fn as_microliters(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(self, other: Volume) -> Option<Volume> {
        self.0.checked_sub(other.0).map(Volume)
    }

    pub fn saturating_sub(self, other: Volume) -> Volume {
        Volume(self.0.saturating_sub(other.0))
    }

    /// 以指定單位輸出數字字串（不含單位）
    pub fn format_in(&self, unit: VolumeUnit) -> String {
        match unit {
            VolumeUnit::Nanoliters => self.0.to_string(),
            VolumeUnit::Microliters => {
                let whole = self.0 / 1000;
                let frac = self.0 % 1000;
                if frac == 0 {
                    whole.to_string()
                } else {
                    let text = format!("{}.{:03}", whole, frac);
                    text.trim_end_matches('0').to_string()
                }
            }
        }
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} µL", self.format_in(VolumeUnit::Microliters))
    }
}

impl Add for Volume {
    type Output = Volume;

    fn add(self, rhs: Volume) -> Volume {
        Volume(self.0 + rhs.0)
    }
}

impl AddAssign for Volume {
    fn add_assign(&mut self, rhs: Volume) {
        self.0 += rhs.0;
    }
}

impl Mul<u64> for Volume {
    type Output = Volume;

    fn mul(self, rhs: u64) -> Volume {
        Volume(self.0 * rhs)
    }
}

impl Sum for Volume {
    fn sum<I: Iterator<Item = Volume>>(iter: I) -> Volume {
        iter.fold(Volume::ZERO, |acc, v| acc + v)
    }
}

/// 輸出檔中的體積單位
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeUnit {
    #[default]
    #[serde(rename = "ul")]
    Microliters,
    #[serde(rename = "nl")]
    Nanoliters,
}

/// 具體的 building block 代號，例如 `I12`、`M3`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingBlockId(String);

impl BuildingBlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildingBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildingBlockId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
