use crate::domain::layout::LayoutGrid;
use crate::domain::model::row_label;
use crate::domain::plate::Plate;
use crate::utils::error::Result;
use csv::{ReaderBuilder, Trim, WriterBuilder};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 讀取盤面格式的 CSV
///
/// 第一列為表頭；完全空白的列會被略過（Excel 常在檔尾留下 `,,,,`）。
pub fn read_grid(data: &[u8]) -> Result<LayoutGrid> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        records.push(cells);
    }

    let mut records = records.into_iter();
    let header = records.next().unwrap_or_default();
    Ok(LayoutGrid::new(header, records.collect()))
}

/// 將盤面寫回盤面格式的 CSV，`cell` 決定每孔輸出的文字
pub fn write_plate_grid<T, F>(plate: &Plate<T>, cell: F) -> Result<Vec<u8>>
where
    F: Fn(&T) -> String,
{
    let format = plate.format();
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    let mut header = vec![String::new()];
    header.extend((1..=format.columns).map(|c| c.to_string()));
    writer.write_record(&header)?;

    for row in 0..format.rows {
        let mut record = vec![row_label(row)];
        for column in 0..format.columns {
            record.push(cell(plate.well_at(row, column)?));
        }
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}
