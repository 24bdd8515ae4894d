use crate::domain::model::VolumeUnit;
use crate::domain::plan::TransferInstruction;
use crate::utils::error::Result;
use csv::WriterBuilder;

/// 液體處理機讀取的欄位順序
pub const TRANSFER_HEADER: [&str; 5] = [
    "Source Barcode",
    "Source Well",
    "Destination Barcode",
    "Destination Well",
    "Volume",
];

/// 將轉移寫成 cherry-picking CSV，每筆一列
pub fn write_transfers<'a, I>(transfers: I, unit: VolumeUnit) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a TransferInstruction>,
{
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(TRANSFER_HEADER)?;

    for t in transfers {
        writer.write_record([
            t.source_plate.as_str(),
            &t.source_well.to_string(),
            t.destination_plate.as_str(),
            &t.destination_well.to_string(),
            &t.volume.format_in(unit),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()).into())
}
