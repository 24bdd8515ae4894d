// Adapters layer: concrete file formats around the domain (CSV layouts, transfer files).

pub mod csv_layout;
pub mod transfer_file;
