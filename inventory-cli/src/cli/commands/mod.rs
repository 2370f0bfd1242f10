pub mod image;
pub mod record;
pub mod workbook;

pub use image::ImageCommands;
pub use record::RecordCommands;
pub use workbook::WorkbookCommands;
