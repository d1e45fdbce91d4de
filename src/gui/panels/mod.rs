mod data_panel;
mod files_panel;
mod upload_panel;

pub use data_panel::DataPanel;
pub use files_panel::FilesPanel;
pub use upload_panel::UploadPanel;
