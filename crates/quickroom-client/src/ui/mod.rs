mod app;
mod source_picker;

pub use app::QuickroomApp;
pub use source_picker::{EguiSourcePicker, PickRequest, SourcePickerDialog};
