pub mod de;
pub mod models;

pub use models::{
    DocumentDescriptor, ProgressEvent, ProgressRecord, StartSource, StartingPage,
    percent_complete,
};
