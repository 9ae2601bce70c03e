pub mod listing;
pub mod service;

pub use listing::{FileEntry, HttpFileServer, RemoteListing};
pub use service::{ModelRunProperty, ModelRunService};
