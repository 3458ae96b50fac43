pub mod extractor;
pub mod jobs;
pub mod matcher;
pub mod notify;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod scoring;
pub mod store;
pub mod tracker;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use extractor::{PageExtractor, PageSource};
pub use registry::{Registry, RegistrySnapshot};
pub use store::{FileStore, RegistryStore};
pub use tracker::Tracker;
