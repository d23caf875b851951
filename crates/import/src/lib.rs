pub mod importer;
pub mod mapper;
pub(crate) mod util;

pub use importer::{CsvImporter, ImportError, ImportStats, REQUIRED_COLUMNS};
pub use mapper::SiteLookup;
