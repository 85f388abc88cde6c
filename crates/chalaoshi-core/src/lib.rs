pub mod config;
pub mod error;
pub mod extractor;
pub mod parser;
pub mod passwords;
pub mod record;
pub mod store;

pub use config::{Config, DEFAULT_CONFIG_PATH};
pub use error::{ConfigError, StoreError};
pub use extractor::{list_archive_contents, Extractor};
pub use parser::parse_archive_filename;
pub use passwords::PasswordBook;
pub use record::{ArchiveEntry, ArchiveRecord, Extraction};
pub use store::{MetadataStore, Upserted, DEFAULT_INFO_FILE};
