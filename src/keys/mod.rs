pub mod dictionary;
pub mod factory;
pub mod file;
pub mod ports;
pub mod types;

pub use dictionary::{DictionaryKeysLookup, DictionaryLookupConfig};
pub use factory::{KeysLookupConstructor, KeysLookupFactory};
pub use file::{read_keys_file, summarize_keys_file, write_keys_file};
pub use ports::KeysLookupService;
pub use types::{KeysLookupStatus, KeysRecord, KeysSummary};
