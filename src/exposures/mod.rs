pub mod manager;
pub mod oasis_files;
pub mod ports;
pub mod profile;
pub mod types;

pub use manager::ExposuresManager;
pub use oasis_files::OasisRow;
pub use ports::ExposuresManagerPort;
pub use profile::{CanonicalProfile, ProfileElement};
pub use types::{GenerateOverrides, KeysReport, ManagerSettings, OasisFilesReport, StageOutcome};
