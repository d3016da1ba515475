pub mod claims;
pub mod config;
pub mod error;
pub mod layout;
pub mod runner;
pub mod stage;

pub use claims::{Claim, InFlight};
pub use config::{EngineSettings, ToolPaths};
pub use error::PipelineError;
pub use layout::StorageLayout;
pub use runner::{Pipeline, Skip, StageReport, StageResult};
pub use stage::{Artifact, Blur, Normalise, SampleFrames, StageCommand, StageHandler, StageInput, StageTable};
