use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;

/// External tools the standard stages run.
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub ffmpeg: String,
    pub prep_script: String,
    pub blur_script: String,
    pub frame_sample_rate: u32,
}

/// Runtime settings derived from the config file.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub storage_directory: PathBuf,
    pub database_path: Option<PathBuf>,
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub tools: ToolPaths,
    pub invocation_timeout: Option<Duration>,
    pub verify_outputs: bool,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            storage_directory: PathBuf::from(&config.storage_directory),
            database_path: config.database_path.as_ref().map(PathBuf::from),
            worker_count: config.worker_count,
            queue_capacity: config.queue_capacity,
            tools: ToolPaths {
                ffmpeg: config.tools.ffmpeg.clone(),
                prep_script: config.tools.prep_script.clone(),
                blur_script: config.tools.blur_script.clone(),
                frame_sample_rate: config.tools.frame_sample_rate,
            },
            invocation_timeout: match config.tools.timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            verify_outputs: config.tools.verify_outputs,
        }
    }
}
