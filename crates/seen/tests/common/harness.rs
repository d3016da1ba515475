//! Test harness running a real engine against fakes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use seen::db::Database;
use seen::pipeline::ToolPaths;
use seen::{
    Engine, EngineSettings, JobId, JobStore, NewJob, ProcessInvoker, SqliteJobStore, Status,
};

use super::fakes::{BLUR, FFMPEG, PREP};

const WAIT_LIMIT: Duration = Duration::from_secs(10);

pub fn settings(root: &Path) -> EngineSettings {
    EngineSettings {
        storage_directory: root.to_path_buf(),
        database_path: None,
        worker_count: 2,
        queue_capacity: 64,
        tools: ToolPaths {
            ffmpeg: FFMPEG.to_string(),
            prep_script: PREP.to_string(),
            blur_script: BLUR.to_string(),
            frame_sample_rate: 3,
        },
        invocation_timeout: None,
        verify_outputs: true,
    }
}

/// A running engine over a temp storage root.
pub struct TestHarness {
    temp_dir: TempDir,
    pub store: Arc<dyn JobStore>,
    pub engine: Engine,
}

impl TestHarness {
    pub fn start(invoker: Arc<dyn ProcessInvoker>) -> Self {
        let store = SqliteJobStore::new(Database::open_in_memory().unwrap());
        Self::start_with(Arc::new(store), invoker, |s| s)
    }

    pub fn start_with(
        store: Arc<dyn JobStore>,
        invoker: Arc<dyn ProcessInvoker>,
        configure: impl FnOnce(EngineSettings) -> EngineSettings,
    ) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let engine = Engine::start(
            configure(settings(temp_dir.path())),
            Arc::clone(&store),
            invoker,
        )
        .expect("Failed to start engine");

        Self {
            temp_dir,
            store,
            engine,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Plays the ingestion step: writes the upload, then submits it.
    pub fn ingest(&self, origin: &str) -> JobId {
        let id = JobId::new();
        let upload = self.engine.layout().incoming(id, "mov");
        std::fs::write(&upload, b"raw upload").unwrap();
        self.engine
            .submit(&NewJob::new(id, origin, ".mov"))
            .unwrap();
        id
    }

    pub fn status(&self, id: JobId) -> Status {
        self.store.status(id).unwrap()
    }

    /// Polls until `id` reaches `target`, or gives up.
    pub fn wait_for(&self, id: JobId, target: Status) -> bool {
        let deadline = Instant::now() + WAIT_LIMIT;
        while Instant::now() < deadline {
            if self.status(id) == target {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    pub fn complete_path(&self, id: JobId) -> PathBuf {
        self.engine.layout().complete(id)
    }

    /// Stops the workers and joins them.
    pub fn finish(self) {
        self.engine.shutdown();
        self.engine.wait();
    }
}
