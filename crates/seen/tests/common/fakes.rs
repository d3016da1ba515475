#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use seen::error::StoreError;
use seen::{Job, JobId, JobRecord, JobStore, NewJob, Outcome, ProcessInvoker, SqliteJobStore, Status};

pub const FFMPEG: &str = "ffmpeg";
pub const PREP: &str = "prep.py";
pub const BLUR: &str = "blur.py";

/// Which argument names the artifact a tool leaves behind.
#[derive(Clone, Copy)]
enum Writes {
    File(usize),
    Directory(usize),
    Nothing,
}

#[derive(Clone)]
struct Script {
    outcome: Outcome,
    writes: Writes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub tool: String,
    pub args: Vec<String>,
}

/// Stands in for ffmpeg and the Python scripts. Successful tools write
/// their output where the real ones would.
pub struct FakeInvoker {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeInvoker {
    /// Every standard stage succeeds and produces its artifact.
    pub fn succeeding() -> Self {
        let mut scripts = HashMap::new();
        scripts.insert(
            FFMPEG.to_string(),
            Script {
                outcome: Outcome::Success,
                writes: Writes::File(2),
            },
        );
        scripts.insert(
            PREP.to_string(),
            Script {
                outcome: Outcome::Success,
                writes: Writes::Directory(1),
            },
        );
        scripts.insert(
            BLUR.to_string(),
            Script {
                outcome: Outcome::Success,
                writes: Writes::File(1),
            },
        );
        Self {
            scripts: Mutex::new(scripts),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Makes `tool` exit non-zero with `message` as its first stderr line.
    pub fn failing(self, tool: &str, message: &str) -> Self {
        self.scripts.lock().unwrap().insert(
            tool.to_string(),
            Script {
                outcome: Outcome::failure(message),
                writes: Writes::Nothing,
            },
        );
        self
    }

    /// Makes `tool` exit zero without writing anything.
    pub fn silent(self, tool: &str) -> Self {
        self.scripts.lock().unwrap().insert(
            tool.to_string(),
            Script {
                outcome: Outcome::Success,
                writes: Writes::Nothing,
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, tool: &str) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.tool == tool).collect()
    }
}

impl ProcessInvoker for FakeInvoker {
    fn invoke(&self, tool: &str, args: &[String]) -> Outcome {
        self.calls.lock().unwrap().push(Call {
            tool: tool.to_string(),
            args: args.to_vec(),
        });

        let script = self.scripts.lock().unwrap().get(tool).cloned();
        let Some(script) = script else {
            return Outcome::failure(format!("process could not start: {} not found", tool));
        };

        match script.writes {
            Writes::File(index) => {
                std::fs::write(&args[index], b"video").unwrap();
            }
            Writes::Directory(index) => {
                let dir = Path::new(&args[index]);
                std::fs::create_dir_all(dir).unwrap();
                std::fs::write(dir.join("1.jpg"), b"frame").unwrap();
            }
            Writes::Nothing => {}
        }

        script.outcome
    }
}

/// Delegates to a SQLite store and counts every call made through the seam.
pub struct CountingStore {
    inner: SqliteJobStore,
    accesses: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: SqliteJobStore) -> Self {
        Self {
            inner,
            accesses: AtomicUsize::new(0),
        }
    }

    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.accesses.fetch_add(1, Ordering::SeqCst);
    }
}

impl JobStore for CountingStore {
    fn create(&self, job: &NewJob) -> Result<(), StoreError> {
        self.touch();
        self.inner.create(job)
    }

    fn find(&self, id: JobId) -> Result<Option<JobRecord>, StoreError> {
        self.touch();
        self.inner.find(id)
    }

    fn status(&self, id: JobId) -> Result<Status, StoreError> {
        self.touch();
        self.inner.status(id)
    }

    fn set_status(&self, id: JobId, from: Status, to: Status) -> Result<(), StoreError> {
        self.touch();
        self.inner.set_status(id, from, to)
    }

    fn set_error(&self, id: JobId, from: Status, message: &str) -> Result<(), StoreError> {
        self.touch();
        self.inner.set_error(id, from, message)
    }

    fn write_guide_data(&self, id: JobId, data: &str) -> Result<(), StoreError> {
        self.touch();
        self.inner.write_guide_data(id, data)
    }

    fn guide_data(&self, id: JobId) -> Result<Option<String>, StoreError> {
        self.touch();
        self.inner.guide_data(id)
    }

    fn matches_origin(&self, id: JobId, address: &str) -> bool {
        self.touch();
        self.inner.matches_origin(id, address)
    }

    fn pending(&self) -> Result<Vec<Job>, StoreError> {
        self.touch();
        self.inner.pending()
    }
}
