pub mod pool;

pub use pool::{WorkerPool, DEFAULT_WORKER_COUNT};
