use crate::{Error, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::env;
use std::sync::{Arc, OnceLock};

/// Environment variable consulted for the worker count.
pub const THREADS_ENV_VAR: &str = "M3C2_CPU_THREADS";

static GLOBAL_POOL: OnceLock<Result<()>> = OnceLock::new();

/// Size the global Rayon pool used by every M3C2 run without a pool of its
/// own.
///
/// Only the first call configures anything; every later call gets the same
/// outcome back. Without `num_threads` the count is read from
/// `M3C2_CPU_THREADS`, and Rayon sizes the pool itself when neither is set.
pub fn init_global_thread_pool(num_threads: Option<usize>) -> Result<()> {
    GLOBAL_POOL
        .get_or_init(|| {
            let threads = match num_threads {
                Some(0) => return Err(Error::invalid_parameter("num_threads must be >= 1")),
                Some(n) => Some(n),
                None => threads_from_env()?,
            };
            ThreadPoolBuilder::new()
                .num_threads(threads.unwrap_or(0))
                .thread_name(|i| format!("m3c2-worker-{i}"))
                .build_global()
                .map_err(|e| Error::Runtime(e.to_string()))
        })
        .clone()
}

/// Build a dedicated pool, for callers that keep M3C2 work off the global pool.
pub fn build_thread_pool(num_threads: usize) -> Result<Arc<ThreadPool>> {
    if num_threads == 0 {
        return Err(Error::invalid_parameter("num_threads must be >= 1"));
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("m3c2-worker-{i}"))
        .build()
        .map_err(|e| Error::Runtime(e.to_string()))?;
    Ok(Arc::new(pool))
}

fn threads_from_env() -> Result<Option<usize>> {
    match env::var(THREADS_ENV_VAR) {
        Ok(raw) => parse_thread_count(&raw).map(Some),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::InvalidParameter(format!("{THREADS_ENV_VAR}: {e}"))),
    }
}

fn parse_thread_count(raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::InvalidParameter(format!(
            "{THREADS_ENV_VAR} must be a positive integer, got '{raw}'"
        ))),
    }
}
