use std::future::Future;

use iced::executor::Executor;
use iced::futures;
use tokio::runtime::{Builder, Runtime};

const API_WORKER_THREADS: usize = 2;
const API_WORKER_STACK_SIZE_BYTES: usize = 2 * 1024 * 1024;

/// Multi-thread tokio runtime for iced commands, so reqwest futures have a
/// reactor and timer to run on.
#[derive(Debug)]
pub struct FarmApiExecutor {
    runtime: Runtime,
}

impl Executor for FarmApiExecutor {
    fn new() -> Result<Self, futures::io::Error> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(API_WORKER_THREADS)
            .thread_name("farmplot-api")
            .thread_stack_size(API_WORKER_STACK_SIZE_BYTES)
            .enable_all()
            .build()?;
        Ok(Self { runtime })
    }

    fn spawn(&self, future: impl Future<Output = ()> + Send + 'static) {
        let _ = self.runtime.spawn(future);
    }

    fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.runtime.enter();
        f()
    }
}
