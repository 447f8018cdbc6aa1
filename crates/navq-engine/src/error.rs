use thiserror::Error;

/// Errors reported by the [`Engine`](crate::Engine).
///
/// Search failures are not errors at this level: they are recorded on the
/// path itself (see [`Path::error`](crate::Path::error)).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The path queue was terminated, either by a shutdown or because a
    /// worker thread panicked.
    #[error("the path queue has been terminated")]
    QueueTerminated,
    /// The engine has not been started yet.
    #[error("the engine has not been started")]
    NotStarted,
    /// [`Engine::start`](crate::Engine::start) was called twice.
    #[error("the engine is already running")]
    AlreadyStarted,
    /// Graph locks can only be taken from the thread driving the engine.
    #[error("the graph cannot be locked from a path worker thread")]
    LockFromWorkerThread,
    /// The operating system refused to spawn a worker.
    #[error("failed to spawn path worker {id}: {reason}")]
    Spawn { id: usize, reason: String },
}
