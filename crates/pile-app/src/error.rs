/// Errors from the application context.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No application context has been installed.
    #[error("no application context is installed")]
    NotInstalled,

    /// An application context is already installed.
    #[error("application context `{0}` is already installed")]
    AlreadyInstalled(String),

    /// The memory model can only change while no application is installed.
    #[error("memory model cannot change while an application is installed")]
    MemoryModelLocked,

    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading the configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The process-wide slot lock was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for application context operations.
pub type AppResult<T> = Result<T, AppError>;
