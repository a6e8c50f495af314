//! Error types for the threading core.
//!
//! Only thread creation can fail recoverably; everything the scheduler treats
//! as a contract violation (releasing an unheld lock, double initialization,
//! a corrupted descriptor) is a fatal assertion instead.

use core::fmt;

/// Result type for threading operations.
pub type ThreadResult<T> = Result<T, ThreadError>;

/// Result type for spawn operations.
pub type SpawnResult<T> = Result<T, SpawnError>;

/// Umbrella error type for threading operations.
///
/// Spawning is the only operation with a recoverable failure today; the
/// wrapper keeps call sites that mix operation families on one error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadError {
    /// Thread spawning errors
    Spawn(SpawnError),
}

/// Errors that can occur during thread creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The scheduling core has not been initialized yet
    NotInitialized,
    /// Priority outside the valid range
    InvalidPriority(u8),
    /// Thread name is empty
    InvalidName,
    /// No page available for the descriptor and stack
    OutOfMemory,
}

impl fmt::Display for ThreadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadError::Spawn(e) => write!(f, "thread spawn error: {}", e),
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::NotInitialized => write!(f, "threading core not initialized"),
            SpawnError::InvalidPriority(prio) => write!(f, "invalid priority: {}", prio),
            SpawnError::InvalidName => write!(f, "invalid thread name"),
            SpawnError::OutOfMemory => write!(f, "out of memory for thread creation"),
        }
    }
}

impl From<SpawnError> for ThreadError {
    fn from(error: SpawnError) -> Self {
        ThreadError::Spawn(error)
    }
}
