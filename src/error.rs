use std::fmt;

/// Typed errors for sakin operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A thread asked for a reader slot on a reclaimable object whose
    /// fixed-size slot array is exhausted.
    TooManyThreads {
        /// Slot capacity of the object the request was made against.
        max_threads: usize,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TooManyThreads { max_threads } => {
                write!(
                    f,
                    "exceeded maximum number of reader-owning threads ({})",
                    max_threads
                )
            }
        }
    }
}

impl std::error::Error for Error {}
