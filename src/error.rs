use std::collections::TryReserveError;

use nix::errno::Errno;

use crate::Pid;


pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Tracee died while processing request, pid = {pid}")]
    TraceeDied {
        pid: Pid,
        source: nix::Error,
    },

    #[error("Call stack is full, depth = {depth}")]
    CallStackFull { depth: usize },

    #[error("Could not allocate context for thread = {tid}")]
    Alloc {
        tid: Pid,
        source: TryReserveError,
    },

    #[error("OS error")]
    OS(#[from] nix::Error),
}

impl Error {
    /// Returns `true` if the error was caused by the tracee thread no longer existing.
    ///
    /// This is an expected race whenever a multi-threaded tracee has threads exiting,
    /// and callers usually treat it as "nothing happened".
    pub fn tracee_died(&self) -> bool {
        matches!(self, Error::TraceeDied { .. })
    }
}

pub(crate) trait ResultExt<T> {
    fn died_if_esrch(self, pid: Pid) -> Result<T>;
}

impl<T> ResultExt<T> for nix::Result<T> {
    fn died_if_esrch(self, pid: Pid) -> Result<T> {
        self.map_err(|source| {
            if source == Errno::ESRCH {
                Error::TraceeDied { pid, source }
            } else {
                Error::OS(source)
            }
        })
    }
}
