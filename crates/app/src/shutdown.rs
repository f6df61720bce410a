//! Process signals that stop the controller.
//!
//! Handlers are installed up front so a failure surfaces at startup instead of
//! leaving a controller that cannot be stopped cleanly.

use std::{
    fmt::{self, Display, Formatter},
    io,
};

use thiserror::Error;
use tokio::signal;

/// Signal that asked the controller to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGINT, or Ctrl+C on Windows.
    Interrupt,

    /// SIGTERM, or the console closing on Windows.
    Terminate,
}

impl StopSignal {
    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
        }
    }
}

impl Display for StopSignal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handler for `signal` could not be installed.
#[derive(Debug, Error)]
#[error("failed to install {signal} handler")]
pub struct SignalInstallError {
    signal: StopSignal,
    #[source]
    source: io::Error,
}

impl SignalInstallError {
    fn new(signal: StopSignal) -> impl FnOnce(io::Error) -> Self {
        move |source| Self { signal, source }
    }
}

/// Installed stop signal handlers.
#[derive(Debug)]
pub struct StopSignals {
    #[cfg(unix)]
    interrupt: signal::unix::Signal,
    #[cfg(unix)]
    terminate: signal::unix::Signal,

    #[cfg(windows)]
    interrupt: signal::windows::CtrlC,
    #[cfg(windows)]
    terminate: signal::windows::CtrlClose,
}

impl StopSignals {
    /// Install the handlers. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalInstallError`] naming the signal whose handler the
    /// runtime refused.
    #[cfg(unix)]
    pub fn install() -> Result<Self, SignalInstallError> {
        use signal::unix::SignalKind;

        Ok(Self {
            interrupt: signal::unix::signal(SignalKind::interrupt())
                .map_err(SignalInstallError::new(StopSignal::Interrupt))?,
            terminate: signal::unix::signal(SignalKind::terminate())
                .map_err(SignalInstallError::new(StopSignal::Terminate))?,
        })
    }

    /// Install the handlers. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns a [`SignalInstallError`] naming the signal whose handler the
    /// runtime refused.
    #[cfg(windows)]
    pub fn install() -> Result<Self, SignalInstallError> {
        Ok(Self {
            interrupt: signal::windows::ctrl_c()
                .map_err(SignalInstallError::new(StopSignal::Interrupt))?,
            terminate: signal::windows::ctrl_close()
                .map_err(SignalInstallError::new(StopSignal::Terminate))?,
        })
    }

    /// Wait for the first stop signal.
    pub async fn recv(mut self) -> StopSignal {
        tokio::select! {
            _ = self.interrupt.recv() => StopSignal::Interrupt,
            _ = self.terminate.recv() => StopSignal::Terminate,
        }
    }
}
