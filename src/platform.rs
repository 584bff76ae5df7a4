use anyhow::Result;
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::process;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread;

#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Last signal that requested shutdown, 0 if none
static RECEIVED_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Exit code matching the signal that stopped processing, if any
pub fn signal_exit_code() -> Option<ExitCode> {
    match RECEIVED_SIGNAL.load(Ordering::Relaxed) {
        0 => None,
        #[cfg(unix)]
        SIGTERM => Some(ExitCode::SignalTerm),
        _ => Some(ExitCode::SignalInt),
    }
}

/// Cancellation token observed by every blocking queue operation.
///
/// Cancellation is a closed channel: once the matching
/// [`ShutdownTrigger`] is dropped every `select!` waiting on
/// [`Shutdown::receiver`] wakes up.
#[derive(Debug, Clone)]
pub struct Shutdown {
    signal: Receiver<()>,
}

/// Owner side of a [`Shutdown`]. Triggering (or dropping) it cancels.
#[derive(Debug)]
pub struct ShutdownTrigger {
    _sender: Sender<()>,
}

/// Create a linked trigger/token pair
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, signal) = crossbeam_channel::bounded(0);
    (ShutdownTrigger { _sender: sender }, Shutdown { signal })
}

impl ShutdownTrigger {
    pub fn trigger(self) {
        drop(self);
    }
}

impl Shutdown {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self {
            signal: crossbeam_channel::never(),
        }
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn receiver(&self) -> &Receiver<()> {
        &self.signal
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::never()
    }
}

/// Signal handler for graceful shutdown
pub struct SignalHandler {
    _handle: Option<thread::JoinHandle<()>>,
    #[cfg(not(unix))]
    _trigger: ShutdownTrigger,
}

impl SignalHandler {
    /// The first SIGINT/SIGTERM cancels the pipeline through `trigger`,
    /// a second one exits immediately.
    #[cfg(unix)]
    pub fn new(trigger: ShutdownTrigger) -> Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM])?;

        let handle = thread::spawn(move || {
            let mut trigger = Some(trigger);
            for sig in signals.forever() {
                RECEIVED_SIGNAL.store(sig, Ordering::Relaxed);
                match trigger.take() {
                    Some(trigger) => {
                        tracing::warn!(signal = sig, "shutdown requested, stopping pipeline");
                        trigger.trigger();
                    }
                    None => match sig {
                        SIGTERM => ExitCode::SignalTerm.exit(),
                        _ => ExitCode::SignalInt.exit(),
                    },
                }
            }
        });

        Ok(Self {
            _handle: Some(handle),
        })
    }

    /// Signals are not wired up on this platform; the trigger is kept
    /// alive so the pipeline is never cancelled spuriously.
    #[cfg(not(unix))]
    pub fn new(trigger: ShutdownTrigger) -> Result<Self> {
        Ok(Self {
            _handle: None,
            _trigger: trigger,
        })
    }
}
