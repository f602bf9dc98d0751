//! `UnixSignalSource` — the production `SignalSource`: interrupt/quit
//! trigger shutdown, hangup triggers reload.
//!
//! `tokio::signal::unix` is preferred over raw `nix` signal handling
//! because it integrates directly with the supervisor's `tokio::select!`
//! loop without a dedicated signal-handling thread.

use async_trait::async_trait;
use ripcore_core::application::{SignalSource, SupervisorSignal};
use tokio::signal::unix::{signal, Signal, SignalKind};

pub struct UnixSignalSource {
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
    hangup: Signal,
}

impl UnixSignalSource {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }
}

#[async_trait]
impl SignalSource for UnixSignalSource {
    async fn next(&mut self) -> SupervisorSignal {
        tokio::select! {
            _ = self.interrupt.recv() => SupervisorSignal::Terminate,
            _ = self.terminate.recv() => SupervisorSignal::Terminate,
            _ = self.quit.recv() => SupervisorSignal::Terminate,
            _ = self.hangup.recv() => SupervisorSignal::Reload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn constructs_without_error() {
        assert!(UnixSignalSource::new().is_ok());
    }
}
