// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling for the orchestrator, adapted from the platform split
//! nextest uses for its own Ctrl-C handling.

use crate::errors::OrchestratorError;

/// A received interruption request, platform-agnostic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShutdownEvent {
    Interrupt,
    Terminate,
}

#[derive(Debug)]
pub struct SignalHandler {
    signals: imp::Signals,
}

impl SignalHandler {
    pub fn new() -> Result<Self, OrchestratorError> {
        Ok(Self {
            signals: imp::Signals::new().map_err(OrchestratorError::SignalSetup)?,
        })
    }

    pub async fn recv(&mut self) -> Option<ShutdownEvent> {
        self.signals.recv().await
    }
}

#[cfg(unix)]
mod imp {
    use super::ShutdownEvent;
    use std::io;
    use tokio::signal::unix::{SignalKind, signal};
    use tokio_stream::{StreamExt, StreamMap, wrappers::SignalStream};

    #[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
    enum SignalId {
        Int,
        Term,
        Hup,
    }

    #[derive(Debug)]
    pub(super) struct Signals {
        map: StreamMap<SignalId, SignalStream>,
    }

    impl Signals {
        pub(super) fn new() -> io::Result<Self> {
            let mut map = StreamMap::new();
            map.insert(SignalId::Int, SignalStream::new(signal(SignalKind::interrupt())?));
            map.insert(SignalId::Term, SignalStream::new(signal(SignalKind::terminate())?));
            map.insert(SignalId::Hup, SignalStream::new(signal(SignalKind::hangup())?));
            Ok(Self { map })
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            self.map.next().await.map(|(id, ())| match id {
                SignalId::Int | SignalId::Hup => ShutdownEvent::Interrupt,
                SignalId::Term => ShutdownEvent::Terminate,
            })
        }
    }
}

#[cfg(windows)]
mod imp {
    use super::ShutdownEvent;
    use std::io;

    #[derive(Debug)]
    pub(super) struct Signals;

    impl Signals {
        pub(super) fn new() -> io::Result<Self> {
            Ok(Self)
        }

        pub(super) async fn recv(&mut self) -> Option<ShutdownEvent> {
            tokio::signal::ctrl_c().await.ok()?;
            Some(ShutdownEvent::Interrupt)
        }
    }
}
