//! Termination triggers and the sources that deliver them.
//!
//! The daemon never talks to the operating system directly; it reads
//! [`TerminationTrigger`]s from a [`SignalSource`]. [`OsSignals`] is the
//! production source, [`ChannelSignals`] lets a host (or a test) request
//! shutdown in-process.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::error::ConfigError;

/// External notification that asks the daemon to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationTrigger {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM, the polite terminate sent by supervisors
    Terminate,
    Hangup,
    Quit,
    User1,
    User2,
}

/// Triggers used when none are configured
pub const DEFAULT_TRIGGERS: [TerminationTrigger; 2] =
    [TerminationTrigger::Interrupt, TerminationTrigger::Terminate];

impl TerminationTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationTrigger::Interrupt => "interrupt",
            TerminationTrigger::Terminate => "terminate",
            TerminationTrigger::Hangup => "hangup",
            TerminationTrigger::Quit => "quit",
            TerminationTrigger::User1 => "user1",
            TerminationTrigger::User2 => "user2",
        }
    }

    #[cfg(unix)]
    fn kind(&self) -> tokio::signal::unix::SignalKind {
        use tokio::signal::unix::SignalKind;

        match self {
            TerminationTrigger::Interrupt => SignalKind::interrupt(),
            TerminationTrigger::Terminate => SignalKind::terminate(),
            TerminationTrigger::Hangup => SignalKind::hangup(),
            TerminationTrigger::Quit => SignalKind::quit(),
            TerminationTrigger::User1 => SignalKind::user_defined1(),
            TerminationTrigger::User2 => SignalKind::user_defined2(),
        }
    }
}

impl fmt::Display for TerminationTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TerminationTrigger {
    type Err = ConfigError;

    /// Accepts the trigger name, the signal name with or without the `sig` prefix
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        let name = lower.strip_prefix("sig").unwrap_or(&lower);
        match name {
            "interrupt" | "int" => Ok(TerminationTrigger::Interrupt),
            "terminate" | "term" => Ok(TerminationTrigger::Terminate),
            "hangup" | "hup" => Ok(TerminationTrigger::Hangup),
            "quit" => Ok(TerminationTrigger::Quit),
            "user1" | "usr1" => Ok(TerminationTrigger::User1),
            "user2" | "usr2" => Ok(TerminationTrigger::User2),
            _ => Err(ConfigError::UnknownTrigger(s.to_string())),
        }
    }
}

/// Source of termination notifications
///
/// `recv` resolves with the next trigger, or `None` once the source is closed
/// and will never deliver again.
pub trait SignalSource: Send {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<TerminationTrigger>> + Send + '_>>;
}

/// Operating system signals, one stream per configured trigger
#[cfg(unix)]
pub struct OsSignals {
    streams: Vec<(TerminationTrigger, tokio::signal::unix::Signal)>,
}

#[cfg(unix)]
impl OsSignals {
    /// Install handlers for `triggers`. Must be called inside a tokio runtime.
    pub fn new(triggers: &[TerminationTrigger]) -> std::io::Result<Self> {
        let mut streams = Vec::with_capacity(triggers.len());
        for trigger in triggers {
            streams.push((*trigger, tokio::signal::unix::signal(trigger.kind())?));
        }
        Ok(Self { streams })
    }
}

#[cfg(unix)]
impl SignalSource for OsSignals {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<TerminationTrigger>> + Send + '_>> {
        Box::pin(std::future::poll_fn(move |cx| {
            for (trigger, stream) in self.streams.iter_mut() {
                if let std::task::Poll::Ready(Some(())) = stream.poll_recv(cx) {
                    return std::task::Poll::Ready(Some(*trigger));
                }
            }
            std::task::Poll::Pending
        }))
    }
}

/// Operating system signals; only Ctrl-C is observable on this platform
#[cfg(not(unix))]
pub struct OsSignals {
    interrupt: bool,
}

#[cfg(not(unix))]
impl OsSignals {
    pub fn new(triggers: &[TerminationTrigger]) -> std::io::Result<Self> {
        for trigger in triggers {
            if *trigger != TerminationTrigger::Interrupt {
                tracing::warn!(%trigger, "termination trigger not supported on this platform");
            }
        }
        Ok(Self {
            interrupt: triggers.contains(&TerminationTrigger::Interrupt),
        })
    }
}

#[cfg(not(unix))]
impl SignalSource for OsSignals {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<TerminationTrigger>> + Send + '_>> {
        let interrupt = self.interrupt;
        Box::pin(async move {
            if !interrupt {
                return std::future::pending().await;
            }
            match tokio::signal::ctrl_c().await {
                Ok(()) => Some(TerminationTrigger::Interrupt),
                Err(e) => {
                    tracing::error!(error = %e, "failed to listen for ctrl-c");
                    None
                }
            }
        })
    }
}

/// In-process signal source fed by a [`SignalSender`]
pub struct ChannelSignals {
    rx: mpsc::UnboundedReceiver<TerminationTrigger>,
}

impl SignalSource for ChannelSignals {
    fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<TerminationTrigger>> + Send + '_>> {
        Box::pin(self.rx.recv())
    }
}

/// Sending half of [`ChannelSignals`]
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<TerminationTrigger>,
}

impl SignalSender {
    /// Deliver `trigger`. Returns false if the daemon has already gone away.
    pub fn send(&self, trigger: TerminationTrigger) -> bool {
        self.tx.send(trigger).is_ok()
    }
}

/// Create a connected in-process sender and signal source
pub fn signal_channel() -> (SignalSender, ChannelSignals) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, ChannelSignals { rx })
}
