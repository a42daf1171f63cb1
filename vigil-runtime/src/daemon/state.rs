use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a [`Daemon`](super::Daemon)
///
/// `Idle → Running → ShuttingDown → Terminated`, with a second termination
/// signal jumping straight from `ShuttingDown` to `Terminated`. There is no
/// way back to `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DaemonState {
    Idle = 0,
    Running = 1,
    ShuttingDown = 2,
    Terminated = 3,
}

impl DaemonState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DaemonState::Idle,
            1 => DaemonState::Running,
            2 => DaemonState::ShuttingDown,
            _ => DaemonState::Terminated,
        }
    }
}

/// Owned atomic lifecycle state; the Idle -> Running swap is the run guard
#[derive(Debug)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(DaemonState::Idle as u8))
    }

    /// Claim the instance. Only the first caller ever gets `true`.
    pub(crate) fn try_start(&self) -> bool {
        self.0
            .compare_exchange(
                DaemonState::Idle as u8,
                DaemonState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn load(&self) -> DaemonState {
        DaemonState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn store(&self, state: DaemonState) {
        self.0.store(state as u8, Ordering::Release);
    }
}
