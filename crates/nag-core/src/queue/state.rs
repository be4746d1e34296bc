use nag_model::{LoopEnd, QueueStatus};

/// Run-loop state. `Draining` is a live loop asked to suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopState {
    Idle,
    Running,
    Draining,
    Suspended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Start,
    RequestSuspend,
    Resume,
    Stop(LoopEnd),
}

impl LoopState {
    pub(crate) fn apply(self, t: Transition) -> LoopState {
        use LoopState::*;

        match (self, t) {
            (Idle | Suspended, Transition::Start) => Running,
            (Running | Draining, Transition::Start) => self,

            (Running | Draining, Transition::RequestSuspend) => Draining,
            (Idle | Suspended, Transition::RequestSuspend) => Suspended,

            (Suspended, Transition::Resume) => Idle,
            (Draining, Transition::Resume) => Running,
            (Idle | Running, Transition::Resume) => self,

            (_, Transition::Stop(LoopEnd::NoMoreItems)) => Idle,
            (_, Transition::Stop(LoopEnd::Suspend | LoopEnd::RunOnceFinished)) => Suspended,
        }
    }

    pub(crate) fn is_alive(self) -> bool {
        matches!(self, LoopState::Running | LoopState::Draining)
    }

    pub(crate) fn status(self) -> QueueStatus {
        match self {
            LoopState::Idle => QueueStatus::Idle,
            LoopState::Running | LoopState::Draining => QueueStatus::Running,
            LoopState::Suspended => QueueStatus::Suspended,
        }
    }
}
