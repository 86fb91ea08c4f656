//! NGAP State Machine
//!
//! Per-RAN-node NG interface state. A node becomes operational once the AMF
//! has answered its NG Setup with a response; UE-associated signalling is
//! only accepted from operational nodes.

/// NGAP FSM states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NgapState {
    /// Association up, no successful NG Setup yet
    #[default]
    Initial,
    /// NG Setup completed
    Operational,
    /// Node removed
    Final,
}

impl NgapState {
    /// Get the name of the state
    pub fn name(&self) -> &'static str {
        match self {
            NgapState::Initial => "NGAP_STATE_INITIAL",
            NgapState::Operational => "NGAP_STATE_OPERATIONAL",
            NgapState::Final => "NGAP_STATE_FINAL",
        }
    }
}

/// Events driving the NGAP FSM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgapEvent {
    /// NG Setup Response sent
    SetupAccepted,
    /// NG Setup Failure sent
    SetupRejected,
    /// Association closed or node removed
    Removed,
}

/// Result of dispatching an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NgapFsmResult {
    Transition(NgapState),
    Handled,
    Ignored,
}

/// NGAP State Machine for a RAN node
#[derive(Debug, Clone, Default)]
pub struct NgapFsm {
    state: NgapState,
}

impl NgapFsm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> NgapState {
        self.state
    }

    pub fn is_operational(&self) -> bool {
        self.state == NgapState::Operational
    }

    /// Dispatch an event to the FSM
    pub fn dispatch(&mut self, event: NgapEvent) -> NgapFsmResult {
        let result = match (self.state, event) {
            (NgapState::Final, _) => NgapFsmResult::Ignored,
            (_, NgapEvent::Removed) => NgapFsmResult::Transition(NgapState::Final),
            (NgapState::Initial, NgapEvent::SetupAccepted) => {
                NgapFsmResult::Transition(NgapState::Operational)
            }
            (NgapState::Operational, NgapEvent::SetupAccepted) => NgapFsmResult::Handled,
            (NgapState::Operational, NgapEvent::SetupRejected) => {
                NgapFsmResult::Transition(NgapState::Initial)
            }
            (NgapState::Initial, NgapEvent::SetupRejected) => NgapFsmResult::Handled,
        };

        if let NgapFsmResult::Transition(new_state) = result {
            log::debug!(
                "NGAP state transition: {} -> {}",
                self.state.name(),
                new_state.name()
            );
            self.state = new_state;
        }

        result
    }
}
