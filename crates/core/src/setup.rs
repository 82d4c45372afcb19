//! First-run setup flow as a pure state machine.
//!
//! The flow shows the language picker, waits for its dismiss animation,
//! then shows the notification opt-in. The shell owns timers and side
//! effects; this module only decides what happens next.

use serde::Serialize;

/// Where the first-run flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SetupState {
    Idle,
    LanguageModalShown,
    /// Language chosen, waiting for the dismiss animation before the next step.
    LanguageDismissing,
    NotificationModalShown,
    Done,
}

impl SetupState {
    pub fn is_done(&self) -> bool {
        matches!(self, SetupState::Done)
    }
}

/// Inputs to the setup flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupEvent {
    /// Attempt to enter the flow.
    Begin {
        has_asked_permission: bool,
        schedule_loaded: bool,
    },
    LanguageChosen,
    /// The dismiss delay armed by [`SetupAction::ArmTransition`] elapsed.
    TransitionElapsed,
    NotificationSkipped,
    NotificationCompleted,
}

/// Side effects the shell must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupAction {
    ShowLanguageModal,
    /// Arm the dismiss timer, cancelling any pending one.
    ArmTransition,
    ShowNotificationModal,
    /// Persist `has_asked_permission = true`.
    PersistAsked,
}

/// Outcome of feeding one event into the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: SetupState,
    pub action: Option<SetupAction>,
}

impl Transition {
    fn to(state: SetupState, action: SetupAction) -> Self {
        Self {
            state,
            action: Some(action),
        }
    }

    fn stay(state: SetupState) -> Self {
        Self {
            state,
            action: None,
        }
    }
}

/// Computes the next state. Events that do not apply are ignored.
pub fn transition(state: SetupState, event: SetupEvent) -> Transition {
    use SetupEvent as E;
    use SetupState as S;

    match (state, event) {
        (
            S::Idle,
            E::Begin {
                has_asked_permission: true,
                ..
            },
        ) => Transition::stay(S::Done),
        (
            S::Idle,
            E::Begin {
                schedule_loaded: true,
                ..
            },
        ) => Transition::to(S::LanguageModalShown, SetupAction::ShowLanguageModal),
        (S::LanguageModalShown | S::LanguageDismissing, E::LanguageChosen) => {
            Transition::to(S::LanguageDismissing, SetupAction::ArmTransition)
        }
        (S::LanguageDismissing, E::TransitionElapsed) => {
            Transition::to(S::NotificationModalShown, SetupAction::ShowNotificationModal)
        }
        (S::NotificationModalShown, E::NotificationSkipped | E::NotificationCompleted) => {
            Transition::to(S::Done, SetupAction::PersistAsked)
        }
        (state, _) => Transition::stay(state),
    }
}
