//! Per-target lifecycle state machine.
use std::fmt;

use thiserror::Error;

use crate::logging::Log;

/// Where a target is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Not started.
    Pending,
    /// Evaluating the check.
    Checking,
    /// The check passed before installation.
    AlreadySatisfied,
    /// Running install steps.
    Installing,
    /// Applying configure actions.
    Configuring,
    /// Finished successfully.
    Done,
    /// Finished with a failure.
    Failed,
    /// Not applicable on this platform.
    Skipped,
}

impl State {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Checking => "checking",
            Self::AlreadySatisfied => "already satisfied",
            Self::Installing => "installing",
            Self::Configuring => "configuring",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Skipped)
    }

    const fn allows(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Checking | Self::Failed | Self::Skipped)
                | (
                    Self::Checking,
                    Self::AlreadySatisfied | Self::Installing | Self::Failed
                )
                | (Self::AlreadySatisfied, Self::Configuring)
                | (Self::Installing | Self::Configuring, Self::Failed)
                | (Self::Installing, Self::Configuring)
                | (Self::Configuring, Self::Done)
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition the lifecycle does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid lifecycle transition {from} -> {to}")]
pub struct InvalidTransition {
    /// Current state.
    pub from: State,
    /// Requested state.
    pub to: State,
}

/// Tracks one target's state and logs each transition at debug level.
#[derive(Debug)]
pub struct Lifecycle<'a> {
    target: &'a str,
    state: State,
}

impl<'a> Lifecycle<'a> {
    /// Start `target` in [`State::Pending`].
    #[must_use]
    pub const fn new(target: &'a str) -> Self {
        Self {
            target,
            state: State::Pending,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when `next` is not reachable from the
    /// current state; the state is left unchanged.
    pub fn advance(&mut self, next: State, log: &dyn Log) -> Result<(), InvalidTransition> {
        if !self.state.allows(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        log.debug(&format!("{}: {} -> {}", self.target, self.state, next));
        self.state = next;
        Ok(())
    }
}
