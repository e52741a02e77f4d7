//! Phased actions.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::{Action, Phases};
use crate::context::Context;
use crate::error::Result;

type ActionFn = dyn Fn(Context) -> Result<Context> + Send + Sync;

/// Action backed by a closure, running at a fixed set of phases.
#[derive(Clone)]
pub struct FnAction {
    phases: Phases,
    action: Arc<ActionFn>,
}

impl FnAction {
    pub fn new<F>(phases: Phases, action: F) -> Self
    where
        F: Fn(Context) -> Result<Context> + Send + Sync + 'static,
    {
        FnAction {
            phases,
            action: Arc::new(action),
        }
    }
}

impl fmt::Debug for FnAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAction")
            .field("phases", &self.phases)
            .finish_non_exhaustive()
    }
}

impl Action for FnAction {
    fn execute(&self, context: Context) -> Result<Context> {
        (self.action)(context)
    }

    fn applies_at(&self, phase: Phases) -> bool {
        self.phases.contains(phase)
    }
}

/// Runs every action that applies at `phase`, in order, threading the
/// context through them. Nothing runs during a constructor pre-read.
pub fn run_actions(
    actions: &[Arc<dyn Action>],
    phase: Phases,
    context: Context,
) -> Result<Context> {
    if context.is_pre_read() {
        return Ok(context);
    }
    actions
        .iter()
        .filter(|action| action.applies_at(phase))
        .try_fold(context, |context, action| {
            trace!(?phase, ?action, "running action");
            action.execute(context)
        })
}
