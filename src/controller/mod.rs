//! View-state controllers.
//!
//! Each controller mirrors the rows one view needs and reconciles local changes
//! with the remote store. Mutations are optimistic: a `begin_*` call applies the
//! change locally and returns a ticket, `settle` commits or rolls the change back
//! once the store answers. A failed change is remembered so it can be retried.

pub mod goals;
pub mod history;
pub mod planning;
pub mod routine;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::sync::store::{Identity, RemoteStore, StoreError};

pub use goals::GoalsController;
pub use history::History;
pub use planning::{PlanningController, PlanningMode};
pub use routine::RoutineController;

#[derive(Debug, Error)]
pub enum ActionError {
    /// A required field was blank; nothing was done.
    #[error("{0}")]
    Invalid(&'static str),
    #[error("not signed in")]
    SignedOut,
    #[error("cancelled")]
    Declined,
    #[error("no such item")]
    NotFound,
    #[error(transparent)]
    Remote(#[from] StoreError),
}

/// Interactive yes/no confirmation supplied by the shell.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

static FAILURE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A remote change that failed and was rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure<Op> {
    pub op: Op,
    pub message: String,
    /// Increases with every recorded failure, across all controllers.
    pub seq: u64,
}

impl<Op> Failure<Op> {
    pub(crate) fn new(op: Op, message: String) -> Self {
        Self {
            op,
            message,
            seq: FAILURE_SEQ.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }
}

/// Which controller holds a failed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Goals,
    Planning,
    Routine,
}

/// Resolve the signed-in owner, or abort with [`ActionError::SignedOut`].
pub(crate) async fn resolve_owner<S: RemoteStore>(store: &S) -> Result<Uuid, ActionError> {
    match store.current_user().await? {
        Some(identity) => Ok(identity.id),
        None => {
            log::debug!("No identity, aborting");
            Err(ActionError::SignedOut)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Goals,
    Planning,
    Routine,
    History,
}

impl View {
    pub const ALL: [View; 4] = [Self::Goals, Self::Planning, Self::Routine, Self::History];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Goals => "Goals",
            Self::Planning => "Planning",
            Self::Routine => "Routine",
            Self::History => "History",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "goals" | "tasks" => Some(Self::Goals),
            "planning" | "plans" => Some(Self::Planning),
            "routine" => Some(Self::Routine),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

/// Everything the shell renders from: session identity, active view and the
/// per-view controllers. Built on session start, cleared on sign-out.
pub struct AppState {
    identity: Option<Identity>,
    view: View,
    pub goals: GoalsController,
    pub planning: PlanningController,
    pub routine: RoutineController,
}

impl AppState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            identity: None,
            view: View::default(),
            goals: GoalsController::new(),
            planning: PlanningController::new(today),
            routine: RoutineController::new(),
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn history(&self) -> History<'_> {
        History::new(&self.goals)
    }

    /// Follow a session transition: reload every view for a present identity,
    /// drop all local state when it goes away.
    pub async fn on_identity_change<S: RemoteStore>(
        &mut self,
        store: &S,
        identity: Option<Identity>,
        today: NaiveDate,
    ) {
        let Some(identity) = identity else {
            if self.identity.take().is_some() {
                log::info!("Session ended, clearing local state");
            }
            self.clear(today);
            return;
        };

        if self.identity.as_ref().is_some_and(|current| current.id != identity.id) {
            self.clear(today);
        }
        let owner = identity.id;
        self.identity = Some(identity);

        let (goals, plans, routine) = futures::join!(
            self.goals.refresh(store, owner),
            self.planning.refresh(store, owner),
            self.routine.fetch_or_create_today(store, owner, today),
        );
        for (view, result) in [("goals", goals), ("plans", plans), ("routine", routine)] {
            if let Err(e) = result {
                log::error!("Failed to load {}: {}", view, e);
            }
        }
    }

    /// Reload today's routine when the date has rolled over since it was fetched.
    pub async fn roll_day<S: RemoteStore>(&mut self, store: &S, today: NaiveDate) {
        let Some(owner) = self.identity.as_ref().map(|i| i.id) else {
            return;
        };
        if self.routine.is_stale(today) {
            if let Err(e) = self.routine.fetch_or_create_today(store, owner, today).await {
                log::error!("Failed to load routine: {}", e);
            }
        }
    }

    /// The controller whose change failed most recently, with that failure's `seq`.
    pub fn last_failure(&self) -> Option<(Section, u64)> {
        [
            self.goals.failure().map(|f| (Section::Goals, f.seq)),
            self.planning.failure().map(|f| (Section::Planning, f.seq)),
            self.routine.failure().map(|f| (Section::Routine, f.seq)),
        ]
        .into_iter()
        .flatten()
        .max_by_key(|(_, seq)| *seq)
    }

    /// Re-send the most recently failed change.
    pub async fn retry<S: RemoteStore>(&mut self, store: &S) -> Result<(), ActionError> {
        match self.last_failure() {
            Some((Section::Goals, _)) => self.goals.retry(store).await,
            Some((Section::Planning, _)) => self.planning.retry(store).await,
            Some((Section::Routine, _)) => self.routine.retry(store).await,
            None => Err(ActionError::Invalid("nothing to retry")),
        }
    }

    fn clear(&mut self, today: NaiveDate) {
        self.goals.clear();
        self.planning.clear(today);
        self.routine.clear();
    }
}
