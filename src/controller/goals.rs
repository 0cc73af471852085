use std::collections::HashSet;

use chrono::NaiveDate;
use uuid::Uuid;

use super::{ActionError, Confirm, Failure, resolve_owner};
use crate::core::area::AreaFilter;
use crate::core::goal::{self, Goal, GoalDraft};
use crate::sync::gemini::Assist;
use crate::sync::store::{RemoteStore, StoreError};

/// A goal change sent to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalOp {
    SetCompleted { id: Uuid, completed: bool },
    Delete { id: Uuid },
}

impl GoalOp {
    fn id(&self) -> Uuid {
        match self {
            Self::SetCompleted { id, .. } | Self::Delete { id } => *id,
        }
    }
}

#[derive(Debug)]
enum Rollback {
    Completed { id: Uuid, previous: bool },
    Restore { index: usize, goal: Goal },
}

/// An optimistic goal change awaiting the store's answer.
#[derive(Debug)]
#[must_use]
pub struct GoalTicket {
    generation: u64,
    op: GoalOp,
    rollback: Rollback,
}

impl GoalTicket {
    pub fn op(&self) -> &GoalOp {
        &self.op
    }
}

/// Goals view: all of the owner's goals, newest first.
#[derive(Debug, Default)]
pub struct GoalsController {
    goals: Vec<Goal>,
    filter: AreaFilter,
    pending: HashSet<Uuid>,
    failure: Option<Failure<GoalOp>>,
    generation: u64,
}

impl GoalsController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn get(&self, id: Uuid) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn filter(&self) -> AreaFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: AreaFilter) {
        self.filter = filter;
    }

    /// Pending goals under the current filter, overdue first.
    pub fn pending(&self, today: NaiveDate) -> Vec<&Goal> {
        goal::pending_goals(&self.goals, self.filter, today)
    }

    pub fn overdue_count(&self, today: NaiveDate) -> usize {
        goal::overdue_count(&self.pending(today), today)
    }

    pub fn completed(&self) -> Vec<&Goal> {
        goal::completed_goals(&self.goals)
    }

    /// A change to this goal is in flight.
    pub fn is_pending(&self, id: Uuid) -> bool {
        self.pending.contains(&id)
    }

    pub fn failure(&self) -> Option<&Failure<GoalOp>> {
        self.failure.as_ref()
    }

    pub fn clear(&mut self) {
        self.goals.clear();
        self.pending.clear();
        self.failure = None;
        self.generation += 1;
    }

    pub async fn refresh<S: RemoteStore>(&mut self, store: &S, owner: Uuid) -> Result<(), ActionError> {
        let goals = store.list_goals(owner).await?;
        log::info!("Loaded {} goals", goals.len());
        self.goals = goals;
        self.pending.clear();
        Ok(())
    }

    /// Create a goal and prepend the stored row. Blank titles are ignored.
    pub async fn create<S: RemoteStore>(&mut self, store: &S, draft: GoalDraft) -> Result<Goal, ActionError> {
        if draft.is_blank() {
            return Err(ActionError::Invalid("title is required"));
        }
        let owner = resolve_owner(store).await?;
        let generation = self.generation;

        let created = store.insert_goal(&draft.into_new_goal(owner)).await.map_err(|e| {
            log::error!("Failed to create goal: {}", e);
            e
        })?;

        if generation == self.generation {
            self.goals.insert(0, created.clone());
        }
        log::info!("Created goal: {}", created.title);
        Ok(created)
    }

    /// Quick add: area Home, no deadline.
    pub async fn quick_add<S: RemoteStore>(&mut self, store: &S, title: &str) -> Result<Goal, ActionError> {
        self.create(store, GoalDraft::quick(title)).await
    }

    /// Create a goal from the assist's reading of `text`. `Ok(None)` when the
    /// assist had nothing to offer.
    pub async fn create_from_text<S: RemoteStore, A: Assist>(
        &mut self,
        store: &S,
        assist: &A,
        text: &str,
    ) -> Result<Option<Goal>, ActionError> {
        let Some(suggestion) = assist.suggest_goal(text).await else {
            log::info!("No goal suggestion for input");
            return Ok(None);
        };
        let draft = GoalDraft {
            title: suggestion.title,
            description: suggestion.description,
            area: suggestion.area,
            deadline: None,
        };
        self.create(store, draft).await.map(Some)
    }

    fn begin_set_completed(&mut self, id: Uuid, completed: bool) -> Result<GoalTicket, ActionError> {
        let goal = self.goals.iter_mut().find(|g| g.id == id).ok_or(ActionError::NotFound)?;
        let previous = goal.completed;
        goal.completed = completed;
        self.pending.insert(id);
        Ok(GoalTicket {
            generation: self.generation,
            op: GoalOp::SetCompleted { id, completed },
            rollback: Rollback::Completed { id, previous },
        })
    }

    /// Flip completion locally; send the ticket's op, then [`settle`](Self::settle).
    pub fn begin_toggle(&mut self, id: Uuid) -> Result<GoalTicket, ActionError> {
        let completed = !self.get(id).ok_or(ActionError::NotFound)?.completed;
        self.begin_set_completed(id, completed)
    }

    /// Remove locally; the goal is restored in place if the store refuses.
    pub fn begin_delete(&mut self, id: Uuid) -> Result<GoalTicket, ActionError> {
        let index = self.goals.iter().position(|g| g.id == id).ok_or(ActionError::NotFound)?;
        let goal = self.goals.remove(index);
        self.pending.insert(id);
        Ok(GoalTicket {
            generation: self.generation,
            op: GoalOp::Delete { id },
            rollback: Rollback::Restore { index, goal },
        })
    }

    /// Commit or roll back a change. Tickets from before the last `clear` are dropped.
    pub fn settle(&mut self, ticket: GoalTicket, result: Result<(), StoreError>) -> Result<(), ActionError> {
        if ticket.generation != self.generation {
            log::debug!("Dropping stale goal result for {:?}", ticket.op);
            return Ok(());
        }
        self.pending.remove(&ticket.op.id());

        let err = match result {
            Ok(()) => {
                if self.failure.as_ref().is_some_and(|f| f.op.id() == ticket.op.id()) {
                    self.failure = None;
                }
                return Ok(());
            }
            Err(e) => e,
        };

        log::error!("Goal change {:?} failed: {}", ticket.op, err);
        match ticket.rollback {
            Rollback::Completed { id, previous } => {
                if let Some(goal) = self.goals.iter_mut().find(|g| g.id == id) {
                    goal.completed = previous;
                }
            }
            Rollback::Restore { index, goal } => {
                let index = index.min(self.goals.len());
                self.goals.insert(index, goal);
            }
        }
        self.failure = Some(Failure::new(ticket.op, err.to_string()));
        Err(ActionError::Remote(err))
    }

    async fn send<S: RemoteStore>(store: &S, op: &GoalOp) -> Result<(), StoreError> {
        match *op {
            GoalOp::SetCompleted { id, completed } => store.set_goal_completed(id, completed).await,
            GoalOp::Delete { id } => store.delete_goal(id).await,
        }
    }

    pub async fn toggle_completion<S: RemoteStore>(&mut self, store: &S, id: Uuid) -> Result<(), ActionError> {
        let ticket = self.begin_toggle(id)?;
        let result = Self::send(store, &ticket.op).await;
        self.settle(ticket, result)
    }

    /// Permanently delete a goal after confirmation.
    pub async fn delete<S: RemoteStore, C: Confirm>(
        &mut self,
        store: &S,
        id: Uuid,
        confirm: &mut C,
    ) -> Result<(), ActionError> {
        let title = &self.get(id).ok_or(ActionError::NotFound)?.title;
        if !confirm.confirm(&format!("Delete \"{}\" permanently?", title)) {
            return Err(ActionError::Declined);
        }
        let ticket = self.begin_delete(id)?;
        let result = Self::send(store, &ticket.op).await;
        self.settle(ticket, result)
    }

    /// Re-send the last failed change.
    pub async fn retry<S: RemoteStore>(&mut self, store: &S) -> Result<(), ActionError> {
        let Some(failure) = self.failure.take() else {
            return Err(ActionError::Invalid("nothing to retry"));
        };
        log::info!("Retrying {:?}", failure.op);
        let ticket = match failure.op {
            GoalOp::SetCompleted { id, completed } => self.begin_set_completed(id, completed)?,
            GoalOp::Delete { id } => self.begin_delete(id)?,
        };
        let result = Self::send(store, &ticket.op).await;
        self.settle(ticket, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::area::LifeArea;
    use crate::core::goal::tests::goal;
    use crate::sync::gemini::{GoalSuggestion, SlotSuggestion};
    use crate::sync::{Identity, MemoryStore};
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn me() -> Identity {
        Identity {
            id: Uuid::from_u128(7),
            email: None,
        }
    }

    async fn loaded(store: &MemoryStore) -> GoalsController {
        let mut goals = GoalsController::new();
        goals.refresh(store, me().id).await.unwrap();
        goals
    }

    struct FixedAssist(Option<GoalSuggestion>);

    impl Assist for FixedAssist {
        async fn suggest_goal(&self, _text: &str) -> Option<GoalSuggestion> {
            self.0.clone()
        }

        async fn suggest_schedule(&self, _text: &str) -> Option<Vec<SlotSuggestion>> {
            None
        }
    }

    #[tokio::test]
    async fn blank_title_is_a_no_op() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        assert!(matches!(
            goals.quick_add(&store, "   ").await,
            Err(ActionError::Invalid(_))
        ));
        assert_eq!(store.calls().await, 0);
    }

    #[tokio::test]
    async fn create_without_identity_aborts() {
        let store = MemoryStore::new();
        let mut goals = GoalsController::new();
        assert!(matches!(
            goals.create(&store, GoalDraft::new("Budget")).await,
            Err(ActionError::SignedOut)
        ));
        assert!(store.goals().await.is_empty());
    }

    #[tokio::test]
    async fn created_goals_are_prepended() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        goals.quick_add(&store, "First").await.unwrap();
        let mut draft = GoalDraft::new("Second");
        draft.deadline = Some(today());
        goals.create(&store, draft).await.unwrap();

        assert_eq!(goals.goals()[0].title, "Second");
        assert_eq!(goals.goals()[0].area, LifeArea::Work);
        assert_eq!(goals.goals()[1].area, LifeArea::Home);
        assert_eq!(goals.goals()[1].owner_id, me().id);
    }

    #[tokio::test]
    async fn pending_order_and_overdue_count() {
        let store = MemoryStore::signed_in(me());
        let t = today();
        for (title, deadline) in [
            ("C", None),
            ("B", Some(t + Duration::days(1))),
            ("A", Some(t - Duration::days(1))),
        ] {
            let mut g = goal(title, deadline, false);
            g.owner_id = me().id;
            store.seed_goal(g).await;
        }
        let goals = loaded(&store).await;
        let order: Vec<&str> = goals.pending(t).iter().map(|g| g.title.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(goals.overdue_count(t), 1);
    }

    #[tokio::test]
    async fn toggle_twice_restores_state() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        let id = goals.quick_add(&store, "Pay rent").await.unwrap().id;

        goals.toggle_completion(&store, id).await.unwrap();
        assert!(goals.get(id).unwrap().completed);
        assert!(store.goals().await[0].completed);

        goals.toggle_completion(&store, id).await.unwrap();
        assert!(!goals.get(id).unwrap().completed);
        assert!(!store.goals().await[0].completed);
        assert!(!goals.is_pending(id));
    }

    #[tokio::test]
    async fn ticket_marks_goal_pending_until_settled() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        let id = goals.quick_add(&store, "Pay rent").await.unwrap().id;

        let ticket = goals.begin_toggle(id).unwrap();
        assert!(goals.get(id).unwrap().completed);
        assert!(goals.is_pending(id));
        goals.settle(ticket, Ok(())).unwrap();
        assert!(!goals.is_pending(id));
    }

    #[tokio::test]
    async fn failed_toggle_rolls_back_and_retries() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        let id = goals.quick_add(&store, "Pay rent").await.unwrap().id;

        store.fail_writes(true).await;
        assert!(matches!(
            goals.toggle_completion(&store, id).await,
            Err(ActionError::Remote(_))
        ));
        assert!(!goals.get(id).unwrap().completed);
        assert_eq!(
            goals.failure().map(|f| &f.op),
            Some(&GoalOp::SetCompleted { id, completed: true })
        );

        store.fail_writes(false).await;
        goals.retry(&store).await.unwrap();
        assert!(goals.get(id).unwrap().completed);
        assert!(goals.failure().is_none());
        assert!(store.goals().await[0].completed);
    }

    #[tokio::test]
    async fn declined_delete_keeps_goal() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        let id = goals.quick_add(&store, "Keep me").await.unwrap().id;
        let calls = store.calls().await;

        let result = goals.delete(&store, id, &mut |_: &str| false).await;
        assert!(matches!(result, Err(ActionError::Declined)));
        assert!(goals.get(id).is_some());
        assert_eq!(store.calls().await, calls);
    }

    #[tokio::test]
    async fn failed_delete_restores_position() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        goals.quick_add(&store, "one").await.unwrap();
        let id = goals.quick_add(&store, "two").await.unwrap().id;
        goals.quick_add(&store, "three").await.unwrap();

        store.fail_writes(true).await;
        assert!(goals.delete(&store, id, &mut |_: &str| true).await.is_err());
        let titles: Vec<&str> = goals.goals().iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["three", "two", "one"]);

        store.fail_writes(false).await;
        goals.delete(&store, id, &mut |_: &str| true).await.unwrap();
        assert!(goals.get(id).is_none());
        assert_eq!(store.goals().await.len(), 2);
    }

    #[tokio::test]
    async fn suggestion_creates_goal() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        let assist = FixedAssist(Some(GoalSuggestion {
            title: "Book a dinner".into(),
            description: Some("Friday".into()),
            area: LifeArea::Marriage,
        }));
        let created = goals.create_from_text(&store, &assist, "dinner friday").await.unwrap();
        assert_eq!(created.map(|g| g.area), Some(LifeArea::Marriage));

        let created = goals.create_from_text(&store, &FixedAssist(None), "???").await.unwrap();
        assert!(created.is_none());
        assert_eq!(goals.goals().len(), 1);
    }

    #[tokio::test]
    async fn completed_goals_leave_pending_list() {
        let store = MemoryStore::signed_in(me());
        let mut goals = GoalsController::new();
        let id = goals.quick_add(&store, "Done soon").await.unwrap().id;
        goals.toggle_completion(&store, id).await.unwrap();
        assert!(goals.pending(today()).is_empty());
        assert_eq!(goals.completed().len(), 1);
    }
}
