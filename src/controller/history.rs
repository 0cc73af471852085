use super::GoalsController;
use crate::core::goal::Goal;

/// Completed goals, in list order. Deleting one goes through
/// [`GoalsController::delete`].
pub struct History<'a> {
    goals: &'a GoalsController,
}

impl<'a> History<'a> {
    pub fn new(goals: &'a GoalsController) -> Self {
        Self { goals }
    }

    pub fn completed(&self) -> Vec<&'a Goal> {
        self.goals.completed()
    }

    pub fn count(&self) -> usize {
        self.goals.goals().iter().filter(|g| g.completed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::goal::GoalDraft;
    use crate::sync::{Identity, MemoryStore};
    use uuid::Uuid;

    #[tokio::test]
    async fn shows_only_completed_in_list_order() {
        let me = Identity {
            id: Uuid::from_u128(31),
            email: None,
        };
        let store = MemoryStore::signed_in(me);
        let mut goals = GoalsController::new();
        let first = goals.create(&store, GoalDraft::new("Budget")).await.unwrap();
        goals.create(&store, GoalDraft::new("Call mom")).await.unwrap();
        let third = goals.create(&store, GoalDraft::new("Fix the gate")).await.unwrap();
        assert!(History::new(&goals).is_empty());

        goals.toggle_completion(&store, first.id).await.unwrap();
        goals.toggle_completion(&store, third.id).await.unwrap();
        let history = History::new(&goals);
        let titles: Vec<&str> = history.completed().iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["Fix the gate", "Budget"]);
        assert_eq!(history.count(), 2);

        goals.delete(&store, third.id, &mut |_: &str| true).await.unwrap();
        assert_eq!(History::new(&goals).count(), 1);
    }
}
