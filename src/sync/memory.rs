use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{Identity, RemoteStore, StoreError};
use crate::core::goal::{Goal, NewGoal};
use crate::core::plan::{NewPlan, Plan, ScheduleItem};
use crate::core::routine::{Activities, NewRoutineEntry, RoutineEntry};

#[derive(Default)]
struct State {
    user: Option<Identity>,
    goals: Vec<Goal>,
    plans: Vec<Plan>,
    routine: Vec<RoutineEntry>,
    fail_writes: bool,
    calls: usize,
}

/// In-process store with the same row semantics as the hosted one.
///
/// Writes can be made to fail on demand, and every call is counted.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn write_refused() -> StoreError {
    StoreError::Api {
        status: 503,
        code: None,
        message: "write refused".to_string(),
    }
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::Api {
        status: 404,
        code: None,
        message: format!("row {} not found", id),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signed_in(user: Identity) -> Self {
        Self {
            state: Mutex::new(State {
                user: Some(user),
                ..State::default()
            }),
        }
    }

    pub async fn set_user(&self, user: Option<Identity>) {
        self.state.lock().await.user = user;
    }

    /// While set, every insert/update/delete fails.
    pub async fn fail_writes(&self, fail: bool) {
        self.state.lock().await.fail_writes = fail;
    }

    /// Number of store calls made so far.
    pub async fn calls(&self) -> usize {
        self.state.lock().await.calls
    }

    pub async fn goals(&self) -> Vec<Goal> {
        self.state.lock().await.goals.clone()
    }

    pub async fn plans(&self) -> Vec<Plan> {
        self.state.lock().await.plans.clone()
    }

    pub async fn routine_entries(&self) -> Vec<RoutineEntry> {
        self.state.lock().await.routine.clone()
    }

    pub async fn seed_goal(&self, goal: Goal) {
        self.state.lock().await.goals.push(goal);
    }

    pub async fn seed_routine(&self, entry: RoutineEntry) {
        self.state.lock().await.routine.push(entry);
    }

    /// Count a call and, for writes, honour the failure switch.
    async fn begin(&self, write: bool) -> Result<tokio::sync::MutexGuard<'_, State>, StoreError> {
        let mut state = self.state.lock().await;
        state.calls += 1;
        if write && state.fail_writes {
            return Err(write_refused());
        }
        Ok(state)
    }
}

impl RemoteStore for MemoryStore {
    async fn current_user(&self) -> Result<Option<Identity>, StoreError> {
        Ok(self.begin(false).await?.user.clone())
    }

    async fn list_goals(&self, owner: Uuid) -> Result<Vec<Goal>, StoreError> {
        let state = self.begin(false).await?;
        let mut goals: Vec<Goal> = state.goals.iter().filter(|g| g.owner_id == owner).cloned().collect();
        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(goals)
    }

    async fn insert_goal(&self, goal: &NewGoal) -> Result<Goal, StoreError> {
        let mut state = self.begin(true).await?;
        let row = Goal {
            id: Uuid::new_v4(),
            owner_id: goal.user_id,
            title: goal.title.clone(),
            description: goal.description.clone(),
            deadline: goal.deadline,
            area: goal.area,
            completed: goal.completed,
            created_at: Utc::now(),
        };
        state.goals.push(row.clone());
        Ok(row)
    }

    async fn set_goal_completed(&self, id: Uuid, completed: bool) -> Result<(), StoreError> {
        let mut state = self.begin(true).await?;
        let goal = state.goals.iter_mut().find(|g| g.id == id).ok_or_else(|| not_found(id))?;
        goal.completed = completed;
        Ok(())
    }

    async fn delete_goal(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.begin(true).await?;
        state.goals.retain(|g| g.id != id);
        Ok(())
    }

    async fn list_plans(&self, owner: Uuid) -> Result<Vec<Plan>, StoreError> {
        let state = self.begin(false).await?;
        let mut plans: Vec<Plan> = state.plans.iter().filter(|p| p.owner_id == owner).cloned().collect();
        plans.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(plans)
    }

    async fn insert_plan(&self, plan: &NewPlan) -> Result<Plan, StoreError> {
        let mut state = self.begin(true).await?;
        let row = Plan {
            id: Uuid::new_v4(),
            owner_id: plan.user_id,
            date: plan.date,
            day_label: plan.day_name.clone(),
            items: plan.items.clone(),
        };
        state.plans.push(row.clone());
        Ok(row)
    }

    async fn replace_plan_items(&self, id: Uuid, items: &[ScheduleItem]) -> Result<(), StoreError> {
        let mut state = self.begin(true).await?;
        let plan = state.plans.iter_mut().find(|p| p.id == id).ok_or_else(|| not_found(id))?;
        plan.items = items.to_vec();
        Ok(())
    }

    async fn delete_plan(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.begin(true).await?;
        state.plans.retain(|p| p.id != id);
        Ok(())
    }

    async fn routine_for(&self, owner: Uuid, date: NaiveDate) -> Result<RoutineEntry, StoreError> {
        let state = self.begin(false).await?;
        state
            .routine
            .iter()
            .find(|r| r.owner_id == owner && r.date == date)
            .cloned()
            .ok_or(StoreError::NoRows)
    }

    async fn insert_routine(&self, entry: &NewRoutineEntry) -> Result<RoutineEntry, StoreError> {
        let mut state = self.begin(true).await?;
        let row = RoutineEntry {
            id: Uuid::new_v4(),
            owner_id: entry.user_id,
            date: entry.date,
            activities: entry.activities,
        };
        state.routine.push(row.clone());
        Ok(row)
    }

    async fn update_routine_activities(
        &self,
        id: Uuid,
        activities: &Activities,
    ) -> Result<(), StoreError> {
        let mut state = self.begin(true).await?;
        let entry = state.routine.iter_mut().find(|r| r.id == id).ok_or_else(|| not_found(id))?;
        entry.activities = *activities;
        Ok(())
    }
}
