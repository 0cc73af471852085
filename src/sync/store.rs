use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::goal::{Goal, NewGoal};
use crate::core::plan::{NewPlan, Plan, ScheduleItem};
use crate::core::routine::{Activities, NewRoutineEntry, RoutineEntry};

/// The signed-in user all rows are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    /// A single-row lookup matched nothing.
    #[error("no rows returned")]
    NoRows,
    #[error("not signed in")]
    SignedOut,
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Row storage and identity lookup for the three user-scoped collections.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    async fn current_user(&self) -> Result<Option<Identity>, StoreError>;

    /// Goals newest first.
    async fn list_goals(&self, owner: Uuid) -> Result<Vec<Goal>, StoreError>;
    async fn insert_goal(&self, goal: &NewGoal) -> Result<Goal, StoreError>;
    async fn set_goal_completed(&self, id: Uuid, completed: bool) -> Result<(), StoreError>;
    async fn delete_goal(&self, id: Uuid) -> Result<(), StoreError>;

    /// Plans by date, latest first.
    async fn list_plans(&self, owner: Uuid) -> Result<Vec<Plan>, StoreError>;
    async fn insert_plan(&self, plan: &NewPlan) -> Result<Plan, StoreError>;
    async fn replace_plan_items(&self, id: Uuid, items: &[ScheduleItem]) -> Result<(), StoreError>;
    async fn delete_plan(&self, id: Uuid) -> Result<(), StoreError>;

    /// Fails with [`StoreError::NoRows`] when the owner has no entry for `date`.
    async fn routine_for(&self, owner: Uuid, date: NaiveDate) -> Result<RoutineEntry, StoreError>;
    async fn insert_routine(&self, entry: &NewRoutineEntry) -> Result<RoutineEntry, StoreError>;
    async fn update_routine_activities(
        &self,
        id: Uuid,
        activities: &Activities,
    ) -> Result<(), StoreError>;
}
