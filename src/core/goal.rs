use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::area::{AreaFilter, LifeArea};

/// A goal row as stored remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    pub area: LifeArea,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Goal {
    /// Pending with a deadline strictly before the start of `today`.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.deadline.is_some_and(|d| d < today)
    }
}

/// Insert payload; id and creation timestamp are assigned by the server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewGoal {
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub area: LifeArea,
    pub deadline: Option<NaiveDate>,
    pub completed: bool,
}

/// User input for a new goal before identity is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalDraft {
    pub title: String,
    pub description: Option<String>,
    pub area: LifeArea,
    pub deadline: Option<NaiveDate>,
}

impl GoalDraft {
    /// Full-form draft; the form's default area is Work.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            area: LifeArea::Work,
            deadline: None,
        }
    }

    /// Quick-add always files under Home with no deadline.
    pub fn quick(title: impl Into<String>) -> Self {
        Self {
            area: LifeArea::Home,
            ..Self::new(title)
        }
    }

    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty()
    }

    pub fn into_new_goal(self, owner: Uuid) -> NewGoal {
        NewGoal {
            user_id: owner,
            title: self.title,
            description: self.description.filter(|d| !d.trim().is_empty()),
            area: self.area,
            deadline: self.deadline,
            completed: false,
        }
    }
}

fn compare_pending(a: &Goal, b: &Goal, today: NaiveDate) -> Ordering {
    b.is_overdue(today)
        .cmp(&a.is_overdue(today))
        .then_with(|| match (a.deadline, b.deadline) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Pending goals matching `filter`: overdue first, then by deadline, undated last.
///
/// The sort is stable, so undated goals keep their incoming order.
pub fn pending_goals(goals: &[Goal], filter: AreaFilter, today: NaiveDate) -> Vec<&Goal> {
    let mut pending: Vec<&Goal> = goals
        .iter()
        .filter(|g| !g.completed && filter.matches(g.area))
        .collect();
    pending.sort_by(|a, b| compare_pending(a, b, today));
    pending
}

pub fn overdue_count(pending: &[&Goal], today: NaiveDate) -> usize {
    pending.iter().filter(|g| g.is_overdue(today)).count()
}

pub fn completed_goals(goals: &[Goal]) -> Vec<&Goal> {
    goals.iter().filter(|g| g.completed).collect()
}
