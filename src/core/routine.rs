use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five fixed daily habits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKey {
    Prayer,
    Reading,
    Workout,
    SpouseTime,
    Planning,
}

impl ActivityKey {
    pub const ALL: [ActivityKey; 5] = [
        Self::Prayer,
        Self::Reading,
        Self::Workout,
        Self::SpouseTime,
        Self::Planning,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Prayer => "Prayer",
            Self::Reading => "Study and reading",
            Self::Workout => "Care for the body",
            Self::SpouseTime => "Quality time",
            Self::Planning => "Pause and plan",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            Self::Prayer => "Connection and gratitude",
            Self::Reading => "Expanding the mind",
            Self::Workout => "Health and energy",
            Self::SpouseTime => "Presence with your spouse",
            Self::Planning => "Direction for the day",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "prayer" | "pray" => Some(Self::Prayer),
            "reading" | "read" => Some(Self::Reading),
            "workout" => Some(Self::Workout),
            "spouse" | "spousetime" | "spouse-time" => Some(Self::SpouseTime),
            "planning" | "plan" => Some(Self::Planning),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activities {
    #[serde(default)]
    pub prayer: bool,
    #[serde(default)]
    pub reading: bool,
    #[serde(default)]
    pub workout: bool,
    #[serde(rename = "spouseTime", default)]
    pub spouse_time: bool,
    #[serde(default)]
    pub planning: bool,
}

impl Activities {
    pub fn get(&self, key: ActivityKey) -> bool {
        match key {
            ActivityKey::Prayer => self.prayer,
            ActivityKey::Reading => self.reading,
            ActivityKey::Workout => self.workout,
            ActivityKey::SpouseTime => self.spouse_time,
            ActivityKey::Planning => self.planning,
        }
    }

    fn slot(&mut self, key: ActivityKey) -> &mut bool {
        match key {
            ActivityKey::Prayer => &mut self.prayer,
            ActivityKey::Reading => &mut self.reading,
            ActivityKey::Workout => &mut self.workout,
            ActivityKey::SpouseTime => &mut self.spouse_time,
            ActivityKey::Planning => &mut self.planning,
        }
    }

    /// Copy with one flag flipped.
    pub fn toggled(&self, key: ActivityKey) -> Self {
        let mut next = *self;
        let slot = next.slot(key);
        *slot = !*slot;
        next
    }

    pub fn completed_count(&self) -> usize {
        ActivityKey::ALL.iter().filter(|k| self.get(**k)).count()
    }
}

/// One day's routine checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineEntry {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub activities: Activities,
}

impl RoutineEntry {
    pub fn completed_count(&self) -> usize {
        self.activities.completed_count()
    }

    pub fn progress(&self) -> f32 {
        self.completed_count() as f32 / ActivityKey::ALL.len() as f32
    }

    pub fn is_all_done(&self) -> bool {
        self.completed_count() == ActivityKey::ALL.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRoutineEntry {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub activities: Activities,
}

impl NewRoutineEntry {
    pub fn blank(owner: Uuid, date: NaiveDate) -> Self {
        Self {
            user_id: owner,
            date,
            activities: Activities::default(),
        }
    }
}
