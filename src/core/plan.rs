use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::temporal;

static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid clock regex"));

const RANGE_SEPARATOR: &str = " - ";

/// One time slot within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub id: String,
    pub time: String,
    pub task: String,
    #[serde(default)]
    pub completed: bool,
}

impl ScheduleItem {
    pub fn new(time: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            time: time.into(),
            task: task.into(),
            completed: false,
        }
    }

    /// Split `"09:00 - 10:00"` into its start and optional end.
    pub fn time_range(&self) -> (&str, Option<&str>) {
        match self.time.split_once(RANGE_SEPARATOR) {
            Some((start, end)) => (start, Some(end)),
            None => (self.time.as_str(), None),
        }
    }
}

/// Zero-pad `H:MM` to `HH:MM` so that string order matches clock order.
/// Anything that is not a bare clock time is returned trimmed but untouched.
pub fn normalize_time(s: &str) -> String {
    let s = s.trim();
    match CLOCK_RE.captures(s) {
        Some(caps) => format!("{:0>2}:{}", &caps[1], &caps[2]),
        None => s.to_string(),
    }
}

/// Add/edit form contents for a schedule item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemInput {
    pub start: String,
    pub end: String,
    pub label: String,
}

impl ItemInput {
    pub fn new(start: &str, end: Option<&str>, label: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.unwrap_or_default().to_string(),
            label: label.to_string(),
        }
    }

    /// Pre-fill from an existing item.
    pub fn from_item(item: &ScheduleItem) -> Self {
        let (start, end) = item.time_range();
        Self::new(start, end, &item.task)
    }

    /// Start time and label are required.
    pub fn is_complete(&self) -> bool {
        !self.start.trim().is_empty() && !self.label.trim().is_empty()
    }

    pub fn time(&self) -> String {
        let start = normalize_time(&self.start);
        if self.end.trim().is_empty() {
            start
        } else {
            format!("{}{}{}", start, RANGE_SEPARATOR, normalize_time(&self.end))
        }
    }
}

pub fn sort_items(items: &mut [ScheduleItem]) {
    items.sort_by(|a, b| a.time.cmp(&b.time));
}

/// Items after saving `input`: a new item when `editing` is `None`, otherwise the
/// edited item keeps its id and completion flag. Returns `None` if `editing`
/// names an item that does not exist.
pub fn with_saved_item(
    items: &[ScheduleItem],
    input: &ItemInput,
    editing: Option<&str>,
) -> Option<Vec<ScheduleItem>> {
    let mut updated = items.to_vec();
    match editing {
        Some(id) => {
            let item = updated.iter_mut().find(|i| i.id == id)?;
            item.time = input.time();
            item.task = input.label.trim().to_string();
        }
        None => updated.push(ScheduleItem::new(input.time(), input.label.trim())),
    }
    sort_items(&mut updated);
    Some(updated)
}

pub fn without_item(items: &[ScheduleItem], id: &str) -> Vec<ScheduleItem> {
    items.iter().filter(|i| i.id != id).cloned().collect()
}

pub fn with_toggled_item(items: &[ScheduleItem], id: &str) -> Vec<ScheduleItem> {
    items
        .iter()
        .map(|i| {
            let mut i = i.clone();
            if i.id == id {
                i.completed = !i.completed;
            }
            i
        })
        .collect()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<ScheduleItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<ScheduleItem>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A dated daily schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    #[serde(rename = "user_id")]
    pub owner_id: Uuid,
    pub date: NaiveDate,
    #[serde(rename = "day_name", default)]
    pub day_label: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<ScheduleItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStatus {
    Done,
    Planned,
}

impl Plan {
    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|i| i.completed).count()
    }

    /// Fraction of completed items; `None` for a plan with no items.
    pub fn progress(&self) -> Option<f32> {
        if self.items.is_empty() {
            return None;
        }
        Some(self.completed_count() as f32 / self.items.len() as f32)
    }

    /// Days before today count as done.
    pub fn status(&self, today: NaiveDate) -> PlanStatus {
        if self.date < today {
            PlanStatus::Done
        } else {
            PlanStatus::Planned
        }
    }

    pub fn item(&self, id: &str) -> Option<&ScheduleItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

/// Insert payload for a plan row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPlan {
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub day_name: String,
    pub items: Vec<ScheduleItem>,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub content: serde_json::Value,
}

impl NewPlan {
    pub fn daily(owner: Uuid, date: NaiveDate, items: Vec<ScheduleItem>) -> Self {
        Self {
            user_id: owner,
            date,
            day_name: temporal::day_label(date),
            items,
            kind: "daily",
            content: serde_json::json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn times(items: &[ScheduleItem]) -> Vec<&str> {
        items.iter().map(|i| i.time.as_str()).collect()
    }

    #[test]
    fn range_sorts_by_start() {
        let items = with_saved_item(&[], &ItemInput::new("09:00", Some("10:00"), "Plan week"), None).unwrap();
        let items = with_saved_item(&items, &ItemInput::new("08:00", None, "Pray"), None).unwrap();
        assert_eq!(times(&items), vec!["08:00", "09:00 - 10:00"]);
    }

    #[test]
    fn edit_keeps_id_and_completion() {
        let mut items = vec![ScheduleItem::new("07:00", "Run"), ScheduleItem::new("12:00", "Lunch")];
        items[0].completed = true;
        let id = items[0].id.clone();

        let updated = with_saved_item(&items, &ItemInput::new("13:00", Some("14:00"), "Run"), Some(&id)).unwrap();
        assert_eq!(times(&updated), vec!["12:00", "13:00 - 14:00"]);
        let edited = updated.iter().find(|i| i.id == id).unwrap();
        assert!(edited.completed);
    }

    #[test]
    fn edit_of_missing_item_is_rejected() {
        let items = vec![ScheduleItem::new("07:00", "Run")];
        assert!(with_saved_item(&items, &ItemInput::new("08:00", None, "x"), Some("nope")).is_none());
    }

    #[test]
    fn remove_one_of_two_leaves_other_untouched() {
        let mut items = vec![ScheduleItem::new("07:00", "Run"), ScheduleItem::new("12:00", "Lunch")];
        items[1].completed = true;
        let keep = items[1].clone();
        let remaining = without_item(&items, &items[0].id);
        assert_eq!(remaining, vec![keep]);
    }

    #[test]
    fn toggle_flips_only_target() {
        let items = vec![ScheduleItem::new("07:00", "Run"), ScheduleItem::new("12:00", "Lunch")];
        let toggled = with_toggled_item(&items, &items[1].id);
        assert!(!toggled[0].completed);
        assert!(toggled[1].completed);
    }

    #[test]
    fn normalizes_single_digit_hours() {
        assert_eq!(normalize_time("9:05"), "09:05");
        assert_eq!(normalize_time(" 14:30 "), "14:30");
        assert_eq!(normalize_time("noon"), "noon");
        assert_eq!(ItemInput::new("9:00", Some("10:00"), "x").time(), "09:00 - 10:00");
    }

    #[test]
    fn input_round_trips_through_edit_form() {
        let item = ScheduleItem::new("09:00 - 10:30", "Deep work");
        let input = ItemInput::from_item(&item);
        assert_eq!(input, ItemInput::new("09:00", Some("10:30"), "Deep work"));
    }

    #[test]
    fn progress_of_empty_plan_is_undefined() {
        let mut plan = Plan {
            id: Uuid::new_v4(),
            owner_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            day_label: String::new(),
            items: Vec::new(),
        };
        assert_eq!(plan.progress(), None);
        plan.items = vec![ScheduleItem::new("07:00", "Run"), ScheduleItem::new("08:00", "Read")];
        plan.items[0].completed = true;
        assert_eq!(plan.progress(), Some(0.5));
    }

    #[test]
    fn decodes_row_with_null_items() {
        let row = r#"{
            "id": "6f1c8a1e-7b4b-4a55-9a7d-1f0b7c2c9e11",
            "user_id": "0d9a3c55-2b8e-4f0e-8b61-3b1c2f4f5a66",
            "date": "2026-10-18",
            "day_name": "domingo, 18 de out.",
            "items": null,
            "type": "daily",
            "content": {}
        }"#;
        let plan: Plan = serde_json::from_str(row).unwrap();
        assert!(plan.items.is_empty());
        assert_eq!(plan.day_label, "domingo, 18 de out.");
    }

    #[test]
    fn legacy_items_without_completed_flag() {
        let items: Vec<ScheduleItem> =
            serde_json::from_str(r#"[{"id":"k3j9x0a1b","time":"08:00","task":"Pray"}]"#).unwrap();
        assert!(!items[0].completed);
        assert_eq!(items[0].id, "k3j9x0a1b");
    }
}
