use std::fmt::Write;

use chrono::NaiveDate;

use daybook::controller::{GoalsController, History, PlanningController, PlanningMode, RoutineController};
use daybook::core::area::AreaFilter;
use daybook::core::goal::Goal;
use daybook::core::plan::{Plan, PlanStatus, ScheduleItem};
use daybook::core::routine::ActivityKey;
use daybook::core::temporal;

fn check(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

fn percent(fraction: f32) -> u32 {
    (fraction * 100.0).round() as u32
}

fn goal_line(out: &mut String, n: usize, goal: &Goal, today: NaiveDate, pending: bool) {
    let _ = write!(out, "{:>3}. {} {} {}", n, check(goal.completed), goal.area.icon(), goal.title);
    if let Some(deadline) = goal.deadline {
        let _ = write!(out, "  (due {})", temporal::short_date(deadline));
        if goal.is_overdue(today) {
            out.push_str(" OVERDUE");
        }
    }
    if pending {
        out.push_str(" ...");
    }
    out.push('\n');
    if let Some(desc) = goal.description.as_deref().filter(|d| !d.is_empty()) {
        let _ = writeln!(out, "       {}", desc);
    }
}

pub fn goals_view(goals: &GoalsController, today: NaiveDate) -> String {
    let pending = goals.pending(today);
    let mut out = String::new();
    let filter = match goals.filter() {
        AreaFilter::All => "all areas".to_string(),
        AreaFilter::Only(area) => area.label().to_string(),
    };
    let _ = writeln!(
        out,
        "Goals ({}): {} pending, {} overdue",
        filter,
        pending.len(),
        goals.overdue_count(today)
    );
    if pending.is_empty() {
        out.push_str("  Nothing pending. Add one with `add <title>` or `quick <title>`.\n");
    }
    for (i, goal) in pending.iter().enumerate() {
        goal_line(&mut out, i + 1, goal, today, goals.is_pending(goal.id));
    }
    out
}

pub fn history_view(history: &History<'_>, today: NaiveDate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "History: {} completed", history.count());
    if history.is_empty() {
        out.push_str("  No completed goals yet.\n");
    }
    for (i, goal) in history.completed().iter().enumerate() {
        goal_line(&mut out, i + 1, goal, today, false);
    }
    out
}

fn item_lines(out: &mut String, items: &[ScheduleItem]) {
    for (i, item) in items.iter().enumerate() {
        let _ = writeln!(out, "{:>3}. {} {:<13} {}", i + 1, check(item.completed), item.time, item.task);
    }
}

fn plan_summary(plan: &Plan, today: NaiveDate) -> String {
    let status = match plan.status(today) {
        PlanStatus::Done => "done",
        PlanStatus::Planned => "planned",
    };
    let progress = match plan.progress() {
        Some(p) => format!("{}%", percent(p)),
        None => "no items".to_string(),
    };
    format!(
        "{} ({})  {}/{} items, {}  [{}]",
        plan.day_label,
        temporal::short_date(plan.date),
        plan.completed_count(),
        plan.items.len(),
        progress,
        status
    )
}

pub fn planning_view(planning: &PlanningController, today: NaiveDate) -> String {
    let mut out = String::new();
    match planning.mode() {
        PlanningMode::List => {
            let _ = writeln!(out, "Planning: {} saved days", planning.plans().len());
            if planning.plans().is_empty() {
                out.push_str("  No plans yet. Start one with `draft`.\n");
            }
            for (i, plan) in planning.plans().iter().enumerate() {
                let _ = writeln!(out, "{:>3}. {}", i + 1, plan_summary(plan, today));
            }
            let drafts = planning.draft_dates();
            if !drafts.is_empty() {
                let dates: Vec<String> = drafts.into_iter().map(temporal::short_date).collect();
                let _ = writeln!(out, "  Unsaved drafts: {}", dates.join(", "));
            }
        }
        PlanningMode::Create => {
            let date = planning.draft_date();
            let _ = writeln!(out, "New plan for {}", temporal::day_label(date));
            let upcoming: Vec<String> = temporal::upcoming_days(today, 7)
                .into_iter()
                .map(|d| if d == date { format!("[{}]", d.format("%a %-d")) } else { d.format("%a %-d").to_string() })
                .collect();
            let _ = writeln!(out, "  {}", upcoming.join("  "));
            if planning.draft_items().is_empty() {
                out.push_str("  No activities yet. Add one with `item <start>[-<end>] <activity>`.\n");
            }
            item_lines(&mut out, planning.draft_items());
        }
        PlanningMode::Detail(id) => match planning.plan(id) {
            Some(plan) => {
                let _ = writeln!(out, "{}", plan_summary(plan, today));
                if planning.is_pending(id) {
                    out.push_str("  saving...\n");
                }
                item_lines(&mut out, &plan.items);
            }
            None => out.push_str("Plan no longer exists.\n"),
        },
    }
    out
}

pub fn routine_view(routine: &RoutineController) -> String {
    let Some(entry) = routine.entry() else {
        return "Routine: not loaded. Sign in first.\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Routine for {}: {}/{} ({}%)",
        temporal::day_label(entry.date),
        entry.completed_count(),
        ActivityKey::ALL.len(),
        percent(entry.progress())
    );
    for (i, key) in ActivityKey::ALL.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {} {:<18} {}",
            i + 1,
            check(entry.activities.get(*key)),
            key.label(),
            key.subtitle()
        );
    }
    if entry.is_all_done() {
        out.push_str("  All done today.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use daybook::core::plan::ItemInput;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn empty_views_point_at_next_step() {
        assert!(goals_view(&GoalsController::new(), today()).contains("Nothing pending"));
        assert!(routine_view(&RoutineController::new()).contains("not loaded"));
        assert!(planning_view(&PlanningController::new(today()), today()).contains("`draft`"));
    }

    #[test]
    fn draft_lists_sorted_items() {
        let mut planning = PlanningController::new(today());
        planning.start_draft();
        planning.add_draft_item(ItemInput::new("09:00", Some("10:00"), "Plan week")).unwrap();
        planning.add_draft_item(ItemInput::new("08:00", None, "Pray")).unwrap();
        let text = planning_view(&planning, today());
        let pray = text.find("Pray").unwrap();
        let week = text.find("Plan week").unwrap();
        assert!(pray < week);
        assert!(text.starts_with("New plan for Sunday, 18 Oct"));
    }
}
