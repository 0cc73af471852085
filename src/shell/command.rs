use chrono::NaiveDate;

use daybook::controller::View;
use daybook::core::area::{AreaFilter, LifeArea};
use daybook::core::goal::GoalDraft;
use daybook::core::plan::ItemInput;
use daybook::core::routine::ActivityKey;
use daybook::core::temporal;

/// What a `toggle` line points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// 1-based position in the list on screen.
    Index(usize),
    Activity(ActivityKey),
}

/// One parsed shell line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    /// Re-render the current view, or switch to another one.
    Show(Option<View>),
    Login(String),
    Signup(String),
    Logout,
    Whoami,
    Refresh,
    Retry,

    // Goals
    Filter(AreaFilter),
    AddGoal(GoalDraft),
    QuickAdd(String),
    Assist(String),

    // Shared list actions
    Toggle(Target),
    Remove(usize),
    Delete(Option<usize>),

    // Planning
    Open(usize),
    Draft,
    DraftDate(NaiveDate),
    Item(ItemInput),
    /// Without an item the shell prompts with the current values.
    EditItem(usize, Option<ItemInput>),
    Save,
    Back,
}

fn index(arg: &str) -> Result<usize, String> {
    match arg.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("expected a list number, got \"{}\"", arg.trim())),
    }
}

/// `09:00-10:00 Plan week` or `9:00 Pray`.
fn item_input(args: &str) -> Result<ItemInput, String> {
    let (time, label) = args
        .trim()
        .split_once(char::is_whitespace)
        .ok_or("usage: item <start>[-<end>] <activity>")?;
    let (start, end) = match time.split_once('-') {
        Some((start, end)) => (start, Some(end)),
        None => (time, None),
    };
    Ok(ItemInput::new(start, end, label.trim()))
}

/// `Fix the gate @home due:tomorrow -- buy a new hinge`
fn goal_draft(args: &str, today: NaiveDate) -> Result<GoalDraft, String> {
    let (head, description) = match args.split_once("--") {
        Some((head, desc)) => (head, Some(desc.trim().to_string())),
        None => (args, None),
    };

    let mut title = Vec::new();
    let mut draft = GoalDraft::new("");
    for word in head.split_whitespace() {
        if let Some(area) = word.strip_prefix('@') {
            draft.area = LifeArea::parse(area).ok_or_else(|| format!("unknown area \"{}\"", area))?;
        } else if let Some(date) = word.strip_prefix("due:") {
            draft.deadline = Some(temporal::parse_date(date, today).ok_or_else(|| format!("bad date \"{}\"", date))?);
        } else {
            title.push(word);
        }
    }
    draft.title = title.join(" ");
    draft.description = description.filter(|d| !d.is_empty());
    Ok(draft)
}

impl Command {
    pub fn parse(line: &str, today: NaiveDate) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match word.to_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            "show" | "ls" => Self::Show(None),
            "view" => Self::Show(Some(View::parse(rest).ok_or_else(|| format!("unknown view \"{}\"", rest))?)),
            "login" => Self::Login(rest.to_string()),
            "signup" => Self::Signup(rest.to_string()),
            "logout" => Self::Logout,
            "whoami" => Self::Whoami,
            "refresh" => Self::Refresh,
            "retry" => Self::Retry,
            "filter" => Self::Filter(AreaFilter::parse(rest).ok_or_else(|| format!("unknown area \"{}\"", rest))?),
            "add" => Self::AddGoal(goal_draft(rest, today)?),
            "quick" => Self::QuickAdd(rest.to_string()),
            "ai" => Self::Assist(rest.to_string()),
            "toggle" | "done" => match ActivityKey::parse(rest) {
                Some(key) => Self::Toggle(Target::Activity(key)),
                None => Self::Toggle(Target::Index(index(rest)?)),
            },
            "rm" => Self::Remove(index(rest)?),
            "delete" => Self::Delete(if rest.is_empty() { None } else { Some(index(rest)?) }),
            "open" => Self::Open(index(rest)?),
            "draft" => Self::Draft,
            "date" => Self::DraftDate(temporal::parse_date(rest, today).ok_or_else(|| format!("bad date \"{}\"", rest))?),
            "item" => Self::Item(item_input(rest)?),
            "edit" => match rest.split_once(char::is_whitespace) {
                Some((n, item)) => Self::EditItem(index(n)?, Some(item_input(item)?)),
                None => Self::EditItem(index(rest)?, None),
            },
            "save" => Self::Save,
            "back" => Self::Back,
            other => match View::parse(other) {
                Some(view) => Self::Show(Some(view)),
                None => return Err(format!("unknown command \"{}\", try help", other)),
            },
        };
        Ok(Some(command))
    }
}

pub const HELP: &str = "\
Views:     goals | planning | routine | history | show
Session:   login <email> | signup <email> | logout | whoami | refresh | retry | quit
Goals:     add <title> [@area] [due:YYYY-MM-DD|today|tomorrow] [-- description]
           quick <title> | ai <text> | filter <area|all> | toggle <n> | delete <n>
Planning:  open <n> | delete [n] | draft | back
  draft:   date <date> | item <start>[-<end>] <activity> | rm <n> | ai <text> | save
  open:    item ... | edit <n> [<start>[-<end>] <activity>] | toggle <n> | rm <n>
Routine:   toggle <prayer|reading|workout|spouse|planning|n>
History:   toggle <n> | delete <n>";
