//! Line-oriented front end. Parses a command, hands it to [`AppState`], prints
//! the active view. All data work happens in the controllers.

mod command;
mod views;

use std::io::Write;

use tokio::sync::watch;

use daybook::controller::{ActionError, AppState, PlanningController, PlanningMode, Section, View};
use daybook::core::plan::ItemInput;
use daybook::core::temporal;
use daybook::sync::keyring;
use daybook::sync::{GeminiAssist, Identity, RemoteStore, SignUp, SupabaseClient};

use command::{Command, HELP, Target};

fn confirm(prompt: &str) -> bool {
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

fn password() -> Option<String> {
    dialoguer::Password::new().with_prompt("Password").interact().ok()
}

fn field(prompt: &str, initial: &str, required: bool) -> Option<String> {
    dialoguer::Input::<String>::new()
        .with_prompt(prompt)
        .with_initial_text(initial)
        .allow_empty(!required)
        .interact_text()
        .ok()
}

/// Edit form for a schedule item, starting from its current values.
fn item_form(current: ItemInput) -> Option<ItemInput> {
    Some(ItemInput {
        start: field("Start", &current.start, true)?,
        end: field("End", &current.end, false)?,
        label: field("Activity", &current.label, true)?,
    })
}

/// The refresh token to write, when it differs from the one already in the keyring.
fn rotated(saved: Option<&str>, current: Option<String>) -> Option<String> {
    current.filter(|token| saved != Some(token.as_str()))
}

/// Whether `after` holds a failure recorded since `before` was taken.
fn is_new_failure(before: Option<(Section, u64)>, after: Option<(Section, u64)>) -> bool {
    match after {
        Some((_, seq)) => before.is_none_or(|(_, prev)| seq > prev),
        None => false,
    }
}

/// What happened to a command, for the line printed under it.
enum Outcome {
    Render,
    Quiet,
    Quit,
}

pub struct Shell {
    app: AppState,
    store: SupabaseClient,
    assist: GeminiAssist,
    identity: watch::Receiver<Option<Identity>>,
    /// Keyring key for the refresh token.
    server: String,
    /// Refresh token last written to the keyring.
    saved_token: Option<String>,
}

impl Shell {
    pub fn new(store: SupabaseClient, assist: GeminiAssist, server: String, view: View) -> Self {
        let mut app = AppState::new(temporal::today());
        app.set_view(view);
        let identity = store.subscribe();
        Self {
            app,
            store,
            assist,
            identity,
            server,
            saved_token: None,
        }
    }

    /// Try the refresh token left by a previous session.
    pub async fn restore_session(&mut self) {
        let token = match keyring::load_refresh_token(&self.server).await {
            Ok(Some(token)) => {
                self.saved_token = Some(token.clone());
                token
            }
            Ok(None) => return,
            Err(e) => {
                log::warn!("Keyring unavailable: {}", e);
                return;
            }
        };
        match self.store.restore(&token).await {
            Ok(identity) => log::info!("Restored session for {}", identity.id),
            Err(e) => {
                log::warn!("Stored session could not be restored: {}", e);
                self.forget_token().await;
            }
        }
        self.follow_identity().await;
    }

    /// Forward the latest identity change, if any, to the app state, then keep
    /// the keyring in step with the session. Every sign-in, restore and implicit
    /// refresh rotates the refresh token.
    async fn follow_identity(&mut self) {
        if self.identity.has_changed().unwrap_or(false) {
            let identity = self.identity.borrow_and_update().clone();
            self.app
                .on_identity_change(&self.store, identity, temporal::today())
                .await;
        }
        if self.app.identity().is_some() {
            self.remember_token().await;
        } else if self.saved_token.is_some() {
            self.forget_token().await;
        }
    }

    async fn remember_token(&mut self) {
        let current = self.store.refresh_token().await;
        let Some(token) = rotated(self.saved_token.as_deref(), current) else {
            return;
        };
        match keyring::store_refresh_token(&self.server, &token).await {
            Ok(()) => log::debug!("Stored rotated refresh token"),
            Err(e) => log::warn!("Failed to store session in keyring: {}", e),
        }
        // Not retried until the token rotates again.
        self.saved_token = Some(token);
    }

    async fn forget_token(&mut self) {
        self.saved_token = None;
        if let Err(e) = keyring::delete_refresh_token(&self.server).await {
            log::warn!("Failed to clear keyring: {}", e);
        }
    }

    pub async fn run(&mut self) {
        println!("{}", self.render());
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            print!("{}> ", self.app.view().label().to_lowercase());
            let _ = std::io::stdout().flush();
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    log::error!("Failed to read input: {}", e);
                    break;
                }
            }

            let today = temporal::today();
            self.app.roll_day(&self.store, today).await;
            let command = match Command::parse(&line, today) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{}", e);
                    continue;
                }
            };

            let failed_before = self.app.last_failure();
            let outcome = self.update(command).await;
            let undone = is_new_failure(failed_before, self.app.last_failure());
            self.follow_identity().await;
            match outcome {
                Ok(Outcome::Quit) => break,
                Ok(Outcome::Render) => println!("{}", self.render()),
                Ok(Outcome::Quiet) => {}
                Err(e) => Self::report(e, undone),
            }
        }
    }

    fn render(&self) -> String {
        let today = temporal::today();
        if self.app.identity().is_none() {
            return "Not signed in. Use `login <email>` or `signup <email>`.".to_string();
        }
        match self.app.view() {
            View::Goals => views::goals_view(&self.app.goals, today),
            View::Planning => views::planning_view(&self.app.planning, today),
            View::Routine => views::routine_view(&self.app.routine),
            View::History => views::history_view(&self.app.history(), today),
        }
    }

    /// `undone` is set when this command's change was rolled back.
    fn report(err: ActionError, undone: bool) {
        match err {
            ActionError::Invalid(hint) => println!("{}", hint),
            ActionError::SignedOut => println!("Sign in first."),
            ActionError::Declined => {}
            ActionError::NotFound => println!("No such entry."),
            ActionError::Remote(e) => {
                println!("Could not sync: {}", e);
                if undone {
                    println!("The change was undone. Type `retry` to send it again.");
                }
            }
        }
    }

    /// Plan creation failures block until acknowledged.
    fn alert(message: &str) {
        println!("{}", message);
        print!("Press Enter to continue.");
        let _ = std::io::stdout().flush();
        let mut buf = String::new();
        let _ = std::io::stdin().read_line(&mut buf);
    }

    async fn update(&mut self, command: Command) -> Result<Outcome, ActionError> {
        let view = self.app.view();
        match command {
            Command::Help => {
                println!("{}", HELP);
                return Ok(Outcome::Quiet);
            }
            Command::Quit => return Ok(Outcome::Quit),
            Command::Show(None) => {}
            Command::Show(Some(view)) => self.app.set_view(view),
            Command::Login(email) => {
                let Some(password) = password() else {
                    return Err(ActionError::Declined);
                };
                let identity = self.store.sign_in(email.trim(), &password).await?;
                println!("Signed in as {}", identity.email.as_deref().unwrap_or(email.trim()));
            }
            Command::Signup(email) => {
                let Some(password) = password() else {
                    return Err(ActionError::Declined);
                };
                match self.store.sign_up(email.trim(), &password).await? {
                    SignUp::SignedIn(_) => {}
                    SignUp::ConfirmationRequired => {
                        println!("Check your email to confirm the account, then `login`.");
                        return Ok(Outcome::Quiet);
                    }
                }
            }
            Command::Logout => {
                self.store.sign_out().await;
                println!("Signed out.");
            }
            Command::Whoami => {
                match self.store.current_user().await? {
                    Some(user) => println!("{} ({})", user.email.as_deref().unwrap_or("no email"), user.id),
                    None => println!("Not signed in."),
                }
                return Ok(Outcome::Quiet);
            }
            Command::Refresh => {
                let identity = self.store.current_user().await?;
                self.app
                    .on_identity_change(&self.store, identity, temporal::today())
                    .await;
            }
            Command::Retry => self.app.retry(&self.store).await?,
            other => self.view_command(view, other).await?,
        }
        Ok(Outcome::Render)
    }

    /// Commands whose meaning depends on the active view.
    async fn view_command(&mut self, view: View, command: Command) -> Result<(), ActionError> {
        let today = temporal::today();
        let store = &self.store;
        let app = &mut self.app;
        match (view, command) {
            (View::Goals, Command::Filter(filter)) => app.goals.set_filter(filter),
            (View::Goals, Command::AddGoal(draft)) => {
                app.goals.create(store, draft).await?;
            }
            (View::Goals, Command::QuickAdd(title)) => {
                app.goals.quick_add(store, &title).await?;
            }
            (View::Goals, Command::Assist(text)) => {
                if app.goals.create_from_text(store, &self.assist, &text).await?.is_none() {
                    println!("Could not turn that into a goal.");
                }
            }
            (View::Goals, Command::Toggle(Target::Index(n))) => {
                let id = app.goals.pending(today).get(n - 1).map(|g| g.id).ok_or(ActionError::NotFound)?;
                app.goals.toggle_completion(store, id).await?;
            }
            (View::Goals, Command::Delete(Some(n))) => {
                let id = app.goals.pending(today).get(n - 1).map(|g| g.id).ok_or(ActionError::NotFound)?;
                app.goals.delete(store, id, &mut confirm).await?;
            }

            (View::History, Command::Toggle(Target::Index(n))) => {
                let id = app.history().completed().get(n - 1).map(|g| g.id).ok_or(ActionError::NotFound)?;
                app.goals.toggle_completion(store, id).await?;
            }
            (View::History, Command::Delete(Some(n))) => {
                let id = app.history().completed().get(n - 1).map(|g| g.id).ok_or(ActionError::NotFound)?;
                app.goals.delete(store, id, &mut confirm).await?;
            }

            (View::Routine, Command::Toggle(target)) => {
                let key = match target {
                    Target::Activity(key) => key,
                    Target::Index(n) => *daybook::core::routine::ActivityKey::ALL
                        .get(n - 1)
                        .ok_or(ActionError::NotFound)?,
                };
                app.routine.toggle_activity(store, key).await?;
            }

            (View::Planning, command) => Self::planning_command(app, store, &self.assist, command).await?,
            (view, _) => {
                println!("Not available in {}. Type `help` for commands.", view.label());
            }
        }
        Ok(())
    }

    async fn planning_command(
        app: &mut AppState,
        store: &SupabaseClient,
        assist: &GeminiAssist,
        command: Command,
    ) -> Result<(), ActionError> {
        let today = temporal::today();
        let planning = &mut app.planning;
        let item_id = |planning: &PlanningController, n: usize| {
            planning
                .open_plan()
                .and_then(|p| p.items.get(n - 1))
                .map(|i| i.id.clone())
                .ok_or(ActionError::NotFound)
        };

        match (planning.mode(), command) {
            (_, Command::Back) => planning.close(),
            (PlanningMode::List, Command::Draft) | (PlanningMode::Create, Command::Draft) => planning.start_draft(),
            (PlanningMode::List, Command::Open(n)) => {
                let id = planning.plans().get(n - 1).map(|p| p.id).ok_or(ActionError::NotFound)?;
                planning.open(id)?;
            }
            (PlanningMode::List, Command::Delete(Some(n))) => {
                let id = planning.plans().get(n - 1).map(|p| p.id).ok_or(ActionError::NotFound)?;
                planning.delete_plan(store, id, &mut confirm).await?;
            }

            (PlanningMode::Create, Command::DraftDate(date)) => planning.select_draft_date(date),
            (PlanningMode::Create, Command::Item(input)) => planning.add_draft_item(input)?,
            (PlanningMode::Create, Command::Remove(n)) => {
                let id = planning.draft_items().get(n - 1).map(|i| i.id.clone()).ok_or(ActionError::NotFound)?;
                planning.remove_draft_item(&id)?;
            }
            (PlanningMode::Create, Command::Assist(text)) => {
                if planning.draft_from_text(assist, &text).await == 0 {
                    println!("Could not turn that into a schedule.");
                }
            }
            (PlanningMode::Create, Command::Save) => match planning.save_draft(store, today).await {
                Ok(_) => {}
                Err(ActionError::Remote(e)) => Self::alert(&format!("Could not save the plan: {}", e)),
                Err(e) => return Err(e),
            },

            (PlanningMode::Detail(_), Command::Item(input)) => planning.save_item(store, &input, None).await?,
            (PlanningMode::Detail(_), Command::EditItem(n, input)) => {
                let id = item_id(&*planning, n)?;
                let input = match input {
                    Some(input) => input,
                    None => {
                        let current = planning.item_form(&id).ok_or(ActionError::NotFound)?;
                        item_form(current).ok_or(ActionError::Declined)?
                    }
                };
                planning.save_item(store, &input, Some(&id)).await?;
            }
            (PlanningMode::Detail(_), Command::Toggle(Target::Index(n))) => {
                let id = item_id(&*planning, n)?;
                planning.toggle_item(store, &id).await?;
            }
            (PlanningMode::Detail(_), Command::Remove(n)) => {
                let id = item_id(&*planning, n)?;
                planning.remove_item(store, &id, &mut confirm).await?;
            }
            (PlanningMode::Detail(id), Command::Delete(None)) => planning.delete_plan(store, id, &mut confirm).await?,

            _ => println!("Not available here. Type `help` for commands."),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rotated_tokens_are_written() {
        assert_eq!(rotated(None, Some("r1".into())), Some("r1".to_string()));
        assert_eq!(rotated(Some("r1"), Some("r1".into())), None);
        assert_eq!(rotated(Some("r1"), Some("r2".into())), Some("r2".to_string()));
        assert_eq!(rotated(Some("r1"), None), None);
    }

    #[test]
    fn undo_hint_needs_a_fresh_failure() {
        assert!(!is_new_failure(None, None));
        assert!(is_new_failure(None, Some((Section::Routine, 4))));
        // Another controller's older failure does not count.
        assert!(!is_new_failure(Some((Section::Goals, 3)), Some((Section::Goals, 3))));
        assert!(is_new_failure(Some((Section::Goals, 3)), Some((Section::Planning, 5))));
        // A failed retry is recorded again with a later stamp.
        assert!(is_new_failure(Some((Section::Goals, 3)), Some((Section::Goals, 6))));
        assert!(!is_new_failure(Some((Section::Goals, 3)), None));
    }
}
