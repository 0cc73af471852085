use chrono::NaiveDate;
use uuid::Uuid;

use super::{ActionError, Failure};
use crate::core::routine::{Activities, ActivityKey, NewRoutineEntry, RoutineEntry};
use crate::sync::store::{RemoteStore, StoreError};

/// An optimistic checklist change awaiting the store's answer.
#[derive(Debug)]
#[must_use]
pub struct RoutineTicket {
    generation: u64,
    entry_id: Uuid,
    activities: Activities,
}

/// Today's routine checklist.
#[derive(Debug, Default)]
pub struct RoutineController {
    entry: Option<RoutineEntry>,
    /// Flags as last acknowledged by the store.
    confirmed: Activities,
    pending: bool,
    failure: Option<Failure<Activities>>,
    generation: u64,
}

impl RoutineController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self) -> Option<&RoutineEntry> {
        self.entry.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn failure(&self) -> Option<&Failure<Activities>> {
        self.failure.as_ref()
    }

    /// No entry loaded, or the loaded one belongs to another day.
    pub fn is_stale(&self, today: NaiveDate) -> bool {
        self.entry.as_ref().is_none_or(|e| e.date != today)
    }

    pub fn clear(&mut self) {
        self.entry = None;
        self.confirmed = Activities::default();
        self.pending = false;
        self.failure = None;
        self.generation += 1;
    }

    /// Load today's entry, creating a blank one when the day has none yet.
    pub async fn fetch_or_create_today<S: RemoteStore>(
        &mut self,
        store: &S,
        owner: Uuid,
        today: NaiveDate,
    ) -> Result<(), ActionError> {
        let generation = self.generation;
        let entry = match store.routine_for(owner, today).await {
            Ok(entry) => entry,
            Err(StoreError::NoRows) => {
                log::info!("No routine for {}, creating one", today);
                store.insert_routine(&NewRoutineEntry::blank(owner, today)).await?
            }
            Err(e) => return Err(e.into()),
        };
        if generation != self.generation {
            log::debug!("Dropping routine loaded for a previous session");
            return Ok(());
        }
        self.confirmed = entry.activities;
        self.entry = Some(entry);
        self.pending = false;
        self.failure = None;
        Ok(())
    }

    fn begin(&mut self, activities: Activities) -> Result<RoutineTicket, ActionError> {
        let entry = self.entry.as_mut().ok_or(ActionError::NotFound)?;
        entry.activities = activities;
        self.pending = true;
        Ok(RoutineTicket {
            generation: self.generation,
            entry_id: entry.id,
            activities,
        })
    }

    pub fn begin_toggle(&mut self, key: ActivityKey) -> Result<RoutineTicket, ActionError> {
        let current = self.entry.as_ref().ok_or(ActionError::NotFound)?.activities;
        self.begin(current.toggled(key))
    }

    pub fn settle(&mut self, ticket: RoutineTicket, result: Result<(), StoreError>) -> Result<(), ActionError> {
        if ticket.generation != self.generation || self.entry.as_ref().is_none_or(|e| e.id != ticket.entry_id) {
            log::debug!("Dropping stale routine result for {}", ticket.entry_id);
            return Ok(());
        }
        self.pending = false;
        match result {
            Ok(()) => {
                self.confirmed = ticket.activities;
                self.failure = None;
                Ok(())
            }
            Err(e) => {
                log::error!("Routine update failed: {}", e);
                if let Some(entry) = self.entry.as_mut() {
                    entry.activities = self.confirmed;
                }
                self.failure = Some(Failure::new(ticket.activities, e.to_string()));
                Err(ActionError::Remote(e))
            }
        }
    }

    async fn run<S: RemoteStore>(&mut self, store: &S, ticket: RoutineTicket) -> Result<(), ActionError> {
        let result = store.update_routine_activities(ticket.entry_id, &ticket.activities).await;
        self.settle(ticket, result)
    }

    pub async fn toggle_activity<S: RemoteStore>(&mut self, store: &S, key: ActivityKey) -> Result<(), ActionError> {
        let ticket = self.begin_toggle(key)?;
        self.run(store, ticket).await
    }

    /// Re-send the checklist that failed last.
    pub async fn retry<S: RemoteStore>(&mut self, store: &S) -> Result<(), ActionError> {
        let Some(failure) = self.failure.take() else {
            return Err(ActionError::Invalid("nothing to retry"));
        };
        let ticket = self.begin(failure.op)?;
        self.run(store, ticket).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{Identity, MemoryStore};
    use pretty_assertions::assert_eq;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn me() -> Identity {
        Identity {
            id: Uuid::from_u128(21),
            email: None,
        }
    }

    async fn loaded(store: &MemoryStore) -> RoutineController {
        let mut routine = RoutineController::new();
        routine.fetch_or_create_today(store, me().id, today()).await.unwrap();
        routine
    }

    #[tokio::test]
    async fn first_visit_creates_blank_entry() {
        let store = MemoryStore::signed_in(me());
        let routine = loaded(&store).await;
        let entry = routine.entry().unwrap();
        assert_eq!(entry.date, today());
        assert_eq!(entry.completed_count(), 0);
        assert_eq!(store.routine_entries().await.len(), 1);

        // A second load reuses the row.
        let again = loaded(&store).await;
        assert_eq!(again.entry().map(|e| e.id), Some(entry.id));
        assert_eq!(store.routine_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn existing_entry_is_loaded() {
        let store = MemoryStore::signed_in(me());
        let mut activities = Activities::default();
        activities.prayer = true;
        store
            .seed_routine(RoutineEntry {
                id: Uuid::new_v4(),
                owner_id: me().id,
                date: today(),
                activities,
            })
            .await;
        let routine = loaded(&store).await;
        assert!(routine.entry().unwrap().activities.prayer);
        assert!(!routine.is_stale(today()));
    }

    #[tokio::test]
    async fn toggling_all_five_completes_the_day() {
        let store = MemoryStore::signed_in(me());
        let mut routine = loaded(&store).await;
        for key in ActivityKey::ALL {
            routine.toggle_activity(&store, key).await.unwrap();
        }
        let entry = routine.entry().unwrap();
        assert!(entry.is_all_done());
        assert_eq!(entry.progress(), 1.0);
        assert_eq!(store.routine_entries().await[0].activities, entry.activities);

        routine.toggle_activity(&store, ActivityKey::Workout).await.unwrap();
        assert_eq!(routine.entry().unwrap().completed_count(), 4);
    }

    #[tokio::test]
    async fn failed_toggle_reverts_and_retries() {
        let store = MemoryStore::signed_in(me());
        let mut routine = loaded(&store).await;
        routine.toggle_activity(&store, ActivityKey::Prayer).await.unwrap();

        store.fail_writes(true).await;
        let ticket = routine.begin_toggle(ActivityKey::Reading).unwrap();
        assert!(routine.entry().unwrap().activities.reading);
        assert!(routine.is_pending());
        let result = store.update_routine_activities(ticket.entry_id, &ticket.activities).await;
        assert!(routine.settle(ticket, result).is_err());

        let activities = routine.entry().unwrap().activities;
        assert!(activities.prayer);
        assert!(!activities.reading);
        assert!(routine.failure().is_some_and(|f| f.op.reading));

        store.fail_writes(false).await;
        routine.retry(&store).await.unwrap();
        assert!(routine.entry().unwrap().activities.reading);
        assert!(store.routine_entries().await[0].activities.reading);
        assert!(routine.failure().is_none());
    }

    #[tokio::test]
    async fn result_after_clear_is_ignored() {
        let store = MemoryStore::signed_in(me());
        let mut routine = loaded(&store).await;
        let ticket = routine.begin_toggle(ActivityKey::Planning).unwrap();
        routine.clear();
        assert!(routine.settle(ticket, Err(StoreError::SignedOut)).is_ok());
        assert!(routine.entry().is_none());
        assert!(routine.failure().is_none());
    }

    #[test]
    fn empty_controller_is_stale() {
        let mut routine = RoutineController::new();
        assert!(routine.is_stale(today()));
        assert!(matches!(routine.begin_toggle(ActivityKey::Prayer), Err(ActionError::NotFound)));
    }
}
