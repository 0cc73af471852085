use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use uuid::Uuid;

use super::{ActionError, Confirm, Failure, resolve_owner};
use crate::core::plan::{self, ItemInput, NewPlan, Plan, ScheduleItem};
use crate::sync::gemini::Assist;
use crate::sync::store::{RemoteStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanningMode {
    #[default]
    List,
    Create,
    Detail(Uuid),
}

/// A plan change sent to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOp {
    ReplaceItems { plan_id: Uuid, items: Vec<ScheduleItem> },
    Delete { plan_id: Uuid },
}

impl PlanOp {
    fn plan_id(&self) -> Uuid {
        match self {
            Self::ReplaceItems { plan_id, .. } | Self::Delete { plan_id } => *plan_id,
        }
    }
}

#[derive(Debug)]
enum Rollback {
    Items,
    Restore { index: usize, plan: Plan, was_open: bool },
}

/// An optimistic plan change awaiting the store's answer.
#[derive(Debug)]
#[must_use]
pub struct PlanTicket {
    generation: u64,
    op: PlanOp,
    rollback: Rollback,
}

impl PlanTicket {
    pub fn op(&self) -> &PlanOp {
        &self.op
    }
}

/// Planning view: saved plans plus per-date drafts that have not been saved yet.
#[derive(Debug)]
pub struct PlanningController {
    plans: Vec<Plan>,
    /// Items as last acknowledged by the store, per plan.
    confirmed: HashMap<Uuid, Vec<ScheduleItem>>,
    mode: PlanningMode,
    drafts: BTreeMap<NaiveDate, Vec<ScheduleItem>>,
    draft_date: NaiveDate,
    pending: HashSet<Uuid>,
    failure: Option<Failure<PlanOp>>,
    generation: u64,
}

impl PlanningController {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            plans: Vec::new(),
            confirmed: HashMap::new(),
            mode: PlanningMode::List,
            drafts: BTreeMap::new(),
            draft_date: today,
            pending: HashSet::new(),
            failure: None,
            generation: 0,
        }
    }

    /// Plans by date, latest first.
    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn plan(&self, id: Uuid) -> Option<&Plan> {
        self.plans.iter().find(|p| p.id == id)
    }

    pub fn mode(&self) -> PlanningMode {
        self.mode
    }

    pub fn open_plan(&self) -> Option<&Plan> {
        match self.mode {
            PlanningMode::Detail(id) => self.plan(id),
            _ => None,
        }
    }

    pub fn is_pending(&self, plan_id: Uuid) -> bool {
        self.pending.contains(&plan_id)
    }

    pub fn failure(&self) -> Option<&Failure<PlanOp>> {
        self.failure.as_ref()
    }

    pub fn clear(&mut self, today: NaiveDate) {
        self.plans.clear();
        self.confirmed.clear();
        self.drafts.clear();
        self.draft_date = today;
        self.mode = PlanningMode::List;
        self.pending.clear();
        self.failure = None;
        self.generation += 1;
    }

    pub async fn refresh<S: RemoteStore>(&mut self, store: &S, owner: Uuid) -> Result<(), ActionError> {
        let plans = store.list_plans(owner).await?;
        log::info!("Loaded {} plans", plans.len());
        self.confirmed = plans.iter().map(|p| (p.id, p.items.clone())).collect();
        self.plans = plans;
        self.pending.clear();
        if let PlanningMode::Detail(id) = self.mode {
            if self.plan(id).is_none() {
                self.mode = PlanningMode::List;
            }
        }
        Ok(())
    }

    fn insert_sorted(&mut self, plan: Plan) {
        self.plans.insert(0, plan);
        self.plans.sort_by(|a, b| b.date.cmp(&a.date));
    }

    // --- Drafts ---

    pub fn start_draft(&mut self) {
        self.mode = PlanningMode::Create;
    }

    pub fn draft_date(&self) -> NaiveDate {
        self.draft_date
    }

    /// Switch the draft target date; drafts for other dates are kept.
    pub fn select_draft_date(&mut self, date: NaiveDate) {
        self.draft_date = date;
    }

    pub fn draft_items(&self) -> &[ScheduleItem] {
        self.drafts.get(&self.draft_date).map(Vec::as_slice).unwrap_or_default()
    }

    /// Dates with unsaved draft items.
    pub fn draft_dates(&self) -> Vec<NaiveDate> {
        self.drafts
            .iter()
            .filter(|(_, items)| !items.is_empty())
            .map(|(date, _)| *date)
            .collect()
    }

    pub fn add_draft_item(&mut self, input: ItemInput) -> Result<(), ActionError> {
        if !input.is_complete() {
            return Err(ActionError::Invalid("start time and activity are required"));
        }
        let items = self.drafts.entry(self.draft_date).or_default();
        items.push(ScheduleItem::new(input.time(), input.label.trim()));
        plan::sort_items(items);
        Ok(())
    }

    pub fn remove_draft_item(&mut self, id: &str) -> Result<(), ActionError> {
        let items = self.drafts.get_mut(&self.draft_date).ok_or(ActionError::NotFound)?;
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() == before {
            return Err(ActionError::NotFound);
        }
        Ok(())
    }

    /// Append the assist's schedule for `text` to the current draft. Returns the
    /// number of items added; zero when the assist had nothing.
    pub async fn draft_from_text<A: Assist>(&mut self, assist: &A, text: &str) -> usize {
        let Some(slots) = assist.suggest_schedule(text).await else {
            log::info!("No schedule suggestion for input");
            return 0;
        };
        let items = self.drafts.entry(self.draft_date).or_default();
        let added = slots.len();
        items.extend(slots.into_iter().map(|s| ScheduleItem::new(plan::normalize_time(&s.time), s.task.trim())));
        plan::sort_items(items);
        added
    }

    /// Save the current draft as a plan. An empty draft is rejected before any
    /// store call; the draft is only discarded once the store confirms.
    pub async fn save_draft<S: RemoteStore>(&mut self, store: &S, today: NaiveDate) -> Result<Uuid, ActionError> {
        let date = self.draft_date;
        let items = self.draft_items().to_vec();
        if items.is_empty() {
            return Err(ActionError::Invalid("add at least one activity before saving the day"));
        }
        let owner = resolve_owner(store).await?;
        let generation = self.generation;

        let created = store
            .insert_plan(&NewPlan::daily(owner, date, items))
            .await
            .map_err(|e| {
                log::error!("Failed to save plan for {}: {}", date, e);
                e
            })?;
        let id = created.id;
        log::info!("Saved plan {} for {}", id, date);

        if generation == self.generation {
            self.confirmed.insert(id, created.items.clone());
            self.insert_sorted(created);
            self.drafts.remove(&date);
            self.draft_date = today;
            self.mode = PlanningMode::List;
        }
        Ok(id)
    }

    // --- Saved plans ---

    pub fn open(&mut self, id: Uuid) -> Result<(), ActionError> {
        self.plan(id).ok_or(ActionError::NotFound)?;
        self.mode = PlanningMode::Detail(id);
        Ok(())
    }

    pub fn close(&mut self) {
        self.mode = PlanningMode::List;
    }

    /// Edit form pre-filled from an item of the open plan.
    pub fn item_form(&self, item_id: &str) -> Option<ItemInput> {
        self.open_plan()?.item(item_id).map(ItemInput::from_item)
    }

    fn open_id(&self) -> Result<Uuid, ActionError> {
        match self.mode {
            PlanningMode::Detail(id) => Ok(id),
            _ => Err(ActionError::NotFound),
        }
    }

    fn begin_items(&mut self, plan_id: Uuid, items: Vec<ScheduleItem>) -> Result<PlanTicket, ActionError> {
        let plan = self.plans.iter_mut().find(|p| p.id == plan_id).ok_or(ActionError::NotFound)?;
        plan.items = items.clone();
        self.pending.insert(plan_id);
        Ok(PlanTicket {
            generation: self.generation,
            op: PlanOp::ReplaceItems { plan_id, items },
            rollback: Rollback::Items,
        })
    }

    /// Add (`editing == None`) or edit an item of the open plan.
    pub fn begin_save_item(&mut self, input: &ItemInput, editing: Option<&str>) -> Result<PlanTicket, ActionError> {
        let plan_id = self.open_id()?;
        if !input.is_complete() {
            return Err(ActionError::Invalid("start time and activity are required"));
        }
        let current = &self.plan(plan_id).ok_or(ActionError::NotFound)?.items;
        let items = plan::with_saved_item(current, input, editing).ok_or(ActionError::NotFound)?;
        self.begin_items(plan_id, items)
    }

    pub fn begin_remove_item(&mut self, item_id: &str) -> Result<PlanTicket, ActionError> {
        let plan_id = self.open_id()?;
        let plan = self.plan(plan_id).ok_or(ActionError::NotFound)?;
        plan.item(item_id).ok_or(ActionError::NotFound)?;
        let items = plan::without_item(&plan.items, item_id);
        self.begin_items(plan_id, items)
    }

    pub fn begin_toggle_item(&mut self, item_id: &str) -> Result<PlanTicket, ActionError> {
        let plan_id = self.open_id()?;
        let plan = self.plan(plan_id).ok_or(ActionError::NotFound)?;
        plan.item(item_id).ok_or(ActionError::NotFound)?;
        let items = plan::with_toggled_item(&plan.items, item_id);
        self.begin_items(plan_id, items)
    }

    pub fn begin_delete_plan(&mut self, plan_id: Uuid) -> Result<PlanTicket, ActionError> {
        let index = self.plans.iter().position(|p| p.id == plan_id).ok_or(ActionError::NotFound)?;
        let plan = self.plans.remove(index);
        let was_open = self.mode == PlanningMode::Detail(plan_id);
        if was_open {
            self.mode = PlanningMode::List;
        }
        self.pending.insert(plan_id);
        Ok(PlanTicket {
            generation: self.generation,
            op: PlanOp::Delete { plan_id },
            rollback: Rollback::Restore { index, plan, was_open },
        })
    }

    /// Commit or roll back a change. Tickets from before the last `clear` are dropped.
    pub fn settle(&mut self, ticket: PlanTicket, result: Result<(), StoreError>) -> Result<(), ActionError> {
        if ticket.generation != self.generation {
            log::debug!("Dropping stale plan result for {}", ticket.op.plan_id());
            return Ok(());
        }
        let plan_id = ticket.op.plan_id();
        self.pending.remove(&plan_id);

        let err = match result {
            Ok(()) => {
                match &ticket.op {
                    PlanOp::ReplaceItems { items, .. } => {
                        self.confirmed.insert(plan_id, items.clone());
                    }
                    PlanOp::Delete { .. } => {
                        self.confirmed.remove(&plan_id);
                    }
                }
                if self.failure.as_ref().is_some_and(|f| f.op.plan_id() == plan_id) {
                    self.failure = None;
                }
                return Ok(());
            }
            Err(e) => e,
        };

        log::error!("Plan change for {} failed: {}", plan_id, err);
        match ticket.rollback {
            Rollback::Items => {
                let confirmed = self.confirmed.get(&plan_id).cloned();
                if let (Some(plan), Some(items)) = (self.plans.iter_mut().find(|p| p.id == plan_id), confirmed) {
                    plan.items = items;
                }
            }
            Rollback::Restore { index, plan, was_open } => {
                let index = index.min(self.plans.len());
                self.plans.insert(index, plan);
                if was_open {
                    self.mode = PlanningMode::Detail(plan_id);
                }
            }
        }
        self.failure = Some(Failure::new(ticket.op, err.to_string()));
        Err(ActionError::Remote(err))
    }

    async fn send<S: RemoteStore>(store: &S, op: &PlanOp) -> Result<(), StoreError> {
        match op {
            PlanOp::ReplaceItems { plan_id, items } => store.replace_plan_items(*plan_id, items).await,
            PlanOp::Delete { plan_id } => store.delete_plan(*plan_id).await,
        }
    }

    async fn run<S: RemoteStore>(&mut self, store: &S, ticket: PlanTicket) -> Result<(), ActionError> {
        let result = Self::send(store, &ticket.op).await;
        self.settle(ticket, result)
    }

    pub async fn save_item<S: RemoteStore>(
        &mut self,
        store: &S,
        input: &ItemInput,
        editing: Option<&str>,
    ) -> Result<(), ActionError> {
        let ticket = self.begin_save_item(input, editing)?;
        self.run(store, ticket).await
    }

    pub async fn remove_item<S: RemoteStore, C: Confirm>(
        &mut self,
        store: &S,
        item_id: &str,
        confirm: &mut C,
    ) -> Result<(), ActionError> {
        let task = &self
            .open_plan()
            .and_then(|p| p.item(item_id))
            .ok_or(ActionError::NotFound)?
            .task;
        if !confirm.confirm(&format!("Remove \"{}\" from this day?", task)) {
            return Err(ActionError::Declined);
        }
        let ticket = self.begin_remove_item(item_id)?;
        self.run(store, ticket).await
    }

    pub async fn toggle_item<S: RemoteStore>(&mut self, store: &S, item_id: &str) -> Result<(), ActionError> {
        let ticket = self.begin_toggle_item(item_id)?;
        self.run(store, ticket).await
    }

    pub async fn delete_plan<S: RemoteStore, C: Confirm>(
        &mut self,
        store: &S,
        plan_id: Uuid,
        confirm: &mut C,
    ) -> Result<(), ActionError> {
        let label = &self.plan(plan_id).ok_or(ActionError::NotFound)?.day_label;
        if !confirm.confirm(&format!("Delete the plan for {}?", label)) {
            return Err(ActionError::Declined);
        }
        let ticket = self.begin_delete_plan(plan_id)?;
        self.run(store, ticket).await
    }

    /// Re-send the last failed change.
    pub async fn retry<S: RemoteStore>(&mut self, store: &S) -> Result<(), ActionError> {
        let Some(failure) = self.failure.take() else {
            return Err(ActionError::Invalid("nothing to retry"));
        };
        log::info!("Retrying change for plan {}", failure.op.plan_id());
        let ticket = match failure.op {
            PlanOp::ReplaceItems { plan_id, items } => self.begin_items(plan_id, items)?,
            PlanOp::Delete { plan_id } => self.begin_delete_plan(plan_id)?,
        };
        self.run(store, ticket).await
    }
}
