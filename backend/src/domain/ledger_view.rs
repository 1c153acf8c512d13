//! Per-session ledger state.
//!
//! `LedgerView` is the explicit object holding the entries a session is
//! looking at. It is passed to whatever needs them; nothing is global.
//!
//! Fetches are numbered. Only the response of the most recently issued fetch
//! is applied; an older one that arrives late is discarded. A failed fetch
//! records the error and keeps the last good entries on screen.
//!
//! Refresh requests from outside (push notifications, other windows) are
//! coalesced into a single pending flag rather than queued.
use log::{debug, warn};
use std::sync::{Mutex, MutexGuard};

use crate::domain::error::LedgerResult;
use crate::domain::ledger_filter::{filter_entries, LedgerFilter};
use crate::domain::ledger_service::LedgerService;
use crate::domain::models::{LedgerEntry, PlanId};

/// Handle for one fetch, used to tell whether its response is still wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

impl FetchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { count: usize },
    /// A newer fetch was issued after this one; the response was dropped
    Stale,
    /// The fetch failed; previous entries are kept
    Failed(String),
}

#[derive(Debug, Default)]
struct ViewState {
    entries: Vec<LedgerEntry>,
    issued: u64,
    applied: u64,
    last_error: Option<String>,
    refresh_requested: bool,
}

#[derive(Debug)]
pub struct LedgerView {
    plan_id: PlanId,
    state: Mutex<ViewState>,
}

impl LedgerView {
    pub fn new(plan_id: PlanId) -> Self {
        Self {
            plan_id,
            state: Mutex::new(ViewState::default()),
        }
    }

    pub fn plan_id(&self) -> PlanId {
        self.plan_id
    }

    /// Start a fetch. Any fetch issued earlier becomes stale.
    pub fn begin_fetch(&self) -> FetchTicket {
        let mut state = self.lock();
        state.issued += 1;
        state.refresh_requested = false;
        FetchTicket {
            generation: state.issued,
        }
    }

    /// Apply the response of a fetch if it is still the latest one
    pub fn complete_fetch(
        &self,
        ticket: FetchTicket,
        result: LedgerResult<Vec<LedgerEntry>>,
    ) -> FetchOutcome {
        let mut state = self.lock();
        if ticket.generation != state.issued {
            debug!(
                "Dropping stale ledger fetch {} for plan {} (latest is {})",
                ticket.generation, self.plan_id, state.issued
            );
            return FetchOutcome::Stale;
        }

        match result {
            Ok(entries) => {
                let count = entries.len();
                state.entries = entries;
                state.applied = ticket.generation;
                state.last_error = None;
                FetchOutcome::Applied { count }
            }
            Err(err) => {
                let message = err.to_string();
                warn!("Ledger fetch for plan {} failed: {}", self.plan_id, message);
                state.last_error = Some(message.clone());
                FetchOutcome::Failed(message)
            }
        }
    }

    /// Fetch every entry of the plan from the service and apply it
    pub fn refresh(&self, service: &LedgerService) -> FetchOutcome {
        let ticket = self.begin_fetch();
        let result = service.list_entries(self.plan_id, None);
        self.complete_fetch(ticket, result)
    }

    /// Ask for a refresh. Returns `false` when one is already pending.
    pub fn request_refresh(&self) -> bool {
        let mut state = self.lock();
        if state.refresh_requested {
            return false;
        }
        state.refresh_requested = true;
        true
    }

    /// Run the pending refresh, if any
    pub fn refresh_if_requested(&self, service: &LedgerService) -> Option<FetchOutcome> {
        if !self.lock().refresh_requested {
            return None;
        }
        Some(self.refresh(service))
    }

    /// Replace an entry with the version the store confirmed after a write.
    /// New entries are inserted; the list stays most recent first.
    pub fn apply_confirmed(&self, entry: LedgerEntry) {
        if entry.plan_id != self.plan_id {
            return;
        }
        let mut state = self.lock();
        state.entries.retain(|e| e.id != entry.id);
        let position = state
            .entries
            .iter()
            .position(|e| e.timestamp < entry.timestamp)
            .unwrap_or(state.entries.len());
        state.entries.insert(position, entry);
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock().entries.clone()
    }

    pub fn query(&self, criteria: &LedgerFilter) -> Vec<LedgerEntry> {
        filter_entries(&self.lock().entries, criteria)
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Generation of the fetch whose entries are currently shown
    pub fn applied_generation(&self) -> u64 {
        self.lock().applied
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::LedgerError;
    use crate::domain::test_fixtures::entry;
    use crate::storage::memory::InMemoryLedgerStore;
    use anyhow::anyhow;
    use std::sync::Arc;

    #[test]
    fn test_stale_response_is_discarded() {
        let view = LedgerView::new(1);
        let first = view.begin_fetch();
        let second = view.begin_fetch();

        let newest = vec![entry("new").build()];
        assert_eq!(
            view.complete_fetch(second, Ok(newest.clone())),
            FetchOutcome::Applied { count: 1 }
        );
        // the slow first response lands afterwards and must not win
        assert_eq!(
            view.complete_fetch(first, Ok(vec![entry("old").build(), entry("older").build()])),
            FetchOutcome::Stale
        );
        assert_eq!(view.entries(), newest);
        assert_eq!(view.applied_generation(), second.generation());
    }

    #[test]
    fn test_failed_fetch_keeps_previous_entries() {
        let view = LedgerView::new(1);
        let ticket = view.begin_fetch();
        view.complete_fetch(ticket, Ok(vec![entry("e1").build()]));

        let ticket = view.begin_fetch();
        let outcome =
            view.complete_fetch(ticket, Err(LedgerError::Storage(anyhow!("connection reset"))));
        assert!(matches!(outcome, FetchOutcome::Failed(_)));
        assert_eq!(view.entries().len(), 1);
        assert!(view.last_error().unwrap().contains("connection reset"));

        let ticket = view.begin_fetch();
        view.complete_fetch(ticket, Ok(Vec::new()));
        assert_eq!(view.last_error(), None);
    }

    #[test]
    fn test_refresh_requests_are_coalesced() {
        let store = Arc::new(InMemoryLedgerStore::with_entries(vec![entry("e1").build()]));
        let service = LedgerService::new(store);
        let view = LedgerView::new(1);

        assert!(view.request_refresh());
        assert!(!view.request_refresh());
        assert!(!view.request_refresh());

        assert_eq!(
            view.refresh_if_requested(&service),
            Some(FetchOutcome::Applied { count: 1 })
        );
        assert_eq!(view.refresh_if_requested(&service), None);
        assert!(view.request_refresh());
    }

    #[test]
    fn test_apply_confirmed_keeps_recent_first() {
        let view = LedgerView::new(1);
        let ticket = view.begin_fetch();
        view.complete_fetch(
            ticket,
            Ok(vec![
                entry("march").at("2025-03-20T08:00:00-03:00").build(),
                entry("january").at("2025-01-05T08:00:00-03:00").build(),
            ]),
        );

        view.apply_confirmed(entry("february").at("2025-02-10T08:00:00-03:00").build());
        view.apply_confirmed(entry("march").at("2025-03-20T08:00:00-03:00").note("editada").build());
        view.apply_confirmed(entry("elsewhere").plan(9).build());

        let entries = view.entries();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["march", "february", "january"]);
        assert_eq!(entries[0].note, "editada");
    }

    #[test]
    fn test_query_filters_current_entries() {
        let view = LedgerView::new(1);
        let ticket = view.begin_fetch();
        view.complete_fetch(
            ticket,
            Ok(vec![entry("a").product("Alface").build(), entry("b").product("Beterraba").build()]),
        );
        let result = view.query(&LedgerFilter::new().with_product("beter"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "b");
    }
}
