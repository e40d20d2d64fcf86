//! # Correlation Index
//!
//! Maps inbound webhook events back to the owning `(campaign, client)`.
//! Entries are created at dispatch time keyed by normalized phone (the
//! handle may not be known yet), upgraded once the vendor supplies a call
//! handle, and removed on terminal processing or by the periodic
//! inactivity sweep.
//!
//! Resolution order: exact handle, exact phone, last-10-digit suffix.
//! Events that resolve to nothing are orphans; callers log and drop them.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::engine::states::CallState;
use crate::provider::{phone_suffix, CallHandle};

#[derive(Debug)]
pub struct CorrelationEntry {
    pub campaign_id: String,
    pub client_index: usize,
    /// Normalized E.164 destination
    pub phone: String,
    pub handle: Option<CallHandle>,
    pub state: CallState,
    pub dispatched_at: DateTime<Utc>,
}

/// Shared, lock-guarded entry. Locks are held only for field access, never
/// across awaits.
pub type SharedEntry = Arc<Mutex<CorrelationEntry>>;

#[derive(Default)]
pub struct CorrelationIndex {
    by_phone: DashMap<String, SharedEntry>,
    by_suffix: DashMap<String, SharedEntry>,
    by_handle: DashMap<String, SharedEntry>,
}

impl CorrelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new in-flight call at dispatch time. The handle is
    /// usually not known yet; [`assign_handle`](Self::assign_handle)
    /// upgrades the entry once it is.
    pub fn bind(&self, campaign_id: &str, client_index: usize, phone: &str) -> SharedEntry {
        let entry: SharedEntry = Arc::new(Mutex::new(CorrelationEntry {
            campaign_id: campaign_id.to_string(),
            client_index,
            phone: phone.to_string(),
            handle: None,
            state: CallState::Dispatched,
            dispatched_at: Utc::now(),
        }));
        self.by_phone.insert(phone.to_string(), entry.clone());
        self.by_suffix.insert(phone_suffix(phone), entry.clone());
        entry
    }

    /// Attach the vendor-assigned handle to an entry. Reassignment drops
    /// the previous handle key so released entries never stay resolvable.
    pub fn assign_handle(&self, entry: &SharedEntry, handle: &str) {
        let previous = {
            let mut guard = entry.lock();
            if guard.handle.as_deref() == Some(handle) {
                return;
            }
            guard.handle.replace(handle.to_string())
        };
        if let Some(old) = previous {
            self.by_handle.remove(&old);
        }
        self.by_handle.insert(handle.to_string(), entry.clone());
    }

    /// Resolve an event to its owning entry: handle, then phone, then
    /// phone suffix.
    ///
    /// The phone fallback only matches entries that have not learned their
    /// handle yet (or whose handle equals the event's). An event carrying a
    /// handle that mismatches the entry's is a stale duplicate of an
    /// earlier attempt to the same number and must not touch the live call.
    pub fn resolve(&self, handle: Option<&str>, phone_hint: Option<&str>) -> Option<SharedEntry> {
        if let Some(h) = handle {
            if let Some(entry) = self.by_handle.get(h) {
                return Some(entry.clone());
            }
        }

        let phone = phone_hint?;
        let entry = match self.by_phone.get(phone) {
            Some(entry) => entry.clone(),
            None => {
                let suffix = phone_suffix(phone);
                if suffix.is_empty() {
                    return None;
                }
                self.by_suffix.get(&suffix)?.clone()
            }
        };

        if let Some(h) = handle {
            let guard = entry.lock();
            if let Some(stored) = guard.handle.as_deref() {
                if stored != h {
                    return None;
                }
            }
        }
        Some(entry)
    }

    /// Drop an entry from every index
    pub fn release(&self, entry: &SharedEntry) {
        let (phone, handle) = {
            let guard = entry.lock();
            (guard.phone.clone(), guard.handle.clone())
        };
        self.by_phone.remove(&phone);
        self.by_suffix.remove(&phone_suffix(&phone));
        if let Some(h) = handle {
            self.by_handle.remove(&h);
        }
    }

    /// Evict entries older than `max_age`, returning the ones that never
    /// reached a terminal state so the caller can record them as timed out.
    pub fn sweep(&self, max_age: Duration) -> Vec<SharedEntry> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::zero());
        let stale: Vec<SharedEntry> = self
            .by_phone
            .iter()
            .filter(|item| item.value().lock().dispatched_at < cutoff)
            .map(|item| item.value().clone())
            .collect();

        let mut unresolved = Vec::new();
        for entry in stale {
            let terminal = entry.lock().state.is_terminal();
            self.release(&entry);
            if terminal {
                debug!("swept terminal correlation entry");
            } else {
                unresolved.push(entry);
            }
        }
        unresolved
    }

    /// Number of in-flight entries
    pub fn len(&self) -> usize {
        self.by_phone.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_phone.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_phone_before_handle_is_known() {
        let index = CorrelationIndex::new();
        index.bind("camp-1", 0, "+525512345678");
        let entry = index.resolve(None, Some("+525512345678")).unwrap();
        assert_eq!(entry.lock().client_index, 0);
    }

    #[test]
    fn handle_upgrade_enables_handle_resolution() {
        let index = CorrelationIndex::new();
        let entry = index.bind("camp-1", 3, "+525512345678");
        index.assign_handle(&entry, "CA42");
        let resolved = index.resolve(Some("CA42"), None).unwrap();
        assert_eq!(resolved.lock().client_index, 3);
    }

    #[test]
    fn suffix_match_tolerates_vendor_reformatting() {
        let index = CorrelationIndex::new();
        index.bind("camp-1", 1, "+525512345678");
        // Vendor reports the number without the country prefix
        let resolved = index.resolve(None, Some("5512345678")).unwrap();
        assert_eq!(resolved.lock().client_index, 1);
    }

    #[test]
    fn national_and_e164_hints_resolve_to_same_entry() {
        let index = CorrelationIndex::new();
        let bound = index.bind("camp-1", 2, "+525512345678");
        let via_e164 = index.resolve(None, Some("+525512345678")).unwrap();
        let via_national = index.resolve(None, Some("5512345678")).unwrap();
        assert!(Arc::ptr_eq(&bound, &via_e164));
        assert!(Arc::ptr_eq(&bound, &via_national));
    }

    #[test]
    fn handle_reassignment_drops_the_previous_key() {
        let index = CorrelationIndex::new();
        let entry = index.bind("camp-1", 0, "+525512345678");
        index.assign_handle(&entry, "CA1");
        index.assign_handle(&entry, "CA2");

        assert!(index.resolve(Some("CA1"), None).is_none());
        assert!(index.resolve(Some("CA2"), None).is_some());

        index.release(&entry);
        // The first handle must not keep the released entry resolvable
        assert!(index.resolve(Some("CA1"), None).is_none());
        assert!(index.resolve(Some("CA2"), None).is_none());
    }

    #[test]
    fn mismatched_handle_blocks_the_phone_fallback() {
        let index = CorrelationIndex::new();
        let entry = index.bind("camp-1", 0, "+525512345678");
        index.assign_handle(&entry, "CA-live");

        // A duplicate of an earlier attempt carries its old leg id plus
        // the same destination; it must not resolve to the live call.
        assert!(index
            .resolve(Some("CA-old"), Some("+525512345678"))
            .is_none());
        assert!(index.resolve(Some("CA-old"), Some("5512345678")).is_none());

        // Handle-less hints and the matching handle still resolve
        assert!(index.resolve(None, Some("+525512345678")).is_some());
        assert!(index
            .resolve(Some("CA-live"), Some("+525512345678"))
            .is_some());
    }

    #[test]
    fn phone_fallback_applies_while_the_handle_is_unknown() {
        let index = CorrelationIndex::new();
        index.bind("camp-1", 0, "+525512345678");
        // Webhook races the dispatch response: the entry has no handle yet
        let resolved = index.resolve(Some("CA-new"), Some("5512345678")).unwrap();
        assert_eq!(resolved.lock().client_index, 0);
    }

    #[test]
    fn release_removes_all_keys() {
        let index = CorrelationIndex::new();
        let entry = index.bind("camp-1", 0, "+525512345678");
        index.assign_handle(&entry, "CA42");
        index.release(&entry);
        assert!(index.resolve(Some("CA42"), Some("+525512345678")).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn unknown_event_is_orphan() {
        let index = CorrelationIndex::new();
        index.bind("camp-1", 0, "+525512345678");
        assert!(index.resolve(Some("CA99"), Some("+15550001111")).is_none());
    }

    #[test]
    fn sweep_evicts_only_stale_entries_and_reports_unresolved() {
        let index = CorrelationIndex::new();
        let stale = index.bind("camp-1", 0, "+525512345678");
        stale.lock().dispatched_at = Utc::now() - chrono::Duration::minutes(30);
        let fresh = index.bind("camp-1", 1, "+525587654321");

        let unresolved = index.sweep(Duration::from_secs(600));
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].lock().client_index, 0);
        assert!(index.resolve(None, Some("+525587654321")).is_some());
        drop(fresh);
    }

    #[test]
    fn sweep_skips_terminal_entries() {
        let index = CorrelationIndex::new();
        let entry = index.bind("camp-1", 0, "+525512345678");
        {
            let mut guard = entry.lock();
            guard.dispatched_at = Utc::now() - chrono::Duration::minutes(30);
            guard.state = CallState::Terminal;
        }
        let unresolved = index.sweep(Duration::from_secs(600));
        assert!(unresolved.is_empty());
        assert!(index.is_empty());
    }
}
