//! Per-account posting queue.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{IngestItem, ScheduledItem, human_duration};
use crate::StoreError;

/// Filters for listing items.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListFilter {
    pub selected: Option<bool>,
    pub posted: Option<bool>,
}

/// Result of accepting an item into the queue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptReceipt {
    pub item: ScheduledItem,
    /// Human-readable time until the computed fire time, e.g. "3h 24m".
    pub scheduled_in: String,
}

/// In-memory item store, partitioned by account.
///
/// All mutations for one account happen under a single write lock, so
/// concurrent accept/deselect calls can never interleave into duplicate
/// queue positions. Every renumbering mutation is verified before it
/// becomes visible; a failed check rolls the whole account partition
/// back.
#[derive(Clone)]
pub struct ItemStore {
    accounts: Arc<RwLock<HashMap<String, Vec<ScheduledItem>>>>,
}

impl Default for ItemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemStore {
    pub fn new() -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bulk-import raw content for an account.
    ///
    /// Items arrive unselected and unqueued; ids are generated when the
    /// caller did not supply one.
    pub async fn ingest(&self, account: &str, raw: Vec<IngestItem>) -> Vec<ScheduledItem> {
        let mut accounts = self.accounts.write().await;
        let items = accounts.entry(account.to_string()).or_default();

        let mut created = Vec::with_capacity(raw.len());
        for entry in raw {
            let item = ScheduledItem {
                id: entry.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                account: account.to_string(),
                payload: entry.payload,
                is_posted: entry.is_posted,
                is_selected: false,
                queue_position: None,
                scheduled_for: None,
                posted_at: None,
                post_type: None,
            };
            items.push(item.clone());
            created.push(item);
        }

        info!(account, count = created.len(), "ingested items");
        created
    }

    /// List an account's items, optionally filtered.
    pub async fn list(&self, account: &str, filter: ListFilter) -> Vec<ScheduledItem> {
        let accounts = self.accounts.read().await;
        accounts
            .get(account)
            .map(|items| {
                items
                    .iter()
                    .filter(|i| filter.selected.is_none_or(|s| i.is_selected == s))
                    .filter(|i| filter.posted.is_none_or(|p| i.is_posted == p))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get one item by id.
    pub async fn get(&self, account: &str, item_id: &str) -> Result<ScheduledItem, StoreError> {
        let accounts = self.accounts.read().await;
        accounts
            .get(account)
            .and_then(|items| items.iter().find(|i| i.id == item_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{account}/{item_id}")))
    }

    /// Accept an item: enqueue it at the tail of the account's queue.
    ///
    /// The new fire time chains from the current tail's `scheduled_for`
    /// (or from `now` when the queue is empty) via the caller-supplied
    /// derivation function, so pacing stays even across the whole queue.
    /// Accepting an already-queued item is a no-op.
    pub async fn accept<F>(
        &self,
        account: &str,
        item_id: &str,
        post_type: Option<String>,
        now: DateTime<Utc>,
        next_fire: F,
    ) -> Result<AcceptReceipt, StoreError>
    where
        F: FnOnce(DateTime<Utc>) -> DateTime<Utc>,
    {
        let mut accounts = self.accounts.write().await;
        let items = accounts
            .get_mut(account)
            .ok_or_else(|| StoreError::NotFound(format!("account {account}")))?;

        let mut working = items.clone();
        let idx = working
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| StoreError::NotFound(format!("{account}/{item_id}")))?;

        if working[idx].is_posted {
            return Err(StoreError::AlreadyPosted(item_id.to_string()));
        }
        if working[idx].is_queued() {
            let item = working[idx].clone();
            let scheduled_in = item
                .scheduled_for
                .map(|t| human_duration(t - now))
                .unwrap_or_default();
            return Ok(AcceptReceipt { item, scheduled_in });
        }

        let last_pos = working
            .iter()
            .filter(|i| i.is_queued())
            .filter_map(|i| i.queue_position)
            .max();

        let base = match last_pos {
            Some(pos) => working
                .iter()
                .find(|i| i.is_queued() && i.queue_position == Some(pos))
                .and_then(|i| i.scheduled_for)
                .unwrap_or(now),
            None => now,
        };

        let fire = next_fire(base);
        let new_pos = last_pos.map_or(1, |p| p + 1);

        {
            let item = &mut working[idx];
            item.is_selected = true;
            item.queue_position = Some(new_pos);
            item.scheduled_for = Some(fire);
            item.post_type = post_type;
        }

        verify_queue_positions(account, &working)?;
        let item = working[idx].clone();
        *items = working;

        debug!(account, item_id, position = new_pos, fire = %fire, "accepted item");
        Ok(AcceptReceipt {
            scheduled_in: human_duration(fire - now),
            item,
        })
    }

    /// Reject an item: delete it outright.
    ///
    /// Does not rebalance the queue; rejecting a queued item leaves a gap
    /// until the next deselect pass (observed upstream behavior, kept
    /// as-is).
    pub async fn reject(&self, account: &str, item_id: &str) -> Result<ScheduledItem, StoreError> {
        let mut accounts = self.accounts.write().await;
        let items = accounts
            .get_mut(account)
            .ok_or_else(|| StoreError::NotFound(format!("account {account}")))?;

        let idx = items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| StoreError::NotFound(format!("{account}/{item_id}")))?;

        let removed = items.remove(idx);
        info!(account, item_id, "rejected item");
        Ok(removed)
    }

    /// Deselect a batch of items and rebalance the queue.
    ///
    /// Remaining queued items at or above the lowest removed position are
    /// renumbered consecutively and their fire times re-chained from the
    /// immediately preceding item (or from `now` when the head was
    /// removed). Calling again with the same ids is a no-op. Returns the
    /// number of items actually deselected.
    pub async fn deselect<F>(
        &self,
        account: &str,
        item_ids: &[String],
        now: DateTime<Utc>,
        mut next_fire: F,
    ) -> Result<usize, StoreError>
    where
        F: FnMut(DateTime<Utc>) -> DateTime<Utc>,
    {
        let mut accounts = self.accounts.write().await;
        let Some(items) = accounts.get_mut(account) else {
            return Ok(0);
        };

        let mut working = items.clone();

        // Clear the removed set, remembering pre-removal positions.
        let mut removed_positions: Vec<u32> = Vec::new();
        for item in working.iter_mut() {
            if !item_ids.iter().any(|id| *id == item.id) || !item.is_queued() {
                continue;
            }
            if let Some(pos) = item.queue_position {
                removed_positions.push(pos);
            }
            item.is_selected = false;
            item.queue_position = None;
            item.scheduled_for = None;
        }

        let Some(&min_removed) = removed_positions.iter().min() else {
            // Nothing matched the selected filter; repeated call is a no-op.
            return Ok(0);
        };

        // Re-chain from the item just before the hole, or from now when the
        // head itself was removed.
        let mut base = if min_removed == 1 {
            now
        } else {
            working
                .iter()
                .find(|i| i.is_queued() && i.queue_position == Some(min_removed - 1))
                .and_then(|i| i.scheduled_for)
                .unwrap_or(now)
        };

        let mut survivors: Vec<usize> = working
            .iter()
            .enumerate()
            .filter(|(_, i)| i.is_queued() && i.queue_position.is_some_and(|p| p >= min_removed))
            .map(|(idx, _)| idx)
            .collect();
        survivors.sort_by_key(|&idx| working[idx].queue_position);

        let mut pos = min_removed;
        for idx in survivors {
            let fire = next_fire(base);
            let item = &mut working[idx];
            item.queue_position = Some(pos);
            item.scheduled_for = Some(fire);
            base = fire;
            pos += 1;
        }

        verify_queue_positions(account, &working)?;
        *items = working;

        info!(account, count = removed_positions.len(), "deselected items, queue rebalanced");
        Ok(removed_positions.len())
    }

    /// Return the next due item for an account, if any.
    ///
    /// Selection is strict FIFO by queue position: among items whose
    /// `scheduled_for` has passed, the lowest position wins, regardless of
    /// the relative order of the fire times themselves.
    pub async fn poll_due(&self, account: &str, now: DateTime<Utc>) -> Option<ScheduledItem> {
        let accounts = self.accounts.read().await;
        accounts
            .get(account)?
            .iter()
            .filter(|i| i.is_queued() && i.scheduled_for.is_some_and(|t| t <= now))
            .min_by_key(|i| i.queue_position)
            .cloned()
    }

    /// Mark an item posted. Terminal: repeated calls keep the original
    /// `posted_at`.
    pub async fn mark_posted(
        &self,
        account: &str,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ScheduledItem, StoreError> {
        let mut accounts = self.accounts.write().await;
        let items = accounts
            .get_mut(account)
            .ok_or_else(|| StoreError::NotFound(format!("account {account}")))?;

        let item = items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| StoreError::NotFound(format!("{account}/{item_id}")))?;

        if !item.is_posted {
            item.is_posted = true;
            item.posted_at = Some(now);
            info!(account, item_id, "marked item posted");
        }
        Ok(item.clone())
    }
}

/// Queue position check: every queued item carries a position and no two
/// positions collide. Posted items keep their frozen positions and are
/// excluded. Gaps are tolerated: a reject deletes without renumbering, so
/// the run stays unique but may skip ranks until the next deselect
/// rebalance.
fn verify_queue_positions(account: &str, items: &[ScheduledItem]) -> Result<(), StoreError> {
    let queued: Vec<&ScheduledItem> = items.iter().filter(|i| i.is_queued()).collect();

    let mut positions = Vec::with_capacity(queued.len());
    for item in &queued {
        match item.queue_position {
            Some(pos) => positions.push(pos),
            None => {
                return Err(StoreError::QueueInvariantViolation {
                    account: account.to_string(),
                    detail: format!("queued item {} has no position", item.id),
                });
            }
        }
    }

    positions.sort_unstable();
    for pair in positions.windows(2) {
        if pair[1] == pair[0] {
            return Err(StoreError::QueueInvariantViolation {
                account: account.to_string(),
                detail: format!("duplicate position {}", pair[0]),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostPayload;
    use chrono::Duration;

    fn text_item(id: &str) -> IngestItem {
        IngestItem {
            id: Some(id.to_string()),
            payload: PostPayload::Text {
                text: format!("post {id}"),
            },
            is_posted: false,
        }
    }

    fn plus_hour(base: DateTime<Utc>) -> DateTime<Utc> {
        base + Duration::hours(1)
    }

    async fn seeded_store(account: &str, n: usize) -> ItemStore {
        let store = ItemStore::new();
        let raw = (1..=n).map(|i| text_item(&format!("item-{i}"))).collect();
        store.ingest(account, raw).await;
        store
    }

    #[tokio::test]
    async fn ingest_defaults_to_unqueued() {
        let store = seeded_store("acme", 3).await;
        let items = store.list("acme", ListFilter::default()).await;
        assert_eq!(items.len(), 3);
        for item in items {
            assert!(!item.is_posted);
            assert!(!item.is_selected);
            assert!(item.queue_position.is_none());
        }
    }

    #[tokio::test]
    async fn accept_assigns_dense_positions_and_chains_times() {
        let store = seeded_store("acme", 3).await;
        let now = Utc::now();

        for i in 1..=3 {
            store
                .accept("acme", &format!("item-{i}"), None, now, plus_hour)
                .await
                .unwrap();
        }

        let queued = store
            .list(
                "acme",
                ListFilter {
                    selected: Some(true),
                    posted: Some(false),
                },
            )
            .await;
        let mut positions: Vec<u32> = queued.iter().filter_map(|i| i.queue_position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 2, 3]);

        // Each fire time chains from its predecessor, not from now.
        let mut by_pos = queued.clone();
        by_pos.sort_by_key(|i| i.queue_position);
        assert_eq!(by_pos[0].scheduled_for.unwrap(), now + Duration::hours(1));
        assert_eq!(by_pos[1].scheduled_for.unwrap(), now + Duration::hours(2));
        assert_eq!(by_pos[2].scheduled_for.unwrap(), now + Duration::hours(3));
    }

    #[tokio::test]
    async fn accept_unknown_item_is_not_found() {
        let store = seeded_store("acme", 1).await;
        let err = store
            .accept("acme", "missing", None, Utc::now(), plus_hour)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn accept_twice_is_a_no_op() {
        let store = seeded_store("acme", 2).await;
        let now = Utc::now();
        let first = store
            .accept("acme", "item-1", None, now, plus_hour)
            .await
            .unwrap();
        let second = store
            .accept("acme", "item-1", None, now, plus_hour)
            .await
            .unwrap();
        assert_eq!(first.item.queue_position, second.item.queue_position);
        assert_eq!(first.item.scheduled_for, second.item.scheduled_for);
    }

    #[tokio::test]
    async fn poll_due_is_fifo_by_position() {
        let store = seeded_store("acme", 3).await;
        let now = Utc::now();
        // All three due an hour ago, regardless of relative fire times.
        for i in 1..=3 {
            store
                .accept("acme", &format!("item-{i}"), None, now - Duration::hours(5), |b| {
                    b + Duration::minutes(10)
                })
                .await
                .unwrap();
        }

        let first = store.poll_due("acme", now).await.unwrap();
        assert_eq!(first.queue_position, Some(1));

        store.mark_posted("acme", &first.id, now).await.unwrap();
        let second = store.poll_due("acme", now).await.unwrap();
        assert_eq!(second.queue_position, Some(2));
    }

    #[tokio::test]
    async fn poll_due_ignores_future_items() {
        let store = seeded_store("acme", 1).await;
        let now = Utc::now();
        store
            .accept("acme", "item-1", None, now, plus_hour)
            .await
            .unwrap();
        assert!(store.poll_due("acme", now).await.is_none());
    }

    #[tokio::test]
    async fn deselect_rebalances_from_lowest_removed_position() {
        let store = seeded_store("acme", 4).await;
        let now = Utc::now();
        for i in 1..=4 {
            store
                .accept("acme", &format!("item-{i}"), None, now, plus_hour)
                .await
                .unwrap();
        }

        // Remove positions 2 and 3; position 4 must become position 2 with
        // a fire time re-chained from position 1's.
        let removed = store
            .deselect(
                "acme",
                &["item-2".to_string(), "item-3".to_string()],
                now,
                plus_hour,
            )
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let survivor = store.get("acme", "item-4").await.unwrap();
        assert_eq!(survivor.queue_position, Some(2));
        let head = store.get("acme", "item-1").await.unwrap();
        assert_eq!(
            survivor.scheduled_for.unwrap(),
            head.scheduled_for.unwrap() + Duration::hours(1)
        );
    }

    #[tokio::test]
    async fn deselect_head_rechains_from_now() {
        let store = seeded_store("acme", 2).await;
        let accept_time = Utc::now() - Duration::hours(10);
        for i in 1..=2 {
            store
                .accept("acme", &format!("item-{i}"), None, accept_time, plus_hour)
                .await
                .unwrap();
        }

        let now = Utc::now();
        store
            .deselect("acme", &["item-1".to_string()], now, plus_hour)
            .await
            .unwrap();

        let survivor = store.get("acme", "item-2").await.unwrap();
        assert_eq!(survivor.queue_position, Some(1));
        assert_eq!(survivor.scheduled_for.unwrap(), now + Duration::hours(1));
    }

    #[tokio::test]
    async fn deselect_twice_is_a_no_op() {
        let store = seeded_store("acme", 2).await;
        let now = Utc::now();
        for i in 1..=2 {
            store
                .accept("acme", &format!("item-{i}"), None, now, plus_hour)
                .await
                .unwrap();
        }

        let ids = vec!["item-1".to_string()];
        assert_eq!(store.deselect("acme", &ids, now, plus_hour).await.unwrap(), 1);
        assert_eq!(store.deselect("acme", &ids, now, plus_hour).await.unwrap(), 0);

        let survivor = store.get("acme", "item-2").await.unwrap();
        assert_eq!(survivor.queue_position, Some(1));
    }

    #[tokio::test]
    async fn reject_deletes_without_rebalance() {
        let store = seeded_store("acme", 3).await;
        let now = Utc::now();
        for i in 1..=3 {
            store
                .accept("acme", &format!("item-{i}"), None, now, plus_hour)
                .await
                .unwrap();
        }

        store.reject("acme", "item-2").await.unwrap();
        assert!(store.get("acme", "item-2").await.is_err());

        // Remaining positions keep the gap.
        let tail = store.get("acme", "item-3").await.unwrap();
        assert_eq!(tail.queue_position, Some(3));
    }

    #[tokio::test]
    async fn mark_posted_is_terminal() {
        let store = seeded_store("acme", 1).await;
        let now = Utc::now();
        let first = store.mark_posted("acme", "item-1", now).await.unwrap();
        let later = store
            .mark_posted("acme", "item-1", now + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(first.posted_at, later.posted_at);
        assert!(later.is_posted);
    }

    #[tokio::test]
    async fn accounts_are_isolated() {
        let store = ItemStore::new();
        store.ingest("alpha", vec![text_item("a1")]).await;
        store.ingest("beta", vec![text_item("b1")]).await;

        let now = Utc::now();
        store.accept("alpha", "a1", None, now, plus_hour).await.unwrap();
        store.accept("beta", "b1", None, now, plus_hour).await.unwrap();

        // Both accounts queue independently from position 1.
        assert_eq!(
            store.get("alpha", "a1").await.unwrap().queue_position,
            Some(1)
        );
        assert_eq!(
            store.get("beta", "b1").await.unwrap().queue_position,
            Some(1)
        );
    }
}
