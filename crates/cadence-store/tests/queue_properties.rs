//! Property-based tests for the posting queue.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use cadence_store::{IngestItem, ItemStore, ListFilter, PostPayload, StoreError};

const ACCOUNT: &str = "acme";

/// One queue mutation, referencing items by index into a fixed pool.
#[derive(Debug, Clone)]
enum QueueOp {
    Accept(usize),
    Deselect(Vec<usize>),
    Reject(usize),
}

fn queue_op(pool_size: usize) -> impl Strategy<Value = QueueOp> {
    prop_oneof![
        (0..pool_size).prop_map(QueueOp::Accept),
        prop::collection::vec(0..pool_size, 1..4).prop_map(QueueOp::Deselect),
        (0..pool_size).prop_map(QueueOp::Reject),
    ]
}

fn item_id(idx: usize) -> String {
    format!("item-{idx}")
}

fn plus_hour(base: DateTime<Utc>) -> DateTime<Utc> {
    base + Duration::hours(1)
}

async fn seeded_store(pool_size: usize) -> ItemStore {
    let store = ItemStore::new();
    let raw = (0..pool_size)
        .map(|i| IngestItem {
            id: Some(item_id(i)),
            payload: PostPayload::Text {
                text: format!("post {i}"),
            },
            is_posted: false,
        })
        .collect();
    store.ingest(ACCOUNT, raw).await;
    store
}

/// Queued positions must always be exactly {1..N}.
fn assert_dense(items: &[cadence_store::ScheduledItem]) -> Result<(), TestCaseError> {
    let mut positions: Vec<u32> = items
        .iter()
        .filter(|i| i.is_selected && !i.is_posted)
        .map(|i| i.queue_position.ok_or_else(|| {
            TestCaseError::fail("queued item without position")
        }))
        .collect::<Result<_, _>>()?;
    positions.sort_unstable();
    let expected: Vec<u32> = (1..=positions.len() as u32).collect();
    prop_assert_eq!(positions, expected);
    Ok(())
}

proptest! {
    // Property: no sequence of accept/deselect calls can gap or duplicate
    // queue positions. Rejects are excluded here because a hard delete of
    // a queued item is allowed to leave a gap (no rebalance on reject).
    #[test]
    fn dense_queue_survives_accept_deselect(
        ops in prop::collection::vec(queue_op(6), 1..25)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        rt.block_on(async {
            let store = seeded_store(6).await;
            let now = Utc::now();

            for op in ops {
                match op {
                    QueueOp::Accept(idx) => {
                        match store.accept(ACCOUNT, &item_id(idx), None, now, plus_hour).await {
                            Ok(_) | Err(StoreError::NotFound(_)) => {}
                            Err(e) => return Err(TestCaseError::fail(e.to_string())),
                        }
                    }
                    QueueOp::Deselect(idxs) => {
                        let ids: Vec<String> = idxs.into_iter().map(item_id).collect();
                        store
                            .deselect(ACCOUNT, &ids, now, plus_hour)
                            .await
                            .map_err(|e| TestCaseError::fail(e.to_string()))?;
                    }
                    QueueOp::Reject(_) => {
                        // Skipped in this property; see comment above.
                    }
                }

                let items = store.list(ACCOUNT, ListFilter::default()).await;
                assert_dense(&items)?;
            }
            Ok(())
        })?;
    }

    // Property: queued fire times strictly increase with queue position,
    // because each one chains from its predecessor.
    #[test]
    fn fire_times_increase_with_position(accept_count in 1usize..6) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        rt.block_on(async {
            let store = seeded_store(6).await;
            let now = Utc::now();

            for idx in 0..accept_count {
                store
                    .accept(ACCOUNT, &item_id(idx), None, now, plus_hour)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }

            let mut queued = store
                .list(ACCOUNT, ListFilter { selected: Some(true), posted: Some(false) })
                .await;
            queued.sort_by_key(|i| i.queue_position);

            for pair in queued.windows(2) {
                prop_assert!(
                    pair[1].scheduled_for.unwrap() > pair[0].scheduled_for.unwrap(),
                    "fire time at position {:?} not after predecessor",
                    pair[1].queue_position
                );
            }
            Ok(())
        })?;
    }
}
