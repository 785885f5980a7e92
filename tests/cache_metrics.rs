mod support;

use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::atomic::Ordering;

use agora::domain::filter::ListingFilter;
use agora::infra::telemetry::describe_metrics;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serial_test::serial;

use support::{Harness, InsertBehaviour, content, draft, requester};

fn snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        describe_metrics();
        snapshotter
    })
}

fn counters() -> HashMap<String, u64> {
    snapshotter()
        .snapshot()
        .into_vec()
        .into_iter()
        .filter_map(|(composite_key, _, _, value)| match value {
            DebugValue::Counter(count) => Some((composite_key.key().name().to_string(), count)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
#[serial]
async fn retrieval_emits_hit_miss_and_store_failure_counters() {
    let _ = counters();
    let harness = Harness::new();
    let alice = requester("alice");
    harness
        .service
        .create_listing(&alice, draft("Road bicycle", 250), content(b"a"))
        .await
        .expect("listing created");

    let filter = ListingFilter::default();
    for _ in 0..2 {
        harness
            .service
            .filtered_listings(10, 0, &filter, Some(&alice))
            .await
            .expect("query");
    }

    harness.cache.fail_set.store(true, Ordering::SeqCst);
    harness
        .service
        .filtered_listings(10, 0, &filter, None)
        .await
        .expect("query with failing cache");

    let counters = counters();
    assert!(counters.get("agora_listings_cache_hit_total").copied().unwrap_or(0) >= 1);
    assert!(counters.get("agora_listings_cache_miss_total").copied().unwrap_or(0) >= 2);
    assert!(
        counters
            .get("agora_listings_cache_store_failed_total")
            .copied()
            .unwrap_or(0)
            >= 1
    );
}

#[tokio::test]
#[serial]
async fn failed_creation_emits_compensation_counters() {
    let _ = counters();
    let harness = Harness::new();
    harness.listings.set_insert(InsertBehaviour::Duplicate).await;
    harness.blobs.fail_delete.store(true, Ordering::SeqCst);

    let _ = harness
        .service
        .create_listing(&requester("alice"), draft("Road bicycle", 250), content(b"a"))
        .await
        .expect_err("duplicate");

    let counters = counters();
    assert!(counters.get("agora_listings_compensation_total").copied().unwrap_or(0) >= 1);
    assert!(
        counters
            .get("agora_listings_compensation_failed_total")
            .copied()
            .unwrap_or(0)
            >= 1
    );
}
