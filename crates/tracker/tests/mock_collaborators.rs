//! Drives the tracker through its public surface with the collaborator
//! doubles exported behind the `mock` feature, the way a host application's
//! test suite would consume this crate.

use offprint_cache::Database;
use offprint_tracker::mock::{MockLister, MockWriter};
use offprint_tracker::{ResourceKind, Tracker, event_channel};
use std::sync::Arc;
use url::Url;

#[tokio::test]
async fn test_cache_round_trip_through_public_surface() {
    let db = Database::connect_in_memory().await.unwrap();
    let (sender, receiver) = event_channel();
    let lister = Arc::new(MockLister::new());
    let writer = Arc::new(MockWriter::new(sender, true));
    let tracker = Tracker::spawn(&db, lister.clone(), writer.clone(), receiver);

    let article = Url::parse("https://en.wikipedia.org/wiki/Cat").unwrap();
    lister.resources(
        &article,
        ResourceKind::OfflineResources,
        ["https://en.wikipedia.org/r/img1.png"],
    );

    tracker.enable(&article).await.unwrap();
    assert!(tracker.is_cached(&article).await.unwrap());
    assert_eq!(writer.downloads().len(), 2);

    tracker.disable(&article).await.unwrap();
    assert!(!tracker.is_cached(&article).await.unwrap());
    assert_eq!(writer.deletes().len(), 2);
}
