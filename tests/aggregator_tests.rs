
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use fake_scheduler::{alloc, hosts, FakeScheduler};
use nomad_status::error::NomadError;
use nomad_status::nomad::{Host, Job};
use nomad_status::status::{HostStatus, StatusAggregator};

fn clarify() -> Job {
    Job::new("clarify", "running")
}

fn aggregator(fake: FakeScheduler, concurrency: usize) -> (StatusAggregator, Arc<FakeScheduler>) {
    let fake = Arc::new(fake);
    (StatusAggregator::new(fake.clone(), concurrency), fake)
}

/// The two-host scenario: a healthy worker and a lost allocation on a draining node.
#[tokio::test]
async fn test_running_and_lost_on_draining_host() {
    let fake = FakeScheduler::new(
        vec![Host::new("h1", "n1", false), Host::new("h2", "n2", true)],
        vec![clarify()],
        vec![
            alloc("h1", "clarify-worker", "running", &[("t1", "running")]),
            alloc("h2", "clarify-worker", "lost", &[]),
        ],
    );
    let (agg, _) = aggregator(fake, 8);

    let reports = agg.resolve_all_collected("clarify").await.unwrap();
    let got: Vec<(String, Option<HostStatus>)> = reports
        .iter()
        .map(|r| (r.hostname.clone(), r.status()))
        .collect();

    assert_eq!(
        got,
        vec![
            ("n1".to_string(), Some(HostStatus::Started)),
            ("n2".to_string(), Some(HostStatus::Pending)),
        ]
    );
}

/// An unregistered job is stopped everywhere and no allocation is looked up.
#[tokio::test]
async fn test_missing_job_stops_every_host() {
    let fake = FakeScheduler::new(
        hosts(3),
        vec![Job::new("billing", "running")],
        vec![alloc("h1", "clarify-worker", "running", &[("t1", "pending")])],
    );
    let (agg, fake) = aggregator(fake, 8);

    let reports = agg.resolve_all_collected("clarify").await.unwrap();
    assert_eq!(reports.len(), 3);
    for report in &reports {
        assert_eq!(report.status(), Some(HostStatus::Stopped), "{}", report.hostname);
    }
    assert_eq!(fake.started(), 0);
}

/// A registered job with no allocation on a host still resolves to STARTED.
#[tokio::test]
async fn test_job_without_allocation_is_started() {
    let fake = FakeScheduler::new(
        hosts(2),
        vec![clarify()],
        vec![alloc("h1", "clarify-worker", "running", &[("t1", "pending")])],
    );
    let (agg, _) = aggregator(fake, 2);

    let reports = agg.resolve_all_collected("clarify").await.unwrap();
    assert_eq!(reports[0].status(), Some(HostStatus::Mixed));
    assert_eq!(reports[1].status(), Some(HostStatus::Started));
    assert!(reports[1].error().is_none());
}

/// A network failure on one host does not affect the others.
#[tokio::test]
async fn test_partial_failure_is_isolated() {
    let fake = FakeScheduler::new(
        hosts(3),
        vec![clarify()],
        vec![
            alloc("h1", "clarify-worker", "running", &[("t1", "running")]),
            alloc("h2", "clarify-worker", "running", &[("t1", "running")]),
            alloc("h3", "clarify-worker", "running", &[("t1", "running"), ("t2", "dead")]),
        ],
    )
    .with_failing_host("h2");
    let (agg, _) = aggregator(fake, 8);

    let reports = agg.resolve_all_collected("clarify").await.unwrap();
    assert_eq!(reports.len(), 3);

    assert_eq!(reports[0].hostname, "n1");
    assert_eq!(reports[0].status(), Some(HostStatus::Started));

    assert_eq!(reports[1].hostname, "n2");
    assert!(matches!(reports[1].error(), Some(NomadError::Network { .. })));
    assert_eq!(reports[1].status(), None);

    assert_eq!(reports[2].hostname, "n3");
    assert_eq!(reports[2].status(), Some(HostStatus::Mixed));
}

/// Failing to list hosts aborts the whole request.
#[tokio::test]
async fn test_host_listing_failure_is_fatal() {
    let mut fake = FakeScheduler::new(hosts(2), vec![clarify()], Vec::new());
    fake.fail_list_hosts = true;
    let (agg, _) = aggregator(fake, 8);

    let err = agg.resolve_all("clarify").await.err().unwrap();
    assert!(matches!(err, NomadError::Network { .. }));
}

/// A job lookup that fails for reasons other than absence aborts the request.
#[tokio::test]
async fn test_job_lookup_failure_is_fatal() {
    let mut fake = FakeScheduler::new(hosts(2), vec![clarify()], Vec::new());
    fake.fail_list_jobs = true;
    let (agg, fake) = aggregator(fake, 8);

    let err = agg.resolve_all("clarify").await.err().unwrap();
    assert!(matches!(err, NomadError::Network { .. }));
    assert_eq!(fake.started(), 0);
}

/// Stale allocations lose to live ones for the same host and job.
#[tokio::test]
async fn test_stale_allocation_is_skipped() {
    let mut stale = alloc("h1", "clarify-worker", "lost", &[]);
    stale.desired_status = "stop".to_string();
    stale.id = "stale".to_string();
    let live = alloc("h1", "clarify-worker", "running", &[("t1", "running")]);

    let fake = FakeScheduler::new(
        vec![Host::new("h1", "n1", true)],
        vec![clarify()],
        vec![stale, live],
    );
    let (agg, _) = aggregator(fake, 1);

    let reports = agg.resolve_all_collected("clarify").await.unwrap();
    // The stale lost allocation would have produced PENDING on this draining host.
    assert_eq!(reports[0].status(), Some(HostStatus::Started));
}

/// Output follows host-list order even when lookups overlap.
#[tokio::test]
async fn test_order_is_preserved_with_parallel_lookups() {
    let fake = FakeScheduler::new(hosts(12), vec![clarify()], Vec::new())
        .with_lookup_delay(Duration::from_millis(10));
    let (agg, fake) = aggregator(fake, 4);

    let names: Vec<String> = agg
        .resolve_all_collected("clarify")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.hostname)
        .collect();

    let expected: Vec<String> = (1..=12).map(|i| format!("n{}", i)).collect();
    assert_eq!(names, expected);
    assert!(fake.peak_in_flight() <= 4, "peak {}", fake.peak_in_flight());
    assert!(fake.peak_in_flight() > 1, "lookups never overlapped");
}

/// Dropping the stream stops further lookups.
#[tokio::test]
async fn test_dropping_stream_stops_lookups() {
    let fake = FakeScheduler::new(hosts(10), vec![clarify()], Vec::new())
        .with_lookup_delay(Duration::from_millis(30));
    let (agg, fake) = aggregator(fake, 1);

    let mut stream = agg.resolve_all("clarify").await.unwrap();
    let first = stream.next().await.unwrap();
    assert_eq!(first.hostname, "n1");
    drop(stream);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(fake.started() <= 2, "started {} lookups", fake.started());
    assert_eq!(fake.finished(), 1);
}
