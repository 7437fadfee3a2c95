mod common;

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::time::Duration;

use airdrop_redeemer::error::{ClaimError, FeedError, SwapError};
use airdrop_redeemer::services::ClaimAttempt;
use common::{airdrop, harness, platform_claimed};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn at(minutes: i64) -> DateTime<Utc> {
    t0() + ChronoDuration::minutes(minutes)
}

fn claimed(id: &str) -> ClaimAttempt {
    ClaimAttempt::Claimed {
        id: id.to_string(),
        signature: format!("claim-sig-{id}"),
    }
}

#[tokio::test]
async fn value_above_threshold_is_claimed_and_sold_in_first_cycle() {
    let h = harness(true);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);

    let report = h.service.run_cycle_at(t0()).await;

    assert_eq!(report.scanned, 1);
    assert_eq!(report.eligible, vec!["a".to_string()]);
    assert_eq!(report.claim, Some(claimed("a")));
    assert_eq!(report.next_wait, Duration::from_secs(120));
    assert_eq!(h.notifier.kinds(), vec!["claimed", "sold"]);
    assert_eq!(h.venue.executions(), vec![("Minta".to_string(), true)]);
    assert!(h.store.is_claimed("a"));

    let rows = h.stats.rows.lock().unwrap().clone();
    assert_eq!(rows.len(), 2);
    // proceeds minus swap fee minus claim fee
    assert_eq!(rows[1].net_lamports, 2_000_000 - 5_000 - 5_000);
}

#[tokio::test]
async fn low_value_is_claimed_only_after_price_holds() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "0.10")]);

    assert_eq!(h.service.run_cycle_at(at(0)).await.claim, None);
    assert_eq!(h.service.run_cycle_at(at(5)).await.claim, None);
    let report = h.service.run_cycle_at(at(12)).await;

    assert_eq!(report.claim, Some(claimed("a")));
    assert_eq!(h.submitter.submitted_ids(), vec!["a".to_string()]);
    assert_eq!(h.notifier.kinds(), vec!["claimed"]);
}

#[tokio::test]
async fn price_change_restarts_stability_window() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "0.10")]);
    h.service.run_cycle_at(at(0)).await;

    h.feed.set_listing(vec![airdrop("a", "0.09")]);
    assert_eq!(h.service.run_cycle_at(at(8)).await.claim, None);
    assert_eq!(h.service.run_cycle_at(at(12)).await.claim, None);

    let report = h.service.run_cycle_at(at(19)).await;
    assert_eq!(report.claim, Some(claimed("a")));
}

#[tokio::test]
async fn value_at_stability_floor_is_never_claimed() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "0.07")]);

    for minute in [0, 11, 30, 90] {
        assert_eq!(h.service.run_cycle_at(at(minute)).await.claim, None);
    }
    assert!(h.submitter.submitted_ids().is_empty());
}

#[tokio::test]
async fn permanent_claim_error_settles_without_selling() {
    let h = harness(true);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);
    h.submitter
        .fail_next(ClaimError::DistributorNotFound("no PDA for mint".into()));

    let report = h.service.run_cycle_at(at(0)).await;
    assert!(matches!(report.claim, Some(ClaimAttempt::Settled { .. })));

    let report = h.service.run_cycle_at(at(1)).await;
    assert_eq!(report.claim, None);
    assert!(report.eligible.is_empty());

    assert_eq!(h.submitter.submitted_ids().len(), 1);
    assert!(h.venue.executions().is_empty());
    assert!(h.notifier.kinds().is_empty());
    assert!(h.service.claimed().contains("a"));
}

#[tokio::test]
async fn claimed_airdrop_is_never_resubmitted() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);

    for minute in 0..4 {
        h.service.run_cycle_at(at(minute)).await;
    }

    assert_eq!(h.submitter.submitted_ids(), vec!["a".to_string()]);
}

#[tokio::test]
async fn transient_claim_error_is_retried_next_cycle() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);
    h.submitter
        .fail_next(ClaimError::Chain("Blockhash not found".into()));

    let first = h.service.run_cycle_at(at(0)).await;
    assert!(matches!(first.claim, Some(ClaimAttempt::Failed { .. })));
    assert!(!h.service.claimed().contains("a"));

    let second = h.service.run_cycle_at(at(2)).await;
    assert_eq!(second.claim, Some(claimed("a")));
    assert_eq!(h.submitter.submitted_ids().len(), 2);
}

#[tokio::test]
async fn one_claim_per_cycle_in_feed_order() {
    let h = harness(false);
    h.feed
        .set_listing(vec![airdrop("a", "1.00"), airdrop("b", "2.00")]);

    let first = h.service.run_cycle_at(at(0)).await;
    assert_eq!(first.eligible, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(first.claim, Some(claimed("a")));

    let second = h.service.run_cycle_at(at(2)).await;
    assert_eq!(second.eligible, vec!["b".to_string()]);
    assert_eq!(second.claim, Some(claimed("b")));
}

#[tokio::test]
async fn auth_failure_refreshes_once_and_retries_claim() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);
    h.submitter
        .fail_next(ClaimError::Auth("unexpected status code: 401".into()));

    let report = h.service.run_cycle_at(at(0)).await;

    assert_eq!(report.claim, Some(claimed("a")));
    assert_eq!(h.refresher.calls(), 1);
    assert_eq!(h.submitter.submitted_ids().len(), 2);
}

#[tokio::test]
async fn refresh_is_throttled_after_success() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);
    h.submitter.fail_next(ClaimError::Auth("unauthorized".into()));
    h.service.run_cycle_at(at(0)).await;
    assert_eq!(h.refresher.calls(), 1);

    h.feed
        .set_listing(vec![airdrop("a", "0.50"), airdrop("b", "0.50")]);
    h.submitter.fail_next(ClaimError::Auth("unauthorized".into()));
    let report = h.service.run_cycle_at(at(2)).await;

    assert!(matches!(report.claim, Some(ClaimAttempt::Failed { ref id, .. }) if id == "b"));
    assert_eq!(h.refresher.calls(), 1);
}

#[tokio::test]
async fn failed_refresh_skips_retry_and_is_not_throttled() {
    let h = harness(false);
    h.refresher
        .fail
        .store(true, std::sync::atomic::Ordering::SeqCst);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);

    h.submitter.fail_next(ClaimError::Auth("not authorized".into()));
    let report = h.service.run_cycle_at(at(0)).await;
    assert!(matches!(report.claim, Some(ClaimAttempt::Failed { .. })));
    assert_eq!(h.submitter.submitted_ids().len(), 1);

    h.submitter.fail_next(ClaimError::Auth("not authorized".into()));
    h.service.run_cycle_at(at(2)).await;
    assert_eq!(h.refresher.calls(), 2);
}

#[tokio::test]
async fn scan_errors_choose_backoff_by_class() {
    let h = harness(false);

    h.feed
        .fail_next(FeedError::Network("connection refused".into()));
    let report = h.service.run_cycle_at(at(0)).await;
    assert!(report.scan_error.is_some());
    assert_eq!(report.next_wait, Duration::from_secs(3));

    h.feed.fail_next(FeedError::Protocol("bad payload".into()));
    let report = h.service.run_cycle_at(at(1)).await;
    assert_eq!(report.next_wait, Duration::from_secs(30));
    assert_eq!(h.refresher.calls(), 0);

    h.feed
        .fail_next(FeedError::Auth("unexpected status code: 401".into()));
    let report = h.service.run_cycle_at(at(2)).await;
    assert_eq!(report.next_wait, Duration::from_secs(30));
    assert_eq!(h.refresher.calls(), 1);

    let report = h.service.run_cycle_at(at(3)).await;
    assert!(report.scan_error.is_none());
    assert_eq!(report.next_wait, Duration::from_secs(60));
}

#[tokio::test]
async fn platform_claimed_token_is_sold_directly_once_stable() {
    let h = harness(true);
    h.feed.set_listing(vec![platform_claimed("p", "0.20")]);

    let early = h.service.run_cycle_at(at(0)).await;
    assert!(early.sales_started.is_empty());
    assert!(early.eligible.is_empty());

    let ready = h.service.run_cycle_at(at(10)).await;
    assert_eq!(ready.sales_started, vec!["p".to_string()]);
    assert_eq!(ready.claim, None);
    h.service.drain_sales().await;

    assert_eq!(h.venue.executions(), vec![("Mintp".to_string(), true)]);
    assert_eq!(h.notifier.kinds(), vec!["sold"]);
    assert!(h.submitter.submitted_ids().is_empty());

    let after = h.service.run_cycle_at(at(11)).await;
    assert!(after.sales_started.is_empty());
    h.service.drain_sales().await;
    assert_eq!(h.venue.executions().len(), 1);
}

#[tokio::test]
async fn cheap_platform_claimed_token_is_left_alone() {
    let h = harness(true);
    h.feed.set_listing(vec![platform_claimed("p", "0.09")]);

    h.service.run_cycle_at(at(0)).await;
    let report = h.service.run_cycle_at(at(30)).await;

    assert!(report.sales_started.is_empty());
    assert!(h.venue.executions().is_empty());
}

#[tokio::test]
async fn shared_accounts_rejection_downgrades_the_retry() {
    let h = harness(true);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);
    h.venue.fail_next(SwapError::SharedAccountsUnsupported(
        "Simple AMMs are not supported with shared accounts".into(),
    ));

    h.service.run_cycle_at(at(0)).await;

    assert_eq!(
        h.venue.executions(),
        vec![("Minta".to_string(), true), ("Minta".to_string(), false)]
    );
    assert_eq!(h.notifier.kinds(), vec!["claimed", "sold"]);
}

fn claim_with_failing_sale(h: &common::Harness) {
    h.feed.set_listing(vec![airdrop("a", "0.50")]);
    for _ in 0..3 {
        h.venue.fail_next(SwapError::Network("i/o timeout".into()));
    }
}

#[tokio::test]
async fn exhausted_sale_after_claim_is_retried_once_stable() {
    let h = harness(true);
    claim_with_failing_sale(&h);

    let report = h.service.run_cycle_at(at(0)).await;
    assert_eq!(report.claim, Some(claimed("a")));
    assert_eq!(h.venue.executions().len(), 3);
    assert_eq!(h.notifier.kinds(), vec!["claimed", "sale_failed"]);
    assert!(!h.service.claimed().contains("a"));

    let early = h.service.run_cycle_at(at(1)).await;
    assert!(early.eligible.is_empty());
    assert!(early.sales_started.is_empty());

    let ready = h.service.run_cycle_at(at(10)).await;
    assert_eq!(ready.sales_started, vec!["a".to_string()]);
    h.service.drain_sales().await;

    assert_eq!(h.venue.executions().len(), 4);
    assert_eq!(h.notifier.kinds(), vec!["claimed", "sale_failed", "sold"]);
    assert!(h.service.claimed().contains("a"));
    assert_eq!(h.submitter.submitted_ids(), vec!["a".to_string()]);

    let after = h.service.run_cycle_at(at(11)).await;
    assert!(after.sales_started.is_empty());
}

#[tokio::test]
async fn exhausted_sale_is_retried_when_platform_reports_claim() {
    let h = harness(true);
    claim_with_failing_sale(&h);
    h.service.run_cycle_at(at(0)).await;

    h.feed.set_listing(vec![platform_claimed("a", "0.50")]);
    assert!(h.service.run_cycle_at(at(1)).await.sales_started.is_empty());
    let report = h.service.run_cycle_at(at(12)).await;
    h.service.drain_sales().await;

    assert_eq!(report.sales_started, vec!["a".to_string()]);
    assert_eq!(h.venue.executions().len(), 4);
    assert!(h.service.claimed().contains("a"));
}

#[tokio::test]
async fn chain_rejection_of_claimed_airdrop_settles_it() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "0.50")]);
    h.submitter.fail_next(ClaimError::Chain(
        "Program log: airdrop a is already claimed".into(),
    ));

    let report = h.service.run_cycle_at(at(0)).await;
    assert!(matches!(report.claim, Some(ClaimAttempt::Settled { .. })));

    h.service.run_cycle_at(at(2)).await;
    assert_eq!(h.submitter.submitted_ids().len(), 1);
}

#[tokio::test]
async fn unparseable_value_is_stored_but_ignored() {
    let h = harness(false);
    h.feed.set_listing(vec![airdrop("a", "n/a")]);

    let report = h.service.run_cycle_at(at(0)).await;

    assert_eq!(report.scanned, 0);
    assert!(h.store.exists("a"));
    assert_eq!(h.service.tracker().tracked_count(), 0);
}

#[tokio::test]
async fn run_stops_on_shutdown_and_announces_start() {
    let h = harness(true);
    h.shutdown.request();

    h.service.run().await.unwrap();

    assert_eq!(h.notifier.kinds(), vec!["started"]);
    assert_eq!(h.feed.calls(), 0);
}
