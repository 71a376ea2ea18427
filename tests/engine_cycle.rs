//! End-to-end poll cycles against the scriptable fake portal.

use exam_sniper::engine::Session;
use exam_sniper::testkit::{FakeClick, FakePage, FakeRow};
use exam_sniper::types::{CycleOutcome, Slot, WatchTarget};

const LABEL: &str = "Přihlásit";

fn slot(code: &str, date: &str) -> CycleOutcome {
    CycleOutcome::Claimed(Slot {
        code: code.into(),
        date: date.into(),
    })
}

async fn poll(page: &FakePage, targets: &[WatchTarget]) -> CycleOutcome {
    Session::new(page, page.settings(), targets)
        .poll()
        .await
        .expect("cycle failed")
}

#[tokio::test]
async fn claims_then_reports_already_secured() {
    let page = FakePage::new(vec![FakeRow::new("X01", "2024-05-01 - 10:00").open(LABEL)]);
    let targets = vec![WatchTarget::new("X01", &["2024-05-01"])];

    assert_eq!(poll(&page, &targets).await, slot("X01", "2024-05-01"));

    // The row now shows as signed up; the next cycle must not click anything.
    let clicks_after_claim = page.clicks().len();
    assert_eq!(poll(&page, &targets).await, CycleOutcome::AlreadySecured);
    assert_eq!(page.clicks().len(), clicks_after_claim);
}

#[tokio::test]
async fn secured_target_is_skipped_and_second_is_claimed() {
    let page = FakePage::new(vec![
        FakeRow::new("X01", "2024-05-01 - 10:00").signed(),
        FakeRow::new("X02", "2024-05-02 - 09:00").open(LABEL),
    ]);
    let targets = vec![
        WatchTarget::new("X01", &["2024-05-01"]),
        WatchTarget::new("X02", &["2024-05-02"]),
    ];

    assert_eq!(poll(&page, &targets).await, slot("X02", "2024-05-02"));
    assert_eq!(
        page.clicks()[0],
        FakeClick::Row {
            code: Some("X02".into()),
            date: Some("2024-05-02 - 09:00".into()),
        }
    );

    // Both targets are now claimed.
    assert_eq!(poll(&page, &targets).await, CycleOutcome::AlreadySecured);
}

#[tokio::test]
async fn unavailable_only_target_makes_no_claim_and_no_clicks() {
    let page = FakePage::new(vec![FakeRow::new("X01", "2024-05-01 - 10:00")]);
    let targets = vec![WatchTarget::new("X01", &["2024-05-01"])];

    assert_eq!(poll(&page, &targets).await, CycleOutcome::NoneAvailable);
    assert!(page.clicks().is_empty());
}

#[tokio::test]
async fn earlier_target_wins_over_earlier_row() {
    let page = FakePage::new(vec![
        FakeRow::new("X02", "2024-04-01 - 08:00").open(LABEL),
        FakeRow::new("X01", "2024-05-08 - 10:00").open(LABEL),
        FakeRow::new("X01", "2024-05-01 - 10:00").open(LABEL),
    ]);
    let targets = vec![
        WatchTarget::new("X01", &["2024-05-01", "2024-05-08"]),
        WatchTarget::new("X02", &["2024-04-01"]),
    ];

    assert_eq!(poll(&page, &targets).await, slot("X01", "2024-05-01"));
    let rows = page.rows();
    assert!(rows[2].signed);
    assert!(!rows[0].signed && !rows[1].signed);
}

#[tokio::test]
async fn lost_race_recovers_within_the_same_cycle() {
    let page = FakePage::new(vec![
        FakeRow::new("X01", "2024-05-01 - 10:00").race_lost(),
        FakeRow::new("X01", "2024-05-08 - 10:00").open(LABEL),
    ]);
    let targets = vec![WatchTarget::new("X01", &["2024-05-01", "2024-05-08"])];

    assert_eq!(poll(&page, &targets).await, slot("X01", "2024-05-08"));
    assert_eq!(page.control_clicks(), vec![LABEL.to_string()]);
}

#[tokio::test]
async fn lost_race_alone_is_not_reported_as_claim() {
    let page = FakePage::new(vec![FakeRow::new("X01", "2024-05-01 - 10:00").race_lost()]);
    let targets = vec![WatchTarget::new("X01", &["2024-05-01"])];

    assert_eq!(poll(&page, &targets).await, CycleOutcome::NoneAvailable);
    assert!(page.control_clicks().is_empty());
    assert_eq!(page.opened_row(), None);
}

#[tokio::test]
async fn one_claim_per_cycle_even_with_more_open_targets() {
    let page = FakePage::new(vec![
        FakeRow::new("X01", "2024-05-01 - 10:00").open(LABEL),
        FakeRow::new("X02", "2024-05-02 - 10:00").open(LABEL),
    ]);
    let targets = vec![
        WatchTarget::new("X01", &["2024-05-01"]),
        WatchTarget::new("X02", &["2024-05-02"]),
    ];

    assert_eq!(poll(&page, &targets).await, slot("X01", "2024-05-01"));
    assert_eq!(page.control_clicks().len(), 1);

    assert_eq!(poll(&page, &targets).await, slot("X02", "2024-05-02"));
    assert_eq!(poll(&page, &targets).await, CycleOutcome::AlreadySecured);
}

#[tokio::test]
async fn malformed_rows_do_not_break_the_cycle() {
    let page = FakePage::new(vec![
        FakeRow::new("X01", "2024-05-01 - 10:00").without_code().open(LABEL),
        FakeRow::new("X01", "no separator here").open(LABEL),
        FakeRow::new("X01", "2024-05-01 - 10:00").open(LABEL),
    ]);
    let targets = vec![WatchTarget::new("X01", &["2024-05-01"])];

    assert_eq!(poll(&page, &targets).await, slot("X01", "2024-05-01"));
    assert!(page.rows()[2].signed);
}

/// Current behaviour: with one target already claimed in an earlier run and
/// the other one not offered at all, the cycle still enters the claim phase
/// and reports that nothing was available.
#[tokio::test]
async fn partially_secured_watch_list_still_runs_claim_phase() {
    let page = FakePage::new(vec![
        FakeRow::new("X01", "2024-05-01 - 10:00").signed(),
        FakeRow::new("X02", "2024-05-02 - 10:00"),
    ]);
    let targets = vec![
        WatchTarget::new("X01", &["2024-05-01"]),
        WatchTarget::new("X02", &["2024-05-02"]),
    ];

    assert_eq!(poll(&page, &targets).await, CycleOutcome::NoneAvailable);
}

#[tokio::test]
async fn detached_row_during_collapse_does_not_end_the_cycle() {
    let page = FakePage::new(vec![
        FakeRow::new("X01", "2024-05-01 - 10:00").race_lost(),
        FakeRow::new("X01", "2024-05-08 - 10:00").open(LABEL),
    ]);
    page.detach_row_on_click(0, 2);
    let targets = vec![WatchTarget::new("X01", &["2024-05-01", "2024-05-08"])];

    assert_eq!(poll(&page, &targets).await, slot("X01", "2024-05-08"));
}
