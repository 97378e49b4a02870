//! Aggregation tests over hand-built request histories.

use super::*;
use crate::domain::{
    ClientInfo, NewChatRequest, PerformanceSample, RequestMetrics, SessionTag, UserId, UserRating,
};
use chrono::TimeZone;
use rstest::{fixture, rstest};

#[fixture]
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 10, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn request(
    started_at: DateTime<Utc>,
    status: ChatRequestStatus,
    metrics: RequestMetrics,
) -> ChatRequest {
    let mut request = ChatRequest::from_new(NewChatRequest {
        id: ChatRequestId::random(),
        user_id: UserId::random(),
        session_id: SessionTag::from_client("session_test"),
        prompt: "Write a staking contract".to_owned(),
        model: "openai/gpt-oss-20b".to_owned(),
        client: ClientInfo::default(),
        started_at,
    });
    request.status = status;
    request.metrics = metrics;
    request
}

fn completed(started_at: DateTime<Utc>, duration_ms: u32, tokens: u32, cents: u32) -> ChatRequest {
    request(
        started_at,
        ChatRequestStatus::Completed,
        RequestMetrics {
            tokens_used: Some(tokens),
            cost_cents: Some(cents),
            duration_ms: Some(duration_ms),
        },
    )
}

fn failed(started_at: DateTime<Utc>) -> ChatRequest {
    request(started_at, ChatRequestStatus::Failed, RequestMetrics::default())
}

#[rstest]
#[case(6, 4, 50.0, Trend::Up)]
#[case(2, 4, -50.0, Trend::Down)]
#[case(3, 3, 0.0, Trend::Neutral)]
#[case(5, 0, 100.0, Trend::Up)]
#[case(0, 0, 0.0, Trend::Neutral)]
#[case(1, 3, -66.7, Trend::Down)]
fn trend_percentages(
    #[case] value: u64,
    #[case] previous: u64,
    #[case] percent: f64,
    #[case] trend: Trend,
) {
    let stat = TrendStat::compare(value, previous);
    assert!((stat.change_percent - percent).abs() < f64::EPSILON);
    assert_eq!(stat.trend, trend);
}

#[rstest]
fn stats_compare_adjacent_windows(now: DateTime<Utc>) {
    let requests = vec![
        completed(now - Duration::hours(1), 1000, 100, 1),
        completed(now - Duration::hours(2), 2000, 200, 0),
        failed(now - Duration::days(1)),
        completed(now - Duration::days(40), 3000, 300, 2),
    ];

    let stats = UsageStats::from_requests(&requests, now);

    assert_eq!(stats.today.value, 2);
    assert_eq!(stats.today.previous, 1);
    assert_eq!(stats.week.value, 3);
    assert_eq!(stats.month.value, 3);
    assert_eq!(stats.month.previous, 1);
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.tokens_processed, 600);
    assert!((stats.success_rate - 75.0).abs() < f64::EPSILON);
    assert!((stats.average_response_seconds - 2.0).abs() < f64::EPSILON);
    let newest = stats.recent_activity.first().expect("activity present");
    assert_eq!(newest.started_at, now - Duration::hours(1));
}

#[rstest]
fn recent_activity_is_capped(now: DateTime<Utc>) {
    let requests: Vec<ChatRequest> = (0..15)
        .map(|minutes| completed(now - Duration::minutes(minutes), 10, 1, 0))
        .collect();
    let stats = UsageStats::from_requests(&requests, now);
    assert_eq!(stats.recent_activity.len(), RECENT_ACTIVITY_LIMIT);
}

#[rstest]
fn empty_history_yields_zeroes(now: DateTime<Utc>) {
    let stats = UsageStats::from_requests(&[], now);
    assert_eq!(stats.total_requests, 0);
    assert!(stats.success_rate.abs() < f64::EPSILON);
    assert!(stats.average_response_seconds.abs() < f64::EPSILON);
    assert!(stats.recent_activity.is_empty());
}

#[rstest]
fn timeline_has_seven_days_ending_today(now: DateTime<Utc>) {
    let requests = vec![
        completed(now, 100, 1, 0),
        failed(now - Duration::days(2)),
        completed(now - Duration::days(9), 100, 1, 0),
    ];

    let timeline = usage_timeline(&requests, now);

    assert_eq!(timeline.len(), 7);
    let last = timeline.last().expect("today bucket");
    assert_eq!(last.date, now.date_naive());
    assert_eq!(last.completed_requests, 1);
    let two_days_ago = timeline.get(4).expect("bucket for two days ago");
    assert_eq!(two_days_ago.failed_requests, 1);
    assert_eq!(timeline.iter().map(|b| b.requests).sum::<u64>(), 2);
}

#[rstest]
fn analytics_summary_uses_rolling_windows(now: DateTime<Utc>) {
    let requests = vec![
        completed(now - Duration::days(1), 1500, 10, 0),
        failed(now - Duration::days(3)),
        completed(now - Duration::days(20), 9000, 10, 0),
    ];

    let summary = AnalyticsSummary::from_requests(&requests, now);

    assert_eq!(summary.weekly_stats, StatusCounts { total: 2, completed: 1, failed: 1 });
    assert_eq!(summary.monthly_stats.total, 3);
    assert!((summary.average_response_seconds - 1.5).abs() < f64::EPSILON);
    assert!((summary.success_rate - 50.0).abs() < f64::EPSILON);
}

#[rstest]
fn success_rates_ignore_unfinished_requests(now: DateTime<Utc>) {
    let requests = vec![
        completed(now - Duration::hours(1), 1000, 10, 0),
        failed(now - Duration::hours(2)),
        request(now - Duration::hours(3), ChatRequestStatus::Pending, RequestMetrics::default()),
        request(now - Duration::hours(4), ChatRequestStatus::Cancelled, RequestMetrics::default()),
    ];

    let stats = UsageStats::from_requests(&requests, now);
    let summary = AnalyticsSummary::from_requests(&requests, now);

    assert!((stats.success_rate - 50.0).abs() < f64::EPSILON);
    assert!((summary.success_rate - stats.success_rate).abs() < f64::EPSILON);
    assert_eq!(summary.weekly_stats.total, 4);
}

#[rstest]
fn costs_project_month_to_date(now: DateTime<Utc>) {
    let requests = vec![
        completed(now - Duration::days(2), 100, 10, 150),
        completed(now - Duration::days(45), 100, 10, 50),
    ];

    let costs = CostSummary::from_requests(&requests, CreditBalance::new(4, 10), now);

    assert!((costs.total_cost - 2.0).abs() < f64::EPSILON);
    assert!((costs.month_cost - 1.5).abs() < f64::EPSILON);
    assert!((costs.projected_month_cost - 4.5).abs() < f64::EPSILON);
    assert_eq!(costs.remaining_credits, 6);
    assert_eq!(costs.month_requests, 1);
    assert_eq!(costs.cost_trend, Trend::Up);
}

#[rstest]
fn snapshot_folds_missing_categories(now: DateTime<Utc>) {
    let requests = vec![
        completed(now - Duration::hours(1), 1000, 40, 1),
        completed(now - Duration::days(20), 3000, 60, 2),
    ];
    let categories = vec![
        (Some("nft".to_owned()), 2),
        (None, 1),
        (Some(UNCATEGORIZED.to_owned()), 1),
    ];

    let snapshot = DashboardSnapshot::calculate(&requests, &categories, now);

    assert_eq!(snapshot.total_requests, 2);
    assert_eq!(snapshot.total_tokens_used, 100);
    assert_eq!(snapshot.total_cost_cents, 3);
    assert!((snapshot.average_response_time_ms - 2000.0).abs() < f64::EPSILON);
    assert_eq!(snapshot.requests_by_category.get("nft"), Some(&2));
    assert_eq!(snapshot.requests_by_category.get(UNCATEGORIZED), Some(&2));
    assert_eq!(snapshot.requests_today, 1);
    assert_eq!(snapshot.requests_this_month, 1);
}

fn sample(response_time_ms: Option<u32>, was_successful: bool, rating: Option<u8>) -> PerformanceSample {
    PerformanceSample {
        response_time_ms,
        was_successful,
        user_rating: rating.and_then(UserRating::new),
    }
}

#[rstest]
fn performance_averages_only_recorded_values() {
    let samples = [
        sample(Some(1000), true, Some(5)),
        sample(Some(2000), true, Some(4)),
        sample(None, false, Some(4)),
        sample(Some(1500), true, None),
    ];

    let summary = PerformanceSummary::from_samples(&samples);

    assert_eq!(summary.total_requests, 4);
    assert!((summary.average_response_time_ms - 1500.0).abs() < f64::EPSILON);
    assert!((summary.success_rate - 75.0).abs() < f64::EPSILON);
    assert_eq!(summary.average_rating, Some(4.33));
}

#[rstest]
fn performance_without_samples_is_empty() {
    let summary = PerformanceSummary::from_samples(&[]);
    assert_eq!(summary.total_requests, 0);
    assert!(summary.success_rate.abs() < f64::EPSILON);
    assert_eq!(summary.average_rating, None);
}

#[rstest]
fn long_prompts_are_previewed() {
    let mut item = request(Utc::now(), ChatRequestStatus::Pending, RequestMetrics::default());
    item.prompt = "x".repeat(150);
    let activity = ActivityItem::from(&item);
    assert_eq!(activity.prompt_preview.chars().count(), 103);
    assert!(activity.prompt_preview.ends_with("..."));
}
