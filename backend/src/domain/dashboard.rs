//! Usage aggregation for the dashboard.
//!
//! Everything here is a pure function over a user's chat requests so the
//! same figures come out of the in-memory and PostgreSQL adapters.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::analytics::{PerformanceSample, UNCATEGORIZED};
use crate::domain::plan::{day_start, month_start};
use crate::domain::{ChatRequest, ChatRequestId, ChatRequestStatus, CreditBalance};

/// Number of entries in the recent activity list.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Days covered by the request timeline.
pub const TIMELINE_DAYS: i64 = 7;

const PROMPT_PREVIEW_CHARS: usize = 100;

/// Direction of change between two windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

/// A window count compared with the window before it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendStat {
    pub value: u64,
    pub previous: u64,
    /// Percentage change, one decimal place.
    pub change_percent: f64,
    pub trend: Trend,
}

impl TrendStat {
    /// Compare `value` with `previous`.
    ///
    /// Growth from zero is reported as +100%.
    ///
    /// # Examples
    /// ```
    /// use forge_backend::domain::{Trend, TrendStat};
    ///
    /// let stat = TrendStat::compare(6, 4);
    /// assert_eq!(stat.change_percent, 50.0);
    /// assert_eq!(stat.trend, Trend::Up);
    /// ```
    pub fn compare(value: u64, previous: u64) -> Self {
        let trend = match value.cmp(&previous) {
            std::cmp::Ordering::Greater => Trend::Up,
            std::cmp::Ordering::Less => Trend::Down,
            std::cmp::Ordering::Equal => Trend::Neutral,
        };
        let change_percent = if previous == 0 {
            if value > 0 { 100.0 } else { 0.0 }
        } else {
            round1((as_f64(value) - as_f64(previous)) / as_f64(previous) * 100.0)
        };
        Self {
            value,
            previous,
            change_percent,
            trend,
        }
    }
}

/// One line of the recent activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: ChatRequestId,
    pub prompt_preview: String,
    pub status: ChatRequestStatus,
    pub tokens_used: Option<u32>,
    pub cost_cents: Option<u32>,
    pub duration_ms: Option<u32>,
    pub started_at: DateTime<Utc>,
}

impl From<&ChatRequest> for ActivityItem {
    fn from(request: &ChatRequest) -> Self {
        Self {
            id: request.id,
            prompt_preview: preview(&request.prompt),
            status: request.status,
            tokens_used: request.metrics.tokens_used,
            cost_cents: request.metrics.cost_cents,
            duration_ms: request.metrics.duration_ms,
            started_at: request.started_at,
        }
    }
}

fn preview(prompt: &str) -> String {
    let mut chars = prompt.chars();
    let head: String = chars.by_ref().take(PROMPT_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Headline figures for `GET /dashboard/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub today: TrendStat,
    pub week: TrendStat,
    pub month: TrendStat,
    pub total_requests: u64,
    /// Completed share of finished requests, as a percentage.
    pub success_rate: f64,
    pub average_response_seconds: f64,
    pub tokens_processed: u64,
    pub recent_activity: Vec<ActivityItem>,
}

impl UsageStats {
    /// Aggregate stats from every request the user has made.
    ///
    /// Today compares with yesterday, the week with the seven days before
    /// it, and the calendar month with the previous calendar month.
    pub fn from_requests(requests: &[ChatRequest], now: DateTime<Utc>) -> Self {
        let today_start = day_start(now);
        let yesterday_start = today_start - Duration::days(1);
        let week_start = now - Duration::days(7);
        let previous_week_start = now - Duration::days(14);
        let this_month = month_start(now);
        let last_month = previous_month_start(now);

        let today = count_between(requests, today_start, None);
        let yesterday = count_between(requests, yesterday_start, Some(today_start));
        let week = count_between(requests, week_start, None);
        let previous_week = count_between(requests, previous_week_start, Some(week_start));
        let month = count_between(requests, this_month, None);
        let previous_month = count_between(requests, last_month, Some(this_month));

        let mut recent: Vec<&ChatRequest> = requests.iter().collect();
        recent.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        Self {
            today: TrendStat::compare(today, yesterday),
            week: TrendStat::compare(week, previous_week),
            month: TrendStat::compare(month, previous_month),
            total_requests: len_u64(requests.len()),
            success_rate: success_rate(requests.iter()),
            average_response_seconds: average_response_seconds(requests.iter()),
            tokens_processed: requests
                .iter()
                .filter_map(|r| r.metrics.tokens_used)
                .map(u64::from)
                .sum(),
            recent_activity: recent
                .into_iter()
                .take(RECENT_ACTIVITY_LIMIT)
                .map(ActivityItem::from)
                .collect(),
        }
    }
}

/// Requests on one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimelineBucket {
    pub date: NaiveDate,
    pub requests: u64,
    pub completed_requests: u64,
    pub failed_requests: u64,
}

/// Seven daily buckets ending today, oldest first.
pub fn usage_timeline(requests: &[ChatRequest], now: DateTime<Utc>) -> Vec<TimelineBucket> {
    (0..TIMELINE_DAYS)
        .rev()
        .map(|offset| {
            let date = (now - Duration::days(offset)).date_naive();
            let counts = StatusCounts::tally(
                requests
                    .iter()
                    .filter(|r| r.started_at.date_naive() == date),
            );
            TimelineBucket {
                date,
                requests: counts.total,
                completed_requests: counts.completed,
                failed_requests: counts.failed,
            }
        })
        .collect()
}

/// Totals per terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    fn tally<'a>(requests: impl Iterator<Item = &'a ChatRequest>) -> Self {
        requests.fold(Self::default(), |mut acc, request| {
            acc.total += 1;
            match request.status {
                ChatRequestStatus::Completed => acc.completed += 1,
                ChatRequestStatus::Failed => acc.failed += 1,
                ChatRequestStatus::Pending | ChatRequestStatus::Cancelled => {}
            }
            acc
        })
    }
}

/// Payload for `GET /dashboard/analytics`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub timeline: Vec<TimelineBucket>,
    /// Last seven days.
    pub weekly_stats: StatusCounts,
    /// Last thirty days.
    pub monthly_stats: StatusCounts,
    /// Mean duration of completed requests in the last seven days.
    pub average_response_seconds: f64,
    /// Completed share of the last seven days' finished requests, as a
    /// percentage.
    pub success_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl AnalyticsSummary {
    /// Summarise the last thirty days of requests.
    pub fn from_requests(requests: &[ChatRequest], now: DateTime<Utc>) -> Self {
        let week_start = now - Duration::days(7);
        let month_start = now - Duration::days(30);
        let weekly = || requests.iter().filter(move |r| r.started_at >= week_start);
        Self {
            timeline: usage_timeline(requests, now),
            weekly_stats: StatusCounts::tally(weekly()),
            monthly_stats: StatusCounts::tally(
                requests.iter().filter(|r| r.started_at >= month_start),
            ),
            average_response_seconds: average_response_seconds(weekly()),
            success_rate: success_rate(weekly()),
            last_updated: now,
        }
    }
}

/// Payload for `GET /dashboard/costs`. Amounts are in dollars.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CostSummary {
    pub total_cost: f64,
    pub month_cost: f64,
    /// Month-to-date spend extrapolated over the whole month.
    pub projected_month_cost: f64,
    pub remaining_credits: u32,
    pub month_requests: u64,
    pub previous_month_requests: u64,
    pub cost_trend: Trend,
}

impl CostSummary {
    /// Summarise recorded costs against the user's balance.
    pub fn from_requests(
        requests: &[ChatRequest],
        balance: CreditBalance,
        now: DateTime<Utc>,
    ) -> Self {
        let this_month = month_start(now);
        let last_month = previous_month_start(now);
        let total_cents: u64 = requests.iter().map(cost_cents).sum();
        let month_cents: u64 = requests
            .iter()
            .filter(|r| r.started_at >= this_month)
            .map(cost_cents)
            .sum();
        let month_requests = count_between(requests, this_month, None);
        let previous_month_requests = count_between(requests, last_month, Some(this_month));

        let elapsed_days = (now - this_month).num_days() + 1;
        let month_days = (next_month_start(now) - this_month).num_days();
        let month_cost = cents_to_dollars(month_cents);
        let projected_month_cost = if elapsed_days > 0 {
            round4(month_cost / as_f64_i64(elapsed_days) * as_f64_i64(month_days))
        } else {
            month_cost
        };

        Self {
            total_cost: cents_to_dollars(total_cents),
            month_cost,
            projected_month_cost,
            remaining_credits: balance.remaining(),
            month_requests,
            previous_month_requests,
            cost_trend: TrendStat::compare(month_requests, previous_month_requests).trend,
        }
    }
}

/// Cached per-user aggregate stored in `user_dashboard_data`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub total_requests: u64,
    pub total_tokens_used: u64,
    pub total_cost_cents: u64,
    /// Mean duration in milliseconds over requests that recorded one.
    pub average_response_time_ms: f64,
    pub requests_by_category: BTreeMap<String, u64>,
    pub requests_this_month: u64,
    pub requests_today: u64,
    pub last_calculated_at: DateTime<Utc>,
}

impl DashboardSnapshot {
    /// Recompute the aggregate from raw requests and analytics categories.
    ///
    /// A `None` category is folded into [`UNCATEGORIZED`].
    pub fn calculate(
        requests: &[ChatRequest],
        categories: &[(Option<String>, u64)],
        now: DateTime<Utc>,
    ) -> Self {
        let durations: Vec<u64> = requests
            .iter()
            .filter_map(|r| r.metrics.duration_ms)
            .map(u64::from)
            .collect();
        let average_response_time_ms = mean(&durations);

        let mut requests_by_category = BTreeMap::new();
        for (category, count) in categories {
            let key = category.clone().unwrap_or_else(|| UNCATEGORIZED.to_owned());
            *requests_by_category.entry(key).or_insert(0) += count;
        }

        Self {
            total_requests: len_u64(requests.len()),
            total_tokens_used: requests
                .iter()
                .filter_map(|r| r.metrics.tokens_used)
                .map(u64::from)
                .sum(),
            total_cost_cents: requests.iter().map(cost_cents).sum(),
            average_response_time_ms,
            requests_by_category,
            requests_this_month: count_between(requests, month_start(now), None),
            requests_today: count_between(requests, day_start(now), None),
            last_calculated_at: now,
        }
    }
}

/// Quality figures over every analytics sample a user has.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    /// Mean over samples that recorded a response time.
    pub average_response_time_ms: f64,
    /// Successful share of samples, as a percentage.
    pub success_rate: f64,
    /// Mean of the ratings given, two decimal places; absent until one is.
    pub average_rating: Option<f64>,
    pub total_requests: u64,
}

impl PerformanceSummary {
    /// Fold samples into the aggregate. No samples gives all zeroes.
    pub fn from_samples(samples: &[PerformanceSample]) -> Self {
        let durations: Vec<u64> = samples
            .iter()
            .filter_map(|s| s.response_time_ms)
            .map(u64::from)
            .collect();
        let ratings: Vec<u64> = samples
            .iter()
            .filter_map(|s| s.user_rating)
            .map(|rating| u64::from(rating.value()))
            .collect();
        let total = len_u64(samples.len());
        let successful = len_u64(samples.iter().filter(|s| s.was_successful).count());
        let success_rate = if total == 0 {
            0.0
        } else {
            round1(as_f64(successful) / as_f64(total) * 100.0)
        };
        Self {
            average_response_time_ms: round1(mean(&durations)),
            success_rate,
            average_rating: (!ratings.is_empty()).then(|| round2(mean(&ratings))),
            total_requests: total,
        }
    }
}

fn count_between(
    requests: &[ChatRequest],
    from: DateTime<Utc>,
    until: Option<DateTime<Utc>>,
) -> u64 {
    len_u64(
        requests
            .iter()
            .filter(|r| r.started_at >= from && until.is_none_or(|end| r.started_at < end))
            .count(),
    )
}

/// Completed share of finished requests. Pending and cancelled requests
/// are left out of both sides.
fn success_rate<'a>(requests: impl Iterator<Item = &'a ChatRequest>) -> f64 {
    let counts = StatusCounts::tally(requests.filter(|r| r.status.is_terminal()));
    if counts.total == 0 {
        return 0.0;
    }
    round1(as_f64(counts.completed) / as_f64(counts.total) * 100.0)
}

fn average_response_seconds<'a>(requests: impl Iterator<Item = &'a ChatRequest>) -> f64 {
    let durations: Vec<u64> = requests
        .filter(|r| r.status == ChatRequestStatus::Completed)
        .filter_map(|r| r.metrics.duration_ms)
        .map(u64::from)
        .collect();
    round1(mean(&durations) / 1000.0)
}

fn mean(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    as_f64(values.iter().sum()) / as_f64(len_u64(values.len()))
}

fn cost_cents(request: &ChatRequest) -> u64 {
    request.metrics.cost_cents.map_or(0, u64::from)
}

fn cents_to_dollars(cents: u64) -> f64 {
    as_f64(cents) / 100.0
}

fn previous_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    month_start(month_start(now) - Duration::days(1))
}

fn next_month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    month_start(month_start(now) + Duration::days(32))
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

fn as_f64(value: u64) -> f64 {
    value as f64
}

fn as_f64_i64(value: i64) -> f64 {
    value as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests;
