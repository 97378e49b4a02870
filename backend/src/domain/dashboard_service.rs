//! Dashboard reads and the cached aggregate behind them.

use std::sync::Arc;

use chrono::Duration;
use mockable::Clock;
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::domain::accounts::user_not_found;
use crate::domain::ports::{
    AnalyticsRepository, ChatRequestRepository, DashboardRepository, PlanRepository,
    UserRepository,
};
use crate::domain::{
    AnalyticsSummary, CostSummary, CreditsSummary, DashboardSnapshot, Error, PerformanceSummary,
    UsageStats, User, UserId,
};

/// Payload for `GET /dashboard`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub dashboard: DashboardSnapshot,
    pub credits: CreditsSummary,
    pub performance: PerformanceSummary,
}

/// Repositories the dashboard reads from.
#[derive(Clone)]
pub struct DashboardSources {
    pub users: Arc<dyn UserRepository>,
    pub chat_requests: Arc<dyn ChatRequestRepository>,
    pub plans: Arc<dyn PlanRepository>,
    pub analytics: Arc<dyn AnalyticsRepository>,
    pub dashboards: Arc<dyn DashboardRepository>,
}

/// Service behind the `/dashboard` routes.
#[derive(Clone)]
pub struct DashboardService {
    sources: DashboardSources,
    clock: Arc<dyn Clock>,
}

impl DashboardService {
    /// Create the service over its repositories.
    pub fn new(sources: DashboardSources, clock: Arc<dyn Clock>) -> Self {
        Self { sources, clock }
    }

    async fn require_user(&self, user_id: &UserId) -> Result<User, Error> {
        self.sources
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(user_not_found)
    }

    /// Cached snapshot with the credit summary and performance figures.
    /// The snapshot is recalculated when missing; performance is always
    /// read live.
    pub async fn overview(&self, user_id: &UserId) -> Result<DashboardOverview, Error> {
        let user = self.require_user(user_id).await?;
        let dashboard = match self.sources.dashboards.find(user_id).await? {
            Some(snapshot) => snapshot,
            None => self.recalculate(user_id).await?,
        };
        let plan = self.sources.plans.active_plan(user_id).await?;
        let samples = self.sources.analytics.performance_samples(user_id).await?;
        Ok(DashboardOverview {
            dashboard,
            credits: CreditsSummary::from_parts(&user, plan.as_ref()),
            performance: PerformanceSummary::from_samples(&samples),
        })
    }

    /// Recompute the snapshot from raw requests and store it.
    pub async fn recalculate(&self, user_id: &UserId) -> Result<DashboardSnapshot, Error> {
        let now = self.clock.utc();
        let requests = self.sources.chat_requests.list_since(user_id, None).await?;
        let categories = self.sources.analytics.category_counts(user_id).await?;
        let snapshot = DashboardSnapshot::calculate(&requests, &categories, now);
        self.sources.dashboards.upsert(user_id, &snapshot).await?;
        info!(
            user_id = %user_id,
            total_requests = snapshot.total_requests,
            "dashboard recalculated"
        );
        Ok(snapshot)
    }

    /// Window counts, trends, and recent activity.
    pub async fn stats(&self, user_id: &UserId) -> Result<UsageStats, Error> {
        self.require_user(user_id).await?;
        let requests = self.sources.chat_requests.list_since(user_id, None).await?;
        Ok(UsageStats::from_requests(&requests, self.clock.utc()))
    }

    /// Timeline and status counts over the last thirty days.
    pub async fn analytics(&self, user_id: &UserId) -> Result<AnalyticsSummary, Error> {
        self.require_user(user_id).await?;
        let now = self.clock.utc();
        let requests = self
            .sources
            .chat_requests
            .list_since(user_id, Some(now - Duration::days(30)))
            .await?;
        Ok(AnalyticsSummary::from_requests(&requests, now))
    }

    /// Spend to date, this month, and projected.
    pub async fn costs(&self, user_id: &UserId) -> Result<CostSummary, Error> {
        let user = self.require_user(user_id).await?;
        let requests = self.sources.chat_requests.list_since(user_id, None).await?;
        Ok(CostSummary::from_requests(
            &requests,
            user.credits,
            self.clock.utc(),
        ))
    }
}
