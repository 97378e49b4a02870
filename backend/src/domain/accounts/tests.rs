//! Account service behaviour against mocked repositories.

use super::*;
use crate::domain::ports::{MockPlanRepository, MockUserRepository, PlanRepositoryError};
use crate::domain::{EmailAddress, ErrorCode};
use crate::test_support::{MutableClock, fixed_instant};
use rstest::{fixture, rstest};

fn profile() -> IdentityProfile {
    IdentityProfile {
        email: EmailAddress::new("ada@example.com").expect("valid email"),
        name: Some("Ada".to_owned()),
        image: None,
        github_id: Some("42".to_owned()),
    }
}

fn existing_user(credits: CreditBalance, plan: PlanTier) -> User {
    let mut user = User::onboard(profile(), fixed_instant());
    user.credits = credits;
    user.plan = plan;
    user.last_login_at = None;
    user
}

fn service(users: MockUserRepository, plans: MockPlanRepository) -> AccountService {
    AccountService::new(
        Arc::new(users),
        Arc::new(plans),
        Arc::new(MutableClock::fixed()),
    )
}

#[fixture]
fn plans_without_active_plan() -> MockPlanRepository {
    let mut plans = MockPlanRepository::new();
    plans.expect_active_plan().returning(|_| Ok(None));
    plans
}

#[rstest]
#[tokio::test]
async fn first_sign_in_onboards_a_free_account() {
    let mut users = MockUserRepository::new();
    users.expect_find_by_email().times(1).returning(|_| Ok(None));
    users.expect_insert().times(1).returning(|_| Ok(()));
    let mut plans = MockPlanRepository::new();
    plans
        .expect_activate()
        .withf(|_, plan| plan.plan_name == "free" && plan.monthly_requests == 10)
        .times(1)
        .returning(|_, _| Ok(()));

    let user = service(users, plans)
        .sign_in(profile())
        .await
        .expect("sign-in succeeds");

    assert_eq!(user.credits, CreditBalance::new(0, 10));
    assert_eq!(user.plan, PlanTier::Free);
    assert!(user.is_active);
    assert_eq!(user.last_login_at, Some(fixed_instant()));
}

#[rstest]
#[tokio::test]
async fn returning_sign_in_only_records_the_login() {
    let known = existing_user(CreditBalance::new(3, 10), PlanTier::Free);
    let known_id = known.id.clone();
    let mut users = MockUserRepository::new();
    let found = known.clone();
    users
        .expect_find_by_email()
        .returning(move |_| Ok(Some(found.clone())));
    users.expect_insert().never();
    users
        .expect_record_login()
        .withf(move |id, at| *id == known_id && *at == fixed_instant())
        .times(1)
        .returning(move |_, at| {
            let mut user = known.clone();
            user.last_login_at = Some(at);
            Ok(Some(user))
        });
    let mut plans = MockPlanRepository::new();
    plans
        .expect_active_plan()
        .returning(|_| Ok(Some(UserPlan::free(fixed_instant()))));
    plans.expect_activate().never();

    let user = service(users, plans)
        .sign_in(profile())
        .await
        .expect("sign-in succeeds");

    assert_eq!(user.credits.used(), 3);
    assert_eq!(user.last_login_at, Some(fixed_instant()));
}

#[rstest]
#[tokio::test]
async fn losing_the_insert_race_falls_back_to_the_winner() {
    let winner = existing_user(CreditBalance::free_allowance(), PlanTier::Free);
    let mut users = MockUserRepository::new();
    let mut lookups = 0_u32;
    let found = winner.clone();
    users.expect_find_by_email().times(2).returning(move |_| {
        lookups += 1;
        Ok((lookups > 1).then(|| found.clone()))
    });
    users
        .expect_insert()
        .returning(|user| Err(UserPersistenceError::duplicate_email(user.email.to_string())));
    users
        .expect_record_login()
        .returning(move |_, _| Ok(Some(winner.clone())));
    let mut plans = MockPlanRepository::new();
    plans
        .expect_active_plan()
        .returning(|_| Ok(Some(UserPlan::free(fixed_instant()))));
    plans.expect_activate().never();

    let result = service(users, plans).sign_in(profile()).await;

    assert!(result.is_ok());
}

#[rstest]
#[tokio::test]
async fn sign_in_after_a_failed_plan_activation_restores_the_free_plan() {
    let stored = Arc::new(std::sync::Mutex::new(None::<User>));
    let mut users = MockUserRepository::new();
    let lookup = Arc::clone(&stored);
    users
        .expect_find_by_email()
        .times(2)
        .returning(move |_| Ok(lookup.lock().expect("lock").clone()));
    let inserted = Arc::clone(&stored);
    users.expect_insert().times(1).returning(move |user| {
        *inserted.lock().expect("lock") = Some(user.clone());
        Ok(())
    });
    let login = Arc::clone(&stored);
    users
        .expect_record_login()
        .times(1)
        .returning(move |_, _| Ok(login.lock().expect("lock").clone()));

    let mut plans = MockPlanRepository::new();
    let mut attempts = 0_u32;
    plans.expect_activate().times(2).returning(move |_, plan| {
        attempts += 1;
        assert_eq!(plan.plan_name, "free");
        if attempts == 1 {
            Err(PlanRepositoryError::connection("pool exhausted"))
        } else {
            Ok(())
        }
    });
    plans.expect_active_plan().times(1).returning(|_| Ok(None));
    let service = service(users, plans);

    let first = service
        .sign_in(profile())
        .await
        .expect_err("plan activation fails");
    assert_eq!(first.code(), ErrorCode::ServiceUnavailable);

    let user = service
        .sign_in(profile())
        .await
        .expect("second sign-in repairs the account");
    assert_eq!(user.credits, CreditBalance::new(0, 10));
}

#[rstest]
#[tokio::test]
async fn missing_user_is_not_found(plans_without_active_plan: MockPlanRepository) {
    let mut users = MockUserRepository::new();
    users.expect_find_by_id().returning(|_| Ok(None));

    let err = service(users, plans_without_active_plan)
        .credits_summary(&UserId::random())
        .await
        .expect_err("unknown user");

    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.message(), "User not found");
}

#[rstest]
#[tokio::test]
async fn use_credit_on_spent_balance_never_deducts(
    plans_without_active_plan: MockPlanRepository,
) {
    let user = existing_user(CreditBalance::new(10, 10), PlanTier::Free);
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .returning(move |_| Ok(Some(user.clone())));
    users.expect_deduct_credit().never();

    let err = service(users, plans_without_active_plan)
        .apply_credit_action(&UserId::random(), CreditAction::UseCredit)
        .await
        .expect_err("no credits left");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
    assert_eq!(err.message(), "No credits remaining");
}

#[rstest]
#[tokio::test]
async fn use_credit_reports_the_new_balance(plans_without_active_plan: MockPlanRepository) {
    let user = existing_user(CreditBalance::new(2, 10), PlanTier::Free);
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .returning(move |_| Ok(Some(user.clone())));
    users
        .expect_deduct_credit()
        .times(1)
        .returning(|_| Ok(CreditDeduction::Applied(CreditBalance::new(3, 10))));

    let summary = service(users, plans_without_active_plan)
        .apply_credit_action(&UserId::random(), CreditAction::UseCredit)
        .await
        .expect("credit used");

    assert_eq!(summary.used, 3);
    assert_eq!(summary.remaining, 7);
    assert_eq!(summary.features, vec!["basic_chat".to_owned()]);
}

#[rstest]
#[tokio::test]
async fn reset_is_refused_on_the_free_tier(plans_without_active_plan: MockPlanRepository) {
    let user = existing_user(CreditBalance::new(5, 10), PlanTier::Free);
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .returning(move |_| Ok(Some(user.clone())));
    users.expect_reset_credits().never();

    let err = service(users, plans_without_active_plan)
        .apply_credit_action(&UserId::random(), CreditAction::ResetCredits)
        .await
        .expect_err("free tier cannot reset");

    assert_eq!(err.message(), "Cannot reset credits for free plan");
}

#[rstest]
#[tokio::test]
async fn reset_clears_usage_on_paid_tiers(plans_without_active_plan: MockPlanRepository) {
    let user = existing_user(CreditBalance::new(5, 100), PlanTier::Pro);
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .returning(move |_| Ok(Some(user.clone())));
    users
        .expect_reset_credits()
        .returning(|_| Ok(Some(CreditBalance::new(0, 100))));

    let summary = service(users, plans_without_active_plan)
        .apply_credit_action(&UserId::random(), CreditAction::ResetCredits)
        .await
        .expect("reset applied");

    assert_eq!(summary.used, 0);
    assert_eq!(summary.plan, PlanTier::Pro);
}

#[rstest]
#[tokio::test]
async fn add_credits_raises_the_limit() {
    let user = existing_user(CreditBalance::new(10, 10), PlanTier::Free);
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_id()
        .returning(move |_| Ok(Some(user.clone())));
    users
        .expect_add_credits()
        .withf(|_, amount| *amount == 15)
        .returning(|_, amount| Ok(Some(CreditBalance::new(10, 10 + amount))));
    let mut plans = MockPlanRepository::new();
    plans
        .expect_active_plan()
        .returning(|_| Ok(Some(UserPlan::free(fixed_instant()))));

    let summary = service(users, plans)
        .apply_credit_action(&UserId::random(), CreditAction::AddCredits { amount: 15 })
        .await
        .expect("credits added");

    assert_eq!(summary.limit, 25);
    assert!(summary.can_make_request);
    assert!(summary.features.contains(&"code_generation".to_owned()));
}
