//! Variable service behaviour over the in-memory store.

use super::*;
use crate::domain::ports::{MockUserVariableRepository, UserVariableRepositoryError};
use crate::domain::{EmailAddress, ErrorCode, IdentityProfile, User, VariableValue};
use crate::outbound::memory::InMemoryStore;
use crate::test_support::{MutableClock, fixed_instant};
use chrono::TimeDelta;
use rstest::rstest;
use serde_json::json;

struct Harness {
    clock: Arc<MutableClock>,
    service: VariableService,
    user: UserId,
}

async fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = Arc::new(MutableClock::fixed());
    let user = User::onboard(
        IdentityProfile {
            email: EmailAddress::new("ada@example.com").expect("valid email"),
            name: None,
            image: None,
            github_id: None,
        },
        fixed_instant(),
    );
    store.insert(&user).await.expect("insert user");
    let service = VariableService::new(store.clone(), store, clock.clone());
    Harness {
        clock,
        service,
        user: user.id,
    }
}

fn write(key: &str, value: VariableValue) -> VariableWrite {
    VariableWrite {
        key: VariableKey::new(key).expect("valid key"),
        value,
        description: None,
        is_public: None,
    }
}

fn text(value: &str) -> VariableValue {
    VariableValue::Text(value.to_owned())
}

#[rstest]
#[tokio::test]
async fn variables_are_listed_by_key() {
    let h = harness().await;
    for key in ["network", "gas_limit", "deployer"] {
        h.service
            .put(&h.user, write(key, text("x")))
            .await
            .expect("store variable");
    }

    let keys: Vec<String> = h
        .service
        .list(&h.user)
        .await
        .expect("list variables")
        .into_iter()
        .map(|variable| variable.key.as_str().to_owned())
        .collect();

    assert_eq!(keys, ["deployer", "gas_limit", "network"]);
}

#[rstest]
#[tokio::test]
async fn rewriting_a_key_keeps_its_identity() {
    let h = harness().await;
    let mut first = write("network", text("testnet"));
    first.description = Some("Deployment target".to_owned());
    first.is_public = Some(true);
    let created = h.service.put(&h.user, first).await.expect("create");

    h.clock.advance(TimeDelta::minutes(5));
    let updated = h
        .service
        .put(&h.user, write("network", text("mainnet")))
        .await
        .expect("update");

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.created_at, created.created_at);
    assert_eq!(updated.updated_at, fixed_instant() + TimeDelta::minutes(5));
    assert_eq!(updated.value, text("mainnet"));
    assert_eq!(updated.description.as_deref(), Some("Deployment target"));
    assert!(updated.is_public);
    let fetched = h.service.get(&h.user, "network").await.expect("get");
    assert_eq!(fetched, updated);
}

#[rstest]
#[tokio::test]
async fn bulk_writes_keep_the_last_value_per_key() {
    let h = harness().await;

    let stored = h
        .service
        .put_many(
            &h.user,
            vec![
                write("network", text("testnet")),
                write("gas", VariableValue::Number(9999.into())),
                write("network", text("mainnet")),
            ],
        )
        .await
        .expect("bulk write");

    let keys: Vec<&str> = stored.iter().map(|v| v.key.as_str()).collect();
    assert_eq!(keys, ["network", "gas"]);
    assert_eq!(stored[0].value, text("mainnet"));
    assert_eq!(h.service.list(&h.user).await.expect("list").len(), 2);
}

#[rstest]
#[tokio::test]
async fn deleted_variables_are_gone() {
    let h = harness().await;
    h.service
        .put(&h.user, write("abi", VariableValue::Json(json!({ "name": "Token" }))))
        .await
        .expect("store");

    h.service.delete(&h.user, "abi").await.expect("delete");

    let err = h.service.get(&h.user, "abi").await.expect_err("gone");
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.message(), "Variable not found");
    let err = h.service.delete(&h.user, "abi").await.expect_err("already gone");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn blank_keys_are_rejected_before_lookup() {
    let h = harness().await;

    let err = h.service.get(&h.user, "").await.expect_err("blank key");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn unknown_users_have_no_variables() {
    let h = harness().await;
    let stranger = UserId::random();

    let err = h.service.list(&stranger).await.expect_err("unknown user");
    assert_eq!(err.code(), ErrorCode::NotFound);
    assert_eq!(err.message(), "User not found");
    let err = h
        .service
        .put(&stranger, write("network", text("testnet")))
        .await
        .expect_err("unknown user");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn storage_outages_surface_as_unavailable() {
    let store = Arc::new(InMemoryStore::new());
    let user = User::onboard(
        IdentityProfile {
            email: EmailAddress::new("ada@example.com").expect("valid email"),
            name: None,
            image: None,
            github_id: None,
        },
        fixed_instant(),
    );
    store.insert(&user).await.expect("insert user");
    let mut variables = MockUserVariableRepository::new();
    variables
        .expect_find_variable()
        .returning(|_, _| Err(UserVariableRepositoryError::connection("pool exhausted")));
    variables.expect_save_variable().never();
    let service = VariableService::new(
        store,
        Arc::new(variables),
        Arc::new(MutableClock::fixed()),
    );

    let err = service
        .put(&user.id, write("network", text("testnet")))
        .await
        .expect_err("storage is down");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}
