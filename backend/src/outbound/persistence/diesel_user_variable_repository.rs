//! PostgreSQL-backed `UserVariableRepository` implementation.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::upsert::excluded;
use diesel_async::RunQueryDsl;

use crate::domain::ports::{UserVariableRepository, UserVariableRepositoryError};
use crate::domain::{UserId, UserVariable, VariableKey, VariableType, VariableValue};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::UserVariableRow;
use super::pool::{DbPool, PoolError};
use super::schema::user_variables;

/// Diesel-backed implementation of the `UserVariableRepository` port.
#[derive(Clone)]
pub struct DieselUserVariableRepository {
    pool: DbPool,
}

impl DieselUserVariableRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UserVariableRepositoryError {
    map_basic_pool_error(error, UserVariableRepositoryError::connection)
}

fn map_diesel_error(error: diesel::result::Error) -> UserVariableRepositoryError {
    map_basic_diesel_error(
        error,
        UserVariableRepositoryError::query,
        UserVariableRepositoryError::connection,
    )
}

fn row_to_variable(row: UserVariableRow) -> Result<UserVariable, UserVariableRepositoryError> {
    let key = VariableKey::new(&row.key).map_err(|err| {
        UserVariableRepositoryError::query(format!("stored key {:?}: {}", row.key, err.message()))
    })?;
    let kind = VariableType::from_stored(&row.variable_type);
    Ok(UserVariable {
        id: row.id,
        user_id: UserId::from_uuid(row.user_id),
        key,
        value: VariableValue::from_columns(kind, row.value, row.json_value),
        description: row.description,
        is_public: row.is_public,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn variable_to_row(variable: &UserVariable) -> UserVariableRow {
    let (value, json_value) = variable.value.to_columns();
    UserVariableRow {
        id: variable.id,
        user_id: *variable.user_id.as_uuid(),
        key: variable.key.as_str().to_owned(),
        value,
        json_value,
        variable_type: variable.value.kind().as_str().to_owned(),
        description: variable.description.clone(),
        is_public: variable.is_public,
        created_at: variable.created_at,
        updated_at: variable.updated_at,
    }
}

#[async_trait]
impl UserVariableRepository for DieselUserVariableRepository {
    async fn list_variables(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<UserVariable>, UserVariableRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<UserVariableRow> = user_variables::table
            .filter(user_variables::user_id.eq(user_id.as_uuid()))
            .order(user_variables::key.asc())
            .select(UserVariableRow::as_select())
            .load(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(row_to_variable).collect()
    }

    async fn find_variable(
        &self,
        user_id: &UserId,
        key: &VariableKey,
    ) -> Result<Option<UserVariable>, UserVariableRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserVariableRow> = user_variables::table
            .filter(user_variables::user_id.eq(user_id.as_uuid()))
            .filter(user_variables::key.eq(key.as_str()))
            .select(UserVariableRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(row_to_variable).transpose()
    }

    async fn save_variable(
        &self,
        variable: &UserVariable,
    ) -> Result<UserVariable, UserVariableRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = variable_to_row(variable);
        // The unique (user_id, key) index keeps the original id and created_at.
        let stored: UserVariableRow = diesel::insert_into(user_variables::table)
            .values(&row)
            .on_conflict((user_variables::user_id, user_variables::key))
            .do_update()
            .set((
                user_variables::value.eq(excluded(user_variables::value)),
                user_variables::json_value.eq(excluded(user_variables::json_value)),
                user_variables::variable_type.eq(excluded(user_variables::variable_type)),
                user_variables::description.eq(excluded(user_variables::description)),
                user_variables::is_public.eq(excluded(user_variables::is_public)),
                user_variables::updated_at.eq(excluded(user_variables::updated_at)),
            ))
            .returning(UserVariableRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error)?;
        row_to_variable(stored)
    }

    async fn delete_variable(
        &self,
        user_id: &UserId,
        key: &VariableKey,
    ) -> Result<bool, UserVariableRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let deleted = diesel::delete(
            user_variables::table
                .filter(user_variables::user_id.eq(user_id.as_uuid()))
                .filter(user_variables::key.eq(key.as_str())),
        )
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }
}
