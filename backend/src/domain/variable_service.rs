//! Reads and writes of a user's variables.

use std::sync::Arc;

use mockable::Clock;
use tracing::info;

use crate::domain::accounts::user_not_found;
use crate::domain::ports::{UserRepository, UserVariableRepository};
use crate::domain::{Error, UserId, UserVariable, VariableKey, VariableWrite};

fn variable_not_found() -> Error {
    Error::not_found("Variable not found")
}

/// Service behind the `/user/variables` routes.
#[derive(Clone)]
pub struct VariableService {
    users: Arc<dyn UserRepository>,
    variables: Arc<dyn UserVariableRepository>,
    clock: Arc<dyn Clock>,
}

impl VariableService {
    /// Create the service over its repositories.
    pub fn new(
        users: Arc<dyn UserRepository>,
        variables: Arc<dyn UserVariableRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            variables,
            clock,
        }
    }

    async fn require_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|_| ())
            .ok_or_else(user_not_found)
    }

    /// Every variable the user owns, ordered by key.
    pub async fn list(&self, user_id: &UserId) -> Result<Vec<UserVariable>, Error> {
        self.require_user(user_id).await?;
        Ok(self.variables.list_variables(user_id).await?)
    }

    /// One variable; 404 when the key is unknown.
    pub async fn get(&self, user_id: &UserId, key: &str) -> Result<UserVariable, Error> {
        let key = VariableKey::new(key)?;
        self.require_user(user_id).await?;
        self.variables
            .find_variable(user_id, &key)
            .await?
            .ok_or_else(variable_not_found)
    }

    /// Create the variable or replace its value.
    pub async fn put(&self, user_id: &UserId, write: VariableWrite) -> Result<UserVariable, Error> {
        self.require_user(user_id).await?;
        self.store(user_id, write).await
    }

    /// Write several variables in order.
    ///
    /// A key repeated in `writes` is stored once with its last value.
    pub async fn put_many(
        &self,
        user_id: &UserId,
        writes: Vec<VariableWrite>,
    ) -> Result<Vec<UserVariable>, Error> {
        self.require_user(user_id).await?;
        let mut unique: Vec<VariableWrite> = Vec::with_capacity(writes.len());
        for write in writes {
            match unique.iter_mut().find(|seen| seen.key == write.key) {
                Some(seen) => *seen = write,
                None => unique.push(write),
            }
        }

        let mut stored = Vec::with_capacity(unique.len());
        for write in unique {
            stored.push(self.store(user_id, write).await?);
        }
        info!(user_id = %user_id, updated = stored.len(), "variables updated");
        Ok(stored)
    }

    /// Remove a variable; 404 when the key is unknown.
    pub async fn delete(&self, user_id: &UserId, key: &str) -> Result<(), Error> {
        let key = VariableKey::new(key)?;
        self.require_user(user_id).await?;
        if self.variables.delete_variable(user_id, &key).await? {
            info!(user_id = %user_id, key = %key, "variable deleted");
            Ok(())
        } else {
            Err(variable_not_found())
        }
    }

    async fn store(&self, user_id: &UserId, write: VariableWrite) -> Result<UserVariable, Error> {
        let existing = self.variables.find_variable(user_id, &write.key).await?;
        let variable = UserVariable::merge(user_id, existing, write, self.clock.utc());
        Ok(self.variables.save_variable(&variable).await?)
    }
}

#[cfg(test)]
mod tests;
