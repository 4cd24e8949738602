use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Side, Status};

use super::Role;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub fname: String,
    pub lname: String,
    pub username: String,
    pub side: Side,
    pub role: Role,
    pub status: Status,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == Status::Active
    }

    pub fn require_role(&self, minimum: Role) -> Result<(), AppError> {
        if self.role.has_required_role(minimum) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                role = %self.role,
                required = %minimum,
                "Role check failed"
            );
            Err(AppError::Authorization("Forbidden".to_string()))
        }
    }
}
