//! Member (visitor) model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::not_blank;

/// Member model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: i32,
    pub name: String,
    /// Class or group label
    pub group_label: Option<String>,
    pub registered_on: NaiveDate,
}

/// Register member request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "member name is required"))]
    pub name: String,
    pub group_label: Option<String>,
}

/// Name-based login: finds the member or registers it
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct MemberLogin {
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "member name is required"))]
    pub name: String,
    pub group_label: Option<String>,
}

impl From<MemberLogin> for CreateMember {
    fn from(login: MemberLogin) -> Self {
        Self {
            name: login.name,
            group_label: login.group_label,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub group_label: Option<String>,
    pub registered_on: NaiveDate,
}
