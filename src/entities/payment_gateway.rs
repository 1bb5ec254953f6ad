use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Persisted payment gateway configuration.
///
/// Rows are maintained through the admin settings screens. The checkout
/// path never queries this table directly; it reads the startup-loaded
/// cache (`services::gateway_settings`), which is refreshed explicitly
/// after admin changes.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_gateways")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub gateway_id: String,
    pub name: String,
    pub enabled: bool,
    pub test_mode: bool,
    #[sea_orm(nullable)]
    pub public_key: Option<String>,
    #[sea_orm(nullable)]
    pub secret_key: Option<String>,
    /// Webhook/payment hash secret
    #[sea_orm(nullable)]
    pub secret_hash: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub config: Option<Json>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
