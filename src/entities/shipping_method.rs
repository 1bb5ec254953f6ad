use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shipping method rate-table entity.
///
/// Cost model: `base_cost + cost_per_item × physical item count`, waived
/// entirely once the cart subtotal reaches `free_shipping_threshold`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shipping_methods")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub base_cost: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub cost_per_item: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub free_shipping_threshold: Option<Decimal>,
    pub estimated_days_min: i32,
    pub estimated_days_max: i32,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
