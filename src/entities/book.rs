use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog book entity.
///
/// Read-only to the checkout core apart from the stock decrement at order
/// write time; the admin catalog owns every other column.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub title: String,
    pub author_name: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub price: Decimal,
    pub stock_quantity: i32,
    pub format: BookFormat,
    pub status: BookStatus,
    #[sea_orm(nullable)]
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Book delivery format. Determines whether shipping applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    #[sea_orm(string_value = "ebook")]
    Ebook,
    #[sea_orm(string_value = "physical")]
    Physical,
    #[sea_orm(string_value = "audiobook")]
    Audiobook,
    #[sea_orm(string_value = "both")]
    Both,
}

impl BookFormat {
    /// Whether a physical copy has to move through the warehouse.
    pub fn requires_shipping(&self) -> bool {
        matches!(self, BookFormat::Physical | BookFormat::Both)
    }

    /// Whether the purchase grants an e-book download.
    pub fn grants_digital_copy(&self) -> bool {
        matches!(self, BookFormat::Ebook | BookFormat::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[sea_orm(string_value = "published")]
    Published,
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "archived")]
    Archived,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipping_applies_to_physical_formats_only() {
        assert!(!BookFormat::Ebook.requires_shipping());
        assert!(!BookFormat::Audiobook.requires_shipping());
        assert!(BookFormat::Physical.requires_shipping());
        assert!(BookFormat::Both.requires_shipping());
    }

    #[test]
    fn digital_copy_granted_for_ebook_and_both() {
        assert!(BookFormat::Ebook.grants_digital_copy());
        assert!(BookFormat::Both.grants_digital_copy());
        assert!(!BookFormat::Physical.grants_digital_copy());
    }
}
