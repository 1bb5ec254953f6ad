use crate::{
    db::DbPool,
    entities::{book::BookFormat, shipping_method, ShippingMethod, ShippingMethodModel},
    errors::ServiceError,
    services::cart::CartLine,
    services::clients::{DiscountClient, TaxClient},
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Shipping method used for orders without any physical line.
pub const DIGITAL_DELIVERY_METHOD: &str = "Digital Download";

/// Postal address value object, serialized into the order that embeds it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct Address {
    #[validate(length(min = 1))]
    pub first_name: String,
    #[validate(length(min = 1))]
    pub last_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1))]
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// How a pricing component was produced.
///
/// The fail-open defaults for shipping, tax and discount are a deliberate
/// resilience policy; carrying the source lets callers and tests assert
/// *which* path ran, not just the resulting number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AmountSource {
    /// Supplied by the caller (idempotent re-entry path) and trusted as-is
    Provided,
    /// Calculated from live data or a healthy delegate response
    Computed,
    /// The delegate failed and the documented fallback was applied
    Degraded,
}

/// A monetary component together with its provenance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct PricedAmount {
    pub amount: Decimal,
    pub source: AmountSource,
}

impl PricedAmount {
    pub fn provided(amount: Decimal) -> Self {
        Self { amount, source: AmountSource::Provided }
    }
    pub fn computed(amount: Decimal) -> Self {
        Self { amount, source: AmountSource::Computed }
    }
    pub fn degraded(amount: Decimal) -> Self {
        Self { amount, source: AmountSource::Degraded }
    }
    pub fn is_degraded(&self) -> bool {
        self.source == AmountSource::Degraded
    }
}

/// Caller-supplied totals for the idempotent re-entry path. Any component
/// present here is trusted instead of recomputed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidedTotals {
    pub subtotal: Option<Decimal>,
    pub shipping: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub total: Option<Decimal>,
}

/// A fully priced checkout.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Quote {
    pub subtotal: PricedAmount,
    pub shipping: PricedAmount,
    pub tax: PricedAmount,
    pub discount: PricedAmount,
    pub total: Decimal,
    pub effective_shipping_method: String,
}

/// Pricing calculator for the checkout pipeline.
///
/// Derives the subtotal from validated cart lines and nets shipping, tax
/// and discount into a final total. Shipping rates come from the rate
/// table; tax and discounts are delegated to external services with
/// documented fail-open defaults.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DbPool>,
    tax_client: TaxClient,
    discount_client: DiscountClient,
    tax_fallback_rate: Decimal,
}

impl PricingService {
    pub fn new(
        db: Arc<DbPool>,
        tax_client: TaxClient,
        discount_client: DiscountClient,
        tax_fallback_rate: Decimal,
    ) -> Self {
        Self { db, tax_client, discount_client, tax_fallback_rate }
    }

    /// Price a validated cart.
    ///
    /// Rejects quotes whose discount would drive the total negative; an
    /// order row must always satisfy
    /// `total = subtotal + shipping + tax - discount` with a non-negative
    /// total.
    #[instrument(skip(self, lines, address, provided))]
    pub async fn quote(
        &self,
        lines: &[CartLine],
        address: Option<&Address>,
        shipping_method_id: Option<i32>,
        discount_code: Option<&str>,
        provided: &ProvidedTotals,
    ) -> Result<Quote, ServiceError> {
        let digital_only = is_digital_only(lines);

        let subtotal = match provided.subtotal {
            Some(value) => PricedAmount::provided(value),
            None => PricedAmount::computed(subtotal_of(lines)),
        };

        let (shipping, effective_shipping_method) = if digital_only {
            // Digital-only orders never ship, whatever method was selected.
            (PricedAmount::computed(Decimal::ZERO), DIGITAL_DELIVERY_METHOD.to_string())
        } else if let Some(value) = provided.shipping {
            (PricedAmount::provided(value), self.method_name(shipping_method_id).await)
        } else {
            self.calculate_shipping(lines, subtotal.amount, shipping_method_id).await
        };

        let tax = match provided.tax {
            Some(value) => PricedAmount::provided(value),
            None => self.calculate_tax(subtotal.amount, shipping.amount, address).await,
        };

        let discount = match (provided.discount, discount_code) {
            (Some(value), _) => PricedAmount::provided(value),
            (None, Some(code)) if !code.trim().is_empty() => {
                self.validate_discount(code, subtotal.amount + shipping.amount + tax.amount).await
            }
            _ => PricedAmount::computed(Decimal::ZERO),
        };

        let total = match provided.total {
            Some(value) => value,
            None => subtotal.amount + shipping.amount + tax.amount - discount.amount,
        };

        if total < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "discount exceeds order total".to_string(),
            ));
        }

        Ok(Quote { subtotal, shipping, tax, discount, total, effective_shipping_method })
    }

    /// Shipping from the rate table; lookup failure degrades to zero.
    async fn calculate_shipping(
        &self,
        lines: &[CartLine],
        subtotal: Decimal,
        shipping_method_id: Option<i32>,
    ) -> (PricedAmount, String) {
        match self.lookup_method(shipping_method_id).await {
            Ok(Some(method)) => {
                let cost = shipping_cost_for(&method, subtotal, physical_item_count(lines));
                (PricedAmount::computed(cost), method.name)
            }
            Ok(None) => {
                debug!("no active shipping method available; shipping waived");
                (PricedAmount::computed(Decimal::ZERO), "Not specified".to_string())
            }
            Err(e) => {
                warn!("shipping calculation failed, defaulting to zero: {}", e);
                (PricedAmount::degraded(Decimal::ZERO), "Not specified".to_string())
            }
        }
    }

    async fn lookup_method(
        &self,
        shipping_method_id: Option<i32>,
    ) -> Result<Option<ShippingMethodModel>, ServiceError> {
        let query = match shipping_method_id {
            Some(id) => ShippingMethod::find()
                .filter(shipping_method::Column::Id.eq(id))
                .filter(shipping_method::Column::IsActive.eq(true)),
            None => ShippingMethod::find()
                .filter(shipping_method::Column::IsActive.eq(true))
                .order_by_asc(shipping_method::Column::SortOrder),
        };
        Ok(query.one(&*self.db).await?)
    }

    /// Active shipping methods in display order.
    pub async fn active_methods(&self) -> Result<Vec<ShippingMethodModel>, ServiceError> {
        Ok(ShippingMethod::find()
            .filter(shipping_method::Column::IsActive.eq(true))
            .order_by_asc(shipping_method::Column::SortOrder)
            .all(&*self.db)
            .await?)
    }

    async fn method_name(&self, shipping_method_id: Option<i32>) -> String {
        match self.lookup_method(shipping_method_id).await {
            Ok(Some(method)) => method.name,
            _ => "Not specified".to_string(),
        }
    }

    /// Tax via the external service; unreachable or failing service falls
    /// back to the configured flat rate on (subtotal + shipping). The
    /// fallback is an explicit default, not a silent zero.
    async fn calculate_tax(
        &self,
        subtotal: Decimal,
        shipping: Decimal,
        address: Option<&Address>,
    ) -> PricedAmount {
        let Some(address) = address else {
            debug!("no shipping address supplied; tax not assessed");
            return PricedAmount::computed(Decimal::ZERO);
        };

        let taxable = subtotal + shipping;
        match self.tax_client.calculate(taxable, shipping, address).await {
            Ok(amount) => PricedAmount::computed(amount),
            Err(e) => {
                warn!("tax calculation failed, applying flat fallback rate: {}", e);
                PricedAmount::degraded((taxable * self.tax_fallback_rate).round_dp(2))
            }
        }
    }

    /// Discount via the external validator; failures and invalid codes both
    /// net to zero and never abort checkout.
    async fn validate_discount(&self, code: &str, order_value: Decimal) -> PricedAmount {
        match self.discount_client.validate(code, order_value).await {
            Ok(amount) => PricedAmount::computed(amount),
            Err(e) => {
                warn!(code, "discount validation failed, not applied: {}", e);
                PricedAmount::degraded(Decimal::ZERO)
            }
        }
    }
}

/// Sum of price × quantity across the lines.
pub fn subtotal_of(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.book.price * Decimal::from(line.quantity))
        .sum()
}

/// True when every line is a plain e-book (formats with a physical
/// component still ship).
pub fn is_digital_only(lines: &[CartLine]) -> bool {
    !lines.is_empty() && lines.iter().all(|line| line.book.format == BookFormat::Ebook)
}

/// Number of physical items across the lines.
pub fn physical_item_count(lines: &[CartLine]) -> i32 {
    lines
        .iter()
        .filter(|line| line.book.format.requires_shipping())
        .map(|line| line.quantity)
        .sum()
}

fn shipping_cost_for(method: &ShippingMethodModel, subtotal: Decimal, physical_items: i32) -> Decimal {
    if let Some(threshold) = method.free_shipping_threshold {
        if subtotal >= threshold {
            return Decimal::ZERO;
        }
    }
    method.base_cost + method.cost_per_item * Decimal::from(physical_items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::book::{BookFormat, BookStatus};
    use crate::entities::{book, BookModel};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn test_book(price: Decimal, format: BookFormat) -> BookModel {
        book::Model {
            id: Uuid::new_v4(),
            title: "Things Fall Apart".to_string(),
            author_name: "Chinua Achebe".to_string(),
            price,
            stock_quantity: 10,
            format,
            status: BookStatus::Published,
            cover_image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(price: Decimal, quantity: i32, format: BookFormat) -> CartLine {
        let book = test_book(price, format);
        CartLine { book_id: book.id, quantity, book }
    }

    fn method(
        base: Decimal,
        per_item: Decimal,
        threshold: Option<Decimal>,
    ) -> ShippingMethodModel {
        shipping_method::Model {
            id: 1,
            name: "Standard".to_string(),
            base_cost: base,
            cost_per_item: per_item,
            free_shipping_threshold: threshold,
            estimated_days_min: 3,
            estimated_days_max: 7,
            is_active: true,
            sort_order: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn subtotal_sums_price_times_quantity() {
        let lines = vec![
            line(dec!(10.00), 2, BookFormat::Ebook),
            line(dec!(5.50), 3, BookFormat::Physical),
        ];
        assert_eq!(subtotal_of(&lines), dec!(36.50));
    }

    #[test]
    fn ebook_only_cart_is_digital() {
        let lines = vec![
            line(dec!(10.00), 2, BookFormat::Ebook),
            line(dec!(4.00), 1, BookFormat::Ebook),
        ];
        assert!(is_digital_only(&lines));
    }

    #[test]
    fn both_format_is_not_digital_only() {
        // "both" bundles include a physical copy, so the cart still ships.
        let lines = vec![
            line(dec!(10.00), 1, BookFormat::Ebook),
            line(dec!(12.00), 1, BookFormat::Both),
        ];
        assert!(!is_digital_only(&lines));
    }

    #[test]
    fn empty_cart_is_not_digital_only() {
        assert!(!is_digital_only(&[]));
    }

    #[test]
    fn physical_count_ignores_digital_lines() {
        let lines = vec![
            line(dec!(10.00), 2, BookFormat::Ebook),
            line(dec!(12.00), 3, BookFormat::Physical),
            line(dec!(15.00), 1, BookFormat::Both),
        ];
        assert_eq!(physical_item_count(&lines), 4);
    }

    #[test]
    fn shipping_cost_is_base_plus_per_item() {
        let m = method(dec!(500), dec!(100), None);
        assert_eq!(shipping_cost_for(&m, dec!(3000), 3), dec!(800));
    }

    #[test]
    fn shipping_waived_over_free_threshold() {
        let m = method(dec!(500), dec!(100), Some(dec!(10000)));
        assert_eq!(shipping_cost_for(&m, dec!(10000), 3), Decimal::ZERO);
        assert_eq!(shipping_cost_for(&m, dec!(9999.99), 3), dec!(800));
    }

    #[test]
    fn priced_amount_sources() {
        assert!(PricedAmount::degraded(Decimal::ZERO).is_degraded());
        assert!(!PricedAmount::computed(Decimal::ZERO).is_degraded());
        assert!(!PricedAmount::provided(Decimal::ONE).is_degraded());
    }
}
