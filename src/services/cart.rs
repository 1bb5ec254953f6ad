use crate::{
    db::DbPool,
    entities::{
        book::{self, BookStatus},
        cart_item, user_address, Book, BookModel, CartItem, CartItemModel, Order, UserAddress,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::pricing::{subtotal_of, Address},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_LINE_QUANTITY: i32 = 99;

/// A validated cart line: the stored quantity joined with the live book row.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub book_id: Uuid,
    pub quantity: i32,
    pub book: BookModel,
}

/// Aggregate view of a cart, used for checkout-flow decisions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartAnalytics {
    pub total_items: i32,
    pub item_count: usize,
    pub total_value: Decimal,
    pub ebook_count: i32,
    pub physical_count: i32,
    pub is_ebook_only: bool,
    pub is_physical_only: bool,
    pub is_mixed_cart: bool,
}

/// One guest line handed over at sign-in.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GuestCartLine {
    pub book_id: Uuid,
    pub quantity: i32,
}

/// Per-line outcome of a guest-cart transfer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransferLineResult {
    pub book_id: Uuid,
    pub status: TransferLineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransferLineStatus {
    Transferred,
    Failed,
}

/// Summary returned by the guest-cart transfer.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub total_items: usize,
    pub transferred: usize,
    pub failed: usize,
    pub shipping_data_saved: bool,
    pub results: Vec<TransferLineResult>,
}

/// Shopping cart service.
///
/// Owns the user-scoped cart lines: snapshotting them for checkout, the
/// cart CRUD behind the storefront, and merging a guest session's
/// client-held cart into the authenticated user's cart at sign-in.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Current cart lines re-validated against the live catalog.
    ///
    /// Lines whose book no longer exists or is unpublished are dropped with
    /// a warning rather than failing the request; they will disappear for
    /// good when the cart is next written.
    #[instrument(skip(self))]
    pub async fn snapshot(&self, user_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
        let rows = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .find_also_related(Book)
            .order_by_desc(cart_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for (item, book) in rows {
            match book {
                Some(book) if book.status == BookStatus::Published => {
                    lines.push(CartLine { book_id: book.id, quantity: item.quantity, book });
                }
                _ => {
                    warn!(book_id = %item.book_id, "dropping cart line for missing or unpublished book");
                }
            }
        }
        Ok(lines)
    }

    /// Snapshot that refuses to return an empty cart. Checkout entry point.
    pub async fn checkout_snapshot(&self, user_id: Uuid) -> Result<Vec<CartLine>, ServiceError> {
        let lines = self.snapshot(user_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }
        Ok(lines)
    }

    /// Aggregate counts and values over the current snapshot.
    pub async fn analytics(&self, user_id: Uuid) -> Result<CartAnalytics, ServiceError> {
        let lines = self.snapshot(user_id).await?;
        Ok(analytics_of(&lines))
    }

    /// Add a book to the cart, summing quantities when the line exists.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        quantity: i32,
    ) -> Result<CartItemModel, ServiceError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(ServiceError::ValidationError(format!(
                "quantity must be between 1 and {}",
                MAX_LINE_QUANTITY
            )));
        }

        let book = self.published_book(book_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::BookId.eq(book_id))
            .one(&*self.db)
            .await?;

        let new_quantity = existing.as_ref().map_or(quantity, |item| item.quantity + quantity);
        self.ensure_stock(&book, new_quantity)?;

        let item = match existing {
            Some(item) => {
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(new_quantity);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?
            }
            None => {
                let item = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    book_id: Set(book_id),
                    quantity: Set(quantity),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                };
                item.insert(&*self.db).await?
            }
        };

        self.event_sender
            .send_or_log(Event::CartItemAdded { user_id, book_id })
            .await;

        Ok(item)
    }

    /// Set a line's quantity; zero removes the line.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItemModel>, ServiceError> {
        if !(0..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(ServiceError::ValidationError(format!(
                "quantity must be between 0 and {}",
                MAX_LINE_QUANTITY
            )));
        }

        if quantity == 0 {
            self.remove_item(user_id, book_id).await?;
            return Ok(None);
        }

        let book = self.published_book(book_id).await?;
        self.ensure_stock(&book, quantity)?;

        let item = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::BookId.eq(book_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("cart line for book {}", book_id)))?;

        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        Ok(Some(active.update(&*self.db).await?))
    }

    /// Remove one line from the cart.
    pub async fn remove_item(&self, user_id: Uuid, book_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::BookId.eq(book_id))
            .exec(&*self.db)
            .await?;
        self.event_sender
            .send_or_log(Event::CartItemRemoved { user_id, book_id })
            .await;
        Ok(())
    }

    /// Remove every line from the cart.
    pub async fn clear(&self, user_id: Uuid) -> Result<(), ServiceError> {
        CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .exec(&*self.db)
            .await?;
        self.event_sender.send_or_log(Event::CartCleared(user_id)).await;
        Ok(())
    }

    /// Clear the cart only once the given order's payment is confirmed.
    ///
    /// Checkout deliberately leaves the cart intact so an abandoned or
    /// failed payment can be retried; the payment-confirmation flow calls
    /// this after the gateway callback lands.
    #[instrument(skip(self))]
    pub async fn clear_after_payment(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden("order belongs to another user".into()));
        }

        if order.payment_status == "paid" && order.status == "confirmed" {
            self.clear(user_id).await?;
            info!(%user_id, %order_id, "cart cleared after confirmed payment");
            Ok(true)
        } else {
            info!(
                %user_id, %order_id,
                payment_status = %order.payment_status,
                "payment not confirmed yet, preserving cart"
            );
            Ok(false)
        }
    }

    /// Merge a guest session's client-held cart into the user's cart.
    ///
    /// Every line is processed independently: a bad line increments the
    /// failure counter and the rest continue. Stock shortfalls are logged
    /// but tolerated here; stock is enforced again when the order is
    /// written. Transferring the same line twice sums quantities instead of
    /// duplicating rows.
    #[instrument(skip(self, lines, shipping_address))]
    pub async fn transfer_guest_cart(
        &self,
        user_id: Uuid,
        lines: &[GuestCartLine],
        shipping_address: Option<&Address>,
    ) -> Result<TransferSummary, ServiceError> {
        let mut results = Vec::with_capacity(lines.len());
        let mut transferred = 0usize;
        let mut failed = 0usize;

        for line in lines {
            match self.transfer_line(user_id, line).await {
                Ok(()) => {
                    transferred += 1;
                    results.push(TransferLineResult {
                        book_id: line.book_id,
                        status: TransferLineStatus::Transferred,
                        reason: None,
                    });
                }
                Err(e) => {
                    failed += 1;
                    warn!(book_id = %line.book_id, "guest cart line not transferred: {}", e);
                    results.push(TransferLineResult {
                        book_id: line.book_id,
                        status: TransferLineStatus::Failed,
                        reason: Some(e.response_message()),
                    });
                }
            }
        }

        // Saved independently of line outcomes.
        let shipping_data_saved = match shipping_address {
            Some(address) => match self.save_default_address(user_id, address).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("failed to save guest shipping address: {}", e);
                    false
                }
            },
            None => false,
        };

        self.event_sender
            .send_or_log(Event::GuestCartTransferred { user_id, transferred, failed })
            .await;

        Ok(TransferSummary {
            total_items: lines.len(),
            transferred,
            failed,
            shipping_data_saved,
            results,
        })
    }

    async fn transfer_line(&self, user_id: Uuid, line: &GuestCartLine) -> Result<(), ServiceError> {
        if !(1..=MAX_LINE_QUANTITY).contains(&line.quantity) {
            return Err(ServiceError::ValidationError("invalid quantity".into()));
        }

        let book = self.published_book(line.book_id).await?;

        // Stock is advisory at transfer time; the order writer enforces it.
        if book.format.requires_shipping() && book.stock_quantity < line.quantity {
            warn!(
                book_id = %book.id,
                requested = line.quantity,
                available = book.stock_quantity,
                "transferring guest line despite insufficient stock"
            );
        }

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::BookId.eq(line.book_id))
            .one(&*self.db)
            .await?;

        match existing {
            Some(item) => {
                let summed = item.quantity + line.quantity;
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(summed);
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?;
            }
            None => {
                cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    book_id: Set(line.book_id),
                    quantity: Set(line.quantity),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&*self.db)
                .await?;
            }
        }
        Ok(())
    }

    async fn save_default_address(
        &self,
        user_id: Uuid,
        address: &Address,
    ) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let existing = UserAddress::find()
            .filter(user_address::Column::UserId.eq(user_id))
            .filter(user_address::Column::IsDefault.eq(true))
            .one(&txn)
            .await?;

        match existing {
            Some(row) => {
                let mut active: user_address::ActiveModel = row.into();
                active.first_name = Set(address.first_name.clone());
                active.last_name = Set(address.last_name.clone());
                active.email = Set(address.email.clone());
                active.phone = Set(address.phone.clone());
                active.address = Set(address.address.clone());
                active.city = Set(address.city.clone());
                active.state = Set(address.state.clone());
                active.zip_code = Set(address.zip_code.clone());
                active.country = Set(address.country.clone());
                active.updated_at = Set(Utc::now());
                active.update(&txn).await?;
            }
            None => {
                user_address::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    user_id: Set(user_id),
                    first_name: Set(address.first_name.clone()),
                    last_name: Set(address.last_name.clone()),
                    email: Set(address.email.clone()),
                    phone: Set(address.phone.clone()),
                    address: Set(address.address.clone()),
                    city: Set(address.city.clone()),
                    state: Set(address.state.clone()),
                    zip_code: Set(address.zip_code.clone()),
                    country: Set(address.country.clone()),
                    is_default: Set(true),
                    created_at: Set(Utc::now()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;
        Ok(())
    }

    async fn published_book(&self, book_id: Uuid) -> Result<BookModel, ServiceError> {
        Book::find_by_id(book_id)
            .filter(book::Column::Status.eq(BookStatus::Published))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Book {} not found", book_id)))
    }

    fn ensure_stock(&self, book: &BookModel, quantity: i32) -> Result<(), ServiceError> {
        if book.format.requires_shipping() && book.stock_quantity < quantity {
            return Err(ServiceError::InsufficientStock(format!(
                "only {} copies of \"{}\" available",
                book.stock_quantity, book.title
            )));
        }
        Ok(())
    }
}

/// Aggregate counters over a validated snapshot.
pub fn analytics_of(lines: &[CartLine]) -> CartAnalytics {
    let total_items: i32 = lines.iter().map(|l| l.quantity).sum();
    let total_value = subtotal_of(lines);
    let ebook_count: i32 = lines
        .iter()
        .filter(|l| l.book.format.grants_digital_copy())
        .map(|l| l.quantity)
        .sum();
    let physical_count: i32 = lines
        .iter()
        .filter(|l| l.book.format.requires_shipping())
        .map(|l| l.quantity)
        .sum();

    CartAnalytics {
        total_items,
        item_count: lines.len(),
        total_value,
        ebook_count,
        physical_count,
        is_ebook_only: ebook_count > 0 && physical_count == 0,
        is_physical_only: physical_count > 0 && ebook_count == 0,
        is_mixed_cart: ebook_count > 0 && physical_count > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::book::BookFormat;
    use rust_decimal_macros::dec;

    fn line(price: Decimal, quantity: i32, format: BookFormat) -> CartLine {
        let book = BookModel {
            id: Uuid::new_v4(),
            title: "Half of a Yellow Sun".to_string(),
            author_name: "Chimamanda Ngozi Adichie".to_string(),
            price,
            stock_quantity: 5,
            format,
            status: BookStatus::Published,
            cover_image_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        CartLine { book_id: book.id, quantity, book }
    }

    #[test]
    fn analytics_counts_by_format() {
        let lines = vec![
            line(dec!(10.00), 2, BookFormat::Ebook),
            line(dec!(20.00), 1, BookFormat::Physical),
            line(dec!(30.00), 1, BookFormat::Both),
        ];
        let a = analytics_of(&lines);
        assert_eq!(a.total_items, 4);
        assert_eq!(a.item_count, 3);
        assert_eq!(a.total_value, dec!(70.00));
        // "both" counts on each side of the split.
        assert_eq!(a.ebook_count, 3);
        assert_eq!(a.physical_count, 2);
        assert!(a.is_mixed_cart);
        assert!(!a.is_ebook_only);
        assert!(!a.is_physical_only);
    }

    #[test]
    fn analytics_flags_ebook_only_cart() {
        let lines = vec![line(dec!(10.00), 2, BookFormat::Ebook)];
        let a = analytics_of(&lines);
        assert!(a.is_ebook_only);
        assert!(!a.is_physical_only);
        assert!(!a.is_mixed_cart);
    }

    #[test]
    fn analytics_of_empty_cart() {
        let a = analytics_of(&[]);
        assert_eq!(a.total_items, 0);
        assert_eq!(a.total_value, Decimal::ZERO);
        assert!(!a.is_ebook_only);
    }

    #[test]
    fn transfer_summary_serializes_camel_case() {
        let summary = TransferSummary {
            total_items: 2,
            transferred: 1,
            failed: 1,
            shipping_data_saved: true,
            results: vec![],
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["totalItems"], 2);
        assert_eq!(json["shippingDataSaved"], true);
        assert!(json.get("total_items").is_none());
    }
}
