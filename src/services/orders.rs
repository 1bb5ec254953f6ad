use crate::{
    db::DbPool,
    entities::{book, order, order_item, Book, Order, OrderItem, OrderItemModel, OrderModel},
    errors::ServiceError,
    events::{Event, EventSender},
    services::cart::CartLine,
    services::pricing::{Address, Quote},
};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order persistence for the checkout pipeline.
///
/// Writes one order row plus its item rows inside a single transaction and
/// decrements stock for physical lines with an atomic conditional update.
/// Cart lines are left untouched here: clearing waits for payment
/// confirmation so a failed payment keeps the cart intact for retry.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Persist an order from priced cart lines.
    #[instrument(skip_all, fields(%user_id))]
    pub async fn create_order(
        &self,
        user_id: Uuid,
        lines: &[CartLine],
        quote: &Quote,
        currency: &str,
        shipping_address: Option<&Address>,
        billing_address: Option<&Address>,
        payment_method: Option<&str>,
        payment_transaction_id: Option<&str>,
    ) -> Result<OrderModel, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();

        let shipping_json = shipping_address.map(serde_json::to_string).transpose()?;
        let billing_json = billing_address.map(serde_json::to_string).transpose()?;

        let txn = self.db.begin().await?;

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            user_id: Set(user_id),
            status: Set("pending".to_string()),
            payment_status: Set("pending".to_string()),
            subtotal: Set(quote.subtotal.amount),
            tax_amount: Set(quote.tax.amount),
            shipping_amount: Set(quote.shipping.amount),
            discount_amount: Set(quote.discount.amount),
            total_amount: Set(quote.total),
            currency: Set(currency.to_string()),
            payment_method: Set(payment_method.map(str::to_string)),
            payment_transaction_id: Set(payment_transaction_id.map(str::to_string)),
            shipping_address: Set(shipping_json),
            billing_address: Set(billing_json),
            shipping_method: Set(Some(quote.effective_shipping_method.clone())),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let order = order.insert(&txn).await?;

        for line in lines {
            order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                book_id: Set(line.book_id),
                title: Set(line.book.title.clone()),
                author_name: Set(line.book.author_name.clone()),
                price: Set(line.book.price),
                quantity: Set(line.quantity),
                total_price: Set(line.book.price * rust_decimal::Decimal::from(line.quantity)),
                format: Set(line.book.format),
                created_at: Set(Utc::now()),
            }
            .insert(&txn)
            .await?;

            if line.book.format.requires_shipping() {
                // Atomic conditional decrement: the filter re-checks stock at
                // write time, so two concurrent checkouts cannot both drain
                // the same copies.
                let result = Book::update_many()
                    .col_expr(
                        book::Column::StockQuantity,
                        Expr::col(book::Column::StockQuantity).sub(line.quantity),
                    )
                    .filter(book::Column::Id.eq(line.book_id))
                    .filter(book::Column::StockQuantity.gte(line.quantity))
                    .exec(&txn)
                    .await?;

                if result.rows_affected == 0 {
                    // Dropping the transaction rolls back the order row.
                    return Err(ServiceError::InsufficientStock(format!(
                        "\"{}\": requested {}, available {}",
                        line.book.title, line.quantity, line.book.stock_quantity
                    )));
                }
            }
        }

        txn.commit().await?;

        self.event_sender.send_or_log(Event::OrderCreated(order_id)).await;
        info!(%order_id, order_number, "order created");
        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn get_order_items(&self, order_id: Uuid) -> Result<Vec<OrderItemModel>, ServiceError> {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?)
    }

    /// Orders for a user, newest first.
    pub async fn list_user_orders(&self, user_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

/// Opaque, externally visible order number. Time plus randomness keeps it
/// unique without a database round trip.
pub fn generate_order_number() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix)
}
