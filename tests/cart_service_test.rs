mod common;

use common::TestApp;
use readnwin_api::{
    entities::book::{BookFormat, BookStatus},
    errors::ServiceError,
    services::CartService,
};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn cart_service(app: &TestApp) -> CartService {
    CartService::new(app.db.clone(), app.event_sender.clone())
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn add_item_creates_then_increments_a_line() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();
    let book = app.seed_book(dec!(10), 5, BookFormat::Ebook).await;

    let item = service.add_item(user, book.id, 2).await.expect("add");
    assert_eq!(item.quantity, 2);

    let item = service.add_item(user, book.id, 1).await.expect("add again");
    assert_eq!(item.quantity, 3);

    let lines = service.snapshot(user).await.expect("snapshot");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 3);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn add_item_rejects_exceeding_physical_stock() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();
    let book = app.seed_book(dec!(10), 1, BookFormat::Physical).await;

    let err = service.add_item(user, book.id, 5).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // E-books are never stock-limited.
    let ebook = app.seed_book(dec!(10), 0, BookFormat::Ebook).await;
    assert!(service.add_item(user, ebook.id, 5).await.is_ok());
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn update_quantity_zero_removes_the_line() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();
    let book = app.seed_book(dec!(10), 5, BookFormat::Ebook).await;

    service.add_item(user, book.id, 2).await.expect("add");
    let updated = service.update_quantity(user, book.id, 0).await.expect("update");
    assert!(updated.is_none());
    assert!(service.snapshot(user).await.expect("snapshot").is_empty());
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn snapshot_drops_lines_for_unpublished_books() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();

    let live = app.seed_book(dec!(10), 5, BookFormat::Ebook).await;
    let draft = app
        .seed_book_with_status(dec!(15), BookFormat::Ebook, BookStatus::Draft)
        .await;
    app.seed_cart_line(user, live.id, 1).await;
    app.seed_cart_line(user, draft.id, 1).await;
    // Dangling reference: the book row is gone entirely.
    app.seed_cart_line(user, Uuid::new_v4(), 1).await;

    let lines = service.snapshot(user).await.expect("snapshot");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].book_id, live.id);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn checkout_snapshot_refuses_an_empty_cart() {
    let app = TestApp::new().await;
    let service = cart_service(&app);

    let err = service.checkout_snapshot(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ServiceError::EmptyCart));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn clear_after_payment_preserves_cart_until_confirmed() {
    use chrono::Utc;
    use readnwin_api::entities::order;
    use sea_orm::{ActiveModelTrait, Set};

    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();
    let book = app.seed_book(dec!(10), 5, BookFormat::Ebook).await;
    service.add_item(user, book.id, 1).await.expect("add");

    let order_id = Uuid::new_v4();
    order::ActiveModel {
        id: Set(order_id),
        order_number: Set(format!("ORD-TEST-{}", order_id)),
        user_id: Set(user),
        status: Set("pending".to_string()),
        payment_status: Set("pending".to_string()),
        subtotal: Set(dec!(10)),
        tax_amount: Set(dec!(0)),
        shipping_amount: Set(dec!(0)),
        discount_amount: Set(dec!(0)),
        total_amount: Set(dec!(10)),
        currency: Set("NGN".to_string()),
        payment_method: Set(None),
        payment_transaction_id: Set(None),
        shipping_address: Set(None),
        billing_address: Set(None),
        shipping_method: Set(None),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
    }
    .insert(&*app.db)
    .await
    .expect("seed order");

    // Payment still pending: the cart must survive.
    let cleared = service.clear_after_payment(user, order_id).await.expect("check");
    assert!(!cleared);
    assert_eq!(service.snapshot(user).await.expect("snapshot").len(), 1);
}
