mod common;

use common::TestApp;
use readnwin_api::{
    entities::book::BookFormat,
    entities::{user_address, UserAddress},
    services::cart::{GuestCartLine, TransferLineStatus},
    services::pricing::Address,
    services::CartService,
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

fn cart_service(app: &TestApp) -> CartService {
    CartService::new(app.db.clone(), app.event_sender.clone())
}

fn guest_address() -> Address {
    Address {
        first_name: "Ngozi".to_string(),
        last_name: "Eze".to_string(),
        email: Some("ngozi@example.com".to_string()),
        phone: None,
        address: "4 Aba Road".to_string(),
        city: "Port Harcourt".to_string(),
        state: "Rivers".to_string(),
        zip_code: "500001".to_string(),
        country: "NG".to_string(),
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn repeating_a_transfer_sums_quantities_instead_of_duplicating() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();
    let book = app.seed_book(dec!(10), 5, BookFormat::Ebook).await;

    let lines = vec![GuestCartLine { book_id: book.id, quantity: 2 }];
    let first = service.transfer_guest_cart(user, &lines, None).await.expect("transfer");
    assert_eq!(first.transferred, 1);

    // Retry of the same payload: cumulative quantity, single row.
    let second = service.transfer_guest_cart(user, &lines, None).await.expect("retry");
    assert_eq!(second.transferred, 1);

    let snapshot = service.snapshot(user).await.expect("snapshot");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].quantity, 4);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn a_failing_line_does_not_abort_the_rest() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();
    let book = app.seed_book(dec!(10), 5, BookFormat::Ebook).await;

    let lines = vec![
        GuestCartLine { book_id: Uuid::new_v4(), quantity: 1 }, // no such book
        GuestCartLine { book_id: book.id, quantity: 0 },        // bad quantity
        GuestCartLine { book_id: book.id, quantity: 1 },
    ];

    let summary = service.transfer_guest_cart(user, &lines, None).await.expect("transfer");
    assert_eq!(summary.total_items, 3);
    assert_eq!(summary.transferred, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.results[0].status, TransferLineStatus::Failed);
    assert_eq!(summary.results[1].status, TransferLineStatus::Failed);
    assert_eq!(summary.results[2].status, TransferLineStatus::Transferred);

    let snapshot = service.snapshot(user).await.expect("snapshot");
    assert_eq!(snapshot.len(), 1);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn stock_shortfall_is_tolerated_at_transfer_time() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();
    // One copy in stock, five requested: the transfer still proceeds; the
    // order writer is where stock is enforced.
    let book = app.seed_book(dec!(25), 1, BookFormat::Physical).await;

    let lines = vec![GuestCartLine { book_id: book.id, quantity: 5 }];
    let summary = service.transfer_guest_cart(user, &lines, None).await.expect("transfer");
    assert_eq!(summary.transferred, 1);
    assert_eq!(summary.failed, 0);

    let snapshot = service.snapshot(user).await.expect("snapshot");
    assert_eq!(snapshot[0].quantity, 5);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn shipping_address_is_saved_even_when_every_line_fails() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();

    let lines = vec![GuestCartLine { book_id: Uuid::new_v4(), quantity: 1 }];
    let summary = service
        .transfer_guest_cart(user, &lines, Some(&guest_address()))
        .await
        .expect("transfer");

    assert_eq!(summary.failed, 1);
    assert!(summary.shipping_data_saved);

    let saved = UserAddress::find()
        .filter(user_address::Column::UserId.eq(user))
        .one(&*app.db)
        .await
        .expect("query")
        .expect("address saved");
    assert!(saved.is_default);
    assert_eq!(saved.city, "Port Harcourt");
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn second_transfer_updates_the_default_address_in_place() {
    let app = TestApp::new().await;
    let service = cart_service(&app);
    let user = Uuid::new_v4();

    service
        .transfer_guest_cart(user, &[], Some(&guest_address()))
        .await
        .expect("first transfer");

    let mut updated = guest_address();
    updated.city = "Enugu".to_string();
    service
        .transfer_guest_cart(user, &[], Some(&updated))
        .await
        .expect("second transfer");

    let rows = UserAddress::find()
        .filter(user_address::Column::UserId.eq(user))
        .all(&*app.db)
        .await
        .expect("query");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].city, "Enugu");
}
