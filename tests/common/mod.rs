#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use readnwin_api::{
    auth::AuthenticatedUser,
    db::{self, DbPool},
    entities::{
        book::{self, BookFormat, BookStatus},
        cart_item, payment_gateway, shipping_method,
    },
    events::{self, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Helper harness backed by a throwaway SQLite database.
pub struct TestApp {
    pub db: Arc<DbPool>,
    pub event_sender: Arc<EventSender>,
    db_path: std::path::PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_path = std::env::temp_dir().join(format!("readnwin_test_{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let pool = db::establish_connection(&url)
            .await
            .expect("failed to create test database");

        for statement in SCHEMA {
            pool.execute_unprepared(statement)
                .await
                .expect("failed to create test schema");
        }

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        Self {
            db: Arc::new(pool),
            event_sender: Arc::new(EventSender::new(event_tx)),
            db_path,
            _event_task: event_task,
        }
    }

    /// Replace one table with a custom definition (constraint variations).
    pub async fn recreate_table(&self, drop: &str, create: &str) {
        self.db
            .execute_unprepared(drop)
            .await
            .expect("failed to drop table");
        self.db
            .execute_unprepared(create)
            .await
            .expect("failed to recreate table");
    }

    /// A signed-in caller.
    pub fn test_user(&self) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            email: "reader@example.com".to_string(),
            name: Some("Test Reader".to_string()),
        }
    }

    /// Seed a published book.
    pub async fn seed_book(
        &self,
        price: Decimal,
        stock_quantity: i32,
        format: BookFormat,
    ) -> book::Model {
        let model = book::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set("The Famished Road".to_string()),
            author_name: Set("Ben Okri".to_string()),
            price: Set(price),
            stock_quantity: Set(stock_quantity),
            format: Set(format),
            status: Set(BookStatus::Published),
            cover_image_url: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        model.insert(&*self.db).await.expect("failed to seed book")
    }

    /// Seed a book in a given status.
    pub async fn seed_book_with_status(
        &self,
        price: Decimal,
        format: BookFormat,
        status: BookStatus,
    ) -> book::Model {
        let model = book::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set("Purple Hibiscus".to_string()),
            author_name: Set("Chimamanda Ngozi Adichie".to_string()),
            price: Set(price),
            stock_quantity: Set(10),
            format: Set(format),
            status: Set(status),
            cover_image_url: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        model.insert(&*self.db).await.expect("failed to seed book")
    }

    /// Seed a cart line directly, bypassing the service-level stock checks.
    pub async fn seed_cart_line(&self, user_id: Uuid, book_id: Uuid, quantity: i32) {
        cart_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            book_id: Set(book_id),
            quantity: Set(quantity),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed cart line");
    }

    /// Seed an active shipping method.
    pub async fn seed_shipping_method(
        &self,
        base_cost: Decimal,
        cost_per_item: Decimal,
        free_shipping_threshold: Option<Decimal>,
    ) -> shipping_method::Model {
        shipping_method::ActiveModel {
            id: Set(1),
            name: Set("Standard Delivery".to_string()),
            base_cost: Set(base_cost),
            cost_per_item: Set(cost_per_item),
            free_shipping_threshold: Set(free_shipping_threshold),
            estimated_days_min: Set(3),
            estimated_days_max: Set(7),
            is_active: Set(true),
            sort_order: Set(1),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .expect("failed to seed shipping method")
    }

    /// An enabled Flutterwave gateway row for the settings cache.
    pub fn flutterwave_gateway(&self, enabled: bool) -> payment_gateway::Model {
        payment_gateway::Model {
            gateway_id: "flutterwave".to_string(),
            name: "Flutterwave".to_string(),
            enabled,
            test_mode: true,
            public_key: Some("pk_test_readnwin".to_string()),
            secret_key: Some("sk_test_readnwin".to_string()),
            secret_hash: Some("readnwin_hash".to_string()),
            config: None,
            updated_at: Utc::now(),
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_path);
    }
}

/// Minimal schema mirroring the production tables this service touches.
const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS books (
        id TEXT PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        author_name TEXT NOT NULL,
        price REAL NOT NULL,
        stock_quantity INTEGER NOT NULL,
        format TEXT NOT NULL,
        status TEXT NOT NULL,
        cover_image_url TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS cart_items (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        book_id TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY NOT NULL,
        order_number TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL,
        status TEXT NOT NULL,
        payment_status TEXT NOT NULL,
        subtotal REAL NOT NULL,
        tax_amount REAL NOT NULL,
        shipping_amount REAL NOT NULL,
        discount_amount REAL NOT NULL,
        total_amount REAL NOT NULL,
        currency TEXT NOT NULL,
        payment_method TEXT,
        payment_transaction_id TEXT,
        shipping_address TEXT,
        billing_address TEXT,
        shipping_method TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS order_items (
        id TEXT PRIMARY KEY NOT NULL,
        order_id TEXT NOT NULL,
        book_id TEXT NOT NULL,
        title TEXT NOT NULL,
        author_name TEXT NOT NULL,
        price REAL NOT NULL,
        quantity INTEGER NOT NULL,
        total_price REAL NOT NULL,
        format TEXT NOT NULL,
        created_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS payment_transactions (
        id TEXT PRIMARY KEY NOT NULL,
        transaction_id TEXT NOT NULL UNIQUE,
        order_number TEXT NOT NULL,
        user_id TEXT NOT NULL,
        gateway_type TEXT NOT NULL,
        amount REAL NOT NULL,
        currency TEXT NOT NULL,
        status TEXT NOT NULL,
        gateway_response TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS payment_gateways (
        gateway_id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        enabled INTEGER NOT NULL,
        test_mode INTEGER NOT NULL,
        public_key TEXT,
        secret_key TEXT,
        secret_hash TEXT,
        config TEXT,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS shipping_methods (
        id INTEGER PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        base_cost REAL NOT NULL,
        cost_per_item REAL NOT NULL,
        free_shipping_threshold REAL,
        estimated_days_min INTEGER NOT NULL,
        estimated_days_max INTEGER NOT NULL,
        is_active INTEGER NOT NULL,
        sort_order INTEGER NOT NULL,
        created_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS user_addresses (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT,
        phone TEXT,
        address TEXT NOT NULL,
        city TEXT NOT NULL,
        state TEXT NOT NULL,
        zip_code TEXT NOT NULL,
        country TEXT NOT NULL,
        is_default INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
];
