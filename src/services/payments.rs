use crate::{
    auth::AuthenticatedUser,
    db::DbPool,
    entities::{
        order, payment_transaction, payment_transaction::TransactionStatus, Order,
        PaymentTransaction,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::clients::{
        flutterwave::{FlutterwaveCustomer, FlutterwaveCustomizations, FlutterwaveInitResponse},
        CardProcessorClient, FlutterwaveClient, FlutterwavePaymentData, InlinePaymentData,
        PaymentIntent,
    },
    services::gateway_settings::{credentials_of, GatewaySettings},
};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const FLUTTERWAVE_GATEWAY_ID: &str = "flutterwave";

/// Currencies the processors accept, with per-currency amount ceilings.
const CURRENCY_LIMITS: &[(&str, i64)] = &[
    ("usd", 999_999),
    ("eur", 999_999),
    ("gbp", 999_999),
    ("cad", 999_999),
    ("aud", 999_999),
    ("ngn", 100_000_000),
    ("ghs", 10_000_000),
    ("kes", 50_000_000),
    ("zar", 20_000_000),
];

/// Payment methods the dispatcher routes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Card,
    Flutterwave,
    BankTransfer,
}

impl PaymentMethod {
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "card" | "credit_card" | "stripe" => Ok(Self::Card),
            "flutterwave" => Ok(Self::Flutterwave),
            "bank_transfer" => Ok(Self::BankTransfer),
            other => Err(ServiceError::ValidationError(format!(
                "invalid payment method: {}",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Flutterwave => "flutterwave",
            Self::BankTransfer => "bank_transfer",
        }
    }
}

/// Input for `create_intent`.
#[derive(Debug, Clone)]
pub struct CreateIntentInput {
    pub amount: Decimal,
    pub currency: String,
    pub metadata: Option<Value>,
    pub description: Option<String>,
    pub payment_method: PaymentMethod,
}

/// What the dispatcher produced for a create-intent request.
#[derive(Debug)]
pub enum IntentOutcome {
    /// Card intent created with the external processor; the client confirms
    /// with the secret and a webhook settles it.
    Card(PaymentIntent),
    /// Inline gateway session initialized.
    Flutterwave(Box<FlutterwaveCheckout>),
}

/// A fully initialized Flutterwave payment session.
#[derive(Debug)]
pub struct FlutterwaveCheckout {
    pub response: FlutterwaveInitResponse,
    pub authorization_url: String,
    pub reference: String,
    pub order_number: String,
    pub inline: InlinePaymentData,
}

/// Input for `initialize_flutterwave`.
#[derive(Debug, Clone)]
pub struct InitializeFlutterwaveInput {
    pub amount: Decimal,
    pub currency: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub tx_ref: String,
    pub redirect_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub meta: Option<Value>,
}

/// Payment gateway dispatcher.
///
/// Routes a checkout to the card processor, the inline gateway or the
/// manual bank-transfer flow. Gateway enablement and keys come from the
/// startup-loaded settings cache. For the inline gateway both local rows
/// (provisional order + pending transaction) are written before the network
/// call, with a compensating delete covering the window between the two
/// inserts. This is the one place this service substitutes for a cross-call
/// transaction.
#[derive(Clone)]
pub struct PaymentService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    settings: Arc<GatewaySettings>,
    card_client: CardProcessorClient,
    app_url: String,
    flutterwave_base_url: Option<String>,
}

impl PaymentService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        settings: Arc<GatewaySettings>,
        card_client: CardProcessorClient,
        app_url: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            settings,
            card_client,
            app_url,
            flutterwave_base_url: None,
        }
    }

    /// Point the inline gateway client at a different host. Test hook.
    pub fn with_flutterwave_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.flutterwave_base_url = Some(base_url.into());
        self
    }

    /// Create a payment session for the chosen method.
    #[instrument(skip(self, user, input), fields(user_id = %user.user_id))]
    pub async fn create_intent(
        &self,
        user: &AuthenticatedUser,
        input: CreateIntentInput,
    ) -> Result<IntentOutcome, ServiceError> {
        validate_amount(input.amount, &input.currency)?;

        let metadata = enhanced_metadata(user, input.metadata.clone());

        match input.payment_method {
            PaymentMethod::Card => {
                let description = input.description.clone().unwrap_or_else(|| {
                    format!("Payment for order - {}", user.email)
                });
                let intent = self
                    .card_client
                    .create_payment_intent(
                        input.amount,
                        &input.currency,
                        &metadata,
                        Some(&user.email),
                        Some(&description),
                    )
                    .await?;

                self.event_sender
                    .send_or_log(Event::PaymentIntentCreated {
                        user_id: user.user_id,
                        amount: input.amount,
                        currency: input.currency.clone(),
                    })
                    .await;

                Ok(IntentOutcome::Card(intent))
            }
            PaymentMethod::Flutterwave => {
                let phone = metadata
                    .get("phone_number")
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let checkout = self
                    .initialize_flutterwave(
                        user,
                        InitializeFlutterwaveInput {
                            amount: input.amount,
                            currency: input.currency.to_uppercase(),
                            email: user.email.clone(),
                            phone_number: phone,
                            tx_ref: generate_tx_ref(),
                            redirect_url: None,
                            title: None,
                            description: input.description.clone(),
                            meta: Some(metadata),
                        },
                    )
                    .await?;
                Ok(IntentOutcome::Flutterwave(Box::new(checkout)))
            }
            PaymentMethod::BankTransfer => Err(ServiceError::InvalidOperation(
                "bank transfers are confirmed against the order, not a payment intent".to_string(),
            )),
        }
    }

    /// Initialize an inline gateway session.
    ///
    /// The provisional order exists purely to make the transaction
    /// reference resolvable even if the redirect never completes; payment
    /// confirmation later reconciles it.
    #[instrument(skip(self, user, input), fields(tx_ref = %input.tx_ref))]
    pub async fn initialize_flutterwave(
        &self,
        user: &AuthenticatedUser,
        input: InitializeFlutterwaveInput,
    ) -> Result<FlutterwaveCheckout, ServiceError> {
        if input.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError("Valid amount is required".into()));
        }
        if input.email.trim().is_empty() || input.tx_ref.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Email and transaction reference are required".into(),
            ));
        }

        let gateway = self.settings.enabled(FLUTTERWAVE_GATEWAY_ID)?;

        // One transaction row per reference; a retry after a failure must
        // bring a fresh reference, never reuse a half-created one.
        let already_seen = PaymentTransaction::find()
            .filter(payment_transaction::Column::TransactionId.eq(input.tx_ref.as_str()))
            .one(&*self.db)
            .await?;
        if already_seen.is_some() {
            return Err(ServiceError::Conflict(format!(
                "transaction reference {} already used",
                input.tx_ref
            )));
        }

        let order_number = self.insert_provisional_order(user, &input).await?;

        if let Err(e) = self.insert_pending_transaction(user, &input).await {
            // Compensating action: the two inserts are separate statements,
            // so a failed second insert must take the first row with it.
            self.rollback_provisional_order(&order_number).await;
            error!("failed to record payment transaction: {}", e);
            return Err(ServiceError::InternalError(
                "failed to create payment transaction".into(),
            ));
        }

        let credentials = credentials_of(&gateway);
        let mut client = FlutterwaveClient::new(
            credentials.secret_key,
            credentials.public_key,
            credentials.secret_hash,
            gateway.test_mode,
        );
        if let Some(base_url) = &self.flutterwave_base_url {
            client = client.with_base_url(base_url.clone());
        }

        let payload = self.build_payment_data(&client, user, &input);

        match client.initialize_payment(&payload).await {
            Ok(response) => {
                self.record_gateway_response(&input.tx_ref, &response).await;
                self.event_sender
                    .send_or_log(Event::PaymentInitialized {
                        reference: input.tx_ref.clone(),
                        gateway: FLUTTERWAVE_GATEWAY_ID.to_string(),
                    })
                    .await;

                let inline = client.prepare_inline_payment_data(&payload);
                Ok(FlutterwaveCheckout {
                    authorization_url: response.data.link.clone(),
                    response,
                    reference: input.tx_ref,
                    order_number,
                    inline,
                })
            }
            Err(e) => {
                self.mark_transaction_failed(&input.tx_ref).await;
                self.event_sender
                    .send_or_log(Event::PaymentInitializationFailed {
                        reference: input.tx_ref.clone(),
                        gateway: FLUTTERWAVE_GATEWAY_ID.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Bank-transfer branch: no external call, the order waits for a human
    /// verification workflow to promote it.
    #[instrument(skip(self))]
    pub async fn mark_bank_transfer_pending(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        if order.user_id != user_id {
            return Err(ServiceError::Forbidden("order belongs to another user".into()));
        }

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set("pending".to_string());
        active.payment_method = Set(Some(PaymentMethod::BankTransfer.as_str().to_string()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::BankTransferPending { order_id })
            .await;
        info!(%order_id, "order awaiting bank transfer confirmation");
        Ok(())
    }

    async fn insert_provisional_order(
        &self,
        user: &AuthenticatedUser,
        input: &InitializeFlutterwaveInput,
    ) -> Result<String, ServiceError> {
        // The gateway reference doubles as the temporary order number so the
        // redirect can always be resolved back to a row.
        let order = order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(input.tx_ref.clone()),
            user_id: Set(user.user_id),
            status: Set("pending".to_string()),
            payment_status: Set("pending".to_string()),
            subtotal: Set(input.amount),
            tax_amount: Set(Decimal::ZERO),
            shipping_amount: Set(Decimal::ZERO),
            discount_amount: Set(Decimal::ZERO),
            total_amount: Set(input.amount),
            currency: Set(input.currency.clone()),
            payment_method: Set(Some(PaymentMethod::Flutterwave.as_str().to_string())),
            payment_transaction_id: Set(Some(input.tx_ref.clone())),
            shipping_address: Set(None),
            billing_address: Set(None),
            shipping_method: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };
        let order = order.insert(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::ProvisionalOrderCreated {
                order_number: order.order_number.clone(),
            })
            .await;
        Ok(order.order_number)
    }

    async fn insert_pending_transaction(
        &self,
        user: &AuthenticatedUser,
        input: &InitializeFlutterwaveInput,
    ) -> Result<(), ServiceError> {
        payment_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            transaction_id: Set(input.tx_ref.clone()),
            order_number: Set(input.tx_ref.clone()),
            user_id: Set(user.user_id),
            gateway_type: Set(FLUTTERWAVE_GATEWAY_ID.to_string()),
            amount: Set(input.amount),
            currency: Set(input.currency.clone()),
            status: Set(TransactionStatus::Pending),
            gateway_response: Set(None),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await?;
        Ok(())
    }

    async fn rollback_provisional_order(&self, order_number: &str) {
        let result = Order::delete_many()
            .filter(order::Column::OrderNumber.eq(order_number))
            .exec(&*self.db)
            .await;
        match result {
            Ok(_) => {
                self.event_sender
                    .send_or_log(Event::ProvisionalOrderRolledBack {
                        order_number: order_number.to_string(),
                    })
                    .await;
            }
            Err(e) => {
                // Leaves an orphaned provisional row for reconciliation.
                error!(order_number, "failed to clean up provisional order: {}", e);
            }
        }
    }

    async fn record_gateway_response(&self, tx_ref: &str, response: &FlutterwaveInitResponse) {
        let value = serde_json::to_value(response).unwrap_or(Value::Null);
        if let Err(e) = self
            .update_transaction(tx_ref, |active| {
                active.gateway_response = Set(Some(value));
            })
            .await
        {
            warn!(tx_ref, "failed to store gateway response: {}", e);
        }
    }

    async fn mark_transaction_failed(&self, tx_ref: &str) {
        if let Err(e) = self
            .update_transaction(tx_ref, |active| {
                active.status = Set(TransactionStatus::Failed);
            })
            .await
        {
            error!(tx_ref, "failed to mark transaction failed: {}", e);
        }
    }

    async fn update_transaction(
        &self,
        tx_ref: &str,
        apply: impl FnOnce(&mut payment_transaction::ActiveModel),
    ) -> Result<(), ServiceError> {
        let row = PaymentTransaction::find()
            .filter(payment_transaction::Column::TransactionId.eq(tx_ref))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("payment transaction {} not found", tx_ref))
            })?;

        let mut active: payment_transaction::ActiveModel = row.into();
        apply(&mut active);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }

    fn build_payment_data(
        &self,
        client: &FlutterwaveClient,
        user: &AuthenticatedUser,
        input: &InitializeFlutterwaveInput,
    ) -> FlutterwavePaymentData {
        let redirect_url = input
            .redirect_url
            .clone()
            .unwrap_or_else(|| format!("{}/payment/verify", self.app_url));
        let hash = client.payment_hash(&input.tx_ref, input.amount, &input.currency, &input.email);

        FlutterwavePaymentData {
            tx_ref: input.tx_ref.clone(),
            amount: input.amount.to_f64().unwrap_or_default(),
            currency: input.currency.to_uppercase(),
            redirect_url,
            customer: FlutterwaveCustomer {
                email: input.email.clone(),
                phone_number: input.phone_number.clone().unwrap_or_default(),
                name: user.display_name(),
            },
            customizations: FlutterwaveCustomizations {
                title: input.title.clone().unwrap_or_else(|| "ReadnWin Payment".to_string()),
                description: input
                    .description
                    .clone()
                    .unwrap_or_else(|| "Payment for your order".to_string()),
                logo: format!("{}/logo.png", self.app_url),
            },
            meta: input.meta.clone(),
            hash: Some(hash),
        }
    }
}

/// Amount sanity checks shared by both processors.
pub fn validate_amount(amount: Decimal, currency: &str) -> Result<(), ServiceError> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::ValidationError("Valid amount is required".into()));
    }

    let currency = currency.to_ascii_lowercase();
    let Some((_, limit)) = CURRENCY_LIMITS.iter().find(|(code, _)| *code == currency) else {
        let supported: Vec<&str> = CURRENCY_LIMITS.iter().map(|(code, _)| *code).collect();
        return Err(ServiceError::ValidationError(format!(
            "Invalid currency. Supported currencies: {}",
            supported.join(", ")
        )));
    };

    if amount > Decimal::from(*limit) {
        return Err(ServiceError::ValidationError(format!(
            "Amount exceeds maximum limit for {}",
            currency.to_uppercase()
        )));
    }
    Ok(())
}

/// Gateway transaction reference: time plus randomness, regenerated on
/// every attempt.
pub fn generate_tx_ref() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();
    format!("TXN-{}-{}", Utc::now().timestamp_millis(), suffix)
}

fn enhanced_metadata(user: &AuthenticatedUser, metadata: Option<Value>) -> Value {
    let mut merged = match metadata {
        Some(Value::Object(map)) => Value::Object(map),
        _ => json!({}),
    };
    if let Value::Object(map) = &mut merged {
        map.insert("user_id".to_string(), json!(user.user_id));
        map.insert("user_email".to_string(), json!(user.email));
        map.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));
    }
    merged
}
