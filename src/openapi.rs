//! OpenAPI documentation aggregation.

use utoipa::OpenApi;

use crate::errors::ErrorResponse;
use crate::handlers::payments::{Customizations, CreateIntentRequest, FlutterwaveInitializeRequest};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ReadnWin Checkout API",
        description = "Order assembly and payment gateway dispatch for the ReadnWin bookstore"
    ),
    paths(
        crate::handlers::payments::create_intent,
        crate::handlers::payments::initialize_flutterwave,
    ),
    components(schemas(
        CreateIntentRequest,
        FlutterwaveInitializeRequest,
        Customizations,
        ErrorResponse,
    )),
    tags(
        (name = "Payments", description = "Payment session creation and gateway dispatch")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = doc.to_json().expect("openapi serializes");
        assert!(json.contains("/api/payment/create-intent"));
        assert!(json.contains("/api/payment/flutterwave/initialize"));
    }
}
