use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::checkout::create_checkout_session,
        crate::api::webhooks::stripe_webhook,
        crate::api::purchases::course_access_status
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::checkout::CreateCheckoutSessionBody,
            crate::api::webhooks::CheckoutSessionObject,
            crate::api::webhooks::SessionMetadata
        )
    ),
    tags(
        (name = "auth", description = "Authentication"),
        (name = "checkout", description = "Checkout session creation"),
        (name = "webhooks", description = "Callbacks from the payment provider"),
        (name = "purchases", description = "Purchase state and course access")
    )
)]
pub struct ApiDoc;
