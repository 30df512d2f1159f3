mod billing;
mod config;
mod db;
mod models;
mod responses;
mod routes;
mod services;
mod state;
pub mod utils;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::Method;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use config::Config;
use db::customer_repository::CustomerStore;
use db::order_repository::OrderStore;
use db::postgres_customer_repository::PostgresCustomerStore;
use db::postgres_order_repository::PostgresOrderStore;
use db::postgres_subscription_repository::PostgresSubscriptionStore;
use db::postgres_trial_email_repository::PostgresTrialEmailStore;
use db::postgres_user_repository::PostgresUserRepository;
use db::subscription_repository::SubscriptionStore;
use db::trial_email_repository::TrialEmailStore;
use db::user_repository::UserRepository;
use responses::ErrorResponse;
use routes::cancel::cancel_subscription;
use routes::checkout::create_checkout_session;
use routes::products::list_products;
use routes::webhook::stripe_webhook;
use serde_json::json;
use services::notifier::{LogNotifier, TrialNotifier};
use services::stripe::{LiveStripeService, StripeService};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use utils::jwt::JwtKeys;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                ErrorResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to cleanup old IPs
    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let config = Arc::new(Config::from_env());
    let jwt_keys = Arc::new(JwtKeys::from_env().expect("Invalid JWT secret"));

    let pg_pool = establish_connection(&config.database_url).await;
    let users = Arc::new(PostgresUserRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn UserRepository>;
    let customers = Arc::new(PostgresCustomerStore {
        pool: pg_pool.clone(),
    }) as Arc<dyn CustomerStore>;
    let subscriptions = Arc::new(PostgresSubscriptionStore {
        pool: pg_pool.clone(),
    }) as Arc<dyn SubscriptionStore>;
    let orders = Arc::new(PostgresOrderStore {
        pool: pg_pool.clone(),
    }) as Arc<dyn OrderStore>;
    let trial_emails = Arc::new(PostgresTrialEmailStore {
        pool: pg_pool.clone(),
    }) as Arc<dyn TrialEmailStore>;

    let stripe = Arc::new(LiveStripeService::from_settings(&config.stripe)) as Arc<dyn StripeService>;
    let notifier = Arc::new(LogNotifier) as Arc<dyn TrialNotifier>;

    let state = AppState {
        users,
        customers,
        subscriptions,
        orders,
        trial_emails,
        stripe,
        notifier,
        config: config.clone(),
        jwt_keys,
    };

    // Checkout redirects can originate anywhere the marketing site is
    // embedded, so the billing API is open CORS with bearer auth.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let billing_routes = Router::new()
        .route("/checkout", post(create_checkout_session))
        .route("/cancel-subscription", post(cancel_subscription))
        .route("/products", get(list_products))
        .layer(GovernorLayer {
            config: governor_conf.clone(),
        });

    // The webhook stays outside the rate limiter: provider redeliveries must
    // never be throttled into retry storms.
    let app = Router::new()
        .route("/", get(root))
        .nest("/api/billing", billing_routes)
        .route("/api/stripe/webhook", post(stripe_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr: SocketAddr = config.bind_addr.parse().expect("Invalid BIND_ADDR");

    let listener = TcpListener::bind(addr).await.unwrap();
    info!("Listening at http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}

async fn root() -> Response {
    Json(json!({ "status": "ok" })).into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("✅ Successfully connected to the database");
    pool
}
