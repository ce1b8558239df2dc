//! HTTP router.

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::{handlers, middleware::auth, state::AppState};

/// Build the application router with every route and middleware layer.
pub fn router(state: AppState) -> Router {
    // Investor routes, authenticated by user bearer tokens
    let user_routes = Router::new()
        .route("/me", get(handlers::account::me))
        .route(
            "/investments",
            post(handlers::investments::create_investment)
                .get(handlers::investments::list_investments),
        )
        .route("/investments/{id}", get(handlers::investments::get_investment))
        .route(
            "/investment/active",
            get(handlers::investments::active_investments),
        )
        // Shares its parameter name with the payment callback route
        .route("/payments/{key}", get(handlers::payments::payment_detail))
        .route(
            "/withdrawals",
            post(handlers::withdrawals::create_withdrawal)
                .get(handlers::withdrawals::list_withdrawals),
        )
        .route(
            "/transactions",
            get(handlers::transactions::list_transactions),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    let admin_routes = Router::new()
        .route("/admin/investments", get(handlers::admin::list_investments))
        .route(
            "/admin/investments/{id}",
            get(handlers::admin::get_investment),
        )
        .route(
            "/admin/investments/{id}/status",
            put(handlers::admin::update_investment_status),
        )
        .route("/admin/withdrawals", get(handlers::admin::list_withdrawals))
        .route(
            "/admin/withdrawals/{id}/approve",
            post(handlers::admin::approve_withdrawal),
        )
        .route(
            "/admin/withdrawals/{id}/reject",
            post(handlers::admin::reject_withdrawal),
        )
        .route(
            "/admin/withdrawals/{id}/retry-payout",
            post(handlers::admin::retry_payout),
        )
        .route(
            "/admin/payment-settings",
            get(handlers::admin::get_payment_settings)
                .put(handlers::admin::update_payment_settings),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        // Public routes; callbacks and the cron trigger carry their own checks
        .route("/health", get(handlers::health::health_check))
        .route("/products", get(handlers::account::list_products))
        .route(
            "/payments/{key}/webhook",
            post(handlers::payments::payment_webhook),
        )
        .route(
            "/payouts/{gateway}/webhook",
            post(handlers::payments::payout_webhook),
        )
        .route("/cron/daily-returns", post(handlers::cron::daily_returns))
        .merge(user_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
