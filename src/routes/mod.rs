pub mod auth;
pub mod availability;
pub mod barbers;
pub mod bookings;
pub mod dashboard;
pub mod health;
pub mod metrics;
pub mod services;
pub mod signup;
pub mod tenant_info;
pub mod tenants;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    error::{reject, Rejection},
    middleware::auth::JwtSecret,
    models::{auth::AuthenticatedUser, user::UserRole},
    AppState,
};

/// Checks that the token belongs to `tenant` and that its role passes
/// `allowed`. Super-admin tokens are valid for every tenant.
pub(crate) fn authorize(
    user: &AuthenticatedUser,
    tenant: &str,
    allowed: impl Fn(UserRole) -> bool,
) -> Result<(), Rejection> {
    if user.role != UserRole::SuperAdmin && user.tenant != tenant {
        return Err(reject(StatusCode::FORBIDDEN, "Tenant mismatch"));
    }
    if !allowed(user.role) {
        return Err(reject(StatusCode::FORBIDDEN, "Access denied"));
    }
    Ok(())
}

pub(crate) fn any_role(_: UserRole) -> bool {
    true
}

/// Allows the app base URL, its subdomains (one per barbershop) and
/// localhost during development.
fn cors_layer(base_url: String) -> CorsLayer {
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        if o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") {
            return true;
        }
        if o == base_url {
            return true;
        }
        if let Some(idx) = base_url.find("://") {
            let after_scheme = &base_url[idx + 3..];
            let domain = after_scheme.split('/').next().unwrap_or(after_scheme);
            let domain = domain.split(':').next().unwrap_or(domain);
            if o.ends_with(&format!(".{domain}")) {
                return true;
            }
        }
        false
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-tenant"),
            header::HeaderName::from_static("x-super-admin-key"),
        ]))
        .allow_origin(origin)
}

pub fn router(state: AppState) -> Router {
    let jwt_secret = JwtSecret(state.config.jwt_secret.clone());
    let cors = cors_layer(state.config.app_base_url.clone());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Onboarding
        .route("/signup/check-slug", get(signup::check_slug))
        .route("/signup", post(signup::signup))
        .route("/tenant/info", get(tenant_info::get_tenant_info))
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Barbers and their weekly hours
        .route("/barbers", get(barbers::list_barbers).post(barbers::create_barber))
        .route(
            "/barbers/{id}",
            get(barbers::get_barber)
                .put(barbers::update_barber)
                .delete(barbers::delete_barber),
        )
        .route(
            "/barbers/{id}/availability",
            get(availability::get_schedule).put(availability::set_schedule),
        )
        .route("/availability", get(availability::list_slots))
        // Service menu
        .route("/services", get(services::list_services).post(services::create_service))
        .route(
            "/services/{id}",
            put(services::update_service).delete(services::delete_service),
        )
        // Bookings
        .route("/bookings", get(bookings::list_bookings).post(bookings::create_booking))
        .route(
            "/bookings/{id}",
            get(bookings::get_booking)
                .put(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
        .route("/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/dashboard/summary", get(dashboard::summary))
        // Super-admin
        .route(
            "/super-admin/barbershops",
            get(tenants::list_barbershops).post(tenants::create_barbershop),
        )
        .route(
            "/super-admin/barbershops/{slug}",
            put(tenants::update_barbershop).delete(tenants::delete_barbershop),
        )
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
