//! Booking contract against a real Postgres. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

mod common;

use axum::{http::StatusCode, Router};
use barbershop_api::{
    db::{self, tenant::schema_name},
    error::{ApiError, SLOT_TAKEN},
    models::{
        availability::BlockInput,
        barber::CreateBarberRequest,
        service::CreateServiceRequest,
        tenant::CreateBarbershopRequest,
        user::UserRole,
    },
    services::{
        availability::AvailabilityService, barbers::BarberService, catalog::CatalogService,
        tenants::TenantService,
    },
};
use chrono::{Duration, NaiveTime, Utc};
use common::{app_with_pool, body_json, json_body, request, token};
use rand::{distributions::Alphanumeric, Rng};
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::task::JoinSet;
use tower::ServiceExt;
use uuid::Uuid;

struct Shop {
    pool: PgPool,
    app: Router,
    slug: String,
    barber_id: Uuid,
    service_id: Uuid,
}

impl Shop {
    /// A fresh barbershop (UTC hours) with one barber working 08:00-20:00
    /// every day and a 30 minute service.
    async fn open() -> Shop {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = db::create_pool(&url).await.unwrap();
        db::run_migrations(&pool).await.unwrap();

        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        let slug = format!("test-{suffix}");

        TenantService::create(
            &pool,
            &CreateBarbershopRequest {
                slug: slug.clone(),
                name: "Test Cuts".into(),
                address: None,
                phone: None,
                email: None,
                timezone_offset_minutes: Some(0),
                plan: None,
            },
        )
        .await
        .unwrap();

        let barber = BarberService::create(
            &pool,
            &slug,
            &CreateBarberRequest {
                display_name: "Marco".into(),
                bio: None,
                account: None,
            },
        )
        .await
        .unwrap();

        let service = CatalogService::create(
            &pool,
            &slug,
            &CreateServiceRequest {
                name: "Classic cut".into(),
                description: None,
                duration_minutes: 30,
                price_cents: Some(2500),
            },
        )
        .await
        .unwrap();

        let blocks: Vec<BlockInput> = (0..7)
            .map(|weekday| BlockInput {
                weekday,
                start_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            })
            .collect();
        AvailabilityService::replace(&pool, &slug, barber.id, &blocks)
            .await
            .unwrap();

        Shop {
            app: app_with_pool(pool.clone(), &url),
            pool,
            slug,
            barber_id: barber.id,
            service_id: service.id,
        }
    }

    async fn post_booking(&self, body: Value) -> (StatusCode, Value) {
        self.send("POST", "/bookings", Some(body)).await
    }

    async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = request(method, uri)
            .header("X-Tenant", &self.slug)
            .header("Authorization", format!("Bearer {}", token(UserRole::Owner, &self.slug)))
            .header("Content-Type", "application/json");
        let body = match body {
            Some(value) => json_body(&value),
            None => axum::body::Body::empty(),
        };
        let res = self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = res.status();
        (status, body_json(res).await)
    }

    fn booking_at(&self, start: chrono::DateTime<Utc>) -> Value {
        json!({
            "barber_id": self.barber_id,
            "service_id": self.service_id,
            "start_at": start.to_rfc3339(),
            "client_name": "Ana Ruiz",
            "client_email": "ana@example.com",
        })
    }

    async fn close(self) {
        TenantService::remove(&self.pool, &self.slug).await.unwrap();
    }
}

fn tomorrow_at(hour: u32, minute: u32) -> chrono::DateTime<Utc> {
    let day = (Utc::now() + Duration::days(1)).date_naive();
    day.and_hms_opt(hour, minute, 0).unwrap().and_utc()
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn create_then_overlap_is_409() {
    let shop = Shop::open().await;

    let (status, created) = shop.post_booking(shop.booking_at(tomorrow_at(10, 0))).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["status"], "confirmed");
    assert_eq!(created["price_cents"], 2500);
    assert_eq!(created["confirmation_code"].as_str().unwrap().len(), 6);

    // same start
    let (status, body) = shop.post_booking(shop.booking_at(tomorrow_at(10, 0))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "This time slot overlaps an existing booking");

    // partial overlap
    let (status, _) = shop.post_booking(shop.booking_at(tomorrow_at(10, 15))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // back to back is fine
    let (status, _) = shop.post_booking(shop.booking_at(tomorrow_at(10, 30))).await;
    assert_eq!(status, StatusCode::CREATED);

    shop.close().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn missing_fields_are_400() {
    let shop = Shop::open().await;

    let (status, body) = shop.post_booking(json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("barber_id"), "{error}");
    assert!(error.contains("client_name"), "{error}");

    let (status, _) = shop
        .post_booking(json!({
            "barber_id": shop.barber_id,
            "service_id": shop.service_id,
            "client_name": "Ana Ruiz",
        }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    shop.close().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn outside_working_hours_is_400() {
    let shop = Shop::open().await;
    let (status, _) = shop.post_booking(shop.booking_at(tomorrow_at(19, 45))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    shop.close().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn cancelled_slot_can_be_rebooked() {
    let shop = Shop::open().await;

    let (_, created) = shop.post_booking(shop.booking_at(tomorrow_at(11, 0))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let res = shop
        .app
        .clone()
        .oneshot(
            request("POST", &format!("/bookings/{id}/cancel"))
                .header("X-Tenant", &shop.slug)
                .header("Authorization", format!("Bearer {}", token(UserRole::Owner, &shop.slug)))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "cancelled");

    let (status, _) = shop.post_booking(shop.booking_at(tomorrow_at(11, 0))).await;
    assert_eq!(status, StatusCode::CREATED);

    shop.close().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn slots_hide_booked_times() {
    let shop = Shop::open().await;
    let (status, _) = shop.post_booking(shop.booking_at(tomorrow_at(9, 0))).await;
    assert_eq!(status, StatusCode::CREATED);

    let date = tomorrow_at(0, 0).date_naive();
    let res = shop
        .app
        .clone()
        .oneshot(
            request(
                "GET",
                &format!(
                    "/availability?barber_id={}&service_id={}&date={date}",
                    shop.barber_id, shop.service_id
                ),
            )
            .header("X-Tenant", &shop.slug)
            .body(axum::body::Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    let slots = body["slots"].as_array().unwrap();
    // 08:00 to 20:00 every 30 minutes
    assert_eq!(slots.len(), 24);
    let nine = slots
        .iter()
        .find(|s| s["start_at"].as_str().unwrap().contains("T09:00:00"))
        .unwrap();
    assert_eq!(nine["available"], json!(false));

    shop.close().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn exclusion_constraint_catches_overlaps_the_precheck_missed() {
    let shop = Shop::open().await;
    let (status, _) = shop.post_booking(shop.booking_at(tomorrow_at(14, 0))).await;
    assert_eq!(status, StatusCode::CREATED);

    // bypass the service layer, as a racing request would
    let schema = schema_name(&shop.slug);
    let err = sqlx::query(&format!(
        r#"INSERT INTO "{schema}".bookings
             (barber_id, service_id, client_name, start_at, end_at, confirmation_code)
           VALUES ($1, $2, 'Luis Mora', $3, $4, 'RAW001')"#
    ))
    .bind(shop.barber_id)
    .bind(shop.service_id)
    .bind(tomorrow_at(14, 15))
    .bind(tomorrow_at(14, 45))
    .execute(&shop.pool)
    .await
    .unwrap_err();

    let (status, axum::Json(body)) = ApiError::from(err).into_rejection(false);
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], SLOT_TAKEN);

    shop.close().await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn racing_cancel_and_complete_settle_on_one_outcome() {
    let shop = std::sync::Arc::new(Shop::open().await);
    let (_, created) = shop.post_booking(shop.booking_at(tomorrow_at(15, 0))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let mut requests = JoinSet::new();
    for i in 0..20 {
        let shop = shop.clone();
        let id = id.clone();
        requests.spawn(async move {
            if i % 2 == 0 {
                let (status, _) = shop.send("POST", &format!("/bookings/{id}/cancel"), None).await;
                ("cancelled", status)
            } else {
                let (status, _) = shop
                    .send("PUT", &format!("/bookings/{id}"), Some(json!({ "status": "completed" })))
                    .await;
                ("completed", status)
            }
        });
    }

    let mut winners = Vec::new();
    while let Some(joined) = requests.join_next().await {
        let (outcome, status) = joined.unwrap();
        match status {
            StatusCode::OK => winners.push(outcome),
            StatusCode::CONFLICT => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(winners.len(), 1, "{winners:?}");

    let (_, booking) = shop.send("GET", &format!("/bookings/{id}"), None).await;
    assert_eq!(booking["status"], winners[0]);

    // terminal now: both paths refuse
    let (status, _) = shop.send("POST", &format!("/bookings/{id}/cancel"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = shop
        .send("PUT", &format!("/bookings/{id}"), Some(json!({ "status": "no_show" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let Ok(shop) = std::sync::Arc::try_unwrap(shop) else {
        panic!("request tasks still hold the shop");
    };
    shop.close().await;
}
