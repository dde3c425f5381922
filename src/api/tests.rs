use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use super::create_router;
use crate::auth::{hash_password, Role};
use crate::db;
use crate::services::orders::tests::product;
use crate::state::{tests::test_state, AppState};

struct TestApp {
    state: AppState,
    router: axum::Router,
}

impl TestApp {
    async fn new() -> Self {
        let state = test_state().await;
        Self { router: create_router(state.clone()), state }
    }

    fn admin_token(&self) -> String {
        self.state.jwt.generate_token(Uuid::new_v4(), "admin@webshop.test", Role::Admin).unwrap()
    }

    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();
        let res = self.router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) { self.send(Method::GET, uri, token, None).await }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }
}

fn num(v: &Value) -> f64 { v.as_f64().unwrap_or(f64::NAN) }

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_requires_token() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/customers", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");
    let (status, _) = app.get("/api/customers", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_roles_are_separated() {
    let app = TestApp::new().await;
    let customer = app.state.jwt.generate_token(Uuid::new_v4(), "klant@example.nl", Role::Customer).unwrap();
    for uri in ["/api/customers", "/api/profit/dashboard", "/api/shipping/rules"] {
        let (status, body) = app.get(uri, Some(&customer)).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["error"]["code"], "forbidden");
    }
    let (status, _) = app.get("/api/portal/me", Some(&app.admin_token())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_login_flow() {
    let app = TestApp::new().await;
    let hash = hash_password("correct horse").unwrap();
    db::users::insert(&app.state.db, "admin@webshop.test", "Admin", &hash).await.unwrap();

    let (status, body) = app.post("/api/auth/login", None, json!({ "email": "Admin@Webshop.test", "password": "wrong" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_credentials");

    let (status, body) = app.post("/api/auth/login", None, json!({ "email": "admin@webshop.test", "password": "correct horse" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "admin@webshop.test");

    // Admin credentials are not valid on the customer login.
    let (status, _) = app.post("/api/auth/customer/login", None, json!({ "email": "admin@webshop.test", "password": "correct horse" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_shipping_calculate() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let (status, body) = app.post("/api/shipping/calculate", Some(&admin), json!({ "weight": 500, "destination": "NL" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&body["cost"]), 5.95);
    assert_eq!(body["free_shipping"], false);
    assert_eq!(body["billable_weight"], 500);

    let (status, body) = app.post("/api/shipping/calculate", Some(&admin), json!({ "weight": 500, "destination": "US" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "no_shipping_rule");
    assert_eq!(body["error"]["details"]["destination"], "US");
}

#[tokio::test]
async fn test_vat_endpoints() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let (status, body) = app.post("/api/shipping/vat", Some(&admin), json!({ "amountExcl": 100, "rate": 0.21 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&body["amountIncl"]), 121.0);
    assert_eq!(num(&body["vatAmount"]), 21.0);

    let (status, body) = app.post("/api/shipping/vat/reverse", Some(&admin), json!({ "amountIncl": 121, "rate": 0.21 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&body["amountExcl"]), 100.0);

    let (status, _) = app.post("/api/shipping/vat", Some(&admin), json!({ "amountExcl": 100, "rate": 21 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_profit_calculator() {
    let app = TestApp::new().await;
    let body = json!({
        "items": [{ "unit_price": 100, "unit_cost": 60, "quantity": 1 }],
        "destination": "NL",
        "weight": 500,
        "ad_spend": 10,
    });
    let (status, body) = app.post("/api/profit/calculate", Some(&app.admin_token()), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&body["shipping_cost"]), 5.95);
    assert_eq!(num(&body["net_profit"]), 24.05);
    assert_eq!(num(&body["margin_percentage"]), 24.05);
    assert_eq!(num(&body["vat_amount"]), 21.0);
}

#[tokio::test]
async fn test_rejects_unusable_dimensions() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    for dimensions in [
        json!({ "length": -40, "width": 30, "height": 20 }),
        json!({ "length": 0, "width": 30, "height": 20 }),
        json!({ "length": 1e20, "width": 1e20, "height": 1e20 }),
    ] {
        let body = json!({ "weight": 500, "destination": "NL", "dimensions": dimensions });
        let (status, body) = app.post("/api/shipping/calculate", Some(&admin), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{dimensions}");
        assert_eq!(body["error"]["code"], "validation_error");

        let body = json!({ "items": [{ "unit_price": 10, "unit_cost": 5, "quantity": 1 }], "weight": 500, "dimensions": dimensions });
        let (status, _) = app.post("/api/profit/calculate", Some(&admin), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{dimensions}");
    }

    let body = json!({ "weight": 500, "destination": "NL", "dimensions": { "length": 40, "width": 30, "height": 20 } });
    let (status, body) = app.post("/api/shipping/calculate", Some(&admin), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["billable_weight"], 4800);
}

#[tokio::test]
async fn test_rejects_out_of_range_amounts() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let item = |price: f64| json!({ "items": [{ "unit_price": price, "unit_cost": 1, "quantity": 2 }], "destination": "NL", "weight": 500 });
    let cases = [
        ("/api/profit/calculate", item(5e28)),
        ("/api/profit/calculate", item(1e13)),
        ("/api/shipping/calculate", json!({ "weight": 500, "destination": "NL", "order_value": 5e28 })),
        ("/api/shipping/vat", json!({ "amountExcl": 5e28, "rate": 0.9 })),
        ("/api/shipping/vat/reverse", json!({ "amountIncl": 5e28, "rate": 0.21 })),
        ("/api/products", json!({ "sku": "BIG-1", "name": "Big", "price": 1e27, "stock": 1 })),
        ("/api/products", json!({ "sku": "BIG-2", "name": "Big", "price": 10, "cost_price": 1e27, "stock": 1 })),
    ];
    for (uri, body) in cases {
        let (status, res) = app.post(uri, Some(&admin), body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri} {body}");
        assert_eq!(res["error"]["code"], "validation_error");
    }

    let mug = product(&app.state, "MUG-9", 1250, Some(400), Some(350), 3).await;
    let body = json!({ "updates": [{ "id": mug.id(), "cost_price": 1e27 }] });
    let (status, _) = app.send(Method::PUT, "/api/products/bulk/purchase-prices", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get(&format!("/api/products/{}/profit?ad_spend=1e27", mug.id()), Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post("/api/profit/calculate", Some(&admin), item(1e12)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&body["revenue"]), 2e12);
}

#[tokio::test]
async fn test_order_totals_are_bounded() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let c = crate::services::orders::tests::customer(&app.state, "groothandel@example.nl").await;
    // €1e12 per unit, the largest price a product can carry.
    let bulk = product(&app.state, "BULK-1", 100_000_000_000_000, Some(1), Some(1), u32::MAX).await;
    let oversized = json!([{ "product_id": bulk.id(), "quantity": 4_000_000_000_u32 }]);

    let (status, body) = app.post("/api/orders", Some(&admin), json!({ "customer_id": c.id, "items": oversized })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    let customer = app.state.jwt.generate_token(c.id, &c.email, Role::Customer).unwrap();
    let (status, _) = app.post("/api/portal/orders", Some(&customer), json!({ "items": oversized })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, stored) = app.get(&format!("/api/products/{}", bulk.id()), Some(&admin)).await;
    assert_eq!(stored["stock"], u32::MAX);

    let (status, order) = app.post("/api/orders", Some(&admin), json!({ "customer_id": c.id, "items": [{ "product_id": bulk.id(), "quantity": 1 }] })).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = order["id"].as_str().unwrap();
    let (status, _) = app.send(Method::PUT, &format!("/api/orders/{id}"), Some(&admin), Some(json!({ "items": oversized }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, stats) = app.get("/api/orders/stats/summary", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&stats["total_revenue"]), 1e12);
    let (status, _) = app.get("/api/profit/dashboard", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, profit) = app.get(&format!("/api/orders/{id}/profit"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&profit["revenue"]), 1e12);
}

#[tokio::test]
async fn test_malformed_requests_get_structured_errors() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let (status, body) = app.post("/api/shipping/calculate", Some(&admin), json!({ "destination": "NL" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    assert!(body["error"]["message"].as_str().unwrap_or_default().contains("weight"));

    let (status, body) = app.post("/api/profit/calculate", Some(&admin), json!({ "items": "many", "weight": 500 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, body) = app.get("/api/customers/not-a-uuid", Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");

    let (status, body) = app.get("/api/profit/analysis?start=yesterday", Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn test_empty_item_lists_are_field_errors() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let c = crate::services::orders::tests::customer(&app.state, "lege@example.nl").await;
    let (status, body) = app.post("/api/orders", Some(&admin), json!({ "customer_id": c.id, "items": [] })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["items"].is_array());

    let (status, body) = app.post("/api/profit/calculate", Some(&admin), json!({ "items": [], "weight": 500 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["details"]["items"].is_array());
}

#[tokio::test]
async fn test_out_of_range_periods() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    for uri in [
        "/api/profit/analysis?start=0001-01-01&end=2024-01-31",
        "/api/profit/analysis?start=2024-01-01&end=%2B262142-12-31",
        "/api/profit/comparison?current_start=1970-01-01&current_end=1970-01-31",
        "/api/advertising/overview?end=1970-01-05",
        "/api/advertising/spend?start=-262143-01-01&end=2024-01-01",
    ] {
        let (status, _) = app.get(uri, Some(&admin)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }
    let (status, body) = app.get("/api/advertising/spend?start=9999-12-01&end=9999-12-31", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&body["total"]), 0.0);
}

#[tokio::test]
async fn test_tax_rules_feed_rate_lookups() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let (status, books) = app.post("/api/shipping/tax-rules", Some(&admin), json!({ "kind": "category", "key": " Books ", "rate": 0.09 })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(books["key"], "books");
    let (status, _) = app.post("/api/shipping/tax-rules", Some(&admin), json!({ "kind": "category", "key": "books", "rate": 0.06 })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.post("/api/shipping/tax-rules", Some(&admin), json!({ "kind": "category", "key": "toys", "rate": 21 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, germany) = app.post("/api/shipping/tax-rules", Some(&admin), json!({ "kind": "country", "key": "Duitsland", "rate": 0.07 })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(germany["key"], "DE");

    let (_, rate) = app.get("/api/shipping/vat/rate?country=NL&category=books", Some(&admin)).await;
    assert_eq!(num(&rate["rate"]), 0.09);
    let (_, rate) = app.get("/api/shipping/vat/rate?country=DE", Some(&admin)).await;
    assert_eq!(num(&rate["rate"]), 0.07);

    let body = json!({ "items": [{ "unit_price": 100, "unit_cost": 60, "quantity": 1 }], "destination": "NL", "weight": 500, "vat_category": "books" });
    let (status, calc) = app.post("/api/profit/calculate", Some(&admin), body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&calc["vat_rate"]), 0.09);
    assert_eq!(num(&calc["vat_amount"]), 9.0);

    let (_, rules) = app.get("/api/shipping/tax-rules", Some(&admin)).await;
    assert_eq!(rules.as_array().map(Vec::len), Some(2));

    let id = books["id"].as_str().unwrap();
    let (status, updated) = app.send(Method::PUT, &format!("/api/shipping/tax-rules/{id}"), Some(&admin), Some(json!({ "kind": "category", "key": "books", "rate": 0.09, "active": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["active"], false);
    let (_, rate) = app.get("/api/shipping/vat/rate?country=NL&category=books", Some(&admin)).await;
    assert_eq!(num(&rate["rate"]), 0.21);

    let (status, _) = app.send(Method::DELETE, &format!("/api/shipping/tax-rules/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::DELETE, &format!("/api/shipping/tax-rules/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_customer_crud_errors() {
    let app = TestApp::new().await;
    let admin = app.admin_token();

    let (status, body) = app.get(&format!("/api/customers/{}", Uuid::new_v4()), Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");

    let (status, body) = app.post("/api/customers", Some(&admin), json!({ "email": "not-an-email", "first_name": "A", "last_name": "B" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_error");
    assert!(body["error"]["details"]["email"].is_array());

    let new = json!({ "email": "jan@example.nl", "first_name": "Jan", "last_name": "Jansen" });
    let (status, created) = app.post("/api/customers", Some(&admin), new.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["country"], "NL");
    let (status, _) = app.post("/api/customers", Some(&admin), new).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, list) = app.get("/api/customers?search=jan", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["total"], 1);
    assert_eq!(list["per_page"], 20);
}

#[tokio::test]
async fn test_product_sku_conflict_and_archive() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let body = json!({ "sku": "mug-01", "name": "Mug", "price": 12.5, "cost_price": 4, "weight": 350, "stock": 3, "category": "kitchen" });
    let (status, created) = app.post("/api/products", Some(&admin), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["sku"], "MUG-01");
    let (status, _) = app.post("/api/products", Some(&admin), body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = created["id"].as_str().unwrap();
    let (status, profit) = app.get(&format!("/api/products/{id}/profit?country=NL&quantity=2"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&profit["revenue"]), 25.0);

    let (status, _) = app.send(Method::DELETE, &format!("/api/products/{id}"), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, archived) = app.get(&format!("/api/products/{id}"), Some(&admin)).await;
    assert_eq!(archived["status"], "archived");
}

#[tokio::test]
async fn test_bulk_purchase_prices() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let mug = product(&app.state, "MUG-2", 1250, Some(400), Some(350), 3).await;
    let tee = product(&app.state, "TEE-2", 2500, None, Some(200), 3).await;

    let body = json!({ "updates": [{ "id": mug.id(), "cost_price": 4.5 }, { "id": tee.id(), "cost_price": 11 }] });
    let (status, result) = app.send(Method::PUT, "/api/products/bulk/purchase-prices", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["updated_count"], 2);
    let (_, stored) = app.get(&format!("/api/products/{}", tee.id()), Some(&admin)).await;
    assert_eq!(num(&stored["cost_price"]), 11.0);

    // One unknown id leaves the whole batch unapplied.
    let body = json!({ "updates": [{ "id": mug.id(), "cost_price": 9 }, { "id": Uuid::new_v4(), "cost_price": 1 }] });
    let (status, _) = app.send(Method::PUT, "/api/products/bulk/purchase-prices", Some(&admin), Some(body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, stored) = app.get(&format!("/api/products/{}", mug.id()), Some(&admin)).await;
    assert_eq!(num(&stored["cost_price"]), 4.5);

    for body in [json!({ "updates": [] }), json!({ "updates": [{ "id": mug.id(), "cost_price": -1 }] })] {
        let (status, _) = app.send(Method::PUT, "/api/products/bulk/purchase-prices", Some(&admin), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new().await;
    let hash = hash_password("correct horse").unwrap();
    db::users::insert(&app.state.db, "admin@webshop.test", "Admin", &hash).await.unwrap();
    let (_, body) = app.post("/api/auth/login", None, json!({ "email": "admin@webshop.test", "password": "correct horse" })).await;
    let token = body["token"].as_str().unwrap().to_string();

    let change = |current: &str, new: &str| json!({ "current_password": current, "new_password": new });
    let (status, body) = app.send(Method::PUT, "/api/auth/change-password", Some(&token), Some(change("wrong", "battery staple"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_credentials");
    let (status, _) = app.send(Method::PUT, "/api/auth/change-password", Some(&token), Some(change("correct horse", "short"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.send(Method::PUT, "/api/auth/change-password", Some(&token), Some(change("correct horse", "battery staple"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.post("/api/auth/login", None, json!({ "email": "admin@webshop.test", "password": "correct horse" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.post("/api/auth/login", None, json!({ "email": "admin@webshop.test", "password": "battery staple" })).await;
    assert_eq!(status, StatusCode::OK);

    let register = json!({ "email": "klant@example.nl", "password": "s3cret-pass", "first_name": "Kim", "last_name": "Bakker" });
    let (_, body) = app.post("/api/auth/customer/register", None, register).await;
    let customer = body["token"].as_str().unwrap().to_string();
    let (status, _) = app.send(Method::PUT, "/api/auth/change-password", Some(&customer), Some(change("s3cret-pass", "n3w-secret-pass"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.post("/api/auth/customer/login", None, json!({ "email": "klant@example.nl", "password": "n3w-secret-pass" })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_campaign_comparison() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let spend = |campaign: &str, date: &str, spend: f64, value: f64| {
        json!({ "platform": "google_ads", "campaign_id": campaign, "campaign_name": campaign, "date": date, "spend": spend,
                "impressions": 1000, "clicks": 40, "conversions": 4, "conversion_value": value })
    };
    for body in [spend("brand", "2024-03-01", 20.0, 80.0), spend("brand", "2024-03-02", 20.0, 40.0), spend("generic", "2024-03-01", 50.0, 25.0)] {
        let (status, _) = app.post("/api/advertising/spend", Some(&admin), body).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.get("/api/advertising/compare?campaign_ids=brand,generic&start=2024-03-01&end=2024-03-31", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    let campaigns = body["campaigns"].as_array().unwrap();
    assert_eq!(campaigns.len(), 2);
    assert_eq!(campaigns[0]["campaign_id"], "generic");
    assert_eq!(num(&campaigns[1]["spend"]), 40.0);
    assert_eq!(num(&campaigns[1]["roas"]), 3.0);
    assert_eq!(num(&campaigns[1]["cpa"]), 5.0);
    assert_eq!(num(&campaigns[1]["ctr"]), 4.0);

    let (_, body) = app.get("/api/advertising/compare?campaign_ids=brand&start=2024-03-02&end=2024-03-02", Some(&admin)).await;
    assert_eq!(body["campaigns"].as_array().map(Vec::len), Some(1));
    assert_eq!(num(&body["campaigns"][0]["roas"]), 2.0);

    let (status, _) = app.get("/api/advertising/compare", Some(&admin)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_customer_portal_checkout() {
    let app = TestApp::new().await;
    let p = product(&app.state, "TEE-1", 2500, Some(1000), Some(500), 4).await;

    let register = json!({ "email": "klant@example.nl", "password": "s3cret-pass", "first_name": "Kim", "last_name": "Bakker" });
    let (status, body) = app.post("/api/auth/customer/register", None, register.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "customer");
    let (status, _) = app.post("/api/auth/customer/register", None, register).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.post("/api/auth/customer/login", None, json!({ "email": "klant@example.nl", "password": "s3cret-pass" })).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let checkout = json!({ "items": [{ "product_id": p.id(), "quantity": 2 }] });
    let (status, order) = app.post("/api/portal/orders", Some(&token), checkout).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(num(&order["revenue"]), 50.0);
    // Two 500 g shirts weigh exactly 1 kg, the first gram of the second band.
    assert_eq!(num(&order["shipping_cost"]), 8.95);
    assert_eq!(order["status"], "pending");

    let (_, orders) = app.get("/api/portal/orders", Some(&token)).await;
    assert_eq!(orders["total"], 1);

    let order_id = order["id"].as_str().unwrap();
    let (status, cancelled) = app.post(&format!("/api/portal/orders/{order_id}/cancel"), Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    let (status, body) = app.post(&format!("/api/portal/orders/{order_id}/cancel"), Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_transition");

    let (_, me) = app.get("/api/portal/me", Some(&token)).await;
    assert_eq!(me["total_orders"], 1);
}

#[tokio::test]
async fn test_order_admin_workflow() {
    let app = TestApp::new().await;
    let admin = app.admin_token();
    let c = crate::services::orders::tests::customer(&app.state, "anna@example.nl").await;
    let p = product(&app.state, "LAMP-1", 10000, Some(6000), Some(500), 5).await;

    let (status, order) = app
        .post("/api/orders", Some(&admin), json!({ "customer_id": c.id, "order_number": "WEB-1001", "items": [{ "product_id": p.id(), "quantity": 1 }] }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = order["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post("/api/orders", Some(&admin), json!({ "customer_id": c.id, "order_number": "WEB-1001", "items": [{ "product_id": p.id(), "quantity": 1 }] }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.send(Method::PUT, &format!("/api/orders/{id}/status"), Some(&admin), Some(json!({ "status": "delivered" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "invalid_transition");

    let (status, profit) = app.get(&format!("/api/orders/{id}/profit"), Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(num(&profit["net_profit"]), 34.05);

    let (status, _) = app.send(Method::PUT, &format!("/api/orders/{id}/status"), Some(&admin), Some(json!({ "status": "processing" }))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, shipment) = app.post(&format!("/api/shipping/labels/{id}"), Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(shipment["order"]["status"], "shipped");
    assert_eq!(shipment["label"]["tracking_number"], "3SMOCKWEB1001");

    let (status, stats) = app.get("/api/orders/stats/summary", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_orders"], 1);

    let (status, _) = app.send(Method::DELETE, &format!("/api/customers/{}", c.id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
