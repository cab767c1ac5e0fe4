pub mod analytics;
pub mod auth;
pub mod blockchain;
pub mod drafts;
pub mod error;
pub mod middleware;
pub mod quests;
pub mod spaces;
pub mod state;
pub mod users;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post, put},
};

pub use error::ApiError;
pub use state::{AppState, AppStateInner};

use crate::middleware::require_auth;

pub async fn health() -> &'static str {
    "ok"
}

/// All HTTP routes. CORS and request tracing are layered on by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/wallet", post(auth::wallet_login))
        .route("/api/users/search", get(users::search_users))
        .route("/api/users/check-username", get(users::check_username))
        .route("/api/users/{address}", get(users::get_user))
        .route("/api/spaces", get(spaces::list_spaces))
        .route("/api/spaces/{id}", get(spaces::get_space))
        .route("/api/quests", get(quests::list_quests))
        .route("/api/quests/{id}", get(quests::get_quest))
        .route("/api/quests/{id}/completions", get(quests::list_completions))
        .route("/api/blockchain/config", get(blockchain::config))
        .route("/api/blockchain/balance/{address}", get(blockchain::balance))
        .route("/api/blockchain/owner/{contract}/{token_id}", get(blockchain::owner))
        .route("/api/blockchain/quests/{escrow_id}/deposit", get(blockchain::quest_deposit))
        .route("/api/analytics/{creator}", get(analytics::creator_snapshot))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/me", get(users::get_me).patch(users::update_me))
        .route("/api/users/{address}/transactions", get(users::list_transactions))
        .route("/api/spaces", post(spaces::create_space))
        .route(
            "/api/spaces/{id}",
            patch(spaces::update_space).delete(spaces::delete_space),
        )
        .route("/api/quest-drafts", get(drafts::list_drafts))
        .route(
            "/api/quest-drafts/{id}",
            get(drafts::get_draft)
                .put(drafts::save_draft)
                .delete(drafts::delete_draft),
        )
        .route("/api/quest-drafts/{id}/publish", post(drafts::publish_draft))
        .route("/api/quests", post(quests::create_quest))
        .route("/api/quests/{id}/status", patch(quests::update_status))
        .route("/api/quests/{id}/escrow", put(quests::set_escrow))
        .route("/api/quests/{id}/fund", post(quests::fund_quest))
        .route("/api/quests/{id}/start", post(quests::start_quest))
        .route("/api/quests/{id}/complete", post(quests::complete_quest))
        .route("/api/quests/{id}/distribute", post(quests::distribute))
        .route("/api/analytics", get(analytics::my_snapshot))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use trustquests_analytics::{AnalyticsConfig, Aggregator};
    use trustquests_db::Database;

    use crate::analytics::DbQuestSource;

    const SECRET: &str = "test-secret";
    const ALICE: &str = "0xa11ce00000000000000000000000000000000001";
    const BOB: &str = "0xb0b0000000000000000000000000000000000002";

    fn app() -> Router {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let analytics = Aggregator::new(
            Arc::new(DbQuestSource::new(db.clone())),
            AnalyticsConfig::default(),
        );
        router(Arc::new(AppStateInner {
            db,
            jwt_secret: SECRET.to_string(),
            chain: None,
            analytics,
        }))
    }

    fn token(address: &str) -> String {
        auth::create_token(SECRET, address).unwrap()
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(address) = auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(address)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_and_auth_gate() {
        let app = app();

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) = send(&app, Method::GET, "/api/quest-drafts", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let (status, _) = send(&app, Method::GET, "/api/quests", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn draft_lifecycle() {
        let app = app();
        let draft = json!({
            "title": "Follow us",
            "reward_amount": 2.5,
            "max_completions": 20,
            "current_step": 2,
            "data": { "tasks": ["follow"] }
        });

        let (status, saved) =
            send(&app, Method::PUT, "/api/quest-drafts/d1", Some(ALICE), Some(draft)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(saved["owner_address"], ALICE);

        let (status, fetched) = send(&app, Method::GET, "/api/quest-drafts/d1", Some(ALICE), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Follow us");
        assert_eq!(fetched["reward_amount"], 2.5);
        assert_eq!(fetched["data"]["tasks"][0], "follow");

        // Drafts are private to their owner
        let (status, _) = send(&app, Method::GET, "/api/quest-drafts/d1", Some(BOB), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::DELETE, "/api/quest-drafts/d1", Some(ALICE), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, Method::GET, "/api/quest-drafts/d1", Some(ALICE), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "draft not found");
    }

    #[tokio::test]
    async fn second_publish_is_not_found() {
        let app = app();
        let draft = json!({ "title": "Retweet", "reward_amount": 1.0, "max_completions": 5 });
        send(&app, Method::PUT, "/api/quest-drafts/d2", Some(ALICE), Some(draft)).await;

        let (status, quest) =
            send(&app, Method::POST, "/api/quest-drafts/d2/publish", Some(ALICE), None).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(quest["title"], "Retweet");

        let (status, body) =
            send(&app, Method::POST, "/api/quest-drafts/d2/publish", Some(ALICE), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "draft not found");

        let uri = format!("/api/quests?creator={}", ALICE);
        let (_, quests) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(quests.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn space_slugs_and_ownership() {
        let app = app();
        let body = json!({ "name": "Trust Builders" });

        let (status, first) = send(&app, Method::POST, "/api/spaces", Some(ALICE), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(first["slug"], "trust-builders");

        let (_, second) = send(&app, Method::POST, "/api/spaces", Some(BOB), Some(body)).await;
        assert_eq!(second["slug"], "trust-builders-1");

        let (status, by_slug) = send(&app, Method::GET, "/api/spaces/trust-builders-1", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_slug["owner_address"], BOB);

        let uri = format!("/api/spaces/{}", first["id"].as_str().unwrap());
        let (status, _) = send(&app, Method::PATCH, &uri, Some(BOB), Some(json!({ "name": "Mine" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, Method::DELETE, &uri, Some(ALICE), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn symbol_only_space_names_get_fallback_slug() {
        let app = app();
        let (status, space) =
            send(&app, Method::POST, "/api/spaces", Some(ALICE), Some(json!({ "name": "***" }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(space["slug"], "space");

        let (status, _) =
            send(&app, Method::POST, "/api/spaces", Some(ALICE), Some(json!({ "name": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn username_check_ignores_own_wallet() {
        let app = app();
        let (status, _) = send(&app, Method::PATCH, "/api/me", Some(ALICE), Some(json!({ "username": "alice" }))).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/users/check-username?username=ALICE&address={}", ALICE);
        let (_, own) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(own["taken"], false);

        let uri = format!("/api/users/check-username?username=alice&address={}", BOB);
        let (_, other) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(other["taken"], true);

        let (status, _) = send(&app, Method::PATCH, "/api/me", Some(BOB), Some(json!({ "username": "Alice" }))).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn quest_completion_feeds_analytics() {
        let app = app();
        let (status, quest) = send(
            &app,
            Method::POST,
            "/api/quests",
            Some(ALICE),
            Some(json!({ "title": "Join Discord", "reward_amount": 3.0, "max_completions": 10 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = quest["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, Method::POST, &format!("/api/quests/{}/complete", id), Some(BOB), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        send(&app, Method::POST, &format!("/api/quests/{}/start", id), Some(BOB), None).await;
        let (status, done) = send(&app, Method::POST, &format!("/api/quests/{}/complete", id), Some(BOB), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["status"], "completed");

        let (status, ledger) = send(&app, Method::GET, &format!("/api/users/{}/transactions", BOB), Some(BOB), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ledger[0]["kind"], "reward");
        let (status, _) = send(&app, Method::GET, &format!("/api/users/{}/transactions", BOB), Some(ALICE), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, snapshot) = send(&app, Method::GET, &format!("/api/analytics/{}", ALICE), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["totals"]["started"], 1);
        assert_eq!(snapshot["totals"]["completed"], 1);
        assert_eq!(snapshot["totals"]["completion_rate"], 100.0);
        assert_eq!(snapshot["quests"][0]["deposit"]["source"], "estimate");

        let (_, mine) = send(&app, Method::GET, "/api/analytics", Some(ALICE), None).await;
        assert_eq!(mine["totals"]["completed"], 1);
    }

    #[tokio::test]
    async fn chain_routes_without_rpc() {
        let app = app();
        let (status, body) = send(&app, Method::GET, &format!("/api/blockchain/balance/{}", ALICE), None, None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "blockchain is not configured");

        let (status, config) = send(&app, Method::GET, "/api/blockchain/config", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(config["writes_enabled"], false);
    }
}
