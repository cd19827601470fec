use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use local_deployment::LocalDeployment;
use serde_json::{Value, json};
use tower::ServiceExt;
use utils::config::AppConfig;

const ADMIN_EMAIL: &str = "admin@giftgenie.test";

struct TestApp {
    router: Router,
}

struct TestResponse {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

impl TestApp {
    async fn new() -> Self {
        let config = AppConfig {
            admin_emails: vec![ADMIN_EMAIL.to_string()],
            reminder_poll_seconds: 0,
            ..Default::default()
        };
        let deployment = LocalDeployment::in_memory(config).unwrap();
        let router = server::app(deployment).await.unwrap();
        Self { router }
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse {
            status,
            cookie,
            body,
        }
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, None, cookie).await
    }

    async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        self.request(Method::POST, uri, Some(body), cookie).await
    }

    async fn put(&self, uri: &str, body: Value, cookie: Option<&str>) -> TestResponse {
        self.request(Method::PUT, uri, Some(body), cookie).await
    }

    async fn delete(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, None, cookie).await
    }

    /// Registers an account and returns its session cookie.
    async fn register(&self, email: &str) -> String {
        let response = self
            .post(
                "/api/auth/register",
                json!({ "email": email, "username": "tester", "password": "correct horse" }),
                None,
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.cookie.expect("register sets a session cookie")
    }

    async fn create_friend(&self, cookie: &str, name: &str) -> Value {
        let response = self
            .post(
                "/api/friends",
                json!({
                    "name": name,
                    "personality_traits": ["Adventurous"],
                    "interests": ["Hiking", "Coffee"],
                }),
                Some(cookie),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body
    }
}

#[tokio::test]
async fn health_reports_memory_storage() {
    let app = TestApp::new().await;
    let response = app.get("/api/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["storage"], "memory");
}

#[tokio::test]
async fn register_login_logout_flow() {
    let app = TestApp::new().await;

    let anonymous = app.get("/api/auth/me", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(anonymous.body["error"], "Not authenticated");

    let cookie = app.register("Maya@Example.com").await;
    let me = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "maya@example.com");
    assert_eq!(me.body["role"], "user");
    assert!(me.body.get("password_hash").is_none());

    let duplicate = app
        .post(
            "/api/auth/register",
            json!({ "email": "maya@example.com", "username": "again", "password": "long enough" }),
            None,
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let wrong = app
        .post(
            "/api/auth/login",
            json!({ "email": "maya@example.com", "password": "not the password" }),
            None,
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["error"], "Invalid email or password");

    let login = app
        .post(
            "/api/auth/login",
            json!({ "email": "maya@example.com", "password": "correct horse" }),
            None,
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    let cookie = login.cookie.expect("login sets a session cookie");

    let logout = app.post("/api/auth/logout", json!({}), Some(&cookie)).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);
    let after = app.get("/api/auth/me", Some(&cookie)).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn short_password_is_rejected() {
    let app = TestApp::new().await;
    let response = app
        .post(
            "/api/auth/register",
            json!({ "email": "a@b.co", "username": "a", "password": "short" }),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("at least 8"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;
    let cookie = app.register("json@example.com").await;
    let response = app
        .post("/api/friends", json!({ "interests": ["no name"] }), Some(&cookie))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn friends_are_scoped_to_their_owner() {
    let app = TestApp::new().await;
    let owner = app.register("owner@example.com").await;
    let other = app.register("other@example.com").await;

    let friend = app.create_friend(&owner, "Maya").await;
    let id = friend["id"].as_str().unwrap();
    let uri = format!("/api/friends/{id}");

    let list = app.get("/api/friends", Some(&owner)).await;
    assert_eq!(list.body.as_array().unwrap().len(), 1);
    let foreign = app.get(&uri, Some(&other)).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.body["error"], "Friend not found");
    assert!(app.get("/api/friends", Some(&other)).await.body.as_array().unwrap().is_empty());

    let updated = app
        .put(&uri, json!({ "notes": "Loves trail running" }), Some(&owner))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["notes"], "Loves trail running");
    assert_eq!(updated.body["interests"], json!(["Hiking", "Coffee"]));

    let foreign_delete = app.delete(&uri, Some(&other)).await;
    assert_eq!(foreign_delete.status, StatusCode::NOT_FOUND);
    assert_eq!(app.delete(&uri, Some(&owner)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get(&uri, Some(&owner)).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn friends_require_a_session() {
    let app = TestApp::new().await;
    assert_eq!(app.get("/api/friends", None).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn curated_recommendations_without_model() {
    let app = TestApp::new().await;
    let cookie = app.register("recs@example.com").await;
    let friend = app.create_friend(&cookie, "Sam").await;
    let id = friend["id"].as_str().unwrap();

    let response = app
        .post(
            &format!("/api/friends/{id}/recommendations"),
            json!({ "count": 3, "occasion": "Birthday" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.body["source"], "curated");
    assert_eq!(response.body["friend_id"], friend["id"]);

    let recommendations = response.body["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 3);
    for gift in recommendations {
        assert!(gift["image_url"].as_str().unwrap().starts_with("https://placehold.co/"));
        assert!(gift["purchase_url"].as_str().unwrap().starts_with("https://www.amazon.com/s?k="));
    }
}

#[tokio::test]
async fn saved_gifts_follow_their_friend() {
    let app = TestApp::new().await;
    let cookie = app.register("gifts@example.com").await;
    let friend = app.create_friend(&cookie, "Ana").await;
    let friend_id = friend["id"].as_str().unwrap();

    let missing_friend = app
        .post(
            "/api/gifts",
            json!({ "friend_id": uuid::Uuid::new_v4(), "name": "Kettle" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(missing_friend.status, StatusCode::NOT_FOUND);

    let saved = app
        .post(
            "/api/gifts",
            json!({ "friend_id": friend_id, "name": "Pour-over kettle", "price": "$45" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(saved.status, StatusCode::CREATED);
    assert_eq!(saved.body["purchased"], false);
    let gift_id = saved.body["id"].as_str().unwrap();

    let by_friend = app
        .get(&format!("/api/friends/{friend_id}/gifts"), Some(&cookie))
        .await;
    assert_eq!(by_friend.body.as_array().unwrap().len(), 1);
    let filtered = app
        .get(&format!("/api/gifts?friend_id={friend_id}"), Some(&cookie))
        .await;
    assert_eq!(filtered.body.as_array().unwrap().len(), 1);

    let purchased = app
        .put(&format!("/api/gifts/{gift_id}"), json!({ "purchased": true }), Some(&cookie))
        .await;
    assert_eq!(purchased.body["purchased"], true);
    assert_eq!(purchased.body["price"], "$45");

    assert_eq!(
        app.delete(&format!("/api/friends/{friend_id}"), Some(&cookie)).await.status,
        StatusCode::NO_CONTENT
    );
    let remaining = app.get("/api/gifts", Some(&cookie)).await;
    assert!(remaining.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn reminders_validate_and_list_upcoming() {
    let app = TestApp::new().await;
    let cookie = app.register("reminders@example.com").await;
    let friend = app.create_friend(&cookie, "Maya").await;
    let friend_id = friend["id"].as_str().unwrap();
    let soon = (Utc::now().date_naive() + Duration::days(3)).to_string();
    let later = (Utc::now().date_naive() + Duration::days(90)).to_string();

    let missing_email = app
        .post(
            "/api/reminders",
            json!({
                "friend_id": friend_id,
                "occasion": "Birthday",
                "occasion_date": soon,
                "email_notifications": true,
            }),
            Some(&cookie),
        )
        .await;
    assert_eq!(missing_email.status, StatusCode::BAD_REQUEST);

    let created = app
        .post(
            "/api/reminders",
            json!({
                "friend_id": friend_id,
                "occasion": "Birthday",
                "occasion_date": soon,
                "email_notifications": true,
                "email": "Reminders@Example.com",
            }),
            Some(&cookie),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{}", created.body);
    assert_eq!(created.body["email"], "reminders@example.com");
    assert_eq!(created.body["reminder_days_before"], 7);

    app.post(
        "/api/reminders",
        json!({ "friend_id": friend_id, "occasion": "Anniversary", "occasion_date": later }),
        Some(&cookie),
    )
    .await;

    let upcoming = app.get("/api/reminders/upcoming", Some(&cookie)).await;
    assert_eq!(upcoming.status, StatusCode::OK);
    let entries = upcoming.body.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["friend_name"], "Maya");
    assert_eq!(entries[0]["days_until"], 3);
    assert_eq!(entries[0]["occasion"], "Birthday");

    let wide = app.get("/api/reminders/upcoming?days=120", Some(&cookie)).await;
    let occasions: Vec<_> = wide
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["occasion"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(occasions, vec!["Birthday", "Anniversary"]);

    let id = created.body["id"].as_str().unwrap();
    let paused = app
        .put(&format!("/api/reminders/{id}"), json!({ "is_active": false }), Some(&cookie))
        .await;
    assert_eq!(paused.body["is_active"], false);
    let upcoming = app.get("/api/reminders/upcoming", Some(&cookie)).await;
    assert!(upcoming.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn blog_writes_are_admin_only() {
    let app = TestApp::new().await;
    let admin = app.register(ADMIN_EMAIL).await;
    let reader = app.register("reader@example.com").await;
    let post = json!({ "title": "Gift Guide 2026", "content": "Our favourite picks." });

    assert_eq!(
        app.post("/api/blog-posts", post.clone(), None).await.status,
        StatusCode::UNAUTHORIZED
    );
    let forbidden = app.post("/api/blog-posts", post.clone(), Some(&reader)).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
    assert_eq!(forbidden.body["error"], "Admin access required");

    let draft = app.post("/api/blog-posts", post.clone(), Some(&admin)).await;
    assert_eq!(draft.status, StatusCode::CREATED);
    assert_eq!(draft.body["slug"], "gift-guide-2026");
    let id = draft.body["id"].as_str().unwrap();

    let conflict = app.post("/api/blog-posts", post, Some(&admin)).await;
    assert_eq!(conflict.status, StatusCode::CONFLICT);

    assert!(app.get("/api/blog-posts", None).await.body.as_array().unwrap().is_empty());
    let drafts = app
        .get("/api/blog-posts?include_drafts=true", Some(&reader))
        .await;
    assert!(drafts.body.as_array().unwrap().is_empty());
    let drafts = app.get("/api/blog-posts?include_drafts=true", Some(&admin)).await;
    assert_eq!(drafts.body.as_array().unwrap().len(), 1);
    assert_eq!(
        app.get(&format!("/api/blog-posts/{id}"), None).await.status,
        StatusCode::NOT_FOUND
    );

    let published = app
        .put(&format!("/api/blog-posts/{id}"), json!({ "published": true }), Some(&admin))
        .await;
    assert_eq!(published.body["published"], true);
    assert!(published.body["published_at"].is_string());

    let by_slug = app.get("/api/blog-posts/by-slug/gift-guide-2026", None).await;
    assert_eq!(by_slug.status, StatusCode::OK);
    assert_eq!(by_slug.body["id"], draft.body["id"]);

    assert_eq!(
        app.delete(&format!("/api/blog-posts/{id}"), Some(&admin)).await.status,
        StatusCode::NO_CONTENT
    );
}

#[tokio::test]
async fn blog_updates_are_partial() {
    let app = TestApp::new().await;
    let admin = app.register(ADMIN_EMAIL).await;
    let created = app
        .post(
            "/api/blog-posts",
            json!({ "title": "Stocking Stuffers", "content": "Small joys." }),
            Some(&admin),
        )
        .await;
    assert_eq!(created.body["excerpt"], "Small joys.");
    let uri = format!("/api/blog-posts/{}", created.body["id"].as_str().unwrap());

    let edited = app.put(&uri, json!({ "content": "Bigger joys." }), Some(&admin)).await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["excerpt"], "Bigger joys.");
    assert_eq!(edited.body["title"], "Stocking Stuffers");
    assert_eq!(edited.body["slug"], "stocking-stuffers");

    app.put(&uri, json!({ "excerpt": "Hand picked." }), Some(&admin)).await;
    let edited = app.put(&uri, json!({ "content": "Third draft." }), Some(&admin)).await;
    assert_eq!(edited.body["content"], "Third draft.");
    assert_eq!(edited.body["excerpt"], "Hand picked.");

    let published = app.put(&uri, json!({ "published": true }), Some(&admin)).await;
    let first_published_at = published.body["published_at"].clone();
    assert!(first_published_at.is_string());

    let hidden = app.put(&uri, json!({ "published": false }), Some(&admin)).await;
    assert_eq!(hidden.body["published"], false);
    let republished = app.put(&uri, json!({ "published": true }), Some(&admin)).await;
    assert_eq!(republished.body["published_at"], first_published_at);

    let blank = app.put(&uri, json!({ "title": "  " }), Some(&admin)).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn analytics_events_and_summary() {
    let app = TestApp::new().await;
    let admin = app.register(ADMIN_EMAIL).await;
    let user = app.register("user@example.com").await;
    app.create_friend(&user, "Maya").await;

    let event = app
        .post(
            "/api/analytics/events",
            json!({ "event_type": "page_view", "path": "/friends" }),
            None,
        )
        .await;
    assert_eq!(event.status, StatusCode::NO_CONTENT);
    let invalid = app
        .post("/api/analytics/events", json!({ "event_type": "Page View" }), None)
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    assert_eq!(
        app.get("/api/analytics/summary", Some(&user)).await.status,
        StatusCode::FORBIDDEN
    );
    let summary = app.get("/api/analytics/summary?days=7", Some(&admin)).await;
    assert_eq!(summary.status, StatusCode::OK);
    assert_eq!(summary.body["total_users"], 2);
    assert_eq!(summary.body["total_friends"], 1);

    let by_type = summary.body["events_by_type"].as_array().unwrap();
    assert_eq!(by_type[0]["event_type"], "user_registered");
    assert_eq!(by_type[0]["count"], 2);
    assert!(by_type.iter().any(|entry| entry["event_type"] == "page_view"));
}

#[tokio::test]
async fn admins_manage_roles() {
    let app = TestApp::new().await;
    let admin = app.register(ADMIN_EMAIL).await;
    let user = app.register("promote@example.com").await;

    let me = app.get("/api/auth/me", Some(&user)).await;
    let user_id = me.body["id"].as_str().unwrap();

    assert_eq!(app.get("/api/admin/users", Some(&user)).await.status, StatusCode::FORBIDDEN);
    let users = app.get("/api/admin/users", Some(&admin)).await;
    assert_eq!(users.body.as_array().unwrap().len(), 2);

    let promoted = app
        .put(&format!("/api/admin/users/{user_id}/role"), json!({ "role": "admin" }), Some(&admin))
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["role"], "admin");
    assert_eq!(app.get("/api/admin/users", Some(&user)).await.status, StatusCode::OK);

    let unknown = app
        .put(
            &format!("/api/admin/users/{}/role", uuid::Uuid::new_v4()),
            json!({ "role": "user" }),
            Some(&admin),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body["error"], "User not found");
}

#[tokio::test]
async fn configured_admin_emails_are_promoted() {
    let app = TestApp::new().await;
    let admin = app.register(ADMIN_EMAIL).await;
    let me = app.get("/api/auth/me", Some(&admin)).await;
    assert_eq!(me.body["role"], "admin");
    let admin_id = me.body["id"].as_str().unwrap().to_string();

    let other = app.register("deputy@example.com").await;
    let other_me = app.get("/api/auth/me", Some(&other)).await;
    assert_eq!(other_me.body["role"], "user");
    let other_id = other_me.body["id"].as_str().unwrap();

    // Hand admin to the deputy, who then demotes the configured account.
    app.put(&format!("/api/admin/users/{other_id}/role"), json!({ "role": "admin" }), Some(&admin))
        .await;
    let demoted = app
        .put(&format!("/api/admin/users/{admin_id}/role"), json!({ "role": "user" }), Some(&other))
        .await;
    assert_eq!(demoted.body["role"], "user");
    assert_eq!(app.get("/api/auth/me", Some(&admin)).await.body["role"], "user");

    let login = app
        .post(
            "/api/auth/login",
            json!({ "email": ADMIN_EMAIL.to_uppercase(), "password": "correct horse" }),
            None,
        )
        .await;
    assert_eq!(login.status, StatusCode::OK, "{}", login.body);
    assert_eq!(login.body["role"], "admin");
    let cookie = login.cookie.unwrap();
    assert_eq!(app.get("/api/admin/users", Some(&cookie)).await.status, StatusCode::OK);

    app.register("plain@example.com").await;
    let plain = app
        .post(
            "/api/auth/login",
            json!({ "email": "plain@example.com", "password": "correct horse" }),
            None,
        )
        .await;
    assert_eq!(plain.body["role"], "user");
}

#[tokio::test]
async fn uploads_need_configuration() {
    let app = TestApp::new().await;
    let cookie = app.register("uploads@example.com").await;
    let response = app
        .post(
            "/api/uploads/image",
            json!({ "source": "https://example.com/cat.png" }),
            Some(&cookie),
        )
        .await;
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["error"], "Image uploads are not configured");
}

#[tokio::test]
async fn product_lookups_validate_input() {
    let app = TestApp::new().await;
    assert_eq!(
        app.get("/api/amazon/B08N5WRWNW", None).await.status,
        StatusCode::UNAUTHORIZED
    );

    let cookie = app.register("lookup@example.com").await;
    let asin = app.get("/api/amazon/not-an-asin", Some(&cookie)).await;
    assert_eq!(asin.status, StatusCode::BAD_REQUEST);
    let url = app
        .get("/api/product-metadata?url=ftp%3A%2F%2Fexample.com", Some(&cookie))
        .await;
    assert_eq!(url.status, StatusCode::BAD_REQUEST);
    let internal = app
        .get(
            "/api/product-metadata?url=http%3A%2F%2F169.254.169.254%2Flatest%2Fmeta-data",
            Some(&cookie),
        )
        .await;
    assert_eq!(internal.status, StatusCode::BAD_REQUEST);
}
