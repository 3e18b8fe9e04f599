use offtrack::config::Config;
use offtrack::db;
use offtrack::routes;
use offtrack::state::AppState;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;

/// Boot the full router on an ephemeral port and return its base URL.
async fn spawn_server(tmp: &TempDir) -> String {
    let mut config = Config::default();
    config.database.path = Some(tmp.path().join("offtrack.db"));
    config.storage.path = Some(tmp.path().join("uploads"));
    config.auth.bcrypt_cost = 4;
    config.auth.trust_proxy_headers = true;

    let pool = db::create_pool(config.db_path()).unwrap();
    db::run_migrations(&pool).unwrap();
    let app = routes::app(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().cookie_store(true).build().unwrap()
}

async fn sign_up(client: &reqwest::Client, base: &str, user_id: &str) -> Value {
    let resp = client
        .post(format!("{}/auth/signup", base))
        .json(&serde_json::json!({
            "user_id": user_id,
            "password": "hunter2",
            "display_name": "",
            "avatar_id": "a2.png"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn test_sign_up_sign_in_and_sign_out() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;
    let c = client();

    let body = sign_up(&c, &base, "alex").await;
    assert_eq!(body["user"]["user_id"], "alex");
    assert_eq!(body["user"]["display_name"], "alex");
    assert!(body["user"].get("password_hash").is_none());

    let me: Value = c.get(format!("{}/me", base)).send().await.unwrap().json().await.unwrap();
    assert_eq!(me["avatar_id"], "a2.png");

    // Duplicate id is refused
    let dup = client()
        .post(format!("{}/auth/signup", base))
        .json(&serde_json::json!({ "user_id": "alex", "password": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(dup.status(), StatusCode::CONFLICT);

    // Unknown user and wrong password look the same
    let fresh = client();
    let unknown = fresh
        .post(format!("{}/auth/signin", base))
        .json(&serde_json::json!({ "user_id": "nobody", "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    let wrong = fresh
        .post(format!("{}/auth/signin", base))
        .json(&serde_json::json!({ "user_id": "alex", "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.text().await.unwrap(), wrong.text().await.unwrap());

    let ok = fresh
        .post(format!("{}/auth/signin", base))
        .json(&serde_json::json!({ "user_id": "alex", "password": "hunter2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let out = fresh.post(format!("{}/auth/signout", base)).send().await.unwrap();
    assert_eq!(out.status(), StatusCode::NO_CONTENT);
    let after = fresh.get(format!("{}/me", base)).send().await.unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_proxy_principal_sign_in() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;
    let c = client();

    let resp = c
        .post(format!("{}/auth/principal", base))
        .header("x-auth-request-user", "idp|42")
        .header("x-auth-request-email", "river@example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["user_id"], "river");

    let missing = client()
        .post(format!("{}/auth/principal", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_activity_crud_and_feed() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;
    let c = client();
    sign_up(&c, &base, "alex").await;

    let unauthenticated = client().get(format!("{}/activities", base)).send().await.unwrap();
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let form = Form::new()
        .text("name", "Piano practice")
        .text("category", "Creative Exercise")
        .text("duration_minutes", "45")
        .text("date", "2024-03-10")
        .text("time", "19:30")
        .part(
            "image",
            Part::bytes(b"\x89PNG\r\n fake".to_vec())
                .file_name("keys.png")
                .mime_str("image/png")
                .unwrap(),
        );
    let resp = c
        .post(format!("{}/activities", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = resp.json().await.unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    let image_url = created["image_url"].as_str().unwrap().to_string();
    assert_eq!(created["category"], "Creative Exercise");
    assert_eq!(created["occurred_at"], "2024-03-10T19:30:00Z");

    let image = c.get(format!("{}{}", base, image_url)).send().await.unwrap();
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(image.headers()["content-type"], "image/png");

    // Invalid duration never reaches storage
    let bad = Form::new()
        .text("name", "Nap")
        .text("category", "Others")
        .text("duration_minutes", "0");
    let resp = c
        .post(format!("{}/activities", base))
        .multipart(bad)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let patch = Form::new().text("duration_minutes", "60");
    let resp = c
        .patch(format!("{}/activities/{}", base, id))
        .multipart(patch)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["duration_minutes"], 60);
    assert_eq!(updated["name"], "Piano practice");
    assert_eq!(updated["image_url"], image_url.as_str());

    let chart: Value = c
        .get(format!("{}/feed/chart?tz=Asia/Tokyo", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        chart,
        serde_json::json!([
            { "day": "2024-03-11", "category": "Creative Exercise", "total_minutes": 60 }
        ])
    );

    let bad_tz = c
        .get(format!("{}/feed/chart?tz=Mars/Olympus", base))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_tz.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let gallery: Value = c
        .get(format!("{}/feed/gallery?user=alex", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(gallery.as_array().unwrap().len(), 1);
    assert_eq!(gallery[0]["image_ref"], image_url.as_str());

    let resp = c
        .delete(format!("{}/activities/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let gone = c
        .get(format!("{}/activities/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    let image = c.get(format!("{}{}", base, image_url)).send().await.unwrap();
    assert_eq!(image.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_users_cannot_edit() {
    let tmp = TempDir::new().unwrap();
    let base = spawn_server(&tmp).await;

    let owner = client();
    sign_up(&owner, &base, "alex").await;
    let intruder = client();
    sign_up(&intruder, &base, "sam").await;

    let form = Form::new()
        .text("name", "Chess puzzles")
        .text("category", "Mental Workout")
        .text("duration_minutes", "20")
        .text("date", "2024-01-05");
    let created: Value = owner
        .post(format!("{}/activities", base))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap();

    let resp = intruder
        .patch(format!("{}/activities/{}", base, id))
        .multipart(Form::new().text("name", "Mine now"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = intruder
        .delete(format!("{}/activities/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Still there, and visible to everyone
    let seen: Value = intruder
        .get(format!("{}/activities?all=true", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seen.as_array().unwrap().len(), 1);
    assert_eq!(seen[0]["owner_label"], "alex");

    let own: Value = intruder
        .get(format!("{}/activities", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(own.as_array().unwrap().is_empty());
}
