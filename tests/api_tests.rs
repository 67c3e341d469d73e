use std::io::{Cursor, Read};

use httpmock::prelude::*;
use image::{ImageFormat, Rgb, RgbImage};
use pcb_inspect::config::Config;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use zip::ZipArchive;

struct TestApp {
    base: String,
    client: Client,
    _dir: TempDir,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// A client that does not share this app's cookie jar.
    fn guest(&self) -> Client {
        Client::new()
    }

    async fn get_json(&self, path: &str) -> (StatusCode, Value) {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn post_json(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    async fn login(&self, email: &str, password: &str) {
        let (status, body) = self
            .post_json("/api/auth/login", json!({"email": email, "password": password}))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    }

    async fn detect(&self, client: &Client, image: Vec<u8>, mime: &str) -> (StatusCode, Value) {
        let part = Part::bytes(image).file_name("board.png").mime_str(mime).unwrap();
        let form = Form::new().part("image", part).text("confidenceThreshold", "0.5");
        let response = client
            .post(self.url("/api/detection"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

async fn spawn_app(inference: &MockServer) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.database.path = dir.path().join("pcb.db");
    config.auth.jwt_secret = Some("integration-secret".to_string());
    config.auth.bcrypt_cost = 4;
    config.auth.seed_default_users = true;
    config.inference.base_url = inference.base_url();
    config.storage.model_dir = dir.path().join("models");
    config.storage.bootstrap_model = dir.path().join("missing.onnx");

    let state = pcb_inspect::prepare(config).await.unwrap();
    let app = pcb_inspect::build_router(state).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        client: Client::builder().cookie_store(true).build().unwrap(),
        _dir: dir,
    }
}

fn board_png() -> Vec<u8> {
    let img = RgbImage::from_pixel(64, 48, Rgb([20, 120, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn mock_detection(server: &MockServer) {
    server.mock(|when, then| {
        when.method(POST).path("/detect");
        then.status(200).json_body(json!({
            "success": true,
            "data": {
                "defects": [
                    {"class_id": 3, "defect_type": "short", "x_center": 0.5, "y_center": 0.5,
                     "width": 0.2, "height": 0.2, "confidence": 0.9},
                    {"classId": 4, "type": "spur", "box": {"x": 0.25, "y": 0.25, "width": 0.1, "height": 0.1},
                     "confidence": "0.7"},
                    {"class_id": 0, "confidence": 0.2}
                ],
                "summary": {"detection_time": 123}
            }
        }));
    });
}

fn zip_names(bytes: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    archive.file_names().map(str::to_string).collect()
}

#[tokio::test]
async fn test_content_endpoints() {
    let inference = MockServer::start();
    let app = spawn_app(&inference).await;

    let text = app.client.get(app.url("/")).send().await.unwrap().text().await.unwrap();
    assert_eq!(text, "PCB defect inspection API is running");

    let (status, body) = app.get_json("/api/announcements?page=1&limit=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["announcements"].as_array().unwrap().len(), 5);
    assert_eq!(body["announcements"][0]["id"], json!(12));
    assert_eq!(body["pagination"]["totalItems"], json!(12));
    assert_eq!(body["pagination"]["hasNextPage"], json!(true));

    let (status, body) = app.get_json("/api/announcements/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"message": "Announcement not found"}));

    let (status, body) = app.get_json("/api/guides/help/categories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"].as_array().unwrap().len(), 12);

    let (_, body) = app.get_json("/api/guides/help/categories/about-system").await;
    assert_eq!(body, json!({"articles": []}));

    let (status, body) = app.get_json("/api/guides/help/articles/no-such-article").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Article not found"));

    let (_, body) = app.get_json("/api/guides/help/search?q=CAMERA").await;
    assert!(!body["results"].as_array().unwrap().is_empty());

    let (_, body) = app.get_json("/api/about").await;
    assert_eq!(body["teamMembers"]["teamMembers"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_health_reports_unreachable_inference() {
    let inference = MockServer::start();
    inference.mock(|when, then| {
        when.method(GET).path("/health");
        then.status(503);
    });
    let app = spawn_app(&inference).await;

    let (status, body) = app.get_json("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], json!("ok"));
    assert_eq!(body["status"], json!("degraded"));
    assert_eq!(body["inference"]["reachable"], json!(false));
}

#[tokio::test]
async fn test_register_session_and_logout() {
    let inference = MockServer::start();
    let app = spawn_app(&inference).await;

    let (status, body) = app
        .post_json(
            "/api/auth/register",
            json!({"name": "Dana", "email": "dana@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], json!("user"));

    let (status, body) = app
        .post_json(
            "/api/auth/register",
            json!({"name": "Dana", "email": "DANA@example.com", "password": "secret1"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("This email is already registered"));

    let (status, body) = app.get_json("/api/auth/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], json!("dana@example.com"));

    let (status, _) = app.get_json("/api/auth/users").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post_json("/api/auth/logout", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get_json("/api/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    let (status, body) = app
        .post_json("/api/auth/login", json!({"email": "dana@example.com", "password": "wrong!"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], json!("Incorrect email or password"));

    app.login("admin@example.com", "admin123").await;
    let (status, body) = app.get_json("/api/auth/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], json!(3));
}

#[tokio::test]
async fn test_guest_detection_is_not_saved() {
    let inference = MockServer::start();
    mock_detection(&inference);
    let app = spawn_app(&inference).await;

    let (status, body) = app.detect(&app.guest(), board_png(), "image/png").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let data = &body["data"];
    assert_eq!(data["savedHistoryId"], Value::Null);
    assert_eq!(data["summary"]["totalDefects"], json!(2));
    assert_eq!(data["summary"]["detectionTime"], json!(123));
    assert!(data["originalImage"].as_str().unwrap().starts_with("data:image/png;base64,"));
    assert!(data["resultImage"].as_str().unwrap().starts_with("data:image/jpeg;base64,"));
    assert_eq!(data["defects"][1]["type"], json!("spur"));
    assert_eq!(data["defects"][1]["box"]["x"], json!(0.25));
}

#[tokio::test]
async fn test_detection_rejects_bad_uploads() {
    let inference = MockServer::start();
    let app = spawn_app(&inference).await;

    let (status, body) = app.detect(&app.guest(), b"plain text".to_vec(), "text/plain").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["message"], json!("Only JPEG, JPG, PNG, BMP images are allowed"));

    let form = Form::new().text("confidenceThreshold", "0.5");
    let response = app
        .guest()
        .post(app.url("/api/detection"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], json!("Please upload a PCB image"));
}

#[tokio::test]
async fn test_inference_failure_maps_to_bad_gateway() {
    let inference = MockServer::start();
    inference.mock(|when, then| {
        when.method(POST).path("/detect");
        then.status(500).json_body(json!({"success": false, "message": "model not loaded"}));
    });
    let app = spawn_app(&inference).await;

    let (status, body) = app.detect(&app.guest(), board_png(), "image/png").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn test_history_stats_export_and_delete() {
    let inference = MockServer::start();
    mock_detection(&inference);
    let app = spawn_app(&inference).await;
    app.login("user@example.com", "user123").await;

    let mut ids = Vec::new();
    for _ in 0..2 {
        let (status, body) = app.detect(&app.client, board_png(), "image/png").await;
        assert_eq!(status, StatusCode::OK);
        ids.push(body["data"]["savedHistoryId"].as_i64().expect("run should be saved"));
    }

    let (status, body) = app
        .get_json("/api/detection/history?defectType=spur&sortBy=createdAt&sortOrder=asc")
        .await;
    assert_eq!(status, StatusCode::OK);
    let history = body["data"]["history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["id"], json!(ids[0]));
    assert_eq!(history[0]["defectTypes"], json!(["short", "spur"]));
    assert_eq!(history[0]["qualityStatus"], json!("defective"));
    assert_eq!(body["data"]["pagination"]["pages"], json!(1));
    assert_eq!(body["data"]["searchStats"]["hasFilters"], json!(true));

    let (_, body) = app.get_json("/api/detection/history?hasDefects=false").await;
    assert_eq!(body["data"]["pagination"]["total"], json!(0));

    let (status, body) = app.get_json(&format!("/api/detection/details/{}", ids[0])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("completed"));
    assert_eq!(body["data"]["hasDefects"], json!(true));
    assert_eq!(body["data"]["defects"].as_array().unwrap().len(), 2);

    let (_, body) = app.get_json("/api/detection/stats").await;
    assert_eq!(body["data"]["totalDetections"], json!(2));
    assert_eq!(body["data"]["totalDefects"], json!(4));
    assert_eq!(body["data"]["qualityRate"], json!(0.0));

    let (_, body) = app.get_json("/api/detection/defect-types").await;
    assert_eq!(body["data"]["total"], json!(2));

    let (_, body) = app.get_json("/api/detection/recent?limit=1").await;
    assert_eq!(body["data"]["isUserSpecific"], json!(true));
    assert_eq!(body["data"]["hasMore"], json!(true));
    assert_eq!(body["data"]["recentDetections"][0]["id"], json!(ids[1]));

    let response = app
        .client
        .get(app.url(&format!("/api/detection/export/{}", ids[0])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/zip");
    let disposition = response.headers()["content-disposition"].to_str().unwrap().to_string();
    assert!(disposition.contains(&format!("detection_result_{}_", ids[0])));
    let bytes = response.bytes().await.unwrap();
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).unwrap();
    let mut labels = String::new();
    archive
        .by_name("results/predict/labels/input.txt")
        .unwrap()
        .read_to_string(&mut labels)
        .unwrap();
    assert_eq!(labels.lines().count(), 2);
    assert!(labels.starts_with("3 0.5 0.5 0.2 0.2 0.9"));

    let response = app
        .client
        .post(app.url("/api/detection/export/batch"))
        .json(&json!({"detectionIds": [ids[0], "999999", ids[0]]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.bytes().await.unwrap();
    let names = zip_names(&bytes);
    assert!(names.contains(&"export_summary.json".to_string()));
    let info_name = format!("detection_{}/detection_info.json", ids[0]);
    assert_eq!(names.iter().filter(|n| **n == info_name).count(), 1);

    let (status, body) = app
        .post_json("/api/detection/history/batch-delete", json!({"detectionIds": [ids[0], 999999]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["successCount"], json!(1));
    assert_eq!(body["data"]["failCount"], json!(1));
    assert_eq!(body["message"], json!("Batch delete finished: deleted 1 records, 1 failed"));

    let response = app
        .client
        .delete(app.url(&format!("/api/detection/history/{}", ids[1])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = app.get_json(&format!("/api/detection/details/{}", ids[1])).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.post_json("/api/detection/history/batch-delete", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Please provide detection record ids to delete"));
}

#[tokio::test]
async fn test_records_are_private_to_their_owner() {
    let inference = MockServer::start();
    mock_detection(&inference);
    let app = spawn_app(&inference).await;
    app.login("user@example.com", "user123").await;
    let (_, body) = app.detect(&app.client, board_png(), "image/png").await;
    let id = body["data"]["savedHistoryId"].as_i64().unwrap();

    let admin = spawn_client_for(&app, "admin@example.com", "admin123").await;
    let response = admin
        .get(app.url(&format!("/api/detection/details/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = admin.get(app.url("/api/detection/system-stats")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["totalInspections"], json!(1));
    assert_eq!(body["data"]["weeklyTrend"].as_array().unwrap().len(), 7);
    assert_eq!(body["data"]["weeklyTrend"][6]["inspections"], json!(1));

    let (status, _) = app.get_json("/api/detection/system-stats").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

async fn spawn_client_for(app: &TestApp, email: &str, password: &str) -> Client {
    let client = Client::builder().cookie_store(true).build().unwrap();
    let response = client
        .post(app.url("/api/auth/login"))
        .json(&json!({"email": email, "password": password}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    client
}

#[tokio::test]
async fn test_client_export_and_model_upload() {
    let inference = MockServer::start();
    let app = spawn_app(&inference).await;

    let response = app
        .guest()
        .post(app.url("/api/detection/export"))
        .json(&json!({
            "results": {
                "resultImage": null,
                "defects": [{"classId": 2, "confidence": 0.8,
                             "box": {"x": 0.1, "y": 0.2, "width": 0.3, "height": 0.4}}]
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let names = zip_names(&response.bytes().await.unwrap());
    assert_eq!(names, vec!["results/predict/labels/input.txt".to_string()]);

    let (status, _) = app.post_json("/api/detection/export", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.login("admin@example.com", "admin123").await;
    let form = Form::new()
        .part("modelFile", Part::bytes(b"onnx-bytes".to_vec()).file_name("best.onnx"))
        .text("modelName", "Board  Model")
        .text("modelVersion", "2.0")
        .text("isActive", "true");
    let response = app
        .client
        .post(app.url("/api/detection/model/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["modelName"], json!("Board  Model"));
    assert_eq!(body["data"]["isActive"], json!(true));

    let (_, body) = app.get_json("/api/detection/models").await;
    let models = body["data"]["models"].as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert!(models[0]["modelFile"].as_str().unwrap().contains("Board_Model_v2.0_"));

    let form = Form::new()
        .part("modelFile", Part::bytes(b"x".to_vec()).file_name("weights.pt"))
        .text("modelName", "m")
        .text("modelVersion", "1");
    let response = app
        .client
        .post(app.url("/api/detection/model/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_profile_avatar_password_and_account_deletion() {
    let inference = MockServer::start();
    let app = spawn_app(&inference).await;
    app.post_json(
        "/api/auth/register",
        json!({"name": "Lee", "email": "lee@example.com", "password": "first-pass"}),
    )
    .await;

    let (status, body) = app.get_json("/api/profile").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stats"]["totalDetections"], json!(0));
    assert_eq!(body["data"]["stats"]["qualityRate"], json!(100.0));
    assert_eq!(body["data"]["user"]["avatar"], Value::Null);

    let response = app
        .client
        .put(app.url("/api/profile"))
        .json(&json!({"name": "  Lee Chen  "}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["user"]["name"], json!("Lee Chen"));

    let response = app
        .client
        .put(app.url("/api/profile/password"))
        .json(&json!({
            "currentPassword": "first-pass",
            "newPassword": "second-pass",
            "confirmPassword": "other-pass"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .put(app.url("/api/profile/password"))
        .json(&json!({
            "currentPassword": "first-pass",
            "newPassword": "second-pass",
            "confirmPassword": "second-pass"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let png = board_png();
    let form = Form::new().part(
        "avatar",
        Part::bytes(png.clone()).file_name("me.png").mime_str("image/png").unwrap(),
    );
    let response = app
        .client
        .post(app.url("/api/profile/avatar"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, me) = app.get_json("/api/auth/me").await;
    let id = me["user"]["id"].as_i64().unwrap();
    assert!(me["user"]["avatar"].as_str().unwrap().starts_with("data:image/png;base64,"));

    let response = app
        .guest()
        .get(app.url(&format!("/api/profile/avatar/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    assert_eq!(response.headers()["etag"], format!("\"{}-{}\"", id, png.len()).as_str());
    assert_eq!(response.bytes().await.unwrap().to_vec(), png);

    let response = app
        .client
        .delete(app.url("/api/profile"))
        .json(&json!({"password": "second-pass", "confirmDelete": "delete"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .client
        .delete(app.url("/api/profile"))
        .json(&json!({"password": "second-pass", "confirmDelete": "DELETE"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _) = app.get_json("/api/auth/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .post_json("/api/auth/login", json!({"email": "lee@example.com", "password": "second-pass"}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_bodies_use_error_shape() {
    let inference = MockServer::start();
    let app = spawn_app(&inference).await;

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{\"email\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert!(body["message"].is_string());

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .body("email=a@b.co")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
}
