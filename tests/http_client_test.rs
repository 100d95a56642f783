// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - HTTP Client Tests
 * Tests for form discovery, multipart uploads and redirect handling
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use upload_intel::errors::TransportError;
use upload_intel::http_client::{HttpClient, Transport, UploadFile};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

const ACCOUNT_PAGE: &str = r#"<html><body>
<form class="login-form" id="avatar-upload-form" action="/my-account/avatar" method="POST" enctype="multipart/form-data">
    <p>
    <label>Avatar:</label>
    <input type="file" name="avatar">
    <input required type="hidden" name="user" value="wiener" />
    <input required type="hidden" name="csrf" value="tok123">
    <button class=button type=submit>Upload</button>
</form>
</body></html>"#;

#[tokio::test]
async fn test_http_client_get_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("Success")
                .insert_header("X-Powered-By", "PHP/7.4.3"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/test", mock_server.uri());
    let client = HttpClient::new(&url, 5).unwrap();
    let response = client.fetch(&url).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "Success");
    assert_eq!(
        response.headers.get("x-powered-by").map(String::as_str),
        Some("PHP/7.4.3")
    );
    assert_eq!(response.header("X-Powered-By").as_deref(), Some("PHP/7.4.3"));
}

#[tokio::test]
async fn test_http_client_does_not_follow_redirects() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my-account"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/login"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/my-account", mock_server.uri());
    let client = HttpClient::new(&url, 5).unwrap();
    let response = client.fetch(&url).await.unwrap();

    assert_eq!(response.status_code, 302);
    assert_eq!(response.header("location").as_deref(), Some("/login"));
}

#[tokio::test]
async fn test_upload_discovers_form_on_parent_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my-account/avatar"))
        .respond_with(ResponseTemplate::new(405))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/my-account"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ACCOUNT_PAGE))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/my-account/avatar"))
        .and(body_string_contains("tok123"))
        .and(body_string_contains("name=\"avatar\"; filename=\"shell.php\""))
        .and(body_string_contains("wiener"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("The file avatars/shell.php has been uploaded."),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let upload_url = format!("{}/my-account/avatar", mock_server.uri());
    let client = HttpClient::new(&upload_url, 5).unwrap();

    let fields = client.discover_form().await;
    assert_eq!(fields.csrf.as_deref(), Some("tok123"));
    assert_eq!(fields.file_field.as_deref(), Some("avatar"));

    let file = UploadFile::new("shell.php", b"<?php echo 1; ?>".to_vec())
        .with_content_type("application/x-php");
    let response = client.upload(&file).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert!(response.contains("has been uploaded"));
}

#[tokio::test]
async fn test_upload_falls_back_to_default_field_name() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("name=\"file\"; filename=\"probe.jpg\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let upload_url = format!("{}/upload", mock_server.uri());
    let client = HttpClient::new(&upload_url, 5).unwrap();

    let file = UploadFile::new("probe.jpg", b"JFIF".to_vec()).with_content_type("image/jpeg");
    let response = client.upload(&file).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "ok");
}

#[tokio::test]
async fn test_upload_keeps_encoded_null_byte_in_filename() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(body_string_contains("filename=\"exploit.php%00.jpg\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("stored"))
        .mount(&mock_server)
        .await;

    let upload_url = format!("{}/upload", mock_server.uri());
    let client = HttpClient::new(&upload_url, 5).unwrap();

    let file = UploadFile::new("exploit.php%00.jpg", b"<?php ?>".to_vec());
    let response = client.upload(&file).await.unwrap();

    assert_eq!(response.status_code, 200);
}

#[tokio::test]
async fn test_session_cookie_is_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/my-account"))
        .and(wiremock::matchers::header("cookie", "session=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Your username is: wiener"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/my-account", mock_server.uri());
    let settings = upload_intel::config::HttpSettings::default();
    let client = HttpClient::with_config(&url, &settings, Some("abc123")).unwrap();
    let response = client.fetch(&url).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert!(response.contains("wiener"));
}

#[test]
fn test_invalid_upload_url_is_rejected() {
    let result = HttpClient::new("not a url", 5);
    assert!(matches!(result, Err(TransportError::InvalidUrl { .. })));
}
