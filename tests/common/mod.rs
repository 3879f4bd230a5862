//! Shared helpers for tests against a mocked Drive API.

#![allow(dead_code)]

use drive_folder::{Authenticator, ClientConfig, FolderClient};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

pub const TOKEN: &str = "test-token";

pub const AUTH_HEADER: &str = "Bearer test-token";

pub const SERVICE_ACCOUNT_KEY: &str = include_str!("../fixtures/service_account_key.pem");

pub async fn server() -> ServerGuard {
    Server::new_async().await
}

pub fn client_for(server: &ServerGuard) -> FolderClient {
    FolderClient::new(
        Authenticator::from_access_token(TOKEN),
        ClientConfig::default().with_base_url(&server.url()),
    )
    .unwrap()
}

pub fn list_body(files: &[(&str, &str)], next_page_token: Option<&str>) -> String {
    let files: Vec<_> = files
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name}))
        .collect();

    let mut body = json!({ "files": files });
    if let Some(token) = next_page_token {
        body["nextPageToken"] = json!(token);
    }
    body.to_string()
}

pub fn folder_query(folder_id: &str) -> Matcher {
    Matcher::UrlEncoded(
        "q".into(),
        format!("'{}' in parents and trashed = false", folder_id),
    )
}

/// A single-page listing of `folder_id`, expected `hits` times.
pub async fn mock_listing(
    server: &mut ServerGuard,
    folder_id: &str,
    files: &[(&str, &str)],
    hits: usize,
) -> Mock {
    server
        .mock("GET", "/files")
        .match_query(folder_query(folder_id))
        .match_header("authorization", AUTH_HEADER)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(list_body(files, None))
        .expect(hits)
        .create_async()
        .await
}

pub async fn mock_media(
    server: &mut ServerGuard,
    file_id: &str,
    content: &[u8],
    hits: usize,
) -> Mock {
    server
        .mock("GET", format!("/files/{}", file_id).as_str())
        .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
        .match_header("authorization", AUTH_HEADER)
        .with_status(200)
        .with_header("content-type", "application/octet-stream")
        .with_body(content)
        .expect(hits)
        .create_async()
        .await
}

pub fn api_error_body(code: u16, message: &str) -> String {
    json!({"error": {"code": code, "message": message}}).to_string()
}
