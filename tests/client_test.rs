//! Tests for FolderClient listing, downloading and deleting against a mocked
//! Drive API.

mod common;

use std::io::Write;

use common::*;
use drive_folder::{Downloaded, DriveError};
use futures::TryStreamExt;
use mockito::Matcher;
use serde_json::json;
use tempfile::NamedTempFile;

mod credentials {
    use super::*;
    use drive_folder::{Authenticator, ClientConfig, FolderClient};

    fn credentials_file(token_uri: Option<String>) -> NamedTempFile {
        let mut creds = json!({
            "client_email": "reader@project.iam.gserviceaccount.com",
            "private_key": SERVICE_ACCOUNT_KEY,
        });
        if let Some(uri) = token_uri {
            creds["token_uri"] = json!(uri);
        }

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(creds.to_string().as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_client_from_credentials_file() {
        let file = credentials_file(None);
        assert!(FolderClient::from_credentials_file(file.path()).is_ok());
    }

    #[test]
    fn test_missing_credentials_file() {
        let err = FolderClient::from_credentials_file("/nonexistent/path/credentials.json")
            .err()
            .unwrap();
        assert!(matches!(err, DriveError::CredentialsFileError { .. }));
        assert!(err.to_string().contains("/nonexistent/path/credentials.json"));
    }

    #[test]
    fn test_invalid_credentials_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"not valid json").unwrap();

        let err = Authenticator::from_file(temp_file.path()).err().unwrap();
        assert!(matches!(err, DriveError::CredentialsParseError(_)));
    }

    #[test]
    fn test_credentials_missing_private_key() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(br#"{"client_email": "reader@project.iam.gserviceaccount.com"}"#)
            .unwrap();

        assert!(Authenticator::from_file(temp_file.path()).is_err());
    }

    #[tokio::test]
    async fn test_service_account_token_exchange_is_cached() {
        let mut server = server().await;
        let token_mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "grant_type".into(),
                    "urn:ietf:params:oauth:grant-type:jwt-bearer".into(),
                ),
                Matcher::Regex("assertion=".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token": "ya29.minted", "token_type": "Bearer", "expires_in": 3600}"#)
            .expect(1)
            .create_async()
            .await;
        let list_mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer ya29.minted")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(list_body(&[("f1", "a.png")], None))
            .expect(2)
            .create_async()
            .await;

        let file = credentials_file(Some(format!("{}/token", server.url())));
        let auth = Authenticator::from_file(file.path()).unwrap();
        let client =
            FolderClient::new(auth, ClientConfig::default().with_base_url(&server.url())).unwrap();

        assert_eq!(client.list_all("folder1", 100).await.unwrap().len(), 1);
        assert_eq!(client.list_all("folder1", 100).await.unwrap().len(), 1);

        token_mock.assert_async().await;
        list_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_exchange_failure() {
        let mut server = server().await;
        let _token_mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error": "invalid_grant"}"#)
            .create_async()
            .await;

        let file = credentials_file(Some(format!("{}/token", server.url())));
        let auth = Authenticator::from_file(file.path()).unwrap();

        let err = auth.get_access_token().await.unwrap_err();
        assert!(matches!(err, DriveError::TokenRefreshError(ref msg) if msg.contains("invalid_grant")));
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn test_follows_cursor_until_last_page() {
        let mut server = server().await;
        let first = server
            .mock("GET", "/files")
            .match_query(Matcher::AllOf(vec![
                folder_query("folder1"),
                Matcher::Regex("pageSize=2$".into()),
            ]))
            .match_header("authorization", AUTH_HEADER)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(list_body(&[("f1", "a.png"), ("f2", "b.png")], Some("tok-1")))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/files")
            .match_query(Matcher::AllOf(vec![
                folder_query("folder1"),
                Matcher::UrlEncoded("pageToken".into(), "tok-1".into()),
            ]))
            .match_header("authorization", AUTH_HEADER)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(list_body(&[("f3", "c.png")], None))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let files = client.list_all("folder1", 2).await.unwrap();

        let ids: Vec<_> = files.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);
        assert_eq!(files[2].name, "c.png");

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_listing_is_lazy_and_restartable() {
        let mut server = server().await;
        let mock = mock_listing(&mut server, "folder1", &[("f1", "a.png")], 2).await;

        let client = client_for(&server);

        // Building the stream sends nothing.
        drop(client.list_files("folder1", 10));

        for _ in 0..2 {
            let files: Vec<_> = client.list_files("folder1", 10).try_collect().await.unwrap();
            assert_eq!(files.len(), 1);
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_folder() {
        let mut server = server().await;
        let _mock = mock_listing(&mut server, "empty", &[], 1).await;

        let client = client_for(&server);
        assert!(client.list_all("empty", 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_error_message_is_parsed() {
        let mut server = server().await;
        let _mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(api_error_body(404, "File not found: missing."))
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.list_all("missing", 100).await.unwrap_err();

        match err {
            DriveError::ApiError { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "File not found: missing.");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
    }
}

mod download {
    use super::*;

    #[tokio::test]
    async fn test_memory_and_file_modes_match() {
        let mut server = server().await;
        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mock = mock_media(&mut server, "img1", &content, 2).await;

        let client = client_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img1.bin");

        let in_memory = client.download_file("img1", None).await.unwrap();
        let on_disk = client.download_file("img1", Some(&path)).await.unwrap();

        assert_eq!(in_memory, Downloaded::Bytes(content.clone()));
        assert_eq!(
            on_disk,
            Downloaded::Written {
                path: path.clone(),
                bytes: content.len() as u64
            }
        );
        assert_eq!(std::fs::read(&path).unwrap(), content);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_returned_and_nothing_written() {
        let mut server = server().await;
        let _mock = server
            .mock("GET", "/files/locked")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let client = client_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locked.bin");

        let err = client.download_to("locked", &path).await.unwrap_err();
        match err {
            DriveError::ApiError { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("expected ApiError, got {:?}", other),
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_replaces_existing_file_without_leftovers() {
        let mut server = server().await;
        let _mock = mock_media(&mut server, "img1", b"fresh", 1).await;

        let client = client_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img1.png");
        std::fs::write(&path, b"stale content that is longer").unwrap();

        assert_eq!(client.download_to("img1", &path).await.unwrap(), 5);
        assert_eq!(std::fs::read(&path).unwrap(), b"fresh");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_missing_parent_directory_fails() {
        let mut server = server().await;
        let _mock = mock_media(&mut server, "img1", b"data", 1).await;

        let client = client_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("img1.bin");

        let err = client.download_to("img1", &path).await.unwrap_err();
        assert!(matches!(err, DriveError::IoError(_)));
    }

    #[tokio::test]
    async fn test_iter_images_yields_contents_in_listing_order() {
        let mut server = server().await;
        let _listing = mock_listing(
            &mut server,
            "album",
            &[("p1", "one.jpg"), ("p2", "notes.txt"), ("p3", "three.jpg")],
            1,
        )
        .await;
        let _m1 = mock_media(&mut server, "p1", b"first", 1).await;
        let _m2 = mock_media(&mut server, "p2", b"second", 1).await;
        let _m3 = mock_media(&mut server, "p3", b"third", 1).await;

        let client = client_for(&server);
        let contents: Vec<Vec<u8>> = client.iter_images("album", 100).try_collect().await.unwrap();

        assert_eq!(
            contents,
            vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_iter_images_stops_at_first_failure() {
        let mut server = server().await;
        let _listing = mock_listing(&mut server, "album", &[("p1", "one.jpg"), ("p2", "two.jpg")], 1).await;
        let _m1 = server
            .mock("GET", "/files/p1")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let m2 = mock_media(&mut server, "p2", b"second", 0).await;

        let client = client_for(&server);
        let result: Result<Vec<Vec<u8>>, _> = client.iter_images("album", 100).try_collect().await;

        assert!(matches!(result, Err(DriveError::ApiError { status: 500, .. })));
        m2.assert_async().await;
    }
}

mod delete {
    use super::*;

    #[tokio::test]
    async fn test_deletes_every_file_but_not_the_folder() {
        let mut server = server().await;
        let _listing = mock_listing(&mut server, "folder1", &[("f1", "a.png"), ("f2", "b.png")], 1).await;
        let d1 = server
            .mock("DELETE", "/files/f1")
            .match_query(Matcher::Any)
            .match_header("authorization", AUTH_HEADER)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let d2 = server
            .mock("DELETE", "/files/f2")
            .match_query(Matcher::Any)
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let folder_delete = server
            .mock("DELETE", "/files/folder1")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let report = client.delete_folder_contents("folder1").await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.total(), 2);
        d1.assert_async().await;
        d2.assert_async().await;
        folder_delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_per_file_failure_is_reported_not_raised() {
        let mut server = server().await;
        let _listing = mock_listing(
            &mut server,
            "folder1",
            &[("f1", "a.png"), ("f2", "b.png"), ("f3", "c.png")],
            1,
        )
        .await;
        let _d1 = server
            .mock("DELETE", "/files/f1")
            .match_query(Matcher::Any)
            .with_status(204)
            .create_async()
            .await;
        let _d2 = server
            .mock("DELETE", "/files/f2")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body(api_error_body(403, "The user does not have sufficient permissions"))
            .create_async()
            .await;
        // Already gone counts as deleted.
        let _d3 = server
            .mock("DELETE", "/files/f3")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let report = client.delete_folder_contents("folder1").await.unwrap();

        assert_eq!(report.total(), 3);
        let failed: Vec<_> = report.failed().map(|(f, _)| f.name.as_str()).collect();
        assert_eq!(failed, vec!["b.png"]);
        assert!(matches!(
            report.into_result(),
            Err(DriveError::PartialFailure { failed: 1, total: 3 })
        ));
    }

    #[tokio::test]
    async fn test_empty_folder_succeeds_repeatedly() {
        let mut server = server().await;
        let listing = mock_listing(&mut server, "empty", &[], 2).await;

        let client = client_for(&server);
        for _ in 0..2 {
            let report = client.delete_folder_contents("empty").await.unwrap();
            assert!(report.is_complete());
            assert_eq!(report.total(), 0);
        }
        listing.assert_async().await;
    }

    #[tokio::test]
    async fn test_listing_failure_is_an_error() {
        let mut server = server().await;
        let _mock = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("backend error")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.delete_folder_contents("folder1").await.unwrap_err();
        assert!(matches!(err, DriveError::ApiError { status: 500, .. }));
    }
}
