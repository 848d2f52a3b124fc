//! Tests for DriveClient with mocked HTTP responses.

use std::io::Write;

use chrono::{Duration, Utc};
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use tempfile::NamedTempFile;

use drive_embed::{Credential, DriveClient, DriveError, DriveSession, Endpoints, ErrorKind};

fn valid_credential() -> Credential {
    Credential {
        token: "test-access-token".to_string(),
        refresh_token: Some("test-refresh".to_string()),
        token_uri: "http://127.0.0.1:9/token".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/drive".to_string()],
        expiry: Some(Utc::now() + Duration::hours(1)),
    }
}

fn client_for(server: &ServerGuard) -> DriveClient {
    let session =
        DriveSession::establish(&valid_credential(), Endpoints::with_host(&server.url())).unwrap();
    DriveClient::new(session)
}

mod folder_exists {
    use super::*;

    #[tokio::test]
    async fn exact_match_in_parent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/drive/v3/files")
            .match_header("authorization", "Bearer test-access-token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded(
                    "q".into(),
                    "name = 'results' and mimeType = 'application/vnd.google-apps.folder' and trashed = false and 'root-folder' in parents".into(),
                ),
                Matcher::UrlEncoded("spaces".into(), "drive".into()),
            ]))
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [{"id": "f1", "name": "results"}]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.folder_exists("results", Some("root-folder")).await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn zero_results_is_false() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(!client.folder_exists("missing", None).await.unwrap());
    }

    #[tokio::test]
    async fn partial_or_case_mismatch_is_false() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"files": [
                    {"id": "f1", "name": "Results"},
                    {"id": "f2", "name": "results-old"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(!client.folder_exists("results", None).await.unwrap());
    }

    #[tokio::test]
    async fn quotes_in_name_are_escaped() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "name = 'bob\\'s' and mimeType = 'application/vnd.google-apps.folder' and trashed = false".into(),
            ))
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [{"id": "f1", "name": "bob's"}]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.folder_exists("bob's", None).await.unwrap());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failed_call_is_query_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body(json!({"error": {"code": 401, "message": "Invalid Credentials"}}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.folder_exists("results", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Query);
        assert!(err.to_string().contains("Invalid Credentials"));
    }
}

mod create_folders {
    use super::*;

    #[tokio::test]
    async fn creates_each_folder_in_order() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("POST", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({
                "name": "1",
                "mimeType": "application/vnd.google-apps.folder",
                "parents": ["parent"]
            })))
            .with_header("content-type", "application/json")
            .with_body(json!({"id": "id-1", "name": "1", "parents": ["parent"]}).to_string())
            .create_async()
            .await;
        let second = server
            .mock("POST", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"name": "2"})))
            .with_header("content-type", "application/json")
            .with_body(json!({"id": "id-2", "name": "2", "parents": ["parent"]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let folders = client.create_folders(&["1", "2"], Some("parent")).await.unwrap();

        let ids: Vec<_> = folders.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["id-1", "id-2"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn aborts_on_first_failure_and_reports_progress() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"name": "a"})))
            .with_header("content-type", "application/json")
            .with_body(json!({"id": "id-a", "name": "a"}).to_string())
            .create_async()
            .await;
        server
            .mock("POST", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"name": "b"})))
            .with_status(403)
            .with_body(json!({"error": {"code": 403, "message": "Insufficient permissions"}}).to_string())
            .create_async()
            .await;
        let never = server
            .mock("POST", "/drive/v3/files")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"name": "c"})))
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .create_folders(&["a", "b", "c"], Some("parent"))
            .await
            .unwrap_err();

        match err {
            DriveError::FolderBatchAborted {
                failed,
                created,
                source,
            } => {
                assert_eq!(failed, "b");
                assert_eq!(created, vec!["id-a".to_string()]);
                assert!(matches!(*source, DriveError::ApiError { status: 403, .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        never.assert_async().await;
    }
}

mod list_files {
    use super::*;

    #[tokio::test]
    async fn empty_folder_is_empty_vec() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "'folder-1' in parents and trashed = false".into(),
            ))
            .with_header("content-type", "application/json")
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let files = client.list_files("folder-1").await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn failure_is_distinct_from_empty() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("backend unavailable")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.list_files("folder-1").await.unwrap_err();
        match err {
            DriveError::QueryError { query, source } => {
                assert!(query.contains("'folder-1' in parents"));
                assert!(matches!(*source, DriveError::ApiError { status: 500, .. }));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn follows_next_page_token() {
        let mut server = Server::new_async().await;
        // Created first so it wins for the second request.
        let page_two = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_header("content-type", "application/json")
            .with_body(json!({"files": [{"id": "b", "name": "key_image.bmp"}]}).to_string())
            .create_async()
            .await;
        let page_one = server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "files": [{"id": "a", "name": "watermarked_image.bmp", "size": "1078"}],
                    "nextPageToken": "p2"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let files = client.list_files("folder-1").await.unwrap();

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["watermarked_image.bmp", "key_image.bmp"]);
        assert_eq!(files[0].size, Some(1078));
        page_one.assert_async().await;
        page_two.assert_async().await;
    }
}

mod file_links {
    use super::*;

    #[tokio::test]
    async fn returns_both_links() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files/file-1")
            .match_query(Matcher::UrlEncoded(
                "fields".into(),
                "webViewLink, webContentLink".into(),
            ))
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "webViewLink": "https://drive.google.com/file/d/file-1/view",
                    "webContentLink": "https://drive.google.com/uc?id=file-1&export=download"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let links = client.get_file_links("file-1").await.unwrap();
        assert_eq!(
            links.view.as_deref(),
            Some("https://drive.google.com/file/d/file-1/view")
        );
        assert!(links.download.unwrap().contains("export=download"));
    }

    #[tokio::test]
    async fn missing_links_are_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files/folder-1")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(json!({"webViewLink": "https://drive.google.com/drive/folders/folder-1"}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let links = client.get_file_links("folder-1").await.unwrap();
        assert!(links.view.is_some());
        assert!(links.download.is_none());
    }

    #[tokio::test]
    async fn id_stays_a_single_path_segment() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/drive/v3/files/a%2Fb")
            .match_query(Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(json!({"webViewLink": "https://view"}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let links = client.get_file_links("a/b").await.unwrap();
        assert_eq!(links.view.as_deref(), Some("https://view"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/drive/v3/files/nope")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(json!({"error": {"code": 404, "message": "File not found: nope."}}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client.get_file_links("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(matches!(err, DriveError::FileNotFound(ref id) if id == "nope"));
    }
}

mod resumable_upload {
    use super::*;

    const PAYLOAD: &[u8] = b"resumable payload";

    fn staged_payload() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(PAYLOAD).unwrap();
        file
    }

    #[tokio::test]
    async fn opens_session_then_puts_content() {
        let mut server = Server::new_async().await;
        let session_url = format!(
            "{}/upload/drive/v3/files?uploadType=resumable&upload_id=sess-1",
            server.url()
        );
        let open_session = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "resumable".into()))
            .match_header("x-upload-content-type", "application/zip")
            .match_header("x-upload-content-length", "17")
            .match_body(Matcher::PartialJson(json!({
                "name": "embedding.zip",
                "parents": ["dest"]
            })))
            .with_header("location", &session_url)
            .create_async()
            .await;
        let put_content = server
            .mock("PUT", "/upload/drive/v3/files")
            .match_query(Matcher::UrlEncoded("upload_id".into(), "sess-1".into()))
            .match_header("content-type", "application/zip")
            .match_body(Matcher::Exact("resumable payload".to_string()))
            .with_header("content-type", "application/json")
            .with_body(json!({"id": "big-1", "name": "embedding.zip", "parents": ["dest"]}).to_string())
            .create_async()
            .await;

        let client = client_for(&server).with_resumable_threshold(4);
        let staged = staged_payload();
        let file = client
            .upload_file(staged.path(), "embedding.zip", "dest", Some("application/zip"))
            .await
            .unwrap();

        assert_eq!(file.id, "big-1");
        assert_eq!(file.parents, vec!["dest".to_string()]);
        open_session.assert_async().await;
        put_content.assert_async().await;
    }

    #[tokio::test]
    async fn missing_location_is_an_error() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "resumable".into()))
            .create_async()
            .await;
        let put_content = server
            .mock("PUT", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client_for(&server).with_resumable_threshold(4);
        let staged = staged_payload();
        let err = client
            .upload_file(staged.path(), "embedding.zip", "dest", None)
            .await
            .unwrap_err();

        match err {
            DriveError::ApiError { message, .. } => assert!(message.contains("Location")),
            other => panic!("unexpected error: {:?}", other),
        }
        put_content.assert_async().await;
    }

    #[tokio::test]
    async fn small_payload_stays_multipart() {
        let mut server = Server::new_async().await;
        let multipart = server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "multipart".into()))
            .with_header("content-type", "application/json")
            .with_body(json!({"id": "small-1", "name": "key_image.bmp"}).to_string())
            .create_async()
            .await;

        let client = client_for(&server).with_resumable_threshold(PAYLOAD.len() as u64);
        let staged = staged_payload();
        let file = client
            .upload_file(staged.path(), "key_image.bmp", "dest", None)
            .await
            .unwrap();

        assert_eq!(file.id, "small-1");
        multipart.assert_async().await;
    }
}
