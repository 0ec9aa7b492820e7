//! Integration tests for folder and tree operations.

mod helpers;

use axum::http::StatusCode;
use serde_json::json;

use helpers::TestApp;

#[tokio::test]
async fn test_requests_without_a_token_are_rejected() {
    let app = TestApp::new();

    let response = app.get("/api/files", None).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error(), "AUTHENTICATION");
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new();

    let response = app.get("/api/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["status"], "ok");
    assert_eq!(response.data()["storage_provider"], "memory");
}

#[tokio::test]
async fn test_session_identity_is_mirrored() {
    let app = TestApp::new();
    let alice = app.user("Alice");

    let response = app.get("/api/user", Some(&alice)).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["email"], "alice@example.com");
    assert_eq!(response.data()["name"], "Alice");
}

#[tokio::test]
async fn test_sibling_names_are_unique_per_kind() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    app.folder(&alice, "Docs", None).await;

    let response = app
        .post("/api/files/folder", json!({ "name": " Docs " }), &alice)
        .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(response.error(), "NAME_CONFLICT");

    // A file may share a folder's name.
    app.file(&alice, "Docs", b"x", None).await;
}

#[tokio::test]
async fn test_invalid_names_are_rejected() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;

    for name in ["", "   ", "a/b"] {
        let response = app
            .post("/api/files/folder", json!({ "name": name }), &alice)
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{name:?}");
    }
}

#[tokio::test]
async fn test_list_root_and_folder() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let docs = app.folder(&alice, "Docs", None).await;
    app.file(&alice, "notes.txt", b"hello", Some(docs)).await;
    app.file(&alice, "top.txt", b"hi", None).await;

    let root = app.get("/api/files", Some(&alice)).await;
    assert_eq!(root.status, StatusCode::OK);
    let mut names = root.names();
    names.sort();
    assert_eq!(names, vec!["Docs", "top.txt"]);

    let inside = app
        .get(&format!("/api/files?parentId={docs}"), Some(&alice))
        .await;
    assert_eq!(inside.names(), vec!["notes.txt"]);
}

#[tokio::test]
async fn test_rename_and_move() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let a = app.folder(&alice, "A", None).await;
    let b = app.folder(&alice, "B", None).await;
    let file = app.file(&alice, "f.txt", b"x", Some(a)).await;

    let response = app
        .patch(
            &format!("/api/files/{file}"),
            json!({ "name": "g.txt", "parent_id": b }),
            &alice,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    assert_eq!(response.data()["name"], "g.txt");
    assert_eq!(response.data()["parent_id"], b.to_string());

    let to_root = app
        .patch(&format!("/api/files/{file}"), json!({ "parent_id": null }), &alice)
        .await;
    assert_eq!(to_root.status, StatusCode::OK);
    assert!(to_root.data()["parent_id"].is_null());

    let nothing = app
        .patch(&format!("/api/files/{file}"), json!({}), &alice)
        .await;
    assert_eq!(nothing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_folder_cannot_move_into_its_own_subtree() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let a = app.folder(&alice, "A", None).await;
    let b = app.folder(&alice, "B", Some(a)).await;

    let into_child = app
        .patch(&format!("/api/files/{a}"), json!({ "parent_id": b }), &alice)
        .await;
    assert_eq!(into_child.status, StatusCode::BAD_REQUEST);
    assert_eq!(into_child.error(), "INVALID_OPERATION");

    let into_self = app
        .patch(&format!("/api/files/{a}"), json!({ "parent_id": a }), &alice)
        .await;
    assert_eq!(into_self.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trash_restore_and_purge_cycle() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let docs = app.folder(&alice, "Docs", None).await;
    let file = app.file(&alice, "a.txt", b"abc", Some(docs)).await;

    let trashed = app.delete(&format!("/api/files/{docs}"), &alice).await;
    assert_eq!(trashed.status, StatusCode::OK);
    assert_eq!(trashed.data()["trashed"], 2);

    assert!(app.get("/api/files", Some(&alice)).await.names().is_empty());
    let mut in_trash = app.get("/api/files/trash", Some(&alice)).await.names();
    in_trash.sort();
    assert_eq!(in_trash, vec!["Docs", "a.txt"]);

    let restored = app
        .request("POST", &format!("/api/files/{docs}/restore"), None, Some(&alice))
        .await;
    assert_eq!(restored.status, StatusCode::OK);
    let inside = app
        .get(&format!("/api/files?parentId={docs}"), Some(&alice))
        .await;
    assert_eq!(inside.names(), vec!["a.txt"]);

    // Purging requires the node to be in the trash first.
    let live = app.delete(&format!("/api/files/{file}/permanent"), &alice).await;
    assert_eq!(live.status, StatusCode::BAD_REQUEST);

    app.delete(&format!("/api/files/{file}"), &alice).await;
    let purged = app.delete(&format!("/api/files/{file}/permanent"), &alice).await;
    assert_eq!(purged.status, StatusCode::OK);
    assert_eq!(purged.data()["purged"], 1);
    assert_eq!(purged.data()["released"], 1);

    let storage = app.get("/api/storage", Some(&alice)).await;
    assert_eq!(storage.data()["used_bytes"], 0);
}

#[tokio::test]
async fn test_restore_renames_when_the_name_was_taken() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let first = app.file(&alice, "report.txt", b"1", None).await;
    app.delete(&format!("/api/files/{first}"), &alice).await;
    app.file(&alice, "report.txt", b"2", None).await;

    let restored = app
        .request("POST", &format!("/api/files/{first}/restore"), None, Some(&alice))
        .await;

    assert_eq!(restored.status, StatusCode::OK);
    assert_eq!(restored.data()["name"], "report (1).txt");
}

#[tokio::test]
async fn test_empty_trash_purges_everything_trashed() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let a = app.file(&alice, "a.txt", b"a", None).await;
    let b = app.file(&alice, "b.txt", b"b", None).await;
    app.delete(&format!("/api/files/{a}"), &alice).await;
    app.delete(&format!("/api/files/{b}"), &alice).await;

    let response = app.delete("/api/files/trash", &alice).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["purged"], 2);
    assert!(app.get("/api/files/trash", Some(&alice)).await.names().is_empty());
}

#[tokio::test]
async fn test_duplicate_copies_subtree_with_numbered_name() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let docs = app.folder(&alice, "Docs", None).await;
    app.file(&alice, "a.txt", b"abc", Some(docs)).await;

    let copy = app
        .request("POST", &format!("/api/files/{docs}/duplicate"), None, Some(&alice))
        .await;
    assert_eq!(copy.status, StatusCode::CREATED, "{}", copy.body);
    assert_eq!(copy.data()["name"], "Docs (1)");

    let copied = app
        .get(&format!("/api/files?parentId={}", copy.id()), Some(&alice))
        .await;
    assert_eq!(copied.names(), vec!["a.txt"]);

    let storage = app.get("/api/storage", Some(&alice)).await;
    assert_eq!(storage.data()["used_bytes"], 6);
}

#[tokio::test]
async fn test_star_and_starred_view() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let file = app.file(&alice, "fav.txt", b"x", None).await;
    app.file(&alice, "other.txt", b"x", None).await;

    let response = app
        .patch(&format!("/api/files/{file}/star"), json!({ "is_starred": true }), &alice)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["is_starred"], true);

    let starred = app.get("/api/files/starred", Some(&alice)).await;
    assert_eq!(starred.names(), vec!["fav.txt"]);
}

#[tokio::test]
async fn test_search_and_breadcrumb() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let a = app.folder(&alice, "Projects", None).await;
    let b = app.folder(&alice, "Nimbus", Some(a)).await;
    let file = app.file(&alice, "Roadmap.md", b"#", Some(b)).await;

    let found = app.get("/api/files/search?q=roadmap", Some(&alice)).await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.names(), vec!["Roadmap.md"]);

    let path = app
        .get(&format!("/api/files/path?fileId={file}"), Some(&alice))
        .await;
    assert_eq!(path.status, StatusCode::OK);
    assert_eq!(path.names(), vec!["Projects", "Nimbus", "Roadmap.md"]);
}

#[tokio::test]
async fn test_other_users_nodes_are_invisible() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let bob = app.signed_in("Bob").await;
    let docs = app.folder(&alice, "Docs", None).await;

    let rename = app
        .patch(&format!("/api/files/{docs}"), json!({ "name": "Mine" }), &bob)
        .await;
    assert_eq!(rename.status, StatusCode::NOT_FOUND);

    let listing = app
        .get(&format!("/api/files?parentId={docs}"), Some(&bob))
        .await;
    assert_eq!(listing.status, StatusCode::NOT_FOUND);
}
