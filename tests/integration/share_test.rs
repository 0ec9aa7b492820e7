//! Integration tests for link shares, named grants, and public access.

mod helpers;

use axum::http::{StatusCode, header};
use serde_json::json;
use uuid::Uuid;

use helpers::{BASE_URL, TestApp, TestUser};

/// Turn on the node's link with `access_level` and return its token.
async fn link_token(app: &TestApp, owner: &TestUser, node: Uuid, access_level: &str) -> String {
    let response = app
        .patch(
            &format!("/api/files/{node}/share"),
            json!({ "access_level": access_level }),
            owner,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);
    let link = response.data()["share_link"]
        .as_str()
        .expect("share_link")
        .to_string();
    let prefix = format!("{BASE_URL}/shared/");
    assert!(link.starts_with(&prefix), "{link}");
    link[prefix.len()..].to_string()
}

#[tokio::test]
async fn test_share_info_before_any_share() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let file = app.file(&alice, "a.txt", b"a", None).await;

    let info = app
        .get(&format!("/api/files/{file}/share"), Some(&alice))
        .await;

    assert_eq!(info.status, StatusCode::OK);
    assert_eq!(info.data()["access_level"], "restricted");
    assert!(info.data()["share_link"].is_null());
    let people = info.data()["people"].as_array().unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0]["role"], "owner");
    assert_eq!(people[0]["permission"], "editor");

    let copy = app
        .get(&format!("/api/files/{file}/share/copy-link"), Some(&alice))
        .await;
    assert_eq!(copy.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_anyone_link_opens_for_anonymous_callers() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let file = app.file(&alice, "report.txt", b"quarterly", None).await;
    let token = link_token(&app, &alice, file, "anyone").await;

    let view = app.get(&format!("/api/shared/{token}"), None).await;
    assert_eq!(view.status, StatusCode::OK, "{}", view.body);
    assert_eq!(view.data()["name"], "report.txt");
    assert_eq!(view.data()["permission"], "viewer");
    assert_eq!(view.data()["owner_name"], "Alice");

    let download = app.get(&format!("/api/shared/{token}/download"), None).await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(&download.raw[..], b"quarterly");
    let disposition = download.headers[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment;"), "{disposition}");
    assert!(disposition.contains("report.txt"));
}

#[tokio::test]
async fn test_link_token_survives_settings_changes() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let file = app.file(&alice, "a.txt", b"a", None).await;

    let first = link_token(&app, &alice, file, "anyone").await;
    let second = link_token(&app, &alice, file, "restricted").await;
    assert_eq!(first, second);

    let copy = app
        .get(&format!("/api/files/{file}/share/copy-link"), Some(&alice))
        .await;
    assert_eq!(
        copy.data()["share_link"],
        format!("{BASE_URL}/shared/{first}")
    );
}

#[tokio::test]
async fn test_public_denials_are_indistinguishable() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let bob = app.signed_in("Bob").await;
    let file = app.file(&alice, "secret.txt", b"s", None).await;
    let token = link_token(&app, &alice, file, "restricted").await;

    let unknown = app.get("/api/shared/not-a-token", None).await;
    let anonymous = app.get(&format!("/api/shared/{token}"), None).await;
    let stranger = app.get(&format!("/api/shared/{token}"), Some(&bob)).await;

    for response in [&unknown, &anonymous, &stranger] {
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body["message"], unknown.body["message"]);
    }

    // The owner always gets through, even on a restricted link.
    let owner = app.get(&format!("/api/shared/{token}"), Some(&alice)).await;
    assert_eq!(owner.status, StatusCode::OK);
    assert_eq!(owner.data()["permission"], "editor");
}

#[tokio::test]
async fn test_trashed_node_closes_its_link() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let file = app.file(&alice, "a.txt", b"a", None).await;
    let token = link_token(&app, &alice, file, "anyone").await;

    app.delete(&format!("/api/files/{file}"), &alice).await;

    let view = app.get(&format!("/api/shared/{token}"), None).await;
    assert_eq!(view.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_token_on_public_route_falls_back_to_anonymous() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let file = app.file(&alice, "a.txt", b"a", None).await;
    let token = link_token(&app, &alice, file, "anyone").await;
    let forged = TestUser {
        id: Uuid::new_v4(),
        email: "mallory@example.com".to_string(),
        token: "not.a.jwt".to_string(),
    };

    let view = app.get(&format!("/api/shared/{token}"), Some(&forged)).await;

    assert_eq!(view.status, StatusCode::OK);
}

#[tokio::test]
async fn test_add_people_reports_each_address() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let bob = app.signed_in("Bob").await;
    let file = app.file(&alice, "a.txt", b"a", None).await;

    let response = app
        .post(
            &format!("/api/files/{file}/share/people"),
            json!({
                "emails": [" BOB@example.com ", "bob@example.com", "not-an-email", alice.email, "carol@example.com"],
                "permission": "viewer"
            }),
            &alice,
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.body);

    let outcomes = response.data().as_array().unwrap();
    let status_of = |email: &str| {
        outcomes
            .iter()
            .find(|o| o["email"] == email)
            .map(|o| o["status"].as_str().unwrap().to_string())
    };
    assert_eq!(outcomes.len(), 3);
    assert_eq!(status_of(&bob.email).as_deref(), Some("added"));
    assert_eq!(status_of("not-an-email").as_deref(), Some("failed"));
    assert_eq!(status_of("carol@example.com").as_deref(), Some("added"));

    let again = app
        .post(
            &format!("/api/files/{file}/share/people"),
            json!({ "emails": [bob.email], "permission": "editor" }),
            &alice,
        )
        .await;
    assert_eq!(again.data()[0]["status"], "updated");

    let info = app
        .get(&format!("/api/files/{file}/share"), Some(&alice))
        .await;
    let people = info.data()["people"].as_array().unwrap();
    assert_eq!(people.len(), 3);
    let bob_entry = people.iter().find(|p| p["email"] == bob.email).unwrap();
    assert_eq!(bob_entry["permission"], "editor");
    assert_eq!(bob_entry["name"], "Bob");

    let empty = app
        .post(
            &format!("/api/files/{file}/share/people"),
            json!({ "emails": ["  "] }),
            &alice,
        )
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_grantee_sees_shared_folder_and_its_contents() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let bob = app.signed_in("Bob").await;
    let folder = app.folder(&alice, "Team", None).await;
    let inner = app.file(&alice, "plan.txt", b"plan", Some(folder)).await;

    app.post(
        &format!("/api/files/{folder}/share/people"),
        json!({ "emails": [bob.email], "permission": "viewer" }),
        &alice,
    )
    .await;

    let shared = app.get("/api/files/shared", Some(&bob)).await;
    assert_eq!(shared.status, StatusCode::OK);
    assert_eq!(shared.names(), vec!["Team"]);
    assert_eq!(shared.data()[0]["permission"], "viewer");

    let listing = app
        .get(&format!("/api/files?parentId={folder}"), Some(&bob))
        .await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.names(), vec!["plan.txt"]);

    let download = app
        .get(&format!("/api/files/{inner}/download"), Some(&bob))
        .await;
    assert_eq!(download.status, StatusCode::OK);
    assert_eq!(&download.raw[..], b"plan");

    let path = app
        .get(&format!("/api/files/path?fileId={inner}"), Some(&bob))
        .await;
    assert_eq!(path.names(), vec!["Team", "plan.txt"]);

    // Grants never confer ownership.
    let rename = app
        .patch(&format!("/api/files/{inner}"), json!({ "name": "x.txt" }), &bob)
        .await;
    assert_eq!(rename.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_remove_person() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let bob = app.signed_in("Bob").await;
    let file = app.file(&alice, "a.txt", b"a", None).await;
    let added = app
        .post(
            &format!("/api/files/{file}/share/people"),
            json!({ "emails": [bob.email] }),
            &alice,
        )
        .await;
    let share_id = added.data()[0]["share_id"].as_str().unwrap().to_string();

    let updated = app
        .patch(
            &format!("/api/files/{file}/share/people/{share_id}"),
            json!({ "permission": "commenter" }),
            &alice,
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.data()["permission"], "commenter");

    let download = app
        .get(&format!("/api/files/{file}/download-url"), Some(&bob))
        .await;
    assert_eq!(download.status, StatusCode::OK);

    let removed = app
        .delete(&format!("/api/files/{file}/share/people/{share_id}"), &alice)
        .await;
    assert_eq!(removed.status, StatusCode::OK);

    let download = app
        .get(&format!("/api/files/{file}/download-url"), Some(&bob))
        .await;
    assert_eq!(download.status, StatusCode::NOT_FOUND);
    assert!(app.get("/api/files/shared", Some(&bob)).await.names().is_empty());

    let gone = app
        .delete(&format!("/api/files/{file}/share/people/{share_id}"), &alice)
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_only_the_owner_manages_shares() {
    let app = TestApp::new();
    let alice = app.signed_in("Alice").await;
    let bob = app.signed_in("Bob").await;
    let file = app.file(&alice, "a.txt", b"a", None).await;

    let response = app
        .patch(
            &format!("/api/files/{file}/share"),
            json!({ "access_level": "anyone" }),
            &bob,
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
