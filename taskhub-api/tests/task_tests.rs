/// Task endpoint tests

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn test_tasks_require_token() {
    let app = TestApp::new();

    let response = app.request(Method::GET, "/tasks", None, None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::POST, "/tasks", None, Some(json!({ "title": "x", "status": "pending" })))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_store_task_starts_pending() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;

    let response = app
        .post(
            "/tasks",
            Some(&token),
            json!({ "title": "Write report", "description": "Q3 numbers", "status": "completed" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let task = &response.body["task"];
    assert_eq!(task["title"], "Write report");
    assert_eq!(task["description"], "Q3 numbers");
    assert_eq!(task["status"], "pending");
    assert!(Uuid::parse_str(task["id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn test_store_task_validation() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;

    let missing = app.post("/tasks", Some(&token), json!({})).await;
    assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(missing.body["details"].as_array().unwrap().len(), 2);

    let bad_status = app
        .post("/tasks", Some(&token), json!({ "title": "ok", "status": "done" }))
        .await;
    assert_eq!(bad_status.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        bad_status.body["message"],
        "The selected status is invalid. Valid options are: pending, in progress, completed"
    );

    let long_title = app
        .post(
            "/tasks",
            Some(&token),
            json!({ "title": "x".repeat(256), "status": "pending" }),
        )
        .await;
    assert_eq!(long_title.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        long_title.body["message"],
        "The title may not be greater than 255 characters."
    );
}

#[tokio::test]
async fn test_list_tasks_empty_is_bad_request() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;

    let response = app.get("/tasks", &token).await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Tasks not found.");
}

#[tokio::test]
async fn test_list_tasks_oldest_first() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;
    app.create_task(&token, "first").await;
    app.create_task(&token, "second").await;
    app.create_task(&token, "third").await;

    let response = app.get("/tasks", &token).await;

    assert_eq!(response.status, StatusCode::OK);
    let titles: Vec<&str> = response.body["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_list_tasks_status_filter() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;
    let started = app.create_task(&token, "started").await;
    app.create_task(&token, "waiting").await;
    app.put(
        &format!("/tasks/{}", started["id"].as_str().unwrap()),
        &token,
        json!({ "status": "in progress" }),
    )
    .await;

    let response = app.get("/tasks?status=in%20progress", &token).await;
    assert_eq!(response.status, StatusCode::OK);
    let tasks = response.body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["title"], "started");

    // Empty means no filter
    let all = app.get("/tasks?status=", &token).await;
    assert_eq!(all.body["tasks"].as_array().unwrap().len(), 2);

    let none = app.get("/tasks?status=completed", &token).await;
    assert_eq!(none.status, StatusCode::BAD_REQUEST);

    let unknown = app.get("/tasks?status=archived", &token).await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_show_task() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;
    let task = app.create_task(&token, "visible").await;
    let id = task["id"].as_str().unwrap();

    let response = app.get(&format!("/tasks/{}", id), &token).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["task"]["id"], id);

    let missing = app.get(&format!("/tasks/{}", Uuid::new_v4()), &token).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["message"], "Task not found.");

    let malformed = app.get("/tasks/42", &token).await;
    assert_eq!(malformed.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_other_users_task_is_not_found() {
    let app = TestApp::new();
    let owner = app.signed_in_user().await;
    let intruder = app.signed_in_user().await;
    let task = app.create_task(&owner, "private").await;
    let uri = format!("/tasks/{}", task["id"].as_str().unwrap());

    assert_eq!(app.get(&uri, &intruder).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.put(&uri, &intruder, json!({ "title": "mine now" })).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.delete(&uri, &intruder).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/tasks", &intruder).await.status, StatusCode::BAD_REQUEST);

    let still_there = app.get(&uri, &owner).await;
    assert_eq!(still_there.body["task"]["title"], "private");
}

#[tokio::test]
async fn test_update_task_partial() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;
    let task = app.create_task(&token, "draft").await;
    let uri = format!("/tasks/{}", task["id"].as_str().unwrap());

    let response = app
        .put(&uri, &token, json!({ "title": "final", "status": "completed" }))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Task updated successfully.");

    let updated = app.get(&uri, &token).await.body["task"].clone();
    assert_eq!(updated["title"], "final");
    assert_eq!(updated["status"], "completed");
    assert_eq!(updated["description"], "details");

    app.put(&uri, &token, json!({ "description": null })).await;
    let cleared = app.get(&uri, &token).await.body["task"].clone();
    assert!(cleared["description"].is_null());
    assert_eq!(cleared["title"], "final");
}

#[tokio::test]
async fn test_update_task_validation_and_missing() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;
    let task = app.create_task(&token, "draft").await;
    let uri = format!("/tasks/{}", task["id"].as_str().unwrap());

    let bad = app.put(&uri, &token, json!({ "status": "archived" })).await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);

    let missing = app
        .put(&format!("/tasks/{}", Uuid::new_v4()), &token, json!({ "title": "x" }))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["message"], "Task not found.");
}

#[tokio::test]
async fn test_delete_task_twice() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;
    let task = app.create_task(&token, "temporary").await;
    let uri = format!("/tasks/{}", task["id"].as_str().unwrap());

    let first = app.delete(&uri, &token).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["message"], "Task deleted successfully.");

    let second = app.delete(&uri, &token).await;
    assert_eq!(second.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, &token).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_field_type_is_validation_error() {
    let app = TestApp::new();
    let token = app.signed_in_user().await;

    let response = app
        .post("/tasks", Some(&token), json!({ "title": 123, "status": "pending" }))
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["error"], "validation_error");
    assert_eq!(response.body["message"], "The title must be a string.");
    assert_eq!(response.body["details"][0]["field"], "title");

    let task = app.create_task(&token, "typed").await;
    let response = app
        .put(
            &format!("/tasks/{}", task["id"].as_str().unwrap()),
            &token,
            json!({ "description": 5 }),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.body["message"], "The description must be a string.");
}
