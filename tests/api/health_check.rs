use crate::helpers::TestApp;

#[tokio::test]
async fn health_check_works() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app.get_health().await;

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["subscribers"], 0);
    assert!(body["next_digest"].is_string());
}

#[tokio::test]
async fn health_check_counts_stored_subscribers() {
    let test_app = TestApp::spawn_app().await;
    test_app
        .seed_subscribers(&["a@test.com", "b@test.com"])
        .await;

    let body: serde_json::Value = test_app.get_health().await.json().await.unwrap();

    assert_eq!(body["subscribers"], 2);
}
