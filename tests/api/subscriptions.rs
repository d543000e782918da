use std::collections::HashMap;
use vigilconso::subscriber_store::SubscriberStore;

use crate::helpers::TestApp;

#[tokio::test]
async fn subscribe_returns_200_when_body_is_valid() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_mail_api(202).await;

    let response = test_app
        .post_subscription(HashMap::from([("email", "frank@test.com")]))
        .await;

    assert_eq!(200, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["message"], "Inscription réussie !");
}

#[tokio::test]
async fn subscribe_persists_the_new_subscriber() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_mail_api(202).await;

    test_app
        .post_subscription(HashMap::from([("email", "test@test.com")]))
        .await;

    let subscribers = test_app.subscriber_store().load().await;

    assert_eq!(subscribers.len(), 1);
    assert_eq!(subscribers[0].as_ref(), "test@test.com");
}

#[tokio::test]
async fn subscribing_twice_keeps_a_single_entry() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_mail_api(202).await;

    for _ in 0..2 {
        let response = test_app
            .post_subscription(HashMap::from([("email", "twice@test.com")]))
            .await;

        assert_eq!(200, response.status().as_u16());
    }

    assert_eq!(test_app.subscriber_store().count().await, 1);
    // Both requests still get their welcome email
    assert_eq!(test_app.sent_emails().await.len(), 2);
}

#[tokio::test]
async fn subscribe_returns_400_when_email_is_missing_or_invalid() {
    let test_app = TestApp::spawn_app().await;

    // This is a common practice and it is called table-driven tests. In this case, it simulates different kind of possible request bodies
    // where API should return 400.
    let test_cases: Vec<(HashMap<&str, &str>, &str)> = vec![
        (HashMap::from([]), "missing email parameter"),
        (HashMap::from([("email", "")]), "empty email"),
        (HashMap::from([("email", "test.com")]), "email without @"),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_subscription(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Email invalide.");
    }

    assert_eq!(test_app.subscriber_store().count().await, 0);
}

#[tokio::test]
async fn subscribe_sends_a_welcome_email() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_mail_api(202).await;

    test_app
        .post_subscription(HashMap::from([("email", "welcome@test.com")]))
        .await;

    let sent = test_app.sent_emails().await;

    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0]["personalizations"][0]["to"][0]["email"],
        "welcome@test.com"
    );
    assert_eq!(sent[0]["subject"], "Bienvenue sur VigilConso ! 🛡️");

    let html = sent[0]["content"][0]["value"].as_str().unwrap();
    assert!(html.contains("Inscription confirmée !"));
}

#[tokio::test]
async fn subscribe_notifies_the_administrator_when_configured() {
    let test_app = TestApp::spawn_app_with_admin(Some("admin@test.com")).await;
    test_app.mock_mail_api(202).await;

    test_app
        .post_subscription(HashMap::from([("email", "new@test.com")]))
        .await;

    let sent = test_app.sent_emails().await;

    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[1]["personalizations"][0]["to"][0]["email"],
        "admin@test.com"
    );

    let text = sent[1]["content"][0]["value"].as_str().unwrap();
    assert!(text.contains("Nouvel abonné : new@test.com"));
    assert!(text.contains("Total abonnés : 1"));
}

#[tokio::test]
async fn subscribe_returns_500_when_the_welcome_email_fails() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_mail_api(500).await;

    let response = test_app
        .post_subscription(HashMap::from([("email", "unlucky@test.com")]))
        .await;

    assert_eq!(500, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Erreur inscription. Réessayez.");
    // The address was stored before the mail went out
    assert_eq!(test_app.subscriber_store().count().await, 1);
}

#[tokio::test]
async fn subscribe_returns_500_and_keeps_an_unreadable_subscriber_file() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_mail_api(202).await;
    let truncated = "[\n  \"a@test.com\",\n  \"b@test.com\"\n";
    tokio::fs::write(&test_app.subscribers_path, truncated)
        .await
        .unwrap();

    let response = test_app
        .post_subscription(HashMap::from([("email", "c@test.com")]))
        .await;

    assert_eq!(500, response.status().as_u16());
    assert_eq!(
        tokio::fs::read_to_string(&test_app.subscribers_path)
            .await
            .unwrap(),
        truncated
    );
    assert!(test_app.sent_emails().await.is_empty());
}
