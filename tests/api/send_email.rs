use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

#[tokio::test]
async fn send_email_relays_the_message_and_returns_its_id() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(202).insert_header("X-Message-Id", "msg-42"))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let response = test_app
        .post_send_email(json!({
            "to": "someone@test.com",
            "subject": "Bonjour",
            "text": "Un message"
        }))
        .await;

    assert_eq!(200, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email envoyé");
    assert_eq!(body["id"], "msg-42");

    let sent = test_app.sent_emails().await;
    assert_eq!(sent[0]["subject"], "Bonjour");
    assert_eq!(sent[0]["content"][0]["type"], "text/plain");
}

#[tokio::test]
async fn send_email_returns_400_when_required_fields_are_missing() {
    let test_app = TestApp::spawn_app().await;

    let test_cases = vec![
        (json!({ "subject": "Hi", "text": "body" }), "missing recipient"),
        (json!({ "to": "a@test.com", "text": "body" }), "missing subject"),
        (json!({ "to": "a@test.com", "subject": "Hi" }), "missing content"),
        (
            json!({ "to": "not-an-email", "subject": "Hi", "html": "<p>x</p>" }),
            "invalid recipient",
        ),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_send_email(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }

    assert!(test_app.sent_emails().await.is_empty());
}

#[tokio::test]
async fn send_email_returns_500_when_the_transport_fails() {
    let test_app = TestApp::spawn_app().await;
    test_app.mock_mail_api(500).await;

    let response = test_app
        .post_send_email(json!({
            "to": "someone@test.com",
            "subject": "Bonjour",
            "html": "<p>Un message</p>"
        }))
        .await;

    assert_eq!(500, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Erreur envoi email");
}
