use serde_json::json;
use vigilconso::digest::DigestReport;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

const RECORDS_PATH: &str = "/api/explore/v2.1/catalog/datasets/rappelconso0/records";

async fn mock_recall_records(test_app: &TestApp, results: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(RECORDS_PATH))
        .and(query_param("order_by", "date_publication DESC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": results })))
        .mount(&test_app.recall_server)
        .await;
}

#[tokio::test]
async fn weekly_digest_reaches_every_subscriber() {
    let test_app = TestApp::spawn_app().await;
    test_app
        .seed_subscribers(&["one@test.com", "two@test.com", "three@test.com"])
        .await;
    test_app.mock_mail_api(202).await;
    mock_recall_records(
        &test_app,
        json!([
            {
                "noms_des_modeles_ou_references": "Fromage X",
                "nom_de_la_marque_du_produit": "Marque Y",
                "categorie_de_produit": "Alimentation",
                "date_publication": "2025-03-03",
                "lien_vers_la_liste_des_produits": "https://rappel.conso.gouv.fr/fiche/1"
            },
            { "libelle": "Jouet Z" }
        ]),
    )
    .await;

    let report = test_app.dispatcher.run_digest().await.unwrap();

    assert_eq!(report.sent(), 3);
    assert_eq!(report.total(), 3);

    let sent = test_app.sent_emails().await;
    assert_eq!(sent.len(), 3);

    let html = sent[0]["content"][0]["value"].as_str().unwrap();
    assert!(html.contains("Fromage X"));
    assert!(html.contains("Jouet Z"));
    assert!(html.contains("https://rappel.conso.gouv.fr/fiche/1"));
    assert!(sent
        .iter()
        .all(|email| email["content"][0]["value"] == sent[0]["content"][0]["value"]));
}

#[tokio::test]
async fn weekly_digest_survives_individual_delivery_failures() {
    let test_app = TestApp::spawn_app().await;
    test_app
        .seed_subscribers(&["ok@test.com", "broken@test.com"])
        .await;
    mock_recall_records(&test_app, json!([{ "libelle_produit": "Yaourt" }])).await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .and(wiremock::matchers::body_string_contains("broken@test.com"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&test_app.email_server)
        .await;
    test_app.mock_mail_api(202).await;

    let report = test_app.dispatcher.run_digest().await.unwrap();

    assert_eq!(report.sent(), 1);
    assert_eq!(report.total(), 2);
}

#[tokio::test]
async fn weekly_digest_sends_nothing_when_the_recall_source_is_down() {
    let test_app = TestApp::spawn_app().await;
    test_app.seed_subscribers(&["one@test.com"]).await;

    Mock::given(method("GET"))
        .and(path(RECORDS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&test_app.recall_server)
        .await;

    let report = test_app.dispatcher.run_digest().await.unwrap();

    assert!(matches!(report, DigestReport::NoRecords));
    assert!(test_app.sent_emails().await.is_empty());
}

#[tokio::test]
async fn weekly_digest_skips_the_recall_source_without_subscribers() {
    let test_app = TestApp::spawn_app().await;

    let report = test_app.dispatcher.run_digest().await.unwrap();

    assert!(matches!(report, DigestReport::NoSubscribers));
    assert!(test_app
        .recall_server
        .received_requests()
        .await
        .unwrap()
        .is_empty());
}
