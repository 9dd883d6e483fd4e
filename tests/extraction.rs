//! Image extraction against a mock Gemini endpoint.

use saudi_invoicer::db::Database;
use saudi_invoicer::services::gemini::GeminiExtractor;
use saudi_invoicer::services::processor::{process_image_bytes, ExtractionFailure};
use saudi_invoicer::services::store::InvoiceStore;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "test-model";
const GENERATE_PATH: &str = "/v1beta/models/test-model:generateContent";

fn gemini_reply(payload: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{
            "content": { "parts": [{ "text": payload.to_string() }] }
        }]
    }))
}

fn extractor(server: &MockServer) -> GeminiExtractor {
    GeminiExtractor::new("test-key", MODEL).with_base_url(server.uri())
}

#[tokio::test]
async fn extracted_fields_merge_into_stored_invoice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(gemini_reply(json!({
            "invoiceNumber": "INV-5531",
            "date": "2024-03-02",
            "sellerName": "متجر الرياض",
            "sellerVat": "310000000000003",
            "buyerName": "",
            "items": [
                { "description": "قهوة", "quantity": 2, "unitPrice": 15.5 },
                { "description": "كوب", "unitPrice": 20 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let db = Database::in_memory().unwrap();
    let before = InvoiceStore::new(&db).load().unwrap();

    let invoice = process_image_bytes(&db, b"fake-png", "image/png", &extractor(&server))
        .await
        .unwrap();

    assert_eq!(invoice.invoice_number, "INV-5531");
    assert_eq!(invoice.date, "2024-03-02");
    assert_eq!(invoice.seller.name, "متجر الرياض");
    assert_eq!(invoice.seller.vat_number, "310000000000003");
    assert_eq!(invoice.seller.cr_number, before.seller.cr_number);
    assert_eq!(invoice.seller.logo_url, before.seller.logo_url);
    assert_eq!(invoice.buyer.name, before.buyer.name);
    assert_eq!(invoice.items.len(), 2);
    assert_eq!(invoice.items[1].quantity, 1.0);
    assert_eq!(invoice.items[0].tax_rate, 0.15);
    assert_eq!(format!("{:.2}", invoice.totals().total), "58.65");

    let stored = InvoiceStore::new(&db).load().unwrap();
    assert_eq!(stored, invoice);

    let logs = db.get_recent_logs(5).unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "success");
}

#[tokio::test]
async fn service_error_leaves_invoice_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let db = Database::in_memory().unwrap();
    let store = InvoiceStore::new(&db);
    let mut original = store.load().unwrap();
    original.invoice_number = "KEEP-ME".into();
    store.save(&original).unwrap();

    let err = process_image_bytes(&db, b"img", "image/jpeg", &extractor(&server))
        .await
        .unwrap_err();
    assert!(err.downcast_ref::<ExtractionFailure>().is_some());
    assert!(err.to_string().contains("try again"));

    assert_eq!(store.load().unwrap(), original);
    let logs = db.get_recent_logs(5).unwrap();
    assert_eq!(logs[0].status, "failed");
    assert!(logs[0].message.as_deref().unwrap_or("").contains("503"));
}

#[tokio::test]
async fn answers_that_break_the_schema_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(gemini_reply(json!({ "items": [{ "quantity": "a few" }] })))
        .mount(&server)
        .await;

    let db = Database::in_memory().unwrap();
    let err = process_image_bytes(&db, b"img", "image/png", &extractor(&server))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("schema"));
}

#[tokio::test]
async fn empty_candidate_list_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let db = Database::in_memory().unwrap();
    let result = process_image_bytes(&db, b"img", "image/png", &extractor(&server)).await;
    assert!(result.is_err());
    assert_eq!(InvoiceStore::new(&db).load().unwrap().items.len(), 2);
}

#[tokio::test]
async fn failure_is_reported_even_when_it_cannot_be_logged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("invoicer.sqlite");
    let db = Database::new(&db_path).unwrap();
    rusqlite::Connection::open(&db_path)
        .unwrap()
        .execute_batch("DROP TABLE processing_logs;")
        .unwrap();

    let err = process_image_bytes(&db, b"img", "image/png", &extractor(&server))
        .await
        .unwrap_err();
    assert!(err.downcast_ref::<ExtractionFailure>().is_some());
    assert!(err.to_string().contains("try again"));
}
