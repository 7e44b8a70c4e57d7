#[cfg(test)]
mod api_tests {
    use std::sync::{Arc, Mutex};

    use axum_test::{TestServer, TestServerConfig};
    use serde_json::{json, Value};
    use tempfile::{tempdir, TempDir};

    use crate::auth::{AccessGate, InMemoryFlagStore, WRONG_PIN_MESSAGE};
    use crate::handlers::api::{AppState, NOTHING_TO_UNDO_MESSAGE};
    use crate::models::common::SubmissionPage;
    use crate::models::form::{FormConfiguration, FormSubmission};
    use crate::routes::create_router;
    use crate::services::database::FormDatabase;
    use crate::services::form_session::REQUIRED_FIELD_MESSAGE;
    use crate::services::history::{EMPTY_RANGE_MESSAGE, INVERTED_RANGE_MESSAGE};

    // Helper function to set up a test server over a temporary database.
    // The TempDir is returned so the backing files outlive the server.
    fn setup_test_server() -> (TestServer, Arc<FormDatabase>, TempDir) {
        let dir = tempdir().unwrap();
        let database = Arc::new(FormDatabase::new(
            dir.path().join("test_submissions.csv").to_str().unwrap(),
            dir.path().join("test_configurations.json").to_str().unwrap(),
        ));

        let app_state = Arc::new(AppState {
            database: Arc::clone(&database),
            access: AccessGate::new("7294", Box::new(InMemoryFlagStore::new())),
            last_deleted: Mutex::new(None),
        });

        let router = create_router(app_state, false);

        let config = TestServerConfig::builder().mock_transport().build();
        let server = TestServer::new_with_config(router, config).unwrap();

        (server, database, dir)
    }

    fn valid_payload() -> Value {
        json!({
            "instagram": "@maria",
            "recipient_name": "María",
            "desired_date": "2025-04-01",
            "desired_time": "15:30",
            "address": "Calle Falsa 123"
        })
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (server, _, _dir) = setup_test_server();

        let response = server.get("/health").await;
        assert_eq!(response.status_code().as_u16(), 200);
        assert_eq!(response.text(), "Service is healthy");
    }

    #[tokio::test]
    async fn test_get_active_configuration() {
        let (server, _, _dir) = setup_test_server();

        let response = server.get("/config").await;
        assert_eq!(response.status_code().as_u16(), 200);

        let config: Option<FormConfiguration> = response.json();
        let config = config.unwrap();
        assert!(config.is_active);
        assert_eq!(config.fields.len(), 6);
        assert_eq!(config.fields[0].name, "instagram");
    }

    #[tokio::test]
    async fn test_update_configuration() {
        let (server, database, _dir) = setup_test_server();

        let config = database.get_active_configuration().unwrap().unwrap();
        let fields = json!([
            {
                "name": "instagram",
                "label": "Usuario de Instagram",
                "type": "text",
                "required": true,
                "enabled": true
            }
        ]);

        let response = server
            .put(&format!("/config/{}", config.id))
            .json(&fields)
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        let updated: FormConfiguration = response.json();
        assert_eq!(updated.fields.len(), 1);
        assert_eq!(updated.fields[0].label, "Usuario de Instagram");

        let response = server.put("/config/missing").json(&fields).await;
        assert_eq!(response.status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_submit_form_rejects_blank_required_fields() {
        let (server, database, _dir) = setup_test_server();

        let response = server
            .post("/submissions")
            .json(&json!({ "instagram": "   " }))
            .await;
        assert_eq!(response.status_code().as_u16(), 422);

        let body: Value = response.json();
        assert_eq!(
            body["errors"]["instagram"],
            json!(REQUIRED_FIELD_MESSAGE)
        );
        assert_eq!(body["errors"]["address"], json!(REQUIRED_FIELD_MESSAGE));

        // Nothing was inserted
        let (_, total) = database.list_submissions(0, "").unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_submit_form_creates_record() {
        let (server, _, _dir) = setup_test_server();

        let response = server.post("/submissions").json(&valid_payload()).await;
        assert_eq!(response.status_code().as_u16(), 201);

        let created: FormSubmission = response.json();
        assert_eq!(created.instagram, "@maria");
        assert_eq!(created.id.len(), 32);

        let response = server.get("/submissions").await;
        let page: SubmissionPage = response.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.submissions[0].id, created.id);
    }

    #[tokio::test]
    async fn test_list_submissions_with_search_and_paging() {
        let (server, _, _dir) = setup_test_server();

        for i in 0..12 {
            let mut payload = valid_payload();
            payload["instagram"] = json!(format!("@cliente{}", i));
            let response = server.post("/submissions").json(&payload).await;
            assert_eq!(response.status_code().as_u16(), 201);
        }

        let response = server.get("/submissions?page=1").await;
        let page: SubmissionPage = response.json();
        assert_eq!(page.total_count, 12);
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.submissions.len(), 2);

        let response = server.get("/submissions?search=cliente3").await;
        let page: SubmissionPage = response.json();
        assert_eq!(page.total_count, 1);
        assert_eq!(page.submissions[0].instagram, "@cliente3");
    }

    #[tokio::test]
    async fn test_update_submission_rejects_unknown_fields() {
        let (server, database, _dir) = setup_test_server();

        let response = server.post("/submissions").json(&valid_payload()).await;
        let created: FormSubmission = response.json();

        let response = server
            .patch(&format!("/submissions/{}", created.id))
            .json(&json!({ "instagram": "@editada", "coupon_code": "CUPON10" }))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        let updated: FormSubmission = response.json();
        assert_eq!(updated.instagram, "@editada");
        assert_eq!(updated.created_at, created.created_at);

        // created_at is not editable and fails deserialization
        let response = server
            .patch(&format!("/submissions/{}", created.id))
            .json(&json!({ "created_at": "2020-01-01T00:00:00Z" }))
            .await;
        assert_eq!(response.status_code().as_u16(), 422);

        let stored = database.find_submission(&created.id).unwrap().unwrap();
        assert_eq!(stored.created_at, created.created_at);

        let response = server
            .patch("/submissions/missing")
            .json(&json!({ "instagram": "@nadie" }))
            .await;
        assert_eq!(response.status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_delete_and_undo_round_trip() {
        let (server, database, _dir) = setup_test_server();

        let response = server.post("/submissions").json(&valid_payload()).await;
        let created: FormSubmission = response.json();

        let response = server
            .delete(&format!("/submissions/{}", created.id))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);
        let snapshot: FormSubmission = response.json();
        assert_eq!(snapshot.id, created.id);
        assert!(database.find_submission(&created.id).unwrap().is_none());

        let response = server.post("/submissions/undo").await;
        assert_eq!(response.status_code().as_u16(), 200);
        let restored: FormSubmission = response.json();
        assert_eq!(restored.id, created.id);
        assert_eq!(restored.created_at, created.created_at);

        // The undo slot only holds one deletion
        let response = server.post("/submissions/undo").await;
        assert_eq!(response.status_code().as_u16(), 404);
        assert_eq!(response.text(), NOTHING_TO_UNDO_MESSAGE);
    }

    #[tokio::test]
    async fn test_delete_unknown_submission() {
        let (server, _, _dir) = setup_test_server();

        let response = server.delete("/submissions/missing").await;
        assert_eq!(response.status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_range_endpoint_validates_bounds() {
        let (server, _, _dir) = setup_test_server();

        let response = server
            .get("/submissions/range?start=2025-03-10&end=2025-03-01")
            .await;
        assert_eq!(response.status_code().as_u16(), 400);
        assert_eq!(response.text(), INVERTED_RANGE_MESSAGE);

        let response = server.get("/submissions/range?start=2025-03-01").await;
        assert_eq!(response.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_export_single_submission() {
        let (server, _, _dir) = setup_test_server();

        let response = server.post("/submissions").json(&valid_payload()).await;
        let created: FormSubmission = response.json();

        let response = server
            .get(&format!("/submissions/{}/export", created.id))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        let disposition = response.header("content-disposition");
        let disposition = disposition.to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"registro-@maria-"));

        let body = response.text();
        assert!(body.starts_with("Instagram,Destinatario"));
        assert!(body.contains("@maria"));

        let response = server.get("/submissions/missing/export").await;
        assert_eq!(response.status_code().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_export_range_endpoint() {
        let (server, _, _dir) = setup_test_server();

        // Empty range is reported before any file is generated
        let response = server.get("/export?start=2001-01-01&end=2001-01-31").await;
        assert_eq!(response.status_code().as_u16(), 404);
        assert_eq!(response.text(), EMPTY_RANGE_MESSAGE);

        let response = server.post("/submissions").json(&valid_payload()).await;
        assert_eq!(response.status_code().as_u16(), 201);

        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let response = server
            .get(&format!("/export?start={}&end={}", today, today))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        let disposition = response.header("content-disposition");
        assert!(disposition
            .to_str()
            .unwrap()
            .starts_with("attachment; filename=\"registros-"));

        let response = server.get("/export?start=2025-03-10&end=2025-03-01").await;
        assert_eq!(response.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn test_verify_pin() {
        let (server, _, _dir) = setup_test_server();

        let response = server
            .post("/access/verify")
            .json(&json!({ "pin": "0000" }))
            .await;
        assert_eq!(response.status_code().as_u16(), 401);
        assert_eq!(response.text(), WRONG_PIN_MESSAGE);

        let response = server
            .post("/access/verify")
            .json(&json!({ "pin": "7294" }))
            .await;
        assert_eq!(response.status_code().as_u16(), 200);

        let body: Value = response.json();
        assert_eq!(body["success"], json!(true));
    }

    #[tokio::test]
    async fn test_sample_endpoint_hidden_in_production() {
        let dir = tempdir().unwrap();
        let database = Arc::new(FormDatabase::new(
            dir.path().join("test_submissions.csv").to_str().unwrap(),
            dir.path().join("test_configurations.json").to_str().unwrap(),
        ));
        let app_state = Arc::new(AppState {
            database,
            access: AccessGate::new("7294", Box::new(InMemoryFlagStore::new())),
            last_deleted: Mutex::new(None),
        });

        let router = create_router(app_state, true);
        let config = TestServerConfig::builder().mock_transport().build();
        let server = TestServer::new_with_config(router, config).unwrap();

        let response = server.get("/test/sample-submission").await;
        assert_eq!(response.status_code().as_u16(), 404);

        let response = server.get("/health").await;
        assert_eq!(response.status_code().as_u16(), 200);
    }
}
