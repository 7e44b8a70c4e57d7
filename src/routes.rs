use axum::{
    routing::{get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tracing::info;

use crate::handlers::api::{
    delete_submission, export_range, export_submission, get_active_configuration,
    list_submissions, range_submissions, submit_form, undo_delete, update_configuration,
    update_submission, verify_pin, AppState,
};
use crate::handlers::test::{health_check, sample_submission};

pub fn create_router(app_state: Arc<AppState>, is_production: bool) -> Router {
    let mut router = Router::new();

    // Health check is always available
    let health_route = Router::new().route("/health", get(health_check));
    router = router.merge(health_route);

    // Core form, history and export routes
    let core_routes = Router::new()
        .route("/config", get(get_active_configuration))
        .route("/config/:id", put(update_configuration))
        .route("/submissions", post(submit_form).get(list_submissions))
        .route("/submissions/undo", post(undo_delete))
        .route("/submissions/range", get(range_submissions))
        .route(
            "/submissions/:id",
            patch(update_submission).delete(delete_submission),
        )
        .route("/submissions/:id/export", get(export_submission))
        .route("/export", get(export_range))
        .route("/access/verify", post(verify_pin));
    router = router.merge(core_routes);

    // Only expose sample payload helpers outside production
    if !is_production {
        let dev_routes = Router::new().route("/test/sample-submission", get(sample_submission));
        router = router.merge(dev_routes);

        info!("Sample endpoints enabled - server running in development mode");
    } else {
        info!("Running in production mode - sample endpoints disabled");
    }

    router.with_state(app_state)
}
