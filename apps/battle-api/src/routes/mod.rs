pub mod battles;
pub mod health;

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(battles::router())
        .merge(crate::gateway::server::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Battles
        battles::create_battle,
        battles::battle_exists,
        battles::battle_state,
        battles::record_result,
        battles::terminate_battle,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            // Models
            crate::models::battle::BattleState,
            crate::models::battle::Move,
            // Route request/response types
            health::HealthResponse,
            battles::CreateBattleResponse,
            battles::ExistsResponse,
            battles::RecordResultRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Battles", description = "Battle creation and lookup"),
    )
)]
pub struct ApiDoc;
