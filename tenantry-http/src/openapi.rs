use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tenantry API",
        version = "0.1.0",
        description = "Per-tenant engine provisioning: create, migrate, tear down and list the engines active on tenant indexes.",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:7800", description = "Local development")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::engine::create_engine,
        crate::handlers::engine::update_engine,
        crate::handlers::engine::delete_engine,
        crate::handlers::engine::list_engines,
        crate::handlers::engine::engine_exists,
    ),
    components(
        schemas(
            crate::dto::EngineRequest,
            crate::dto::EngineResponse,
            crate::dto::ListEnginesResponse,
            crate::dto::ExistsResponse,
            tenantry::EngineRecord,
        )
    ),
    tags(
        (name = "health", description = "Liveness"),
        (name = "engines", description = "Engine lifecycle per tenant index")
    )
)]
pub struct ApiDoc;
