#![allow(dead_code)]

use tenantry::EngineManifest;
use tokio::net::TcpListener;

pub const PLUGIN: &str = "assets";

pub fn manifest() -> EngineManifest {
    EngineManifest::from_json(
        r#"{
            "collections": {
                "assets": { "properties": { "model": { "type": "keyword" } } },
                "measures": { "properties": { "value": { "type": "float" } } }
            }
        }"#,
    )
    .unwrap()
}

/// Serve the full router on an ephemeral port, returning `http://addr`.
pub async fn spawn_server() -> String {
    let state = tenantry_http::build_state(PLUGIN, manifest()).await.unwrap();
    let app = tenantry_http::router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    format!("http://{}", addr)
}
