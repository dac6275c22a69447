use serde::{Deserialize, Serialize};
use tenantry::EngineRecord;
use utoipa::{IntoParams, ToSchema};

/// Optional body of engine create/update requests.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct EngineRequest {
    /// Engine group, `"commons"` when omitted.
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GroupQuery {
    pub group: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EngineResponse {
    pub index: String,
    pub collections: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListEnginesResponse {
    pub engines: Vec<EngineRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExistsResponse {
    pub exists: bool,
}
