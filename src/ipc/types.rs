use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Config;
use crate::gateway::Gateway;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub gateway: Option<Gateway>,
    pub config: Config,
}
