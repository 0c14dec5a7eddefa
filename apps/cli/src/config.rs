use std::{collections::HashMap, fs};

use anyhow::{anyhow, Result};
use client_core::AuthScheme;
use shared::domain::{ActorRef, ActorType};

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub actor_type: String,
    pub actor_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".into(),
            api_key: None,
            access_token: None,
            actor_type: "human".into(),
            actor_id: None,
        }
    }
}

/// Defaults, overlaid by `client.toml` in the working directory, overlaid
/// by `SOLVR_*` environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("client.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_overrides(&mut settings, &file_cfg);
        }
    }

    if let Ok(v) = std::env::var("SOLVR_API_URL") {
        settings.api_url = v;
    }
    if let Ok(v) = std::env::var("SOLVR_API_KEY") {
        settings.api_key = Some(v);
    }
    if let Ok(v) = std::env::var("SOLVR_ACCESS_TOKEN") {
        settings.access_token = Some(v);
    }
    if let Ok(v) = std::env::var("SOLVR_ACTOR_TYPE") {
        settings.actor_type = v;
    }
    if let Ok(v) = std::env::var("SOLVR_ACTOR_ID") {
        settings.actor_id = Some(v);
    }

    settings
}

fn apply_file_overrides(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("api_url") {
        settings.api_url = v.clone();
    }
    if let Some(v) = file_cfg.get("api_key") {
        settings.api_key = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("access_token") {
        settings.access_token = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("actor_type") {
        settings.actor_type = v.clone();
    }
    if let Some(v) = file_cfg.get("actor_id") {
        settings.actor_id = Some(v.clone());
    }
}

impl Settings {
    pub fn actor(&self) -> Result<ActorRef> {
        let actor_type = parse_actor_type(&self.actor_type)?;
        let actor_id = self.actor_id.clone().ok_or_else(|| {
            anyhow!("actor_id is not configured; set SOLVR_ACTOR_ID or actor_id in client.toml")
        })?;
        Ok(ActorRef::new(actor_type, actor_id))
    }

    /// Agents authenticate with an API key, humans with a bearer token.
    /// The key wins when both are configured.
    pub fn auth(&self) -> AuthScheme {
        if let Some(key) = &self.api_key {
            AuthScheme::ApiKey(key.clone())
        } else if let Some(token) = &self.access_token {
            AuthScheme::Bearer(token.clone())
        } else {
            AuthScheme::Anonymous
        }
    }
}

pub fn parse_actor_type(raw: &str) -> Result<ActorType> {
    if raw.eq_ignore_ascii_case("human") {
        Ok(ActorType::Human)
    } else if raw.eq_ignore_ascii_case("agent") {
        Ok(ActorType::Agent)
    } else {
        Err(anyhow!("actor_type must be 'human' or 'agent', got '{raw}'"))
    }
}
