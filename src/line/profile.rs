//! Display-name lookup for answer templates

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::line::event::Source;

const API_BASE: &str = "https://api.line.me/v2/bot";

#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Display name of `user_id` in the event's chat; empty when unknown
    async fn display_name(&self, source: &Source, user_id: &str) -> String;
}

pub struct LineProfileClient {
    http: reqwest::Client,
    access_token: String,
    api_base: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Profile {
    #[serde(default)]
    display_name: String,
}

impl LineProfileClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            http,
            access_token: access_token.into(),
            api_base: API_BASE.to_string(),
        }
    }

    /// Member profile inside a group or room, else the plain user profile
    fn profile_url(&self, source: &Source, user_id: &str) -> String {
        if let Some(group_id) = source.group_id() {
            format!("{}/group/{}/member/{}", self.api_base, group_id, user_id)
        } else if let Some(room_id) = source.room_id() {
            format!("{}/room/{}/member/{}", self.api_base, room_id, user_id)
        } else {
            format!("{}/profile/{}", self.api_base, user_id)
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, reqwest::Error> {
        let profile: Profile = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(profile.display_name)
    }
}

#[async_trait]
impl ProfileLookup for LineProfileClient {
    async fn display_name(&self, source: &Source, user_id: &str) -> String {
        if self.access_token.is_empty() || user_id.is_empty() {
            return String::new();
        }
        let url = self.profile_url(source, user_id);
        match self.fetch(&url).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Profile lookup failed for {}: {}", user_id, e);
                String::new()
            }
        }
    }
}
