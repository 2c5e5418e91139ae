// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Expo push notification client.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

const EXPO_PUSH_URL: &str = "https://exp.host/--/api/v2/push/send";
const EXPO_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
pub struct PushMessage<'a> {
    pub to: &'a str,
    pub title: &'a str,
    pub body: &'a str,
    pub data: &'a BTreeMap<String, String>,
    pub sound: &'static str,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    data: Option<PushTicket>,
}

#[derive(Debug, Deserialize)]
struct PushTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

pub struct ExpoPushClient {
    http_client: reqwest::Client,
    access_token: Option<String>,
    push_url: String,
}

impl ExpoPushClient {
    pub fn new(access_token: Option<String>) -> anyhow::Result<Self> {
        Self::with_url(access_token, EXPO_PUSH_URL)
    }

    pub fn with_url(access_token: Option<String>, push_url: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(EXPO_HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http_client,
            access_token,
            push_url: push_url.to_string(),
        })
    }

    /// Send one push message.
    pub async fn send(&self, message: &PushMessage<'_>) -> anyhow::Result<()> {
        let mut request = self.http_client.post(&self.push_url).json(message);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Expo push returned status {}", status);
        }

        let body: PushResponse = response.json().await?;
        match body.data {
            Some(ticket) if ticket.status == "error" => anyhow::bail!(
                "Expo rejected push: {}",
                ticket.message.unwrap_or_default()
            ),
            _ => Ok(()),
        }
    }
}
