//! services/gateway_session.rs
//! `SessionHandle` sobre el gateway HTTP de WhatsApp.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::json;

use crate::{
    models::session_model::{MessagePayload, SendOptions, SessionState},
    services::session_registry::{SessionHandle, SessionLifecycle},
};

pub struct GatewaySession {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    session_id: String,
    lifecycle: SessionLifecycle,
}

fn chat_id(address: &str) -> String {
    if address.ends_with("@c.us") {
        address.to_string()
    } else {
        format!("{}@c.us", address)
    }
}

impl GatewaySession {
    pub fn new(http_client: Client, base_url: &str, api_key: Option<String>, session_id: &str) -> Self {
        GatewaySession {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            session_id: session_id.to_string(),
            lifecycle: SessionLifecycle::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            path,
            urlencoding::encode(&self.session_id)
        )
    }

    fn with_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }

    async fn post_json(&self, path: &str, payload: serde_json::Value) -> Result<serde_json::Value> {
        let url = self.url(path);
        let resp = self
            .with_auth(self.http_client.post(&url))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Fallo al hacer POST {}", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body_txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Gateway respondió {} en {}: {}", status, path, body_txt));
        }
        Ok(resp.json::<serde_json::Value>().await.unwrap_or(serde_json::Value::Null))
    }

    /// Pide al gateway que inicie la sesión (emitirá qr/ready por webhook).
    pub async fn start(&self) -> Result<()> {
        let url = self.url("session/start");
        log::info!("(start) Iniciando sesión {} en {}", self.session_id, url);
        let resp = self
            .with_auth(self.http_client.get(&url))
            .send()
            .await
            .context("Fallo al hacer GET session/start")?;

        if !resp.status().is_success() {
            let body_txt = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Error iniciando sesión: {}", body_txt));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionHandle for GatewaySession {
    fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    async fn connection_state(&self) -> Result<SessionState> {
        let status_url = self.url("session/status");
        let resp = self
            .with_auth(self.http_client.get(&status_url))
            .send()
            .await
            .context("Fallo al hacer GET session/status")?;

        if !resp.status().is_success() {
            let body_txt = resp.text().await.unwrap_or_default();
            log::warn!(
                "(connection_state) La respuesta NO es exitosa para {}: '{}'",
                self.session_id,
                body_txt
            );
            return Ok(self.lifecycle.state());
        }

        let json_val = resp.json::<serde_json::Value>().await?;
        let connected = json_val
            .get("state")
            .and_then(|v| v.as_str())
            .map(|s| s == "CONNECTED")
            .unwrap_or(false);

        let local = self.lifecycle.state();
        if connected {
            self.lifecycle.sync(SessionState::Connected);
        } else if local == SessionState::Connected {
            self.lifecycle.sync(SessionState::Disconnected);
        }
        Ok(self.lifecycle.state())
    }

    async fn is_registered_address(&self, address: &str) -> Result<bool> {
        let resp = self
            .post_json("client/isRegisteredUser", json!({ "number": chat_id(address) }))
            .await?;
        Ok(resp.get("result").and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn send_message(&self, address: &str, payload: MessagePayload, opts: SendOptions) -> Result<()> {
        let chat_id = chat_id(address);
        let body = match payload {
            MessagePayload::Text(text) => json!({
                "chatId": chat_id,
                "contentType": "string",
                "content": text
            }),
            MessagePayload::Media(media) => {
                let mut options = serde_json::Map::new();
                if let Some(caption) = opts.caption {
                    options.insert("caption".to_string(), json!(caption));
                }
                if opts.send_audio_as_voice {
                    options.insert("sendAudioAsVoice".to_string(), json!(true));
                }
                json!({
                    "chatId": chat_id,
                    "contentType": "MessageMedia",
                    "content": {
                        "mimetype": media.mimetype,
                        "data": base64::encode(&media.data),
                        "filename": media.filename
                    },
                    "options": options
                })
            }
        };

        self.post_json("client/sendMessage", body)
            .await
            .with_context(|| format!("Fallo al enviar mensaje a {}", chat_id))?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let url = self.url("session/terminate");
        self.with_auth(self.http_client.get(&url))
            .send()
            .await
            .context("Fallo al hacer GET session/terminate")?;
        Ok(())
    }
}
