use serde_json::json;

/// Eventos del canal en vivo (se serializan como server-sent events)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignEvent {
    Log(String),
    CampaignFinished,
}

impl CampaignEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CampaignEvent::Log(_) => "log",
            CampaignEvent::CampaignFinished => "campaign-finished",
        }
    }

    pub fn to_sse(&self) -> String {
        let data = match self {
            CampaignEvent::Log(text) => json!({ "message": text }),
            CampaignEvent::CampaignFinished => json!({}),
        };
        format!("event: {}\ndata: {}\n\n", self.name(), data)
    }
}
