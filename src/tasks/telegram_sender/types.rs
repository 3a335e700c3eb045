/// Payload delivered to one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Photo { url: String, caption: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryJob {
    Push { chat_id: i64, payload: Outbound },
    /// plain summary for the external push endpoint
    Mirror { text: String },
}

impl DeliveryJob {
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryJob::Push { payload: Outbound::Text(_), .. } => "text",
            DeliveryJob::Push { payload: Outbound::Photo { .. }, .. } => "photo",
            DeliveryJob::Mirror { .. } => "mirror",
        }
    }
}
