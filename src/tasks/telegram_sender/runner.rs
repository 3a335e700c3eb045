use super::types::{DeliveryJob, Outbound};
use crate::errors::DeliveryError;
use crate::telegram::{Messenger, TextOptions};
use futures_util::FutureExt;
use reqwest::Client;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// Producer side of the delivery pipeline. Enqueueing never blocks, and the
/// dispatcher finishes once every clone is dropped and in-flight jobs end.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl DeliveryQueue {
    pub fn push(&self, chat_id: i64, payload: Outbound) {
        self.enqueue(DeliveryJob::Push { chat_id, payload });
    }

    pub fn mirror(&self, text: String) {
        self.enqueue(DeliveryJob::Mirror { text });
    }

    fn enqueue(&self, job: DeliveryJob) {
        if let Err(e) = self.tx.send(job) {
            tracing::error!(kind = e.0.kind(), "delivery dispatcher has stopped, job dropped");
        }
    }
}

/// External endpoint receiving the admin's summaries as a URL-encoded GET
/// parameter. The template either contains `{text}` or ends where the text goes.
#[derive(Debug, Clone)]
pub struct MirrorEndpoint {
    client: Client,
    template: String,
}

impl MirrorEndpoint {
    pub fn new(client: Client, template: String) -> Self {
        Self { client, template }
    }

    pub fn url_for(&self, text: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(text.as_bytes()).collect();
        if self.template.contains("{text}") {
            self.template.replace("{text}", &encoded)
        } else {
            format!("{}{}", self.template, encoded)
        }
    }

    pub async fn send(&self, text: &str) -> Result<(), DeliveryError> {
        let response = self.client.get(self.url_for(text)).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Mirror(response.status().as_u16()))
        }
    }
}

/// Start the dispatcher. Each job runs in its own task, so completion order is
/// not guaranteed.
pub fn spawn(
    messenger: Arc<dyn Messenger>,
    mirror: Option<MirrorEndpoint>,
) -> (DeliveryQueue, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(dispatch(rx, messenger, mirror.map(Arc::new)));
    (DeliveryQueue { tx }, handle)
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<DeliveryJob>,
    messenger: Arc<dyn Messenger>,
    mirror: Option<Arc<MirrorEndpoint>>,
) {
    let mut in_flight = JoinSet::new();

    while let Some(job) = rx.recv().await {
        let messenger = Arc::clone(&messenger);
        let mirror = mirror.clone();
        let kind = job.kind();
        in_flight.spawn(async move {
            if AssertUnwindSafe(deliver(job, messenger.as_ref(), mirror.as_deref()))
                .catch_unwind()
                .await
                .is_err()
            {
                tracing::error!(kind, "delivery task panicked");
            }
        });

        while let Some(finished) = in_flight.try_join_next() {
            if let Err(e) = finished {
                tracing::error!(error = %e, "delivery task failed");
            }
        }
    }

    while let Some(finished) = in_flight.join_next().await {
        if let Err(e) = finished {
            tracing::error!(error = %e, "delivery task failed");
        }
    }
    tracing::debug!("delivery queue drained");
}

async fn deliver(job: DeliveryJob, messenger: &dyn Messenger, mirror: Option<&MirrorEndpoint>) {
    match job {
        DeliveryJob::Push {
            chat_id,
            payload: Outbound::Text(text),
        } => {
            if let Err(e) = messenger.send_text(chat_id, &text, &TextOptions::html()).await {
                tracing::error!(user_id = chat_id, error = %e, "failed to send message");
            }
        }
        DeliveryJob::Push {
            chat_id,
            payload: Outbound::Photo { url, caption },
        } => {
            let Err(e) = messenger.send_photo(chat_id, &url, &caption).await else {
                return;
            };
            tracing::warn!(user_id = chat_id, photo = %url, error = %e, "photo rejected, sending text instead");
            let fallback = format!("Image: {url}\n\n{caption}");
            if let Err(e) = messenger.send_text(chat_id, &fallback, &TextOptions::html()).await {
                tracing::error!(user_id = chat_id, error = %e, "failed to send fallback message");
            }
        }
        DeliveryJob::Mirror { text } => match mirror {
            Some(endpoint) => {
                if let Err(e) = endpoint.send(&text).await {
                    tracing::error!(error = %e, "failed to mirror summary");
                }
            }
            None => tracing::debug!("no push endpoint configured, summary dropped"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{RecordingMessenger, Sent};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_text_and_photo_are_delivered() {
        let messenger = Arc::new(RecordingMessenger::default());
        let (queue, handle) = spawn(messenger.clone(), None);

        queue.push(1, Outbound::Text("hello".to_string()));
        queue.push(
            2,
            Outbound::Photo {
                url: "http://a/b.png".to_string(),
                caption: "cap".to_string(),
            },
        );
        drop(queue);
        handle.await.unwrap();

        let sent = messenger.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.contains(&Sent::Text { chat_id: 1, text: "hello".to_string() }));
        assert!(sent.contains(&Sent::Photo {
            chat_id: 2,
            url: "http://a/b.png".to_string(),
            caption: "cap".to_string()
        }));
    }

    #[tokio::test]
    async fn test_rejected_photo_falls_back_to_text() {
        let messenger = Arc::new(RecordingMessenger::rejecting_photos());
        let (queue, handle) = spawn(messenger.clone(), None);

        queue.push(
            7,
            Outbound::Photo {
                url: "http://a/b.png".to_string(),
                caption: "cap".to_string(),
            },
        );
        drop(queue);
        handle.await.unwrap();

        assert_eq!(
            messenger.sent(),
            vec![Sent::Text {
                chat_id: 7,
                text: "Image: http://a/b.png\n\ncap".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_panicking_delivery_does_not_stop_others() {
        let messenger = Arc::new(RecordingMessenger::panicking_for(13));
        let (queue, handle) = spawn(messenger.clone(), None);

        queue.push(13, Outbound::Text("boom".to_string()));
        queue.push(14, Outbound::Text("still delivered".to_string()));
        drop(queue);
        handle.await.expect("dispatcher survives a panicking job");

        assert_eq!(
            messenger.sent(),
            vec![Sent::Text {
                chat_id: 14,
                text: "still delivered".to_string()
            }]
        );
    }

    #[test]
    fn test_mirror_url_encoding() {
        let appended = MirrorEndpoint::new(Client::new(), "https://push.example/send?text=".to_string());
        assert_eq!(
            appended.url_for("📌 a&b\n🕒 c"),
            "https://push.example/send?text=%F0%9F%93%8C+a%26b%0A%F0%9F%95%92+c"
        );

        let templated = MirrorEndpoint::new(Client::new(), "https://push.example/{text}/go".to_string());
        assert_eq!(templated.url_for("a b"), "https://push.example/a+b/go");
    }

    #[tokio::test]
    async fn test_mirror_job_hits_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/push"))
            .and(query_param("text", "hello admin"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let messenger = Arc::new(RecordingMessenger::default());
        let mirror = MirrorEndpoint::new(Client::new(), format!("{}/push?text=", server.uri()));
        let (queue, handle) = spawn(messenger.clone(), Some(mirror));

        queue.mirror("hello admin".to_string());
        drop(queue);
        handle.await.unwrap();

        assert!(messenger.sent().is_empty());
    }
}
