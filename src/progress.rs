use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_lsp::lsp_types::request::WorkDoneProgressCreate;
use tower_lsp::lsp_types::{
    NumberOrString, ProgressParams, ProgressParamsValue, WorkDoneProgress, WorkDoneProgressBegin,
    WorkDoneProgressCreateParams, WorkDoneProgressEnd, WorkDoneProgressReport,
};
use tower_lsp::Client;
use tracing::debug;
use uuid::Uuid;

const CREATE_TIMEOUT: Duration = Duration::from_secs(60);

/// The slice of the client connection that progress reporting needs. The
/// real implementation is the tower-lsp [`Client`]; tests record emissions.
#[tower_lsp::async_trait]
pub trait ProgressSink: Send + Sync {
    async fn create_token(&self, token: String);
    async fn notify(&self, token: String, value: WorkDoneProgress);
}

#[tower_lsp::async_trait]
impl ProgressSink for Client {
    async fn create_token(&self, token: String) {
        let params = WorkDoneProgressCreateParams {
            token: NumberOrString::String(token),
        };
        // The client is not required to accept progress tokens; a refusal
        // or timeout must not stall the job.
        let create = self.send_request::<WorkDoneProgressCreate>(params);
        if tokio::time::timeout(CREATE_TIMEOUT, create).await.is_err() {
            debug!("workDoneProgress/create timed out");
        }
    }

    async fn notify(&self, token: String, value: WorkDoneProgress) {
        self.send_notification::<tower_lsp::lsp_types::notification::Progress>(ProgressParams {
            token: NumberOrString::String(token),
            value: ProgressParamsValue::WorkDone(value),
        })
        .await;
    }
}

/// Work-done progress for one background job, addressed by a random token
/// that is never reused.
pub struct WorkDone {
    token: String,
    sink: Arc<dyn ProgressSink>,
    started: AtomicBool,
}

impl WorkDone {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
            sink,
            started: AtomicBool::new(false),
        }
    }

    pub async fn start(&self, title: &str) {
        self.sink.create_token(self.token.clone()).await;
        self.sink
            .notify(
                self.token.clone(),
                WorkDoneProgress::Begin(WorkDoneProgressBegin {
                    title: title.to_string(),
                    cancellable: Some(false),
                    message: Some(title.to_string()),
                    percentage: None,
                }),
            )
            .await;
        self.started.store(true, Ordering::SeqCst);
    }

    pub async fn report(&self, message: &str, percentage: u32) {
        if !self.started.load(Ordering::SeqCst) {
            self.start(message).await;
        }
        self.sink
            .notify(
                self.token.clone(),
                WorkDoneProgress::Report(WorkDoneProgressReport {
                    cancellable: None,
                    message: Some(message.to_string()),
                    percentage: Some(percentage.min(100)),
                }),
            )
            .await;
    }

    pub async fn end(&self, message: &str) {
        self.sink
            .notify(
                self.token.clone(),
                WorkDoneProgress::End(WorkDoneProgressEnd {
                    message: Some(message.to_string()),
                }),
            )
            .await;
    }
}

/// `$/progress` carrying an arbitrary partial-result payload rather than a
/// work-done value.
enum PartialProgress {}

impl tower_lsp::lsp_types::notification::Notification for PartialProgress {
    type Params = serde_json::Value;
    const METHOD: &'static str = "$/progress";
}

/// Streams partial results against the token the client supplied with the
/// request. Without a token every send is a no-op and the handler returns
/// the full result instead.
pub struct PartialResultSender {
    client: Client,
    token: Option<NumberOrString>,
}

impl PartialResultSender {
    pub fn new(client: Client, token: Option<NumberOrString>) -> Self {
        Self { client, token }
    }

    pub fn is_active(&self) -> bool {
        self.token.is_some()
    }

    pub async fn send<T: serde::Serialize>(&self, value: &T) {
        let Some(token) = &self.token else {
            return;
        };
        let params = serde_json::json!({
            "token": token,
            "value": value,
        });
        self.client.send_notification::<PartialProgress>(params).await;
        debug!("sent partial result");
    }
}
