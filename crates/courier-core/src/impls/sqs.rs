//! SqsQueue - SQS JSON プロトコルのクライアント
//!
//! `POST <endpoint>/` に `X-Amz-Target: AmazonSQS.<Action>` を付けて送ります。
//! 署名（SigV4）は扱わないので、対象は署名なしのリクエストを受け付ける
//! SQS 互換エンドポイント（localstack, ElasticMQ など）です。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{JobMessage, MessageAttributeValue, MessageId, OutgoingMessage, ReceiptHandle};
use crate::ports::{DeleteOutcome, QueueError, QueueService, ReceiveRequest};

const AMZ_JSON: &str = "application/x-amz-json-1.0";
const TARGET_HEADER: &str = "X-Amz-Target";

/// Slack on top of the long-poll wait before the HTTP call gives up.
const REQUEST_SLACK: Duration = Duration::from_secs(10);

/// FIFO queues require a group id on send.
const DEFAULT_MESSAGE_GROUP: &str = "courier";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageInput<'a> {
    queue_url: &'a str,
    max_number_of_messages: u32,
    visibility_timeout: u64,
    wait_time_seconds: u64,
    attribute_names: Vec<String>,
    message_attribute_names: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReceiveMessageOutput {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireMessage {
    message_id: String,
    receipt_handle: String,

    #[serde(default)]
    body: String,

    #[serde(default)]
    attributes: HashMap<String, String>,

    #[serde(default)]
    message_attributes: HashMap<String, MessageAttributeValue>,
}

impl From<WireMessage> for JobMessage {
    fn from(m: WireMessage) -> Self {
        JobMessage {
            message_id: MessageId::new(m.message_id),
            receipt_handle: ReceiptHandle::new(m.receipt_handle),
            body: m.body,
            attributes: m.attributes,
            message_attributes: m.message_attributes,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteMessageInput<'a> {
    queue_url: &'a str,
    receipt_handle: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageInput<'a> {
    queue_url: &'a str,
    message_body: &'a str,

    #[serde(skip_serializing_if = "HashMap::is_empty")]
    message_attributes: HashMap<String, MessageAttributeValue>,

    #[serde(skip_serializing_if = "Option::is_none")]
    message_group_id: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendMessageOutput {
    message_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct Empty {}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,

    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Queue client speaking the SQS JSON protocol over HTTP.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: reqwest::Client,
    endpoint: Url,
    queue_url: String,
}

impl SqsQueue {
    /// Build a client for `queue_url`; the endpoint is the url's origin.
    pub fn new(queue_url: &str) -> Result<Self, QueueError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| QueueError::Transport(format!("client build failed: {e}")))?;
        Self::with_client(client, queue_url)
    }

    pub fn with_client(client: reqwest::Client, queue_url: &str) -> Result<Self, QueueError> {
        Ok(Self {
            client,
            endpoint: endpoint_for(queue_url)?,
            queue_url: queue_url.to_string(),
        })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn is_fifo(&self) -> bool {
        self.queue_url.ends_with(".fifo")
    }

    async fn call<I, O>(&self, action: &str, input: &I, timeout: Duration) -> Result<O, QueueError>
    where
        I: Serialize + Sync,
        O: DeserializeOwned + Default,
    {
        let body = serde_json::to_vec(input).map_err(|e| QueueError::Decode(e.to_string()))?;
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(TARGET_HEADER, format!("AmazonSQS.{action}"))
            .header(CONTENT_TYPE, AMZ_JSON)
            .timeout(timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if status.is_success() {
            parse_output(&bytes)
        } else {
            Err(decode_error(status, &bytes))
        }
    }
}

#[async_trait]
impl QueueService for SqsQueue {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Option<JobMessage>, QueueError> {
        request.check_limits()?;
        let input = ReceiveMessageInput {
            queue_url: &self.queue_url,
            max_number_of_messages: request.max_messages,
            visibility_timeout: wire_secs(request.visibility_timeout),
            wait_time_seconds: wire_secs(request.wait_time),
            attribute_names: request.attribute_names.names(),
            message_attribute_names: request.message_attribute_names.names(),
        };
        let output: ReceiveMessageOutput = self
            .call(
                "ReceiveMessage",
                &input,
                request.wait_time.saturating_add(REQUEST_SLACK),
            )
            .await?;
        Ok(output.messages.into_iter().next().map(JobMessage::from))
    }

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<DeleteOutcome, QueueError> {
        let input = DeleteMessageInput {
            queue_url: &self.queue_url,
            receipt_handle: receipt_handle.as_str(),
        };
        match self.call::<_, Empty>("DeleteMessage", &input, REQUEST_SLACK).await {
            Ok(_) => Ok(DeleteOutcome::Removed),
            Err(QueueError::Http { code, .. }) if code == "ReceiptHandleIsInvalid" => {
                Ok(DeleteOutcome::AlreadyGone)
            }
            Err(e) => Err(e),
        }
    }

    async fn send(&self, message: OutgoingMessage) -> Result<MessageId, QueueError> {
        let group = message
            .function
            .as_ref()
            .map_or(DEFAULT_MESSAGE_GROUP, |f| f.as_str());
        let input = SendMessageInput {
            queue_url: &self.queue_url,
            message_body: &message.body,
            message_attributes: message.message_attributes(),
            message_group_id: self.is_fifo().then_some(group),
        };
        let output: SendMessageOutput = self.call("SendMessage", &input, REQUEST_SLACK).await?;
        Ok(MessageId::new(output.message_id))
    }
}

/// The wire takes whole seconds; partial seconds round up.
fn wire_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

fn endpoint_for(queue_url: &str) -> Result<Url, QueueError> {
    let url = Url::parse(queue_url).map_err(|e| QueueError::UnsupportedUrl(format!("{queue_url}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(QueueError::UnsupportedUrl(queue_url.to_string()));
    }
    let origin = url.origin().ascii_serialization();
    Url::parse(&format!("{origin}/")).map_err(|e| QueueError::UnsupportedUrl(e.to_string()))
}

fn parse_output<O: DeserializeOwned + Default>(bytes: &[u8]) -> Result<O, QueueError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(O::default());
    }
    serde_json::from_slice(bytes).map_err(|e| QueueError::Decode(e.to_string()))
}

fn decode_error(status: StatusCode, bytes: &[u8]) -> QueueError {
    let body: ErrorBody = serde_json::from_slice(bytes).unwrap_or_default();
    // "com.amazonaws.sqs#ReceiptHandleIsInvalid" -> "ReceiptHandleIsInvalid"
    let code = body
        .error_type
        .as_deref()
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
    QueueError::Http {
        status: status.as_u16(),
        code,
        message: body
            .message
            .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned()),
    }
}
