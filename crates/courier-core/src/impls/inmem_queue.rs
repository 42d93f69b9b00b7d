//! InMemoryQueue - 開発・テスト用のキューエミュレータ
//!
//! # 学習ポイント
//! - tokio::sync::Mutex + Notify による long poll
//! - visibility timeout による lease（ロックではない）
//! - tokio::time を使うことでテストで時間を止めて進められる
//!
//! # 意味論
//! - receive するたびに receive count +1、新しい receipt handle を発行
//! - claim 中のメッセージは visibility window の間は他の receive に見えない
//! - window が切れると再び見えるようになる（再配送）
//! - delete は現在の receipt handle でのみ削除。古い handle は AlreadyGone

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::message::{APPROXIMATE_RECEIVE_COUNT, SENT_TIMESTAMP};
use crate::domain::{
    JobMessage, MessageAttributeValue, MessageId, OutgoingMessage, ReceiptHandle,
};
use crate::ports::{DeleteOutcome, QueueError, QueueService, ReceiveRequest};

/// Snapshot of the queue for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    /// Claimable right now.
    pub visible: usize,

    /// Claimed and inside their visibility window.
    pub in_flight: usize,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: String,
    message_attributes: HashMap<String, MessageAttributeValue>,
    sent_timestamp: i64,
    receive_count: u32,

    /// Hidden from receivers until this instant.
    invisible_until: Option<Instant>,

    /// Handle of the latest claim. Only this handle can delete.
    receipt: Option<ReceiptHandle>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.is_none_or(|until| until <= now)
    }

    fn to_job_message(&self, receipt_handle: ReceiptHandle) -> JobMessage {
        let attributes = HashMap::from([
            (
                APPROXIMATE_RECEIVE_COUNT.to_string(),
                self.receive_count.to_string(),
            ),
            (SENT_TIMESTAMP.to_string(), self.sent_timestamp.to_string()),
        ]);
        JobMessage {
            message_id: self.message_id.clone(),
            receipt_handle,
            body: self.body.clone(),
            attributes,
            message_attributes: self.message_attributes.clone(),
        }
    }
}

#[derive(Default)]
struct InMemoryQueueState {
    /// All live messages (single source of truth).
    messages: HashMap<MessageId, StoredMessage>,

    /// Arrival order (MessageIds only).
    order: VecDeque<MessageId>,

    /// Current receipt handle -> message.
    receipts: HashMap<ReceiptHandle, MessageId>,

    closed: bool,
}

impl InMemoryQueueState {
    /// Claim the oldest visible message, if any.
    fn claim(&mut self, now: Instant, invisible_until: Instant) -> Option<JobMessage> {
        let id = self
            .order
            .iter()
            .find(|id| self.messages.get(*id).is_some_and(|m| m.is_visible(now)))?
            .clone();
        let message = self.messages.get_mut(&id)?;

        let handle = ReceiptHandle::generate(&id);
        if let Some(previous) = message.receipt.replace(handle.clone()) {
            self.receipts.remove(&previous);
        }
        message.receive_count += 1;
        message.invisible_until = Some(invisible_until);
        self.receipts.insert(handle.clone(), id);

        Some(message.to_job_message(handle))
    }

    /// Earliest instant at which an in-flight message becomes visible again.
    fn next_visible_at(&self, now: Instant) -> Option<Instant> {
        self.messages
            .values()
            .filter_map(|m| m.invisible_until)
            .filter(|until| *until > now)
            .min()
    }

    fn counts(&self, now: Instant) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for message in self.messages.values() {
            if message.is_visible(now) {
                counts.visible += 1;
            } else {
                counts.in_flight += 1;
            }
        }
        counts
    }
}

/// In-process queue with visibility-timeout semantics.
///
/// Cloning shares the underlying queue, so several workers can compete for
/// the same messages.
#[derive(Clone)]
pub struct InMemoryQueue {
    name: String,
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(InMemoryQueueState::default())),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn counts(&self) -> QueueCounts {
        let state = self.state.lock().await;
        state.counts(Instant::now())
    }

    /// Number of messages not yet deleted (visible or in flight).
    pub async fn len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Stop serving: pending and future receives fail with `QueueError::Closed`.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl QueueService for InMemoryQueue {
    async fn receive(&self, request: &ReceiveRequest) -> Result<Option<JobMessage>, QueueError> {
        let deadline = Instant::now()
            .checked_add(request.wait_time)
            .ok_or_else(|| QueueError::InvalidRequest(format!("wait time {:?}", request.wait_time)))?;
        loop {
            // Created before the state check so a send in between still wakes us.
            let notified = self.notify.notified();

            let next_visible = {
                let mut state = self.state.lock().await;
                if state.closed {
                    return Err(QueueError::Closed);
                }
                let now = Instant::now();
                let invisible_until = now.checked_add(request.visibility_timeout).ok_or_else(|| {
                    QueueError::InvalidRequest(format!(
                        "visibility timeout {:?}",
                        request.visibility_timeout
                    ))
                })?;
                if let Some(message) = state.claim(now, invisible_until) {
                    return Ok(Some(message));
                }
                state.next_visible_at(now)
            };

            if Instant::now() >= deadline {
                return Ok(None);
            }
            let wake_at = next_visible.map_or(deadline, |at| at.min(deadline));

            tokio::select! {
                _ = notified => {},
                _ = tokio::time::sleep_until(wake_at) => {},
            }
        }
    }

    async fn delete(&self, receipt_handle: &ReceiptHandle) -> Result<DeleteOutcome, QueueError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.receipts.remove(receipt_handle) else {
            return Ok(DeleteOutcome::AlreadyGone);
        };
        if state.messages.remove(&id).is_some() {
            state.order.retain(|m| m != &id);
        }
        Ok(DeleteOutcome::Removed)
    }

    async fn send(&self, message: OutgoingMessage) -> Result<MessageId, QueueError> {
        let message_id = MessageId::generate();
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(QueueError::Closed);
            }
            let stored = StoredMessage {
                message_id: message_id.clone(),
                message_attributes: message.message_attributes(),
                body: message.body,
                sent_timestamp: chrono::Utc::now().timestamp_millis(),
                receive_count: 0,
                invisible_until: None,
                receipt: None,
            };
            state.messages.insert(message_id.clone(), stored);
            state.order.push_back(message_id.clone());
        }

        // Notify outside the lock
        self.notify.notify_waiters();
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use serde_json::json;

    const VISIBILITY: Duration = Duration::from_secs(60);

    fn request(wait: Duration) -> ReceiveRequest {
        ReceiveRequest::single(VISIBILITY, wait)
    }

    async fn queue_with_one_job() -> InMemoryQueue {
        let queue = InMemoryQueue::new("test");
        queue
            .send(OutgoingMessage::job("echo", &json!({"message": "hi"})))
            .await
            .unwrap();
        queue
    }

    #[tokio::test(start_paused = true)]
    async fn receive_returns_message_with_attributes() {
        let queue = queue_with_one_job().await;

        let msg = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();
        assert_eq!(msg.function(), Some("echo"));
        assert_eq!(msg.approximate_receive_count(), 1);
        assert!(msg.attributes.contains_key(SENT_TIMESTAMP));
        assert_eq!(msg.body, r#"{"message":"hi"}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn claimed_message_is_invisible_until_window_lapses() {
        let queue = queue_with_one_job().await;

        let first = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();
        assert!(queue.receive(&request(Duration::ZERO)).await.unwrap().is_none());
        assert_eq!(queue.counts().await, QueueCounts { visible: 0, in_flight: 1 });

        tokio::time::advance(VISIBILITY).await;

        let second = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();
        assert_eq!(second.message_id, first.message_id);
        assert_ne!(second.receipt_handle, first.receipt_handle);
        assert_eq!(second.approximate_receive_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn receive_count_never_decreases_across_redeliveries() {
        let queue = queue_with_one_job().await;

        let mut last = 0;
        for _ in 0..8 {
            let msg = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();
            let count = msg.approximate_receive_count();
            assert!(count > last);
            last = count;
            tokio::time::advance(VISIBILITY).await;
        }
        assert_eq!(last, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_is_idempotent() {
        let queue = queue_with_one_job().await;
        let msg = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();

        assert_eq!(queue.delete(&msg.receipt_handle).await.unwrap(), DeleteOutcome::Removed);
        assert_eq!(
            queue.delete(&msg.receipt_handle).await.unwrap(),
            DeleteOutcome::AlreadyGone
        );
        assert_eq!(
            queue.delete(&ReceiptHandle::new("never-issued")).await.unwrap(),
            DeleteOutcome::AlreadyGone
        );
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_handle_does_not_delete_the_new_claim() {
        let queue = queue_with_one_job().await;
        let stale = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();
        tokio::time::advance(VISIBILITY).await;
        let current = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();

        assert_eq!(
            queue.delete(&stale.receipt_handle).await.unwrap(),
            DeleteOutcome::AlreadyGone
        );
        assert_eq!(queue.len().await, 1);
        assert_eq!(
            queue.delete(&current.receipt_handle).await.unwrap(),
            DeleteOutcome::Removed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn current_handle_deletes_after_window_if_not_reclaimed() {
        let queue = queue_with_one_job().await;
        let msg = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();
        tokio::time::advance(VISIBILITY * 2).await;

        assert_eq!(queue.delete(&msg.receipt_handle).await.unwrap(), DeleteOutcome::Removed);
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn long_poll_times_out_on_empty_queue() {
        let queue = InMemoryQueue::new("empty");
        let start = Instant::now();

        let msg = queue.receive(&request(Duration::from_secs(20))).await.unwrap();

        assert!(msg.is_none());
        assert!(start.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn send_wakes_long_poll() {
        let queue = InMemoryQueue::new("wake");
        let start = Instant::now();

        let receiver = tokio::spawn({
            let queue = queue.clone();
            async move { queue.receive(&request(Duration::from_secs(20))).await.unwrap() }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        queue.send(OutgoingMessage::raw("{}")).await.unwrap();

        let msg = receiver.await.unwrap();
        assert!(msg.is_some());
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn long_poll_picks_up_redelivery_when_window_lapses() {
        let queue = queue_with_one_job().await;
        let short = ReceiveRequest::single(Duration::from_secs(5), Duration::ZERO);
        queue.receive(&short).await.unwrap().unwrap();

        let start = Instant::now();
        let msg = queue
            .receive(&request(Duration::from_secs(20)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(msg.approximate_receive_count(), 2);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn at_most_one_active_claim_across_receivers() {
        let queue = queue_with_one_job().await;

        let mut receivers = Vec::new();
        for _ in 0..8 {
            let queue = queue.clone();
            receivers.push(tokio::spawn(async move {
                queue.receive(&request(Duration::from_secs(1))).await.unwrap()
            }));
        }

        let mut claimed = Vec::new();
        for r in receivers {
            if let Some(msg) = r.await.unwrap() {
                claimed.push(msg.receipt_handle);
            }
        }
        assert_eq!(claimed.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn messages_are_claimed_in_arrival_order() {
        let queue = InMemoryQueue::new("fifo");
        for i in 0..3 {
            queue.send(OutgoingMessage::raw(i.to_string())).await.unwrap();
        }

        for expected in ["0", "1", "2"] {
            let msg = queue.receive(&request(Duration::ZERO)).await.unwrap().unwrap();
            assert_eq!(msg.body, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn closed_queue_rejects_receivers() {
        let queue = InMemoryQueue::new("closing");
        let receiver = tokio::spawn({
            let queue = queue.clone();
            async move { queue.receive(&request(Duration::from_secs(20))).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        queue.close().await;

        assert!(matches!(receiver.await.unwrap(), Err(QueueError::Closed)));
        assert!(matches!(
            queue.send(OutgoingMessage::raw("{}")).await,
            Err(QueueError::Closed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_durations_are_rejected() {
        let queue = queue_with_one_job().await;

        let huge_window = ReceiveRequest::single(Duration::MAX, Duration::ZERO);
        assert!(matches!(
            queue.receive(&huge_window).await,
            Err(QueueError::InvalidRequest(_))
        ));

        let huge_wait = ReceiveRequest::single(VISIBILITY, Duration::MAX);
        assert!(matches!(
            queue.receive(&huge_wait).await,
            Err(QueueError::InvalidRequest(_))
        ));

        // nothing was claimed
        assert_eq!(queue.counts().await.visible, 1);
    }
}
