//! # Outbound Flush Engine
//!
//! Accumulates prepared messages and submits them in grouped, size-bounded
//! batches. Sends made in the same scheduler turn coalesce into one flush:
//! the first enqueue schedules a flush task for the next tick, later
//! enqueues attach to it, and everyone who attached observes the same
//! outcome. At flush time messages are run through the outgoing hook
//! chain, grouped per recipient in insertion order, chunked at the
//! configured batch limit, and the chunk calls race concurrently — the
//! first failure settles the flush.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, error};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::api::KikApi;
use crate::core::config::is_valid_username;
use crate::core::error::{Error, Result};
use crate::message::{Message, OutgoingMessage};

/// Observes or mutates each message right before it leaves the queue.
///
/// Hooks always run to completion for every message; a hook cannot stall
/// the flush. Implemented automatically for `Fn(&mut OutgoingMessage)`
/// closures.
#[async_trait]
pub trait OutgoingHook: Send + Sync {
    async fn process(&self, message: &mut OutgoingMessage);
}

#[async_trait]
impl<F> OutgoingHook for F
where
    F: Fn(&mut OutgoingMessage) + Send + Sync,
{
    async fn process(&self, message: &mut OutgoingMessage) {
        self(message);
    }
}

/// Where the pending queue is in its flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushState {
    /// Nothing scheduled; the next enqueue schedules a flush.
    Idle,
    /// A flush task is waiting for the next tick; enqueues attach to it.
    FlushScheduled,
    /// A flush is in flight; new enqueues schedule a fresh one.
    Flushing,
}

type FlushWaiter = oneshot::Sender<Result<()>>;

struct PendingState {
    messages: Vec<OutgoingMessage>,
    state: FlushState,
    waiters: Vec<FlushWaiter>,
}

struct QueueInner {
    api: Arc<dyn KikApi>,
    max_per_batch: usize,
    max_per_broadcast: usize,
    pending: Mutex<PendingState>,
    hooks: RwLock<Vec<Arc<dyn OutgoingHook>>>,
}

/// Handle to the bot's pending outbound queue.
#[derive(Clone)]
pub(crate) struct OutboundQueue {
    inner: Arc<QueueInner>,
}

impl OutboundQueue {
    pub(crate) fn new(api: Arc<dyn KikApi>, max_per_batch: usize, max_per_broadcast: usize) -> Self {
        OutboundQueue {
            inner: Arc::new(QueueInner {
                api,
                max_per_batch,
                max_per_broadcast,
                pending: Mutex::new(PendingState {
                    messages: Vec::new(),
                    state: FlushState::Idle,
                    waiters: Vec::new(),
                }),
                hooks: RwLock::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn add_hook(&self, hook: Arc<dyn OutgoingHook>) {
        self.inner.hooks.write().expect("hook list").push(hook);
    }

    /// Enqueue messages for one recipient and await the coalesced flush.
    ///
    /// The recipient is validated before anything is enqueued, so an
    /// invalid username never costs a network call.
    pub(crate) async fn send(
        &self,
        messages: Vec<Message>,
        recipient: &str,
        chat_id: Option<&str>,
    ) -> Result<()> {
        if recipient.is_empty() {
            return Err(Error::MissingRecipient);
        }
        if !is_valid_username(recipient) {
            return Err(Error::InvalidRecipient(recipient.to_string()));
        }

        let prepared = messages
            .iter()
            .map(|message| OutgoingMessage::prepare(message, recipient, chat_id));

        let receiver = {
            let mut pending = self.inner.pending.lock().await;
            pending.messages.extend(prepared);
            self.attach_waiter(&mut pending)
        };

        receiver.await.unwrap_or(Ok(()))
    }

    /// Await the outcome of the next flush cycle, scheduling one if idle.
    pub(crate) async fn flush(&self) -> Result<()> {
        let receiver = {
            let mut pending = self.inner.pending.lock().await;
            self.attach_waiter(&mut pending)
        };
        receiver.await.unwrap_or(Ok(()))
    }

    /// Register interest in the next flush outcome, scheduling the flush
    /// task when none is pending. Must run under the pending lock so the
    /// enqueue and the schedule decision form one atomic step.
    fn attach_waiter(&self, pending: &mut PendingState) -> oneshot::Receiver<Result<()>> {
        let (sender, receiver) = oneshot::channel();
        pending.waiters.push(sender);

        if pending.state != FlushState::FlushScheduled {
            pending.state = FlushState::FlushScheduled;
            let queue = self.clone();
            tokio::spawn(async move {
                // next-tick boundary: everything enqueued in the current
                // turn joins this flush
                tokio::task::yield_now().await;
                let _ = queue.flush_now().await;
            });
        }

        receiver
    }

    /// Flush immediately: swap out the queue and submit it.
    pub(crate) async fn flush_now(&self) -> Result<()> {
        let (mut messages, waiters) = {
            let mut pending = self.inner.pending.lock().await;
            pending.state = FlushState::Flushing;
            (
                std::mem::take(&mut pending.messages),
                std::mem::take(&mut pending.waiters),
            )
        };

        let hooks: Vec<Arc<dyn OutgoingHook>> =
            self.inner.hooks.read().expect("hook list").clone();
        for message in &mut messages {
            for hook in &hooks {
                hook.process(message).await;
            }
        }

        let batches = group_and_chunk(messages, self.inner.max_per_batch);
        debug!("flushing {} batch(es)", batches.len());

        let calls = batches.into_iter().map(|batch| {
            let api = Arc::clone(&self.inner.api);
            tokio::spawn(async move { api.send_messages(batch).await })
        });
        let result = race_chunk_calls(calls.collect()).await;

        {
            let mut pending = self.inner.pending.lock().await;
            // a send that raced in during the flush has scheduled anew;
            // only a quiet queue returns to idle
            if pending.state == FlushState::Flushing {
                pending.state = FlushState::Idle;
            }
        }

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
        result
    }

    /// Cross-product broadcast, bypassing the pending queue.
    ///
    /// Every recipient is validated before any call goes out. Chunking is
    /// global over the recipient-major, message-minor expansion, not per
    /// recipient.
    pub(crate) async fn broadcast(
        &self,
        messages: Vec<Message>,
        recipients: &[String],
    ) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::MissingRecipient);
        }
        for recipient in recipients {
            if !is_valid_username(recipient) {
                return Err(Error::InvalidRecipient(recipient.clone()));
            }
        }

        let mut prepared = Vec::with_capacity(recipients.len() * messages.len());
        for recipient in recipients {
            for message in &messages {
                prepared.push(OutgoingMessage::prepare(message, recipient, None));
            }
        }

        let calls = prepared
            .chunks(self.inner.max_per_broadcast)
            .map(|chunk| {
                let api = Arc::clone(&self.inner.api);
                let chunk = chunk.to_vec();
                tokio::spawn(async move { api.broadcast_messages(chunk).await })
            });
        race_chunk_calls(calls.collect()).await
    }
}

/// Await concurrently issued chunk calls, settling on the first failure.
///
/// The calls are already spawned, so chunks that come after a failure are
/// still delivered; the caller just never observes their outcome.
async fn race_chunk_calls(calls: Vec<JoinHandle<Result<()>>>) -> Result<()> {
    let mut in_flight: FuturesUnordered<JoinHandle<Result<()>>> = calls.into_iter().collect();
    while let Some(joined) = in_flight.next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(err),
            Err(err) => {
                error!("a message batch task was lost: {err}");
                return Err(Error::Batch(err.to_string()));
            }
        }
    }
    Ok(())
}

/// Group messages by recipient (first-seen order, insertion order within a
/// group) and split each group into batches of at most `max_per_batch`.
fn group_and_chunk(
    messages: Vec<OutgoingMessage>,
    max_per_batch: usize,
) -> Vec<Vec<OutgoingMessage>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<OutgoingMessage>> = HashMap::new();

    for message in messages {
        if !groups.contains_key(&message.to) {
            order.push(message.to.clone());
        }
        groups.entry(message.to.clone()).or_default().push(message);
    }

    let mut batches = Vec::new();
    for recipient in &order {
        let group = groups.remove(recipient).unwrap_or_default();
        for chunk in group.chunks(max_per_batch.max(1)) {
            batches.push(chunk.to_vec());
        }
    }
    batches
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    use crate::message::Message;

    /// Fake API recording every batch it is handed.
    #[derive(Default)]
    pub(crate) struct RecordingApi {
        pub(crate) sent: StdMutex<Vec<Vec<OutgoingMessage>>>,
        pub(crate) broadcasts: StdMutex<Vec<Vec<OutgoingMessage>>>,
        pub(crate) fail_sends: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl KikApi for RecordingApi {
        async fn send_messages(&self, messages: Vec<OutgoingMessage>) -> Result<()> {
            if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(Error::Api { status: 500 });
            }
            self.sent.lock().unwrap().push(messages);
            Ok(())
        }

        async fn broadcast_messages(&self, messages: Vec<OutgoingMessage>) -> Result<()> {
            self.broadcasts.lock().unwrap().push(messages);
            Ok(())
        }

        async fn get_configuration(&self) -> Result<crate::core::BotConfiguration> {
            unimplemented!("not exercised by queue tests")
        }

        async fn update_configuration(
            &self,
            _configuration: &crate::core::BotConfiguration,
        ) -> Result<()> {
            Ok(())
        }

        async fn user_info(&self, _username: &str) -> Result<crate::profile::ProfileData> {
            Ok(crate::profile::ProfileData::default())
        }

        async fn create_data_code(&self, data: &str) -> Result<crate::api::RemoteCode> {
            Ok(crate::api::RemoteCode {
                id: format!("code-for-{data}"),
            })
        }
    }

    pub(crate) fn recording_queue() -> (OutboundQueue, Arc<RecordingApi>) {
        recording_queue_with_limits(25, 100)
    }

    pub(crate) fn recording_queue_with_limits(
        max_per_batch: usize,
        max_per_broadcast: usize,
    ) -> (OutboundQueue, Arc<RecordingApi>) {
        let api = Arc::new(RecordingApi::default());
        let queue = OutboundQueue::new(api.clone(), max_per_batch, max_per_broadcast);
        (queue, api)
    }

    fn texts(n: usize) -> Vec<Message> {
        (0..n).map(|i| Message::text(format!("m{i}"))).collect()
    }

    #[tokio::test]
    async fn test_send_stamps_recipient_and_chat() {
        let (queue, api) = recording_queue();
        queue
            .send(texts(2), "alice", Some("chat-1"))
            .await
            .unwrap();

        let sent = api.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 2);
        assert!(sent[0].iter().all(|m| m.to == "alice"));
        assert!(sent[0]
            .iter()
            .all(|m| m.chat_id.as_deref() == Some("chat-1")));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected_before_network() {
        let (queue, api) = recording_queue();
        let result = queue.send(texts(1), "not a user!", None).await;
        assert!(matches!(result, Err(Error::InvalidRecipient(_))));
        assert!(api.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_recipient_is_missing() {
        let (queue, _api) = recording_queue();
        assert!(matches!(
            queue.send(texts(1), "", None).await,
            Err(Error::MissingRecipient)
        ));
    }

    #[tokio::test]
    async fn test_batching_splits_at_limit_preserving_order() {
        let (queue, api) = recording_queue_with_limits(10, 100);
        queue.send(texts(25), "alice", None).await.unwrap();

        let sent = api.sent.lock().unwrap();
        // ceil(25 / 10) calls
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].len(), 10);
        assert_eq!(sent[1].len(), 10);
        assert_eq!(sent[2].len(), 5);

        let bodies: Vec<String> = sent
            .iter()
            .flatten()
            .map(|m| serde_json::to_value(m).unwrap()["body"].as_str().unwrap().to_string())
            .collect();
        let expected: Vec<String> = (0..25).map(|i| format!("m{i}")).collect();
        assert_eq!(bodies, expected);
    }

    #[tokio::test]
    async fn test_same_turn_sends_coalesce_into_one_flush() {
        let (queue, api) = recording_queue();
        let first = queue.send(texts(1), "alice", None);
        let second = queue.send(texts(1), "alice", None);
        let (a, b) = tokio::join!(first, second);
        a.unwrap();
        b.unwrap();

        let sent = api.sent.lock().unwrap();
        // both sends land in a single grouped call
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), 2);
    }

    #[tokio::test]
    async fn test_flush_groups_by_recipient_first_seen_order() {
        let (queue, api) = recording_queue();
        let to_alice = queue.send(texts(1), "alice", None);
        let to_bob = queue.send(texts(1), "bob", None);
        let to_alice_again = queue.send(texts(1), "alice", None);
        let (a, b, c) = tokio::join!(to_alice, to_bob, to_alice_again);
        a.unwrap();
        b.unwrap();
        c.unwrap();

        let sent = api.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].iter().map(|m| m.to.as_str()).collect::<Vec<_>>(), ["alice", "alice"]);
        assert_eq!(sent[1][0].to, "bob");
    }

    #[tokio::test]
    async fn test_failed_flush_rejects_every_waiter() {
        let (queue, api) = recording_queue();
        api.fail_sends
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let first = queue.send(texts(1), "alice", None);
        let second = queue.send(texts(1), "bob", None);
        let (a, b) = tokio::join!(first, second);
        assert!(matches!(a, Err(Error::Api { status: 500 })));
        assert!(matches!(b, Err(Error::Api { status: 500 })));
    }

    #[tokio::test]
    async fn test_lost_batch_task_fails_the_flush() {
        let handle: JoinHandle<Result<()>> =
            tokio::spawn(async { panic!("batch worker died") });
        let result = race_chunk_calls(vec![handle]).await;
        assert!(matches!(result, Err(Error::Batch(_))));
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue_resolves() {
        let (queue, api) = recording_queue();
        queue.flush().await.unwrap();
        assert!(api.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hooks_mutate_messages_before_send() {
        let (queue, api) = recording_queue();
        queue.add_hook(Arc::new(|message: &mut OutgoingMessage| {
            message.message = Message::text("hooked");
        }));

        queue.send(texts(1), "alice", None).await.unwrap();

        let sent = api.sent.lock().unwrap();
        let value = serde_json::to_value(&sent[0][0]).unwrap();
        assert_eq!(value["body"], "hooked");
    }

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let (queue, api) = recording_queue();
        queue.add_hook(Arc::new(|message: &mut OutgoingMessage| {
            if let Message { kind: crate::message::MessageKind::Text { body }, .. } =
                &mut message.message
            {
                body.push('a');
            }
        }));
        queue.add_hook(Arc::new(|message: &mut OutgoingMessage| {
            if let Message { kind: crate::message::MessageKind::Text { body }, .. } =
                &mut message.message
            {
                body.push('b');
            }
        }));

        queue
            .send(vec![Message::text("x-")], "alice", None)
            .await
            .unwrap();

        let sent = api.sent.lock().unwrap();
        let value = serde_json::to_value(&sent[0][0]).unwrap();
        assert_eq!(value["body"], "x-ab");
    }

    #[tokio::test]
    async fn test_broadcast_cross_product_recipient_major() {
        let (queue, api) = recording_queue();
        queue
            .broadcast(texts(2), &["alice".into(), "bob".into()])
            .await
            .unwrap();

        let broadcasts = api.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        let order: Vec<(String, String)> = broadcasts[0]
            .iter()
            .map(|m| {
                let value = serde_json::to_value(m).unwrap();
                (
                    m.to.clone(),
                    value["body"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(
            order,
            [
                ("alice".into(), "m0".into()),
                ("alice".into(), "m1".into()),
                ("bob".into(), "m0".into()),
                ("bob".into(), "m1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_broadcast_chunks_globally() {
        let (queue, api) = recording_queue_with_limits(25, 3);
        queue
            .broadcast(texts(2), &["alice".into(), "bob".into()])
            .await
            .unwrap();

        let broadcasts = api.broadcasts.lock().unwrap();
        // 4 expanded messages at 3 per call
        assert_eq!(broadcasts.len(), 2);
        assert_eq!(broadcasts[0].len(), 3);
        assert_eq!(broadcasts[1].len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_validates_all_recipients_up_front() {
        let (queue, api) = recording_queue();
        let result = queue
            .broadcast(texts(1), &["alice".into(), "bad user".into()])
            .await;
        assert!(matches!(result, Err(Error::InvalidRecipient(_))));
        assert!(api.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_requires_recipients() {
        let (queue, _api) = recording_queue();
        assert!(matches!(
            queue.broadcast(texts(1), &[]).await,
            Err(Error::MissingRecipient)
        ));
    }

    #[test]
    fn test_group_and_chunk_empty() {
        assert!(group_and_chunk(Vec::new(), 25).is_empty());
    }
}
