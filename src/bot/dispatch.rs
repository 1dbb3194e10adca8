//! # Dispatch Engine
//!
//! Sequential middleware chain for inbound envelopes. Handlers run in
//! registration order; each one either consumes the envelope
//! ([`Flow::Handled`]) or passes it on ([`Flow::Continue`]). Replying
//! finalizes the envelope too, so a handler that replied and still returns
//! `Continue` does not leak the message to later handlers. A chain that
//! runs out of handlers finishes silently.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use regex::Regex;

use crate::message::incoming::Incoming;

/// What a handler decided about an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Pass the envelope to the next handler in the chain.
    Continue,
    /// The envelope is consumed; no later handler sees it.
    Handled,
}

/// One layer of the inbound middleware chain.
///
/// Implemented automatically for `Fn(Incoming) -> impl Future<Output =
/// Flow>` closures, so most bots never name this trait.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, incoming: Incoming) -> Flow;
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Incoming) -> Fut + Send + Sync,
    Fut: Future<Output = Flow> + Send,
{
    async fn handle(&self, incoming: Incoming) -> Flow {
        self(incoming).await
    }
}

/// Text filter applied by [`crate::Bot::on_text_message`].
#[derive(Debug, Clone)]
pub enum TextMatch {
    /// Any text message.
    Any,
    /// Text messages whose body equals the string exactly.
    Exact(String),
    /// Text messages matching the pattern; captures land on the envelope.
    Pattern(Regex),
}

impl From<&str> for TextMatch {
    fn from(body: &str) -> Self {
        TextMatch::Exact(body.to_string())
    }
}

impl From<String> for TextMatch {
    fn from(body: String) -> Self {
        TextMatch::Exact(body)
    }
}

impl From<Regex> for TextMatch {
    fn from(pattern: Regex) -> Self {
        TextMatch::Pattern(pattern)
    }
}

/// Wraps a handler behind an envelope predicate; misses continue the chain.
pub(crate) struct FilterHandler<P, H> {
    accepts: P,
    inner: H,
}

impl<P, H> FilterHandler<P, H> {
    pub(crate) fn new(accepts: P, inner: H) -> Self {
        FilterHandler { accepts, inner }
    }
}

#[async_trait]
impl<P, H> MessageHandler for FilterHandler<P, H>
where
    P: Fn(&Incoming) -> bool + Send + Sync,
    H: MessageHandler,
{
    async fn handle(&self, incoming: Incoming) -> Flow {
        if (self.accepts)(&incoming) {
            self.inner.handle(incoming).await
        } else {
            Flow::Continue
        }
    }
}

/// Wraps a handler behind a [`TextMatch`] filter.
pub(crate) struct TextHandler<H> {
    matcher: TextMatch,
    inner: H,
}

impl<H> TextHandler<H> {
    pub(crate) fn new(matcher: TextMatch, inner: H) -> Self {
        TextHandler { matcher, inner }
    }
}

#[async_trait]
impl<H> MessageHandler for TextHandler<H>
where
    H: MessageHandler,
{
    async fn handle(&self, incoming: Incoming) -> Flow {
        let Some(body) = incoming.body().map(str::to_string) else {
            return Flow::Continue;
        };

        match &self.matcher {
            TextMatch::Any => self.inner.handle(incoming).await,
            TextMatch::Exact(expected) if body == *expected => self.inner.handle(incoming).await,
            TextMatch::Exact(_) => Flow::Continue,
            TextMatch::Pattern(pattern) => match pattern.captures(&body) {
                Some(captures) => {
                    let groups = captures
                        .iter()
                        .map(|group| group.map_or(String::new(), |m| m.as_str().to_string()))
                        .collect();
                    incoming.set_matches(groups);
                    self.inner.handle(incoming).await
                }
                None => Flow::Continue,
            },
        }
    }
}

/// The registered handler chain.
#[derive(Default)]
pub(crate) struct DispatchStack {
    layers: Vec<Arc<dyn MessageHandler>>,
}

impl DispatchStack {
    pub(crate) fn push(&mut self, handler: Arc<dyn MessageHandler>) {
        self.layers.push(handler);
    }

    /// Run one envelope through the chain.
    ///
    /// Strictly sequential: each handler completes before the next starts.
    /// Handler failures are the handler author's concern; the chain only
    /// reacts to the returned [`Flow`] and the envelope's finish flag.
    pub(crate) async fn dispatch(&self, incoming: Incoming) {
        debug!(
            "dispatching {} message from {}",
            incoming.kind().name(),
            incoming.from()
        );

        for layer in &self.layers {
            if incoming.is_finished() {
                return;
            }
            if layer.handle(incoming.clone()).await == Flow::Handled {
                incoming.finish();
                return;
            }
        }

        incoming.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::bot::outbound::tests::recording_queue;
    use crate::message::incoming::IncomingWire;

    fn text_incoming(body: &str) -> Incoming {
        let wire: IncomingWire = serde_json::from_value(serde_json::json!({
            "type": "text",
            "body": body,
            "from": "alice",
        }))
        .unwrap();
        Incoming::new(wire, recording_queue().0)
    }

    fn picture_incoming() -> Incoming {
        let wire: IncomingWire = serde_json::from_value(serde_json::json!({
            "type": "picture",
            "picUrl": "https://example.org/p.png",
            "from": "alice",
        }))
        .unwrap();
        Incoming::new(wire, recording_queue().0)
    }

    fn counting_handler(
        hits: Arc<AtomicUsize>,
        flow: Flow,
    ) -> impl Fn(Incoming) -> std::future::Ready<Flow> + Send + Sync {
        move |_incoming| {
            hits.fetch_add(1, Ordering::SeqCst);
            std::future::ready(flow)
        }
    }

    #[tokio::test]
    async fn test_handled_short_circuits_chain() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut stack = DispatchStack::default();
        stack.push(Arc::new(counting_handler(first.clone(), Flow::Handled)));
        stack.push(Arc::new(counting_handler(second.clone(), Flow::Continue)));

        stack.dispatch(text_incoming("hi")).await;

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_continue_advances_in_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut stack = DispatchStack::default();
        for tag in ["a", "b", "c"] {
            let order = order.clone();
            stack.push(Arc::new(move |_incoming: Incoming| {
                order.lock().unwrap().push(tag);
                std::future::ready(Flow::Continue)
            }));
        }

        stack.dispatch(text_incoming("hi")).await;
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_ignore_stops_later_handlers() {
        let later = Arc::new(AtomicUsize::new(0));

        let mut stack = DispatchStack::default();
        stack.push(Arc::new(|incoming: Incoming| async move {
            incoming.ignore();
            Flow::Continue
        }));
        stack.push(Arc::new(counting_handler(later.clone(), Flow::Continue)));

        stack.dispatch(text_incoming("hi")).await;
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_text_filter_exact_match() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut stack = DispatchStack::default();
        stack.push(Arc::new(TextHandler::new(
            TextMatch::from("hi"),
            counting_handler(hits.clone(), Flow::Handled),
        )));

        stack.dispatch(text_incoming("hi")).await;
        stack.dispatch(text_incoming("hello")).await;
        stack.dispatch(picture_incoming()).await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_filter_pattern_and_captures() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut stack = DispatchStack::default();
        let recorder = seen.clone();
        stack.push(Arc::new(TextHandler::new(
            TextMatch::Pattern(Regex::new(r"(?i)^(hi|hello)$").unwrap()),
            move |incoming: Incoming| {
                recorder.lock().unwrap().push(incoming.matches());
                std::future::ready(Flow::Handled)
            },
        )));

        stack.dispatch(text_incoming("Hi")).await;
        stack.dispatch(text_incoming("hello")).await;
        stack.dispatch(text_incoming("goodbye")).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], vec!["Hi".to_string(), "Hi".to_string()]);
        assert_eq!(seen[1], vec!["hello".to_string(), "hello".to_string()]);
    }

    #[tokio::test]
    async fn test_type_filter_passes_mismatches_through() {
        let text_hits = Arc::new(AtomicUsize::new(0));
        let picture_hits = Arc::new(AtomicUsize::new(0));

        let mut stack = DispatchStack::default();
        stack.push(Arc::new(FilterHandler::new(
            Incoming::is_text_message,
            counting_handler(text_hits.clone(), Flow::Handled),
        )));
        stack.push(Arc::new(FilterHandler::new(
            Incoming::is_picture_message,
            counting_handler(picture_hits.clone(), Flow::Handled),
        )));

        stack.dispatch(picture_incoming()).await;

        assert_eq!(text_hits.load(Ordering::SeqCst), 0);
        assert_eq!(picture_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_finish_is_one_shot() {
        let incoming = text_incoming("hi");
        assert!(incoming.finish());
        assert!(!incoming.finish());
        assert!(incoming.is_finished());
    }
}
