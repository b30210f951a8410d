//! The [`MessageBoard`]: ordered transcript storage plus live notification.

use chronicle_types::{Message, SubscriberId};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::SubscriberError;

/// Callback invoked once per posted message, in registration order.
pub type SubscriberFn = Box<dyn Fn(&Message) -> Result<(), SubscriberError> + Send + Sync>;

/// State behind the board's lock: the transcript and its observers.
///
/// Subscribers are kept in a `Vec` rather than a map because notification
/// order must match registration order exactly.
struct BoardInner {
    messages: Vec<Message>,
    subscribers: Vec<(SubscriberId, SubscriberFn)>,
}

/// Concurrency-safe, append-only transcript of the session.
///
/// All access goes through one async [`Mutex`]; `post` holds it across both
/// the append and the subscriber sweep so concurrent readers always observe
/// a prefix of the append order and notifications never interleave.
pub struct MessageBoard {
    inner: Mutex<BoardInner>,
}

impl MessageBoard {
    /// Create an empty board with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BoardInner {
                messages: Vec::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Append a message and notify every subscriber, in registration order.
    ///
    /// A subscriber returning an error is logged via `warn!` and skipped;
    /// the append itself and the remaining notifications are unaffected.
    pub async fn post(&self, message: Message) {
        let mut inner = self.inner.lock().await;
        inner.messages.push(message);

        let Some(posted) = inner.messages.last() else {
            return;
        };

        for (id, callback) in &inner.subscribers {
            if let Err(e) = callback(posted) {
                warn!(
                    subscriber_id = %id,
                    author = posted.author,
                    error = %e,
                    "subscriber notification failed, continuing"
                );
            }
        }
    }

    /// Return the last `n` messages in append order.
    ///
    /// `n` larger than the transcript is clamped; the result is a copy and
    /// never mutates the board.
    pub async fn get_recent(&self, n: usize) -> Vec<Message> {
        let inner = self.inner.lock().await;
        let start = inner.messages.len().saturating_sub(n);
        inner
            .messages
            .get(start..)
            .map(<[Message]>::to_vec)
            .unwrap_or_default()
    }

    /// Render the last `max_messages` messages as `[author]: text` lines.
    ///
    /// This is the context block used to prime responder prompts with what
    /// the rest of the table just said.
    pub async fn get_context_window(&self, max_messages: usize) -> String {
        let inner = self.inner.lock().await;
        let start = inner.messages.len().saturating_sub(max_messages);
        inner
            .messages
            .get(start..)
            .unwrap_or_default()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Register a callback for every subsequently posted message.
    ///
    /// Returns the ID needed to unsubscribe. Callbacks run under the board
    /// lock; keep them short and non-blocking (hand off to a channel for
    /// anything slow).
    pub async fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&Message) -> Result<(), SubscriberError> + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        let mut inner = self.inner.lock().await;
        inner.subscribers.push((id, Box::new(callback)));
        debug!(subscriber_id = %id, "subscriber registered");
        id
    }

    /// Remove a subscriber. Removing an unknown or already-removed ID is a
    /// no-op; returns whether anything was removed.
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut inner = self.inner.lock().await;
        let before = inner.subscribers.len();
        inner.subscribers.retain(|(sub_id, _)| *sub_id != id);
        let removed = inner.subscribers.len() < before;
        if removed {
            debug!(subscriber_id = %id, "subscriber removed");
        }
        removed
    }

    /// Number of messages currently on the board.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.messages.len()
    }

    /// Whether the board holds no messages.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.messages.is_empty()
    }

    /// Remove every message. Subscribers stay registered.
    pub async fn clear(&self) {
        self.inner.lock().await.messages.clear();
    }
}

impl Default for MessageBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use chronicle_types::MessageKind;

    use super::*;

    #[tokio::test]
    async fn post_preserves_append_order() {
        let board = MessageBoard::new();
        board.post(Message::reply("Narrator", "Welcome to the adventure!")).await;
        board.post(Message::reply("Thorin", "Hello! I look around.")).await;
        board.post(Message::reply("Elara", "I draw my sword.")).await;

        let recent = board.get_recent(10).await;
        let authors: Vec<&str> = recent.iter().map(|m| m.author.as_str()).collect();
        assert_eq!(authors, vec!["Narrator", "Thorin", "Elara"]);
    }

    #[tokio::test]
    async fn get_recent_clamps_and_takes_tail() {
        let board = MessageBoard::new();
        for i in 0..5 {
            board.post(Message::reply("Narrator", format!("line {i}"))).await;
        }

        let tail = board.get_recent(2).await;
        assert_eq!(tail.len(), 2);
        assert_eq!(tail.first().map(|m| m.text.as_str()), Some("line 3"));

        let all = board.get_recent(50).await;
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn context_window_renders_author_lines() {
        let board = MessageBoard::new();
        board.post(Message::reply("Narrator", "You see a chest.")).await;
        board.post(Message::reply("Kira", "I check it for traps.")).await;

        let context = board.get_context_window(2).await;
        assert_eq!(
            context,
            "[Narrator]: You see a chest.\n[Kira]: I check it for traps."
        );
    }

    #[tokio::test]
    async fn subscriber_receives_each_post() {
        let board = MessageBoard::new();
        let seen: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        board
            .subscribe(move |msg| {
                sink.lock()
                    .map_err(|_| SubscriberError::new("poisoned"))?
                    .push(msg.author.clone());
                Ok(())
            })
            .await;

        board.post(Message::system("Test message")).await;

        let authors = seen.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(authors.as_slice(), ["System"]);
    }

    #[tokio::test]
    async fn failing_subscriber_never_blocks_append_or_later_subscribers() {
        let board = MessageBoard::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        board
            .subscribe(|_msg| Err(SubscriberError::new("always down")))
            .await;
        let counter = Arc::clone(&delivered);
        board
            .subscribe(move |_msg| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        board.post(Message::reply("Narrator", "still standing")).await;

        assert_eq!(board.len().await, 1, "append must survive a failing subscriber");
        assert_eq!(
            delivered.load(Ordering::SeqCst),
            1,
            "later subscribers must still be notified"
        );
    }

    #[tokio::test]
    async fn unsubscribe_is_idempotent() {
        let board = MessageBoard::new();
        let id = board.subscribe(|_msg| Ok(())).await;

        assert!(board.unsubscribe(id).await);
        assert!(!board.unsubscribe(id).await, "second removal is a no-op");
    }

    #[tokio::test]
    async fn concurrent_posts_all_land() {
        let board = Arc::new(MessageBoard::new());

        let mut handles = Vec::new();
        for i in 0..16 {
            let board = Arc::clone(&board);
            handles.push(tokio::spawn(async move {
                board.post(Message::reply("Narrator", format!("burst {i}"))).await;
            }));
        }
        for handle in handles {
            handle.await.ok();
        }

        assert_eq!(board.len().await, 16);
        // Every reader sees a prefix of one global order; after the joins,
        // that prefix is the whole sequence.
        let all = board.get_recent(100).await;
        assert!(all.iter().all(|m| m.kind == MessageKind::Reply));
    }

    #[tokio::test]
    async fn clear_empties_transcript_but_keeps_subscribers() {
        let board = MessageBoard::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        board
            .subscribe(move |_msg| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        board.post(Message::system("before clear")).await;
        board.clear().await;
        assert!(board.is_empty().await);
        assert!(board.get_recent(50).await.is_empty());

        board.post(Message::system("after clear")).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }
}
