//! Conversation state manager — owns the transcript and the input buffer,
//! and schedules the delayed bot reply for every accepted submission.
//!
//! # Deferred replies
//!
//! Each accepted submission spawns one task on the manager's [`TaskTracker`].
//! The task sleeps for the reply delay and then appends the bot message to
//! whatever the conversation has become by then; it never works from a
//! snapshot taken at submit time. Several replies can be in flight at once.
//!
//! # Lifetime
//!
//! All reply tasks watch the manager's [`CancellationToken`].
//! [`ConversationManager::teardown`] (or dropping the manager) cancels it, and
//! any reply that has not fired yet is discarded without touching the
//! transcript.
//!
//! # Render surface
//!
//! Every state change publishes a fresh [`Snapshot`] on a `watch` channel;
//! render surfaces get a receiver from [`ConversationManager::subscribe`].
//!
//! All mutating operations are synchronous and must be called from inside a
//! Tokio runtime, since accepted submissions spawn their reply task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::config::ConversationConfig;
use crate::reply::{self, ProviderError, ReplyProvider};

use super::{Conversation, IdGenerator, Key, is_blank, Message, MessageId, Sender, Snapshot, UiEvent};

// ── SubmitOutcome ────────────────────────────────────────────────────────────

/// What a submit attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A user message was appended and its reply scheduled.
    Accepted { id: MessageId },
    /// Empty or whitespace-only input; nothing changed.
    Ignored,
    /// The manager has been torn down; nothing changed.
    Closed,
}

// ── State ────────────────────────────────────────────────────────────────────

struct State {
    conversation: Conversation,
    ids: IdGenerator,
    /// Shared copy of the transcript handed out in snapshots; rebuilt only
    /// when a message is appended, not on buffer edits.
    published: Arc<[Message]>,
    input_buffer: String,
    pending_replies: usize,
}

impl State {
    fn new(conversation: Conversation, ids: IdGenerator) -> Self {
        let published = Arc::from(conversation.messages());
        Self { conversation, ids, published, input_buffer: String::new(), pending_replies: 0 }
    }

    fn append(&mut self, sender: Sender, text: String) -> MessageId {
        let id = self.conversation.push(&mut self.ids, sender, text);
        self.published = Arc::from(self.conversation.messages());
        id
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            messages: Arc::clone(&self.published),
            input_buffer: self.input_buffer.clone(),
            pending_replies: self.pending_replies,
        }
    }
}

struct Inner {
    state: Mutex<State>,
    snapshot_tx: watch::Sender<Snapshot>,
    provider: ReplyProvider,
    reply_delay: Duration,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // State is only touched in short synchronous sections; a panic in one
        // cannot leave it half-written, so keep using it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.snapshot_tx.send_replace(state.snapshot());
    }

    /// Deferred reply completion: append to the current transcript, unless
    /// teardown won the race for the lock.
    fn append_reply(&self, text: String) -> Option<MessageId> {
        let mut state = self.lock();
        let id = if self.shutdown.is_cancelled() {
            None
        } else {
            Some(state.append(Sender::Bot, text))
        };
        state.pending_replies = state.pending_replies.saturating_sub(1);
        self.publish(&state);
        id
    }

    fn drop_reply(&self) {
        let mut state = self.lock();
        state.pending_replies = state.pending_replies.saturating_sub(1);
        self.publish(&state);
    }

    /// Cancel under the state lock, so a concurrent `submit` either finishes
    /// before teardown or observes it.
    fn close(&self) {
        let _state = self.lock();
        self.shutdown.cancel();
        self.tracker.close();
    }
}

// ── ConversationManager ──────────────────────────────────────────────────────

/// The single owner of a conversation. Share it behind an `Arc` when several
/// tasks need to feed it events.
pub struct ConversationManager {
    inner: Arc<Inner>,
}

impl ConversationManager {
    /// Create a manager seeded with the configured greeting.
    pub fn new(config: &ConversationConfig) -> Result<Self, ProviderError> {
        let provider = reply::providers::build(config)?;
        Ok(Self::with_provider(&config.greeting, provider, config.reply_delay))
    }

    /// Create a manager from explicit parts.
    pub fn with_provider(greeting: &str, provider: ReplyProvider, reply_delay: Duration) -> Self {
        let mut ids = IdGenerator::new();
        let conversation = Conversation::seeded(&mut ids, greeting);
        let state = State::new(conversation, ids);
        let (snapshot_tx, _) = watch::channel(state.snapshot());

        debug!(provider = provider.name(), ?reply_delay, "conversation mounted");

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                snapshot_tx,
                provider,
                reply_delay,
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    // ── operations ───────────────────────────────────────────────────────────

    /// Submit `raw_text` as a user message.
    ///
    /// Whitespace-only input is ignored and leaves the buffer untouched.
    /// Accepted text is stored exactly as given, the input buffer is cleared,
    /// and a bot reply is scheduled after the reply delay.
    pub fn submit(&self, raw_text: &str) -> SubmitOutcome {
        if self.inner.shutdown.is_cancelled() {
            debug!("submit after teardown ignored");
            return SubmitOutcome::Closed;
        }
        if is_blank(raw_text) {
            trace!("blank submit ignored");
            return SubmitOutcome::Ignored;
        }

        let mut state = self.inner.lock();
        if self.inner.shutdown.is_cancelled() {
            debug!("submit raced teardown, ignored");
            return SubmitOutcome::Closed;
        }
        let id = state.append(Sender::User, raw_text.to_string());
        state.input_buffer.clear();
        state.pending_replies += 1;
        self.inner.publish(&state);
        // Spawned before the lock is released so teardown's `wait` covers it.
        self.schedule_reply(id, raw_text.to_string());
        drop(state);

        info!(message_id = %id, "user message accepted");
        SubmitOutcome::Accepted { id }
    }

    /// Replace the input buffer with `text`, unvalidated.
    pub fn update_input_buffer(&self, text: impl Into<String>) {
        let mut state = self.inner.lock();
        state.input_buffer = text.into();
        self.inner.publish(&state);
    }

    /// Submit the current input buffer if `key` is the commit key.
    pub fn handle_submit_key(&self, key: &Key) -> Option<SubmitOutcome> {
        if !key.is_commit() {
            return None;
        }
        Some(self.submit_input_buffer())
    }

    /// Submit the current input buffer (the "Send" button).
    pub fn submit_input_buffer(&self) -> SubmitOutcome {
        let buffer = self.inner.lock().input_buffer.clone();
        self.submit(&buffer)
    }

    /// Route a raw render-surface event to the matching operation.
    pub fn dispatch(&self, event: UiEvent) -> Option<SubmitOutcome> {
        match event {
            UiEvent::TextChanged(text) => {
                self.update_input_buffer(text);
                None
            }
            UiEvent::KeyPressed(key) => self.handle_submit_key(&key),
            UiEvent::SendClicked => Some(self.submit_input_buffer()),
        }
    }

    // ── accessors ────────────────────────────────────────────────────────────

    /// Receiver that sees a new [`Snapshot`] after every state change.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.lock().conversation.messages().to_vec()
    }

    pub fn input_buffer(&self) -> String {
        self.inner.lock().input_buffer.clone()
    }

    /// Number of bot replies scheduled but not yet appended.
    pub fn pending_replies(&self) -> usize {
        self.inner.lock().pending_replies
    }

    pub fn reply_delay(&self) -> Duration {
        self.inner.reply_delay
    }

    /// Wait until no reply is in flight.
    pub async fn settled(&self) {
        let mut rx = self.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|s| s.pending_replies == 0).await;
    }

    // ── lifetime ─────────────────────────────────────────────────────────────

    /// Cancel every pending reply and wait for their tasks to exit.
    /// Later submissions return [`SubmitOutcome::Closed`]. Idempotent.
    pub async fn teardown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            info!(pending = self.pending_replies(), "conversation torn down");
        }
        self.inner.close();
        self.inner.tracker.wait().await;
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    fn schedule_reply(&self, for_id: MessageId, user_text: String) {
        let inner = Arc::clone(&self.inner);
        let delay = self.inner.reply_delay;
        self.inner.tracker.spawn(async move {
            tokio::select! {
                biased;

                _ = inner.shutdown.cancelled() => {
                    debug!(for_message = %for_id, "pending reply cancelled");
                    inner.drop_reply();
                }

                _ = tokio::time::sleep(delay) => {
                    let text = inner.provider.reply_to(&user_text);
                    match inner.append_reply(text) {
                        Some(id) => debug!(for_message = %for_id, message_id = %id, "bot reply appended"),
                        None => debug!(for_message = %for_id, "reply fired after teardown, dropped"),
                    }
                }
            }
        });
    }
}

impl Drop for ConversationManager {
    fn drop(&mut self) {
        self.inner.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::conversation::{DEFAULT_GREETING, DEFAULT_REPLY_TEXT};

    fn manager() -> ConversationManager {
        ConversationManager::new(&ConversationConfig::default()).unwrap()
    }

    fn summary(m: &ConversationManager) -> Vec<(Sender, String)> {
        m.messages().into_iter().map(|m| (m.sender, m.text)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn seed_is_single_bot_greeting() {
        let m = manager();
        let messages = m.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender, Sender::Bot);
        assert_eq!(messages[0].text, DEFAULT_GREETING);
        assert_eq!(m.input_buffer(), "");
        assert_eq!(m.pending_replies(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn submit_appends_exact_text_and_clears_buffer() {
        let m = manager();
        m.update_input_buffer("  hello there ");
        let outcome = m.submit_input_buffer();

        assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
        let messages = m.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(messages[1].text, "  hello there ");
        assert_eq!(m.input_buffer(), "");
        assert_eq!(m.pending_replies(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_submit_is_noop() {
        let m = manager();
        m.update_input_buffer("   \t ");
        assert_eq!(m.submit_input_buffer(), SubmitOutcome::Ignored);
        assert_eq!(m.submit(""), SubmitOutcome::Ignored);
        assert_eq!(m.messages().len(), 1);
        assert_eq!(m.input_buffer(), "   \t ");
        assert_eq!(m.pending_replies(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_arrives_after_delay() {
        let m = manager();
        m.submit("Hi");

        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(m.messages().len(), 2, "reply must not arrive early");

        tokio::time::sleep(Duration::from_millis(2)).await;
        let last = m.messages().pop().unwrap();
        assert_eq!(last.sender, Sender::Bot);
        assert_eq!(last.text, DEFAULT_REPLY_TEXT);
        assert_eq!(m.pending_replies(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_submissions_each_get_a_reply() {
        let m = manager();
        m.submit("A");
        m.submit("B");

        assert_eq!(
            summary(&m),
            vec![
                (Sender::Bot, DEFAULT_GREETING.to_string()),
                (Sender::User, "A".to_string()),
                (Sender::User, "B".to_string()),
            ]
        );
        assert_eq!(m.pending_replies(), 2);

        m.settled().await;

        assert_eq!(
            summary(&m),
            vec![
                (Sender::Bot, DEFAULT_GREETING.to_string()),
                (Sender::User, "A".to_string()),
                (Sender::User, "B".to_string()),
                (Sender::Bot, DEFAULT_REPLY_TEXT.to_string()),
                (Sender::Bot, DEFAULT_REPLY_TEXT.to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reply_appends_to_current_state() {
        let m = manager();
        m.submit("first");
        tokio::time::sleep(Duration::from_millis(500)).await;
        m.submit("second");
        tokio::time::sleep(Duration::from_millis(600)).await;

        // first reply lands after "second", not on a stale copy without it
        let texts: Vec<String> = m.messages().into_iter().map(|m| m.text).collect();
        assert_eq!(texts[1..], ["first", "second", DEFAULT_REPLY_TEXT]);

        m.settled().await;
        assert_eq!(m.messages().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn ids_are_unique_across_all_messages() {
        let m = manager();
        for text in ["a", "b", "c"] {
            m.submit(text);
        }
        m.settled().await;
        m.submit("d");
        m.settled().await;

        let ids: HashSet<MessageId> = m.messages().iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), m.messages().len());
        assert_eq!(ids.len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn enter_submits_other_keys_do_not() {
        let m = manager();
        m.update_input_buffer("typed");

        assert_eq!(m.handle_submit_key(&Key::from_name("a")), None);
        assert_eq!(m.messages().len(), 1);
        assert_eq!(m.input_buffer(), "typed");

        let outcome = m.handle_submit_key(&Key::Enter);
        assert!(matches!(outcome, Some(SubmitOutcome::Accepted { .. })));
        assert_eq!(m.messages()[1].text, "typed");
        assert_eq!(m.input_buffer(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_routes_ui_events() {
        let m = manager();
        assert_eq!(m.dispatch(UiEvent::TextChanged("hey".into())), None);
        assert_eq!(m.input_buffer(), "hey");
        assert!(matches!(
            m.dispatch(UiEvent::SendClicked),
            Some(SubmitOutcome::Accepted { .. })
        ));
        assert_eq!(
            m.dispatch(UiEvent::KeyPressed(Key::Enter)),
            Some(SubmitOutcome::Ignored)
        );
        assert_eq!(m.messages().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_drops_pending_replies() {
        let m = manager();
        m.submit("bye");
        tokio::time::sleep(Duration::from_millis(400)).await;
        m.teardown().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        let messages = m.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sender, Sender::User);
        assert_eq!(m.pending_replies(), 0);
        assert!(m.is_torn_down());
        assert_eq!(m.submit("again"), SubmitOutcome::Closed);

        // second teardown is a no-op
        m.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_publishes_idle_snapshot() {
        let m = manager();
        let rx = m.subscribe();
        m.submit("bye");
        m.submit("again");
        assert!(rx.borrow().is_awaiting_reply());

        m.teardown().await;

        assert_eq!(rx.borrow().pending_replies, 0);
        assert!(!rx.borrow().is_awaiting_reply());
        let settled = tokio::time::timeout(Duration::from_secs(60), m.settled()).await;
        assert!(settled.is_ok(), "settled() must return once replies are cancelled");
    }

    #[tokio::test(start_paused = true)]
    async fn blank_check_follows_browser_trim() {
        let m = manager();
        assert_eq!(m.submit("\u{FEFF}"), SubmitOutcome::Ignored);
        assert_eq!(m.submit(" \u{00A0}\u{3000}\n"), SubmitOutcome::Ignored);
        assert_eq!(m.messages().len(), 1);

        assert!(matches!(m.submit("\u{0085}"), SubmitOutcome::Accepted { .. }));
        assert_eq!(m.messages()[1].text, "\u{0085}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn submit_racing_teardown_never_appends_after_it() {
        let m = Arc::new(manager());
        let submitter = {
            let m = Arc::clone(&m);
            tokio::spawn(async move {
                let mut accepted = 0usize;
                loop {
                    match m.submit("spam") {
                        SubmitOutcome::Accepted { .. } => accepted += 1,
                        SubmitOutcome::Closed => return accepted,
                        SubmitOutcome::Ignored => unreachable!(),
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        m.teardown().await;
        let len_at_teardown = m.messages().len();
        let accepted = submitter.await.unwrap();

        assert_eq!(m.messages().len(), len_at_teardown);
        let users = m.messages().iter().filter(|msg| msg.sender == Sender::User).count();
        assert_eq!(users, accepted);
        assert_eq!(m.pending_replies(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn buffer_edits_share_the_transcript() {
        let m = manager();
        let before = m.snapshot();
        m.update_input_buffer("typing");
        let after = m.snapshot();
        assert!(Arc::ptr_eq(&before.messages, &after.messages));

        m.submit_input_buffer();
        assert!(!Arc::ptr_eq(&after.messages, &m.snapshot().messages));
        assert_eq!(m.snapshot().messages.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_every_change() {
        let m = manager();
        let mut rx = m.subscribe();

        m.update_input_buffer("x");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().input_buffer, "x");

        m.submit_input_buffer();
        rx.changed().await.unwrap();
        {
            let snap = rx.borrow_and_update();
            assert_eq!(snap.messages.len(), 2);
            assert!(snap.is_awaiting_reply());
        }

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update();
        assert_eq!(snap.messages.len(), 3);
        assert!(!snap.is_awaiting_reply());
    }

    #[tokio::test(start_paused = true)]
    async fn custom_delay_and_text() {
        let config = ConversationConfig {
            reply_text: "ack".into(),
            reply_delay: Duration::from_millis(10),
            ..ConversationConfig::default()
        };
        let m = ConversationManager::new(&config).unwrap();
        assert_eq!(m.reply_delay(), Duration::from_millis(10));
        m.submit("ping");
        tokio::time::sleep(Duration::from_millis(11)).await;
        assert_eq!(m.messages().pop().unwrap().text, "ack");
    }
}
