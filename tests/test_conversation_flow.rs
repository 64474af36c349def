//! End-to-end conversation flow driven through UI events, plus a check that
//! the shipped config file loads.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use ui_chatbot::config::{self, Overrides, RenderFormat};
use ui_chatbot::conversation::{
    ConversationManager, DEFAULT_GREETING, DEFAULT_REPLY_TEXT, Key, Sender, SubmitOutcome, UiEvent,
};

fn mount() -> ConversationManager {
    let config = config::load_from(Path::new("config/default.toml"), Overrides::default())
        .expect("shipped config must load");
    ConversationManager::new(&config.conversation).expect("canned provider")
}

fn type_and_enter(m: &ConversationManager, text: &str) -> Option<SubmitOutcome> {
    m.dispatch(UiEvent::TextChanged(text.to_string()));
    m.dispatch(UiEvent::KeyPressed(Key::Enter))
}

#[test]
fn shipped_config_matches_defaults() {
    let cfg = config::load_from(Path::new("config/default.toml"), Overrides::default()).unwrap();
    assert_eq!(cfg.conversation.greeting, DEFAULT_GREETING);
    assert_eq!(cfg.conversation.reply_text, DEFAULT_REPLY_TEXT);
    assert_eq!(cfg.conversation.reply_delay, Duration::from_millis(1000));
    assert_eq!(cfg.comms.pty.format, RenderFormat::Text);
}

#[tokio::test(start_paused = true)]
async fn hi_gets_the_canned_reply() {
    let m = mount();
    assert!(matches!(type_and_enter(&m, "Hi"), Some(SubmitOutcome::Accepted { .. })));
    assert_eq!(m.input_buffer(), "");

    tokio::time::sleep(Duration::from_millis(1001)).await;

    let last = m.messages().pop().unwrap();
    assert_eq!(last.sender, Sender::Bot);
    assert_eq!(
        last.text,
        "I'm a UI-only chatbot, so I can't actually respond meaningfully, but your message was received!"
    );
}

#[tokio::test(start_paused = true)]
async fn two_rapid_messages_then_two_replies() {
    let m = mount();
    type_and_enter(&m, "A");
    type_and_enter(&m, "B");

    let shape = |m: &ConversationManager| -> Vec<(Sender, String)> {
        m.messages().into_iter().map(|m| (m.sender, m.text)).collect()
    };

    assert_eq!(
        shape(&m),
        [
            (Sender::Bot, DEFAULT_GREETING.to_string()),
            (Sender::User, "A".to_string()),
            (Sender::User, "B".to_string()),
        ]
    );

    tokio::time::sleep(Duration::from_millis(1001)).await;

    assert_eq!(
        shape(&m),
        [
            (Sender::Bot, DEFAULT_GREETING.to_string()),
            (Sender::User, "A".to_string()),
            (Sender::User, "B".to_string()),
            (Sender::Bot, DEFAULT_REPLY_TEXT.to_string()),
            (Sender::Bot, DEFAULT_REPLY_TEXT.to_string()),
        ]
    );

    let ids: HashSet<_> = m.messages().iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn whitespace_entry_changes_nothing() {
    let m = mount();
    assert_eq!(type_and_enter(&m, "  \t"), Some(SubmitOutcome::Ignored));
    assert_eq!(m.messages().len(), 1);
    assert_eq!(m.input_buffer(), "  \t");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(m.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unmount_before_reply_drops_it() {
    let m = mount();
    let rx = m.subscribe();
    type_and_enter(&m, "leaving");
    m.teardown().await;
    assert!(!rx.borrow().is_awaiting_reply());
    m.settled().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    let senders: Vec<Sender> = m.messages().iter().map(|m| m.sender).collect();
    assert_eq!(senders, [Sender::Bot, Sender::User]);
}
