use std::sync::Arc;
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use property_chat::format::SUGGESTIONS;
use property_chat::session::GREETING_DELAY;
use property_chat::{
    ApiError, ChatLog, ChatSession, PendingQuery, ProcessingGuard, QueryResponse, QueryTransport,
    Submission,
};

use crate::tui::AppEvent;

pub struct App {
    pub should_quit: bool,
    pub session: ChatSession<ChatLog>,
    transport: Arc<dyn QueryTransport>,
    events: UnboundedSender<AppEvent>,
    in_flight: Option<ProcessingGuard>,

    // Chat pane scrolling
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat pane
    pub chat_width: u16,  // inner width, for wrap calculations
    pub chat_total_lines: u16,
    pub follow_tail: bool,
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for typing indicator dots
}

impl App {
    pub fn new(
        session: ChatSession<ChatLog>,
        transport: Arc<dyn QueryTransport>,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            should_quit: false,
            session,
            transport,
            events,
            in_flight: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_total_lines: 0,
            follow_tail: true,
            chat_area: None,
            animation_frame: 0,
        }
    }

    pub fn log(&self) -> &ChatLog {
        self.session.view()
    }

    pub fn log_mut(&mut self) -> &mut ChatLog {
        self.session.view_mut()
    }

    /// Submit whatever is in the input box
    pub fn submit(&mut self) {
        let text = self.log().input.text().to_string();

        match self.session.begin(&text) {
            Submission::Ignored => {}
            Submission::Greeting => self.schedule_greeting(),
            Submission::Query(pending) => self.dispatch(pending),
        }
    }

    /// Fill the input with a canned example and submit it. Suggestions are
    /// only offered on the welcome screen.
    pub fn send_suggestion(&mut self, index: usize) {
        if !self.log().is_welcome_visible() || self.session.is_processing() {
            return;
        }
        if let Some(text) = SUGGESTIONS.get(index) {
            self.log_mut().input.set_text(text);
            self.submit();
        }
    }

    fn schedule_greeting(&self) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(GREETING_DELAY).await;
            let _ = events.send(AppEvent::GreetingDue);
        });
    }

    fn dispatch(&mut self, pending: PendingQuery) {
        let (request, guard) = pending.into_parts();
        self.in_flight = Some(guard);

        let transport = Arc::clone(&self.transport);
        let events = self.events.clone();
        tokio::spawn(async move {
            // Run the request in its own task so a panic still produces a reply
            let task = tokio::spawn(async move { transport.query(&request).await });
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(ApiError::Aborted(e.to_string())),
            };
            let _ = events.send(AppEvent::Reply(result));
        });
    }

    pub fn on_reply(&mut self, result: Result<QueryResponse, ApiError>) {
        match self.in_flight.take() {
            Some(guard) => {
                self.session.finish(guard, result);
            }
            None => warn!("received a reply with no query in flight"),
        }
    }

    pub fn on_greeting_due(&mut self) {
        self.session.deliver_greeting();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.log().has_typing_indicator() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    /// Furthest the chat can scroll, as of the last render
    pub fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    /// Scrolling back to the bottom resumes following new entries
    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
        if self.chat_scroll >= max_scroll {
            self.follow_tail = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use property_chat::format::GREETING_REPLY;
    use property_chat::{QueryRequest, TurnBody, UserId};
    use serde_json::json;
    use tokio::sync::mpsc;

    struct CannedTransport;

    #[async_trait]
    impl QueryTransport for CannedTransport {
        async fn query(&self, _request: &QueryRequest) -> Result<QueryResponse, ApiError> {
            Ok(QueryResponse::from_value(json!({
                "is_count_query": true,
                "response": "We have a total of 5000 properties."
            })))
        }
    }

    struct PanickingTransport;

    #[async_trait]
    impl QueryTransport for PanickingTransport {
        async fn query(&self, _request: &QueryRequest) -> Result<QueryResponse, ApiError> {
            panic!("transport blew up");
        }
    }

    fn app_with(transport: Arc<dyn QueryTransport>) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(UserId::generate(), ChatLog::new());
        (App::new(session, transport, tx), rx)
    }

    #[tokio::test]
    async fn test_suggestion_round_trip() {
        let (mut app, mut rx) = app_with(Arc::new(CannedTransport));

        app.send_suggestion(3);
        assert!(app.session.is_processing());
        assert!(!app.log().input.is_enabled());

        // Enter while waiting does nothing
        app.log_mut().input.set_text("another one");
        app.submit();
        assert_eq!(app.session.query_count(), 1);

        match rx.recv().await {
            Some(AppEvent::Reply(result)) => app.on_reply(result),
            other => panic!("expected a reply, got {:?}", other),
        }

        assert!(!app.session.is_processing());
        assert!(app.log().input.is_enabled());
        let last = app.log().turns().last().unwrap();
        assert_eq!(
            last.body,
            TurnBody::Text("We have a total of 5000 properties.".to_string())
        );
    }

    #[tokio::test]
    async fn test_suggestions_only_from_welcome_screen() {
        let (mut app, mut rx) = app_with(Arc::new(CannedTransport));

        app.send_suggestion(0);
        assert_eq!(app.session.query_count(), 1);

        // In flight: the disabled input keeps its contents
        app.send_suggestion(1);
        assert_eq!(app.log().input.text(), "");

        match rx.recv().await {
            Some(AppEvent::Reply(result)) => app.on_reply(result),
            other => panic!("expected a reply, got {:?}", other),
        }

        // Welcome screen is gone after the first turn
        app.send_suggestion(2);
        assert_eq!(app.session.query_count(), 1);
        assert_eq!(app.log().input.text(), "");
        assert!(!app.session.is_processing());
    }

    #[tokio::test]
    async fn test_panicking_transport_still_releases() {
        let (mut app, mut rx) = app_with(Arc::new(PanickingTransport));

        app.log_mut().input.set_text("villas");
        app.submit();

        match rx.recv().await {
            Some(AppEvent::Reply(result)) => {
                assert!(matches!(result, Err(ApiError::Aborted(_))));
                app.on_reply(result);
            }
            other => panic!("expected a reply, got {:?}", other),
        }

        assert!(!app.session.is_processing());
        assert!(matches!(
            app.log().turns().last().unwrap().body,
            TurnBody::Error(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_greeting_arrives_as_event() {
        let (mut app, mut rx) = app_with(Arc::new(CannedTransport));

        app.log_mut().input.set_text("hello");
        app.submit();
        assert_eq!(app.log().turns().count(), 1);
        assert_eq!(app.log().input.text(), "");

        match rx.recv().await {
            Some(AppEvent::GreetingDue) => app.on_greeting_due(),
            other => panic!("expected greeting, got {:?}", other),
        }

        let last = app.log().turns().last().unwrap();
        assert_eq!(last.body, TurnBody::Text(GREETING_REPLY.to_string()));
        assert_eq!(app.session.query_count(), 0);
    }

    #[test]
    fn test_manual_scroll_stops_following() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let session = ChatSession::new(UserId::generate(), ChatLog::new());
        let mut app = App::new(session, Arc::new(CannedTransport), tx);
        app.chat_total_lines = 30;
        app.chat_height = 20;
        app.chat_scroll = 10;

        app.scroll_up(3);
        assert!(!app.follow_tail);
        assert_eq!(app.chat_scroll, 7);

        app.scroll_down(5);
        assert!(app.follow_tail);
        assert_eq!(app.chat_scroll, 10);
    }
}
