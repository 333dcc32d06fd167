use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::actions::Action;
use crate::stream::AgentError;
use crate::ui::Theme;
use crate::view::{ViewConfig, ViewEvent, ViewState};

/// Recent errors that can be shown with their stack
pub const SHOWN_ERRORS: usize = 3;

/// What the page is showing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Loading,
    /// Terminal state: the agent has no session
    NotFound(String),
    Watching,
}

/// Right-hand pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Code,
    Preview,
}

/// Main application state
pub struct App {
    pub agent_id: String,
    pub phase: Phase,
    pub view: ViewState,
    pub pane: Pane,
    /// Hide older detail-priority thoughts
    pub collapsed_details: bool,
    /// Stack toggles for the shown recent errors
    pub expanded_errors: [bool; SHOWN_ERRORS],
    /// Theme
    pub theme: Theme,
    /// Current message to display (info or error)
    pub error_message: Option<String>,
    /// Pending action queue
    pub pending_actions: Vec<Action>,
    pub landing_url: String,
    dirty: bool,
}

impl App {
    pub fn new(agent_id: &str, view_config: ViewConfig, landing_url: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            phase: Phase::Loading,
            view: ViewState::new(view_config),
            pane: Pane::Code,
            collapsed_details: true,
            expanded_errors: [false; SHOWN_ERRORS],
            theme: Theme::default(),
            error_message: None,
            pending_actions: Vec::new(),
            landing_url: landing_url.to_string(),
            dirty: true,
        }
    }

    /// Take pending actions (drains the queue)
    pub fn take_pending_actions(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.pending_actions)
    }

    /// Whether the screen changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Show a footer message until the next key press
    pub fn set_message(&mut self, msg: impl Into<String>) {
        self.error_message = Some(msg.into());
        self.dirty = true;
    }

    /// The newest recent errors, at most [`SHOWN_ERRORS`], oldest first.
    /// Stack toggles index into this slice.
    pub fn shown_errors(&self) -> &[AgentError] {
        let errors = &self.view.recent_errors;
        &errors[errors.len().saturating_sub(SHOWN_ERRORS)..]
    }

    /// Handle an action and return whether to quit
    pub fn handle_action(&mut self, action: Action) -> Result<bool> {
        if let Action::Tick(now) = action {
            if self.view.is_animating() && self.view.tick(now) {
                self.dirty = true;
            }
            return Ok(false);
        }

        self.dirty = true;
        match action {
            Action::KeyPress(key) => return self.handle_key(key),
            Action::SessionLoaded { session, events } => {
                self.view
                    .apply(ViewEvent::History { session, events }, Instant::now());
                self.phase = Phase::Watching;
            }
            Action::SessionMissing(agent_id) => {
                self.view.teardown();
                self.phase = Phase::NotFound(agent_id);
            }
            Action::Frame(frame) => {
                if self.phase == Phase::Watching {
                    self.view.apply(ViewEvent::Frame(*frame), Instant::now());
                }
            }
            Action::Change(change) => {
                if self.phase == Phase::Watching {
                    self.view.apply(ViewEvent::Change(change), Instant::now());
                }
            }
            Action::CopyActiveFile => self.pending_actions.push(Action::CopyActiveFile),
            Action::Tick(_) => {}
        }
        Ok(false)
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        // Clear message on any key press
        self.error_message = None;

        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Ok(true);
            }
            _ if self.phase != Phase::Watching => {}
            KeyCode::Char('l') | KeyCode::Right => self.view.cycle_active_file(true),
            KeyCode::Char('h') | KeyCode::Left => self.view.cycle_active_file(false),
            KeyCode::Tab => {
                self.pane = match self.pane {
                    Pane::Code => Pane::Preview,
                    Pane::Preview => Pane::Code,
                };
            }
            KeyCode::Char('d') => self.collapsed_details = !self.collapsed_details,
            KeyCode::Char(c @ '1'..='3') => {
                let index = c as usize - '1' as usize;
                if index < self.shown_errors().len() {
                    self.expanded_errors[index] = !self.expanded_errors[index];
                }
            }
            KeyCode::Char('y') => {
                if self.view.active().is_some() {
                    self.pending_actions.push(Action::CopyActiveFile);
                }
            }
            _ => {}
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::StreamFrame;
    use crate::supabase::Session;
    use std::time::Duration;

    fn key(code: KeyCode) -> Action {
        Action::KeyPress(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn frame(json: &str) -> Action {
        Action::Frame(Box::new(StreamFrame::parse(json).unwrap()))
    }

    fn watching_app() -> App {
        let mut app = App::new("nex", ViewConfig::default(), "https://kulti.club/watch");
        app.handle_action(Action::SessionLoaded {
            session: Session::placeholder("nex"),
            events: Vec::new(),
        })
        .unwrap();
        app
    }

    #[test]
    fn test_quit_keys() {
        let mut app = watching_app();
        assert!(app.handle_action(key(KeyCode::Char('q'))).unwrap());
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert!(app.handle_action(Action::KeyPress(ctrl_c)).unwrap());
        assert!(!app.handle_action(key(KeyCode::Char('c'))).unwrap());
    }

    #[test]
    fn test_loading_then_watching() {
        let mut app = App::new("nex", ViewConfig::default(), "");
        assert_eq!(app.phase, Phase::Loading);
        app.handle_action(frame(r#"{"thinking":"early"}"#)).unwrap();
        assert!(app.view.thoughts.is_empty());

        app.handle_action(Action::SessionLoaded {
            session: Session::placeholder("nex"),
            events: Vec::new(),
        })
        .unwrap();
        assert_eq!(app.phase, Phase::Watching);
        app.handle_action(frame(r#"{"thinking":"late"}"#)).unwrap();
        assert_eq!(app.view.thoughts.len(), 1);
    }

    #[test]
    fn test_session_missing_is_terminal() {
        let mut app = App::new("ghost", ViewConfig::default(), "");
        app.handle_action(Action::SessionMissing("ghost".to_string()))
            .unwrap();
        assert_eq!(app.phase, Phase::NotFound("ghost".to_string()));
        app.handle_action(key(KeyCode::Tab)).unwrap();
        assert_eq!(app.pane, Pane::Code);
    }

    #[test]
    fn test_tick_marks_dirty_only_on_progress() {
        let mut app = watching_app();
        app.take_dirty();
        app.handle_action(Action::Tick(Instant::now())).unwrap();
        assert!(!app.take_dirty());

        let t0 = Instant::now();
        app.handle_action(frame(r#"{"thinking":"a b c d"}"#)).unwrap();
        assert!(app.take_dirty());
        app.handle_action(Action::Tick(t0 + Duration::from_secs(5)))
            .unwrap();
        assert!(app.take_dirty());
    }

    #[test]
    fn test_pane_and_details_toggles() {
        let mut app = watching_app();
        assert!(app.collapsed_details);
        app.handle_action(key(KeyCode::Char('d'))).unwrap();
        assert!(!app.collapsed_details);
        app.handle_action(key(KeyCode::Tab)).unwrap();
        assert_eq!(app.pane, Pane::Preview);
        app.handle_action(key(KeyCode::Tab)).unwrap();
        assert_eq!(app.pane, Pane::Code);
    }

    #[test]
    fn test_error_stack_toggles() {
        let mut app = watching_app();
        app.handle_action(key(KeyCode::Char('1'))).unwrap();
        assert_eq!(app.expanded_errors, [false; SHOWN_ERRORS]);

        app.handle_action(frame(
            r#"{"recent_errors":[{"message":"a","stack":"at x"},{"message":"b"}]}"#,
        ))
        .unwrap();
        app.handle_action(key(KeyCode::Char('2'))).unwrap();
        app.handle_action(key(KeyCode::Char('3'))).unwrap();
        assert_eq!(app.expanded_errors, [false, true, false]);
    }

    #[test]
    fn test_error_toggles_follow_newest_errors() {
        let mut app = watching_app();
        app.handle_action(frame(
            r#"{"recent_errors":[{"message":"e1"},{"message":"e2"},{"message":"e3","stack":"at one"},{"message":"e4"},{"message":"e5","stack":"at five"}]}"#,
        ))
        .unwrap();
        let shown: Vec<&str> = app.shown_errors().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(shown, ["e3", "e4", "e5"]);

        app.handle_action(key(KeyCode::Char('1'))).unwrap();
        app.handle_action(key(KeyCode::Char('3'))).unwrap();
        assert_eq!(app.expanded_errors, [true, false, true]);
    }

    #[test]
    fn test_file_navigation_and_copy() {
        let mut app = watching_app();
        app.handle_action(key(KeyCode::Char('y'))).unwrap();
        assert!(app.take_pending_actions().is_empty());

        app.handle_action(frame(r#"{"code":{"filename":"a.ts","content":"one"}}"#))
            .unwrap();
        app.handle_action(frame(r#"{"code":{"filename":"b.ts","content":"two"}}"#))
            .unwrap();
        app.handle_action(key(KeyCode::Left)).unwrap();
        assert_eq!(app.view.active_file.as_deref(), Some("a.ts"));
        assert_eq!(app.view.active().map(|f| f.content.as_str()), Some("one"));

        app.handle_action(key(KeyCode::Char('y'))).unwrap();
        let pending = app.take_pending_actions();
        assert!(matches!(pending.as_slice(), [Action::CopyActiveFile]));
    }

    #[test]
    fn test_key_clears_message() {
        let mut app = watching_app();
        app.set_message("Clipboard error: unavailable");
        assert!(app.error_message.is_some());
        app.handle_action(key(KeyCode::Char('x'))).unwrap();
        assert!(app.error_message.is_none());
    }
}
