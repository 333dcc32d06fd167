use std::time::Instant;

use crossterm::event::KeyEvent;

use crate::stream::StreamFrame;
use crate::supabase::{ChangeEvent, EventRecord, Session};

/// Actions that can be dispatched through the application
#[derive(Debug, Clone)]
pub enum Action {
    /// A key was pressed
    KeyPress(KeyEvent),
    /// Animation clock
    Tick(Instant),
    /// Session row and history arrived
    SessionLoaded {
        session: Session,
        events: Vec<EventRecord>,
    },
    /// No session exists for the agent
    SessionMissing(String),
    /// A frame from the live stream socket
    Frame(Box<StreamFrame>),
    /// A row change from the realtime feed
    Change(ChangeEvent),
    /// Copy the active file to the clipboard
    CopyActiveFile,
}
