//! View state for one watched agent.
//!
//! [`ViewState::apply`] is the single entry point for everything the viewer
//! learns: the history replay, live socket frames and realtime row changes.
//! [`ViewState::tick`] advances the typing animations.

mod files;
mod thoughts;
mod typing;

pub use files::{
    classify_diff_line, diff_filename, language_for, render_diff_text, CodeFile, DiffLine,
    FileAction, FileMap,
};
pub use thoughts::{
    ThoughtBlock, ThoughtKind, ThoughtLog, ThoughtMetadata, ThoughtPriority, DEFAULT_THOUGHT_CAP,
};
pub use typing::{RevealUnit, RevealUpdate, TypingPolicy, TypingSpeed, Typewriter};

use std::time::Instant;

use chrono::Utc;
use tracing::debug;

use crate::stream::{AgentError, Goal, Milestone, StreamFrame, ThoughtPayload};
use crate::supabase::{ChangeEvent, EventKind, EventRecord, Session, SessionStatus};

/// Tunables for the view reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewConfig {
    pub thought_cap: usize,
    pub code_speed: TypingSpeed,
    pub thought_speed: TypingSpeed,
    pub code_policy: TypingPolicy,
    pub thought_policy: TypingPolicy,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            thought_cap: DEFAULT_THOUGHT_CAP,
            code_speed: TypingSpeed::CODE,
            thought_speed: TypingSpeed::THOUGHT,
            code_policy: TypingPolicy::Supersede,
            thought_policy: TypingPolicy::Concurrent,
        }
    }
}

/// Everything that can change the view
#[derive(Debug, Clone)]
pub enum ViewEvent {
    /// Session row plus its most recent events, newest first
    History {
        session: Session,
        events: Vec<EventRecord>,
    },
    Frame(StreamFrame),
    Change(ChangeEvent),
}

pub struct ViewState {
    pub session: Option<Session>,
    pub files: FileMap,
    pub active_file: Option<String>,
    pub thoughts: ThoughtLog,
    pub goal: Option<Goal>,
    pub milestones: Vec<Milestone>,
    pub recent_errors: Vec<AgentError>,
    code_typer: Typewriter,
    thought_typer: Typewriter,
    local_ids: u64,
}

impl ViewState {
    pub fn new(config: ViewConfig) -> Self {
        Self {
            session: None,
            files: FileMap::default(),
            active_file: None,
            thoughts: ThoughtLog::new(config.thought_cap),
            goal: None,
            milestones: Vec::new(),
            recent_errors: Vec::new(),
            code_typer: Typewriter::new(config.code_speed, config.code_policy),
            thought_typer: Typewriter::new(config.thought_speed, config.thought_policy),
            local_ids: 0,
        }
    }

    pub fn apply(&mut self, event: ViewEvent, now: Instant) {
        match event {
            ViewEvent::History { session, events } => self.replay_history(session, events),
            ViewEvent::Frame(frame) => self.apply_frame(frame, now),
            ViewEvent::Change(ChangeEvent::Inserted(record)) => self.apply_record(&record, now),
            ViewEvent::Change(ChangeEvent::SessionUpdated(session)) => {
                self.session = Some(session);
            }
        }
    }

    /// Advance typing animations. Returns true if anything changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let code = self.code_typer.tick(now);
        let thoughts = self.thought_typer.tick(now);
        let changed = !code.is_empty() || !thoughts.is_empty();
        self.apply_code_updates(code);
        self.apply_thought_updates(thoughts);
        changed
    }

    /// Stop every animation, leaving all text fully displayed
    pub fn teardown(&mut self) {
        let code = self.code_typer.finish_all();
        let thoughts = self.thought_typer.finish_all();
        self.apply_code_updates(code);
        self.apply_thought_updates(thoughts);
    }

    pub fn is_animating(&self) -> bool {
        !self.code_typer.is_idle() || !self.thought_typer.is_idle()
    }

    pub fn active(&self) -> Option<&CodeFile> {
        self.active_file
            .as_deref()
            .and_then(|name| self.files.get(name))
    }

    /// Move the active file pointer through the tabs, wrapping around
    pub fn cycle_active_file(&mut self, forward: bool) {
        if self.files.is_empty() {
            return;
        }
        let len = self.files.len();
        let next = match self
            .active_file
            .as_deref()
            .and_then(|name| self.files.position(name))
        {
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
            None => 0,
        };
        self.active_file = self.files.at(next).map(|f| f.filename.clone());
    }

    fn apply_frame(&mut self, frame: StreamFrame, now: Instant) {
        if let Some(code) = &frame.code {
            self.type_code(
                code.filename(),
                code.content(),
                code.language.as_deref(),
                code.action(),
                now,
            );
        }

        for thought in &frame.thoughts {
            self.ingest_thought(thought, None, now);
        }

        if let Some(status) = &frame.status {
            self.patch_session(|s| s.status = SessionStatus::from_wire(status));
        }
        if let Some(title) = frame.task.as_ref().and_then(|t| t.title.clone()) {
            self.patch_session(|s| s.current_task = Some(title));
        }
        if let Some(url) = frame
            .preview
            .as_ref()
            .and_then(|p| p.url.clone())
            .filter(|u| !u.is_empty())
        {
            self.patch_session(|s| s.preview_url = Some(url));
        }

        if let Some(goal) = frame.goal {
            self.goal = Some(goal);
        }
        if let Some(milestones) = frame.milestones {
            self.milestones = milestones;
        }
        if let Some(errors) = frame.recent_errors {
            self.recent_errors = errors;
        }

        if let Some(diff) = &frame.diff {
            let text = render_diff_text(diff);
            if !text.is_empty() {
                let language = Some(diff.language.as_str());
                let name = diff_filename(&diff.filename);
                self.type_code(&name, &text, language, FileAction::Write, now);
            }
        }
    }

    fn apply_record(&mut self, record: &EventRecord, now: Instant) {
        match record.event_kind() {
            EventKind::Code => {
                if let Some(code) = record.code() {
                    self.type_code(
                        code.filename(),
                        code.content(),
                        code.language.as_deref(),
                        code.action(),
                        now,
                    );
                }
            }
            EventKind::Thought => {
                if let Some(thought) = record.thought() {
                    self.ingest_thought(&thought, record.id.as_deref(), now);
                }
            }
            EventKind::Other => debug!(kind = %record.kind, "ignoring stream event"),
        }
    }

    /// Rebuild state from persisted events without discarding anything that
    /// already arrived live
    fn replay_history(&mut self, session: Session, mut events: Vec<EventRecord>) {
        self.session = Some(session);
        events.reverse();

        let mut files = FileMap::default();
        let mut latest_file = None;
        let mut older = Vec::new();

        for record in &events {
            let timestamp = record.timestamp().unwrap_or_else(Utc::now);
            match record.event_kind() {
                EventKind::Code => {
                    let Some(code) = record.code() else { continue };
                    let filename = code.filename().to_string();
                    let language = match code.language.as_deref() {
                        Some(declared) if !declared.is_empty() => declared.to_string(),
                        _ => language_for(&filename).to_string(),
                    };
                    files.upsert(CodeFile::new(
                        filename.clone(),
                        language,
                        code.content().to_string(),
                        code.action(),
                        timestamp,
                    ));
                    latest_file = Some(filename);
                }
                EventKind::Thought => {
                    let Some(thought) = record.thought() else { continue };
                    let content = thought.content();
                    if content.is_empty() || !self.thoughts.admit(content) {
                        continue;
                    }
                    let id = match thought.id.clone().or_else(|| record.id.clone()) {
                        Some(id) => id,
                        None => self.next_local_id(),
                    };
                    let metadata = thought.metadata();
                    let priority = thought.priority(&metadata);
                    older.push(ThoughtBlock::new(
                        id,
                        content.to_string(),
                        thought.kind(),
                        priority,
                        metadata,
                        timestamp,
                    ));
                }
                EventKind::Other => {}
            }
        }

        for file in files {
            self.files.insert_if_absent(file);
        }
        if self.active_file.is_none() {
            self.active_file = latest_file;
        }

        for id in self.thoughts.prepend(older) {
            self.thought_typer.cancel(&id);
        }
    }

    fn type_code(
        &mut self,
        filename: &str,
        content: &str,
        language: Option<&str>,
        action: FileAction,
        now: Instant,
    ) {
        let mut file = CodeFile::new(
            filename.to_string(),
            file_language(filename, language),
            content.to_string(),
            action,
            Utc::now(),
        );
        file.begin_typing();
        self.files.upsert(file);
        self.active_file = Some(filename.to_string());

        let finished = self.code_typer.start(filename, content, now);
        self.apply_code_updates(finished);
    }

    fn ingest_thought(&mut self, thought: &ThoughtPayload, fallback_id: Option<&str>, now: Instant) {
        let content = thought.content();
        if content.is_empty() || !self.thoughts.admit(content) {
            return;
        }

        let id = self.unique_thought_id(thought.id.as_deref().or(fallback_id));
        let metadata = thought.metadata();
        let priority = thought.priority(&metadata);
        let mut block = ThoughtBlock::new(
            id.clone(),
            content.to_string(),
            thought.kind(),
            priority,
            metadata,
            Utc::now(),
        );
        block.begin_typing();

        for evicted in self.thoughts.push(block) {
            self.thought_typer.cancel(&evicted);
        }
        let finished = self.thought_typer.start(&id, content, now);
        self.apply_thought_updates(finished);
    }

    fn apply_code_updates(&mut self, updates: Vec<RevealUpdate>) {
        for update in updates {
            if let Some(file) = self.files.get_mut(&update.key) {
                file.reveal(update.shown, update.done);
            }
        }
    }

    fn apply_thought_updates(&mut self, updates: Vec<RevealUpdate>) {
        for update in updates {
            if let Some(block) = self.thoughts.get_mut(&update.key) {
                block.reveal(update.shown, update.done);
            }
        }
    }

    /// Frames that arrive before the session row are not applied to it
    fn patch_session(&mut self, patch: impl FnOnce(&mut Session)) {
        if let Some(session) = self.session.as_mut() {
            patch(session);
        }
    }

    fn unique_thought_id(&mut self, candidate: Option<&str>) -> String {
        match candidate {
            Some(id) if !id.is_empty() && !self.thoughts.contains(id) => id.to_string(),
            _ => loop {
                let id = self.next_local_id();
                if !self.thoughts.contains(&id) {
                    break id;
                }
            },
        }
    }

    fn next_local_id(&mut self) -> String {
        self.local_ids += 1;
        format!("live-{}", self.local_ids)
    }
}

/// Extension table first, then whatever the producer declared.
/// History replay trusts the declared language instead.
fn file_language(filename: &str, declared: Option<&str>) -> String {
    match (language_for(filename), declared) {
        ("text", Some(declared)) if !declared.is_empty() => declared.to_string(),
        (language, _) => language.to_string(),
    }
}
