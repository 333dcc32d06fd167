use std::collections::hash_map::DefaultHasher;
use std::collections::{HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Visible thoughts kept by the current watch page
pub const DEFAULT_THOUGHT_CAP: usize = 50;

/// What kind of reasoning a thought narrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThoughtKind {
    Reasoning,
    Prompt,
    Tool,
    Context,
    Evaluation,
    Decision,
    Observation,
    #[default]
    General,
}

impl ThoughtKind {
    /// Unknown tags fall back to `General`
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "reasoning" => Self::Reasoning,
            "prompt" => Self::Prompt,
            "tool" => Self::Tool,
            "context" => Self::Context,
            "evaluation" => Self::Evaluation,
            "decision" => Self::Decision,
            "observation" => Self::Observation,
            _ => Self::General,
        }
    }

    /// Badge text shown next to the thought
    pub fn label(self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Prompt => "prompt",
            Self::Tool => "tool",
            Self::Context => "context",
            Self::Evaluation => "evaluation",
            Self::Decision => "decision",
            Self::Observation => "observation",
            Self::General => "thought",
        }
    }
}

/// How prominently a thought is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThoughtPriority {
    Headline,
    #[default]
    Working,
    Detail,
}

impl ThoughtPriority {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "headline" => Self::Headline,
            "detail" => Self::Detail,
            _ => Self::Working,
        }
    }
}

/// Optional context attached to a thought by the agent adapter
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThoughtMetadata {
    pub tool: Option<String>,
    pub file: Option<String>,
    pub command: Option<String>,
    pub pattern: Option<String>,
    pub url: Option<String>,
    pub priority: Option<String>,
    /// Options weighed by an evaluation
    pub options: Vec<String>,
    /// Option picked by an evaluation
    pub chosen: Option<String>,
    pub confidence: Option<f64>,
    #[serde(alias = "promptFor")]
    pub prompt_for: Option<String>,
}

impl ThoughtMetadata {
    /// Last two path segments of `file`, e.g. `src/app.rs`
    pub fn short_file(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        let parts: Vec<&str> = file.split('/').collect();
        let start = parts.len().saturating_sub(2);
        Some(parts[start..].join("/"))
    }
}

/// One unit of narrated reasoning
#[derive(Debug, Clone, PartialEq)]
pub struct ThoughtBlock {
    pub id: String,
    pub content: String,
    displayed_len: usize,
    pub typing: bool,
    pub timestamp: DateTime<Utc>,
    pub kind: ThoughtKind,
    pub priority: ThoughtPriority,
    pub metadata: ThoughtMetadata,
}

impl ThoughtBlock {
    /// A fully displayed thought
    pub fn new(
        id: String,
        content: String,
        kind: ThoughtKind,
        priority: ThoughtPriority,
        metadata: ThoughtMetadata,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let displayed_len = content.len();
        Self {
            id,
            content,
            displayed_len,
            typing: false,
            timestamp,
            kind,
            priority,
            metadata,
        }
    }

    /// Hide the text and show the typing cursor
    pub fn begin_typing(&mut self) {
        self.displayed_len = 0;
        self.typing = true;
    }

    pub(crate) fn reveal(&mut self, shown: usize, done: bool) {
        if done {
            self.displayed_len = self.content.len();
            self.typing = false;
        } else {
            self.displayed_len = shown.min(self.content.len());
        }
    }

    /// The currently revealed prefix of `content`
    pub fn displayed(&self) -> &str {
        self.content
            .get(..self.displayed_len)
            .unwrap_or(&self.content)
    }
}

/// Hash used to recognise repeated thought text
fn content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}

/// Bounded, ordered thought list with content-hash deduplication.
///
/// The seen-hash set is never pruned, so text dropped from the visible list
/// is still recognised as a duplicate for the lifetime of the viewer.
#[derive(Debug, Clone)]
pub struct ThoughtLog {
    cap: usize,
    blocks: VecDeque<ThoughtBlock>,
    seen: HashSet<u64>,
}

impl ThoughtLog {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            blocks: VecDeque::with_capacity(cap),
            seen: HashSet::new(),
        }
    }

    /// Record `content` as seen. Returns false if it was seen before.
    pub fn admit(&mut self, content: &str) -> bool {
        self.seen.insert(content_hash(content))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blocks.iter().any(|b| b.id == id)
    }

    /// Append a block, returning the ids evicted to respect the cap
    pub fn push(&mut self, block: ThoughtBlock) -> Vec<String> {
        if self.contains(&block.id) {
            return Vec::new();
        }
        self.blocks.push_back(block);
        self.trim()
    }

    /// Place older blocks before everything already in the log
    pub fn prepend(&mut self, older: Vec<ThoughtBlock>) -> Vec<String> {
        for block in older.into_iter().rev() {
            if !self.contains(&block.id) {
                self.blocks.push_front(block);
            }
        }
        self.trim()
    }

    fn trim(&mut self) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.blocks.len() > self.cap {
            if let Some(old) = self.blocks.pop_front() {
                evicted.push(old.id);
            }
        }
        evicted
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ThoughtBlock> {
        self.blocks.iter_mut().find(|b| b.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThoughtBlock> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks to render. With details collapsed, detail-priority thoughts
    /// are hidden unless they are among the last three entries.
    pub fn visible(&self, collapsed_details: bool) -> Vec<&ThoughtBlock> {
        let tail_start = self.blocks.len().saturating_sub(3);
        self.blocks
            .iter()
            .enumerate()
            .filter(|(i, block)| {
                !(collapsed_details
                    && block.priority == ThoughtPriority::Detail
                    && *i < tail_start)
            })
            .map(|(_, block)| block)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, content: &str) -> ThoughtBlock {
        ThoughtBlock::new(
            id.to_string(),
            content.to_string(),
            ThoughtKind::General,
            ThoughtPriority::Working,
            ThoughtMetadata::default(),
            Utc::now(),
        )
    }

    #[test]
    fn test_admit_rejects_repeated_text() {
        let mut log = ThoughtLog::new(DEFAULT_THOUGHT_CAP);
        assert!(log.admit("Loading data"));
        assert!(!log.admit("Loading data"));
        assert!(log.admit("Loading data."));
        assert_eq!(log.seen.len(), 2);
    }

    #[test]
    fn test_cap_is_never_exceeded() {
        let mut log = ThoughtLog::new(30);
        for i in 0..100 {
            let text = format!("thought {}", i);
            assert!(log.admit(&text));
            log.push(block(&i.to_string(), &text));
            assert!(log.len() <= 30);
        }
        assert_eq!(log.iter().next().map(|b| b.id.as_str()), Some("70"));
    }

    #[test]
    fn test_evicted_text_stays_seen() {
        let mut log = ThoughtLog::new(2);
        for text in ["a", "b", "c"] {
            log.admit(text);
            log.push(block(text, text));
        }
        assert!(!log.contains("a"));
        assert!(!log.admit("a"));
    }

    #[test]
    fn test_push_reports_evictions() {
        let mut log = ThoughtLog::new(1);
        assert!(log.push(block("1", "one")).is_empty());
        assert_eq!(log.push(block("2", "two")), vec!["1".to_string()]);
    }

    #[test]
    fn test_prepend_keeps_live_entries_last() {
        let mut log = ThoughtLog::new(3);
        log.push(block("live", "live"));
        let evicted = log.prepend(vec![block("h1", "h1"), block("h2", "h2"), block("h3", "h3")]);
        assert_eq!(evicted, vec!["h1".to_string()]);
        let ids: Vec<&str> = log.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["h2", "h3", "live"]);
    }

    #[test]
    fn test_collapsed_details_hide_old_detail_thoughts() {
        let mut log = ThoughtLog::new(10);
        for i in 0..5 {
            let mut b = block(&i.to_string(), &format!("t{}", i));
            b.priority = ThoughtPriority::Detail;
            log.push(b);
        }
        assert_eq!(log.visible(true).len(), 3);
        assert_eq!(log.visible(false).len(), 5);
    }

    #[test]
    fn test_typing_reveals_prefix() {
        let mut b = block("1", "hello world");
        b.begin_typing();
        assert_eq!(b.displayed(), "");
        b.reveal(5, false);
        assert_eq!(b.displayed(), "hello");
        b.reveal(0, true);
        assert_eq!(b.displayed(), "hello world");
        assert!(!b.typing);
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(ThoughtKind::from_tag("Decision"), ThoughtKind::Decision);
        assert_eq!(ThoughtKind::from_tag("musing"), ThoughtKind::General);
        assert_eq!(ThoughtKind::General.label(), "thought");
        assert_eq!(ThoughtPriority::from_tag("headline"), ThoughtPriority::Headline);
        assert_eq!(ThoughtPriority::from_tag(""), ThoughtPriority::Working);
    }

    #[test]
    fn test_short_file() {
        let meta = ThoughtMetadata {
            file: Some("/repo/src/view/mod.rs".to_string()),
            ..Default::default()
        };
        assert_eq!(meta.short_file().as_deref(), Some("view/mod.rs"));
    }
}
