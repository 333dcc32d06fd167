use chrono::{DateTime, Utc};

use crate::stream::Diff;

/// Suffix marking a synthetic file rendered from a diff payload
const DIFF_SUFFIX: &str = " (diff)";

/// What the agent last did to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileAction {
    #[default]
    Write,
    Edit,
    Delete,
}

impl FileAction {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "edit" => Self::Edit,
            "delete" => Self::Delete,
            _ => Self::Write,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }
}

/// A file the agent is writing
#[derive(Debug, Clone, PartialEq)]
pub struct CodeFile {
    pub filename: String,
    pub language: String,
    pub content: String,
    displayed_len: usize,
    pub typing: bool,
    pub action: FileAction,
    pub timestamp: DateTime<Utc>,
}

impl CodeFile {
    /// A fully displayed file
    pub fn new(
        filename: String,
        language: String,
        content: String,
        action: FileAction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let displayed_len = content.len();
        Self {
            filename,
            language,
            content,
            displayed_len,
            typing: false,
            action,
            timestamp,
        }
    }

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

    pub fn is_diff(&self) -> bool {
        self.filename.ends_with(DIFF_SUFFIX)
    }
}

/// Syntax language derived from the file extension
pub fn language_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    match ext.as_str() {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "py" => "python",
        "sql" => "sql",
        "css" => "css",
        "html" => "html",
        "json" => "json",
        "md" => "markdown",
        "yml" | "yaml" => "yaml",
        "sh" | "bash" => "bash",
        _ => "text",
    }
}

pub fn diff_filename(filename: &str) -> String {
    format!("{}{}", filename, DIFF_SUFFIX)
}

/// Render hunks as `@@ line N @@`, `- removed` and `+ added` lines
pub fn render_diff_text(diff: &Diff) -> String {
    let mut lines = Vec::new();
    for hunk in &diff.hunks {
        lines.push(format!("@@ line {} @@", hunk.start));
        lines.extend(hunk.removed.iter().map(|line| format!("- {}", line)));
        lines.extend(hunk.added.iter().map(|line| format!("+ {}", line)));
    }
    lines.join("\n")
}

/// Role of one line in rendered diff text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLine {
    Removed,
    Added,
    HunkHeader,
    Context,
}

pub fn classify_diff_line(line: &str) -> DiffLine {
    if line.starts_with("- ") {
        DiffLine::Removed
    } else if line.starts_with("+ ") {
        DiffLine::Added
    } else if line.starts_with("@@") {
        DiffLine::HunkHeader
    } else {
        DiffLine::Context
    }
}

/// Files keyed by name, in first-insertion order
#[derive(Debug, Clone, Default)]
pub struct FileMap {
    files: Vec<CodeFile>,
}

impl FileMap {
    /// Overwrite the file in place, or append it if new
    pub fn upsert(&mut self, file: CodeFile) {
        match self.files.iter_mut().find(|f| f.filename == file.filename) {
            Some(existing) => *existing = file,
            None => self.files.push(file),
        }
    }

    /// Insert only when no file of that name exists yet
    pub fn insert_if_absent(&mut self, file: CodeFile) -> bool {
        if self.get(&file.filename).is_some() {
            return false;
        }
        self.files.push(file);
        true
    }

    pub fn get(&self, filename: &str) -> Option<&CodeFile> {
        self.files.iter().find(|f| f.filename == filename)
    }

    pub fn get_mut(&mut self, filename: &str) -> Option<&mut CodeFile> {
        self.files.iter_mut().find(|f| f.filename == filename)
    }

    pub fn position(&self, filename: &str) -> Option<usize> {
        self.files.iter().position(|f| f.filename == filename)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CodeFile> {
        self.files.iter()
    }

    pub fn at(&self, index: usize) -> Option<&CodeFile> {
        self.files.get(index)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl IntoIterator for FileMap {
    type Item = CodeFile;
    type IntoIter = std::vec::IntoIter<CodeFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}
