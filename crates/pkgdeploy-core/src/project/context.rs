use std::cell::RefCell;

use super::{FileConflictAction, MessageLevel, ProjectContext};

/// A non-interactive context: every conflict gets the same answer and
/// messages are kept for the caller to inspect.
#[derive(Debug)]
pub struct BatchContext {
    conflict_action: FileConflictAction,
    source_control: bool,
    messages: RefCell<Vec<(MessageLevel, String)>>,
    conflicts: RefCell<usize>,
}

impl BatchContext {
    pub fn new(conflict_action: FileConflictAction) -> Self {
        Self {
            conflict_action,
            source_control: false,
            messages: RefCell::new(Vec::new()),
            conflicts: RefCell::new(0),
        }
    }

    pub fn with_source_control(mut self, bound: bool) -> Self {
        self.source_control = bound;
        self
    }

    pub fn messages(&self) -> Vec<(MessageLevel, String)> {
        self.messages.borrow().clone()
    }

    pub fn messages_at(&self, level: MessageLevel) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// How many times a conflict question was asked.
    pub fn conflicts_asked(&self) -> usize {
        *self.conflicts.borrow()
    }
}

impl Default for BatchContext {
    fn default() -> Self {
        Self::new(FileConflictAction::IgnoreAll)
    }
}

impl ProjectContext for BatchContext {
    fn log(&self, level: MessageLevel, message: &str) {
        self.messages.borrow_mut().push((level, message.to_string()));
    }

    fn resolve_file_conflict(&self, _message: &str) -> FileConflictAction {
        *self.conflicts.borrow_mut() += 1;
        self.conflict_action
    }

    fn source_control_bound(&self) -> bool {
        self.source_control
    }
}
