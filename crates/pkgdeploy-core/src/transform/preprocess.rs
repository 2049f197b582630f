//! `$token$` replacement for `.pp` sources.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use super::{RevertContext, Transformer};
use crate::fs::content_equals;
use crate::project::{FileConflictAction, MessageLevel, ProjectContext, ProjectTree, notify};

const PROJECT_NAME_TOKEN: &str = "projectname";

/// Replaces `$name$` with configured values. Token names match
/// case-insensitively; unknown tokens are left as written.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    tokens: BTreeMap<String, String>,
}

impl Preprocessor {
    pub fn new(tokens: BTreeMap<String, String>) -> Self {
        Self {
            tokens: tokens
                .into_iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value))
                .collect(),
        }
    }

    fn lookup(&self, name: &str, project: &dyn ProjectTree) -> Option<String> {
        let key = name.to_ascii_lowercase();
        if let Some(value) = self.tokens.get(&key) {
            return Some(value.clone());
        }
        (key == PROJECT_NAME_TOKEN).then(|| project.project_name())
    }

    pub fn process(&self, text: &str, project: &dyn ProjectTree) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(open) = rest.find('$') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('$') else {
                out.push_str(&rest[open..]);
                return out;
            };

            let name = &after[..close];
            let is_token = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            match is_token.then(|| self.lookup(name, project)).flatten() {
                Some(value) => {
                    out.push_str(&value);
                    rest = &after[close + 1..];
                }
                None => {
                    // The closing '$' may open the next token.
                    out.push('$');
                    out.push_str(name);
                    rest = &after[close..];
                }
            }
        }
        out.push_str(rest);
        out
    }

    fn processed_bytes(&self, source: &[u8], project: &dyn ProjectTree) -> anyhow::Result<Vec<u8>> {
        let text = std::str::from_utf8(source).context("Preprocessed source is not valid UTF-8")?;
        Ok(self.process(text, project).into_bytes())
    }
}

impl Transformer for Preprocessor {
    fn transform(
        &self,
        source: &[u8],
        target: &Path,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
    ) -> anyhow::Result<()> {
        let processed = self.processed_bytes(source, &*project)?;

        if project.file_exists(target) {
            let existing = project
                .read_file(target)
                .with_context(|| format!("Failed to read {}", target.display()))?;
            if content_equals(&existing, &processed) {
                debug!("{} is already up to date", target.display());
                return Ok(());
            }

            let message = format!("File '{}' already exists. Overwrite it?", target.display());
            match context.resolve_file_conflict(&message) {
                FileConflictAction::Overwrite | FileConflictAction::OverwriteAll => {}
                FileConflictAction::Ignore | FileConflictAction::IgnoreAll => {
                    notify(
                        context,
                        MessageLevel::Info,
                        &format!("'{}' already exists. Skipping...", target.display()),
                    );
                    return Ok(());
                }
            }
        }

        project
            .add_file(target, &processed)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        notify(
            context,
            MessageLevel::Debug,
            &format!("Added file '{}'", target.display()),
        );
        Ok(())
    }

    fn revert(
        &self,
        source: &[u8],
        target: &Path,
        _others: &RevertContext<'_>,
        project: &mut dyn ProjectTree,
        context: &dyn ProjectContext,
    ) -> anyhow::Result<()> {
        if !project.file_exists(target) {
            return Ok(());
        }

        let processed = self.processed_bytes(source, &*project)?;
        let existing = project
            .read_file(target)
            .with_context(|| format!("Failed to read {}", target.display()))?;

        if !content_equals(&existing, &processed) {
            notify(
                context,
                MessageLevel::Warning,
                &format!("Skipping '{}' because it was modified", target.display()),
            );
            return Ok(());
        }

        project
            .remove_file(target)
            .with_context(|| format!("Failed to remove {}", target.display()))?;
        notify(
            context,
            MessageLevel::Debug,
            &format!("Removed file '{}'", target.display()),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::Framework;
    use crate::package::ZipOpener;
    use crate::project::{BatchContext, FileSystemProject};
    use tempfile::TempDir;

    fn tokens(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn replaces_known_tokens_case_insensitively() {
        let temp = TempDir::new().unwrap();
        let project = FileSystemProject::new(temp.path().join("Contoso.Web"), Framework::Any);
        let pre = Preprocessor::new(tokens(&[("RootNamespace", "Contoso")]));

        assert_eq!(
            pre.process("namespace $rootnamespace$.Models", &project),
            "namespace Contoso.Models"
        );
        assert_eq!(pre.process("// $ProjectName$", &project), "// Contoso.Web");
    }

    #[test]
    fn leaves_unknown_tokens_and_stray_dollars() {
        let temp = TempDir::new().unwrap();
        let project = FileSystemProject::new(temp.path(), Framework::Any);
        let pre = Preprocessor::new(tokens(&[("name", "x")]));

        assert_eq!(pre.process("cost: $5 and $unknown$", &project), "cost: $5 and $unknown$");
        assert_eq!(pre.process("$5 $name$", &project), "$5 x");
        assert_eq!(pre.process("trailing $", &project), "trailing $");
    }

    #[test]
    fn install_then_revert_removes_unmodified_file() {
        let temp = TempDir::new().unwrap();
        let mut project = FileSystemProject::new(temp.path(), Framework::Any);
        let context = BatchContext::default();
        let pre = Preprocessor::new(tokens(&[("rootnamespace", "Contoso")]));
        let source = b"namespace $rootnamespace$;\n";
        let target = Path::new("Models/User.cs");

        pre.transform(source, target, &mut project, &context).unwrap();
        assert_eq!(project.read_file(target).unwrap(), b"namespace Contoso;\n");

        let opener = ZipOpener;
        let others = RevertContext::new(&[], &opener);
        pre.revert(source, target, &others, &mut project, &context)
            .unwrap();
        assert!(!project.file_exists(target));
    }

    #[test]
    fn revert_keeps_modified_file() {
        let temp = TempDir::new().unwrap();
        let mut project = FileSystemProject::new(temp.path(), Framework::Any);
        let context = BatchContext::default();
        let pre = Preprocessor::default();
        let target = Path::new("notes.txt");
        project.add_file(target, b"changed by user").unwrap();

        let opener = ZipOpener;
        let others = RevertContext::new(&[], &opener);
        pre.revert(b"original", target, &others, &mut project, &context)
            .unwrap();

        assert!(project.file_exists(target));
        assert_eq!(context.messages_at(MessageLevel::Warning).len(), 1);
    }

    #[test]
    fn existing_file_asks_before_overwrite() {
        let temp = TempDir::new().unwrap();
        let mut project = FileSystemProject::new(temp.path(), Framework::Any);
        let context = BatchContext::new(FileConflictAction::Ignore);
        let target = Path::new("notes.txt");
        project.add_file(target, b"mine").unwrap();

        Preprocessor::default()
            .transform(b"theirs", target, &mut project, &context)
            .unwrap();

        assert_eq!(context.conflicts_asked(), 1);
        assert_eq!(project.read_file(target).unwrap(), b"mine");
    }
}
