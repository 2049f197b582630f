//! Safe file operations: bounded retries, content equality and
//! best-effort deletion.

pub mod cleanup;
pub mod content;
pub mod retry;

pub use cleanup::{
    DirectoryRemoval, FileRemoval, SettlePolicy, delete_directory, delete_directory_safe,
    delete_file_safe,
};
pub use content::{content_equals, is_binary};
pub use retry::{RetryPolicy, attempt, perform_safe};
