pub mod local_store;

pub use local_store::LocalStore;

use std::fs;
use std::path::Path;

/// Ensure the directory holding `file` exists
pub fn ensure_parent_dir(file: &Path) -> std::io::Result<()> {
    if let Some(parent) = file.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
