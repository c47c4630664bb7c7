//! ls command - List a directory

use crate::cli::Settings;
use crate::core::types::RepoPath;
use crate::fs::GitFs;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// List the directory at `path`.
pub fn ls(settings: &Settings, path: &str, long: bool) -> Result<()> {
    let fs = settings.mount()?;
    let lines = listing(&fs, path, long);
    fs.destroy();
    let lines = lines.with_context(|| format!("cannot list '{}'", path))?;

    if !lines.is_empty() {
        output::print(output::format_list(&lines, ""), settings.verbosity);
    }
    Ok(())
}

fn listing(fs: &GitFs, path: &str, long: bool) -> Result<Vec<String>> {
    let dir = RepoPath::new(path);
    let entries = fs.readdir(dir.as_str())?;
    let mut lines = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        if long {
            let attr = fs.getattr(dir.child(&entry.name).as_str())?;
            lines.push(output::format_long(&attr, &entry.name));
        } else {
            lines.push(entry.name);
        }
    }
    Ok(lines)
}
