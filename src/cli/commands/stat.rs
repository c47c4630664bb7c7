//! stat command - Show the attributes of one path

use crate::cli::Settings;
use crate::fs::FileType;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Show the attributes of `path`.
pub fn stat(settings: &Settings, path: &str, json: bool) -> Result<()> {
    let fs = settings.mount()?;
    let attr = fs.getattr(path);
    fs.destroy();
    let attr = attr.with_context(|| format!("cannot stat '{}'", path))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&attr)?);
        return Ok(());
    }

    let kind = match attr.kind {
        FileType::Directory => "directory",
        FileType::RegularFile => "regular file",
    };
    let lines = [
        format!("Path: {}", attr.path),
        format!("Type: {}", kind),
        format!("Object: {}", attr.object),
        format!("Mode: {:04o} ({})", attr.perm, output::format_mode(attr.kind, attr.perm)),
        format!("Links: {}", attr.nlink),
        format!("Size: {}", attr.size),
        format!("Owner: {}:{}", attr.uid, attr.gid),
        format!("Time: {}", attr.time),
    ];
    output::print(lines.join("\n"), settings.verbosity);
    Ok(())
}
