//! cat command - Print the contents of a file

use std::io::Write;

use crate::cli::Settings;
use crate::fs::GitFs;
use anyhow::{Context as _, Result};

/// Bytes requested per read call.
const CHUNK: usize = 64 * 1024;

/// Print `length` bytes (or everything) of `path` from `offset`.
pub fn cat(settings: &Settings, path: &str, offset: u64, length: Option<usize>) -> Result<()> {
    let fs = settings.mount()?;
    let result = copy_out(&fs, path, offset, length);
    fs.destroy();
    result.with_context(|| format!("cannot read '{}'", path))
}

fn copy_out(fs: &GitFs, path: &str, offset: u64, length: Option<usize>) -> Result<()> {
    let handle = fs.open(path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut position = offset;
    let mut remaining = length.unwrap_or(usize::MAX);
    while remaining > 0 {
        let chunk = match fs.read(handle, position, remaining.min(CHUNK)) {
            Ok(chunk) => chunk,
            Err(err) => {
                fs.release(handle)?;
                return Err(err.into());
            }
        };
        if chunk.is_empty() {
            break;
        }
        out.write_all(&chunk)?;
        position += chunk.len() as u64;
        remaining -= chunk.len();
    }
    out.flush()?;
    fs.release(handle)?;
    Ok(())
}
