//! mount command - Serve the tree at a directory through FUSE

use std::path::Path;

use crate::cli::Settings;
use anyhow::Result;

/// Mount the configured treeish read-only at `mountpoint` and block until
/// it is unmounted.
#[cfg(feature = "fuse")]
pub fn mount(settings: &Settings, mountpoint: &Path) -> Result<()> {
    use crate::ui::output;
    use anyhow::{bail, Context as _};

    if !mountpoint.is_dir() {
        bail!("mountpoint {} is not a directory", mountpoint.display());
    }
    let fs = settings.mount()?;
    let generation = fs.context().current_generation();
    output::print(
        format!(
            "Serving {} ({}) at {}, tree {}",
            fs.context().reference(),
            fs.context().reference_kind(),
            mountpoint.display(),
            generation.tree_id().short(12)
        ),
        settings.verbosity,
    );
    drop(generation);

    crate::fs::fuse::mount(fs, mountpoint)
        .with_context(|| format!("failed to mount at {}", mountpoint.display()))
}

#[cfg(not(feature = "fuse"))]
pub fn mount(_settings: &Settings, mountpoint: &Path) -> Result<()> {
    anyhow::bail!(
        "cannot mount at {}: gitmod was built without the `fuse` feature",
        mountpoint.display()
    )
}
