//! watch command - Follow the treeish and report tree changes

use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use crate::cli::Settings;
use crate::ui::output;
use anyhow::{bail, Result};

/// Report every swap until `polls` refresh intervals have passed.
pub fn watch(settings: &Settings, polls: Option<u64>, json: bool) -> Result<()> {
    if settings.fix {
        bail!("watch needs a moving treeish; drop --fix");
    }
    let fs = settings.mount()?;
    let context = fs.context();
    let Some(interval) = context.poll_interval() else {
        fs.destroy();
        bail!("'{}' names a fixed object and cannot move", settings.treeish);
    };

    let generation = context.current_generation();
    output::print(
        format!(
            "Watching {} ({}) at tree {}",
            context.reference(),
            context.reference_kind(),
            generation.tree_id().short(12)
        ),
        settings.verbosity,
    );
    drop(generation);

    let events = context.subscribe();
    if interval.is_zero() {
        output::warn("refresh delay is 0; the treeish is checked continuously", settings.verbosity);
    }
    // a zero delay would make every tick time out at once
    let tick = interval.max(Duration::from_millis(1));
    let mut ticks = 0u64;
    loop {
        if polls.is_some_and(|limit| ticks >= limit) {
            break;
        }
        match events.recv_timeout(tick) {
            Ok(event) => {
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    output::print(
                        format!(
                            "{} -> {} ({}, previous tree {})",
                            event.old_tree.short(12),
                            event.new_tree.short(12),
                            event.time,
                            if event.old_disposed { "released" } else { "still in use" }
                        ),
                        settings.verbosity,
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => ticks += 1,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    fs.destroy();
    Ok(())
}
