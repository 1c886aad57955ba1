//! Sync with a directory-backed remote.

use anyhow::Result;
use mesh_client::SyncEngine;
use mesh_types::ActorId;
use std::path::Path;

use crate::config::AppContext;
use crate::remote::FileRemote;

/// Which directions to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Pull then push.
    Both,
    /// Import remote lessons only.
    PullOnly,
    /// Drain the queue only.
    PushOnly,
}

/// Run the sync command.
pub async fn run(
    ctx: &AppContext,
    remote_dir: &Path,
    actor: Option<&str>,
    mode: Mode,
) -> Result<()> {
    let engine = SyncEngine::new(ctx.queue().clone(), FileRemote::new(remote_dir));
    let actor = actor.map(ActorId::from);
    let actor = actor.as_ref();

    if mode != Mode::PushOnly {
        let imported = engine.pull(actor).await?;
        println!("Pulled {} new lessons", imported);
    }

    if mode != Mode::PullOnly {
        let report = engine.push(actor).await?;
        println!("Pushed {} queued items", report.confirmed);
        if report.failed > 0 {
            println!("  {} failed and stay queued", report.failed);
        }
        if report.skipped > 0 {
            println!("  {} skipped (parked or backing off)", report.skipped);
        }
    }

    Ok(())
}
