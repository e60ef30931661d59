//! Update command: refresh every configured registry.

use anyhow::Result;

use crate::config::Config;
use crate::ops::{Context, ProcessLock};

pub async fn run(ctx: &mut Context) -> Result<()> {
    let _lock = ProcessLock::acquire(&Config::lock_path())?;

    for registry in &mut ctx.registries {
        registry.update(&ctx.client).await?;
    }
    Ok(())
}
