//! Install command.

use anyhow::Result;

use crate::cmd::confirm;
use crate::config::Config;
use crate::ops::{install, Context, ProcessLock};
use crate::ui::Table;

pub async fn run(ctx: &Context, packages: &[String]) -> Result<()> {
    let _lock = ProcessLock::acquire(&Config::lock_path())?;

    let mut selected = std::collections::BTreeMap::new();
    for name in packages {
        if ctx.receipts.contains_key(name) {
            println!("'{name}' is already installed");
            return Ok(());
        }
        let Some(pkg) = ctx.packages.get(name) else {
            println!("'{name}' does not exist");
            return Ok(());
        };
        selected.insert(pkg.name.clone(), pkg);
    }

    let mut table = Table::new();
    for pkg in selected.values() {
        table.row([
            pkg.source.purl.ty.as_str(),
            pkg.name.as_str(),
            pkg.source.purl.version.as_str(),
        ]);
    }
    table.print();
    println!();

    if !confirm("Install?")? {
        return Ok(());
    }

    for pkg in selected.values() {
        install::install_package(pkg, &ctx.config, &ctx.client).await?;
    }

    Ok(())
}
