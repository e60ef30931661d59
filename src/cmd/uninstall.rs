//! Uninstall command.

use anyhow::Result;

use crate::cmd::confirm;
use crate::config::Config;
use crate::ops::{install, Context, ProcessLock};
use crate::ui::Table;

pub async fn run(ctx: &Context, packages: &[String]) -> Result<()> {
    let _lock = ProcessLock::acquire(&Config::lock_path())?;

    let mut selected = std::collections::BTreeMap::new();
    for name in packages {
        let Some(receipt) = ctx.receipts.get(name) else {
            println!("'{name}' is not installed");
            return Ok(());
        };
        selected.insert(receipt.name.clone(), receipt);
    }

    let mut table = Table::new();
    for receipt in selected.values() {
        table.row([
            receipt.primary_source.purl.ty.as_str(),
            receipt.name.as_str(),
            receipt.primary_source.purl.version.as_str(),
        ]);
    }
    table.print();
    println!();

    if !confirm("Uninstall?")? {
        return Ok(());
    }

    for receipt in selected.values() {
        install::uninstall_package(receipt, &ctx.config)?;
    }

    Ok(())
}
