//! Upgrade command.
//!
//! Without arguments, every installed package whose registry version differs
//! from its receipt is upgraded. With no work to do, nothing is printed and
//! nothing is touched.

use anyhow::Result;

use crate::cmd::confirm;
use crate::config::Config;
use crate::core::package::Package;
use crate::core::receipt::Receipt;
use crate::ops::{install, Context, ProcessLock};
use crate::ui::Table;

pub async fn run(ctx: &Context, packages: &[String]) -> Result<()> {
    let _lock = ProcessLock::acquire(&Config::lock_path())?;

    let mut selected: std::collections::BTreeMap<String, (&Package, &Receipt)> =
        std::collections::BTreeMap::new();

    if packages.is_empty() {
        for receipt in ctx.receipts.values() {
            let Some(pkg) = ctx.packages.get(&receipt.name) else {
                continue;
            };
            if pkg.source.purl.version != receipt.primary_source.purl.version {
                selected.insert(pkg.name.clone(), (pkg, receipt));
            }
        }
    } else {
        for name in packages {
            let Some(pkg) = ctx.packages.get(name) else {
                println!("'{name}' does not exist");
                return Ok(());
            };
            let Some(receipt) = ctx.receipts.get(name) else {
                println!("'{name}' is not installed");
                return Ok(());
            };
            if pkg.source.purl.version != receipt.primary_source.purl.version {
                selected.insert(pkg.name.clone(), (pkg, receipt));
            }
        }
    }

    if selected.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    for (pkg, receipt) in selected.values() {
        table.row([
            receipt.primary_source.purl.ty.clone(),
            receipt.name.clone(),
            format!(
                "{} -> {}",
                receipt.primary_source.purl.version, pkg.source.purl.version
            ),
        ]);
    }
    table.print();
    println!();

    if !confirm("Upgrade?")? {
        return Ok(());
    }

    for (pkg, receipt) in selected.values() {
        install::upgrade_package(pkg, receipt, &ctx.config, &ctx.client).await?;
    }

    Ok(())
}
