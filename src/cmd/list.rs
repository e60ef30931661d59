//! List command.

use anyhow::Result;

use crate::ops::Context;
use crate::ui::Table;

pub fn run(ctx: &Context) -> Result<()> {
    let mut table = Table::new();
    for receipt in ctx.receipts.values() {
        table.row([
            receipt.primary_source.purl.ty.as_str(),
            receipt.name.as_str(),
            receipt.primary_source.purl.version.as_str(),
        ]);
    }
    table.print();
    Ok(())
}
