pub mod install;
pub mod list;
pub mod search;
pub mod uninstall;
pub mod update;
pub mod upgrade;

use dialoguer::Confirm;

/// Yes/no prompt defaulting to no.
pub(crate) fn confirm(message: &str) -> anyhow::Result<bool> {
    Ok(Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()?)
}
