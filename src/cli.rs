//! Collector toggle flags
//!
//! The set of collectors is only known once they are registered, so the
//! `--collector.<name>` / `--no-collector.<name>` pairs are added to an existing
//! [`clap::Command`] at runtime rather than derived.

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::debug;

use crate::error::RegistryError;
use crate::registry::{CollectorToggle, Registry};

const ENABLE_PREFIX: &str = "collector.";
const DISABLE_PREFIX: &str = "no-collector.";

/// Add one enable/disable flag pair per registered collector to `command`
pub fn with_collector_flags(command: Command, registry: &Registry) -> Command {
    registry
        .toggles()
        .into_iter()
        .fold(command, |command, toggle| {
            let enable = format!("{ENABLE_PREFIX}{}", toggle.name);
            let disable = format!("{DISABLE_PREFIX}{}", toggle.name);

            command
                .arg(
                    Arg::new(enable.clone())
                        .long(enable.clone())
                        .help(toggle.help())
                        .action(ArgAction::SetTrue)
                        .help_heading("Collectors"),
                )
                .arg(
                    Arg::new(disable.clone())
                        .long(disable)
                        .help(format!("Disable the {} collector.", toggle.name))
                        .action(ArgAction::SetTrue)
                        .conflicts_with(enable)
                        .hide(true),
                )
        })
}

/// Apply the flags parsed from a command built by [`with_collector_flags`]
///
/// Returns the toggles as they are after applying the flags.
pub fn apply_collector_flags(
    registry: &Registry,
    matches: &ArgMatches,
) -> Result<Vec<CollectorToggle>, RegistryError> {
    for toggle in registry.toggles() {
        let enable = format!("{ENABLE_PREFIX}{}", toggle.name);
        let disable = format!("{DISABLE_PREFIX}{}", toggle.name);

        let wanted = if flag_set(matches, &enable) {
            Some(true)
        } else if flag_set(matches, &disable) {
            Some(false)
        } else {
            None
        };

        if let Some(enabled) = wanted
            && enabled != toggle.enabled
        {
            debug!(collector = %toggle.name, enabled, "collector toggled from command line");
            registry.set_enabled(&toggle.name, enabled)?;
        }
    }

    Ok(registry.toggles())
}

fn flag_set(matches: &ArgMatches, id: &str) -> bool {
    matches
        .try_get_one::<bool>(id)
        .ok()
        .flatten()
        .copied()
        .unwrap_or(false)
}
