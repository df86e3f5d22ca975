//! License plugin for Eldritch.
//!
//! Adds `eldritch license list` and `eldritch license use [--name <license>]`.
//! Enable it in `pyproject.toml`:
//!
//! ```toml
//! [tool.eldritch]
//! plugins = ["eldritch.plugins.license"]
//! ```

pub mod api;
pub mod cli;

use std::sync::Arc;

use eldritch_core::clap::builder::PossibleValuesParser;
use eldritch_core::clap::{Arg, Command};
use eldritch_core::{
    CommandGroup, CommandSpec, EldritchPlugin, PluginCatalog, PluginModule, RuntimeContext,
};

pub use api::{License, LicenseApi, LicenseError};
pub use cli::LicenseCli;

/// Name to list under `[tool.eldritch] plugins`.
pub const MODULE_NAME: &str = "eldritch.plugins.license";

/// The plugin module.
#[derive(Debug, Default, Clone, Copy)]
pub struct LicenseModule;

impl PluginModule for LicenseModule {
    fn load(&self) -> anyhow::Result<Vec<Box<dyn EldritchPlugin>>> {
        Ok(vec![Box::new(LicensePlugin)])
    }
}

/// Make this plugin resolvable from configuration.
pub fn register(catalog: &mut PluginCatalog) {
    catalog.register(MODULE_NAME, LicenseModule);
}

/// Hook implementation adding the `license` command group.
#[derive(Debug, Default)]
pub struct LicensePlugin;

impl EldritchPlugin for LicensePlugin {
    fn name(&self) -> &str {
        "LicensePlugin"
    }

    fn on_command_line_create(&self, ctx: &Arc<RuntimeContext>) -> anyhow::Result<()> {
        let names = ctx.component::<LicenseApi>()?.license_names();

        let group = CommandGroup::new("license", "Groups license related operations.")
            .command(CommandSpec::new(
                Command::new("list").about("List all available licenses."),
                |ctx, _| LicenseCli::new(ctx)?.list(),
            ))
            .command(CommandSpec::new(
                Command::new("use")
                    .about("Select license and copy its files to your project.")
                    .arg(
                        Arg::new("name")
                            .short('n')
                            .long("name")
                            .value_name("LICENSE")
                            .value_parser(PossibleValuesParser::new(names)),
                    ),
                |ctx, matches| {
                    let name = matches.get_one::<String>("name").map(String::as_str);
                    LicenseCli::new(ctx)?.use_license(name)
                },
            ));

        ctx.command_line().add_group(group)?;
        Ok(())
    }
}
