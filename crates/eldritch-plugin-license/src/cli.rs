//! `eldritch license ...` commands.

use std::sync::Arc;

use eldritch_core::{locate, ContextSource, ExitStatus, RuntimeContext};

use crate::api::LicenseApi;

/// Handlers behind the `license` group.
pub struct LicenseCli {
    ctx: Arc<RuntimeContext>,
    api: Arc<LicenseApi>,
}

impl LicenseCli {
    /// Bind to the context reachable from `start`.
    pub fn new<S: ContextSource + ?Sized>(start: &S) -> eldritch_core::Result<Self> {
        let ctx = locate(start)?;
        let api = ctx.component::<LicenseApi>()?;
        Ok(Self { ctx, api })
    }

    /// Print the available licenses.
    pub fn list(&self) -> anyhow::Result<ExitStatus> {
        let console = self.ctx.console();
        console.blank()?;
        console.println(&console.success("Available licenses:"))?;
        for license in self.api.licenses() {
            console.println(&format!("- {license}"))?;
        }
        console.blank()?;
        Ok(ExitStatus::SUCCESS)
    }

    /// Copy the chosen license's templates into the project.
    ///
    /// Without a name the only bundled license is used; with several to choose
    /// from the caller has to name one.
    pub fn use_license(&self, name: Option<&str>) -> anyhow::Result<ExitStatus> {
        let names = self.api.license_names();
        let name = match (name, names.as_slice()) {
            (Some(name), _) => name.to_string(),
            (None, [only]) => only.clone(),
            (None, _) => {
                self.ctx.console().eprintln(&format!(
                    "Pick a license with --name; available: {}",
                    names.join(", ")
                ))?;
                return Ok(ExitStatus::USAGE);
            }
        };

        let destination = self.api.use_license(&name)?;
        let shown = destination
            .strip_prefix(self.ctx.project_dir())
            .unwrap_or(&destination);
        self.ctx
            .console()
            .println(&format!("Using {name}; templates copied to {}", shown.display()))?;
        Ok(ExitStatus::SUCCESS)
    }
}
