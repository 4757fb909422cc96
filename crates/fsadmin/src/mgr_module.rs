//! Manager modules.
//!
//! Module commands are only served by the monitors, not by the manager
//! itself.

use crate::admin::{check_empty, FsAdmin};
use crate::command::Command;
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::response::Response;
use serde::{Deserialize, Serialize};

/// Name of the manager module that runs snapshot mirroring.
pub const MIRRORING_MODULE: &str = "mirroring";

/// A module that is installed but not enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisabledModule {
    pub name: String,
    #[serde(default)]
    pub can_run: bool,
    #[serde(default)]
    pub error_string: String,
}

/// Modules known to the manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    #[serde(default)]
    pub enabled_modules: Vec<String>,
    #[serde(default)]
    pub always_on_modules: Vec<String>,
    #[serde(default)]
    pub disabled_modules: Vec<DisabledModule>,
}

impl ModuleInfo {
    /// True when `module` is running, either enabled or always on.
    pub fn is_active(&self, module: &str) -> bool {
        self.enabled_modules.iter().any(|m| m == module)
            || self.always_on_modules.iter().any(|m| m == module)
    }
}

/// Parse a `mgr module ls` reply.
pub fn parse_module_info(res: Response) -> Result<ModuleInfo> {
    res.no_status().decode()
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Enable a manager module. `force` skips the manager's readiness checks.
    pub fn enable_module(&self, module: &str, force: bool) -> Result<()> {
        let mut cmd = Command::new("mgr module enable").arg("module", module);
        if force {
            cmd = cmd.arg("force", "--force");
        }
        check_empty(self.mon(&cmd))
    }

    /// Disable a manager module.
    pub fn disable_module(&self, module: &str) -> Result<()> {
        check_empty(self.mon(&Command::new("mgr module disable").arg("module", module)))
    }

    /// Modules known to the manager.
    pub fn list_modules(&self) -> Result<ModuleInfo> {
        parse_module_info(self.mon(&Command::new("mgr module ls")))
    }

    /// Enable the module required for snapshot mirroring.
    pub fn enable_mirroring_module(&self, force: bool) -> Result<()> {
        self.enable_module(MIRRORING_MODULE, force)
    }

    /// Disable the snapshot mirroring module.
    pub fn disable_mirroring_module(&self) -> Result<()> {
        self.disable_module(MIRRORING_MODULE)
    }
}
