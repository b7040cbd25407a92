//! HUD configuration.
//!
//! Read from `MHUD2.toml` next to the injected library. Every field has a
//! default, so a partial (or empty) file is valid.
//!
//! ```toml
//! stat_window_ms = 4000
//! layout_path = "layout.json"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Config file name looked up beside the DLL
pub const CONFIG_FILE_NAME: &str = "MHUD2.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HudConfig {
    /// Game executable module
    pub module_name: String,
    /// Library exporting the intercepted presentation call
    pub hook_library: String,
    pub hook_symbol: String,
    /// How long a stat change stays highlighted
    pub stat_window_ms: u64,
    /// Upper bound on waiting for the render thread to run cleanup
    pub cleanup_timeout_ms: u64,
    pub cleanup_poll_ms: u64,
    /// Wait after disabling the redirect for in-flight calls to drain
    pub unhook_grace_ms: u64,
    /// JSON override of the compiled-in memory layout
    pub layout_path: Option<PathBuf>,
    /// JSON override of the compiled-in signatures
    pub signatures_path: Option<PathBuf>,
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            module_name: "isaac-ng.exe".to_string(),
            hook_library: "gdi32.dll".to_string(),
            hook_symbol: "SwapBuffers".to_string(),
            stat_window_ms: 2500,
            cleanup_timeout_ms: 5000,
            cleanup_poll_ms: 10,
            unhook_grace_ms: 1000,
            layout_path: None,
            signatures_path: None,
        }
    }
}

impl HudConfig {
    /// Create a new configuration builder
    pub fn builder() -> HudConfigBuilder {
        HudConfigBuilder::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn stat_window(&self) -> Duration {
        Duration::from_millis(self.stat_window_ms)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_millis(self.cleanup_timeout_ms)
    }

    pub fn cleanup_poll(&self) -> Duration {
        Duration::from_millis(self.cleanup_poll_ms.max(1))
    }

    pub fn unhook_grace(&self) -> Duration {
        Duration::from_millis(self.unhook_grace_ms)
    }

    /// Resolve relative override paths against `dir`
    pub fn resolve_paths(mut self, dir: &Path) -> Self {
        self.layout_path = self.layout_path.map(|p| dir.join(p));
        self.signatures_path = self.signatures_path.map(|p| dir.join(p));
        self
    }
}

/// Builder for HudConfig
#[derive(Debug, Clone, Default)]
pub struct HudConfigBuilder {
    module_name: Option<String>,
    hook_library: Option<String>,
    hook_symbol: Option<String>,
    stat_window_ms: Option<u64>,
    cleanup_timeout_ms: Option<u64>,
    cleanup_poll_ms: Option<u64>,
    unhook_grace_ms: Option<u64>,
    layout_path: Option<PathBuf>,
    signatures_path: Option<PathBuf>,
}

impl HudConfigBuilder {
    pub fn module_name<S: Into<String>>(mut self, name: S) -> Self {
        self.module_name = Some(name.into());
        self
    }

    /// Set the library and symbol of the intercepted call
    pub fn hook_target<L: Into<String>, S: Into<String>>(mut self, library: L, symbol: S) -> Self {
        self.hook_library = Some(library.into());
        self.hook_symbol = Some(symbol.into());
        self
    }

    pub fn stat_window(mut self, window: Duration) -> Self {
        self.stat_window_ms = Some(window.as_millis() as u64);
        self
    }

    pub fn cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn cleanup_poll(mut self, interval: Duration) -> Self {
        self.cleanup_poll_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn unhook_grace(mut self, grace: Duration) -> Self {
        self.unhook_grace_ms = Some(grace.as_millis() as u64);
        self
    }

    pub fn layout_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.layout_path = Some(path.into());
        self
    }

    pub fn signatures_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.signatures_path = Some(path.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> HudConfig {
        let default = HudConfig::default();
        HudConfig {
            module_name: self.module_name.unwrap_or(default.module_name),
            hook_library: self.hook_library.unwrap_or(default.hook_library),
            hook_symbol: self.hook_symbol.unwrap_or(default.hook_symbol),
            stat_window_ms: self.stat_window_ms.unwrap_or(default.stat_window_ms),
            cleanup_timeout_ms: self.cleanup_timeout_ms.unwrap_or(default.cleanup_timeout_ms),
            cleanup_poll_ms: self.cleanup_poll_ms.unwrap_or(default.cleanup_poll_ms),
            unhook_grace_ms: self.unhook_grace_ms.unwrap_or(default.unhook_grace_ms),
            layout_path: self.layout_path.or(default.layout_path),
            signatures_path: self.signatures_path.or(default.signatures_path),
        }
    }
}
