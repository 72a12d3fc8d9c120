/*
 *  plugin/manager.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Plugin manager - library discovery, entry-point dispatch, registry
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::path::PathBuf;

use libloading::Symbol;
use log::{error, info, warn};

use crate::config::{ConfigError, PluginEntry, PluginsManifest};
use crate::error::{CoreError, IdentifierKind};
use crate::types::PluginType;

use super::adapter::{host_register_plugin, RegistrationSlot};
use super::ffi::{ChironRegistrar, StartPluginFn, START_PLUGIN_SYMBOL};
use super::shared_lib::SharedLibrary;
use super::Plugin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initialized,
    Cleaned,
}

/// Owns every loaded plugin library and the plugins they registered.
///
/// Lifecycle is `Uninitialized -> Initialized -> Cleaned`, terminal at
/// Cleaned. Plugins never construct themselves host-side: each library's
/// `StartPlugin` entry point registers exactly one instance through the
/// registrar, and `add` is the only door into the registry.
pub struct PluginManager {
    state: State,
    libs: BTreeMap<PluginType, SharedLibrary>,
    plugins: BTreeMap<PluginType, Box<dyn Plugin>>,
}

impl PluginManager {
    pub fn new() -> Self {
        PluginManager {
            state: State::Uninitialized,
            libs: BTreeMap::new(),
            plugins: BTreeMap::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state == State::Initialized
    }

    /// Load every library named in the manifest and run its entry point.
    /// All-or-nothing: the first failure rolls back everything loaded so
    /// far via `cleanup`.
    pub fn initialize(&mut self, manifest: &PluginsManifest) -> Result<(), CoreError> {
        match self.state {
            State::Uninitialized => {}
            State::Initialized => {
                return Err(CoreError::InvalidState(
                    "plugin manager already initialized".into(),
                ));
            }
            State::Cleaned => {
                return Err(CoreError::InvalidState(
                    "plugin manager cannot be re-initialized after cleanup".into(),
                ));
            }
        }

        if manifest.count == 0 {
            error!("plugins manifest declares no plugins");
            self.cleanup();
            return Err(ConfigError::Validation("plugins manifest declares no plugins".into()).into());
        }
        if manifest.count != manifest.plugins.len() {
            error!(
                "plugins manifest declares {} entries but lists {}",
                manifest.count,
                manifest.plugins.len()
            );
            self.cleanup();
            return Err(ConfigError::Validation(format!(
                "plugin count mismatch: declared {}, listed {}",
                manifest.count,
                manifest.plugins.len()
            ))
            .into());
        }

        // load all libraries first, then start each plugin, mirroring the
        // two phases of registration and dispatch
        for entry in &manifest.plugins {
            if let Err(e) = self.add_library(entry) {
                error!("could not add plugin library '{}'", entry.name);
                self.cleanup();
                return Err(e);
            }
        }

        let types: Vec<PluginType> = self.libs.keys().copied().collect();
        for ty in types {
            if let Err(e) = self.start_plugin(ty) {
                error!("could not start plugin {ty}");
                self.cleanup();
                return Err(e);
            }
        }

        self.state = State::Initialized;
        info!("plugin manager initialized ({} plugins)", self.plugins.len());
        Ok(())
    }

    /// Register a plugin instance under a type. Fails on a duplicate; the
    /// existing instance is never replaced.
    pub fn add(&mut self, id: PluginType, plugin: Box<dyn Plugin>) -> Result<(), CoreError> {
        if self.plugins.contains_key(&id) {
            error!("{id} already exists, plugin not added");
            return Err(CoreError::duplicate(IdentifierKind::Plugin, id.name()));
        }
        self.plugins.insert(id, plugin);
        Ok(())
    }

    /// Fetch the registered plugin for a type. Misses return None in
    /// every build; nothing is default-constructed.
    pub fn get(&self, id: PluginType) -> Option<&dyn Plugin> {
        match self.plugins.get(&id) {
            Some(p) => Some(p.as_ref()),
            None => {
                warn!("could not find {id} plugin");
                None
            }
        }
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Tear down the registry, plugins strictly before libraries: every
    /// plugin's vtable lives in its library's mapped code, so the reverse
    /// order would leave dangling function pointers mid-destruction.
    /// Library-unload failures degrade to warnings.
    pub fn cleanup(&mut self) {
        for (_, plugin) in self.plugins.iter_mut() {
            plugin.cleanup();
        }
        self.plugins.clear();

        for (ty, lib) in self.libs.iter_mut() {
            if let Err(e) = lib.unload() {
                warn!("{ty} library could not be unloaded: {e}");
            }
        }
        self.libs.clear();
        self.state = State::Cleaned;
    }

    /// Compute the on-disk filename for a plugin name on this platform:
    /// `lib<Name>[-debug].<suffix>` (no `lib` prefix on Windows).
    pub fn library_filename(name: &str) -> String {
        let debug = if cfg!(debug_assertions) { "-debug" } else { "" };

        if cfg!(target_os = "windows") {
            format!("{name}{debug}.dll")
        } else if cfg!(target_os = "macos") {
            format!("lib{name}{debug}.dylib")
        } else {
            format!("lib{name}{debug}.so")
        }
    }

    fn add_library(&mut self, entry: &PluginEntry) -> Result<(), CoreError> {
        let id = PluginType::from_name(&entry.name);
        if id == PluginType::Unknown {
            error!("plugin name '{}' not recognizable", entry.name);
            return Err(CoreError::unknown(IdentifierKind::Plugin, entry.name.as_str()));
        }
        if self.libs.contains_key(&id) {
            warn!("'{}' already exists, library not added", entry.name);
            return Err(CoreError::duplicate(IdentifierKind::Plugin, entry.name.as_str()));
        }

        let mut path = entry.location.clone().unwrap_or_else(PathBuf::new);
        path.push(Self::library_filename(&entry.name));

        let lib = SharedLibrary::load(&path)?;
        self.libs.insert(id, lib);
        Ok(())
    }

    /// Resolve and invoke `StartPlugin` for a loaded library. The entry
    /// point deposits its registration through the registrar; the deposit
    /// then goes through `add` with the usual duplicate rules.
    fn start_plugin(&mut self, id: PluginType) -> Result<(), CoreError> {
        let lib = self
            .libs
            .get(&id)
            .ok_or_else(|| CoreError::not_found(IdentifierKind::Plugin, id.name()))?;

        let start: Symbol<StartPluginFn> = unsafe { lib.get(START_PLUGIN_SYMBOL) }
            .ok_or_else(|| {
                error!("function 'StartPlugin' not found in {id} library");
                CoreError::MissingEntryPoint {
                    symbol: "StartPlugin".into(),
                    library: lib.path().display().to_string(),
                }
            })?;

        let mut slot = RegistrationSlot {
            expected: id,
            result: None,
        };
        let registrar = ChironRegistrar {
            host: (&mut slot) as *mut RegistrationSlot as *mut c_void,
            register: host_register_plugin,
        };

        let status = start(id.into(), &registrar);
        drop(start);

        if status == 0 {
            return Err(CoreError::PluginContract {
                plugin: id.name().into(),
                detail: "entry point reported failure".into(),
            });
        }
        let Some(adapter) = slot.result.take() else {
            return Err(CoreError::PluginContract {
                plugin: id.name().into(),
                detail: "entry point registered no plugin".into(),
            });
        };

        self.add(id, Box::new(adapter))?;
        info!("plugin {id} registered");
        Ok(())
    }
}

impl Default for PluginManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if self.state != State::Cleaned {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::SharedAsset;
    use crate::plugin::LoadContext;
    use crate::types::AssetComponentType;
    use std::cell::Cell;
    use std::rc::Rc;

    struct StubPlugin {
        name: String,
        dropped: Rc<Cell<bool>>,
        cleaned: Rc<Cell<bool>>,
    }

    impl StubPlugin {
        fn boxed(name: &str) -> (Box<dyn Plugin>, Rc<Cell<bool>>, Rc<Cell<bool>>) {
            let dropped = Rc::new(Cell::new(false));
            let cleaned = Rc::new(Cell::new(false));
            (
                Box::new(StubPlugin {
                    name: name.to_string(),
                    dropped: Rc::clone(&dropped),
                    cleaned: Rc::clone(&cleaned),
                }),
                dropped,
                cleaned,
            )
        }
    }

    impl Plugin for StubPlugin {
        fn name(&self) -> &str {
            &self.name
        }
        fn add_asset_component(
            &self,
            _ctx: &LoadContext,
            _config: &str,
            _ty: AssetComponentType,
            _asset: &SharedAsset,
        ) -> Result<(), CoreError> {
            Ok(())
        }
        fn cleanup(&mut self) {
            self.cleaned.set(true);
        }
    }

    impl Drop for StubPlugin {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    #[test]
    fn test_library_filename_decoration() {
        let name = PluginManager::library_filename("Rigid");
        #[cfg(target_os = "linux")]
        {
            if cfg!(debug_assertions) {
                assert_eq!(name, "libRigid-debug.so");
            } else {
                assert_eq!(name, "libRigid.so");
            }
        }
        #[cfg(target_os = "macos")]
        assert!(name.ends_with(".dylib") && name.starts_with("libRigid"));
        #[cfg(target_os = "windows")]
        assert!(name.ends_with(".dll") && name.starts_with("Rigid"));
    }

    #[test]
    fn test_add_rejects_duplicate_and_keeps_first() {
        let mut pm = PluginManager::new();
        let (first, first_dropped, _) = StubPlugin::boxed("first");
        let (second, second_dropped, _) = StubPlugin::boxed("second");

        pm.add(PluginType::Rigid, first).unwrap();
        let err = pm.add(PluginType::Rigid, second).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateRegistration { .. }));

        // the rejected instance was dropped, the original kept
        assert!(second_dropped.get());
        assert!(!first_dropped.get());
        assert_eq!(pm.get(PluginType::Rigid).unwrap().name(), "first");
    }

    #[test]
    fn test_get_miss_returns_none() {
        let pm = PluginManager::new();
        assert!(pm.get(PluginType::CudaXfem).is_none());
    }

    #[test]
    fn test_cleanup_runs_plugin_cleanup_before_drop() {
        let mut pm = PluginManager::new();
        let (plugin, dropped, cleaned) = StubPlugin::boxed("stub");
        pm.add(PluginType::CpuMsd, plugin).unwrap();

        pm.cleanup();
        assert!(cleaned.get());
        assert!(dropped.get());
        assert_eq!(pm.plugin_count(), 0);
    }

    #[test]
    fn test_no_reinitialization_after_cleanup() {
        let mut pm = PluginManager::new();
        pm.cleanup();
        let manifest = PluginsManifest {
            count: 0,
            plugins: vec![],
        };
        let err = pm.initialize(&manifest).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn test_count_mismatch_fails_and_cleans() {
        let mut pm = PluginManager::new();
        let manifest = PluginsManifest {
            count: 3,
            plugins: vec![PluginEntry {
                name: "Rigid".into(),
                location: None,
            }],
        };
        let err = pm.initialize(&manifest).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        assert!(!pm.is_initialized());
    }

    #[test]
    fn test_unknown_plugin_name_fails() {
        let mut pm = PluginManager::new();
        let manifest = PluginsManifest {
            count: 1,
            plugins: vec![PluginEntry {
                name: "Squishy".into(),
                location: None,
            }],
        };
        let err = pm.initialize(&manifest).unwrap_err();
        assert!(matches!(err, CoreError::UnknownIdentifier { .. }));
    }

    #[test]
    fn test_missing_library_fails_with_loader_diagnostic() {
        let mut pm = PluginManager::new();
        let manifest = PluginsManifest {
            count: 1,
            plugins: vec![PluginEntry {
                name: "Rigid".into(),
                location: Some(PathBuf::from("/nonexistent")),
            }],
        };
        let err = pm.initialize(&manifest).unwrap_err();
        assert!(matches!(err, CoreError::Load { .. }));
        assert_eq!(pm.plugin_count(), 0);
    }
}
