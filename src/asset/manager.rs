/*
 *  asset/manager.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Asset manager - registry and three-pass construction
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

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{error, info};

use crate::compute::ComputeManager;
use crate::config::{
    fragment_to_string, load_component_fragments, AssetEntry, AssetsManifest, ConfigError,
};
use crate::error::{CoreError, IdentifierKind};
use crate::plugin::{LoadContext, PluginManager};
use crate::render::RenderManager;
use crate::types::{AssetComponentType, AssetId, AssetType, PluginType};

use super::{Asset, SharedAsset};

/// Everything the loading pass dispatches into. The plugin manager must
/// already be initialized: component construction is entirely
/// plugin-driven.
pub struct LoadServices<'a> {
    pub plugins: &'a PluginManager,
    pub render: &'a RenderManager,
    pub compute: &'a ComputeManager,
}

/// Owns every asset, keyed by id.
///
/// Construction runs in three sequential passes over the manifest:
/// registration (placeholder entries, so later passes can assume map
/// membership), typing (asset objects with declared component slots), and
/// loading (plugin-manufactured components). Any failure rolls the whole
/// registry back.
pub struct AssetManager {
    assets: BTreeMap<AssetId, Option<SharedAsset>>,
}

impl AssetManager {
    pub fn new() -> Self {
        AssetManager {
            assets: BTreeMap::new(),
        }
    }

    pub fn initialize(
        &mut self,
        manifest: &AssetsManifest,
        services: &LoadServices,
    ) -> Result<(), CoreError> {
        if manifest.assets.is_empty() {
            error!("no assets specified in manifest");
            return Err(ConfigError::Validation("no assets specified".into()).into());
        }
        if let Err(e) = self.load_all(manifest, services) {
            error!("failed to initialize all assets");
            self.cleanup();
            return Err(e);
        }
        info!("asset manager initialized ({} assets)", self.assets.len());
        Ok(())
    }

    fn load_all(
        &mut self,
        manifest: &AssetsManifest,
        services: &LoadServices,
    ) -> Result<(), CoreError> {
        // pass 1: registration. Establishes map membership before any
        // construction so the later passes can assume every id is present.
        for entry in &manifest.assets {
            let id = AssetId::from_name(&entry.name);
            if id == AssetId::Unknown {
                error!("'{}' not a recognized asset id", entry.name);
                return Err(CoreError::unknown(IdentifierKind::Asset, entry.name.as_str()));
            }
            if self.assets.contains_key(&id) {
                error!("duplicate asset id '{id}' found in manifest (forbidden)");
                return Err(CoreError::duplicate(IdentifierKind::Asset, id.name()));
            }
            self.assets.insert(id, None);
        }

        // pass 2: typing. Construct each asset and declare its component
        // slots; components stay unloaded.
        for entry in &manifest.assets {
            let ty = AssetType::from_name(&entry.asset_type);
            if ty == AssetType::Unknown {
                error!(
                    "'{}' type '{}' not a recognized asset type",
                    entry.name, entry.asset_type
                );
                return Err(CoreError::unknown(
                    IdentifierKind::AssetType,
                    entry.asset_type.as_str(),
                ));
            }
            let id = AssetId::from_name(&entry.name);
            let mut asset = Asset::new(id, ty);
            asset.initialize(entry)?;
            self.assets.insert(id, Some(Rc::new(RefCell::new(asset))));
        }

        // pass 3: loading. Requires the plugin registry to be populated;
        // components are dispatched in declaration order, so one may read
        // siblings attached just before it.
        for entry in &manifest.assets {
            let id = AssetId::from_name(&entry.name);
            let asset = self
                .assets
                .get(&id)
                .and_then(|a| a.clone())
                .ok_or_else(|| CoreError::not_found(IdentifierKind::Asset, id.name()))?;
            if let Err(e) = self.load_components(entry, &asset, services) {
                error!("could not load components for {id}");
                return Err(e);
            }
        }

        Ok(())
    }

    fn load_components(
        &self,
        entry: &AssetEntry,
        asset: &SharedAsset,
        services: &LoadServices,
    ) -> Result<(), CoreError> {
        let Some(config_path) = entry.config.as_ref() else {
            error!("no config file specified for '{}'", entry.name);
            return Err(ConfigError::Validation(format!(
                "no config file specified for '{}'",
                entry.name
            ))
            .into());
        };
        let fragments = load_component_fragments(config_path)?;

        let ctx = LoadContext {
            render: services.render,
            compute: services.compute,
        };

        for centry in &entry.components {
            let ctype = AssetComponentType::from_name(&centry.component_type);

            let pid = PluginType::from_name(&centry.loading_plugin);
            if pid == PluginType::Unknown {
                error!(
                    "loading plugin '{}' for '{}' not recognized",
                    centry.loading_plugin, entry.name
                );
                return Err(CoreError::unknown(
                    IdentifierKind::Plugin,
                    centry.loading_plugin.as_str(),
                ));
            }

            let Some(plugin) = services.plugins.get(pid) else {
                error!("plugin {pid} not found");
                return Err(CoreError::not_found(IdentifierKind::Plugin, pid.name()));
            };

            let Some(fragment) = fragments.get(&centry.component_type) else {
                error!(
                    "no specification for '{}' found in {}",
                    centry.component_type,
                    config_path.display()
                );
                return Err(ConfigError::Validation(format!(
                    "no specification for '{}' in {}",
                    centry.component_type,
                    config_path.display()
                ))
                .into());
            };
            let config = fragment_to_string(fragment)?;

            plugin.add_asset_component(&ctx, &config, ctype, asset)?;
        }
        Ok(())
    }

    /// Register an asset under an id. Fails on a duplicate; the existing
    /// entry is never replaced.
    pub fn add(&mut self, id: AssetId, asset: SharedAsset) -> Result<(), CoreError> {
        if let Some(Some(_)) = self.assets.get(&id) {
            error!("{id} already exists, asset not added");
            return Err(CoreError::duplicate(IdentifierKind::Asset, id.name()));
        }
        self.assets.insert(id, Some(asset));
        Ok(())
    }

    /// Fetch an asset by id. Misses return None in every build; nothing
    /// is default-constructed.
    pub fn get(&self, id: AssetId) -> Option<SharedAsset> {
        match self.assets.get(&id) {
            Some(Some(asset)) => Some(Rc::clone(asset)),
            _ => {
                error!("could not find asset with id {id}");
                None
            }
        }
    }

    pub fn asset_count(&self) -> usize {
        self.assets.values().filter(|a| a.is_some()).count()
    }

    /// Advance every loaded asset by one frame.
    pub fn update(&mut self) {
        for asset in self.assets.values().flatten() {
            asset.borrow_mut().update();
        }
    }

    /// Release every asset; component destruction cascades per asset.
    pub fn cleanup(&mut self) {
        self.assets.clear();
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::component::{Component, ComponentInfo};
    use crate::config::{AssetEntry, ComponentEntry};
    use crate::plugin::Plugin;
    use std::any::Any;
    use std::fs;
    use std::path::PathBuf;

    struct StubComponent {
        ty: AssetComponentType,
        owner: Option<AssetId>,
    }

    impl Component for StubComponent {
        fn component_type(&self) -> AssetComponentType {
            self.ty
        }
        fn owner(&self) -> Option<AssetId> {
            self.owner
        }
        fn set_owner(&mut self, owner: AssetId) -> Result<(), CoreError> {
            if self.owner.is_some() {
                return Err(CoreError::InvalidState("owner already set".into()));
            }
            self.owner = Some(owner);
            Ok(())
        }
        fn initialize(&mut self, _config: &str, _asset: &Asset) -> Result<(), CoreError> {
            Ok(())
        }
        fn info(&self) -> ComponentInfo {
            ComponentInfo::default()
        }
        fn update(&mut self) {}
        fn cleanup(&mut self) {}
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    struct StubPlugin;

    impl Plugin for StubPlugin {
        fn name(&self) -> &str {
            "Stub"
        }
        fn add_asset_component(
            &self,
            _ctx: &LoadContext,
            config: &str,
            ty: AssetComponentType,
            asset: &SharedAsset,
        ) -> Result<(), CoreError> {
            let mut component = Box::new(StubComponent { ty, owner: None });
            component.initialize(config, &asset.borrow())?;
            asset.borrow_mut().add(ty, component)
        }
        fn cleanup(&mut self) {}
    }

    struct Fixture {
        plugins: PluginManager,
        render: RenderManager,
        compute: ComputeManager,
        _dir: tempfile::TempDir,
        config_path: PathBuf,
    }

    impl Fixture {
        fn new(register_plugin: bool) -> Self {
            let mut plugins = PluginManager::new();
            if register_plugin {
                plugins
                    .add(PluginType::Rigid, Box::new(StubPlugin))
                    .unwrap();
            }
            let mut render = RenderManager::new();
            render.initialize(None);
            let mut compute = ComputeManager::new();
            compute.initialize(None);

            let dir = tempfile::tempdir().unwrap();
            let config_path = dir.path().join("apple.yaml");
            fs::write(&config_path, "Geometry: {}\nRender: {}\n").unwrap();

            Fixture {
                plugins,
                render,
                compute,
                _dir: dir,
                config_path,
            }
        }

        fn services(&self) -> LoadServices<'_> {
            LoadServices {
                plugins: &self.plugins,
                render: &self.render,
                compute: &self.compute,
            }
        }

        fn entry(&self, name: &str, plugin: &str) -> AssetEntry {
            AssetEntry {
                name: name.into(),
                asset_type: "Rigid".into(),
                config: Some(self.config_path.clone()),
                components: vec![ComponentEntry {
                    component_type: "Geometry".into(),
                    loading_plugin: plugin.into(),
                }],
            }
        }
    }

    #[test]
    fn test_three_pass_initialize_attaches_components() {
        let fx = Fixture::new(true);
        let manifest = AssetsManifest {
            assets: vec![fx.entry("Apple", "Rigid")],
        };
        let mut am = AssetManager::new();
        am.initialize(&manifest, &fx.services()).unwrap();

        let asset = am.get(AssetId::Apple).unwrap();
        let borrowed = asset.borrow();
        assert_eq!(borrowed.asset_type(), AssetType::Rigid);
        let component = borrowed.get(AssetComponentType::Geometry).unwrap();
        assert_eq!(component.owner(), Some(AssetId::Apple));
        assert!(borrowed.is_loaded());
    }

    #[test]
    fn test_duplicate_asset_rolls_back_everything() {
        let fx = Fixture::new(true);
        let manifest = AssetsManifest {
            assets: vec![fx.entry("Apple", "Rigid"), fx.entry("Apple", "Rigid")],
        };
        let mut am = AssetManager::new();
        let err = am.initialize(&manifest, &fx.services()).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateRegistration { .. }));
        assert_eq!(am.asset_count(), 0);
        assert!(am.get(AssetId::Apple).is_none());
    }

    #[test]
    fn test_unknown_asset_name_fails() {
        let fx = Fixture::new(true);
        let manifest = AssetsManifest {
            assets: vec![fx.entry("Banana", "Rigid")],
        };
        let mut am = AssetManager::new();
        let err = am.initialize(&manifest, &fx.services()).unwrap_err();
        assert!(matches!(err, CoreError::UnknownIdentifier { .. }));
    }

    #[test]
    fn test_unknown_asset_type_fails() {
        let fx = Fixture::new(true);
        let mut entry = fx.entry("Apple", "Rigid");
        entry.asset_type = "Gelatinous".into();
        let manifest = AssetsManifest {
            assets: vec![entry],
        };
        let mut am = AssetManager::new();
        let err = am.initialize(&manifest, &fx.services()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::UnknownIdentifier {
                kind: IdentifierKind::AssetType,
                ..
            }
        ));
        assert_eq!(am.asset_count(), 0);
    }

    #[test]
    fn test_plugin_not_registered_fails_cleanly_with_rollback() {
        // loading before the referenced plugin exists must fail, not crash
        let fx = Fixture::new(false);
        let manifest = AssetsManifest {
            assets: vec![fx.entry("Apple", "Rigid")],
        };
        let mut am = AssetManager::new();
        let err = am.initialize(&manifest, &fx.services()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert_eq!(am.asset_count(), 0);
    }

    #[test]
    fn test_unknown_loading_plugin_fails() {
        let fx = Fixture::new(true);
        let manifest = AssetsManifest {
            assets: vec![fx.entry("Apple", "Mystery")],
        };
        let mut am = AssetManager::new();
        let err = am.initialize(&manifest, &fx.services()).unwrap_err();
        assert!(matches!(err, CoreError::UnknownIdentifier { .. }));
        assert_eq!(am.asset_count(), 0);
    }

    #[test]
    fn test_missing_fragment_fails() {
        let fx = Fixture::new(true);
        let mut entry = fx.entry("Apple", "Rigid");
        entry.components.push(ComponentEntry {
            component_type: "Physics".into(),
            loading_plugin: "Rigid".into(),
        });
        // apple.yaml has no Physics fragment
        let manifest = AssetsManifest {
            assets: vec![entry],
        };
        let mut am = AssetManager::new();
        let err = am.initialize(&manifest, &fx.services()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
        assert_eq!(am.asset_count(), 0);
    }

    #[test]
    fn test_add_and_get_registry_semantics() {
        let mut am = AssetManager::new();
        let apple = Rc::new(RefCell::new(Asset::new(AssetId::Apple, AssetType::Rigid)));
        am.add(AssetId::Apple, Rc::clone(&apple)).unwrap();

        let again = Rc::new(RefCell::new(Asset::new(AssetId::Apple, AssetType::Rigid)));
        let err = am.add(AssetId::Apple, again).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateRegistration { .. }));

        assert!(am.get(AssetId::Apple).is_some());
        assert!(am.get(AssetId::Melon).is_none());
    }

    #[test]
    fn test_empty_manifest_rejected() {
        let fx = Fixture::new(true);
        let manifest = AssetsManifest { assets: vec![] };
        let mut am = AssetManager::new();
        assert!(am.initialize(&manifest, &fx.services()).is_err());
    }
}
