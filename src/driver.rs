/*
 *  driver.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Composition root - ordered manager bring-up and reverse teardown
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

//! The composition root.
//!
//! One Driver owns everything: the externally-facing managers (event,
//! render, compute) behind the registry, plus the plugin and asset
//! managers as typed fields. Initialization order is written out here and
//! is load-bearing; it is never derived from the registry map. Teardown
//! runs in strict reverse.

use std::any::Any;
use std::collections::BTreeMap;

use log::{error, info, warn};

use crate::asset::manager::LoadServices;
use crate::asset::{AssetManager, SharedAsset};
use crate::compute::ComputeManager;
use crate::config::{AssetsManifest, Config, PluginsManifest};
use crate::error::{CoreError, IdentifierKind};
use crate::events::{Event, EventKind, EventListener, EventManager};
use crate::plugin::{Plugin, PluginManager};
use crate::render::RenderManager;
use crate::types::{AssetId, ManagerType, PluginType};
use crate::uid::UidGenerator;

/// A manager owned by the registry. Initialization stays on the concrete
/// types (each takes different settings); the trait carries what the
/// registry needs for lookup and teardown.
pub trait Manager {
    fn manager_type(&self) -> ManagerType;
    fn cleanup(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Manager for EventManager {
    fn manager_type(&self) -> ManagerType {
        ManagerType::EventManager
    }
    fn cleanup(&mut self) {
        EventManager::cleanup(self);
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Manager for RenderManager {
    fn manager_type(&self) -> ManagerType {
        ManagerType::RenderManager
    }
    fn cleanup(&mut self) {
        RenderManager::cleanup(self);
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Manager for ComputeManager {
    fn manager_type(&self) -> ManagerType {
        ManagerType::ComputeManager
    }
    fn cleanup(&mut self) {
        ComputeManager::cleanup(self);
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Name-keyed ownership of the external managers. Insertion rejects
/// duplicates; iteration order follows `ManagerType` declaration order,
/// which matches bring-up order, so teardown walks it in reverse.
pub struct ManagerRegistry {
    managers: BTreeMap<ManagerType, Box<dyn Manager>>,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        ManagerRegistry {
            managers: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, manager: Box<dyn Manager>) -> Result<(), CoreError> {
        let ty = manager.manager_type();
        if self.managers.contains_key(&ty) {
            error!("{ty} already present in manager registry");
            return Err(CoreError::duplicate(IdentifierKind::Manager, ty.name()));
        }
        self.managers.insert(ty, manager);
        Ok(())
    }

    pub fn get(&self, ty: ManagerType) -> Option<&dyn Manager> {
        self.managers.get(&ty).map(|m| m.as_ref())
    }

    pub fn get_as<T: 'static>(&self, ty: ManagerType) -> Option<&T> {
        self.managers
            .get(&ty)
            .and_then(|m| m.as_any().downcast_ref::<T>())
    }

    pub fn get_as_mut<T: 'static>(&mut self, ty: ManagerType) -> Option<&mut T> {
        self.managers
            .get_mut(&ty)
            .and_then(|m| m.as_any_mut().downcast_mut::<T>())
    }

    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }

    /// Clean every manager in reverse bring-up order, then drop them.
    pub fn cleanup(&mut self) {
        for (ty, manager) in self.managers.iter_mut().rev() {
            info!("cleaning up {ty}");
            manager.cleanup();
        }
        self.managers.clear();
    }
}

impl Default for ManagerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Uninitialized,
    Running,
    Cleaned,
}

/// Process-wide composition root. Constructed by `main` (never a global)
/// and handed by reference to anything that needs cross-cutting lookup.
pub struct Driver {
    state: DriverState,
    run_flag: bool,
    steps: Option<u64>,
    uid: UidGenerator,
    registry: ManagerRegistry,
    plugin_manager: PluginManager,
    asset_manager: AssetManager,
}

impl Driver {
    pub fn new(seed: u64) -> Self {
        Driver {
            state: DriverState::Uninitialized,
            run_flag: false,
            steps: None,
            uid: UidGenerator::new(seed),
            registry: ManagerRegistry::new(),
            plugin_manager: PluginManager::new(),
            asset_manager: AssetManager::new(),
        }
    }

    /// Bring up every subsystem, in order: events first (everything later
    /// may post), then the render and compute capabilities, then plugins
    /// (assets need them), then assets. Any failure tears down whatever
    /// came up and leaves the driver cleaned.
    pub fn initialize(&mut self, config: &Config) -> Result<(), CoreError> {
        if self.state != DriverState::Uninitialized {
            return Err(CoreError::InvalidState(
                "driver already initialized".into(),
            ));
        }
        if let Err(e) = self.initialize_inner(config) {
            error!("driver initialization failed: {e}");
            self.cleanup();
            return Err(e);
        }
        self.state = DriverState::Running;
        self.run_flag = true;
        Ok(())
    }

    fn initialize_inner(&mut self, config: &Config) -> Result<(), CoreError> {
        self.steps = config.steps;

        let mut events = EventManager::new();
        events.initialize(config.events.as_ref());
        self.registry.add(Box::new(events))?;

        let mut render = RenderManager::new();
        render.initialize(config.render.as_ref());
        self.registry.add(Box::new(render))?;

        let mut compute = ComputeManager::new();
        compute.initialize(config.compute.as_ref());
        self.registry.add(Box::new(compute))?;

        match config.plugins.as_ref() {
            Some(path) => {
                let manifest = PluginsManifest::from_file(path)?;
                self.plugin_manager.initialize(&manifest)?;
            }
            None => warn!("no plugins manifest configured; scene will be empty"),
        }

        match config.assets.as_ref() {
            Some(path) => {
                let manifest = AssetsManifest::from_file(path)?;
                let render = self
                    .registry
                    .get_as::<RenderManager>(ManagerType::RenderManager)
                    .ok_or_else(|| {
                        CoreError::not_found(IdentifierKind::Manager, "RenderManager")
                    })?;
                let compute = self
                    .registry
                    .get_as::<ComputeManager>(ManagerType::ComputeManager)
                    .ok_or_else(|| {
                        CoreError::not_found(IdentifierKind::Manager, "ComputeManager")
                    })?;
                let services = LoadServices {
                    plugins: &self.plugin_manager,
                    render,
                    compute,
                };
                self.asset_manager.initialize(&manifest, &services)?;
            }
            None => warn!("no assets manifest configured"),
        }

        info!("driver initialized");
        Ok(())
    }

    /// The cooperative main loop: pump events, advance every asset, stop
    /// on a Quit event or once the step budget is exhausted.
    pub fn run(&mut self) {
        if self.state != DriverState::Running {
            warn!("run called on a driver that is not running");
            return;
        }
        let mut frame: u64 = 0;
        while self.run_flag {
            if let Some(events) = self
                .registry
                .get_as_mut::<EventManager>(ManagerType::EventManager)
            {
                if events.pump() {
                    info!("quit event received");
                    break;
                }
            }

            self.asset_manager.update();

            frame += 1;
            if let Some(budget) = self.steps {
                if frame >= budget {
                    info!("step budget of {budget} frames reached");
                    break;
                }
            }
        }
    }

    /// Request the main loop to stop at the end of the current frame.
    pub fn quit(&mut self) {
        self.run_flag = false;
        self.post_event(EventKind::Quit);
    }

    /// Post an event on behalf of the host (source id zero). Returns
    /// false when the queue is full or the event manager is gone.
    pub fn post_event(&mut self, kind: EventKind) -> bool {
        match self
            .registry
            .get_as_mut::<EventManager>(ManagerType::EventManager)
        {
            Some(events) => events.queue_event(Event { kind, source: 0 }),
            None => false,
        }
    }

    /// Register an event listener under a freshly drawn unique id.
    /// Returns the id needed to remove it later.
    pub fn add_event_listener(&mut self, listener: EventListener) -> Option<u32> {
        let id = self.uid.unique_id();
        let events = self
            .registry
            .get_as_mut::<EventManager>(ManagerType::EventManager)?;
        events.add_listener(id, listener).then_some(id)
    }

    pub fn remove_event_listener(&mut self, id: u32) -> bool {
        match self
            .registry
            .get_as_mut::<EventManager>(ManagerType::EventManager)
        {
            Some(events) => events.remove_listener(id),
            None => false,
        }
    }

    /// Tear down in strict reverse bring-up order: assets (components
    /// drop while their plugins' code is still mapped), then plugins
    /// (instances drop before their libraries unload), then the external
    /// managers.
    pub fn cleanup(&mut self) {
        self.run_flag = false;
        self.asset_manager.cleanup();
        self.plugin_manager.cleanup();
        self.registry.cleanup();
        self.state = DriverState::Cleaned;
    }

    // cross-cutting lookup used by components and plugins during loading

    pub fn get_plugin(&self, id: PluginType) -> Option<&dyn Plugin> {
        self.plugin_manager.get(id)
    }

    pub fn get_asset(&self, id: AssetId) -> Option<SharedAsset> {
        self.asset_manager.get(id)
    }

    pub fn add_plugin(&mut self, id: PluginType, plugin: Box<dyn Plugin>) -> Result<(), CoreError> {
        self.plugin_manager.add(id, plugin)
    }

    pub fn add_asset(&mut self, id: AssetId, asset: SharedAsset) -> Result<(), CoreError> {
        self.asset_manager.add(id, asset)
    }

    pub fn uid(&self) -> &UidGenerator {
        &self.uid
    }

    pub fn plugin_manager(&self) -> &PluginManager {
        &self.plugin_manager
    }

    pub fn asset_manager(&self) -> &AssetManager {
        &self.asset_manager
    }

    pub fn registry(&self) -> &ManagerRegistry {
        &self.registry
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if self.state != DriverState::Cleaned {
            self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = ManagerRegistry::new();
        let mut first = EventManager::new();
        first.initialize(None);
        registry.add(Box::new(first)).unwrap();

        let err = registry.add(Box::new(EventManager::new())).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateRegistration { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_typed_lookup() {
        let mut registry = ManagerRegistry::new();
        registry.add(Box::new(RenderManager::new())).unwrap();
        assert!(registry
            .get_as::<RenderManager>(ManagerType::RenderManager)
            .is_some());
        // wrong concrete type misses
        assert!(registry
            .get_as::<ComputeManager>(ManagerType::RenderManager)
            .is_none());
        assert!(registry.get(ManagerType::AssetManager).is_none());
    }

    #[test]
    fn test_empty_config_brings_up_empty_scene() {
        let mut driver = Driver::new(1);
        driver.initialize(&Config::default()).unwrap();
        assert_eq!(driver.registry().len(), 3);
        assert!(driver.get_asset(AssetId::Apple).is_none());
        assert!(driver.get_plugin(PluginType::Rigid).is_none());
        driver.cleanup();
        assert!(driver.registry().is_empty());
    }

    #[test]
    fn test_run_respects_step_budget() {
        let mut driver = Driver::new(1);
        let config = Config {
            steps: Some(3),
            ..Default::default()
        };
        driver.initialize(&config).unwrap();
        // returns instead of spinning forever
        driver.run();
        driver.cleanup();
    }

    #[test]
    fn test_quit_stops_the_loop() {
        let mut driver = Driver::new(1);
        driver.initialize(&Config::default()).unwrap();
        driver.quit();
        driver.run();
        driver.cleanup();
    }

    #[test]
    fn test_event_listeners_reach_posted_events() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut driver = Driver::new(1);
        let config = Config {
            steps: Some(1),
            ..Default::default()
        };
        driver.initialize(&config).unwrap();

        let seen = Rc::new(Cell::new(0u32));
        let sink = Rc::clone(&seen);
        let id = driver
            .add_event_listener(Box::new(move |_| sink.set(sink.get() + 1)))
            .unwrap();
        assert_ne!(id, 0);

        assert!(driver.post_event(EventKind::Custom(7)));
        driver.run();
        assert_eq!(seen.get(), 1);

        assert!(driver.remove_event_listener(id));
        assert!(!driver.remove_event_listener(id));
        driver.cleanup();
    }

    #[test]
    fn test_reinitialization_rejected() {
        let mut driver = Driver::new(1);
        driver.initialize(&Config::default()).unwrap();
        let err = driver.initialize(&Config::default()).unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[test]
    fn test_failed_initialize_cleans_everything() {
        let mut driver = Driver::new(1);
        let config = Config {
            plugins: Some("/nonexistent/plugins.yaml".into()),
            ..Default::default()
        };
        assert!(driver.initialize(&config).is_err());
        assert!(driver.registry().is_empty());
        // terminal: cannot be brought back up
        assert!(driver.initialize(&Config::default()).is_err());
    }
}
