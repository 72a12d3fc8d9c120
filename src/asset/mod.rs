/*
 *  asset/mod.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Asset - a simulated entity composed from typed components
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

pub mod component;
pub mod geometry;
pub mod manager;

pub use component::{Component, ComponentInfo};
pub use geometry::Geometry;
pub use manager::AssetManager;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::{error, info};

use crate::config::{AssetEntry, ConfigError};
use crate::error::{CoreError, IdentifierKind};
use crate::types::{AssetComponentType, AssetId, AssetType};

/// Shared handle to an asset. The asset registry and the driver's
/// cross-cutting lookup both hand these out; component back-references
/// use the asset id instead, so nothing but the registry keeps one alive.
pub type SharedAsset = Rc<RefCell<Asset>>;

/// A simulated entity. Composed from at most one component per
/// `AssetComponentType`; slots are declared up front from the manifest and
/// filled during the loading pass by plugins.
pub struct Asset {
    id: AssetId,
    asset_type: AssetType,
    components: BTreeMap<AssetComponentType, Option<Box<dyn Component>>>,
}

impl Asset {
    pub fn new(id: AssetId, asset_type: AssetType) -> Self {
        Asset {
            id,
            asset_type,
            components: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// Declare one empty slot per component listed in the manifest entry.
    /// A repeated component type is forbidden.
    pub fn initialize(&mut self, entry: &AssetEntry) -> Result<(), CoreError> {
        if entry.components.is_empty() {
            error!("no components specified for '{}'", entry.name);
            return Err(ConfigError::Validation(format!(
                "no components specified for '{}'",
                entry.name
            ))
            .into());
        }

        for centry in &entry.components {
            let cid = AssetComponentType::from_name(&centry.component_type);
            if cid == AssetComponentType::Unknown {
                error!(
                    "component type '{}' for '{}' not recognized",
                    centry.component_type, entry.name
                );
                return Err(CoreError::unknown(
                    IdentifierKind::Component,
                    centry.component_type.as_str(),
                ));
            }
            if self.components.contains_key(&cid) {
                error!(
                    "duplicate component of type '{cid}' specified for '{}' (forbidden)",
                    entry.name
                );
                return Err(CoreError::duplicate(IdentifierKind::Component, cid.name()));
            }
            self.components.insert(cid, None);
        }

        info!("asset '{}' initialized", entry.name);
        Ok(())
    }

    /// Attach a component under a type. The slot must not already hold a
    /// component; a component is never silently replaced. Stamps the owner
    /// back-reference exactly once.
    pub fn add(
        &mut self,
        id: AssetComponentType,
        mut component: Box<dyn Component>,
    ) -> Result<(), CoreError> {
        if let Some(Some(_)) = self.components.get(&id) {
            error!("{} already has a {id} component", self.id);
            return Err(CoreError::duplicate(IdentifierKind::Component, id.name()));
        }
        component.set_owner(self.id)?;
        self.components.insert(id, Some(component));
        Ok(())
    }

    /// True when a component is attached under this type.
    pub fn has(&self, id: AssetComponentType) -> bool {
        matches!(self.components.get(&id), Some(Some(_)))
    }

    /// Fetch a component by type. Misses return None in every build.
    pub fn get(&self, id: AssetComponentType) -> Option<&dyn Component> {
        match self.components.get(&id) {
            Some(Some(c)) => Some(c.as_ref()),
            _ => {
                error!("component {id} not found on {}", self.id);
                None
            }
        }
    }

    pub fn get_mut(&mut self, id: AssetComponentType) -> Option<&mut dyn Component> {
        match self.components.get_mut(&id) {
            Some(Some(c)) => Some(c.as_mut()),
            _ => None,
        }
    }

    /// Typed accessor: fetch and downcast to a concrete component.
    pub fn get_as<T: 'static>(&self, id: AssetComponentType) -> Option<&T> {
        self.get(id).and_then(|c| c.as_any().downcast_ref::<T>())
    }

    /// Declared slot types, attached or not, in type order.
    pub fn declared(&self) -> Vec<AssetComponentType> {
        self.components.keys().copied().collect()
    }

    /// True once every declared slot holds a component.
    pub fn is_loaded(&self) -> bool {
        !self.components.is_empty() && self.components.values().all(|c| c.is_some())
    }

    pub fn update(&mut self) {
        for component in self.components.values_mut().flatten() {
            component.update();
        }
    }

    /// Release every component, each cleaned before it is dropped.
    pub fn cleanup(&mut self) {
        for component in self.components.values_mut().flatten() {
            component.cleanup();
        }
        self.components.clear();
    }
}

impl Drop for Asset {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ComponentEntry;
    use std::any::Any;

    struct StubComponent {
        ty: AssetComponentType,
        owner: Option<AssetId>,
    }

    impl StubComponent {
        fn new(ty: AssetComponentType) -> Box<Self> {
            Box::new(StubComponent { ty, owner: None })
        }
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

    fn entry(components: &[(&str, &str)]) -> AssetEntry {
        AssetEntry {
            name: "Apple".into(),
            asset_type: "Rigid".into(),
            config: None,
            components: components
                .iter()
                .map(|(t, p)| ComponentEntry {
                    component_type: t.to_string(),
                    loading_plugin: p.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_initialize_declares_slots() {
        let mut asset = Asset::new(AssetId::Apple, AssetType::Rigid);
        asset
            .initialize(&entry(&[("Geometry", "Rigid"), ("Render", "Rigid")]))
            .unwrap();
        assert_eq!(
            asset.declared(),
            vec![AssetComponentType::Geometry, AssetComponentType::Render]
        );
        assert!(!asset.is_loaded());
    }

    #[test]
    fn test_initialize_rejects_duplicate_declaration() {
        let mut asset = Asset::new(AssetId::Apple, AssetType::Rigid);
        let err = asset
            .initialize(&entry(&[("Geometry", "Rigid"), ("Geometry", "Rigid")]))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateRegistration { .. }));
    }

    #[test]
    fn test_initialize_rejects_unknown_type() {
        let mut asset = Asset::new(AssetId::Apple, AssetType::Rigid);
        let err = asset.initialize(&entry(&[("Tentacle", "Rigid")])).unwrap_err();
        assert!(matches!(err, CoreError::UnknownIdentifier { .. }));
    }

    #[test]
    fn test_initialize_rejects_empty_component_list() {
        let mut asset = Asset::new(AssetId::Apple, AssetType::Rigid);
        assert!(asset.initialize(&entry(&[])).is_err());
    }

    #[test]
    fn test_add_stamps_owner_once() {
        let mut asset = Asset::new(AssetId::Apple, AssetType::Rigid);
        asset.initialize(&entry(&[("Geometry", "Rigid")])).unwrap();
        asset
            .add(
                AssetComponentType::Geometry,
                StubComponent::new(AssetComponentType::Geometry),
            )
            .unwrap();
        let c = asset.get(AssetComponentType::Geometry).unwrap();
        assert_eq!(c.owner(), Some(AssetId::Apple));
        assert!(asset.is_loaded());
    }

    #[test]
    fn test_add_rejects_occupied_slot() {
        let mut asset = Asset::new(AssetId::Apple, AssetType::Rigid);
        asset.initialize(&entry(&[("Geometry", "Rigid")])).unwrap();
        asset
            .add(
                AssetComponentType::Geometry,
                StubComponent::new(AssetComponentType::Geometry),
            )
            .unwrap();
        let err = asset
            .add(
                AssetComponentType::Geometry,
                StubComponent::new(AssetComponentType::Geometry),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateRegistration { .. }));
        // the first component is untouched
        assert!(asset.get(AssetComponentType::Geometry).is_some());
    }

    #[test]
    fn test_get_miss_returns_none() {
        let asset = Asset::new(AssetId::Apple, AssetType::Rigid);
        assert!(asset.get(AssetComponentType::Physics).is_none());
        assert!(asset.get_as::<StubComponent>(AssetComponentType::Physics).is_none());
    }

    #[test]
    fn test_typed_get_downcasts() {
        let mut asset = Asset::new(AssetId::Apple, AssetType::Rigid);
        asset.initialize(&entry(&[("Render", "Rigid")])).unwrap();
        asset
            .add(
                AssetComponentType::Render,
                StubComponent::new(AssetComponentType::Render),
            )
            .unwrap();
        let c: &StubComponent = asset.get_as(AssetComponentType::Render).unwrap();
        assert_eq!(c.component_type(), AssetComponentType::Render);
        // wrong concrete type misses
        assert!(asset.get_as::<Geometry>(AssetComponentType::Render).is_none());
    }
}
