/*
 *  plugin/mod.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Capability plugin system - dynamic loading and dispatch
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

//! The plugin system.
//!
//! Concrete components are never constructed by the host: construction is
//! delegated to dynamically loaded libraries so that plugin implementations
//! stay decoupled from the host's compiled interface. A library exports one
//! `StartPlugin` entry point, which registers a plugin through an explicit
//! registrar handle; the registered plugin then manufactures components on
//! request during asset loading.

pub mod adapter;
pub mod ffi;
pub mod manager;
pub mod shared_lib;

pub use adapter::PluginAdapter;
pub use manager::PluginManager;
pub use shared_lib::SharedLibrary;

use crate::asset::SharedAsset;
use crate::compute::ComputeManager;
use crate::error::CoreError;
use crate::render::RenderManager;
use crate::types::AssetComponentType;

/// Capabilities a plugin may call back into while manufacturing a
/// GPU-resident component. Both managers are initialized before any
/// plugin is loaded.
pub struct LoadContext<'a> {
    pub render: &'a RenderManager,
    pub compute: &'a ComputeManager,
}

/// A registered capability plugin.
///
/// Exactly one instance per `PluginType` lives in the plugin manager's
/// registry. The instance's code resides in its shared library, so every
/// plugin must be dropped before its library is unloaded.
pub trait Plugin {
    fn name(&self) -> &str;

    /// Construct a component of `component_type` from the config fragment,
    /// initialize it, and attach it to `asset`. Reports failure without
    /// attaching anything.
    fn add_asset_component(
        &self,
        ctx: &LoadContext,
        config: &str,
        component_type: AssetComponentType,
        asset: &SharedAsset,
    ) -> Result<(), CoreError>;

    /// Release plugin-global resources. Called by the manager before the
    /// registry drops the instance.
    fn cleanup(&mut self);
}
