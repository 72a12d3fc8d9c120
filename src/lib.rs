/*
 *  lib.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
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

//! Chiron: a host framework for interactive deformable-body simulation.
//!
//! Assets (simulated entities) are composed from typed components that
//! are manufactured by capability plugins loaded from shared libraries.
//! The [`driver::Driver`] is the composition root; it owns the plugin and
//! asset registries plus the event/render/compute collaborators, brings
//! everything up in a fixed order and tears it down in reverse.

pub mod asset;
pub mod compute;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod plugin;
pub mod render;
pub mod types;
pub mod uid;

pub use asset::{Asset, AssetManager, Component, ComponentInfo, SharedAsset};
pub use driver::{Driver, Manager, ManagerRegistry};
pub use error::CoreError;
pub use plugin::{Plugin, PluginManager, SharedLibrary};
pub use types::{AssetComponentType, AssetId, AssetType, ManagerType, PluginType};
