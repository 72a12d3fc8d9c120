/*
 *  asset/component.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Generic component capability attached to assets
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

use std::any::Any;

use crate::error::CoreError;
use crate::render::RenderHandle;
use crate::types::{AssetComponentType, AssetId};

use super::Asset;

/// Structural summary a component exposes to its siblings. A physics
/// component resolving the render component's buffer handles goes through
/// this rather than downcasting across the plugin boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentInfo {
    pub vertex_count: u32,
    pub surface_vertex_count: u32,
    pub face_index_count: u32,
    pub position_buffer: Option<RenderHandle>,
    pub normal_buffer: Option<RenderHandle>,
    pub index_buffer: Option<RenderHandle>,
}

/// A capability owned by exactly one asset.
///
/// Components are constructed empty by a plugin, initialized from a config
/// fragment while the plugin still owns them (the asset reference gives
/// access to siblings attached earlier in declaration order), then attached
/// to the asset, which stamps the owner back-reference exactly once.
pub trait Component {
    fn component_type(&self) -> AssetComponentType;

    /// The owning asset, as a non-owning id. None until attached.
    fn owner(&self) -> Option<AssetId>;

    /// Stamp the owner. Fails if an owner was already set; the
    /// back-reference is never reassigned.
    fn set_owner(&mut self, owner: AssetId) -> Result<(), CoreError>;

    /// Populate from a YAML config fragment. `asset` is the partially
    /// loaded owner-to-be; only components declared earlier are attached.
    fn initialize(&mut self, config: &str, asset: &Asset) -> Result<(), CoreError>;

    fn info(&self) -> ComponentInfo;

    /// Per-frame work. The core only guarantees single-threaded calls.
    fn update(&mut self);

    /// Release owned resources. Called before the owning asset drops the
    /// component.
    fn cleanup(&mut self);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
