/*
 *  types.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Closed identifier enums shared across the framework
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

//! Identifier enums used throughout the framework.
//!
//! Every enum here is a closed set with a bidirectional mapping to the
//! string names used in configuration manifests. An unrecognized name maps
//! to the `Unknown` sentinel, which is never a valid registry key.

use std::fmt;

/// Manager kinds owned or driven by the composition root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManagerType {
    EventManager,
    RenderManager,
    ComputeManager,
    PluginManager,
    AssetManager,
    Unknown,
}

impl ManagerType {
    pub const ALL: [ManagerType; 5] = [
        ManagerType::EventManager,
        ManagerType::RenderManager,
        ManagerType::ComputeManager,
        ManagerType::PluginManager,
        ManagerType::AssetManager,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ManagerType::EventManager => "EventManager",
            ManagerType::RenderManager => "RenderManager",
            ManagerType::ComputeManager => "ComputeManager",
            ManagerType::PluginManager => "PluginManager",
            ManagerType::AssetManager => "AssetManager",
            ManagerType::Unknown => "Unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "EventManager" => ManagerType::EventManager,
            "RenderManager" => ManagerType::RenderManager,
            "ComputeManager" => ManagerType::ComputeManager,
            "PluginManager" => ManagerType::PluginManager,
            "AssetManager" => ManagerType::AssetManager,
            _ => ManagerType::Unknown,
        }
    }
}

impl fmt::Display for ManagerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability plugins recognized by the plugin manager.
///
/// One entry per loadable library; the manifest's `name` attribute must
/// resolve to one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginType {
    Rigid,
    CpuMsd,
    CudaMsd,
    OclMsd,
    ComputeMsd,
    CpuXfem,
    CudaXfem,
    OclXfem,
    ComputeXfem,
    Unknown,
}

impl PluginType {
    pub const ALL: [PluginType; 9] = [
        PluginType::Rigid,
        PluginType::CpuMsd,
        PluginType::CudaMsd,
        PluginType::OclMsd,
        PluginType::ComputeMsd,
        PluginType::CpuXfem,
        PluginType::CudaXfem,
        PluginType::OclXfem,
        PluginType::ComputeXfem,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PluginType::Rigid => "Rigid",
            PluginType::CpuMsd => "CpuMsd",
            PluginType::CudaMsd => "CudaMsd",
            PluginType::OclMsd => "OclMsd",
            PluginType::ComputeMsd => "ComputeMsd",
            PluginType::CpuXfem => "CpuXfem",
            PluginType::CudaXfem => "CudaXfem",
            PluginType::OclXfem => "OclXfem",
            PluginType::ComputeXfem => "ComputeXfem",
            PluginType::Unknown => "Unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "Rigid" => PluginType::Rigid,
            "CpuMsd" => PluginType::CpuMsd,
            "CudaMsd" => PluginType::CudaMsd,
            "OclMsd" => PluginType::OclMsd,
            "ComputeMsd" => PluginType::ComputeMsd,
            "CpuXfem" => PluginType::CpuXfem,
            "CudaXfem" => PluginType::CudaXfem,
            "OclXfem" => PluginType::OclXfem,
            "ComputeXfem" => PluginType::ComputeXfem,
            _ => PluginType::Unknown,
        }
    }
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Simulated entities the asset manager knows how to register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetId {
    LeftKidney,
    RightKidney,
    GallBladder,
    Liver,
    Scalpel,
    Retractor,
    Apple,
    Melon,
    Cube,
    Unknown,
}

impl AssetId {
    pub const ALL: [AssetId; 9] = [
        AssetId::LeftKidney,
        AssetId::RightKidney,
        AssetId::GallBladder,
        AssetId::Liver,
        AssetId::Scalpel,
        AssetId::Retractor,
        AssetId::Apple,
        AssetId::Melon,
        AssetId::Cube,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AssetId::LeftKidney => "LeftKidney",
            AssetId::RightKidney => "RightKidney",
            AssetId::GallBladder => "GallBladder",
            AssetId::Liver => "Liver",
            AssetId::Scalpel => "Scalpel",
            AssetId::Retractor => "Retractor",
            AssetId::Apple => "Apple",
            AssetId::Melon => "Melon",
            AssetId::Cube => "Cube",
            AssetId::Unknown => "Unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "LeftKidney" => AssetId::LeftKidney,
            "RightKidney" => AssetId::RightKidney,
            "GallBladder" => AssetId::GallBladder,
            "Liver" => AssetId::Liver,
            "Scalpel" => AssetId::Scalpel,
            "Retractor" => AssetId::Retractor,
            "Apple" => AssetId::Apple,
            "Melon" => AssetId::Melon,
            "Cube" => AssetId::Cube,
            _ => AssetId::Unknown,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical behavior class of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetType {
    Rigid,
    DeformableXfem,
    DeformableMsd,
    Unknown,
}

impl AssetType {
    pub const ALL: [AssetType; 3] = [
        AssetType::Rigid,
        AssetType::DeformableXfem,
        AssetType::DeformableMsd,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AssetType::Rigid => "Rigid",
            AssetType::DeformableXfem => "Deformable_XFEM",
            AssetType::DeformableMsd => "Deformable_MSD",
            AssetType::Unknown => "Unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "Rigid" => AssetType::Rigid,
            "Deformable_XFEM" => AssetType::DeformableXfem,
            "Deformable_MSD" => AssetType::DeformableMsd,
            _ => AssetType::Unknown,
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability slots an asset is composed from. At most one component of
/// each type per asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AssetComponentType {
    Geometry,
    Render,
    Physics,
    Collision,
    Intersection,
    Unknown,
}

impl AssetComponentType {
    pub const ALL: [AssetComponentType; 5] = [
        AssetComponentType::Geometry,
        AssetComponentType::Render,
        AssetComponentType::Physics,
        AssetComponentType::Collision,
        AssetComponentType::Intersection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AssetComponentType::Geometry => "Geometry",
            AssetComponentType::Render => "Render",
            AssetComponentType::Physics => "Physics",
            AssetComponentType::Collision => "Collision",
            AssetComponentType::Intersection => "Intersection",
            AssetComponentType::Unknown => "Unknown",
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "Geometry" => AssetComponentType::Geometry,
            "Render" => AssetComponentType::Render,
            "Physics" => AssetComponentType::Physics,
            "Collision" => AssetComponentType::Collision,
            "Intersection" => AssetComponentType::Intersection,
            _ => AssetComponentType::Unknown,
        }
    }
}

impl fmt::Display for AssetComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_type_round_trip() {
        for ty in ManagerType::ALL {
            assert_eq!(ManagerType::from_name(ty.name()), ty);
        }
        assert_eq!(ManagerType::from_name("Bogus"), ManagerType::Unknown);
    }

    #[test]
    fn test_plugin_type_round_trip() {
        for ty in PluginType::ALL {
            assert_eq!(PluginType::from_name(ty.name()), ty);
        }
        assert_eq!(PluginType::from_name(""), PluginType::Unknown);
        assert_eq!(PluginType::from_name("rigid"), PluginType::Unknown);
    }

    #[test]
    fn test_asset_id_round_trip() {
        for id in AssetId::ALL {
            assert_eq!(AssetId::from_name(id.name()), id);
        }
        assert_eq!(AssetId::from_name("Banana"), AssetId::Unknown);
    }

    #[test]
    fn test_asset_type_round_trip() {
        for ty in AssetType::ALL {
            assert_eq!(AssetType::from_name(ty.name()), ty);
        }
        // manifest spelling uses the underscore forms
        assert_eq!(
            AssetType::from_name("Deformable_MSD"),
            AssetType::DeformableMsd
        );
        assert_eq!(AssetType::from_name("DeformableMsd"), AssetType::Unknown);
    }

    #[test]
    fn test_component_type_round_trip() {
        for ty in AssetComponentType::ALL {
            assert_eq!(AssetComponentType::from_name(ty.name()), ty);
        }
        assert_eq!(
            AssetComponentType::from_name("geometry"),
            AssetComponentType::Unknown
        );
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(PluginType::Rigid.to_string(), "Rigid");
        assert_eq!(AssetType::DeformableXfem.to_string(), "Deformable_XFEM");
        assert_eq!(AssetId::Unknown.to_string(), "Unknown");
    }
}
