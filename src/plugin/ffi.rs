/*
 *  plugin/ffi.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  C ABI types for the capability plugin interface
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

//! FFI types for the Chiron plugin system.
//!
//! These `#[repr(C)]` types form the stable ABI between the host and its
//! plugins. Plugin crates re-declare them locally instead of linking the
//! host crate; both sides must match field for field.
//!
//! Ownership across the boundary: a component handle passed to
//! `attach` belongs to the host once the call returns `Success`; on any
//! other code the plugin keeps ownership and must destroy the component
//! itself. Plugin handles passed to the registrar belong to the host once
//! the registrar returns nonzero.

use std::ffi::{c_char, c_int, c_void};

use crate::asset::ComponentInfo;
use crate::render::RenderHandle;
use crate::types::{AssetComponentType, PluginType};

/// Plugin ABI version. Major must match; a newer plugin minor is allowed
/// with a warning.
pub const CHIRON_PLUGIN_ABI_VERSION_MAJOR: u32 = 1;
pub const CHIRON_PLUGIN_ABI_VERSION_MINOR: u32 = 0;
pub const CHIRON_PLUGIN_ABI_VERSION_PATCH: u32 = 0;

/// Maximum length for error messages
pub const CHIRON_ERROR_MESSAGE_SIZE: usize = 256;

/// Maximum length for the plugin name buffer
pub const CHIRON_PLUGIN_NAME_SIZE: usize = 64;

/// Well-known entry point every plugin library must export.
pub const START_PLUGIN_SYMBOL: &[u8] = b"StartPlugin\0";

/// Opaque handle to a plugin instance living inside the loaded library.
#[repr(C)]
pub struct ChironPluginHandle {
    _private: [u8; 0],
}

/// Opaque handle to a plugin-manufactured component instance.
#[repr(C)]
pub struct ChironComponentHandle {
    _private: [u8; 0],
}

/// Error codes crossing the plugin boundary.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChironErrorCode {
    Success = 0,
    ErrorGeneric = 1,
    ErrorInvalidArgument = 2,
    ErrorUnknownComponent = 3,
    ErrorInitialization = 4,
    ErrorNullPointer = 5,
    ErrorPanic = 6,
    ErrorAbiMismatch = 7,
    ErrorDuplicateComponent = 8,
    ErrorSiblingMissing = 9,
}

/// Error information structure
#[repr(C)]
pub struct ChironError {
    pub code: ChironErrorCode,
    /// Human-readable error message (null-terminated)
    pub message: [c_char; CHIRON_ERROR_MESSAGE_SIZE],
}

impl ChironError {
    pub fn new(code: ChironErrorCode, message: &str) -> Self {
        let mut error = Self {
            code,
            message: [0; CHIRON_ERROR_MESSAGE_SIZE],
        };
        let bytes = message.as_bytes();
        let len = bytes.len().min(CHIRON_ERROR_MESSAGE_SIZE - 1);
        for (i, &byte) in bytes.iter().take(len).enumerate() {
            error.message[i] = byte as c_char;
        }
        error
    }

    pub fn success() -> Self {
        Self::new(ChironErrorCode::Success, "")
    }

    /// Extract the message as a Rust string.
    pub fn message_str(&self) -> String {
        let len = self
            .message
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(CHIRON_ERROR_MESSAGE_SIZE);
        let bytes: Vec<u8> = self.message[..len].iter().map(|&c| c as u8).collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Default for ChironError {
    fn default() -> Self {
        Self::success()
    }
}

/// Plugin kinds mirrored across the ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChironPluginType {
    Rigid = 0,
    CpuMsd = 1,
    CudaMsd = 2,
    OclMsd = 3,
    ComputeMsd = 4,
    CpuXfem = 5,
    CudaXfem = 6,
    OclXfem = 7,
    ComputeXfem = 8,
    Unknown = 9,
}

impl From<PluginType> for ChironPluginType {
    fn from(ty: PluginType) -> Self {
        match ty {
            PluginType::Rigid => ChironPluginType::Rigid,
            PluginType::CpuMsd => ChironPluginType::CpuMsd,
            PluginType::CudaMsd => ChironPluginType::CudaMsd,
            PluginType::OclMsd => ChironPluginType::OclMsd,
            PluginType::ComputeMsd => ChironPluginType::ComputeMsd,
            PluginType::CpuXfem => ChironPluginType::CpuXfem,
            PluginType::CudaXfem => ChironPluginType::CudaXfem,
            PluginType::OclXfem => ChironPluginType::OclXfem,
            PluginType::ComputeXfem => ChironPluginType::ComputeXfem,
            PluginType::Unknown => ChironPluginType::Unknown,
        }
    }
}

impl From<ChironPluginType> for PluginType {
    fn from(ty: ChironPluginType) -> Self {
        match ty {
            ChironPluginType::Rigid => PluginType::Rigid,
            ChironPluginType::CpuMsd => PluginType::CpuMsd,
            ChironPluginType::CudaMsd => PluginType::CudaMsd,
            ChironPluginType::OclMsd => PluginType::OclMsd,
            ChironPluginType::ComputeMsd => PluginType::ComputeMsd,
            ChironPluginType::CpuXfem => PluginType::CpuXfem,
            ChironPluginType::CudaXfem => PluginType::CudaXfem,
            ChironPluginType::OclXfem => PluginType::OclXfem,
            ChironPluginType::ComputeXfem => PluginType::ComputeXfem,
            ChironPluginType::Unknown => PluginType::Unknown,
        }
    }
}

/// Component kinds mirrored across the ABI.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChironComponentType {
    Geometry = 0,
    Render = 1,
    Physics = 2,
    Collision = 3,
    Intersection = 4,
    Unknown = 5,
}

impl From<AssetComponentType> for ChironComponentType {
    fn from(ty: AssetComponentType) -> Self {
        match ty {
            AssetComponentType::Geometry => ChironComponentType::Geometry,
            AssetComponentType::Render => ChironComponentType::Render,
            AssetComponentType::Physics => ChironComponentType::Physics,
            AssetComponentType::Collision => ChironComponentType::Collision,
            AssetComponentType::Intersection => ChironComponentType::Intersection,
            AssetComponentType::Unknown => ChironComponentType::Unknown,
        }
    }
}

impl From<ChironComponentType> for AssetComponentType {
    fn from(ty: ChironComponentType) -> Self {
        match ty {
            ChironComponentType::Geometry => AssetComponentType::Geometry,
            ChironComponentType::Render => AssetComponentType::Render,
            ChironComponentType::Physics => AssetComponentType::Physics,
            ChironComponentType::Collision => AssetComponentType::Collision,
            ChironComponentType::Intersection => AssetComponentType::Intersection,
            ChironComponentType::Unknown => AssetComponentType::Unknown,
        }
    }
}

/// Structural summary of a component, as exchanged across the ABI.
/// Buffer handles use zero as the not-present sentinel.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ChironComponentInfo {
    pub component_type: ChironComponentType,
    pub vertex_count: u32,
    pub surface_vertex_count: u32,
    pub face_index_count: u32,
    pub position_buffer: u64,
    pub normal_buffer: u64,
    pub index_buffer: u64,
}

impl ChironComponentInfo {
    pub fn zeroed() -> Self {
        ChironComponentInfo {
            component_type: ChironComponentType::Unknown,
            vertex_count: 0,
            surface_vertex_count: 0,
            face_index_count: 0,
            position_buffer: 0,
            normal_buffer: 0,
            index_buffer: 0,
        }
    }
}

pub fn component_info_to_ffi(ty: AssetComponentType, info: &ComponentInfo) -> ChironComponentInfo {
    ChironComponentInfo {
        component_type: ty.into(),
        vertex_count: info.vertex_count,
        surface_vertex_count: info.surface_vertex_count,
        face_index_count: info.face_index_count,
        position_buffer: info.position_buffer.map_or(0, |h| h.0),
        normal_buffer: info.normal_buffer.map_or(0, |h| h.0),
        index_buffer: info.index_buffer.map_or(0, |h| h.0),
    }
}

pub fn component_info_from_ffi(info: &ChironComponentInfo) -> ComponentInfo {
    let handle = |raw: u64| (raw != 0).then_some(RenderHandle(raw));
    ComponentInfo {
        vertex_count: info.vertex_count,
        surface_vertex_count: info.surface_vertex_count,
        face_index_count: info.face_index_count,
        position_buffer: handle(info.position_buffer),
        normal_buffer: handle(info.normal_buffer),
        index_buffer: handle(info.index_buffer),
    }
}

/// Component vtable - function pointers for an attached component.
#[repr(C)]
pub struct ChironComponentVTable {
    pub component_type: extern "C" fn(component: *const ChironComponentHandle) -> ChironComponentType,

    /// Fill the structural summary used for sibling queries.
    pub info: extern "C" fn(
        component: *const ChironComponentHandle,
        out: *mut ChironComponentInfo,
        error: *mut ChironError,
    ) -> ChironErrorCode,

    /// Per-frame work.
    pub update: extern "C" fn(component: *mut ChironComponentHandle),

    /// Release owned resources ahead of destruction.
    pub cleanup: extern "C" fn(component: *mut ChironComponentHandle),

    /// Destroy the instance. The handle is invalid afterwards.
    pub destroy: extern "C" fn(component: *mut ChironComponentHandle),
}

/// Host-side services available to a plugin while it manufactures a
/// component. Valid only for the duration of the `add_asset_component`
/// call it was passed to.
#[repr(C)]
pub struct ChironAssetContext {
    /// Opaque host cookie; pass back to every callback.
    pub host: *mut c_void,

    /// Query an already-attached component of the same asset. Fails with
    /// `ErrorSiblingMissing` when that slot is empty.
    pub sibling_info: extern "C" fn(
        host: *mut c_void,
        component_type: ChironComponentType,
        out: *mut ChironComponentInfo,
        error: *mut ChironError,
    ) -> ChironErrorCode,

    /// Hand a constructed, initialized component to the host. On Success
    /// the host owns the handle; any other code leaves ownership with the
    /// caller.
    pub attach: extern "C" fn(
        host: *mut c_void,
        component_type: ChironComponentType,
        component: *mut ChironComponentHandle,
        vtable: *const ChironComponentVTable,
        error: *mut ChironError,
    ) -> ChironErrorCode,

    /// Allocate a GPU-resident buffer from the render capability. `kind`
    /// is a `BufferKind` discriminant; the handle written to `out` is
    /// opaque and nonzero.
    pub acquire_buffer: extern "C" fn(
        host: *mut c_void,
        kind: u32,
        size: u64,
        out: *mut u64,
        error: *mut ChironError,
    ) -> ChironErrorCode,

    /// Map an existing render buffer into the compute context. Fails when
    /// the buffer is already mapped.
    pub map_compute_buffer: extern "C" fn(
        host: *mut c_void,
        buffer: u64,
        out: *mut u64,
        error: *mut ChironError,
    ) -> ChironErrorCode,
}

/// Plugin vtable - function pointers for a registered plugin.
#[repr(C)]
pub struct ChironPluginVTable {
    /// Report the plugin's ABI version triple.
    pub abi_version: extern "C" fn(major: *mut u32, minor: *mut u32, patch: *mut u32),

    /// Fill the plugin's display name (null-terminated, max
    /// `CHIRON_PLUGIN_NAME_SIZE`).
    pub plugin_info: extern "C" fn(name: *mut c_char),

    /// Construct a component of `component_type` for the asset behind
    /// `ctx`, initialize it from the UTF-8 YAML fragment, and attach it
    /// through `ctx.attach`.
    pub add_asset_component: extern "C" fn(
        plugin: *mut ChironPluginHandle,
        ctx: *const ChironAssetContext,
        config: *const u8,
        config_len: usize,
        component_type: ChironComponentType,
        error: *mut ChironError,
    ) -> ChironErrorCode,

    /// Release plugin-global resources.
    pub cleanup: extern "C" fn(plugin: *mut ChironPluginHandle),

    /// Destroy the plugin instance. The handle is invalid afterwards.
    pub destroy: extern "C" fn(plugin: *mut ChironPluginHandle),
}

/// Registration handle passed to `StartPlugin`. The entry point registers
/// exactly one plugin through `register` and returns nonzero on success.
#[repr(C)]
pub struct ChironRegistrar {
    /// Opaque host cookie; pass back to `register`.
    pub host: *mut c_void,

    /// Returns nonzero when the host accepted the registration.
    pub register: extern "C" fn(
        host: *mut c_void,
        plugin_type: ChironPluginType,
        plugin: *mut ChironPluginHandle,
        vtable: *const ChironPluginVTable,
    ) -> c_int,
}

/// Signature of the `StartPlugin` entry point.
///
/// ```c
/// #[no_mangle]
/// pub extern "C" fn StartPlugin(ty: ChironPluginType,
///                               registrar: *const ChironRegistrar) -> c_int
/// ```
pub type StartPluginFn = extern "C" fn(ChironPluginType, *const ChironRegistrar) -> c_int;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_round_trip() {
        let e = ChironError::new(ChironErrorCode::ErrorInitialization, "no vertex file");
        assert_eq!(e.code, ChironErrorCode::ErrorInitialization);
        assert_eq!(e.message_str(), "no vertex file");
    }

    #[test]
    fn test_error_message_truncated() {
        let long = "x".repeat(CHIRON_ERROR_MESSAGE_SIZE * 2);
        let e = ChironError::new(ChironErrorCode::ErrorGeneric, &long);
        assert_eq!(e.message_str().len(), CHIRON_ERROR_MESSAGE_SIZE - 1);
    }

    #[test]
    fn test_plugin_type_ffi_round_trip() {
        for ty in PluginType::ALL {
            let ffi: ChironPluginType = ty.into();
            let back: PluginType = ffi.into();
            assert_eq!(back, ty);
        }
    }

    #[test]
    fn test_component_type_ffi_round_trip() {
        for ty in AssetComponentType::ALL {
            let ffi: ChironComponentType = ty.into();
            let back: AssetComponentType = ffi.into();
            assert_eq!(back, ty);
        }
    }

    #[test]
    fn test_component_info_handle_sentinels() {
        let info = ComponentInfo {
            vertex_count: 8,
            surface_vertex_count: 8,
            face_index_count: 36,
            position_buffer: Some(RenderHandle(3)),
            normal_buffer: None,
            index_buffer: None,
        };
        let ffi = component_info_to_ffi(AssetComponentType::Render, &info);
        assert_eq!(ffi.position_buffer, 3);
        assert_eq!(ffi.normal_buffer, 0);
        let back = component_info_from_ffi(&ffi);
        assert_eq!(back, info);
    }
}
