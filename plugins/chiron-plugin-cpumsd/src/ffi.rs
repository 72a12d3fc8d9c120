/*
 *  Chiron CpuMsd Plugin - FFI Types
 *
 *  C ABI types matching the Chiron plugin interface
 *  These types must match exactly with the host's FFI types
 */

// mirror of the host ABI; not every declaration is exercised here
#![allow(dead_code)]

use std::ffi::{c_char, c_int, c_void};

/// Plugin ABI version
pub const CHIRON_PLUGIN_ABI_VERSION_MAJOR: u32 = 1;
pub const CHIRON_PLUGIN_ABI_VERSION_MINOR: u32 = 0;
pub const CHIRON_PLUGIN_ABI_VERSION_PATCH: u32 = 0;

/// Maximum length for error messages
pub const CHIRON_ERROR_MESSAGE_SIZE: usize = 256;

/// Opaque handle to a plugin instance
#[repr(C)]
pub struct ChironPluginHandle {
    _private: [u8; 0],
}

/// Opaque handle to a component instance
#[repr(C)]
pub struct ChironComponentHandle {
    _private: [u8; 0],
}

/// Error codes crossing the plugin boundary
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
}

/// Plugin kinds mirrored across the ABI
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

/// Component kinds mirrored across the ABI
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

/// Structural summary of a component. Buffer handles use zero as the
/// not-present sentinel.
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

/// Component vtable
#[repr(C)]
pub struct ChironComponentVTable {
    pub component_type:
        extern "C" fn(component: *const ChironComponentHandle) -> ChironComponentType,
    pub info: extern "C" fn(
        component: *const ChironComponentHandle,
        out: *mut ChironComponentInfo,
        error: *mut ChironError,
    ) -> ChironErrorCode,
    pub update: extern "C" fn(component: *mut ChironComponentHandle),
    pub cleanup: extern "C" fn(component: *mut ChironComponentHandle),
    pub destroy: extern "C" fn(component: *mut ChironComponentHandle),
}

/// Host-side services available while manufacturing a component
#[repr(C)]
pub struct ChironAssetContext {
    pub host: *mut c_void,
    pub sibling_info: extern "C" fn(
        host: *mut c_void,
        component_type: ChironComponentType,
        out: *mut ChironComponentInfo,
        error: *mut ChironError,
    ) -> ChironErrorCode,
    pub attach: extern "C" fn(
        host: *mut c_void,
        component_type: ChironComponentType,
        component: *mut ChironComponentHandle,
        vtable: *const ChironComponentVTable,
        error: *mut ChironError,
    ) -> ChironErrorCode,
    pub acquire_buffer: extern "C" fn(
        host: *mut c_void,
        kind: u32,
        size: u64,
        out: *mut u64,
        error: *mut ChironError,
    ) -> ChironErrorCode,
    pub map_compute_buffer: extern "C" fn(
        host: *mut c_void,
        buffer: u64,
        out: *mut u64,
        error: *mut ChironError,
    ) -> ChironErrorCode,
}

/// Buffer kind discriminants accepted by `acquire_buffer`
pub const CHIRON_BUFFER_VERTEX: u32 = 0;
pub const CHIRON_BUFFER_NORMAL: u32 = 1;
pub const CHIRON_BUFFER_INDEX: u32 = 2;

/// Plugin vtable
#[repr(C)]
pub struct ChironPluginVTable {
    pub abi_version: extern "C" fn(major: *mut u32, minor: *mut u32, patch: *mut u32),
    pub plugin_info: extern "C" fn(name: *mut c_char),
    pub add_asset_component: extern "C" fn(
        plugin: *mut ChironPluginHandle,
        ctx: *const ChironAssetContext,
        config: *const u8,
        config_len: usize,
        component_type: ChironComponentType,
        error: *mut ChironError,
    ) -> ChironErrorCode,
    pub cleanup: extern "C" fn(plugin: *mut ChironPluginHandle),
    pub destroy: extern "C" fn(plugin: *mut ChironPluginHandle),
}

/// Registration handle passed to `StartPlugin`
#[repr(C)]
pub struct ChironRegistrar {
    pub host: *mut c_void,
    pub register: extern "C" fn(
        host: *mut c_void,
        plugin_type: ChironPluginType,
        plugin: *mut ChironPluginHandle,
        vtable: *const ChironPluginVTable,
    ) -> c_int,
}

/// Copy a Rust string into a fixed-size C buffer (null-terminated)
pub fn copy_str_to_buffer(s: &str, buffer: *mut c_char, size: usize) {
    if buffer.is_null() || size == 0 {
        return;
    }
    let bytes = s.as_bytes();
    let len = bytes.len().min(size - 1);
    for (i, &byte) in bytes.iter().take(len).enumerate() {
        unsafe {
            *buffer.add(i) = byte as c_char;
        }
    }
    unsafe {
        *buffer.add(len) = 0;
    }
}

/// Borrow the UTF-8 config fragment handed across the boundary
pub fn config_str<'a>(ptr: *const u8, len: usize) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(ptr, len) };
    std::str::from_utf8(bytes).ok()
}
