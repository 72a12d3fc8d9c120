/*
 *  plugin/adapter.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Plugin adapter - wraps C ABI plugins and components as trait objects
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
use std::cell::RefCell;
use std::ffi::{c_char, c_int, c_void};
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, warn};

use crate::asset::{Asset, Component, ComponentInfo, SharedAsset};
use crate::compute::ComputeManager;
use crate::error::CoreError;
use crate::render::{BufferKind, RenderHandle, RenderManager};
use crate::types::{AssetComponentType, AssetId, PluginType};

use super::ffi::{
    component_info_from_ffi, component_info_to_ffi, ChironAssetContext, ChironComponentHandle,
    ChironComponentInfo, ChironComponentType, ChironComponentVTable, ChironError, ChironErrorCode,
    ChironPluginHandle, ChironPluginType, ChironPluginVTable, CHIRON_PLUGIN_ABI_VERSION_MAJOR,
    CHIRON_PLUGIN_ABI_VERSION_MINOR, CHIRON_PLUGIN_NAME_SIZE,
};
use super::{LoadContext, Plugin};

/// Adapter that wraps a registered plugin vtable as a `Plugin` trait
/// object.
///
/// The vtable's code lives in the plugin's shared library; the plugin
/// manager keeps every adapter dropped before the library is unloaded.
pub struct PluginAdapter {
    plugin_type: PluginType,
    name: String,
    handle: *mut ChironPluginHandle,
    vtable: *const ChironPluginVTable,
}

impl PluginAdapter {
    /// Wrap a registration. Verifies the ABI version (major must match,
    /// newer minor warns) and caches the plugin's name.
    pub(crate) fn from_registration(
        plugin_type: PluginType,
        handle: *mut ChironPluginHandle,
        vtable: *const ChironPluginVTable,
    ) -> Result<Self, CoreError> {
        if handle.is_null() || vtable.is_null() {
            return Err(CoreError::PluginContract {
                plugin: plugin_type.name().to_string(),
                detail: "registered a null handle or vtable".to_string(),
            });
        }
        let vt = unsafe { &*vtable };

        let mut major = 0u32;
        let mut minor = 0u32;
        let mut patch = 0u32;
        (vt.abi_version)(&mut major, &mut minor, &mut patch);
        debug!("plugin {plugin_type} ABI {major}.{minor}.{patch}");

        if major != CHIRON_PLUGIN_ABI_VERSION_MAJOR {
            return Err(CoreError::PluginContract {
                plugin: plugin_type.name().to_string(),
                detail: format!(
                    "ABI {major}.{minor}.{patch} incompatible with host {}.{}",
                    CHIRON_PLUGIN_ABI_VERSION_MAJOR, CHIRON_PLUGIN_ABI_VERSION_MINOR
                ),
            });
        }
        if minor > CHIRON_PLUGIN_ABI_VERSION_MINOR {
            warn!(
                "plugin {plugin_type} has newer minor ABI {major}.{minor}.{patch} than host"
            );
        }

        let mut name_buf = [0 as c_char; CHIRON_PLUGIN_NAME_SIZE];
        (vt.plugin_info)(name_buf.as_mut_ptr());
        let name = extract_string(&name_buf);

        Ok(PluginAdapter {
            plugin_type,
            name,
            handle,
            vtable,
        })
    }

    pub fn plugin_type(&self) -> PluginType {
        self.plugin_type
    }

    fn vt(&self) -> &ChironPluginVTable {
        unsafe { &*self.vtable }
    }
}

impl Plugin for PluginAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_asset_component(
        &self,
        ctx: &LoadContext,
        config: &str,
        component_type: AssetComponentType,
        asset: &SharedAsset,
    ) -> Result<(), CoreError> {
        let mut host_ctx = HostContext {
            asset: asset.as_ref(),
            render: ctx.render,
            compute: ctx.compute,
        };
        let ffi_ctx = ChironAssetContext {
            host: (&mut host_ctx) as *mut HostContext as *mut c_void,
            sibling_info: host_sibling_info,
            attach: host_attach,
            acquire_buffer: host_acquire_buffer,
            map_compute_buffer: host_map_compute_buffer,
        };

        let mut error = ChironError::default();
        let bytes = config.as_bytes();
        let (code, panic_error) = catch_ffi_call(|| {
            (self.vt().add_asset_component)(
                self.handle,
                &ffi_ctx,
                bytes.as_ptr(),
                bytes.len(),
                component_type.into(),
                &mut error,
            )
        });

        if let Some(e) = panic_error {
            return Err(CoreError::PluginContract {
                plugin: self.name.clone(),
                detail: e.message_str(),
            });
        }
        if code != ChironErrorCode::Success {
            return Err(CoreError::PluginContract {
                plugin: self.name.clone(),
                detail: format!("{component_type}: {}", error.message_str()),
            });
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        let vt = self.vt();
        let _ = panic::catch_unwind(AssertUnwindSafe(|| (vt.cleanup)(self.handle)));
    }
}

impl Drop for PluginAdapter {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            debug!("destroying plugin instance '{}'", self.name);
            (self.vt().destroy)(self.handle);
            self.handle = std::ptr::null_mut();
        }
    }
}

/// A plugin-manufactured component held by an asset.
///
/// Initialization happened plugin-side before the component was attached,
/// so `initialize` here is complete by construction.
pub struct PluginComponent {
    component_type: AssetComponentType,
    owner: Option<AssetId>,
    handle: *mut ChironComponentHandle,
    vtable: *const ChironComponentVTable,
}

impl PluginComponent {
    fn vt(&self) -> &ChironComponentVTable {
        unsafe { &*self.vtable }
    }
}

impl Component for PluginComponent {
    fn component_type(&self) -> AssetComponentType {
        self.component_type
    }

    fn owner(&self) -> Option<AssetId> {
        self.owner
    }

    fn set_owner(&mut self, owner: AssetId) -> Result<(), CoreError> {
        if let Some(existing) = self.owner {
            return Err(CoreError::InvalidState(format!(
                "component already owned by '{existing}'"
            )));
        }
        self.owner = Some(owner);
        Ok(())
    }

    fn initialize(&mut self, _config: &str, _asset: &Asset) -> Result<(), CoreError> {
        Ok(())
    }

    fn info(&self) -> ComponentInfo {
        let mut out = ChironComponentInfo::zeroed();
        let mut error = ChironError::default();
        let (code, _) = catch_ffi_call(|| (self.vt().info)(self.handle, &mut out, &mut error));
        if code != ChironErrorCode::Success {
            warn!(
                "component {} info query failed: {}",
                self.component_type,
                error.message_str()
            );
            return ComponentInfo::default();
        }
        component_info_from_ffi(&out)
    }

    fn update(&mut self) {
        let vt = self.vt();
        let _ = panic::catch_unwind(AssertUnwindSafe(|| (vt.update)(self.handle)));
    }

    fn cleanup(&mut self) {
        let vt = self.vt();
        let _ = panic::catch_unwind(AssertUnwindSafe(|| (vt.cleanup)(self.handle)));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Drop for PluginComponent {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            (self.vt().destroy)(self.handle);
            self.handle = std::ptr::null_mut();
        }
    }
}

/// One pending registration, deposited by the registrar callback while a
/// library's `StartPlugin` runs.
pub(crate) struct RegistrationSlot {
    pub expected: PluginType,
    pub result: Option<PluginAdapter>,
}

/// Registrar callback handed to `StartPlugin`. Accepts exactly one
/// registration of the expected type. Returning zero leaves ownership of
/// the plugin instance with the library.
pub(crate) extern "C" fn host_register_plugin(
    host: *mut c_void,
    plugin_type: ChironPluginType,
    plugin: *mut ChironPluginHandle,
    vtable: *const ChironPluginVTable,
) -> c_int {
    if host.is_null() {
        return 0;
    }
    let slot = unsafe { &mut *(host as *mut RegistrationSlot) };
    if slot.result.is_some() {
        error!("plugin library attempted a second registration");
        return 0;
    }
    let plugin_type: PluginType = plugin_type.into();
    if plugin_type != slot.expected {
        error!(
            "plugin registered as {plugin_type}, expected {}",
            slot.expected
        );
        return 0;
    }
    match PluginAdapter::from_registration(plugin_type, plugin, vtable) {
        Ok(adapter) => {
            slot.result = Some(adapter);
            1
        }
        Err(e) => {
            error!("plugin registration rejected: {e}");
            0
        }
    }
}

/// Host state behind the opaque `ChironAssetContext::host` pointer. Valid
/// only for the duration of one `add_asset_component` call.
struct HostContext<'a> {
    asset: &'a RefCell<Asset>,
    render: &'a RenderManager,
    compute: &'a ComputeManager,
}

fn write_error(error: *mut ChironError, code: ChironErrorCode, message: &str) -> ChironErrorCode {
    if !error.is_null() {
        unsafe {
            *error = ChironError::new(code, message);
        }
    }
    code
}

extern "C" fn host_sibling_info(
    host: *mut c_void,
    component_type: ChironComponentType,
    out: *mut ChironComponentInfo,
    error: *mut ChironError,
) -> ChironErrorCode {
    if host.is_null() || out.is_null() {
        return write_error(error, ChironErrorCode::ErrorNullPointer, "null sibling query");
    }
    let ctx = unsafe { &*(host as *const HostContext) };
    let ty: AssetComponentType = component_type.into();

    let Ok(asset) = ctx.asset.try_borrow() else {
        return write_error(
            error,
            ChironErrorCode::ErrorGeneric,
            "asset busy during sibling query",
        );
    };
    match asset.get(ty) {
        Some(component) => {
            let info = component.info();
            unsafe {
                *out = component_info_to_ffi(ty, &info);
            }
            ChironErrorCode::Success
        }
        None => write_error(
            error,
            ChironErrorCode::ErrorSiblingMissing,
            &format!("no {ty} component attached"),
        ),
    }
}

extern "C" fn host_attach(
    host: *mut c_void,
    component_type: ChironComponentType,
    component: *mut ChironComponentHandle,
    vtable: *const ChironComponentVTable,
    error: *mut ChironError,
) -> ChironErrorCode {
    if host.is_null() || component.is_null() || vtable.is_null() {
        return write_error(error, ChironErrorCode::ErrorNullPointer, "null attach");
    }
    let ctx = unsafe { &*(host as *const HostContext) };
    let ty: AssetComponentType = component_type.into();
    if ty == AssetComponentType::Unknown {
        return write_error(
            error,
            ChironErrorCode::ErrorInvalidArgument,
            "cannot attach a component of unknown type",
        );
    }

    let Ok(mut asset) = ctx.asset.try_borrow_mut() else {
        return write_error(
            error,
            ChironErrorCode::ErrorGeneric,
            "asset busy during attach",
        );
    };
    // the slot must be checked before the host takes ownership: on any
    // failure code the plugin still owns the handle
    if asset.has(ty) {
        return write_error(
            error,
            ChironErrorCode::ErrorDuplicateComponent,
            &format!("{ty} component already attached"),
        );
    }

    let wrapped = Box::new(PluginComponent {
        component_type: ty,
        owner: None,
        handle: component,
        vtable,
    });
    match asset.add(ty, wrapped) {
        Ok(()) => ChironErrorCode::Success,
        Err(e) => write_error(error, ChironErrorCode::ErrorGeneric, &e.to_string()),
    }
}

extern "C" fn host_acquire_buffer(
    host: *mut c_void,
    kind: u32,
    size: u64,
    out: *mut u64,
    error: *mut ChironError,
) -> ChironErrorCode {
    if host.is_null() || out.is_null() {
        return write_error(error, ChironErrorCode::ErrorNullPointer, "null acquire");
    }
    let ctx = unsafe { &*(host as *const HostContext) };
    let Some(kind) = BufferKind::from_raw(kind) else {
        return write_error(
            error,
            ChironErrorCode::ErrorInvalidArgument,
            &format!("unknown buffer kind {kind}"),
        );
    };
    let handle = ctx.render.create_buffer(kind, size);
    unsafe {
        *out = handle.0;
    }
    ChironErrorCode::Success
}

extern "C" fn host_map_compute_buffer(
    host: *mut c_void,
    buffer: u64,
    out: *mut u64,
    error: *mut ChironError,
) -> ChironErrorCode {
    if host.is_null() || out.is_null() {
        return write_error(error, ChironErrorCode::ErrorNullPointer, "null map");
    }
    let ctx = unsafe { &*(host as *const HostContext) };
    match ctx.compute.register_buffer(RenderHandle(buffer)) {
        Some(handle) => {
            unsafe {
                *out = handle.0;
            }
            ChironErrorCode::Success
        }
        None => write_error(
            error,
            ChironErrorCode::ErrorInvalidArgument,
            &format!("render buffer {buffer} cannot be mapped"),
        ),
    }
}

/// Wrap an FFI call with panic safety. A panic that would otherwise
/// unwind across the boundary is converted to `ErrorPanic`.
fn catch_ffi_call<F>(f: F) -> (ChironErrorCode, Option<ChironError>)
where
    F: FnOnce() -> ChironErrorCode,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(code) => (code, None),
        Err(panic_info) => {
            let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                format!("plugin panic: {s}")
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                format!("plugin panic: {s}")
            } else {
                "plugin panic: unknown error".to_string()
            };
            error!("caught panic in plugin call: {message}");
            let err = ChironError::new(ChironErrorCode::ErrorPanic, &message);
            (ChironErrorCode::ErrorPanic, Some(err))
        }
    }
}

fn extract_string(buffer: &[c_char]) -> String {
    let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    let bytes: Vec<u8> = buffer[..len].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}
