/*
 *  Chiron Rigid Plugin - Implementation
 *
 *  Manufactures Geometry, Render and Collision components for rigid
 *  assets (instruments and undeformable props)
 */

use std::ffi::c_char;
use std::ffi::c_int;
use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use serde::Deserialize;

use crate::ffi::*;

// ============================================================================
// Components
// ============================================================================

/// Shared mesh storage for the rigid components
struct Mesh {
    vertices: Vec<[f32; 3]>,
    faces: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct GeometryConfig {
    vertex_file: Option<PathBuf>,
    index_file: Option<PathBuf>,
    vertices: Option<Vec<[f32; 3]>>,
    faces: Option<Vec<u32>>,
    surface_vertices: Option<u32>,
}

impl GeometryConfig {
    /// Resolve the mesh: inline data wins, files otherwise. Index values
    /// are validated against the vertex count.
    fn load_mesh(&self) -> Result<Mesh, String> {
        let vertices = match (&self.vertices, &self.vertex_file) {
            (Some(v), _) => v.clone(),
            (None, Some(path)) => {
                let text = fs::read_to_string(path)
                    .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
                parse_floats(&text)?
            }
            (None, None) => return Err("no vertex data in config".to_string()),
        };
        if vertices.is_empty() {
            return Err("empty vertex data".to_string());
        }

        let faces = match (&self.faces, &self.index_file) {
            (Some(f), _) => f.clone(),
            (None, Some(path)) => {
                let text = fs::read_to_string(path)
                    .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
                parse_indices(&text)?
            }
            (None, None) => return Err("no face data in config".to_string()),
        };
        if faces.is_empty() || faces.len() % 3 != 0 {
            return Err("face list is not a whole number of triangles".to_string());
        }
        if let Some(bad) = faces.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(format!("face index {bad} out of range"));
        }

        Ok(Mesh { vertices, faces })
    }
}

fn parse_floats(text: &str) -> Result<Vec<[f32; 3]>, String> {
    let mut out = Vec::new();
    let mut triple = [0.0f32; 3];
    let mut n = 0;
    for tok in text.split_whitespace() {
        triple[n % 3] = tok.parse().map_err(|_| format!("bad vertex token '{tok}'"))?;
        n += 1;
        if n % 3 == 0 {
            out.push(triple);
        }
    }
    if n % 3 != 0 {
        return Err("truncated vertex data".to_string());
    }
    Ok(out)
}

fn parse_indices(text: &str) -> Result<Vec<u32>, String> {
    text.split_whitespace()
        .map(|tok| tok.parse().map_err(|_| format!("bad index token '{tok}'")))
        .collect()
}

/// Geometry: the mesh itself
struct RigidGeometry {
    mesh: Mesh,
    surface_vertices: u32,
}

/// Render: GPU-resident position/normal buffers over the geometry
struct RigidRender {
    vertex_count: u32,
    position_buffer: u64,
    normal_buffer: u64,
}

#[derive(Debug, Deserialize)]
struct CollisionConfig {
    margin: Option<f32>,
}

/// Collision: a coarse proxy over the geometry
struct RigidCollision {
    vertex_count: u32,
    /// Kept for the collision narrow phase (outside this plugin's scope)
    #[allow(dead_code)]
    margin: f32,
}

/// One attached component instance behind an opaque handle
enum RigidComponent {
    Geometry(RigidGeometry),
    Render(RigidRender),
    Collision(RigidCollision),
}

impl RigidComponent {
    fn component_type(&self) -> ChironComponentType {
        match self {
            RigidComponent::Geometry(_) => ChironComponentType::Geometry,
            RigidComponent::Render(_) => ChironComponentType::Render,
            RigidComponent::Collision(_) => ChironComponentType::Collision,
        }
    }

    fn info(&self) -> ChironComponentInfo {
        let mut info = ChironComponentInfo::zeroed();
        info.component_type = self.component_type();
        match self {
            RigidComponent::Geometry(g) => {
                info.vertex_count = g.mesh.vertices.len() as u32;
                info.surface_vertex_count = g.surface_vertices;
                info.face_index_count = g.mesh.faces.len() as u32;
            }
            RigidComponent::Render(r) => {
                info.vertex_count = r.vertex_count;
                info.surface_vertex_count = r.vertex_count;
                info.position_buffer = r.position_buffer;
                info.normal_buffer = r.normal_buffer;
            }
            RigidComponent::Collision(c) => {
                info.vertex_count = c.vertex_count;
            }
        }
        info
    }
}

// ============================================================================
// Component vtable
// ============================================================================

extern "C" fn component_type(c: *const ChironComponentHandle) -> ChironComponentType {
    if c.is_null() {
        return ChironComponentType::Unknown;
    }
    let component = unsafe { &*(c as *const RigidComponent) };
    component.component_type()
}

extern "C" fn component_info(
    c: *const ChironComponentHandle,
    out: *mut ChironComponentInfo,
    error: *mut ChironError,
) -> ChironErrorCode {
    if c.is_null() || out.is_null() {
        if !error.is_null() {
            unsafe {
                *error = ChironError::new(ChironErrorCode::ErrorNullPointer, "null info query");
            }
        }
        return ChironErrorCode::ErrorNullPointer;
    }
    let component = unsafe { &*(c as *const RigidComponent) };
    unsafe { *out = component.info() };
    ChironErrorCode::Success
}

extern "C" fn component_update(_c: *mut ChironComponentHandle) {
    // rigid bodies carry no per-frame state of their own
}

extern "C" fn component_cleanup(_c: *mut ChironComponentHandle) {}

extern "C" fn component_destroy(c: *mut ChironComponentHandle) {
    if !c.is_null() {
        drop(unsafe { Box::from_raw(c as *mut RigidComponent) });
    }
}

static COMPONENT_VTABLE: ChironComponentVTable = ChironComponentVTable {
    component_type,
    info: component_info,
    update: component_update,
    cleanup: component_cleanup,
    destroy: component_destroy,
};

// ============================================================================
// Plugin
// ============================================================================

struct RigidPlugin;

impl RigidPlugin {
    fn build_component(
        &self,
        ctx: &ChironAssetContext,
        config: &str,
        ty: ChironComponentType,
    ) -> Result<RigidComponent, (ChironErrorCode, String)> {
        match ty {
            ChironComponentType::Geometry => {
                let cfg: GeometryConfig = serde_yaml::from_str(config)
                    .map_err(|e| (ChironErrorCode::ErrorInvalidArgument, e.to_string()))?;
                let mesh = cfg
                    .load_mesh()
                    .map_err(|e| (ChironErrorCode::ErrorInitialization, e))?;
                let surface = cfg
                    .surface_vertices
                    .unwrap_or(mesh.vertices.len() as u32)
                    .min(mesh.vertices.len() as u32);
                Ok(RigidComponent::Geometry(RigidGeometry {
                    mesh,
                    surface_vertices: surface,
                }))
            }

            ChironComponentType::Render => {
                // the geometry must be declared (and therefore attached)
                // before the render component
                let mut sibling = ChironComponentInfo::zeroed();
                let mut serr = ChironError::new(ChironErrorCode::Success, "");
                let code = (ctx.sibling_info)(
                    ctx.host,
                    ChironComponentType::Geometry,
                    &mut sibling,
                    &mut serr,
                );
                if code != ChironErrorCode::Success {
                    return Err((
                        ChironErrorCode::ErrorSiblingMissing,
                        "render requires an attached geometry".to_string(),
                    ));
                }

                let bytes = sibling.vertex_count as u64 * 3 * 4;
                let mut position_buffer = 0u64;
                let mut normal_buffer = 0u64;
                let mut berr = ChironError::new(ChironErrorCode::Success, "");
                let code = (ctx.acquire_buffer)(
                    ctx.host,
                    CHIRON_BUFFER_VERTEX,
                    bytes,
                    &mut position_buffer,
                    &mut berr,
                );
                if code != ChironErrorCode::Success {
                    return Err((code, "could not acquire position buffer".to_string()));
                }
                let code = (ctx.acquire_buffer)(
                    ctx.host,
                    CHIRON_BUFFER_NORMAL,
                    bytes,
                    &mut normal_buffer,
                    &mut berr,
                );
                if code != ChironErrorCode::Success {
                    return Err((code, "could not acquire normal buffer".to_string()));
                }

                Ok(RigidComponent::Render(RigidRender {
                    vertex_count: sibling.vertex_count,
                    position_buffer,
                    normal_buffer,
                }))
            }

            ChironComponentType::Collision => {
                let cfg: CollisionConfig = serde_yaml::from_str(config)
                    .map_err(|e| (ChironErrorCode::ErrorInvalidArgument, e.to_string()))?;
                let mut sibling = ChironComponentInfo::zeroed();
                let mut serr = ChironError::new(ChironErrorCode::Success, "");
                let code = (ctx.sibling_info)(
                    ctx.host,
                    ChironComponentType::Geometry,
                    &mut sibling,
                    &mut serr,
                );
                if code != ChironErrorCode::Success {
                    return Err((
                        ChironErrorCode::ErrorSiblingMissing,
                        "collision requires an attached geometry".to_string(),
                    ));
                }
                Ok(RigidComponent::Collision(RigidCollision {
                    vertex_count: sibling.vertex_count,
                    margin: cfg.margin.unwrap_or(0.005),
                }))
            }

            _ => Err((
                ChironErrorCode::ErrorUnknownComponent,
                format!("invalid component type for rigid plugin: {ty:?}"),
            )),
        }
    }
}

/// Macro to catch panics in FFI functions
macro_rules! catch_panic {
    ($error:expr, $code:block) => {
        match catch_unwind(AssertUnwindSafe(|| $code)) {
            Ok(result) => result,
            Err(panic_info) => {
                let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    format!("plugin panic: {}", s)
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    format!("plugin panic: {}", s)
                } else {
                    "plugin panic: unknown error".to_string()
                };
                if !$error.is_null() {
                    unsafe {
                        *$error = ChironError::new(ChironErrorCode::ErrorPanic, &message);
                    }
                }
                ChironErrorCode::ErrorPanic
            }
        }
    };
}

// ============================================================================
// Plugin vtable
// ============================================================================

extern "C" fn abi_version(major: *mut u32, minor: *mut u32, patch: *mut u32) {
    if !major.is_null() && !minor.is_null() && !patch.is_null() {
        unsafe {
            *major = CHIRON_PLUGIN_ABI_VERSION_MAJOR;
            *minor = CHIRON_PLUGIN_ABI_VERSION_MINOR;
            *patch = CHIRON_PLUGIN_ABI_VERSION_PATCH;
        }
    }
}

extern "C" fn plugin_info(name: *mut c_char) {
    copy_str_to_buffer("Rigid", name, 64);
}

extern "C" fn add_asset_component(
    plugin: *mut ChironPluginHandle,
    ctx: *const ChironAssetContext,
    config: *const u8,
    config_len: usize,
    component_type: ChironComponentType,
    error: *mut ChironError,
) -> ChironErrorCode {
    catch_panic!(error, {
        if plugin.is_null() || ctx.is_null() {
            if !error.is_null() {
                unsafe {
                    *error = ChironError::new(
                        ChironErrorCode::ErrorNullPointer,
                        "null pointer passed to add_asset_component",
                    );
                }
            }
            return ChironErrorCode::ErrorNullPointer;
        }
        let this = unsafe { &*(plugin as *const RigidPlugin) };
        let ctx = unsafe { &*ctx };

        let Some(config) = config_str(config, config_len) else {
            unsafe {
                *error = ChironError::new(
                    ChironErrorCode::ErrorInvalidArgument,
                    "config fragment is not valid UTF-8",
                );
            }
            return ChironErrorCode::ErrorInvalidArgument;
        };

        let component = match this.build_component(ctx, config, component_type) {
            Ok(c) => c,
            Err((code, message)) => {
                unsafe {
                    *error = ChironError::new(code, &message);
                }
                return code;
            }
        };

        let handle = Box::into_raw(Box::new(component)) as *mut ChironComponentHandle;
        let code = (ctx.attach)(ctx.host, component_type, handle, &COMPONENT_VTABLE, error);
        if code != ChironErrorCode::Success {
            // host refused the attachment; the instance is still ours
            component_destroy(handle);
        }
        code
    })
}

extern "C" fn plugin_cleanup(_plugin: *mut ChironPluginHandle) {}

extern "C" fn plugin_destroy(plugin: *mut ChironPluginHandle) {
    if !plugin.is_null() {
        drop(unsafe { Box::from_raw(plugin as *mut RigidPlugin) });
    }
}

static PLUGIN_VTABLE: ChironPluginVTable = ChironPluginVTable {
    abi_version,
    plugin_info,
    add_asset_component,
    cleanup: plugin_cleanup,
    destroy: plugin_destroy,
};

/// Plugin entry point, resolved by the host after the library loads.
/// Registers exactly one plugin instance through the registrar and
/// reports success explicitly.
#[no_mangle]
pub extern "C" fn StartPlugin(ty: ChironPluginType, registrar: *const ChironRegistrar) -> c_int {
    if registrar.is_null() {
        return 0;
    }
    let registrar = unsafe { &*registrar };

    let handle = Box::into_raw(Box::new(RigidPlugin)) as *mut ChironPluginHandle;
    let accepted = (registrar.register)(registrar.host, ty, handle, &PLUGIN_VTABLE);
    if accepted == 0 {
        // host refused the registration; the instance is still ours
        plugin_destroy(handle);
        return 0;
    }
    1
}
