/*
 *  Chiron CpuMsd Plugin
 *
 *  A dynamic plugin for the Chiron simulation host that manufactures
 *  components for deformable mass-spring-damper assets.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

//! # Chiron CPU Mass-Spring-Damper Plugin
//!
//! Manufactures the components of deformable MSD assets (soft organs):
//!
//! - **Geometry** - rest positions and surface topology
//! - **Render** - GPU position/normal buffers acquired from the host
//! - **Physics** - spring topology; writes into the render component's
//!   position buffer through a compute-side mapping
//!
//! The physics component resolves the render component's buffer handle
//! through the asset context, so manifests must declare Render before
//! Physics.
//!
//! ## Usage
//!
//! ```yaml
//! count: 1
//! plugins:
//!   - name: CpuMsd
//!     location: ./plugins
//! ```

mod ffi;
mod plugin;

// Re-export the plugin entry point
pub use plugin::StartPlugin;
