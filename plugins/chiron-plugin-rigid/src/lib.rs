/*
 *  Chiron Rigid Plugin
 *
 *  A dynamic plugin for the Chiron simulation host that manufactures
 *  components for rigid assets via the plugin system.
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 */

//! # Chiron Rigid Capability Plugin
//!
//! Manufactures the components of rigid (undeformable) assets:
//! instruments such as the scalpel and retractor, and rigid props.
//!
//! ## Components
//!
//! - **Geometry** - mesh storage, inline or from whitespace text files
//! - **Render** - GPU position/normal buffers acquired from the host
//! - **Collision** - coarse collision proxy over the geometry
//!
//! ## Usage
//!
//! The host loads this plugin when a plugins manifest lists:
//!
//! ```yaml
//! count: 1
//! plugins:
//!   - name: Rigid
//!     location: ./plugins
//! ```
//!
//! and assets reference it with `loading_plugin: Rigid`.

mod ffi;
mod plugin;

// Re-export the plugin entry point
pub use plugin::StartPlugin;
