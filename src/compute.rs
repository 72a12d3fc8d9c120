/*
 *  compute.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Compute capability - opaque backend context provider
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

//! The compute capability as seen by the core. A real deployment would put
//! a CUDA or OpenCL context behind this surface; the core only ever sees
//! opaque handles mapped onto render buffers.

use std::cell::RefCell;
use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::ComputeSettings;
use crate::render::RenderHandle;
use crate::types::ManagerType;

/// Opaque compute-side mirror of a render buffer. Zero is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComputeHandle(pub u64);

pub struct ComputeManager {
    backend: String,
    mappings: RefCell<BTreeMap<u64, RenderHandle>>,
    next_handle: RefCell<u64>,
}

impl ComputeManager {
    pub fn new() -> Self {
        ComputeManager {
            backend: String::new(),
            mappings: RefCell::new(BTreeMap::new()),
            next_handle: RefCell::new(1),
        }
    }

    pub fn initialize(&mut self, settings: Option<&ComputeSettings>) {
        self.backend = settings
            .and_then(|s| s.backend.clone())
            .unwrap_or_else(|| "CPU".to_string());
        info!(
            "{} initialized (backend {})",
            ManagerType::ComputeManager,
            self.backend
        );
    }

    /// Map a render buffer into the compute context, returning the
    /// compute-side handle. The same render buffer may be mapped once.
    pub fn register_buffer(&self, buffer: RenderHandle) -> Option<ComputeHandle> {
        let mut mappings = self.mappings.borrow_mut();
        if mappings.values().any(|b| *b == buffer) {
            warn!("render buffer {} already mapped for compute", buffer.0);
            return None;
        }
        let mut next = self.next_handle.borrow_mut();
        let handle = *next;
        *next += 1;
        mappings.insert(handle, buffer);
        debug!("compute mapping {handle} -> render buffer {}", buffer.0);
        Some(ComputeHandle(handle))
    }

    pub fn mapped_buffer(&self, handle: ComputeHandle) -> Option<RenderHandle> {
        self.mappings.borrow().get(&handle.0).copied()
    }

    pub fn outstanding(&self) -> usize {
        self.mappings.borrow().len()
    }

    pub fn cleanup(&mut self) {
        let n = self.mappings.borrow().len();
        if n > 0 {
            debug!("{} releasing {n} mappings", ManagerType::ComputeManager);
        }
        self.mappings.borrow_mut().clear();
    }
}

impl Default for ComputeManager {
    fn default() -> Self {
        Self::new()
    }
}
