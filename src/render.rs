/*
 *  render.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Render capability - opaque GPU resource handle provider
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

//! The render capability as seen by the core: it accepts configuration and
//! produces opaque GPU resource handles. The actual graphics backend lives
//! behind this surface and is not part of the core.

use std::cell::RefCell;
use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::config::RenderSettings;
use crate::types::ManagerType;

/// Opaque GPU buffer handle. Zero is never a valid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Normal,
    Index,
}

impl BufferKind {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(BufferKind::Vertex),
            1 => Some(BufferKind::Normal),
            2 => Some(BufferKind::Index),
            _ => None,
        }
    }
}

struct BufferRecord {
    kind: BufferKind,
    size: u64,
}

/// Render manager stand-in: allocates and tracks opaque buffer handles.
/// Allocation takes `&self` because plugins reach it through host callbacks
/// while the rest of the driver is borrowed.
pub struct RenderManager {
    width: u32,
    height: u32,
    title: String,
    buffers: RefCell<BTreeMap<u64, BufferRecord>>,
    next_handle: RefCell<u64>,
}

impl RenderManager {
    pub fn new() -> Self {
        RenderManager {
            width: 0,
            height: 0,
            title: String::new(),
            buffers: RefCell::new(BTreeMap::new()),
            next_handle: RefCell::new(1),
        }
    }

    pub fn initialize(&mut self, settings: Option<&RenderSettings>) {
        if let Some(s) = settings {
            self.width = s.width.unwrap_or(1280);
            self.height = s.height.unwrap_or(720);
            self.title = s.title.clone().unwrap_or_else(|| "chiron".to_string());
        } else {
            self.width = 1280;
            self.height = 720;
            self.title = "chiron".to_string();
        }
        info!(
            "{} initialized ({}x{} '{}')",
            ManagerType::RenderManager,
            self.width,
            self.height,
            self.title
        );
    }

    /// Allocate a GPU-resident buffer and return its opaque handle.
    pub fn create_buffer(&self, kind: BufferKind, size: u64) -> RenderHandle {
        let mut next = self.next_handle.borrow_mut();
        let handle = *next;
        *next += 1;
        self.buffers
            .borrow_mut()
            .insert(handle, BufferRecord { kind, size });
        debug!("render buffer {handle} allocated ({kind:?}, {size} bytes)");
        RenderHandle(handle)
    }

    /// Release a buffer. Unknown handles are logged and ignored.
    pub fn release_buffer(&self, handle: RenderHandle) {
        if self.buffers.borrow_mut().remove(&handle.0).is_none() {
            warn!("release of unknown render buffer {}", handle.0);
        }
    }

    pub fn buffer_size(&self, handle: RenderHandle) -> Option<u64> {
        self.buffers.borrow().get(&handle.0).map(|r| r.size)
    }

    pub fn outstanding(&self) -> usize {
        self.buffers.borrow().len()
    }

    pub fn cleanup(&mut self) {
        let n = self.buffers.borrow().len();
        if n > 0 {
            debug!("{} releasing {n} buffers", ManagerType::RenderManager);
        }
        self.buffers.borrow_mut().clear();
    }
}

impl Default for RenderManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_distinct_and_nonzero() {
        let rm = RenderManager::new();
        let a = rm.create_buffer(BufferKind::Vertex, 1024);
        let b = rm.create_buffer(BufferKind::Index, 256);
        assert_ne!(a, b);
        assert_ne!(a.0, 0);
        assert_eq!(rm.outstanding(), 2);
        assert_eq!(rm.buffer_size(a), Some(1024));
    }

    #[test]
    fn test_release_unknown_is_tolerated() {
        let rm = RenderManager::new();
        rm.release_buffer(RenderHandle(99));
        assert_eq!(rm.outstanding(), 0);
    }

    #[test]
    fn test_buffer_kind_from_raw() {
        assert_eq!(BufferKind::from_raw(0), Some(BufferKind::Vertex));
        assert_eq!(BufferKind::from_raw(2), Some(BufferKind::Index));
        assert_eq!(BufferKind::from_raw(7), None);
    }
}
