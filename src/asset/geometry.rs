/*
 *  asset/geometry.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Geometry component - vertex and face storage with subset bounds
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
use std::fs;
use std::path::PathBuf;

use log::{debug, error};
use serde::Deserialize;

use crate::config::ConfigError;
use crate::error::CoreError;
use crate::types::{AssetComponentType, AssetId};

use super::component::{Component, ComponentInfo};
use super::Asset;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Aabb {
    pub fn empty() -> Self {
        Aabb {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
        }
    }

    pub fn grow(&mut self, p: [f32; 3]) {
        for i in 0..3 {
            if p[i] < self.min[i] {
                self.min[i] = p[i];
            }
            if p[i] > self.max[i] {
                self.max[i] = p[i];
            }
        }
    }
}

/// A contiguous run of faces with its own bound, used for coarse culling
/// and per-region collision queries.
#[derive(Debug, Clone)]
struct SpatialSubset {
    ioffset: usize,
    isize: usize,
    bound: Aabb,
}

#[derive(Debug, Deserialize)]
struct GeometryConfig {
    vertex_file: PathBuf,
    index_file: PathBuf,
    subsets: Option<usize>,
    surface_vertices: Option<u32>,
}

/// Host-side geometry component: double-buffered vertices, face indices
/// and per-subset bounds. Mesh files are whitespace-separated text, read
/// into raw buffers by the trivial parser below.
pub struct Geometry {
    owner: Option<AssetId>,
    offset_index: usize,
    vertices: Vec<[f32; 3]>, // two frames back to back
    vertex_count: usize,
    surface_vertex_count: u32,
    faces: Vec<u32>,
    subsets: Vec<SpatialSubset>,
    bounds: Aabb,
}

impl Geometry {
    pub fn new() -> Self {
        Geometry {
            owner: None,
            offset_index: 0,
            vertices: Vec::new(),
            vertex_count: 0,
            surface_vertex_count: 0,
            faces: Vec::new(),
            subsets: Vec::new(),
            bounds: Aabb::empty(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn face_index_count(&self) -> usize {
        self.faces.len()
    }

    pub fn current_vertices(&self) -> &[[f32; 3]] {
        let start = self.offset_index * self.vertex_count;
        &self.vertices[start..start + self.vertex_count]
    }

    pub fn previous_vertices(&self) -> &[[f32; 3]] {
        let start = (self.offset_index ^ 1) * self.vertex_count;
        &self.vertices[start..start + self.vertex_count]
    }

    pub fn current_vertices_mut(&mut self) -> &mut [[f32; 3]] {
        let start = self.offset_index * self.vertex_count;
        &mut self.vertices[start..start + self.vertex_count]
    }

    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn subset_count(&self) -> usize {
        self.subsets.len()
    }

    fn read_vertices(path: &PathBuf) -> Result<Vec<[f32; 3]>, CoreError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut out = Vec::new();
        let mut triple = [0.0f32; 3];
        let mut n = 0;
        for tok in text.split_whitespace() {
            let v: f32 = tok.parse().map_err(|_| {
                ConfigError::Validation(format!("bad vertex token '{tok}' in {}", path.display()))
            })?;
            triple[n % 3] = v;
            n += 1;
            if n % 3 == 0 {
                out.push(triple);
            }
        }
        if n == 0 || n % 3 != 0 {
            return Err(
                ConfigError::Validation(format!("truncated vertex data in {}", path.display()))
                    .into(),
            );
        }
        Ok(out)
    }

    fn read_indices(path: &PathBuf, vertex_count: usize) -> Result<Vec<u32>, CoreError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut out = Vec::new();
        for tok in text.split_whitespace() {
            let i: u32 = tok.parse().map_err(|_| {
                ConfigError::Validation(format!("bad index token '{tok}' in {}", path.display()))
            })?;
            if i as usize >= vertex_count {
                return Err(ConfigError::Validation(format!(
                    "index {i} out of range in {} ({vertex_count} vertices)",
                    path.display()
                ))
                .into());
            }
            out.push(i);
        }
        if out.is_empty() || out.len() % 3 != 0 {
            return Err(
                ConfigError::Validation(format!("truncated index data in {}", path.display()))
                    .into(),
            );
        }
        Ok(out)
    }

    fn build_subsets(&mut self, requested: usize) {
        let face_count = self.faces.len() / 3;
        let count = requested.clamp(1, face_count.max(1));
        let per = face_count.div_ceil(count);
        self.subsets.clear();
        let mut start = 0;
        while start < face_count {
            let len = per.min(face_count - start);
            self.subsets.push(SpatialSubset {
                ioffset: start * 3,
                isize: len,
                bound: Aabb::empty(),
            });
            start += len;
        }
        self.refresh_bounds();
    }

    fn refresh_bounds(&mut self) {
        let vertex_count = self.vertex_count;
        let start = self.offset_index * vertex_count;
        let current = &self.vertices[start..start + vertex_count];
        let faces = &self.faces;
        self.bounds = Aabb::empty();
        for subset in &mut self.subsets {
            subset.bound = Aabb::empty();
            for idx in &faces[subset.ioffset..subset.ioffset + subset.isize * 3] {
                subset.bound.grow(current[*idx as usize]);
            }
            self.bounds.grow(subset.bound.min);
            self.bounds.grow(subset.bound.max);
        }
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for Geometry {
    fn component_type(&self) -> AssetComponentType {
        AssetComponentType::Geometry
    }

    fn owner(&self) -> Option<AssetId> {
        self.owner
    }

    fn set_owner(&mut self, owner: AssetId) -> Result<(), CoreError> {
        if let Some(existing) = self.owner {
            error!("geometry already owned by {existing}");
            return Err(CoreError::InvalidState(format!(
                "component already owned by '{existing}'"
            )));
        }
        self.owner = Some(owner);
        Ok(())
    }

    fn initialize(&mut self, config: &str, _asset: &Asset) -> Result<(), CoreError> {
        let cfg: GeometryConfig =
            serde_yaml::from_str(config).map_err(ConfigError::Yaml)?;

        let frame = Self::read_vertices(&cfg.vertex_file)?;
        self.vertex_count = frame.len();
        self.faces = Self::read_indices(&cfg.index_file, self.vertex_count)?;

        // double buffer: previous frame starts as a copy of the current
        self.vertices = frame.clone();
        self.vertices.extend_from_slice(&frame);
        self.offset_index = 0;

        self.surface_vertex_count = cfg
            .surface_vertices
            .unwrap_or(self.vertex_count as u32)
            .min(self.vertex_count as u32);

        self.build_subsets(cfg.subsets.unwrap_or(1));
        debug!(
            "geometry loaded: {} vertices, {} faces, {} subsets",
            self.vertex_count,
            self.faces.len() / 3,
            self.subsets.len()
        );
        Ok(())
    }

    fn info(&self) -> ComponentInfo {
        ComponentInfo {
            vertex_count: self.vertex_count as u32,
            surface_vertex_count: self.surface_vertex_count,
            face_index_count: self.faces.len() as u32,
            ..Default::default()
        }
    }

    fn update(&mut self) {
        if self.vertex_count == 0 {
            return;
        }
        // the frame just computed becomes current; the old current is kept
        // as the previous frame for velocity estimation
        self.offset_index ^= 1;
        let (src, dst) = if self.offset_index == 0 {
            let (a, b) = self.vertices.split_at_mut(self.vertex_count);
            (b, a)
        } else {
            let (a, b) = self.vertices.split_at_mut(self.vertex_count);
            (a, b)
        };
        dst.copy_from_slice(src);
        self.refresh_bounds();
    }

    fn cleanup(&mut self) {
        self.vertices.clear();
        self.faces.clear();
        self.subsets.clear();
        self.vertex_count = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
