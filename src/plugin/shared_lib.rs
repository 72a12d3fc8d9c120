/*
 *  plugin/shared_lib.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Shared library handle - load, symbol lookup, unload
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

use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};
use log::{debug, error};

use crate::error::CoreError;

/// Owns exactly one native dynamic-library handle.
///
/// One instance per library: loading twice through the same instance is
/// not supported. The handle must outlive every plugin instance the
/// library produced; the plugin manager enforces that ordering.
#[derive(Debug)]
pub struct SharedLibrary {
    path: PathBuf,
    lib: Option<Library>,
}

impl SharedLibrary {
    /// Open the dynamic library at `path`. The error carries the platform
    /// loader's diagnostic text.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref().to_path_buf();
        let lib = unsafe { Library::new(&path) }.map_err(|e| {
            error!("{} could not be loaded: {e}", path.display());
            CoreError::Load {
                path: path.display().to_string(),
                detail: e.to_string(),
            }
        })?;
        debug!("loaded library {}", path.display());
        Ok(SharedLibrary {
            path,
            lib: Some(lib),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.lib.is_some()
    }

    /// Resolve an exported symbol by nul-terminated name. Returns None
    /// when the symbol does not exist or the library is unloaded; callers
    /// must check before invoking.
    ///
    /// # Safety
    ///
    /// `T` must match the actual type of the exported symbol.
    pub unsafe fn get<T>(&self, symbol: &[u8]) -> Option<Symbol<'_, T>> {
        let lib = self.lib.as_ref()?;
        match unsafe { lib.get::<T>(symbol) } {
            Ok(sym) => Some(sym),
            Err(_) => None,
        }
    }

    /// Release the native handle. A no-op on an already-unloaded handle.
    /// A loader failure is reported but leaves this instance unloaded
    /// either way; callers treat it as a warning.
    pub fn unload(&mut self) -> Result<(), CoreError> {
        let Some(lib) = self.lib.take() else {
            return Ok(());
        };
        lib.close().map_err(|e| {
            error!("{} could not be unloaded: {e}", self.path.display());
            CoreError::Unload {
                path: self.path.display().to_string(),
                detail: e.to_string(),
            }
        })?;
        debug!("unloaded library {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_reports_loader_diagnostic() {
        let err = SharedLibrary::load("/nonexistent/libNothing.so").unwrap_err();
        match err {
            CoreError::Load { path, detail } => {
                assert!(path.contains("libNothing.so"));
                assert!(!detail.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unload_never_loaded_is_noop() {
        let mut lib = SharedLibrary {
            path: PathBuf::from("unloaded.so"),
            lib: None,
        };
        assert!(!lib.is_loaded());
        assert!(lib.unload().is_ok());
        assert!(lib.unload().is_ok());
    }

    #[test]
    fn test_symbol_lookup_on_unloaded_returns_none() {
        let lib = SharedLibrary {
            path: PathBuf::from("unloaded.so"),
            lib: None,
        };
        let sym = unsafe { lib.get::<extern "C" fn()>(b"StartPlugin\0") };
        assert!(sym.is_none());
    }
}
