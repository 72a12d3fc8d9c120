/*
 *  error.rs
 *
 *  Chiron - composable simulation host
 *  (c) 2020-26 Stuart Hunter
 *
 *  Unified error types for the host core
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

use thiserror::Error;

use crate::config::ConfigError;

/// What kind of registry or identifier an error refers to. Carried so a
/// failure log names the subsystem, not just the offending string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Manager,
    Plugin,
    Asset,
    AssetType,
    Component,
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IdentifierKind::Manager => "manager",
            IdentifierKind::Plugin => "plugin",
            IdentifierKind::Asset => "asset",
            IdentifierKind::AssetType => "asset type",
            IdentifierKind::Component => "component",
        };
        f.write_str(s)
    }
}

/// Failure taxonomy for startup, loading and teardown.
///
/// Every fallible operation in the core returns one of these; nothing in
/// the startup path retries. Callers abort their own multi-step operation
/// and clean up whatever partial state they own.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing manifest content.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A manifest name did not resolve to a recognized enum value.
    #[error("unrecognized {kind} name '{name}'")]
    UnknownIdentifier { kind: IdentifierKind, name: String },

    /// A registry key was already occupied; the existing entry is kept.
    #[error("{kind} '{name}' already registered")]
    DuplicateRegistration { kind: IdentifierKind, name: String },

    /// A lookup missed on an existing registry.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: IdentifierKind, name: String },

    /// The platform loader could not open a dynamic library.
    #[error("could not load library '{path}': {detail}")]
    Load { path: String, detail: String },

    /// The platform loader reported failure releasing a library. Logged as
    /// a warning during teardown, never fatal to the remaining cleanup.
    #[error("could not unload library '{path}': {detail}")]
    Unload { path: String, detail: String },

    /// A loaded library does not export the expected entry point.
    #[error("symbol '{symbol}' not found in '{library}'")]
    MissingEntryPoint { symbol: String, library: String },

    /// A plugin reported failure from a contract operation.
    #[error("plugin '{plugin}': {detail}")]
    PluginContract { plugin: String, detail: String },

    /// An operation was invoked in a lifecycle state that forbids it,
    /// e.g. re-initializing a cleaned-up manager.
    #[error("{0}")]
    InvalidState(String),
}

impl CoreError {
    pub fn unknown(kind: IdentifierKind, name: impl Into<String>) -> Self {
        CoreError::UnknownIdentifier {
            kind,
            name: name.into(),
        }
    }

    pub fn duplicate(kind: IdentifierKind, name: impl Into<String>) -> Self {
        CoreError::DuplicateRegistration {
            kind,
            name: name.into(),
        }
    }

    pub fn not_found(kind: IdentifierKind, name: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let e = CoreError::unknown(IdentifierKind::Plugin, "Squishy");
        assert_eq!(e.to_string(), "unrecognized plugin name 'Squishy'");

        let e = CoreError::duplicate(IdentifierKind::Asset, "Apple");
        assert_eq!(e.to_string(), "asset 'Apple' already registered");

        let e = CoreError::MissingEntryPoint {
            symbol: "StartPlugin".into(),
            library: "libRigid.so".into(),
        };
        assert!(e.to_string().contains("StartPlugin"));
        assert!(e.to_string().contains("libRigid.so"));
    }
}
