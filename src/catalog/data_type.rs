use crate::error::{GpkgError, Result};
use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

/// Kind of a user data table, as recorded in `gpkg_contents.data_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableKind {
    Features,
    Tiles,
    Attributes,
}

impl TableKind {
    pub const ALL: [TableKind; 3] = [TableKind::Features, TableKind::Tiles, TableKind::Attributes];

    /// Core data type name.
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Features => "features",
            TableKind::Tiles => "tiles",
            TableKind::Attributes => "attributes",
        }
    }

    /// Resolve a contents data type name, including registered aliases.
    pub fn from_name(name: &str) -> Option<TableKind> {
        let key = name.to_ascii_lowercase();
        if let Some(kind) = TableKind::ALL.into_iter().find(|kind| kind.name() == key) {
            return Some(kind);
        }
        // A poisoned lock still holds a consistent map: inserts are single calls.
        let registry = DATA_TYPE_ALIASES
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.get(&key).copied()
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

static DATA_TYPE_ALIASES: LazyLock<RwLock<HashMap<String, TableKind>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Register an extension data type name (e.g. `2d-gridded-coverage`) that
/// behaves like one of the core kinds.
///
/// The registry is process-wide. Core names cannot be re-registered;
/// registering an existing alias again replaces its kind.
pub fn register_data_type(name: &str, kind: TableKind) -> Result<()> {
    let key = name.to_ascii_lowercase();
    if TableKind::ALL.into_iter().any(|core| core.name() == key) {
        return Err(GpkgError::CoreDataTypeOverwrite(name.to_string()));
    }

    let mut registry = DATA_TYPE_ALIASES
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(previous) = registry.insert(key, kind) {
        if previous != kind {
            tracing::info!(data_type = name, %previous, %kind, "contents data type re-registered");
        }
    } else {
        tracing::debug!(data_type = name, %kind, "contents data type registered");
    }
    Ok(())
}

/// Registered alias names of a core kind.
pub fn data_type_aliases(kind: TableKind) -> Vec<String> {
    let registry = DATA_TYPE_ALIASES
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut names: Vec<String> = registry
        .iter()
        .filter(|(_, registered)| **registered == kind)
        .map(|(name, _)| name.clone())
        .collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_core_names_case_insensitively() {
        assert_eq!(TableKind::from_name("features"), Some(TableKind::Features));
        assert_eq!(TableKind::from_name("TILES"), Some(TableKind::Tiles));
        assert_eq!(TableKind::from_name("unknown-kind"), None);
    }

    #[test]
    fn registers_aliases_but_not_core_names() -> Result<()> {
        register_data_type("2d-gridded-coverage", TableKind::Tiles)?;
        assert_eq!(
            TableKind::from_name("2d-gridded-coverage"),
            Some(TableKind::Tiles)
        );
        assert!(data_type_aliases(TableKind::Tiles).contains(&"2d-gridded-coverage".to_string()));

        let err = register_data_type("Features", TableKind::Tiles).expect_err("core name");
        assert!(matches!(err, GpkgError::CoreDataTypeOverwrite(_)));
        assert_eq!(TableKind::from_name("features"), Some(TableKind::Features));
        Ok(())
    }
}
