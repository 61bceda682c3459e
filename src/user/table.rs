use super::column::UserColumn;
use crate::catalog::{Contents, TableKind};
use crate::constraint::{Constraint, ConstraintType, Constraints, TableConstraints};
use crate::db::TableInfo;
use crate::error::{GpkgError, Result};
use crate::gpkg::tiles::REQUIRED_TILE_COLUMNS;
use crate::ogc_sql::sql_create_table;

/// Validated definition of a user data table.
///
/// Columns are held in index order and indices are contiguous from 0. At most
/// one column is the primary key. Feature tables always have a primary key
/// and exactly one geometry column; tile tables have the standard tile
/// columns.
#[derive(Clone, Debug)]
pub struct UserTable {
    kind: TableKind,
    table_name: String,
    columns: Vec<UserColumn>,
    pk_index: Option<usize>,
    geometry_index: Option<usize>,
    constraints: Constraints,
    contents: Option<Contents>,
}

impl UserTable {
    pub fn new(
        kind: TableKind,
        table_name: impl Into<String>,
        mut columns: Vec<UserColumn>,
        constraints: Constraints,
    ) -> Result<Self> {
        let table_name = table_name.into();
        columns.sort_by_key(UserColumn::index);

        for (expected, column) in columns.iter().enumerate() {
            if column.index() < expected {
                return Err(GpkgError::DuplicateColumnIndex {
                    table: table_name,
                    index: column.index(),
                });
            }
            if column.index() > expected {
                return Err(GpkgError::MissingColumnIndex {
                    table: table_name,
                    index: expected,
                });
            }
        }

        for (i, column) in columns.iter().enumerate() {
            if columns[..i]
                .iter()
                .any(|other| other.name().eq_ignore_ascii_case(column.name()))
            {
                return Err(GpkgError::DuplicateColumnName {
                    table: table_name,
                    column: column.name().to_string(),
                });
            }
        }

        let mut pk_index: Option<usize> = None;
        for column in columns.iter().filter(|c| c.is_primary_key()) {
            if let Some(first) = pk_index {
                return Err(GpkgError::DuplicatePrimaryKey {
                    table: table_name,
                    first: columns[first].name().to_string(),
                    second: column.name().to_string(),
                });
            }
            pk_index = Some(column.index());
        }

        let mut geometry_index: Option<usize> = None;
        if kind == TableKind::Features {
            for column in columns.iter().filter(|c| c.is_geometry()) {
                if let Some(first) = geometry_index {
                    return Err(GpkgError::MultipleGeometryColumns {
                        table: table_name,
                        first: columns[first].name().to_string(),
                        second: column.name().to_string(),
                    });
                }
                geometry_index = Some(column.index());
            }
        }

        let table = Self {
            kind,
            table_name,
            columns,
            pk_index,
            geometry_index,
            constraints,
            contents: None,
        };
        table.validate_kind()?;
        Ok(table)
    }

    /// Rebuild a table definition from live schema.
    ///
    /// `parsed` holds the constraints recovered from the table SQL, if any.
    pub fn from_table_info(
        kind: TableKind,
        info: &TableInfo,
        parsed: Option<&TableConstraints>,
    ) -> Result<Self> {
        if info.has_composite_primary_key() {
            return Err(GpkgError::CompositePrimaryKeyUnsupported {
                layer_name: info.table_name().to_string(),
            });
        }

        let empty = crate::constraint::ColumnConstraints::new("");
        let columns = info
            .columns()
            .iter()
            .map(|column| {
                let column_constraints = parsed
                    .map(|parsed| parsed.column_constraints(&column.name).unwrap_or(&empty));
                UserColumn::from_table_column(column, column_constraints)
            })
            .collect();

        let constraints = parsed
            .map(|parsed| parsed.table_constraints().clone())
            .unwrap_or_default();

        Self::new(kind, info.table_name(), columns, constraints)
    }

    fn validate_kind(&self) -> Result<()> {
        match self.kind {
            TableKind::Attributes => Ok(()),
            TableKind::Features => {
                if self.pk_index.is_none() {
                    return Err(GpkgError::MissingPrimaryKeyColumn {
                        layer_name: self.table_name.clone(),
                    });
                }
                if self.geometry_index.is_none() {
                    return Err(GpkgError::MissingGeometryColumn {
                        layer_name: self.table_name.clone(),
                    });
                }
                Ok(())
            }
            TableKind::Tiles => {
                if self.pk_index.is_none() {
                    return Err(GpkgError::MissingPrimaryKeyColumn {
                        layer_name: self.table_name.clone(),
                    });
                }
                for required in REQUIRED_TILE_COLUMNS {
                    if !self.has_column(required) {
                        return Err(GpkgError::MissingRequiredColumn {
                            table: self.table_name.clone(),
                            column: required.to_string(),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[UserColumn] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(UserColumn::name)
    }

    pub fn column_at(&self, index: usize) -> Option<&UserColumn> {
        self.columns.get(index)
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&UserColumn> {
        self.column_index(name).map(|i| &self.columns[i])
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub(crate) fn require_column_index(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| GpkgError::MissingColumn {
            table: self.table_name.clone(),
            column: name.to_string(),
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn pk_index(&self) -> Option<usize> {
        self.pk_index
    }

    pub fn pk_column(&self) -> Option<&UserColumn> {
        self.pk_index.map(|i| &self.columns[i])
    }

    pub fn geometry_index(&self) -> Option<usize> {
        self.geometry_index
    }

    pub fn geometry_column(&self) -> Option<&UserColumn> {
        self.geometry_index.map(|i| &self.columns[i])
    }

    /// Table-level constraints.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.add(constraint);
    }

    pub fn has_unique_constraint(&self) -> bool {
        self.constraints.has(ConstraintType::Unique)
    }

    pub fn contents(&self) -> Option<&Contents> {
        self.contents.as_ref()
    }

    /// Attach the contents row, checking its data type against the table kind.
    pub fn set_contents(&mut self, contents: Contents) -> Result<()> {
        validate_contents(self.kind, &self.table_name, &contents)?;
        self.contents = Some(contents);
        Ok(())
    }

    /// `CREATE TABLE` statement for this definition.
    pub fn create_table_sql(&self) -> String {
        let mut definitions: Vec<String> = self.columns.iter().map(UserColumn::build_sql).collect();
        definitions.extend(self.constraints.sql());
        sql_create_table(&self.table_name, &definitions)
    }

    /// Whether `names` is this table's column signature, in order.
    pub(crate) fn matches_columns(&self, names: &[&str]) -> bool {
        names.len() == self.columns.len()
            && self
                .column_names()
                .zip(names)
                .all(|(expected, actual)| expected.eq_ignore_ascii_case(actual))
    }
}

/// Check a contents row's data type against a table kind.
///
/// Registered extension aliases resolve to their core kind before comparison.
pub fn validate_contents(kind: TableKind, table_name: &str, contents: &Contents) -> Result<()> {
    match TableKind::from_name(&contents.data_type) {
        None => Err(GpkgError::UnknownDataType {
            table: table_name.to_string(),
            data_type: contents.data_type.clone(),
        }),
        Some(actual) if actual != kind => Err(GpkgError::DataTypeMismatch {
            table: table_name.to_string(),
            expected: kind.name(),
            actual: contents.data_type.clone(),
        }),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::parser::parse_table_constraints;
    use crate::types::{DataType, GeometryType};

    fn attribute_columns(indices: [usize; 3]) -> Vec<UserColumn> {
        vec![
            UserColumn::primary_key_column(indices[0], "id", true),
            UserColumn::new(indices[1], "name", DataType::Text),
            UserColumn::new(indices[2], "value", DataType::Double),
        ]
    }

    #[test]
    fn rejects_gaps_in_column_indices() {
        let err = UserTable::new(
            TableKind::Attributes,
            "t",
            attribute_columns([0, 2, 3]),
            Constraints::new(),
        )
        .expect_err("gap");
        assert!(matches!(err, GpkgError::MissingColumnIndex { index: 1, .. }));
        assert!(err.is_schema_error());
    }

    #[test]
    fn accepts_columns_in_any_order() -> Result<()> {
        let table = UserTable::new(
            TableKind::Attributes,
            "t",
            attribute_columns([2, 0, 1]),
            Constraints::new(),
        )?;
        let names: Vec<&str> = table.column_names().collect();
        assert_eq!(names, vec!["name", "value", "id"]);
        assert_eq!(table.pk_index(), Some(2));
        Ok(())
    }

    #[test]
    fn rejects_duplicate_indices_names_and_keys() {
        let err = UserTable::new(
            TableKind::Attributes,
            "t",
            attribute_columns([0, 1, 1]),
            Constraints::new(),
        )
        .expect_err("duplicate index");
        assert!(matches!(err, GpkgError::DuplicateColumnIndex { index: 1, .. }));

        let columns = vec![
            UserColumn::primary_key_column(0, "id", false),
            UserColumn::new(1, "ID", DataType::Text),
        ];
        let err = UserTable::new(TableKind::Attributes, "t", columns, Constraints::new())
            .expect_err("duplicate name");
        assert!(matches!(err, GpkgError::DuplicateColumnName { .. }));

        let columns = vec![
            UserColumn::primary_key_column(0, "a", false),
            UserColumn::primary_key_column(1, "b", false),
        ];
        let err = UserTable::new(TableKind::Attributes, "t", columns, Constraints::new())
            .expect_err("duplicate key");
        assert!(matches!(err, GpkgError::DuplicatePrimaryKey { .. }));
    }

    #[test]
    fn feature_tables_need_key_and_geometry() -> Result<()> {
        let err = UserTable::new(
            TableKind::Features,
            "f",
            vec![UserColumn::primary_key_column(0, "fid", true)],
            Constraints::new(),
        )
        .expect_err("no geometry");
        assert!(matches!(err, GpkgError::MissingGeometryColumn { .. }));

        let table = UserTable::new(
            TableKind::Features,
            "f",
            vec![
                UserColumn::primary_key_column(0, "fid", true),
                UserColumn::geometry_column(1, "geom", GeometryType::Point),
            ],
            Constraints::new(),
        )?;
        assert_eq!(table.geometry_column().map(UserColumn::name), Some("geom"));

        let err = UserTable::new(
            TableKind::Features,
            "f",
            vec![
                UserColumn::primary_key_column(0, "fid", true),
                UserColumn::geometry_column(1, "geom", GeometryType::Point),
                UserColumn::geometry_column(2, "centroid", GeometryType::Point),
            ],
            Constraints::new(),
        )
        .expect_err("two geometry columns");
        assert!(err.is_schema_error());
        assert!(matches!(
            err,
            GpkgError::MultipleGeometryColumns { ref first, ref second, .. }
                if first == "geom" && second == "centroid"
        ));
        Ok(())
    }

    #[test]
    fn create_sql_round_trips_through_table_info() -> Result<()> {
        let mut table = UserTable::new(
            TableKind::Attributes,
            "people",
            vec![
                UserColumn::primary_key_column(0, "id", true),
                UserColumn::new(1, "name", DataType::Text).with_max(40).not_null(),
                UserColumn::new(2, "active", DataType::Boolean).with_default(true),
                UserColumn::new(3, "score", DataType::Double),
            ],
            Constraints::new(),
        )?;
        table.add_constraint(Constraint::table_unique(["name", "score"]).with_name("uq_people"));

        let conn = rusqlite::Connection::open_in_memory()?;
        let sql = table.create_table_sql();
        conn.execute_batch(&sql)?;

        let info = TableInfo::info(&conn, "people")?.expect("table info");
        let parsed = parse_table_constraints(&sql);
        let reread = UserTable::from_table_info(TableKind::Attributes, &info, Some(&parsed))?;

        assert_eq!(reread.column_count(), 4);
        for (original, reread) in table.columns().iter().zip(reread.columns()) {
            assert_eq!(original.name(), reread.name());
            assert_eq!(original.data_type(), reread.data_type());
            assert_eq!(original.max(), reread.max());
            assert_eq!(original.is_not_null(), reread.is_not_null());
            assert_eq!(original.is_primary_key(), reread.is_primary_key());
            assert_eq!(original.default_value(), reread.default_value());
        }
        assert!(reread.column("id").is_some_and(UserColumn::is_autoincrement));
        assert!(reread.has_unique_constraint());
        assert_eq!(
            reread.constraints().get(ConstraintType::Unique)[0].name(),
            Some("uq_people")
        );
        Ok(())
    }

    #[test]
    fn composite_keys_are_rejected() -> Result<()> {
        let conn = rusqlite::Connection::open_in_memory()?;
        conn.execute_batch("CREATE TABLE pair (x INTEGER, y INTEGER, PRIMARY KEY (x, y))")?;
        let info = TableInfo::info(&conn, "pair")?.expect("table info");
        let err = UserTable::from_table_info(TableKind::Attributes, &info, None)
            .expect_err("composite");
        assert!(matches!(err, GpkgError::CompositePrimaryKeyUnsupported { .. }));
        Ok(())
    }

    #[test]
    fn contents_must_match_kind() {
        let contents = Contents::new("t", TableKind::Features);
        let err = validate_contents(TableKind::Attributes, "t", &contents).expect_err("mismatch");
        assert!(matches!(err, GpkgError::DataTypeMismatch { expected: "attributes", .. }));

        let mut unknown = Contents::new("t", TableKind::Attributes);
        unknown.data_type = "not-a-kind".to_string();
        let err = validate_contents(TableKind::Attributes, "t", &unknown).expect_err("unknown");
        assert!(matches!(err, GpkgError::UnknownDataType { .. }));
    }
}
