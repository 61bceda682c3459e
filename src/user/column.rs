use crate::constraint::{ColumnConstraints, Constraint, ConstraintType, Constraints};
use crate::conversions::{geometry_type_from_name, geometry_type_to_str, sql_literal};
use crate::db::TableColumn;
use crate::ogc_sql::quote_identifier;
use crate::types::{DataType, GeometryType, Value};

/// Definition of one column of a user table.
///
/// Built either programmatically (`UserColumn::new` and the builder methods)
/// or from live schema via [`UserColumn::from_table_column`]. The
/// `constraints` collection is what `build_sql` renders; the flags mirror it
/// for quick lookups.
#[derive(Clone, Debug, PartialEq)]
pub struct UserColumn {
    index: usize,
    name: String,
    type_name: String,
    data_type: Option<DataType>,
    geometry_type: Option<GeometryType>,
    max: Option<u32>,
    not_null: bool,
    default_value: Option<Value>,
    primary_key: bool,
    autoincrement: bool,
    unique: bool,
    constraints: Constraints,
}

impl UserColumn {
    /// A nullable column of the given data type.
    pub fn new(index: usize, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            index,
            name: name.into(),
            type_name: data_type.name().to_string(),
            data_type: Some(data_type),
            geometry_type: None,
            max: None,
            not_null: false,
            default_value: None,
            primary_key: false,
            autoincrement: false,
            unique: false,
            constraints: Constraints::new(),
        }
    }

    /// `INTEGER PRIMARY KEY [AUTOINCREMENT] NOT NULL`.
    pub fn primary_key_column(index: usize, name: impl Into<String>, autoincrement: bool) -> Self {
        let mut column = Self::new(index, name, DataType::Integer);
        column.primary_key = true;
        column.constraints.add(Constraint::primary_key());
        if autoincrement {
            column.autoincrement = true;
            column.constraints.add(Constraint::autoincrement());
        }
        column.not_null()
    }

    /// A geometry column of a feature table, stored as a BLOB.
    pub fn geometry_column(
        index: usize,
        name: impl Into<String>,
        geometry_type: GeometryType,
    ) -> Self {
        let mut column = Self::new(index, name, DataType::Blob);
        column.type_name = geometry_type_to_str(geometry_type).to_string();
        column.geometry_type = Some(geometry_type);
        column
    }

    pub fn not_null(mut self) -> Self {
        if !self.not_null {
            self.not_null = true;
            self.constraints.add(Constraint::not_null());
        }
        self
    }

    pub fn unique(mut self) -> Self {
        if !self.unique {
            self.unique = true;
            self.constraints.add(Constraint::unique());
        }
        self
    }

    /// Maximum length for TEXT and BLOB columns.
    pub fn with_max(mut self, max: u32) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.constraints.remove(ConstraintType::Default);
        self.constraints
            .add(Constraint::default_value(sql_literal(&value)));
        self.default_value = Some(value);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        match constraint.kind() {
            ConstraintType::PrimaryKey => self.primary_key = true,
            ConstraintType::Autoincrement => self.autoincrement = true,
            ConstraintType::NotNull => self.not_null = true,
            ConstraintType::Unique => self.unique = true,
            _ => {}
        }
        self.constraints.add(constraint);
    }

    /// Rebuild a column from introspected metadata.
    ///
    /// `parsed` holds the constraints recovered from the table SQL. When it is
    /// `None` (no SQL available) constraints are derived from the metadata.
    pub fn from_table_column(column: &TableColumn, parsed: Option<&ColumnConstraints>) -> Self {
        let geometry_type = geometry_type_from_name(&column.type_name);
        let mut constraints = Constraints::new();
        let mut unique = false;

        match parsed {
            Some(parsed) => {
                unique = parsed.constraints.has(ConstraintType::Unique);
                constraints.add_all(parsed.constraints.iter().cloned());
            }
            None => {
                if column.primary_key {
                    constraints.add(Constraint::primary_key());
                    if column.autoincrement {
                        constraints.add(Constraint::autoincrement());
                    }
                }
                if column.not_null {
                    constraints.add(Constraint::not_null());
                }
                if let Some(raw) = &column.default_value_string {
                    constraints.add(Constraint::default_value(raw));
                }
            }
        }

        Self {
            index: column.index,
            name: column.name.clone(),
            type_name: column.type_name.clone(),
            data_type: column.data_type,
            geometry_type,
            max: column.max,
            not_null: column.not_null,
            default_value: column.default_value.clone(),
            primary_key: column.primary_key,
            autoincrement: column.autoincrement,
            unique,
            constraints,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type name without max length, e.g. `TEXT` or `POINT`.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn data_type(&self) -> Option<DataType> {
        self.data_type
    }

    pub fn geometry_type(&self) -> Option<GeometryType> {
        self.geometry_type
    }

    pub fn is_geometry(&self) -> bool {
        self.geometry_type.is_some()
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Column definition for `CREATE TABLE` / `ADD COLUMN`.
    pub fn build_sql(&self) -> String {
        let mut sql = quote_identifier(&self.name);
        sql.push(' ');
        sql.push_str(&self.type_name);
        if let Some(max) = self.max {
            sql.push_str(&format!("({max})"));
        }
        for constraint in self.constraints.iter() {
            sql.push(' ');
            sql.push_str(&constraint.build_sql());
        }
        sql
    }

    /// Coerce a stored value into this column's representation.
    pub(crate) fn coerce_read(&self, value: Value) -> Value {
        match self.data_type {
            Some(data_type) => data_type.coerce_read(value),
            None => value,
        }
    }
}
