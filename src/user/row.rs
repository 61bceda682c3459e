use super::table::UserTable;
use crate::error::{GpkgError, Result};
use crate::geometry::{geometry_to_gpkg, gpkg_geometry_to_wkb};
use crate::types::Value;
use geo_traits::GeometryTrait;
use std::sync::Arc;
use wkb::reader::Wkb;

/// One row of a user table.
///
/// Values are positional, matching the table's column order. A slot that was
/// never assigned (`None`) is left out of inserts and updates, so the column
/// default applies; an explicit `Value::Null` is written as `NULL`.
#[derive(Clone, Debug)]
pub struct UserRow {
    table: Arc<UserTable>,
    values: Vec<Option<Value>>,
}

impl UserRow {
    pub(crate) fn new(table: Arc<UserTable>) -> Self {
        let values = vec![None; table.column_count()];
        Self { table, values }
    }

    pub(crate) fn from_values(table: Arc<UserTable>, values: Vec<Value>) -> Self {
        let values = values.into_iter().map(Some).collect();
        Self { table, values }
    }

    pub fn table(&self) -> &UserTable {
        &self.table
    }

    pub(crate) fn table_arc(&self) -> &Arc<UserTable> {
        &self.table
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    /// Value at a column index; `None` if the index is out of range or the
    /// slot is unset.
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Value of a column by name (case-insensitive).
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.table
            .column_index(column)
            .and_then(|index| self.value_at(index))
    }

    /// Typed value of a column; unset or missing columns read as `Value::Null`.
    pub fn get<T>(&self, column: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = GpkgError>,
    {
        let index = self.table.require_column_index(column)?;
        let value = self.values[index].clone().unwrap_or(Value::Null);
        T::try_from(value)
    }

    pub fn set_value_at(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or_else(|| GpkgError::MissingColumnIndex {
                table: self.table.table_name().to_string(),
                index,
            })?;
        *slot = Some(value.into());
        Ok(())
    }

    pub fn set_value(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.table.require_column_index(column)?;
        self.values[index] = Some(value.into());
        Ok(())
    }

    /// Unset a slot so the column default applies on insert.
    pub fn clear_value(&mut self, column: &str) -> Result<()> {
        let index = self.table.require_column_index(column)?;
        self.values[index] = None;
        Ok(())
    }

    /// Primary key value, if the table has one and it is set to an integer.
    pub fn id(&self) -> Option<i64> {
        match self.table.pk_index().and_then(|i| self.value_at(i)) {
            Some(Value::Integer(id)) => Some(*id),
            _ => None,
        }
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        if let Some(index) = self.table.pk_index() {
            self.values[index] = Some(Value::Integer(id));
        }
    }

    /// Assigned `(column name, value)` pairs, skipping the primary key when
    /// `skip_pk` is set.
    pub(crate) fn assigned(&self, skip_pk: bool) -> (Vec<&str>, Vec<&Value>) {
        let pk_index = self.table.pk_index();
        self.table
            .columns()
            .iter()
            .zip(&self.values)
            .filter(|(column, _)| !(skip_pk && Some(column.index()) == pk_index))
            .filter_map(|(column, value)| value.as_ref().map(|value| (column.name(), value)))
            .unzip()
    }

    pub fn values(&self) -> impl Iterator<Item = Option<&Value>> {
        self.values.iter().map(Option::as_ref)
    }

    /// Geometry of a feature row, decoded from its GeoPackage blob.
    ///
    /// `None` for unset or NULL geometries and for tables without a geometry
    /// column.
    pub fn geometry(&self) -> Result<Option<Wkb<'_>>> {
        match self.table.geometry_index().and_then(|i| self.value_at(i)) {
            Some(Value::Blob(blob)) => Ok(Some(gpkg_geometry_to_wkb(blob)?)),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(GpkgError::ValueTypeMismatch {
                expected: "blob",
                actual: other.type_name(),
            }),
        }
    }

    /// Encode `geometry` as a GeoPackage blob into the geometry column.
    pub fn set_geometry<G>(&mut self, geometry: &G, srs_id: i32) -> Result<()>
    where
        G: GeometryTrait<T = f64>,
    {
        let index = self
            .table
            .geometry_index()
            .ok_or_else(|| GpkgError::MissingGeometryColumn {
                layer_name: self.table.table_name().to_string(),
            })?;
        self.values[index] = Some(Value::Blob(geometry_to_gpkg(geometry, srs_id)?));
        Ok(())
    }
}
