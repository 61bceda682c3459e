use super::gpkg::Gpkg;
use crate::catalog::TableKind;
use crate::error::Result;
use crate::user::UserDao;
use std::ops::{Deref, DerefMut};

/// DAO over an attributes table: non-spatial rows with the generic user
/// table operations.
#[derive(Debug)]
pub struct AttributesDao<'a> {
    dao: UserDao<'a>,
}

impl<'a> AttributesDao<'a> {
    pub(crate) fn open(gpkg: &'a Gpkg, table_name: &str) -> Result<Self> {
        Ok(Self::from_dao(UserDao::open(gpkg, table_name, TableKind::Attributes)?))
    }

    pub(crate) fn from_dao(dao: UserDao<'a>) -> Self {
        Self { dao }
    }

    pub fn into_inner(self) -> UserDao<'a> {
        self.dao
    }
}

impl<'a> Deref for AttributesDao<'a> {
    type Target = UserDao<'a>;

    fn deref(&self) -> &Self::Target {
        &self.dao
    }
}

impl DerefMut for AttributesDao<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.dao
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::GeometryColumns;
    use crate::error::GpkgError;
    use crate::types::{DataType, GeometryType};
    use crate::user::UserColumn;

    fn create_labels(gpkg: &Gpkg) -> Result<AttributesDao<'_>> {
        gpkg.create_attributes_table(
            "labels",
            vec![
                UserColumn::primary_key_column(0, "id", true),
                UserColumn::new(1, "name", DataType::Text).not_null(),
            ],
        )
    }

    #[test]
    fn insert_count_delete() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = create_labels(&gpkg)?;

        let mut row = dao.new_row();
        row.set_value("name", "hello")?;
        let id = dao.create(&mut row)?;
        assert_eq!(dao.count()?, 1);

        assert_eq!(dao.delete_by_id(id)?, 1);
        assert_eq!(dao.count()?, 0);
        Ok(())
    }

    #[test]
    fn not_null_is_enforced() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        let dao = create_labels(&gpkg)?;

        let mut row = dao.new_row();
        row.set_value("name", crate::types::Value::Null)?;
        let err = dao.create(&mut row).expect_err("NOT NULL");
        assert!(err.is_constraint_violation());
        assert_eq!(dao.count()?, 0);
        Ok(())
    }

    #[test]
    fn reopens_with_contents() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        create_labels(&gpkg)?;

        let dao = gpkg.attributes_dao("labels")?;
        let contents = dao.table().contents().expect("contents");
        assert_eq!(contents.data_type, "attributes");
        assert_eq!(contents.identifier.as_deref(), Some("labels"));
        let id = dao.table().column("id").expect("id column");
        assert!(id.is_primary_key() && id.is_autoincrement());
        Ok(())
    }

    #[test]
    fn rejects_feature_tables() -> Result<()> {
        let gpkg = Gpkg::new_in_memory()?;
        gpkg.create_feature_table(
            &GeometryColumns::new("roads", "geom", GeometryType::LineString, 4326),
            "fid",
            Vec::new(),
        )?;

        let err = gpkg.attributes_dao("roads").expect_err("wrong kind");
        assert!(matches!(err, GpkgError::DataTypeMismatch { expected: "attributes", .. }));
        assert!(matches!(
            gpkg.attributes_dao("missing"),
            Err(GpkgError::MissingTable { .. })
        ));
        Ok(())
    }
}
