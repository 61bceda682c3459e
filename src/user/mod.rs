//! Generic user table layer shared by feature, tile and attribute tables.

mod column;
mod dao;
mod result_set;
mod row;
mod table;

pub use column::UserColumn;
pub use dao::UserDao;
pub use result_set::{ResultSet, UserQuery};
pub use row::UserRow;
pub use table::{UserTable, validate_contents};
