//! Table and column constraint model.
//!
//! Constraints are either built by the crate itself (typed constructors such
//! as [`Constraint::not_null`]) or recovered verbatim from `CREATE TABLE`
//! statements by the [`parser`]. Both carry the SQL body of the constraint;
//! the optional `CONSTRAINT "<name>"` prefix is re-emitted by
//! [`Constraint::build_sql`].

pub mod parser;

use std::collections::HashMap;
use std::sync::LazyLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    PrimaryKey,
    Unique,
    Check,
    ForeignKey,
    NotNull,
    Default,
    Collate,
    Autoincrement,
}

impl ConstraintType {
    /// Constraint types that may appear as a table constraint.
    pub const TABLE_TYPES: [ConstraintType; 4] = [
        ConstraintType::PrimaryKey,
        ConstraintType::Unique,
        ConstraintType::Check,
        ConstraintType::ForeignKey,
    ];

    /// Constraint types that may appear in a column definition.
    pub const COLUMN_TYPES: [ConstraintType; 8] = [
        ConstraintType::PrimaryKey,
        ConstraintType::NotNull,
        ConstraintType::Unique,
        ConstraintType::Check,
        ConstraintType::Default,
        ConstraintType::Collate,
        ConstraintType::ForeignKey,
        ConstraintType::Autoincrement,
    ];

    /// SQL keyword(s) that introduce the constraint in a table constraint.
    pub fn table_keyword(self) -> Option<&'static str> {
        match self {
            ConstraintType::PrimaryKey => Some("PRIMARY KEY"),
            ConstraintType::Unique => Some("UNIQUE"),
            ConstraintType::Check => Some("CHECK"),
            ConstraintType::ForeignKey => Some("FOREIGN KEY"),
            _ => None,
        }
    }

    /// SQL keyword(s) that introduce the constraint in a column definition.
    pub fn column_keyword(self) -> &'static str {
        match self {
            ConstraintType::PrimaryKey => "PRIMARY KEY",
            ConstraintType::Unique => "UNIQUE",
            ConstraintType::Check => "CHECK",
            ConstraintType::ForeignKey => "REFERENCES",
            ConstraintType::NotNull => "NOT NULL",
            ConstraintType::Default => "DEFAULT",
            ConstraintType::Collate => "COLLATE",
            ConstraintType::Autoincrement => "AUTOINCREMENT",
        }
    }

    /// Look up a table constraint type by its leading keyword(s).
    pub fn table_type(keyword: &str) -> Option<ConstraintType> {
        TABLE_KEYWORDS
            .get(keyword.trim().to_ascii_uppercase().as_str())
            .copied()
    }

    /// Look up a column constraint type by its leading keyword(s).
    pub fn column_type(keyword: &str) -> Option<ConstraintType> {
        COLUMN_KEYWORDS
            .get(keyword.trim().to_ascii_uppercase().as_str())
            .copied()
    }
}

// Both the first word and the full space-joined keyword are registered so
// that a lookup on the first token of a segment succeeds for "PRIMARY KEY".
fn keyword_table<I>(entries: I) -> HashMap<String, ConstraintType>
where
    I: IntoIterator<Item = (ConstraintType, &'static str)>,
{
    let mut keywords = HashMap::new();
    for (ty, keyword) in entries {
        keywords.insert(keyword.to_string(), ty);
        if let Some((first, _)) = keyword.split_once(' ') {
            keywords.insert(first.to_string(), ty);
        }
    }
    keywords
}

static TABLE_KEYWORDS: LazyLock<HashMap<String, ConstraintType>> = LazyLock::new(|| {
    keyword_table(
        ConstraintType::TABLE_TYPES
            .into_iter()
            .filter_map(|ty| ty.table_keyword().map(|keyword| (ty, keyword))),
    )
});

static COLUMN_KEYWORDS: LazyLock<HashMap<String, ConstraintType>> = LazyLock::new(|| {
    keyword_table(
        ConstraintType::COLUMN_TYPES
            .into_iter()
            .map(|ty| (ty, ty.column_keyword())),
    )
});

pub(crate) const CONSTRAINT: &str = "CONSTRAINT";

/// A single table or column constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    kind: ConstraintType,
    name: Option<String>,
    order: Option<i32>,
    sql: String,
    raw: bool,
}

impl Constraint {
    /// A constraint recovered verbatim from schema SQL.
    pub fn raw(kind: ConstraintType, name: Option<String>, sql: impl Into<String>) -> Self {
        Self {
            kind,
            name,
            order: None,
            sql: sql.into(),
            raw: true,
        }
    }

    fn built(kind: ConstraintType, sql: String) -> Self {
        Self {
            kind,
            name: None,
            order: None,
            sql,
            raw: false,
        }
    }

    pub fn primary_key() -> Self {
        Self::built(ConstraintType::PrimaryKey, "PRIMARY KEY".to_string())
    }

    pub fn autoincrement() -> Self {
        Self::built(ConstraintType::Autoincrement, "AUTOINCREMENT".to_string())
    }

    pub fn not_null() -> Self {
        Self::built(ConstraintType::NotNull, "NOT NULL".to_string())
    }

    pub fn unique() -> Self {
        Self::built(ConstraintType::Unique, "UNIQUE".to_string())
    }

    /// `DEFAULT <literal>`; the literal must already be valid SQL.
    pub fn default_value(literal: impl AsRef<str>) -> Self {
        Self::built(
            ConstraintType::Default,
            format!("DEFAULT {}", literal.as_ref()),
        )
    }

    pub fn check(expression: impl AsRef<str>) -> Self {
        Self::built(ConstraintType::Check, format!("CHECK ({})", expression.as_ref()))
    }

    pub fn collate(collation: impl AsRef<str>) -> Self {
        Self::built(ConstraintType::Collate, format!("COLLATE {}", collation.as_ref()))
    }

    pub fn table_unique<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::built(
            ConstraintType::Unique,
            format!("UNIQUE ({})", quoted_list(columns)),
        )
    }

    pub fn table_primary_key<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::built(
            ConstraintType::PrimaryKey,
            format!("PRIMARY KEY ({})", quoted_list(columns)),
        )
    }

    pub fn foreign_key<I, J, S, T>(columns: I, table: &str, referenced: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: AsRef<str>,
        T: AsRef<str>,
    {
        Self::built(
            ConstraintType::ForeignKey,
            format!(
                r#"FOREIGN KEY ({}) REFERENCES "{table}" ({})"#,
                quoted_list(columns),
                quoted_list(referenced)
            ),
        )
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn kind(&self) -> ConstraintType {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    /// Constraint body without the `CONSTRAINT "<name>"` prefix.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Whether the constraint was recovered verbatim from schema SQL.
    pub fn is_raw(&self) -> bool {
        self.raw
    }

    /// Full constraint SQL including the name prefix, if named.
    pub fn build_sql(&self) -> String {
        match &self.name {
            Some(name) => format!(r#"{CONSTRAINT} "{name}" {}"#, self.sql),
            None => self.sql.clone(),
        }
    }
}

fn quoted_list<I, S>(names: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| format!(r#""{}""#, name.as_ref()))
        .collect::<Vec<String>>()
        .join(", ")
}

/// Ordered collection of constraints.
///
/// Iteration order is ascending `(order, insertion sequence)`. Constraints
/// added without an explicit order receive the next default order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Constraints {
    entries: Vec<(Constraint, u64)>,
    by_type: HashMap<ConstraintType, Vec<Constraint>>,
    next_sequence: u64,
    next_order: i32,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut constraint: Constraint) {
        let order = match constraint.order {
            Some(order) => order,
            None => {
                let order = self.next_order;
                constraint.order = Some(order);
                order
            }
        };
        self.next_order = self.next_order.max(order.saturating_add(1));

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let key = (order, sequence);
        let position = self
            .entries
            .partition_point(|(existing, seq)| (existing.order.unwrap_or(0), *seq) <= key);

        self.by_type
            .entry(constraint.kind)
            .or_default()
            .push(constraint.clone());
        self.entries.insert(position, (constraint, sequence));
    }

    pub fn add_all<I>(&mut self, constraints: I)
    where
        I: IntoIterator<Item = Constraint>,
    {
        for constraint in constraints {
            self.add(constraint);
        }
    }

    /// Constraints of a type, in insertion order.
    pub fn get(&self, kind: ConstraintType) -> &[Constraint] {
        self.by_type.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, kind: ConstraintType) -> bool {
        !self.get(kind).is_empty()
    }

    /// Remove every constraint of a type, returning how many were removed.
    pub fn remove(&mut self, kind: ConstraintType) -> usize {
        let removed = self.by_type.remove(&kind).map_or(0, |v| v.len());
        self.entries.retain(|(constraint, _)| constraint.kind != kind);
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_type.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.entries.iter().map(|(constraint, _)| constraint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// SQL of every constraint in iteration order.
    pub fn sql(&self) -> Vec<String> {
        self.iter().map(Constraint::build_sql).collect()
    }
}

impl<'a> IntoIterator for &'a Constraints {
    type Item = &'a Constraint;
    type IntoIter = Box<dyn Iterator<Item = &'a Constraint> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl FromIterator<Constraint> for Constraints {
    fn from_iter<T: IntoIterator<Item = Constraint>>(iter: T) -> Self {
        let mut constraints = Constraints::new();
        constraints.add_all(iter);
        constraints
    }
}

/// Constraints parsed for one column.
#[derive(Clone, Debug)]
pub struct ColumnConstraints {
    pub name: String,
    pub constraints: Constraints,
}

impl ColumnConstraints {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constraints: Constraints::new(),
        }
    }

    pub fn add(&mut self, constraint: Constraint) {
        self.constraints.add(constraint);
    }

    pub fn has_constraints(&self) -> bool {
        !self.constraints.is_empty()
    }
}

/// Table-level constraints plus the constraints of each column.
#[derive(Clone, Debug, Default)]
pub struct TableConstraints {
    constraints: Constraints,
    columns: HashMap<String, ColumnConstraints>,
}

impl TableConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table_constraint(&mut self, constraint: Constraint) {
        self.constraints.add(constraint);
    }

    pub fn table_constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn table_constraints_of_type(&self, kind: ConstraintType) -> &[Constraint] {
        self.constraints.get(kind)
    }

    pub fn add_column_constraint(&mut self, column: &str, constraint: Constraint) {
        self.columns
            .entry(column.to_string())
            .or_insert_with(|| ColumnConstraints::new(column))
            .add(constraint);
    }

    /// Add the constraints of a column, merging with any already present.
    pub fn add_column_constraints(&mut self, column_constraints: ColumnConstraints) {
        match self.columns.get_mut(&column_constraints.name) {
            Some(existing) => {
                for constraint in column_constraints.constraints.iter() {
                    existing.add(constraint.clone());
                }
            }
            None => {
                self.columns
                    .insert(column_constraints.name.clone(), column_constraints);
            }
        }
    }

    /// Constraints of a column; `None` if none were parsed for it.
    pub fn column_constraints(&self, column: &str) -> Option<&ColumnConstraints> {
        self.columns.get(column).or_else(|| {
            self.columns
                .values()
                .find(|c| c.name.eq_ignore_ascii_case(column))
        })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_constraints(column).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn merge(&mut self, other: TableConstraints) {
        self.constraints.add_all(other.constraints.iter().cloned());
        for (_, column_constraints) in other.columns {
            self.add_column_constraints(column_constraints);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn iterates_in_explicit_order() {
        let mut constraints = Constraints::new();
        constraints.add(Constraint::check("a > 2").with_order(2));
        constraints.add(Constraint::check("a > 0").with_order(0));
        constraints.add(Constraint::check("a > 1").with_order(1));

        let orders: Vec<i32> = constraints.iter().filter_map(Constraint::order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut constraints = Constraints::new();
        constraints.add(Constraint::not_null().with_order(1));
        constraints.add(Constraint::unique().with_order(1));
        constraints.add(Constraint::primary_key().with_order(0));

        let kinds: Vec<ConstraintType> = constraints.iter().map(Constraint::kind).collect();
        assert_eq!(
            kinds,
            vec![
                ConstraintType::PrimaryKey,
                ConstraintType::NotNull,
                ConstraintType::Unique
            ]
        );
    }

    #[test]
    fn default_order_follows_insertion() {
        let constraints: Constraints = [
            Constraint::primary_key(),
            Constraint::autoincrement(),
            Constraint::not_null(),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            constraints.sql(),
            vec!["PRIMARY KEY", "AUTOINCREMENT", "NOT NULL"]
        );
        assert!(constraints.has(ConstraintType::Autoincrement));
        assert_eq!(constraints.get(ConstraintType::Check).len(), 0);
    }

    #[test]
    fn removes_by_type() {
        let mut constraints = Constraints::new();
        constraints.add(Constraint::not_null());
        constraints.add(Constraint::default_value("0"));
        assert_eq!(constraints.remove(ConstraintType::NotNull), 1);
        assert_eq!(constraints.sql(), vec!["DEFAULT 0"]);
        assert!(!constraints.has(ConstraintType::NotNull));
    }

    #[test]
    fn named_constraint_sql() {
        let constraint = Constraint::table_unique(["a", "b"]).with_name("uq1");
        assert_eq!(constraint.build_sql(), r#"CONSTRAINT "uq1" UNIQUE ("a", "b")"#);
    }

    #[test]
    fn keyword_lookup_accepts_first_word() {
        assert_eq!(
            ConstraintType::column_type("primary"),
            Some(ConstraintType::PrimaryKey)
        );
        assert_eq!(
            ConstraintType::column_type("NOT NULL"),
            Some(ConstraintType::NotNull)
        );
        assert_eq!(
            ConstraintType::column_type("REFERENCES"),
            Some(ConstraintType::ForeignKey)
        );
        assert_eq!(ConstraintType::table_type("DEFAULT"), None);
        assert_eq!(
            ConstraintType::table_type("FOREIGN"),
            Some(ConstraintType::ForeignKey)
        );
    }

    #[test]
    fn merges_column_constraints() {
        let mut table = TableConstraints::new();
        table.add_column_constraint("a", Constraint::not_null());
        let mut more = ColumnConstraints::new("a");
        more.add(Constraint::unique());
        table.add_column_constraints(more);

        let a = table.column_constraints("A").expect("column a");
        assert_eq!(a.constraints.len(), 2);
        assert_eq!(table.column_count(), 1);
        assert!(table.column_constraints("b").is_none());
    }

    proptest! {
        #[test]
        fn iteration_is_sorted_and_stable(orders in proptest::collection::vec(-5i32..5, 0..20)) {
            let mut constraints = Constraints::new();
            for (i, order) in orders.iter().enumerate() {
                constraints.add(Constraint::check(format!("c{i}")).with_order(*order));
            }

            let mut expected: Vec<(i32, usize)> =
                orders.iter().copied().enumerate().map(|(i, o)| (o, i)).collect();
            expected.sort();
            let expected: Vec<String> =
                expected.into_iter().map(|(_, i)| format!("CHECK (c{i})")).collect();

            prop_assert_eq!(constraints.sql(), expected);
        }
    }
}
