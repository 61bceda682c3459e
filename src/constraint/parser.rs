//! Best-effort recovery of constraints from `CREATE TABLE` statements.
//!
//! The parser classifies each top-level clause of the column definition list
//! as either a table constraint or a column definition with zero or more
//! column constraints. Clauses that match no known keyword are dropped.

use super::{CONSTRAINT, ColumnConstraints, Constraint, ConstraintType, TableConstraints};
use crate::error::Result;
use crate::ogc_sql::SQL_SELECT_TABLE_SQL;
use rusqlite::OptionalExtension;

/// Parse the constraints of a `CREATE TABLE` statement.
pub fn parse_table_constraints(table_sql: &str) -> TableConstraints {
    let mut constraints = TableConstraints::new();

    let (Some(start), Some(end)) = (table_sql.find('('), table_sql.rfind(')')) else {
        return constraints;
    };
    if end <= start {
        return constraints;
    }

    for segment in split_top_level(&table_sql[start + 1..end], ',') {
        add_constraints(&mut constraints, segment);
    }

    constraints
}

/// Read the `CREATE` statement of a table or view from `sqlite_master`.
pub fn table_sql(conn: &rusqlite::Connection, table_name: &str) -> Result<Option<String>> {
    let sql = conn
        .query_row(SQL_SELECT_TABLE_SQL, [table_name], |row| {
            row.get::<_, Option<String>>(0)
        })
        .optional()?;
    Ok(sql.flatten())
}

/// Query and parse the constraints of a table.
pub fn query_constraints(conn: &rusqlite::Connection, table_name: &str) -> Result<TableConstraints> {
    Ok(table_sql(conn, table_name)?
        .map(|sql| parse_table_constraints(&sql))
        .unwrap_or_default())
}

fn add_constraints(constraints: &mut TableConstraints, segment: &str) {
    if let Some(constraint) = parse_table_constraint(segment) {
        constraints.add_table_constraint(constraint);
    } else if let Some(column_constraints) = parse_column_constraints(segment) {
        if column_constraints.has_constraints() {
            constraints.add_column_constraints(column_constraints);
        }
    } else {
        tracing::trace!(segment, "unclassified table definition segment");
    }
}

/// Whether the clause is a table constraint.
pub fn is_table_constraint(segment: &str) -> bool {
    parse_table_constraint(segment).is_some()
}

/// Parse a table constraint clause such as `CONSTRAINT "uq" UNIQUE (a, b)`.
pub fn parse_table_constraint(segment: &str) -> Option<Constraint> {
    let (name, definition) = name_and_definition(segment);
    let first = tokens(definition).into_iter().next()?;
    let kind = ConstraintType::table_type(leading_word(first))?;
    Some(Constraint::raw(kind, name, definition))
}

/// Parse a column definition clause into its column constraints.
///
/// Returns `None` when the clause has no column name.
pub fn parse_column_constraints(segment: &str) -> Option<ColumnConstraints> {
    let parts = tokens(segment);
    let (column, rest) = parts.split_first()?;
    let mut column_constraints = ColumnConstraints::new(unquote(column));

    let mut start: Option<usize> = None;
    let mut current: Option<ConstraintType> = None;

    for (i, part) in rest.iter().enumerate() {
        let previous = i.checked_sub(1).map(|p| rest[p]);
        if part.eq_ignore_ascii_case(CONSTRAINT) {
            if let (Some(kind), Some(from)) = (current.take(), start) {
                column_constraints.add(create_constraint(&rest[from..i], kind));
            }
            start = Some(i);
        } else if previous.is_some_and(|p| p.eq_ignore_ascii_case(CONSTRAINT)) {
            // constraint name
        } else if let Some(kind) = column_keyword_at(rest, i) {
            if let (Some(previous), Some(from)) = (current.take(), start) {
                column_constraints.add(create_constraint(&rest[from..i], previous));
                start = None;
            }
            start.get_or_insert(i);
            current = Some(kind);
        }
    }

    if let (Some(kind), Some(from)) = (current, start) {
        column_constraints.add(create_constraint(&rest[from..], kind));
    }

    Some(column_constraints)
}

/// Column constraint type starting at token `i`, if any.
///
/// Two-word keywords must match in full so that `NOT DEFERRABLE` is not read
/// as `NOT NULL`; `SET DEFAULT` / `SET NULL` belong to a foreign key action.
fn column_keyword_at(parts: &[&str], i: usize) -> Option<ConstraintType> {
    if i > 0 && parts[i - 1].eq_ignore_ascii_case("SET") {
        return None;
    }
    let kind = ConstraintType::column_type(leading_word(parts[i]))?;
    match kind.column_keyword().split_once(' ') {
        Some((_, second)) => parts
            .get(i + 1)
            .filter(|next| leading_word(next).eq_ignore_ascii_case(second))
            .map(|_| kind),
        None => Some(kind),
    }
}

fn create_constraint(parts: &[&str], kind: ConstraintType) -> Constraint {
    let sql = parts.join(" ");
    let (name, definition) = name_and_definition(&sql);
    Constraint::raw(kind, name, definition)
}

/// Extract the constraint name from a `CONSTRAINT <name> ...` prefix.
pub fn constraint_name(sql: &str) -> Option<String> {
    name_and_definition(sql).0
}

fn name_and_definition(sql: &str) -> (Option<String>, &str) {
    let trimmed = sql.trim();
    let parts = tokens(trimmed);
    if parts.len() >= 3 && parts[0].eq_ignore_ascii_case(CONSTRAINT) {
        let name = unquote(parts[1]);
        // Token slices borrow from `trimmed`, so their offsets locate the remainder.
        let offset = parts[2].as_ptr() as usize - trimmed.as_ptr() as usize;
        return (Some(name), trimmed[offset..].trim());
    }
    (None, trimmed)
}

/// Split on `separator` where not nested in parentheses or quotes.
pub(crate) fn split_top_level(sql: &str, separator: char) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in sql.char_indices() {
        match quote {
            Some(q) => {
                if c == closing_quote(q) {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' | '[' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                c if c == separator && depth == 0 => {
                    segments.push(&sql[start..i]);
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    if start < sql.len() {
        segments.push(&sql[start..]);
    }

    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

fn closing_quote(open: char) -> char {
    if open == '[' { ']' } else { open }
}

/// Whitespace separated tokens at the top level; parenthesised groups and
/// quoted identifiers stay attached to their token.
fn tokens(sql: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut start: Option<usize> = None;

    for (i, c) in sql.char_indices() {
        if quote.is_none() && depth == 0 && c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(&sql[s..i]);
            }
            continue;
        }
        if start.is_none() {
            start = Some(i);
        }
        match quote {
            Some(q) => {
                if c == closing_quote(q) {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' | '`' | '[' => quote = Some(c),
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                _ => {}
            },
        }
    }
    if let Some(s) = start {
        tokens.push(&sql[s..]);
    }
    tokens
}

/// Leading identifier characters of a token: `CHECK(a > 0)` → `CHECK`.
fn leading_word(token: &str) -> &str {
    let end = token
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(token.len());
    &token[..end]
}

pub(crate) fn unquote(name: &str) -> String {
    let name = name.trim();
    let mut chars = name.chars();
    match (chars.next(), chars.next_back()) {
        (Some(open), Some(close))
            if name.len() >= 2
                && matches!(open, '"' | '`' | '[' | '\'')
                && close == closing_quote(open) =>
        {
            let inner = &name[1..name.len() - 1];
            if open == '"' {
                inner.replace("\"\"", "\"")
            } else {
                inner.to_string()
            }
        }
        _ => name.to_string(),
    }
}
