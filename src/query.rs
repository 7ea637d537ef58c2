//! Filter/order builder for [`Store::query`](crate::store::Store::query).
//!
//! Column names are checked against the entity's column list before any SQL
//! is built, so a query can only ever reference real columns.

use rusqlite::types::Value;

use crate::error::{Result, StoreError};
use crate::models::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
enum Filter {
    Eq(&'static str, Value),
    IsNull(&'static str),
    /// Substring match over any of the columns.
    Contains(Vec<&'static str>, String),
    Unsynced,
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<Filter>,
    order: Vec<(&'static str, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    /// `None` leaves the column unconstrained.
    pub fn eq_opt(self, column: &'static str, value: Option<impl Into<Value>>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    pub fn is_null(mut self, column: &'static str) -> Self {
        self.filters.push(Filter::IsNull(column));
        self
    }

    pub fn contains(mut self, columns: &[&'static str], term: &str) -> Self {
        self.filters
            .push(Filter::Contains(columns.to_vec(), term.to_string()));
        self
    }

    pub fn unsynced(mut self) -> Self {
        self.filters.push(Filter::Unsynced);
        self
    }

    pub fn order_by(mut self, column: &'static str, direction: Direction) -> Self {
        self.order.push((column, direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub(crate) fn to_sql<E: Record>(&self) -> Result<(String, Vec<Value>)> {
        let mut sql = format!("SELECT {} FROM {}", E::COLUMNS.join(", "), E::TABLE.name());
        let mut params: Vec<Value> = Vec::new();
        let mut clauses: Vec<String> = Vec::new();

        for f in &self.filters {
            match f {
                Filter::Eq(col, v) => {
                    check_column::<E>(col)?;
                    clauses.push(format!("{col} = ?"));
                    params.push(v.clone());
                }
                Filter::IsNull(col) => {
                    check_column::<E>(col)?;
                    clauses.push(format!("{col} IS NULL"));
                }
                Filter::Contains(cols, term) => {
                    if cols.is_empty() {
                        return Err(StoreError::InvalidInput(
                            "substring filter needs at least one column".to_string(),
                        ));
                    }
                    let pattern = format!("%{}%", escape_like(term));
                    let mut ors = Vec::with_capacity(cols.len());
                    for col in cols {
                        check_column::<E>(col)?;
                        ors.push(format!("{col} LIKE ? ESCAPE '\\'"));
                        params.push(Value::Text(pattern.clone()));
                    }
                    clauses.push(format!("({})", ors.join(" OR ")));
                }
                Filter::Unsynced => clauses.push("synced_to_cloud = 0".to_string()),
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        // Key columns always close the ordering so ties come back the same way every time.
        let mut order: Vec<String> = Vec::new();
        for (col, dir) in &self.order {
            check_column::<E>(col)?;
            let dir = match dir {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            order.push(format!("{col} {dir}"));
        }
        for key in E::KEY_COLUMNS {
            if !self.order.iter().any(|(c, _)| c == key) {
                order.push(format!("{key} ASC"));
            }
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));

        if let Some(n) = self.limit {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(n as i64));
        }
        Ok((sql, params))
    }
}

fn check_column<E: Record>(col: &str) -> Result<()> {
    if E::COLUMNS.contains(&col) {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "unknown column {col} for {}",
            E::TABLE
        )))
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Class, Student};

    #[test]
    fn builds_filtered_ordered_sql() {
        let (sql, params) = Query::new()
            .eq("class_id", "c1".to_string())
            .contains(&["first_name"], "an")
            .order_by("first_name", Direction::Asc)
            .limit(5)
            .to_sql::<Student>()
            .expect("sql");
        assert!(sql.starts_with("SELECT student_id, class_id"));
        assert!(sql.contains("WHERE class_id = ? AND (first_name LIKE ? ESCAPE '\\')"));
        assert!(sql.ends_with("ORDER BY first_name ASC, student_id ASC LIMIT ?"));
        assert_eq!(params.len(), 3);
        assert_eq!(params[1], Value::Text("%an%".to_string()));
    }

    #[test]
    fn rejects_unknown_columns() {
        let err = Query::new()
            .order_by("first_name", Direction::Asc)
            .to_sql::<Class>()
            .expect_err("classes have no first_name");
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
