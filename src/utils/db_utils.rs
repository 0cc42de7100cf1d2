use chrono::{NaiveDate, NaiveDateTime};
use sqlx::MySqlPool;

use crate::error::ApiError;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<u64> for SqlValue {
    fn from(v: u64) -> Self {
        SqlValue::U64(v)
    }
}

impl From<u8> for SqlValue {
    fn from(v: u8) -> Self {
        SqlValue::U64(v as u64)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Binds every [`SqlValue`] onto a `query`, `query_as` or `query_scalar` builder.
macro_rules! bind_values {
    ($query:expr, $values:expr) => {{
        let mut q = $query;
        for value in $values {
            q = match value {
                $crate::utils::db_utils::SqlValue::String(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::U64(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::I64(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::F64(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::Bool(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::Date(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::DateTime(v) => q.bind(v),
                $crate::utils::db_utils::SqlValue::Null => q.bind(None::<String>),
            };
        }
        q
    }};
}
pub(crate) use bind_values;

/// ===============================
/// WHERE clause builder for list/report filters
/// ===============================
#[derive(Debug, Default)]
pub struct Filters {
    conditions: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `condition` (with one `?` per value) unconditionally
    pub fn push(&mut self, condition: &str, values: impl IntoIterator<Item = SqlValue>) {
        self.conditions.push(condition.to_string());
        self.values.extend(values);
    }

    /// Adds `column = ?` when `value` is present
    pub fn eq<T: Into<SqlValue>>(&mut self, column: &str, value: Option<T>) {
        if let Some(v) = value {
            self.push(&format!("{column} = ?"), [v.into()]);
        }
    }

    /// LIKE search across several columns, OR-ed together
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) {
        let Some(term) = term.map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        let like = format!("%{}%", escape_like(term));
        let condition = columns
            .iter()
            .map(|c| format!("{c} LIKE ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.push(
            &format!("({condition})"),
            columns.iter().map(|_| SqlValue::String(like.clone())),
        );
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

#[derive(Debug)]
enum Assignment {
    Bind(SqlValue),
    Raw(&'static str),
}

/// Collects `column = ?` assignments from typed optional fields.
/// Column names are always compile-time literals supplied by the caller.
#[derive(Debug)]
pub struct UpdateBuilder {
    table: &'static str,
    assignments: Vec<(&'static str, Assignment)>,
}

impl UpdateBuilder {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            assignments: Vec::new(),
        }
    }

    pub fn set<T: Into<SqlValue>>(&mut self, column: &'static str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.assignments.push((column, Assignment::Bind(v.into())));
        }
        self
    }

    /// Sets the column to a raw SQL expression such as `NOW()` or `NULL`
    pub fn set_raw(&mut self, column: &'static str, expr: &'static str) -> &mut Self {
        self.assignments.push((column, Assignment::Raw(expr)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn build(&self, id_column: &str, id_value: u64) -> Result<SqlUpdate, ApiError> {
        if self.assignments.is_empty() {
            return Err(ApiError::bad_request("No fields provided for update"));
        }

        let mut values = Vec::with_capacity(self.assignments.len() + 1);
        let set_clause = self
            .assignments
            .iter()
            .map(|(column, assignment)| match assignment {
                Assignment::Raw(expr) => format!("{column} = {expr}"),
                Assignment::Bind(value) => {
                    values.push(value.clone());
                    format!("{column} = ?")
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        values.push(SqlValue::U64(id_value));

        Ok(SqlUpdate {
            sql: format!("UPDATE {} SET {} WHERE {} = ?", self.table, set_clause, id_column),
            values,
        })
    }
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let query = bind_values!(sqlx::query(&update.sql), update.values);
    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_skips_absent_fields() {
        let mut b = UpdateBuilder::new("users");
        b.set("name", Some("Jane"))
            .set::<String>("phone", None)
            .set("is_active", Some(false));

        let update = b.build("id", 7).unwrap();
        assert_eq!(update.sql, "UPDATE users SET name = ?, is_active = ? WHERE id = ?");
        assert_eq!(
            update.values,
            vec![SqlValue::from("Jane"), SqlValue::Bool(false), SqlValue::U64(7)]
        );
    }

    #[test]
    fn raw_expressions_are_inlined() {
        let mut b = UpdateBuilder::new("tasks");
        b.set("status", Some("completed")).set_raw("completed_at", "NOW()");

        let update = b.build("id", 3).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE tasks SET status = ?, completed_at = NOW() WHERE id = ?"
        );
        assert_eq!(update.values.len(), 2);
    }

    #[test]
    fn empty_update_is_bad_request() {
        let b = UpdateBuilder::new("projects");
        assert!(b.is_empty());
        assert!(matches!(b.build("id", 1), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn filters_join_with_and() {
        let mut f = Filters::new();
        f.eq("role_id", Some(2u8));
        f.eq::<String>("department", None);
        f.search(&["name", "email"], Some(" jo_n "));

        assert_eq!(f.where_clause(), "WHERE role_id = ? AND (name LIKE ? OR email LIKE ?)");
        assert_eq!(f.values[1], SqlValue::from("%jo\\_n%"));
        assert_eq!(f.values.len(), 3);
    }

    #[test]
    fn no_filters_no_where() {
        let mut f = Filters::new();
        f.search(&["name"], Some("   "));
        assert_eq!(f.where_clause(), "");
    }
}
