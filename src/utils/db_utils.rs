use sqlx::mysql::{MySql, MySqlArguments};
use sqlx::query::{QueryAs, QueryScalar};

/// SQL bindable value for dynamically-built filter clauses.
#[derive(Debug, Clone)]
pub enum SqlValue {
    Str(String),
    I64(i64),
    U64(u64),
    Bool(bool),
}

/// Accumulates `AND`-joined conditions plus their bind values, in the
/// order the placeholders appear.
#[derive(Debug, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
    values: Vec<SqlValue>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition with exactly one `?` placeholder.
    pub fn push(&mut self, condition: &str, value: SqlValue) {
        self.conditions.push(condition.to_string());
        self.values.push(value);
    }

    /// Adds a condition whose placeholders take several values.
    pub fn push_many(&mut self, condition: &str, values: Vec<SqlValue>) {
        self.conditions.push(condition.to_string());
        self.values.extend(values);
    }

    /// ` WHERE a AND b ...`, or empty when no condition was added.
    pub fn to_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }
}

pub fn bind_values<'q, O>(
    mut q: QueryAs<'q, MySql, O, MySqlArguments>,
    values: &[SqlValue],
) -> QueryAs<'q, MySql, O, MySqlArguments> {
    for v in values {
        q = match v {
            SqlValue::Str(s) => q.bind(s.clone()),
            SqlValue::I64(n) => q.bind(*n),
            SqlValue::U64(n) => q.bind(*n),
            SqlValue::Bool(b) => q.bind(*b),
        };
    }
    q
}

pub fn bind_values_scalar<'q, O>(
    mut q: QueryScalar<'q, MySql, O, MySqlArguments>,
    values: &[SqlValue],
) -> QueryScalar<'q, MySql, O, MySqlArguments> {
    for v in values {
        q = match v {
            SqlValue::Str(s) => q.bind(s.clone()),
            SqlValue::I64(n) => q.bind(*n),
            SqlValue::U64(n) => q.bind(*n),
            SqlValue::Bool(b) => q.bind(*b),
        };
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_where_clause_is_empty_sql() {
        assert_eq!(WhereClause::new().to_sql(), "");
    }

    #[test]
    fn conditions_join_with_and() {
        let mut w = WhereClause::new();
        w.push("a.status = ?", SqlValue::Str("late".into()));
        w.push_many(
            "a.date >= ? AND a.date <= ?",
            vec![
                SqlValue::Str("1403/01/01".into()),
                SqlValue::Str("1403/01/31".into()),
            ],
        );
        assert_eq!(
            w.to_sql(),
            " WHERE a.status = ? AND a.date >= ? AND a.date <= ?"
        );
        assert_eq!(w.values().len(), 3);
    }
}
