//! SQL builder clause state and statement assembly.

use super::Cursor;
use crate::Result;
use crate::models::Value;
use regex::Regex;
use std::sync::LazyLock;

/// Condition matching no rows, used for structure-only queries.
const NO_ROWS: &str = "1 = 0";

/// `SELECT ... FROM ... WHERE cond [GROUP BY | ORDER BY | LIMIT ...]`.
static WHERE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)^(\s*select\s.+?\sfrom\s.+?)\swhere\s(.+?)(\s(?:group\s+by|order\s+by|limit)\s.*)?$",
    )
    .unwrap_or_else(|_| unreachable!("static pattern"))
});

/// `SELECT ... FROM ... (GROUP BY | ORDER BY | LIMIT) ...` without a where clause.
static TRAILING_CLAUSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^(\s*select\s.+?\sfrom\s.+?)(\s(?:group\s+by|order\s+by|limit)\s.*)$")
        .unwrap_or_else(|_| unreachable!("static pattern"))
});

/// The independently settable clauses of a `SELECT`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlBuilder {
    pub(super) field_clause: String,
    pub(super) from_clause: String,
    pub(super) where_clause: String,
    pub(super) child_filter_clause: String,
    pub(super) group_by_clause: String,
    pub(super) order_by_clause: String,
    pub(super) limit_clause: String,
    pub(super) default_limit: u32,
}

impl SqlBuilder {
    pub(super) fn new(default_limit: u32) -> Self {
        Self {
            default_limit,
            ..Self::default()
        }
    }
}

impl Cursor {
    /// Replaces the field list.
    pub fn set_field_clause(&mut self, clause: &str) {
        self.builder.field_clause = self.backend.set_field_clause(clause);
        self.blank = None;
    }

    /// Appends an expression to the field list.
    pub fn add_field(&mut self, exp: &str) {
        self.builder.field_clause = self.backend.add_field(&self.builder.field_clause, exp);
        self.blank = None;
    }

    /// Returns the field list.
    #[must_use]
    pub fn field_clause(&self) -> &str {
        &self.builder.field_clause
    }

    /// Replaces the from clause.
    pub fn set_from_clause(&mut self, clause: &str) {
        self.builder.from_clause = self.backend.set_from_clause(clause);
        self.blank = None;
    }

    /// Appends a table to the from clause.
    pub fn add_from(&mut self, exp: &str) {
        self.builder.from_clause = self.backend.add_from(&self.builder.from_clause, exp);
        self.blank = None;
    }

    /// Returns the from clause.
    #[must_use]
    pub fn from_clause(&self) -> &str {
        &self.builder.from_clause
    }

    /// Replaces the where clause.
    pub fn set_where_clause(&mut self, clause: &str) {
        self.builder.where_clause = self.backend.set_where_clause(clause);
    }

    /// Appends a condition joined with `comp` (`AND` or `OR`).
    pub fn add_where(&mut self, exp: &str, comp: &str) {
        self.builder.where_clause = self
            .backend
            .add_where(&self.builder.where_clause, exp, comp);
    }

    /// Returns the where clause.
    #[must_use]
    pub fn where_clause(&self) -> &str {
        &self.builder.where_clause
    }

    /// Replaces the child filter, which is always prepended to the where clause.
    pub fn set_child_filter_clause(&mut self, clause: &str) {
        self.builder.child_filter_clause = self.backend.set_child_filter_clause(clause);
    }

    /// Returns the child filter.
    #[must_use]
    pub fn child_filter_clause(&self) -> &str {
        &self.builder.child_filter_clause
    }

    /// Replaces the group-by clause.
    pub fn set_group_by_clause(&mut self, clause: &str) {
        self.builder.group_by_clause = self.backend.set_group_by_clause(clause);
    }

    /// Appends an expression to the group-by clause.
    pub fn add_group_by(&mut self, exp: &str) {
        self.builder.group_by_clause = self.backend.add_group_by(&self.builder.group_by_clause, exp);
    }

    /// Returns the group-by clause.
    #[must_use]
    pub fn group_by_clause(&self) -> &str {
        &self.builder.group_by_clause
    }

    /// Replaces the order-by clause.
    pub fn set_order_by_clause(&mut self, clause: &str) {
        self.builder.order_by_clause = self.backend.set_order_by_clause(clause);
    }

    /// Appends an expression to the order-by clause.
    pub fn add_order_by(&mut self, exp: &str) {
        self.builder.order_by_clause = self.backend.add_order_by(&self.builder.order_by_clause, exp);
    }

    /// Returns the order-by clause.
    #[must_use]
    pub fn order_by_clause(&self) -> &str {
        &self.builder.order_by_clause
    }

    /// Sets the row limit; an empty clause restores the default limit.
    pub fn set_limit_clause(&mut self, clause: &str) {
        self.builder.limit_clause = self.backend.set_limit_clause(clause);
    }

    /// Returns the explicit row limit, empty if the default applies.
    #[must_use]
    pub fn limit_clause(&self) -> &str {
        &self.builder.limit_clause
    }

    /// Assembles the builder clauses into a `SELECT` statement.
    ///
    /// The result depends only on the clause state and the backend's
    /// formatting rules.
    #[must_use]
    pub fn get_sql(&self) -> String {
        self.assemble(&self.builder.where_clause)
    }

    fn assemble(&self, where_clause: &str) -> String {
        let b = &self.builder;
        let backend = &self.backend;

        let fields = if b.field_clause.is_empty() { "*" } else { &b.field_clause };
        let from_target = if b.from_clause.is_empty() { &self.table } else { &b.from_clause };
        let from = prefixed("FROM", from_target);

        let conditions = crate::backend::append_clause(&b.child_filter_clause, where_clause, " AND ");
        let where_part = prefixed("WHERE", &backend.prepare_where(&conditions));
        let group_by = prefixed("GROUP BY", &b.group_by_clause);
        let order_by = prefixed("ORDER BY", &b.order_by_clause);
        let limit = if b.limit_clause.is_empty() {
            format!("{} {}", backend.limit_word(), b.default_limit)
        } else {
            format!("{} {}", backend.limit_word(), b.limit_clause)
        };

        backend.form_sql(fields, &from, &where_part, &group_by, &order_by, &limit)
    }

    /// Assigns a complete statement, bypassing the builder.
    ///
    /// An empty statement returns the cursor to builder SQL. The blank
    /// record template is re-derived on the next `new_record`.
    pub fn set_sql(&mut self, sql: &str) {
        self.blank = None;
        self.user_sql = if sql.trim().is_empty() {
            None
        } else {
            Some(self.backend.set_sql(sql))
        };
    }

    /// The statement `requery` runs: the assigned SQL, else builder SQL.
    #[must_use]
    pub fn current_sql(&self) -> String {
        self.user_sql.clone().unwrap_or_else(|| self.get_sql())
    }

    /// Executes the builder SQL.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Execution`] if the driver rejects it.
    pub fn execute_sql(&mut self, params: &[Value]) -> Result<()> {
        let sql = self.get_sql();
        self.execute(&sql, params)
    }

    /// Returns a zero-row variant of the current statement.
    ///
    /// Builder SQL gets a `1 = 0` where clause. Assigned SQL is handed to
    /// the backend's structural-query hook; if the backend has none, it is
    /// rewritten textually, which is best effort for complex statements.
    #[must_use]
    pub fn structure_only_sql(&self) -> String {
        let Some(sql) = self.user_sql.as_deref() else {
            return self.assemble(NO_ROWS);
        };
        if let Some(sql) = self.backend.structure_only_sql(sql) {
            return sql;
        }
        rewrite_structure_only(sql)
    }
}

/// Injects a no-rows condition into arbitrary `SELECT` text.
pub(crate) fn rewrite_structure_only(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';');
    if WHERE_PATTERN.is_match(sql) {
        return WHERE_PATTERN
            .replace(sql, "${1} WHERE 1=0 AND (${2})${3}")
            .into_owned();
    }
    if TRAILING_CLAUSE_PATTERN.is_match(sql) {
        return TRAILING_CLAUSE_PATTERN
            .replace(sql, "${1} WHERE 1=0${2}")
            .into_owned();
    }
    format!("{sql} WHERE 1=0")
}

fn prefixed(keyword: &str, clause: &str) -> String {
    if clause.trim().is_empty() {
        String::new()
    } else {
        format!("{keyword} {}", clause.trim())
    }
}
