use crate::{
    error::Error,
    filter::{Aggregate, Aggregation, Operator},
    generator::{QueryGenerator, Statement},
    query::{PlannedCondition, QueryPlan},
    record::Record,
    schema::{Collection, FieldType},
    value::Value,
};

///
/// SqlFamily
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[remain::sorted]
pub enum SqlFamily {
    Mysql,
    Postgres,
    Sqlite,
}

///
/// SqlDialect
///
/// The knobs that differ across relational engines: placeholder style,
/// identifier quoting, and DDL type names. Everything else the generator
/// renders is common SQL.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqlDialect {
    pub family: SqlFamily,
}

impl SqlDialect {
    #[must_use]
    pub const fn sqlite() -> Self {
        Self {
            family: SqlFamily::Sqlite,
        }
    }

    #[must_use]
    pub const fn postgres() -> Self {
        Self {
            family: SqlFamily::Postgres,
        }
    }

    #[must_use]
    pub const fn mysql() -> Self {
        Self {
            family: SqlFamily::Mysql,
        }
    }

    /// Placeholder for the `n`th parameter (1-based).
    #[must_use]
    pub fn placeholder(&self, n: usize) -> String {
        match self.family {
            SqlFamily::Postgres => format!("${n}"),
            SqlFamily::Mysql | SqlFamily::Sqlite => "?".to_string(),
        }
    }

    /// Quote an identifier.
    #[must_use]
    pub fn quote(&self, ident: &str) -> String {
        match self.family {
            SqlFamily::Mysql => format!("`{ident}`"),
            SqlFamily::Postgres | SqlFamily::Sqlite => format!("\"{ident}\""),
        }
    }

    /// DDL type name for a declared field type.
    #[must_use]
    pub const fn type_name(&self, ty: FieldType) -> &'static str {
        match self.family {
            SqlFamily::Sqlite => match ty {
                FieldType::Bool | FieldType::Int | FieldType::Time => "INTEGER",
                FieldType::Float => "REAL",
                FieldType::Bytes => "BLOB",
                FieldType::Array | FieldType::Object | FieldType::Text => "TEXT",
            },
            SqlFamily::Postgres => match ty {
                FieldType::Bool => "BOOLEAN",
                FieldType::Int => "BIGINT",
                FieldType::Float => "DOUBLE PRECISION",
                FieldType::Bytes => "BYTEA",
                FieldType::Time => "TIMESTAMPTZ",
                FieldType::Array | FieldType::Object => "JSONB",
                FieldType::Text => "TEXT",
            },
            SqlFamily::Mysql => match ty {
                FieldType::Bool => "TINYINT(1)",
                FieldType::Int => "BIGINT",
                FieldType::Float => "DOUBLE",
                FieldType::Bytes => "BLOB",
                FieldType::Time => "DATETIME",
                FieldType::Array | FieldType::Object => "JSON",
                FieldType::Text => "TEXT",
            },
        }
    }
}

/// Escape LIKE wildcards in a user-supplied match fragment.
fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

///
/// SqlGenerator
///
/// Render pass for the relational backend family. Holds only the dialect;
/// every method is a pure function of its inputs.
///

#[derive(Clone, Copy, Debug)]
pub struct SqlGenerator {
    pub dialect: SqlDialect,
}

impl SqlGenerator {
    #[must_use]
    pub const fn new(dialect: SqlDialect) -> Self {
        Self { dialect }
    }

    fn select_columns(&self, plan: &QueryPlan) -> String {
        if plan.is_aggregate() {
            let mut columns: Vec<String> =
                plan.group_by.iter().map(|g| self.dialect.quote(g)).collect();

            for aggregate in &plan.aggregates {
                columns.push(self.aggregate_column(aggregate));
            }

            return columns.join(", ");
        }

        if plan.projection.is_empty() {
            return "*".to_string();
        }

        plan.projection
            .iter()
            .map(|f| self.dialect.quote(f))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn aggregate_column(&self, aggregate: &Aggregate) -> String {
        let function = match aggregate.op {
            Aggregation::Avg => "AVG",
            Aggregation::Count => "COUNT",
            Aggregation::Max => "MAX",
            Aggregation::Min => "MIN",
            Aggregation::Sum => "SUM",
        };

        // COUNT(1) counts rows when there is no identity column to target
        let target = if aggregate.field == "1" {
            "1".to_string()
        } else {
            self.dialect.quote(&aggregate.field)
        };

        format!(
            "{function}({target}) AS {}",
            self.dialect.quote(&aggregate.alias())
        )
    }

    fn render_condition(
        &self,
        condition: &PlannedCondition,
        params: &mut Vec<Value>,
    ) -> Result<String, Error> {
        let column = self.dialect.quote(&condition.field);

        let clause = match condition.op {
            Operator::Is => self.render_equality(&column, &condition.values, false, params),
            Operator::Not => self.render_equality(&column, &condition.values, true, params),
            Operator::Contains => {
                self.render_like(&column, condition, params, |v| format!("%{v}%"), false)?
            }
            Operator::NotContains => {
                self.render_like(&column, condition, params, |v| format!("%{v}%"), true)?
            }
            Operator::Prefix => {
                self.render_like(&column, condition, params, |v| format!("{v}%"), false)?
            }
            Operator::Suffix => {
                self.render_like(&column, condition, params, |v| format!("%{v}"), false)?
            }
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let operand = condition.values.first().cloned().ok_or_else(|| {
                    Error::invalid_input(format!(
                        "operator '{}' on field '{}' requires a value",
                        condition.op, condition.field
                    ))
                })?;

                let symbol = match condition.op {
                    Operator::Gt => ">",
                    Operator::Gte => ">=",
                    Operator::Lt => "<",
                    Operator::Lte => "<=",
                    _ => unreachable!("outer match narrowed to range operators"),
                };

                params.push(operand);
                format!("{column} {symbol} {}", self.dialect.placeholder(params.len()))
            }
        };

        Ok(clause)
    }

    fn render_equality(
        &self,
        column: &str,
        values: &[Value],
        negated: bool,
        params: &mut Vec<Value>,
    ) -> String {
        let (nulls, concrete): (Vec<&Value>, Vec<&Value>) =
            values.iter().partition(|v| v.is_null());

        let mut clauses = Vec::new();

        match concrete.len() {
            0 => {}
            1 => {
                params.push(concrete[0].clone());
                let symbol = if negated { "<>" } else { "=" };
                clauses.push(format!(
                    "{column} {symbol} {}",
                    self.dialect.placeholder(params.len())
                ));
            }
            _ => {
                let mut placeholders = Vec::with_capacity(concrete.len());

                for value in concrete {
                    params.push(value.clone());
                    placeholders.push(self.dialect.placeholder(params.len()));
                }

                let keyword = if negated { "NOT IN" } else { "IN" };
                clauses.push(format!("{column} {keyword} ({})", placeholders.join(", ")));
            }
        }

        if !nulls.is_empty() {
            let test = if negated { "IS NOT NULL" } else { "IS NULL" };
            clauses.push(format!("{column} {test}"));
        }

        match clauses.len() {
            // an empty value list can match (or exclude) nothing
            0 => {
                if negated {
                    "1 = 1".to_string()
                } else {
                    "1 = 0".to_string()
                }
            }
            1 => clauses.remove(0),
            _ => {
                let joiner = if negated { " AND " } else { " OR " };
                format!("({})", clauses.join(joiner))
            }
        }
    }

    fn render_like(
        &self,
        column: &str,
        condition: &PlannedCondition,
        params: &mut Vec<Value>,
        pattern: impl Fn(&str) -> String,
        negated: bool,
    ) -> Result<String, Error> {
        let operand = condition
            .values
            .first()
            .and_then(Value::as_text)
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "operator '{}' on field '{}' requires a text value",
                    condition.op, condition.field
                ))
            })?;

        params.push(Value::Text(pattern(&escape_like(operand))));
        let keyword = if negated { "NOT LIKE" } else { "LIKE" };

        Ok(format!(
            "{column} {keyword} {} ESCAPE '\\'",
            self.dialect.placeholder(params.len())
        ))
    }

    fn render_where(
        &self,
        plan: &QueryPlan,
        params: &mut Vec<Value>,
    ) -> Result<Option<String>, Error> {
        if plan.criteria.is_empty() {
            return Ok(None);
        }

        let clauses = plan
            .criteria
            .iter()
            .map(|condition| self.render_condition(condition, params))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(clauses.join(" AND ")))
    }
}

impl QueryGenerator for SqlGenerator {
    fn select(&self, plan: &QueryPlan) -> Result<Statement, Error> {
        let mut params = Vec::new();
        let mut text = String::from("SELECT ");

        if plan.distinct {
            text.push_str("DISTINCT ");
        }

        text.push_str(&self.select_columns(plan));
        text.push_str(" FROM ");
        text.push_str(&self.dialect.quote(&plan.collection));

        if let Some(where_clause) = self.render_where(plan, &mut params)? {
            text.push_str(" WHERE ");
            text.push_str(&where_clause);
        }

        if !plan.group_by.is_empty() {
            let groups: Vec<String> = plan.group_by.iter().map(|g| self.dialect.quote(g)).collect();
            text.push_str(" GROUP BY ");
            text.push_str(&groups.join(", "));
        }

        if !plan.sort.is_empty() {
            let keys: Vec<String> = plan
                .sort
                .iter()
                .map(|key| {
                    let direction = if key.descending { "DESC" } else { "ASC" };
                    format!("{} {direction}", self.dialect.quote(&key.field))
                })
                .collect();
            text.push_str(" ORDER BY ");
            text.push_str(&keys.join(", "));
        }

        if let Some(limit) = plan.limit {
            text.push_str(&format!(" LIMIT {limit}"));
        }

        if plan.offset > 0 {
            text.push_str(&format!(" OFFSET {}", plan.offset));
        }

        Ok(Statement::new(text, params))
    }

    fn delete_where(&self, plan: &QueryPlan) -> Result<Statement, Error> {
        let mut params = Vec::new();
        let mut text = String::from("DELETE FROM ");
        text.push_str(&self.dialect.quote(&plan.collection));

        if let Some(where_clause) = self.render_where(plan, &mut params)? {
            text.push_str(" WHERE ");
            text.push_str(&where_clause);
        }

        Ok(Statement::new(text, params))
    }

    fn insert(&self, collection: &Collection, record: &Record) -> Result<Statement, Error> {
        let mut columns = Vec::new();
        let mut params = Vec::new();

        if !record.id.is_null() {
            columns.push(self.dialect.quote(&collection.identity_field));
            params.push(record.id.clone());
        }

        // declared order, so statements are stable regardless of how the
        // record map iterates
        for field in &collection.fields {
            if let Some(value) = record.get(&field.name) {
                columns.push(self.dialect.quote(&field.name));
                params.push(value.clone());
            }
        }

        if columns.is_empty() {
            return Err(Error::invalid_input(format!(
                "record has no values for collection '{}'",
                collection.name
            )));
        }

        let placeholders: Vec<String> = (1..=params.len())
            .map(|n| self.dialect.placeholder(n))
            .collect();

        Ok(Statement::new(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.dialect.quote(&collection.name),
                columns.join(", "),
                placeholders.join(", ")
            ),
            params,
        ))
    }

    fn update(&self, collection: &Collection, record: &Record) -> Result<Statement, Error> {
        if record.id.is_null() {
            return Err(Error::invalid_input(format!(
                "cannot update a record with no identity in collection '{}'",
                collection.name
            )));
        }

        let mut assignments = Vec::new();
        let mut params = Vec::new();

        for field in &collection.fields {
            if let Some(value) = record.get(&field.name) {
                params.push(value.clone());
                assignments.push(format!(
                    "{} = {}",
                    self.dialect.quote(&field.name),
                    self.dialect.placeholder(params.len())
                ));
            }
        }

        if assignments.is_empty() {
            return Err(Error::invalid_input(format!(
                "record has no assignable values for collection '{}'",
                collection.name
            )));
        }

        params.push(record.id.clone());

        Ok(Statement::new(
            format!(
                "UPDATE {} SET {} WHERE {} = {}",
                self.dialect.quote(&collection.name),
                assignments.join(", "),
                self.dialect.quote(&collection.identity_field),
                self.dialect.placeholder(params.len())
            ),
            params,
        ))
    }

    fn create_collection(&self, collection: &Collection) -> Result<Statement, Error> {
        let mut columns = vec![format!(
            "{} {} PRIMARY KEY",
            self.dialect.quote(&collection.identity_field),
            self.dialect.type_name(collection.identity_field_type)
        )];

        for field in &collection.fields {
            let mut column = format!(
                "{} {}",
                self.dialect.quote(&field.name),
                self.dialect.type_name(field.ty)
            );

            if field.required {
                column.push_str(" NOT NULL");
            }

            columns.push(column);
        }

        Ok(Statement::new(
            format!(
                "CREATE TABLE {} ({})",
                self.dialect.quote(&collection.name),
                columns.join(", ")
            ),
            Vec::new(),
        ))
    }

    fn delete_collection(&self, name: &str) -> Result<Statement, Error> {
        Ok(Statement::new(
            format!("DROP TABLE {}", self.dialect.quote(name)),
            Vec::new(),
        ))
    }
}
