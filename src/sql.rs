use sqlparser::ast::{
    self, AssignmentTarget, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject,
    Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    SelectAppointments {
        filter: AppointmentFilter,
    },
    InsertAppointment {
        appointment: NewAppointment,
        returning: bool,
    },
    UpdateStatus {
        id: Ulid,
        status: AppointmentStatus,
        returning: bool,
    },
}

const TABLE: &str = "appointments";

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Update {
            table,
            assignments,
            selection,
            returning,
            ..
        } => parse_update(table, assignments, selection, returning.is_some()),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Whether a statement answers with appointment rows rather than a command
/// tag. Decided from the parsed statement; `$N` placeholders may still be unbound.
pub fn returns_rows(sql: &str) -> bool {
    match Parser::parse_sql(&PostgreSqlDialect {}, sql).as_deref() {
        Ok([Statement::Query(_), ..]) => true,
        Ok([Statement::Insert(insert), ..]) => insert.returning.is_some(),
        Ok([Statement::Update { returning, .. }, ..]) => returning.is_some(),
        _ => false,
    }
}

/// Canonical column for an identifier; accepts snake_case and the camelCase
/// field names of the serialized record.
fn canonical_column(name: &str) -> Option<&'static str> {
    let normalized: String = name
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    match normalized.as_str() {
        "id" => Some("id"),
        "patientname" => Some("patient_name"),
        "date" => Some("date"),
        "time" => Some("time"),
        "duration" => Some("duration"),
        "doctorname" => Some("doctor_name"),
        "status" => Some("status"),
        "mode" => Some("mode"),
        "type" => Some("type"),
        _ => None,
    }
}

fn column(ident: &ast::Ident) -> Result<&'static str, SqlError> {
    canonical_column(&ident.value).ok_or_else(|| SqlError::UnknownColumn(ident.value.clone()))
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    if table != TABLE {
        return Err(SqlError::UnknownTable(table));
    }
    if insert.columns.is_empty() {
        return Err(SqlError::Parse("INSERT requires an explicit column list".into()));
    }
    let values = extract_insert_values(insert)?;
    if values.len() != insert.columns.len() {
        return Err(SqlError::WrongArity(TABLE, insert.columns.len(), values.len()));
    }

    let mut appointment = NewAppointment::default();
    for (ident, expr) in insert.columns.iter().zip(&values) {
        match column(ident)? {
            "id" => appointment.id = parse_ulid_or_null(expr)?,
            "patient_name" => appointment.patient_name = parse_string_or_null(expr)?,
            "date" => appointment.date = parse_string_or_null(expr)?,
            "time" => appointment.time = parse_string_or_null(expr)?,
            "duration" => appointment.duration = parse_minutes_or_null(expr)?,
            "doctor_name" => appointment.doctor_name = parse_string_or_null(expr)?,
            "mode" => appointment.mode = parse_string_or_null(expr)?,
            "type" => appointment.appointment_type = parse_string_or_null(expr)?,
            "status" => return Err(SqlError::ReadOnlyColumn("status")),
            other => return Err(SqlError::UnknownColumn(other.to_string())),
        }
    }

    Ok(Command::InsertAppointment {
        appointment,
        returning: insert.returning.is_some(),
    })
}

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: &Option<Expr>,
    returning: bool,
) -> Result<Command, SqlError> {
    let name = table_factor_name(&table.relation)?;
    if name != TABLE {
        return Err(SqlError::UnknownTable(name));
    }

    let mut status = None;
    for assignment in assignments {
        let target = match &assignment.target {
            AssignmentTarget::ColumnName(name) => object_name_last(name)
                .ok_or_else(|| SqlError::Parse("empty column name".into()))?,
            AssignmentTarget::Tuple(_) => {
                return Err(SqlError::Unsupported("tuple assignment".into()));
            }
        };
        match canonical_column(&target) {
            Some("status") => status = Some(parse_status_expr(&assignment.value)?),
            Some(col) => return Err(SqlError::ReadOnlyColumn(col)),
            None => return Err(SqlError::UnknownColumn(target)),
        }
    }

    Ok(Command::UpdateStatus {
        id: selection
            .as_ref()
            .ok_or(SqlError::MissingFilter("id"))
            .and_then(extract_where_id)?,
        status: status.ok_or(SqlError::MissingAssignment("status"))?,
        returning,
    })
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;
    if table != TABLE {
        return Err(SqlError::UnknownTable(table));
    }

    let mut filter = AppointmentFilter::default();
    if let Some(selection) = &select.selection {
        extract_appointment_filters(selection, &mut filter)?;
    }
    Ok(Command::SelectAppointments { filter })
}

/// Only `col = value` predicates joined by AND; anything else is rejected so a
/// query never silently returns more rows than asked for.
fn extract_appointment_filters(expr: &Expr, filter: &mut AppointmentFilter) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => extract_appointment_filters(inner, filter),
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            extract_appointment_filters(left, filter)?;
            extract_appointment_filters(right, filter)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            match canonical_column(&col) {
                Some("date") => filter.date = Some(parse_string(right)?),
                Some("doctor_name") => filter.doctor_name = Some(parse_string(right)?),
                Some("status") => filter.status = Some(parse_status_expr(right)?),
                Some(other) => return Err(SqlError::UnsupportedFilter(other)),
                None => return Err(SqlError::UnknownColumn(col)),
            }
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn extract_where_id(selection: &Expr) -> Result<Ulid, SqlError> {
    match selection {
        Expr::Nested(inner) => extract_where_id(inner),
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            if expr_column_name(left).as_deref() == Some("id") {
                parse_ulid_expr(right)
            } else {
                Err(SqlError::MissingFilter("id"))
            }
        }
        _ => Err(SqlError::MissingFilter("id")),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_string(expr)?;
    Ulid::from_string(&s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    if matches!(extract_value(expr), Some(Value::Null)) {
        return Ok(None);
    }
    parse_ulid_expr(expr).map(Some)
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_string_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    if matches!(extract_value(expr), Some(Value::Null)) {
        return Ok(None);
    }
    parse_string(expr).map(Some)
}

/// Durations arrive as numbers, or as quoted text through the extended protocol.
fn parse_minutes_or_null(expr: &Expr) -> Result<Option<Minutes>, SqlError> {
    let raw = match extract_value(expr) {
        Some(Value::Null) => return Ok(None),
        Some(Value::Number(s, _)) | Some(Value::SingleQuotedString(s)) => s,
        Some(value) => return Err(SqlError::Parse(format!("expected number, got {value}"))),
        None => return Err(SqlError::Parse(format!("expected value, got {expr}"))),
    };
    raw.trim()
        .parse::<Minutes>()
        .map(Some)
        .map_err(|e| SqlError::Parse(format!("bad duration {raw:?}: {e}")))
}

fn parse_status_expr(expr: &Expr) -> Result<AppointmentStatus, SqlError> {
    let s = parse_string(expr)?;
    s.parse().map_err(|e: UnknownLabel| SqlError::InvalidValue(e.to_string()))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    ReadOnlyColumn(&'static str),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    MissingAssignment(&'static str),
    UnsupportedFilter(&'static str),
    InvalidValue(String),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::ReadOnlyColumn(c) => write!(f, "column {c} cannot be set here"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::MissingAssignment(col) => write!(f, "missing assignment: {col}"),
            SqlError::UnsupportedFilter(col) => write!(f, "cannot filter on {col}"),
            SqlError::InvalidValue(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for SqlError {}
