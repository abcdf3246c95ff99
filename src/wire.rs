use std::fmt::Debug;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::Sink;
use futures::stream;
use pgwire::api::auth::noop::NoopStartupHandler;
use pgwire::api::auth::StartupHandler;
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use tokio::net::TcpStream;

use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, SqlError};
use crate::tenant::TenantManager;

pub struct DocketHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<DocketQueryParser>,
}

impl DocketHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(DocketQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    async fn execute_command(
        &self,
        engine: &Engine,
        cmd: Command,
        format: &Format,
    ) -> PgWireResult<Vec<Response>> {
        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.dispatch(engine, cmd, format).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn dispatch(
        &self,
        engine: &Engine,
        cmd: Command,
        format: &Format,
    ) -> PgWireResult<Vec<Response>> {
        match cmd {
            Command::SelectAppointments { filter } => {
                let rows = engine.get_appointments(&filter).await;
                Ok(vec![appointment_rows(rows, format)])
            }
            Command::InsertAppointment { appointment, returning } => {
                let appt = engine
                    .create_appointment(appointment)
                    .await
                    .map_err(engine_err)?;
                if returning {
                    Ok(vec![appointment_rows(vec![appt], format)])
                } else {
                    Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
                }
            }
            Command::UpdateStatus { id, status, returning } => {
                let appt = engine
                    .update_appointment_status(id, status)
                    .await
                    .map_err(engine_err)?;
                if returning {
                    Ok(vec![appointment_rows(vec![appt], format)])
                } else {
                    Ok(vec![Response::Execution(Tag::new("UPDATE").with_rows(1))])
                }
            }
        }
    }
}

const APPOINTMENT_COLUMNS: [(&str, Type); 9] = [
    ("id", Type::VARCHAR),
    ("patient_name", Type::VARCHAR),
    ("date", Type::VARCHAR),
    ("time", Type::VARCHAR),
    ("duration", Type::INT8),
    ("doctor_name", Type::VARCHAR),
    ("status", Type::VARCHAR),
    ("mode", Type::VARCHAR),
    ("type", Type::VARCHAR),
];

/// Row layout; per-column wire format as requested by the client's Bind.
fn appointment_schema(format: &Format) -> Vec<FieldInfo> {
    APPOINTMENT_COLUMNS
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| {
            FieldInfo::new((*name).into(), None, None, ty.clone(), format.format_for(i))
        })
        .collect()
}

fn appointment_rows(appointments: Vec<Appointment>, format: &Format) -> Response {
    let schema = Arc::new(appointment_schema(format));
    let rows: Vec<PgWireResult<_>> = appointments
        .into_iter()
        .map(|appt| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encoder.encode_field(&appt.id.to_string())?;
            encoder.encode_field(&appt.patient_name)?;
            encoder.encode_field(&appt.date)?;
            encoder.encode_field(&appt.time)?;
            encoder.encode_field(&i64::from(appt.duration))?;
            encoder.encode_field(&appt.doctor_name)?;
            encoder.encode_field(&appt.status.label())?;
            encoder.encode_field(&appt.mode.label())?;
            encoder.encode_field(&appt.appointment_type)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

#[async_trait]
impl SimpleQueryHandler for DocketHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(query).map_err(sql_err)?;
        self.execute_command(&engine, cmd, &Format::UnifiedText).await
    }
}

// No authentication: any user may connect to any tenant.
#[async_trait]
impl NoopStartupHandler for DocketHandler {}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct DocketQueryParser;

#[async_trait]
impl QueryParser for DocketQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        if sql::returns_rows(stmt) {
            Ok(appointment_schema(column_format.unwrap_or(&Format::UnifiedText)))
        } else {
            Ok(vec![])
        }
    }
}

#[async_trait]
impl ExtendedQueryHandler for DocketHandler {
    type Statement = String;
    type QueryParser = DocketQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let sql = substitute_params(portal);
        let cmd = sql::parse_sql(&sql).map_err(sql_err)?;
        let mut responses = self
            .execute_command(&engine, cmd, &portal.result_column_format)
            .await?;
        Ok(responses.remove(0))
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        let fields = if sql::returns_rows(&target.statement) {
            appointment_schema(&Format::UnifiedText)
        } else {
            vec![]
        };
        Ok(DescribeStatementResponse::new(param_types, fields))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        if sql::returns_rows(&target.statement.statement) {
            Ok(DescribePortalResponse::new(appointment_schema(&target.result_column_format)))
        } else {
            Ok(DescribePortalResponse::new(vec![]))
        }
    }
}

/// `$N` placeholders in statement order, as (byte range, N). Text inside
/// quoted literals and quoted identifiers is skipped.
fn placeholders(sql: &str) -> Vec<(Range<usize>, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            // A doubled quote closes and immediately reopens.
            Some(q) => {
                if b == q {
                    quote = None;
                }
                i += 1;
            }
            None if b == b'\'' || b == b'"' => {
                quote = Some(b);
                i += 1;
            }
            None if b == b'$' => {
                let start = i;
                i += 1;
                let digits = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if i > digits
                    && let Ok(n) = sql[digits..i].parse::<usize>()
                    && n > 0
                {
                    found.push((start..i, n));
                }
            }
            None => i += 1,
        }
    }
    found
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, n)| n).max().unwrap_or(0)
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let params: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    substitute_text_params(&portal.statement.statement, &params)
}

/// Single left-to-right pass over the original statement: bound values are
/// never rescanned. Placeholders with no bound value are left in place.
fn substitute_text_params(sql: &str, params: &[Option<String>]) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut copied = 0;
    for (range, n) in placeholders(sql) {
        let Some(param) = params.get(n - 1) else {
            continue;
        };
        result.push_str(&sql[copied..range.start]);
        match param {
            Some(text) => {
                result.push('\'');
                result.push_str(&text.replace('\'', "''"));
                result.push('\'');
            }
            None => result.push_str("NULL"),
        }
        copied = range.end;
    }
    result.push_str(&sql[copied..]);
    result
}

// ── Factory ──────────────────────────────────────────────────────

pub struct DocketFactory {
    handler: Arc<DocketHandler>,
    noop: Arc<NoopHandler>,
}

impl DocketFactory {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            handler: Arc::new(DocketHandler::new(tenant_manager)),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for DocketFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
) -> std::io::Result<()> {
    let factory = Arc::new(DocketFactory::new(tenant_manager));
    pgwire::tokio::process_socket(socket, None, factory).await
}

fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::Conflict { .. } => "23P01",
        EngineError::NotFound(_) => "P0002",
        EngineError::AlreadyExists(_) => "23505",
        EngineError::MissingField(_) => "23502",
        EngineError::InvalidEnum { .. }
        | EngineError::Parse(_)
        | EngineError::InvalidDate(_)
        | EngineError::InvalidDuration(_) => "22023",
        EngineError::LimitExceeded(_) => "54000",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        sqlstate(&e).into(),
        e.to_string(),
    )))
}

fn sql_err(e: SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_params_finds_highest() {
        assert_eq!(count_params("SELECT * FROM appointments"), 0);
        assert_eq!(
            count_params("SELECT * FROM appointments WHERE date = $1 AND doctor_name = $2"),
            2
        );
        assert_eq!(count_params("UPDATE appointments SET status = $10 WHERE id = $3"), 10);
    }

    #[test]
    fn substitute_quotes_and_nulls() {
        let sql = "INSERT INTO appointments (patient_name, type, id) VALUES ($1, $2, $3)";
        let out = substitute_text_params(
            sql,
            &[Some("Sarah O'Connor".into()), Some("Follow-up".into()), None],
        );
        assert_eq!(
            out,
            "INSERT INTO appointments (patient_name, type, id) VALUES ('Sarah O''Connor', 'Follow-up', NULL)"
        );
    }

    #[test]
    fn substitute_ten_params_no_prefix_clobber() {
        let sql = "$1 $10";
        let params: Vec<Option<String>> = (1..=10).map(|i| Some(i.to_string())).collect();
        assert_eq!(substitute_text_params(sql, &params), "'1' '10'");
    }

    #[test]
    fn count_params_ignores_quoted_text() {
        assert_eq!(
            count_params("INSERT INTO appointments (type, \"$9\") VALUES ('Copay $5 due', $1)"),
            1
        );
        assert_eq!(count_params("SELECT * FROM appointments WHERE doctor_name = 'O''Brien $3'"), 0);
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let sql = "INSERT INTO appointments (patient_name, type) VALUES ($1, $2)";
        let out = substitute_text_params(sql, &[Some("Alice".into()), Some("Copay $1 due".into())]);
        assert_eq!(
            out,
            "INSERT INTO appointments (patient_name, type) VALUES ('Alice', 'Copay $1 due')"
        );
        let out = substitute_text_params(sql, &[Some("$2".into()), Some("x".into())]);
        assert_eq!(out, "INSERT INTO appointments (patient_name, type) VALUES ('$2', 'x')");
    }

    #[test]
    fn substitute_skips_literals_and_unbound() {
        let sql = "SELECT * FROM appointments WHERE doctor_name = '$1' AND date = $1 AND status = $2";
        let out = substitute_text_params(sql, &[Some("2025-12-28".into())]);
        assert_eq!(
            out,
            "SELECT * FROM appointments WHERE doctor_name = '$1' AND date = '2025-12-28' AND status = $2"
        );
    }

    #[test]
    fn engine_errors_map_to_sqlstate() {
        assert_eq!(
            sqlstate(&EngineError::Conflict { doctor: "Dr. David Lee".into(), time: "10:30".into() }),
            "23P01"
        );
        assert_eq!(sqlstate(&EngineError::MissingField("time")), "23502");
        assert_eq!(sqlstate(&EngineError::NotFound(ulid::Ulid::new())), "P0002");
        assert_eq!(sqlstate(&EngineError::InvalidEnum { kind: "mode", value: "Fax".into() }), "22023");
    }
}
