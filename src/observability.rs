use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "docket_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "docket_query_duration_seconds";

// ── Booking metrics ─────────────────────────────────────────────

/// Counter: appointments successfully created.
pub const APPOINTMENTS_CREATED_TOTAL: &str = "docket_appointments_created_total";

/// Counter: creations rejected because the doctor was already booked.
pub const BOOKING_CONFLICTS_TOTAL: &str = "docket_booking_conflicts_total";

/// Counter: status updates applied. Labels: status.
pub const STATUS_UPDATES_TOTAL: &str = "docket_status_updates_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "docket_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "docket_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "docket_connections_rejected_total";

/// Gauge: number of loaded tenants.
pub const TENANTS_ACTIVE: &str = "docket_tenants_active";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::SelectAppointments { .. } => "select_appointments",
        Command::InsertAppointment { .. } => "insert_appointment",
        Command::UpdateStatus { .. } => "update_status",
    }
}
