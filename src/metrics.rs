//! Prometheus metrics for the server: session gauge, auth failures, transfer
//! volume and per-command counters. Embedders scrape them through the
//! default registry.

use crate::server::controlchan::{middleware::ControlChanMiddleware, ControlChanError, Event, Reply};
use async_trait::async_trait;
use lazy_static::lazy_static;
use prometheus::{
    opts, register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec, IntGauge,
};

lazy_static! {
    static ref FTP_SESSIONS: IntGauge =
        register_int_gauge!(opts!("ftp_sessions", "Number of active FTP sessions.")).unwrap();
    static ref FTP_AUTH_FAILURES: IntCounter =
        register_int_counter!(opts!("ftp_auth_failures", "Total number of authentication failures.")).unwrap();
    static ref FTP_BYTES_SENT: IntCounter =
        register_int_counter!(opts!("ftp_bytes_sent", "Total number of file bytes sent to clients.")).unwrap();
    static ref FTP_BYTES_RECEIVED: IntCounter = register_int_counter!(opts!(
        "ftp_bytes_received",
        "Total number of file bytes received from clients."
    ))
    .unwrap();
    static ref FTP_COMMAND_TOTAL: IntCounterVec =
        register_int_counter_vec!("ftp_command_total", "Total number of commands received.", &["command"]).unwrap();
    static ref FTP_REPLY_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ftp_reply_total",
        "Total number of reply codes sent to clients.",
        &["range"]
    )
    .unwrap();
}

pub fn inc_session() {
    FTP_SESSIONS.inc();
}

pub fn dec_session() {
    FTP_SESSIONS.dec();
}

pub fn inc_auth_failure() {
    FTP_AUTH_FAILURES.inc();
}

pub fn add_bytes_sent(bytes: u64) {
    FTP_BYTES_SENT.inc_by(bytes);
}

pub fn add_bytes_received(bytes: u64) {
    FTP_BYTES_RECEIVED.inc_by(bytes);
}

fn add_event_metric(event: &Event) {
    if let Event::Command(cmd) = event {
        FTP_COMMAND_TOTAL.with_label_values(&[cmd.verb()]).inc();
    }
}

fn add_reply_metric(reply: &Reply) {
    use crate::server::controlchan::reply::ReplyCode;
    let code = match reply {
        Reply::None => return,
        Reply::CodeAndMsg { code, .. } | Reply::MultiLine { code, .. } => *code,
    };
    if code == ReplyCode::NoReply {
        return;
    }
    let range = match (code as u32) / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        _ => "5xx",
    };
    FTP_REPLY_TOTAL.with_label_values(&[range]).inc();
}

// Counts events and replies as they pass through the control loop.
pub struct MetricsMiddleware<Next>
where
    Next: ControlChanMiddleware,
{
    pub next: Next,
}

#[async_trait]
impl<Next> ControlChanMiddleware for MetricsMiddleware<Next>
where
    Next: ControlChanMiddleware,
{
    async fn handle(&mut self, event: Event) -> Result<Reply, ControlChanError> {
        add_event_metric(&event);
        let result = self.next.handle(event).await;
        if let Ok(reply) = &result {
            add_reply_metric(reply);
        }
        result
    }
}
