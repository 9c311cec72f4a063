use std::path::PathBuf;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{field, text, ATTENDANCE, FEES_DUE, MARKS_TREND, NAME, STUDENT_ID};
use crate::risk::HighRiskStudent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivers one composed alert. Implementations report failure; they never retry.
pub trait AlertTransport {
    fn deliver(&mut self, sender: &str, message: &AlertMessage) -> anyhow::Result<()>;
}

/// Alerts disabled: messages are only logged.
#[derive(Debug, Default)]
pub struct DryRunTransport;

impl AlertTransport for DryRunTransport {
    fn deliver(&mut self, sender: &str, message: &AlertMessage) -> anyhow::Result<()> {
        info!(from = sender, to = %message.to, subject = %message.subject, "alert not sent (dry run)");
        Ok(())
    }
}

// Keeps each RFC 2047 encoded word within the 75 character limit.
const ENCODED_WORD_BYTES: usize = 45;

/// Writes each alert as an `.eml` file for a mail relay to pick up.
#[derive(Debug)]
pub struct OutboxTransport {
    dir: PathBuf,
}

impl OutboxTransport {
    pub fn new(dir: PathBuf) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create outbox {}", dir.display()))?;
        Ok(Self { dir })
    }
}

impl AlertTransport for OutboxTransport {
    fn deliver(&mut self, sender: &str, message: &AlertMessage) -> anyhow::Result<()> {
        let from = header_value("From", sender)?;
        let to = header_value("To", &message.to)?;
        let subject = encode_header(header_value("Subject", &message.subject)?);

        let path = self.dir.join(format!("{}.eml", Uuid::new_v4()));
        let contents = format!(
            "From: {from}\r\nTo: {to}\r\nSubject: {subject}\r\nMIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{}\r\n",
            message.body.replace("\r\n", "\n").replace('\n', "\r\n")
        );
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(to = %message.to, path = %path.display(), "alert queued");
        Ok(())
    }
}

fn header_value<'a>(header: &str, value: &'a str) -> anyhow::Result<&'a str> {
    if value.contains(['\r', '\n']) {
        anyhow::bail!("{header} header contains a line break");
    }
    Ok(value)
}

/// ASCII passes through; anything else becomes base64 encoded words, split
/// on char boundaries and folded onto continuation lines.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        return value.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in value.chars() {
        if chunk.len() + ch.len_utf8() > ENCODED_WORD_BYTES {
            words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?UTF-8?B?{}?=", STANDARD.encode(&chunk)));
    }
    words.join("\r\n ")
}

fn single_line(value: &str) -> String {
    value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect()
}

pub fn compose_alert(student: &HighRiskStudent<'_>, to: &str) -> AlertMessage {
    let record = &student.scored.record;
    let name = text(record, NAME).map_or_else(|| "Student".to_string(), |name| single_line(&name));
    let shown = |column: &str| {
        field(record, column)
            .map(ToString::to_string)
            .unwrap_or_else(|| "n/a".to_string())
    };

    AlertMessage {
        to: to.to_string(),
        subject: format!("⚠️ {name} is at HIGH dropout risk"),
        body: format!(
            "Student {name} (ID: {}) is flagged as HIGH risk.\nAttendance: {}%\nMarks Trend: {}\nFees Due: {}",
            shown(STUDENT_ID),
            shown(ATTENDANCE),
            shown(MARKS_TREND),
            shown(FEES_DUE),
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AlertSummary {
    pub high_risk_count: usize,
    pub alerts_sent: usize,
    pub skipped_without_contact: usize,
    pub failed: usize,
}

/// Sends one alert per High-risk student with a contact. A failed delivery is
/// logged and counted; the rest of the batch still goes out.
pub fn dispatch_alerts(
    students: &[HighRiskStudent<'_>],
    sender: &str,
    transport: &mut dyn AlertTransport,
) -> AlertSummary {
    let mut summary = AlertSummary {
        high_risk_count: students.len(),
        ..AlertSummary::default()
    };

    for student in students {
        let Some(to) = student.contact.as_deref() else {
            summary.skipped_without_contact += 1;
            continue;
        };
        let message = compose_alert(student, to);
        match transport.deliver(sender, &message) {
            Ok(()) => summary.alerts_sent += 1,
            Err(err) => {
                warn!(to, error = %format!("{err:#}"), "alert delivery failed");
                summary.failed += 1;
            }
        }
    }

    summary
}
