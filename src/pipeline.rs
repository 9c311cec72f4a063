use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{MergeError, SchemaError, SessionError};
use crate::merge::merge_sources;
use crate::models::{RecordSet, RiskLabel, Role, ScoredRecord};
use crate::normalize::normalize_and_validate;
use crate::risk::{count_by_label, score_records, RiskCounts};
use crate::trend::infer_trend;

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub records: Vec<ScoredRecord>,
    pub counts: RiskCounts,
}

/// Trend inference on marks, outer join, then per-row scoring. Inputs are
/// borrowed and never modified.
pub fn analyze(
    attendance: &RecordSet,
    marks: &RecordSet,
    fees: &RecordSet,
) -> Result<Analysis, MergeError> {
    let marks = infer_trend(marks);
    let merged = merge_sources(attendance, &marks, fees)?;
    let records = score_records(merged.into_rows());
    let counts = count_by_label(records.iter().map(|scored| &scored.assessment));
    Ok(Analysis { records, counts })
}

/// One upload and, once analyzed, its cached result. A new upload means a new
/// session; the caller drops the old one along with its result.
#[derive(Debug)]
pub struct AnalysisSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    attendance: RecordSet,
    marks: RecordSet,
    fees: RecordSet,
    result: Option<(DateTime<Utc>, Analysis)>,
}

impl AnalysisSession {
    pub fn upload(
        attendance: RecordSet,
        marks: RecordSet,
        fees: RecordSet,
    ) -> Result<Self, SchemaError> {
        let session = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            attendance: normalize_and_validate(attendance, Role::Attendance)?,
            marks: normalize_and_validate(marks, Role::Marks)?,
            fees: normalize_and_validate(fees, Role::Fees)?,
            result: None,
        };
        info!(
            session = %session.id,
            attendance_rows = session.attendance.len(),
            marks_rows = session.marks.len(),
            fees_rows = session.fees.len(),
            "records uploaded"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Runs the pipeline and caches the result, replacing any earlier one.
    pub fn analyze(&mut self) -> Result<&Analysis, MergeError> {
        let analysis = analyze(&self.attendance, &self.marks, &self.fees)?;
        info!(
            session = %self.id,
            students = analysis.counts.total(),
            high = analysis.counts.get(RiskLabel::High),
            "analysis complete"
        );
        let (_, analysis) = self.result.insert((Utc::now(), analysis));
        Ok(analysis)
    }

    pub fn latest(&self) -> Result<&Analysis, SessionError> {
        self.result
            .as_ref()
            .map(|(_, analysis)| analysis)
            .ok_or(SessionError::NoAnalysis)
    }

    pub fn analyzed_at(&self) -> Option<DateTime<Utc>> {
        self.result.as_ref().map(|(at, _)| *at)
    }
}
