use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{
    field, numeric, text, Record, RiskAssessment, RiskFactors, RiskLabel, ScoredRecord,
    ATTENDANCE, EMAIL, FEES_DUE, MARKS_TREND, MENTOR_EMAIL, STUDENT_ID,
};

pub const ATTENDANCE_THRESHOLD: f64 = 75.0;

/// Scores one merged record. Each factor is judged on its own; a null or
/// non-numeric cell leaves that factor unmet.
pub fn classify(record: &Record) -> RiskAssessment {
    let factors = RiskFactors {
        low_attendance: numeric(record, ATTENDANCE).is_some_and(|value| value < ATTENDANCE_THRESHOLD),
        declining_marks: field(record, MARKS_TREND)
            .is_some_and(|trend| trend.to_string().to_lowercase() == "down"),
        fees_outstanding: numeric(record, FEES_DUE).is_some_and(|value| value > 0.0),
    };
    let risk_score = factors.score();

    RiskAssessment {
        student_id: field(record, STUDENT_ID).cloned(),
        risk_score,
        risk_label: RiskLabel::from_score(risk_score),
        factors,
    }
}

pub fn score_records(records: Vec<Record>) -> Vec<ScoredRecord> {
    records
        .into_iter()
        .map(|record| {
            let assessment = classify(&record);
            ScoredRecord { record, assessment }
        })
        .collect()
}

/// Labels nobody holds are omitted; `get` reads them as 0.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct RiskCounts(BTreeMap<RiskLabel, usize>);

impl RiskCounts {
    pub fn get(&self, label: RiskLabel) -> usize {
        self.0.get(&label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }
}

pub fn count_by_label<'a>(assessments: impl IntoIterator<Item = &'a RiskAssessment>) -> RiskCounts {
    let mut counts = BTreeMap::new();
    for assessment in assessments {
        *counts.entry(assessment.risk_label).or_insert(0) += 1;
    }
    RiskCounts(counts)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FactorSummary {
    pub low_attendance: usize,
    pub declining_marks: usize,
    pub fees_outstanding: usize,
}

pub fn summarize_factors<'a>(assessments: impl IntoIterator<Item = &'a RiskAssessment>) -> FactorSummary {
    let mut summary = FactorSummary {
        low_attendance: 0,
        declining_marks: 0,
        fees_outstanding: 0,
    };
    for assessment in assessments {
        summary.low_attendance += usize::from(assessment.factors.low_attendance);
        summary.declining_marks += usize::from(assessment.factors.declining_marks);
        summary.fees_outstanding += usize::from(assessment.factors.fees_outstanding);
    }
    summary
}

#[derive(Debug, Clone)]
pub struct HighRiskStudent<'a> {
    pub scored: &'a ScoredRecord,
    pub contact: Option<String>,
}

pub fn select_high_risk(records: &[ScoredRecord]) -> Vec<HighRiskStudent<'_>> {
    records
        .iter()
        .filter(|scored| scored.assessment.risk_label == RiskLabel::High)
        .map(|scored| HighRiskStudent {
            scored,
            contact: text(&scored.record, MENTOR_EMAIL).or_else(|| text(&scored.record, EMAIL)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordSet, Value};

    fn record(attendance: Option<Value>, trend: Option<Value>, fees: Option<Value>) -> Record {
        RecordSet::from_rows(
            ["student_id", "attendance", "marks_trend", "fees_due"],
            vec![vec![Some(Value::from(1)), attendance, trend, fees]],
        )
        .into_rows()
        .remove(0)
    }

    #[test]
    fn every_factor_combination_follows_thresholds() {
        let attendance = [
            (Some(Value::from(60)), true),
            (Some(Value::from(75)), false),
            (None, false),
        ];
        let trends = [
            (Some(Value::from("down")), true),
            (Some(Value::from("up")), false),
            (Some(Value::from("stable")), false),
        ];
        let fees = [
            (Some(Value::from(500)), true),
            (Some(Value::from(0)), false),
            (None, false),
        ];

        for (att, att_risk) in &attendance {
            for (trend, trend_risk) in &trends {
                for (fee, fee_risk) in &fees {
                    let assessment = classify(&record(att.clone(), trend.clone(), fee.clone()));
                    let expected = [att_risk, trend_risk, fee_risk]
                        .into_iter()
                        .filter(|met| **met)
                        .count() as u8;
                    assert_eq!(assessment.risk_score, expected);
                    assert!(assessment.risk_score <= 3);
                    let label = match expected {
                        0 => RiskLabel::Low,
                        1 => RiskLabel::Medium,
                        _ => RiskLabel::High,
                    };
                    assert_eq!(assessment.risk_label, label);
                }
            }
        }
    }

    #[test]
    fn trend_match_ignores_case() {
        let assessment = classify(&record(None, Some(Value::from("DOWN")), None));
        assert!(assessment.factors.declining_marks);
        assert_eq!(assessment.risk_label, RiskLabel::Medium);
    }

    #[test]
    fn malformed_cells_do_not_score() {
        let assessment = classify(&record(
            Some(Value::from("absent")),
            Some(Value::from(3)),
            Some(Value::from(f64::NAN)),
        ));
        assert_eq!(assessment.risk_score, 0);
        assert_eq!(assessment.risk_label, RiskLabel::Low);
    }

    #[test]
    fn numeric_text_still_counts() {
        let assessment = classify(&record(Some(Value::from("60")), None, Some(Value::from("12.5"))));
        assert_eq!(assessment.risk_score, 2);
        assert_eq!(assessment.risk_label, RiskLabel::High);
    }

    #[test]
    fn counts_omit_unused_labels_and_sum_to_total() {
        let assessments = vec![
            classify(&record(Some(Value::from(60)), Some(Value::from("down")), None)),
            classify(&record(Some(Value::from(60)), Some(Value::from("down")), None)),
            classify(&record(None, None, None)),
        ];
        let counts = count_by_label(&assessments);
        assert_eq!(counts.get(RiskLabel::High), 2);
        assert_eq!(counts.get(RiskLabel::Low), 1);
        assert_eq!(
            serde_json::to_value(&counts).unwrap(),
            serde_json::json!({"High": 2, "Low": 1})
        );
        assert_eq!(counts.get(RiskLabel::Medium), 0);
        assert_eq!(counts.total(), assessments.len());
    }

    #[test]
    fn high_risk_selection_prefers_mentor_email() {
        let set = RecordSet::from_rows(
            ["student_id", "attendance", "marks_trend", "fees_due", "email", "mentor_email"],
            vec![
                vec![
                    Some(Value::from(1)),
                    Some(Value::from(40)),
                    Some(Value::from("down")),
                    Some(Value::from(0)),
                    Some(Value::from("student@example.com")),
                    Some(Value::from("mentor@example.com")),
                ],
                vec![
                    Some(Value::from(2)),
                    Some(Value::from(40)),
                    Some(Value::from("stable")),
                    Some(Value::from(10)),
                    Some(Value::from("second@example.com")),
                    None,
                ],
                vec![
                    Some(Value::from(3)),
                    Some(Value::from(40)),
                    Some(Value::from("down")),
                    Some(Value::from(10)),
                    None,
                    None,
                ],
                vec![
                    Some(Value::from(4)),
                    Some(Value::from(90)),
                    Some(Value::from("up")),
                    Some(Value::from(0)),
                    Some(Value::from("fine@example.com")),
                    None,
                ],
            ],
        );
        let scored = score_records(set.into_rows());
        let high = select_high_risk(&scored);
        let contacts: Vec<Option<&str>> = high.iter().map(|student| student.contact.as_deref()).collect();
        assert_eq!(
            contacts,
            vec![Some("mentor@example.com"), Some("second@example.com"), None]
        );
    }

    #[test]
    fn factor_summary_counts_each_condition() {
        let assessments = vec![
            classify(&record(Some(Value::from(60)), Some(Value::from("down")), None)),
            classify(&record(Some(Value::from(90)), None, Some(Value::from(5)))),
        ];
        let summary = summarize_factors(&assessments);
        assert_eq!(summary.low_attendance, 1);
        assert_eq!(summary.declining_marks, 1);
        assert_eq!(summary.fees_outstanding, 1);
    }
}
