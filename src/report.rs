use std::fmt::Write;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{field, text, RiskLabel, ScoredRecord, ATTENDANCE, FEES_DUE, MARKS_TREND, NAME};
use crate::pipeline::Analysis;
use crate::risk::summarize_factors;

fn student_line(scored: &ScoredRecord) -> String {
    let record = &scored.record;
    let shown = |column: &str| {
        field(record, column)
            .map(ToString::to_string)
            .unwrap_or_else(|| "n/a".to_string())
    };
    format!(
        "- {} (ID {}) score {}: attendance {}, marks trend {}, fees due {}",
        text(record, NAME).unwrap_or_else(|| "Student".to_string()),
        scored
            .assessment
            .student_id
            .as_ref()
            .map_or_else(|| "n/a".to_string(), ToString::to_string),
        scored.assessment.risk_score,
        shown(ATTENDANCE),
        shown(MARKS_TREND),
        shown(FEES_DUE)
    )
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total as f64
    }
}

pub fn build_report(session_id: Uuid, analyzed_at: DateTime<Utc>, analysis: &Analysis) -> String {
    let total = analysis.records.len();
    let factors = summarize_factors(analysis.records.iter().map(|scored| &scored.assessment));

    let mut output = String::new();
    let _ = writeln!(output, "# Student Dropout Risk Report");
    let _ = writeln!(
        output,
        "Session {} analyzed at {} ({} students)",
        session_id,
        analyzed_at.format("%Y-%m-%d %H:%M UTC"),
        total
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Mix");

    if total == 0 {
        let _ = writeln!(output, "No students in the uploaded records.");
    } else {
        for label in RiskLabel::ALL {
            let count = analysis.counts.get(label);
            let _ = writeln!(
                output,
                "- {}: {} students ({:.1}%)",
                label,
                count,
                share(count, total)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Factors");
    let _ = writeln!(output, "- Attendance below 75%: {}", factors.low_attendance);
    let _ = writeln!(output, "- Declining marks: {}", factors.declining_marks);
    let _ = writeln!(output, "- Fees outstanding: {}", factors.fees_outstanding);

    for (label, limit) in [(RiskLabel::High, None), (RiskLabel::Medium, Some(10))] {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {label} Risk Students");
        let mut students = analysis
            .records
            .iter()
            .filter(|scored| scored.assessment.risk_label == label)
            .peekable();

        if students.peek().is_none() {
            let _ = writeln!(output, "No {} risk students.", label.to_string().to_lowercase());
            continue;
        }
        for scored in students.take(limit.unwrap_or(usize::MAX)) {
            let _ = writeln!(output, "{}", student_line(scored));
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecordSet, Value};
    use crate::pipeline::analyze;
    use chrono::TimeZone;

    fn sample() -> Analysis {
        let attendance = RecordSet::from_rows(
            ["student_id", "attendance", "name"],
            vec![
                vec![Some(Value::from(1)), Some(Value::from(60)), Some(Value::from("Ana"))],
                vec![Some(Value::from(2)), Some(Value::from(90)), Some(Value::from("Bo"))],
            ],
        );
        let marks = RecordSet::from_rows(
            ["student_id", "marks_trend"],
            vec![
                vec![Some(Value::from(1)), Some(Value::from("down"))],
                vec![Some(Value::from(2)), Some(Value::from("up"))],
            ],
        );
        let fees = RecordSet::from_rows(
            ["student_id", "fees_due"],
            vec![
                vec![Some(Value::from(1)), Some(Value::from(0))],
                vec![Some(Value::from(2)), Some(Value::from(0))],
            ],
        );
        analyze(&attendance, &marks, &fees).unwrap()
    }

    #[test]
    fn report_lists_mix_factors_and_rosters() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();
        let report = build_report(Uuid::nil(), at, &sample());

        assert!(report.contains("analyzed at 2026-03-02 09:30 UTC (2 students)"));
        assert!(report.contains("- High: 1 students (50.0%)"));
        assert!(report.contains("- Medium: 0 students (0.0%)"));
        assert!(report.contains("- Declining marks: 1"));
        assert!(report.contains("- Ana (ID 1) score 2: attendance 60, marks trend down, fees due 0"));
        assert!(report.contains("No medium risk students."));
    }

    #[test]
    fn empty_analysis_reports_no_students() {
        let empty = Analysis {
            records: Vec::new(),
            counts: Default::default(),
        };
        let report = build_report(Uuid::nil(), Utc::now(), &empty);
        assert!(report.contains("No students in the uploaded records."));
        assert!(report.contains("No high risk students."));
    }
}
