//! CSV materialization of aggregation results
//!
//! Column order is fixed per mode; spreadsheet importers depend on it.
//! The header row is always written, so an empty result is a header-only file.

use crate::aggregator::{AggregateReport, BuildRecord, IssueRecord, ReferenceRow};
use jrep_common::AggregationMode;

/// Suggested download filename
pub const REPORT_FILENAME: &str = "manual_jira_report.csv";

/// MIME type of the rendered report
pub const REPORT_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

pub const ALL_ISSUES_COLUMNS: [&str; 7] = [
    "build_number",
    "build_time",
    "issue_keys",
    "comments",
    "assignees",
    "reporters",
    "approvers",
];

pub const FIRST_ISSUE_COLUMNS: [&str; 8] = [
    "build_number",
    "build_time",
    "issue_key",
    "comment",
    "assignee",
    "reporter",
    "approver",
    "approval_time",
];

pub const PER_REFERENCE_COLUMNS: [&str; 10] = [
    "build_number",
    "build_time",
    "issue_key",
    "jira_link",
    "comment",
    "assignee",
    "reporter",
    "created",
    "approver",
    "approval_time",
];

/// Separator for list cells
const LIST_SEPARATOR: &str = ", ";

/// Separator for the comments cell
const COMMENT_SEPARATOR: &str = "\n";

/// Header row for a mode
pub fn columns(mode: AggregationMode) -> &'static [&'static str] {
    match mode {
        AggregationMode::AllIssues => &ALL_ISSUES_COLUMNS,
        AggregationMode::FirstIssue => &FIRST_ISSUE_COLUMNS,
        AggregationMode::PerReference => &PER_REFERENCE_COLUMNS,
    }
}

/// Render a result set as CSV bytes
pub fn render_csv(report: &AggregateReport) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(columns(report.mode()))?;

    match report {
        AggregateReport::AllIssues(records) => {
            for record in records {
                wtr.write_record(build_record_row(record))?;
            }
        }
        AggregateReport::FirstIssue(records) => {
            for record in records {
                wtr.write_record(issue_record_row(record))?;
            }
        }
        AggregateReport::PerReference(rows) => {
            for row in rows {
                wtr.write_record(reference_row(row))?;
            }
        }
    }

    wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

fn build_record_row(record: &BuildRecord) -> [String; 7] {
    [
        record.build_number.clone(),
        record.build_time.clone(),
        record.issue_keys.join(LIST_SEPARATOR),
        record.comments.join(COMMENT_SEPARATOR),
        record.assignees.join(LIST_SEPARATOR),
        record.reporters.join(LIST_SEPARATOR),
        record.approvers.join(LIST_SEPARATOR),
    ]
}

fn issue_record_row(record: &IssueRecord) -> [&str; 8] {
    [
        &record.build_number,
        &record.build_time,
        &record.issue_key,
        &record.comment,
        &record.assignee,
        &record.reporter,
        &record.approver,
        &record.approval_time,
    ]
}

fn reference_row(row: &ReferenceRow) -> [&str; 10] {
    [
        &row.build_number,
        &row.build_time,
        &row.issue_key,
        &row.issue_link,
        &row.comment,
        &row.assignee,
        &row.reporter,
        &row.created,
        &row.approver,
        &row.approval_time,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_empty_report_is_header_only() {
        let csv = text(render_csv(&AggregateReport::FirstIssue(Vec::new())).unwrap());
        assert_eq!(
            csv,
            "build_number,build_time,issue_key,comment,assignee,reporter,approver,approval_time\n"
        );
    }

    #[test]
    fn test_all_issues_row_joins_lists() {
        let report = AggregateReport::AllIssues(vec![BuildRecord {
            build_number: "42".to_string(),
            build_time: "2024-01-01T00:00:00".to_string(),
            issue_keys: vec!["ITSM-101".to_string(), "ITSM-102".to_string()],
            comments: vec!["fix ITSM-101".to_string(), "fix ITSM-102".to_string()],
            assignees: vec!["Ann".to_string(), "Ben".to_string()],
            reporters: vec!["Rae".to_string()],
            approvers: Vec::new(),
        }]);

        let csv = text(render_csv(&report).unwrap());
        let mut lines = csv.splitn(2, '\n');
        assert_eq!(
            lines.next().unwrap(),
            "build_number,build_time,issue_keys,comments,assignees,reporters,approvers"
        );
        assert_eq!(
            lines.next().unwrap(),
            "42,2024-01-01T00:00:00,\"ITSM-101, ITSM-102\",\"fix ITSM-101\nfix ITSM-102\",\"Ann, Ben\",Rae,\n"
        );
    }

    #[test]
    fn test_per_reference_column_order() {
        let report = AggregateReport::PerReference(vec![ReferenceRow {
            build_number: "1".to_string(),
            build_time: "t".to_string(),
            issue_key: "ITSM-1".to_string(),
            issue_link: "https://jira/browse/ITSM-1".to_string(),
            comment: "c".to_string(),
            assignee: "a".to_string(),
            reporter: "r".to_string(),
            created: "cr".to_string(),
            approver: "ap".to_string(),
            approval_time: "at".to_string(),
        }]);

        let csv = text(render_csv(&report).unwrap());
        assert_eq!(
            csv.lines().nth(1).unwrap(),
            "1,t,ITSM-1,https://jira/browse/ITSM-1,c,a,r,cr,ap,at"
        );
    }

    #[test]
    fn test_columns_match_mode() {
        assert_eq!(columns(AggregationMode::AllIssues).len(), 7);
        assert_eq!(columns(AggregationMode::FirstIssue)[2], "issue_key");
        assert_eq!(columns(AggregationMode::PerReference)[3], "jira_link");
    }
}
