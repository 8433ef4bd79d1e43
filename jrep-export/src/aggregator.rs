//! Build aggregation over a stream of log lines
//!
//! The aggregator tracks the current build context and folds issue
//! references into per-build (or per-reference) records according to an
//! [`AggregationMode`] chosen at job start:
//!
//! - `AllIssues`: one [`BuildRecord`] per build with every referenced issue
//! - `FirstIssue`: one [`IssueRecord`] per build, frozen at the first reference
//! - `PerReference`: one [`ReferenceRow`] per reference occurrence
//!
//! Lines before the first build marker are dropped in every mode. Marker
//! lines are never scanned for issue keys. Each distinct issue key is looked
//! up at most once per aggregator.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::extract::{extract_build_marker, BuildMarker, ReferenceExtractor};
use crate::tracker::{fetch_or_default, IssueDetail, IssueLookup};
use jrep_common::AggregationMode;

/// All issues referenced under one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildRecord {
    pub build_number: String,
    pub build_time: String,
    /// Distinct keys in first-seen order
    pub issue_keys: Vec<String>,
    /// Trimmed text of every line that referenced an issue
    pub comments: Vec<String>,
    pub assignees: Vec<String>,
    pub reporters: Vec<String>,
    pub approvers: Vec<String>,
}

/// First issue referenced under one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueRecord {
    pub build_number: String,
    pub build_time: String,
    pub issue_key: String,
    pub comment: String,
    pub assignee: String,
    pub reporter: String,
    pub approver: String,
    pub approval_time: String,
}

/// One issue reference occurrence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferenceRow {
    pub build_number: String,
    pub build_time: String,
    pub issue_key: String,
    pub issue_link: String,
    pub comment: String,
    pub assignee: String,
    pub reporter: String,
    pub created: String,
    pub approver: String,
    pub approval_time: String,
}

/// Final result set of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", content = "records", rename_all = "snake_case")]
pub enum AggregateReport {
    AllIssues(Vec<BuildRecord>),
    FirstIssue(Vec<IssueRecord>),
    PerReference(Vec<ReferenceRow>),
}

impl AggregateReport {
    pub fn mode(&self) -> AggregationMode {
        match self {
            AggregateReport::AllIssues(_) => AggregationMode::AllIssues,
            AggregateReport::FirstIssue(_) => AggregationMode::FirstIssue,
            AggregateReport::PerReference(_) => AggregationMode::PerReference,
        }
    }

    /// Number of data rows the report will contain
    pub fn len(&self) -> usize {
        match self {
            AggregateReport::AllIssues(records) => records.len(),
            AggregateReport::FirstIssue(records) => records.len(),
            AggregateReport::PerReference(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a consumed line was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Build header; current build switched
    Marker,
    /// Issue references attributed to the current build
    References(usize),
    /// Issue references seen before any build marker (dropped)
    Unattributed(usize),
    /// Nothing of interest
    Other,
}

/// Per-mode accumulation state
enum Fold {
    AllIssues(Vec<BuildRecord>),
    FirstIssue(Vec<FirstIssueSlot>),
    PerReference {
        builds: Vec<BuildMarker>,
        rows: Vec<ReferenceRow>,
    },
}

struct FirstIssueSlot {
    marker: BuildMarker,
    record: Option<IssueRecord>,
}

/// Stateful fold over one job's log lines
pub struct BuildAggregator {
    mode: AggregationMode,
    extractor: ReferenceExtractor,
    lookup: Arc<dyn IssueLookup>,
    /// build_number → position in the fold's build list
    index: HashMap<String, usize>,
    current_build: Option<usize>,
    fold: Fold,
    cache: HashMap<String, IssueDetail>,
}

impl BuildAggregator {
    pub fn new(
        mode: AggregationMode,
        extractor: ReferenceExtractor,
        lookup: Arc<dyn IssueLookup>,
    ) -> Self {
        let fold = match mode {
            AggregationMode::AllIssues => Fold::AllIssues(Vec::new()),
            AggregationMode::FirstIssue => Fold::FirstIssue(Vec::new()),
            AggregationMode::PerReference => Fold::PerReference {
                builds: Vec::new(),
                rows: Vec::new(),
            },
        };

        Self {
            mode,
            extractor,
            lookup,
            index: HashMap::new(),
            current_build: None,
            fold,
            cache: HashMap::new(),
        }
    }

    pub fn mode(&self) -> AggregationMode {
        self.mode
    }

    /// Build number of the current context, if any
    pub fn current_build(&self) -> Option<&str> {
        let idx = self.current_build?;
        let marker = match &self.fold {
            Fold::AllIssues(records) => return Some(records[idx].build_number.as_str()),
            Fold::FirstIssue(slots) => &slots[idx].marker,
            Fold::PerReference { builds, .. } => &builds[idx],
        };
        Some(marker.build_number.as_str())
    }

    /// Number of distinct lookups performed so far
    pub fn lookups_performed(&self) -> usize {
        self.cache.len()
    }

    /// Consume the next line
    pub async fn consume_line(&mut self, line: &str) -> LineKind {
        if let Some(marker) = extract_build_marker(line) {
            self.enter_build(marker);
            return LineKind::Marker;
        }

        let keys = self.extractor.extract_issue_keys(line);
        if keys.is_empty() {
            return LineKind::Other;
        }

        let Some(current) = self.current_build else {
            debug!(references = keys.len(), "Dropping issue references before first build marker");
            return LineKind::Unattributed(keys.len());
        };

        let comment = line.trim().to_string();
        match self.mode {
            AggregationMode::AllIssues => self.fold_all_issues(current, &keys, comment).await,
            AggregationMode::FirstIssue => self.fold_first_issue(current, &keys, comment).await,
            AggregationMode::PerReference => self.fold_per_reference(current, &keys, comment).await,
        }

        LineKind::References(keys.len())
    }

    /// Finalize into the job's result set
    pub fn finish(self) -> AggregateReport {
        match self.fold {
            Fold::AllIssues(records) => AggregateReport::AllIssues(records),
            Fold::FirstIssue(slots) => AggregateReport::FirstIssue(
                slots
                    .into_iter()
                    .filter_map(|slot| {
                        slot.record.map(|mut record| {
                            record.build_time = slot.marker.build_time;
                            record
                        })
                    })
                    .collect(),
            ),
            Fold::PerReference { rows, .. } => AggregateReport::PerReference(rows),
        }
    }

    fn enter_build(&mut self, marker: BuildMarker) {
        let existing = self.index.get(&marker.build_number).copied();
        let idx = match existing {
            Some(idx) => {
                self.update_build_time(idx, &marker.build_time);
                idx
            }
            None => {
                let idx = self.push_build(marker.clone());
                self.index.insert(marker.build_number.clone(), idx);
                idx
            }
        };

        debug!(build_number = %marker.build_number, build_time = %marker.build_time, "Entering build");
        self.current_build = Some(idx);
    }

    fn push_build(&mut self, marker: BuildMarker) -> usize {
        match &mut self.fold {
            Fold::AllIssues(records) => {
                records.push(BuildRecord {
                    build_number: marker.build_number,
                    build_time: marker.build_time,
                    ..Default::default()
                });
                records.len() - 1
            }
            Fold::FirstIssue(slots) => {
                slots.push(FirstIssueSlot {
                    marker,
                    record: None,
                });
                slots.len() - 1
            }
            Fold::PerReference { builds, .. } => {
                builds.push(marker);
                builds.len() - 1
            }
        }
    }

    fn update_build_time(&mut self, idx: usize, build_time: &str) {
        match &mut self.fold {
            Fold::AllIssues(records) => records[idx].build_time = build_time.to_string(),
            Fold::FirstIssue(slots) => slots[idx].marker.build_time = build_time.to_string(),
            Fold::PerReference { builds, .. } => builds[idx].build_time = build_time.to_string(),
        }
    }

    async fn enrich(&mut self, issue_key: &str) -> IssueDetail {
        if let Some(detail) = self.cache.get(issue_key) {
            return detail.clone();
        }
        let detail = fetch_or_default(self.lookup.as_ref(), issue_key).await;
        self.cache.insert(issue_key.to_string(), detail.clone());
        detail
    }

    async fn fold_all_issues(&mut self, current: usize, keys: &[String], comment: String) {
        let mut details = Vec::with_capacity(keys.len());
        for key in keys {
            details.push(self.enrich(key).await);
        }

        let Fold::AllIssues(records) = &mut self.fold else {
            return;
        };
        let record = &mut records[current];
        for (key, detail) in keys.iter().zip(details) {
            push_unique(&mut record.issue_keys, key.clone());
            push_unique(&mut record.assignees, detail.assignee);
            push_unique(&mut record.reporters, detail.reporter);
            push_unique(&mut record.approvers, detail.latest_approver);
        }
        record.comments.push(comment);
    }

    async fn fold_first_issue(&mut self, current: usize, keys: &[String], comment: String) {
        let captured = match &self.fold {
            Fold::FirstIssue(slots) => slots[current].record.is_some(),
            _ => return,
        };
        if captured {
            return;
        }

        let issue_key = keys[0].clone();
        let detail = self.enrich(&issue_key).await;

        let Fold::FirstIssue(slots) = &mut self.fold else {
            return;
        };
        let slot = &mut slots[current];
        slot.record = Some(IssueRecord {
            build_number: slot.marker.build_number.clone(),
            build_time: slot.marker.build_time.clone(),
            issue_key,
            comment,
            assignee: detail.assignee,
            reporter: detail.reporter,
            approver: detail.latest_approver,
            approval_time: detail.latest_approval_time,
        });
    }

    async fn fold_per_reference(&mut self, current: usize, keys: &[String], comment: String) {
        for key in keys {
            let detail = self.enrich(key).await;
            let issue_link = self.lookup.issue_link(key);

            let Fold::PerReference { builds, rows } = &mut self.fold else {
                return;
            };
            let marker = &builds[current];
            rows.push(ReferenceRow {
                build_number: marker.build_number.clone(),
                build_time: marker.build_time.clone(),
                issue_key: key.clone(),
                issue_link,
                comment: comment.clone(),
                assignee: detail.assignee,
                reporter: detail.reporter,
                created: detail.created,
                approver: detail.latest_approver,
                approval_time: detail.latest_approval_time,
            });
        }
    }
}

/// Insertion-ordered set semantics; empty values are not members
fn push_unique(set: &mut Vec<String>, value: String) {
    if !value.is_empty() && !set.contains(&value) {
        set.push(value);
    }
}
