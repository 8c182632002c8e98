//! Bookkeeping records returned by a consolidation run.

use chrono::NaiveDate;
use serde::Serialize;

/// What happened to one day group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    /// The loader the fragments came from.
    pub source_id: String,
    /// The calendar day the fragments belong to.
    pub date: NaiveDate,
    /// The consolidated key written (or that would be written in a dry run).
    pub consolidated_key: String,
    /// Fragment keys in the group.
    pub fragments: usize,
    /// Fragments that disappeared between listing and reading.
    pub fragments_missing: usize,
    /// Bytes contributed by this run's fragments.
    pub new_bytes: usize,
    /// Bytes already present in the consolidated log.
    pub prior_bytes: usize,
    /// Total bytes of the consolidated log after the merge.
    pub written_bytes: usize,
    /// Fragment keys deleted after the write.
    pub deleted: usize,
    /// True if nothing was written or deleted.
    pub dry_run: bool,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Sources enumerated.
    pub sources: usize,
    /// Day groups merged.
    pub day_groups: usize,
    /// Fragment keys merged.
    pub fragments: usize,
    /// Fragment bytes merged.
    pub bytes: usize,
    /// Fragment keys deleted.
    pub deleted: usize,
    /// Wall-clock duration of the run.
    pub elapsed_ms: u64,
}

impl RunStats {
    /// Folds one day summary into the totals.
    pub fn record(&mut self, day: &DaySummary) {
        self.day_groups += 1;
        self.fragments += day.fragments;
        self.bytes += day.new_bytes;
        self.deleted += day.deleted;
    }
}

/// The result of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Day groups in processing order.
    pub days: Vec<DaySummary>,
    /// Aggregate counters.
    pub stats: RunStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_accumulate_day_summaries() {
        let day = DaySummary {
            source_id: "tbcd1234".into(),
            date: NaiveDate::from_ymd_opt(2021, 7, 30).unwrap(),
            consolidated_key: "log/2021/07/tbcd1234-30.log".into(),
            fragments: 2,
            fragments_missing: 0,
            new_bytes: 12,
            prior_bytes: 9,
            written_bytes: 21,
            deleted: 2,
            dry_run: false,
        };

        let mut stats = RunStats::default();
        stats.record(&day);
        stats.record(&day);

        assert_eq!(stats.day_groups, 2);
        assert_eq!(stats.fragments, 4);
        assert_eq!(stats.bytes, 24);
        assert_eq!(stats.deleted, 4);
    }

    #[test]
    fn summary_serializes_date_as_iso() {
        let day = DaySummary {
            source_id: "tbcd1234".into(),
            date: NaiveDate::from_ymd_opt(2021, 7, 30).unwrap(),
            consolidated_key: "log/2021/07/tbcd1234-30.log".into(),
            fragments: 1,
            fragments_missing: 0,
            new_bytes: 6,
            prior_bytes: 0,
            written_bytes: 6,
            deleted: 1,
            dry_run: false,
        };
        let json = serde_json::to_value(&day).unwrap();
        assert_eq!(json["date"], "2021-07-30");
    }
}
