//! Day partitioning of a source's fragment keys.

use chrono::{Datelike, NaiveDate};
use tblog_core::KeyLayout;

/// All fragments of one source for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup {
    /// The source id as it appears in the fragment keys.
    pub source_id: String,
    /// The calendar day.
    pub date: NaiveDate,
    /// Fragment keys in listing (chronological) order.
    pub members: Vec<String>,
    /// Where the day's consolidated log lives.
    pub consolidated_key: String,
}

impl DayGroup {
    /// Calendar year.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// Calendar month, 1-based.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.date.month()
    }

    /// Day of month, 1-based.
    #[must_use]
    pub fn day(&self) -> u32 {
        self.date.day()
    }
}

/// Groups sorted fragment keys into one [`DayGroup`] per contiguous run of
/// keys sharing a source and date.
///
/// Keys that do not parse as fragments are dropped. Input must be sorted; the
/// partitioner does not reorder.
#[must_use]
pub fn partition_by_day<S: AsRef<str>>(layout: &KeyLayout, keys: &[S]) -> Vec<DayGroup> {
    let mut groups = Vec::new();
    let mut current: Option<DayGroup> = None;

    for key in keys {
        let Some(fragment) = layout.parse_fragment(key.as_ref()) else {
            tracing::trace!(key = key.as_ref(), "Skipping key outside fragment grammar");
            continue;
        };

        if let Some(group) = current
            .as_mut()
            .filter(|g| g.date == fragment.date() && g.source_id == fragment.source_id())
        {
            group.members.push(fragment.into_path());
            continue;
        }

        groups.extend(current.take());
        current = Some(DayGroup {
            consolidated_key: layout.consolidated_key(fragment.source_id(), fragment.date()),
            source_id: fragment.source_id().to_string(),
            date: fragment.date(),
            members: vec![fragment.into_path()],
        });
    }

    groups.extend(current);
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| (*k).to_string()).collect()
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let groups = partition_by_day::<String>(&KeyLayout::default(), &[]);
        assert!(groups.is_empty());
    }

    #[test]
    fn splits_on_date_change() {
        let input = keys(&[
            "log/tbcd1234/20210730T131711.123Z.log",
            "log/tbcd1234/20210730T140000Z.log",
            "log/tbcd1234/20210731T000001Z.log",
            "log/tbcd1234/20210801T235959.9Z.log",
        ]);

        let groups = partition_by_day(&KeyLayout::default(), &input);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].members, input[..2].to_vec());
        assert_eq!(groups[0].consolidated_key, "log/2021/07/tbcd1234-30.log");
        assert_eq!((groups[0].year(), groups[0].month(), groups[0].day()), (2021, 7, 30));
        assert_eq!(groups[1].members, input[2..3].to_vec());
        assert_eq!(groups[1].consolidated_key, "log/2021/07/tbcd1234-31.log");
        assert_eq!(groups[2].members, input[3..].to_vec());
        assert_eq!(groups[2].consolidated_key, "log/2021/08/tbcd1234-01.log");
    }

    #[test]
    fn non_matching_keys_are_excluded() {
        let input = keys(&[
            "log/tbcd1234/20210730T131711Z.log",
            "log/tbcd1234/readme.txt",
            "log/tbcd1234/20210730T1400Z.log",
            "log/tbcd1234/20210730T140000Z.log",
        ]);

        let groups = partition_by_day(&KeyLayout::default(), &input);

        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].members,
            keys(&[
                "log/tbcd1234/20210730T131711Z.log",
                "log/tbcd1234/20210730T140000Z.log",
            ])
        );
    }

    #[test]
    fn every_matching_key_lands_in_exactly_one_group() {
        let mut input = Vec::new();
        for day in 1..=28 {
            for hour in [0, 6, 12, 18] {
                input.push(format!("log/tbcd0042/202102{day:02}T{hour:02}0000Z.log"));
            }
        }

        let groups = partition_by_day(&KeyLayout::default(), &input);

        assert_eq!(groups.len(), 28);
        let flattened: Vec<String> = groups.iter().flat_map(|g| g.members.clone()).collect();
        assert_eq!(flattened, input);
        for group in &groups {
            assert!(group.members.iter().all(|k| {
                KeyLayout::default()
                    .parse_fragment(k)
                    .is_some_and(|f| f.date() == group.date)
            }));
        }
    }

    #[test]
    fn unsorted_input_splits_same_day() {
        let input = keys(&[
            "log/tbcd1/20210730T000000Z.log",
            "log/tbcd1/20210731T000000Z.log",
            "log/tbcd1/20210730T120000Z.log",
        ]);

        let groups = partition_by_day(&KeyLayout::default(), &input);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].consolidated_key, groups[2].consolidated_key);
    }
}
