//! Per-day, per-owner allocation calendar and overallocation detection.

use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::error::ScheduleError;
use crate::log_changes;
use crate::models::Assignment;

/// Active task counts per owner for every day with at least one assignment.
///
/// Days inside the range with no entry have a count of zero for every owner.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceCalendar {
    /// Inclusive `(min start, max end)` over all assignments.
    pub range: Option<(NaiveDate, NaiveDate)>,
    days: BTreeMap<NaiveDate, BTreeMap<String, usize>>,
}

impl ResourceCalendar {
    /// Number of tasks `owner` has active on `date`.
    pub fn count(&self, date: NaiveDate, owner: &str) -> usize {
        self.days
            .get(&date)
            .and_then(|owners| owners.get(owner))
            .copied()
            .unwrap_or(0)
    }

    /// Owner counts for one day, sorted by owner.
    pub fn owner_counts(&self, date: NaiveDate) -> Option<&BTreeMap<String, usize>> {
        self.days.get(&date)
    }

    /// Days with any activity, in date order.
    pub fn active_days(&self) -> impl Iterator<Item = (&NaiveDate, &BTreeMap<String, usize>)> {
        self.days.iter()
    }
}

/// A day on which at least one owner exceeds the threshold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictDay {
    pub date: NaiveDate,
    /// Every owner active that day with their task count.
    pub owner_counts: BTreeMap<String, usize>,
    /// Owners whose count exceeds the threshold, sorted.
    pub overallocated: Vec<String>,
}

fn validate(assignment: &Assignment) -> Result<(), ScheduleError> {
    if assignment.owner.trim().is_empty() {
        return Err(ScheduleError::validation(
            "owner",
            format!("assignment for task {} has no owner", assignment.task_code),
        ));
    }
    if assignment.end < assignment.start {
        return Err(ScheduleError::validation(
            "end",
            format!(
                "assignment for task {} ends {} before it starts {}",
                assignment.task_code, assignment.end, assignment.start
            ),
        ));
    }
    Ok(())
}

/// Count active assignments per owner per day (`start <= day <= end`).
pub fn resource_calendar(assignments: &[Assignment]) -> Result<ResourceCalendar, ScheduleError> {
    let mut calendar = ResourceCalendar::default();

    for assignment in assignments {
        validate(assignment)?;

        let mut day = assignment.start;
        while day <= assignment.end {
            *calendar
                .days
                .entry(day)
                .or_default()
                .entry(assignment.owner.clone())
                .or_insert(0) += 1;
            match day.checked_add_days(Days::new(1)) {
                Some(next) => day = next,
                None => break,
            }
        }

        calendar.range = Some(match calendar.range {
            Some((lo, hi)) => (lo.min(assignment.start), hi.max(assignment.end)),
            None => (assignment.start, assignment.end),
        });
    }

    Ok(calendar)
}

/// Days on which some owner carries more than `threshold` active tasks,
/// sorted by date.
pub fn resource_conflicts(
    assignments: &[Assignment],
    threshold: usize,
) -> Result<Vec<ConflictDay>, ScheduleError> {
    let calendar = resource_calendar(assignments)?;

    Ok(calendar
        .active_days()
        .filter_map(|(date, counts)| {
            let overallocated: Vec<String> = counts
                .iter()
                .filter(|(_, &count)| count > threshold)
                .map(|(owner, _)| owner.clone())
                .collect();
            if overallocated.is_empty() {
                return None;
            }
            Some(ConflictDay {
                date: *date,
                owner_counts: counts.clone(),
                overallocated,
            })
        })
        .collect())
}

/// [`resource_conflicts`] at the configured `conflict_threshold`.
pub fn detect_conflicts(
    assignments: &[Assignment],
    config: &EngineConfig,
) -> Result<Vec<ConflictDay>, ScheduleError> {
    let conflicts = resource_conflicts(assignments, config.conflict_threshold)?;
    for conflict in &conflicts {
        log_changes!(
            config.verbosity,
            "  overallocated {}: {}",
            conflict.date,
            conflict.overallocated.join(", ")
        );
    }
    Ok(conflicts)
}

/// Distinct owners, sorted.
pub fn owners(assignments: &[Assignment]) -> Vec<String> {
    let mut owners: Vec<String> = assignments.iter().map(|a| a.owner.clone()).collect();
    owners.sort();
    owners.dedup();
    owners
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn assign(code: &str, owner: &str, start: NaiveDate, end: NaiveDate) -> Assignment {
        Assignment::new(code, owner, start, end)
    }

    #[test]
    fn test_calendar_counts_inclusive_range() {
        let calendar = resource_calendar(&[
            assign("1", "ann", d(2025, 1, 1), d(2025, 1, 3)),
            assign("2", "ann", d(2025, 1, 3), d(2025, 1, 4)),
            assign("3", "bob", d(2025, 1, 2), d(2025, 1, 2)),
        ])
        .unwrap();

        assert_eq!(calendar.range, Some((d(2025, 1, 1), d(2025, 1, 4))));
        assert_eq!(calendar.count(d(2025, 1, 3), "ann"), 2);
        assert_eq!(calendar.count(d(2025, 1, 4), "ann"), 1);
        assert_eq!(calendar.count(d(2025, 1, 2), "bob"), 1);
        assert_eq!(calendar.count(d(2025, 1, 5), "ann"), 0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let day = d(2025, 1, 10);
        let mut assignments: Vec<Assignment> = (0..3)
            .map(|i| assign(&i.to_string(), "ann", d(2025, 1, 8), d(2025, 1, 12)))
            .collect();
        assert!(resource_conflicts(&assignments, 3).unwrap().is_empty());

        assignments.push(assign("3", "ann", day, day));
        assignments.push(assign("4", "bob", day, day));
        let conflicts = resource_conflicts(&assignments, 3).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].date, day);
        assert_eq!(conflicts[0].owner_counts.get("ann"), Some(&4));
        assert_eq!(conflicts[0].owner_counts.get("bob"), Some(&1));
        assert_eq!(conflicts[0].overallocated, vec!["ann"]);
    }

    #[test]
    fn test_conflicts_sorted_by_date() {
        let assignments = vec![
            assign("1", "ann", d(2025, 2, 1), d(2025, 2, 2)),
            assign("2", "ann", d(2025, 1, 1), d(2025, 2, 2)),
        ];
        let conflicts = resource_conflicts(&assignments, 1).unwrap();
        let dates: Vec<NaiveDate> = conflicts.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![d(2025, 2, 1), d(2025, 2, 2)]);
    }

    #[test]
    fn test_detect_conflicts_reads_config_threshold() {
        let day = d(2025, 1, 10);
        let assignments: Vec<Assignment> =
            (0..3).map(|i| assign(&i.to_string(), "ann", day, day)).collect();

        assert!(detect_conflicts(&assignments, &EngineConfig::default())
            .unwrap()
            .is_empty());

        let strict = EngineConfig {
            conflict_threshold: 2,
            ..EngineConfig::default()
        };
        let conflicts = detect_conflicts(&assignments, &strict).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].overallocated, vec!["ann"]);
    }

    #[test]
    fn test_invalid_assignment() {
        let inverted = [assign("1", "ann", d(2025, 1, 5), d(2025, 1, 1))];
        assert!(matches!(
            resource_calendar(&inverted),
            Err(ScheduleError::Validation { ref field, .. }) if field == "end"
        ));
        let unowned = [assign("1", " ", d(2025, 1, 1), d(2025, 1, 1))];
        assert!(resource_conflicts(&unowned, 3).is_err());
    }

    #[test]
    fn test_owners_sorted_distinct() {
        let day = d(2025, 1, 1);
        let list = owners(&[
            assign("1", "cy", day, day),
            assign("2", "ann", day, day),
            assign("3", "cy", day, day),
        ]);
        assert_eq!(list, vec!["ann", "cy"]);
    }
}
