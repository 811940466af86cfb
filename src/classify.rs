use chrono::NaiveDate;

use crate::error::CensusError;
use crate::models::{Bucket, BucketCounts, MemberRecord};

/// Days per counted year. Ages are whole 365-day spans, leap days ignored.
const DAYS_PER_YEAR: i64 = 365;

/// Age in whole 365-day years on the reference date, or `None` when the
/// member is born after it.
pub fn age_on(birth_date: NaiveDate, reference_date: NaiveDate) -> Option<u32> {
    let days = (reference_date - birth_date).num_days();
    if days < 0 {
        return None;
    }
    u32::try_from(days / DAYS_PER_YEAR).ok()
}

/// Fails without partial counts when a birth date lies after the reference date.
pub fn classify(
    roster: &[MemberRecord],
    reference_date: NaiveDate,
) -> Result<BucketCounts, CensusError> {
    let mut counts = BucketCounts::default();

    for member in roster {
        if !member.ensembles.is_active() {
            continue;
        }

        let age = match member.birth_date {
            Some(birth_date) => Some(age_on(birth_date, reference_date).ok_or(
                CensusError::BirthAfterCutoff {
                    row: member.row,
                    birth_date,
                    reference_date,
                },
            )?),
            None => None,
        };

        for bucket in Bucket::ALL {
            if bucket.admits(age) {
                counts.increment(bucket, member.gender);
            }
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::{EnsembleMembership, Gender};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn cutoff() -> NaiveDate {
        date(2025, 1, 1)
    }

    fn member(birth_date: Option<NaiveDate>, gender: Gender, active: bool) -> MemberRecord {
        MemberRecord {
            row: 2,
            birth_date,
            gender,
            ensembles: EnsembleMembership {
                main: active,
                ..EnsembleMembership::default()
            },
            primary_function: false,
            contact: HashMap::new(),
        }
    }

    fn assert_consistent(counts: &BucketCounts) {
        for bucket in Bucket::ALL {
            let sum: u32 = Gender::ALL.iter().map(|&g| counts.get(bucket, g)).sum();
            assert_eq!(counts.total(bucket), sum, "{}", bucket.label());
        }
    }

    #[test]
    fn age_uses_whole_365_day_years() {
        assert_eq!(age_on(date(2010, 5, 1), cutoff()), Some(14));
        assert_eq!(age_on(date(2007, 1, 1), cutoff()), Some(18));
        assert_eq!(age_on(cutoff(), cutoff()), Some(0));
        assert_eq!(age_on(date(2025, 1, 2), cutoff()), None);
    }

    #[test]
    fn age_ignores_leap_days() {
        // 18 calendar years contain 5 leap days, so 365-day years run ahead.
        assert_eq!(age_on(date(2007, 1, 6), cutoff()), Some(18));
        assert_eq!(age_on(date(2007, 1, 7), cutoff()), Some(17));
    }

    #[test]
    fn worked_example_counts_a_fourteen_year_old_man() {
        let roster = vec![member(Some(date(2010, 5, 1)), Gender::Man, true)];
        let counts = classify(&roster, cutoff()).unwrap();

        for bucket in [Bucket::SchoolAge, Bucket::Under18, Bucket::Under27, Bucket::Total] {
            assert_eq!(counts.get(bucket, Gender::Man), 1, "{}", bucket.label());
            assert_eq!(counts.total(bucket), 1);
        }
        assert_eq!(counts.total(Bucket::From18), 0);
        assert_eq!(counts.total(Bucket::From27), 0);
        assert_consistent(&counts);
    }

    #[test]
    fn eighteen_is_adult_but_under_27() {
        let roster = vec![member(Some(date(2007, 1, 1)), Gender::Woman, true)];
        let counts = classify(&roster, cutoff()).unwrap();

        assert_eq!(counts.get(Bucket::From18, Gender::Woman), 1);
        assert_eq!(counts.get(Bucket::Under27, Gender::Woman), 1);
        assert_eq!(counts.total(Bucket::Under18), 0);
        assert_eq!(counts.total(Bucket::SchoolAge), 0);
    }

    #[test]
    fn inactive_members_count_nowhere() {
        let roster = vec![
            member(Some(date(1980, 1, 1)), Gender::Man, false),
            member(None, Gender::Woman, false),
        ];
        let counts = classify(&roster, cutoff()).unwrap();
        assert_eq!(counts, BucketCounts::default());
    }

    #[test]
    fn unknown_age_counts_only_in_total() {
        let roster = vec![member(None, Gender::Diverse, true)];
        let counts = classify(&roster, cutoff()).unwrap();

        assert_eq!(counts.get(Bucket::Total, Gender::Diverse), 1);
        for bucket in &Bucket::ALL[..5] {
            assert_eq!(counts.total(*bucket), 0, "{}", bucket.label());
        }
    }

    #[test]
    fn any_ensemble_flag_makes_a_member_active() {
        let mut senior = member(Some(date(1950, 6, 1)), Gender::Woman, false);
        senior.ensembles.senior = true;
        let mut pupil = member(Some(date(2016, 6, 1)), Gender::Man, false);
        pupil.ensembles.early_education = true;

        let counts = classify(&[senior, pupil], cutoff()).unwrap();
        assert_eq!(counts.get(Bucket::From27, Gender::Woman), 1);
        assert_eq!(counts.get(Bucket::SchoolAge, Gender::Man), 1);
        assert_eq!(counts.total(Bucket::Total), 2);
        assert_consistent(&counts);
    }

    #[test]
    fn mixed_roster_totals_stay_consistent() {
        let roster = vec![
            member(Some(date(2018, 3, 1)), Gender::Woman, true),
            member(Some(date(2012, 3, 1)), Gender::Man, true),
            member(Some(date(2003, 3, 1)), Gender::Diverse, true),
            member(Some(date(1990, 3, 1)), Gender::Woman, true),
            member(Some(date(1970, 3, 1)), Gender::Man, false),
        ];
        let counts = classify(&roster, cutoff()).unwrap();

        assert_eq!(counts.total(Bucket::Total), 4);
        assert_eq!(counts.total(Bucket::Under18), 2);
        assert_eq!(counts.total(Bucket::SchoolAge), 1);
        assert_eq!(counts.total(Bucket::Under27), 3);
        assert_eq!(counts.total(Bucket::From18), 2);
        assert_eq!(counts.total(Bucket::From27), 1);
        assert_consistent(&counts);
    }

    #[test]
    fn birth_after_cutoff_fails_the_roster() {
        let roster = vec![
            member(Some(date(2000, 1, 1)), Gender::Man, true),
            member(Some(date(2026, 1, 1)), Gender::Man, true),
        ];
        let error = classify(&roster, cutoff()).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Birth date 2026-01-01 in roster row 2 lies after the reference date 2025-01-01"
        );
    }
}
