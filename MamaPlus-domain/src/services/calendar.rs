//! Standard antenatal consultation calendar
//!
//! Eight appointments are targeted at fixed pregnancy weeks. Dates are
//! derived from the first appointment and the pregnancy week at that date.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use mama_plus_data::models::CpnStatut;

/// Target pregnancy week of each appointment, CPN1 first
pub const CPN_TARGET_WEEKS: [u32; 8] = [12, 16, 20, 24, 28, 32, 36, 38];

/// Largest number of appointments in a calendar
pub const MAX_CPN: u32 = CPN_TARGET_WEEKS.len() as u32;

/// One appointment proposed by [`plan_calendar`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCpn {
    pub numero_cpn: u32,
    pub date: NaiveDate,
    pub semaine_grossesse: u32,
    pub statut: CpnStatut,
}

/// Plan up to `count` appointments.
///
/// CPN1 is always kept at `first_date` and is `complete` when that day is
/// before `today`. Later appointments are kept only when they fall on
/// `today` or after, as `planifie`. `None` when a date falls outside the
/// calendar range.
pub fn plan_calendar(
    first_date: NaiveDate,
    week_at_first: u32,
    count: u32,
    today: NaiveDate,
) -> Option<Vec<PlannedCpn>> {
    let pregnancy_start =
        first_date.checked_sub_signed(Duration::days(i64::from(week_at_first.max(1) - 1) * 7))?;

    let mut plan = Vec::new();
    for (index, &week) in CPN_TARGET_WEEKS.iter().take(count.min(MAX_CPN) as usize).enumerate() {
        let numero_cpn = index as u32 + 1;
        let date = if numero_cpn == 1 {
            first_date
        } else {
            pregnancy_start.checked_add_signed(Duration::days(i64::from(week - 1) * 7))?
        };

        if numero_cpn != 1 && date < today {
            continue;
        }

        let statut = if numero_cpn == 1 && date < today {
            CpnStatut::Complete
        } else {
            CpnStatut::Planifie
        };

        plan.push(PlannedCpn {
            numero_cpn,
            date,
            semaine_grossesse: week,
            statut,
        });
    }
    Some(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_full_calendar_from_week_twelve() {
        let first = date(2030, 3, 1);
        let plan = plan_calendar(first, 12, 8, date(2030, 2, 1)).unwrap();

        assert_eq!(plan.len(), 8);
        assert_eq!(plan[0].date, first);
        assert_eq!(plan[0].statut, CpnStatut::Planifie);
        // CPN2 lands four weeks after CPN1 when CPN1 is at week 12.
        assert_eq!(plan[1].date, first + Duration::days(28));
        // CPN8 is at week 38, i.e. 26 weeks after week 12.
        assert_eq!(plan[7].date, first + Duration::days(26 * 7));
        assert_eq!(
            plan.iter().map(|c| c.semaine_grossesse).collect::<Vec<_>>(),
            CPN_TARGET_WEEKS.to_vec()
        );
    }

    #[test]
    fn test_dates_follow_pregnancy_start() {
        // Week 10 at first visit: pregnancy started 63 days earlier.
        let first = date(2030, 1, 1);
        let plan = plan_calendar(first, 10, 4, date(2029, 12, 1)).unwrap();
        let start = first - Duration::days(63);

        assert_eq!(plan.len(), 4);
        assert_eq!(plan[0].date, first);
        assert_eq!(plan[1].date, start + Duration::days(15 * 7));
        assert_eq!(plan[3].date, start + Duration::days(23 * 7));
    }

    #[test]
    fn test_past_first_visit_is_complete_and_past_followups_are_dropped() {
        let first = date(2030, 1, 1);
        // Today is just after CPN3 (week 20 = first + 56 days).
        let today = first + Duration::days(60);
        let plan = plan_calendar(first, 12, 8, today).unwrap();

        assert_eq!(plan[0].numero_cpn, 1);
        assert_eq!(plan[0].statut, CpnStatut::Complete);
        assert_eq!(plan[1].numero_cpn, 4);
        assert!(plan[1..].iter().all(|c| c.statut == CpnStatut::Planifie && c.date >= today));
        assert_eq!(plan.len(), 6);
    }

    #[test]
    fn test_appointment_today_is_kept() {
        let first = date(2030, 1, 1);
        let today = first + Duration::days(28);
        let plan = plan_calendar(first, 12, 2, today).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].date, today);
        assert_eq!(plan[1].statut, CpnStatut::Planifie);
    }

    #[test]
    fn test_count_is_capped_at_eight() {
        let plan = plan_calendar(date(2030, 1, 1), 12, 20, date(2029, 1, 1)).unwrap();
        assert_eq!(plan.len(), 8);
        assert_eq!(plan_calendar(date(2030, 1, 1), 12, 0, date(2029, 1, 1)), Some(Vec::new()));
    }

    #[test]
    fn test_dates_outside_the_calendar_range() {
        // Week 40 at the earliest date: the pregnancy start is not representable.
        assert_eq!(plan_calendar(NaiveDate::MIN, 40, 8, NaiveDate::MIN), None);
        // Follow-ups after the latest date are not representable.
        assert_eq!(plan_calendar(NaiveDate::MAX, 12, 8, date(2030, 1, 1)), None);
        // A single visit needs no derived date.
        let plan = plan_calendar(NaiveDate::MAX, 12, 1, date(2030, 1, 1)).unwrap();
        assert_eq!(plan[0].date, NaiveDate::MAX);
    }
}
