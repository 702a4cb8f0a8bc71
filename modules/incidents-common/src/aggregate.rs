//! Address lookup and the time-windowed counting behind the address page.
//!
//! Windows are trailing day counts measured back from the clock's date. An
//! incident belongs to a window when its calendar date is strictly after
//! `today - days`, so the windows overlap: a five-day-old call is counted in
//! every window of seven days or more.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::clock::Clock;
use crate::error::IncidentError;
use crate::source::IncidentSource;
use crate::types::{
    ByCategory, IncidentRef, IncidentsAtAddress, ReasonCount, TOP_REASON_LIMIT,
};

pub type TimeframeCounts = ByCategory<BTreeMap<u32, u64>>;
pub type TopReasons = ByCategory<BTreeMap<u32, Vec<ReasonCount>>>;

/// Fetch fire incidents, police calls and business licenses recorded at
/// `address`. Matching is exact on the upper-cased address. An unknown
/// address yields three empty lists.
pub async fn fetch_incidents_at_address(
    source: &dyn IncidentSource,
    address: &str,
) -> Result<IncidentsAtAddress, IncidentError> {
    let address = address.to_uppercase();

    let (fire, police, businesses) = futures::try_join!(
        source.fire_incidents_at(&address),
        source.police_incidents_at(&address),
        source.businesses_at(&address),
    )?;

    debug!(
        address = %address,
        fire = fire.len(),
        police = police.len(),
        businesses = businesses.len(),
        "Fetched incidents at address"
    );

    Ok(IncidentsAtAddress {
        fire,
        police,
        businesses,
    })
}

/// Count incidents per category per window. Every requested window appears
/// in the result, zero when nothing falls inside it.
pub fn count_incidents_by_timeframes(
    incidents: &IncidentsAtAddress,
    timeframes: &[u32],
    clock: &dyn Clock,
) -> Result<TimeframeCounts, IncidentError> {
    let windows = windows_for(timeframes, clock.today());

    ByCategory::try_from_fn(|category| {
        let mut counts: BTreeMap<u32, u64> = timeframes.iter().map(|&days| (days, 0)).collect();

        for incident in incidents.incidents(category) {
            let date = incident_date(&incident)?;
            for window in &windows {
                if window.contains(date) {
                    *counts.entry(window.days).or_insert(0) += 1;
                }
            }
        }

        Ok(counts)
    })
}

/// The most frequent reasons per category per window, at most
/// [`TOP_REASON_LIMIT`] each.
///
/// Ordered by count, highest first. Reasons with equal counts keep the order
/// in which they were first encountered in the incident list.
pub fn top_incident_reasons_by_timeframes(
    incidents: &IncidentsAtAddress,
    timeframes: &[u32],
    clock: &dyn Clock,
) -> Result<TopReasons, IncidentError> {
    let windows = windows_for(timeframes, clock.today());

    ByCategory::try_from_fn(|category| {
        let mut tables: BTreeMap<u32, ReasonTable<'_>> = timeframes
            .iter()
            .map(|&days| (days, ReasonTable::default()))
            .collect();

        for incident in incidents.incidents(category) {
            let date = incident_date(&incident)?;
            let reason = incident_reason(&incident)?;
            for window in &windows {
                if window.contains(date) {
                    tables.entry(window.days).or_default().bump(reason);
                }
            }
        }

        Ok(tables
            .into_iter()
            .map(|(days, table)| (days, table.top(TOP_REASON_LIMIT)))
            .collect())
    })
}

// --- Helpers ---

struct Window {
    days: u32,
    start: NaiveDate,
}

impl Window {
    fn contains(&self, date: NaiveDate) -> bool {
        date > self.start
    }
}

/// Start dates are computed once per call, not once per incident. Repeated
/// day counts collapse to one window.
fn windows_for(timeframes: &[u32], today: NaiveDate) -> Vec<Window> {
    timeframes
        .iter()
        .copied()
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .map(|days| Window {
            days,
            start: today
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MIN),
        })
        .collect()
}

fn incident_date(incident: &IncidentRef<'_>) -> Result<NaiveDate, IncidentError> {
    incident
        .occurred_at()
        .map(|ts| ts.date_naive())
        .ok_or_else(|| missing_field(incident, incident.date_field()))
}

fn incident_reason<'a>(incident: &IncidentRef<'a>) -> Result<&'a str, IncidentError> {
    incident
        .reason()
        .ok_or_else(|| missing_field(incident, incident.reason_field()))
}

fn missing_field(incident: &IncidentRef<'_>, field: &str) -> IncidentError {
    IncidentError::Validation(format!(
        "{} incident {} has no {field}",
        incident.category(),
        incident.id()
    ))
}

/// Frequency table that remembers first-seen order.
#[derive(Default)]
struct ReasonTable<'a> {
    index: HashMap<&'a str, usize>,
    entries: Vec<(&'a str, u64)>,
}

impl<'a> ReasonTable<'a> {
    fn bump(&mut self, reason: &'a str) {
        match self.index.get(reason) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(reason, self.entries.len());
                self.entries.push((reason, 1));
            }
        }
    }

    fn top(mut self, limit: usize) -> Vec<ReasonCount> {
        // Stable sort: ties stay in first-seen order.
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries
            .into_iter()
            .take(limit)
            .map(|(reason, count)| ReasonCount {
                reason: reason.to_string(),
                count,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::types::{
        BusinessLicense, FireIncident, IncidentCategory, PoliceIncident, DEFAULT_TIMEFRAMES,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn clock() -> FixedClock {
        FixedClock(today())
    }

    fn days_ago(days: u64) -> DateTime<Utc> {
        let date = today().checked_sub_days(Days::new(days)).unwrap();
        Utc.from_utc_datetime(&date.and_hms_opt(14, 30, 0).unwrap())
    }

    fn fire(id: i64, days: u64, reason: &str) -> FireIncident {
        FireIncident {
            id,
            incident_address: "123 MAIN ST".into(),
            alarm_datetime: Some(days_ago(days)),
            actual_nfirs_incident_type_description: Some(reason.into()),
        }
    }

    fn police(id: i64, days: u64, reason: &str) -> PoliceIncident {
        PoliceIncident {
            id,
            incident_address: "123 MAIN ST".into(),
            call_datetime: Some(days_ago(days)),
            final_cad_call_type_description: Some(reason.into()),
        }
    }

    fn reasons(list: &[ReasonCount]) -> Vec<(&str, u64)> {
        list.iter().map(|r| (r.reason.as_str(), r.count)).collect()
    }

    #[test]
    fn counts_match_worked_example() {
        let at = IncidentsAtAddress {
            fire: vec![fire(1, 5, "A"), fire(2, 40, "B")],
            ..Default::default()
        };

        let counts = count_incidents_by_timeframes(&at, &[7, 30, 90], &clock()).unwrap();
        assert_eq!(counts.fire, BTreeMap::from([(7, 1), (30, 1), (90, 2)]));
        assert_eq!(counts.police, BTreeMap::from([(7, 0), (30, 0), (90, 0)]));

        let top = top_incident_reasons_by_timeframes(&at, &[7, 30, 90], &clock()).unwrap();
        assert_eq!(reasons(&top.fire[&7]), vec![("A", 1)]);
        assert_eq!(reasons(&top.fire[&90]), vec![("A", 1), ("B", 1)]);
    }

    #[test]
    fn empty_input_yields_zeroes_and_empty_lists() {
        let at = IncidentsAtAddress::default();

        let counts = count_incidents_by_timeframes(&at, &[7, 30], &clock()).unwrap();
        assert_eq!(counts.fire, BTreeMap::from([(7, 0), (30, 0)]));
        assert_eq!(counts.police, BTreeMap::from([(7, 0), (30, 0)]));

        let top = top_incident_reasons_by_timeframes(&at, &[7, 30], &clock()).unwrap();
        assert!(top.fire[&7].is_empty());
        assert!(top.fire[&30].is_empty());
        assert!(top.police[&7].is_empty());
    }

    #[test]
    fn window_start_is_exclusive() {
        let at = IncidentsAtAddress {
            police: vec![police(1, 7, "Traffic Stop"), police(2, 6, "Traffic Stop")],
            ..Default::default()
        };
        let counts = count_incidents_by_timeframes(&at, &[7], &clock()).unwrap();
        assert_eq!(counts.police[&7], 1);
    }

    #[test]
    fn time_of_day_does_not_matter() {
        let late = Utc.from_utc_datetime(
            &today()
                .checked_sub_days(Days::new(7))
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap(),
        );
        let at = IncidentsAtAddress {
            fire: vec![FireIncident {
                alarm_datetime: Some(late),
                ..fire(1, 0, "Chest Pain")
            }],
            ..Default::default()
        };
        let counts = count_incidents_by_timeframes(&at, &[7, 8], &clock()).unwrap();
        assert_eq!(counts.fire[&7], 0);
        assert_eq!(counts.fire[&8], 1);
    }

    #[test]
    fn wider_windows_never_count_less() {
        let at = IncidentsAtAddress {
            fire: (0..50).map(|i| fire(i, (i * 9) as u64, "Fall")).collect(),
            police: (0..50).map(|i| police(i, (i * 11) as u64, "Battery")).collect(),
            ..Default::default()
        };
        let counts = count_incidents_by_timeframes(&at, &DEFAULT_TIMEFRAMES, &clock()).unwrap();

        for category in IncidentCategory::ALL {
            let per_window: Vec<u64> = counts.get(category).values().copied().collect();
            assert!(per_window.windows(2).all(|w| w[0] <= w[1]), "{category}: {per_window:?}");
        }
    }

    #[test]
    fn top_reason_totals_bounded_by_counts() {
        let kinds = ["A", "B", "C", "D", "E", "F", "G"];
        let at = IncidentsAtAddress {
            fire: (0..70)
                .map(|i| fire(i, (i * 5) as u64, kinds[(i % 7) as usize]))
                .collect(),
            police: (0..12)
                .map(|i| police(i, (i * 20) as u64, kinds[(i % 3) as usize]))
                .collect(),
            ..Default::default()
        };
        let counts = count_incidents_by_timeframes(&at, &DEFAULT_TIMEFRAMES, &clock()).unwrap();
        let top = top_incident_reasons_by_timeframes(&at, &DEFAULT_TIMEFRAMES, &clock()).unwrap();

        for category in IncidentCategory::ALL {
            for days in DEFAULT_TIMEFRAMES {
                let listed: u64 = top.get(category)[&days].iter().map(|r| r.count).sum();
                let total = counts.get(category)[&days];
                assert!(listed <= total);
                if top.get(category)[&days].len() < TOP_REASON_LIMIT {
                    assert_eq!(listed, total, "{category} {days}");
                }
            }
        }
        // Only three police reasons exist, so the police lists are exhaustive.
        assert_eq!(top.police[&365].len(), 3);
    }

    #[test]
    fn keeps_five_most_frequent() {
        let mut fire_list = Vec::new();
        let mut id = 0;
        for (reason, n) in [("F", 1), ("E", 2), ("D", 3), ("C", 4), ("B", 5), ("A", 6)] {
            for _ in 0..n {
                id += 1;
                fire_list.push(fire(id, 1, reason));
            }
        }
        let at = IncidentsAtAddress {
            fire: fire_list,
            ..Default::default()
        };
        let top = top_incident_reasons_by_timeframes(&at, &[30], &clock()).unwrap();
        assert_eq!(
            reasons(&top.fire[&30]),
            vec![("A", 6), ("B", 5), ("C", 4), ("D", 3), ("E", 2)]
        );
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let at = IncidentsAtAddress {
            police: vec![
                police(1, 3, "Suspicious Person"),
                police(2, 2, "Burglary Report"),
                police(3, 1, "Burglary Report"),
                police(4, 4, "Party Disturbance"),
                police(5, 5, "Suspicious Person"),
            ],
            ..Default::default()
        };
        let top = top_incident_reasons_by_timeframes(&at, &[7], &clock()).unwrap();
        assert_eq!(
            reasons(&top.police[&7]),
            vec![
                ("Suspicious Person", 2),
                ("Burglary Report", 2),
                ("Party Disturbance", 1)
            ]
        );
    }

    #[test]
    fn repeated_calls_agree() {
        let at = IncidentsAtAddress {
            fire: vec![fire(1, 2, "A"), fire(2, 2, "B"), fire(3, 100, "A")],
            police: vec![police(1, 20, "X")],
            ..Default::default()
        };
        let first = top_incident_reasons_by_timeframes(&at, &DEFAULT_TIMEFRAMES, &clock()).unwrap();
        let second =
            top_incident_reasons_by_timeframes(&at, &DEFAULT_TIMEFRAMES, &clock()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            count_incidents_by_timeframes(&at, &DEFAULT_TIMEFRAMES, &clock()).unwrap(),
            count_incidents_by_timeframes(&at, &DEFAULT_TIMEFRAMES, &clock()).unwrap()
        );
    }

    #[test]
    fn repeated_windows_count_each_incident_once() {
        let incidents = IncidentsAtAddress {
            fire: vec![fire(1, 1, "A")],
            ..Default::default()
        };

        let counts = count_incidents_by_timeframes(&incidents, &[7, 7, 30], &clock()).unwrap();
        assert_eq!(counts.fire.len(), 2);
        assert_eq!(counts.fire[&7], 1);
        assert_eq!(counts.fire[&30], 1);

        let top = top_incident_reasons_by_timeframes(&incidents, &[7, 7], &clock()).unwrap();
        assert_eq!(reasons(&top.fire[&7]), vec![("A", 1)]);
    }

    #[test]
    fn missing_date_is_rejected() {
        let at = IncidentsAtAddress {
            fire: vec![FireIncident {
                alarm_datetime: None,
                ..fire(42, 1, "A")
            }],
            ..Default::default()
        };
        let err = count_incidents_by_timeframes(&at, &[7], &clock()).unwrap_err();
        assert!(matches!(err, IncidentError::Validation(ref m) if m.contains("alarm_datetime")));
        assert!(top_incident_reasons_by_timeframes(&at, &[7], &clock()).is_err());
    }

    #[test]
    fn missing_reason_is_rejected_by_ranker() {
        let at = IncidentsAtAddress {
            police: vec![PoliceIncident {
                final_cad_call_type_description: None,
                ..police(9, 400, "X")
            }],
            ..Default::default()
        };
        // The counter doesn't read reasons.
        assert!(count_incidents_by_timeframes(&at, &[7], &clock()).is_ok());
        let err = top_incident_reasons_by_timeframes(&at, &[7], &clock()).unwrap_err();
        assert!(
            matches!(err, IncidentError::Validation(ref m) if m.contains("final_cad_call_type_description"))
        );
    }

    #[derive(Default)]
    struct RecordingSource {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl IncidentSource for RecordingSource {
        async fn fire_incidents_at(&self, address: &str) -> Result<Vec<FireIncident>, IncidentError> {
            self.seen.lock().unwrap().push(address.to_string());
            Ok(if address == "123 MAIN ST" {
                vec![fire(1, 1, "A")]
            } else {
                vec![]
            })
        }

        async fn police_incidents_at(
            &self,
            address: &str,
        ) -> Result<Vec<PoliceIncident>, IncidentError> {
            self.seen.lock().unwrap().push(address.to_string());
            Ok(vec![])
        }

        async fn businesses_at(&self, address: &str) -> Result<Vec<BusinessLicense>, IncidentError> {
            self.seen.lock().unwrap().push(address.to_string());
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn fetch_upper_cases_address() {
        let source = RecordingSource::default();
        let at = fetch_incidents_at_address(&source, "123 Main St").await.unwrap();
        assert_eq!(at.fire.len(), 1);
        assert!(at.has_incidents());
        assert!(source.seen.lock().unwrap().iter().all(|a| a == "123 MAIN ST"));
    }

    #[tokio::test]
    async fn fetch_unknown_address_is_empty_not_error() {
        let source = RecordingSource::default();
        let at = fetch_incidents_at_address(&source, "1 nowhere ln").await.unwrap();
        assert_eq!(at, IncidentsAtAddress::default());
    }
}
