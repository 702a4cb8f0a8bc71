use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trailing windows, in days, shown on the address page.
pub const DEFAULT_TIMEFRAMES: [u32; 4] = [7, 30, 90, 365];

/// How many reasons the ranker keeps per window.
pub const TOP_REASON_LIMIT: usize = 5;

// --- Records ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireIncident {
    pub id: i64,
    pub incident_address: String,
    pub alarm_datetime: Option<DateTime<Utc>>,
    pub actual_nfirs_incident_type_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoliceIncident {
    pub id: i64,
    pub incident_address: String,
    pub call_datetime: Option<DateTime<Utc>>,
    pub final_cad_call_type_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessLicense {
    pub id: i64,
    pub business_address: String,
    pub name: String,
    pub business_service_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub date_created: DateTime<Utc>,
}

/// One page access, written after the response status is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub user_id: Option<i64>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub accessed_at: DateTime<Utc>,
}

/// Precomputed per-address totals backing the browse view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressSummary {
    pub address: String,
    pub fire_count: i64,
    pub police_count: i64,
}

// --- Categories ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    Fire,
    Police,
}

impl IncidentCategory {
    pub const ALL: [IncidentCategory; 2] = [IncidentCategory::Fire, IncidentCategory::Police];

    pub fn label(&self) -> &'static str {
        match self {
            IncidentCategory::Fire => "Fire",
            IncidentCategory::Police => "Police",
        }
    }
}

impl fmt::Display for IncidentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IncidentCategory::Fire => write!(f, "fire"),
            IncidentCategory::Police => write!(f, "police"),
        }
    }
}

/// A borrowed incident of either category, exposing the date and reason
/// fields that category uses.
#[derive(Debug, Clone, Copy)]
pub enum IncidentRef<'a> {
    Fire(&'a FireIncident),
    Police(&'a PoliceIncident),
}

impl<'a> IncidentRef<'a> {
    pub fn category(&self) -> IncidentCategory {
        match self {
            IncidentRef::Fire(_) => IncidentCategory::Fire,
            IncidentRef::Police(_) => IncidentCategory::Police,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            IncidentRef::Fire(i) => i.id,
            IncidentRef::Police(i) => i.id,
        }
    }

    /// `alarm_datetime` for fire, `call_datetime` for police.
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        match self {
            IncidentRef::Fire(i) => i.alarm_datetime,
            IncidentRef::Police(i) => i.call_datetime,
        }
    }

    /// `actual_nfirs_incident_type_description` for fire,
    /// `final_cad_call_type_description` for police.
    pub fn reason(&self) -> Option<&'a str> {
        match self {
            IncidentRef::Fire(i) => i.actual_nfirs_incident_type_description.as_deref(),
            IncidentRef::Police(i) => i.final_cad_call_type_description.as_deref(),
        }
    }

    pub fn date_field(&self) -> &'static str {
        match self {
            IncidentRef::Fire(_) => "alarm_datetime",
            IncidentRef::Police(_) => "call_datetime",
        }
    }

    pub fn reason_field(&self) -> &'static str {
        match self {
            IncidentRef::Fire(_) => "actual_nfirs_incident_type_description",
            IncidentRef::Police(_) => "final_cad_call_type_description",
        }
    }
}

/// Everything recorded at one address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentsAtAddress {
    pub fire: Vec<FireIncident>,
    pub police: Vec<PoliceIncident>,
    pub businesses: Vec<BusinessLicense>,
}

impl IncidentsAtAddress {
    pub fn incidents(&self, category: IncidentCategory) -> Vec<IncidentRef<'_>> {
        match category {
            IncidentCategory::Fire => self.fire.iter().map(IncidentRef::Fire).collect(),
            IncidentCategory::Police => self.police.iter().map(IncidentRef::Police).collect(),
        }
    }

    /// Business licenses alone don't make an address known.
    pub fn has_incidents(&self) -> bool {
        !self.fire.is_empty() || !self.police.is_empty()
    }

    pub fn business_names(&self) -> Vec<String> {
        self.businesses.iter().map(|b| b.name.trim().to_string()).collect()
    }

    pub fn business_types(&self) -> Vec<String> {
        self.businesses
            .iter()
            .map(|b| b.business_service_description.trim().to_string())
            .collect()
    }
}

/// A value per incident category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByCategory<T> {
    pub fire: T,
    pub police: T,
}

impl<T> ByCategory<T> {
    pub fn get(&self, category: IncidentCategory) -> &T {
        match category {
            IncidentCategory::Fire => &self.fire,
            IncidentCategory::Police => &self.police,
        }
    }

    pub fn try_from_fn<E>(
        mut f: impl FnMut(IncidentCategory) -> Result<T, E>,
    ) -> Result<Self, E> {
        Ok(Self {
            fire: f(IncidentCategory::Fire)?,
            police: f(IncidentCategory::Police)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: String,
    pub count: u64,
}

// --- Browse ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSort {
    #[default]
    Address,
    FireCount,
    PoliceCount,
}

impl AddressSort {
    /// Column name in `address_summaries`. Only these three ever reach SQL.
    pub fn column(&self) -> &'static str {
        match self {
            AddressSort::Address => "address",
            AddressSort::FireCount => "fire_count",
            AddressSort::PoliceCount => "police_count",
        }
    }
}

impl FromStr for AddressSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "address" => Ok(AddressSort::Address),
            "fire_count" | "fire" => Ok(AddressSort::FireCount),
            "police_count" | "police" => Ok(AddressSort::PoliceCount),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn flipped(&self) -> SortOrder {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: u32,
    pub per_page: u32,
    pub sort: AddressSort,
    pub order: SortOrder,
}

impl PageRequest {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.per_page)) as u32
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.pages()
    }

    /// Page 1 always exists, even over an empty table.
    pub fn is_out_of_range(&self) -> bool {
        self.page == 0 || (self.page > 1 && self.items.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(total: u64, page: u32, items: usize) -> Page<u32> {
        Page {
            items: vec![0; items],
            page,
            per_page: 20,
            total,
        }
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(page(0, 1, 0).pages(), 0);
        assert_eq!(page(20, 1, 20).pages(), 1);
        assert_eq!(page(21, 1, 20).pages(), 2);
    }

    #[test]
    fn first_page_of_empty_table_is_in_range() {
        assert!(!page(0, 1, 0).is_out_of_range());
        assert!(page(0, 2, 0).is_out_of_range());
        assert!(page(40, 0, 0).is_out_of_range());
    }

    #[test]
    fn prev_next_flags() {
        let p = page(45, 2, 20);
        assert!(p.has_prev());
        assert!(p.has_next());
        let last = page(45, 3, 5);
        assert!(!last.has_next());
    }

    #[test]
    fn offset_is_zero_based() {
        let req = PageRequest {
            page: 3,
            per_page: 20,
            sort: AddressSort::Address,
            order: SortOrder::Asc,
        };
        assert_eq!(req.offset(), 40);
    }

    #[test]
    fn sort_keys_parse() {
        assert_eq!("fire_count".parse::<AddressSort>(), Ok(AddressSort::FireCount));
        assert_eq!("police".parse::<AddressSort>(), Ok(AddressSort::PoliceCount));
        assert!("id; DROP TABLE users".parse::<AddressSort>().is_err());
        assert_eq!("DESC".parse::<SortOrder>(), Ok(SortOrder::Desc));
    }

    #[test]
    fn business_fields_are_trimmed() {
        let at = IncidentsAtAddress {
            businesses: vec![BusinessLicense {
                id: 1,
                business_address: "123 MAIN ST".into(),
                name: "  Corner Laundry ".into(),
                business_service_description: "Laundromat\n".into(),
            }],
            ..Default::default()
        };
        assert_eq!(at.business_names(), vec!["Corner Laundry"]);
        assert_eq!(at.business_types(), vec!["Laundromat"]);
        assert!(!at.has_incidents());
    }
}
