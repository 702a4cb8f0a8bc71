use serde::Serialize;

use incidents_common::{
    count_incidents_by_timeframes, fetch_incidents_at_address, top_incident_reasons_by_timeframes,
    Clock, IncidentError, IncidentSource, IncidentsAtAddress, TimeframeCounts, TopReasons,
    DEFAULT_TIMEFRAMES,
};

/// Everything the address page and its JSON twin show.
#[derive(Debug, Clone, Serialize)]
pub struct AddressReport {
    pub address: String,
    pub timeframes: Vec<u32>,
    pub counts: TimeframeCounts,
    pub top_reasons: TopReasons,
    pub business_names: Vec<String>,
    pub business_types: Vec<String>,
}

impl AddressReport {
    pub fn build(
        address: &str,
        incidents: &IncidentsAtAddress,
        timeframes: &[u32],
        clock: &dyn Clock,
    ) -> Result<Self, IncidentError> {
        Ok(Self {
            address: address.to_string(),
            timeframes: timeframes.to_vec(),
            counts: count_incidents_by_timeframes(incidents, timeframes, clock)?,
            top_reasons: top_incident_reasons_by_timeframes(incidents, timeframes, clock)?,
            business_names: incidents.business_names(),
            business_types: incidents.business_types(),
        })
    }
}

/// Fetch and summarize an address. `None` when neither fire nor police has
/// anything on record there, whatever the business licenses say.
pub async fn load_address_report(
    source: &dyn IncidentSource,
    clock: &dyn Clock,
    address: &str,
) -> Result<Option<AddressReport>, IncidentError> {
    let incidents = fetch_incidents_at_address(source, address).await?;
    if !incidents.has_incidents() {
        return Ok(None);
    }

    AddressReport::build(address, &incidents, &DEFAULT_TIMEFRAMES, clock).map(Some)
}
