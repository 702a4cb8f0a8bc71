//! In-process store for tests. Mirrors the Postgres queries closely enough
//! to drive the web layer without a database.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use incidents_common::{
    AddressDirectory, AddressSummary, AuditEntry, AuditLog, AddressSort, BusinessLicense,
    FireIncident, IncidentError, IncidentSource, Page, PageRequest, PoliceIncident, SortOrder,
    User, UserStore,
};

#[derive(Default)]
struct Tables {
    fire: Vec<FireIncident>,
    police: Vec<PoliceIncident>,
    businesses: Vec<BusinessLicense>,
    summaries: Vec<AddressSummary>,
    users: Vec<User>,
    audit: Vec<AuditEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_fire(&self, incident: FireIncident) {
        self.tables().fire.push(incident);
    }

    pub fn insert_police(&self, incident: PoliceIncident) {
        self.tables().police.push(incident);
    }

    pub fn insert_business(&self, license: BusinessLicense) {
        self.tables().businesses.push(license);
    }

    pub fn insert_summary(&self, summary: AddressSummary) {
        self.tables().summaries.push(summary);
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.tables().audit.clone()
    }

    pub fn users(&self) -> Vec<User> {
        self.tables().users.clone()
    }
}

#[async_trait]
impl IncidentSource for MemoryStore {
    async fn fire_incidents_at(&self, address: &str) -> Result<Vec<FireIncident>, IncidentError> {
        Ok(self
            .tables()
            .fire
            .iter()
            .filter(|i| i.incident_address == address)
            .cloned()
            .collect())
    }

    async fn police_incidents_at(
        &self,
        address: &str,
    ) -> Result<Vec<PoliceIncident>, IncidentError> {
        Ok(self
            .tables()
            .police
            .iter()
            .filter(|i| i.incident_address == address)
            .cloned()
            .collect())
    }

    async fn businesses_at(&self, address: &str) -> Result<Vec<BusinessLicense>, IncidentError> {
        Ok(self
            .tables()
            .businesses
            .iter()
            .filter(|b| b.business_address == address)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, IncidentError> {
        Ok(self.tables().users.iter().find(|u| u.id == id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, IncidentError> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, name: &str, email: &str) -> Result<User, IncidentError> {
        let mut tables = self.tables();
        if let Some(existing) = tables.users.iter().find(|u| u.email == email) {
            return Ok(existing.clone());
        }
        let user = User {
            id: tables.users.len() as i64 + 1,
            name: name.to_string(),
            email: email.to_string(),
            date_created: Utc::now(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl AuditLog for MemoryStore {
    async fn record(&self, entry: AuditEntry) -> Result<(), IncidentError> {
        self.tables().audit.push(entry);
        Ok(())
    }
}

#[async_trait]
impl AddressDirectory for MemoryStore {
    async fn list_addresses(
        &self,
        request: PageRequest,
    ) -> Result<Page<AddressSummary>, IncidentError> {
        let mut rows = self.tables().summaries.clone();
        rows.sort_by(|a, b| {
            let primary = match request.sort {
                AddressSort::Address => a.address.cmp(&b.address),
                AddressSort::FireCount => a.fire_count.cmp(&b.fire_count),
                AddressSort::PoliceCount => a.police_count.cmp(&b.police_count),
            };
            let primary = match request.order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| a.address.cmp(&b.address))
        });

        let total = rows.len() as u64;
        let items = rows
            .into_iter()
            .skip(request.offset() as usize)
            .take(request.per_page as usize)
            .collect();

        Ok(Page {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
        })
    }
}
