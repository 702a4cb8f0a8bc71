use async_trait::async_trait;

use crate::error::IncidentError;
use crate::types::{
    AddressSummary, AuditEntry, BusinessLicense, FireIncident, Page, PageRequest, PoliceIncident,
    User,
};

/// Address-keyed reads over the incident tables. `address` arrives
/// already upper-cased.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    async fn fire_incidents_at(&self, address: &str) -> Result<Vec<FireIncident>, IncidentError>;
    async fn police_incidents_at(&self, address: &str)
        -> Result<Vec<PoliceIncident>, IncidentError>;
    async fn businesses_at(&self, address: &str) -> Result<Vec<BusinessLicense>, IncidentError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user_by_id(&self, id: i64) -> Result<Option<User>, IncidentError>;
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, IncidentError>;
    /// Insert a user, or return the existing row if the email is taken.
    async fn create_user(&self, name: &str, email: &str) -> Result<User, IncidentError>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), IncidentError>;
}

#[async_trait]
pub trait AddressDirectory: Send + Sync {
    async fn list_addresses(
        &self,
        request: PageRequest,
    ) -> Result<Page<AddressSummary>, IncidentError>;
}
