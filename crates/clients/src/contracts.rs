//! Client of the contract / labor-agreement configuration service.
//!
//! | Call | Response |
//! |---|---|
//! | `GET /api/employees?year=` | `{"employees": [user_id]}` |
//! | `GET /api/employees/{user_id}/contracts?year=` | `{"contracts": [contract]}` |
//! | `GET /api/agreements/{agreement_id}/versions` | `{"versions": [version]}` |

use async_trait::async_trait;
use reqwest::Client;
use saldo_core::accrual::{AgreementVersion, ContractDirectory, DirectoryError, EmployeeContract};
use saldo_shared::types::{AgreementId, UserId};
use serde::Deserialize;

use crate::transport::{get_json, normalize_base};

#[derive(Debug, Deserialize)]
struct EmployeesResponse {
    employees: Vec<UserId>,
}

#[derive(Debug, Deserialize)]
struct ContractsResponse {
    contracts: Vec<EmployeeContract>,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    versions: Vec<AgreementVersion>,
}

/// [`ContractDirectory`] backed by the contract service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpContractDirectory {
    client: Client,
    base_url: String,
}

impl HttpContractDirectory {
    /// Creates a directory calling `base_url` through `client`.
    #[must_use]
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: normalize_base(base_url),
        }
    }

    /// Service base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ContractDirectory for HttpContractDirectory {
    async fn employees(&self, year: i32) -> Result<Vec<UserId>, DirectoryError> {
        let url = format!("{}/api/employees", self.base_url);
        let body: EmployeesResponse = get_json(&self.client, &url, &[("year", year.to_string())]).await?;
        Ok(body.employees)
    }

    async fn contracts(&self, user_id: UserId, year: i32) -> Result<Vec<EmployeeContract>, DirectoryError> {
        let url = format!("{}/api/employees/{user_id}/contracts", self.base_url);
        let body: ContractsResponse = get_json(&self.client, &url, &[("year", year.to_string())]).await?;
        // Contracts of other employees are never applied to this one.
        Ok(body
            .contracts
            .into_iter()
            .filter(|c| c.user_id == user_id)
            .collect())
    }

    async fn agreement_versions(&self, agreement_id: AgreementId) -> Result<Vec<AgreementVersion>, DirectoryError> {
        let url = format!("{}/api/agreements/{agreement_id}/versions", self.base_url);
        let body: VersionsResponse = get_json(&self.client, &url, &[]).await?;
        Ok(body.versions)
    }
}
