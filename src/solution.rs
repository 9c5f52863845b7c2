// Baseline decision service: first stored location in the request's
// region/city/postal code, with its corporation. Used as the harness
// target when no real matcher is running.

use crate::entities::{Corporation, Location};
use crate::match_rate::MerchantRequest;
use crate::store::RecordStore;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInfo {
    pub id: Uuid,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporationInfo {
    pub id: Uuid,
    pub legal_name: Option<String>,
    pub doing_business_as: Option<String>,
}

/// Body of `POST /solution/`. A section is `null` when nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolutionResponse {
    pub location: Option<LocationInfo>,
    pub corporation: Option<CorporationInfo>,
}

impl From<&Location> for LocationInfo {
    fn from(location: &Location) -> Self {
        LocationInfo {
            id: location.id,
            name: location.name.clone(),
        }
    }
}

impl From<Corporation> for CorporationInfo {
    fn from(corporation: Corporation) -> Self {
        CorporationInfo {
            id: corporation.id,
            legal_name: corporation.legal_name,
            doing_business_as: corporation.doing_business_as,
        }
    }
}

pub fn propose_match<S: RecordStore + ?Sized>(
    store: &S,
    request: &MerchantRequest,
) -> Result<SolutionResponse> {
    let candidates = store.locations_in_area(
        request.region.as_deref(),
        request.city.as_deref(),
        request.postal_code.as_deref(),
    )?;
    info!(candidates = candidates.len(), merchant = ?request.merchant_name, "Proposing match");

    let Some(location) = candidates.first() else {
        return Ok(SolutionResponse::default());
    };

    let corporation = store.corporation_by_id(location.corporation_id)?;
    Ok(SolutionResponse {
        location: Some(location.into()),
        corporation: corporation.map(CorporationInfo::from),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn request(region: &str, city: &str, postal_code: &str) -> MerchantRequest {
        MerchantRequest {
            merchant_name: Some("Walgreens".to_string()),
            address: None,
            city: Some(city.to_string()),
            region: Some(region.to_string()),
            postal_code: Some(postal_code.to_string()),
        }
    }

    #[test]
    fn test_first_location_in_area() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let corp = Corporation::new(
            Uuid::new_v4(),
            Some("Walgreen Co.".to_string()),
            Some("Walgreens".to_string()),
            None,
        );
        store.insert_corporation(&corp).unwrap();

        let mut first = Location::new(Uuid::new_v4(), corp.id).with_site("Walgreens", "Austin", "TX");
        first.postal_code = Some("78701".to_string());
        let mut second = first.clone();
        second.id = Uuid::new_v4();
        store.insert_location(&first).unwrap();
        store.insert_location(&second).unwrap();

        let response = propose_match(&store, &request("TX", "Austin", "78701")).unwrap();

        assert_eq!(response.location.as_ref().map(|l| l.id), Some(first.id));
        assert_eq!(response.corporation.map(|c| c.id), Some(corp.id));
    }

    #[test]
    fn test_no_candidates_gives_null_sections() {
        let store = SqliteStore::open_in_memory().unwrap();
        let response = propose_match(&store, &request("TX", "Austin", "78701")).unwrap();

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body, serde_json::json!({"location": null, "corporation": null}));
    }
}
