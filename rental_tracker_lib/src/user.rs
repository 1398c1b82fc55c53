use serde::{Deserialize, Serialize};

pub const RENTER_ROLE: &str = "renter";

/// The signed in renter, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenterSession {
    pub email: String,
    pub role: String,
    pub user_id: i64,
    pub renter_id: i64,
    #[serde(default)]
    pub renter_fname: Option<String>,
    #[serde(default)]
    pub renter_lname: Option<String>,
    #[serde(default)]
    pub rented_vehicle_count: Option<u32>,
    #[serde(default)]
    pub upcoming_rent_count: Option<u32>,
}

impl RenterSession {
    pub fn is_renter(&self) -> bool {
        self.role == RENTER_ROLE
    }

    pub fn first_name(&self) -> &str {
        self.renter_fname.as_deref().unwrap_or("N/A")
    }

    pub fn last_name(&self) -> &str {
        self.renter_lname.as_deref().unwrap_or("N/A")
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name(), self.last_name())
    }

    pub fn rented_vehicle_count(&self) -> u32 {
        self.rented_vehicle_count.unwrap_or(0)
    }

    pub fn upcoming_rent_count(&self) -> u32 {
        self.upcoming_rent_count.unwrap_or(0)
    }
}
