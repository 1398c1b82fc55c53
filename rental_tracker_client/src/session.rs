use std::sync::Arc;

use rental_tracker_lib::user::RenterSession;

use crate::api::{ApiError, FleetApi};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no renter is signed in")]
    NotSignedIn,
}

/// Holds the signed in renter. One instance is created by the front-end and handed to
/// whatever needs the renter; nothing reads it ambiently.
#[derive(Debug, Default)]
pub struct SessionContext {
    current: Option<Arc<RenterSession>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init(&mut self, renter: RenterSession) -> Arc<RenterSession> {
        if let Some(previous) = &self.current {
            tracing::info!("Replacing session of renter {}", previous.renter_id);
        }
        let renter = Arc::new(renter);
        self.current = Some(renter.clone());
        renter
    }

    /// Signs in through the api and initialises the session with the result.
    pub async fn login(&mut self, api: &dyn FleetApi, email: &str, password: &str) -> Result<Arc<RenterSession>, ApiError> {
        let renter = api.login(email, password).await?;
        Ok(self.init(renter))
    }

    /// Clears the session. Components built from it keep their own `Arc` until dropped.
    pub fn dispose(&mut self) -> Option<Arc<RenterSession>> {
        let previous = self.current.take();
        if let Some(renter) = &previous {
            tracing::info!("Signed out renter {}", renter.renter_id);
        }
        previous
    }

    pub fn current(&self) -> Option<Arc<RenterSession>> {
        self.current.clone()
    }

    pub fn require(&self) -> Result<Arc<RenterSession>, SessionError> {
        self.current().ok_or(SessionError::NotSignedIn)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renter(renter_id: i64) -> RenterSession {
        RenterSession {
            email: "ana@example.com".into(),
            role: "renter".into(),
            user_id: 1,
            renter_id,
            renter_fname: Some("Ana".into()),
            renter_lname: Some("Cruz".into()),
            rented_vehicle_count: Some(1),
            upcoming_rent_count: None,
        }
    }

    #[test]
    fn init_and_dispose() {
        let mut context = SessionContext::new();
        assert_eq!(context.require(), Err(SessionError::NotSignedIn));

        let held = context.init(renter(5));
        assert!(context.is_signed_in());
        assert_eq!(context.require().unwrap().renter_id, 5);

        let disposed = context.dispose().unwrap();
        assert!(Arc::ptr_eq(&held, &disposed));
        assert!(context.current().is_none());
        assert!(context.dispose().is_none());

        // Holders keep their copy after logout.
        assert_eq!(held.renter_id, 5);
    }

    #[test]
    fn init_replaces_previous_renter() {
        let mut context = SessionContext::new();
        context.init(renter(5));
        context.init(renter(6));
        assert_eq!(context.require().unwrap().renter_id, 6);
    }
}
