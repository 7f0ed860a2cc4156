use std::sync::Arc;

use tracing::info;

use crate::handlers::api::AccountApi;
use crate::handlers::auth::FlowOutcome;
use crate::handlers::storage::{KeyValueStore, EMAIL_KEY, MOBILE_KEY, NAME_KEY, STICK_ID_KEY};
use crate::models::account::responses::UserDetails;
use crate::models::error::{CompanionError, Result};
use crate::models::notification::{Notification, Notifier, Screen};

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Shown as the user id.
    pub mobile: String,
    pub details: UserDetails,
}

pub struct ProfileService {
    api: Arc<dyn AccountApi>,
    store: Arc<dyn KeyValueStore>,
    notifier: Notifier,
}

impl ProfileService {
    pub fn new(api: Arc<dyn AccountApi>, store: Arc<dyn KeyValueStore>, notifier: Notifier) -> Self {
        Self { api, store, notifier }
    }

    pub async fn load(&self) -> Result<Profile> {
        let mobile = self
            .store
            .get(MOBILE_KEY)
            .await?
            .ok_or(CompanionError::MissingAccount)?;
        let mut details = self.api.user_details(&mobile).await?;

        // Local edits win over what the backend still reports.
        if let Some(name) = self.store.get(NAME_KEY).await? {
            details.name = name;
        }
        if let Some(stick_id) = self.store.get(STICK_ID_KEY).await? {
            details.stick_id = stick_id;
        }
        Ok(Profile { mobile, details })
    }

    /// Edits stay on the device; the backend has no update route.
    pub async fn edit(&self, profile: &mut Profile, name: &str, stick_id: &str) -> Result<()> {
        if name.trim().is_empty() || stick_id.trim().is_empty() {
            let err = CompanionError::validation("Name and Stick ID are required!");
            self.notifier.notify(Notification::error("Error", err.to_string()));
            return Err(err);
        }

        self.store.set(NAME_KEY, name.trim()).await?;
        self.store.set(STICK_ID_KEY, stick_id.trim()).await?;
        profile.details.name = name.trim().to_string();
        profile.details.stick_id = stick_id.trim().to_string();
        self.notifier.notify(Notification::success(
            "Profile Updated",
            "Your profile information has been updated.",
        ));
        Ok(())
    }

    pub async fn logout(&self) -> Result<FlowOutcome> {
        self.store.remove(MOBILE_KEY).await?;
        self.store.remove(EMAIL_KEY).await?;
        self.store.remove(NAME_KEY).await?;
        self.store.remove(STICK_ID_KEY).await?;
        info!("Cleared stored account");

        let notification = Notification::info("Logout", "You have been logged out.");
        self.notifier.notify(notification.clone());
        Ok(FlowOutcome { notification, navigate_to: Some(Screen::Login) })
    }
}
