use std::sync::Arc;

use tracing::{error, info, warn};

use crate::handlers::api::AccountApi;
use crate::handlers::storage::{KeyValueStore, EMAIL_KEY, MOBILE_KEY};
use crate::models::account::requests::{LoginRequest, RegisterRequest};
use crate::models::error::{CompanionError, Result};
use crate::models::notification::{Notification, Notifier, Screen};

pub const MIN_PASSWORD_LEN: usize = 8;

const LOGIN_FAILED: &str = "Login Failed";
const SIGNUP_FAILED: &str = "Signup Failed";
const LOGIN_UNEXPECTED: &str = "An unexpected error occurred. Please try again.";
const SIGNUP_UNEXPECTED: &str = "An unexpected error occurred";

/// What a form submission produced: the message shown and where to go next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    pub notification: Notification,
    pub navigate_to: Option<Screen>,
}

impl FlowOutcome {
    pub fn succeeded(&self) -> bool {
        self.navigate_to.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub mobile: String,
    pub stick_id: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<LoginRequest> {
        required(&self.mobile, "Mobile number is required")?;
        required(&self.stick_id, "Stick ID is required")?;
        required(&self.password, "Password is required")?;

        Ok(LoginRequest {
            mobile: self.mobile.trim().to_string(),
            stick_id: self.stick_id.trim().to_string(),
            password: self.password.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub mobile: String,
    pub email: String,
    pub stick_id: String,
    pub emergency_contacts: Vec<String>,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<RegisterRequest> {
        required(&self.name, "Name is required")?;
        required(&self.mobile, "Mobile number is required")?;
        required(&self.email, "Email is required")?;
        required(&self.stick_id, "Stick ID is required")?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(CompanionError::validation(
                "Password must be at least 8 characters long and contain 1 special character",
            ));
        }

        Ok(RegisterRequest {
            name: self.name.trim().to_string(),
            mobile: self.mobile.trim().to_string(),
            email: self.email.trim().to_string(),
            stick_id: self.stick_id.trim().to_string(),
            emergency_contacts: self.emergency_contacts.clone(),
            password: self.password.clone(),
        })
    }
}

fn required(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(CompanionError::validation(message));
    }
    Ok(())
}

pub struct AccountFlows {
    api: Arc<dyn AccountApi>,
    store: Arc<dyn KeyValueStore>,
    notifier: Notifier,
}

impl AccountFlows {
    pub fn new(api: Arc<dyn AccountApi>, store: Arc<dyn KeyValueStore>, notifier: Notifier) -> Self {
        Self { api, store, notifier }
    }

    pub async fn login(&self, form: &LoginForm) -> FlowOutcome {
        let outcome = match self.try_login(form).await {
            Ok(()) => FlowOutcome {
                notification: Notification::success("Login Successful", "Welcome back!"),
                navigate_to: Some(Screen::Main),
            },
            Err(e) => {
                warn!("Login failed: {}", e);
                FlowOutcome {
                    notification: Notification::error(LOGIN_FAILED, login_failure_message(&e)),
                    navigate_to: None,
                }
            }
        };
        self.notifier.notify(outcome.notification.clone());
        outcome
    }

    async fn try_login(&self, form: &LoginForm) -> Result<()> {
        let request = form.validate()?;
        self.api.login(&request).await?;
        self.store.set(MOBILE_KEY, &request.mobile).await?;

        // The tracker needs the email; a failed lookup here is recoverable from the track screen.
        match self.api.user_email(&request.mobile).await {
            Ok(found) => self.store.set(EMAIL_KEY, &found.email).await?,
            Err(e) => error!("Error fetching user email: {}", e),
        }
        Ok(())
    }

    pub async fn register(&self, form: &SignupForm) -> FlowOutcome {
        let result = match form.validate() {
            Ok(request) => self.api.register(&request).await,
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(reply) => {
                info!("Registered {}", form.mobile);
                FlowOutcome {
                    notification: Notification::success(
                        "Signup Successful",
                        reply.message.unwrap_or_default(),
                    ),
                    navigate_to: Some(Screen::Login),
                }
            }
            Err(e) => {
                warn!("Signup failed: {}", e);
                FlowOutcome {
                    notification: Notification::error(SIGNUP_FAILED, signup_failure_message(&e)),
                    navigate_to: None,
                }
            }
        };
        self.notifier.notify(outcome.notification.clone());
        outcome
    }

    /// Looks the account email up again by the stored mobile number and caches it.
    pub async fn refresh_email(&self) -> Result<String> {
        let mobile = self
            .store
            .get(MOBILE_KEY)
            .await?
            .ok_or(CompanionError::MissingAccount)?;
        let found = self.api.user_email(&mobile).await?;
        self.store.set(EMAIL_KEY, &found.email).await?;
        info!("User email fetched: {}", found.email);
        Ok(found.email)
    }
}

fn login_failure_message(err: &CompanionError) -> String {
    match err {
        CompanionError::ServerError { status: 404, message } => message
            .clone()
            .unwrap_or_else(|| "Invalid mobile number or stick ID".to_string()),
        CompanionError::ServerError { status: 401, message } => {
            message.clone().unwrap_or_else(|| "Invalid password".to_string())
        }
        CompanionError::ServerError { message: Some(message), .. } => message.clone(),
        CompanionError::ValidationError(message) => message.clone(),
        _ => LOGIN_UNEXPECTED.to_string(),
    }
}

fn signup_failure_message(err: &CompanionError) -> String {
    match err {
        CompanionError::ServerError { message, .. } => message
            .clone()
            .unwrap_or_else(|| "An error occurred during signup".to_string()),
        CompanionError::ValidationError(message) => message.clone(),
        _ => SIGNUP_UNEXPECTED.to_string(),
    }
}
