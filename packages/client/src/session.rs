//! Signed-in user and current location.
//!
//! A [`Session`] is created once at startup and handed to whatever needs
//! it. Logging out drops the user and the last known location.

use safe_route_geo::GeoPoint;
use safe_route_server_models::{AuthResponse, SosResponse};

use crate::ClientError;
use crate::api::ApiClient;

/// Location used until the device reports one (New York City).
pub const DEFAULT_LOCATION: GeoPoint = GeoPoint {
    latitude: 40.7128,
    longitude: -74.0060,
};

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// Server-side user id.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Email as stored by the server.
    pub email: String,
}

impl From<AuthResponse> for SessionUser {
    fn from(auth: AuthResponse) -> Self {
        Self {
            user_id: auth.user_id,
            name: auth.name,
            email: auth.email,
        }
    }
}

/// Client-side state shared by the screens.
#[derive(Debug, Default)]
pub struct Session {
    user: Option<SessionUser>,
    location: Option<GeoPoint>,
}

impl Session {
    /// A signed-out session with no location.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            user: None,
            location: None,
        }
    }

    /// The signed-in user, if any.
    #[must_use]
    pub const fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// The signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotLoggedIn`] when nobody is signed in.
    pub fn require_user(&self) -> Result<&SessionUser, ClientError> {
        self.user.as_ref().ok_or(ClientError::NotLoggedIn)
    }

    /// Last reported location, or [`DEFAULT_LOCATION`].
    #[must_use]
    pub fn location(&self) -> GeoPoint {
        self.location.unwrap_or(DEFAULT_LOCATION)
    }

    /// Whether a real location has been reported.
    #[must_use]
    pub const fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// Records the device's location.
    pub const fn set_location(&mut self, location: GeoPoint) {
        self.location = Some(location);
    }

    /// Signs in and stores the user.
    ///
    /// # Errors
    ///
    /// Returns the API error; the session is left signed out.
    pub async fn login(
        &mut self,
        client: &ApiClient,
        email: &str,
        password: &str,
    ) -> Result<&SessionUser, ClientError> {
        let auth = client.login(email, password).await?;
        log::info!("Signed in as {}", auth.email);
        Ok(self.user.insert(auth.into()))
    }

    /// Registers a new account and signs in as it.
    ///
    /// # Errors
    ///
    /// Returns the API error; the session is left unchanged.
    pub async fn register(
        &mut self,
        client: &ApiClient,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<&SessionUser, ClientError> {
        let auth = client.register(name, email, password).await?;
        log::info!("Registered {}", auth.email);
        Ok(self.user.insert(auth.into()))
    }

    /// Forgets the user and the last known location.
    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            log::info!("Signed out {}", user.email);
        }
        self.location = None;
    }

    /// Sends an SOS for the signed-in user at the current location.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotLoggedIn`] when nobody is signed in, or the
    /// API error.
    pub async fn send_sos(&self, client: &ApiClient) -> Result<SosResponse, ClientError> {
        let user = self.require_user()?;
        client.send_sos(user.user_id, self.location()).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::with_timeout(&format!("{}/api", server.uri()), Duration::from_millis(500))
            .unwrap()
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/api/users/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "userId": 3,
                "name": "Ada",
                "email": "ada@example.com"
            })))
            .mount(server)
            .await;
    }

    #[test]
    fn location_falls_back_to_new_york() {
        let mut session = Session::new();
        assert_eq!(session.location(), DEFAULT_LOCATION);
        assert!(!session.has_location());

        let here = GeoPoint::new(51.5, -0.12).unwrap();
        session.set_location(here);
        assert_eq!(session.location(), here);
    }

    #[tokio::test]
    async fn login_then_logout() {
        let server = MockServer::start().await;
        mount_login(&server).await;

        let mut session = Session::new();
        session.set_location(GeoPoint::new(51.5, -0.12).unwrap());
        let user = session
            .login(&client(&server), "ada@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(user.user_id, 3);

        session.logout();
        assert!(session.user().is_none());
        assert_eq!(session.location(), DEFAULT_LOCATION);
    }

    #[tokio::test]
    async fn failed_login_stays_signed_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/users/login"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "msg": "Invalid credentials" })),
            )
            .mount(&server)
            .await;

        let mut session = Session::new();
        let err = session
            .login(&client(&server), "ada@example.com", "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 400, ref message, .. } if message == "Invalid credentials"));
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn sos_requires_login_and_sends_location() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/api/users/3/sos"))
            .and(body_json(json!({ "location": { "lat": 40.7128, "lng": -74.006 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "msg": "SOS alerts sent successfully",
                "contactsNotified": 2
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let mut session = Session::new();
        assert!(matches!(
            session.send_sos(&client).await,
            Err(ClientError::NotLoggedIn)
        ));

        session.login(&client, "ada@example.com", "pw").await.unwrap();
        let response = session.send_sos(&client).await.unwrap();
        assert_eq!(response.contacts_notified, 2);
    }
}
