#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! SOS emergency alerts.
//!
//! [`send_sos`] renders one email per emergency contact and hands them to an
//! [`EmailSender`] concurrently. The alert only succeeds if every contact
//! was notified.

pub mod http;

use futures::future::try_join_all;
use safe_route_database_models::EmergencyContact;
use safe_route_geo::GeoPoint;
use serde::Serialize;
use thiserror::Error;

/// Subject line of every SOS email.
pub const SOS_SUBJECT: &str = "EMERGENCY SOS ALERT";

/// Errors from SOS delivery.
#[derive(Debug, Error)]
pub enum AlertError {
    /// The user has no emergency contacts.
    #[error("No emergency contacts found")]
    NoContacts,

    /// No email provider is configured.
    #[error("Email delivery is not configured: {message}")]
    NotConfigured {
        /// What is missing.
        message: String,
    },

    /// A message could not be delivered.
    #[error("Failed to deliver alert to {recipient}: {message}")]
    Delivery {
        /// Address that failed.
        recipient: String,
        /// Description of the failure.
        message: String,
    },
}

/// A rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// HTML body.
    pub html: String,
}

/// Something that can deliver an [`EmailMessage`].
#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::Delivery`] if the message was not accepted.
    async fn send(&self, message: &EmailMessage) -> Result<(), AlertError>;
}

/// Google Maps link for a location.
#[must_use]
pub fn maps_link(location: GeoPoint) -> String {
    format!(
        "https://www.google.com/maps?q={},{}",
        location.latitude, location.longitude
    )
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the SOS email for one contact.
#[must_use]
pub fn compose_sos_message(
    user_name: &str,
    location: GeoPoint,
    contact: &EmergencyContact,
) -> EmailMessage {
    let relation = if contact.relation.trim().is_empty() {
        String::new()
    } else {
        format!(" ({})", escape_html(contact.relation.trim()))
    };

    let html = format!(
        "<h2>{SOS_SUBJECT}</h2>\n\
         <p>{name} has triggered an emergency alert!</p>\n\
         <p>Current location: <a href=\"{link}\">View on Google Maps</a></p>\n\
         <p>Coordinates: {lat}, {lng}</p>\n\
         <p>This person has listed you as an emergency contact{relation}.</p>\n\
         <p>Please try to contact them immediately or alert local authorities if needed.</p>\n",
        name = escape_html(user_name),
        link = maps_link(location),
        lat = location.latitude,
        lng = location.longitude,
    );

    EmailMessage {
        to: contact.email.trim().to_string(),
        subject: SOS_SUBJECT.to_string(),
        html,
    }
}

/// Sends an SOS alert to every contact concurrently.
///
/// Returns the number of contacts notified.
///
/// # Errors
///
/// Returns [`AlertError::NoContacts`] for an empty contact list, or the
/// first delivery failure.
pub async fn send_sos(
    sender: &dyn EmailSender,
    user_name: &str,
    location: GeoPoint,
    contacts: &[EmergencyContact],
) -> Result<usize, AlertError> {
    if contacts.is_empty() {
        return Err(AlertError::NoContacts);
    }

    let messages: Vec<EmailMessage> = contacts
        .iter()
        .map(|contact| compose_sos_message(user_name, location, contact))
        .collect();

    log::warn!(
        "SOS triggered by {user_name} at {location}; alerting {} contacts",
        messages.len()
    );

    try_join_all(messages.iter().map(|message| sender.send(message))).await?;

    Ok(messages.len())
}
