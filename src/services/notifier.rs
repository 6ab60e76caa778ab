use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tag of the success channel; repeated successes replace each other
pub const TAG_RENTAL_SUCCESS: &str = "rental-success";

/// Tag of the error channel; repeated errors collapse to the latest
pub const TAG_RENTAL_ERROR: &str = "rental-error";

/// A structured request to display a user-facing alert, independent of
/// whether the originating page is still active. Consumed by the
/// notification worker; wire format is camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationIntent {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub require_interaction: bool,
    #[serde(default)]
    pub data: NotificationData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationData {
    /// Deep link the notification routes to on click
    pub url: String,
}

impl Default for NotificationData {
    fn default() -> Self {
        Self {
            url: "/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// Intent for a completed reservation; the station name is part of the
/// message the user sees.
pub fn rental_success_intent(station_name: &str, rental_id: Uuid) -> NotificationIntent {
    NotificationIntent {
        title: "Power bank reserved".to_string(),
        body: format!("Your power bank at {station_name} is ready. Enjoy!"),
        icon: Some("/static/icons/icon-192.png".to_string()),
        badge: Some("/static/icons/badge-72.png".to_string()),
        tag: Some(TAG_RENTAL_SUCCESS.to_string()),
        require_interaction: false,
        data: NotificationData {
            url: format!("/rentals/{rental_id}"),
        },
        actions: vec![],
    }
}

/// Intent for any reservation failure. Persists until the user dismisses
/// it, unlike the success path.
pub fn rental_error_intent(message: &str) -> NotificationIntent {
    NotificationIntent {
        title: "Reservation failed".to_string(),
        body: message.to_string(),
        icon: Some("/static/icons/icon-192.png".to_string()),
        badge: Some("/static/icons/badge-72.png".to_string()),
        tag: Some(TAG_RENTAL_ERROR.to_string()),
        require_interaction: true,
        data: NotificationData::default(),
        actions: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_wire_format_is_camel_case() {
        let intent = rental_error_intent("nope");
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["requireInteraction"], true);
        assert_eq!(json["tag"], TAG_RENTAL_ERROR);
        assert_eq!(json["data"]["url"], "/");
    }

    #[test]
    fn success_intent_carries_deep_link_and_station_name() {
        let rental_id = Uuid::new_v4();
        let intent = rental_success_intent("Harbor Mall", rental_id);
        assert!(intent.body.contains("Harbor Mall"));
        assert_eq!(intent.data.url, format!("/rentals/{rental_id}"));
        assert!(!intent.require_interaction);
    }
}
