use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An SMS as served by the user-data API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "sms_id")]
    pub id: String,
    #[serde(rename = "sms_text")]
    pub text: String,
    #[serde(rename = "sender_id")]
    pub sender: String,
    #[serde(rename = "date_sent")]
    pub sent_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Message {
    pub fn display_date(&self) -> String {
        self.sent_at.format("%Y-%m-%d %H:%M").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_user_data_api_record() {
        let message: Message = serde_json::from_value(json!({
            "user_id": "ada",
            "sms_id": "8c4b3f0e-d3a1-11ec-9d64-0242ac120002",
            "sender_id": "+4412345",
            "sms_text": "Win a free prize now!",
            "date_sent": "2022-05-13T09:41:07.512000"
        }))
        .unwrap();

        assert_eq!(message.id, "8c4b3f0e-d3a1-11ec-9d64-0242ac120002");
        assert_eq!(message.sender, "+4412345");
        assert_eq!(message.user_id.as_deref(), Some("ada"));
        assert_eq!(message.display_date(), "2022-05-13 09:41");
    }

    #[test]
    fn test_user_id_is_optional() {
        let message: Message = serde_json::from_value(json!({
            "sms_id": "42",
            "sender_id": "bob",
            "sms_text": "lunch?",
            "date_sent": "2021-01-02T03:04:05"
        }))
        .unwrap();
        assert!(message.user_id.is_none());
    }
}
