//! Typed views of the notifications the device pushes.
//!
//! Devices differ in whether leaf values arrive as strings or numbers, and
//! routinely leave fields out. Decoding never fails: anything absent or of an
//! unexpected shape comes back as `None` (or an empty list).

use callback_server::InboundEvent;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Path suffix of alarm notifications.
pub const ALARM_PATH_SUFFIX: &str = "/System/Event/Notification/Alarm";

/// Path suffix of face-match notifications.
pub const PERSON_INFO_PATH_SUFFIX: &str = "/System/Event/Notification/PersonInfo";

/// An alarm raised by a channel or input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlarmNotification {
    pub alarm_type: Option<String>,
    pub alarm_src_id: Option<String>,
    pub related_id: Option<String>,
}

impl AlarmNotification {
    pub fn from_event(event: &InboundEvent) -> Self {
        Self::from_body(&event.body)
    }

    /// Decode `{"AlarmInfo": {...}}`.
    pub fn from_body(body: &Value) -> Self {
        let info = body
            .get("AlarmInfo")
            .cloned()
            .and_then(|info| serde_json::from_value::<AlarmInfo>(info).ok())
            .unwrap_or_default();

        Self {
            alarm_type: info.alarm_type,
            alarm_src_id: info.alarm_src_id,
            related_id: info.related_id,
        }
    }
}

/// One compared face from a face-match notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceMatch {
    pub person_name: Option<String>,
    /// Similarity score as reported by the device, typically 0-100
    pub similarity: Option<f64>,
    pub channel_id: Option<String>,
    pub related_id: Option<String>,
}

/// A face-match notification; may carry several faces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonMatchNotification {
    pub faces: Vec<FaceMatch>,
}

impl PersonMatchNotification {
    pub fn from_event(event: &InboundEvent) -> Self {
        Self::from_body(&event.body)
    }

    /// Decode `{"PersonEventInfo": {"FaceInfoList": [...]}}`.
    pub fn from_body(body: &Value) -> Self {
        let faces = body
            .get("PersonEventInfo")
            .and_then(|info| info.get("FaceInfoList"))
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|entry| {
                        serde_json::from_value::<FaceInfo>(entry.clone())
                            .unwrap_or_default()
                            .into()
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { faces }
    }

    /// The first face in the notification, if any.
    pub fn first(&self) -> Option<&FaceMatch> {
        self.faces.first()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AlarmInfo {
    #[serde(rename = "AlarmType", deserialize_with = "lenient_string")]
    alarm_type: Option<String>,
    #[serde(rename = "AlarmSrcID", deserialize_with = "lenient_string")]
    alarm_src_id: Option<String>,
    #[serde(rename = "RelatedID", deserialize_with = "lenient_string")]
    related_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FaceInfo {
    #[serde(rename = "CompareInfo", deserialize_with = "lenient")]
    compare_info: Option<CompareInfo>,
    #[serde(rename = "ChannelID", deserialize_with = "lenient_string")]
    channel_id: Option<String>,
    #[serde(rename = "RelatedID", deserialize_with = "lenient_string")]
    related_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompareInfo {
    #[serde(rename = "Similarity", deserialize_with = "lenient_f64")]
    similarity: Option<f64>,
    #[serde(rename = "PersonInfo", deserialize_with = "lenient")]
    person_info: Option<PersonInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PersonInfo {
    #[serde(rename = "PersonName", deserialize_with = "lenient_string")]
    person_name: Option<String>,
}

impl From<FaceInfo> for FaceMatch {
    fn from(info: FaceInfo) -> Self {
        let compare = info.compare_info.unwrap_or_default();
        Self {
            person_name: compare.person_info.and_then(|p| p.person_name),
            similarity: compare.similarity,
            channel_id: info.channel_id,
            related_id: info.related_id,
        }
    }
}

/// Strings as-is, numbers and booleans as text, anything else `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Numbers, or strings that parse as numbers.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// A nested object, or `None` when it does not have the expected shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
