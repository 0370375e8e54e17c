use serde::{Deserialize, Deserializer};

/// One record of the JSON feed.
///
/// Every field is optional and numbers may arrive as strings; validation
/// happens when the record is normalized.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub(super) struct AfadRecord {
    #[serde(rename = "eventID", default, deserialize_with = "lenient_string")]
    pub event_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub depth: Option<f64>,
    /// Magnitude scale of `magnitude`: MD, ML or Mw
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub magnitude_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub magnitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub province: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub district: Option<String>,
    #[serde(rename = "isEventUpdate", default)]
    pub is_event_update: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Float(f64),
    Str(String),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Float(f)) => Ok(Some(f)),
        Some(NumberOrString::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::Str(s)) => s
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .map(Some)
            .map_err(D::Error::custom),
        None => Ok(None),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Float(f)) => Ok(Some(f.to_string())),
        Some(NumberOrString::Str(s)) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_as_strings_and_numbers() {
        let json = r#"{"eventID": 654321, "date": "2025-05-13T06:05:56",
            "latitude": "38.1234", "longitude": 27.5, "depth": "7,2",
            "type": "ML", "magnitude": "2.9", "location": "Sındırgı (Balıkesir)"}"#;
        let record: AfadRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.event_id.as_deref(), Some("654321"));
        assert_eq!(record.latitude, Some(38.1234));
        assert_eq!(record.longitude, Some(27.5));
        assert_eq!(record.depth, Some(7.2));
        assert_eq!(record.magnitude, Some(2.9));
        assert_eq!(record.magnitude_type.as_deref(), Some("ML"));
    }

    #[test]
    fn test_missing_and_empty_fields_are_none() {
        let record: AfadRecord =
            serde_json::from_str(r#"{"magnitude": "", "date": null, "location": "  "}"#).unwrap();

        assert_eq!(record, AfadRecord::default());
    }

    #[test]
    fn test_non_numeric_magnitude_is_an_error() {
        let result = serde_json::from_str::<AfadRecord>(r#"{"magnitude": "strong"}"#);
        assert!(result.is_err());
    }
}
