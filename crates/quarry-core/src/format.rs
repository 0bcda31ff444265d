use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire format for cached index files.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum SerializeFormat {
    #[default]
    Json,
    MessagePack,
}

impl Serialize for SerializeFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SerializeFormat::Json => serializer.serialize_str("json"),
            SerializeFormat::MessagePack => serializer.serialize_str("msgpack"),
        }
    }
}

impl<'de> Deserialize<'de> for SerializeFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        if tag.is_empty() {
            return Err(D::Error::custom("empty serialize format"));
        }
        // Any tag starting with 'm' selects msgpack; everything else is json.
        if tag.starts_with('m') {
            Ok(SerializeFormat::MessagePack)
        } else {
            Ok(SerializeFormat::Json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_reader() {
        let fmt: SerializeFormat = serde_json::from_str("\"msgpack\"").unwrap();
        assert_eq!(fmt, SerializeFormat::MessagePack);
        let fmt: SerializeFormat = serde_json::from_str("\"mpack\"").unwrap();
        assert_eq!(fmt, SerializeFormat::MessagePack);
        let fmt: SerializeFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(fmt, SerializeFormat::Json);
    }
}
