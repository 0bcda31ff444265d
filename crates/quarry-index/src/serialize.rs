use quarry_core::SerializeFormat;

use crate::model::IndexFile;

/// Bumped whenever the on-disk index layout changes. A cached file whose
/// embedded version differs is treated as a cache miss and reparsed.
pub const INDEX_FILE_VERSION: i32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack error: {0}")]
    MessagePack(#[from] rmp_serde::encode::Error),
}

pub fn serialize(format: SerializeFormat, file: &IndexFile) -> Result<Vec<u8>, SerializeError> {
    match format {
        SerializeFormat::Json => Ok(serde_json::to_vec_pretty(file)?),
        // Named fields so a decoder can tolerate reordered or defaulted
        // members, same as the json side.
        SerializeFormat::MessagePack => Ok(rmp_serde::to_vec_named(file)?),
    }
}

/// Decode a cached index. Returns `None` (never an error) for an empty
/// body, a malformed document, or a `version` that does not match
/// `expected_version`; callers treat all three as a cache miss.
pub fn deserialize(
    format: SerializeFormat,
    path: &str,
    data: &[u8],
    expected_version: i32,
) -> Option<IndexFile> {
    if data.is_empty() {
        return None;
    }

    let mut file = match format {
        SerializeFormat::Json => {
            let value: serde_json::Value = match serde_json::from_slice(data) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(path, error = %err, "discarding unparsable cached index");
                    return None;
                }
            };
            // Check the version before decoding the full document; the rest
            // of the layout may have changed incompatibly.
            match value.get("version").and_then(|v| v.as_i64()) {
                Some(version) if version as i32 == expected_version => {}
                version => {
                    tracing::info!(path, ?version, expected_version, "cached index version mismatch");
                    return None;
                }
            }
            match serde_json::from_value::<IndexFile>(value) {
                Ok(file) => file,
                Err(err) => {
                    tracing::warn!(path, error = %err, "discarding undecodable cached index");
                    return None;
                }
            }
        }
        SerializeFormat::MessagePack => {
            let file: IndexFile = match rmp_serde::from_slice(data) {
                Ok(file) => file,
                Err(err) => {
                    tracing::warn!(path, error = %err, "discarding unparsable cached index");
                    return None;
                }
            };
            if file.version != expected_version {
                tracing::info!(
                    path,
                    version = file.version,
                    expected_version,
                    "cached index version mismatch"
                );
                return None;
            }
            file
        }
    };

    file.path = path.to_string();
    file.rebuild_id_cache();
    Some(file)
}
