use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Hex-encoded bytes serialized the way the mobile wallet expects them:
/// `{"type": "Buffer", "data": [..]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer(pub String);

impl Serialize for Buffer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bytes = hex::decode(&self.0).unwrap_or_default();
        let data: Vec<u64> = bytes.into_iter().map(u64::from).collect();
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "Buffer")?;
        map.serialize_entry("data", &data)?;
        map.end()
    }
}
