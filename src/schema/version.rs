//! Recognised `$schema` dialect identifiers.
use serde::{Deserialize, Serialize};

const SCHEMA_V1: &str = "http://cirjson.org/draft-01/schema";
const SCHEMA_ORG_PREFIX: &str = "http://cirjson.org/";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "draft-01")]
    Schema1,
}

impl SchemaVersion {
    /// Map a `$schema` value to a known version; `https` is treated like
    /// `http` and a trailing `#` is ignored.
    pub fn by_id(id: &str) -> Option<Self> {
        let id = match id.strip_prefix("https://") {
            Some(rest) => format!("http://{rest}"),
            None => id.to_string(),
        };
        let trimmed = id.trim_end_matches('#');
        if trimmed == SCHEMA_V1 || id.starts_with(SCHEMA_ORG_PREFIX) {
            return Some(SchemaVersion::Schema1);
        }
        None
    }

    pub fn is_schema_schema_id(id: Option<&str>) -> bool {
        id.and_then(Self::by_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_cirjson_schema_ids() {
        assert_eq!(SchemaVersion::by_id("http://cirjson.org/draft-01/schema#"), Some(SchemaVersion::Schema1));
        assert_eq!(SchemaVersion::by_id("https://cirjson.org/draft-01/schema"), Some(SchemaVersion::Schema1));
        assert_eq!(SchemaVersion::by_id("http://cirjson.org/anything"), Some(SchemaVersion::Schema1));
        assert_eq!(SchemaVersion::by_id("http://json-schema.org/draft-07/schema#"), None);
        assert!(!SchemaVersion::is_schema_schema_id(None));
    }
}
