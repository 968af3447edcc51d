//! Engine configuration: validation options and schema mappings.
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::path_de;
use crate::schema::SchemaVersion;

/// Schema files larger than this are refused.
pub const MAX_SCHEMA_LENGTH: u64 = 20 * 1024 * 1024;

// ————————————————————————————————————————————————————————————————————————————
// COMPLIANCE OPTIONS
// ————————————————————————————————————————————————————————————————————————————

/// Switches that change how strictly an instance is checked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplianceOptions {
    pub case_insensitive_enum_check: bool,
    /// Report missing required properties and treat disallowed extra
    /// properties as errors even where alternatives could excuse them.
    pub force_strict: bool,
    pub report_missing_optional_properties: bool,
}

impl ComplianceOptions {
    /// Case-insensitive enums, nothing strict. Used when picking a schema
    /// for navigation rather than reporting.
    pub const RELAX_ENUM_CHECK: ComplianceOptions = ComplianceOptions {
        case_insensitive_enum_check: true,
        force_strict: false,
        report_missing_optional_properties: false,
    };

    pub fn new(case_insensitive_enum_check: bool) -> Self {
        Self { case_insensitive_enum_check, ..Self::default() }
    }

    /// Same enum handling, strict mode on, optional-property reporting off.
    pub fn with_force_strict(self) -> Self {
        Self {
            case_insensitive_enum_check: self.case_insensitive_enum_check,
            force_strict: true,
            report_missing_optional_properties: false,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SCHEMA MAPPINGS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingKind {
    File,
    Pattern,
    Directory,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingItem {
    pub kind: MappingKind,
    pub path: String,
}

/// One schema and the instance files it applies to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaMapping {
    pub name: String,
    /// Schema path, relative to the mappings file.
    pub schema: String,
    #[serde(default)]
    pub schema_version: Option<SchemaVersion>,
    #[serde(default)]
    pub patterns: Vec<MappingItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMappings {
    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
    #[serde(default)]
    pub mappings: Vec<SchemaMapping>,
}

impl SchemaMappings {
    pub fn from_json(src: &str, base_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut mappings: SchemaMappings = path_de::from_str_with_path(src)?;
        mappings.base_dir = base_dir.into();
        Ok(mappings)
    }

    /// Load a mappings file; relative paths inside it resolve against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { file: path.display().to_string(), source })?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self::from_json(&src, base_dir)
    }

    /// Absolute paths of every mapped schema.
    pub fn schema_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.mappings.iter().map(|m| normalize(&self.base_dir.join(&m.schema)))
    }

    /// Schema of the first mapping with a pattern matching `file`.
    pub fn schema_for(&self, file: &Path) -> Option<PathBuf> {
        let file = normalize(&self.base_dir.join(file));
        self.mappings
            .iter()
            .find(|m| m.patterns.iter().any(|item| self.item_matches(item, &file)))
            .map(|m| normalize(&self.base_dir.join(&m.schema)))
    }

    fn item_matches(&self, item: &MappingItem, file: &Path) -> bool {
        let path_text = item.path.replace('\\', "/");
        let path_text = path_text.trim_end_matches('/');
        match item.kind {
            MappingKind::File => normalize(&self.base_dir.join(path_text)) == file,
            MappingKind::Pattern => {
                if path_text.is_empty() {
                    return false;
                }
                let (mask, subject) = if path_text.contains('/') {
                    (format!("*/{path_text}"), file.to_string_lossy().replace('\\', "/"))
                } else {
                    let name = file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                    (path_text.to_string(), name)
                };
                match glob::Pattern::new(&mask) {
                    Ok(pattern) => pattern.matches(&subject),
                    Err(err) => {
                        tracing::debug!(pattern = %mask, error = %err, "invalid mapping pattern");
                        false
                    }
                }
            }
            MappingKind::Directory => {
                let dir = normalize(&self.base_dir.join(path_text));
                file != dir && file.starts_with(&dir)
            }
        }
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPINGS: &str = r#"{
        "mappings": [
            {"name": "exact", "schema": "schemas/exact.json", "schemaVersion": "draft-01",
             "patterns": [{"kind": "file", "path": "data/one.cirjson"}]},
            {"name": "masks", "schema": "./schemas/mask.json",
             "patterns": [{"kind": "pattern", "path": "*.conf.cirjson"}, {"kind": "pattern", "path": "deep/*.json"}]},
            {"name": "dir", "schema": "schemas/dir.json",
             "patterns": [{"kind": "directory", "path": "tree/"}]}
        ]
    }"#;

    #[test]
    fn options_presets() {
        let relaxed = ComplianceOptions::RELAX_ENUM_CHECK;
        assert!(relaxed.case_insensitive_enum_check && !relaxed.force_strict);
        let strict = ComplianceOptions { report_missing_optional_properties: true, ..ComplianceOptions::new(true) }
            .with_force_strict();
        assert!(strict.force_strict && strict.case_insensitive_enum_check);
        assert!(!strict.report_missing_optional_properties);
    }

    #[test]
    fn mappings_select_schemas() {
        let mappings = SchemaMappings::from_json(MAPPINGS, "/proj").unwrap();
        assert_eq!(mappings.mappings[0].schema_version, Some(SchemaVersion::Schema1));
        assert_eq!(
            mappings.schema_for(Path::new("/proj/data/one.cirjson")),
            Some(PathBuf::from("/proj/schemas/exact.json"))
        );
        assert_eq!(
            mappings.schema_for(Path::new("data/x.conf.cirjson")),
            Some(PathBuf::from("/proj/schemas/mask.json"))
        );
        assert_eq!(
            mappings.schema_for(Path::new("/proj/a/deep/file.json")),
            Some(PathBuf::from("/proj/schemas/mask.json"))
        );
        assert_eq!(
            mappings.schema_for(Path::new("/proj/tree/sub/leaf.json")),
            Some(PathBuf::from("/proj/schemas/dir.json"))
        );
        assert_eq!(mappings.schema_for(Path::new("/proj/tree")), None);
        assert_eq!(mappings.schema_for(Path::new("/elsewhere/two.json")), None);
    }

    #[test]
    fn bad_mapping_reports_path() {
        let err = SchemaMappings::from_json(r#"{"mappings": [{"name": "x", "schema": "s", "patterns": [{"kind": "glob", "path": "*"}]}]}"#, "/").unwrap_err();
        match err {
            ConfigError::Invalid { path, .. } => assert_eq!(path, "mappings[0].patterns[0].kind"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
