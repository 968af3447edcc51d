//! CLI: validate instances, inspect resolution, check schema files.
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{ComplianceOptions, SchemaMappings};
use crate::document::{Dialect, Document};
use crate::engine;
use crate::pointer::PointerPosition;
use crate::resolve::{EngineContext, FsSchemaService, service::detect_dialect};
use crate::schema::{FileId, Schema, SchemaKey};
use crate::validate::{Diagnostic, Priority};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate JSON and CirJSON documents against CirJSON schemas
#[derive(Parser, Debug)]
#[command(name = "cirjson-schema", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate instance documents and print ranked diagnostics
    Validate(ValidateCmd),
    /// print the schemas that apply at an instance position
    Resolve(ResolveCmd),
    /// load a schema file and report load errors and dangling references
    CheckSchema(CheckSchemaCmd),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// schema file used for every input
    #[arg(long, short)]
    schema: Option<PathBuf>,

    /// schema mapping file; picks the schema per input when `--schema` is omitted
    #[arg(long)]
    mappings: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(clap::Parser, Debug)]
struct ValidateCmd {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// input syntax; sniffed per file when omitted
    #[arg(long, value_enum)]
    dialect: Option<Dialect>,

    /// report missing required properties and object-size limits
    #[arg(long)]
    strict: bool,

    /// compare enum strings ignoring case
    #[arg(long)]
    case_insensitive_enums: bool,

    /// also list optional properties that are absent
    #[arg(long)]
    report_optional: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(clap::Parser, Debug)]
struct ResolveCmd {
    #[arg(long, short)]
    schema: PathBuf,

    /// instance pointer, e.g. /items/0/name
    #[arg(long, short, default_value = "/")]
    pointer: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(clap::Parser, Debug)]
struct CheckSchemaCmd {
    #[arg(long, short)]
    schema: PathBuf,
}

/// Findings for one input file, as printed in JSON mode.
#[derive(Serialize)]
struct FileReport {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Serialize)]
struct ResolveReport {
    schemas: Vec<String>,
    excluding_schemas: Vec<Vec<String>>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ValidateCmd {
    fn options(&self) -> ComplianceOptions {
        ComplianceOptions {
            case_insensitive_enum_check: self.case_insensitive_enums,
            force_strict: self.strict,
            report_missing_optional_properties: self.report_optional,
        }
    }

    /// Returns whether every input validated cleanly.
    fn run(&self) -> anyhow::Result<bool> {
        let mappings = match &self.schema_settings.mappings {
            Some(path) => Some(
                SchemaMappings::load(path).with_context(|| format!("failed to load mappings {}", path.display()))?,
            ),
            None => None,
        };
        let fixed_schema = match &self.schema_settings.schema {
            Some(path) => Some(local_file_id(path)?),
            None if mappings.is_some() => None,
            None => bail!("either --schema or --mappings is required"),
        };
        let service = match &mappings {
            Some(mappings) => FsSchemaService::with_mappings(mappings.clone()),
            None => FsSchemaService::new(),
        };
        let ctx = EngineContext::new(service);
        let options = self.options();

        let inputs = resolve_file_path_patterns(&self.input)?;
        tracing::info!(inputs = inputs.len(), strict = options.force_strict, "validating");

        let reports: Vec<FileReport> = inputs
            .par_iter()
            .map(|path| {
                let schema_file = fixed_schema.clone().or_else(|| {
                    let mapped = mappings.as_ref()?.schema_for(path)?;
                    FsSchemaService::file_id(&mapped)
                });
                let outcome = schema_file
                    .ok_or_else(|| anyhow!("no schema mapped to this file"))
                    .and_then(|file| validate_file(&ctx, path, &file, self.dialect, options));
                let (error, diagnostics) = match outcome {
                    Ok(diagnostics) => (None, diagnostics),
                    Err(error) => (Some(format!("{error:#}")), Vec::new()),
                };
                FileReport { file: path.display().to_string(), error, diagnostics }
            })
            .collect();

        let clean = reports.iter().all(|r| r.error.is_none() && r.diagnostics.is_empty());
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
            OutputFormat::Text => reports.iter().for_each(print_report),
        }
        Ok(clean)
    }
}

impl ResolveCmd {
    fn run(&self) -> anyhow::Result<bool> {
        let ctx = EngineContext::new(FsSchemaService::new());
        let root = load_schema(&ctx, &self.schema)?;
        let result = engine::detailed_resolve(&ctx, &root, &PointerPosition::parse(&self.pointer));
        let report = ResolveReport {
            schemas: result.schemas.iter().map(|s| s.key().to_string()).collect(),
            excluding_schemas: result
                .excluding_schemas
                .iter()
                .map(|group| group.iter().map(|s| s.key().to_string()).collect())
                .collect(),
        };
        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Text => {
                if result.is_empty() {
                    println!("{}", "nothing applies at this position".yellow());
                }
                let line = |schema: &Schema| match schema.type_description(true) {
                    Some(kind) => format!("{} {}", schema.key(), kind.dimmed()),
                    None => schema.key().to_string(),
                };
                for schema in &result.schemas {
                    println!("{}", line(schema));
                }
                for (idx, group) in result.excluding_schemas.iter().enumerate() {
                    println!("{}", format!("one of (group {idx}):").bold());
                    for schema in group {
                        println!("  {}", line(schema));
                    }
                }
            }
        }
        Ok(!result.is_empty())
    }
}

impl CheckSchemaCmd {
    fn run(&self) -> anyhow::Result<bool> {
        let ctx = EngineContext::new(FsSchemaService::new());
        let root = load_schema(&ctx, &self.schema)?;
        let dangling = dangling_references(&ctx, &root);
        for (key, reference) in &dangling {
            println!("{} {key}: unresolved reference `{reference}`", "warning:".yellow().bold());
        }
        if dangling.is_empty() {
            println!("{} {}", "ok:".green().bold(), self.schema.display());
        }
        Ok(dangling.is_empty())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    /// Returns whether the command found nothing to complain about.
    pub fn run(&self) -> anyhow::Result<bool> {
        match &self.cmd {
            Command::Validate(target) => target.run(),
            Command::Resolve(target) => target.run(),
            Command::CheckSchema(target) => target.run(),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn local_file_id(path: &Path) -> anyhow::Result<FileId> {
    FsSchemaService::file_id(path).ok_or_else(|| anyhow!("not a usable local path: {}", path.display()))
}

fn load_schema(ctx: &EngineContext, path: &Path) -> anyhow::Result<Schema> {
    let file = local_file_id(path)?;
    ctx.schema_for_file(&file).with_context(|| format!("failed to load schema {}", path.display()))
}

fn validate_file(
    ctx: &EngineContext,
    path: &Path,
    schema_file: &FileId,
    dialect: Option<Dialect>,
    options: ComplianceOptions,
) -> anyhow::Result<Vec<Diagnostic>> {
    let schema = ctx.schema_for_file(schema_file).with_context(|| format!("failed to load schema {schema_file}"))?;
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let dialect = dialect.unwrap_or_else(|| detect_dialect(path, &text));
    let document = Document::parse(&text, dialect).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(engine::validate(ctx, &document, &schema, options)?)
}

fn print_report(report: &FileReport) {
    if let Some(error) = &report.error {
        println!("{}: {} {error}", report.file.bold(), "error:".red().bold());
        return;
    }
    if report.diagnostics.is_empty() {
        println!("{}: {}", report.file.bold(), "ok".green());
        return;
    }
    for diagnostic in &report.diagnostics {
        let label = match diagnostic.priority() {
            Priority::NotSchema | Priority::TypeMismatch => "error:".red().bold(),
            Priority::Medium | Priority::MissingProps => "error:".red(),
            Priority::Low => "warning:".yellow(),
        };
        // multi-line messages are indented under the location
        let message = diagnostic.message().replace('\n', "\n    ");
        println!("{}{}: {label} {message}", report.file.bold(), diagnostic.anchor.pointer.dimmed());
    }
}

/// Every `$ref` reachable inside `root` that does not resolve.
fn dangling_references(ctx: &EngineContext, root: &Schema) -> Vec<(SchemaKey, String)> {
    let mut seen = HashSet::new();
    let mut queue = vec![root.clone()];
    let mut dangling = Vec::new();
    while let Some(schema) = queue.pop() {
        if !seen.insert(schema.key().clone()) {
            continue;
        }
        if let Some(reference) = &schema.reference {
            if ctx.resolve_ref_schema(&schema).is_none() {
                dangling.push((schema.key().clone(), reference.clone()));
            }
        }
        queue.extend(schema.properties.values().cloned());
        queue.extend(schema.pattern_properties.iter().flat_map(|p| p.schemas().values().cloned()));
        queue.extend(schema.definitions.iter().flat_map(|d| d.values().cloned()));
        queue.extend(schema.schema_dependencies.iter().flat_map(|d| d.values().cloned()));
        queue.extend(schema.items_schema_list.iter().flatten().cloned());
        for list in [&schema.all_of, &schema.any_of, &schema.one_of] {
            queue.extend(list.iter().flatten().cloned());
        }
        queue.extend(
            [
                &schema.additional_properties_schema,
                &schema.property_names_schema,
                &schema.items_schema,
                &schema.additional_items_schema,
                &schema.contains_schema,
                &schema.not,
                &schema.if_schema,
                &schema.then_schema,
                &schema.else_schema,
            ]
            .into_iter()
            .flatten()
            .cloned(),
        );
    }
    dangling.sort();
    dangling
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let before = out.len();
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
            }
            if out.len() == before {
                // an explicit glob that matched nothing is a mistake worth surfacing
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::InMemorySchemaService;
    use crate::reader::read_value;
    use serde_json::json;

    #[test]
    fn glob_inputs_expand() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.json", "b.json", "c.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let pattern = format!("{}/*.json", dir.path().display());
        let found = resolve_file_path_patterns([pattern.as_str()]).unwrap();
        assert_eq!(found.len(), 2);

        let none = format!("{}/*.yaml", dir.path().display());
        assert!(resolve_file_path_patterns([none.as_str()]).is_err());
        assert_eq!(resolve_file_path_patterns(["plain.json"]).unwrap(), vec![PathBuf::from("plain.json")]);
    }

    #[test]
    fn finds_dangling_references() {
        let ctx = EngineContext::new(InMemorySchemaService::new());
        let root = read_value(
            FileId::new("mem://check"),
            json!({
                "definitions": {"ok": {"type": "string"}},
                "properties": {
                    "a": {"$ref": "#/definitions/ok"},
                    "b": {"items": {"$ref": "#/definitions/missing"}}
                }
            }),
        );
        ctx.adopt_root(&root);
        let dangling = dangling_references(&ctx, &root);
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].1, "#/definitions/missing");
    }

    #[test]
    fn parses_validate_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "cirjson-schema",
            "validate",
            "--schema",
            "s.json",
            "--input",
            "a.json",
            "b.json",
            "--strict",
            "--format",
            "json",
        ])
        .unwrap();
        let Command::Validate(cmd) = cli.cmd else {
            panic!("expected validate");
        };
        assert_eq!(cmd.input, vec!["a.json", "b.json"]);
        assert!(cmd.options().force_strict);
        assert_eq!(cmd.format, OutputFormat::Json);
    }
}
