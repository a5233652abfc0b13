//! Configuration compiler: request options → two YAML documents for pandoc.
//!
//! pandoc reads conversion behaviour from a *defaults file* (`--defaults`)
//! and document variables from a *metadata file* (`--metadata-file`). The
//! keys below are pandoc's and eisvogel's own names and must stay exactly as
//! written; serde's `kebab-case` renaming produces them from the struct
//! fields.
//!
//! Defaulting is total: whatever the client omits, both documents come out
//! fully populated. The only input that is not a pure function of the request
//! is the date, so it is passed in by the caller.

use crate::error::Md2PdfError;
use crate::options::{DocumentMetadata, PandocOptions};
use crate::pipeline::invoke::ConverterView;
use crate::pipeline::workspace::{sanitize_filename, Workspace, OUTPUT_DIR};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Output name used when the client does not supply one.
pub const DEFAULT_OUTPUT_FILE: &str = "output.pdf";
/// pandoc template selected for every conversion.
pub const TEMPLATE_NAME: &str = "eisvogel";

const DEFAULT_TITLE: &str = "Untitled Document";
const DEFAULT_AUTHOR: &str = "Unknown";
const DEFAULT_LANG: &str = "en";
const DEFAULT_FONTSIZE: &str = "11pt";
const TITLEPAGE_RULE_COLOR: &str = "360049";
const TITLEPAGE_BACKGROUND: &str = "example-background.pdf";
const PAGE_BACKGROUND: &str = "example-page-background.pdf";

/// The defaults document (`pandoc.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DefaultsDocument {
    pub from: String,
    pub output_file: PathBuf,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_engine: Option<String>,
    pub variables: BTreeMap<String, String>,
    pub table_of_contents: bool,
    pub toc_depth: u8,
    pub number_sections: bool,
    pub listings: bool,
    pub reference_links: bool,
}

/// The metadata document (`eisvogel.yaml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetadataDocument {
    pub title: String,
    pub author: Vec<String>,
    pub date: String,
    pub subject: String,
    pub keywords: Vec<String>,
    pub subtitle: String,
    pub lang: String,
    pub titlepage: bool,
    pub titlepage_rule_color: String,
    pub titlepage_rule_height: u32,
    pub titlepage_background: PathBuf,
    pub page_background: PathBuf,
    pub page_background_opacity: f64,
    pub toc_own_page: bool,
    pub fontsize: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mainfont: Option<String>,
}

/// Both documents as written into a workspace.
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    /// Host path of `pandoc.yaml`.
    pub defaults_path: PathBuf,
    /// Host path of `eisvogel.yaml`.
    pub metadata_path: PathBuf,
    /// Sanitised output file name inside `output/`.
    pub output_file: String,
    pub defaults: DefaultsDocument,
    pub metadata: MetadataDocument,
}

/// Sanitised output file name for `options`.
pub fn output_file_name(options: &PandocOptions) -> String {
    match options.output_file.trim() {
        "" => DEFAULT_OUTPUT_FILE.to_string(),
        name => sanitize_filename(name),
    }
}

/// Build the defaults document. `view` is how the converter sees the workspace.
pub fn build_defaults(
    options: &PandocOptions,
    view: &ConverterView,
    pdf_engine: Option<&str>,
) -> DefaultsDocument {
    let variables = BTreeMap::from([
        ("linkcolor".to_string(), "blue".to_string()),
        ("urlcolor".to_string(), "blue".to_string()),
    ]);

    DefaultsDocument {
        from: "markdown".to_string(),
        output_file: view
            .workspace
            .join(OUTPUT_DIR)
            .join(output_file_name(options)),
        template: TEMPLATE_NAME.to_string(),
        pdf_engine: pdf_engine.map(str::to_string),
        variables,
        table_of_contents: options.table_of_contents,
        toc_depth: options.effective_toc_depth(),
        number_sections: options.number_sections,
        listings: options.listings,
        reference_links: options.reference_links,
    }
}

/// Build the metadata document, applying every default.
pub fn build_metadata(
    metadata: &DocumentMetadata,
    view: &ConverterView,
    today: NaiveDate,
) -> MetadataDocument {
    MetadataDocument {
        title: text(&metadata.title, DEFAULT_TITLE),
        author: vec![text(&metadata.author, DEFAULT_AUTHOR)],
        date: non_empty(&metadata.date)
            .map(str::to_string)
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string()),
        subject: text(&metadata.subject, ""),
        keywords: metadata.keywords.clone(),
        subtitle: text(&metadata.subtitle, ""),
        lang: text(&metadata.lang, DEFAULT_LANG),
        titlepage: metadata.titlepage != Some(false),
        titlepage_rule_color: TITLEPAGE_RULE_COLOR.to_string(),
        titlepage_rule_height: 0,
        titlepage_background: view.templates.join(TITLEPAGE_BACKGROUND),
        page_background: view.templates.join(PAGE_BACKGROUND),
        page_background_opacity: 1.0,
        toc_own_page: true,
        fontsize: text(&metadata.fontsize, DEFAULT_FONTSIZE),
        mainfont: non_empty(&metadata.mainfont).map(str::to_string),
    }
}

/// Compile both documents and write them into `workspace`.
pub async fn compile(
    options: &PandocOptions,
    metadata: &DocumentMetadata,
    workspace: &Workspace,
    view: &ConverterView,
    pdf_engine: Option<&str>,
    today: NaiveDate,
) -> Result<CompiledConfig, Md2PdfError> {
    let defaults = build_defaults(options, view, pdf_engine);
    let meta = build_metadata(metadata, view, today);

    let defaults_path = workspace.defaults_path();
    let metadata_path = workspace.metadata_path();
    write_yaml(&defaults_path, &defaults).await?;
    write_yaml(&metadata_path, &meta).await?;
    debug!(
        "Compiled {} and {} for workspace {}",
        defaults_path.display(),
        metadata_path.display(),
        workspace.id()
    );

    Ok(CompiledConfig {
        defaults_path,
        metadata_path,
        output_file: output_file_name(options),
        defaults,
        metadata: meta,
    })
}

async fn write_yaml<T: Serialize>(path: &Path, doc: &T) -> Result<(), Md2PdfError> {
    let yaml = serde_yaml::to_string(doc)
        .map_err(|e| Md2PdfError::Internal(format!("YAML serialisation failed: {e}")))?;
    tokio::fs::write(path, yaml)
        .await
        .map_err(|e| Md2PdfError::io("Failed to write configuration document", path, e))
}

fn text(v: &Option<String>, fallback: &str) -> String {
    non_empty(v).unwrap_or(fallback).to_string()
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container_view() -> ConverterView {
        ConverterView {
            workspace: PathBuf::from("/workspace/3f2c"),
            templates: PathBuf::from("/templates"),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn defaults_document_maps_every_option() {
        let opts = PandocOptions {
            output_file: "report.pdf".into(),
            table_of_contents: true,
            toc_depth: 2,
            number_sections: true,
            listings: true,
            reference_links: true,
        };
        let doc = build_defaults(&opts, &container_view(), None);

        assert_eq!(doc.from, "markdown");
        assert_eq!(doc.output_file, PathBuf::from("/workspace/3f2c/output/report.pdf"));
        assert_eq!(doc.template, "eisvogel");
        assert_eq!(doc.variables["linkcolor"], "blue");
        assert_eq!(doc.variables["urlcolor"], "blue");
        assert!(doc.table_of_contents && doc.number_sections && doc.listings && doc.reference_links);
        assert_eq!(doc.toc_depth, 2);
        assert!(doc.pdf_engine.is_none());
    }

    #[test]
    fn defaults_yaml_uses_pandoc_key_names() {
        let doc = build_defaults(&PandocOptions::default(), &container_view(), Some("xelatex"));
        let yaml = serde_yaml::to_string(&doc).unwrap();

        for key in [
            "from: markdown",
            "output-file: /workspace/3f2c/output/output.pdf",
            "template: eisvogel",
            "pdf-engine: xelatex",
            "table-of-contents: true",
            "toc-depth: 2",
            "number-sections: true",
            "listings: true",
            "reference-links: true",
        ] {
            assert!(yaml.contains(key), "missing `{key}` in:\n{yaml}");
        }
    }

    #[test]
    fn output_file_is_sanitised_and_defaulted() {
        let evil = PandocOptions {
            output_file: "../../../tmp/owned.pdf".into(),
            ..PandocOptions::default()
        };
        let blank = PandocOptions {
            output_file: "   ".into(),
            ..PandocOptions::default()
        };
        assert_eq!(output_file_name(&evil), ".._.._.._tmp_owned.pdf");
        assert_eq!(output_file_name(&blank), "output.pdf");
    }

    #[test]
    fn metadata_defaults_are_total() {
        let doc = build_metadata(&DocumentMetadata::default(), &container_view(), day());

        assert_eq!(doc.title, "Untitled Document");
        assert_eq!(doc.author, vec!["Unknown"]);
        assert_eq!(doc.date, "2026-10-19");
        assert_eq!(doc.subject, "");
        assert!(doc.keywords.is_empty());
        assert_eq!(doc.subtitle, "");
        assert_eq!(doc.lang, "en");
        assert!(doc.titlepage);
        assert_eq!(doc.fontsize, "11pt");
        assert!(doc.mainfont.is_none());
        assert_eq!(doc.titlepage_background, PathBuf::from("/templates/example-background.pdf"));
        assert_eq!(doc.page_background, PathBuf::from("/templates/example-page-background.pdf"));
        assert!(doc.toc_own_page);
    }

    #[test]
    fn empty_strings_fall_back_to_defaults() {
        let meta = DocumentMetadata {
            title: Some("".into()),
            author: Some("  ".into()),
            date: Some("".into()),
            mainfont: Some("".into()),
            ..DocumentMetadata::default()
        };
        let doc = build_metadata(&meta, &container_view(), day());
        assert_eq!(doc.title, "Untitled Document");
        assert_eq!(doc.author, vec!["Unknown"]);
        assert_eq!(doc.date, "2026-10-19");
        assert!(doc.mainfont.is_none());
    }

    #[test]
    fn titlepage_only_disabled_when_explicitly_false() {
        let off = DocumentMetadata {
            titlepage: Some(false),
            ..DocumentMetadata::default()
        };
        let on = DocumentMetadata {
            titlepage: Some(true),
            ..DocumentMetadata::default()
        };
        assert!(!build_metadata(&off, &container_view(), day()).titlepage);
        assert!(build_metadata(&on, &container_view(), day()).titlepage);
    }

    #[test]
    fn supplied_metadata_is_carried_through() {
        let meta = DocumentMetadata {
            title: Some("Report".into()),
            author: Some("Jane".into()),
            date: Some("2024-01-31".into()),
            subject: Some("Quarterly".into()),
            subtitle: Some("Q4".into()),
            lang: Some("de".into()),
            fontsize: Some("12pt".into()),
            mainfont: Some("Liberation Serif".into()),
            keywords: vec!["finance".into(), "q4".into()],
            titlepage: None,
        };
        let doc = build_metadata(&meta, &container_view(), day());
        assert_eq!(doc.title, "Report");
        assert_eq!(doc.author, vec!["Jane"]);
        assert_eq!(doc.date, "2024-01-31");
        assert_eq!(doc.lang, "de");
        assert_eq!(doc.fontsize, "12pt");
        assert_eq!(doc.mainfont.as_deref(), Some("Liberation Serif"));
        assert_eq!(doc.keywords, vec!["finance", "q4"]);
    }

    #[test]
    fn rule_color_stays_a_string_in_yaml() {
        let doc = build_metadata(&DocumentMetadata::default(), &container_view(), day());
        let yaml = serde_yaml::to_string(&doc).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed["titlepage-rule-color"].as_str(), Some("360049"));
        assert_eq!(parsed["titlepage-rule-height"].as_u64(), Some(0));
        assert!(parsed.get("mainfont").is_none());
    }

    #[tokio::test]
    async fn compile_is_deterministic_for_fixed_date() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path()).await.unwrap();
        let opts = PandocOptions::default();
        let meta = DocumentMetadata {
            title: Some("Report".into()),
            ..DocumentMetadata::default()
        };

        let first = compile(&opts, &meta, &ws, &container_view(), None, day()).await.unwrap();
        let a = (
            std::fs::read_to_string(&first.defaults_path).unwrap(),
            std::fs::read_to_string(&first.metadata_path).unwrap(),
        );
        let second = compile(&opts, &meta, &ws, &container_view(), None, day()).await.unwrap();
        let b = (
            std::fs::read_to_string(&second.defaults_path).unwrap(),
            std::fs::read_to_string(&second.metadata_path).unwrap(),
        );

        assert_eq!(a, b);
        assert_eq!(first.defaults_path, ws.defaults_path());
        assert_eq!(first.metadata_path, ws.metadata_path());
        let reparsed: DefaultsDocument = serde_yaml::from_str(&a.0).unwrap();
        assert_eq!(reparsed, first.defaults);
    }
}
