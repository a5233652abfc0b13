//! Per-request conversion inputs.
//!
//! A [`ConversionRequest`] is what a client submits: an ordered list of
//! Markdown files plus two option records. The records mirror the JSON the
//! web front-end posts (`pandocConfig` / `eisvogelConfig`), so field names
//! are camelCase on the wire. Every field is optional there; missing values
//! fall back to the same defaults the front-end pre-fills.

use crate::error::Md2PdfError;
use serde::{Deserialize, Serialize};

/// Smallest and largest TOC depth pandoc accepts.
pub const TOC_DEPTH_RANGE: std::ops::RangeInclusive<i64> = 1..=6;

/// Behaviour switches for the converter (the "defaults" document).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PandocOptions {
    /// Name of the produced PDF. Sanitised before use. Default: `output.pdf`.
    pub output_file: String,
    /// Emit a table of contents. Default: true.
    pub table_of_contents: bool,
    /// Heading depth included in the TOC, clamped to 1–6. Default: 2.
    pub toc_depth: i64,
    /// Number section headings. Default: true.
    pub number_sections: bool,
    /// Typeset code blocks with the LaTeX `listings` package. Default: true.
    pub listings: bool,
    /// Use reference-style links instead of inline links. Default: true.
    pub reference_links: bool,
}

impl Default for PandocOptions {
    fn default() -> Self {
        Self {
            output_file: "output.pdf".to_string(),
            table_of_contents: true,
            toc_depth: 2,
            number_sections: true,
            listings: true,
            reference_links: true,
        }
    }
}

impl PandocOptions {
    /// Parse the `pandocConfig` form field.
    pub fn from_json(raw: &str) -> Result<Self, Md2PdfError> {
        serde_json::from_str(raw)
            .map_err(|e| Md2PdfError::Validation(format!("Malformed pandocConfig: {e}")))
    }

    /// TOC depth clamped into the range pandoc accepts.
    pub fn effective_toc_depth(&self) -> u8 {
        self.toc_depth
            .clamp(*TOC_DEPTH_RANGE.start(), *TOC_DEPTH_RANGE.end()) as u8
    }
}

/// Document metadata for the eisvogel template (the "metadata" document).
///
/// Empty strings are treated the same as absent values; the configuration
/// compiler fills in defaults for both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    /// ISO date (`YYYY-MM-DD`). Defaults to the conversion date.
    pub date: Option<String>,
    pub subject: Option<String>,
    pub subtitle: Option<String>,
    pub lang: Option<String>,
    pub fontsize: Option<String>,
    /// Main font override, e.g. "Liberation Serif". None keeps Latin Modern.
    pub mainfont: Option<String>,
    pub keywords: Vec<String>,
    /// Render a title page. Absent means true.
    pub titlepage: Option<bool>,
}

impl DocumentMetadata {
    /// Parse the `eisvogelConfig` form field.
    pub fn from_json(raw: &str) -> Result<Self, Md2PdfError> {
        serde_json::from_str(raw)
            .map_err(|e| Md2PdfError::Validation(format!("Malformed eisvogelConfig: {e}")))
    }
}

/// One uploaded Markdown file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Client-supplied name, unsanitised.
    pub name: String,
    pub content: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A complete, validated conversion request.
///
/// File order is document order: pandoc concatenates inputs in the sequence
/// given here.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    files: Vec<InputFile>,
    options: PandocOptions,
    metadata: DocumentMetadata,
}

impl ConversionRequest {
    /// Build a request. Fails with [`Md2PdfError::Validation`] when `files` is empty.
    pub fn new(
        files: Vec<InputFile>,
        options: PandocOptions,
        metadata: DocumentMetadata,
    ) -> Result<Self, Md2PdfError> {
        if files.is_empty() {
            return Err(Md2PdfError::Validation("No files provided".into()));
        }
        Ok(Self {
            files,
            options,
            metadata,
        })
    }

    pub fn files(&self) -> &[InputFile] {
        &self.files
    }

    pub fn options(&self) -> &PandocOptions {
        &self.options
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_list_is_rejected() {
        let err = ConversionRequest::new(vec![], PandocOptions::default(), DocumentMetadata::default())
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::Validation(ref m) if m == "No files provided"));
    }

    #[test]
    fn pandoc_options_parse_camel_case() {
        let opts = PandocOptions::from_json(
            r#"{"outputFile":"report.pdf","tableOfContents":false,"tocDepth":3,
                "numberSections":false,"listings":false,"referenceLinks":false}"#,
        )
        .unwrap();
        assert_eq!(opts.output_file, "report.pdf");
        assert!(!opts.table_of_contents);
        assert_eq!(opts.effective_toc_depth(), 3);
        assert!(!opts.number_sections && !opts.listings && !opts.reference_links);
    }

    #[test]
    fn pandoc_options_missing_fields_take_defaults() {
        let opts = PandocOptions::from_json(r#"{"outputFile":"a.pdf"}"#).unwrap();
        assert_eq!(
            opts,
            PandocOptions {
                output_file: "a.pdf".into(),
                ..PandocOptions::default()
            }
        );
    }

    #[test]
    fn toc_depth_is_clamped() {
        let deep = PandocOptions {
            toc_depth: 42,
            ..PandocOptions::default()
        };
        let shallow = PandocOptions {
            toc_depth: -3,
            ..PandocOptions::default()
        };
        assert_eq!(deep.effective_toc_depth(), 6);
        assert_eq!(shallow.effective_toc_depth(), 1);
    }

    #[test]
    fn malformed_json_is_a_validation_error() {
        assert!(matches!(
            PandocOptions::from_json("{not json"),
            Err(Md2PdfError::Validation(_))
        ));
        assert!(matches!(
            DocumentMetadata::from_json(r#"{"keywords":"not-a-list"}"#),
            Err(Md2PdfError::Validation(_))
        ));
    }

    #[test]
    fn metadata_parses_front_end_payload() {
        let meta = DocumentMetadata::from_json(
            r#"{"title":"Report","author":"Jane","date":"","subject":"","keywords":["a","b"],
                "subtitle":"","lang":"de","titlepage":false,"fontsize":"12pt","mainfont":"Liberation Serif"}"#,
        )
        .unwrap();
        assert_eq!(meta.title.as_deref(), Some("Report"));
        assert_eq!(meta.date.as_deref(), Some(""));
        assert_eq!(meta.keywords, vec!["a", "b"]);
        assert_eq!(meta.titlepage, Some(false));
        assert_eq!(meta.mainfont.as_deref(), Some("Liberation Serif"));
    }
}
