//! Mapping profiles and their field rules, exactly as the profile catalogue
//! stores them. Nothing here interprets a rule; see [`crate::mapping`].

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Bit 0 of the profile flags: the first row of the file is a header.
pub const HEADER_FLAG: i32 = 0b1;

/// Rule kind discriminators as stored in the field-mapping table.
pub const RULE_KIND_INDEXED: i32 = 0;
pub const RULE_KIND_CONSTANT: i32 = 1;

/// Used when a profile has no delimiter descriptor.
pub const DEFAULT_DELIMITER: u8 = b',';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Delimited,
    Spreadsheet,
}

impl FileKind {
    /// `FileTypeID` 0 is delimited text; every other id is read as a workbook.
    pub fn from_type_id(id: i32) -> Self {
        if id == 0 {
            FileKind::Delimited
        } else {
            FileKind::Spreadsheet
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingProfile {
    pub id: i64,
    pub file_kind: FileKind,
    /// Glob pattern selecting the supplier's files.
    pub path_pattern: String,
    /// Delimiter descriptor (`;`, `tab`, `comma`, ...).
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub delimiter_name: Option<String>,
    #[serde(default)]
    pub flags: i32,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl MappingProfile {
    pub fn has_header(&self) -> bool {
        self.flags & HEADER_FLAG != 0
    }

    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_deref() {
            None => Ok(DEFAULT_DELIMITER),
            Some(descriptor) => parse_delimiter_descriptor(descriptor),
        }
    }

    pub fn delimiter_label(&self) -> String {
        self.delimiter_name
            .clone()
            .or_else(|| self.delimiter.clone())
            .unwrap_or_else(|| (DEFAULT_DELIMITER as char).to_string())
    }
}

/// Parses the catalogue's delimiter brief. Whitespace is significant only when
/// the brief is a lone space or tab.
pub fn parse_delimiter_descriptor(descriptor: &str) -> Result<u8> {
    if descriptor == " " || descriptor == "\t" {
        return Ok(descriptor.as_bytes()[0]);
    }
    let trimmed = descriptor.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" => Ok(DEFAULT_DELIMITER),
        "tab" | "\\t" => Ok(b'\t'),
        "comma" => Ok(b','),
        "semicolon" => Ok(b';'),
        "pipe" => Ok(b'|'),
        "space" => Ok(b' '),
        _ => {
            let mut chars = trimmed.chars();
            let first = chars
                .next()
                .ok_or_else(|| anyhow!("Delimiter cannot be empty"))?;
            if chars.next().is_some() || !first.is_ascii() {
                return Err(anyhow!(
                    "Unsupported delimiter descriptor '{descriptor}'"
                ));
            }
            Ok(first as u8)
        }
    }
}

/// One row of the field-mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMappingRule {
    pub target_field: String,
    /// Declared SQL type of the target field, e.g. `varchar(40)`.
    #[serde(default)]
    pub declared_type: Option<String>,
    /// 0 = indexed column, 1 = constant value.
    pub kind: i32,
    /// 1-based column position or the literal, depending on `kind`.
    #[serde(default)]
    pub value: Option<String>,
}

impl FieldMappingRule {
    pub fn indexed(target_field: &str, declared_type: &str, position: usize) -> Self {
        Self {
            target_field: target_field.to_string(),
            declared_type: Some(declared_type.to_string()),
            kind: RULE_KIND_INDEXED,
            value: Some(position.to_string()),
        }
    }

    pub fn constant(target_field: &str, declared_type: &str, literal: &str) -> Self {
        Self {
            target_field: target_field.to_string(),
            declared_type: Some(declared_type.to_string()),
            kind: RULE_KIND_CONSTANT,
            value: Some(literal.to_string()),
        }
    }
}

/// A profile together with its rules, as kept in a YAML file for offline previews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileDocument {
    pub profile: MappingProfile,
    #[serde(default)]
    pub rules: Vec<FieldMappingRule>,
}

impl ProfileDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening profile file {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing profile YAML")
    }
}
