//! Disassembly documents
//!
//! The driver returns the disassembly of a whole pipeline as one XML document with
//! a section per stage, keyed by the stage tag:
//!
//! ```xml
//! <Disassembly>
//!   <VS><![CDATA[ ... ]]></VS>
//!   <PS><![CDATA[ ... ]]></PS>
//! </Disassembly>
//! ```
//!
//! Only the few constructs the driver emits are understood: stage elements,
//! CDATA sections, and the predefined and numeric character references.

use crate::config::ShaderStage;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static STAGE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<(?<tag>VS|HS|DS|GS|PS|CS)\b[^>]*>").expect("stage tag pattern is valid"));

static CDATA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(?<text>.*?)\]\]>").expect("CDATA pattern is valid"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

static ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&(?<name>#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("entity pattern is valid"));

/// Splits a pipeline disassembly document into per-stage text
///
/// A section runs from a stage's opening tag to the closing tag of the same
/// stage. An opening tag without one is logged and skipped, and scanning resumes
/// right after it so that sections nested inside are still found.
///
/// # Returns
/// `(stage, text)` pairs in document order
pub fn split_stages(document: &str) -> Vec<(ShaderStage, String)> {
    // ASCII lowering keeps byte offsets valid for `document`
    let lower = document.to_ascii_lowercase();
    let mut stages = Vec::new();
    let mut position = 0;

    while let Some(caps) = STAGE_OPEN.captures_at(document, position) {
        let (Some(open), Some(tag)) = (caps.get(0), caps.name("tag")) else {
            break;
        };
        let Some(stage) = ShaderStage::from_tag(tag.as_str()) else {
            position = open.end();
            continue;
        };

        match closing_tag(&lower, open.end(), &tag.as_str().to_ascii_lowercase()) {
            Some((start, end)) => {
                stages.push((stage, decode_text(&document[open.end()..start])));
                position = end;
            }
            None => {
                tracing::warn!("Disassembly section <{}> at byte {} has no closing tag; skipping it", tag.as_str(), open.start());
                position = open.end();
            }
        }
    }
    stages
}

/// Finds `</tag>` at or after `from`, allowing whitespace before `>`
///
/// # Returns
/// Byte range of the closing tag
fn closing_tag(lower: &str, from: usize, tag: &str) -> Option<(usize, usize)> {
    let needle = format!("</{tag}");
    let mut offset = from;
    while let Some(found) = lower[offset..].find(&needle) {
        let start = offset + found;
        let rest = &lower[start + needle.len()..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with('>') {
            return Some((start, lower.len() - trimmed.len() + 1));
        }
        offset = start + needle.len();
    }
    None
}

/// Text content of a whole document, for disassembly that is not split by stage
pub fn document_text(document: &str) -> String {
    decode_text(document)
}

/// Decodes element content: CDATA is taken literally, markup elsewhere is
/// dropped and character references are resolved. Trailing newlines are trimmed.
fn decode_text(content: &str) -> String {
    let mut text = String::with_capacity(content.len());
    let mut last = 0;
    for caps in CDATA.captures_iter(content) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.name("text")) else {
            continue;
        };
        text.push_str(&decode_markup(&content[last..whole.start()]));
        text.push_str(inner.as_str());
        last = whole.end();
    }
    text.push_str(&decode_markup(&content[last..]));

    let trimmed = text.trim_end_matches(['\n', '\r']).len();
    text.truncate(trimmed);
    text
}

fn decode_markup(markup: &str) -> String {
    let without_tags = TAG.replace_all(markup, "");
    ENTITY.replace_all(&without_tags, |caps: &Captures| decode_entity(&caps["name"]).unwrap_or_else(|| caps[0].to_string())).into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some(c.to_string())
}
