//! JSON import/export of whole documents.
//!
//! Export is the plain document state plus an `_exportMetadata` object.
//! Import is lenient: the file is rejected only if it is not JSON, not an
//! object, or has no `rows` array. Everything below that is sanitized to
//! the canonical shape with defaults instead of failing the import.

use crate::id_generator::IdGenerator;
use crate::model::{
    clamp_column_ratio, Block, BlockContent, BlockType, DocumentState, NestedContent, Row,
    DEFAULT_COLUMN_RATIO, MAX_BLOCKS_PER_ROW,
};
use crate::mutations::{ensure_not_empty, DEFAULT_CATEGORY};
use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{info, instrument};

pub const EXPORT_FORMAT_VERSION: &str = "1.0";
pub const EXPORT_METADATA_KEY: &str = "_exportMetadata";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to parse import file: {source}{}", format_hint(.hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },

    #[error("Import file must contain a JSON object at the top level")]
    NotAnObject,

    #[error("Import file has no `rows` array")]
    RowsNotArray,
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but has unexpected value types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the file truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        ImportError::Parse { source: e, hint }
    }
}

/// Serialize a document for download, stamped with export metadata
#[instrument(skip(state), fields(rows = state.rows.len()))]
pub fn export_as_json(
    state: &DocumentState,
    exported_at: i64,
) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(state)?;
    if let Value::Object(map) = &mut value {
        map.insert(
            EXPORT_METADATA_KEY.to_string(),
            json!({
                "version": EXPORT_FORMAT_VERSION,
                "exportDate": export_date(exported_at),
            }),
        );
    }
    serde_json::to_string_pretty(&value)
}

fn export_date(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse and sanitize an import file. The caller's state is not touched on error.
#[instrument(skip(input, ids), fields(bytes = input.len()))]
pub fn import_from_json(input: &str, ids: &mut IdGenerator) -> Result<DocumentState, ImportError> {
    let value: Value = serde_json::from_str(input)?;
    import_from_value(&value, ids)
}

pub fn import_from_value(
    value: &Value,
    ids: &mut IdGenerator,
) -> Result<DocumentState, ImportError> {
    let obj = value.as_object().ok_or(ImportError::NotAnObject)?;
    let raw_rows = obj
        .get("rows")
        .and_then(Value::as_array)
        .ok_or(ImportError::RowsNotArray)?;

    let mut existing = Vec::new();
    collect_ids(value, &mut existing);
    ids.observe(existing);

    let mut sanitizer = Sanitizer {
        ids,
        seen: HashSet::new(),
    };
    let rows: Vec<Row> = raw_rows.iter().flat_map(|raw| sanitizer.row(raw)).collect();

    let mut state = DocumentState {
        rows,
        header_title: string_field(obj, "headerTitle"),
        header_stand: string_field(obj, "headerStand"),
        header_logo: obj
            .get("headerLogo")
            .and_then(Value::as_str)
            .map(str::to_string),
        footer_variants: footer_variants(obj),
        signature_data: page_map(obj.get("signatureData"))
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(page, v)| (page, v.clone()))
            .collect(),
    };
    ensure_not_empty(&mut state, sanitizer.ids);

    info!(
        rows = state.rows.len(),
        blocks = state.block_count(),
        "Imported document"
    );
    Ok(state)
}

fn collect_ids<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("id") {
                out.push(id);
            }
            for child in map.values() {
                collect_ids(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_ids(item, out);
            }
        }
        _ => {}
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Entries of a `{ "<page>": value }` object with valid 1-based page keys
fn page_map(raw: Option<&Value>) -> Vec<(u32, &Value)> {
    let Some(map) = raw.and_then(Value::as_object) else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| match key.parse::<u32>() {
            Ok(page) if page >= 1 => Some((page, value)),
            _ => None,
        })
        .collect()
}

/// `footerVariants` wins over the older singular `footerVariant`, which may
/// be a page map or a single variant for the first page.
fn footer_variants(obj: &Map<String, Value>) -> BTreeMap<u32, String> {
    let mut variants = BTreeMap::new();

    match obj.get("footerVariant") {
        Some(Value::String(variant)) => {
            variants.insert(1, variant.clone());
        }
        Some(other) => {
            for (page, value) in page_map(Some(other)) {
                if let Some(variant) = value.as_str() {
                    variants.insert(page, variant.to_string());
                }
            }
        }
        None => {}
    }

    for (page, value) in page_map(obj.get("footerVariants")) {
        if let Some(variant) = value.as_str() {
            variants.insert(page, variant.to_string());
        }
    }

    variants
}

struct Sanitizer<'a> {
    ids: &'a mut IdGenerator,
    seen: HashSet<String>,
}

impl Sanitizer<'_> {
    /// Keep a usable id, or mint one if it is missing or already taken
    fn id(&mut self, raw: Option<&Value>) -> String {
        if let Some(id) = raw.and_then(Value::as_str) {
            if !id.is_empty() && self.seen.insert(id.to_string()) {
                return id.to_string();
            }
        }
        loop {
            let id = self.ids.new_id();
            if self.seen.insert(id.clone()) {
                return id;
            }
        }
    }

    /// One imported row; oversized rows are split, empty rows vanish
    fn row(&mut self, raw: &Value) -> Vec<Row> {
        let Some(obj) = raw.as_object() else {
            return Vec::new();
        };

        let id = self.id(obj.get("id"));
        let column_ratio = obj
            .get("columnRatio")
            .and_then(Value::as_f64)
            .map(clamp_column_ratio)
            .unwrap_or(DEFAULT_COLUMN_RATIO);

        let blocks: Vec<Block> = match obj.get("blocks").and_then(Value::as_array) {
            Some(raw_blocks) => raw_blocks.iter().filter_map(|b| self.block(b)).collect(),
            None => Vec::new(),
        };

        let mut rows = Vec::new();
        let mut remaining = blocks.into_iter().peekable();
        while remaining.peek().is_some() {
            let chunk: Vec<Block> = remaining.by_ref().take(MAX_BLOCKS_PER_ROW).collect();
            let row_id = if rows.is_empty() {
                id.clone()
            } else {
                self.id(None)
            };
            rows.push(Row {
                id: row_id,
                column_ratio,
                blocks: chunk,
            });
        }
        rows
    }

    fn block(&mut self, raw: &Value) -> Option<Block> {
        let obj = raw.as_object()?;
        let id = self.id(obj.get("id"));
        let block_type = obj
            .get("type")
            .and_then(Value::as_str)
            .and_then(BlockType::parse)
            .unwrap_or(BlockType::Text);
        let content = self.content(block_type, obj.get("content"));
        Some(Block::new(id, block_type, content))
    }

    fn content(&mut self, block_type: BlockType, raw: Option<&Value>) -> BlockContent {
        match raw {
            None | Some(Value::Null) => self.default_content(block_type),
            Some(Value::String(text)) => BlockContent::Text(text.clone()),
            Some(Value::Object(map)) if block_type.is_container() => {
                let blocks = match map.get("blocks").and_then(Value::as_array) {
                    Some(raw_blocks) => raw_blocks.iter().filter_map(|b| self.block(b)).collect(),
                    None => Vec::new(),
                };
                let category = map
                    .get("category")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let extra = map
                    .iter()
                    .filter(|(key, _)| key.as_str() != "blocks" && key.as_str() != "category")
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                BlockContent::Nested(NestedContent {
                    category,
                    blocks,
                    extra,
                })
            }
            Some(other) => BlockContent::Structured(other.clone()),
        }
    }

    fn default_content(&mut self, block_type: BlockType) -> BlockContent {
        if !block_type.is_container() {
            return BlockContent::empty();
        }
        let text_id = self.id(None);
        BlockContent::Nested(NestedContent {
            category: (block_type == BlockType::ContentBox).then(|| DEFAULT_CATEGORY.to_string()),
            blocks: vec![Block::empty(text_id, BlockType::Text)],
            extra: Map::new(),
        })
    }
}
