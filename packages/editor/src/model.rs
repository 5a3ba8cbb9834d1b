//! # Row/Block Data Model
//!
//! The structural representation of an SOP document: an ordered list of
//! rows, each holding one or two typed blocks.
//!
//! ```text
//! DocumentState
//!   ├─ header (title, stand, logo)
//!   ├─ rows: [Row]
//!   │    └─ blocks: [Block; 1..=2]
//!   ├─ footer_variants: page → variant
//!   └─ signature_data:  page → payload
//! ```
//!
//! Rows are laid out in reading order, which is also print order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub type BlockId = String;
pub type RowId = String;

/// Lower bound for a manually dragged column split.
pub const MIN_COLUMN_RATIO: f64 = 1.0 / 3.0;
/// Upper bound for a manually dragged column split.
pub const MAX_COLUMN_RATIO: f64 = 2.0 / 3.0;
pub const DEFAULT_COLUMN_RATIO: f64 = 0.5;
/// A row never holds more than this many blocks.
pub const MAX_BLOCKS_PER_ROW: usize = 2;

/// Content block kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Title,
    Heading,
    Text,
    Table,
    TiptapTable,
    List,
    Image,
    Divider,
    Flowchart,
    ContentBox,
    Source,
}

impl BlockType {
    pub const ALL: [BlockType; 11] = [
        BlockType::Title,
        BlockType::Heading,
        BlockType::Text,
        BlockType::Table,
        BlockType::TiptapTable,
        BlockType::List,
        BlockType::Image,
        BlockType::Divider,
        BlockType::Flowchart,
        BlockType::ContentBox,
        BlockType::Source,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::Title => "title",
            BlockType::Heading => "heading",
            BlockType::Text => "text",
            BlockType::Table => "table",
            BlockType::TiptapTable => "tiptaptable",
            BlockType::List => "list",
            BlockType::Image => "image",
            BlockType::Divider => "divider",
            BlockType::Flowchart => "flowchart",
            BlockType::ContentBox => "contentbox",
            BlockType::Source => "source",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Container blocks carry their own nested block list.
    pub fn is_container(self) -> bool {
        matches!(self, BlockType::ContentBox | BlockType::Source)
    }
}

/// Type-dependent block payload
///
/// Plain and rich-HTML text are both strings; container blocks hold nested
/// blocks; everything else (flowchart graphs, structured tables) is kept as
/// opaque JSON owned by the respective block editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockContent {
    Text(String),
    Nested(NestedContent),
    Structured(Value),
}

impl BlockContent {
    pub fn empty() -> Self {
        BlockContent::Text(String::new())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            BlockContent::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_nested(&self) -> Option<&NestedContent> {
        match self {
            BlockContent::Nested(nested) => Some(nested),
            _ => None,
        }
    }
}

impl Default for BlockContent {
    fn default() -> Self {
        Self::empty()
    }
}

/// Payload of `contentbox` and `source` blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    pub blocks: Vec<Block>,

    /// Editor-specific fields we carry through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Smallest addressable content unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,

    #[serde(rename = "type")]
    pub block_type: BlockType,

    #[serde(default)]
    pub content: BlockContent,
}

impl Block {
    pub fn new(id: impl Into<BlockId>, block_type: BlockType, content: BlockContent) -> Self {
        Self {
            id: id.into(),
            block_type,
            content,
        }
    }

    /// Block with an empty-string payload
    pub fn empty(id: impl Into<BlockId>, block_type: BlockType) -> Self {
        Self::new(id, block_type, BlockContent::empty())
    }

    /// Content box wrapping a single empty text block
    pub fn content_box(
        id: impl Into<BlockId>,
        category: impl Into<String>,
        text_id: impl Into<BlockId>,
    ) -> Self {
        Self::new(
            id,
            BlockType::ContentBox,
            BlockContent::Nested(NestedContent {
                category: Some(category.into()),
                blocks: vec![Block::empty(text_id, BlockType::Text)],
                extra: Map::new(),
            }),
        )
    }

    /// Category of a content box, if this is one
    pub fn category(&self) -> Option<&str> {
        if self.block_type != BlockType::ContentBox {
            return None;
        }
        self.content.as_nested()?.category.as_deref()
    }
}

/// Horizontal slot holding one or two blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub id: RowId,

    #[serde(default = "default_column_ratio")]
    pub column_ratio: f64,

    pub blocks: Vec<Block>,
}

fn default_column_ratio() -> f64 {
    DEFAULT_COLUMN_RATIO
}

impl Row {
    pub fn single(id: impl Into<RowId>, block: Block) -> Self {
        Self {
            id: id.into(),
            column_ratio: DEFAULT_COLUMN_RATIO,
            blocks: vec![block],
        }
    }

    pub fn is_two_column(&self) -> bool {
        self.blocks.len() == MAX_BLOCKS_PER_ROW
    }

    pub fn contains_block(&self, block_id: &str) -> bool {
        self.blocks.iter().any(|b| b.id == block_id)
    }
}

/// Clamp a column ratio to the manual-resize bounds
pub fn clamp_column_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return DEFAULT_COLUMN_RATIO;
    }
    ratio.clamp(MIN_COLUMN_RATIO, MAX_COLUMN_RATIO)
}

/// The unit tracked by history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    pub rows: Vec<Row>,

    #[serde(default)]
    pub header_title: String,

    /// Version label ("Stand")
    #[serde(default)]
    pub header_stand: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_logo: Option<String>,

    /// 1-based page number → footer variant. Pages without an entry use the default.
    #[serde(default)]
    pub footer_variants: BTreeMap<u32, String>,

    /// 1-based page number → signature block payload
    #[serde(default)]
    pub signature_data: BTreeMap<u32, Value>,
}

impl DocumentState {
    /// Fixed template used for new documents and on reset
    pub fn initial() -> Self {
        Self {
            rows: vec![
                Row::single(
                    "row-title",
                    Block::new(
                        "block-title",
                        BlockType::Title,
                        BlockContent::Text("Neue SOP".to_string()),
                    ),
                ),
                Row::single(
                    "row-definition",
                    Block::content_box("block-definition", "definition", "block-definition-text"),
                ),
            ],
            header_title: String::new(),
            header_stand: String::new(),
            header_logo: None,
            footer_variants: BTreeMap::new(),
            signature_data: BTreeMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            rows: Vec::new(),
            ..Self::initial()
        }
    }

    /// Locate a top-level block as (row index, block index)
    pub fn find_block(&self, block_id: &str) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(row_idx, row)| {
            row.blocks
                .iter()
                .position(|b| b.id == block_id)
                .map(|block_idx| (row_idx, block_idx))
        })
    }

    pub fn block(&self, block_id: &str) -> Option<&Block> {
        let (row_idx, block_idx) = self.find_block(block_id)?;
        Some(&self.rows[row_idx].blocks[block_idx])
    }

    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == row_id)
    }

    pub fn row_index(&self, row_id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.id == row_id)
    }

    pub fn row_ids(&self) -> Vec<RowId> {
        self.rows.iter().map(|r| r.id.clone()).collect()
    }

    pub fn block_count(&self) -> usize {
        self.rows.iter().map(|r| r.blocks.len()).sum()
    }

    pub fn title_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| &r.blocks)
            .filter(|b| b.block_type == BlockType::Title)
            .count()
    }

    /// Footer variant configured for a 1-based page, if any
    pub fn footer_variant(&self, page: u32) -> Option<&str> {
        self.footer_variants.get(&page).map(String::as_str)
    }

    /// Every id in the document, nested blocks included
    pub fn all_ids(&self) -> Vec<&str> {
        fn collect<'a>(blocks: &'a [Block], out: &mut Vec<&'a str>) {
            for block in blocks {
                out.push(&block.id);
                if let BlockContent::Nested(nested) = &block.content {
                    collect(&nested.blocks, out);
                }
            }
        }

        let mut ids = Vec::new();
        for row in &self.rows {
            ids.push(row.id.as_str());
            collect(&row.blocks, &mut ids);
        }
        ids
    }
}

impl Default for DocumentState {
    fn default() -> Self {
        Self::initial()
    }
}
