//! # Page Breaks
//!
//! Decides which rows start a new printed page.
//!
//! Rows are atomic: a row is never split across pages. Heights come from the
//! rendered DOM via a layout observer, so the engine keeps a cache of the
//! last measured height per row and recomputes from scratch whenever rows,
//! heights, footer variants or header visibility change. Recomputation is
//! never patched incrementally; a changed footer on page 2 can move every
//! row after it.
//!
//! ```text
//! budget(page) = page height - margins
//!              - header            (page 1 only)
//!              - footer(variant)   (every page, per its variant)
//! ```

use crate::config::PageGeometry;
use crate::debounce::Debouncer;
use crate::model::{DocumentState, Row, RowId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument};

/// Source of rendered heights.
///
/// In the browser this wraps DOM measurement; headless callers use a
/// [`HeightTable`].
pub trait MeasurementProvider {
    /// Rendered height of a row's element
    fn row_height(&self, row_id: &str) -> Option<f64>;

    /// Rendered heights of the left and right column boxes of a two-block row
    fn column_heights(&self, _row_id: &str) -> Option<(f64, f64)> {
        None
    }

    /// Rendered height of a footer variant
    fn footer_height(&self, _variant: &str) -> Option<f64> {
        None
    }
}

/// Synthetic height table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeightTable {
    #[serde(default)]
    pub rows: HashMap<RowId, f64>,

    #[serde(default)]
    pub columns: HashMap<RowId, (f64, f64)>,

    #[serde(default)]
    pub footers: HashMap<String, f64>,
}

impl HeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(mut self, row_id: impl Into<RowId>, height: f64) -> Self {
        self.rows.insert(row_id.into(), height);
        self
    }

    pub fn set_row(&mut self, row_id: impl Into<RowId>, height: f64) {
        self.rows.insert(row_id.into(), height);
    }

    pub fn set_columns(&mut self, row_id: impl Into<RowId>, left: f64, right: f64) {
        self.columns.insert(row_id.into(), (left, right));
    }

    pub fn set_footer(&mut self, variant: impl Into<String>, height: f64) {
        self.footers.insert(variant.into(), height);
    }
}

impl MeasurementProvider for HeightTable {
    fn row_height(&self, row_id: &str) -> Option<f64> {
        self.rows.get(row_id).copied()
    }

    fn column_heights(&self, row_id: &str) -> Option<(f64, f64)> {
        self.columns.get(row_id).copied()
    }

    fn footer_height(&self, variant: &str) -> Option<f64> {
        self.footers.get(variant).copied()
    }
}

/// What to do with the next row
#[derive(Debug, Clone, PartialEq)]
pub enum BreakDecision {
    /// The row fits on the current page.
    Place,
    /// The row would overflow a page that already has content: start a new page with it.
    BreakBefore,
    /// The row alone exceeds the budget of an empty page; place it anyway.
    PlaceOversized,
}

/// Decide how to place a row of `height` on a page that already holds `used`
/// pixels in `rows_on_page` rows.
pub fn decide_break(used: f64, height: f64, budget: f64, rows_on_page: usize) -> BreakDecision {
    if used + height <= budget {
        return BreakDecision::Place;
    }

    if rows_on_page > 0 {
        return BreakDecision::BreakBefore;
    }

    BreakDecision::PlaceOversized
}

/// One printed page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-based page number
    pub number: u32,
    pub row_ids: Vec<RowId>,
    pub used_height: f64,
    pub budget: f64,
}

impl Page {
    /// True when a single oversized row exceeds the budget
    pub fn overflows(&self) -> bool {
        self.used_height > self.budget
    }
}

/// Computed page grouping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLayout {
    /// Rows that begin a new page, in document order
    pub breaks: Vec<RowId>,
    pub pages: Vec<Page>,
}

impl PageLayout {
    pub fn break_set(&self) -> HashSet<&str> {
        self.breaks.iter().map(String::as_str).collect()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 1-based page holding a row
    pub fn page_of(&self, row_id: &str) -> Option<u32> {
        self.pages
            .iter()
            .find(|p| p.row_ids.iter().any(|id| id == row_id))
            .map(|p| p.number)
    }
}

/// Usable content height of a page
pub fn page_budget(
    geometry: &PageGeometry,
    state: &DocumentState,
    page: u32,
    footer_override: impl Fn(&str) -> Option<f64>,
) -> f64 {
    let variant = state
        .footer_variant(page)
        .unwrap_or(&geometry.default_footer_variant);
    let footer = footer_override(variant).unwrap_or_else(|| geometry.footer_height(variant));
    let header = if page == 1 {
        geometry.header_height_px
    } else {
        0.0
    };

    (geometry.page_height_px - geometry.margin_top_px - geometry.margin_bottom_px - header - footer)
        .max(0.0)
}

/// Walk rows in order and group them into pages.
///
/// Rows without a measurement count as zero height; the next measurement
/// triggers a recompute anyway.
pub fn compute_pages(
    rows: &[Row],
    height_of: impl Fn(&str) -> Option<f64>,
    budget_of: impl Fn(u32) -> f64,
) -> PageLayout {
    let mut layout = PageLayout::default();
    if rows.is_empty() {
        return layout;
    }

    let mut current = Page {
        number: 1,
        row_ids: Vec::new(),
        used_height: 0.0,
        budget: budget_of(1),
    };

    for row in rows {
        let height = height_of(&row.id).unwrap_or(0.0).max(0.0);

        match decide_break(current.used_height, height, current.budget, current.row_ids.len()) {
            BreakDecision::Place | BreakDecision::PlaceOversized => {
                current.used_height += height;
                current.row_ids.push(row.id.clone());
            }
            BreakDecision::BreakBefore => {
                let number = current.number + 1;
                let finished = std::mem::replace(
                    &mut current,
                    Page {
                        number,
                        row_ids: vec![row.id.clone()],
                        used_height: height,
                        budget: budget_of(number),
                    },
                );
                layout.pages.push(finished);
                layout.breaks.push(row.id.clone());
            }
        }
    }

    layout.pages.push(current);
    layout
}

/// Split a row sequence at every break id
pub fn group_pages(row_ids: &[RowId], breaks: &HashSet<&str>) -> Vec<Vec<RowId>> {
    let mut pages: Vec<Vec<RowId>> = Vec::new();
    for id in row_ids {
        if pages.is_empty() || breaks.contains(id.as_str()) {
            pages.push(Vec::new());
        }
        if let Some(page) = pages.last_mut() {
            page.push(id.clone());
        }
    }
    pages
}

/// Stateful pagination driver: measured-height cache plus debounced recompute
#[derive(Debug, Clone)]
pub struct Paginator {
    geometry: PageGeometry,
    heights: HashMap<RowId, f64>,
    footer_heights: HashMap<String, f64>,
    recompute: Debouncer,
    layout: PageLayout,
}

impl Paginator {
    pub fn new(geometry: PageGeometry, debounce_ms: u64) -> Self {
        Self {
            geometry,
            heights: HashMap::new(),
            footer_heights: HashMap::new(),
            recompute: Debouncer::new(debounce_ms),
            layout: PageLayout::default(),
        }
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// Replace the page geometry (e.g. header shown/hidden) and schedule a recompute
    pub fn set_geometry(&mut self, geometry: PageGeometry, now: i64) {
        self.geometry = geometry;
        self.recompute.trigger(now, ());
    }

    /// Layout observer callback: record a row's height. Returns true if it changed.
    pub fn observe_row_height(&mut self, row_id: &str, height: f64, now: i64) -> bool {
        if self.heights.get(row_id) == Some(&height) {
            return false;
        }
        self.heights.insert(row_id.to_string(), height);
        self.recompute.trigger(now, ());
        true
    }

    /// Layout observer callback for footer elements
    pub fn observe_footer_height(&mut self, variant: &str, height: f64, now: i64) -> bool {
        if self.footer_heights.get(variant) == Some(&height) {
            return false;
        }
        self.footer_heights.insert(variant.to_string(), height);
        self.recompute.trigger(now, ());
        true
    }

    /// Refresh the cache for every row from a measurement provider
    pub fn measure(&mut self, provider: &dyn MeasurementProvider, state: &DocumentState, now: i64) {
        let mut changed = false;
        for row in &state.rows {
            if let Some(height) = provider.row_height(&row.id) {
                if self.heights.get(&row.id) != Some(&height) {
                    self.heights.insert(row.id.clone(), height);
                    changed = true;
                }
            }
        }
        let variants = state
            .footer_variants
            .values()
            .map(String::as_str)
            .chain(std::iter::once(self.geometry.default_footer_variant.as_str()))
            .map(str::to_string)
            .collect::<HashSet<_>>();
        for variant in variants {
            if let Some(height) = provider.footer_height(&variant) {
                if self.footer_heights.get(&variant) != Some(&height) {
                    self.footer_heights.insert(variant, height);
                    changed = true;
                }
            }
        }
        if changed {
            self.recompute.trigger(now, ());
        }
    }

    /// Schedule a recompute after a document mutation
    pub fn invalidate(&mut self, state: &DocumentState, now: i64) {
        let live: HashSet<&str> = state.rows.iter().map(|r| r.id.as_str()).collect();
        self.heights.retain(|id, _| live.contains(id.as_str()));
        self.recompute.trigger(now, ());
    }

    pub fn cached_height(&self, row_id: &str) -> Option<f64> {
        self.heights.get(row_id).copied()
    }

    /// Recompute if the debounce window has elapsed
    pub fn poll(&mut self, state: &DocumentState, now: i64) -> Option<&PageLayout> {
        self.recompute.poll(now)?;
        Some(self.recompute_now(state))
    }

    /// Drop any pending recompute and compute synchronously
    pub fn settle(&mut self, state: &DocumentState) -> &PageLayout {
        self.recompute.cancel();
        self.recompute_now(state)
    }

    pub fn is_settled(&self) -> bool {
        !self.recompute.is_pending()
    }

    /// Last computed layout
    pub fn layout(&self) -> &PageLayout {
        &self.layout
    }

    #[instrument(skip_all, fields(rows = state.rows.len()))]
    fn recompute_now(&mut self, state: &DocumentState) -> &PageLayout {
        let heights = &self.heights;
        let footers = &self.footer_heights;
        let geometry = &self.geometry;

        let layout = compute_pages(
            &state.rows,
            |id| heights.get(id).copied(),
            |page| page_budget(geometry, state, page, |variant| footers.get(variant).copied()),
        );

        if layout != self.layout {
            debug!(
                pages = layout.page_count(),
                breaks = layout.breaks.len(),
                "Page breaks changed"
            );
        }
        self.layout = layout;
        &self.layout
    }
}
