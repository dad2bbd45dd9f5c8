//! Windowed Lists
//!
//! A long list of fixed-height rows inside a scrolled container only needs
//! the rows near the visible part rendered. [`Window`] computes that
//! [`VisibleRange`] from the scroll offset; [`windowed`] renders the rows in
//! it as a keyed list between two positioning wrappers:
//!
//! ```text
//! <div style="position: relative; height: {total}px">        full scroll height
//!   <div style="transform: translateY({offset}px)">          first rendered row
//!     rows start..end
//! ```
//!
//! Rows are keyed by index, so scrolling by a few rows keeps the nodes of
//! every row still in range and only builds the ones entering it.

use std::ops::Range;

use super::value::{repeat, Key, TemplateResult};
use crate::html;

const DEFAULT_ITEM_HEIGHT: f64 = 45.0;
const DEFAULT_VIEWPORT_HEIGHT: f64 = 600.0;
const DEFAULT_OVERSCAN: usize = 20;

/// Geometry of a scrolled list of fixed-height rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    item_height: f64,
    viewport_height: f64,
    overscan: usize,
}

impl Default for Window {
    fn default() -> Self {
        Self::new(DEFAULT_ITEM_HEIGHT, DEFAULT_VIEWPORT_HEIGHT)
    }
}

impl Window {
    pub fn new(item_height: f64, viewport_height: f64) -> Self {
        Self {
            item_height,
            viewport_height,
            overscan: DEFAULT_OVERSCAN,
        }
    }

    /// Extra rows rendered on each side of the visible ones.
    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn item_height(&self) -> f64 {
        self.item_height
    }

    pub fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height;
    }

    pub fn overscan(&self) -> usize {
        self.overscan
    }

    fn has_geometry(&self) -> bool {
        self.item_height.is_finite() && self.item_height > 0.0
    }

    /// Rows that fit in the viewport, counting a partly visible one.
    pub fn visible_count(&self) -> usize {
        if !self.has_geometry() || !self.viewport_height.is_finite() {
            return 0;
        }
        (self.viewport_height.max(0.0) / self.item_height).ceil() as usize
    }

    /// The rows to render for a list of `total` items scrolled to
    /// `scroll_top`.
    ///
    /// Offsets past the end are clamped to the last full viewport, and
    /// negative or NaN offsets to the top. Without a usable item height
    /// every row is rendered.
    pub fn range(&self, scroll_top: f64, total: usize) -> VisibleRange {
        if !self.has_geometry() {
            return VisibleRange {
                start: 0,
                end: total,
                offset_top: 0.0,
                total_height: 0.0,
            };
        }

        let total_height = total as f64 * self.item_height;
        let max_scroll = (total_height - self.viewport_height).max(0.0);
        let scroll_top = if scroll_top.is_nan() {
            0.0
        } else {
            scroll_top.clamp(0.0, max_scroll)
        };

        let first_visible = (scroll_top / self.item_height).floor() as usize;
        let start = first_visible.saturating_sub(self.overscan).min(total);
        let span = self.visible_count().saturating_add(self.overscan.saturating_mul(2));
        let end = start.saturating_add(span).min(total);
        VisibleRange {
            start,
            end,
            offset_top: start as f64 * self.item_height,
            total_height,
        }
    }

    /// The mean of the measured row heights that are usable, or the
    /// default row height when none are.
    pub fn estimate_item_height(measured: &[f64]) -> f64 {
        let usable: Vec<f64> = measured
            .iter()
            .copied()
            .filter(|h| h.is_finite() && *h > 0.0)
            .collect();
        if usable.is_empty() {
            return DEFAULT_ITEM_HEIGHT;
        }
        usable.iter().sum::<f64>() / usable.len() as f64
    }
}

/// The rendered slice of a windowed list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleRange {
    /// Index of the first rendered row.
    pub start: usize,
    /// One past the last rendered row.
    pub end: usize,
    /// Distance from the top of the list to the first rendered row.
    pub offset_top: f64,
    /// Height of the whole list.
    pub total_height: f64,
}

impl VisibleRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        self.as_range().contains(&index)
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Render the rows of `items` that are in `window` at `scroll_top`.
///
/// `key` gives each row its identity and `render` its content; both get
/// the row's index in `items`.
pub fn windowed<T, K, FK, FR>(
    items: &[T],
    window: &Window,
    scroll_top: f64,
    mut key: FK,
    mut render: FR,
) -> TemplateResult
where
    K: Into<Key>,
    FK: FnMut(usize, &T) -> K,
    FR: FnMut(usize, &T) -> TemplateResult,
{
    let range = window.range(scroll_top, items.len());
    tracing::trace!(start = range.start, end = range.end, total = items.len(), "windowed list");
    let rows = repeat(
        items[range.as_range()]
            .iter()
            .enumerate()
            .map(|(i, item)| (range.start + i, item)),
        |&(index, item)| key(index, item),
        |(index, item)| render(index, item),
    );
    let viewport = format!("position: relative; height: {}px", range.total_height);
    let content = format!("transform: translateY({}px)", range.offset_top);
    html!("<div style=", viewport, "><div style=", content, ">", rows, "</div></div>")
}
