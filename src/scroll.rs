//! Follow-mode scrolling for the transcript list
//!
//! Geometry is supplied by whoever renders the list. The controller only
//! decides whether the active segment needs to be brought into view and where
//! to scroll; it never reacts to manual scrolling, so a user who scrolls away
//! stays there until the active segment changes.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::ScrollConfig;
use crate::transcript::{Segment, SegmentKey};

/// Position of a rendered segment within the list content
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementBounds {
    pub top: f64,
    pub height: f64,
}

impl ElementBounds {
    pub fn new(top: f64, height: f64) -> Self {
        Self { top, height }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Scroll container geometry at the time of the decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, height: f64) -> Self {
        Self { scroll_top, height }
    }
}

/// Segment key to rendered bounds, rebuilt whenever the list is re-rendered
#[derive(Debug, Clone, Default)]
pub struct ScrollBinding {
    bounds: HashMap<SegmentKey, ElementBounds>,
}

impl ScrollBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every binding at once
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (SegmentKey, ElementBounds)>,
    {
        self.bounds = entries.into_iter().collect();
    }

    /// Lay segments out as a uniform list; handy for headless use
    pub fn uniform(segments: &[Segment], row_height: f64) -> Self {
        let mut binding = Self::new();
        binding.rebuild(
            segments
                .iter()
                .enumerate()
                .map(|(i, s)| (s.key(), ElementBounds::new(i as f64 * row_height, row_height))),
        );
        binding
    }

    pub fn bind(&mut self, key: SegmentKey, bounds: ElementBounds) {
        self.bounds.insert(key, bounds);
    }

    pub fn get(&self, key: SegmentKey) -> Option<ElementBounds> {
        self.bounds.get(&key).copied()
    }

    pub fn clear(&mut self) {
        self.bounds.clear();
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    Smooth,
}

/// Instruction for the renderer; a newer command simply supersedes an older one
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollCommand {
    pub top: f64,
    pub behavior: ScrollBehavior,
}

#[derive(Debug, Clone)]
pub struct ScrollController {
    follow: bool,
    margin: f64,
    last_active: Option<SegmentKey>,
}

impl ScrollController {
    pub fn new(config: &ScrollConfig) -> Self {
        Self {
            follow: config.follow_by_default,
            margin: config.margin_px.max(0.0),
            last_active: None,
        }
    }

    pub fn follow(&self) -> bool {
        self.follow
    }

    /// Toggle follow mode; turning it on re-evaluates on the next update
    pub fn set_follow(&mut self, follow: bool) {
        if self.follow != follow {
            debug!("Follow mode {}", if follow { "on" } else { "off" });
        }
        self.follow = follow;
        self.last_active = None;
    }

    /// Forget the last active segment, e.g. after the transcript changes
    pub fn reset(&mut self) {
        self.last_active = None;
    }

    /// Called every tick with the currently active segment
    ///
    /// Only a change of active segment identity can produce a command.
    pub fn update(
        &mut self,
        active: Option<&Segment>,
        binding: &ScrollBinding,
        viewport: Viewport,
    ) -> Option<ScrollCommand> {
        if !self.follow {
            return None;
        }

        let Some(segment) = active else {
            self.last_active = None;
            return None;
        };

        let key = segment.key();
        if self.last_active == Some(key) {
            return None;
        }
        self.last_active = Some(key);

        let Some(bounds) = binding.get(key) else {
            debug!("No rendered element for segment at {:.2}s", segment.start);
            return None;
        };
        self.decide(bounds, viewport)
    }

    /// Scroll target for `bounds`, or None if it already sits inside the band
    pub fn decide(&self, bounds: ElementBounds, viewport: Viewport) -> Option<ScrollCommand> {
        let band_top = viewport.scroll_top + self.margin;
        let band_bottom = viewport.scroll_top + viewport.height - self.margin;

        if bounds.top >= band_top && bounds.bottom() <= band_bottom {
            return None;
        }

        let top = (bounds.top - viewport.height / 2.0 + bounds.height / 2.0).max(0.0);
        Some(ScrollCommand {
            top,
            behavior: ScrollBehavior::Smooth,
        })
    }
}
