//! The rendered annotation layer.
//!
//! One mark per live entity, painted in insertion order. Removing a mark
//! never drops it instantly: it moves to the fading list and is destroyed by
//! [`MarkLayer::tick`] once its fade has run out.

use kurbo::{Rect, Shape as _};

use crate::clock::Millis;
use crate::entity::EntityId;
use crate::geometry::{DisplayList, Primitive, Rgba};

/// Padding around a highlighted mark's bounds.
const HIGHLIGHT_PADDING: f64 = 4.0;
const HIGHLIGHT_WIDTH: f64 = 2.0;

#[derive(Debug, Clone)]
struct FadingMark {
    id: EntityId,
    list: DisplayList,
    started: Millis,
}

#[derive(Debug, Clone, Default)]
pub struct MarkLayer {
    live: Vec<(EntityId, DisplayList)>,
    fading: Vec<FadingMark>,
    fade_duration: Millis,
    highlight: Option<EntityId>,
}

/// Remaining opacity of a fade that started `elapsed` ms ago (smoothstep down to zero).
pub fn fade_factor(elapsed: Millis, duration: Millis) -> f64 {
    if duration == 0 || elapsed >= duration {
        return 0.0;
    }
    let t = elapsed as f64 / duration as f64;
    1.0 - t * t * (3.0 - 2.0 * t)
}

impl MarkLayer {
    pub fn new(fade_duration: Millis) -> Self {
        Self {
            fade_duration,
            ..Self::default()
        }
    }

    /// Add (or replace) the mark for `id`.
    pub fn insert(&mut self, id: EntityId, list: DisplayList) {
        match self.live.iter_mut().find(|(live, _)| *live == id) {
            Some((_, existing)) => *existing = list,
            None => self.live.push((id, list)),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.live.iter().any(|(live, _)| live == id)
    }

    /// Start fading the mark for `id`. Returns `false` if there is no live mark.
    pub fn fade_out(&mut self, id: &str, now: Millis) -> bool {
        let Some(index) = self.live.iter().position(|(live, _)| live == id) else {
            return false;
        };
        let (id, list) = self.live.remove(index);
        if self.highlight.as_deref() == Some(id.as_str()) {
            self.highlight = None;
        }
        self.fading.push(FadingMark { id, list, started: now });
        true
    }

    /// Fade out every live mark.
    pub fn fade_out_all(&mut self, now: Millis) {
        let ids: Vec<EntityId> = self.live.iter().map(|(id, _)| id.clone()).collect();
        for id in ids {
            self.fade_out(&id, now);
        }
    }

    /// Destroy marks whose fade has finished. Returns how many were destroyed.
    pub fn tick(&mut self, now: Millis) -> usize {
        let duration = self.fade_duration;
        let before = self.fading.len();
        self.fading.retain(|mark| {
            let done = now.saturating_sub(mark.started) >= duration;
            if done {
                log::trace!("mark {} destroyed", mark.id);
            }
            !done
        });
        before - self.fading.len()
    }

    pub fn is_animating(&self) -> bool {
        !self.fading.is_empty()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn fading_count(&self) -> usize {
        self.fading.len()
    }

    /// Highlight a live mark. Returns `false` (and clears any highlight) if `id` has no mark.
    pub fn set_highlight(&mut self, id: Option<&str>) -> bool {
        self.highlight = id.filter(|id| self.contains(id)).map(str::to_string);
        id.is_none() || self.highlight.is_some()
    }

    pub fn highlight(&self) -> Option<&str> {
        self.highlight.as_deref()
    }

    /// Compose the layer: live marks in order, then fading marks, then the highlight box.
    pub fn display_list(&self, now: Millis) -> DisplayList {
        let mut out = DisplayList::new();
        for (_, list) in &self.live {
            out.append_faded(list, 1.0);
        }
        for mark in &self.fading {
            let factor = fade_factor(now.saturating_sub(mark.started), self.fade_duration);
            if factor > 0.0 {
                out.append_faded(&mark.list, factor);
            }
        }
        if let Some(bounds) = self.highlight_bounds() {
            out.push(Primitive::stroke(bounds.to_path(0.1), HIGHLIGHT_WIDTH, Rgba::HIGHLIGHT));
        }
        out
    }

    fn highlight_bounds(&self) -> Option<Rect> {
        let id = self.highlight.as_deref()?;
        let (_, list) = self.live.iter().find(|(live, _)| live == id)?;
        Some(list.bounds()?.inflate(HIGHLIGHT_PADDING, HIGHLIGHT_PADDING))
    }
}

/// Single-segment mark, handy for tests.
#[cfg(test)]
pub(crate) fn test_mark() -> DisplayList {
    let mut path = kurbo::BezPath::new();
    path.move_to((0.0, 0.0));
    path.line_to((10.0, 0.0));
    let mut list = DisplayList::new();
    list.push(Primitive::stroke(path, 2.0, Rgba::RED));
    list
}
