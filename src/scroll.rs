//! Near-bottom detection for a scrollable container.

pub const DEFAULT_OFFSET: u32 = 10;

/// Geometry of a scroll container at the time of an event, in rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: u32,
    pub scroll_height: u32,
    pub client_height: u32,
}

impl ScrollMetrics {
    pub fn near_bottom(&self, offset: u32) -> bool {
        self.scroll_top.saturating_add(self.client_height)
            >= self.scroll_height.saturating_sub(offset)
    }
}

/// Calls `on_scroll_end` whenever a scroll event lands within `offset` rows of
/// the bottom. Events are ignored until the container is attached and after
/// it is detached.
pub struct InfiniteScroll<F>
where
    F: FnMut(),
{
    offset: u32,
    on_scroll_end: F,
    attached: bool,
}

impl<F> InfiniteScroll<F>
where
    F: FnMut(),
{
    pub fn new(offset: u32, on_scroll_end: F) -> Self {
        Self {
            offset,
            on_scroll_end,
            attached: false,
        }
    }

    pub fn with_default_offset(on_scroll_end: F) -> Self {
        Self::new(DEFAULT_OFFSET, on_scroll_end)
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Signals that the container exists and starts listening.
    pub fn attach(&mut self) {
        if !self.attached {
            tracing::debug!(offset = self.offset, "scroll: container attached");
        }
        self.attached = true;
    }

    pub fn detach(&mut self) {
        if self.attached {
            tracing::debug!("scroll: container detached");
        }
        self.attached = false;
    }

    /// Handles one scroll event; returns whether the callback fired.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        if !self.attached || !metrics.near_bottom(self.offset) {
            return false;
        }
        (self.on_scroll_end)();
        true
    }
}

impl<F> Drop for InfiniteScroll<F>
where
    F: FnMut(),
{
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn metrics(scroll_top: u32) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top,
            scroll_height: 100,
            client_height: 20,
        }
    }

    #[test]
    fn fires_once_per_event_past_the_threshold() {
        let fired = Cell::new(0);
        let mut trigger = InfiniteScroll::with_default_offset(|| fired.set(fired.get() + 1));
        trigger.attach();
        assert!(!trigger.on_scroll(metrics(40)));
        assert!(!trigger.on_scroll(metrics(69)));
        assert!(trigger.on_scroll(metrics(70)));
        assert!(trigger.on_scroll(metrics(80)));
        assert_eq!(fired.get(), 2);
    }

    #[test]
    fn ignores_events_before_attach_and_after_detach() {
        let fired = Cell::new(0);
        let mut trigger = InfiniteScroll::new(5, || fired.set(fired.get() + 1));
        assert!(!trigger.on_scroll(metrics(90)));
        trigger.attach();
        assert!(trigger.on_scroll(metrics(90)));
        trigger.detach();
        assert!(!trigger.on_scroll(metrics(90)));
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn short_content_is_always_near_bottom() {
        let short = ScrollMetrics {
            scroll_top: 0,
            scroll_height: 8,
            client_height: 20,
        };
        assert!(short.near_bottom(DEFAULT_OFFSET));
    }
}
