use lru::LruCache;
use std::num::NonZeroUsize;

/// How a source maps onto the screen. `Fit` letterboxes (whole source
/// visible, backdrop fills the rest); `Fill` covers the whole screen and
/// crops the overflow. Backgrounds use `Fill`, foreground media uses `Fit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitMode {
    Fit,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Scaled size before any crop.
    pub target: (u32, u32),
    /// Centered crop applied after scaling; only ever set in `Fill` mode.
    pub crop: Option<CropRect>,
}

impl Layout {
    /// Size actually occupied on screen once the crop is applied.
    pub fn display_size(&self) -> (u32, u32) {
        match self.crop {
            Some(crop) => (crop.width, crop.height),
            None => self.target,
        }
    }
}

/// Pure scaling math shared by the image and video paths.
pub fn fit(source: (u32, u32), screen: (u32, u32), mode: FitMode) -> Layout {
    let (src_w, src_h) = source;
    let (screen_w, screen_h) = screen;
    if src_w == 0 || src_h == 0 || screen_w == 0 || screen_h == 0 {
        return Layout {
            target: screen,
            crop: None,
        };
    }

    let wr = screen_w as f64 / src_w as f64;
    let hr = screen_h as f64 / src_h as f64;
    let scale = match mode {
        FitMode::Fit => wr.min(hr),
        FitMode::Fill => wr.max(hr),
    };

    let target_w = (src_w as f64 * scale).round() as u32;
    let target_h = (src_h as f64 * scale).round() as u32;

    let crop = match mode {
        FitMode::Fill if target_w > screen_w || target_h > screen_h => Some(CropRect {
            x: (target_w - screen_w) / 2,
            y: (target_h - screen_h) / 2,
            width: screen_w,
            height: screen_h,
        }),
        _ => None,
    };

    Layout {
        target: (target_w, target_h),
        crop,
    }
}

/// Memoized layouts keyed by source resolution, so the per-frame video path
/// never recomputes geometry. A screen-size change (or a source with a new
/// resolution falling out of the LRU) invalidates naturally.
pub struct GeometryCache {
    screen: (u32, u32),
    layouts: LruCache<((u32, u32), FitMode), Layout>,
}

impl GeometryCache {
    const CAPACITY: usize = 8;

    pub fn new() -> Self {
        Self {
            screen: (0, 0),
            layouts: LruCache::new(NonZeroUsize::new(Self::CAPACITY).unwrap()),
        }
    }

    pub fn layout_for(&mut self, source: (u32, u32), screen: (u32, u32), mode: FitMode) -> Layout {
        if screen != self.screen {
            self.layouts.clear();
            self.screen = screen;
        }

        let key = (source, mode);
        if let Some(layout) = self.layouts.get(&key) {
            return *layout;
        }

        let layout = fit(source, screen, mode);
        log::debug!(
            "Layout computed: {}x{} -> {}x{} (screen {}x{}, {:?})",
            source.0,
            source.1,
            layout.target.0,
            layout.target.1,
            screen.0,
            screen.1,
            mode
        );
        self.layouts.put(key, layout);
        layout
    }
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new()
    }
}
