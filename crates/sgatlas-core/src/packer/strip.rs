use super::Packer;
use crate::model::{Frame, Rect};

/// Places every rectangle on one horizontal strip, left to right in insertion order.
///
/// The strip is as wide as the sum of widths and as tall as the tallest rectangle.
#[derive(Debug, Clone, Default)]
pub struct StripPacker {
    cursor_x: u32,
    height: u32,
    max_width: Option<u32>,
}

impl StripPacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the strip width, e.g. at a device's maximum surface size.
    pub fn with_max_width(max_width: u32) -> Self {
        Self {
            max_width: Some(max_width),
            ..Self::default()
        }
    }

    fn next_x(&self, rect: &Rect) -> Option<u32> {
        let end = self.cursor_x.checked_add(rect.w)?;
        match self.max_width {
            Some(max) if end > max => None,
            _ => Some(end),
        }
    }
}

impl<K> Packer<K> for StripPacker {
    fn can_pack(&self, rect: &Rect) -> bool {
        rect.w > 0 && rect.h > 0 && self.next_x(rect).is_some()
    }

    fn pack(&mut self, key: K, rect: &Rect) -> Option<Frame<K>> {
        if !<Self as Packer<K>>::can_pack(self, rect) {
            return None;
        }
        let end = self.next_x(rect)?;
        let frame = Rect::new(self.cursor_x, 0, rect.w, rect.h);
        self.cursor_x = end;
        self.height = self.height.max(rect.h);
        Some(Frame {
            key,
            frame,
            origin: (0, 0),
        })
    }

    fn extent(&self) -> (u32, u32) {
        (self.cursor_x, self.height)
    }
}
