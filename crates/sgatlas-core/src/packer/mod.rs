use crate::model::{Frame, Rect};

pub mod strip;

pub use strip::StripPacker;

/// A packer places rectangles into an atlas.
///
/// Implementations must ensure no overlaps. `pack` returns `None` when the rectangle
/// cannot be placed.
pub trait Packer<K> {
    fn can_pack(&self, rect: &Rect) -> bool;
    fn pack(&mut self, key: K, rect: &Rect) -> Option<Frame<K>>;
    /// Atlas size needed for everything placed so far.
    fn extent(&self) -> (u32, u32);
}
