/// Axis-aligned rectangle in frame pixel coordinates.
///
/// Used both for raw detector output and for the region a crop was
/// actually extracted from; the two differ once margin expansion and
/// edge clamping have been applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The region covering a whole `frame_w` × `frame_h` frame.
    pub fn full_frame(frame_w: u32, frame_h: u32) -> Self {
        Self::new(0, 0, frame_w as i32, frame_h as i32)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when the region is non-empty and lies inside `[0,W) × [0,H)`.
    #[cfg(test)]
    pub(crate) fn fits_within(&self, frame_w: u32, frame_h: u32) -> bool {
        !self.is_empty()
            && self.x >= 0
            && self.y >= 0
            && self.right() <= frame_w as i32
            && self.bottom() <= frame_h as i32
    }

    /// Intersection with the frame rectangle, or `None` if nothing is left.
    pub fn clip_to(&self, frame_w: u32, frame_h: u32) -> Option<Region> {
        let x1 = self.x.max(0);
        let y1 = self.y.max(0);
        let x2 = self.right().min(frame_w as i32);
        let y2 = self.bottom().min(frame_h as i32);
        let clipped = Region::new(x1, y1, x2 - x1, y2 - y1);
        (!clipped.is_empty()).then_some(clipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_full_frame() {
        let r = Region::full_frame(640, 480);
        assert_eq!(r, Region::new(0, 0, 640, 480));
        assert_eq!(r.right(), 640);
        assert_eq!(r.bottom(), 480);
    }

    #[rstest]
    #[case::inside(Region::new(10, 10, 20, 20), true)]
    #[case::touching_far_edges(Region::new(80, 60, 20, 40), true)]
    #[case::negative_origin(Region::new(-1, 0, 20, 20), false)]
    #[case::past_right(Region::new(90, 0, 20, 20), false)]
    #[case::past_bottom(Region::new(0, 90, 20, 20), false)]
    #[case::zero_width(Region::new(10, 10, 0, 20), false)]
    fn test_fits_within(#[case] r: Region, #[case] expected: bool) {
        assert_eq!(r.fits_within(100, 100), expected);
    }

    #[test]
    fn test_clip_inside_is_unchanged() {
        let r = Region::new(10, 20, 30, 40);
        assert_eq!(r.clip_to(100, 100), Some(r));
    }

    #[test]
    fn test_clip_overhanging_edges() {
        let r = Region::new(-10, -5, 50, 30);
        assert_eq!(r.clip_to(30, 100), Some(Region::new(0, 0, 30, 25)));
    }

    #[test]
    fn test_clip_outside_is_none() {
        assert_eq!(Region::new(200, 200, 10, 10).clip_to(100, 100), None);
    }
}
