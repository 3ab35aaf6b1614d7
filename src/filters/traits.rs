use crate::{error::Result, video::types::Frame};

/// A pixel pass the compositor runs over the drawn surface
///
/// Implemented by effect chains (the per-preset colour and blur adjustments)
/// and by overlays. Passes run in place and must leave the frame's dimensions
/// unchanged.
pub trait FrameEffect: Send + Sync {
    /// Returns the name used in logs
    fn name(&self) -> &str;

    /// Apply the pass to a frame
    ///
    /// # Arguments
    ///
    /// * `frame` - The composited frame to modify in-place
    fn apply(&self, frame: &mut Frame) -> Result<()>;

    /// True when applying the pass would leave every pixel unchanged
    fn is_identity(&self) -> bool {
        false
    }
}
