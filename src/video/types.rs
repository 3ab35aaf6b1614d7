use image::{imageops, ImageBuffer, Rgb, RgbImage};

/// Represents a single video frame
///
/// This is a simple wrapper around an RGB image buffer that provides
/// convenient methods for pixel manipulation used by effects.
#[derive(Clone, Debug)]
pub struct Frame {
    buffer: RgbImage,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage) -> Self {
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with black
    pub fn new_black(width: u32, height: u32) -> Self {
        let buffer = ImageBuffer::new(width, height);
        Self { buffer }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer }
    }

    /// Get the width of the frame
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    /// Get the height of the frame
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Width and height as a pair
    pub fn dimensions(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let pixel = self.buffer.get_pixel(x, y);
        [pixel[0], pixel[1], pixel[2]]
    }

    /// Set a pixel at the given coordinates
    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 3]) {
        self.buffer.put_pixel(x, y, Rgb(color));
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Get a mutable reference to the underlying image buffer
    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.buffer
    }

    /// Packed RGB bytes, row-major
    pub fn as_raw(&self) -> &[u8] {
        self.buffer.as_raw()
    }

    /// Mutable packed RGB bytes, row-major
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    /// Create a frame from raw RGB bytes
    pub fn from_rgb_bytes(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        ImageBuffer::from_raw(width, height, data).map(|buffer| Self { buffer })
    }

    /// Downscale so the frame fits inside `max_width` x `max_height`, keeping its aspect ratio.
    /// Frames that already fit are returned unchanged.
    pub fn fit_within(self, max_width: u32, max_height: u32) -> Self {
        let (width, height) = self.dimensions();
        if (width <= max_width && height <= max_height) || self.is_empty() {
            return self;
        }

        let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
        let new_width = ((width as f64 * scale).round() as u32).max(1);
        let new_height = ((height as f64 * scale).round() as u32).max(1);

        Self::new(imageops::resize(
            &self.buffer,
            new_width,
            new_height,
            imageops::FilterType::Triangle,
        ))
    }
}

/// The compositor's drawing target
///
/// Sized from the display viewport and resized whenever the viewport changes.
/// Tracks whether a composited frame has ever been drawn so capture can refuse
/// to encode a surface that has never shown anything.
#[derive(Debug, Clone)]
pub struct OutputSurface {
    frame: Frame,
    rendered: bool,
}

impl OutputSurface {
    /// Create a surface for the given viewport size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frame: Frame::new_black(width, height),
            rendered: false,
        }
    }

    /// Resize to a new viewport. A size change discards the current contents.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.frame.dimensions() == (width, height) {
            return;
        }
        self.frame = Frame::new_black(width, height);
        self.rendered = false;
    }

    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    /// True once a composited frame has been drawn at the current size
    pub fn has_rendered(&self) -> bool {
        self.rendered && !self.frame.is_empty()
    }

    /// The composited output
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }

    pub(crate) fn mark_rendered(&mut self) {
        self.rendered = true;
    }
}
