/// Borrowed 8-bit luminance image, `0 = black`.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Blank (white) page of the given size.
    pub fn white(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![255u8; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    /// The same page turned upside down.
    pub fn rotated_180(&self) -> Self {
        let mut data = self.data.clone();
        data.reverse();
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Paint every pixel whose centre lies in `[x0, x1) × [y0, y1)` (pixel units).
    pub fn fill_rect(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, value: u8) {
        let cx0 = ((x0 - 0.5).ceil().max(0.0) as usize).min(self.width);
        let cy0 = ((y0 - 0.5).ceil().max(0.0) as usize).min(self.height);
        let cx1 = ((x1 - 0.5).ceil().max(0.0) as usize).min(self.width);
        let cy1 = ((y1 - 0.5).ceil().max(0.0) as usize).min(self.height);
        for y in cy0..cy1 {
            let row = y * self.width;
            self.data[row + cx0..row + cx1.max(cx0)].fill(value);
        }
    }
}

impl GrayImageView<'_> {
    /// Pixel value; anything outside the image reads as paper white.
    #[inline]
    pub fn get(&self, x: i64, y: i64) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return 255;
        }
        self.data[y as usize * self.width + x as usize]
    }
}

/// A scanned page loaded into memory together with its scan resolution.
#[derive(Clone, Debug)]
pub struct PageSurface {
    pub image: GrayImage,
    pub px_per_mm: f64,
}

impl PageSurface {
    pub fn new(image: GrayImage, px_per_mm: f64) -> Self {
        Self { image, px_per_mm }
    }

    #[inline]
    pub fn view(&self) -> GrayImageView<'_> {
        self.image.view()
    }
}
