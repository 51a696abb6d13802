//! Geometry primitives for survey sheet recognition.
//!
//! This crate knows about pixels and millimetres but nothing about surveys:
//! gray images, affine page transforms, ink coverage sampling, corner-mark
//! fitting and box-outline corner finding. The recognition pipeline in
//! `sheetscan-recognize` consumes it through the [`GeometryPrimitives`] trait.

mod affine;
mod geometry;
mod image;
mod logger;

pub use affine::{estimate_affine, max_residual, AffineTransform};
pub use geometry::{
    GeometryError, GeometryPrimitives, MmRect, PageCorner, RasterGeometry, RasterParams,
};
pub use image::{GrayImage, GrayImageView, PageSurface};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, log_tally, LogTally};

pub use nalgebra::{Point2, Vector2};
