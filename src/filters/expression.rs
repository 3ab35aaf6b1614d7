use std::fmt;
use std::str::FromStr;

use image::imageops;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{FilterError, Result},
    filters::traits::FrameEffect,
    video::types::Frame,
};

/// One adjustment in an effect chain
///
/// Amounts follow CSS filter-function conventions: `1.0` leaves the image
/// unchanged for brightness/contrast/saturate, `0.0` for grayscale/sepia.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectOp {
    Brightness(f32),
    Contrast(f32),
    Saturate(f32),
    /// Hue rotation in degrees
    HueRotate(f32),
    Grayscale(f32),
    Sepia(f32),
    /// Gaussian blur standard deviation in pixels
    Blur(f32),
}

impl EffectOp {
    /// Colour matrix for this op, or `None` for spatial ops
    fn matrix(&self) -> Option<ColorMatrix> {
        let m = match *self {
            EffectOp::Brightness(b) => ColorMatrix::scale(b, 0.0),
            EffectOp::Contrast(c) => ColorMatrix::scale(c, 0.5 - 0.5 * c),
            EffectOp::Saturate(s) => ColorMatrix::rows([
                [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
                [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
                [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
            ]),
            EffectOp::HueRotate(degrees) => {
                let (sin, cos) = degrees.to_radians().sin_cos();
                ColorMatrix::rows([
                    [
                        0.213 + cos * 0.787 - sin * 0.213,
                        0.715 - cos * 0.715 - sin * 0.715,
                        0.072 - cos * 0.072 + sin * 0.928,
                    ],
                    [
                        0.213 - cos * 0.213 + sin * 0.143,
                        0.715 + cos * 0.285 + sin * 0.140,
                        0.072 - cos * 0.072 - sin * 0.283,
                    ],
                    [
                        0.213 - cos * 0.213 - sin * 0.787,
                        0.715 - cos * 0.715 + sin * 0.715,
                        0.072 + cos * 0.928 + sin * 0.072,
                    ],
                ])
            }
            EffectOp::Grayscale(amount) => {
                let inv = 1.0 - amount.min(1.0);
                ColorMatrix::rows([
                    [0.2126 + 0.7874 * inv, 0.7152 - 0.7152 * inv, 0.0722 - 0.0722 * inv],
                    [0.2126 - 0.2126 * inv, 0.7152 + 0.2848 * inv, 0.0722 - 0.0722 * inv],
                    [0.2126 - 0.2126 * inv, 0.7152 - 0.7152 * inv, 0.0722 + 0.9278 * inv],
                ])
            }
            EffectOp::Sepia(amount) => {
                let inv = 1.0 - amount.min(1.0);
                ColorMatrix::rows([
                    [0.393 + 0.607 * inv, 0.769 - 0.769 * inv, 0.189 - 0.189 * inv],
                    [0.349 - 0.349 * inv, 0.686 + 0.314 * inv, 0.168 - 0.168 * inv],
                    [0.272 - 0.272 * inv, 0.534 - 0.534 * inv, 0.131 + 0.869 * inv],
                ])
            }
            EffectOp::Blur(_) => return None,
        };
        Some(m)
    }

    fn function_name(&self) -> &'static str {
        match self {
            EffectOp::Brightness(_) => "brightness",
            EffectOp::Contrast(_) => "contrast",
            EffectOp::Saturate(_) => "saturate",
            EffectOp::HueRotate(_) => "hue-rotate",
            EffectOp::Grayscale(_) => "grayscale",
            EffectOp::Sepia(_) => "sepia",
            EffectOp::Blur(_) => "blur",
        }
    }
}

impl fmt::Display for EffectOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.function_name();
        match *self {
            EffectOp::HueRotate(degrees) => write!(f, "{}({}deg)", name, degrees),
            EffectOp::Blur(px) => write!(f, "{}({}px)", name, px),
            EffectOp::Brightness(v)
            | EffectOp::Contrast(v)
            | EffectOp::Saturate(v)
            | EffectOp::Grayscale(v)
            | EffectOp::Sepia(v) => write!(f, "{}({})", name, v),
        }
    }
}

/// Affine colour transform on normalised RGB: `out = M * [r, g, b] + offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix {
    m: [[f32; 4]; 3],
}

impl ColorMatrix {
    pub const IDENTITY: ColorMatrix = ColorMatrix {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    fn scale(factor: f32, offset: f32) -> Self {
        Self {
            m: [
                [factor, 0.0, 0.0, offset],
                [0.0, factor, 0.0, offset],
                [0.0, 0.0, factor, offset],
            ],
        }
    }

    fn rows(rows: [[f32; 3]; 3]) -> Self {
        let mut m = [[0.0; 4]; 3];
        for (dst, src) in m.iter_mut().zip(rows.iter()) {
            dst[..3].copy_from_slice(src);
        }
        Self { m }
    }

    /// The transform that applies `self` first, then `next`
    pub fn then(&self, next: &ColorMatrix) -> ColorMatrix {
        let a = &next.m;
        let b = &self.m;
        let mut m = [[0.0; 4]; 3];
        for (row, out) in m.iter_mut().enumerate() {
            for col in 0..4 {
                let mut sum = (0..3).map(|k| a[row][k] * b[k][col]).sum::<f32>();
                if col == 3 {
                    sum += a[row][3];
                }
                out[col] = sum;
            }
        }
        ColorMatrix { m }
    }

    pub fn is_identity(&self) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(Self::IDENTITY.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() < 1e-6)
    }

    /// Transform one 8-bit pixel, clamping to the displayable range
    pub fn apply_rgb(&self, rgb: [u8; 3]) -> [u8; 3] {
        let [r, g, b] = rgb.map(|c| c as f32 / 255.0);
        let mut out = [0u8; 3];
        for (channel, row) in out.iter_mut().zip(self.m.iter()) {
            let value = row[0] * r + row[1] * g + row[2] * b + row[3];
            *channel = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
        out
    }

    fn apply_to(&self, frame: &mut Frame) {
        let row_len = frame.width() as usize * 3;
        if row_len == 0 {
            return;
        }
        frame.as_raw_mut().par_chunks_mut(row_len).for_each(|row| {
            for px in row.chunks_exact_mut(3) {
                let out = self.apply_rgb([px[0], px[1], px[2]]);
                px.copy_from_slice(&out);
            }
        });
    }
}

/// A compiled step of an effect chain
#[derive(Debug, Clone, Copy, PartialEq)]
enum EffectPass {
    Color(ColorMatrix),
    Blur(f32),
}

/// An ordered list of adjustments applied as a single compositing effect
///
/// Parsed from CSS-style filter expressions such as
/// `"sepia(0.4) contrast(1.2) brightness(0.9)"`. Consecutive colour
/// adjustments are folded into one colour matrix; blur breaks the fold.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EffectChain {
    ops: Vec<EffectOp>,
    passes: Vec<EffectPass>,
}

impl EffectChain {
    pub fn new(ops: Vec<EffectOp>) -> Self {
        let passes = compile(&ops);
        Self { ops, passes }
    }

    /// The chain that leaves pixels untouched
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse a CSS-style filter expression
    pub fn parse(expression: &str) -> std::result::Result<Self, FilterError> {
        Parser::new(expression).parse().map(Self::new)
    }

    pub fn ops(&self) -> &[EffectOp] {
        &self.ops
    }

    /// Number of pixel passes after folding
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn is_identity(&self) -> bool {
        self.passes.is_empty()
    }
}

fn compile(ops: &[EffectOp]) -> Vec<EffectPass> {
    let mut passes = Vec::new();
    let mut pending: Option<ColorMatrix> = None;

    for op in ops {
        match op.matrix() {
            Some(matrix) => {
                pending = Some(match pending {
                    Some(current) => current.then(&matrix),
                    None => matrix,
                });
            }
            None => {
                if let Some(matrix) = pending.take() {
                    passes.push(EffectPass::Color(matrix));
                }
                if let EffectOp::Blur(px) = op {
                    if *px > 0.0 {
                        passes.push(EffectPass::Blur(*px));
                    }
                }
            }
        }
    }
    if let Some(matrix) = pending {
        passes.push(EffectPass::Color(matrix));
    }

    passes.retain(|pass| !matches!(pass, EffectPass::Color(m) if m.is_identity()));
    passes
}

impl FrameEffect for EffectChain {
    fn name(&self) -> &str {
        "filter"
    }

    fn apply(&self, frame: &mut Frame) -> Result<()> {
        if frame.is_empty() {
            return Ok(());
        }
        for pass in &self.passes {
            match pass {
                EffectPass::Color(matrix) => matrix.apply_to(frame),
                EffectPass::Blur(sigma) => {
                    let blurred = imageops::blur(frame.as_image(), *sigma);
                    *frame.as_image_mut() = blurred;
                }
            }
        }
        Ok(())
    }

    fn is_identity(&self) -> bool {
        EffectChain::is_identity(self)
    }
}

impl fmt::Display for EffectChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ops.is_empty() {
            return write!(f, "none");
        }
        for (i, op) in self.ops.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", op)?;
        }
        Ok(())
    }
}

impl FromStr for EffectChain {
    type Err = FilterError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EffectChain {
    type Error = FilterError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EffectChain> for String {
    fn from(chain: EffectChain) -> Self {
        chain.to_string()
    }
}

struct Parser<'a> {
    expression: &'a str,
    rest: &'a str,
}

impl<'a> Parser<'a> {
    fn new(expression: &'a str) -> Self {
        Self {
            expression,
            rest: expression.trim(),
        }
    }

    fn error(&self, reason: impl Into<String>) -> FilterError {
        FilterError::InvalidExpression {
            expression: self.expression.to_string(),
            reason: reason.into(),
        }
    }

    fn parse(mut self) -> std::result::Result<Vec<EffectOp>, FilterError> {
        if self.rest.is_empty() || self.rest.eq_ignore_ascii_case("none") {
            return Ok(Vec::new());
        }

        let mut ops = Vec::new();
        while !self.rest.is_empty() {
            ops.push(self.function()?);
            self.rest = self.rest.trim_start();
        }
        Ok(ops)
    }

    fn function(&mut self) -> std::result::Result<EffectOp, FilterError> {
        let open = self
            .rest
            .find('(')
            .ok_or_else(|| self.error(format!("expected '(' after '{}'", self.rest)))?;
        let close = self
            .rest
            .find(')')
            .ok_or_else(|| self.error("missing ')'"))?;
        if close < open {
            return Err(self.error("unbalanced parentheses"));
        }

        let name = self.rest[..open].trim().to_ascii_lowercase();
        let arg = self.rest[open + 1..close].trim();
        self.rest = &self.rest[close + 1..];

        let op = match name.as_str() {
            "brightness" => EffectOp::Brightness(self.amount(arg)?),
            "contrast" => EffectOp::Contrast(self.amount(arg)?),
            "saturate" => EffectOp::Saturate(self.amount(arg)?),
            "grayscale" => EffectOp::Grayscale(self.amount(arg)?.min(1.0)),
            "sepia" => EffectOp::Sepia(self.amount(arg)?.min(1.0)),
            "hue-rotate" => EffectOp::HueRotate(self.angle(arg)?),
            "blur" => EffectOp::Blur(self.length(arg)?),
            "" => return Err(self.error("missing function name")),
            other => return Err(self.error(format!("unknown function '{}'", other))),
        };
        Ok(op)
    }

    fn number(&self, text: &str) -> std::result::Result<f32, FilterError> {
        let value: f32 = text
            .trim()
            .parse()
            .map_err(|_| self.error(format!("'{}' is not a number", text)))?;
        if !value.is_finite() {
            return Err(self.error(format!("'{}' is not finite", text)));
        }
        Ok(value)
    }

    /// A non-negative number or percentage; empty means 1
    fn amount(&self, arg: &str) -> std::result::Result<f32, FilterError> {
        if arg.is_empty() {
            return Ok(1.0);
        }
        let value = match arg.strip_suffix('%') {
            Some(percent) => self.number(percent)? / 100.0,
            None => self.number(arg)?,
        };
        if value < 0.0 {
            return Err(self.error(format!("negative amount '{}'", arg)));
        }
        Ok(value)
    }

    /// An angle, converted to degrees; empty or bare zero allowed
    fn angle(&self, arg: &str) -> std::result::Result<f32, FilterError> {
        if arg.is_empty() {
            return Ok(0.0);
        }
        let units: [(&str, f32); 4] = [
            ("deg", 1.0),
            ("grad", 0.9),
            ("rad", 180.0 / std::f32::consts::PI),
            ("turn", 360.0),
        ];
        for (suffix, factor) in units {
            if let Some(value) = arg.strip_suffix(suffix) {
                return Ok(self.number(value)? * factor);
            }
        }
        match self.number(arg)? {
            zero if zero == 0.0 => Ok(0.0),
            _ => Err(self.error(format!("angle '{}' needs a unit", arg))),
        }
    }

    /// A non-negative pixel length; empty or bare zero allowed
    fn length(&self, arg: &str) -> std::result::Result<f32, FilterError> {
        if arg.is_empty() {
            return Ok(0.0);
        }
        let value = match arg.strip_suffix("px") {
            Some(px) => self.number(px)?,
            None => match self.number(arg)? {
                zero if zero == 0.0 => 0.0,
                _ => return Err(self.error(format!("length '{}' needs a px unit", arg))),
            },
        };
        if value < 0.0 {
            return Err(self.error(format!("negative blur '{}'", arg)));
        }
        Ok(value)
    }
}
