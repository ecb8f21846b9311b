//! Chart renderer adapter.
//!
//! Owns the two persistent chart instances (raw and ratio). Results are
//! applied in place and followed by a re-measure. Pan/zoom on either chart is
//! mirrored onto the other as pure view state; no data is refetched.

use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::models::Figure;
use crate::coordinator::{PlotKind, PlotResult, PlotSink};
use crate::error::{AppError, AppResult};

/// X-axis view of a chart.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AxisRange {
    #[default]
    Auto,
    /// Explicit bounds as the chart reports them (dates or numbers).
    Span { start: Value, end: Value },
}

impl AxisRange {
    #[must_use]
    pub fn span(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self::Span {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Read the x-axis change out of a relayout event.
    ///
    /// Understands `xaxis.range[0]`/`xaxis.range[1]`, `xaxis.range: [a, b]`
    /// and `xaxis.autorange: true`. Events that do not touch the x axis
    /// (legend toggles, y-only zoom) yield `None`.
    #[must_use]
    pub fn from_relayout(event: &Map<String, Value>) -> Option<Self> {
        if event.get("xaxis.autorange").and_then(Value::as_bool) == Some(true) {
            return Some(Self::Auto);
        }
        if let (Some(start), Some(end)) = (event.get("xaxis.range[0]"), event.get("xaxis.range[1]"))
        {
            return Some(Self::span(start.clone(), end.clone()));
        }
        match event.get("xaxis.range")? {
            Value::Array(bounds) if bounds.len() == 2 => {
                Some(Self::span(bounds[0].clone(), bounds[1].clone()))
            }
            _ => None,
        }
    }

    /// The x-axis view a layout currently declares.
    #[must_use]
    pub fn from_layout(layout: &Map<String, Value>) -> Self {
        let Some(xaxis) = layout.get("xaxis").and_then(Value::as_object) else {
            return Self::Auto;
        };
        if xaxis.get("autorange").and_then(Value::as_bool) == Some(true) {
            return Self::Auto;
        }
        match xaxis.get("range") {
            Some(Value::Array(bounds)) if bounds.len() == 2 => {
                Self::span(bounds[0].clone(), bounds[1].clone())
            }
            _ => Self::Auto,
        }
    }

    /// Write this view into a layout's `xaxis`, keeping its other settings.
    pub fn apply_to_layout(&self, layout: &mut Map<String, Value>) {
        let xaxis = layout
            .entry("xaxis")
            .or_insert_with(|| Value::Object(Map::new()));
        if !xaxis.is_object() {
            *xaxis = Value::Object(Map::new());
        }
        let Some(xaxis) = xaxis.as_object_mut() else {
            return;
        };
        match self {
            Self::Auto => {
                xaxis.remove("range");
                xaxis.insert("autorange".to_string(), Value::Bool(true));
            }
            Self::Span { start, end } => {
                xaxis.insert("range".to_string(), json!([start, end]));
                xaxis.insert("autorange".to_string(), Value::Bool(false));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Svg,
    Webp,
}

impl ImageFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Svg => "svg",
            Self::Webp => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ImageFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "svg" => Ok(Self::Svg),
            "webp" => Ok(Self::Webp),
            other => Err(AppError::InvalidOption {
                field: "format",
                value: other.to_string(),
            }),
        }
    }
}

/// One persistent chart instance of the charting library.
pub trait ChartSurface: Send {
    /// Replace data and layout of the existing instance.
    fn update(&mut self, figure: &Figure);

    /// Re-measure the container.
    fn resize(&mut self);

    /// Set the x-axis view without touching data.
    fn apply_range(&mut self, range: &AxisRange);

    /// Save the current rendering as an image.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Export` if the surface cannot produce the image.
    fn export_image(&self, filename: &str, format: ImageFormat) -> AppResult<()>;
}

struct Slot<S> {
    surface: S,
    view: AxisRange,
    shown: Option<PlotResult>,
}

impl<S> Slot<S> {
    fn new(surface: S) -> Self {
        Self {
            surface,
            view: AxisRange::Auto,
            shown: None,
        }
    }
}

pub struct ChartRenderer<S> {
    raw: Mutex<Slot<S>>,
    ratio: Mutex<Slot<S>>,
}

impl<S: ChartSurface> ChartRenderer<S> {
    #[must_use]
    pub fn new(raw: S, ratio: S) -> Self {
        Self {
            raw: Mutex::new(Slot::new(raw)),
            ratio: Mutex::new(Slot::new(ratio)),
        }
    }

    fn slot(&self, kind: PlotKind) -> MutexGuard<'_, Slot<S>> {
        let slot = match kind {
            PlotKind::Raw => &self.raw,
            PlotKind::Ratio => &self.ratio,
        };
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `result` to the chart of `kind` in place, then re-measure.
    pub fn render(&self, kind: PlotKind, result: &PlotResult) {
        let mut slot = self.slot(kind);
        slot.surface.update(&result.figure);
        slot.surface.resize();
        slot.view = AxisRange::from_layout(&result.figure.layout);
        slot.shown = Some(result.clone());

        tracing::debug!(
            container = kind.container_id(),
            seq = result.seq,
            traces = result.figure.data.len(),
            "Plot rendered"
        );
    }

    /// Mirror a pan/zoom of `source` onto its partner chart.
    ///
    /// Returns whether the partner changed. The echo event the partner emits
    /// after being updated finds both views equal and stops there.
    pub fn on_relayout(&self, source: PlotKind, range: &AxisRange) -> bool {
        // Fixed lock order: raw, then ratio
        let mut raw = self.slot(PlotKind::Raw);
        let mut ratio = self.slot(PlotKind::Ratio);
        let (from, to) = match source {
            PlotKind::Raw => (&mut *raw, &mut *ratio),
            PlotKind::Ratio => (&mut *ratio, &mut *raw),
        };

        from.view = range.clone();
        if to.view == *range {
            return false;
        }
        if to.shown.is_none() {
            tracing::debug!(
                source = source.container_id(),
                "Partner chart not rendered, skipping mirror"
            );
            return false;
        }

        to.surface.apply_range(range);
        to.view = range.clone();
        tracing::debug!(
            source = source.container_id(),
            mirrored_to = source.partner().container_id(),
            range = ?range,
            "Axis range mirrored"
        );
        true
    }

    /// The result currently shown in the chart of `kind`.
    #[must_use]
    pub fn shown(&self, kind: PlotKind) -> Option<PlotResult> {
        self.slot(kind).shown.clone()
    }

    #[must_use]
    pub fn view(&self, kind: PlotKind) -> AxisRange {
        self.slot(kind).view.clone()
    }

    /// # Errors
    ///
    /// Returns `AppError::Export` if nothing has been rendered yet or the
    /// surface fails to export.
    pub fn export_image(&self, kind: PlotKind, filename: &str, format: ImageFormat) -> AppResult<()> {
        let slot = self.slot(kind);
        if slot.shown.is_none() {
            return Err(AppError::Export(format!("no {kind} plot has been rendered yet")));
        }
        slot.surface.export_image(filename, format)
    }
}

impl<S: ChartSurface> PlotSink for ChartRenderer<S> {
    fn show_plot(&self, result: &PlotResult) {
        self.render(result.request.kind, result);
    }
}

/// In-memory chart instance: keeps the figure as declared, view included.
///
/// Has no rasterizer; callers export the figure JSON instead.
#[derive(Debug, Default)]
pub struct FigureSurface {
    figure: Option<Figure>,
    resizes: usize,
}

impl FigureSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn figure(&self) -> Option<&Figure> {
        self.figure.as_ref()
    }

    #[must_use]
    pub fn resizes(&self) -> usize {
        self.resizes
    }
}

impl ChartSurface for FigureSurface {
    fn update(&mut self, figure: &Figure) {
        match &mut self.figure {
            Some(current) => {
                current.data.clone_from(&figure.data);
                current.layout.clone_from(&figure.layout);
            }
            None => self.figure = Some(figure.clone()),
        }
    }

    fn resize(&mut self) {
        self.resizes += 1;
    }

    fn apply_range(&mut self, range: &AxisRange) {
        if let Some(figure) = &mut self.figure {
            range.apply_to_layout(&mut figure.layout);
        }
    }

    fn export_image(&self, filename: &str, format: ImageFormat) -> AppResult<()> {
        Err(AppError::Export(format!(
            "cannot rasterize {filename} as {format} without a charting backend"
        )))
    }
}
