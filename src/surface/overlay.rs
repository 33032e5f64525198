use geo_types::LineString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Point;

pub const ACTIVE_COLOR: &str = "#1e40af";
pub const INACTIVE_COLOR: &str = "#94a3b8";
pub const EDITING_COLOR: &str = "#f97316";
pub const START_COLOR: &str = "#10b981";
pub const END_COLOR: &str = "#ef4444";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverlayHandle(pub Uuid);

impl OverlayHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OverlayHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    Marker(Marker),
    Polyline(Polyline),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub position: Point,
    pub icon: MarkerIcon,
    pub popup: Option<Popup>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum MarkerIcon {
    Numbered { label: usize },
    Start,
    End,
}

impl MarkerIcon {
    pub fn color(&self) -> &'static str {
        match self {
            Self::Numbered { label: _ } => EDITING_COLOR,
            Self::Start => START_COLOR,
            Self::End => END_COLOR,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Polyline {
    pub path: LineString<f64>,
    pub style: LineStyle,
    pub popup: Option<Popup>,
    pub clickable: bool,
}

impl Polyline {
    pub fn points(&self) -> Vec<Point> {
        self.path.coords().map(|c| Point::from(*c)).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LineStyle {
    pub color: &'static str,
    pub weight: f64,
    pub opacity: f64,
}

impl LineStyle {
    pub fn for_status(active: bool) -> Self {
        let color = match active {
            true => ACTIVE_COLOR,
            false => INACTIVE_COLOR,
        };

        Self {
            color,
            weight: 4.0,
            opacity: 0.8,
        }
    }

    pub fn editing() -> Self {
        Self {
            color: EDITING_COLOR,
            weight: 4.0,
            opacity: 0.8,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Popup {
    pub title: String,
    pub lines: Vec<(String, String)>,
    pub action: Option<PopupAction>,
}

impl Popup {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: vec![],
            action: None,
        }
    }

    pub fn line(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.lines.push((label.into(), value.into()));
        self
    }

    pub fn with_action(mut self, action: PopupAction) -> Self {
        self.action = Some(action);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum PopupAction {
    /// Remove the point at this 0-based position of the snapshot the
    /// marker was drawn from.
    RemovePoint { index: usize },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SurfaceEvent {
    Click(Point),
    PopupAction {
        handle: OverlayHandle,
        action: PopupAction,
    },
    OverlayClick(OverlayHandle),
}
