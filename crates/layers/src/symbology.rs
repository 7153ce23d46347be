use std::fmt;

use scene::components::Attributes;
use scene::feature_state::FeatureState;
use serde_json::{Map, Value as Json, json};

use crate::expression::{EvalContext, Expression, ExpressionError, Value};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorError {
    Invalid(String),
}

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorError::Invalid(s) => write!(f, "invalid hex color: {s:?}"),
        }
    }
}

impl std::error::Error for ColorError {}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn from_hex(s: &str) -> Result<Self, ColorError> {
        let invalid = || ColorError::Invalid(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map_err(|_| invalid());
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());

        let (r, g, b, a) = match hex.len() {
            3 => (nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17, 255),
            6 => (byte(0)?, byte(2)?, byte(4)?, 255),
            8 => (byte(0)?, byte(2)?, byte(4)?, byte(6)?),
            _ => return Err(invalid()),
        };
        Ok(Self::rgba(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        ))
    }

    /// `#rrggbb`, or `#rrggbbaa` when not opaque.
    pub fn to_hex(&self) -> String {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        if q(self.a) == 255 {
            format!("#{:02x}{:02x}{:02x}", q(self.r), q(self.g), q(self.b))
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", q(self.r), q(self.g), q(self.b), q(self.a))
        }
    }

    /// Scales RGB, keeping alpha.
    pub fn darken(&self, factor: f32) -> Self {
        Self::rgba(self.r * factor, self.g * factor, self.b * factor, self.a)
    }

    pub fn with_alpha(&self, a: f32) -> Self {
        Self::rgba(self.r, self.g, self.b, a)
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Building fill colors keyed on the `type` attribute.
pub const BUILDING_TYPE_COLORS: [(&str, &str); 4] = [
    ("residential", "#e8dacd"),
    ("commercial", "#c9b6a3"),
    ("industrial", "#a69989"),
    ("office", "#998b7d"),
];
pub const DEFAULT_BUILDING_COLOR: &str = "#a1907f";
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#f5a524";
pub const DEFAULT_BUILDING_HEIGHT: f64 = 15.0;
pub const METERS_PER_LEVEL: f64 = 3.0;
pub const BUILDING_OPACITY: f32 = 0.85;

/// Wall base brightness relative to the roof when the vertical gradient is on.
pub const GRADIENT_BASE_SHADE: f32 = 0.72;

/// Paint properties of a fill-extrusion layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FillExtrusionPaint {
    pub color: Expression,
    pub height: Expression,
    pub base: Expression,
    pub opacity: f32,
    pub vertical_gradient: bool,
}

/// Paint evaluated for one feature.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ResolvedExtrusion {
    pub color: Color,
    pub height: f64,
    pub base: f64,
    pub opacity: f32,
    pub vertical_gradient: bool,
}

impl FillExtrusionPaint {
    /// Paint of the `buildings-3d` layer. `highlight` replaces the fill of the selected feature.
    pub fn buildings(highlight: Option<Color>) -> Self {
        let highlight = highlight
            .map(|c| c.to_hex())
            .unwrap_or_else(|| DEFAULT_HIGHLIGHT_COLOR.to_string());
        let by_type = Expression::Match {
            input: Box::new(Expression::get("type")),
            arms: BUILDING_TYPE_COLORS
                .iter()
                .map(|(t, c)| (Value::from(*t), Expression::literal(*c)))
                .collect(),
            fallback: Box::new(Expression::literal(DEFAULT_BUILDING_COLOR)),
        };
        let color = Expression::Case {
            branches: vec![(
                Expression::Boolean(Box::new(Expression::FeatureState("selected".into())), false),
                Expression::literal(highlight),
            )],
            fallback: Box::new(by_type),
        };
        let height = Expression::Case {
            branches: vec![
                (Expression::has("height"), Expression::get("height")),
                (
                    Expression::has("levels"),
                    Expression::Mul(vec![
                        Expression::get("levels"),
                        Expression::literal(METERS_PER_LEVEL),
                    ]),
                ),
            ],
            fallback: Box::new(Expression::literal(DEFAULT_BUILDING_HEIGHT)),
        };
        Self {
            color,
            height,
            base: Expression::literal(0.0),
            opacity: BUILDING_OPACITY,
            vertical_gradient: true,
        }
    }

    pub fn resolve(&self, attributes: &Attributes, selected: bool) -> ResolvedExtrusion {
        let ctx = EvalContext::new(attributes).with_state(FeatureState { selected });

        let color = self
            .color
            .evaluate(&ctx)
            .as_str()
            .and_then(|s| Color::from_hex(s).ok())
            .unwrap_or(Color::rgba(0.0, 0.0, 0.0, 1.0));
        let height = finite_or(self.height.evaluate(&ctx), DEFAULT_BUILDING_HEIGHT).max(0.0);
        let base = finite_or(self.base.evaluate(&ctx), 0.0).clamp(0.0, height);

        ResolvedExtrusion {
            color,
            height,
            base,
            opacity: self.opacity,
            vertical_gradient: self.vertical_gradient,
        }
    }

    pub fn to_json(&self) -> Json {
        json!({
            "fill-extrusion-color": self.color.to_json(),
            "fill-extrusion-height": self.height.to_json(),
            "fill-extrusion-base": self.base.to_json(),
            "fill-extrusion-opacity": self.opacity,
            "fill-extrusion-vertical-gradient": self.vertical_gradient,
        })
    }

    /// Reads a style `paint` object. Missing properties take the MapLibre defaults.
    pub fn from_json(paint: &Map<String, Json>) -> Result<Self, ExpressionError> {
        let expr = |key: &str, default: Expression| match paint.get(key) {
            Some(v) => Expression::from_json(v),
            None => Ok(default),
        };
        Ok(Self {
            color: expr("fill-extrusion-color", Expression::literal("#000000"))?,
            height: expr("fill-extrusion-height", Expression::literal(0.0))?,
            base: expr("fill-extrusion-base", Expression::literal(0.0))?,
            opacity: paint
                .get("fill-extrusion-opacity")
                .and_then(Json::as_f64)
                .map(|o| o.clamp(0.0, 1.0) as f32)
                .unwrap_or(1.0),
            vertical_gradient: paint
                .get("fill-extrusion-vertical-gradient")
                .and_then(Json::as_bool)
                .unwrap_or(true),
        })
    }
}

impl ResolvedExtrusion {
    /// Roof color with layer opacity applied.
    pub fn top_color(&self) -> [f32; 4] {
        self.color.with_alpha(self.color.a * self.opacity).to_array()
    }

    /// Wall base color; darker than the roof when the vertical gradient is on.
    pub fn bottom_color(&self) -> [f32; 4] {
        let base = if self.vertical_gradient {
            self.color.darken(GRADIENT_BASE_SHADE)
        } else {
            self.color
        };
        base.with_alpha(self.color.a * self.opacity).to_array()
    }
}

/// Extrusion height of a building: `height`, else `levels × 3`, else 15 meters.
pub fn resolve_height(attributes: &Attributes) -> f64 {
    FillExtrusionPaint::buildings(None)
        .resolve(attributes, false)
        .height
}

fn finite_or(v: Value, fallback: f64) -> f64 {
    v.as_f64().filter(|n| n.is_finite()).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::{Color, ColorError, FillExtrusionPaint, resolve_height};
    use pretty_assertions::assert_eq;
    use scene::components::{AttributeValue, Attributes};

    fn assert_close(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-6, "expected {a} ~= {b}");
    }

    #[test]
    fn hex_colors() {
        let c = Color::from_hex("#e8dacd").expect("color");
        assert_eq!(c.to_hex(), "#e8dacd");
        assert_eq!(Color::from_hex("#fff").expect("short").to_hex(), "#ffffff");
        assert_eq!(Color::from_hex("#ff000080").expect("alpha").to_hex(), "#ff000080");
        assert_eq!(Color::from_hex("red"), Err(ColorError::Invalid("red".into())));
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("#gggggg").is_err());
    }

    #[test]
    fn height_fallbacks() {
        let h = |pairs: Vec<(&str, AttributeValue)>| resolve_height(&pairs.into_iter().collect::<Attributes>());
        assert_eq!(h(vec![("height", 42.0.into())]), 42.0);
        assert_eq!(h(vec![("levels", 3.0.into())]), 9.0);
        assert_eq!(h(vec![]), 15.0);
        assert_eq!(h(vec![("height", AttributeValue::Null), ("levels", 2.0.into())]), 6.0);
        assert_eq!(h(vec![("height", "12.5".into())]), 12.5);
        assert_eq!(h(vec![("height", "tall".into())]), 15.0);
        assert_eq!(h(vec![("height", 0.0.into()), ("levels", 5.0.into())]), 0.0);
    }

    #[test]
    fn color_by_type_and_highlight() {
        let paint = FillExtrusionPaint::buildings(None);
        let office: Attributes = [("type", "office")].into_iter().collect();
        assert_eq!(paint.resolve(&office, false).color.to_hex(), "#998b7d");
        assert_eq!(paint.resolve(&Attributes::new(), false).color.to_hex(), "#a1907f");
        assert_eq!(paint.resolve(&office, true).color.to_hex(), "#f5a524");

        let custom = FillExtrusionPaint::buildings(Some(Color::rgba(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(custom.resolve(&office, true).color.to_hex(), "#ff0000");
    }

    #[test]
    fn fixed_paint_properties() {
        let r = FillExtrusionPaint::buildings(None).resolve(&Attributes::new(), false);
        assert_eq!(r.base, 0.0);
        assert_close(r.opacity, 0.85);
        assert!(r.vertical_gradient);
        assert_close(r.top_color()[3], 0.85);
        assert_close(r.bottom_color()[0], r.color.r * 0.72);
    }

    #[test]
    fn paint_json_round_trip() {
        let paint = FillExtrusionPaint::buildings(None);
        let json = paint.to_json();
        let back = FillExtrusionPaint::from_json(json.as_object().expect("object")).expect("parse");
        assert_eq!(back, paint);
    }
}
