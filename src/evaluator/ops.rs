//! Pure compute functions for the fixed node kinds.
//!
//! Every function is total over its inputs: missing or mistyped inputs are
//! coerced, and NaN/infinite results are passed through untouched.

use crate::ast::Value;
use crate::graph::NodeKind;

/// `min` that propagates NaN from either side.
fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// `max(min, min(max, v))`
pub(crate) fn clamp(v: f64, min: f64, max: f64) -> f64 {
    nan_max(min, nan_min(max, v))
}

/// Unclamped linear interpolation; `t` outside `0..=1` extrapolates.
pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

pub(crate) fn min_max(values: &[f64], max: bool) -> f64 {
    let pick = if max { nan_max } else { nan_min };
    values
        .iter()
        .copied()
        .reduce(pick)
        .unwrap_or(f64::NAN)
}

fn hue_to_channel(p: f64, q: f64, t: f64) -> f64 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Hue in degrees, saturation and lightness in `0..=1`.
pub(crate) fn hsl_to_rgb(h: f64, s: f64, l: f64) -> [f64; 3] {
    if s == 0.0 {
        return [l, l, l];
    }
    let h = (h / 360.0).rem_euclid(1.0);
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    [
        hue_to_channel(p, q, h + 1.0 / 3.0),
        hue_to_channel(p, q, h),
        hue_to_channel(p, q, h - 1.0 / 3.0),
    ]
}

fn number(inputs: &[Value], index: usize) -> f64 {
    inputs.get(index).map_or(0.0, Value::as_number)
}

fn vector2(inputs: &[Value], index: usize) -> [f64; 2] {
    inputs.get(index).map_or([0.0, 0.0], Value::as_vector2)
}

/// Maps the resolved inputs of a node to its outputs, in port order.
///
/// Expression nodes are not fixed-arity operations; the evaluator runs their
/// program instead, and this function only passes their inputs through.
pub fn compute(kind: &NodeKind, inputs: &[Value]) -> Vec<Value> {
    let n = |i| number(inputs, i);
    match kind {
        NodeKind::Add => vec![Value::Number(n(0) + n(1))],
        NodeKind::Subtract => vec![Value::Number(n(0) - n(1))],
        NodeKind::Multiply => vec![Value::Number(n(0) * n(1))],
        NodeKind::Divide => vec![Value::Number(n(0) / n(1))],
        NodeKind::DegreesToRadians => vec![Value::Number(n(0).to_radians())],
        NodeKind::RadiansToDegrees => vec![Value::Number(n(0).to_degrees())],
        NodeKind::Clamp => vec![Value::Number(clamp(n(0), n(1), n(2)))],
        NodeKind::Lerp => vec![Value::Number(lerp(n(0), n(1), n(2)))],
        NodeKind::Vector2Compose => vec![Value::Vector2([n(0), n(1)])],
        NodeKind::Vector2Decompose => {
            let [x, y] = vector2(inputs, 0);
            vec![Value::Number(x), Value::Number(y)]
        }
        NodeKind::Vector2Add => {
            let ([ax, ay], [bx, by]) = (vector2(inputs, 0), vector2(inputs, 1));
            vec![Value::Vector2([ax + bx, ay + by])]
        }
        NodeKind::Vector2Lerp => {
            let ([ax, ay], [bx, by], t) = (vector2(inputs, 0), vector2(inputs, 1), n(2));
            vec![Value::Vector2([lerp(ax, bx, t), lerp(ay, by, t)])]
        }
        NodeKind::RectTranslate => {
            let [x, y, width, height] = inputs.first().map_or([0.0; 4], Value::as_rect);
            let [dx, dy] = vector2(inputs, 1);
            vec![Value::Rect([x + dx, y + dy, width, height])]
        }
        NodeKind::ColorCompose => vec![Value::Color([n(0), n(1), n(2), n(3)])],
        NodeKind::ColorDecompose => {
            let color = inputs.first().map_or([0.0, 0.0, 0.0, 1.0], Value::as_color);
            color.iter().map(|c| Value::Number(*c)).collect()
        }
        NodeKind::HslToColor => {
            let [r, g, b] = hsl_to_rgb(n(0), n(1), n(2));
            vec![Value::Color([r, g, b, n(3)])]
        }
        NodeKind::Number
        | NodeKind::Composition
        | NodeKind::ArrayModifierIndex
        | NodeKind::PropertyInput { .. }
        | NodeKind::PropertyOutput { .. }
        | NodeKind::Expression { .. } => inputs.to_vec(),
    }
}
