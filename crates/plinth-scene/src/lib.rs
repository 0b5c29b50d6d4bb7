use glam::{Mat4, Vec3};
use plinth_3d::Model;
use std::sync::Arc;

pub struct ModelInstance {
    pub model: Arc<Model>,
    pub transform: Mat4,
}

/// CPU-side scene graph. Loaded models are attached here; the scene-level
/// scale is applied to everything in it, not per model.
pub struct Scene {
    models: Vec<ModelInstance>,
    scale: Vec3,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            scale: Vec3::ONE,
        }
    }

    /// Attaches a model root. Attaching is insert-only: the same path loaded
    /// twice yields two independent roots, there is no dedup or cache.
    pub fn add_model(&mut self, model: Arc<Model>, transform: Mat4) {
        self.models.push(ModelInstance { model, transform });
    }

    pub fn models(&self) -> &[ModelInstance] {
        &self.models
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    pub fn scale_matrix(&self) -> Mat4 {
        Mat4::from_scale(self.scale)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// The three live scale inputs, kept as raw text. They are re-parsed every
/// frame; whatever the user typed is the source of truth.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleParams {
    pub x: String,
    pub y: String,
    pub z: String,
}

impl ScaleParams {
    pub fn new(x: impl Into<String>, y: impl Into<String>, z: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            z: z.into(),
        }
    }

    /// Parses the three fields. Non-numeric text degrades to NaN and is
    /// passed through to the scene transform unchanged, which leaves the
    /// scene degenerate until the user corrects the input.
    pub fn to_scale(&self) -> Vec3 {
        Vec3::new(
            parse_scalar(&self.x),
            parse_scalar(&self.y),
            parse_scalar(&self.z),
        )
    }
}

/// Parses the longest numeric prefix of the input, so trailing units or stray
/// characters ("0.1x", "2cm") still read as the number. Input with no numeric
/// prefix at all yields NaN.
pub fn parse_scalar(text: &str) -> f32 {
    let text = text.trim();
    numeric_prefix_len(text)
        .and_then(|len| text[..len].parse::<f32>().ok())
        .unwrap_or(f32::NAN)
}

/// Byte length of the leading `[+-]? digits [. digits]? ([eE][+-]? digits)?`
/// run, or None when the input does not start with a number. An exponent
/// marker without digits after it is not part of the number.
fn numeric_prefix_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    let int_start = i;
    while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
        i += 1;
    }
    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        while bytes.get(i).is_some_and(|b| b.is_ascii_digit()) {
            i += 1;
            frac_digits += 1;
        }
    }
    if i == int_start || (i == int_start + 1 && frac_digits == 0 && bytes[int_start] == b'.') {
        return None;
    }
    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
            j += 1;
        }
        let exp_start = j;
        while bytes.get(j).is_some_and(|b| b.is_ascii_digit()) {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    Some(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_model(name: &str) -> Arc<Model> {
        Arc::new(Model {
            name: Some(name.to_string()),
            meshes: Vec::new(),
            materials: Vec::new(),
            recommended_xform: Mat4::IDENTITY,
        })
    }

    #[test]
    fn scale_passes_through_exactly() {
        let mut scene = Scene::new();
        let params = ScaleParams::new("2", "3", "4");
        scene.set_scale(params.to_scale());
        assert_eq!(scene.scale(), Vec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn non_numeric_input_degrades_to_nan() {
        let params = ScaleParams::new("abc", "1", "1");
        let scale = params.to_scale();
        assert!(scale.x.is_nan());
        assert_eq!(scale.y, 1.0);
        assert_eq!(scale.z, 1.0);
    }

    #[test]
    fn nan_scale_flows_into_scale_matrix() {
        let mut scene = Scene::new();
        scene.set_scale(ScaleParams::new("abc", "1", "1").to_scale());
        assert!(scene.scale_matrix().x_axis.x.is_nan());
        assert_eq!(scene.scale_matrix().y_axis.y, 1.0);
    }

    #[test]
    fn whitespace_is_trimmed_before_parsing() {
        assert_eq!(parse_scalar(" 0.5 "), 0.5);
    }

    #[test]
    fn trailing_garbage_keeps_the_numeric_prefix() {
        assert_eq!(parse_scalar("0.1x"), 0.1);
        assert_eq!(parse_scalar("2cm"), 2.0);
        assert_eq!(parse_scalar("-3.5abc"), -3.5);
        assert_eq!(parse_scalar("1e2px"), 100.0);
    }

    #[test]
    fn bare_exponent_marker_is_not_part_of_the_number() {
        assert_eq!(parse_scalar("1e"), 1.0);
        assert_eq!(parse_scalar("2e+"), 2.0);
    }

    #[test]
    fn leading_dot_and_sign_forms_parse() {
        assert_eq!(parse_scalar(".5"), 0.5);
        assert_eq!(parse_scalar("5."), 5.0);
        assert_eq!(parse_scalar("+2"), 2.0);
    }

    #[test]
    fn inputs_with_no_numeric_prefix_are_nan() {
        assert!(parse_scalar(".").is_nan());
        assert!(parse_scalar("-").is_nan());
        assert!(parse_scalar("x0.1").is_nan());
        assert!(parse_scalar("").is_nan());
    }

    #[test]
    fn attaching_twice_keeps_both_roots() {
        let mut scene = Scene::new();
        scene.add_model(empty_model("lantern"), Mat4::IDENTITY);
        scene.add_model(empty_model("lantern"), Mat4::IDENTITY);
        assert_eq!(scene.models().len(), 2);
    }

    #[test]
    fn default_scale_is_identity() {
        let scene = Scene::new();
        assert_eq!(scene.scale(), Vec3::ONE);
        assert_eq!(scene.scale_matrix(), Mat4::IDENTITY);
    }
}
