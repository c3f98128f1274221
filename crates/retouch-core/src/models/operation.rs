use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::ValidationFailure;

/// Server-side transform selected in the form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKey {
    Cpng,
    Cjpg,
    Cwebp,
    Cgray,
    Resize,
    Rotate,
    Crop,
    BrightnessContrast,
    Flip,
    Blur,
    Sharpen,
    Invert,
    Watermark,
    Threshold,
}

/// How a field's raw string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Text,
    /// One of a fixed set of options, sent lowercase.
    Select(&'static [&'static str]),
}

/// One input the form renders for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

const fn number(name: &'static str, label: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        label,
        kind: FieldKind::Number,
        required: true,
    }
}

const FLIP_DIRECTIONS: &[&str] = &["horizontal", "vertical"];

const NO_FIELDS: &[FieldSpec] = &[];
const RESIZE_FIELDS: &[FieldSpec] = &[number("width", "Width (px)"), number("height", "Height (px)")];
const ROTATE_FIELDS: &[FieldSpec] = &[number("angle", "Rotation Angle (°)")];
const CROP_FIELDS: &[FieldSpec] = &[
    number("x", "X Coordinate"),
    number("y", "Y Coordinate"),
    number("width", "Width"),
    number("height", "Height"),
];
const BRIGHTNESS_CONTRAST_FIELDS: &[FieldSpec] = &[
    number("brightness", "Brightness (-100 to 100)"),
    number("contrast", "Contrast (-100 to 100)"),
];
const FLIP_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "flipDirection",
    label: "Flip Direction",
    kind: FieldKind::Select(FLIP_DIRECTIONS),
    required: true,
}];
const BLUR_FIELDS: &[FieldSpec] = &[number("blurRadius", "Blur Radius (px)")];
const SHARPEN_FIELDS: &[FieldSpec] = &[number("sharpenAmount", "Sharpen Amount (0-100)")];
const WATERMARK_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "watermark_text",
    label: "Watermark Text",
    kind: FieldKind::Text,
    required: true,
}];
const THRESHOLD_FIELDS: &[FieldSpec] = &[number("threshold", "Threshold (0-255)")];

impl OperationKey {
    pub const ALL: [OperationKey; 14] = [
        OperationKey::Cpng,
        OperationKey::Cjpg,
        OperationKey::Cwebp,
        OperationKey::Cgray,
        OperationKey::Resize,
        OperationKey::Rotate,
        OperationKey::Crop,
        OperationKey::BrightnessContrast,
        OperationKey::Flip,
        OperationKey::Blur,
        OperationKey::Sharpen,
        OperationKey::Invert,
        OperationKey::Watermark,
        OperationKey::Threshold,
    ];

    /// Identifier sent in the `operation` multipart field.
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKey::Cpng => "cpng",
            OperationKey::Cjpg => "cjpg",
            OperationKey::Cwebp => "cwebp",
            OperationKey::Cgray => "cgray",
            OperationKey::Resize => "resize",
            OperationKey::Rotate => "rotate",
            OperationKey::Crop => "crop",
            OperationKey::BrightnessContrast => "brightness_contrast",
            OperationKey::Flip => "flip",
            OperationKey::Blur => "blur",
            OperationKey::Sharpen => "sharpen",
            OperationKey::Invert => "invert",
            OperationKey::Watermark => "watermark",
            OperationKey::Threshold => "threshold",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OperationKey::Cpng => "Convert to PNG",
            OperationKey::Cjpg => "Convert to JPG",
            OperationKey::Cwebp => "Convert to WebP",
            OperationKey::Cgray => "Convert to Grayscale",
            OperationKey::Resize => "Resize",
            OperationKey::Rotate => "Rotate",
            OperationKey::Crop => "Crop",
            OperationKey::BrightnessContrast => "Brightness & Contrast",
            OperationKey::Flip => "Flip",
            OperationKey::Blur => "Blur",
            OperationKey::Sharpen => "Sharpen",
            OperationKey::Invert => "Invert Colors",
            OperationKey::Watermark => "Watermark",
            OperationKey::Threshold => "Threshold",
        }
    }

    /// Declared field set for this operation.
    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            OperationKey::Resize => RESIZE_FIELDS,
            OperationKey::Rotate => ROTATE_FIELDS,
            OperationKey::Crop => CROP_FIELDS,
            OperationKey::BrightnessContrast => BRIGHTNESS_CONTRAST_FIELDS,
            OperationKey::Flip => FLIP_FIELDS,
            OperationKey::Blur => BLUR_FIELDS,
            OperationKey::Sharpen => SHARPEN_FIELDS,
            OperationKey::Watermark => WATERMARK_FIELDS,
            OperationKey::Threshold => THRESHOLD_FIELDS,
            OperationKey::Cpng
            | OperationKey::Cjpg
            | OperationKey::Cwebp
            | OperationKey::Cgray
            | OperationKey::Invert => NO_FIELDS,
        }
    }

    pub fn required_fields(self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields().iter().filter(|f| f.required)
    }
}

impl Display for OperationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKey {
    type Err = ValidationFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        OperationKey::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| ValidationFailure::UnknownOperation(s.to_string()))
    }
}

impl FieldSpec {
    /// Check a non-empty raw value against this field's kind.
    pub fn check(&self, raw: &str) -> Result<(), String> {
        let value = raw.trim();
        match self.kind {
            FieldKind::Number => value
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|_| ())
                .ok_or_else(|| format!("'{}' is not a number", value)),
            FieldKind::Text => Ok(()),
            FieldKind::Select(options) => {
                let lowered = value.to_lowercase();
                if options.contains(&lowered.as_str()) {
                    Ok(())
                } else {
                    Err(format!("expected one of {}", options.join(", ")))
                }
            }
        }
    }

    /// Value as it goes on the wire.
    pub fn normalize(&self, raw: &str) -> String {
        match self.kind {
            FieldKind::Select(_) => raw.trim().to_lowercase(),
            FieldKind::Number => raw.trim().to_string(),
            FieldKind::Text => raw.to_string(),
        }
    }
}

/// What the form hands over at submit time: the operation and its raw field values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub operation: OperationKey,
    pub fields: BTreeMap<String, String>,
}

impl OperationRequest {
    pub fn new(operation: OperationKey) -> Self {
        Self {
            operation,
            fields: BTreeMap::new(),
        }
    }

    /// Parse the operation key and collect field values as the form supplied them.
    pub fn from_pairs<I, K, V>(operation: &str, pairs: I) -> Result<Self, ValidationFailure>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let operation = operation.parse::<OperationKey>()?;
        Ok(Self {
            operation,
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Declared fields with a non-blank value, normalized for the multipart body.
    /// Values for names the operation does not declare are dropped.
    pub fn wire_fields(&self) -> Vec<(&'static str, String)> {
        self.operation
            .fields()
            .iter()
            .filter_map(|spec| {
                self.value(spec.name)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (spec.name, spec.normalize(v)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_key_round_trips_through_str() {
        for key in OperationKey::ALL {
            assert_eq!(key.as_str().parse::<OperationKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_unknown_operation() {
        assert_eq!(
            "sepia".parse::<OperationKey>(),
            Err(ValidationFailure::UnknownOperation("sepia".to_string()))
        );
    }

    #[test]
    fn test_field_sets() {
        assert!(OperationKey::Cgray.fields().is_empty());
        let names: Vec<&str> = OperationKey::Crop.fields().iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["x", "y", "width", "height"]);
        assert_eq!(OperationKey::Resize.required_fields().count(), 2);
    }

    #[test]
    fn test_number_field_check() {
        let spec = RESIZE_FIELDS[0];
        assert!(spec.check("640").is_ok());
        assert!(spec.check(" 12.5 ").is_ok());
        assert!(spec.check("-3").is_ok());
        assert!(spec.check("wide").is_err());
        assert!(spec.check("NaN").is_err());
    }

    #[test]
    fn test_select_field_check_and_normalize() {
        let spec = FLIP_FIELDS[0];
        assert!(spec.check("Horizontal").is_ok());
        assert!(spec.check("diagonal").is_err());
        assert_eq!(spec.normalize(" Vertical "), "vertical");
    }

    #[test]
    fn test_wire_fields_drop_blank_and_undeclared() {
        let request = OperationRequest::new(OperationKey::Flip)
            .with_field("flipDirection", "Horizontal")
            .with_field("angle", "90");
        assert_eq!(
            request.wire_fields(),
            vec![("flipDirection", "horizontal".to_string())]
        );

        let blank = OperationRequest::new(OperationKey::Resize)
            .with_field("width", "100")
            .with_field("height", "  ");
        assert_eq!(blank.wire_fields(), vec![("width", "100".to_string())]);
    }

    #[test]
    fn test_from_pairs() {
        let request =
            OperationRequest::from_pairs("rotate", vec![("angle", "45")]).expect("known key");
        assert_eq!(request.operation, OperationKey::Rotate);
        assert_eq!(request.value("angle"), Some("45"));

        assert!(OperationRequest::from_pairs("nope", Vec::<(String, String)>::new()).is_err());
    }
}
