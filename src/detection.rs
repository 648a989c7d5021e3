use serde::Serialize;

/// Label used when a class index falls outside the model's class table.
pub const UNKNOWN_LABEL: &str = "unknown";

/// How a raw model record identifies its class.
#[derive(Debug, Clone, PartialEq)]
pub enum RawClass {
    /// Index into the detector's class table.
    Index(usize),
    /// Class name already resolved by the backend.
    Name(String),
}

/// One object exactly as the detection capability reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class: RawClass,
    pub confidence: f32,
    /// Pixel corners in `xmin, ymin, xmax, ymax` order.
    pub corners: [f32; 4],
}

impl RawDetection {
    pub fn new(class: RawClass, confidence: f32, corners: [f32; 4]) -> Self {
        Self {
            class,
            confidence,
            corners,
        }
    }
}

/// Bounding box in pixel coordinates.
///
/// Ordering of the corners is not enforced; the values are whatever the
/// model produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn from_corners([xmin, ymin, xmax, ymax]: [f32; 4]) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }
}

/// A single observed object in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// Class name, e.g. "imprimiendo" or "spaghetti".
    #[serde(rename = "name")]
    pub label: String,

    /// Confidence score from 0.0 to 1.0.
    pub confidence: f32,

    #[serde(rename = "coordinates")]
    pub bounding_box: BoundingBox,
}

/// Ordered detections for one frame, in model output order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DetectionSet(Vec<Detection>);

impl DetectionSet {
    /// Normalize raw model records into detections.
    ///
    /// One detection per record, order preserved. Nothing is filtered or
    /// merged; overlapping boxes are the model's business.
    pub fn from_raw(records: Vec<RawDetection>, class_names: &[String]) -> Self {
        let detections = records
            .into_iter()
            .map(|record| {
                let label = match record.class {
                    RawClass::Name(name) => name,
                    RawClass::Index(index) => class_names
                        .get(index)
                        .cloned()
                        .unwrap_or_else(|| UNKNOWN_LABEL.to_string()),
                };
                Detection {
                    label,
                    confidence: record.confidence,
                    bounding_box: BoundingBox::from_corners(record.corners),
                }
            })
            .collect();

        Self(detections)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.0
    }
}

impl From<Vec<Detection>> for DetectionSet {
    fn from(detections: Vec<Detection>) -> Self {
        Self(detections)
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
