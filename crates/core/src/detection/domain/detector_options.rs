use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    #[default]
    Fast,
    Accurate,
}

/// Which overlay a detector variant feeds, and which capabilities it needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Landmarks + classification, rendered with face graphics.
    #[default]
    Landmarks,
    /// Contours only, rendered with contour graphics.
    Contours,
}

impl DetectorKind {
    /// Options matching what each overlay draws.
    pub fn default_options(self) -> DetectorOptions {
        match self {
            DetectorKind::Landmarks => DetectorOptions::builder()
                .landmarks(true)
                .classifications(true)
                .build(),
            DetectorKind::Contours => DetectorOptions::builder()
                .performance_mode(PerformanceMode::Fast)
                .contours(true)
                .build(),
        }
    }
}

impl std::str::FromStr for DetectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "landmarks" => Ok(DetectorKind::Landmarks),
            "contours" => Ok(DetectorKind::Contours),
            other => Err(format!(
                "Detector must be 'landmarks' or 'contours', got '{other}'"
            )),
        }
    }
}

/// Detector configuration. Build with [`DetectorOptions::builder`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectorOptions {
    pub performance_mode: PerformanceMode,
    pub landmarks: bool,
    pub classifications: bool,
    pub contours: bool,
    /// Smallest face to report, as a fraction of the image width.
    pub min_face_size: f32,
    pub tracking: bool,
    /// Score threshold for model-backed detectors.
    pub confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::Fast,
            landmarks: false,
            classifications: false,
            contours: false,
            min_face_size: 0.1,
            tracking: false,
            confidence: 0.5,
        }
    }
}

impl DetectorOptions {
    pub fn builder() -> DetectorOptionsBuilder {
        DetectorOptionsBuilder {
            options: DetectorOptions::default(),
        }
    }
}

pub struct DetectorOptionsBuilder {
    options: DetectorOptions,
}

impl DetectorOptionsBuilder {
    pub fn performance_mode(mut self, mode: PerformanceMode) -> Self {
        self.options.performance_mode = mode;
        self
    }

    pub fn landmarks(mut self, enabled: bool) -> Self {
        self.options.landmarks = enabled;
        self
    }

    pub fn classifications(mut self, enabled: bool) -> Self {
        self.options.classifications = enabled;
        self
    }

    pub fn contours(mut self, enabled: bool) -> Self {
        self.options.contours = enabled;
        self
    }

    pub fn min_face_size(mut self, fraction: f32) -> Self {
        self.options.min_face_size = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn tracking(mut self, enabled: bool) -> Self {
        self.options.tracking = enabled;
        self
    }

    pub fn confidence(mut self, threshold: f32) -> Self {
        self.options.confidence = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> DetectorOptions {
        self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let opts = DetectorOptions::builder().build();
        assert_eq!(opts, DetectorOptions::default());
        assert!(!opts.landmarks);
        assert!(!opts.tracking);
    }

    #[test]
    fn test_builder_sets_fields() {
        let opts = DetectorOptions::builder()
            .performance_mode(PerformanceMode::Accurate)
            .landmarks(true)
            .classifications(true)
            .tracking(true)
            .min_face_size(0.2)
            .build();
        assert_eq!(opts.performance_mode, PerformanceMode::Accurate);
        assert!(opts.landmarks && opts.classifications && opts.tracking);
        assert!((opts.min_face_size - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_builder_clamps_fractions() {
        let opts = DetectorOptions::builder()
            .min_face_size(3.0)
            .confidence(-1.0)
            .build();
        assert_eq!(opts.min_face_size, 1.0);
        assert_eq!(opts.confidence, 0.0);
    }

    #[test]
    fn test_kind_default_options() {
        let landmarks = DetectorKind::Landmarks.default_options();
        assert!(landmarks.landmarks && landmarks.classifications && !landmarks.contours);

        let contours = DetectorKind::Contours.default_options();
        assert!(contours.contours && !contours.landmarks);
        assert_eq!(contours.performance_mode, PerformanceMode::Fast);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Contours".parse::<DetectorKind>().unwrap(), DetectorKind::Contours);
        assert!("mesh".parse::<DetectorKind>().is_err());
    }
}
