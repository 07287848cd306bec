use serde::{Deserialize, Serialize};

/// Which way the capturing camera points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }
}

impl std::fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraFacing::Back => write!(f, "back"),
            CameraFacing::Front => write!(f, "front"),
        }
    }
}

impl std::str::FromStr for CameraFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "back" => Ok(CameraFacing::Back),
            "front" => Ok(CameraFacing::Front),
            other => Err(format!("Camera facing must be 'front' or 'back', got '{other}'")),
        }
    }
}

/// Clockwise rotation needed to display a captured frame upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Snaps an arbitrary angle to the nearest quarter turn.
    pub fn from_degrees(angle: i32) -> Self {
        match angle.rem_euclid(360) {
            0..=44 | 316..=359 => Rotation::Deg0,
            45..=134 => Rotation::Deg90,
            135..=224 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// True when the upright image has width and height swapped.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

/// Capture metadata delivered alongside every camera frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub rotation: Rotation,
    /// `None` when the source cannot tell which camera produced the frame.
    #[serde(default)]
    pub camera_facing: Option<CameraFacing>,
}

impl FrameMetadata {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rotation: Rotation::Deg0,
            camera_facing: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_facing(mut self, facing: CameraFacing) -> Self {
        self.camera_facing = Some(facing);
        self
    }

    /// Facing used for rendering; frames without facing info are treated
    /// as back-facing.
    pub fn facing_or_default(&self) -> CameraFacing {
        self.camera_facing.unwrap_or_default()
    }

    /// Dimensions of the frame once rotated upright.
    pub fn upright_size(&self) -> (u32, u32) {
        if self.rotation.swaps_dimensions() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, Rotation::Deg0)]
    #[case(90, Rotation::Deg90)]
    #[case(-90, Rotation::Deg270)]
    #[case(180, Rotation::Deg180)]
    #[case(270, Rotation::Deg270)]
    #[case(359, Rotation::Deg0)]
    #[case(450, Rotation::Deg90)]
    fn test_rotation_from_degrees(#[case] angle: i32, #[case] expected: Rotation) {
        assert_eq!(Rotation::from_degrees(angle), expected);
    }

    #[test]
    fn test_missing_facing_defaults_to_back() {
        let meta = FrameMetadata::new(640, 480);
        assert_eq!(meta.facing_or_default(), CameraFacing::Back);
    }

    #[test]
    fn test_explicit_facing_is_kept() {
        let meta = FrameMetadata::new(640, 480).with_facing(CameraFacing::Front);
        assert_eq!(meta.facing_or_default(), CameraFacing::Front);
    }

    #[test]
    fn test_upright_size_swaps_for_portrait_rotation() {
        let meta = FrameMetadata::new(640, 480).with_rotation(Rotation::Deg90);
        assert_eq!(meta.upright_size(), (480, 640));
        let meta = meta.with_rotation(Rotation::Deg180);
        assert_eq!(meta.upright_size(), (640, 480));
    }

    #[test]
    fn test_facing_parse_and_toggle() {
        assert_eq!("Front".parse::<CameraFacing>().unwrap(), CameraFacing::Front);
        assert!("side".parse::<CameraFacing>().is_err());
        assert_eq!(CameraFacing::Back.toggled(), CameraFacing::Front);
    }

    #[test]
    fn test_metadata_deserializes_without_optional_fields() {
        let meta: FrameMetadata = serde_json::from_str(r#"{"width":4,"height":2}"#).unwrap();
        assert_eq!(meta.rotation, Rotation::Deg0);
        assert!(meta.camera_facing.is_none());
    }
}
