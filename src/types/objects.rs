//! Astral objects and grid positions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{MegaverseError, MegaverseResult};

/// A cell of the megaverse grid.
///
/// Coordinates are signed so that malformed input can be represented and
/// rejected by [`CreateOperation::validate`] instead of wrapping silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Zero-based row.
    pub row: i64,
    /// Zero-based column.
    pub column: i64,
}

impl Position {
    /// Creates a new position.
    pub const fn new(row: i64, column: i64) -> Self {
        Self { row, column }
    }

    /// Returns true if both coordinates are non-negative.
    pub fn is_valid(&self) -> bool {
        self.row >= 0 && self.column >= 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Soloon color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoloonColor {
    /// Blue.
    Blue,
    /// Red.
    Red,
    /// Purple.
    Purple,
    /// White.
    White,
}

impl SoloonColor {
    /// All colors.
    pub const ALL: [SoloonColor; 4] = [Self::Blue, Self::Red, Self::Purple, Self::White];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Red => "red",
            Self::Purple => "purple",
            Self::White => "white",
        }
    }
}

impl FromStr for SoloonColor {
    type Err = MegaverseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blue" => Ok(Self::Blue),
            "red" => Ok(Self::Red),
            "purple" => Ok(Self::Purple),
            "white" => Ok(Self::White),
            other => Err(MegaverseError::validation_field(
                format!(
                    "invalid soloon color '{}': must be blue, red, purple, or white",
                    other
                ),
                "color",
            )),
        }
    }
}

impl fmt::Display for SoloonColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cometh direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComethDirection {
    /// Up.
    Up,
    /// Down.
    Down,
    /// Left.
    Left,
    /// Right.
    Right,
}

impl ComethDirection {
    /// All directions.
    pub const ALL: [ComethDirection; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl FromStr for ComethDirection {
    type Err = MegaverseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(MegaverseError::validation_field(
                format!(
                    "invalid cometh direction '{}': must be up, down, left, or right",
                    other
                ),
                "direction",
            )),
        }
    }
}

impl fmt::Display for ComethDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of an astral object, independent of its attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    /// Plain marker.
    Polyanet,
    /// Colored marker.
    Soloon,
    /// Directional marker.
    Cometh,
}

impl ObjectKind {
    /// Every kind, in the order a bulk clear probes them.
    pub const ALL: [ObjectKind; 3] = [Self::Polyanet, Self::Soloon, Self::Cometh];

    /// REST collection path for this kind.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Polyanet => "/polyanets",
            Self::Soloon => "/soloons",
            Self::Cometh => "/comeths",
        }
    }

    /// Upper-case label, as used by the API and in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Polyanet => "POLYANET",
            Self::Soloon => "SOLOON",
            Self::Cometh => "COMETH",
        }
    }

    /// Maps the numeric type code of the current-map endpoint.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Polyanet),
            1 => Some(Self::Soloon),
            2 => Some(Self::Cometh),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directive to place one object at one position.
///
/// Operations are built by plan generators and only ever read afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CreateOperation {
    /// Place a Polyanet.
    Polyanet {
        /// Target cell.
        position: Position,
    },
    /// Place a Soloon of the given color.
    Soloon {
        /// Target cell.
        position: Position,
        /// Soloon color.
        color: SoloonColor,
    },
    /// Place a Cometh facing the given direction.
    Cometh {
        /// Target cell.
        position: Position,
        /// Cometh direction.
        direction: ComethDirection,
    },
}

impl CreateOperation {
    /// Creates a Polyanet operation.
    pub fn polyanet(row: i64, column: i64) -> Self {
        Self::Polyanet {
            position: Position::new(row, column),
        }
    }

    /// Creates a Soloon operation.
    pub fn soloon(row: i64, column: i64, color: SoloonColor) -> Self {
        Self::Soloon {
            position: Position::new(row, column),
            color,
        }
    }

    /// Creates a Cometh operation.
    pub fn cometh(row: i64, column: i64, direction: ComethDirection) -> Self {
        Self::Cometh {
            position: Position::new(row, column),
            direction,
        }
    }

    /// Target cell.
    pub fn position(&self) -> Position {
        match self {
            Self::Polyanet { position }
            | Self::Soloon { position, .. }
            | Self::Cometh { position, .. } => *position,
        }
    }

    /// Object kind.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Polyanet { .. } => ObjectKind::Polyanet,
            Self::Soloon { .. } => ObjectKind::Soloon,
            Self::Cometh { .. } => ObjectKind::Cometh,
        }
    }

    /// Checks the operation's own invariants.
    ///
    /// Enum attributes are valid by construction; only the position can be
    /// out of range.
    pub fn validate(&self) -> MegaverseResult<()> {
        let position = self.position();
        if !position.is_valid() {
            return Err(MegaverseError::validation_field(
                format!(
                    "invalid position {}: coordinates must be non-negative",
                    position
                ),
                "position",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for CreateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Polyanet { position } => write!(f, "POLYANET at {}", position),
            Self::Soloon { position, color } => write!(f, "{} SOLOON at {}", color, position),
            Self::Cometh {
                position,
                direction,
            } => write!(f, "{} COMETH at {}", direction, position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_negative_position() {
        assert!(CreateOperation::polyanet(0, 0).validate().is_ok());

        let err = CreateOperation::soloon(-1, 3, SoloonColor::Red)
            .validate()
            .unwrap_err();
        assert!(matches!(err, MegaverseError::Validation { .. }));

        assert!(CreateOperation::cometh(2, -5, ComethDirection::Up)
            .validate()
            .is_err());
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!("BLUE".parse::<SoloonColor>().unwrap(), SoloonColor::Blue);
        assert_eq!(" purple ".parse::<SoloonColor>().unwrap(), SoloonColor::Purple);
        assert!("green".parse::<SoloonColor>().is_err());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("left".parse::<ComethDirection>().unwrap(), ComethDirection::Left);
        assert!("sideways".parse::<ComethDirection>().is_err());
    }

    #[test]
    fn test_kind_and_endpoint() {
        let op = CreateOperation::cometh(1, 2, ComethDirection::Down);
        assert_eq!(op.kind(), ObjectKind::Cometh);
        assert_eq!(op.kind().endpoint(), "/comeths");
        assert_eq!(op.position(), Position::new(1, 2));
        assert_eq!(ObjectKind::from_code(1), Some(ObjectKind::Soloon));
        assert_eq!(ObjectKind::from_code(7), None);
    }

    #[test]
    fn test_attribute_serialization() {
        assert_eq!(serde_json::to_string(&SoloonColor::White).unwrap(), "\"white\"");
        assert_eq!(
            serde_json::to_string(&ComethDirection::Right).unwrap(),
            "\"right\""
        );
    }
}
