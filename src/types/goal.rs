//! Goal maps, the current megaverse grid, and plan validation reports.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{MegaverseError, MegaverseResult};

use super::objects::{ComethDirection, CreateOperation, Position, SoloonColor};
use super::plan::ExecutionPlan;

/// Target state returned by the goal endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalMap {
    /// Row-major grid of goal cell labels such as `SPACE` or `RED_SOLOON`.
    pub goal: Vec<Vec<String>>,
}

impl GoalMap {
    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.goal.len()
    }

    /// Number of columns, taken from the first row.
    pub fn columns(&self) -> usize {
        self.goal.first().map(Vec::len).unwrap_or(0)
    }

    /// Returns true if the goal has no cells at all.
    pub fn is_empty(&self) -> bool {
        self.goal.iter().all(Vec::is_empty)
    }
}

/// One decoded goal cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalCell {
    /// Nothing to place.
    Space,
    /// A Polyanet.
    Polyanet,
    /// A Soloon of the given color.
    Soloon(SoloonColor),
    /// A Cometh facing the given direction.
    Cometh(ComethDirection),
    /// A label outside the known vocabulary.
    Unknown(String),
}

impl GoalCell {
    /// Decodes a goal label. Matching ignores case and surrounding whitespace.
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "" | "SPACE" => GoalCell::Space,
            "POLYANET" => GoalCell::Polyanet,
            other => {
                if let Some(color) = other.strip_suffix("_SOLOON") {
                    if let Ok(color) = color.parse() {
                        return GoalCell::Soloon(color);
                    }
                } else if let Some(direction) = other.strip_suffix("_COMETH") {
                    if let Ok(direction) = direction.parse() {
                        return GoalCell::Cometh(direction);
                    }
                }
                GoalCell::Unknown(label.to_string())
            }
        }
    }

    /// The operation that realizes this cell at `(row, column)`, if any.
    pub fn to_operation(&self, row: i64, column: i64) -> Option<CreateOperation> {
        match self {
            GoalCell::Space | GoalCell::Unknown(_) => None,
            GoalCell::Polyanet => Some(CreateOperation::polyanet(row, column)),
            GoalCell::Soloon(color) => Some(CreateOperation::soloon(row, column, *color)),
            GoalCell::Cometh(direction) => Some(CreateOperation::cometh(row, column, *direction)),
        }
    }
}

/// Snapshot of the remote grid as reported by the current-map endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Megaverse {
    width: usize,
    height: usize,
    grid: Vec<Vec<Option<CreateOperation>>>,
}

impl Megaverse {
    /// Creates an empty grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            grid: vec![vec![None; width]; height],
        }
    }

    /// Grid width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height.
    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, position: Position) -> MegaverseResult<(usize, usize)> {
        let row = usize::try_from(position.row).ok().filter(|r| *r < self.height);
        let column = usize::try_from(position.column)
            .ok()
            .filter(|c| *c < self.width);
        match (row, column) {
            (Some(row), Some(column)) => Ok((row, column)),
            _ => Err(MegaverseError::validation_field(
                format!(
                    "position {} is outside the {}x{} megaverse",
                    position, self.width, self.height
                ),
                "position",
            )),
        }
    }

    /// Places an object, replacing whatever occupied the cell.
    pub fn place(&mut self, object: CreateOperation) -> MegaverseResult<()> {
        let (row, column) = self.index(object.position())?;
        self.grid[row][column] = Some(object);
        Ok(())
    }

    /// Object at a cell, if any.
    pub fn get(&self, position: Position) -> MegaverseResult<Option<&CreateOperation>> {
        let (row, column) = self.index(position)?;
        Ok(self.grid[row][column].as_ref())
    }

    /// Number of occupied cells.
    pub fn object_count(&self) -> usize {
        self.grid.iter().flatten().filter(|c| c.is_some()).count()
    }

    /// Compares the grid against every operation of a plan.
    pub fn validate_plan(&self, plan: &ExecutionPlan) -> ValidationReport {
        let mut report = ValidationReport {
            checked: plan.len(),
            mismatches: Vec::new(),
        };

        for expected in plan.operations() {
            let found = self.get(expected.position()).ok().flatten().copied();
            if found.as_ref() != Some(expected) {
                report.mismatches.push(Mismatch {
                    expected: *expected,
                    found,
                });
            }
        }

        report
    }
}

/// A plan operation whose cell does not hold the expected object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// What the plan asked for.
    pub expected: CreateOperation,
    /// What the grid holds instead.
    pub found: Option<CreateOperation>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.found {
            Some(found) => write!(f, "expected {}, found {}", self.expected, found),
            None => write!(f, "expected {}, found nothing", self.expected),
        }
    }
}

/// Result of comparing the remote grid with a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Operations checked.
    pub checked: usize,
    /// Cells that differ from the plan.
    pub mismatches: Vec<Mismatch>,
}

impl ValidationReport {
    /// Returns true if every plan operation is present on the grid.
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("SPACE", GoalCell::Space; "space")]
    #[test_case("", GoalCell::Space; "empty")]
    #[test_case("POLYANET", GoalCell::Polyanet; "polyanet")]
    #[test_case(" polyanet ", GoalCell::Polyanet; "lowercase padded")]
    #[test_case("RED_SOLOON", GoalCell::Soloon(SoloonColor::Red); "red soloon")]
    #[test_case("white_soloon", GoalCell::Soloon(SoloonColor::White); "white soloon")]
    #[test_case("LEFT_COMETH", GoalCell::Cometh(ComethDirection::Left); "left cometh")]
    #[test_case("GREEN_SOLOON", GoalCell::Unknown("GREEN_SOLOON".to_string()); "unknown color")]
    #[test_case("ASTEROID", GoalCell::Unknown("ASTEROID".to_string()); "unknown label")]
    fn test_goal_cell_parse(label: &str, expected: GoalCell) {
        assert_eq!(GoalCell::parse(label), expected);
    }

    #[test]
    fn test_goal_cell_to_operation() {
        assert_eq!(GoalCell::Space.to_operation(1, 1), None);
        assert_eq!(
            GoalCell::Cometh(ComethDirection::Up).to_operation(3, 4),
            Some(CreateOperation::cometh(3, 4, ComethDirection::Up))
        );
    }

    #[test]
    fn test_goal_map_dimensions() {
        let goal: GoalMap =
            serde_json::from_str(r#"{"goal":[["SPACE","POLYANET"],["SPACE","SPACE"],["RED_SOLOON","SPACE"]]}"#)
                .unwrap();
        assert_eq!(goal.rows(), 3);
        assert_eq!(goal.columns(), 2);
        assert!(!goal.is_empty());
        assert!(GoalMap::default().is_empty());
    }

    #[test]
    fn test_megaverse_bounds() {
        let mut megaverse = Megaverse::new(3, 2);
        assert!(megaverse.place(CreateOperation::polyanet(1, 2)).is_ok());
        assert!(megaverse.place(CreateOperation::polyanet(2, 0)).is_err());
        assert!(megaverse.get(Position::new(-1, 0)).is_err());
        assert_eq!(megaverse.object_count(), 1);
    }

    #[test]
    fn test_validate_plan_reports_mismatches() {
        let mut megaverse = Megaverse::new(5, 5);
        megaverse.place(CreateOperation::polyanet(0, 0)).unwrap();
        megaverse
            .place(CreateOperation::soloon(1, 1, SoloonColor::Blue))
            .unwrap();

        let plan = ExecutionPlan::sequential(vec![
            CreateOperation::polyanet(0, 0),
            CreateOperation::soloon(1, 1, SoloonColor::Red),
            CreateOperation::polyanet(2, 2),
        ]);

        let report = megaverse.validate_plan(&plan);
        assert_eq!(report.checked, 3);
        assert!(!report.is_valid());
        assert_eq!(report.mismatches.len(), 2);
        assert_eq!(
            report.mismatches[0].found,
            Some(CreateOperation::soloon(1, 1, SoloonColor::Blue))
        );
        assert_eq!(report.mismatches[1].found, None);
    }
}
