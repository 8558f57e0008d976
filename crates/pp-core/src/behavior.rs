//! Behavior catalog entries.
//!
//! A [`Behavior`] is what a pet can be logged for: it carries the points the pet
//! earns (or loses) and how long the same pet must wait before it can be logged
//! for the same behavior again.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{BehaviorId, ValidationError, check_max_chars, check_range};

/// Longest allowed behavior name, in characters.
pub const MAX_NAME_CHARS: usize = 100;
/// Smallest allowed point value.
pub const MIN_POINTS: i32 = -10;
/// Largest allowed point value.
pub const MAX_POINTS: i32 = 10;
/// Shortest allowed re-log interval, in minutes.
pub const MIN_INTERVAL_MINUTES: i64 = 5;
/// Longest allowed re-log interval, in minutes (one day).
pub const MAX_INTERVAL_MINUTES: i64 = 1440;

/// What kind of behavior a catalog entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorCategory {
    PottyTraining,
    Feeding,
    Social,
    Training,
    Play,
}

impl BehaviorCategory {
    pub const ALL: [Self; 5] = [
        Self::PottyTraining,
        Self::Feeding,
        Self::Social,
        Self::Training,
        Self::Play,
    ];

    /// String representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PottyTraining => "potty_training",
            Self::Feeding => "feeding",
            Self::Social => "social",
            Self::Training => "training",
            Self::Play => "play",
        }
    }
}

impl fmt::Display for BehaviorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BehaviorCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "potty_training" => Ok(Self::PottyTraining),
            "feeding" => Ok(Self::Feeding),
            "social" => Ok(Self::Social),
            "training" => Ok(Self::Training),
            "play" => Ok(Self::Play),
            _ => Err(ValidationError::UnknownVariant {
                field: "category",
                value: s.to_string(),
            }),
        }
    }
}

/// Species a behavior applies to, or a pet belongs to.
///
/// Pets are always `Dog` or `Cat`; `Both` only appears on catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Dog,
    Cat,
    Both,
}

impl Species {
    /// String representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Dog => "dog",
            Self::Cat => "cat",
            Self::Both => "both",
        }
    }

    /// Whether an entry scoped to `self` applies to a pet of `species`.
    #[must_use]
    pub fn covers(self, species: Self) -> bool {
        self == species || self == Self::Both
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Species {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dog" => Ok(Self::Dog),
            "cat" => Ok(Self::Cat),
            "both" => Ok(Self::Both),
            _ => Err(ValidationError::UnknownVariant {
                field: "species",
                value: s.to_string(),
            }),
        }
    }
}

/// The editable fields of a behavior.
///
/// Creating and updating a behavior both take a complete draft; there is no
/// partial patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorDraft {
    pub name: String,
    pub category: BehaviorCategory,
    pub point_value: i32,
    pub min_interval_minutes: i64,
    pub species: Species,
    pub active: bool,
}

impl BehaviorDraft {
    /// Checks every field against the catalog rules.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        check_max_chars("name", &self.name, MAX_NAME_CHARS)?;
        if self.point_value == 0 {
            return Err(ValidationError::ZeroPoints);
        }
        check_range(
            "point value",
            i64::from(self.point_value),
            i64::from(MIN_POINTS),
            i64::from(MAX_POINTS),
        )?;
        check_range(
            "minimum interval",
            self.min_interval_minutes,
            MIN_INTERVAL_MINUTES,
            MAX_INTERVAL_MINUTES,
        )?;
        Ok(())
    }
}

/// A validated catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Behavior {
    id: BehaviorId,
    name: String,
    category: BehaviorCategory,
    point_value: i32,
    min_interval_minutes: i64,
    species: Species,
    active: bool,
}

impl Behavior {
    /// Builds a behavior after validating the draft.
    pub fn new(id: BehaviorId, draft: BehaviorDraft) -> Result<Self, ValidationError> {
        draft.validate()?;
        Ok(Self::from_parts(id, draft))
    }

    /// Replaces every editable field, re-validating first.
    ///
    /// On error the behavior is left untouched.
    pub fn update(&mut self, draft: BehaviorDraft) -> Result<(), ValidationError> {
        draft.validate()?;
        *self = Self::from_parts(self.id.clone(), draft);
        Ok(())
    }

    fn from_parts(id: BehaviorId, draft: BehaviorDraft) -> Self {
        Self {
            id,
            name: draft.name,
            category: draft.category,
            point_value: draft.point_value,
            min_interval_minutes: draft.min_interval_minutes,
            species: draft.species,
            active: draft.active,
        }
    }

    pub const fn id(&self) -> &BehaviorId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn category(&self) -> BehaviorCategory {
        self.category
    }

    pub const fn point_value(&self) -> i32 {
        self.point_value
    }

    pub const fn min_interval_minutes(&self) -> i64 {
        self.min_interval_minutes
    }

    /// Minimum time between two logs of this behavior for the same pet.
    pub const fn min_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.min_interval_minutes)
    }

    pub const fn species(&self) -> Species {
        self.species
    }

    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether a pet of `species` can be logged for this behavior.
    pub fn is_valid_for_species(&self, species: Species) -> bool {
        self.species.covers(species)
    }

    /// Returns the current fields as a draft, e.g. to edit one field and update.
    pub fn to_draft(&self) -> BehaviorDraft {
        BehaviorDraft {
            name: self.name.clone(),
            category: self.category,
            point_value: self.point_value,
            min_interval_minutes: self.min_interval_minutes,
            species: self.species,
            active: self.active,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn draft(points: i32, interval: i64, species: Species) -> BehaviorDraft {
        BehaviorDraft {
            name: "Went potty outside".to_string(),
            category: BehaviorCategory::PottyTraining,
            point_value: points,
            min_interval_minutes: interval,
            species,
            active: true,
        }
    }

    #[test]
    fn rejects_zero_points() {
        let id = BehaviorId::new("potty").unwrap();
        let err = Behavior::new(id, draft(0, 30, Species::Dog)).unwrap_err();
        assert_eq!(err, ValidationError::ZeroPoints);
    }

    #[test]
    fn accepts_point_bounds_and_rejects_beyond() {
        for points in [-10, -1, 1, 10] {
            let id = BehaviorId::new("b").unwrap();
            assert!(Behavior::new(id, draft(points, 30, Species::Dog)).is_ok());
        }
        for points in [-11, 11, 100] {
            let id = BehaviorId::new("b").unwrap();
            assert!(matches!(
                Behavior::new(id, draft(points, 30, Species::Dog)),
                Err(ValidationError::OutOfRange { field: "point value", .. })
            ));
        }
    }

    #[test]
    fn interval_must_be_between_five_minutes_and_a_day() {
        let id = BehaviorId::new("b").unwrap();
        assert!(Behavior::new(id.clone(), draft(1, 5, Species::Cat)).is_ok());
        assert!(Behavior::new(id.clone(), draft(1, 1440, Species::Cat)).is_ok());
        assert!(Behavior::new(id.clone(), draft(1, 4, Species::Cat)).is_err());
        assert!(Behavior::new(id, draft(1, 1441, Species::Cat)).is_err());
    }

    #[test]
    fn name_must_be_present_and_short() {
        let id = BehaviorId::new("b").unwrap();
        let mut blank = draft(1, 5, Species::Dog);
        blank.name = "  ".to_string();
        assert_eq!(
            Behavior::new(id.clone(), blank).unwrap_err(),
            ValidationError::Empty { field: "name" }
        );

        let mut long = draft(1, 5, Species::Dog);
        long.name = "x".repeat(101);
        assert!(matches!(
            Behavior::new(id.clone(), long).unwrap_err(),
            ValidationError::TooLong { len: 101, .. }
        ));

        let mut exact = draft(1, 5, Species::Dog);
        exact.name = "x".repeat(100);
        assert!(Behavior::new(id, exact).is_ok());
    }

    #[test]
    fn update_revalidates_and_keeps_old_state_on_error() {
        let id = BehaviorId::new("b").unwrap();
        let mut behavior = Behavior::new(id, draft(5, 30, Species::Dog)).unwrap();

        assert!(behavior.update(draft(0, 30, Species::Dog)).is_err());
        assert_eq!(behavior.point_value(), 5);

        let mut replacement = behavior.to_draft();
        replacement.point_value = -3;
        replacement.species = Species::Both;
        behavior.update(replacement).unwrap();
        assert_eq!(behavior.point_value(), -3);
        assert_eq!(behavior.species(), Species::Both);
        assert_eq!(behavior.id().as_str(), "b");
    }

    #[test]
    fn species_filter_includes_both() {
        let id = BehaviorId::new("b").unwrap();
        let dog_only = Behavior::new(id.clone(), draft(1, 5, Species::Dog)).unwrap();
        let any = Behavior::new(id, draft(1, 5, Species::Both)).unwrap();

        assert!(dog_only.is_valid_for_species(Species::Dog));
        assert!(!dog_only.is_valid_for_species(Species::Cat));
        assert!(any.is_valid_for_species(Species::Dog));
        assert!(any.is_valid_for_species(Species::Cat));
    }

    #[test]
    fn enums_parse_canonical_strings_only() {
        for category in BehaviorCategory::ALL {
            assert_eq!(category.as_str().parse::<BehaviorCategory>(), Ok(category));
        }
        assert!("Potty Training".parse::<BehaviorCategory>().is_err());
        assert_eq!("both".parse::<Species>(), Ok(Species::Both));
        assert!("hamster".parse::<Species>().is_err());
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&BehaviorCategory::PottyTraining).unwrap();
        assert_eq!(json, "\"potty_training\"");
    }
}
