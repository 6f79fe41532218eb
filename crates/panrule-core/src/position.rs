// ── Position algebra ──
//
// Placement keywords for a rule group, their persisted numeric codes, and
// the check deciding whether an observed rulebase satisfies a placement.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

/// Where a rule group sits in its rulebase.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    /// No explicit placement. The group only has to stay contiguous.
    #[default]
    #[strum(serialize = "")]
    #[serde(rename = "")]
    Unspecified,
    Top,
    Bottom,
    Before,
    DirectlyBefore,
    After,
    DirectlyAfter,
}

impl Position {
    /// Numeric code stored in the composite identity.
    pub fn code(self) -> u8 {
        match self {
            Self::Unspecified => 0,
            Self::Before => 1,
            Self::DirectlyBefore => 2,
            Self::After => 3,
            Self::DirectlyAfter => 4,
            Self::Top => 5,
            Self::Bottom => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Unspecified,
            1 => Self::Before,
            2 => Self::DirectlyBefore,
            3 => Self::After,
            4 => Self::DirectlyAfter,
            5 => Self::Top,
            6 => Self::Bottom,
            _ => return None,
        })
    }

    /// Whether the keyword is anchored on a reference rule.
    pub fn is_relative(self) -> bool {
        matches!(
            self,
            Self::Before | Self::DirectlyBefore | Self::After | Self::DirectlyAfter
        )
    }

    pub fn is_top(self) -> bool {
        self == Self::Top
    }

    pub fn is_bottom(self) -> bool {
        self == Self::Bottom
    }

    /// The keyword an apply places the group by.
    ///
    /// A write always leaves the group adjacent to its reference, so
    /// `before`/`after` are enforced as their `directly-` forms. Reads use
    /// the keyword as declared.
    pub fn enforced(self) -> Self {
        match self {
            Self::Before => Self::DirectlyBefore,
            Self::After => Self::DirectlyAfter,
            other => other,
        }
    }
}

/// A keyword plus its (possibly empty) reference rule name.
///
/// `before` and `after` are lenient only when reading: a group with other
/// rules between it and its reference still reads as in position. Any apply
/// that has to move the group places it per [`Position::enforced`], so it
/// lands directly against the reference and the gap is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub position: Position,
    pub reference: String,
}

impl Placement {
    pub fn new(position: Position, reference: impl Into<String>) -> Self {
        Self {
            position,
            reference: reference.into(),
        }
    }

    /// The reference name for relative keywords, `None` otherwise.
    pub fn reference(&self) -> Option<&str> {
        if self.position.is_relative() {
            Some(self.reference.as_str())
        } else {
            None
        }
    }

    /// Check the keyword/reference pairing against the declared names.
    pub fn validate(&self, declared: &[String]) -> Result<(), CoreError> {
        if self.position.is_relative() {
            if self.reference.is_empty() {
                return Err(CoreError::validation(
                    "position_reference",
                    format!("position_keyword {:?} requires a position_reference", self.position.to_string()),
                ));
            }
            if self.reference.contains(crate::identity::SEPARATOR) {
                return Err(CoreError::validation(
                    "position_reference",
                    format!("{:?} must not contain ':'", self.reference),
                ));
            }
            if declared.iter().any(|n| *n == self.reference) {
                return Err(CoreError::validation(
                    "position_reference",
                    format!(
                        "{:?} is one of the rules in this group and cannot be its own reference",
                        self.reference
                    ),
                ));
            }
        } else if !self.reference.is_empty() {
            return Err(CoreError::validation(
                "position_reference",
                format!(
                    "must be empty when position_keyword is {:?}, got {:?}",
                    self.position.to_string(),
                    self.reference
                ),
            ));
        }
        Ok(())
    }
}

/// Whether `observed` holds `declared` as a contiguous run starting at
/// `first_idx` that also satisfies `position`.
///
/// `ref_idx` is the index of the reference rule, if present.
pub fn group_position_is_ok<S: AsRef<str>>(
    position: Position,
    first_idx: usize,
    ref_idx: Option<usize>,
    observed: &[S],
    declared: &[String],
) -> bool {
    let n = declared.len();
    let end = first_idx + n;
    let Some(run) = observed.get(first_idx..end) else {
        return false;
    };
    if !run.iter().zip(declared).all(|(o, d)| o.as_ref() == d) {
        return false;
    }

    match position {
        Position::Unspecified => true,
        Position::Top => first_idx == 0,
        Position::Bottom => end == observed.len(),
        Position::Before => ref_idx.is_some_and(|r| end <= r),
        Position::DirectlyBefore => ref_idx == Some(end),
        Position::After => ref_idx.is_some_and(|r| first_idx > r),
        Position::DirectlyAfter => ref_idx.is_some_and(|r| r + 1 == first_idx),
    }
}

/// One relocation of a single rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveStep {
    Top { name: String },
    Bottom { name: String },
    Before { name: String, dst: String },
    After { name: String, dst: String },
}

impl MoveStep {
    pub fn name(&self) -> &str {
        match self {
            Self::Top { name }
            | Self::Bottom { name }
            | Self::Before { name, .. }
            | Self::After { name, .. } => name,
        }
    }
}

/// Moves placing `names` as one contiguous run per `placement`.
///
/// The first rule is placed by the keyword and every following rule is
/// moved directly after its predecessor. With no keyword the run is
/// gathered behind its first rule, which stays where it is.
pub fn plan_group_move(placement: &Placement, names: &[String]) -> Vec<MoveStep> {
    let Some((first, rest)) = names.split_first() else {
        return Vec::new();
    };

    let mut steps = Vec::with_capacity(names.len());
    match placement.position {
        Position::Unspecified => {}
        Position::Top => steps.push(MoveStep::Top {
            name: first.clone(),
        }),
        Position::Bottom => steps.push(MoveStep::Bottom {
            name: first.clone(),
        }),
        Position::Before | Position::DirectlyBefore => steps.push(MoveStep::Before {
            name: first.clone(),
            dst: placement.reference.clone(),
        }),
        Position::After | Position::DirectlyAfter => steps.push(MoveStep::After {
            name: first.clone(),
            dst: placement.reference.clone(),
        }),
    }

    let mut prev = first;
    for name in rest {
        steps.push(MoveStep::After {
            name: name.clone(),
            dst: prev.clone(),
        });
        prev = name;
    }
    steps
}

/// Apply `steps` to an ordered name list, as the appliance would.
pub fn apply_move_steps(list: &mut Vec<String>, steps: &[MoveStep]) -> Result<(), CoreError> {
    for step in steps {
        let name = step.name();
        let idx = index_of(list, name).ok_or_else(|| CoreError::NotFound {
            what: format!("rule {name:?}"),
        })?;
        let moved = list.remove(idx);
        let at = match step {
            MoveStep::Top { .. } => 0,
            MoveStep::Bottom { .. } => list.len(),
            MoveStep::Before { dst, .. } | MoveStep::After { dst, .. } => {
                let dst_idx = index_of(list, dst).ok_or_else(|| CoreError::NotFound {
                    what: format!("rule {dst:?}"),
                })?;
                if matches!(step, MoveStep::After { .. }) {
                    dst_idx + 1
                } else {
                    dst_idx
                }
            }
        };
        list.insert(at, moved);
    }
    Ok(())
}

fn index_of(list: &[String], name: &str) -> Option<usize> {
    list.iter().position(|n| n == name)
}
