//! Housing units: the deliverables tracked independently for progress.
//!
//! A unit's position in [`HousingUnits`] is the index of its slot in every
//! progress row. All position lookups go through [`HousingUnits::position_of`]
//! so the positional layout stays an implementation detail of this module and
//! [`crate::matrix`].

use serde::{Deserialize, Serialize};

use crate::error::UnitError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HousingUnit {
    pub id: String,
    pub name: String,
}

impl HousingUnit {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Ordered list of housing units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HousingUnits {
    units: Vec<HousingUnit>,
}

impl HousingUnits {
    pub fn new(units: Vec<HousingUnit>) -> Result<Self, UnitError> {
        let mut seen = std::collections::HashSet::new();
        for unit in &units {
            if !seen.insert(unit.id.as_str()) {
                return Err(UnitError::DuplicateId {
                    id: unit.id.clone(),
                });
            }
        }
        Ok(Self { units })
    }

    /// `count` units named "Unit 1" .. "Unit N" with ids `u1` .. `uN`.
    pub fn numbered(count: usize) -> Self {
        Self {
            units: (1..=count)
                .map(|n| HousingUnit::new(format!("u{n}"), format!("Unit {n}")))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn as_slice(&self) -> &[HousingUnit] {
        &self.units
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HousingUnit> {
        self.units.iter()
    }

    /// Slot index of the unit with the given id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.units.iter().position(|u| u.id == id)
    }

    /// Slot index of the first unit with the given display name.
    pub fn position_by_name(&self, name: &str) -> Option<usize> {
        self.units.iter().position(|u| u.name == name)
    }

    pub fn get(&self, position: usize) -> Option<&HousingUnit> {
        self.units.get(position)
    }

    /// Next free id of the form `uN`.
    pub fn next_id(&self) -> String {
        let max = self
            .units
            .iter()
            .filter_map(|u| u.id.strip_prefix('u').and_then(|n| n.parse::<u64>().ok()))
            .max()
            .unwrap_or(0);
        format!("u{}", max + 1)
    }

    pub fn push(&mut self, unit: HousingUnit) -> Result<(), UnitError> {
        if self.position_of(&unit.id).is_some() {
            return Err(UnitError::DuplicateId { id: unit.id });
        }
        self.units.push(unit);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<HousingUnit, UnitError> {
        let position = self
            .position_of(id)
            .ok_or_else(|| UnitError::NotFound { id: id.into() })?;
        Ok(self.units.remove(position))
    }

    pub fn rename(&mut self, id: &str, name: impl Into<String>) -> Result<(), UnitError> {
        let position = self
            .position_of(id)
            .ok_or_else(|| UnitError::NotFound { id: id.into() })?;
        self.units[position].name = name.into();
        Ok(())
    }
}

impl<'a> IntoIterator for &'a HousingUnits {
    type Item = &'a HousingUnit;
    type IntoIter = std::slice::Iter<'a, HousingUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}
