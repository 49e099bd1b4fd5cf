//! Budget template: categories of line items weighted by incidence.
//!
//! A [`BudgetLineItem`] carries a fixed percentage weight ("incidence") of
//! the total project cost. A well-formed template sums to 100; the
//! [`IncidenceBalance`] classification reports how far off a template is
//! without rejecting it, since users may override the soft invariant.
//!
//! Category and item order is document order and is never re-sorted
//! implicitly. [`BudgetCategory::sort_items`] applies natural (numeric-aware)
//! ordering on request, after an identifier edit.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{BudgetError, ValidationError};

/// Total incidence range treated as balanced.
pub const BALANCED_RANGE: (f64, f64) = (99.9, 100.1);

/// Total incidence range that only warrants a warning.
pub const WARNING_RANGE: (f64, f64) = (95.0, 105.0);

/// A single budget line item ("service").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetLineItem {
    pub id: String,
    pub name: String,
    /// Share of the total project cost, in percent.
    pub incidence: f64,
    /// Measurement unit shown next to the item (m², un, lot...).
    #[serde(default)]
    pub unit: String,
}

impl BudgetLineItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        incidence: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            incidence,
            unit: unit.into(),
        }
    }
}

/// A named group of line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetCategory {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sub_items: Vec<BudgetLineItem>,
}

impl BudgetCategory {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sub_items: Vec::new(),
        }
    }

    /// Builder-style item append.
    pub fn with_item(mut self, item: BudgetLineItem) -> Self {
        self.sub_items.push(item);
        self
    }

    /// Sum of the incidence of this category's items.
    pub fn incidence(&self) -> f64 {
        self.sub_items.iter().map(|item| item.incidence).sum()
    }

    /// Re-sort items by id using natural ordering (`1.2` before `1.10`).
    pub fn sort_items(&mut self) {
        self.sub_items.sort_by(|a, b| natural_cmp(&a.id, &b.id));
    }
}

/// How close a template's total incidence is to 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidenceBalance {
    /// Total within [99.9, 100.1].
    Balanced,
    /// Total within [95, 105] but not balanced.
    Warning,
    /// Anything else.
    Invalid,
}

impl IncidenceBalance {
    pub fn classify(total: f64) -> Self {
        if (BALANCED_RANGE.0..=BALANCED_RANGE.1).contains(&total) {
            IncidenceBalance::Balanced
        } else if (WARNING_RANGE.0..=WARNING_RANGE.1).contains(&total) {
            IncidenceBalance::Warning
        } else {
            IncidenceBalance::Invalid
        }
    }
}

impl std::fmt::Display for IncidenceBalance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncidenceBalance::Balanced => write!(f, "balanced"),
            IncidenceBalance::Warning => write!(f, "warning"),
            IncidenceBalance::Invalid => write!(f, "invalid"),
        }
    }
}

/// Partial edit of a line item. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ItemEdit {
    pub id: Option<String>,
    pub name: Option<String>,
    pub incidence: Option<f64>,
    pub unit: Option<String>,
}

/// Ordered list of budget categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetTemplate {
    pub categories: Vec<BudgetCategory>,
}

impl BudgetTemplate {
    pub fn new(categories: Vec<BudgetCategory>) -> Self {
        Self { categories }
    }

    /// Iterate over every line item in document order.
    pub fn items(&self) -> impl Iterator<Item = &BudgetLineItem> {
        self.categories.iter().flat_map(|c| c.sub_items.iter())
    }

    pub fn item_count(&self) -> usize {
        self.categories.iter().map(|c| c.sub_items.len()).sum()
    }

    pub fn total_incidence(&self) -> f64 {
        self.items().map(|item| item.incidence).sum()
    }

    pub fn balance(&self) -> IncidenceBalance {
        IncidenceBalance::classify(self.total_incidence())
    }

    pub fn category(&self, id: &str) -> Option<&BudgetCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn item(&self, id: &str) -> Option<&BudgetLineItem> {
        self.items().find(|item| item.id == id)
    }

    /// Find the first item whose display name equals `name`.
    pub fn item_by_name(&self, name: &str) -> Option<&BudgetLineItem> {
        self.items().find(|item| item.name == name)
    }

    fn id_in_use(&self, id: &str) -> bool {
        self.categories
            .iter()
            .any(|c| c.id == id || c.sub_items.iter().any(|item| item.id == id))
    }

    /// Structural problems, as field paths: blank or repeated ids, blank
    /// names, incidence outside [0, 100]. Category and item ids share one
    /// namespace. An unbalanced total is not a structural problem.
    pub fn field_errors(&self) -> Vec<String> {
        let mut fields = Vec::new();
        let mut seen = HashSet::new();
        if self.categories.is_empty() {
            fields.push("categories".to_string());
        }
        for (ci, category) in self.categories.iter().enumerate() {
            if category.id.trim().is_empty() || !seen.insert(category.id.as_str()) {
                fields.push(format!("categories[{ci}].id"));
            }
            if category.name.trim().is_empty() {
                fields.push(format!("categories[{ci}].name"));
            }
            for (ii, item) in category.sub_items.iter().enumerate() {
                if item.id.trim().is_empty() || !seen.insert(item.id.as_str()) {
                    fields.push(format!("categories[{ci}].subItems[{ii}].id"));
                }
                if item.name.trim().is_empty() {
                    fields.push(format!("categories[{ci}].subItems[{ii}].name"));
                }
                if validate_incidence(&item.id, item.incidence).is_err() {
                    fields.push(format!("categories[{ci}].subItems[{ii}].incidence"));
                }
            }
        }
        fields
    }

    /// Reject a structurally broken template, listing every failing field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fields = self.field_errors();
        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Fields { fields })
        }
    }

    /// Append a category at the end of the template.
    pub fn add_category(&mut self, category: BudgetCategory) -> Result<(), BudgetError> {
        if self.id_in_use(&category.id) {
            return Err(BudgetError::DuplicateId { id: category.id });
        }
        let mut incoming = HashSet::from([category.id.as_str()]);
        for item in &category.sub_items {
            validate_incidence(&item.id, item.incidence)?;
            if self.id_in_use(&item.id) || !incoming.insert(item.id.as_str()) {
                return Err(BudgetError::DuplicateId {
                    id: item.id.clone(),
                });
            }
        }
        self.categories.push(category);
        Ok(())
    }

    /// Remove a category and return it (with its items).
    pub fn remove_category(&mut self, id: &str) -> Result<BudgetCategory, BudgetError> {
        let index = self
            .categories
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| BudgetError::CategoryNotFound { id: id.into() })?;
        Ok(self.categories.remove(index))
    }

    pub fn rename_category(
        &mut self,
        id: &str,
        name: impl Into<String>,
    ) -> Result<(), BudgetError> {
        let category = self
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| BudgetError::CategoryNotFound { id: id.into() })?;
        category.name = name.into();
        Ok(())
    }

    /// Append an item to the given category.
    pub fn add_item(&mut self, category_id: &str, item: BudgetLineItem) -> Result<(), BudgetError> {
        validate_incidence(&item.id, item.incidence)?;
        if self.id_in_use(&item.id) {
            return Err(BudgetError::DuplicateId { id: item.id });
        }
        let category = self
            .categories
            .iter_mut()
            .find(|c| c.id == category_id)
            .ok_or_else(|| BudgetError::CategoryNotFound {
                id: category_id.into(),
            })?;
        category.sub_items.push(item);
        Ok(())
    }

    pub fn remove_item(&mut self, id: &str) -> Result<BudgetLineItem, BudgetError> {
        for category in &mut self.categories {
            if let Some(index) = category.sub_items.iter().position(|item| item.id == id) {
                return Ok(category.sub_items.remove(index));
            }
        }
        Err(BudgetError::ItemNotFound { id: id.into() })
    }

    /// Apply a partial edit to an item.
    ///
    /// Returns the item's previous id when the id changed, so callers can
    /// rename the matching progress row. An id change re-sorts the owning
    /// category naturally.
    pub fn edit_item(&mut self, id: &str, edit: ItemEdit) -> Result<Option<String>, BudgetError> {
        if let Some(new_id) = &edit.id {
            if new_id != id && self.id_in_use(new_id) {
                return Err(BudgetError::DuplicateId { id: new_id.clone() });
            }
        }
        if let Some(incidence) = edit.incidence {
            validate_incidence(id, incidence)?;
        }

        let category = self
            .categories
            .iter_mut()
            .find(|c| c.sub_items.iter().any(|item| item.id == id))
            .ok_or_else(|| BudgetError::ItemNotFound { id: id.into() })?;
        let Some(item) = category.sub_items.iter_mut().find(|item| item.id == id) else {
            return Err(BudgetError::ItemNotFound { id: id.into() });
        };

        if let Some(name) = edit.name {
            item.name = name;
        }
        if let Some(incidence) = edit.incidence {
            item.incidence = incidence;
        }
        if let Some(unit) = edit.unit {
            item.unit = unit;
        }
        match edit.id {
            Some(new_id) if new_id != id => {
                let old_id = std::mem::replace(&mut item.id, new_id);
                category.sort_items();
                Ok(Some(old_id))
            }
            _ => Ok(None),
        }
    }

    /// The built-in template used when a project is created without one.
    ///
    /// Eight categories of a typical single-storey housing unit, summing to
    /// exactly 100% incidence.
    pub fn default_housing() -> Self {
        let cat = |id: &str, name: &str, items: &[(&str, &str, f64, &str)]| {
            items.iter().fold(BudgetCategory::new(id, name), |c, (iid, n, inc, u)| {
                c.with_item(BudgetLineItem::new(*iid, *n, *inc, *u))
            })
        };
        Self::new(vec![
            cat(
                "1",
                "Preliminary services",
                &[
                    ("1.1", "Site mobilization", 1.5, "lot"),
                    ("1.2", "Temporary facilities", 1.0, "lot"),
                ],
            ),
            cat(
                "2",
                "Foundations",
                &[
                    ("2.1", "Excavation", 2.0, "m³"),
                    ("2.2", "Footings and grade beams", 6.0, "m³"),
                ],
            ),
            cat(
                "3",
                "Structure",
                &[
                    ("3.1", "Columns and beams", 7.0, "m³"),
                    ("3.2", "Slabs", 6.0, "m²"),
                ],
            ),
            cat(
                "4",
                "Masonry",
                &[
                    ("4.1", "Walls", 10.0, "m²"),
                    ("4.2", "Lintels", 1.5, "m"),
                ],
            ),
            cat(
                "5",
                "Roofing",
                &[
                    ("5.1", "Roof framing", 5.0, "m²"),
                    ("5.2", "Roof tiles", 4.0, "m²"),
                ],
            ),
            cat(
                "6",
                "Installations",
                &[
                    ("6.1", "Electrical", 7.0, "lot"),
                    ("6.2", "Plumbing", 6.5, "lot"),
                    ("6.3", "Sanitary sewer", 3.5, "lot"),
                ],
            ),
            cat(
                "7",
                "Finishes",
                &[
                    ("7.1", "Plastering", 8.0, "m²"),
                    ("7.2", "Flooring", 7.0, "m²"),
                    ("7.3", "Painting", 6.0, "m²"),
                    ("7.4", "Doors and windows", 8.0, "un"),
                ],
            ),
            cat(
                "8",
                "External works",
                &[
                    ("8.1", "Paving", 3.0, "m²"),
                    ("8.2", "Walls and fencing", 6.0, "m"),
                    ("8.3", "Final cleaning", 1.0, "lot"),
                ],
            ),
        ])
    }
}

fn validate_incidence(id: &str, value: f64) -> Result<(), BudgetError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(BudgetError::InvalidIncidence {
            id: id.into(),
            value,
        })
    }
}

/// Numeric-aware string comparison: digit runs compare by value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                // Strip leading zeros, then longer run is larger.
                let lt = ln.trim_start_matches('0');
                let rt = rn.trim_start_matches('0');
                let ord = lt.len().cmp(&rt.len()).then_with(|| lt.cmp(rt));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        run.push(c);
        chars.next();
    }
    run
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_categories() -> BudgetTemplate {
        BudgetTemplate::new(vec![
            BudgetCategory::new("1", "Foundations")
                .with_item(BudgetLineItem::new("1.1", "Footings", 50.0, "m³")),
            BudgetCategory::new("2", "Structure")
                .with_item(BudgetLineItem::new("2.1", "Columns", 50.0, "m³")),
        ])
    }

    #[test]
    fn default_template_is_balanced() {
        let template = BudgetTemplate::default_housing();
        assert!((template.total_incidence() - 100.0).abs() < 1e-9);
        assert_eq!(template.balance(), IncidenceBalance::Balanced);
        assert_eq!(template.categories.len(), 8);
    }

    #[test]
    fn balance_classification_bands() {
        assert_eq!(IncidenceBalance::classify(100.0), IncidenceBalance::Balanced);
        assert_eq!(IncidenceBalance::classify(99.95), IncidenceBalance::Balanced);
        assert_eq!(IncidenceBalance::classify(100.1), IncidenceBalance::Balanced);
        assert_eq!(IncidenceBalance::classify(99.0), IncidenceBalance::Warning);
        assert_eq!(IncidenceBalance::classify(105.0), IncidenceBalance::Warning);
        assert_eq!(IncidenceBalance::classify(94.9), IncidenceBalance::Invalid);
        assert_eq!(IncidenceBalance::classify(120.0), IncidenceBalance::Invalid);
    }

    #[test]
    fn natural_order_is_numeric_aware() {
        assert_eq!(natural_cmp("1.2", "1.10"), Ordering::Less);
        assert_eq!(natural_cmp("1.10", "1.9"), Ordering::Greater);
        assert_eq!(natural_cmp("2", "10"), Ordering::Less);
        assert_eq!(natural_cmp("1.02", "1.2"), Ordering::Equal);
        assert_eq!(natural_cmp("a1", "b0"), Ordering::Less);
        assert_eq!(natural_cmp("1", "1.1"), Ordering::Less);
    }

    #[test]
    fn category_order_is_preserved() {
        let mut template = two_categories();
        template
            .add_category(BudgetCategory::new("0", "Preliminaries"))
            .unwrap();
        let ids: Vec<_> = template.categories.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "0"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut template = two_categories();
        let err = template
            .add_item("2", BudgetLineItem::new("1.1", "Again", 1.0, "un"))
            .unwrap_err();
        assert!(matches!(err, BudgetError::DuplicateId { .. }));
        let err = template
            .add_category(BudgetCategory::new("2", "Twice"))
            .unwrap_err();
        assert!(matches!(err, BudgetError::DuplicateId { .. }));
    }

    #[test]
    fn add_category_rejects_repeated_ids_inside_it() {
        let mut template = two_categories();
        let category = BudgetCategory::new("9", "Landscaping")
            .with_item(BudgetLineItem::new("9.1", "Lawn", 1.0, "m²"))
            .with_item(BudgetLineItem::new("9.1", "Trees", 1.0, "un"));
        let err = template.add_category(category).unwrap_err();
        assert!(matches!(err, BudgetError::DuplicateId { ref id } if id == "9.1"));
        assert!(template.category("9").is_none());
    }

    #[test]
    fn validate_lists_every_structural_problem() {
        assert!(BudgetTemplate::default_housing().validate().is_ok());

        let template = BudgetTemplate::new(vec![
            BudgetCategory::new("1", "Foundations")
                .with_item(BudgetLineItem::new("1.1", "Footings", 50.0, "m³")),
            BudgetCategory::new("2", "")
                .with_item(BudgetLineItem::new("1.1", "Columns", 50.0, "m³"))
                .with_item(BudgetLineItem::new("2.2", "Slabs", 120.0, "m²")),
        ]);
        let ValidationError::Fields { fields } = template.validate().unwrap_err() else {
            panic!("expected field errors");
        };
        assert_eq!(
            fields,
            vec![
                "categories[1].name",
                "categories[1].subItems[0].id",
                "categories[1].subItems[1].incidence",
            ]
        );
        assert!(BudgetTemplate::default().validate().is_err());
    }

    #[test]
    fn edit_item_id_resorts_category() {
        let mut template = two_categories();
        template
            .add_item("1", BudgetLineItem::new("1.2", "Grade beams", 0.0, "m³"))
            .unwrap();
        template
            .add_item("1", BudgetLineItem::new("1.9", "Waterproofing", 0.0, "m²"))
            .unwrap();

        let renamed = template
            .edit_item(
                "1.1",
                ItemEdit {
                    id: Some("1.10".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.as_deref(), Some("1.1"));

        let ids: Vec<_> = template.categories[0]
            .sub_items
            .iter()
            .map(|item| item.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1.2", "1.9", "1.10"]);
    }

    #[test]
    fn edit_item_without_id_change_returns_none() {
        let mut template = two_categories();
        let renamed = template
            .edit_item(
                "2.1",
                ItemEdit {
                    name: Some("Columns and beams".into()),
                    incidence: Some(40.0),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(renamed.is_none());
        let item = template.item("2.1").unwrap();
        assert_eq!(item.name, "Columns and beams");
        assert_eq!(item.incidence, 40.0);
        assert_eq!(template.balance(), IncidenceBalance::Invalid);
    }

    #[test]
    fn invalid_incidence_rejected() {
        let mut template = two_categories();
        let err = template
            .add_item("1", BudgetLineItem::new("1.2", "Bad", f64::NAN, "un"))
            .unwrap_err();
        assert!(matches!(err, BudgetError::InvalidIncidence { .. }));
    }

    #[test]
    fn serializes_sub_items_in_camel_case() {
        let json = serde_json::to_value(two_categories()).unwrap();
        assert!(json[0]["subItems"].is_array());
        assert_eq!(json[0]["subItems"][0]["incidence"], 50.0);
    }

    #[test]
    fn remove_category_returns_items() {
        let mut template = two_categories();
        let removed = template.remove_category("1").unwrap();
        assert_eq!(removed.sub_items.len(), 1);
        assert!(template.item("1.1").is_none());
        assert!(template.remove_category("1").is_err());
    }
}
