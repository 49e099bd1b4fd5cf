//! End-to-end tests for the progress tracking core, driven through the
//! public API the way the CLI uses it.

use obra::aggregate::aggregate;
use obra::assistant::ProgressUpdateRequest;
use obra::budget::{BudgetCategory, BudgetLineItem, BudgetTemplate};
use obra::matrix::ProgressMatrix;
use obra::project::{BulkScope, ProjectData};
use obra::reconcile::reconcile;
use obra::tracker::Tracker;
use obra::unit::{HousingUnit, HousingUnits};

const EPS: f64 = 1e-9;

fn two_category_template() -> BudgetTemplate {
    BudgetTemplate::new(vec![
        BudgetCategory::new("1", "Foundations")
            .with_item(BudgetLineItem::new("1.1", "Footings", 50.0, "m³")),
        BudgetCategory::new("2", "Structure")
            .with_item(BudgetLineItem::new("2.1", "Columns", 50.0, "m³")),
    ])
}

#[test]
fn reference_scenario() {
    let tracker = Tracker::in_memory("alice");
    let project = tracker
        .create_project(
            ProjectData::new("Reference", 200_000.0, 2).with_budget(two_category_template()),
        )
        .unwrap();
    tracker
        .with_project(&project.id, |p| p.set_progress("1.1", "u1", 100.0))
        .unwrap();

    let snapshot = tracker.report(&project.id).unwrap().snapshot;
    let footings = snapshot.item("1.1").unwrap();
    assert!((footings.average_progress - 50.0).abs() < EPS);
    assert!((footings.measured_incidence - 25.0).abs() < EPS);
    assert!((snapshot.category("1").unwrap().progress - 50.0).abs() < EPS);
    assert!((snapshot.total_progress - 25.0).abs() < EPS);
    assert!((snapshot.total_released - 50_000.0).abs() < EPS);
    assert!((snapshot.balance_to_measure - 150_000.0).abs() < EPS);
}

#[test]
fn complete_and_untouched_projects() {
    let template = BudgetTemplate::default_housing();
    let units = 5;

    let zero = ProgressMatrix::zeroed(&template, units);
    let snapshot = aggregate(&template, &zero, units, 321_000.0);
    assert_eq!(snapshot.total_progress, 0.0);
    assert_eq!(snapshot.total_released, 0.0);

    let mut full = ProgressMatrix::zeroed(&template, units);
    for item in template.items() {
        for position in 0..units {
            full.set(&item.id, position, 100.0);
        }
    }
    let snapshot = aggregate(&template, &full, units, 321_000.0);
    assert!((snapshot.total_progress - 100.0).abs() < 1e-6);
    assert!(
        (snapshot.balance_to_measure - (snapshot.total_cost - snapshot.total_released)).abs() < EPS
    );
}

#[test]
fn zero_units_never_divides_by_zero() {
    let template = two_category_template();
    let snapshot = aggregate(&template, &ProgressMatrix::new(), 0, 10_000.0);
    assert!(snapshot.categories.iter().flat_map(|c| &c.items).all(|i| i.average_progress == 0.0));
    assert_eq!(snapshot.total_progress, 0.0);
    assert!(snapshot.units.is_empty());
}

#[test]
fn unit_progress_mean_equals_total() {
    let tracker = Tracker::in_memory("alice");
    let project = tracker
        .create_project(ProjectData::new("Villa", 1.0, 3))
        .unwrap();
    tracker
        .with_project(&project.id, |p| {
            p.set_progress("4.1", "u1", 100.0)?;
            p.set_progress("7.3", "u2", 40.0)?;
            p.bulk_set_progress(BulkScope::Item("1.1".into()), 100.0)
        })
        .unwrap();
    let snapshot = tracker.report(&project.id).unwrap().snapshot;
    let mean: f64 =
        snapshot.units.iter().map(|u| u.progress).sum::<f64>() / snapshot.units.len() as f64;
    assert!((mean - snapshot.total_progress).abs() < 1e-9);
}

#[test]
fn reconciliation_grows_and_shrinks_by_prefix() {
    let template = two_category_template();
    let three = HousingUnits::numbered(3);
    let mut matrix = ProgressMatrix::zeroed(&template, 3);
    matrix.set("1.1", 0, 10.0);
    matrix.set("1.1", 1, 20.0);
    matrix.set("1.1", 2, 30.0);

    let five = HousingUnits::numbered(5);
    let grown = reconcile(&template, three.as_slice(), five.as_slice(), &matrix);
    assert_eq!(grown.row("1.1"), Some(&[10.0, 20.0, 30.0, 0.0, 0.0][..]));
    assert_eq!(grown.row("2.1"), Some(&[0.0; 5][..]));

    let two = HousingUnits::numbered(2);
    let shrunk = reconcile(&template, three.as_slice(), two.as_slice(), &matrix);
    assert_eq!(shrunk.row("1.1"), Some(&[10.0, 20.0][..]));
}

#[test]
fn removing_a_middle_unit_keeps_the_others_values() {
    let tracker = Tracker::in_memory("alice");
    let project = tracker
        .create_project(ProjectData::new("Villa", 1.0, 3))
        .unwrap();
    tracker
        .with_project(&project.id, |p| {
            p.set_progress("4.1", "u1", 10.0)?;
            p.set_progress("4.1", "u2", 20.0)?;
            p.set_progress("4.1", "u3", 30.0)?;
            p.remove_unit("u2")
        })
        .unwrap();
    let project = tracker.open_project(&project.id).unwrap();
    assert_eq!(project.progress().row("4.1"), Some(&[10.0, 30.0][..]));
    assert_eq!(project.units().get(1).unwrap().name, "Unit 3");
}

#[test]
fn assistant_all_updates_every_unit() {
    let tracker = Tracker::in_memory("alice");
    let units = HousingUnits::new(vec![
        HousingUnit::new("u1", "Casa 01"),
        HousingUnit::new("u2", "Casa 02"),
        HousingUnit::new("u3", "Casa 03"),
        HousingUnit::new("u4", "Casa 04"),
    ])
    .unwrap();
    let project = tracker
        .create_project(
            ProjectData::new("Villa", 1.0, 0)
                .with_budget(two_category_template())
                .with_units(units),
        )
        .unwrap();

    let report = tracker
        .assist(&project.id, &[ProgressUpdateRequest::new("Columns", &["all"], 35.0)])
        .unwrap();
    assert_eq!(report.applied.len(), 4);
    assert!(report.summary.starts_with("Updated 4 progress value(s)"));

    let project = tracker.open_project(&project.id).unwrap();
    assert_eq!(project.progress().row("2.1"), Some(&[35.0; 4][..]));
    assert_eq!(project.change_log().len(), 4);
}

#[test]
fn assistant_reports_unknown_unit_without_failing() {
    let tracker = Tracker::in_memory("alice");
    let project = tracker
        .create_project(ProjectData::new("Villa", 1.0, 2).with_budget(two_category_template()))
        .unwrap();

    let report = tracker
        .assist(
            &project.id,
            &[ProgressUpdateRequest::new("Footings", &["Unit 2", "Unit 7"], 60.0)],
        )
        .unwrap();
    assert_eq!(report.applied.len(), 1);
    assert_eq!(report.unresolved_units, vec!["Unit 7".to_string()]);
    assert!(report.summary.contains("\"Unit 7\""));

    let project = tracker.open_project(&project.id).unwrap();
    assert_eq!(project.progress().row("1.1"), Some(&[0.0, 60.0][..]));
}

#[test]
fn change_log_groups_and_filters() {
    let tracker = Tracker::in_memory("alice");
    let project = tracker
        .create_project(ProjectData::new("Villa", 1.0, 2).with_budget(two_category_template()))
        .unwrap();
    tracker
        .with_project(&project.id, |p| {
            p.set_progress("1.1", "u1", 10.0)?;
            p.set_progress("2.1", "u2", 20.0)?;
            p.set_progress("2.1", "u2", 20.0)
        })
        .unwrap();
    let project = tracker.open_project(&project.id).unwrap();
    assert_eq!(project.change_log().len(), 2);
    assert_eq!(project.change_log().filter("COLUMNS").len(), 1);
    assert_eq!(project.change_log().filter("unit").len(), 2);
}
