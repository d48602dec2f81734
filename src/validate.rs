//! Solution validation against the model's constraints
//!
//! The solver is trusted but verified: every produced plan can be replayed
//! against the data model to confirm route closure, load bounds, mileage
//! accounting, time windows, and the per-package requirements.

use crate::model::{Constraints, DataModel, NodeKind, PackageId, MILEAGE_SCALE_FACTOR};
use crate::solution::{Route, Solution};

const MILEAGE_TOLERANCE: f64 = 1e-6;

/// Outcome of validating one solution
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub violations: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            violations: Vec::new(),
        }
    }

    pub fn add_violation(&mut self, violation: String) {
        self.is_valid = false;
        self.violations.push(violation);
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Solution validator with configurable constraint checks.
///
/// Structural properties (route closure, load accounting, mileage
/// monotonicity, pickup-before-delivery, workday bounds, delivery
/// accounting) are always checked; the switches mirror the scenario's
/// constraint toggles.
#[derive(Debug, Clone)]
pub struct SolutionValidator {
    pub check_capacity: bool,
    pub check_availability: bool,
    pub check_deadline: bool,
    pub check_vehicle_requirement: bool,
    pub check_bundling: bool,
}

impl Default for SolutionValidator {
    fn default() -> Self {
        Self {
            check_capacity: true,
            check_availability: true,
            check_deadline: true,
            check_vehicle_requirement: true,
            check_bundling: true,
        }
    }
}

impl SolutionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check only what the scenario's toggles kept active
    pub fn from_constraints(constraints: &Constraints) -> Self {
        Self {
            check_capacity: constraints.vehicle_capacities,
            check_availability: constraints.shipping_availability,
            check_deadline: constraints.delivery_deadline,
            check_vehicle_requirement: constraints.vehicle_requirement,
            check_bundling: constraints.bundled_packages,
        }
    }

    pub fn with_capacity_check(mut self, check: bool) -> Self {
        self.check_capacity = check;
        self
    }

    pub fn with_availability_check(mut self, check: bool) -> Self {
        self.check_availability = check;
        self
    }

    pub fn with_deadline_check(mut self, check: bool) -> Self {
        self.check_deadline = check;
        self
    }

    pub fn with_vehicle_requirement_check(mut self, check: bool) -> Self {
        self.check_vehicle_requirement = check;
        self
    }

    pub fn with_bundling_check(mut self, check: bool) -> Self {
        self.check_bundling = check;
        self
    }

    pub fn validate(&self, data: &DataModel, solution: &Solution) -> ValidationReport {
        let mut report = ValidationReport::new();

        for route in &solution.routes {
            self.validate_route(data, route, &mut report);
        }
        self.validate_pairing(solution, &mut report);
        self.validate_accounting(data, solution, &mut report);
        if self.check_vehicle_requirement {
            self.validate_vehicle_requirements(data, solution, &mut report);
        }
        if self.check_bundling {
            self.validate_bundling(data, solution, &mut report);
        }
        report
    }

    fn validate_route(&self, data: &DataModel, route: &Route, report: &mut ValidationReport) {
        let vehicle_id = route.vehicle_id;
        let first = route.stops.first();
        let last = route.stops.last();
        if first.map_or(true, |stop| stop.kind != NodeKind::Origin)
            || last.map_or(true, |stop| stop.kind != NodeKind::Origin)
        {
            report.add_violation(format!(
                "Route of vehicle {vehicle_id} does not start and end at the depot"
            ));
        }
        if let Some(last) = last {
            if last.vehicle_load != 0 {
                report.add_violation(format!(
                    "Vehicle {vehicle_id} returns with {} packages on board",
                    last.vehicle_load
                ));
            }
        }

        let capacity = data.fleet.get(vehicle_id).map(|v| i64::from(v.package_capacity));
        for stop in &route.stops {
            if stop.vehicle_load < 0 {
                report.add_violation(format!(
                    "Vehicle {vehicle_id} has negative load at node {}",
                    stop.node_index
                ));
            }
            if self.check_capacity {
                if let Some(capacity) = capacity {
                    if stop.vehicle_load > capacity {
                        report.add_violation(format!(
                            "Vehicle {vehicle_id} exceeds capacity {capacity} at node {}",
                            stop.node_index
                        ));
                    }
                }
            }
            let seconds = stop.visit_time.seconds();
            if seconds < data.scenario.day_start.seconds()
                || seconds > data.scenario.day_end.seconds()
            {
                report.add_violation(format!(
                    "Vehicle {vehicle_id} visits node {} at {} outside the workday",
                    stop.node_index, stop.visit_time
                ));
            }
        }

        for window in route.stops.windows(2) {
            let (from, to) = (&window[0], &window[1]);
            let from_street = &data.nodes[from.node_index].street;
            let to_street = &data.nodes[to.node_index].street;
            let arc_miles = data.distance_map.cost(from_street, to_street) as f64
                / MILEAGE_SCALE_FACTOR as f64;
            let step = to.mileage - from.mileage;
            if step < -MILEAGE_TOLERANCE {
                report.add_violation(format!(
                    "Vehicle {vehicle_id} mileage decreases between nodes {} and {}",
                    from.node_index, to.node_index
                ));
            } else if (step - arc_miles).abs() > MILEAGE_TOLERANCE {
                report.add_violation(format!(
                    "Vehicle {vehicle_id} mileage step {step} does not match arc {arc_miles} \
                     between nodes {} and {}",
                    from.node_index, to.node_index
                ));
            }
            if to.visit_time.seconds() < from.visit_time.seconds() {
                report.add_violation(format!(
                    "Vehicle {vehicle_id} travels back in time between nodes {} and {}",
                    from.node_index, to.node_index
                ));
            }
        }
    }

    fn validate_pairing(&self, solution: &Solution, report: &mut ValidationReport) {
        for package_id in solution.delivered_package_ids() {
            let mut seen = false;
            for route in &solution.routes {
                let pickup = route
                    .stops
                    .iter()
                    .position(|s| s.kind == NodeKind::Pickup && s.package_id == Some(package_id));
                let delivery = route
                    .stops
                    .iter()
                    .position(|s| s.kind == NodeKind::Delivery && s.package_id == Some(package_id));
                match (pickup, delivery) {
                    (Some(pickup), Some(delivery)) => {
                        seen = true;
                        if pickup >= delivery {
                            report.add_violation(format!(
                                "Package {package_id} is delivered before its pickup"
                            ));
                        }
                    }
                    (None, None) => {}
                    _ => report.add_violation(format!(
                        "Package {package_id} has pickup and delivery on different routes"
                    )),
                }
            }
            if !seen {
                report.add_violation(format!(
                    "Package {package_id} is delivered but never picked up"
                ));
            }
        }
    }

    fn validate_accounting(
        &self,
        data: &DataModel,
        solution: &Solution,
        report: &mut ValidationReport,
    ) {
        let delivered = solution.delivered_package_ids();
        let missed = solution.missed_package_ids();
        if delivered.len() + missed.len() != data.packages.len() {
            report.add_violation(format!(
                "{} delivered plus {} missed does not cover {} packages",
                delivered.len(),
                missed.len(),
                data.packages.len()
            ));
        }
        for &package_id in missed {
            if delivered.contains(&package_id) {
                report.add_violation(format!(
                    "Package {package_id} is both delivered and missed"
                ));
            }
            if let Some(package) = data.packages.get(package_id) {
                if package.shipped_time.is_some()
                    || package.delivered_time.is_some()
                    || package.vehicle_used.is_some()
                {
                    report.add_violation(format!(
                        "Missed package {package_id} has result fields set"
                    ));
                }
            }
        }
        for package_id in delivered {
            let Some(package) = data.packages.get(package_id) else {
                report.add_violation(format!("Delivered package {package_id} is not in the catalog"));
                continue;
            };
            if self.check_availability {
                if let (Some(shipped), Some(availability)) =
                    (package.shipped_time, package.shipping_availability)
                {
                    if shipped < availability {
                        report.add_violation(format!(
                            "Package {package_id} shipped at {shipped} before its availability \
                             {availability}"
                        ));
                    }
                }
            }
            if self.check_deadline {
                if let (Some(delivered_time), Some(deadline)) =
                    (package.delivered_time, package.delivery_deadline)
                {
                    if delivered_time > deadline {
                        report.add_violation(format!(
                            "Package {package_id} delivered at {delivered_time} after its \
                             deadline {deadline}"
                        ));
                    }
                }
            }
        }
    }

    fn validate_vehicle_requirements(
        &self,
        data: &DataModel,
        solution: &Solution,
        report: &mut ValidationReport,
    ) {
        for route in &solution.routes {
            for package_id in route.delivered_package_ids() {
                let required = data
                    .packages
                    .get(package_id)
                    .and_then(|package| package.vehicle_requirement);
                if let Some(required) = required {
                    if required != route.vehicle_id {
                        report.add_violation(format!(
                            "Package {package_id} requires vehicle {required} but rode vehicle {}",
                            route.vehicle_id
                        ));
                    }
                }
            }
        }
    }

    fn validate_bundling(
        &self,
        data: &DataModel,
        solution: &Solution,
        report: &mut ValidationReport,
    ) {
        let route_of = |package_id: PackageId| {
            solution
                .routes
                .iter()
                .position(|route| route.delivered_package_ids().contains(&package_id))
        };
        for package in data.packages.iter() {
            let Some(own_route) = route_of(package.id) else {
                continue;
            };
            for &linked in &package.bundled_packages {
                if let Some(linked_route) = route_of(linked) {
                    if linked_route != own_route {
                        report.add_violation(format!(
                            "Bundled packages {} and {linked} are on different routes",
                            package.id
                        ));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::symmetric_book;
    use crate::model::{Fleet, Package, PackageCatalog, RoutingScenario, SearchSettings};
    use crate::solution::Stop;
    use crate::time::RoutingTime;

    fn fixture() -> DataModel {
        let addresses = symmetric_book(&["Hub Dr", "Oak St"], &[("Hub Dr", "Oak St", 3.0)]);
        let fleet = Fleet::with_shared_attributes(1, 18.0, 4, &addresses).unwrap();
        let catalog = PackageCatalog::new(vec![Package::new(1, "Oak St")]).unwrap();
        DataModel::new(
            addresses,
            fleet,
            catalog,
            RoutingScenario::default(),
            SearchSettings::default(),
        )
        .unwrap()
    }

    fn stop(
        node_index: usize,
        kind: NodeKind,
        package_id: Option<PackageId>,
        load: i64,
        seconds: i64,
        mileage: f64,
    ) -> Stop {
        Stop {
            node_index,
            kind,
            package_id,
            vehicle_load: load,
            visit_time: RoutingTime::from_seconds(seconds),
            mileage,
        }
    }

    fn good_route() -> Route {
        Route {
            vehicle_id: 1,
            stops: vec![
                stop(0, NodeKind::Origin, None, 0, 28_800, 0.0),
                stop(1, NodeKind::Pickup, Some(1), 1, 28_800, 0.0),
                stop(2, NodeKind::Delivery, Some(1), 0, 29_400, 3.0),
                stop(0, NodeKind::Origin, None, 0, 30_000, 6.0),
            ],
        }
    }

    #[test]
    fn test_valid_solution_passes() {
        let data = fixture();
        let solution = Solution::new(vec![good_route()], Vec::new());
        let report = SolutionValidator::new().validate(&data, &solution);
        assert!(report.is_valid, "violations: {:?}", report.violations);
    }

    #[test]
    fn test_open_route_is_flagged() {
        let data = fixture();
        let mut route = good_route();
        route.stops.pop();
        let solution = Solution::new(vec![route], Vec::new());
        let report = SolutionValidator::new().validate(&data, &solution);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_capacity_violation_is_flagged_and_togglable() {
        let data = fixture();
        let mut route = good_route();
        route.stops[1].vehicle_load = 9;
        route.stops[2].vehicle_load = 8;
        // Keep the final stop balanced so only the capacity check trips.
        route.stops[3].vehicle_load = 0;
        let solution = Solution::new(vec![route], Vec::new());

        let report = SolutionValidator::new().validate(&data, &solution);
        assert!(!report.is_valid);

        let report = SolutionValidator::new()
            .with_capacity_check(false)
            .validate(&data, &solution);
        assert!(report.is_valid, "violations: {:?}", report.violations);
    }

    #[test]
    fn test_mileage_mismatch_is_flagged() {
        let data = fixture();
        let mut route = good_route();
        route.stops[2].mileage = 2.0;
        route.stops[3].mileage = 5.0;
        let solution = Solution::new(vec![route], Vec::new());
        let report = SolutionValidator::new().validate(&data, &solution);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_delivery_without_pickup_is_flagged() {
        let data = fixture();
        let mut route = good_route();
        route.stops.remove(1);
        route.stops[1].vehicle_load = 0;
        let solution = Solution::new(vec![route], Vec::new());
        let report = SolutionValidator::new().validate(&data, &solution);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_missed_package_with_result_fields_is_flagged() {
        let mut data = fixture();
        data.packages.get_mut(1).unwrap().shipped_time =
            Some(RoutingTime::from_hms(9, 0, 0).unwrap());
        let empty_route = Route {
            vehicle_id: 1,
            stops: vec![
                stop(0, NodeKind::Origin, None, 0, 28_800, 0.0),
                stop(0, NodeKind::Origin, None, 0, 28_800, 0.0),
            ],
        };
        let solution = Solution::new(vec![empty_route], vec![1]);
        let report = SolutionValidator::new().validate(&data, &solution);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_deadline_violation_respects_toggle() {
        let mut data = fixture();
        {
            let package = data.packages.get_mut(1).unwrap();
            package.delivery_deadline = Some(RoutingTime::from_hms(8, 5, 0).unwrap());
            package.shipped_time = Some(RoutingTime::from_hms(8, 0, 0).unwrap());
            package.delivered_time = Some(RoutingTime::from_hms(8, 10, 0).unwrap());
            package.vehicle_used = Some(1);
        }
        let solution = Solution::new(vec![good_route()], Vec::new());

        let report = SolutionValidator::new().validate(&data, &solution);
        assert!(!report.is_valid);

        let report = SolutionValidator::new()
            .with_deadline_check(false)
            .validate(&data, &solution);
        assert!(report.is_valid, "violations: {:?}", report.violations);
    }
}
