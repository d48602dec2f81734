//! Solved routes and the aggregate queries reported to callers

use serde::{Deserialize, Serialize};

use crate::model::{NodeKind, PackageId, VehicleId};
use crate::time::RoutingTime;

/// One visit on a vehicle's route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    /// Index into the data model's node list
    pub node_index: usize,
    pub kind: NodeKind,
    pub package_id: Option<PackageId>,
    /// Packages on board after this visit
    pub vehicle_load: i64,
    pub visit_time: RoutingTime,
    /// Miles travelled on this route up to and including this stop
    pub mileage: f64,
}

/// An ordered sequence of stops for one vehicle, depot to depot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub vehicle_id: VehicleId,
    pub stops: Vec<Stop>,
}

impl Route {
    pub fn mileage(&self) -> f64 {
        self.stops.last().map_or(0.0, |stop| stop.mileage)
    }

    pub fn end_time(&self) -> Option<RoutingTime> {
        self.stops.last().map(|stop| stop.visit_time)
    }

    pub fn delivered_package_ids(&self) -> Vec<PackageId> {
        self.stops
            .iter()
            .filter(|stop| stop.kind == NodeKind::Delivery)
            .filter_map(|stop| stop.package_id)
            .collect()
    }
}

/// The final plan: exactly one route per vehicle, plus the packages no route
/// could serve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    pub routes: Vec<Route>,
    missed: Vec<PackageId>,
}

impl Solution {
    pub fn new(routes: Vec<Route>, missed: Vec<PackageId>) -> Self {
        Self { routes, missed }
    }

    pub fn total_mileage(&self) -> f64 {
        self.routes.iter().map(Route::mileage).sum()
    }

    /// The latest time any vehicle returns to the depot
    pub fn end_time(&self) -> Option<RoutingTime> {
        self.routes.iter().filter_map(Route::end_time).max()
    }

    pub fn delivered_package_ids(&self) -> Vec<PackageId> {
        self.routes
            .iter()
            .flat_map(Route::delivered_package_ids)
            .collect()
    }

    pub fn missed_package_ids(&self) -> &[PackageId] {
        &self.missed
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered_package_ids().len()
    }

    pub fn missed_count(&self) -> usize {
        self.missed.len()
    }

    pub fn delivery_success_rate(&self) -> f64 {
        let delivered = self.delivered_count();
        let total = delivered + self.missed_count();
        if total == 0 {
            0.0
        } else {
            delivered as f64 / total as f64
        }
    }

    pub fn delivery_percentage(&self) -> String {
        format!("{:.2}%", self.delivery_success_rate() * 100.0)
    }

    /// Serialize the whole plan for the consuming shell
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(kind: NodeKind, package_id: Option<PackageId>, mileage: f64, seconds: i64) -> Stop {
        Stop {
            node_index: 0,
            kind,
            package_id,
            vehicle_load: 0,
            visit_time: RoutingTime::from_seconds(seconds),
            mileage,
        }
    }

    #[test]
    fn test_solution_aggregates() {
        let solution = Solution::new(
            vec![
                Route {
                    vehicle_id: 1,
                    stops: vec![
                        stop(NodeKind::Origin, None, 0.0, 28_800),
                        stop(NodeKind::Pickup, Some(1), 0.0, 28_800),
                        stop(NodeKind::Delivery, Some(1), 3.0, 29_400),
                        stop(NodeKind::Origin, None, 6.0, 30_000),
                    ],
                },
                Route {
                    vehicle_id: 2,
                    stops: vec![
                        stop(NodeKind::Origin, None, 0.0, 28_800),
                        stop(NodeKind::Origin, None, 0.0, 28_800),
                    ],
                },
            ],
            vec![2],
        );

        assert_eq!(solution.total_mileage(), 6.0);
        assert_eq!(solution.end_time().unwrap().seconds(), 30_000);
        assert_eq!(solution.delivered_package_ids(), vec![1]);
        assert_eq!(solution.missed_package_ids(), &[2]);
        assert_eq!(solution.delivery_percentage(), "50.00%");
    }

    #[test]
    fn test_empty_solution_rate() {
        let solution = Solution::new(Vec::new(), Vec::new());
        assert_eq!(solution.delivery_success_rate(), 0.0);
        assert!(solution.end_time().is_none());
    }

    #[test]
    fn test_json_round_trip() {
        let solution = Solution::new(
            vec![Route {
                vehicle_id: 1,
                stops: vec![stop(NodeKind::Origin, None, 0.0, 28_800)],
            }],
            vec![3],
        );
        let json = solution.to_json().unwrap();
        let parsed: Solution = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.routes.len(), 1);
        assert_eq!(parsed.missed_package_ids(), &[3]);
    }
}
