//! Routing model assembly, search invocation, and solution extraction
//!
//! `solve` is the single entry point: it validates the data model, lowers it
//! into the engine's index/dimension/disjunction vocabulary, runs the
//! configured search, and walks the resulting assignment back into a
//! [`Solution`] rooted in the data model.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{
    Assignment, DimensionIndex, RoutingIndexManager, RoutingModel, RoutingSearchParameters,
};
use crate::model::{
    DataModel, NodeKind, SearchSettings, MILEAGE_SCALE_FACTOR, ORIGIN_NODE_INDEX,
};
use crate::solution::{Route, Solution, Stop};
use crate::time::RoutingTime;
use crate::{RoutingError, RoutingResult};

/// Solve the routing problem described by `data`.
///
/// Returns `Ok(None)` when the search finds no assignment, or when the best
/// assignment delivers nothing; package result fields are only written for an
/// assignment that delivers at least one package.
pub fn solve(data: &mut DataModel) -> RoutingResult<Option<Solution>> {
    validate_model(data)?;
    data.rebuild_nodes();
    data.clear_results();

    let planned = match catch_unwind(AssertUnwindSafe(|| run_search(&*data))) {
        Ok(planned) => planned,
        Err(_) => {
            warn!("routing engine failed unexpectedly; treating as unsolved");
            None
        }
    };
    let Some(planned) = planned else {
        return Ok(None);
    };

    let routes: Vec<Route> = planned
        .into_iter()
        .map(|planned_route| {
            let stops = planned_route
                .stops
                .into_iter()
                .map(|stop| {
                    let node = &data.nodes[stop.node_index];
                    Stop {
                        node_index: stop.node_index,
                        kind: node.kind,
                        package_id: node.package_id,
                        vehicle_load: stop.load,
                        visit_time: RoutingTime::from_seconds(stop.visit_seconds),
                        mileage: stop.mileage,
                    }
                })
                .collect();
            Route {
                vehicle_id: planned_route.vehicle_id,
                stops,
            }
        })
        .collect();

    let delivered: Vec<_> = routes
        .iter()
        .flat_map(Route::delivered_package_ids)
        .collect();
    if delivered.is_empty() {
        return Ok(None);
    }

    for route in &routes {
        for stop in &route.stops {
            let Some(package_id) = stop.package_id else {
                continue;
            };
            let Some(package) = data.packages.get_mut(package_id) else {
                continue;
            };
            match stop.kind {
                NodeKind::Pickup => {
                    package.shipped_time = Some(stop.visit_time);
                    package.vehicle_used = Some(route.vehicle_id);
                }
                NodeKind::Delivery => package.delivered_time = Some(stop.visit_time),
                NodeKind::Origin => {}
            }
        }
    }

    let missed = data
        .packages
        .iter()
        .map(|package| package.id)
        .filter(|id| !delivered.contains(id))
        .collect();
    Ok(Some(Solution::new(routes, missed)))
}

fn validate_model(data: &DataModel) -> RoutingResult<()> {
    if data.fleet.is_empty() {
        return Err(RoutingError::ModelBuild("Fleet is empty".to_string()));
    }
    if data.scenario.day_duration() <= 0 {
        return Err(RoutingError::ModelBuild(format!(
            "Day end {} must be after day start {}",
            data.scenario.day_end, data.scenario.day_start
        )));
    }
    for vehicle in data.fleet.iter() {
        if vehicle.package_capacity == 0 {
            return Err(RoutingError::ModelBuild(format!(
                "Vehicle {} has zero capacity",
                vehicle.id
            )));
        }
    }
    for package in data.packages.iter() {
        if data.addresses.get(&package.street).is_none() {
            return Err(RoutingError::Reference(format!(
                "Package {} cites unknown address '{}'",
                package.id, package.street
            )));
        }
        if let Some(required) = package.vehicle_requirement {
            if data.fleet.get(required).is_none() {
                return Err(RoutingError::Reference(format!(
                    "Package {} requires unknown vehicle {required}",
                    package.id
                )));
            }
        }
        for &bundled in &package.bundled_packages {
            if data.packages.get(bundled).is_none() {
                return Err(RoutingError::Reference(format!(
                    "Package {} bundles unknown package {bundled}",
                    package.id
                )));
            }
        }
    }
    Ok(())
}

struct PlannedStop {
    node_index: usize,
    load: i64,
    visit_seconds: i64,
    mileage: f64,
}

struct PlannedRoute {
    vehicle_id: u32,
    stops: Vec<PlannedStop>,
}

fn run_search(data: &DataModel) -> Option<Vec<PlannedRoute>> {
    let manager = RoutingIndexManager::new(data.nodes.len(), data.fleet.len(), ORIGIN_NODE_INDEX);
    let mut routing = RoutingModel::new(&manager);
    let nodes = &data.nodes;

    // Arc cost: scaled mileage, shared by every vehicle.
    let distance_map = &data.distance_map;
    let distance_callback = routing.register_transit_callback(move |from_index, to_index| {
        let from = &nodes[manager.index_to_node(from_index)];
        let to = &nodes[manager.index_to_node(to_index)];
        distance_map.cost(&from.street, &to.street)
    });
    routing.set_arc_cost_evaluator_of_all_vehicles(distance_callback);
    let distance_dimension = routing.add_dimension(
        distance_callback,
        0,
        data.settings.max_mileage_per_vehicle * MILEAGE_SCALE_FACTOR,
        true,
        "Distance",
    );
    routing.set_global_span_cost_coefficient(
        distance_dimension,
        data.settings.distance_span_cost_coefficient,
    );

    // Time: one transit callback per vehicle, since speeds differ. The start
    // cumul is left free so a route may begin after the nominal day start.
    let day_duration = data.scenario.day_duration();
    let mut time_callbacks = Vec::with_capacity(data.fleet.len());
    for vehicle in data.fleet.iter() {
        let duration_map = &vehicle.duration_map;
        time_callbacks.push(routing.register_transit_callback(move |from_index, to_index| {
            let from = &nodes[manager.index_to_node(from_index)];
            let to = &nodes[manager.index_to_node(to_index)];
            duration_map.cost(&from.street, &to.street)
        }));
    }
    let time_dimension = routing.add_dimension_with_vehicle_transits(
        time_callbacks,
        day_duration,
        day_duration,
        false,
        "Time",
    );
    for vehicle in data.fleet.iter() {
        let start = routing.start(vehicle.index());
        let end = routing.end(vehicle.index());
        routing.set_cumul_range(time_dimension, start, 0, day_duration);
        routing.add_variable_minimized_by_finalizer(time_dimension, start);
        routing.add_variable_minimized_by_finalizer(time_dimension, end);
    }

    let constraints = data.scenario.constraints;
    for (node_index, node) in data.nodes.iter().enumerate() {
        if node.kind == NodeKind::Origin {
            continue;
        }
        let Some(package) = node.package_id.and_then(|id| data.packages.get(id)) else {
            continue;
        };
        let index = manager.node_to_index(node_index);

        let availability = package
            .shipping_availability
            .filter(|_| constraints.shipping_availability);
        let deadline = package
            .delivery_deadline
            .filter(|_| constraints.delivery_deadline);
        let start_seconds = availability
            .unwrap_or(data.scenario.day_start)
            .duration_after(data.scenario.day_start);
        let end_seconds = deadline
            .unwrap_or(data.scenario.day_end)
            .duration_after(data.scenario.day_start);
        routing.set_cumul_range(time_dimension, index, start_seconds, end_seconds);

        // Narrow windows are costlier to drop; the factors below are applied
        // in floating point and truncated once at the end.
        let mut penalty = data.settings.base_penalty as f64;
        penalty *= day_duration as f64 / (end_seconds - start_seconds).max(1) as f64;

        if constraints.vehicle_requirement {
            if let Some(vehicle) = package
                .vehicle_requirement
                .and_then(|id| data.fleet.get(id))
            {
                routing.set_allowed_vehicles_for_index(&[vehicle.index()], index);
                penalty *= data.settings.penalty_scale_req_vehicle;
            }
        }

        if node.kind == NodeKind::Pickup {
            penalty *= data.settings.penalty_scale_pickups;
            if let Some(delivery_node) = data.delivery_node_index(package.id) {
                let paired_index = manager.node_to_index(delivery_node);
                routing.add_pickup_and_delivery(index, paired_index);
                routing.add_same_vehicle(index, paired_index);
                routing.add_cumul_precedence(distance_dimension, index, paired_index);
            }
            if constraints.bundled_packages {
                for &bundled_id in &package.bundled_packages {
                    if let Some(linked_node) = data.pickup_node_index(bundled_id) {
                        routing.add_same_vehicle(index, manager.node_to_index(linked_node));
                    }
                }
            }
        }

        routing.add_disjunction(&[index], penalty as i64);
    }

    if constraints.vehicle_capacities {
        let capacity_callback = routing.register_unary_transit_callback(move |from_index| {
            nodes[manager.index_to_node(from_index)].kind.capacity_delta()
        });
        let capacities = data
            .fleet
            .iter()
            .map(|vehicle| i64::from(vehicle.package_capacity))
            .collect();
        routing.add_dimension_with_vehicle_capacity(capacity_callback, 0, capacities, true, "Capacity");
    }

    let parameters = search_parameters(&data.settings);
    if data.settings.use_search_logging {
        info!(
            nodes = data.nodes.len(),
            vehicles = data.fleet.len(),
            packages = data.packages.len(),
            "starting routing search"
        );
    }
    let assignment = routing.solve_with_parameters(&parameters)?;

    Some(extract_routes(data, &manager, &routing, &assignment, time_dimension))
}

fn search_parameters(settings: &SearchSettings) -> RoutingSearchParameters {
    RoutingSearchParameters {
        first_solution_strategy: settings.first_solution_strategy,
        local_search_metaheuristic: settings.local_search_metaheuristic,
        use_full_propagation: settings.use_full_propagation,
        time_limit: settings.solver_time_limit_seconds.map(Duration::from_secs),
        solution_limit: settings.solver_solution_limit,
        log_search: settings.use_search_logging,
    }
}

/// Walk each vehicle's chain of next-indices, including the final end node
fn extract_routes(
    data: &DataModel,
    manager: &RoutingIndexManager,
    routing: &RoutingModel,
    assignment: &Assignment,
    time_dimension: DimensionIndex,
) -> Vec<PlannedRoute> {
    data.fleet
        .iter()
        .map(|vehicle| {
            let mut stops = Vec::new();
            let mut load = 0;
            let mut mileage = 0.0;
            let mut index = routing.start(vehicle.index());
            let mut previous: Option<usize> = None;
            loop {
                let node_index = manager.index_to_node(index);
                load += data.nodes[node_index].kind.capacity_delta();
                if let Some(previous) = previous {
                    let arc_cost =
                        routing.get_arc_cost_for_vehicle(previous, index, vehicle.index());
                    mileage += arc_cost as f64 / MILEAGE_SCALE_FACTOR as f64;
                }
                stops.push(PlannedStop {
                    node_index,
                    load,
                    visit_seconds: data.scenario.day_start.seconds()
                        + assignment.cumul_min(time_dimension, index),
                    mileage,
                });
                if routing.is_end(index) {
                    break;
                }
                previous = Some(index);
                index = assignment.next(index);
            }
            PlannedRoute {
                vehicle_id: vehicle.id,
                stops,
            }
        })
        .collect()
}
