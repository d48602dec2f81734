//! A small constraint-programming style routing engine
//!
//! Callers describe a vehicle routing problem the way CP routing libraries
//! expect it: transit callbacks, cumulative dimensions, pickup-and-delivery
//! pairs, vehicle restrictions, and disjunctions with drop penalties, then
//! run a parameterized search. Index convention: `0..num_nodes` are problem
//! nodes, and each vehicle owns a synthetic start and end index that both
//! map back to the depot node.

mod search;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Handle to a registered transit callback
pub type CallbackIndex = usize;

/// Handle to a registered dimension
pub type DimensionIndex = usize;

type TransitEvaluator<'a> = Box<dyn Fn(usize, usize) -> i64 + Send + Sync + 'a>;

/// Maps between problem nodes and routing indices
#[derive(Debug, Clone, Copy)]
pub struct RoutingIndexManager {
    num_nodes: usize,
    num_vehicles: usize,
    depot: usize,
}

impl RoutingIndexManager {
    pub fn new(num_nodes: usize, num_vehicles: usize, depot: usize) -> Self {
        assert!(depot < num_nodes, "depot must be a valid node");
        Self {
            num_nodes,
            num_vehicles,
            depot,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn num_vehicles(&self) -> usize {
        self.num_vehicles
    }

    /// Total size of the index space, including vehicle start/end indices
    pub fn num_indices(&self) -> usize {
        self.num_nodes + 2 * self.num_vehicles
    }

    pub fn node_to_index(&self, node: usize) -> usize {
        debug_assert!(node < self.num_nodes);
        node
    }

    pub fn index_to_node(&self, index: usize) -> usize {
        if index < self.num_nodes {
            index
        } else {
            self.depot
        }
    }

    pub fn start_index(&self, vehicle: usize) -> usize {
        debug_assert!(vehicle < self.num_vehicles);
        self.num_nodes + 2 * vehicle
    }

    pub fn end_index(&self, vehicle: usize) -> usize {
        debug_assert!(vehicle < self.num_vehicles);
        self.num_nodes + 2 * vehicle + 1
    }

    fn is_end_index(&self, index: usize) -> bool {
        index >= self.num_nodes && (index - self.num_nodes) % 2 == 1
    }
}

/// A cumulative quantity tracked along every route
struct Dimension {
    name: String,
    /// One transit evaluator per vehicle
    evaluators: Vec<CallbackIndex>,
    slack_max: i64,
    /// Per-vehicle capacity (upper bound on every cumul of the route)
    capacities: Vec<i64>,
    fix_start_cumul_to_zero: bool,
    span_cost_coefficient: i64,
    /// Per-index cumul bounds, where set
    cumul_bounds: HashMap<usize, (i64, i64)>,
}

/// A set of indices of which at most one is visited, at `penalty` if none is
struct Disjunction {
    indices: Vec<usize>,
    penalty: i64,
}

/// Constructive heuristic used to build the initial route set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirstSolutionStrategy {
    LocalCheapestInsertion,
    LocalCheapestCostInsertion,
    SequentialCheapestInsertion,
    ParallelCheapestInsertion,
    BestInsertion,
}

/// Neighborhood search applied on top of the first solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalSearchMetaheuristic {
    GreedyDescent,
    GuidedLocalSearch,
    SimulatedAnnealing,
    TabuSearch,
    GenericTabuSearch,
}

/// Parameters for one search run
#[derive(Debug, Clone)]
pub struct RoutingSearchParameters {
    pub first_solution_strategy: FirstSolutionStrategy,
    pub local_search_metaheuristic: LocalSearchMetaheuristic,
    /// Re-verify every registered constraint on each candidate instead of
    /// trusting move legality
    pub use_full_propagation: bool,
    pub time_limit: Option<Duration>,
    pub solution_limit: Option<u64>,
    pub log_search: bool,
}

impl Default for RoutingSearchParameters {
    fn default() -> Self {
        Self {
            first_solution_strategy: FirstSolutionStrategy::LocalCheapestInsertion,
            local_search_metaheuristic: LocalSearchMetaheuristic::GreedyDescent,
            use_full_propagation: true,
            time_limit: None,
            solution_limit: None,
            log_search: false,
        }
    }
}

/// A routing problem under construction, then a handle for solving it
pub struct RoutingModel<'a> {
    manager: RoutingIndexManager,
    evaluators: Vec<TransitEvaluator<'a>>,
    arc_cost_evaluator: Option<CallbackIndex>,
    dimensions: Vec<Dimension>,
    allowed_vehicles: HashMap<usize, Vec<usize>>,
    pairs: Vec<(usize, usize)>,
    same_vehicle: Vec<(usize, usize)>,
    cumul_precedences: Vec<(DimensionIndex, usize, usize)>,
    disjunctions: Vec<Disjunction>,
}

impl<'a> RoutingModel<'a> {
    pub fn new(manager: &RoutingIndexManager) -> Self {
        Self {
            manager: *manager,
            evaluators: Vec::new(),
            arc_cost_evaluator: None,
            dimensions: Vec::new(),
            allowed_vehicles: HashMap::new(),
            pairs: Vec::new(),
            same_vehicle: Vec::new(),
            cumul_precedences: Vec::new(),
            disjunctions: Vec::new(),
        }
    }

    pub fn manager(&self) -> &RoutingIndexManager {
        &self.manager
    }

    /// Register a callback evaluated on (from_index, to_index) arcs
    pub fn register_transit_callback<F>(&mut self, callback: F) -> CallbackIndex
    where
        F: Fn(usize, usize) -> i64 + Send + Sync + 'a,
    {
        self.evaluators.push(Box::new(callback));
        self.evaluators.len() - 1
    }

    /// Register a callback that depends only on the index being left
    pub fn register_unary_transit_callback<F>(&mut self, callback: F) -> CallbackIndex
    where
        F: Fn(usize) -> i64 + Send + Sync + 'a,
    {
        self.register_transit_callback(move |from, _to| callback(from))
    }

    pub fn set_arc_cost_evaluator_of_all_vehicles(&mut self, callback: CallbackIndex) {
        debug_assert!(callback < self.evaluators.len());
        self.arc_cost_evaluator = Some(callback);
    }

    /// Add a dimension with one shared transit callback and capacity
    pub fn add_dimension(
        &mut self,
        callback: CallbackIndex,
        slack_max: i64,
        capacity: i64,
        fix_start_cumul_to_zero: bool,
        name: &str,
    ) -> DimensionIndex {
        let vehicles = self.manager.num_vehicles();
        self.push_dimension(Dimension {
            name: name.to_string(),
            evaluators: vec![callback; vehicles],
            slack_max,
            capacities: vec![capacity; vehicles],
            fix_start_cumul_to_zero,
            span_cost_coefficient: 0,
            cumul_bounds: HashMap::new(),
        })
    }

    /// Add a dimension with a distinct transit callback per vehicle
    pub fn add_dimension_with_vehicle_transits(
        &mut self,
        callbacks: Vec<CallbackIndex>,
        slack_max: i64,
        capacity: i64,
        fix_start_cumul_to_zero: bool,
        name: &str,
    ) -> DimensionIndex {
        debug_assert_eq!(callbacks.len(), self.manager.num_vehicles());
        let vehicles = self.manager.num_vehicles();
        self.push_dimension(Dimension {
            name: name.to_string(),
            evaluators: callbacks,
            slack_max,
            capacities: vec![capacity; vehicles],
            fix_start_cumul_to_zero,
            span_cost_coefficient: 0,
            cumul_bounds: HashMap::new(),
        })
    }

    /// Add a dimension with a distinct capacity per vehicle
    pub fn add_dimension_with_vehicle_capacity(
        &mut self,
        callback: CallbackIndex,
        slack_max: i64,
        vehicle_capacities: Vec<i64>,
        fix_start_cumul_to_zero: bool,
        name: &str,
    ) -> DimensionIndex {
        debug_assert_eq!(vehicle_capacities.len(), self.manager.num_vehicles());
        let vehicles = self.manager.num_vehicles();
        self.push_dimension(Dimension {
            name: name.to_string(),
            evaluators: vec![callback; vehicles],
            slack_max,
            capacities: vehicle_capacities,
            fix_start_cumul_to_zero,
            span_cost_coefficient: 0,
            cumul_bounds: HashMap::new(),
        })
    }

    fn push_dimension(&mut self, dimension: Dimension) -> DimensionIndex {
        debug_assert!(
            self.dimension(&dimension.name).is_none(),
            "duplicate dimension '{}'",
            dimension.name
        );
        self.dimensions.push(dimension);
        self.dimensions.len() - 1
    }

    pub fn dimension(&self, name: &str) -> Option<DimensionIndex> {
        self.dimensions.iter().position(|d| d.name == name)
    }

    pub fn set_global_span_cost_coefficient(
        &mut self,
        dimension: DimensionIndex,
        coefficient: i64,
    ) {
        self.dimensions[dimension].span_cost_coefficient = coefficient;
    }

    /// Constrain the dimension's cumulative variable at `index`
    pub fn set_cumul_range(&mut self, dimension: DimensionIndex, index: usize, min: i64, max: i64) {
        self.dimensions[dimension]
            .cumul_bounds
            .insert(index, (min, max));
    }

    /// Ask the finalizer to settle this cumul at its minimum feasible value.
    ///
    /// Schedules are derived by earliest-arrival propagation with free starts
    /// held at their lower bound, which is exactly the minimized value, so
    /// the registration carries no extra state.
    pub fn add_variable_minimized_by_finalizer(&mut self, dimension: DimensionIndex, index: usize) {
        debug_assert!(dimension < self.dimensions.len());
        debug_assert!(index < self.manager.num_indices());
    }

    pub fn set_allowed_vehicles_for_index(&mut self, vehicles: &[usize], index: usize) {
        self.allowed_vehicles.insert(index, vehicles.to_vec());
    }

    /// Declare that `pickup` and `delivery` are served together, pickup
    /// first, or both dropped
    pub fn add_pickup_and_delivery(&mut self, pickup: usize, delivery: usize) {
        self.pairs.push((pickup, delivery));
    }

    /// Constrain two indices to the same vehicle. Dropped indices compare
    /// equal to each other, so linking also forces drop-together.
    pub fn add_same_vehicle(&mut self, a: usize, b: usize) {
        self.same_vehicle.push((a, b));
    }

    /// Constrain `before`'s cumul on `dimension` to be at most `after`'s
    pub fn add_cumul_precedence(
        &mut self,
        dimension: DimensionIndex,
        before: usize,
        after: usize,
    ) {
        self.cumul_precedences.push((dimension, before, after));
    }

    /// Allow all of `indices` to be skipped at `penalty`
    pub fn add_disjunction(&mut self, indices: &[usize], penalty: i64) {
        self.disjunctions.push(Disjunction {
            indices: indices.to_vec(),
            penalty,
        });
    }

    pub fn start(&self, vehicle: usize) -> usize {
        self.manager.start_index(vehicle)
    }

    pub fn end(&self, vehicle: usize) -> usize {
        self.manager.end_index(vehicle)
    }

    pub fn is_end(&self, index: usize) -> bool {
        self.manager.is_end_index(index)
    }

    fn transit(&self, callback: CallbackIndex, from: usize, to: usize) -> i64 {
        (self.evaluators[callback])(from, to)
    }

    /// Arc cost between two indices under the registered cost evaluator
    pub fn get_arc_cost_for_vehicle(&self, from: usize, to: usize, _vehicle: usize) -> i64 {
        match self.arc_cost_evaluator {
            Some(callback) => self.transit(callback, from, to),
            None => 0,
        }
    }

    /// Run the search. Returns `None` when no feasible assignment was found.
    pub fn solve_with_parameters(
        &self,
        parameters: &RoutingSearchParameters,
    ) -> Option<Assignment> {
        search::run_search(self, parameters)
    }
}

/// The values chosen for every decision variable of a finished search
pub struct Assignment {
    /// Successor of each index along its route; unrouted indices self-loop
    next: Vec<usize>,
    /// Vehicle serving each index, -1 when unrouted
    vehicle: Vec<i64>,
    /// Cumulative values, per dimension then per index
    cumuls: Vec<Vec<i64>>,
    dropped: Vec<usize>,
    objective: i64,
}

impl Assignment {
    pub fn next(&self, index: usize) -> usize {
        self.next[index]
    }

    pub fn vehicle(&self, index: usize) -> Option<usize> {
        usize::try_from(self.vehicle[index]).ok()
    }

    /// Minimum value of the dimension's cumul variable at `index`
    pub fn cumul_min(&self, dimension: DimensionIndex, index: usize) -> i64 {
        self.cumuls[dimension][index]
    }

    /// Node indices left unrouted by disjunction
    pub fn dropped_nodes(&self) -> &[usize] {
        &self.dropped
    }

    pub fn objective_value(&self) -> i64 {
        self.objective
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Node 0 is the depot; 1 and 2 are a pickup/delivery pair; 3 stands alone.
    static DISTANCES: [[i64; 4]; 4] = [
        [0, 2, 4, 9],
        [2, 0, 3, 8],
        [4, 3, 0, 5],
        [9, 8, 5, 0],
    ];

    fn pair_model(manager: &RoutingIndexManager) -> RoutingModel<'_> {
        let mut model = RoutingModel::new(manager);
        let transit = model.register_transit_callback({
            let manager = *manager;
            move |from, to| {
                DISTANCES[manager.index_to_node(from)][manager.index_to_node(to)]
            }
        });
        model.set_arc_cost_evaluator_of_all_vehicles(transit);
        model.add_dimension(transit, 0, 1_000, true, "Distance");
        model
    }

    #[test]
    fn test_index_manager_layout() {
        let manager = RoutingIndexManager::new(5, 2, 0);
        assert_eq!(manager.num_indices(), 9);
        assert_eq!(manager.start_index(0), 5);
        assert_eq!(manager.end_index(0), 6);
        assert_eq!(manager.start_index(1), 7);
        assert_eq!(manager.index_to_node(8), 0);
        assert_eq!(manager.index_to_node(3), 3);
        assert!(manager.is_end_index(6));
        assert!(!manager.is_end_index(5));
    }

    #[test]
    fn test_solve_visits_pair_in_order() {
        let manager = RoutingIndexManager::new(4, 1, 0);
        let mut model = pair_model(&manager);
        let distance = model.dimension("Distance").unwrap();
        model.add_pickup_and_delivery(1, 2);
        model.add_same_vehicle(1, 2);
        model.add_cumul_precedence(distance, 1, 2);
        model.add_disjunction(&[1], 10_000);
        model.add_disjunction(&[2], 10_000);
        model.add_disjunction(&[3], 10_000);

        let assignment = model
            .solve_with_parameters(&RoutingSearchParameters::default())
            .unwrap();

        assert!(assignment.dropped_nodes().is_empty());
        let mut order = Vec::new();
        let mut index = model.start(0);
        while !model.is_end(index) {
            index = assignment.next(index);
            if index < 4 {
                order.push(index);
            }
        }
        let pickup_at = order.iter().position(|&n| n == 1).unwrap();
        let delivery_at = order.iter().position(|&n| n == 2).unwrap();
        assert!(pickup_at < delivery_at);
        assert_eq!(assignment.vehicle(1), assignment.vehicle(2));
    }

    #[test]
    fn test_disjunction_drops_node_when_capacity_is_tight() {
        let manager = RoutingIndexManager::new(4, 1, 0);
        let mut model = pair_model(&manager);
        // A one-unit load dimension where every non-depot node carries load
        // and the vehicle can hold only one unit at a time, with no chance
        // to unload: only one of the three nodes can be served.
        let load = model
            .register_unary_transit_callback(move |from| i64::from(manager.index_to_node(from) != 0));
        model.add_dimension(load, 0, 1, true, "Load");
        model.add_disjunction(&[1], 50);
        model.add_disjunction(&[2], 60);
        model.add_disjunction(&[3], 200);

        let assignment = model
            .solve_with_parameters(&RoutingSearchParameters::default())
            .unwrap();

        assert_eq!(assignment.dropped_nodes().len(), 2);
        // The cheapest plan keeps the most expensive drop off the table.
        assert!(!assignment.dropped_nodes().contains(&3));
    }

    #[test]
    fn test_time_dimension_waits_for_window() {
        let manager = RoutingIndexManager::new(4, 1, 0);
        let mut model = pair_model(&manager);
        let transit = model.register_transit_callback(move |from, to| {
            DISTANCES[manager.index_to_node(from)][manager.index_to_node(to)]
        });
        let time = model.add_dimension_with_vehicle_transits(vec![transit], 100, 200, false, "Time");
        model.set_cumul_range(time, manager.start_index(0), 0, 200);
        // Node 1 opens at 50 even though travel reaches it at 2.
        model.set_cumul_range(time, 1, 50, 150);
        model.add_disjunction(&[1], 100_000);
        model.add_disjunction(&[2], 10);
        model.add_disjunction(&[3], 10);

        let assignment = model
            .solve_with_parameters(&RoutingSearchParameters::default())
            .unwrap();

        assert!(!assignment.dropped_nodes().contains(&1));
        assert!(assignment.cumul_min(time, 1) >= 50);
    }

    #[test]
    fn test_allowed_vehicles_restrict_assignment() {
        let manager = RoutingIndexManager::new(4, 2, 0);
        let mut model = pair_model(&manager);
        model.set_allowed_vehicles_for_index(&[1], 3);
        model.add_disjunction(&[1], 1_000);
        model.add_disjunction(&[2], 1_000);
        model.add_disjunction(&[3], 1_000);

        let assignment = model
            .solve_with_parameters(&RoutingSearchParameters::default())
            .unwrap();

        assert_eq!(assignment.vehicle(3), Some(1));
    }
}
