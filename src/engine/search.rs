//! Search internals: route evaluation, constructive insertion, and the
//! local-search metaheuristics
//!
//! The search works on pickup/delivery *units* grouped into *clusters* by
//! same-vehicle links. Moves always act on whole clusters, so every candidate
//! state keeps linked nodes together by construction; full propagation
//! re-checks the registered constraints anyway.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use super::{
    Assignment, DimensionIndex, FirstSolutionStrategy, LocalSearchMetaheuristic, RoutingModel,
    RoutingSearchParameters,
};

const RNG_SEED: u64 = 982_451_653;
const MAX_ITERATIONS: usize = 10_000;
const MAX_STALL_ROUNDS: usize = 40;
const SA_COOLING: f64 = 0.995;
const SA_MIN_TEMPERATURE: f64 = 0.01;
const GLS_LAMBDA_FACTOR: f64 = 0.3;
const GENERIC_TABU_SAMPLES: usize = 24;
const RANDOM_MOVE_ATTEMPTS: usize = 20;

/// A pickup/delivery pair, or a lone node, inserted and removed as one piece
struct Unit {
    pickup: usize,
    delivery: Option<usize>,
    /// No disjunction covers this unit, so it cannot be dropped
    mandatory: bool,
}

impl Unit {
    fn nodes(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.pickup).chain(self.delivery)
    }
}

pub(super) struct Context<'m, 'a> {
    model: &'m RoutingModel<'a>,
    units: Vec<Unit>,
    /// Unit ids grouped by same-vehicle links; moves act on whole clusters
    clusters: Vec<Vec<usize>>,
    cluster_mandatory: Vec<bool>,
}

impl<'m, 'a> Context<'m, 'a> {
    fn new(model: &'m RoutingModel<'a>) -> Self {
        let manager = model.manager;
        let droppable: HashSet<usize> = model
            .disjunctions
            .iter()
            .flat_map(|d| d.indices.iter().copied())
            .collect();

        let mut units = Vec::new();
        let mut unit_of = HashMap::new();
        for &(pickup, delivery) in &model.pairs {
            let id = units.len();
            units.push(Unit {
                pickup,
                delivery: Some(delivery),
                mandatory: !droppable.contains(&pickup) || !droppable.contains(&delivery),
            });
            unit_of.insert(pickup, id);
            unit_of.insert(delivery, id);
        }
        for node in 0..manager.num_nodes() {
            if node == manager.depot {
                continue;
            }
            if !unit_of.contains_key(&node) {
                let id = units.len();
                units.push(Unit {
                    pickup: node,
                    delivery: None,
                    mandatory: !droppable.contains(&node),
                });
                unit_of.insert(node, id);
            }
        }

        // Union units linked by same-vehicle constraints into clusters.
        let mut parent: Vec<usize> = (0..units.len()).collect();
        fn find(parent: &mut Vec<usize>, mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for &(a, b) in &model.same_vehicle {
            if let (Some(&ua), Some(&ub)) = (unit_of.get(&a), unit_of.get(&b)) {
                let (ra, rb) = (find(&mut parent, ua), find(&mut parent, ub));
                if ra != rb {
                    parent[ra.max(rb)] = ra.min(rb);
                }
            }
        }
        let mut cluster_of_root = HashMap::new();
        let mut clusters: Vec<Vec<usize>> = Vec::new();
        for unit in 0..units.len() {
            let root = find(&mut parent, unit);
            let cluster = *cluster_of_root.entry(root).or_insert_with(|| {
                clusters.push(Vec::new());
                clusters.len() - 1
            });
            clusters[cluster].push(unit);
        }
        let cluster_mandatory = clusters
            .iter()
            .map(|members| members.iter().any(|&u| units[u].mandatory))
            .collect();

        Self {
            model,
            units,
            clusters,
            cluster_mandatory,
        }
    }
}

#[derive(Clone)]
struct State {
    /// Interior node indices per vehicle, depot start/end implied
    routes: Vec<Vec<usize>>,
    unit_vehicle: Vec<Option<usize>>,
}

impl State {
    fn empty(ctx: &Context) -> Self {
        Self {
            routes: vec![Vec::new(); ctx.model.manager.num_vehicles()],
            unit_vehicle: vec![None; ctx.units.len()],
        }
    }

    fn cluster_vehicle(&self, ctx: &Context, cluster: usize) -> Option<usize> {
        ctx.clusters[cluster]
            .iter()
            .find_map(|&unit| self.unit_vehicle[unit])
    }
}

#[derive(Clone)]
struct RouteEval {
    arc_cost: i64,
    /// Cumulative values per dimension, per position along [start, .., end]
    cumuls: Vec<Vec<i64>>,
}

#[derive(Clone)]
struct Evaluation {
    objective: i64,
    route_evals: Vec<RouteEval>,
}

/// Propagate every dimension along one route. `None` means infeasible.
fn evaluate_route(model: &RoutingModel, vehicle: usize, interior: &[usize]) -> Option<RouteEval> {
    for &index in interior {
        if let Some(allowed) = model.allowed_vehicles.get(&index) {
            if !allowed.contains(&vehicle) {
                return None;
            }
        }
    }

    let start = model.start(vehicle);
    let end = model.end(vehicle);
    let sequence_len = interior.len() + 2;

    let mut arc_cost = 0;
    if let Some(callback) = model.arc_cost_evaluator {
        let mut previous = start;
        for &index in interior.iter().chain(std::iter::once(&end)) {
            arc_cost += model.transit(callback, previous, index);
            previous = index;
        }
    }

    let mut cumuls = Vec::with_capacity(model.dimensions.len());
    for dimension in &model.dimensions {
        let capacity = dimension.capacities[vehicle];
        let evaluator = dimension.evaluators[vehicle];
        let mut values = Vec::with_capacity(sequence_len);

        let (start_lower, start_upper) = match dimension.cumul_bounds.get(&start) {
            Some(&(lower, upper)) => (lower.max(0), upper.min(capacity)),
            None => (0, capacity),
        };
        let mut cumul = if dimension.fix_start_cumul_to_zero {
            0
        } else {
            start_lower
        };
        if cumul > start_upper {
            return None;
        }
        values.push(cumul);

        let mut previous = start;
        for &index in interior.iter().chain(std::iter::once(&end)) {
            let reached = cumul + model.transit(evaluator, previous, index);
            let (lower, upper) = match dimension.cumul_bounds.get(&index) {
                Some(&(lower, upper)) => (lower.max(0), upper.min(capacity)),
                None => (0, capacity),
            };
            cumul = if reached < lower {
                // Waiting is slack spent at the previous index.
                if reached + dimension.slack_max < lower {
                    return None;
                }
                lower
            } else {
                reached
            };
            if cumul > upper {
                return None;
            }
            values.push(cumul);
            previous = index;
        }
        cumuls.push(values);
    }

    Some(RouteEval { arc_cost, cumuls })
}

/// Evaluate a whole candidate: per-route feasibility, drop penalties, span
/// costs, and (when `check_all`) the registered cross-route constraints.
fn evaluate_state(model: &RoutingModel, state: &State, check_all: bool) -> Option<Evaluation> {
    let vehicles = model.manager.num_vehicles();
    let mut route_evals = Vec::with_capacity(vehicles);
    let mut positions: HashMap<usize, (usize, usize)> = HashMap::new();
    let mut objective = 0;

    for vehicle in 0..vehicles {
        let eval = evaluate_route(model, vehicle, &state.routes[vehicle])?;
        objective += eval.arc_cost;
        for (offset, &index) in state.routes[vehicle].iter().enumerate() {
            positions.insert(index, (vehicle, offset + 1));
        }
        route_evals.push(eval);
    }

    for disjunction in &model.disjunctions {
        if !disjunction
            .indices
            .iter()
            .any(|index| positions.contains_key(index))
        {
            objective += disjunction.penalty;
        }
    }

    for (dimension_index, dimension) in model.dimensions.iter().enumerate() {
        if dimension.span_cost_coefficient == 0 {
            continue;
        }
        let min_start = route_evals
            .iter()
            .filter_map(|eval| eval.cumuls[dimension_index].first())
            .min()
            .copied()
            .unwrap_or(0);
        let max_end = route_evals
            .iter()
            .filter_map(|eval| eval.cumuls[dimension_index].last())
            .max()
            .copied()
            .unwrap_or(0);
        objective += dimension.span_cost_coefficient * (max_end - min_start).max(0);
    }

    if check_all {
        let cumul_at = |dimension: DimensionIndex, index: usize| -> Option<i64> {
            let &(vehicle, position) = positions.get(&index)?;
            Some(route_evals[vehicle].cumuls[dimension][position])
        };
        for &(pickup, delivery) in &model.pairs {
            match (positions.get(&pickup), positions.get(&delivery)) {
                (None, None) => {}
                (Some(&(pv, pp)), Some(&(dv, dp))) => {
                    if pv != dv || pp >= dp {
                        return None;
                    }
                }
                _ => return None,
            }
        }
        for &(a, b) in &model.same_vehicle {
            let vehicle_of = |index: usize| positions.get(&index).map(|&(vehicle, _)| vehicle);
            if vehicle_of(a) != vehicle_of(b) {
                return None;
            }
        }
        for &(dimension, before, after) in &model.cumul_precedences {
            if let (Some(before_cumul), Some(after_cumul)) =
                (cumul_at(dimension, before), cumul_at(dimension, after))
            {
                if before_cumul > after_cumul {
                    return None;
                }
            }
        }
    }

    Some(Evaluation {
        objective,
        route_evals,
    })
}

/// Cheapest feasible insertion of one unit into one route, by arc cost
fn best_unit_insertion(
    model: &RoutingModel,
    vehicle: usize,
    interior: &[usize],
    unit: &Unit,
    base_arc_cost: i64,
) -> Option<(Vec<usize>, i64)> {
    let mut best: Option<(Vec<usize>, i64)> = None;
    let mut consider = |candidate: Vec<usize>| {
        if let Some(eval) = evaluate_route(model, vehicle, &candidate) {
            let delta = eval.arc_cost - base_arc_cost;
            if best.as_ref().map_or(true, |(_, cost)| delta < *cost) {
                best = Some((candidate, delta));
            }
        }
    };

    match unit.delivery {
        Some(delivery) => {
            for pickup_position in 0..=interior.len() {
                for delivery_position in pickup_position + 1..=interior.len() + 1 {
                    let mut candidate = interior.to_vec();
                    candidate.insert(pickup_position, unit.pickup);
                    candidate.insert(delivery_position, delivery);
                    consider(candidate);
                }
            }
        }
        None => {
            for position in 0..=interior.len() {
                let mut candidate = interior.to_vec();
                candidate.insert(position, unit.pickup);
                consider(candidate);
            }
        }
    }
    best
}

/// Insert every unit of a cluster onto one vehicle, greedily per unit.
/// Returns the new state and the accumulated arc-cost delta.
fn insert_cluster(
    ctx: &Context,
    state: &State,
    cluster: usize,
    vehicle: usize,
) -> Option<(State, i64)> {
    let mut next = state.clone();
    let mut total_delta = 0;
    for &unit_id in &ctx.clusters[cluster] {
        let base = evaluate_route(ctx.model, vehicle, &next.routes[vehicle])?;
        let (interior, delta) = best_unit_insertion(
            ctx.model,
            vehicle,
            &next.routes[vehicle],
            &ctx.units[unit_id],
            base.arc_cost,
        )?;
        next.routes[vehicle] = interior;
        next.unit_vehicle[unit_id] = Some(vehicle);
        total_delta += delta;
    }
    Some((next, total_delta))
}

fn remove_cluster(ctx: &Context, state: &State, cluster: usize) -> State {
    let mut next = state.clone();
    for &unit_id in &ctx.clusters[cluster] {
        if let Some(vehicle) = next.unit_vehicle[unit_id] {
            let unit = &ctx.units[unit_id];
            next.routes[vehicle].retain(|&index| unit.nodes().all(|node| node != index));
            next.unit_vehicle[unit_id] = None;
        }
    }
    next
}

/// Cheapest vehicle for a cluster, by arc-cost delta then vehicle order
fn cheapest_cluster_insertion(
    ctx: &Context,
    state: &State,
    cluster: usize,
) -> Option<(usize, State, i64)> {
    let mut best: Option<(usize, State, i64)> = None;
    for vehicle in 0..ctx.model.manager.num_vehicles() {
        if let Some((candidate, delta)) = insert_cluster(ctx, state, cluster, vehicle) {
            if best.as_ref().map_or(true, |(_, _, cost)| delta < *cost) {
                best = Some((vehicle, candidate, delta));
            }
        }
    }
    best
}

struct Limits {
    deadline: Option<Instant>,
    solution_limit: Option<u64>,
    solutions: u64,
}

impl Limits {
    fn new(parameters: &RoutingSearchParameters) -> Self {
        Self {
            deadline: parameters.time_limit.map(|limit| Instant::now() + limit),
            solution_limit: parameters.solution_limit,
            solutions: 0,
        }
    }

    fn on_solution(&mut self) {
        self.solutions += 1;
    }

    fn exhausted(&self) -> bool {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return true;
            }
        }
        if let Some(limit) = self.solution_limit {
            if self.solutions >= limit {
                return true;
            }
        }
        false
    }
}

fn construct(
    ctx: &Context,
    parameters: &RoutingSearchParameters,
    limits: &mut Limits,
) -> Option<State> {
    let mut state = State::empty(ctx);
    let cluster_count = ctx.clusters.len();
    let mut unplaced: Vec<usize> = (0..cluster_count).collect();

    match parameters.first_solution_strategy {
        FirstSolutionStrategy::LocalCheapestInsertion => {
            for cluster in 0..cluster_count {
                if limits.exhausted() {
                    break;
                }
                if let Some((_, next, _)) = cheapest_cluster_insertion(ctx, &state, cluster) {
                    state = next;
                    unplaced.retain(|&c| c != cluster);
                }
            }
        }
        FirstSolutionStrategy::LocalCheapestCostInsertion => {
            let empty = State::empty(ctx);
            let mut estimates: Vec<(i64, usize)> = (0..cluster_count)
                .map(|cluster| {
                    let estimate = cheapest_cluster_insertion(ctx, &empty, cluster)
                        .map_or(i64::MAX, |(_, _, delta)| delta);
                    (estimate, cluster)
                })
                .collect();
            estimates.sort();
            for (_, cluster) in estimates {
                if limits.exhausted() {
                    break;
                }
                if let Some((_, next, _)) = cheapest_cluster_insertion(ctx, &state, cluster) {
                    state = next;
                    unplaced.retain(|&c| c != cluster);
                }
            }
        }
        FirstSolutionStrategy::SequentialCheapestInsertion => {
            for vehicle in 0..ctx.model.manager.num_vehicles() {
                loop {
                    if limits.exhausted() {
                        break;
                    }
                    let best = unplaced
                        .iter()
                        .filter_map(|&cluster| {
                            insert_cluster(ctx, &state, cluster, vehicle)
                                .map(|(next, delta)| (delta, cluster, next))
                        })
                        .min_by_key(|(delta, cluster, _)| (*delta, *cluster));
                    match best {
                        Some((_, cluster, next)) => {
                            state = next;
                            unplaced.retain(|&c| c != cluster);
                        }
                        None => break,
                    }
                }
            }
        }
        FirstSolutionStrategy::ParallelCheapestInsertion => {
            while !unplaced.is_empty() && !limits.exhausted() {
                let best = unplaced
                    .par_iter()
                    .filter_map(|&cluster| {
                        cheapest_cluster_insertion(ctx, &state, cluster)
                            .map(|(vehicle, next, delta)| (delta, cluster, vehicle, next))
                    })
                    .min_by_key(|(delta, cluster, vehicle, _)| (*delta, *cluster, *vehicle));
                match best {
                    Some((_, cluster, _, next)) => {
                        state = next;
                        unplaced.retain(|&c| c != cluster);
                    }
                    None => break,
                }
            }
        }
        FirstSolutionStrategy::BestInsertion => {
            // Regret insertion: place first the cluster that would suffer
            // most from losing its best spot.
            while !unplaced.is_empty() && !limits.exhausted() {
                let mut choice: Option<(i64, usize, State)> = None;
                for &cluster in &unplaced {
                    let mut deltas: Vec<(i64, State)> = (0..ctx.model.manager.num_vehicles())
                        .filter_map(|vehicle| {
                            insert_cluster(ctx, &state, cluster, vehicle)
                                .map(|(next, delta)| (delta, next))
                        })
                        .collect();
                    deltas.sort_by_key(|(delta, _)| *delta);
                    let mut deltas = deltas.into_iter();
                    let Some((best_delta, best_state)) = deltas.next() else {
                        continue;
                    };
                    let regret = match deltas.next() {
                        Some((second_delta, _)) => second_delta - best_delta,
                        None => i64::MAX / 2,
                    };
                    if choice.as_ref().map_or(true, |(r, _, _)| regret > *r) {
                        choice = Some((regret, cluster, best_state));
                    }
                }
                match choice {
                    Some((_, cluster, next)) => {
                        state = next;
                        unplaced.retain(|&c| c != cluster);
                    }
                    None => break,
                }
            }
        }
    }

    if unplaced
        .iter()
        .any(|&cluster| ctx.cluster_mandatory[cluster])
    {
        return None;
    }
    Some(state)
}

struct Candidate {
    state: State,
    evaluation: Evaluation,
    moved: Vec<usize>,
}

/// All relocate / drop / reinsert / swap moves around `state`
fn enumerate_neighbors(ctx: &Context, state: &State, check_all: bool) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let push = |next: State, moved: Vec<usize>, candidates: &mut Vec<Candidate>| {
        if let Some(evaluation) = evaluate_state(ctx.model, &next, check_all) {
            candidates.push(Candidate {
                state: next,
                evaluation,
                moved,
            });
        }
    };

    for cluster in 0..ctx.clusters.len() {
        match state.cluster_vehicle(ctx, cluster) {
            Some(_) => {
                let removed = remove_cluster(ctx, state, cluster);
                for vehicle in 0..ctx.model.manager.num_vehicles() {
                    if let Some((next, _)) = insert_cluster(ctx, &removed, cluster, vehicle) {
                        push(next, vec![cluster], &mut candidates);
                    }
                }
                if !ctx.cluster_mandatory[cluster] {
                    push(removed, vec![cluster], &mut candidates);
                }
            }
            None => {
                for vehicle in 0..ctx.model.manager.num_vehicles() {
                    if let Some((next, _)) = insert_cluster(ctx, state, cluster, vehicle) {
                        push(next, vec![cluster], &mut candidates);
                    }
                }
            }
        }
    }

    for a in 0..ctx.clusters.len() {
        let Some(vehicle_a) = state.cluster_vehicle(ctx, a) else {
            continue;
        };
        for b in a + 1..ctx.clusters.len() {
            let Some(vehicle_b) = state.cluster_vehicle(ctx, b) else {
                continue;
            };
            if vehicle_a == vehicle_b {
                continue;
            }
            let removed = remove_cluster(ctx, &remove_cluster(ctx, state, a), b);
            let Some((with_a, _)) = insert_cluster(ctx, &removed, a, vehicle_b) else {
                continue;
            };
            if let Some((next, _)) = insert_cluster(ctx, &with_a, b, vehicle_a) {
                push(next, vec![a, b], &mut candidates);
            }
        }
    }

    // Replace a routed cluster with a dropped one, in a single move; neither
    // a drop nor a reinsert alone would be accepted by a descent.
    for routed in 0..ctx.clusters.len() {
        if state.cluster_vehicle(ctx, routed).is_none() || ctx.cluster_mandatory[routed] {
            continue;
        }
        let removed = remove_cluster(ctx, state, routed);
        for dropped in 0..ctx.clusters.len() {
            if dropped == routed || state.cluster_vehicle(ctx, dropped).is_some() {
                continue;
            }
            for vehicle in 0..ctx.model.manager.num_vehicles() {
                if let Some((next, _)) = insert_cluster(ctx, &removed, dropped, vehicle) {
                    push(next, vec![routed, dropped], &mut candidates);
                }
            }
        }
    }

    candidates
}

/// One random relocate / drop / reinsert / swap move
fn random_neighbor(
    ctx: &Context,
    state: &State,
    check_all: bool,
    rng: &mut StdRng,
) -> Option<Candidate> {
    let vehicles = ctx.model.manager.num_vehicles();
    if ctx.clusters.is_empty() || vehicles == 0 {
        return None;
    }
    for _ in 0..RANDOM_MOVE_ATTEMPTS {
        let cluster = rng.gen_range(0..ctx.clusters.len());
        let candidate = match state.cluster_vehicle(ctx, cluster) {
            Some(current) => match rng.gen_range(0..3u8) {
                0 if !ctx.cluster_mandatory[cluster] => Some(remove_cluster(ctx, state, cluster)),
                1 => {
                    let other = rng.gen_range(0..ctx.clusters.len());
                    match state.cluster_vehicle(ctx, other) {
                        Some(other_vehicle) if other != cluster && other_vehicle != current => {
                            let removed =
                                remove_cluster(ctx, &remove_cluster(ctx, state, cluster), other);
                            insert_cluster(ctx, &removed, cluster, other_vehicle)
                                .and_then(|(next, _)| insert_cluster(ctx, &next, other, current))
                                .map(|(next, _)| next)
                        }
                        _ => None,
                    }
                }
                _ => {
                    let vehicle = rng.gen_range(0..vehicles);
                    let removed = remove_cluster(ctx, state, cluster);
                    insert_cluster(ctx, &removed, cluster, vehicle).map(|(next, _)| next)
                }
            },
            None => {
                let vehicle = rng.gen_range(0..vehicles);
                insert_cluster(ctx, state, cluster, vehicle).map(|(next, _)| next)
            }
        };
        if let Some(next) = candidate {
            if let Some(evaluation) = evaluate_state(ctx.model, &next, check_all) {
                return Some(Candidate {
                    state: next,
                    evaluation,
                    moved: vec![cluster],
                });
            }
        }
    }
    None
}

fn greedy_descent(
    ctx: &Context,
    parameters: &RoutingSearchParameters,
    limits: &mut Limits,
    mut current: (State, Evaluation),
) -> (State, Evaluation) {
    for iteration in 0..MAX_ITERATIONS {
        if limits.exhausted() {
            break;
        }
        let best = enumerate_neighbors(ctx, &current.0, parameters.use_full_propagation)
            .into_iter()
            .min_by_key(|candidate| candidate.evaluation.objective);
        match best {
            Some(candidate) if candidate.evaluation.objective < current.1.objective => {
                if parameters.log_search {
                    debug!(
                        iteration,
                        objective = candidate.evaluation.objective,
                        "greedy descent improved"
                    );
                }
                current = (candidate.state, candidate.evaluation);
                limits.on_solution();
            }
            _ => break,
        }
    }
    current
}

/// Depot-to-depot arcs of a state, as (from_node, to_node) pairs
fn state_arcs(ctx: &Context, state: &State) -> Vec<(usize, usize)> {
    let depot = ctx.model.manager.depot;
    let mut arcs = Vec::new();
    for interior in &state.routes {
        if interior.is_empty() {
            continue;
        }
        let mut previous = depot;
        for &node in interior {
            arcs.push((previous, node));
            previous = node;
        }
        arcs.push((previous, depot));
    }
    arcs
}

fn guided_local_search(
    ctx: &Context,
    parameters: &RoutingSearchParameters,
    limits: &mut Limits,
    initial: (State, Evaluation),
) -> (State, Evaluation) {
    let mut penalties: HashMap<(usize, usize), i64> = HashMap::new();
    let initial_arcs = state_arcs(ctx, &initial.0).len().max(1);
    let lambda = ((GLS_LAMBDA_FACTOR * initial.1.objective as f64) / initial_arcs as f64)
        .max(1.0) as i64;

    let penalty_term = |penalties: &HashMap<(usize, usize), i64>, state: &State| -> i64 {
        state_arcs(ctx, state)
            .iter()
            .map(|arc| penalties.get(arc).copied().unwrap_or(0))
            .sum::<i64>()
            * lambda
    };

    let mut best = initial.clone();
    let mut current = initial;
    let mut stall = 0;

    for round in 0..MAX_ITERATIONS {
        if limits.exhausted() || stall >= MAX_STALL_ROUNDS {
            break;
        }

        // Descend on the penalty-augmented objective.
        loop {
            if limits.exhausted() {
                break;
            }
            let current_augmented =
                current.1.objective + penalty_term(&penalties, &current.0);
            let best_neighbor = enumerate_neighbors(ctx, &current.0, parameters.use_full_propagation)
                .into_iter()
                .map(|candidate| {
                    let augmented =
                        candidate.evaluation.objective + penalty_term(&penalties, &candidate.state);
                    (augmented, candidate)
                })
                .min_by_key(|(augmented, _)| *augmented);
            match best_neighbor {
                Some((augmented, candidate)) if augmented < current_augmented => {
                    current = (candidate.state, candidate.evaluation);
                    limits.on_solution();
                }
                _ => break,
            }
        }

        if current.1.objective < best.1.objective {
            if parameters.log_search {
                debug!(round, objective = current.1.objective, "guided local search improved");
            }
            best = current.clone();
            stall = 0;
        } else {
            stall += 1;
        }

        // Penalize the most useful arc of the local optimum.
        let arc_to_penalize = state_arcs(ctx, &current.0)
            .into_iter()
            .max_by_key(|&(from, to)| {
                let cost = ctx.model.get_arc_cost_for_vehicle(from, to, 0);
                let penalty = penalties.get(&(from, to)).copied().unwrap_or(0);
                (cost / (1 + penalty), std::cmp::Reverse((from, to)))
            });
        match arc_to_penalize {
            Some(arc) => *penalties.entry(arc).or_insert(0) += 1,
            None => break,
        }
    }
    best
}

fn simulated_annealing(
    ctx: &Context,
    parameters: &RoutingSearchParameters,
    limits: &mut Limits,
    rng: &mut StdRng,
    initial: (State, Evaluation),
) -> (State, Evaluation) {
    let mut best = initial.clone();
    let mut current = initial;
    let mut temperature = (current.1.objective as f64 / 10.0).max(10.0);

    while temperature > SA_MIN_TEMPERATURE {
        if limits.exhausted() {
            break;
        }
        temperature *= SA_COOLING;
        let Some(candidate) = random_neighbor(ctx, &current.0, parameters.use_full_propagation, rng)
        else {
            continue;
        };
        let delta = candidate.evaluation.objective - current.1.objective;
        let accept = delta <= 0 || rng.gen::<f64>() < (-(delta as f64) / temperature).exp();
        if accept {
            current = (candidate.state, candidate.evaluation);
            limits.on_solution();
            if current.1.objective < best.1.objective {
                if parameters.log_search {
                    debug!(objective = current.1.objective, temperature, "annealing improved");
                }
                best = current.clone();
            }
        }
    }
    best
}

fn tabu_search(
    ctx: &Context,
    parameters: &RoutingSearchParameters,
    limits: &mut Limits,
    rng: &mut StdRng,
    sampled: bool,
    initial: (State, Evaluation),
) -> (State, Evaluation) {
    let mut tabu: VecDeque<usize> = VecDeque::new();
    let mut tenure = 12.min(ctx.clusters.len().max(4));
    let mut best = initial.clone();
    let mut current = initial;
    let mut stall = 0;

    for iteration in 0..MAX_ITERATIONS {
        if limits.exhausted() || stall >= MAX_STALL_ROUNDS {
            break;
        }

        let candidates = if sampled {
            (0..GENERIC_TABU_SAMPLES)
                .filter_map(|_| {
                    random_neighbor(ctx, &current.0, parameters.use_full_propagation, rng)
                })
                .collect()
        } else {
            enumerate_neighbors(ctx, &current.0, parameters.use_full_propagation)
        };

        let admissible = candidates.into_iter().filter(|candidate| {
            let is_tabu = candidate.moved.iter().any(|cluster| tabu.contains(cluster));
            !is_tabu || candidate.evaluation.objective < best.1.objective
        });
        let Some(chosen) = admissible.min_by_key(|candidate| candidate.evaluation.objective) else {
            break;
        };

        for &cluster in &chosen.moved {
            tabu.push_back(cluster);
        }
        while tabu.len() > tenure {
            tabu.pop_front();
        }
        if sampled {
            tenure = rng.gen_range(8..=24).min(ctx.clusters.len().max(4));
        }

        current = (chosen.state, chosen.evaluation);
        limits.on_solution();
        if current.1.objective < best.1.objective {
            if parameters.log_search {
                debug!(iteration, objective = current.1.objective, "tabu search improved");
            }
            best = current.clone();
            stall = 0;
        } else {
            stall += 1;
        }
    }
    best
}

fn build_assignment(ctx: &Context, state: &State) -> Option<Assignment> {
    let model = ctx.model;
    let manager = model.manager;
    let evaluation = evaluate_state(model, state, true)?;

    let num_indices = manager.num_indices();
    let mut next: Vec<usize> = (0..num_indices).collect();
    let mut vehicle = vec![-1i64; num_indices];
    let mut cumuls = vec![vec![0i64; num_indices]; model.dimensions.len()];

    for v in 0..manager.num_vehicles() {
        let sequence: Vec<usize> = std::iter::once(model.start(v))
            .chain(state.routes[v].iter().copied())
            .chain(std::iter::once(model.end(v)))
            .collect();
        for window in sequence.windows(2) {
            next[window[0]] = window[1];
        }
        for &index in &sequence {
            vehicle[index] = v as i64;
        }
        for (dimension, values) in evaluation.route_evals[v].cumuls.iter().enumerate() {
            for (position, &index) in sequence.iter().enumerate() {
                cumuls[dimension][index] = values[position];
            }
        }
    }

    let mut dropped: Vec<usize> = ctx
        .units
        .iter()
        .enumerate()
        .filter(|(unit_id, _)| state.unit_vehicle[*unit_id].is_none())
        .flat_map(|(_, unit)| unit.nodes().collect::<Vec<_>>())
        .collect();
    dropped.sort_unstable();

    Some(Assignment {
        next,
        vehicle,
        cumuls,
        dropped,
        objective: evaluation.objective,
    })
}

pub(super) fn run_search(
    model: &RoutingModel,
    parameters: &RoutingSearchParameters,
) -> Option<Assignment> {
    let ctx = Context::new(model);
    let mut limits = Limits::new(parameters);
    let mut rng = StdRng::seed_from_u64(RNG_SEED);

    let state = construct(&ctx, parameters, &mut limits)?;
    let evaluation = evaluate_state(model, &state, true)?;
    limits.on_solution();
    if parameters.log_search {
        info!(
            objective = evaluation.objective,
            strategy = ?parameters.first_solution_strategy,
            "first solution"
        );
    }

    let initial = (state, evaluation);
    let (best_state, best_evaluation) = match parameters.local_search_metaheuristic {
        LocalSearchMetaheuristic::GreedyDescent => {
            greedy_descent(&ctx, parameters, &mut limits, initial)
        }
        LocalSearchMetaheuristic::GuidedLocalSearch => {
            guided_local_search(&ctx, parameters, &mut limits, initial)
        }
        LocalSearchMetaheuristic::SimulatedAnnealing => {
            simulated_annealing(&ctx, parameters, &mut limits, &mut rng, initial)
        }
        LocalSearchMetaheuristic::TabuSearch => {
            tabu_search(&ctx, parameters, &mut limits, &mut rng, false, initial)
        }
        LocalSearchMetaheuristic::GenericTabuSearch => {
            tabu_search(&ctx, parameters, &mut limits, &mut rng, true, initial)
        }
    };
    if parameters.log_search {
        info!(objective = best_evaluation.objective, "search finished");
    }

    build_assignment(&ctx, &best_state)
}
