//! Core data structures for the delivery route planner
//!
//! The [`DataModel`] is the single owning root: addresses, travel cost maps,
//! the vehicle fleet, the package catalog, the flattened node list, and the
//! scenario/search settings all live here. Everything else refers back into
//! it by key (street, vehicle id, package id, node index).

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::{FirstSolutionStrategy, LocalSearchMetaheuristic};
use crate::input;
use crate::time::RoutingTime;
use crate::{RoutingError, RoutingResult};

/// Distances are carried as integer tenths of a mile
pub const MILEAGE_SCALE_FACTOR: i64 = 10;

/// Node index of the depot in every node list
pub const ORIGIN_NODE_INDEX: usize = 0;

pub type PackageId = u32;
pub type VehicleId = u32;

/// A street address and its distances in miles to every address in the book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub distance_map_miles: HashMap<String, f64>,
}

/// All known addresses, in input order. The first address is the depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressBook {
    addresses: Vec<Address>,
}

impl AddressBook {
    /// Validates that streets are unique and that every address carries a
    /// distance to every address in the book, itself included.
    pub fn new(addresses: Vec<Address>) -> RoutingResult<Self> {
        let mut seen = HashSet::new();
        for address in &addresses {
            if !seen.insert(address.street.as_str()) {
                return Err(RoutingError::InputFormat(format!(
                    "Duplicate street '{}' in address book",
                    address.street
                )));
            }
        }
        for address in &addresses {
            if !address.distance_map_miles.contains_key(&address.street) {
                return Err(RoutingError::InputFormat(format!(
                    "Address '{}' is missing its self-distance",
                    address.street
                )));
            }
            for other in &addresses {
                if !address.distance_map_miles.contains_key(&other.street) {
                    return Err(RoutingError::InputFormat(format!(
                        "Address '{}' has no distance to '{}'",
                        address.street, other.street
                    )));
                }
            }
            if address.distance_map_miles.len() != addresses.len() {
                return Err(RoutingError::InputFormat(format!(
                    "Address '{}' lists {} distances for {} addresses",
                    address.street,
                    address.distance_map_miles.len(),
                    addresses.len()
                )));
            }
        }
        Ok(Self { addresses })
    }

    pub fn get(&self, street: &str) -> Option<&Address> {
        self.addresses.iter().find(|a| a.street == street)
    }

    /// The depot address, by convention the first entry of the book
    pub fn depot(&self) -> Option<&Address> {
        self.addresses.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.addresses.iter()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Integer travel costs between every pair of streets.
///
/// One map carries scaled distances shared by the whole fleet; each vehicle
/// additionally owns a duration map derived from its own speed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelCostMap {
    cost_map: HashMap<String, HashMap<String, i64>>,
}

impl TravelCostMap {
    fn with_transformer<F>(addresses: &AddressBook, transform: F) -> Self
    where
        F: Fn(f64) -> i64 + Sync,
    {
        let rows: Vec<&Address> = addresses.iter().collect();
        let cost_map = rows
            .par_iter()
            .map(|address| {
                let row = address
                    .distance_map_miles
                    .iter()
                    .map(|(to, miles)| (to.clone(), transform(*miles)))
                    .collect();
                (address.street.clone(), row)
            })
            .collect();
        Self { cost_map }
    }

    /// Scaled mileage costs: `round(miles * 10)`
    pub fn with_distance(addresses: &AddressBook) -> Self {
        Self::with_transformer(addresses, |miles| {
            (miles * MILEAGE_SCALE_FACTOR as f64).round() as i64
        })
    }

    /// Travel durations in seconds for a vehicle moving at `speed_mph`
    pub fn with_duration(addresses: &AddressBook, speed_mph: f64) -> Self {
        Self::with_transformer(addresses, |miles| {
            (miles / speed_mph * crate::time::SECONDS_PER_HOUR as f64).round() as i64
        })
    }

    /// Cost between two streets. Both streets must belong to the address book
    /// the map was built from; that is validated before any model build.
    pub fn cost(&self, from: &str, to: &str) -> i64 {
        debug_assert!(self.cost_map.contains_key(from), "unknown street '{from}'");
        self.cost_map
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0)
    }
}

/// A delivery vehicle with its own speed-derived duration map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub speed_mph: f64,
    pub package_capacity: u32,
    pub duration_map: TravelCostMap,
}

impl Vehicle {
    /// Zero-based index used when interfacing with the routing engine
    pub fn index(&self) -> usize {
        (self.id - 1) as usize
    }
}

/// The fleet, with ids kept dense in 1..=N
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fleet {
    vehicles: Vec<Vehicle>,
}

impl Fleet {
    fn validate_attributes(speed_mph: f64, package_capacity: u32) -> RoutingResult<()> {
        if speed_mph <= 0.0 {
            return Err(RoutingError::ModelBuild(format!(
                "Vehicle speed must be positive, got {speed_mph}"
            )));
        }
        if package_capacity == 0 {
            return Err(RoutingError::ModelBuild(
                "Vehicle capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Build `count` identical vehicles sharing one duration map
    pub fn with_shared_attributes(
        count: u32,
        speed_mph: f64,
        package_capacity: u32,
        addresses: &AddressBook,
    ) -> RoutingResult<Self> {
        Self::validate_attributes(speed_mph, package_capacity)?;
        let duration_map = TravelCostMap::with_duration(addresses, speed_mph);
        let vehicles = (1..=count)
            .map(|id| Vehicle {
                id,
                speed_mph,
                package_capacity,
                duration_map: duration_map.clone(),
            })
            .collect();
        Ok(Self { vehicles })
    }

    /// Append one vehicle; it derives a duration map from its own speed
    pub fn add_vehicle(
        &mut self,
        speed_mph: f64,
        package_capacity: u32,
        addresses: &AddressBook,
    ) -> RoutingResult<VehicleId> {
        Self::validate_attributes(speed_mph, package_capacity)?;
        let id = self.vehicles.len() as VehicleId + 1;
        self.vehicles.push(Vehicle {
            id,
            speed_mph,
            package_capacity,
            duration_map: TravelCostMap::with_duration(addresses, speed_mph),
        });
        Ok(id)
    }

    /// Delete a vehicle and compact the remaining ids back to 1..=N
    pub fn remove_vehicle(&mut self, id: VehicleId) -> RoutingResult<()> {
        let position = self
            .vehicles
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| RoutingError::Reference(format!("Vehicle {id} not found")))?;
        self.vehicles.remove(position);
        for (index, vehicle) in self.vehicles.iter_mut().enumerate() {
            vehicle.id = index as VehicleId + 1;
        }
        Ok(())
    }

    pub fn get(&self, id: VehicleId) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Vehicle> {
        self.vehicles.iter()
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }
}

/// A package to pick up at the depot and deliver to `street`.
///
/// The result fields at the bottom are written only by the solution
/// extractor after a successful solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub street: String,
    pub weight_kg: Option<f64>,
    pub shipping_availability: Option<RoutingTime>,
    pub delivery_deadline: Option<RoutingTime>,
    pub vehicle_requirement: Option<VehicleId>,
    /// Ids of packages that must ride on the same vehicle as this one
    pub bundled_packages: Vec<PackageId>,
    pub shipped_time: Option<RoutingTime>,
    pub delivered_time: Option<RoutingTime>,
    pub vehicle_used: Option<VehicleId>,
}

impl Package {
    pub fn new(id: PackageId, street: impl Into<String>) -> Self {
        Self {
            id,
            street: street.into(),
            weight_kg: None,
            shipping_availability: None,
            delivery_deadline: None,
            vehicle_requirement: None,
            bundled_packages: Vec::new(),
            shipped_time: None,
            delivered_time: None,
            vehicle_used: None,
        }
    }

    fn clear_results(&mut self) {
        self.shipped_time = None;
        self.delivered_time = None;
        self.vehicle_used = None;
    }
}

/// All packages, in input order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageCatalog {
    packages: Vec<Package>,
}

impl PackageCatalog {
    /// Validates id uniqueness and bundling references; self-links are a
    /// tolerated no-op and are dropped here.
    pub fn new(mut packages: Vec<Package>) -> RoutingResult<Self> {
        let ids: HashSet<PackageId> = packages.iter().map(|p| p.id).collect();
        if ids.len() != packages.len() {
            return Err(RoutingError::InputFormat(
                "Duplicate package id in catalog".to_string(),
            ));
        }
        for package in &packages {
            for bundled in &package.bundled_packages {
                if !ids.contains(bundled) {
                    return Err(RoutingError::Reference(format!(
                        "Package {} bundles unknown package {bundled}",
                        package.id
                    )));
                }
            }
        }
        for package in &mut packages {
            let own_id = package.id;
            package.bundled_packages.retain(|&id| id != own_id);
        }
        Ok(Self { packages })
    }

    pub fn get(&self, id: PackageId) -> Option<&Package> {
        self.packages.iter().find(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PackageId) -> Option<&mut Package> {
        self.packages.iter_mut().find(|p| p.id == id)
    }

    /// Position of a package in catalog order
    pub fn position(&self, id: PackageId) -> Option<usize> {
        self.packages.iter().position(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Package> {
        self.packages.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// What happens to the on-board package count when a node is visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Origin,
    Pickup,
    Delivery,
}

impl NodeKind {
    pub fn capacity_delta(self) -> i64 {
        match self {
            NodeKind::Origin => 0,
            NodeKind::Pickup => 1,
            NodeKind::Delivery => -1,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            NodeKind::Origin => "Route Start/End",
            NodeKind::Pickup => "Pickup",
            NodeKind::Delivery => "Delivery",
        }
    }
}

/// One unit of the routing problem: the depot, or a package's pickup or
/// delivery location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub street: String,
    pub package_id: Option<PackageId>,
}

fn build_nodes(packages: &PackageCatalog, depot_street: &str) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(1 + 2 * packages.len());
    nodes.push(Node {
        kind: NodeKind::Origin,
        street: depot_street.to_string(),
        package_id: None,
    });
    for package in packages.iter() {
        nodes.push(Node {
            kind: NodeKind::Pickup,
            street: depot_street.to_string(),
            package_id: Some(package.id),
        });
        nodes.push(Node {
            kind: NodeKind::Delivery,
            street: package.street.clone(),
            package_id: Some(package.id),
        });
    }
    nodes
}

/// Which classes of constraint the model builder applies
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Constraints {
    pub vehicle_capacities: bool,
    pub shipping_availability: bool,
    pub delivery_deadline: bool,
    pub vehicle_requirement: bool,
    pub bundled_packages: bool,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            vehicle_capacities: true,
            shipping_availability: true,
            delivery_deadline: true,
            vehicle_requirement: true,
            bundled_packages: true,
        }
    }
}

/// Workday bounds and fleet defaults
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingScenario {
    pub day_start: RoutingTime,
    pub day_end: RoutingTime,
    pub vehicle_count: u32,
    pub vehicle_speed_mph: f64,
    pub vehicle_capacity: u32,
    pub constraints: Constraints,
}

impl Default for RoutingScenario {
    fn default() -> Self {
        Self {
            day_start: RoutingTime::from_seconds(8 * crate::time::SECONDS_PER_HOUR),
            day_end: RoutingTime::from_seconds(crate::time::SECONDS_PER_DAY - 1),
            vehicle_count: 2,
            vehicle_speed_mph: 18.0,
            vehicle_capacity: 16,
            constraints: Constraints::default(),
        }
    }
}

impl RoutingScenario {
    /// Length of the workday in seconds
    pub fn day_duration(&self) -> i64 {
        self.day_start.duration_until(self.day_end)
    }
}

/// Knobs for the routing search
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SearchSettings {
    pub max_mileage_per_vehicle: i64,
    pub distance_span_cost_coefficient: i64,
    pub base_penalty: i64,
    pub penalty_scale_req_vehicle: f64,
    pub penalty_scale_pickups: f64,
    pub use_full_propagation: bool,
    pub use_search_logging: bool,
    pub first_solution_strategy: FirstSolutionStrategy,
    pub local_search_metaheuristic: LocalSearchMetaheuristic,
    pub solver_time_limit_seconds: Option<u64>,
    pub solver_solution_limit: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_mileage_per_vehicle: 100,
            distance_span_cost_coefficient: 0,
            base_penalty: 1000,
            penalty_scale_req_vehicle: 3.0,
            penalty_scale_pickups: 2.0,
            use_full_propagation: true,
            use_search_logging: false,
            first_solution_strategy: FirstSolutionStrategy::LocalCheapestInsertion,
            local_search_metaheuristic: LocalSearchMetaheuristic::GuidedLocalSearch,
            solver_time_limit_seconds: Some(120),
            solver_solution_limit: Some(2000),
        }
    }
}

/// The owning root of the routing problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataModel {
    pub addresses: AddressBook,
    pub distance_map: TravelCostMap,
    pub fleet: Fleet,
    pub packages: PackageCatalog,
    pub nodes: Vec<Node>,
    pub scenario: RoutingScenario,
    pub settings: SearchSettings,
}

impl DataModel {
    pub fn new(
        addresses: AddressBook,
        fleet: Fleet,
        packages: PackageCatalog,
        scenario: RoutingScenario,
        settings: SearchSettings,
    ) -> RoutingResult<Self> {
        let depot_street = addresses
            .depot()
            .ok_or_else(|| RoutingError::ModelBuild("Address book is empty".to_string()))?
            .street
            .clone();
        for package in packages.iter() {
            if addresses.get(&package.street).is_none() {
                return Err(RoutingError::Reference(format!(
                    "Package {} cites unknown address '{}'",
                    package.id, package.street
                )));
            }
            if let Some(required) = package.vehicle_requirement {
                if fleet.get(required).is_none() {
                    return Err(RoutingError::Reference(format!(
                        "Package {} requires unknown vehicle {required}",
                        package.id
                    )));
                }
            }
        }
        let distance_map = TravelCostMap::with_distance(&addresses);
        let nodes = build_nodes(&packages, &depot_street);
        Ok(Self {
            addresses,
            distance_map,
            fleet,
            packages,
            nodes,
            scenario,
            settings,
        })
    }

    /// Load both CSV files and assemble a model with default scenario and
    /// search settings
    pub fn from_csv_files(
        address_path: impl AsRef<Path>,
        package_path: impl AsRef<Path>,
    ) -> RoutingResult<Self> {
        let scenario = RoutingScenario::default();
        let addresses = input::load_addresses(address_path)?;
        let fleet = Fleet::with_shared_attributes(
            scenario.vehicle_count,
            scenario.vehicle_speed_mph,
            scenario.vehicle_capacity,
            &addresses,
        )?;
        let packages = input::load_packages(package_path, &addresses, &fleet)?;
        Self::new(addresses, fleet, packages, scenario, SearchSettings::default())
    }

    pub fn depot_street(&self) -> &str {
        &self.nodes[ORIGIN_NODE_INDEX].street
    }

    /// Node index of a package's pickup at the depot
    pub fn pickup_node_index(&self, id: PackageId) -> Option<usize> {
        self.packages.position(id).map(|p| 1 + 2 * p)
    }

    /// Node index of a package's delivery stop
    pub fn delivery_node_index(&self, id: PackageId) -> Option<usize> {
        self.packages.position(id).map(|p| 2 + 2 * p)
    }

    pub fn add_vehicle(&mut self, speed_mph: f64, package_capacity: u32) -> RoutingResult<VehicleId> {
        self.fleet.add_vehicle(speed_mph, package_capacity, &self.addresses)
    }

    pub fn remove_vehicle(&mut self, id: VehicleId) -> RoutingResult<()> {
        self.fleet.remove_vehicle(id)
    }

    /// Recompute the node list after editing the catalog
    pub fn rebuild_nodes(&mut self) {
        let depot_street = self.depot_street().to_string();
        self.nodes = build_nodes(&self.packages, &depot_street);
    }

    /// Wipe the per-package result fields before a new solve
    pub fn clear_results(&mut self) {
        for package in self.packages.iter_mut() {
            package.clear_results();
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build an address book from `(street, [(other_street, miles)])` rows.
    /// Distances to streets not listed default to 0.
    pub fn book(rows: &[(&str, &[(&str, f64)])]) -> AddressBook {
        let streets: Vec<&str> = rows.iter().map(|(street, _)| *street).collect();
        let addresses = rows
            .iter()
            .map(|(street, distances)| {
                let mut map: HashMap<String, f64> =
                    streets.iter().map(|s| (s.to_string(), 0.0)).collect();
                for (to, miles) in *distances {
                    map.insert(to.to_string(), *miles);
                }
                Address {
                    street: street.to_string(),
                    city: "Salt Lake City".to_string(),
                    state: "UT".to_string(),
                    zip_code: "84111".to_string(),
                    distance_map_miles: map,
                }
            })
            .collect();
        AddressBook::new(addresses).unwrap()
    }

    /// Symmetric two-way distances from an upper-triangle listing
    pub fn symmetric_book(streets: &[&str], miles: &[(&str, &str, f64)]) -> AddressBook {
        let addresses = streets
            .iter()
            .map(|street| {
                let mut map: HashMap<String, f64> =
                    streets.iter().map(|s| (s.to_string(), 0.0)).collect();
                for (a, b, distance) in miles {
                    if a == street {
                        map.insert(b.to_string(), *distance);
                    } else if b == street {
                        map.insert(a.to_string(), *distance);
                    }
                }
                Address {
                    street: street.to_string(),
                    city: "Salt Lake City".to_string(),
                    state: "UT".to_string(),
                    zip_code: "84111".to_string(),
                    distance_map_miles: map,
                }
            })
            .collect();
        AddressBook::new(addresses).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{book, symmetric_book};
    use super::*;

    #[test]
    fn test_address_book_rejects_missing_coverage() {
        let mut map = HashMap::new();
        map.insert("A St".to_string(), 0.0);
        let a = Address {
            street: "A St".to_string(),
            city: "SLC".to_string(),
            state: "UT".to_string(),
            zip_code: "84111".to_string(),
            distance_map_miles: map.clone(),
        };
        let b = Address {
            street: "B St".to_string(),
            city: "SLC".to_string(),
            state: "UT".to_string(),
            zip_code: "84111".to_string(),
            distance_map_miles: map,
        };
        assert!(AddressBook::new(vec![a, b]).is_err());
    }

    #[test]
    fn test_distance_map_scales_to_tenths_of_a_mile() {
        let addresses = book(&[
            ("Hub Dr", &[("Oak St", 3.25)]),
            ("Oak St", &[("Hub Dr", 3.14)]),
        ]);
        let map = TravelCostMap::with_distance(&addresses);
        assert_eq!(map.cost("Hub Dr", "Oak St"), 33);
        assert_eq!(map.cost("Oak St", "Hub Dr"), 31);
        assert_eq!(map.cost("Hub Dr", "Hub Dr"), 0);
    }

    #[test]
    fn test_duration_map_uses_vehicle_speed() {
        let addresses = book(&[
            ("Hub Dr", &[("Oak St", 3.0)]),
            ("Oak St", &[("Hub Dr", 3.0)]),
        ]);
        let map = TravelCostMap::with_duration(&addresses, 18.0);
        // 3 miles at 18 mph is ten minutes
        assert_eq!(map.cost("Hub Dr", "Oak St"), 600);
    }

    #[test]
    fn test_fleet_ids_stay_dense_after_removal() {
        let addresses = book(&[("Hub Dr", &[])]);
        let mut fleet = Fleet::with_shared_attributes(3, 18.0, 16, &addresses).unwrap();
        fleet.remove_vehicle(2).unwrap();
        let ids: Vec<VehicleId> = fleet.iter().map(|v| v.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(fleet.get(2).unwrap().index(), 1);
        assert!(fleet.remove_vehicle(9).is_err());
    }

    #[test]
    fn test_fleet_rejects_bad_attributes() {
        let addresses = book(&[("Hub Dr", &[])]);
        assert!(Fleet::with_shared_attributes(1, 0.0, 16, &addresses).is_err());
        assert!(Fleet::with_shared_attributes(1, 18.0, 0, &addresses).is_err());
    }

    #[test]
    fn test_catalog_drops_self_links_and_validates_ids() {
        let mut package = Package::new(1, "Oak St");
        package.bundled_packages = vec![1, 2];
        let catalog =
            PackageCatalog::new(vec![package.clone(), Package::new(2, "Oak St")]).unwrap();
        assert_eq!(catalog.get(1).unwrap().bundled_packages, vec![2]);

        package.bundled_packages = vec![7];
        assert!(PackageCatalog::new(vec![package]).is_err());
    }

    #[test]
    fn test_node_list_shape() {
        let addresses = symmetric_book(&["Hub Dr", "Oak St"], &[("Hub Dr", "Oak St", 3.0)]);
        let fleet = Fleet::with_shared_attributes(1, 18.0, 4, &addresses).unwrap();
        let catalog = PackageCatalog::new(vec![Package::new(5, "Oak St")]).unwrap();
        let data = DataModel::new(
            addresses,
            fleet,
            catalog,
            RoutingScenario::default(),
            SearchSettings::default(),
        )
        .unwrap();

        assert_eq!(data.nodes.len(), 3);
        assert_eq!(data.nodes[0].kind, NodeKind::Origin);
        assert_eq!(data.nodes[1].kind, NodeKind::Pickup);
        assert_eq!(data.nodes[1].street, "Hub Dr");
        assert_eq!(data.nodes[2].kind, NodeKind::Delivery);
        assert_eq!(data.nodes[2].street, "Oak St");
        assert_eq!(data.pickup_node_index(5), Some(1));
        assert_eq!(data.delivery_node_index(5), Some(2));
    }

    #[test]
    fn test_data_model_rejects_dangling_references() {
        let addresses = book(&[("Hub Dr", &[])]);
        let fleet = Fleet::with_shared_attributes(1, 18.0, 4, &addresses).unwrap();
        let catalog = PackageCatalog::new(vec![Package::new(1, "Nowhere Ln")]).unwrap();
        assert!(DataModel::new(
            addresses.clone(),
            fleet.clone(),
            catalog,
            RoutingScenario::default(),
            SearchSettings::default(),
        )
        .is_err());

        let mut package = Package::new(1, "Hub Dr");
        package.vehicle_requirement = Some(4);
        let catalog = PackageCatalog::new(vec![package]).unwrap();
        assert!(DataModel::new(
            addresses,
            fleet,
            catalog,
            RoutingScenario::default(),
            SearchSettings::default(),
        )
        .is_err());
    }

    #[test]
    fn test_capacity_deltas() {
        assert_eq!(NodeKind::Origin.capacity_delta(), 0);
        assert_eq!(NodeKind::Pickup.capacity_delta(), 1);
        assert_eq!(NodeKind::Delivery.capacity_delta(), -1);
    }
}
