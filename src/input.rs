//! CSV loading for the address book and the package catalog
//!
//! Both files are UTF-8 with an optional BOM and a mandatory header row.
//! Loading is all-or-nothing: any malformed cell or dangling reference aborts
//! the load with no partial state.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::model::{Address, AddressBook, Fleet, Package, PackageCatalog, PackageId};
use crate::time::RoutingTime;
use crate::{RoutingError, RoutingResult};

const ADDRESS_FIXED_HEADERS: [&str; 4] = ["Street", "City", "State", "Zip Code"];
const PACKAGE_HEADERS: [&str; 7] = [
    "id",
    "address",
    "weight_kg",
    "availability",
    "deadline",
    "vehicle_requirement",
    "linked_packages",
];

/// Load the address book with its pairwise mileage matrix.
///
/// Layout: `Street, City, State, Zip Code, <street1>, <street2>, ...` where
/// the trailing headers name the distance columns and must match the order of
/// the data rows.
pub fn load_addresses(path: impl AsRef<Path>) -> RoutingResult<AddressBook> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    for (position, expected) in ADDRESS_FIXED_HEADERS.iter().enumerate() {
        let found = headers.get(position).unwrap_or_default();
        if found != *expected {
            return Err(RoutingError::InputFormat(format!(
                "Address column {} must be '{expected}', found '{found}'",
                position + 1
            )));
        }
    }
    let street_columns: Vec<String> = headers
        .iter()
        .skip(ADDRESS_FIXED_HEADERS.len())
        .map(str::to_string)
        .collect();
    if street_columns.is_empty() {
        return Err(RoutingError::InputFormat(
            "Address file has no distance columns".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    for street in &street_columns {
        if !seen.insert(street.as_str()) {
            return Err(RoutingError::InputFormat(format!(
                "Duplicate street header '{street}'"
            )));
        }
    }

    let mut addresses = Vec::with_capacity(street_columns.len());
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != ADDRESS_FIXED_HEADERS.len() + street_columns.len() {
            return Err(RoutingError::InputFormat(format!(
                "Address row {} has {} cells, expected {}",
                row + 1,
                record.len(),
                ADDRESS_FIXED_HEADERS.len() + street_columns.len()
            )));
        }
        let street = record[0].trim().to_string();
        match street_columns.get(row) {
            Some(expected) if *expected == street => {}
            _ => {
                return Err(RoutingError::InputFormat(format!(
                    "Address row {} is '{street}' but the column order expects '{}'",
                    row + 1,
                    street_columns.get(row).map(String::as_str).unwrap_or("<none>")
                )));
            }
        }

        let mut distance_map_miles = HashMap::with_capacity(street_columns.len());
        for (column, to_street) in street_columns.iter().enumerate() {
            let cell = record[ADDRESS_FIXED_HEADERS.len() + column].trim();
            let miles: f64 = cell.parse().map_err(|_| {
                RoutingError::InputFormat(format!(
                    "Non-numeric distance '{cell}' from '{street}' to '{to_street}'"
                ))
            })?;
            distance_map_miles.insert(to_street.clone(), miles);
        }
        addresses.push(Address {
            street,
            city: record[1].trim().to_string(),
            state: record[2].trim().to_string(),
            zip_code: record[3].trim().to_string(),
            distance_map_miles,
        });
    }

    if addresses.len() != street_columns.len() {
        return Err(RoutingError::InputFormat(format!(
            "Address file has {} rows for {} street columns",
            addresses.len(),
            street_columns.len()
        )));
    }
    AddressBook::new(addresses)
}

fn parse_optional<T, F>(cell: &str, parse: F) -> RoutingResult<Option<T>>
where
    F: FnOnce(&str) -> RoutingResult<T>,
{
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        parse(trimmed).map(Some)
    }
}

/// Load packages and resolve their bundling links.
///
/// The first pass constructs every package; the second resolves
/// `linked_packages` ids so a package may link forward to one that appears
/// later in the file.
pub fn load_packages(
    path: impl AsRef<Path>,
    addresses: &AddressBook,
    fleet: &Fleet,
) -> RoutingResult<PackageCatalog> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    for (position, expected) in PACKAGE_HEADERS.iter().enumerate() {
        let found = headers.get(position).unwrap_or_default();
        if found != *expected {
            return Err(RoutingError::InputFormat(format!(
                "Package column {} must be '{expected}', found '{found}'",
                position + 1
            )));
        }
    }

    let mut packages = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != PACKAGE_HEADERS.len() {
            return Err(RoutingError::InputFormat(format!(
                "Package row has {} cells, expected {}",
                record.len(),
                PACKAGE_HEADERS.len()
            )));
        }
        let id: PackageId = record[0].trim().parse().map_err(|_| {
            RoutingError::InputFormat(format!("Invalid package id '{}'", &record[0]))
        })?;

        let street = record[1].trim().to_string();
        if addresses.get(&street).is_none() {
            return Err(RoutingError::Reference(format!(
                "Package {id} cites unknown address '{street}'"
            )));
        }

        let weight_kg = parse_optional(&record[2], |cell| {
            cell.parse::<f64>().map_err(|_| {
                RoutingError::InputFormat(format!("Invalid weight '{cell}' for package {id}"))
            })
        })?;
        let shipping_availability = parse_optional(&record[3], RoutingTime::parse)?;
        let delivery_deadline = parse_optional(&record[4], RoutingTime::parse)?;
        let vehicle_requirement = parse_optional(&record[5], |cell| {
            cell.parse::<u32>().map_err(|_| {
                RoutingError::InputFormat(format!("Invalid vehicle id '{cell}' for package {id}"))
            })
        })?;
        if let Some(required) = vehicle_requirement {
            if fleet.get(required).is_none() {
                return Err(RoutingError::Reference(format!(
                    "Package {id} requires unknown vehicle {required}"
                )));
            }
        }

        let mut bundled_packages = Vec::new();
        for cell in record[6].split(',') {
            let trimmed = cell.trim();
            if trimmed.is_empty() {
                continue;
            }
            let linked: PackageId = trimmed.parse().map_err(|_| {
                RoutingError::InputFormat(format!(
                    "Invalid linked package id '{trimmed}' for package {id}"
                ))
            })?;
            bundled_packages.push(linked);
        }

        packages.push(Package {
            id,
            street,
            weight_kg,
            shipping_availability,
            delivery_deadline,
            vehicle_requirement,
            bundled_packages,
            shipped_time: None,
            delivered_time: None,
            vehicle_used: None,
        });
    }

    // Link resolution happens in the catalog constructor, after every
    // package exists.
    PackageCatalog::new(packages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::book;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const ADDRESS_CSV: &str = "\
Street,City,State,Zip Code,Hub Dr,Oak St
Hub Dr,Salt Lake City,UT,84111,0.0,3.5
Oak St,Salt Lake City,UT,84115,3.5,0.0
";

    #[test]
    fn test_load_addresses() {
        let file = write_file(ADDRESS_CSV);
        let addresses = load_addresses(file.path()).unwrap();
        assert_eq!(addresses.len(), 2);
        assert_eq!(addresses.depot().unwrap().street, "Hub Dr");
        let oak = addresses.get("Oak St").unwrap();
        assert_eq!(oak.zip_code, "84115");
        assert_eq!(oak.distance_map_miles["Hub Dr"], 3.5);
        assert_eq!(oak.distance_map_miles["Oak St"], 0.0);
    }

    #[test]
    fn test_load_addresses_tolerates_utf8_bom() {
        let file = write_file("\u{feff}Street,City,State,Zip Code,Hub Dr\nHub Dr,SLC,UT,84111,0.0\n");
        let addresses = load_addresses(file.path()).unwrap();
        assert_eq!(addresses.depot().unwrap().street, "Hub Dr");
    }

    #[test]
    fn test_load_addresses_rejects_non_numeric_cell() {
        let file = write_file(
            "Street,City,State,Zip Code,Hub Dr\nHub Dr,SLC,UT,84111,three\n",
        );
        assert!(matches!(
            load_addresses(file.path()),
            Err(RoutingError::InputFormat(_))
        ));
    }

    #[test]
    fn test_load_addresses_rejects_duplicate_street_header() {
        let file = write_file(
            "Street,City,State,Zip Code,Hub Dr,Hub Dr\nHub Dr,SLC,UT,84111,0.0,0.0\n",
        );
        assert!(load_addresses(file.path()).is_err());
    }

    #[test]
    fn test_load_addresses_rejects_row_column_mismatch() {
        let file = write_file(
            "Street,City,State,Zip Code,Hub Dr,Oak St\nOak St,SLC,UT,84115,0.0,3.5\nHub Dr,SLC,UT,84111,3.5,0.0\n",
        );
        assert!(load_addresses(file.path()).is_err());
    }

    fn fixture_fleet(addresses: &AddressBook) -> Fleet {
        Fleet::with_shared_attributes(2, 18.0, 16, addresses).unwrap()
    }

    #[test]
    fn test_load_packages_two_pass_bundling() {
        let addresses = book(&[("Hub Dr", &[]), ("Oak St", &[])]);
        let fleet = fixture_fleet(&addresses);
        let file = write_file(
            "id,address,weight_kg,availability,deadline,vehicle_requirement,linked_packages\n\
             1,Oak St,2.5,09:05,10:30,2,\"2\"\n\
             2,Oak St,,,,,\n",
        );
        let catalog = load_packages(file.path(), &addresses, &fleet).unwrap();
        assert_eq!(catalog.len(), 2);

        let first = catalog.get(1).unwrap();
        assert_eq!(first.weight_kg, Some(2.5));
        assert_eq!(first.shipping_availability.unwrap().to_string(), "9:05:00 am");
        assert_eq!(first.delivery_deadline.unwrap().to_string(), "10:30:00 am");
        assert_eq!(first.vehicle_requirement, Some(2));
        assert_eq!(first.bundled_packages, vec![2]);

        let second = catalog.get(2).unwrap();
        assert!(second.weight_kg.is_none());
        assert!(second.shipping_availability.is_none());
        assert!(second.vehicle_requirement.is_none());
        assert!(second.bundled_packages.is_empty());
    }

    #[test]
    fn test_load_packages_rejects_unknown_references() {
        let addresses = book(&[("Hub Dr", &[]), ("Oak St", &[])]);
        let fleet = fixture_fleet(&addresses);

        let file = write_file(
            "id,address,weight_kg,availability,deadline,vehicle_requirement,linked_packages\n\
             1,Elm St,,,,,\n",
        );
        assert!(matches!(
            load_packages(file.path(), &addresses, &fleet),
            Err(RoutingError::Reference(_))
        ));

        let file = write_file(
            "id,address,weight_kg,availability,deadline,vehicle_requirement,linked_packages\n\
             1,Oak St,,,,9,\n",
        );
        assert!(matches!(
            load_packages(file.path(), &addresses, &fleet),
            Err(RoutingError::Reference(_))
        ));

        let file = write_file(
            "id,address,weight_kg,availability,deadline,vehicle_requirement,linked_packages\n\
             1,Oak St,,,,,8\n",
        );
        assert!(matches!(
            load_packages(file.path(), &addresses, &fleet),
            Err(RoutingError::Reference(_))
        ));
    }

    #[test]
    fn test_load_packages_rejects_unparseable_time() {
        let addresses = book(&[("Hub Dr", &[]), ("Oak St", &[])]);
        let fleet = fixture_fleet(&addresses);
        let file = write_file(
            "id,address,weight_kg,availability,deadline,vehicle_requirement,linked_packages\n\
             1,Oak St,,noon,,,\n",
        );
        assert!(matches!(
            load_packages(file.path(), &addresses, &fleet),
            Err(RoutingError::InputFormat(_))
        ));
    }
}
