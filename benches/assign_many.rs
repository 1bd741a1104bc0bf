//! This bench simulates seating many children across a fleet of vehicles, in
//! memory and in a directory store, and reopening the resulting directory.

#![allow(missing_docs)]

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use school_roster::{
    DirectoryStore, MemoryStore, NewChild, NewVehicle, Roster, Store, domain::parse_name,
};
use tempfile::TempDir;

const VEHICLES: u32 = 20;
const SEATS: u16 = 30;

/// Registers the fleet and one child per seat, then seats every child.
fn seed<S: Store>(roster: &Roster<S>) {
    for v in 0..VEHICLES {
        let plate = format!("BUS{v:03}").parse().unwrap();
        roster
            .create_vehicle(NewVehicle {
                plate_number: plate,
                model: parse_name("Iveco Daily").unwrap(),
                capacity: SEATS,
            })
            .unwrap();
    }

    for n in 0..VEHICLES * u32::from(SEATS) {
        let national_id = format!("{}", 10_000_000 + n).parse().unwrap();
        let child = roster
            .create_child(NewChild {
                national_id,
                first_name: parse_name("Ana").unwrap(),
                last_name: parse_name("Gil").unwrap(),
                age: 9,
            })
            .unwrap();
        let plate = format!("BUS{:03}", n % VEHICLES).parse().unwrap();
        roster
            .assign_child_to_vehicle(child.national_id(), &plate)
            .unwrap();
    }
}

fn assign_many(c: &mut Criterion) {
    c.bench_function("assign many in memory", |b| {
        b.iter(|| seed(&Roster::new(MemoryStore::new())));
    });

    c.bench_function("assign many on disk", |b| {
        b.iter_batched(
            || {
                let tmp_dir = TempDir::new().unwrap();
                DirectoryStore::init(tmp_dir.path()).unwrap();
                tmp_dir
            },
            |tmp_dir| {
                let store = DirectoryStore::open(tmp_dir.path().to_path_buf()).unwrap();
                seed(&Roster::new(store));
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("reopen and audit", |b| {
        let tmp_dir = TempDir::new().unwrap();
        DirectoryStore::init(tmp_dir.path()).unwrap();
        seed(&Roster::new(
            DirectoryStore::open(tmp_dir.path().to_path_buf()).unwrap(),
        ));
        b.iter(|| {
            let roster = Roster::new(DirectoryStore::open(tmp_dir.path().to_path_buf()).unwrap());
            roster.audit().unwrap();
        });
    });
}

criterion_group!(benches, assign_many);
criterion_main!(benches);
