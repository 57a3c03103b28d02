use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{AllocationError, EngineResult};
use crate::models::{AllocationResult, ClassBucket, ClassSpec, StudentRecord};

/// Seed used when the caller does not pick one. Fixed so that re-running an
/// unchanged roster reproduces the same class lists.
pub const DEFAULT_SEED: u64 = 42;

/// Groups students by (grade, category) in key order, keeping roster order
/// inside each group.
pub fn stratify(students: &[StudentRecord]) -> BTreeMap<(String, String), Vec<StudentRecord>> {
    let mut groups: BTreeMap<(String, String), Vec<StudentRecord>> = BTreeMap::new();
    for student in students {
        let key = (
            student.grade.trim().to_string(),
            student.category.trim().to_string(),
        );
        groups.entry(key).or_default().push(student.clone());
    }
    groups
}

/// Deterministic permutation of one group. The generator is re-seeded per
/// group, so a group's order depends only on its own members and the seed.
pub fn shuffle_group(group: &mut [StudentRecord], seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    group.shuffle(&mut rng);
}

/// Spreads one level's students over its classes.
///
/// Every (grade, category) group is shuffled and then dealt round-robin,
/// with one cursor running across all groups of the level. Capacities are
/// only reported against; a full class is never skipped.
pub fn allocate(
    level: &str,
    students: &[StudentRecord],
    classes: &[ClassSpec],
    seed: u64,
) -> EngineResult<AllocationResult> {
    if classes.is_empty() {
        return Err(AllocationError::NoClasses {
            level: level.to_string(),
        });
    }

    let mut buckets: Vec<ClassBucket> = classes
        .iter()
        .map(|class| ClassBucket {
            name: class.name.clone(),
            capacity: class.capacity,
            students: Vec::new(),
        })
        .collect();

    let mut cursor = 0usize;
    for (_, mut group) in stratify(students) {
        shuffle_group(&mut group, seed);
        for student in group {
            buckets[cursor].students.push(student);
            cursor = (cursor + 1) % buckets.len();
        }
    }

    let capacity = classes.iter().map(|class| class.capacity as u64).sum();
    for bucket in &buckets {
        tracing::info!(
            level = %level,
            class = %bucket.name,
            headcount = bucket.headcount(),
            capacity = bucket.capacity,
            "class created"
        );
    }

    Ok(AllocationResult {
        level: level.to_string(),
        classes: buckets,
        demand: students.len(),
        capacity,
    })
}
