//! Display order of loaded results: registry position first, then core index.

use crate::registry::HostRegistry;
use crate::results::ResultSet;

/// Anything that belongs to one core of one registered host.
pub trait HostRecord {
    fn hostname(&self) -> Option<&str>;

    /// Core the record was measured on. Records without one sort as core 0.
    fn core_index(&self) -> u64 {
        0
    }
}

impl HostRecord for ResultSet {
    fn hostname(&self) -> Option<&str> {
        ResultSet::hostname(self)
    }

    fn core_index(&self) -> u64 {
        self.experiment_core().unwrap_or(0)
    }
}

/// Order `records` by registry declaration order, then by ascending core
/// index within a host.
///
/// Records whose hostname is not in the registry are dropped; see
/// [`unmatched_hosts`] to find them. Ties keep their input order.
pub fn order_records<T, I>(registry: &HostRegistry, records: I) -> Vec<T>
where
    T: HostRecord,
    I: IntoIterator<Item = T>,
{
    let mut placed: Vec<(usize, u64, T)> = Vec::new();
    for record in records {
        let position = record.hostname().and_then(|h| registry.position(h));
        match position {
            Some(position) => {
                let core = record.core_index();
                placed.push((position, core, record));
            }
            None => {
                tracing::warn!(
                    hostname = record.hostname().unwrap_or("<none>"),
                    "dropping result set for host missing from registry"
                );
            }
        }
    }

    // stable: equal (host, core) keep input order
    placed.sort_by_key(|(position, core, _)| (*position, *core));
    placed.into_iter().map(|(_, _, record)| record).collect()
}

/// Order the result sets of one experiment output directory.
pub fn order_result_sets<I>(registry: &HostRegistry, sets: I) -> Vec<ResultSet>
where
    I: IntoIterator<Item = (String, ResultSet)>,
{
    order_records(registry, sets.into_iter().map(|(_, set)| set))
}

/// Hostnames (or `<none>`) of records the registry cannot place, sorted and
/// deduplicated.
pub fn unmatched_hosts<'a, T, I>(registry: &HostRegistry, records: I) -> Vec<String>
where
    T: HostRecord + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut unmatched: Vec<String> = records
        .into_iter()
        .filter(|r| !r.hostname().is_some_and(|h| registry.contains(h)))
        .map(|r| r.hostname().unwrap_or("<none>").to_string())
        .collect();
    unmatched.sort();
    unmatched.dedup();
    unmatched
}
