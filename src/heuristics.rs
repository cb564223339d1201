//! Sequencing heuristics.
//!
//! Every heuristic is a pure function from a slice of orders (plus travel
//! legs keyed by order id) to a permutation of indices into that slice.
//! Orders without legs, e.g. because their address never geocoded, are
//! ordered by priority wherever distance would otherwise decide.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::config::NearestNeighborWeights;
use crate::model::{DeliveryOrder, DistanceTable, Priority};

/// Cost of traversing a sequence edge by edge.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RouteCost {
    /// Sum of traffic-aware durations.
    pub travel_secs: f64,
    pub distance_meters: f64,
    /// Consecutive pairs with no known leg; they contribute nothing above.
    pub missing_edges: usize,
}

impl RouteCost {
    /// Fewer missing legs first, then shorter travel time.
    pub fn compare(&self, other: &RouteCost) -> Ordering {
        self.missing_edges
            .cmp(&other.missing_edges)
            .then(self.travel_secs.total_cmp(&other.travel_secs))
    }
}

fn by_priority(a: &DeliveryOrder, b: &DeliveryOrder) -> Ordering {
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then(a.created_at.cmp(&b.created_at))
}

/// Highest priority first, oldest first within a priority.
pub fn priority_only(orders: &[DeliveryOrder]) -> Vec<usize> {
    let mut sequence: Vec<usize> = (0..orders.len()).collect();
    sequence.sort_by(|&a, &b| by_priority(&orders[a], &orders[b]));
    sequence
}

/// Nearest neighbor inside each priority bucket; buckets never mix.
pub fn priority_with_distance(orders: &[DeliveryOrder], table: &DistanceTable) -> Vec<usize> {
    let ordered = priority_only(orders);
    let mut sequence = Vec::with_capacity(orders.len());

    for bucket in ordered.chunk_by(|&a, &b| orders[a].priority == orders[b].priority) {
        let mut remaining = bucket.to_vec();
        while !remaining.is_empty() {
            let pick = sequence
                .last()
                .and_then(|&current| nearest(orders, table, current, &remaining))
                .unwrap_or(0);
            sequence.push(remaining.remove(pick));
        }
    }

    sequence
}

/// Position in `candidates` of the closest candidate by traffic duration.
fn nearest(
    orders: &[DeliveryOrder],
    table: &DistanceTable,
    current: usize,
    candidates: &[usize],
) -> Option<usize> {
    let from = &orders[current].id;
    candidates
        .iter()
        .enumerate()
        .filter_map(|(pos, &candidate)| {
            table
                .get(from, &orders[candidate].id)
                .map(|leg| (pos, leg.traffic_duration()))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(pos, _)| pos)
}

/// Greedy sequencing that trades travel time against priority.
///
/// Starts at the most urgent, oldest order. Each step picks the candidate
/// minimizing `distance × travel_hours / max_travel_hours + priority ×
/// (4 - rank) / 3`, considering only candidates with a known leg from the
/// current stop. With no known leg the next order by priority is taken.
///
/// An order without a known leg from the current stop is therefore deferred
/// until every reachable candidate has been visited, whatever its priority.
pub fn weighted_nearest_neighbor(
    orders: &[DeliveryOrder],
    table: &DistanceTable,
    weights: NearestNeighborWeights,
) -> Vec<usize> {
    let mut remaining = priority_only(orders);
    if remaining.is_empty() {
        return remaining;
    }

    let mut sequence = Vec::with_capacity(orders.len());
    sequence.push(remaining.remove(0));

    while let Some(&current) = sequence.last() {
        if remaining.is_empty() {
            break;
        }
        let pick = best_weighted(orders, table, current, &remaining, weights).unwrap_or(0);
        sequence.push(remaining.remove(pick));
    }

    sequence
}

fn best_weighted(
    orders: &[DeliveryOrder],
    table: &DistanceTable,
    current: usize,
    candidates: &[usize],
    weights: NearestNeighborWeights,
) -> Option<usize> {
    let from = &orders[current].id;
    let scored = candidates
        .iter()
        .enumerate()
        .filter_map(|(pos, &candidate)| {
            table
                .get(from, &orders[candidate].id)
                .map(|leg| (pos, leg.traffic_duration() / 3600.0, orders[candidate].priority))
        })
        .collect::<Vec<_>>();

    let max_hours = scored.iter().map(|&(_, hours, _)| hours).fold(0.0, f64::max);
    let rank_span = f64::from(Priority::Urgent.rank() - Priority::Low.rank());

    scored
        .into_iter()
        .map(|(pos, hours, priority)| {
            let travel = if max_hours > 0.0 { hours / max_hours } else { 0.0 };
            let inverse_priority = f64::from(Priority::Urgent.rank() - priority.rank()) / rank_span;
            (pos, weights.distance * travel + weights.priority * inverse_priority)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(pos, _)| pos)
}

/// Runs the weighted heuristic once per weight pair and keeps the cheapest.
///
/// Restarts run in parallel; ties go to the earliest weight pair.
pub fn multi_start_nearest_neighbor(
    orders: &[DeliveryOrder],
    table: &DistanceTable,
    weight_sets: &[NearestNeighborWeights],
) -> Vec<usize> {
    if weight_sets.is_empty() {
        return weighted_nearest_neighbor(orders, table, NearestNeighborWeights::default());
    }

    let candidates = weight_sets
        .par_iter()
        .map(|&weights| {
            let sequence = weighted_nearest_neighbor(orders, table, weights);
            let cost = route_cost(orders, &sequence, table);
            (sequence, cost)
        })
        .collect::<Vec<_>>();

    candidates
        .into_iter()
        .min_by(|a, b| a.1.compare(&b.1))
        .map(|(sequence, _)| sequence)
        .unwrap_or_default()
}

/// Sums legs along `sequence`, counting the pairs with no known leg.
pub fn route_cost(
    orders: &[DeliveryOrder],
    sequence: &[usize],
    table: &DistanceTable,
) -> RouteCost {
    sequence
        .windows(2)
        .fold(RouteCost::default(), |mut cost, pair| {
            match table.get(&orders[pair[0]].id, &orders[pair[1]].id) {
                Some(leg) => {
                    cost.travel_secs += leg.traffic_duration();
                    cost.distance_meters += leg.distance_meters;
                }
                None => cost.missing_edges += 1,
            }
            cost
        })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::model::TravelLeg;

    fn order(id: &str, priority: Priority, minute: i64) -> DeliveryOrder {
        DeliveryOrder {
            id: id.to_string(),
            customer_name: String::new(),
            customer_phone: String::new(),
            address: String::new(),
            area: None,
            governorate: None,
            priority,
            created_at: DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minute),
            coordinates: None,
        }
    }

    fn ids(orders: &[DeliveryOrder], sequence: &[usize]) -> Vec<String> {
        sequence.iter().map(|&i| orders[i].id.clone()).collect()
    }

    #[test]
    fn test_priority_only_breaks_ties_by_age() {
        let orders = vec![
            order("late", Priority::High, 5),
            order("early", Priority::High, 1),
            order("low", Priority::Low, 0),
        ];
        assert_eq!(ids(&orders, &priority_only(&orders)), vec!["early", "late", "low"]);
    }

    #[test]
    fn test_route_cost_counts_missing_edges() {
        let orders = vec![
            order("a", Priority::Normal, 0),
            order("b", Priority::Normal, 1),
            order("c", Priority::Normal, 2),
        ];
        let mut table = DistanceTable::new();
        table.insert("a", "b", TravelLeg::new(500.0, 60.0).with_traffic(90.0));

        let cost = route_cost(&orders, &[0, 1, 2], &table);
        assert_eq!(cost.travel_secs, 90.0);
        assert_eq!(cost.distance_meters, 500.0);
        assert_eq!(cost.missing_edges, 1);
    }

    #[test]
    fn test_cost_ordering_prefers_complete_routes() {
        let complete = RouteCost {
            travel_secs: 1000.0,
            distance_meters: 0.0,
            missing_edges: 0,
        };
        let partial = RouteCost {
            travel_secs: 10.0,
            distance_meters: 0.0,
            missing_edges: 1,
        };
        assert_eq!(complete.compare(&partial), Ordering::Less);
    }

    #[test]
    fn test_empty_input() {
        let table = DistanceTable::new();
        assert!(
            weighted_nearest_neighbor(&[], &table, NearestNeighborWeights::default()).is_empty()
        );
        assert!(multi_start_nearest_neighbor(&[], &table, &[]).is_empty());
        assert!(priority_with_distance(&[], &table).is_empty());
    }
}
