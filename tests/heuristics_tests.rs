//! Sequencing heuristics on hand-built travel tables.

mod fixtures;

use std::collections::HashSet;

use fixtures::{ManhattanMatrix, TestOrder, ids, located, order};
use route_optimizer::config::NearestNeighborWeights;
use route_optimizer::heuristics::{
    multi_start_nearest_neighbor, priority_only, priority_with_distance, route_cost,
    weighted_nearest_neighbor,
};
use route_optimizer::model::{DeliveryOrder, DistanceTable, Priority};

// ============================================================================
// Test Fixtures
// ============================================================================

/// All pairwise legs between orders that carry coordinates.
fn table_for(orders: &[DeliveryOrder], traffic: bool) -> DistanceTable {
    let mut table = DistanceTable::new();
    for from in orders {
        for to in orders {
            if from.id == to.id {
                continue;
            }
            if let (Some(a), Some(b)) = (&from.coordinates, &to.coordinates) {
                table.insert(
                    from.id.clone(),
                    to.id.clone(),
                    ManhattanMatrix::leg(a.lat_lng(), b.lat_lng(), traffic),
                );
            }
        }
    }
    table
}

fn is_permutation(sequence: &[usize], len: usize) -> bool {
    sequence.len() == len && sequence.iter().copied().collect::<HashSet<_>>().len() == len
}

// ============================================================================
// Priority ordering
// ============================================================================

#[test]
fn test_priority_only_orders_by_rank_then_age() {
    let orders = vec![
        order("A", Priority::Low, 1),
        order("B", Priority::Urgent, 2),
        order("C", Priority::Normal, 3),
    ];

    assert_eq!(ids(&orders, &priority_only(&orders)), ["B", "C", "A"]);
}

#[test]
fn test_priority_only_breaks_ties_by_creation_time() {
    let orders = vec![
        order("late", Priority::High, 30),
        order("early", Priority::High, 5),
        order("urgent", Priority::Urgent, 60),
    ];

    assert_eq!(ids(&orders, &priority_only(&orders)), ["urgent", "early", "late"]);
}

#[test]
fn test_priority_with_distance_never_mixes_buckets() {
    // The normal order sits right next to the first urgent one; a pure
    // distance heuristic would visit it second.
    let orders = vec![
        located("U1", Priority::Urgent, 0, 0.0, 0.0),
        located("N1", Priority::Normal, 1, 0.0, 1.0),
        located("U2", Priority::Urgent, 2, 9.0, 9.0),
        located("U3", Priority::Urgent, 3, 5.0, 5.0),
    ];
    let table = table_for(&orders, false);

    let sequence = ids(&orders, &priority_with_distance(&orders, &table));

    assert_eq!(sequence, ["U1", "U3", "U2", "N1"]);
}

#[test]
fn test_priority_with_distance_without_legs_keeps_priority_order() {
    let orders = vec![
        order("A", Priority::Low, 1),
        order("B", Priority::High, 2),
        order("C", Priority::High, 0),
    ];

    let sequence = priority_with_distance(&orders, &DistanceTable::new());

    assert_eq!(ids(&orders, &sequence), ["C", "B", "A"]);
}

// ============================================================================
// Weighted nearest neighbor
// ============================================================================

#[test]
fn test_weighted_starts_at_most_urgent_and_follows_distance() {
    let orders = vec![
        located("far", Priority::Normal, 0, 0.0, 10.0),
        located("start", Priority::Urgent, 1, 0.0, 0.0),
        located("near", Priority::Normal, 2, 0.0, 1.0),
        located("mid", Priority::Normal, 3, 0.0, 4.0),
    ];
    let table = table_for(&orders, false);

    let sequence = weighted_nearest_neighbor(&orders, &table, NearestNeighborWeights::default());

    assert_eq!(ids(&orders, &sequence), ["start", "near", "mid", "far"]);
}

#[test]
fn test_weighted_priority_weight_can_outweigh_distance() {
    let orders = vec![
        located("start", Priority::Urgent, 0, 0.0, 0.0),
        located("close_low", Priority::Low, 1, 0.0, 1.0),
        located("far_high", Priority::High, 2, 0.0, 3.0),
    ];
    let table = table_for(&orders, false);

    let by_distance =
        weighted_nearest_neighbor(&orders, &table, NearestNeighborWeights::new(0.9, 0.1));
    let by_priority =
        weighted_nearest_neighbor(&orders, &table, NearestNeighborWeights::new(0.1, 0.9));

    assert_eq!(ids(&orders, &by_distance), ["start", "close_low", "far_high"]);
    assert_eq!(ids(&orders, &by_priority), ["start", "far_high", "close_low"]);
}

#[test]
fn test_weighted_survives_partial_table() {
    let orders = vec![
        located("A", Priority::Urgent, 0, 0.0, 0.0),
        located("B", Priority::High, 1, 0.0, 2.0),
        order("C", Priority::Normal, 2),
        located("D", Priority::Low, 3, 0.0, 1.0),
        order("E", Priority::Normal, 4),
    ];
    let table = table_for(&orders, true);

    let sequence = weighted_nearest_neighbor(&orders, &table, NearestNeighborWeights::default());

    assert!(is_permutation(&sequence, orders.len()));
    assert_eq!(orders[sequence[0]].id, "A");
    let cost = route_cost(&orders, &sequence, &table);
    assert!(cost.missing_edges >= 1);
}

#[test]
fn test_weighted_defers_unreachable_orders_regardless_of_priority() {
    let orders = vec![
        located("A", Priority::Urgent, 0, 0.0, 0.0),
        order("H", Priority::High, 1),
        located("L", Priority::Low, 2, 0.0, 1.0),
    ];
    let table = table_for(&orders, false);

    let sequence = weighted_nearest_neighbor(&orders, &table, NearestNeighborWeights::default());

    assert_eq!(ids(&orders, &sequence), ["A", "L", "H"]);
}

#[test]
fn test_weighted_with_empty_table_is_priority_order() {
    let orders = vec![
        order("A", Priority::Low, 1),
        order("B", Priority::Urgent, 2),
        order("C", Priority::Normal, 3),
    ];

    let sequence = weighted_nearest_neighbor(
        &orders,
        &DistanceTable::new(),
        NearestNeighborWeights::default(),
    );

    assert_eq!(sequence, priority_only(&orders));
}

// ============================================================================
// Multi-start
// ============================================================================

#[test]
fn test_multi_start_is_no_worse_than_any_single_run() {
    let coords = [
        (0.0, 0.0),
        (3.0, 1.0),
        (1.0, 4.0),
        (6.0, 2.0),
        (2.0, 2.0),
        (5.0, 5.0),
        (0.0, 7.0),
        (4.0, 0.0),
        (7.0, 6.0),
        (1.0, 1.0),
        (6.0, 0.0),
        (3.0, 6.0),
    ];
    let priorities = [Priority::Low, Priority::Normal, Priority::High, Priority::Urgent];
    let orders = coords
        .iter()
        .enumerate()
        .map(|(i, &(lat, lng))| {
            TestOrder::new(&format!("O{i}"))
                .priority(priorities[i % priorities.len()])
                .created(i as i64)
                .at(lat, lng)
                .build()
        })
        .collect::<Vec<_>>();
    let table = table_for(&orders, true);
    let weight_sets = [
        NearestNeighborWeights::new(0.7, 0.3),
        NearestNeighborWeights::new(0.5, 0.5),
        NearestNeighborWeights::new(0.9, 0.1),
        NearestNeighborWeights::new(0.3, 0.7),
    ];

    let best = multi_start_nearest_neighbor(&orders, &table, &weight_sets);
    let best_cost = route_cost(&orders, &best, &table);

    assert!(is_permutation(&best, orders.len()));
    assert_eq!(best_cost.missing_edges, 0);
    for weights in weight_sets {
        let single = weighted_nearest_neighbor(&orders, &table, weights);
        let cost = route_cost(&orders, &single, &table);
        assert!(best_cost.travel_secs <= cost.travel_secs);
    }
}

#[test]
fn test_multi_start_without_weights_uses_default_pair() {
    let orders = vec![
        located("A", Priority::Urgent, 0, 0.0, 0.0),
        located("B", Priority::Low, 1, 0.0, 5.0),
        located("C", Priority::Normal, 2, 0.0, 1.0),
    ];
    let table = table_for(&orders, false);

    assert_eq!(
        multi_start_nearest_neighbor(&orders, &table, &[]),
        weighted_nearest_neighbor(&orders, &table, NearestNeighborWeights::default())
    );
}

#[test]
fn test_route_cost_uses_traffic_durations() {
    let orders = vec![
        TestOrder::new("A").at(0.0, 0.0).build(),
        TestOrder::new("B").at(0.0, 2.0).build(),
        TestOrder::new("C").at(1.0, 2.0).build(),
    ];
    let table = table_for(&orders, true);

    let cost = route_cost(&orders, &[0, 1, 2], &table);

    assert_eq!(cost.travel_secs, 3.0 * 90.0);
    assert_eq!(cost.distance_meters, 3000.0);
    assert_eq!(cost.missing_edges, 0);
}
