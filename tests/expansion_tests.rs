//! End-to-end expansion tests over small synthetic networks.
//!
//! Junction fixtures place the decision node at the origin with traffic
//! arriving from the west, so a road leaving toward turn angle `a` sits
//! at compass position `a - 180` and the classified angle is exact up to
//! floating point.

use std::collections::HashSet;

use tempfile::tempdir;

use switchback::ebg::{EdgeExpander, EdgeLookupPaths, ExpansionOutput, OutputConfig, SpeedProfile};
use switchback::formats::edge_lookup::{read_penalties, read_segment_blocks};
use switchback::formats::original_edges::{read_all, OriginalEdgeData};
use switchback::formats::snapshot::NetworkSnapshot;
use switchback::geo::Coordinate;
use switchback::guidance::{DirectionModifier, TurnType};
use switchback::nbg::compressed::SegmentNode;
use switchback::nbg::restrictions::TurnRestriction;
use switchback::nbg::{
    EdgeData, InputEdge, NodeBasedGraph, NodeId, QueryNode, RoadClass, TravelMode,
    INVALID_EDGE_ID, INVALID_EDGE_WEIGHT,
};

const RADIUS: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
struct Road {
    u: NodeId,
    v: NodeId,
    distance: i32,
    name_id: u32,
    class: RoadClass,
    mode: TravelMode,
    oneway: bool,
    roundabout: bool,
}

#[derive(Default)]
struct NetworkBuilder {
    nodes: Vec<QueryNode>,
    roads: Vec<Road>,
    restrictions: Vec<TurnRestriction>,
    barrier_nodes: Vec<NodeId>,
    traffic_signals: Vec<NodeId>,
}

impl NetworkBuilder {
    fn new() -> Self {
        Self::default()
    }

    fn add_node(&mut self, lat: f64, lon: f64) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(QueryNode {
            coordinate: Coordinate::new(lat, lon),
            external_id: 1000 + id,
        });
        id
    }

    /// Node positioned so that leaving the origin toward it reads as turn
    /// angle `turn_angle` for traffic arriving from the west.
    fn add_node_at_angle(&mut self, turn_angle: f64) -> NodeId {
        let phi = (turn_angle - 180.0).to_radians();
        self.add_node(RADIUS * phi.sin(), RADIUS * phi.cos())
    }

    fn add_road(&mut self, u: NodeId, v: NodeId, name_id: u32, class: RoadClass) {
        self.roads.push(Road {
            u,
            v,
            distance: 10,
            name_id,
            class,
            mode: TravelMode::Driving,
            oneway: false,
            roundabout: false,
        });
    }

    fn add_custom_road(&mut self, road: Road) {
        self.roads.push(road);
    }

    fn snapshot(&self) -> NetworkSnapshot {
        let mut pairs: Vec<(InputEdge, Vec<SegmentNode>)> = Vec::new();
        for road in &self.roads {
            let data = |reversed: bool| EdgeData {
                edge_id: INVALID_EDGE_ID,
                reversed,
                distance: road.distance,
                name_id: road.name_id,
                road_class: road.class,
                travel_mode: road.mode,
                roundabout: road.roundabout,
                startpoint: true,
            };
            pairs.push((
                InputEdge {
                    source: road.u,
                    target: road.v,
                    data: data(false),
                },
                vec![SegmentNode {
                    node_id: road.v,
                    weight: road.distance,
                }],
            ));
            pairs.push((
                InputEdge {
                    source: road.v,
                    target: road.u,
                    data: data(road.oneway),
                },
                vec![SegmentNode {
                    node_id: road.u,
                    weight: road.distance,
                }],
            ));
        }
        pairs.sort_by_key(|(edge, _)| edge.source);

        let (edges, geometry) = pairs.into_iter().unzip();
        NetworkSnapshot {
            nodes: self.nodes.clone(),
            edges,
            geometry,
            restrictions: self.restrictions.clone(),
            barrier_nodes: self.barrier_nodes.clone(),
            traffic_signals: self.traffic_signals.clone(),
        }
    }
}

struct Expansion {
    output: ExpansionOutput,
    records: Vec<OriginalEdgeData>,
    graph: NodeBasedGraph,
}

impl Expansion {
    fn instruction(&self, u: NodeId, v: NodeId, w: NodeId) -> (TurnType, DirectionModifier) {
        let index = self.edge_index(u, v, w);
        let instruction = self.records[index].instruction;
        (instruction.kind, instruction.modifier)
    }

    fn edge_index(&self, u: NodeId, v: NodeId, w: NodeId) -> usize {
        let source = self.graph.edge_data(self.graph.find_edge(u, v).unwrap()).edge_id;
        let target = self.graph.edge_data(self.graph.find_edge(v, w).unwrap()).edge_id;
        self.output
            .edges
            .iter()
            .position(|edge| edge.source == source && edge.target == target)
            .unwrap_or_else(|| panic!("no expanded edge for turn {}->{}->{}", u, v, w))
    }

    fn has_turn(&self, u: NodeId, v: NodeId, w: NodeId) -> bool {
        let source = self.graph.edge_data(self.graph.find_edge(u, v).unwrap()).edge_id;
        let target = self.graph.edge_data(self.graph.find_edge(v, w).unwrap()).edge_id;
        self.output
            .edges
            .iter()
            .any(|edge| edge.source == source && edge.target == target)
    }
}

fn expand_with_profile(snapshot: NetworkSnapshot, profile: SpeedProfile) -> Expansion {
    let dir = tempdir().unwrap();
    let path = dir.path().join("original_edge_data.bin");

    let data = snapshot.into_network_data();
    let mut graph = data.graph;
    let expander = EdgeExpander::new(
        &mut graph,
        &data.geometry,
        &data.coordinates,
        &data.restrictions,
        &data.barrier_nodes,
        &data.traffic_signals,
        profile,
    );
    let output = expander
        .run(&OutputConfig {
            original_edge_data: path.clone(),
            edge_lookup: None,
        })
        .unwrap();
    let records = read_all(&path).unwrap();

    Expansion {
        output,
        records,
        graph,
    }
}

fn expand(snapshot: NetworkSnapshot) -> Expansion {
    expand_with_profile(
        snapshot,
        SpeedProfile {
            u_turn_penalty: 20,
            traffic_signal_penalty: 0,
        },
    )
}

/// Straight continuation on the same road stays quiet.
#[test]
fn test_straight_same_name_is_suppressed() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(178.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, w, 1, RoadClass::Primary);

    let expansion = expand(builder.snapshot());
    assert_eq!(
        expansion.instruction(u, v, w),
        (TurnType::Suppressed, DirectionModifier::Straight)
    );
}

/// T-junction at right angles announces end-of-road both ways.
#[test]
fn test_t_junction_end_of_road() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let right = builder.add_node_at_angle(88.0);
    let left = builder.add_node_at_angle(272.0);
    builder.add_road(u, v, 1, RoadClass::Secondary);
    builder.add_road(v, right, 2, RoadClass::Secondary);
    builder.add_road(v, left, 3, RoadClass::Secondary);

    let expansion = expand(builder.snapshot());
    assert_eq!(
        expansion.instruction(u, v, right),
        (TurnType::EndOfRoad, DirectionModifier::Right)
    );
    assert_eq!(
        expansion.instruction(u, v, left),
        (TurnType::EndOfRoad, DirectionModifier::Left)
    );
}

/// Y-fork on one road class becomes a fork with slight modifiers.
#[test]
fn test_y_fork() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let right = builder.add_node_at_angle(170.0);
    let left = builder.add_node_at_angle(190.0);
    builder.add_road(u, v, 1, RoadClass::Secondary);
    builder.add_road(v, right, 2, RoadClass::Secondary);
    builder.add_road(v, left, 3, RoadClass::Secondary);

    let expansion = expand(builder.snapshot());
    assert_eq!(
        expansion.instruction(u, v, right),
        (TurnType::Fork, DirectionModifier::SlightRight)
    );
    assert_eq!(
        expansion.instruction(u, v, left),
        (TurnType::Fork, DirectionModifier::SlightLeft)
    );
}

/// A no_-restriction drops exactly the restricted turn and counts it.
#[test]
fn test_no_turn_restriction() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let right = builder.add_node_at_angle(90.0);
    let straight = builder.add_node_at_angle(180.0);
    let left = builder.add_node_at_angle(270.0);
    builder.add_road(u, v, 1, RoadClass::Secondary);
    builder.add_road(v, right, 2, RoadClass::Secondary);
    builder.add_road(v, straight, 3, RoadClass::Secondary);
    builder.add_road(v, left, 4, RoadClass::Secondary);
    builder.restrictions.push(TurnRestriction {
        from: u,
        via: v,
        to: right,
        is_only: false,
    });

    let expansion = expand(builder.snapshot());
    assert!(!expansion.has_turn(u, v, right));
    assert!(expansion.has_turn(u, v, straight));
    assert!(expansion.has_turn(u, v, left));
    assert_eq!(expansion.output.stats.restricted_turns, 1);
    // one skipped u-turn per arm approaching the junction
    assert_eq!(expansion.output.stats.skipped_uturns, 4);
}

/// An only_-restriction pins the continuation and invalidates the rest.
#[test]
fn test_only_turn_restriction() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let right = builder.add_node_at_angle(90.0);
    let straight = builder.add_node_at_angle(180.0);
    let left = builder.add_node_at_angle(270.0);
    builder.add_road(u, v, 1, RoadClass::Secondary);
    builder.add_road(v, right, 2, RoadClass::Secondary);
    builder.add_road(v, straight, 3, RoadClass::Secondary);
    builder.add_road(v, left, 4, RoadClass::Secondary);
    builder.restrictions.push(TurnRestriction {
        from: u,
        via: v,
        to: straight,
        is_only: true,
    });

    let expansion = expand(builder.snapshot());
    assert!(expansion.has_turn(u, v, straight));
    assert!(!expansion.has_turn(u, v, right));
    assert!(!expansion.has_turn(u, v, left));
    assert!(!expansion.has_turn(u, v, u));
    // u-turn, right, and left all die at the only_-restriction
    assert_eq!(expansion.output.stats.restricted_turns, 3);
    assert_eq!(expansion.output.stats.skipped_uturns, 3);
}

/// Dead ends allow the u-turn and price it with the penalty.
#[test]
fn test_dead_end_u_turn() {
    let mut builder = NetworkBuilder::new();
    let u = builder.add_node(0.0, 0.0);
    let v = builder.add_node(0.0, RADIUS);
    builder.add_road(u, v, 1, RoadClass::Residential);

    let expansion = expand(builder.snapshot());
    assert_eq!(
        expansion.instruction(u, v, u),
        (TurnType::Turn, DirectionModifier::UTurn)
    );
    let index = expansion.edge_index(u, v, u);
    assert_eq!(expansion.output.edges[index].weight, 10 + 20);
    assert_eq!(expansion.output.stats.skipped_uturns, 0);
}

/// A ramp flowing into a through road announces a merge.
#[test]
fn test_ramp_merge() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(178.0);
    builder.add_road(u, v, 1, RoadClass::MotorwayLink);
    builder.add_road(v, w, 2, RoadClass::Motorway);

    let expansion = expand(builder.snapshot());
    assert_eq!(
        expansion.instruction(u, v, w),
        (TurnType::Merge, DirectionModifier::Straight)
    );
}

/// A ramp whose geometric angle buckets next to 0 keeps its u-turn
/// modifier and is priced as a turn-around even though its kind stays
/// `Ramp`.
#[test]
fn test_ramp_in_u_turn_bucket_gets_penalty() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let ramp = builder.add_node_at_angle(350.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, ramp, 2, RoadClass::MotorwayLink);

    let expansion = expand(builder.snapshot());
    // the reverse-edge u-turn is invalid here and pruned as a near
    // duplicate, leaving the ramp as the only candidate
    assert_eq!(
        expansion.instruction(u, v, ramp),
        (TurnType::Ramp, DirectionModifier::UTurn)
    );
    let index = expansion.edge_index(u, v, ramp);
    assert_eq!(expansion.output.edges[index].weight, 10 + 20);
}

/// A second u-turn-angle candidate next to the real turn-around is
/// relabeled sharp, regardless of its maneuver kind.
#[test]
fn test_second_u_turn_candidate_relabeled_sharp() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let ramp = builder.add_node_at_angle(350.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_custom_road(Road {
        u: v,
        v: ramp,
        distance: 10,
        name_id: 2,
        class: RoadClass::MotorwayLink,
        mode: TravelMode::Driving,
        oneway: true,
        roundabout: false,
    });

    let expansion = expand(builder.snapshot());
    // the oneway ramp leaves the junction with a single bidirectional
    // road, so the real u-turn stays valid alongside the ramp
    assert_eq!(
        expansion.instruction(u, v, u),
        (TurnType::Turn, DirectionModifier::UTurn)
    );
    let u_turn = expansion.edge_index(u, v, u);
    assert_eq!(expansion.output.edges[u_turn].weight, 10 + 20);

    let (_, modifier) = expansion.instruction(u, v, ramp);
    assert_eq!(modifier, DirectionModifier::SharpLeft);
    let ramp_edge = expansion.edge_index(u, v, ramp);
    assert_eq!(expansion.output.edges[ramp_edge].weight, 10);
}

/// Barriers block everything except the turn back.
#[test]
fn test_barrier_allows_only_u_turn() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(180.0);
    builder.add_road(u, v, 1, RoadClass::Secondary);
    builder.add_road(v, w, 1, RoadClass::Secondary);
    builder.barrier_nodes.push(v);

    let expansion = expand(builder.snapshot());
    assert!(!expansion.has_turn(u, v, w));
    assert!(expansion.has_turn(u, v, u));
    assert_eq!(expansion.output.stats.skipped_barrier_turns, 2);
    assert_eq!(
        expansion.instruction(u, v, u),
        (TurnType::Turn, DirectionModifier::UTurn)
    );
}

/// Entering a roundabout while another valid exit exists upgrades the
/// entry instruction to its at-exit variant.
#[test]
fn test_roundabout_entry_upgrade() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let x = builder.add_node_at_angle(90.0);
    let ring = builder.add_node_at_angle(210.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, x, 2, RoadClass::Primary);
    builder.add_custom_road(Road {
        u: v,
        v: ring,
        distance: 10,
        name_id: 3,
        class: RoadClass::Primary,
        mode: TravelMode::Driving,
        oneway: true,
        roundabout: true,
    });

    let expansion = expand(builder.snapshot());
    let (kind, _) = expansion.instruction(u, v, ring);
    assert_eq!(kind, TurnType::EnterRoundaboutAtExit);
    let (kind, modifier) = expansion.instruction(u, v, x);
    assert_eq!((kind, modifier), (TurnType::Turn, DirectionModifier::Right));
}

/// Staying on the ring and leaving it classify as remain/exit; a ring
/// node with a single continuation reads as no turn at all.
#[test]
fn test_roundabout_remain_and_exit() {
    let mut builder = NetworkBuilder::new();
    let v2 = builder.add_node(0.0, 0.0);
    let v1 = builder.add_node(0.0, -RADIUS);
    let v3 = builder.add_node_at_angle(225.0);
    let x = builder.add_node_at_angle(135.0);
    let ring_road = |u, v| Road {
        u,
        v,
        distance: 10,
        name_id: 9,
        class: RoadClass::Primary,
        mode: TravelMode::Driving,
        oneway: true,
        roundabout: true,
    };
    builder.add_custom_road(ring_road(v1, v2));
    builder.add_custom_road(ring_road(v2, v3));
    builder.add_custom_road(ring_road(v3, v1));
    builder.add_road(v2, x, 4, RoadClass::Primary);

    let expansion = expand(builder.snapshot());
    assert_eq!(
        expansion.instruction(v1, v2, v3),
        (TurnType::RemainRoundabout, DirectionModifier::Left)
    );
    assert_eq!(
        expansion.instruction(v1, v2, x),
        (TurnType::ExitRoundabout, DirectionModifier::Right)
    );
    // v3 has only one way out of the ring junction
    assert_eq!(expansion.instruction(v2, v3, v1).0, TurnType::NoTurn);
}

/// Two nearly straight turns claiming the same modifier get pushed apart.
#[test]
fn test_conflicting_straights_resolve_apart() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let right = builder.add_node_at_angle(175.0);
    let left = builder.add_node_at_angle(185.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, right, 2, RoadClass::Secondary);
    builder.add_road(v, left, 3, RoadClass::Secondary);

    let expansion = expand(builder.snapshot());
    let (_, modifier_right) = expansion.instruction(u, v, right);
    let (_, modifier_left) = expansion.instruction(u, v, left);
    assert_eq!(modifier_right, DirectionModifier::SlightRight);
    assert_eq!(modifier_left, DirectionModifier::SlightLeft);
}

/// A through road passing a minor side road is not announced.
#[test]
fn test_side_road_shortcut() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let side = builder.add_node_at_angle(90.0);
    let through = builder.add_node_at_angle(178.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, side, 2, RoadClass::Service);
    builder.add_road(v, through, 1, RoadClass::Primary);

    let expansion = expand(builder.snapshot());
    assert_eq!(expansion.instruction(u, v, through).0, TurnType::NoTurn);
}

/// A travel-mode change is always announced, same name or not.
#[test]
fn test_mode_change_is_announced() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(180.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_custom_road(Road {
        u: v,
        v: w,
        distance: 10,
        name_id: 1,
        class: RoadClass::Primary,
        mode: TravelMode::Ferry,
        oneway: false,
        roundabout: false,
    });

    let expansion = expand(builder.snapshot());
    let (kind, _) = expansion.instruction(u, v, w);
    assert_ne!(kind, TurnType::Suppressed);
    assert_ne!(kind, TurnType::NoTurn);
}

/// Renumbering gives every forward edge a unique id and leaves reversed
/// halves at the sentinel; weights line up with the id range.
#[test]
fn test_renumbering_bijection_and_weights() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(180.0);
    let r = builder.add_node_at_angle(90.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, w, 1, RoadClass::Primary);
    builder.add_custom_road(Road {
        u: v,
        v: r,
        distance: 10,
        name_id: 2,
        class: RoadClass::Primary,
        mode: TravelMode::Driving,
        oneway: true,
        roundabout: false,
    });

    let expansion = expand(builder.snapshot());
    let graph = &expansion.graph;

    let mut forward_ids = Vec::new();
    for node in 0..graph.num_nodes() {
        for edge in graph.edge_range(node) {
            let data = graph.edge_data(edge);
            if data.reversed {
                assert_eq!(data.edge_id, INVALID_EDGE_ID);
            } else {
                forward_ids.push(data.edge_id);
            }
        }
    }
    forward_ids.sort_unstable();
    let expected: Vec<u32> = (0..forward_ids.len() as u32).collect();
    assert_eq!(forward_ids, expected);
    assert_eq!(
        expansion.output.node_weights.len(),
        expansion.output.max_edge_id as usize + 1
    );

    // the oneway road has no reverse half, so its self-loop weight is out
    let oneway_id = graph.edge_data(graph.find_edge(v, r).unwrap()).edge_id;
    assert_eq!(expansion.output.node_weights[oneway_id as usize], INVALID_EDGE_WEIGHT);
}

/// Every expanded node references two distinct valid coordinates, and
/// the startpoint markers stay parallel.
#[test]
fn test_expanded_node_validity() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(180.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, w, 1, RoadClass::Primary);

    let expansion = expand(builder.snapshot());
    assert_eq!(expansion.output.nodes.len(), 2);
    assert_eq!(
        expansion.output.nodes.len(),
        expansion.output.node_is_startpoint.len()
    );
    for node in &expansion.output.nodes {
        assert_ne!(node.u, node.v);
    }
}

/// Serial ids equal emission order, the record stream matches the edge
/// list, and the length prefix matches both.
#[test]
fn test_deterministic_emission_and_prefix() {
    let make_snapshot = || {
        let mut builder = NetworkBuilder::new();
        let v = builder.add_node(0.0, 0.0);
        let u = builder.add_node(0.0, -RADIUS);
        let a = builder.add_node_at_angle(90.0);
        let b = builder.add_node_at_angle(200.0);
        builder.add_road(u, v, 1, RoadClass::Primary);
        builder.add_road(v, a, 2, RoadClass::Secondary);
        builder.add_road(v, b, 3, RoadClass::Secondary);
        builder.snapshot()
    };

    let first = expand(make_snapshot());
    let second = expand(make_snapshot());

    for (index, edge) in first.output.edges.iter().enumerate() {
        assert_eq!(edge.serial_id as usize, index);
        assert!(edge.forward);
        assert!(!edge.backward);
    }
    assert_eq!(first.output.edges, second.output.edges);
    assert_eq!(first.records, second.records);
    assert_eq!(
        first.records.len() as u64,
        first.output.stats.original_edges_written
    );
    assert_eq!(first.records.len(), first.output.edges.len());
}

/// Traffic signals add their penalty to every turn through the node.
#[test]
fn test_traffic_signal_penalty() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(180.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, w, 1, RoadClass::Primary);
    builder.traffic_signals.push(v);

    let expansion = expand_with_profile(
        builder.snapshot(),
        SpeedProfile {
            u_turn_penalty: 20,
            traffic_signal_penalty: 7,
        },
    );
    let index = expansion.edge_index(u, v, w);
    assert_eq!(expansion.output.edges[index].weight, 10 + 7);
}

/// The user turn-penalty callback shapes weights; a failing callback
/// counts as zero.
#[test]
fn test_turn_penalty_function() {
    let make_snapshot = || {
        let mut builder = NetworkBuilder::new();
        let v = builder.add_node(0.0, 0.0);
        let u = builder.add_node(0.0, -RADIUS);
        let w = builder.add_node_at_angle(90.0);
        builder.add_road(u, v, 1, RoadClass::Primary);
        builder.add_road(v, w, 2, RoadClass::Secondary);
        builder.snapshot()
    };

    let run = |penalty: Box<dyn Fn(f64) -> anyhow::Result<f64>>| {
        let dir = tempdir().unwrap();
        let data = make_snapshot().into_network_data();
        let mut graph = data.graph;
        let expander = EdgeExpander::new(
            &mut graph,
            &data.geometry,
            &data.coordinates,
            &data.restrictions,
            &data.barrier_nodes,
            &data.traffic_signals,
            SpeedProfile {
                u_turn_penalty: 20,
                traffic_signal_penalty: 0,
            },
        )
        .with_turn_penalty_function(penalty);
        let output = expander
            .run(&OutputConfig {
                original_edge_data: dir.path().join("oed.bin"),
                edge_lookup: None,
            })
            .unwrap();
        let graph_ref = graph;
        let source = graph_ref
            .edge_data(graph_ref.find_edge(1, 0).unwrap())
            .edge_id;
        output
            .edges
            .iter()
            .find(|edge| edge.source == source)
            .unwrap()
            .weight
    };

    // right turn at 90 degrees: deviation from straight is 90
    let weighted = run(Box::new(|deviation| Ok(deviation.abs())));
    assert_eq!(weighted, 10 + 90);

    let failing = run(Box::new(|_| anyhow::bail!("profile exploded")));
    assert_eq!(failing, 10);
}

/// The optional lookup streams carry one penalty and one segment block
/// per expanded edge.
#[test]
fn test_edge_lookup_streams() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(180.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, w, 1, RoadClass::Primary);
    builder.traffic_signals.push(v);

    let dir = tempdir().unwrap();
    let paths = EdgeLookupPaths {
        segments: dir.path().join("segments.bin"),
        penalties: dir.path().join("penalties.bin"),
    };
    let data = builder.snapshot().into_network_data();
    let mut graph = data.graph;
    let expander = EdgeExpander::new(
        &mut graph,
        &data.geometry,
        &data.coordinates,
        &data.restrictions,
        &data.barrier_nodes,
        &data.traffic_signals,
        SpeedProfile {
            u_turn_penalty: 20,
            traffic_signal_penalty: 7,
        },
    );
    let output = expander
        .run(&OutputConfig {
            original_edge_data: dir.path().join("oed.bin"),
            edge_lookup: Some(paths.clone()),
        })
        .unwrap();

    let penalties = read_penalties(&paths.penalties).unwrap();
    assert_eq!(penalties.len(), output.edges.len());
    for (edge, penalty) in output.edges.iter().zip(&penalties) {
        // weight minus the bare segment distance
        assert_eq!(edge.weight as u32 - 10, *penalty);
    }

    let blocks = read_segment_blocks(&paths.segments).unwrap();
    assert_eq!(blocks.len(), output.edges.len());
    for block in &blocks {
        assert_eq!(block.segments.len() + 1, 2);
        assert!(block.segments[0].1 > 0.0);
    }
}

/// Roads with intermediate geometry expand into one node per segment.
#[test]
fn test_intermediate_geometry_nodes() {
    let mut builder = NetworkBuilder::new();
    let u = builder.add_node(0.0, 0.0);
    let m = builder.add_node(0.0, RADIUS);
    let v = builder.add_node(0.0, 2.0 * RADIUS);
    // one road u-v through m, entered as explicit snapshot edges
    builder.add_road(u, v, 1, RoadClass::Primary);
    let mut snapshot = builder.snapshot();
    snapshot.geometry[0] = vec![
        SegmentNode { node_id: m, weight: 5 },
        SegmentNode { node_id: v, weight: 5 },
    ];
    snapshot.geometry[1] = vec![
        SegmentNode { node_id: m, weight: 5 },
        SegmentNode { node_id: u, weight: 5 },
    ];

    let expansion = expand(snapshot);
    assert_eq!(expansion.output.nodes.len(), 2);
    assert_eq!(expansion.output.nodes[0].u, u);
    assert_eq!(expansion.output.nodes[0].v, m);
    assert_eq!(expansion.output.nodes[0].segment_index, 0);
    assert_eq!(expansion.output.nodes[1].u, m);
    assert_eq!(expansion.output.nodes[1].v, v);
    assert_eq!(expansion.output.nodes[1].segment_index, 1);
}

/// Snapshot file round trip feeding a full expansion.
#[test]
fn test_snapshot_file_to_expansion() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let w = builder.add_node_at_angle(178.0);
    builder.add_road(u, v, 1, RoadClass::Primary);
    builder.add_road(v, w, 1, RoadClass::Primary);

    let dir = tempdir().unwrap();
    let path = dir.path().join("nbg.snapshot");
    builder.snapshot().write(&path).unwrap();
    let loaded = NetworkSnapshot::read(&path).unwrap();

    let expansion = expand(loaded);
    assert_eq!(
        expansion.instruction(u, v, w),
        (TurnType::Suppressed, DirectionModifier::Straight)
    );
}

/// No emitted turn may violate a restriction, and every invalidation is
/// counted exactly once.
#[test]
fn test_restrictions_never_emitted() {
    let mut builder = NetworkBuilder::new();
    let v = builder.add_node(0.0, 0.0);
    let u = builder.add_node(0.0, -RADIUS);
    let a = builder.add_node_at_angle(90.0);
    let b = builder.add_node_at_angle(180.0);
    let c = builder.add_node_at_angle(270.0);
    builder.add_road(u, v, 1, RoadClass::Secondary);
    builder.add_road(v, a, 2, RoadClass::Secondary);
    builder.add_road(v, b, 3, RoadClass::Secondary);
    builder.add_road(v, c, 4, RoadClass::Secondary);
    builder.restrictions.push(TurnRestriction {
        from: a,
        via: v,
        to: b,
        is_only: false,
    });
    builder.restrictions.push(TurnRestriction {
        from: u,
        via: v,
        to: c,
        is_only: false,
    });

    let expansion = expand(builder.snapshot());
    assert!(!expansion.has_turn(a, v, b));
    assert!(!expansion.has_turn(u, v, c));
    assert!(expansion.has_turn(a, v, c));
    assert!(expansion.has_turn(u, v, a));

    let stats = expansion.output.stats;
    assert_eq!(stats.restricted_turns, 2);

    // expanded edge targets are unique per source in this fixture
    let mut seen = HashSet::new();
    for edge in &expansion.output.edges {
        assert!(seen.insert((edge.source, edge.target)));
    }
}
