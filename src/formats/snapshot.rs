//! nbg.snapshot: the input bundle handed over by the upstream extractor.
//!
//! Self-describing little-endian file with a 64-byte header, five record
//! sections, and a CRC-64 footer over everything before it. Edge records
//! must be sorted by source node; the directed edge index in file order
//! is the edge id every other section refers to.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use crc::{Crc, CRC_64_GO_ISO};

use crate::geo::Coordinate;
use crate::nbg::compressed::{CompressedEdgeContainer, SegmentNode};
use crate::nbg::restrictions::{RestrictionMap, TurnRestriction};
use crate::nbg::{
    EdgeData, InputEdge, NodeBasedGraph, NodeId, QueryNode, RoadClass, TravelMode,
    INVALID_EDGE_ID,
};

const MAGIC: u32 = 0x53574E42; // "SWNB"
const VERSION: u16 = 1;
const HEADER_SIZE: usize = 64;

const FLAG_REVERSED: u8 = 0b001;
const FLAG_ROUNDABOUT: u8 = 0b010;
const FLAG_STARTPOINT: u8 = 0b100;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

struct ChecksumWriter<W: Write> {
    inner: W,
    digest: crc::Digest<'static, u64>,
}

impl<W: Write> ChecksumWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.digest.update(bytes);
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        let checksum = self.digest.finalize();
        self.inner.write_all(&checksum.to_le_bytes())?;
        self.inner.flush()?;
        Ok(())
    }
}

struct ChecksumReader<R: Read> {
    inner: R,
    digest: crc::Digest<'static, u64>,
}

impl<R: Read> ChecksumReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            digest: CRC64.digest(),
        }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        self.inner.read_exact(&mut bytes)?;
        self.digest.update(&bytes);
        Ok(bytes)
    }

    fn take_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    fn take_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take::<4>()?))
    }

    fn take_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take::<8>()?))
    }

    fn verify_checksum(mut self) -> Result<()> {
        let computed = self.digest.finalize();
        let mut footer = [0u8; 8];
        self.inner.read_exact(&mut footer)?;
        let stored = u64::from_le_bytes(footer);
        ensure!(
            computed == stored,
            "CRC64 mismatch in nbg.snapshot: computed 0x{:016X}, stored 0x{:016X}",
            computed,
            stored
        );
        Ok(())
    }
}

/// In-memory form of the input bundle.
#[derive(Debug, Default)]
pub struct NetworkSnapshot {
    pub nodes: Vec<QueryNode>,
    /// Directed edges sorted by source node.
    pub edges: Vec<InputEdge>,
    /// Per-edge geometry, parallel to `edges`.
    pub geometry: Vec<Vec<SegmentNode>>,
    pub restrictions: Vec<TurnRestriction>,
    pub barrier_nodes: Vec<NodeId>,
    pub traffic_signals: Vec<NodeId>,
}

/// The expander's working set, assembled from a snapshot.
#[derive(Debug)]
pub struct NetworkData {
    pub graph: NodeBasedGraph,
    pub geometry: CompressedEdgeContainer,
    pub coordinates: Vec<QueryNode>,
    pub restrictions: RestrictionMap,
    pub barrier_nodes: HashSet<NodeId>,
    pub traffic_signals: HashSet<NodeId>,
}

impl NetworkSnapshot {
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        ensure!(
            self.edges.len() == self.geometry.len(),
            "geometry not parallel to edges"
        );
        ensure!(
            self.edges.windows(2).all(|w| w[0].source <= w[1].source),
            "edges not sorted by source node"
        );

        let mut writer = ChecksumWriter::new(BufWriter::new(File::create(path)?));

        writer.put(&MAGIC.to_le_bytes())?;
        writer.put(&VERSION.to_le_bytes())?;
        writer.put(&0u16.to_le_bytes())?;
        writer.put(&(self.nodes.len() as u32).to_le_bytes())?;
        writer.put(&(self.edges.len() as u32).to_le_bytes())?;
        writer.put(&(self.restrictions.len() as u32).to_le_bytes())?;
        writer.put(&(self.barrier_nodes.len() as u32).to_le_bytes())?;
        writer.put(&(self.traffic_signals.len() as u32).to_le_bytes())?;
        writer.put(&[0u8; HEADER_SIZE - 28])?;

        for node in &self.nodes {
            writer.put(&node.coordinate.lat.to_le_bytes())?;
            writer.put(&node.coordinate.lon.to_le_bytes())?;
            writer.put(&node.external_id.to_le_bytes())?;
        }

        for edge in &self.edges {
            let mut flags = 0u8;
            if edge.data.reversed {
                flags |= FLAG_REVERSED;
            }
            if edge.data.roundabout {
                flags |= FLAG_ROUNDABOUT;
            }
            if edge.data.startpoint {
                flags |= FLAG_STARTPOINT;
            }

            writer.put(&edge.source.to_le_bytes())?;
            writer.put(&edge.target.to_le_bytes())?;
            writer.put(&edge.data.distance.to_le_bytes())?;
            writer.put(&edge.data.name_id.to_le_bytes())?;
            writer.put(&[
                edge.data.road_class.as_u8(),
                edge.data.travel_mode.as_u8(),
                flags,
                0u8,
            ])?;
        }

        for geometry in &self.geometry {
            writer.put(&(geometry.len() as u32).to_le_bytes())?;
            for segment in geometry {
                writer.put(&segment.node_id.to_le_bytes())?;
                writer.put(&segment.weight.to_le_bytes())?;
            }
        }

        for restriction in &self.restrictions {
            writer.put(&restriction.from.to_le_bytes())?;
            writer.put(&restriction.via.to_le_bytes())?;
            writer.put(&restriction.to.to_le_bytes())?;
            writer.put(&[restriction.is_only as u8, 0, 0, 0])?;
        }

        for node in &self.barrier_nodes {
            writer.put(&node.to_le_bytes())?;
        }
        for node in &self.traffic_signals {
            writer.put(&node.to_le_bytes())?;
        }

        writer.finish()
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = ChecksumReader::new(BufReader::new(
            File::open(&path).with_context(|| {
                format!("opening snapshot {}", path.as_ref().display())
            })?,
        ));

        let magic = reader.take_u32()?;
        ensure!(magic == MAGIC, "not a nbg.snapshot file (magic 0x{:08X})", magic);
        let version = u16::from_le_bytes(reader.take::<2>()?);
        ensure!(version == VERSION, "unsupported snapshot version {}", version);
        reader.take::<2>()?;

        let node_count = reader.take_u32()?;
        let edge_count = reader.take_u32()?;
        let restriction_count = reader.take_u32()?;
        let barrier_count = reader.take_u32()?;
        let signal_count = reader.take_u32()?;
        reader.take::<{ HEADER_SIZE - 28 }>()?;

        let mut nodes = Vec::with_capacity(node_count as usize);
        for _ in 0..node_count {
            let lat = reader.take_f64()?;
            let lon = reader.take_f64()?;
            let external_id = reader.take_u32()?;
            nodes.push(QueryNode {
                coordinate: Coordinate::new(lat, lon),
                external_id,
            });
        }

        let mut edges = Vec::with_capacity(edge_count as usize);
        let mut previous_source = 0;
        for index in 0..edge_count {
            let source = reader.take_u32()?;
            let target = reader.take_u32()?;
            let distance = reader.take_i32()?;
            let name_id = reader.take_u32()?;
            let [road_class, travel_mode, flags, _pad] = reader.take::<4>()?;

            ensure!(
                source < node_count && target < node_count,
                "edge {} references a node out of range",
                index
            );
            ensure!(
                source >= previous_source,
                "edge records not sorted by source node"
            );
            previous_source = source;

            let road_class = RoadClass::from_u8(road_class)
                .with_context(|| format!("unknown road class {}", road_class))?;
            let travel_mode = TravelMode::from_u8(travel_mode)
                .with_context(|| format!("unknown travel mode {}", travel_mode))?;

            edges.push(InputEdge {
                source,
                target,
                data: EdgeData {
                    edge_id: INVALID_EDGE_ID,
                    reversed: flags & FLAG_REVERSED != 0,
                    distance,
                    name_id,
                    road_class,
                    travel_mode,
                    roundabout: flags & FLAG_ROUNDABOUT != 0,
                    startpoint: flags & FLAG_STARTPOINT != 0,
                },
            });
        }

        let mut geometry = Vec::with_capacity(edge_count as usize);
        for index in 0..edge_count {
            let segment_count = reader.take_u32()?;
            if segment_count == 0 {
                bail!("edge {} has empty geometry", index);
            }
            let mut segments = Vec::with_capacity(segment_count as usize);
            for _ in 0..segment_count {
                let node_id = reader.take_u32()?;
                let weight = reader.take_i32()?;
                segments.push(SegmentNode { node_id, weight });
            }
            geometry.push(segments);
        }

        let mut restrictions = Vec::with_capacity(restriction_count as usize);
        for _ in 0..restriction_count {
            let from = reader.take_u32()?;
            let via = reader.take_u32()?;
            let to = reader.take_u32()?;
            let [is_only, _, _, _] = reader.take::<4>()?;
            restrictions.push(TurnRestriction {
                from,
                via,
                to,
                is_only: is_only != 0,
            });
        }

        let mut barrier_nodes = Vec::with_capacity(barrier_count as usize);
        for _ in 0..barrier_count {
            barrier_nodes.push(reader.take_u32()?);
        }
        let mut traffic_signals = Vec::with_capacity(signal_count as usize);
        for _ in 0..signal_count {
            traffic_signals.push(reader.take_u32()?);
        }

        reader.verify_checksum()?;

        Ok(Self {
            nodes,
            edges,
            geometry,
            restrictions,
            barrier_nodes,
            traffic_signals,
        })
    }

    /// Builds the expander's working set. Edge ids of the constructed
    /// graph equal the file-order indices because records are sorted by
    /// source and the construction is stable.
    pub fn into_network_data(self) -> NetworkData {
        let node_count = self.nodes.len() as u32;
        let graph = NodeBasedGraph::from_edges(node_count, &self.edges);

        let mut geometry = CompressedEdgeContainer::new();
        for (index, segments) in self.geometry.into_iter().enumerate() {
            geometry.insert(index as u32, segments);
        }

        NetworkData {
            graph,
            geometry,
            coordinates: self.nodes,
            restrictions: RestrictionMap::from_restrictions(&self.restrictions),
            barrier_nodes: self.barrier_nodes.into_iter().collect(),
            traffic_signals: self.traffic_signals.into_iter().collect(),
        }
    }
}
