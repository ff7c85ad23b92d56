//! Optional edge lookup streams.
//!
//! For every emitted expanded edge the segment file carries the node
//! chain its weight was computed from: `node_count u32`, the first
//! external node id, then per following node `{node_id u32,
//! segment_length f64, segment_weight u32}`. The penalty file carries one
//! `u32` per expanded edge: its weight minus the bare segment distance.
//! External programs use the pair to patch expanded-edge weights without
//! re-running the expansion.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::geo::great_circle_distance;
use crate::nbg::compressed::SegmentNode;
use crate::nbg::{NodeId, QueryNode};

#[derive(Debug, Clone)]
pub struct EdgeLookupPaths {
    pub segments: PathBuf,
    pub penalties: PathBuf,
}

pub struct EdgeLookupWriter {
    segment_writer: BufWriter<File>,
    penalty_writer: BufWriter<File>,
}

impl EdgeLookupWriter {
    pub fn create(paths: &EdgeLookupPaths) -> Result<Self> {
        Ok(Self {
            segment_writer: BufWriter::new(File::create(&paths.segments)?),
            penalty_writer: BufWriter::new(File::create(&paths.penalties)?),
        })
    }

    pub fn write_penalty(&mut self, fixed_penalty: u32) -> Result<()> {
        self.penalty_writer.write_all(&fixed_penalty.to_le_bytes())?;
        Ok(())
    }

    /// Writes the node chain of one source edge, with great-circle length
    /// and stored weight per segment.
    pub fn write_segments(
        &mut self,
        from_node: NodeId,
        geometry: &[SegmentNode],
        coordinates: &[QueryNode],
    ) -> Result<()> {
        let node_count = geometry.len() as u32 + 1;
        self.segment_writer.write_all(&node_count.to_le_bytes())?;

        let first = &coordinates[from_node as usize];
        self.segment_writer.write_all(&first.external_id.to_le_bytes())?;

        let mut previous = from_node;
        for segment in geometry {
            let from = coordinates[previous as usize];
            let to = coordinates[segment.node_id as usize];
            let segment_length = great_circle_distance(from.coordinate, to.coordinate);

            self.segment_writer.write_all(&to.external_id.to_le_bytes())?;
            self.segment_writer.write_all(&segment_length.to_le_bytes())?;
            self.segment_writer
                .write_all(&(segment.weight as u32).to_le_bytes())?;
            previous = segment.node_id;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<()> {
        self.segment_writer.flush()?;
        self.penalty_writer.flush()?;
        Ok(())
    }
}

/// One decoded segment block of the lookup file.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentBlock {
    pub first_node: u32,
    pub segments: Vec<(u32, f64, u32)>,
}

/// Consumer-side reader for the segment file, used by the tests.
pub fn read_segment_blocks<P: AsRef<Path>>(path: P) -> Result<Vec<SegmentBlock>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut blocks = Vec::new();

    let mut count_bytes = [0u8; 4];
    loop {
        match reader.read_exact(&mut count_bytes) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(error) => return Err(error.into()),
        }
        let node_count = u32::from_le_bytes(count_bytes);

        let mut id_bytes = [0u8; 4];
        reader.read_exact(&mut id_bytes)?;
        let first_node = u32::from_le_bytes(id_bytes);

        let mut segments = Vec::with_capacity(node_count as usize - 1);
        for _ in 1..node_count {
            let mut record = [0u8; 16];
            reader.read_exact(&mut record)?;
            segments.push((
                u32::from_le_bytes(record[0..4].try_into().unwrap()),
                f64::from_le_bytes(record[4..12].try_into().unwrap()),
                u32::from_le_bytes(record[12..16].try_into().unwrap()),
            ));
        }
        blocks.push(SegmentBlock { first_node, segments });
    }

    Ok(blocks)
}

/// Consumer-side reader for the penalty file.
pub fn read_penalties<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let bytes = std::fs::read(path)?;
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes(chunk.try_into().unwrap()))
        .collect())
}
