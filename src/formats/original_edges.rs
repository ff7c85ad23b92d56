//! original_edge_data stream: one record per emitted expanded edge.
//!
//! Layout: a `u32` record count, then `record_count` packed records of
//! `{geometry_position u32, name_id u32, turn_type u8, modifier u8,
//! travel_mode u8, pad u8}`, all little-endian. The count is written as
//! a placeholder up front and patched in place once the stream is done,
//! so records can be flushed in bounded batches while the run is still
//! going.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{ensure, Context, Result};

use crate::guidance::{DirectionModifier, TurnInstruction, TurnType};
use crate::nbg::TravelMode;

/// Buffered records are flushed beyond this many entries, bounding the
/// transient memory of a run.
pub const FLUSH_THRESHOLD: usize = 10 * 1024 * 1024;

pub const RECORD_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalEdgeData {
    pub geometry_position: u32,
    pub name_id: u32,
    pub instruction: TurnInstruction,
    pub travel_mode: TravelMode,
}

pub struct OriginalEdgeWriter {
    writer: BufWriter<File>,
    buffer: Vec<OriginalEdgeData>,
    records_written: u32,
}

impl OriginalEdgeWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = BufWriter::new(File::create(path)?);
        // placeholder, patched by finish()
        writer.write_all(&0u32.to_le_bytes())?;
        Ok(Self {
            writer,
            buffer: Vec::new(),
            records_written: 0,
        })
    }

    pub fn push(&mut self, record: OriginalEdgeData) -> Result<()> {
        self.records_written = self
            .records_written
            .checked_add(1)
            .context("more than u32::MAX original edge records")?;
        self.buffer.push(record);
        if self.buffer.len() > FLUSH_THRESHOLD {
            self.flush_buffer()?;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<()> {
        for record in &self.buffer {
            self.writer.write_all(&record.geometry_position.to_le_bytes())?;
            self.writer.write_all(&record.name_id.to_le_bytes())?;
            self.writer.write_all(&[
                record.instruction.kind.as_u8(),
                record.instruction.modifier.as_u8(),
                record.travel_mode.as_u8(),
                0u8,
            ])?;
        }
        self.buffer.clear();
        Ok(())
    }

    /// Flushes the remaining records, patches the length prefix, and
    /// closes the file. Returns the final record count.
    pub fn finish(mut self) -> Result<u32> {
        self.flush_buffer()?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&self.records_written.to_le_bytes())?;
        self.writer.flush()?;
        Ok(self.records_written)
    }
}

/// Reads a complete stream back; the consumer-side counterpart, also used
/// by the tests.
pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<OriginalEdgeData>> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut prefix = [0u8; 4];
    reader.read_exact(&mut prefix)?;
    let record_count = u32::from_le_bytes(prefix);

    let mut records = Vec::with_capacity(record_count as usize);
    for _ in 0..record_count {
        let mut record = [0u8; RECORD_SIZE];
        reader.read_exact(&mut record)?;

        let kind = TurnType::from_u8(record[8])
            .with_context(|| format!("unknown turn type {}", record[8]))?;
        let modifier = DirectionModifier::from_u8(record[9])
            .with_context(|| format!("unknown direction modifier {}", record[9]))?;
        let travel_mode = TravelMode::from_u8(record[10])
            .with_context(|| format!("unknown travel mode {}", record[10]))?;

        records.push(OriginalEdgeData {
            geometry_position: u32::from_le_bytes(record[0..4].try_into().unwrap()),
            name_id: u32::from_le_bytes(record[4..8].try_into().unwrap()),
            instruction: TurnInstruction::new(kind, modifier),
            travel_mode,
        });
    }

    let mut trailing = Vec::new();
    reader.read_to_end(&mut trailing)?;
    ensure!(
        trailing.is_empty(),
        "original edge data has {} trailing bytes",
        trailing.len()
    );

    Ok(records)
}
