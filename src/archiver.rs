//! Binary archiver: a flat, versioned dump of a model graph's topology and
//! per-model construction parameters. Not a full engine snapshot — queues'
//! pending jobs, counters' running totals and similar in-flight state are
//! not captured, only what's needed to rebuild an equivalent, freshly
//! initialized [`SimInit`]. All integers are little-endian.
//!
//! Stream layout:
//!
//! ```text
//! [8-byte magic][4-byte version][4 bytes reserved]   16-byte header
//! [u32 model count]
//!   per model: [u8 kind tag][u8 input count][u8 output count]
//!              [u8 param count][param count * f64 params]
//! [u32 connection count]
//!   per connection: [u32 src model][u8 src port][u32 dst model][u8 dst port]
//! ```

use std::convert::TryInto;

use crate::error::{IoError, TopologyError};
use crate::model::{ModelId, ModelKind, ModelRecord};
use crate::simulation::SimInit;

const MAGIC: &[u8; 8] = b"IRQDEVS1";
const VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

/// Serializes every model and connection currently in `builder` to a byte
/// stream. Observers and sources are left out: they describe how a running
/// simulation is watched or fed, not the model graph itself.
pub fn write_model_graph(builder: &SimInit) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);

    let ids = builder.model_ids();
    out.extend_from_slice(&(ids.len() as u32).to_le_bytes());
    for &id in &ids {
        let record = builder.model(id).expect("id came from model_ids()");
        write_model(&mut out, record);
    }

    let connections = builder.connections();
    out.extend_from_slice(&(connections.len() as u32).to_le_bytes());
    for (src_model, src_port, dst_model, dst_port) in connections {
        out.extend_from_slice(&src_model.index().to_le_bytes());
        out.push(src_port);
        out.extend_from_slice(&dst_model.index().to_le_bytes());
        out.push(dst_port);
    }
    out
}

fn write_model(out: &mut Vec<u8>, record: &ModelRecord) {
    out.push(record.kind.archive_tag());
    out.push(record.inputs.len() as u8);
    out.push(record.outputs.len() as u8);
    let params = record.kind.archive_params();
    out.push(params.len() as u8);
    for p in params {
        out.extend_from_slice(&p.to_le_bytes());
    }
}

/// Rebuilds a [`SimInit`] from bytes previously produced by
/// [`write_model_graph`]. Model ids are reassigned in the order they were
/// written, so a connection's `src_model`/`dst_model` indices must refer to
/// that same position, not the handle the original builder happened to
/// allocate.
pub fn read_model_graph(bytes: &[u8]) -> Result<SimInit, IoError> {
    if bytes.len() < HEADER_LEN {
        return Err(IoError::Header("archive shorter than its header".to_string()));
    }
    if &bytes[0..8] != MAGIC {
        return Err(IoError::Header("bad magic".to_string()));
    }
    let version = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    if version != VERSION {
        return Err(IoError::Header(format!("unsupported archive version {version}")));
    }

    let mut cursor = HEADER_LEN;
    let model_count = read_u32(bytes, &mut cursor)?;
    let mut builder = SimInit::new();
    let mut ids: Vec<ModelId> = Vec::with_capacity(model_count as usize);

    for _ in 0..model_count {
        let tag = read_u8(bytes, &mut cursor)?;
        let input_count = read_u8(bytes, &mut cursor)? as usize;
        let output_count = read_u8(bytes, &mut cursor)? as usize;
        let param_count = read_u8(bytes, &mut cursor)? as usize;
        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            params.push(read_f64(bytes, &mut cursor)?);
        }
        let kind = ModelKind::from_archive(tag, input_count, &params)?;
        ids.push(builder.add_model(ModelRecord::new(kind, input_count, output_count)));
    }

    let connection_count = read_u32(bytes, &mut cursor)?;
    for _ in 0..connection_count {
        let src_index = read_u32(bytes, &mut cursor)?;
        let src_port = read_u8(bytes, &mut cursor)?;
        let dst_index = read_u32(bytes, &mut cursor)?;
        let dst_port = read_u8(bytes, &mut cursor)?;

        let src = *ids
            .get(src_index as usize)
            .ok_or(IoError::Format(format!("connection references unknown model {src_index}")))?;
        let dst = *ids
            .get(dst_index as usize)
            .ok_or(IoError::Format(format!("connection references unknown model {dst_index}")))?;
        builder
            .connect(src, src_port, dst, dst_port)
            .map_err(|_| IoError::Format(format!("invalid connection {src_index}:{src_port} -> {dst_index}:{dst_port}")))?;
    }

    Ok(builder)
}

fn read_u8(bytes: &[u8], cursor: &mut usize) -> Result<u8, IoError> {
    let byte = *bytes
        .get(*cursor)
        .ok_or_else(|| IoError::Format("unexpected end of archive".to_string()))?;
    *cursor += 1;
    Ok(byte)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, IoError> {
    let slice = bytes
        .get(*cursor..*cursor + 4)
        .ok_or_else(|| IoError::Format("unexpected end of archive".to_string()))?;
    *cursor += 4;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_f64(bytes: &[u8], cursor: &mut usize) -> Result<f64, IoError> {
    let slice = bytes
        .get(*cursor..*cursor + 8)
        .ok_or_else(|| IoError::Format("unexpected end of archive".to_string()))?;
    *cursor += 8;
    Ok(f64::from_le_bytes(slice.try_into().unwrap()))
}

/// Maps an out-of-range model index found while replaying connections to
/// the topology error the rest of the crate uses for the same condition.
pub fn unknown_model_error(index: u32) -> TopologyError {
    TopologyError::UnknownModel(index)
}

/// Maps an out-of-range port index found while replaying connections to the
/// topology error the rest of the crate uses for the same condition.
pub fn unknown_model_port_error(model: u32, port: u8) -> TopologyError {
    TopologyError::UnknownModelPort { model, port }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generator::{Constant, Counter};

    #[test]
    fn header_is_rejected_when_magic_does_not_match() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[0..8].copy_from_slice(b"NOTQDEVS");
        assert!(matches!(read_model_graph(&bytes), Err(IoError::Header(_))));
    }

    #[test]
    fn truncated_archive_is_a_format_error_not_a_panic() {
        let mut builder = SimInit::new();
        builder.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(1.0)), 0, 1));
        let bytes = write_model_graph(&builder);
        let truncated = &bytes[..bytes.len() - 3];
        assert!(matches!(read_model_graph(truncated), Err(IoError::Format(_))));
    }

    #[test]
    fn round_trips_a_constant_feeding_a_counter() {
        let mut builder = SimInit::new();
        let source = builder.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(7.0)), 0, 1));
        let sink = builder.add_model(ModelRecord::new(ModelKind::Counter(Counter::new()), 1, 1));
        builder.connect(source, 0, sink, 0).unwrap();

        let bytes = write_model_graph(&builder);
        let reloaded = read_model_graph(&bytes).unwrap();

        let mut sim = reloaded.init(0.0).unwrap();
        sim.step().unwrap();
        sim.step().unwrap();
        let reloaded_sink = sim.model(ids_of(&sim)[1]).unwrap();
        let ModelKind::Counter(counter) = &reloaded_sink.kind else {
            panic!("expected counter model");
        };
        assert_eq!(counter.value(), 1);
    }

    fn ids_of(sim: &crate::simulation::Simulation) -> Vec<ModelId> {
        sim.model_ids()
    }
}
