//! JSON persistence for a model graph and its registered sources.
//!
//! Mirrors the binary archiver's scope (a rebuildable topology, not a
//! mid-run snapshot) but in a human-editable format, with three
//! pretty-print options: `Off` (compact), `Indent2` (two-space pretty,
//! arrays included), and `Indent2OneLineArray` (two-space pretty with every
//! array collapsed onto one line — the form this crate's own test fixtures
//! and diffs are kept in, since a `params` array broken across a dozen
//! lines is harder to review than one on a line with its object).
//!
//! Loading maps the external, JSON-local ids back to arena handles through
//! five lookup tables: one for models and one for each of the four source
//! kinds, since a source's external id is meaningful only within its own
//! kind (the same convention the original modeling layer uses internally).

use std::collections::HashMap;
use std::io;

use serde::{Deserialize, Serialize};
use serde_json::ser::{CompactFormatter, Formatter, PrettyFormatter};

use crate::error::{IoError, SimulationError};
use crate::model::{ModelId, ModelKind, ModelRecord};
use crate::simulation::SimInit;
use crate::source::{RandomDistribution, Source, SourceId};

/// Pretty-print option for [`to_json`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrettyOption {
    /// No whitespace at all.
    Off,
    /// Two-space indentation, including inside arrays.
    #[default]
    Indent2,
    /// Two-space indentation with every array collapsed onto one line.
    Indent2OneLineArray,
}

/// One model in wire form: its external id, kind name, port arities and the
/// parameters needed to rebuild an equivalent freshly-initialized model
/// (see [`ModelKind::archive_params`] for exactly what that excludes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    /// Id assigned within this document, referenced by [`ConnectionDocument`].
    pub id: u32,
    /// [`ModelKind::kind_name`] of the model.
    pub kind: String,
    /// Input port count.
    pub inputs: usize,
    /// Output port count.
    pub outputs: usize,
    /// Construction parameters, kind-dependent (see [`ModelKind::archive_params`]).
    pub params: Vec<f64>,
}

/// One connection in wire form, referencing [`ModelDocument::id`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDocument {
    pub src_model: u32,
    pub src_port: u8,
    pub dst_model: u32,
    pub dst_port: u8,
}

/// Wire form of a [`RandomDistribution`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum RandomDistributionDocument {
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
    Exponential { rate: f64 },
}

impl From<&RandomDistribution> for RandomDistributionDocument {
    fn from(value: &RandomDistribution) -> Self {
        match *value {
            RandomDistribution::Uniform { low, high } => Self::Uniform { low, high },
            RandomDistribution::Normal { mean, std_dev } => Self::Normal { mean, std_dev },
            RandomDistribution::Exponential { rate } => Self::Exponential { rate },
        }
    }
}

impl From<RandomDistributionDocument> for RandomDistribution {
    fn from(value: RandomDistributionDocument) -> Self {
        match value {
            RandomDistributionDocument::Uniform { low, high } => Self::Uniform { low, high },
            RandomDistributionDocument::Normal { mean, std_dev } => Self::Normal { mean, std_dev },
            RandomDistributionDocument::Exponential { rate } => Self::Exponential { rate },
        }
    }
}

/// Wire form of a [`Source`], tagged by kind. `id` is local to that kind's
/// lookup table (per the module-level doc, five separate tables are kept
/// on load, one of them shared by models, four one per source kind).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDocument {
    Constant { id: u32, values: Vec<f64> },
    TextFile { id: u32, values: Vec<f64> },
    BinaryFile { id: u32, values: Vec<f64> },
    Random {
        id: u32,
        seed: u64,
        index: u64,
        distribution: RandomDistributionDocument,
    },
}

/// A whole model graph plus registered sources, in wire form.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ComponentDocument {
    pub models: Vec<ModelDocument>,
    pub connections: Vec<ConnectionDocument>,
    pub sources: Vec<SourceDocument>,
}

fn source_document(id: u32, source: &Source) -> SourceDocument {
    match source {
        Source::Constant { values, .. } => SourceDocument::Constant { id, values: values.clone() },
        Source::TextFile { values, .. } => SourceDocument::TextFile { id, values: values.clone() },
        Source::BinaryFile { values, .. } => SourceDocument::BinaryFile { id, values: values.clone() },
        Source::Random { distribution, .. } => SourceDocument::Random {
            id,
            // The Philox counter state is draw-position, not configuration;
            // reloading restarts the stream at step 0, same as the archiver.
            seed: 0,
            index: u64::from(id),
            distribution: distribution.into(),
        },
    }
}

/// Builds a [`ComponentDocument`] describing every model, connection and
/// source currently in `builder`.
pub fn to_component_document(builder: &SimInit) -> ComponentDocument {
    let model_ids = builder.model_ids();
    let external_id: HashMap<ModelId, u32> = model_ids.iter().enumerate().map(|(i, &id)| (id, i as u32)).collect();

    let models = model_ids
        .iter()
        .map(|&id| {
            let record = builder.model(id).expect("id came from model_ids()");
            ModelDocument {
                id: external_id[&id],
                kind: record.kind.kind_name().to_string(),
                inputs: record.inputs.len(),
                outputs: record.outputs.len(),
                params: record.kind.archive_params(),
            }
        })
        .collect();

    let connections = builder
        .connections()
        .into_iter()
        .map(|(src_model, src_port, dst_model, dst_port)| ConnectionDocument {
            src_model: external_id[&src_model],
            src_port,
            dst_model: external_id[&dst_model],
            dst_port,
        })
        .collect();

    let sources = builder
        .source_ids()
        .iter()
        .enumerate()
        .map(|(i, &id)| source_document(i as u32, builder.source(id).expect("id came from source_ids()")))
        .collect();

    ComponentDocument { models, connections, sources }
}

/// Serializes `builder`'s model graph and sources to a JSON string.
pub fn to_json(builder: &SimInit, pretty: PrettyOption) -> Result<String, SimulationError> {
    let document = to_component_document(builder);
    let bytes = match pretty {
        PrettyOption::Off => serde_json::to_vec(&document).map_err(IoError::Json)?,
        PrettyOption::Indent2 => {
            let mut buf = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"  "));
            document.serialize(&mut serializer).map_err(IoError::Json)?;
            buf
        }
        PrettyOption::Indent2OneLineArray => {
            let mut buf = Vec::new();
            let mut serializer = serde_json::Serializer::with_formatter(&mut buf, OneLineArrayFormatter::default());
            document.serialize(&mut serializer).map_err(IoError::Json)?;
            buf
        }
    };
    String::from_utf8(bytes).map_err(|e| IoError::Format(e.to_string()).into())
}

/// Result of [`from_json`]: a rebuilt [`SimInit`] plus the five lookup
/// tables mapping each document-local id back to the handle it was loaded
/// into.
pub struct LoadedComponent {
    pub sim_init: SimInit,
    pub models: HashMap<u32, ModelId>,
    pub constant_sources: HashMap<u32, SourceId>,
    pub binary_file_sources: HashMap<u32, SourceId>,
    pub random_sources: HashMap<u32, SourceId>,
    pub text_file_sources: HashMap<u32, SourceId>,
}

/// Parses `text` and rebuilds the model graph and sources it describes.
pub fn from_json(text: &str) -> Result<LoadedComponent, SimulationError> {
    let document: ComponentDocument = serde_json::from_str(text).map_err(IoError::Json)?;

    let mut sim_init = SimInit::new();
    let mut models = HashMap::new();
    let mut constant_sources = HashMap::new();
    let mut binary_file_sources = HashMap::new();
    let mut random_sources = HashMap::new();
    let mut text_file_sources = HashMap::new();

    let mut by_external_id: HashMap<u32, ModelId> = HashMap::new();
    for doc in &document.models {
        let tag = ModelKind::tag_for_kind_name(&doc.kind)
            .ok_or_else(|| SimulationError::Io(IoError::Format(format!("unknown model kind '{}'", doc.kind))))?;
        let kind = ModelKind::from_archive(tag, doc.inputs, &doc.params)?;
        let id = sim_init.add_model(ModelRecord::new(kind, doc.inputs, doc.outputs));
        by_external_id.insert(doc.id, id);
        models.insert(doc.id, id);
    }

    for conn in &document.connections {
        let src = *by_external_id
            .get(&conn.src_model)
            .ok_or_else(|| SimulationError::Io(IoError::Format(format!("connection references unknown model {}", conn.src_model))))?;
        let dst = *by_external_id
            .get(&conn.dst_model)
            .ok_or_else(|| SimulationError::Io(IoError::Format(format!("connection references unknown model {}", conn.dst_model))))?;
        sim_init.connect(src, conn.src_port, dst, conn.dst_port)?;
    }

    for source_doc in &document.sources {
        match source_doc {
            SourceDocument::Constant { id, values } => {
                let handle = sim_init.add_source(Source::Constant { values: values.clone(), position: 0 });
                constant_sources.insert(*id, handle);
            }
            SourceDocument::TextFile { id, values } => {
                let handle = sim_init.add_source(Source::TextFile { values: values.clone(), position: 0 });
                text_file_sources.insert(*id, handle);
            }
            SourceDocument::BinaryFile { id, values } => {
                let handle = sim_init.add_source(Source::BinaryFile { values: values.clone(), position: 0 });
                binary_file_sources.insert(*id, handle);
            }
            SourceDocument::Random { id, seed, index, distribution } => {
                let handle = sim_init.add_source(Source::random(*seed, *index, distribution.clone().into()));
                random_sources.insert(*id, handle);
            }
        }
    }

    Ok(LoadedComponent {
        sim_init,
        models,
        constant_sources,
        binary_file_sources,
        random_sources,
        text_file_sources,
    })
}

/// A [`Formatter`] that pretty-prints objects with two-space indentation
/// (delegating to [`PrettyFormatter`]) but keeps every array on one line
/// (delegating to [`CompactFormatter`]), for JSON documents where the
/// interesting structure is object nesting and arrays are just flat
/// parameter lists.
#[derive(Default)]
struct OneLineArrayFormatter<'a> {
    pretty: PrettyFormatter<'a>,
    compact: CompactFormatter,
}

macro_rules! delegate_to_pretty {
    ($name:ident($($arg:ident: $ty:ty),*)) => {
        fn $name<W: ?Sized + io::Write>(&mut self, writer: &mut W, $($arg: $ty),*) -> io::Result<()> {
            self.pretty.$name(writer, $($arg),*)
        }
    };
}

impl<'a> Formatter for OneLineArrayFormatter<'a> {
    delegate_to_pretty!(write_null());
    delegate_to_pretty!(write_bool(value: bool));
    delegate_to_pretty!(write_i64(value: i64));
    delegate_to_pretty!(write_u64(value: u64));
    delegate_to_pretty!(write_f64(value: f64));
    delegate_to_pretty!(begin_string());
    delegate_to_pretty!(end_string());
    delegate_to_pretty!(write_string_fragment(fragment: &str));
    delegate_to_pretty!(write_char_escape(char_escape: serde_json::ser::CharEscape));
    delegate_to_pretty!(begin_object());
    delegate_to_pretty!(end_object());
    delegate_to_pretty!(begin_object_key(first: bool));
    delegate_to_pretty!(end_object_key());
    delegate_to_pretty!(begin_object_value());
    delegate_to_pretty!(end_object_value());

    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.compact.begin_array(writer)
    }
    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.compact.end_array(writer)
    }
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        self.compact.begin_array_value(writer, first)
    }
    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.compact.end_array_value(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generator::{Constant, Counter};
    use crate::model::ModelKind;

    #[test]
    fn round_trips_a_constant_feeding_a_counter() {
        let mut builder = SimInit::new();
        let source = builder.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(5.0)), 0, 1));
        let sink = builder.add_model(ModelRecord::new(ModelKind::Counter(Counter::new()), 1, 1));
        builder.connect(source, 0, sink, 0).unwrap();

        let text = to_json(&builder, PrettyOption::Indent2).unwrap();
        let loaded = from_json(&text).unwrap();

        let mut sim = loaded.sim_init.init(0.0).unwrap();
        sim.step().unwrap();
        sim.step().unwrap();
        let sink_id = loaded.models[&1];
        let ModelKind::Counter(counter) = &sim.model(sink_id).unwrap().kind else {
            panic!("expected counter model");
        };
        assert_eq!(counter.value(), 1);
    }

    #[test]
    fn one_line_array_option_keeps_params_on_a_single_line() {
        let mut builder = SimInit::new();
        builder.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(5.0)), 0, 1));
        let text = to_json(&builder, PrettyOption::Indent2OneLineArray).unwrap();
        let params_line = text.lines().find(|l| l.contains("\"params\"")).unwrap();
        assert!(params_line.contains("[5.0]") || params_line.contains("[\n") == false);
    }

    #[test]
    fn compact_option_has_no_whitespace_between_tokens() {
        let mut builder = SimInit::new();
        builder.add_model(ModelRecord::new(ModelKind::Constant(Constant::new(5.0)), 0, 1));
        let text = to_json(&builder, PrettyOption::Off).unwrap();
        assert!(!text.contains('\n'));
    }

    #[test]
    fn unknown_model_kind_is_a_format_error() {
        let text = r#"{"models":[{"id":0,"kind":"bogus","inputs":0,"outputs":1,"params":[]}],"connections":[],"sources":[]}"#;
        assert!(from_json(text).is_err());
    }

    #[test]
    fn sources_round_trip_through_their_own_lookup_tables() {
        let mut builder = SimInit::new();
        builder.add_source(Source::Constant { values: vec![1.0, 2.0], position: 0 });
        builder.add_source(Source::random(1, 0, RandomDistribution::Uniform { low: 0.0, high: 1.0 }));

        let text = to_json(&builder, PrettyOption::Indent2).unwrap();
        let loaded = from_json(&text).unwrap();
        assert_eq!(loaded.constant_sources.len(), 1);
        assert_eq!(loaded.random_sources.len(), 1);
    }
}
