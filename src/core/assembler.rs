// Recording graph assembly
//
// Builds channel groups, signals and event sets from a decoded header and
// body, and owns the consistency step that rebuilds every membership index
// from forward references.

use crate::core::constants::SAMPLE_RATE_SUFFIX;
use crate::core::error::{RhdError, Result};
use crate::core::events::ChannelEvents;
use crate::core::format::{GroupKind, RhdHeader};
use crate::core::lazy::{LazyKey, LazyList, LazyLoader};
use crate::core::model::*;
use crate::core::samples::SampleData;
use chrono::NaiveDateTime;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Identity of the file a segment or block was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    pub name: String,
    pub file_origin: String,
    pub rec_datetime: Option<NaiveDateTime>,
}

/// Decoded body handed to the assembler. A lazy `samples` turns every
/// signal and every event set into a placeholder.
#[derive(Debug, Clone)]
pub struct DecodedBody {
    pub samples: SampleData,
    pub events: Vec<ChannelEvents>,
}

/// Loaders attached to a segment's lazy lists.
#[derive(Clone, Default)]
pub struct Loaders {
    pub signals: Option<Rc<dyn LazyLoader<AnalogSignal>>>,
    pub events: Option<Rc<dyn LazyLoader<EventSet>>>,
}

/// Notes plus every frequency parameter that is not a sample rate.
/// Sample rates live on the channel groups and signals instead.
pub fn segment_annotations(header: &RhdHeader) -> Annotations {
    let mut annotations = Annotations::new();
    for (name, text) in &header.notes {
        annotations.insert(name.clone(), text.as_str().into());
    }
    for (key, value) in header.frequency_parameters.entries() {
        if !key.ends_with(SAMPLE_RATE_SUFFIX) {
            annotations.insert(key.to_string(), value);
        }
    }
    annotations
}

pub fn block_annotations(header: &RhdHeader) -> Annotations {
    let mut annotations = segment_annotations(header);
    annotations.insert("rhd_version".to_string(), header.version.to_string().into());
    annotations.insert("eval_board_mode".to_string(), (header.eval_board_mode as i64).into());
    if let Some(reference) = &header.reference_channel {
        annotations.insert("reference_channel".to_string(), reference.as_str().into());
    }
    annotations
}

pub fn build_channel_group(header: &RhdHeader, kind: GroupKind) -> ChannelGroup {
    let channels = header.channels(kind).to_vec();
    let mut group = ChannelGroup {
        kind,
        name: kind.name().to_string(),
        sampling_rate: header.sample_rate_of(kind),
        channel_indexes: channels.iter().map(|c| c.native_order).collect(),
        channel_names: channels.iter().map(|c| c.native_channel_name.clone()).collect(),
        channels,
        annotations: Annotations::new(),
    };
    if let Some(unit) = kind.unit() {
        group.annotate("units", unit.symbol());
    }
    group
}

pub fn build_signal(header: &RhdHeader, kind: GroupKind, data: Array2<f64>) -> Result<AnalogSignal> {
    let units = kind.unit().ok_or_else(|| RhdError::Unresolvable {
        key: LazyKey::Signal(kind).to_string(),
        reason: "group has no analog signal".to_string(),
    })?;
    let expected = header.channels(kind).len();
    if data.nrows() != expected {
        return Err(RhdError::ChannelMetadata {
            group: kind.name().to_string(),
            declared: expected,
            found: data.nrows(),
        });
    }

    Ok(AnalogSignal {
        name: kind.name().to_string(),
        channel_group: kind,
        units,
        t_start: 0.0,
        sampling_rate: header.sample_rate_of(kind),
        data,
        annotations: Annotations::new(),
    })
}

pub fn build_event_set(events: ChannelEvents) -> EventSet {
    EventSet {
        name: events.channel_name.clone(),
        channel_index: events.native_order,
        channel_name: events.channel_name,
        times: events.times,
        sample_indexes: events.sample_indexes,
        codes: events.codes,
        annotations: Annotations::new(),
    }
}

fn lazy_list<T>(loader: &Option<Rc<dyn LazyLoader<T>>>, lazy: bool) -> LazyList<T> {
    match loader {
        Some(loader) => LazyList::with_loader(Rc::clone(loader), lazy),
        None => LazyList::new(lazy),
    }
}

/// Builds a segment. Without a body (no cascade) only the annotations are set.
pub fn assemble_segment(
    header: &RhdHeader,
    source: SourceInfo,
    body: Option<DecodedBody>,
    loaders: &Loaders,
) -> Result<Segment> {
    let mut segment = Segment::new(source.name, source.file_origin);
    segment.rec_datetime = source.rec_datetime;
    segment.annotations = segment_annotations(header);

    let Some(DecodedBody { mut samples, events }) = body else {
        return Ok(segment);
    };

    let lazy = samples.lazy;
    segment.signals = lazy_list(&loaders.signals, lazy);
    segment.events = lazy_list(&loaders.events, lazy);

    // Amplifier first, then whichever optional groups the header declares
    for kind in GroupKind::ANALOG {
        if !header.is_present(kind) {
            continue;
        }
        segment.channel_groups.push(Rc::new(build_channel_group(header, kind)));
        if lazy {
            segment.signals.push_pending(LazyKey::Signal(kind));
        } else {
            let data = samples.take_analog(kind).ok_or_else(|| RhdError::Unresolvable {
                key: LazyKey::Signal(kind).to_string(),
                reason: "group missing from decoded samples".to_string(),
            })?;
            segment.signals.push(build_signal(header, kind, data)?);
        }
        relink_segment(&mut segment);
        debug!("Assembled {} group", kind);
    }

    if header.is_present(GroupKind::DigitalIn) {
        segment
            .channel_groups
            .push(Rc::new(build_channel_group(header, GroupKind::DigitalIn)));
        for channel_events in events {
            if lazy {
                segment.events.push_pending(LazyKey::Events {
                    native_order: channel_events.native_order,
                });
            } else {
                segment.events.push(build_event_set(channel_events));
            }
        }
        relink_segment(&mut segment);
        debug!("Assembled {} group with {} event sets", GroupKind::DigitalIn, segment.events.len());
    }

    Ok(segment)
}

/// Builds a block around an optional segment and links it.
pub fn assemble_block(header: &RhdHeader, source: SourceInfo, segment: Option<Segment>) -> Block {
    let mut block = Block::new(source.name, source.file_origin);
    block.rec_datetime = source.rec_datetime;
    block.annotations = block_annotations(header);
    if let Some(segment) = segment {
        block.segments.push(segment);
    }
    relink_block(&mut block);
    block
}

/// Rebuilds a segment's group -> member index from each member's own group.
/// Call after any change to `signals`, `events` or `channel_groups`.
pub fn relink_segment(segment: &mut Segment) {
    let mut members: BTreeMap<GroupKind, Vec<MemberRef>> = BTreeMap::new();
    for group in &segment.channel_groups {
        members.entry(group.kind).or_default();
    }
    for (i, kind) in segment.signals.groups().into_iter().enumerate() {
        members.entry(kind).or_default().push(MemberRef::Signal(i));
    }
    for (i, kind) in segment.events.groups().into_iter().enumerate() {
        members.entry(kind).or_default().push(MemberRef::Events(i));
    }
    segment.members = members;
}

/// Makes every segment share the block's channel group descriptors,
/// renumbers segments, and rebuilds all membership indexes.
pub fn relink_block(block: &mut Block) {
    for (index, segment) in block.segments.iter_mut().enumerate() {
        segment.index = index;
        for group in segment.channel_groups.iter_mut() {
            match block.channel_groups.iter().find(|shared| shared.kind == group.kind) {
                Some(shared) => *group = Rc::clone(shared),
                None => block.channel_groups.push(Rc::clone(group)),
            }
        }
        relink_segment(segment);
    }

    let mut members: BTreeMap<GroupKind, Vec<(usize, MemberRef)>> = BTreeMap::new();
    for group in &block.channel_groups {
        members.entry(group.kind).or_default();
    }
    for segment in &block.segments {
        for (kind, refs) in &segment.members {
            let entry = members.entry(*kind).or_default();
            entry.extend(refs.iter().map(|r| (segment.index, *r)));
        }
    }
    block.members = members;
}
