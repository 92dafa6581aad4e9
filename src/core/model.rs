// Recording object graph: Block > Segment > signals/events, indexed by ChannelGroup

use crate::core::error::Result;
use crate::core::format::{ChannelDescriptor, GroupKind, Unit};
use crate::core::lazy::LazyList;
use chrono::NaiveDateTime;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// A single annotation value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnnotationValue::Float(v) => Some(*v),
            AnnotationValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AnnotationValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for AnnotationValue {
    fn from(v: f64) -> Self {
        AnnotationValue::Float(v)
    }
}

impl From<i64> for AnnotationValue {
    fn from(v: i64) -> Self {
        AnnotationValue::Int(v)
    }
}

impl From<bool> for AnnotationValue {
    fn from(v: bool) -> Self {
        AnnotationValue::Bool(v)
    }
}

impl From<String> for AnnotationValue {
    fn from(v: String) -> Self {
        AnnotationValue::Text(v)
    }
}

impl From<&str> for AnnotationValue {
    fn from(v: &str) -> Self {
        AnnotationValue::Text(v.to_string())
    }
}

pub type Annotations = BTreeMap<String, AnnotationValue>;

/// String-keyed annotations attached to any graph object.
pub trait Annotated {
    fn annotations(&self) -> &Annotations;
    fn annotations_mut(&mut self) -> &mut Annotations;

    fn annotate(&mut self, key: impl Into<String>, value: impl Into<AnnotationValue>) {
        self.annotations_mut().insert(key.into(), value.into());
    }

    fn annotation(&self, key: &str) -> Option<&AnnotationValue> {
        self.annotations().get(key)
    }

    fn annotation_str(&self, key: &str) -> Option<&str> {
        self.annotation(key).and_then(AnnotationValue::as_str)
    }

    fn annotation_f64(&self, key: &str) -> Option<f64> {
        self.annotation(key).and_then(AnnotationValue::as_f64)
    }
}

macro_rules! impl_annotated {
    ($($ty:ty),*) => {
        $(impl Annotated for $ty {
            fn annotations(&self) -> &Annotations {
                &self.annotations
            }

            fn annotations_mut(&mut self) -> &mut Annotations {
                &mut self.annotations
            }
        })*
    };
}

impl_annotated!(ChannelGroup, AnalogSignal, EventSet, Segment, Block);

/// Anything that belongs to exactly one channel group.
pub trait GroupMember {
    fn channel_group(&self) -> GroupKind;
}

/// A position in one of a segment's member lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum MemberRef {
    Signal(usize),
    Events(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGroup {
    pub kind: GroupKind,
    pub name: String,
    pub sampling_rate: f64,
    /// Native hardware indexes, in signal row order.
    pub channel_indexes: Vec<i32>,
    pub channel_names: Vec<String>,
    pub channels: Vec<ChannelDescriptor>,
    pub annotations: Annotations,
}

impl ChannelGroup {
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalogSignal {
    pub name: String,
    pub channel_group: GroupKind,
    pub units: Unit,
    /// Seconds; RHD recordings always start at 0.
    pub t_start: f64,
    pub sampling_rate: f64,
    /// [channels x samples]
    pub data: Array2<f64>,
    pub annotations: Annotations,
}

impl AnalogSignal {
    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn sampling_period(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    pub fn duration(&self) -> f64 {
        self.num_samples() as f64 / self.sampling_rate
    }

    pub fn times(&self) -> Array1<f64> {
        Array1::from_iter((0..self.num_samples()).map(|i| self.t_start + i as f64 / self.sampling_rate))
    }

    pub fn channel(&self, row: usize) -> Option<ArrayView1<'_, f64>> {
        (row < self.num_channels()).then(|| self.data.index_axis(Axis(0), row))
    }
}

impl GroupMember for AnalogSignal {
    fn channel_group(&self) -> GroupKind {
        self.channel_group
    }
}

/// Rising edges of one digital input channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSet {
    pub name: String,
    pub channel_index: i32,
    pub channel_name: String,
    /// Seconds, strictly increasing.
    pub times: Vec<f64>,
    pub sample_indexes: Vec<usize>,
    pub codes: Vec<Option<Vec<u8>>>,
    pub annotations: Annotations,
}

impl EventSet {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Decoded code of edge `i` as text, one char per byte.
    pub fn label(&self, i: usize) -> Option<String> {
        self.codes
            .get(i)?
            .as_ref()
            .map(|bytes| bytes.iter().map(|&b| char::from(b)).collect())
    }
}

impl GroupMember for EventSet {
    fn channel_group(&self) -> GroupKind {
        GroupKind::DigitalIn
    }
}

/// One decoded file.
#[derive(Debug)]
pub struct Segment {
    pub name: String,
    pub file_origin: String,
    pub index: usize,
    pub rec_datetime: Option<NaiveDateTime>,
    pub annotations: Annotations,
    pub channel_groups: Vec<Rc<ChannelGroup>>,
    pub signals: LazyList<AnalogSignal>,
    pub events: LazyList<EventSet>,
    pub(crate) members: BTreeMap<GroupKind, Vec<MemberRef>>,
}

impl Segment {
    pub fn new(name: impl Into<String>, file_origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_origin: file_origin.into(),
            index: 0,
            rec_datetime: None,
            annotations: Annotations::new(),
            channel_groups: Vec::new(),
            signals: LazyList::new(false),
            events: LazyList::new(false),
            members: BTreeMap::new(),
        }
    }

    pub fn channel_group(&self, kind: GroupKind) -> Option<&Rc<ChannelGroup>> {
        self.channel_groups.iter().find(|g| g.kind == kind)
    }

    /// Members produced by `kind`, as of the last relink.
    pub fn members_of(&self, kind: GroupKind) -> &[MemberRef] {
        self.members.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Group of a member, read from the member itself (or its placeholder key).
    pub fn group_of(&self, member: MemberRef) -> Option<GroupKind> {
        match member {
            MemberRef::Signal(i) => self.signals.group_at(i),
            MemberRef::Events(i) => self.events.group_at(i),
        }
    }

    /// The analog signal of `kind`, resolving it if it is still pending.
    pub fn signal(&self, kind: GroupKind) -> Result<Option<Rc<AnalogSignal>>> {
        for member in self.members_of(kind) {
            if let MemberRef::Signal(i) = *member {
                return self.signals.get(i).map(Some);
            }
        }
        Ok(None)
    }

    /// Every event set, resolving pending ones.
    pub fn event_sets(&self) -> Result<Vec<Rc<EventSet>>> {
        self.events.resolve_all()
    }
}

/// Top-level recording.
#[derive(Debug)]
pub struct Block {
    pub name: String,
    pub file_origin: String,
    pub rec_datetime: Option<NaiveDateTime>,
    pub annotations: Annotations,
    pub segments: Vec<Segment>,
    pub channel_groups: Vec<Rc<ChannelGroup>>,
    pub(crate) members: BTreeMap<GroupKind, Vec<(usize, MemberRef)>>,
}

impl Block {
    pub fn new(name: impl Into<String>, file_origin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_origin: file_origin.into(),
            rec_datetime: None,
            annotations: Annotations::new(),
            segments: Vec::new(),
            channel_groups: Vec::new(),
            members: BTreeMap::new(),
        }
    }

    pub fn channel_group(&self, kind: GroupKind) -> Option<&Rc<ChannelGroup>> {
        self.channel_groups.iter().find(|g| g.kind == kind)
    }

    /// (segment index, member) pairs produced by `kind`, as of the last relink.
    pub fn members_of(&self, kind: GroupKind) -> &[(usize, MemberRef)] {
        self.members.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}
