// Main RHD reader implementation
//
// Opening a reader parses and validates the header once. Every decode
// re-opens the file by path and closes it when the call returns, so a
// reader holds no file handle between calls.

use crate::core::assembler::{assemble_block, assemble_segment, DecodedBody, Loaders, SourceInfo};
use crate::core::assembler::{build_event_set, build_signal};
use crate::core::error::{RhdError, Result};
use crate::core::events::{extract_events, unpack_bits, ChannelEvents};
use crate::core::format::{GroupKind, RhdHeader};
use crate::core::header::read_header;
use crate::core::lazy::{LazyKey, LazyLoader};
use crate::core::model::{AnalogSignal, Block, EventSet, Segment};
use crate::core::options::ReadOptions;
use crate::core::samples::{GroupSet, SampleData, SampleDecoder};
use crate::core::stream::ByteReader;
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{self, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

/// Parsed header plus everything needed to decode the body again later.
/// Lazy placeholders resolve through this.
#[derive(Debug)]
pub struct RhdSource {
    path: PathBuf,
    header: RhdHeader,
    body_offset: u64,
    body_len: u64,
    options: ReadOptions,
}

impl RhdSource {
    fn open(path: &Path, options: ReadOptions) -> Result<Self> {
        let file = File::open(path)?;
        let total_len = file.metadata()?.len();
        let mut reader = ByteReader::new(BufReader::new(file));

        let header = read_header(&mut reader)?;
        let body_offset = reader.offset();
        let body_len = total_len.saturating_sub(body_offset);

        let decoder = SampleDecoder::new(&header, body_offset, body_len)?;
        info!(
            "Opened {}: RHD {} at {} Hz, {} data blocks ({} samples)",
            path.display(),
            header.version,
            header.sample_rate,
            decoder.num_blocks(),
            decoder.num_samples()
        );
        if let Ok(summary) = serde_json::to_string(&header.summary()) {
            debug!("Header summary: {}", summary);
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            body_offset,
            body_len,
            options,
        })
    }

    fn decoder(&self) -> Result<SampleDecoder<'_>> {
        SampleDecoder::new(&self.header, self.body_offset, self.body_len)
    }

    /// Decodes `groups` from the body. A lazy decode never touches the file.
    fn decode(&self, groups: GroupSet, lazy: bool) -> Result<SampleData> {
        let decoder = self.decoder()?;
        if lazy {
            return decoder.decode(&mut ByteReader::new(io::empty()), groups, true);
        }

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(self.body_offset))?;
        let mut reader = ByteReader::with_offset(BufReader::new(file), self.body_offset);
        decoder.decode(&mut reader, groups, false)
    }

    /// Events of every digital input channel that rises at least once.
    fn extract_all_events(&self, samples: &SampleData) -> Vec<ChannelEvents> {
        let rate = self.header.sample_rate_of(GroupKind::DigitalIn);
        self.header
            .board_dig_in_channels
            .iter()
            .filter_map(|channel| {
                let bits = unpack_bits(&samples.dig_in_words, channel.native_order);
                extract_events(&bits, rate, channel, self.options.code_decoding)
            })
            .collect()
    }

    fn decode_body(&self, lazy: bool) -> Result<DecodedBody> {
        if !lazy {
            let samples = self.decode(GroupSet::all(), false)?;
            let events = self.extract_all_events(&samples);
            return Ok(DecodedBody { samples, events });
        }

        // How many event sets exist depends on the data, so a lazy read
        // still scans the digital words once.
        let samples = self.decode(GroupSet::all(), true)?;
        let events = if self.header.is_present(GroupKind::DigitalIn) {
            let digital = self.decode(GroupSet::DIGITAL_IN, false)?;
            self.extract_all_events(&digital)
        } else {
            Vec::new()
        };
        Ok(DecodedBody { samples, events })
    }

    /// Groups a single-item load decodes: only the requested one when
    /// lazy, everything otherwise.
    fn selection(kind: GroupKind, lazy: bool) -> GroupSet {
        if lazy {
            kind.into()
        } else {
            GroupSet::all()
        }
    }

    fn source_info(&self) -> SourceInfo {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let rec_datetime = if self.options.parse_rec_datetime {
            rec_datetime_from_path(&self.path)
        } else {
            None
        };
        SourceInfo {
            name,
            file_origin: self.path.display().to_string(),
            rec_datetime,
        }
    }
}

impl LazyLoader<AnalogSignal> for RhdSource {
    fn load_lazy(&self, key: &LazyKey, lazy: bool) -> Result<AnalogSignal> {
        let LazyKey::Signal(kind) = *key else {
            return Err(RhdError::Unresolvable {
                key: key.to_string(),
                reason: "not an analog signal key".to_string(),
            });
        };

        debug!("Resolving {} from {}", key, self.path.display());
        let mut samples = self.decode(Self::selection(kind, lazy), false)?;
        let data = samples.take_analog(kind).ok_or_else(|| RhdError::Unresolvable {
            key: key.to_string(),
            reason: "group not present in file".to_string(),
        })?;
        build_signal(&self.header, kind, data)
    }
}

impl LazyLoader<EventSet> for RhdSource {
    fn load_lazy(&self, key: &LazyKey, lazy: bool) -> Result<EventSet> {
        let LazyKey::Events { native_order } = *key else {
            return Err(RhdError::Unresolvable {
                key: key.to_string(),
                reason: "not a digital event key".to_string(),
            });
        };
        let unresolvable = |reason: &str| RhdError::Unresolvable {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        let channel = self
            .header
            .board_dig_in_channels
            .iter()
            .find(|c| c.native_order == native_order)
            .ok_or_else(|| unresolvable("no such digital input"))?;

        debug!("Resolving {} from {}", key, self.path.display());
        let samples = self.decode(Self::selection(GroupKind::DigitalIn, lazy), false)?;
        let bits = unpack_bits(&samples.dig_in_words, native_order);
        let rate = self.header.sample_rate_of(GroupKind::DigitalIn);
        extract_events(&bits, rate, channel, self.options.code_decoding)
            .map(build_event_set)
            .ok_or_else(|| unresolvable("channel no longer has rising edges"))
    }
}

/// Reader over one RHD file.
#[derive(Debug, Clone)]
pub struct RhdReader {
    source: Rc<RhdSource>,
}

impl RhdReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ReadOptions::default())
    }

    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ReadOptions) -> Result<Self> {
        let source = RhdSource::open(path.as_ref(), options)?;
        Ok(Self {
            source: Rc::new(source),
        })
    }

    pub fn path(&self) -> &Path {
        &self.source.path
    }

    pub fn header(&self) -> &RhdHeader {
        &self.source.header
    }

    pub fn options(&self) -> &ReadOptions {
        &self.source.options
    }

    /// Amplifier-rate samples per channel in the file.
    pub fn num_samples(&self) -> Result<usize> {
        Ok(self.source.decoder()?.num_samples())
    }

    fn loaders(&self) -> Loaders {
        Loaders {
            signals: Some(self.source.clone() as Rc<dyn LazyLoader<AnalogSignal>>),
            events: Some(self.source.clone() as Rc<dyn LazyLoader<EventSet>>),
        }
    }

    /// Reads the file as one segment. Without `cascade` only the
    /// header-derived annotations are filled in.
    pub fn read_segment(&self, lazy: bool, cascade: bool) -> Result<Segment> {
        let body = if cascade {
            Some(self.source.decode_body(lazy)?)
        } else {
            None
        };
        assemble_segment(&self.source.header, self.source.source_info(), body, &self.loaders())
    }

    /// Reads the file as a block holding one segment. Without `cascade`
    /// the block carries annotations only.
    pub fn read_block(&self, lazy: bool, cascade: bool) -> Result<Block> {
        let segment = if cascade {
            Some(self.read_segment(lazy, true)?)
        } else {
            None
        };
        Ok(assemble_block(&self.source.header, self.source.source_info(), segment))
    }
}

pub fn read_segment<P: AsRef<Path>>(
    path: P,
    lazy: bool,
    cascade: bool,
    options: &ReadOptions,
) -> Result<Segment> {
    RhdReader::open_with_options(path, options.clone())?.read_segment(lazy, cascade)
}

pub fn read_block<P: AsRef<Path>>(
    path: P,
    lazy: bool,
    cascade: bool,
    options: &ReadOptions,
) -> Result<Block> {
    RhdReader::open_with_options(path, options.clone())?.read_block(lazy, cascade)
}

/// Recording time from a `_YYMMDD_HHMMSS` file stem suffix.
pub fn rec_datetime_from_path(path: &Path) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_str()?;
    let suffix = stem.len().checked_sub(13).and_then(|at| stem.get(at..))?;
    NaiveDateTime::parse_from_str(suffix, "%y%m%d_%H%M%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn rec_datetime_from_file_name() {
        let expected = NaiveDate::from_ymd_opt(2023, 4, 17)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        assert_eq!(
            rec_datetime_from_path(Path::new("/data/mouse3_230417_140509.rhd")),
            Some(expected)
        );
        assert_eq!(rec_datetime_from_path(Path::new("recording.rhd")), None);
        assert_eq!(rec_datetime_from_path(Path::new("x_999999_999999.rhd")), None);
    }

    #[test]
    fn open_reports_layout() {
        let dir = TempDir::new().unwrap();
        let path = Fixture::standard(2, 1, 1, 0, 0, 0).write_to(dir.path(), "rec.rhd");
        let reader = RhdReader::open(&path).unwrap();
        assert_eq!(reader.num_samples().unwrap(), 120);
        assert_eq!(reader.header().amplifier_channels.len(), 2);
        assert_eq!(reader.path(), path.as_path());
    }

    #[test]
    fn signal_loader_rejects_event_keys() {
        let dir = TempDir::new().unwrap();
        let path = Fixture::standard(1, 0, 0, 0, 1, 0).write_to(dir.path(), "rec.rhd");
        let reader = RhdReader::open(&path).unwrap();
        let loader: &dyn LazyLoader<AnalogSignal> = &*reader.source;
        let err = loader
            .load_lazy(&LazyKey::Events { native_order: 0 }, true)
            .unwrap_err();
        assert!(matches!(err, RhdError::Unresolvable { .. }));
    }

    #[test]
    fn lazy_and_eager_loads_agree() {
        let dir = TempDir::new().unwrap();
        let path = Fixture::standard(2, 2, 1, 1, 0, 0).write_to(dir.path(), "rec.rhd");
        let reader = RhdReader::open(&path).unwrap();
        let source = &*reader.source;
        for kind in GroupKind::ANALOG {
            let key = LazyKey::Signal(kind);
            let narrow: AnalogSignal = source.load_lazy(&key, true).unwrap();
            let full: AnalogSignal = source.load_lazy(&key, false).unwrap();
            assert_eq!(narrow, full);
        }
    }

    #[test]
    fn file_removed_after_lazy_read_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let path = Fixture::standard(1, 0, 0, 0, 0, 0).write_to(dir.path(), "rec.rhd");
        let segment = read_segment(&path, true, true, &ReadOptions::default()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(segment.signals.get(0), Err(RhdError::Io(_))));
        assert!(!segment.signals.is_resolved(0));
    }
}
