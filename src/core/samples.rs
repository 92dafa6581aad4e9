// Data block decoding
//
// The body is a run of fixed-stride data blocks. Each block holds, in order:
// timestamps, amplifier, aux input, supply voltage, temperature, board ADC,
// digital-in words and digital-out words. Within a section samples are
// channel-major, so scattering a block into [channels x samples] arrays is
// a straight copy per channel.

use crate::core::constants::*;
use crate::core::error::{RhdError, Result};
use crate::core::format::{GroupKind, RhdHeader};
use crate::core::stream::ByteReader;
use bitflags::bitflags;
use ndarray::Array2;
use std::collections::BTreeMap;
use std::io::Read;
use tracing::{debug, warn};

bitflags! {
    /// Which channel groups a decode pass materializes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GroupSet: u8 {
        const AMPLIFIER = 1 << 0;
        const AUX_INPUT = 1 << 1;
        const SUPPLY_VOLTAGE = 1 << 2;
        const BOARD_ADC = 1 << 3;
        const DIGITAL_IN = 1 << 4;
    }
}

impl From<GroupKind> for GroupSet {
    fn from(kind: GroupKind) -> Self {
        match kind {
            GroupKind::Amplifier => GroupSet::AMPLIFIER,
            GroupKind::AuxInput => GroupSet::AUX_INPUT,
            GroupKind::SupplyVoltage => GroupSet::SUPPLY_VOLTAGE,
            GroupKind::BoardAdc => GroupSet::BOARD_ADC,
            GroupKind::DigitalIn => GroupSet::DIGITAL_IN,
        }
    }
}

/// Decoded body of one file.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleData {
    /// Samples per amplifier channel, also known for a lazy decode.
    pub num_samples: usize,
    /// True when nothing was read and every array is empty.
    pub lazy: bool,
    pub timestamps: Vec<i64>,
    /// Physical-unit arrays shaped [channels x samples], per selected analog group.
    pub analog: BTreeMap<GroupKind, Array2<f64>>,
    /// Raw digital-in word per timestep.
    pub dig_in_words: Vec<u16>,
}

impl SampleData {
    pub fn analog(&self, kind: GroupKind) -> Option<&Array2<f64>> {
        self.analog.get(&kind)
    }

    pub fn take_analog(&mut self, kind: GroupKind) -> Option<Array2<f64>> {
        self.analog.remove(&kind)
    }
}

pub struct SampleDecoder<'a> {
    header: &'a RhdHeader,
    body_offset: u64,
    block_len: usize,
    num_blocks: usize,
}

impl<'a> SampleDecoder<'a> {
    /// Checks that `body_len` bytes hold a whole number of data blocks.
    pub fn new(header: &'a RhdHeader, body_offset: u64, body_len: u64) -> Result<Self> {
        let block_len = header.bytes_per_data_block();
        let num_blocks = (body_len / block_len as u64) as usize;
        let remainder = body_len % block_len as u64;
        if remainder != 0 {
            let partial_at = body_offset + (num_blocks * block_len) as u64;
            return Err(RhdError::truncated(
                partial_at,
                format!(
                    "data block {} ({} of {} bytes present)",
                    num_blocks, remainder, block_len
                ),
            ));
        }

        Ok(Self {
            header,
            body_offset,
            block_len,
            num_blocks,
        })
    }

    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    pub fn num_samples(&self) -> usize {
        self.num_blocks * self.header.num_samples_per_data_block
    }

    /// Decodes the selected groups in one forward pass over the body.
    /// With `lazy` nothing is read: the arrays come back with zero samples.
    pub fn decode<R: Read>(
        &self,
        reader: &mut ByteReader<R>,
        groups: GroupSet,
        lazy: bool,
    ) -> Result<SampleData> {
        let header = self.header;
        let kept = |kind: GroupKind| groups.contains(kind.into()) && header.is_present(kind);
        let samples_for = |kind: GroupKind| {
            if lazy {
                0
            } else {
                header.samples_per_block(kind) * self.num_blocks
            }
        };

        let mut analog = BTreeMap::new();
        for kind in GroupKind::ANALOG {
            if kept(kind) {
                let shape = (header.channels(kind).len(), samples_for(kind));
                analog.insert(kind, Array2::<f64>::zeros(shape));
            }
        }

        let mut data = SampleData {
            num_samples: self.num_samples(),
            lazy,
            timestamps: Vec::new(),
            analog,
            dig_in_words: Vec::new(),
        };
        if lazy {
            debug!("Lazy sample decode: {} samples deferred", data.num_samples);
            return Ok(data);
        }

        if reader.offset() != self.body_offset {
            return Err(RhdError::format(
                reader.offset(),
                format!("sample decode must start at body offset {}", self.body_offset),
            ));
        }

        data.timestamps.reserve(self.num_samples());
        if kept(GroupKind::DigitalIn) {
            data.dig_in_words.reserve(self.num_samples());
        }

        let mut block = vec![0u8; self.block_len];
        for index in 0..self.num_blocks {
            reader.read_exact(&mut block, &format!("data block {}", index))?;
            self.scatter_block(&block, index, &kept, &mut data);
        }

        report_timestamp_gaps(&data.timestamps);
        Ok(data)
    }

    fn scatter_block(
        &self,
        block: &[u8],
        index: usize,
        kept: &dyn Fn(GroupKind) -> bool,
        data: &mut SampleData,
    ) {
        let header = self.header;
        let n = header.num_samples_per_data_block;
        let mut pos = 0;

        let signed = header.signed_timestamps();
        for word in block[..4 * n].chunks_exact(4) {
            let bytes = [word[0], word[1], word[2], word[3]];
            data.timestamps.push(if signed {
                i32::from_le_bytes(bytes) as i64
            } else {
                u32::from_le_bytes(bytes) as i64
            });
        }
        pos += 4 * n;

        let layout = [
            Section::Analog(GroupKind::Amplifier),
            Section::Analog(GroupKind::AuxInput),
            Section::Analog(GroupKind::SupplyVoltage),
            Section::Temperature,
            Section::Analog(GroupKind::BoardAdc),
            Section::DigitalIn,
            Section::DigitalOut,
        ];

        for section in layout {
            match section {
                Section::Analog(kind) => {
                    let per_channel = header.samples_per_block(kind);
                    let channels = header.channels(kind).len();
                    let len = 2 * per_channel * channels;
                    // Only kept groups have an array to fill
                    if let Some(array) = data.analog.get_mut(&kind) {
                        let bytes = &block[pos..pos + len];
                        let start = index * per_channel;
                        for (ch, row) in bytes.chunks_exact(2 * per_channel).enumerate() {
                            for (s, raw) in row.chunks_exact(2).enumerate() {
                                let raw = u16::from_le_bytes([raw[0], raw[1]]);
                                array[[ch, start + s]] = scale(kind, raw, header.eval_board_mode);
                            }
                        }
                    }
                    pos += len;
                }
                Section::Temperature => pos += 2 * header.num_temp_sensor_channels,
                Section::DigitalIn => {
                    if header.board_dig_in_channels.is_empty() {
                        continue;
                    }
                    if kept(GroupKind::DigitalIn) {
                        data.dig_in_words.extend(
                            block[pos..pos + 2 * n]
                                .chunks_exact(2)
                                .map(|w| u16::from_le_bytes([w[0], w[1]])),
                        );
                    }
                    pos += 2 * n;
                }
                Section::DigitalOut => {
                    if !header.board_dig_out_channels.is_empty() {
                        pos += 2 * n;
                    }
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Section {
    Analog(GroupKind),
    Temperature,
    DigitalIn,
    DigitalOut,
}

/// Converts a raw word to the group's physical unit.
pub fn scale(kind: GroupKind, raw: u16, eval_board_mode: i16) -> f64 {
    let raw = raw as f64;
    match kind {
        GroupKind::Amplifier => AMPLIFIER_UV_PER_BIT * (raw - AMPLIFIER_OFFSET),
        GroupKind::AuxInput => AUX_V_PER_BIT * raw,
        GroupKind::SupplyVoltage => SUPPLY_V_PER_BIT * raw,
        GroupKind::BoardAdc => match eval_board_mode {
            1 => ADC_V_PER_BIT_MODE_1 * (raw - ADC_OFFSET),
            13 => ADC_V_PER_BIT_MODE_13 * (raw - ADC_OFFSET),
            _ => ADC_V_PER_BIT * raw,
        },
        GroupKind::DigitalIn => raw,
    }
}

fn report_timestamp_gaps(timestamps: &[i64]) {
    let gaps = timestamps
        .windows(2)
        .filter(|pair| pair[1] != pair[0] + 1)
        .count();
    if gaps > 0 {
        warn!("{} gaps in timestamp data found", gaps);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::header::read_header;
    use crate::core::testutil::*;
    use std::io::Cursor;

    fn decode(fixture: &Fixture, groups: GroupSet, lazy: bool) -> Result<(RhdHeader, SampleData)> {
        let bytes = fixture.to_bytes();
        let total = bytes.len() as u64;
        let mut reader = ByteReader::new(Cursor::new(bytes));
        let header = read_header(&mut reader)?;
        let body_offset = reader.offset();
        let data = SampleDecoder::new(&header, body_offset, total - body_offset)?
            .decode(&mut reader, groups, lazy)?;
        Ok((header, data))
    }

    #[test]
    fn decodes_every_group_in_physical_units() {
        let mut fixture = Fixture::standard(3, 2, 1, 2, 2, 1);
        fixture.num_blocks = 3;
        fixture.num_temp_sensors = 1;
        fixture.dig_in_words = words_with_pulses(180, 1, &[5, 100]);
        let (_, data) = decode(&fixture, GroupSet::all(), false).unwrap();

        assert_eq!(data.num_samples, 180);
        assert_eq!(data.timestamps.len(), 180);
        assert_eq!(data.timestamps[179], 179);

        let amp = data.analog(GroupKind::Amplifier).unwrap();
        assert_eq!(amp.dim(), (3, 180));
        for (ch, t) in [(0, 0), (2, 61), (1, 179)] {
            let expected = 0.195 * (amplifier_raw(ch, t) as f64 - 32768.0);
            assert!((amp[[ch, t]] - expected).abs() < 1e-9);
        }

        let aux = data.analog(GroupKind::AuxInput).unwrap();
        assert_eq!(aux.dim(), (2, 45));
        assert!((aux[[1, 20]] - 37.4e-6 * aux_raw(1, 20) as f64).abs() < 1e-12);

        let supply = data.analog(GroupKind::SupplyVoltage).unwrap();
        assert_eq!(supply.dim(), (1, 3));
        assert!((supply[[0, 2]] - 74.8e-6 * supply_raw(0, 2) as f64).abs() < 1e-12);

        let adc = data.analog(GroupKind::BoardAdc).unwrap();
        assert_eq!(adc.dim(), (2, 180));
        assert!((adc[[1, 70]] - 50.354e-6 * adc_raw(1, 70) as f64).abs() < 1e-12);

        assert_eq!(data.dig_in_words.len(), 180);
        assert_eq!(data.dig_in_words[5], 0b10);
        assert_eq!(data.dig_in_words[100], 0b10);
    }

    #[test]
    fn selection_limits_what_is_materialized() {
        let fixture = Fixture::standard(2, 1, 0, 1, 1, 0);
        let (_, data) = decode(&fixture, GroupSet::BOARD_ADC, false).unwrap();
        assert_eq!(data.analog.len(), 1);
        assert_eq!(data.analog(GroupKind::BoardAdc).unwrap().dim(), (1, 120));
        assert!(data.dig_in_words.is_empty());
    }

    #[test]
    fn selective_decode_matches_full_decode() {
        let fixture = Fixture::standard(2, 3, 1, 2, 1, 1);
        let (_, full) = decode(&fixture, GroupSet::all(), false).unwrap();
        let (_, aux_only) = decode(&fixture, GroupSet::AUX_INPUT, false).unwrap();
        assert_eq!(
            full.analog(GroupKind::AuxInput),
            aux_only.analog(GroupKind::AuxInput)
        );
    }

    #[test]
    fn lazy_decode_reads_nothing() {
        let fixture = Fixture::standard(4, 0, 0, 1, 0, 0);
        let (_, data) = decode(&fixture, GroupSet::all(), true).unwrap();
        assert!(data.lazy);
        assert_eq!(data.num_samples, 120);
        assert_eq!(data.analog(GroupKind::Amplifier).unwrap().dim(), (4, 0));
        assert!(data.timestamps.is_empty());
    }

    #[test]
    fn partial_trailing_block_is_truncated() {
        let fixture = Fixture::standard(2, 0, 0, 0, 0, 0);
        let mut bytes = fixture.to_bytes();
        bytes.truncate(bytes.len() - 7);
        let total = bytes.len() as u64;
        let mut reader = ByteReader::new(Cursor::new(bytes));
        let header = read_header(&mut reader).unwrap();
        let err = SampleDecoder::new(&header, reader.offset(), total - reader.offset())
            .err()
            .unwrap();
        assert!(err.is_truncated());
    }

    #[test]
    fn eval_board_modes_change_adc_scaling() {
        assert!((scale(GroupKind::BoardAdc, 32768 + 100, 1) - 100.0 * 152.59e-6).abs() < 1e-12);
        assert!((scale(GroupKind::BoardAdc, 32768 - 100, 13) + 100.0 * 312.5e-6).abs() < 1e-12);
        assert!((scale(GroupKind::BoardAdc, 1000, 0) - 1000.0 * 50.354e-6).abs() < 1e-12);
        assert_eq!(scale(GroupKind::Amplifier, 32768, 0), 0.0);
    }

    #[test]
    fn version_three_blocks_hold_128_samples() {
        let mut fixture = Fixture::standard(1, 1, 0, 0, 0, 0);
        fixture.major = 3;
        fixture.minor = 0;
        let (header, data) = decode(&fixture, GroupSet::all(), false).unwrap();
        assert_eq!(header.num_samples_per_data_block, 128);
        assert_eq!(data.num_samples, 256);
        assert_eq!(data.analog(GroupKind::AuxInput).unwrap().dim(), (1, 64));
    }
}
