// Synthetic RHD files for tests. Plain std so tests/ can include it by path.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const MAGIC: u32 = 0xC691_2702;

pub const TYPE_AMPLIFIER: i16 = 0;
pub const TYPE_AUX: i16 = 1;
pub const TYPE_SUPPLY: i16 = 2;
pub const TYPE_ADC: i16 = 3;
pub const TYPE_DIG_IN: i16 = 4;
pub const TYPE_DIG_OUT: i16 = 5;

#[derive(Debug, Clone)]
pub struct ChannelDef {
    pub native_name: String,
    pub custom_name: String,
    pub native_order: i16,
    pub custom_order: i16,
    pub signal_type: i16,
    pub enabled: bool,
    pub impedance: (f32, f32),
}

impl ChannelDef {
    pub fn new(native_name: &str, native_order: i16, signal_type: i16) -> Self {
        Self {
            native_name: native_name.to_string(),
            custom_name: native_name.to_string(),
            native_order,
            custom_order: native_order,
            signal_type,
            enabled: true,
            impedance: (1.5e5, -30.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GroupDef {
    pub name: String,
    pub prefix: String,
    pub enabled: bool,
    pub channels: Vec<ChannelDef>,
    /// Overrides the amplifier count written in the group header.
    pub declared_amplifiers: Option<i16>,
}

impl GroupDef {
    pub fn new(name: &str, prefix: &str, channels: Vec<ChannelDef>) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            enabled: true,
            channels,
            declared_amplifiers: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Fixture {
    pub major: i16,
    pub minor: i16,
    pub sample_rate: f32,
    pub notes: [String; 3],
    pub notch_mode: i16,
    pub num_temp_sensors: i16,
    pub eval_board_mode: i16,
    pub reference_channel: String,
    pub groups: Vec<GroupDef>,
    pub num_blocks: usize,
    /// One word per timestep; missing words are written as zero.
    pub dig_in_words: Vec<u16>,
}

pub fn amplifier_raw(ch: usize, t: usize) -> u16 {
    (32768 + ch * 1000 + t % 1000) as u16
}

pub fn aux_raw(ch: usize, t: usize) -> u16 {
    (ch * 100 + t % 100) as u16
}

pub fn supply_raw(ch: usize, block: usize) -> u16 {
    (40000 + ch * 10 + block) as u16
}

pub fn adc_raw(ch: usize, t: usize) -> u16 {
    (32768 + ch * 10 + t % 500) as u16
}

impl Fixture {
    /// v1.3 file with a Port A group (amplifier, aux, supply), board ADC,
    /// digital in and digital out groups, plus an empty disabled Port B.
    pub fn standard(
        amplifiers: usize,
        aux: usize,
        supply: usize,
        adc: usize,
        dig_in: usize,
        dig_out: usize,
    ) -> Self {
        let mut port_a = Vec::new();
        for i in 0..amplifiers {
            port_a.push(ChannelDef::new(&format!("A-{:03}", i), i as i16, TYPE_AMPLIFIER));
        }
        for i in 0..aux {
            port_a.push(ChannelDef::new(&format!("A-AUX{}", i + 1), i as i16, TYPE_AUX));
        }
        for i in 0..supply {
            port_a.push(ChannelDef::new(&format!("A-VDD{}", i + 1), i as i16, TYPE_SUPPLY));
        }

        let mut groups = vec![GroupDef::new("Port A", "A", port_a)];
        let mut port_b = GroupDef::new("Port B", "B", Vec::new());
        port_b.enabled = false;
        groups.push(port_b);

        let board = |name: &str, prefix: &str, count: usize, signal_type: i16| {
            let channels = (0..count)
                .map(|i| ChannelDef::new(&format!("{}-{:02}", prefix, i), i as i16, signal_type))
                .collect();
            GroupDef::new(name, prefix, channels)
        };
        groups.push(board("Board ADC Inputs", "ADC", adc, TYPE_ADC));
        groups.push(board("Board Digital Inputs", "DIN", dig_in, TYPE_DIG_IN));
        groups.push(board("Board Digital Outputs", "DOUT", dig_out, TYPE_DIG_OUT));

        Self {
            major: 1,
            minor: 3,
            sample_rate: 20000.0,
            notes: [
                "left hemisphere".to_string(),
                String::new(),
                "session 4".to_string(),
            ],
            notch_mode: 2,
            num_temp_sensors: 0,
            eval_board_mode: 0,
            reference_channel: String::new(),
            groups,
            num_blocks: 2,
            dig_in_words: Vec::new(),
        }
    }

    pub fn samples_per_block(&self) -> usize {
        if self.major >= 3 {
            128
        } else {
            60
        }
    }

    pub fn num_samples(&self) -> usize {
        self.samples_per_block() * self.num_blocks
    }

    fn at_least(&self, major: i16, minor: i16) -> bool {
        (self.major, self.minor) >= (major, minor)
    }

    /// Channels of one type that actually land in the data blocks.
    pub fn enabled_of(&self, signal_type: i16) -> usize {
        self.groups
            .iter()
            .filter(|g| g.enabled)
            .flat_map(|g| g.channels.iter())
            .filter(|c| c.enabled && c.signal_type == signal_type)
            .count()
    }

    pub fn bytes_per_block(&self) -> usize {
        let n = self.samples_per_block();
        let mut bytes = 4 * n;
        bytes += 2 * n * self.enabled_of(TYPE_AMPLIFIER);
        bytes += 2 * (n / 4) * self.enabled_of(TYPE_AUX);
        bytes += 2 * self.enabled_of(TYPE_SUPPLY);
        bytes += 2 * self.num_temp_sensors as usize;
        bytes += 2 * n * self.enabled_of(TYPE_ADC);
        if self.enabled_of(TYPE_DIG_IN) > 0 {
            bytes += 2 * n;
        }
        if self.enabled_of(TYPE_DIG_OUT) > 0 {
            bytes += 2 * n;
        }
        bytes
    }

    pub fn header_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, MAGIC);
        put_i16(&mut out, self.major);
        put_i16(&mut out, self.minor);
        put_f32(&mut out, self.sample_rate);
        put_i16(&mut out, 1); // dsp enabled
        for value in [1.2f32, 0.1, 7500.0, 1.0, 0.09, 7400.0] {
            put_f32(&mut out, value);
        }
        put_i16(&mut out, self.notch_mode);
        put_f32(&mut out, 1000.0);
        put_f32(&mut out, 1000.0);
        for note in &self.notes {
            put_qstring(&mut out, note);
        }
        if self.at_least(1, 1) {
            put_i16(&mut out, self.num_temp_sensors);
        }
        if self.at_least(1, 3) {
            put_i16(&mut out, self.eval_board_mode);
        }
        if self.major > 1 {
            put_qstring(&mut out, &self.reference_channel);
        }

        put_i16(&mut out, self.groups.len() as i16);
        for (g, group) in self.groups.iter().enumerate() {
            put_qstring(&mut out, &group.name);
            put_qstring(&mut out, &group.prefix);
            put_i16(&mut out, group.enabled as i16);
            put_i16(&mut out, group.channels.len() as i16);
            let amplifiers = group
                .channels
                .iter()
                .filter(|c| c.signal_type == TYPE_AMPLIFIER)
                .count() as i16;
            put_i16(&mut out, group.declared_amplifiers.unwrap_or(amplifiers));
            if !group.enabled {
                continue;
            }
            for (i, ch) in group.channels.iter().enumerate() {
                put_qstring(&mut out, &ch.native_name);
                put_qstring(&mut out, &ch.custom_name);
                put_i16(&mut out, ch.native_order);
                put_i16(&mut out, ch.custom_order);
                put_i16(&mut out, ch.signal_type);
                put_i16(&mut out, ch.enabled as i16);
                put_i16(&mut out, i as i16); // chip channel
                put_i16(&mut out, g as i16); // board stream
                for trigger in [0i16, -70, 0, 0] {
                    put_i16(&mut out, trigger);
                }
                put_f32(&mut out, ch.impedance.0);
                put_f32(&mut out, ch.impedance.1);
            }
        }
        out
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        let n = self.samples_per_block();
        let quarter = n / 4;
        let amplifiers = self.enabled_of(TYPE_AMPLIFIER);
        let aux = self.enabled_of(TYPE_AUX);
        let supply = self.enabled_of(TYPE_SUPPLY);
        let adc = self.enabled_of(TYPE_ADC);

        let mut out = Vec::with_capacity(self.bytes_per_block() * self.num_blocks);
        for b in 0..self.num_blocks {
            for s in 0..n {
                let t = (b * n + s) as u32;
                out.extend_from_slice(&t.to_le_bytes());
            }
            for ch in 0..amplifiers {
                for s in 0..n {
                    put_u16(&mut out, amplifier_raw(ch, b * n + s));
                }
            }
            for ch in 0..aux {
                for s in 0..quarter {
                    put_u16(&mut out, aux_raw(ch, b * quarter + s));
                }
            }
            for ch in 0..supply {
                put_u16(&mut out, supply_raw(ch, b));
            }
            for i in 0..self.num_temp_sensors {
                put_i16(&mut out, 2500 + i);
            }
            for ch in 0..adc {
                for s in 0..n {
                    put_u16(&mut out, adc_raw(ch, b * n + s));
                }
            }
            if self.enabled_of(TYPE_DIG_IN) > 0 {
                for s in 0..n {
                    let word = self.dig_in_words.get(b * n + s).copied().unwrap_or(0);
                    put_u16(&mut out, word);
                }
            }
            if self.enabled_of(TYPE_DIG_OUT) > 0 {
                for _ in 0..n {
                    put_u16(&mut out, 0);
                }
            }
        }
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.header_bytes();
        out.extend(self.body_bytes());
        out
    }

    pub fn write_to(&self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        fs::write(&path, self.to_bytes()).expect("write fixture");
        path
    }
}

/// Digital words with `bit` set at each of `indexes`.
pub fn words_with_pulses(len: usize, bit: u32, indexes: &[usize]) -> Vec<u16> {
    let mut words = vec![0u16; len];
    for &i in indexes {
        words[i] |= 1 << bit;
    }
    words
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_qstring(out: &mut Vec<u8>, s: &str) {
    if s.is_empty() {
        put_u32(out, 0xFFFF_FFFF);
        return;
    }
    let units: Vec<u16> = s.encode_utf16().collect();
    put_u32(out, (units.len() * 2) as u32);
    for u in units {
        put_u16(out, u);
    }
}
