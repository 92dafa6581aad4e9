// Data structures for the RHD header

use crate::core::constants::*;
use crate::core::model::AnnotationValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub major: i16,
    pub minor: i16,
}

impl Version {
    pub fn at_least(&self, major: i16, minor: i16) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Physical unit of an analog channel group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    Microvolt,
    Volt,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Microvolt => "uV",
            Unit::Volt => "V",
        }
    }
}

/// The channel groups a recording is split into. Declaration order is
/// processing order: the amplifier group always comes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GroupKind {
    Amplifier,
    AuxInput,
    SupplyVoltage,
    BoardAdc,
    DigitalIn,
}

impl GroupKind {
    pub const ALL: [GroupKind; 5] = [
        GroupKind::Amplifier,
        GroupKind::AuxInput,
        GroupKind::SupplyVoltage,
        GroupKind::BoardAdc,
        GroupKind::DigitalIn,
    ];

    pub const ANALOG: [GroupKind; 4] = [
        GroupKind::Amplifier,
        GroupKind::AuxInput,
        GroupKind::SupplyVoltage,
        GroupKind::BoardAdc,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GroupKind::Amplifier => "Amplifier",
            GroupKind::AuxInput => "AuxData",
            GroupKind::SupplyVoltage => "SupplyVoltage",
            GroupKind::BoardAdc => "ADC",
            GroupKind::DigitalIn => "EventData",
        }
    }

    /// `None` for the digital group, which yields events rather than a signal.
    pub fn unit(&self) -> Option<Unit> {
        match self {
            GroupKind::Amplifier => Some(Unit::Microvolt),
            GroupKind::AuxInput | GroupKind::SupplyVoltage | GroupKind::BoardAdc => {
                Some(Unit::Volt)
            }
            GroupKind::DigitalIn => None,
        }
    }

    pub fn signal_type(&self) -> SignalType {
        match self {
            GroupKind::Amplifier => SignalType::Amplifier,
            GroupKind::AuxInput => SignalType::AuxInput,
            GroupKind::SupplyVoltage => SignalType::SupplyVoltage,
            GroupKind::BoardAdc => SignalType::BoardAdc,
            GroupKind::DigitalIn => SignalType::BoardDigitalIn,
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Impedance {
    pub magnitude: f64,
    pub phase: f64,
}

/// One entry of a channel table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub port_name: String,
    pub port_prefix: String,
    pub port_number: usize,
    pub native_channel_name: String,
    pub native_order: i32,
    /// User-assigned name and order; `None` when the user never renamed the channel.
    pub custom_channel_name: Option<String>,
    pub custom_order: Option<i32>,
    pub signal_type: SignalType,
    pub chip_channel: i32,
    pub board_stream: i32,
    /// Only amplifier channels carry impedance measurements.
    pub impedance: Option<Impedance>,
}

impl ChannelDescriptor {
    /// Custom name if set, native name otherwise.
    pub fn display_name(&self) -> &str {
        self.custom_channel_name
            .as_deref()
            .unwrap_or(&self.native_channel_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpikeTrigger {
    pub voltage_trigger_mode: i16,
    pub voltage_threshold: i16,
    pub digital_trigger_channel: i16,
    pub digital_edge_polarity: i16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalGroupInfo {
    pub name: String,
    pub prefix: String,
    pub enabled: bool,
    pub num_channels: usize,
    pub num_amplifier_channels: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyParameters {
    pub amplifier_sample_rate: f64,
    pub aux_input_sample_rate: f64,
    pub supply_voltage_sample_rate: f64,
    pub board_adc_sample_rate: f64,
    pub board_dig_in_sample_rate: f64,
    pub desired_dsp_cutoff_frequency: f64,
    pub actual_dsp_cutoff_frequency: f64,
    pub dsp_enabled: bool,
    pub desired_lower_bandwidth: f64,
    pub actual_lower_bandwidth: f64,
    pub desired_upper_bandwidth: f64,
    pub actual_upper_bandwidth: f64,
    /// 0 when the notch filter is off.
    pub notch_filter_frequency: f64,
    pub desired_impedance_test_frequency: f64,
    pub actual_impedance_test_frequency: f64,
}

impl FrequencyParameters {
    /// Flattens the parameters into `(key, value)` pairs, sample rates included.
    pub fn entries(&self) -> Vec<(&'static str, AnnotationValue)> {
        vec![
            ("amplifier_sample_rate", self.amplifier_sample_rate.into()),
            ("aux_input_sample_rate", self.aux_input_sample_rate.into()),
            ("supply_voltage_sample_rate", self.supply_voltage_sample_rate.into()),
            ("board_adc_sample_rate", self.board_adc_sample_rate.into()),
            ("board_dig_in_sample_rate", self.board_dig_in_sample_rate.into()),
            ("desired_dsp_cutoff_frequency", self.desired_dsp_cutoff_frequency.into()),
            ("actual_dsp_cutoff_frequency", self.actual_dsp_cutoff_frequency.into()),
            ("dsp_enabled", self.dsp_enabled.into()),
            ("desired_lower_bandwidth", self.desired_lower_bandwidth.into()),
            ("actual_lower_bandwidth", self.actual_lower_bandwidth.into()),
            ("desired_upper_bandwidth", self.desired_upper_bandwidth.into()),
            ("actual_upper_bandwidth", self.actual_upper_bandwidth.into()),
            ("notch_filter_frequency", self.notch_filter_frequency.into()),
            ("desired_impedance_test_frequency", self.desired_impedance_test_frequency.into()),
            ("actual_impedance_test_frequency", self.actual_impedance_test_frequency.into()),
        ]
    }
}

/// Everything the RHD header declares. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhdHeader {
    pub version: Version,
    pub sample_rate: f64,
    pub num_samples_per_data_block: usize,
    pub frequency_parameters: FrequencyParameters,
    pub notes: BTreeMap<String, String>,
    pub num_temp_sensor_channels: usize,
    pub eval_board_mode: i16,
    pub reference_channel: Option<String>,
    pub signal_groups: Vec<SignalGroupInfo>,
    pub amplifier_channels: Vec<ChannelDescriptor>,
    pub aux_input_channels: Vec<ChannelDescriptor>,
    pub supply_voltage_channels: Vec<ChannelDescriptor>,
    pub board_adc_channels: Vec<ChannelDescriptor>,
    pub board_dig_in_channels: Vec<ChannelDescriptor>,
    pub board_dig_out_channels: Vec<ChannelDescriptor>,
    pub spike_triggers: Vec<SpikeTrigger>,
}

impl RhdHeader {
    pub fn channels(&self, kind: GroupKind) -> &[ChannelDescriptor] {
        match kind {
            GroupKind::Amplifier => &self.amplifier_channels,
            GroupKind::AuxInput => &self.aux_input_channels,
            GroupKind::SupplyVoltage => &self.supply_voltage_channels,
            GroupKind::BoardAdc => &self.board_adc_channels,
            GroupKind::DigitalIn => &self.board_dig_in_channels,
        }
    }

    /// Amplifier data is mandatory; every other group exists only when it has channels.
    pub fn is_present(&self, kind: GroupKind) -> bool {
        kind == GroupKind::Amplifier || !self.channels(kind).is_empty()
    }

    pub fn sample_rate_of(&self, kind: GroupKind) -> f64 {
        let freq = &self.frequency_parameters;
        match kind {
            GroupKind::Amplifier => freq.amplifier_sample_rate,
            GroupKind::AuxInput => freq.aux_input_sample_rate,
            GroupKind::SupplyVoltage => freq.supply_voltage_sample_rate,
            GroupKind::BoardAdc => freq.board_adc_sample_rate,
            GroupKind::DigitalIn => freq.board_dig_in_sample_rate,
        }
    }

    /// Samples each channel of `kind` contributes to one data block.
    pub fn samples_per_block(&self, kind: GroupKind) -> usize {
        let n = self.num_samples_per_data_block;
        match kind {
            GroupKind::Amplifier | GroupKind::BoardAdc | GroupKind::DigitalIn => n,
            GroupKind::AuxInput => n / AUX_DECIMATION,
            GroupKind::SupplyVoltage => 1,
        }
    }

    /// Timestamps became signed in v1.2.
    pub fn signed_timestamps(&self) -> bool {
        self.version.at_least(1, 2)
    }

    /// Byte stride of one data block in the body.
    pub fn bytes_per_data_block(&self) -> usize {
        let n = self.num_samples_per_data_block;
        let mut bytes = 4 * n;
        bytes += 2 * n * self.amplifier_channels.len();
        bytes += 2 * (n / AUX_DECIMATION) * self.aux_input_channels.len();
        bytes += 2 * self.supply_voltage_channels.len();
        bytes += 2 * self.num_temp_sensor_channels;
        bytes += 2 * n * self.board_adc_channels.len();
        if !self.board_dig_in_channels.is_empty() {
            bytes += 2 * n;
        }
        if !self.board_dig_out_channels.is_empty() {
            bytes += 2 * n;
        }
        bytes
    }

    pub fn summary(&self) -> HeaderSummary {
        HeaderSummary {
            version: self.version.to_string(),
            sample_rate: self.sample_rate,
            amplifier_channels: self.amplifier_channels.len(),
            aux_input_channels: self.aux_input_channels.len(),
            supply_voltage_channels: self.supply_voltage_channels.len(),
            board_adc_channels: self.board_adc_channels.len(),
            board_dig_in_channels: self.board_dig_in_channels.len(),
            board_dig_out_channels: self.board_dig_out_channels.len(),
            temp_sensor_channels: self.num_temp_sensor_channels,
        }
    }
}

/// Channel counts and rate, as logged when a file is opened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderSummary {
    pub version: String,
    pub sample_rate: f64,
    pub amplifier_channels: usize,
    pub aux_input_channels: usize,
    pub supply_voltage_channels: usize,
    pub board_adc_channels: usize,
    pub board_dig_in_channels: usize,
    pub board_dig_out_channels: usize,
    pub temp_sensor_channels: usize,
}
