// Format constants for Intan RHD files

/// Leading magic number of every RHD file.
pub const RHD_MAGIC: u32 = 0xC691_2702;

/// Oldest and newest major header versions this reader understands.
pub const MIN_MAJOR_VERSION: i16 = 1;
pub const MAX_MAJOR_VERSION: i16 = 3;

// Samples per data block: 60 before v3.0, 128 from v3.0 on
pub const SAMPLES_PER_BLOCK_V1: usize = 60;
pub const SAMPLES_PER_BLOCK_V3: usize = 128;

/// Aux inputs are sampled once every four amplifier samples.
pub const AUX_DECIMATION: usize = 4;

/// QString length marker for an empty (null) string.
pub const QSTRING_NULL: u32 = 0xFFFF_FFFF;

// Guard against garbage lengths; real header strings are short
pub const QSTRING_MAX_BYTES: u32 = 1 << 20;

/// Digital lines are packed into one 16-bit word per timestep.
pub const DIGITAL_WORD_BITS: usize = 16;

pub const SAMPLE_RATE_SUFFIX: &str = "_sample_rate";

// Scale factors: raw u16 word -> physical unit
pub const AMPLIFIER_UV_PER_BIT: f64 = 0.195;
pub const AMPLIFIER_OFFSET: f64 = 32768.0;
pub const AUX_V_PER_BIT: f64 = 37.4e-6;
pub const SUPPLY_V_PER_BIT: f64 = 74.8e-6;
pub const ADC_V_PER_BIT: f64 = 50.354e-6;
pub const ADC_V_PER_BIT_MODE_1: f64 = 152.59e-6;
pub const ADC_V_PER_BIT_MODE_13: f64 = 312.5e-6;
pub const ADC_OFFSET: f64 = 32768.0;

/// Per-channel signal type codes stored in the channel tables.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum SignalType {
    Amplifier = 0,
    AuxInput = 1,
    SupplyVoltage = 2,
    BoardAdc = 3,
    BoardDigitalIn = 4,
    BoardDigitalOut = 5,
}

impl SignalType {
    pub fn from_i16(val: i16) -> Option<Self> {
        match val {
            0 => Some(SignalType::Amplifier),
            1 => Some(SignalType::AuxInput),
            2 => Some(SignalType::SupplyVoltage),
            3 => Some(SignalType::BoardAdc),
            4 => Some(SignalType::BoardDigitalIn),
            5 => Some(SignalType::BoardDigitalOut),
            _ => None,
        }
    }
}

// Notch filter mode codes
pub const NOTCH_MODE_50HZ: i16 = 1;
pub const NOTCH_MODE_60HZ: i16 = 2;
