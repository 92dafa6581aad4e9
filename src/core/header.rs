// RHD header decoding
//
// The header is a single forward pass over little-endian fields:
// magic, version, sample rate, amplifier/DSP settings, notes, a few
// version-gated fields, then the signal group tables.

use crate::core::constants::*;
use crate::core::error::{RhdError, Result};
use crate::core::format::*;
use crate::core::stream::ByteReader;
use std::collections::BTreeMap;
use std::io::Read;
use tracing::debug;

/// Decodes a header from a stream positioned at offset 0.
pub fn decode_header<R: Read>(source: R) -> Result<RhdHeader> {
    read_header(&mut ByteReader::new(source))
}

/// Decodes a header, leaving `reader` positioned at the first data block.
pub fn read_header<R: Read>(reader: &mut ByteReader<R>) -> Result<RhdHeader> {
    let mut magic_bytes = [0u8; 4];
    let read = reader.read_up_to(&mut magic_bytes)?;
    let expected = RHD_MAGIC.to_le_bytes();
    if read < expected.len() {
        // Only a cut-off copy of the real magic counts as truncation
        if read > 0 && magic_bytes[..read] == expected[..read] {
            return Err(RhdError::truncated(0, "magic number"));
        }
        return Err(RhdError::format(
            0,
            format!("input is {} bytes long, too short for an RHD file", read),
        ));
    }
    let magic = u32::from_le_bytes(magic_bytes);
    if magic != RHD_MAGIC {
        return Err(RhdError::format(
            0,
            format!("unrecognized magic number {:#010x}, not an RHD file", magic),
        ));
    }

    let version_offset = reader.offset();
    let version = Version {
        major: reader.read_i16("version")?,
        minor: reader.read_i16("version")?,
    };
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&version.major) || version.minor < 0 {
        return Err(RhdError::format(
            version_offset,
            format!("unsupported RHD version {}", version),
        ));
    }
    debug!("RHD header version {}", version);

    let rate_offset = reader.offset();
    let sample_rate = reader.read_f32("sample rate")? as f64;
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(RhdError::format(
            rate_offset,
            format!("invalid sample rate {}", sample_rate),
        ));
    }
    let dsp_enabled = reader.read_i16("dsp settings")? != 0;
    let actual_dsp_cutoff_frequency = reader.read_f32("dsp settings")? as f64;
    let actual_lower_bandwidth = reader.read_f32("bandwidth settings")? as f64;
    let actual_upper_bandwidth = reader.read_f32("bandwidth settings")? as f64;
    let desired_dsp_cutoff_frequency = reader.read_f32("dsp settings")? as f64;
    let desired_lower_bandwidth = reader.read_f32("bandwidth settings")? as f64;
    let desired_upper_bandwidth = reader.read_f32("bandwidth settings")? as f64;

    let notch_filter_frequency = match reader.read_i16("notch filter mode")? {
        NOTCH_MODE_50HZ => 50.0,
        NOTCH_MODE_60HZ => 60.0,
        _ => 0.0,
    };

    let desired_impedance_test_frequency = reader.read_f32("impedance test frequency")? as f64;
    let actual_impedance_test_frequency = reader.read_f32("impedance test frequency")? as f64;

    let mut notes = BTreeMap::new();
    for key in ["note1", "note2", "note3"] {
        notes.insert(key.to_string(), reader.read_qstring("notes")?);
    }

    let num_temp_sensor_channels = if version.at_least(1, 1) {
        read_count(reader, "temperature sensor count")?
    } else {
        0
    };

    let eval_board_mode = if version.at_least(1, 3) {
        reader.read_i16("eval board mode")?
    } else {
        0
    };

    let reference_channel = if version.major > 1 {
        Some(reader.read_qstring("reference channel")?).filter(|s| !s.is_empty())
    } else {
        None
    };

    let num_samples_per_data_block = if version.major >= 3 {
        SAMPLES_PER_BLOCK_V3
    } else {
        SAMPLES_PER_BLOCK_V1
    };

    let frequency_parameters = FrequencyParameters {
        amplifier_sample_rate: sample_rate,
        aux_input_sample_rate: sample_rate / AUX_DECIMATION as f64,
        supply_voltage_sample_rate: sample_rate / num_samples_per_data_block as f64,
        board_adc_sample_rate: sample_rate,
        board_dig_in_sample_rate: sample_rate,
        desired_dsp_cutoff_frequency,
        actual_dsp_cutoff_frequency,
        dsp_enabled,
        desired_lower_bandwidth,
        actual_lower_bandwidth,
        desired_upper_bandwidth,
        actual_upper_bandwidth,
        notch_filter_frequency,
        desired_impedance_test_frequency,
        actual_impedance_test_frequency,
    };

    let mut header = RhdHeader {
        version,
        sample_rate,
        num_samples_per_data_block,
        frequency_parameters,
        notes,
        num_temp_sensor_channels,
        eval_board_mode,
        reference_channel,
        signal_groups: Vec::new(),
        amplifier_channels: Vec::new(),
        aux_input_channels: Vec::new(),
        supply_voltage_channels: Vec::new(),
        board_adc_channels: Vec::new(),
        board_dig_in_channels: Vec::new(),
        board_dig_out_channels: Vec::new(),
        spike_triggers: Vec::new(),
    };

    read_signal_groups(reader, &mut header)?;
    check_digital_inputs(&header)?;

    Ok(header)
}

/// An i16 count field; negative values are malformed.
fn read_count<R: Read>(reader: &mut ByteReader<R>, context: &str) -> Result<usize> {
    let offset = reader.offset();
    let value = reader.read_i16(context)?;
    usize::try_from(value)
        .map_err(|_| RhdError::format(offset, format!("negative {} ({})", context, value)))
}

fn read_signal_groups<R: Read>(reader: &mut ByteReader<R>, header: &mut RhdHeader) -> Result<()> {
    let num_groups = read_count(reader, "signal group count")?;

    for group_index in 0..num_groups {
        let name = reader.read_qstring("signal group name")?;
        let prefix = reader.read_qstring("signal group prefix")?;
        let enabled = reader.read_i16("signal group header")? != 0;
        let num_channels = read_count(reader, "signal group channel count")?;
        let num_amplifier_channels = read_count(reader, "signal group amplifier count")?;

        // Disabled groups carry no channel entries
        if enabled && num_channels > 0 {
            let mut amplifiers_found = 0;
            for _ in 0..num_channels {
                let (channel, channel_enabled, trigger) =
                    read_channel(reader, &name, &prefix, group_index + 1)?;
                if channel.signal_type == SignalType::Amplifier {
                    amplifiers_found += 1;
                }
                if channel_enabled {
                    add_channel(header, channel, trigger);
                }
            }

            if amplifiers_found != num_amplifier_channels {
                return Err(RhdError::ChannelMetadata {
                    group: name,
                    declared: num_amplifier_channels,
                    found: amplifiers_found,
                });
            }
        }

        header.signal_groups.push(SignalGroupInfo {
            name,
            prefix,
            enabled,
            num_channels,
            num_amplifier_channels,
        });
    }

    Ok(())
}

fn read_channel<R: Read>(
    reader: &mut ByteReader<R>,
    port_name: &str,
    port_prefix: &str,
    port_number: usize,
) -> Result<(ChannelDescriptor, bool, SpikeTrigger)> {
    let native_channel_name = reader.read_qstring("channel table")?;
    let custom_channel_name = reader.read_qstring("channel table")?;
    let native_order = reader.read_i16("channel table")? as i32;
    let custom_order = reader.read_i16("channel table")? as i32;

    let type_offset = reader.offset();
    let raw_type = reader.read_i16("channel table")?;
    let signal_type = SignalType::from_i16(raw_type).ok_or_else(|| {
        RhdError::format(
            type_offset,
            format!("unknown signal type {} for channel {}", raw_type, native_channel_name),
        )
    })?;

    let channel_enabled = reader.read_i16("channel table")? != 0;
    let chip_channel = reader.read_i16("channel table")? as i32;
    let board_stream = reader.read_i16("channel table")? as i32;
    let trigger = SpikeTrigger {
        voltage_trigger_mode: reader.read_i16("spike trigger table")?,
        voltage_threshold: reader.read_i16("spike trigger table")?,
        digital_trigger_channel: reader.read_i16("spike trigger table")?,
        digital_edge_polarity: reader.read_i16("spike trigger table")?,
    };
    let magnitude = reader.read_f32("impedance table")? as f64;
    let phase = reader.read_f32("impedance table")? as f64;

    let renamed = !custom_channel_name.is_empty() && custom_channel_name != native_channel_name;
    let channel = ChannelDescriptor {
        port_name: port_name.to_string(),
        port_prefix: port_prefix.to_string(),
        port_number,
        custom_channel_name: renamed.then_some(custom_channel_name),
        custom_order: (custom_order != native_order).then_some(custom_order),
        native_channel_name,
        native_order,
        signal_type,
        chip_channel,
        board_stream,
        impedance: (signal_type == SignalType::Amplifier).then_some(Impedance { magnitude, phase }),
    };

    Ok((channel, channel_enabled, trigger))
}

fn add_channel(header: &mut RhdHeader, channel: ChannelDescriptor, trigger: SpikeTrigger) {
    match channel.signal_type {
        SignalType::Amplifier => {
            header.amplifier_channels.push(channel);
            header.spike_triggers.push(trigger);
        }
        SignalType::AuxInput => header.aux_input_channels.push(channel),
        SignalType::SupplyVoltage => header.supply_voltage_channels.push(channel),
        SignalType::BoardAdc => header.board_adc_channels.push(channel),
        SignalType::BoardDigitalIn => header.board_dig_in_channels.push(channel),
        SignalType::BoardDigitalOut => header.board_dig_out_channels.push(channel),
    }
}

// Every digital input must map onto a bit of the 16-bit word.
fn check_digital_inputs(header: &RhdHeader) -> Result<()> {
    let channels = &header.board_dig_in_channels;
    if channels.len() > DIGITAL_WORD_BITS {
        return Err(RhdError::ChannelMetadata {
            group: GroupKind::DigitalIn.name().to_string(),
            declared: channels.len(),
            found: DIGITAL_WORD_BITS,
        });
    }
    if let Some(bad) = channels
        .iter()
        .find(|c| !(0..DIGITAL_WORD_BITS as i32).contains(&c.native_order))
    {
        return Err(RhdError::ChannelMetadata {
            group: format!("{} ({})", GroupKind::DigitalIn.name(), bad.native_channel_name),
            declared: bad.native_order.max(0) as usize,
            found: DIGITAL_WORD_BITS,
        });
    }
    Ok(())
}
