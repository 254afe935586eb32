//! Audio engine configuration constants and limits.

/// Number of peaking filters in each ear's band chain.
pub const NUM_BANDS: usize = 9;

/// Center frequency of each band filter, in Hz.
pub const CENTER_FREQUENCIES_HZ: [f32; NUM_BANDS] = [
    62.5, 125.0, 250.0, 500.0, 1_000.0, 2_000.0, 4_000.0, 8_000.0, 16_000.0,
];

/// Bandwidth of each band filter, in Hz.
///
/// Wide enough to cover the whole spectrum without the bands overlapping.
pub const BANDWIDTHS_HZ: [f32; NUM_BANDS] = [
    42.0, 83.0, 167.0, 333.0, 667.0, 1_333.0, 2_667.0, 5_333.0, 10_667.0,
];

/// Lowest band gain that can be entered, in dB.
pub const GAIN_DB_MIN: f32 = -75.0;

/// Highest band gain that can be entered, in dB.
pub const GAIN_DB_MAX: f32 = 20.0;

/// Minimum mixer volume (silence).
pub const VOLUME_MIN: f32 = 0.0;

/// Maximum mixer volume (100%).
pub const VOLUME_MAX: f32 = 1.0;

/// Upper bound for the file player volume (log slider at +1).
pub const PLAYER_VOLUME_MAX: f32 = 10.0;

/// Ear-canal compensation: low shelf corner frequency.
pub const EAR_CANAL_SHELF_HZ: f32 = 700.0;
/// Ear-canal compensation: low shelf linear gain.
pub const EAR_CANAL_SHELF_GAIN: f32 = 0.178;
/// Ear-canal compensation: low shelf Q.
pub const EAR_CANAL_SHELF_Q: f32 = 0.7;

/// Ear-canal compensation: first resonance (center, bandwidth, linear gain).
pub const EAR_CANAL_PEAK_1: (f32, f32, f32) = (1_500.0, 2_000.0, 1.995);
/// Ear-canal compensation: second resonance (center, bandwidth, linear gain).
pub const EAR_CANAL_PEAK_2: (f32, f32, f32) = (14_000.0, 4_000.0, 5.623);

/// Default stream buffer size, in frames.
pub const DEFAULT_BUFFER_FRAMES: u32 = 512;

/// Capacity of the control and event ring buffers.
pub const MESSAGE_RING_CAPACITY: usize = 1024;

/// Capacity of the microphone sample ring, in mono samples.
pub const MIC_RING_CAPACITY: usize = 16_384;

/// Time constant of the amplitude follower, in seconds.
pub const AMPLITUDE_TIME_CONSTANT_S: f32 = 0.016;

/// Frames per resampler call when converting a recording for playback.
pub const FILE_RESAMPLE_CHUNK_FRAMES: usize = 1024;

/// Frames per resampler call on the microphone path.
///
/// Sets the extra latency when the input runs at its own rate.
pub const MIC_RESAMPLE_CHUNK_FRAMES: usize = 256;
