//! Common test fixtures for the cdm tests.
//!
//! Constants shared by the synthetic file generators and the assertions
//! that check their decoded contents.

/// Radar site written into signature-variant site blocks.
pub mod site {
    pub const STATION_ID: &str = "Z9250";
    pub const STATION_NAME: &str = "NANJING";
    pub const LATITUDE: f32 = 32.19;
    pub const LONGITUDE: f32 = 118.70;
    pub const ELEVATION_M: f32 = 144.0;
}

/// Radar type strings that select each signature variant.
pub mod radar_type {
    pub const SC: &str = "CINRAD/SC";
    pub const CD: &str = "CINRAD/CD";
    pub const CC: &str = "CINRADC";
    pub const CC20: &str = "CINRAD/CC";
}

/// Timing of generated volumes.
pub mod time {
    /// Date of every generated radial.
    pub const YEAR: i32 = 2020;
    pub const MONTH: u32 = 6;
    pub const DAY: u32 = 15;

    /// Milliseconds of day of the first radial.
    pub const START_MSECS: i32 = 36_000_000;

    /// Milliseconds between consecutive radials.
    pub const RADIAL_STEP_MSECS: i32 = 250;

    /// ISO start of the generated volume.
    pub const VOLUME_START_ISO: &str = "2020-06-15T10:00:00Z";
}

/// Gate geometry written into radial preambles, in metres.
pub mod gates {
    pub const REFLECTIVITY_START: i16 = 0;
    pub const REFLECTIVITY_SIZE: i16 = 1000;
    pub const DOPPLER_START: i16 = 0;
    pub const DOPPLER_SIZE: i16 = 250;
}

/// Volume coverage pattern written into generated radials.
pub const VCP: i16 = 21;
