//! Wire protocol for Deepcool telemetry displays.
//!
//! Pure packet construction and the reverse-engineered constants for the
//! two known device series.

pub mod frames;

pub use frames::{
    CANDIDATE_PRODUCT_IDS, DEEPCOOL_VID, FRAME_TERMINATOR, INIT_SEQUENCE_CH_TABLE,
    INIT_SEQUENCE_DEFAULT, Series, TABLE_FRAME_LENGTH, encode_table_frame,
    encode_telemetry_frame, init_packets,
};
