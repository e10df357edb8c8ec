#![allow(clippy::assertions_on_result_states)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::too_long_first_doc_paragraph)]

pub mod config;
pub mod curve;
pub mod field;
pub mod gate;
pub mod trace;
pub mod utils;
