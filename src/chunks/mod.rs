pub mod form;
pub mod list;
pub mod raw;
pub mod zstr;

pub use crate::chunks::form::{FormElement, FormElementDeserializer};
pub use crate::chunks::list::{ListElement, ListElementDeserializer};
pub use crate::chunks::raw::{RawElement, RawElementDeserializer};
pub use crate::chunks::zstr::{ZStringElement, ZStringElementDeserializer};

use crate::fourcc::FourCC;

// Container wrappers
pub const RIFF: FourCC = FourCC::new(*b"RIFF");
pub const LIST: FourCC = FourCC::new(*b"LIST");

// Well-known form, list and chunk ids
pub const WAVE: FourCC = FourCC::new(*b"WAVE");
pub const FMT: FourCC = FourCC::new(*b"fmt ");
pub const DATA: FourCC = FourCC::new(*b"data");
pub const FACT: FourCC = FourCC::new(*b"fact");
pub const INFO: FourCC = FourCC::new(*b"INFO");
