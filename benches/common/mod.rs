use std::fmt::Display;

use rand::{rngs::StdRng, Rng, SeedableRng};
use riffers::{
    CodecOptions, ElementContainer, FormElement, FourCC, ListElement, RawElement, ZStringElement,
    DATA, FMT, INFO, WAVE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiffersBenchConfig {
    pub payload_bytes: usize,
    pub n_children: usize,
    pub options: CodecOptions,
}

impl Display for RiffersBenchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let preset = if self.options == CodecOptions::GENERIC {
            "generic"
        } else {
            "midi"
        };
        write!(
            f,
            "{}B_x{}_{}",
            self.payload_bytes, self.n_children, preset
        )
    }
}

pub fn generate_bench_configs() -> Vec<RiffersBenchConfig> {
    let mut configs = Vec::new();
    for &payload_bytes in &[1_024, 65_536, 1_048_576] {
        for &n_children in &[1, 16] {
            for &options in &[CodecOptions::GENERIC, CodecOptions::MIDI] {
                configs.push(RiffersBenchConfig {
                    payload_bytes,
                    n_children,
                    options,
                });
            }
        }
    }
    configs
}

pub fn generate_payload(n_bytes: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n_bytes).map(|_| rng.gen()).collect()
}

/// A WAVE form with a fmt chunk, an INFO list and `n_children` data chunks.
pub fn generate_form(config: &RiffersBenchConfig) -> FormElement {
    let mut form = FormElement::new(WAVE);
    form.add_child(
        RawElement::from_bytes(FMT, generate_payload(16, 0))
            .unwrap()
            .into(),
    );

    let mut info = ListElement::new(INFO);
    info.add_child(
        ZStringElement::with_string_bytes(FourCC::new(*b"INAM"), b"riffers bench")
            .unwrap()
            .into(),
    );
    form.add_child(info.into());

    for i in 0..config.n_children {
        // odd sizes exercise the pad byte
        let payload = generate_payload(config.payload_bytes + (i & 1), i as u64);
        form.add_child(RawElement::from_bytes(DATA, payload).unwrap().into());
    }
    form
}
