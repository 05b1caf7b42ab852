//! # Riffers
//!
//! Riffers is an async library for reading, writing and manipulating RIFF-style chunk containers
//! (WAV, AVI, WebP, MIDI-style IFF, ...) in Rust. It decodes a byte source into a tree of elements
//! and encodes such trees back into bytes, without ever copying chunk payloads it does not have to.
//!
//! ## Core Features
//!
//! - **Accessors**: Every byte source and sink is an accessor with cheap, offset-shifted views:
//!   - In-memory buffers ([`MemoryReadAccessor`], [`MemoryWriteAccessor`])
//!   - Files via `tokio::fs` ([`FileReadAccessor`], [`FileWriteAccessor`])
//!   - Append-only streams whose readers wait for data ([`StreamReadAccessor`])
//!   - Virtual concatenations of other accessors ([`MultiSegmentReadAccessor`])
//!
//! - **Element Tree**: A closed set of element kinds:
//!   - [`FormElement`]: the top-level "RIFF" chunk with a form type ("WAVE", "AVI ", ...)
//!   - [`ListElement`]: nestable "LIST" chunks with a list type ("INFO", ...)
//!   - [`RawElement`]: any chunk, payload kept as a reference to the source
//!   - [`ZStringElement`]: NUL-terminated string chunks
//!
//! - **Pluggable Decoding**: Forms, lists and the deserialization stream each own a registry of
//!   child deserializers. Several deserializers may compete for the same id, and anything left
//!   unclaimed is decoded as a raw element.
//!
//! - **Cancellation**: Every I/O operation takes a `tokio_util` [`CancellationToken`].
//!
//! - **Optional Features**:
//!   - `colored`: Coloured `Display` output for element trees
//!   - `logging`: Detailed operation logging through the `log` crate
//!
//! ## Quick Examples
//!
//! ### Reading a WAV file
//!
//! ```no_run
//! use riffers::{read_form, CodecOptions, ElementContainer, FormElementDeserializer, WAVE};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> riffers::RiffResult<()> {
//! let cancel = CancellationToken::new();
//! let deserializer = FormElementDeserializer::new(WAVE);
//! let form = read_form("input.wav", &deserializer, &CodecOptions::GENERIC, &cancel).await?;
//! for child in form.children() {
//!     println!("{}", child);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Registering child deserializers
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use riffers::{FormElementDeserializer, FourCC, ListElementDeserializer, ZStringElementDeserializer, INFO, WAVE};
//!
//! # fn example() -> riffers::RiffResult<()> {
//! let mut info = ListElementDeserializer::new(INFO);
//! info.use_child_deserializer(Arc::new(ZStringElementDeserializer::new("INAM".parse::<FourCC>()?)))?;
//!
//! let mut wave = FormElementDeserializer::new(WAVE);
//! wave.use_child_deserializer(Arc::new(info))?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Writing a WAV file
//!
//! ```no_run
//! use riffers::{write, CodecOptions, ElementContainer, FormElement, RawElement, DATA, FMT, WAVE};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(fmt: Vec<u8>, audio: Vec<u8>) -> riffers::RiffResult<()> {
//! let mut form = FormElement::new(WAVE);
//! form.add_child(RawElement::from_bytes(FMT, fmt)?.into());
//! form.add_child(RawElement::from_bytes(DATA, audio)?.into());
//!
//! let cancel = CancellationToken::new();
//! let written = write("output.wav", &form.into(), &CodecOptions::GENERIC, &cancel).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Wire Format
//!
//! A chunk is a 4 byte id, a 4 byte length, `length` bytes of payload and, when word alignment is
//! on and `length` is odd, one zero pad byte. [`CodecOptions::GENERIC`] (little-endian, aligned)
//! covers RIFF proper, [`CodecOptions::MIDI`] (big-endian, unaligned) covers MIDI-style files.
//!
//! ## Error Handling
//!
//! Riffers uses the `RiffResult<T>` type alias for operations that can fail:
//!
//! ```no_run
//! pub type RiffResult<T> = Result<T, RiffError>;
//! ```
//!
//! Only deserialize errors are recovered from internally, as "this deserializer declined". I/O
//! errors, cancellation and parameter errors always reach the caller.
//!
pub mod chunks;
pub mod core;
pub mod error;
pub mod fourcc;
pub mod header;
pub mod io;
pub mod iter;
pub mod options;

use std::path::Path;

pub use tokio_util::sync::CancellationToken;

pub use crate::chunks::{
    FormElement, FormElementDeserializer, ListElement, ListElementDeserializer, RawElement,
    RawElementDeserializer, ZStringElement, ZStringElementDeserializer, DATA, FACT, FMT, INFO,
    LIST, RIFF, WAVE,
};
pub use crate::core::{
    DeserializerRegistry, Element, ElementContainer, ElementDeserializer,
    ElementDeserializerOutput, ElementSerializerOutput, SharedElementDeserializer,
};
pub use crate::error::{ErrorKind, RiffError, RiffResult};
pub use crate::fourcc::FourCC;
pub use crate::header::{
    Chunk, ChunkDeserializer, ChunkDeserializerOutput, ChunkSerializer, ChunkSerializerOutput,
};
pub use crate::io::{
    copy_between_accessors, FileReadAccessor, FileWriteAccessor, MemoryReadAccessor,
    MemoryWriteAccessor, MultiSegmentReadAccessor, MultiSegmentReadAccessorFactory, ReadAccessor,
    StreamReadAccessor, WriteAccessor,
};
pub use crate::iter::{ElementDeserializationStream, ElementSerializationStream};
pub use crate::options::{CodecOptions, Endianness};

/// A macro for logging messages if the logging feature is enabled.
#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)+) => {
        #[cfg(feature = "logging")]
        log::log!($level, $($arg)+);
    };
}

/// Reads the form stored in a file.
///
/// The file is opened read-only and decoded as one form bounded by the file size. Raw elements in
/// the returned tree keep referencing the file, which stays open until the last of them is dropped.
///
/// # Examples
///
/// ```no_run
/// use riffers::{read_form, CodecOptions, FormElementDeserializer, WAVE};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> riffers::RiffResult<()> {
/// let form = read_form(
///     "path/to/wav.wav",
///     &FormElementDeserializer::new(WAVE),
///     &CodecOptions::GENERIC,
///     &CancellationToken::new(),
/// )
/// .await?;
/// println!("{}", riffers::Element::from(form));
/// # Ok(())
/// # }
/// ```
pub async fn read_form<P: AsRef<Path>>(
    path: P,
    deserializer: &FormElementDeserializer,
    options: &CodecOptions,
    cancel: &CancellationToken,
) -> RiffResult<FormElement> {
    let file = FileReadAccessor::open(&path, cancel).await?;
    let size = file.size().await?;
    if size < header::CHUNK_HEADER_SIZE {
        return Err(RiffError::IOError("Data truncated.".into()));
    }

    let (form, _) = deserializer
        .deserialize_form(&file, 0, Some(size), options, cancel)
        .await?;
    log!(
        log::Level::Debug,
        "Read form from {}\n{}",
        path.as_ref().display(),
        form,
    );
    Ok(form)
}

/// Serializes an element into a new file and returns the number of bytes written.
///
/// An existing file at `path` is truncated.
pub async fn write<P: AsRef<Path>>(
    path: P,
    element: &Element,
    options: &CodecOptions,
    cancel: &CancellationToken,
) -> RiffResult<u64> {
    let output = element.serialize(options, cancel)?;
    let file = FileWriteAccessor::create(&path, cancel).await?;
    let written = output.write(&file, 0, cancel).await;
    file.end().await?;
    written?;

    log!(
        log::Level::Debug,
        "Wrote {} bytes to {}",
        output.length(),
        path.as_ref().display()
    );
    Ok(output.length())
}

#[cfg(test)]
mod tests {
    use std::{
        path::{Path, PathBuf},
        sync::Arc,
    };

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    const TEST_OUTPUT: &str = "./test_resources/tmp/";

    fn output_path(name: &str) -> PathBuf {
        if !Path::new(TEST_OUTPUT).exists() {
            std::fs::create_dir_all(TEST_OUTPUT).unwrap();
        }
        Path::new(TEST_OUTPUT).join(name)
    }

    fn sine_wave(sample_rate: u32, n_samples: usize) -> Vec<i16> {
        (0..n_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                ((t * 440.0 * 2.0 * std::f32::consts::PI).sin() * i16::MAX as f32) as i16
            })
            .collect()
    }

    fn fmt_payload(channels: u16, sample_rate: u32) -> Vec<u8> {
        let block_align = channels * 2;
        let mut fmt = Vec::with_capacity(16);
        fmt.extend_from_slice(&1u16.to_le_bytes());
        fmt.extend_from_slice(&channels.to_le_bytes());
        fmt.extend_from_slice(&sample_rate.to_le_bytes());
        fmt.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        fmt.extend_from_slice(&block_align.to_le_bytes());
        fmt.extend_from_slice(&16u16.to_le_bytes());
        fmt
    }

    #[tokio::test]
    async fn write_then_read_wav() {
        let path = output_path("lib_write_then_read.wav");
        let cancel = CancellationToken::new();
        let samples = sine_wave(16000, 1600);
        let audio: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let mut info = ListElement::new(INFO);
        info.add_child(
            ZStringElement::with_string_bytes("INAM".parse().unwrap(), b"sine")
                .unwrap()
                .into(),
        );
        let mut form = FormElement::new(WAVE);
        form.add_child(RawElement::from_bytes(FMT, fmt_payload(1, 16000)).unwrap().into());
        form.add_child(info.into());
        form.add_child(RawElement::from_bytes(DATA, audio.clone()).unwrap().into());

        let written = write(&path, &form.into(), &CodecOptions::GENERIC, &cancel)
            .await
            .unwrap();
        assert_eq!(written, std::fs::metadata(&path).unwrap().len());

        // hound skips unknown chunks, LIST included
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, samples);

        let mut info = ListElementDeserializer::new(INFO);
        info.use_child_deserializer(Arc::new(ZStringElementDeserializer::new(
            "INAM".parse().unwrap(),
        )))
        .unwrap();
        let mut deserializer = FormElementDeserializer::new(WAVE);
        deserializer.use_child_deserializer(Arc::new(info)).unwrap();

        let form = read_form(&path, &deserializer, &CodecOptions::GENERIC, &cancel)
            .await
            .unwrap();
        assert_eq!(form.child_count(), 3);
        let name = form.get_child_at(1).unwrap().as_list().unwrap();
        assert_eq!(
            name.get_child_at(0).unwrap().as_zstring().unwrap().to_string_lossy(),
            "sine"
        );
        let data = form.get_child_at(2).unwrap().as_raw().unwrap();
        assert_eq!(data.data(&cancel).await.unwrap(), audio);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn read_hound_written_file() {
        let path = output_path("lib_read_hound.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut rng = StdRng::seed_from_u64(42);
        let samples: Vec<i16> = (0..999).map(|_| rng.gen()).collect();
        {
            let mut writer = hound::WavWriter::create(&path, spec).unwrap();
            for s in &samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let cancel = CancellationToken::new();
        let form = read_form(
            &path,
            &FormElementDeserializer::new(WAVE),
            &CodecOptions::GENERIC,
            &cancel,
        )
        .await
        .unwrap();
        let data = form
            .children()
            .find(|c| c.name() == DATA)
            .and_then(Element::as_raw)
            .unwrap();
        let bytes = data.data(&cancel).await.unwrap();
        let decoded: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(decoded, samples);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn read_form_rejects_tiny_file() {
        let path = output_path("lib_tiny.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        let err = read_form(
            &path,
            &FormElementDeserializer::new(WAVE),
            &CodecOptions::GENERIC,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IO);
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn read_form_wrong_form_type() {
        let path = output_path("lib_wrong_type.riff");
        let cancel = CancellationToken::new();
        write(
            &path,
            &FormElement::new("AVI".parse().unwrap()).into(),
            &CodecOptions::GENERIC,
            &cancel,
        )
        .await
        .unwrap();

        let err = read_form(
            &path,
            &FormElementDeserializer::new(WAVE),
            &CodecOptions::GENERIC,
            &cancel,
        )
        .await
        .unwrap_err();
        assert!(err.is_deserialize());
        std::fs::remove_file(&path).unwrap();
    }
}
