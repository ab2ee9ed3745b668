//! File and folder front end.
//!
//! Reads vibrotactile signals from `.wav` (16-bit PCM), `.txt` or `.csv`
//! files (rows are channels), runs them through the codec, and stores the
//! packed bitstream with a `.binary` suffix. Decoding reverses the chain and
//! writes `.wav` or `.txt`.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{CodecError, Result};
use crate::utils::bits::{pack_bits, unpack_bits};

const COMPRESSED_SUFFIX: &str = "binary";
const SIGNAL_SUFFIXES: [&str; 3] = ["wav", "txt", "csv"];

/// Write a packed bitstream to disk, LSB-first per byte, zero-padded tail.
pub fn write_binary(path: &Path, bits: &[u8]) -> Result<()> {
    fs::write(path, pack_bits(bits))?;
    Ok(())
}

/// Read a packed bitstream back into unpacked bits.
pub fn read_binary(path: &Path) -> Result<Vec<u8>> {
    Ok(unpack_bits(&fs::read(path)?))
}

/// Encoding front end. Carries the fallback sampling rate used for text
/// inputs, which have no rate of their own.
pub struct FileEncoder {
    fs: u32,
}

impl FileEncoder {
    pub fn new(fs: u32) -> Self {
        Self { fs }
    }

    /// Encode one signal file into `output`.
    pub fn encode_file(
        &self,
        input: &Path,
        output: &Path,
        bl: usize,
        bitbudget: usize,
        max_channels: usize,
        multichannel: bool,
    ) -> Result<()> {
        let (signal, fs) = read_signal(input, self.fs)?;
        let mut encoder = Encoder::new(bl, fs, max_channels)?;

        let bits = if multichannel {
            encoder.encode_md(&signal, bitbudget)?
        } else {
            if signal.len() > 1 {
                warn!(
                    "{} has {} channels, only the first is encoded",
                    input.display(),
                    signal.len()
                );
            }
            encoder.encode_1d(&signal[0], bitbudget)
        };
        write_binary(output, &bits)
    }

    /// Encode every signal file in `in_folder` into `out_folder`, appending
    /// `appendix` to each stem.
    pub fn encode_folder(
        &self,
        in_folder: &Path,
        out_folder: &Path,
        bl: usize,
        bitbudget: usize,
        appendix: &str,
        max_channels: usize,
        multichannel: bool,
    ) -> Result<()> {
        if !in_folder.is_dir() {
            return Err(CodecError::InvalidInput(format!(
                "folder not found: {}",
                in_folder.display()
            )));
        }
        fs::create_dir_all(out_folder)?;

        for entry in fs::read_dir(in_folder)? {
            let path = entry?.path();
            if !has_suffix_in(&path, &SIGNAL_SUFFIXES) {
                continue;
            }
            let output = product_name(&path, out_folder, appendix, COMPRESSED_SUFFIX);
            info!("encoding {} -> {}", path.display(), output.display());
            self.encode_file(&path, &output, bl, bitbudget, max_channels, multichannel)?;
        }
        Ok(())
    }
}

/// Decoding front end. `txt_mode` selects `.txt` over `.wav` output; `fs` is
/// the rate written into `.wav` headers when the stream carries the unknown
/// code.
pub struct FileDecoder {
    txt_mode: bool,
    fs: u32,
}

impl FileDecoder {
    pub fn new(txt_mode: bool, fs: u32) -> Self {
        Self { txt_mode, fs }
    }

    /// Decode one compressed file into `output`.
    pub fn decode_file(
        &self,
        input: &Path,
        output: &Path,
        max_channels: usize,
        multichannel: bool,
    ) -> Result<()> {
        let bits = read_binary(input)?;
        let mut decoder = Decoder::new(max_channels);

        let signal = if multichannel {
            decoder.decode_md(&bits)?
        } else {
            vec![decoder.decode_1d(&bits)?]
        };
        let fs = decoder.sampling_rate().unwrap_or(self.fs);

        if self.txt_mode {
            write_txt(output, &signal)
        } else {
            write_wav(output, &signal, fs)
        }
    }

    /// Decode every `.binary` file in `in_folder` into `out_folder`.
    pub fn decode_folder(
        &self,
        in_folder: &Path,
        out_folder: &Path,
        max_channels: usize,
        multichannel: bool,
    ) -> Result<()> {
        if !in_folder.is_dir() {
            return Err(CodecError::InvalidInput(format!(
                "folder not found: {}",
                in_folder.display()
            )));
        }
        fs::create_dir_all(out_folder)?;

        let suffix = if self.txt_mode { "txt" } else { "wav" };
        for entry in fs::read_dir(in_folder)? {
            let path = entry?.path();
            if !has_suffix_in(&path, &[COMPRESSED_SUFFIX]) {
                continue;
            }
            let output = product_name(&path, out_folder, "", suffix);
            info!("decoding {} -> {}", path.display(), output.display());
            self.decode_file(&path, &output, max_channels, multichannel)?;
        }
        Ok(())
    }
}

/// Read a signal file as channels of f64 samples plus its sampling rate.
fn read_signal(path: &Path, fallback_fs: u32) -> Result<(Vec<Vec<f64>>, u32)> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("wav") => read_wav(path),
        _ => {
            if fallback_fs == 0 {
                return Err(CodecError::InvalidInput(
                    "a sampling frequency must be specified for text inputs".into(),
                ));
            }
            Ok((read_txt_matrix(path)?, fallback_fs))
        }
    }
}

fn read_wav(path: &Path) -> Result<(Vec<Vec<f64>>, u32)> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(CodecError::InvalidInput(
            "only 16-bit PCM wav input is supported".into(),
        ));
    }
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(CodecError::InvalidInput("wav file has no channels".into()));
    }
    let mut signal = vec![Vec::new(); channels];
    for (i, sample) in reader.samples::<i16>().enumerate() {
        signal[i % channels].push(sample? as f64 / 32768.0);
    }
    Ok((signal, spec.sample_rate))
}

fn write_wav(path: &Path, signal: &[Vec<f64>], fs: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: signal.len() as u16,
        sample_rate: fs,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = signal.iter().map(Vec::len).min().unwrap_or(0);
    for i in 0..frames {
        for channel in signal {
            let v = (channel[i].clamp(-1.0, 1.0) * 32767.0).round() as i16;
            writer.write_sample(v)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Parse a text matrix, one row per line, delimiter auto-detected. Data laid
/// out with more rows than columns is transposed so rows become channels.
fn read_txt_matrix(path: &Path) -> Result<Vec<Vec<f64>>> {
    let content = fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = if line.contains(',') {
            line.split(',').collect()
        } else if line.contains('\t') {
            line.split('\t').collect()
        } else {
            line.split_whitespace().collect()
        };
        let mut row = Vec::with_capacity(fields.len());
        for field in fields {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            row.push(field.parse::<f64>().map_err(|_| {
                CodecError::InvalidInput(format!("unparsable sample {field:?}"))
            })?);
        }
        rows.push(row);
    }
    if rows.is_empty() {
        return Err(CodecError::InvalidInput("no samples found".into()));
    }
    if rows.len() > rows[0].len() {
        info!("transposing input data");
        rows = transpose(rows);
    }
    Ok(rows)
}

fn write_txt(path: &Path, signal: &[Vec<f64>]) -> Result<()> {
    let mut out = String::new();
    for channel in signal {
        let line: Vec<String> = channel.iter().map(|v| format!("{v:e}")).collect();
        out.push_str(&line.join(", "));
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

fn transpose(data: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    let cols = data[0].len();
    (0..cols)
        .map(|i| data.iter().map(|row| row[i]).collect())
        .collect()
}

fn has_suffix_in(path: &Path, suffixes: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| suffixes.iter().any(|s| e.eq_ignore_ascii_case(s)))
        .unwrap_or(false)
}

fn product_name(input: &Path, out_folder: &Path, appendix: &str, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("decoded");
    out_folder.join(format!("{stem}{appendix}.{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_names() {
        let p = product_name(
            Path::new("in/signal.wav"),
            Path::new("out"),
            "_120",
            "binary",
        );
        assert_eq!(p, PathBuf::from("out/signal_120.binary"));
        let p = product_name(Path::new("out/signal_120.binary"), Path::new("dec"), "", "wav");
        assert_eq!(p, PathBuf::from("dec/signal_120.wav"));
    }

    #[test]
    fn suffix_filter() {
        assert!(has_suffix_in(Path::new("a/b.WAV"), &SIGNAL_SUFFIXES));
        assert!(has_suffix_in(Path::new("b.csv"), &SIGNAL_SUFFIXES));
        assert!(!has_suffix_in(Path::new("b.binary"), &SIGNAL_SUFFIXES));
        assert!(!has_suffix_in(Path::new("noext"), &SIGNAL_SUFFIXES));
    }

    #[test]
    fn text_matrix_parsing_and_transposition() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sig.txt");

        // Two rows, three columns: rows stay channels.
        fs::write(&path, "0.1, 0.2, 0.3\n0.4, 0.5, 0.6\n").unwrap();
        let m = read_txt_matrix(&path).unwrap();
        assert_eq!(m, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);

        // Column vector: transposed into one channel.
        fs::write(&path, "1.0\n2.0\n3.0\n").unwrap();
        let m = read_txt_matrix(&path).unwrap();
        assert_eq!(m, vec![vec![1.0, 2.0, 3.0]]);
    }

    #[test]
    fn binary_container_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.binary");
        let bits = vec![1, 0, 1, 1, 0, 0, 0, 1, 1, 0, 1];
        write_binary(&path, &bits).unwrap();
        let back = read_binary(&path).unwrap();
        assert_eq!(&back[..bits.len()], &bits[..]);
        assert!(back.len() % 8 == 0);
    }
}
