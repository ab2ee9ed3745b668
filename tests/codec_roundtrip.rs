//! End-to-end codec tests: encode, decode, and compare against the input.

use vibcodec::interface::{FileDecoder, FileEncoder};
use vibcodec::utils::bits::{pack_bits, unpack_bits};
use vibcodec::{Decoder, Encoder};

fn sine(len: usize, fs: u32, freq: f64, amplitude: f64) -> Vec<f64> {
    (0..len)
        .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / fs as f64).sin())
        .collect()
}

fn snr_db(original: &[f64], decoded: &[f64]) -> f64 {
    let n = original.len().min(decoded.len());
    let signal: f64 = original[..n].iter().map(|v| v * v).sum();
    let noise: f64 = original[..n]
        .iter()
        .zip(&decoded[..n])
        .map(|(a, b)| (a - b) * (a - b))
        .sum();
    10.0 * (signal / noise).log10()
}

#[test]
fn sinusoid_round_trip_reaches_20_db() {
    let fs = 2800;
    let bl = 512;
    let sig = sine(512, fs, 250.0, 0.8);

    let mut encoder = Encoder::new(bl, fs, 8).unwrap();
    let bits = encoder.encode_1d(&sig, 120);

    let mut decoder = Decoder::new(8);
    let rec = decoder.decode_1d(&bits).unwrap();

    assert_eq!(rec.len(), 512);
    assert_eq!(decoder.sampling_rate(), Some(fs));
    let snr = snr_db(&sig, &rec);
    assert!(snr >= 20.0, "snr {snr:.2} dB");
}

#[test]
fn round_trip_survives_byte_packing() {
    let fs = 2800;
    let sig = sine(1000, fs, 150.0, 0.5);

    let mut encoder = Encoder::new(256, fs, 8).unwrap();
    let bits = encoder.encode_1d(&sig, 90);
    let unpacked = unpack_bits(&pack_bits(&bits));

    let mut decoder = Decoder::new(8);
    let rec = decoder.decode_1d(&unpacked).unwrap();

    // Padded to whole blocks of 256.
    assert_eq!(rec.len(), 1024);
    assert!(snr_db(&sig, &rec) >= 15.0);
}

#[test]
fn byte_identical_re_encoding() {
    let sig = sine(700, 2500, 95.0, 0.6);
    let mut enc1 = Encoder::new(128, 2500, 8).unwrap();
    let mut enc2 = Encoder::new(128, 2500, 8).unwrap();
    let b1 = pack_bits(&enc1.encode_1d(&sig, 60));
    let b2 = pack_bits(&enc2.encode_1d(&sig, 60));
    assert_eq!(b1, b2);
}

#[test]
fn all_zero_signal_round_trips_to_silence() {
    for &bl in &[32usize, 64, 128, 256, 512] {
        let mut encoder = Encoder::new(bl, 8000, 8).unwrap();
        let bits = encoder.encode_1d(&vec![0.0; 2 * bl], 100);

        let mut decoder = Decoder::new(8);
        let rec = decoder.decode_1d(&bits).unwrap();
        assert_eq!(rec, vec![0.0; 2 * bl], "bl={bl}");
        assert_eq!(decoder.sampling_rate(), Some(8000));
    }
}

#[test]
fn silence_gap_in_the_middle_stays_silent() {
    let fs = 2800;
    let bl = 64;
    let mut sig = sine(bl, fs, 300.0, 0.7);
    sig.extend(std::iter::repeat(0.0).take(bl));
    sig.extend(sine(bl, fs, 300.0, 0.7));

    let mut encoder = Encoder::new(bl, fs, 8).unwrap();
    let bits = encoder.encode_1d(&sig, 80);
    let mut decoder = Decoder::new(8);
    let rec = decoder.decode_1d(&bits).unwrap();

    assert_eq!(rec.len(), 3 * bl);
    assert!(rec[bl..2 * bl].iter().all(|&v| v == 0.0));
    assert!(snr_db(&sig[..bl], &rec[..bl]) >= 10.0);
}

#[test]
fn multichannel_round_trip_preserves_channels() {
    let fs = 2800;
    let bl = 128;
    let sig = vec![
        sine(3 * bl, fs, 120.0, 0.5),
        sine(3 * bl, fs, 250.0, 0.3),
        vec![0.0; 3 * bl],
    ];

    let mut encoder = Encoder::new(bl, fs, 8).unwrap();
    let bits = encoder.encode_md(&sig, 80).unwrap();

    let mut decoder = Decoder::new(8);
    let rec = decoder.decode_md(&bits).unwrap();

    assert_eq!(rec.len(), 3);
    for channel in &rec {
        assert_eq!(channel.len(), 3 * bl);
    }
    assert!(snr_db(&sig[0], &rec[0]) >= 10.0);
    assert!(snr_db(&sig[1], &rec[1]) >= 10.0);
    assert!(rec[2].iter().all(|&v| v == 0.0));
}

#[test]
fn multichannel_needs_matching_capacity() {
    // Encoded with capacity for 15 channels, decoded with the same setting.
    let sig = vec![sine(64, 2800, 200.0, 0.4); 9];
    let mut encoder = Encoder::new(64, 2800, 15).unwrap();
    let bits = encoder.encode_md(&sig, 60).unwrap();

    let mut decoder = Decoder::new(15);
    let rec = decoder.decode_md(&bits).unwrap();
    assert_eq!(rec.len(), 9);
}

#[test]
fn oversized_budget_is_clamped_and_still_decodes() {
    let fs = 2500;
    let sig = sine(64, fs, 90.0, 0.9);
    let mut encoder = Encoder::with_defaults(64, fs).unwrap();
    let bits = encoder.encode_1d(&sig, 10_000);

    let mut decoder = Decoder::default();
    let rec = decoder.decode_1d(&bits).unwrap();
    assert!(snr_db(&sig, &rec) >= 30.0);
}

#[test]
fn amplitudes_above_one_use_the_wide_maximum_mode() {
    let fs = 2800;
    let sig = sine(256, fs, 200.0, 3.5);
    let mut encoder = Encoder::new(256, fs, 8).unwrap();
    let bits = encoder.encode_1d(&sig, 100);

    let mut decoder = Decoder::new(8);
    let rec = decoder.decode_1d(&bits).unwrap();
    assert!(snr_db(&sig, &rec) >= 20.0);
}

#[test]
fn unknown_sampling_rate_code_round_trips_as_unknown() {
    let sig = sine(64, 1234, 90.0, 0.4);
    let mut encoder = Encoder::new(64, 1234, 8).unwrap();
    let bits = encoder.encode_1d(&sig, 60);

    let mut decoder = Decoder::new(8);
    let rec = decoder.decode_1d(&bits).unwrap();
    assert_eq!(rec.len(), 64);
    assert_eq!(decoder.sampling_rate(), None);
}

#[test]
fn empty_signal_gives_header_only_stream() {
    let mut encoder = Encoder::new(512, 2800, 8).unwrap();
    let bits = encoder.encode_1d(&[], 120);
    assert_eq!(bits.len(), 2);

    let mut decoder = Decoder::new(8);
    let rec = decoder.decode_1d(&bits).unwrap();
    assert!(rec.is_empty());
}

#[test]
fn reconstruction_error_is_bounded_by_budget() {
    let fs = 2800;
    let bl = 512;
    let sig = sine(bl, fs, 250.0, 0.8);
    let energy: f64 = sig.iter().map(|v| v * v).sum();

    for budget in [40usize, 80, 120] {
        let mut encoder = Encoder::new(bl, fs, 8).unwrap();
        let bits = encoder.encode_1d(&sig, budget);
        let mut decoder = Decoder::new(8);
        let rec = decoder.decode_1d(&bits).unwrap();

        let noise: f64 = sig
            .iter()
            .zip(&rec)
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        let bands = vibcodec::constants::dwt_levels(bl) + 1;
        let bound = 2f64.powi(-((budget / bands) as i32 - 2)) * energy;
        assert!(
            noise <= bound,
            "budget {budget}: noise {noise:.3e} above bound {bound:.3e}"
        );
    }
}

#[test]
fn file_round_trip_through_wav() {
    let dir = tempfile::tempdir().unwrap();
    let in_dir = dir.path().join("orig");
    let enc_dir = dir.path().join("enc");
    let dec_dir = dir.path().join("dec");
    std::fs::create_dir_all(&in_dir).unwrap();

    let fs = 2800;
    let sig = sine(1024, fs, 250.0, 0.6);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: fs,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_path = in_dir.join("tone.wav");
    let mut writer = hound::WavWriter::create(&wav_path, spec).unwrap();
    for &v in &sig {
        writer.write_sample((v * 32767.0).round() as i16).unwrap();
    }
    writer.finalize().unwrap();

    FileEncoder::new(0)
        .encode_folder(&in_dir, &enc_dir, 512, 120, "_120", 8, false)
        .unwrap();
    assert!(enc_dir.join("tone_120.binary").exists());

    FileDecoder::new(false, 0)
        .decode_folder(&enc_dir, &dec_dir, 8, false)
        .unwrap();
    let out_path = dec_dir.join("tone_120.wav");
    assert!(out_path.exists());

    let mut reader = hound::WavReader::open(&out_path).unwrap();
    assert_eq!(reader.spec().sample_rate, fs);
    let decoded: Vec<f64> = reader
        .samples::<i16>()
        .map(|s| s.unwrap() as f64 / 32768.0)
        .collect();
    assert_eq!(decoded.len(), 1024);
    assert!(snr_db(&sig, &decoded) >= 20.0);
}
