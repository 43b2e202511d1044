use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rgc_lib::cli::{DecodeConfig, EncodeConfig};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_ref_gz(path: &Path, fasta: &str) {
    let f = fs::File::create(path).unwrap();
    let mut gz = GzEncoder::new(f, Compression::default());
    gz.write_all(fasta.as_bytes()).unwrap();
    gz.finish().unwrap();
}

fn write_fastq(path: &Path, reads: &[&str]) {
    let mut text = String::new();
    for (i, r) in reads.iter().enumerate() {
        text.push_str(&format!("@read{}\n{}\n+\n{}\n", i, r, "I".repeat(r.len())));
    }
    fs::write(path, text).unwrap();
}

fn gunzip_to_string(path: &Path) -> String {
    let mut s = String::new();
    GzDecoder::new(fs::File::open(path).unwrap())
        .read_to_string(&mut s)
        .unwrap();
    s
}

fn gunzip_to_bytes(path: &Path) -> Vec<u8> {
    let mut v = Vec::new();
    GzDecoder::new(fs::File::open(path).unwrap())
        .read_to_end(&mut v)
        .unwrap();
    v
}

struct Setup {
    _dir: TempDir,
    reference: PathBuf,
    reads: PathBuf,
    out: PathBuf,
    decoded: PathBuf,
}

fn setup(reference: &str, reads: &[&str]) -> Setup {
    let dir = TempDir::new().unwrap();
    let ref_path = dir.path().join("ref.fa.gz");
    let reads_path = dir.path().join("reads.fq");
    write_ref_gz(&ref_path, reference);
    write_fastq(&reads_path, reads);
    Setup {
        reference: ref_path,
        reads: reads_path,
        out: dir.path().join("out"),
        decoded: dir.path().join("decoded.seq"),
        _dir: dir,
    }
}

fn encode_config(s: &Setup, k: usize) -> EncodeConfig {
    EncodeConfig {
        k,
        reference: s.reference.clone(),
        reads: s.reads.clone(),
        out: s.out.clone(),
        threads: 1,
        ..EncodeConfig::default()
    }
}

fn decode_config(s: &Setup, k: usize) -> DecodeConfig {
    DecodeConfig {
        k,
        reference: s.reference.clone(),
        reads: s.out.clone(),
        out: s.decoded.clone(),
        fasta: false,
        ..DecodeConfig::default()
    }
}

fn decoded_lines(s: &Setup) -> Vec<String> {
    fs::read_to_string(&s.decoded)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_two_buckets_counts_string() {
    let s = setup(">ref\nACGTACGTACGT\n", &["ACGTAC", "CGTACG"]);
    rgc_lib::compression::encode(&encode_config(&s, 3)).unwrap();

    let counts_path = s.out.with_file_name("out.counts");
    assert_eq!(gunzip_to_string(&counts_path), "6 1 1 ");

    rgc_lib::compression::decode(&decode_config(&s, 3)).unwrap();
    assert_eq!(decoded_lines(&s), vec!["ACGTAC", "CGTACG"]);
}

#[test]
fn test_single_read_roundtrip() {
    let s = setup(">ref\nAAAA\n", &["AAAAAA"]);
    rgc_lib::compression::encode(&encode_config(&s, 2)).unwrap();

    assert_eq!(gunzip_to_string(&s.out.with_file_name("out.counts")), "6 1 ");

    rgc_lib::compression::decode(&decode_config(&s, 2)).unwrap();
    assert_eq!(decoded_lines(&s), vec!["AAAAAA"]);
}

#[test]
fn test_duplicate_collapse() {
    let s = setup(">ref\nAAAA\n", &["AAAAAA", "AAAAAA", "AAAAAA"]);
    rgc_lib::compression::encode(&encode_config(&s, 2)).unwrap();

    // one uniform bucket, negated
    assert_eq!(gunzip_to_string(&s.out.with_file_name("out.counts")), "6 -3 ");

    rgc_lib::compression::decode(&decode_config(&s, 2)).unwrap();
    assert_eq!(decoded_lines(&s), vec!["AAAAAA", "AAAAAA", "AAAAAA"]);
}

#[test]
fn test_dups_disabled_keeps_every_tail() {
    let s = setup(">ref\nAAAA\n", &["AAAAAA", "AAAAAA", "AAAAAA"]);
    let cfg = EncodeConfig { dups: false, ..encode_config(&s, 2) };
    rgc_lib::compression::encode(&cfg).unwrap();

    assert_eq!(gunzip_to_string(&s.out.with_file_name("out.counts")), "6 3 ");

    rgc_lib::compression::decode(&decode_config(&s, 2)).unwrap();
    assert_eq!(decoded_lines(&s), vec!["AAAAAA", "AAAAAA", "AAAAAA"]);
}

#[test]
fn test_flipped_read_roundtrip() {
    // the reference only contains the reverse-complement strand, so the
    // read is stored flipped and restored on decode
    let s = setup(">ref\nTTTTTTTT\n", &["AAAAAA"]);
    rgc_lib::compression::encode(&encode_config(&s, 3)).unwrap();

    let flipped_bits = gunzip_to_bytes(&s.out.with_file_name("out.flipped"));
    assert_eq!(flipped_bits[0] & 0x80, 0x80, "first flipped bit should be set");

    rgc_lib::compression::decode(&decode_config(&s, 3)).unwrap();
    assert_eq!(decoded_lines(&s), vec!["AAAAAA"]);
}

#[test]
fn test_flip_disabled_keeps_forward_strand() {
    let s = setup(">ref\nTTTTTTTT\n", &["AAAAAA"]);
    let cfg = EncodeConfig { flip: false, ..encode_config(&s, 3) };
    rgc_lib::compression::encode(&cfg).unwrap();

    let flipped_bits = gunzip_to_bytes(&s.out.with_file_name("out.flipped"));
    assert_eq!(flipped_bits[0], 0);

    rgc_lib::compression::decode(&decode_config(&s, 3)).unwrap();
    assert_eq!(decoded_lines(&s), vec!["AAAAAA"]);
}

#[test]
fn test_n_positions_restored() {
    let s = setup(">ref\nACGTACGTACGT\n", &["ACNTAC"]);
    let cfg = EncodeConfig { flip: false, ..encode_config(&s, 3) };
    rgc_lib::compression::encode(&cfg).unwrap();

    assert_eq!(gunzip_to_string(&s.out.with_file_name("out.ns")), "2\n");

    rgc_lib::compression::decode(&decode_config(&s, 3)).unwrap();
    assert_eq!(decoded_lines(&s), vec!["ACNTAC"]);
}

#[test]
fn test_n_positions_survive_flipping() {
    let s = setup(">ref\nTTTTTTTT\n", &["AANAAA"]);
    rgc_lib::compression::encode(&encode_config(&s, 3)).unwrap();
    rgc_lib::compression::decode(&decode_config(&s, 3)).unwrap();
    assert_eq!(decoded_lines(&s), vec!["AANAAA"]);
}

#[test]
fn test_overflow_roundtrip() {
    // one context receives several hundred increments on a single channel,
    // crossing the 8-bit cell into the overflow table mid-stream
    let long_read = format!("CG{}", "A".repeat(263));
    let s = setup(">ref\nAAAA\n", &[&long_read]);
    rgc_lib::compression::encode(&encode_config(&s, 2)).unwrap();
    rgc_lib::compression::decode(&decode_config(&s, 2)).unwrap();
    assert_eq!(decoded_lines(&s), vec![long_read]);
}

#[test]
fn test_multiset_roundtrip_unordered_input() {
    let s = setup(
        ">ref\nACGTACGTACGT\n",
        &["CGTACG", "ACGTAC", "ACGTAC", "TACGTA"],
    );
    rgc_lib::compression::encode(&encode_config(&s, 3)).unwrap();
    rgc_lib::compression::decode(&decode_config(&s, 3)).unwrap();

    let mut decoded = decoded_lines(&s);
    decoded.sort();
    let mut expected = vec!["CGTACG", "ACGTAC", "ACGTAC", "TACGTA"];
    expected.sort();
    assert_eq!(decoded, expected);
}

#[test]
fn test_dense_model_matches_sparse_output() {
    let reads = ["ACGTACGT", "CGTACGTA", "ACGTACGA", "ACGTACGA"];
    let s1 = setup(">ref\nACGTACGTACGTACGT\n", &reads);
    let s2 = setup(">ref\nACGTACGTACGTACGT\n", &reads);

    rgc_lib::compression::encode(&encode_config(&s1, 4)).unwrap();
    let cfg2 = EncodeConfig { bigmem: true, ..encode_config(&s2, 4) };
    rgc_lib::compression::encode(&cfg2).unwrap();

    for suffix in ["out.enc", "out.bittree", "out.counts", "out.flipped", "out.ns"] {
        assert_eq!(
            gunzip_to_bytes(&s1.out.with_file_name(suffix)),
            gunzip_to_bytes(&s2.out.with_file_name(suffix)),
            "stream {} differs between backends",
            suffix
        );
    }

    let dcfg = DecodeConfig { bigmem: true, ..decode_config(&s2, 4) };
    rgc_lib::compression::decode(&dcfg).unwrap();
    let mut decoded = decoded_lines(&s2);
    decoded.sort();
    let mut expected: Vec<&str> = reads.to_vec();
    expected.sort();
    assert_eq!(decoded, expected);
}

#[test]
fn test_deterministic_across_thread_counts() {
    let reads: Vec<String> = (0..40)
        .map(|i| match i % 4 {
            0 => "ACGTACGTACGT".to_string(),
            1 => "TTTTACGTACGT".to_string(),
            2 => "CGCGCGCGCGCG".to_string(),
            _ => "ACGTACGTACGA".to_string(),
        })
        .collect();
    let read_refs: Vec<&str> = reads.iter().map(String::as_str).collect();

    let s1 = setup(">ref\nACGTACGTACGTACGT\n", &read_refs);
    let s2 = setup(">ref\nACGTACGTACGTACGT\n", &read_refs);

    rgc_lib::compression::encode(&encode_config(&s1, 4)).unwrap();
    let cfg2 = EncodeConfig { threads: 4, ..encode_config(&s2, 4) };
    rgc_lib::compression::encode(&cfg2).unwrap();

    for suffix in ["out.enc", "out.bittree", "out.counts", "out.flipped", "out.ns"] {
        assert_eq!(
            gunzip_to_bytes(&s1.out.with_file_name(suffix)),
            gunzip_to_bytes(&s2.out.with_file_name(suffix)),
            "stream {} differs across thread counts",
            suffix
        );
    }
}

#[test]
fn test_fasta_output_format() {
    let s = setup(">ref\nACGTACGTACGT\n", &["ACGTAC"]);
    rgc_lib::compression::encode(&encode_config(&s, 3)).unwrap();
    let dcfg = DecodeConfig { fasta: true, ..decode_config(&s, 3) };
    rgc_lib::compression::decode(&dcfg).unwrap();
    assert_eq!(decoded_lines(&s), vec![">R0", "ACGTAC"]);
}

#[test]
fn test_output_streams_are_gzip() {
    let s = setup(">ref\nACGTACGTACGT\n", &["ACGTAC"]);
    rgc_lib::compression::encode(&encode_config(&s, 3)).unwrap();
    for suffix in ["out.enc", "out.bittree", "out.counts", "out.flipped", "out.ns"] {
        let data = fs::read(s.out.with_file_name(suffix)).unwrap();
        assert!(data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b, "{} not gzipped", suffix);
    }
}

#[test]
fn test_larger_mixed_roundtrip() {
    // duplicates, near-duplicates, Ns and both strands in one batch
    let reads = [
        "ACGTACGTACGTACGT",
        "ACGTACGTACGTACGT",
        "ACGTACGTACGTACGA",
        "TGCATGCATGCATGCA",
        "ACGNACGTACGTACGT",
        "AAAACCCCGGGGTTTT",
        "TTTTGGGGCCCCAAAA",
    ];
    let s = setup(
        ">chr1\nACGTACGTACGTACGTACGTACGT\n>chr2\nAAAACCCCGGGGTTTTAAAACCCC\n",
        &reads,
    );
    rgc_lib::compression::encode(&encode_config(&s, 5)).unwrap();
    rgc_lib::compression::decode(&decode_config(&s, 5)).unwrap();

    let mut decoded = decoded_lines(&s);
    decoded.sort();
    let mut expected: Vec<&str> = reads.to_vec();
    expected.sort();
    assert_eq!(decoded, expected);
}

#[test]
fn test_rejects_bad_k() {
    let s = setup(">ref\nACGT\n", &["ACGT"]);
    assert!(rgc_lib::compression::encode(&encode_config(&s, 0)).is_err());
    assert!(rgc_lib::compression::encode(&encode_config(&s, 17)).is_err());
}

#[test]
fn test_rejects_reads_shorter_than_k() {
    let s = setup(">ref\nACGTACGTACGT\n", &["ACG"]);
    assert!(rgc_lib::compression::encode(&encode_config(&s, 5)).is_err());
}

#[test]
fn test_rejects_missing_reference() {
    let s = setup(">ref\nACGT\n", &["ACGT"]);
    let cfg = EncodeConfig {
        reference: PathBuf::from("/nonexistent/ref.fa.gz"),
        ..encode_config(&s, 2)
    };
    assert!(rgc_lib::compression::encode(&cfg).is_err());
}

#[test]
fn test_decode_rejects_missing_streams() {
    let s = setup(">ref\nACGT\n", &["ACGT"]);
    // nothing was encoded at the basename
    assert!(rgc_lib::compression::decode(&decode_config(&s, 2)).is_err());
}
