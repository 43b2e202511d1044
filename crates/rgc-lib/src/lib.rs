//! Reference-guided compression of short-read DNA sequencing data.
//!
//! A reference genome is used as a shared probabilistic side-channel: both the
//! encoder and the decoder build the same k-mer transition model from it, and
//! an arithmetic coder driven by that model compresses the tail of each read
//! (everything after the leading k-mer). The leading k-mers themselves are
//! grouped into buckets and serialized as a trie, and two small sidecars
//! record reverse-complemented reads and the positions of N bases.
//!
//! The entry points are [`compression::encode`] and [`compression::decode`],
//! configured through [`cli::EncodeConfig`] and [`cli::DecodeConfig`].

pub mod bitvec;
pub mod cli;
pub mod compression;
pub mod io;
pub mod kmer;
pub mod model;
